//! Registry of connected players
//!
//! Two partitions: `live` players take part in the simulation, `dead`
//! players were killed but their connection is still open, so a closing
//! socket can still be resolved to a username. Each map has its own lock;
//! when both are needed the live lock is taken first.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ws::connection::ConnectionId;

use super::player::{NameState, SharedPlayer};

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("username {0} is already taken")]
    NameTaken(String),
}

/// Reasons a rename is refused. The display text is what the client sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RenameError {
    #[error("You already set your username.")]
    AlreadyFinalized,

    #[error("Username already exists.")]
    NameTaken,

    #[error("Bad authentication string.")]
    BadCredentials,
}

pub struct Registry {
    /// Ordered by username so every tick iterates players the same way
    live: Mutex<BTreeMap<String, SharedPlayer>>,
    dead: Mutex<HashMap<String, SharedPlayer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(BTreeMap::new()),
            dead: Mutex::new(HashMap::new()),
        }
    }

    /// Add a player under its current username
    pub fn add_player(&self, player: SharedPlayer) -> Result<(), RegistryError> {
        let username = player.lock().username().to_string();

        let mut live = self.live.lock();
        if live.contains_key(&username) || self.dead.lock().contains_key(&username) {
            return Err(RegistryError::NameTaken(username));
        }
        live.insert(username, player);
        Ok(())
    }

    /// Remove from the live map, or from the dead map if not live
    pub fn remove_player_by_username(&self, username: &str) -> Option<SharedPlayer> {
        if let Some(player) = self.live.lock().remove(username) {
            return Some(player);
        }
        self.dead.lock().remove(username)
    }

    /// Look up a live player
    pub fn get_by_username(&self, username: &str) -> Option<SharedPlayer> {
        self.live.lock().get(username).cloned()
    }

    /// Resolve a connection to its player, live or dead
    pub fn get_by_connection(&self, connection: ConnectionId) -> Option<SharedPlayer> {
        let owned_by = |player: &&SharedPlayer| player.lock().connection().id() == connection;

        if let Some(player) = self.live.lock().values().find(owned_by) {
            return Some(player.clone());
        }
        self.dead.lock().values().find(owned_by).cloned()
    }

    /// Point-in-time copy of the live players, in username order
    pub fn all_players(&self) -> Vec<SharedPlayer> {
        self.live.lock().values().cloned().collect()
    }

    /// Move a killed player out of the live set. The player is matched by
    /// identity, not by name, since its key may have changed since the
    /// caller last read it. Returns false when the player was not live
    /// (already removed or disconnected).
    pub fn mark_dead(&self, player: &SharedPlayer) -> bool {
        let mut live = self.live.lock();
        let key = live
            .iter()
            .find(|(_, candidate)| Arc::ptr_eq(candidate, player))
            .map(|(name, _)| name.clone());
        let Some(key) = key else {
            return false;
        };
        if let Some(player) = live.remove(&key) {
            self.dead.lock().insert(key, player);
        }
        true
    }

    /// Replace a provisional username. Check-and-swap happens under the
    /// live lock, so two requests for the same name can't both win.
    pub fn rename(
        &self,
        old_username: &str,
        new_username: &str,
        auth_token: &str,
    ) -> Result<SharedPlayer, RenameError> {
        let mut live = self.live.lock();
        let player = live
            .get(old_username)
            .cloned()
            .ok_or(RenameError::BadCredentials)?;

        let name_taken =
            live.contains_key(new_username) || self.dead.lock().contains_key(new_username);

        {
            let mut guard = player.lock();
            // A killed player is on its way to the dead map
            if !guard.is_alive() || !guard.authenticate(auth_token) {
                return Err(RenameError::BadCredentials);
            }
            if guard.name_state() == NameState::Finalized {
                return Err(RenameError::AlreadyFinalized);
            }
            if name_taken {
                return Err(RenameError::NameTaken);
            }
            guard.finalize_username(new_username)?;
        }

        live.remove(old_username);
        live.insert(new_username.to_string(), player.clone());
        Ok(player)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn dead_count(&self) -> usize {
        self.dead.lock().len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::player_at;
    use crate::ws::connection::Connection;
    use std::sync::Barrier;

    fn registry_with(names: &[&str]) -> Registry {
        let registry = Registry::new();
        for name in names {
            let (player, _) = player_at(name, 10.0, 10.0);
            registry.add_player(player).unwrap();
        }
        registry
    }

    #[test]
    fn duplicate_usernames_are_refused() {
        let registry = registry_with(&["ann"]);
        let (again, _) = player_at("ann", 0.0, 0.0);
        assert!(matches!(registry.add_player(again), Err(RegistryError::NameTaken(n)) if n == "ann"));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn dead_names_stay_reserved_until_removed() {
        let registry = registry_with(&["ann"]);
        let ann = registry.get_by_username("ann").unwrap();
        assert!(registry.mark_dead(&ann));
        assert!(!registry.mark_dead(&ann));
        assert_eq!((registry.live_count(), registry.dead_count()), (0, 1));
        assert!(registry.get_by_username("ann").is_none());

        let (again, _) = player_at("ann", 0.0, 0.0);
        assert!(registry.add_player(again).is_err());

        assert!(registry.remove_player_by_username("ann").is_some());
        assert_eq!(registry.dead_count(), 0);
    }

    #[test]
    fn closing_connection_resolves_live_and_dead_players() {
        let registry = Registry::new();
        let (ann, ann_conn) = player_at("ann", 0.0, 0.0);
        let (bob, bob_conn) = player_at("bob", 0.0, 0.0);
        registry.add_player(ann).unwrap();
        registry.add_player(bob.clone()).unwrap();
        assert!(registry.mark_dead(&bob));

        let found = registry.get_by_connection(ann_conn.id()).unwrap();
        assert_eq!(found.lock().username(), "ann");
        let found = registry.get_by_connection(bob_conn.id()).unwrap();
        assert_eq!(found.lock().username(), "bob");
        assert!(registry.get_by_connection(uuid::Uuid::new_v4()).is_none());
    }

    #[test]
    fn all_players_is_a_sorted_copy() {
        let registry = registry_with(&["cat", "ann", "bob"]);
        let snapshot = registry.all_players();
        registry.remove_player_by_username("bob");

        let names: Vec<String> = snapshot
            .iter()
            .map(|p| p.lock().username().to_string())
            .collect();
        assert_eq!(names, ["ann", "bob", "cat"]);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn rename_moves_the_key() {
        let registry = registry_with(&["guest1"]);
        let player = registry.rename("guest1", "ann", "token-guest1").unwrap();
        assert_eq!(player.lock().username(), "ann");
        assert!(registry.get_by_username("guest1").is_none());
        assert!(registry.get_by_username("ann").is_some());
    }

    #[test]
    fn rename_with_wrong_token_changes_nothing() {
        let registry = registry_with(&["guest1"]);
        assert_eq!(
            registry.rename("guest1", "ann", "forged").unwrap_err(),
            RenameError::BadCredentials
        );
        assert_eq!(
            registry.rename("nobody", "ann", "token-nobody").unwrap_err(),
            RenameError::BadCredentials
        );
        let player = registry.get_by_username("guest1").unwrap();
        assert_eq!(player.lock().name_state(), NameState::Provisional);
    }

    #[test]
    fn killed_player_is_found_after_a_rename() {
        let registry = registry_with(&["guest1", "bob"]);
        let victim = registry.get_by_username("guest1").unwrap();

        // Rename lands between reading the victim's name and killing it
        registry.rename("guest1", "ann", "token-guest1").unwrap();
        assert!(registry.mark_dead(&victim));

        assert!(registry.get_by_username("ann").is_none());
        assert_eq!((registry.live_count(), registry.dead_count()), (1, 1));
        assert!(registry.remove_player_by_username("ann").is_some());
        assert_eq!(registry.dead_count(), 0);
    }

    #[test]
    fn killed_player_cannot_rename() {
        let registry = registry_with(&["guest1"]);
        let victim = registry.get_by_username("guest1").unwrap();
        victim.lock().health = 0;

        assert_eq!(
            registry.rename("guest1", "ann", "token-guest1").unwrap_err(),
            RenameError::BadCredentials
        );
        assert!(registry.get_by_username("guest1").is_some());
        assert!(registry.get_by_username("ann").is_none());
    }

    #[test]
    fn second_rename_is_always_already_finalized() {
        let registry = registry_with(&["guest1", "taken"]);
        registry.rename("guest1", "ann", "token-guest1").unwrap();

        // Free name and taken name both report finality
        assert_eq!(
            registry.rename("ann", "annie", "token-guest1").unwrap_err(),
            RenameError::AlreadyFinalized
        );
        assert_eq!(
            registry.rename("ann", "taken", "token-guest1").unwrap_err(),
            RenameError::AlreadyFinalized
        );
    }

    #[test]
    fn rename_to_taken_name_fails() {
        let registry = registry_with(&["guest1", "ann"]);
        assert_eq!(
            registry.rename("guest1", "ann", "token-guest1").unwrap_err(),
            RenameError::NameTaken
        );
        let player = registry.get_by_username("guest1").unwrap();
        assert_eq!(player.lock().name_state(), NameState::Provisional);
    }

    #[test]
    fn concurrent_renames_to_one_name_have_one_winner() {
        let registry = Arc::new(registry_with(&["guest1", "guest2"]));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["guest1", "guest2"]
            .into_iter()
            .map(|old| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.rename(old, "champion", &format!("token-{}", old))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(RenameError::NameTaken))));
        assert_eq!(registry.live_count(), 2);
    }
}
