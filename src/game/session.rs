//! Connection lifecycle: join, input, rename and leave
//!
//! Called from connection contexts. Everything here is short: look the
//! player up, check credentials, update a few fields, reply. Projectile
//! announcements for departed players are left to the world tick.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::util::names::{generate_random_username, generate_unique_authentication_string};
use crate::ws::connection::{send_if_open, ConnectionHandle};
use crate::ws::protocol::{
    decode_client_msg, ClientInputStateUpdate, ClientMsg, InitialPlayerList,
    InitialServerJoinState, PlayerListChange, ServerMsg, UsernameChangeRequest,
};

use super::physics::MoveKeys;
use super::player::{Player, SharedPlayer};
use super::registry::{RegistryError, Registry};
use super::world::{broadcast, GameWorld};

/// Generated names are drawn from a large space; a run of collisions this
/// long means something is wrong.
const MAX_USERNAME_ATTEMPTS: usize = 32;

/// Why a client could not join
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("no free username after {0} attempts")]
    NamesExhausted(usize),
}

/// Why an input update was dropped
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("no live player named {0}")]
    UnknownPlayer(String),

    #[error("bad authentication string for {0}")]
    BadCredentials(String),
}

pub struct SessionService {
    registry: Arc<Registry>,
    world: Arc<GameWorld>,
}

impl SessionService {
    pub fn new(world: Arc<GameWorld>) -> Self {
        Self {
            registry: world.registry().clone(),
            world,
        }
    }

    /// Register a freshly connected client and send it its identity
    pub fn on_open(&self, connection: ConnectionHandle) -> Result<SharedPlayer, JoinError> {
        let border = self.world.settings().border;
        let token = generate_unique_authentication_string();
        let (spawn_x, spawn_y) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(0.0..=border.width),
                rng.gen_range(0.0..=border.height),
            )
        };

        for _ in 0..MAX_USERNAME_ATTEMPTS {
            let username = generate_random_username();
            let player = Arc::new(Mutex::new(Player::new(
                username.clone(),
                token.clone(),
                spawn_x,
                spawn_y,
                connection.clone(),
            )));

            match self.registry.add_player(player.clone()) {
                Ok(()) => {
                    player.lock().send(&ServerMsg::JoinState(InitialServerJoinState {
                        initial_username: username.clone(),
                        authentication_string: token,
                        initial_location_x: spawn_x,
                        initial_location_y: spawn_y,
                    }));
                    info!(username = %username, connection = %connection.id(), "Player joined");
                    return Ok(player);
                }
                Err(RegistryError::NameTaken(name)) => {
                    debug!(username = %name, "Generated username taken, retrying");
                }
            }
        }

        Err(JoinError::NamesExhausted(MAX_USERNAME_ATTEMPTS))
    }

    /// Handle one inbound text frame. Bad frames are logged and dropped.
    pub fn on_message(&self, connection: &ConnectionHandle, text: &str) {
        let msg = match decode_client_msg(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(connection = %connection.id(), error = %e, "Dropping client message");
                return;
            }
        };

        match msg {
            ClientMsg::InputState(update) => {
                if let Err(e) = self.apply_input(&update) {
                    warn!(connection = %connection.id(), error = %e, "Dropping input update");
                }
            }
            ClientMsg::UsernameChange(request) => self.change_username(connection, &request),
        }
    }

    fn apply_input(&self, update: &ClientInputStateUpdate) -> Result<(), InputError> {
        let player = self
            .registry
            .get_by_username(&update.username)
            .ok_or_else(|| InputError::UnknownPlayer(update.username.clone()))?;

        let mut player = player.lock();
        if !player.authenticate(&update.auth_string) {
            return Err(InputError::BadCredentials(update.username.clone()));
        }

        let keys = MoveKeys {
            up: update.moving_up,
            down: update.moving_down,
            left: update.moving_left,
            right: update.moving_right,
        };
        player.apply_input(keys, update.shooting, update.angle);
        Ok(())
    }

    fn change_username(&self, connection: &ConnectionHandle, request: &UsernameChangeRequest) {
        let result = self.registry.rename(
            &request.old_username,
            &request.new_username,
            &request.authentication_string,
        );

        let player = match result {
            Ok(player) => player,
            Err(e) => {
                info!(
                    old = %request.old_username,
                    new = %request.new_username,
                    reason = %e,
                    "Username change refused"
                );
                reply(connection, &ServerMsg::username_failed(e.to_string()));
                return;
            }
        };

        info!(old = %request.old_username, new = %request.new_username, "Username changed");
        reply(connection, &ServerMsg::username_accepted(&request.new_username));

        let everyone = self.registry.all_players();
        broadcast(
            &everyone,
            &ServerMsg::PlayerListChange(PlayerListChange {
                username: request.new_username.clone(),
                joined: true,
            }),
        );

        // Catch the newcomer up on everyone else and every projectile in flight
        let mut others = Vec::with_capacity(everyone.len());
        let mut bullets = Vec::new();
        for other in &everyone {
            let guard = other.lock();
            bullets.extend(guard.projectiles_as_new());
            if !Arc::ptr_eq(other, &player) {
                others.push(guard.to_update());
            }
        }

        let player = player.lock();
        player.send(&ServerMsg::InitialPlayerList(InitialPlayerList { players: others }));
        player.send(&ServerMsg::Bullets(bullets));
    }

    /// Forget the player behind a closed connection
    pub fn on_close(&self, connection: &ConnectionHandle) {
        let Some(player) = self.registry.get_by_connection(connection.id()) else {
            debug!(connection = %connection.id(), "Unknown connection closed");
            return;
        };

        let username = {
            let mut player = player.lock();
            player.kill_all_projectiles();
            player.username().to_string()
        };
        self.registry.remove_player_by_username(&username);
        self.world.queue_departure(player);

        broadcast(
            &self.registry.all_players(),
            &ServerMsg::PlayerListChange(PlayerListChange {
                username: username.clone(),
                joined: false,
            }),
        );
        info!(username = %username, connection = %connection.id(), "Player left");
    }
}

/// Send to a connection that may not have a live player behind it
fn reply(connection: &ConnectionHandle, msg: &ServerMsg) {
    match msg.encode() {
        Ok(text) => {
            send_if_open(connection.as_ref(), &text);
        }
        Err(e) => warn!(tag = msg.tag(), error = %e, "Failed to encode reply"),
    }
}
