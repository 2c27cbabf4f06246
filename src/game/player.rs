//! Authoritative player state

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::ws::connection::{send_if_open, ConnectionHandle};
use crate::ws::protocol::{BulletInfo, ServerMsg, ServerPlayerUpdate};

use super::border::WorldBorder;
use super::combat::{CombatSystem, Projectile, ProjectileState, WeaponStats, MAX_HEALTH};
use super::physics::{MoveKeys, Motion, MovementModel, PhysicsSystem};
use super::registry::RenameError;

/// Player record shared between connection contexts and the world loop
pub type SharedPlayer = Arc<Mutex<Player>>;

/// A username may be replaced exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameState {
    /// Generated at connect, still replaceable
    Provisional,
    /// Chosen by the player, fixed for the session
    Finalized,
}

/// Per-entity fault detected while advancing the world
#[derive(Debug, thiserror::Error)]
pub enum EntityFault {
    #[error("player {username} has non-finite kinematics")]
    NonFinite { username: String },
}

pub struct Player {
    username: String,
    auth_token: String,
    name_state: NameState,

    // Position and movement
    pub motion: Motion,
    pub accel_x: f32,
    pub accel_y: f32,
    /// Facing in radians
    pub angle: f32,

    // Combat
    pub health: u32,
    pub score: u32,
    pub firing: bool,
    fire_cooldown: f32,
    /// Ids grow monotonically, so key order is firing order
    projectiles: BTreeMap<u32, Projectile>,

    connection: ConnectionHandle,
}

impl Player {
    pub fn new(
        username: String,
        auth_token: String,
        spawn_x: f32,
        spawn_y: f32,
        connection: ConnectionHandle,
    ) -> Self {
        Self {
            username,
            auth_token,
            name_state: NameState::Provisional,
            motion: Motion::at(spawn_x, spawn_y),
            accel_x: 0.0,
            accel_y: 0.0,
            angle: 0.0,
            health: MAX_HEALTH,
            score: 0,
            firing: false,
            fire_cooldown: 0.0,
            projectiles: BTreeMap::new(),
            connection,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn name_state(&self) -> NameState {
        self.name_state
    }

    pub fn authenticate(&self, token: &str) -> bool {
        self.auth_token == token
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Take the chosen username. Only the registry calls this, while it
    /// holds the live map, so the name can't be claimed twice.
    pub(super) fn finalize_username(&mut self, new_username: &str) -> Result<(), RenameError> {
        match self.name_state {
            NameState::Finalized => Err(RenameError::AlreadyFinalized),
            NameState::Provisional => {
                self.username = new_username.to_string();
                self.name_state = NameState::Finalized;
                Ok(())
            }
        }
    }

    /// Replace the input state with the client's latest
    pub fn apply_input(&mut self, keys: MoveKeys, firing: bool, angle: f32) {
        let (ax, ay) = keys.acceleration();
        self.accel_x = ax;
        self.accel_y = ay;
        self.firing = firing;
        self.angle = angle;
    }

    /// Advance this player and its projectiles by `dt` seconds.
    /// Projectiles leaving the border die; the player is clamped.
    pub fn advance(
        &mut self,
        dt: f32,
        model: MovementModel,
        border: &WorldBorder,
    ) -> Result<(), EntityFault> {
        self.fire_cooldown = (self.fire_cooldown - dt).max(0.0);

        for projectile in self.projectiles.values_mut() {
            projectile.advance(dt);
            // NaN positions fail the containment check too
            if projectile.is_alive() && !border.contains(&projectile.motion) {
                projectile.kill();
            }
        }

        PhysicsSystem::advance_player(&mut self.motion, (self.accel_x, self.accel_y), model, dt);
        if !self.motion.is_finite() {
            return Err(EntityFault::NonFinite {
                username: self.username.clone(),
            });
        }
        border.clamp(&mut self.motion);
        Ok(())
    }

    /// Bring a faulted player back to a sane state
    pub fn recover(&mut self, border: &WorldBorder) {
        if !(self.motion.x.is_finite() && self.motion.y.is_finite()) {
            let (x, y) = border.center();
            self.motion = Motion::at(x, y);
        }
        self.motion.vel_x = 0.0;
        self.motion.vel_y = 0.0;
        self.accel_x = 0.0;
        self.accel_y = 0.0;
        border.clamp(&mut self.motion);
    }

    /// Spawn a projectile if the trigger is held and the weapon is ready.
    /// Returns the new projectile's id.
    pub fn try_fire(&mut self, stats: &WeaponStats) -> Option<u32> {
        if !self.is_alive() || !self.firing || self.fire_cooldown > 0.0 {
            return None;
        }
        let id = Projectile::next_id();
        self.add_projectile(Projectile::fire(id, &self.motion, self.angle, stats));
        self.fire_cooldown = stats.cooldown;
        Some(id)
    }

    pub fn add_projectile(&mut self, projectile: Projectile) {
        self.projectiles.insert(projectile.id, projectile);
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn projectile(&self, id: u32) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    pub fn kill_projectile(&mut self, id: u32) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.kill();
        }
    }

    /// Kill every projectile. Ones still `New` were never announced, so
    /// they are dropped outright instead of going out as a bare death.
    pub fn kill_all_projectiles(&mut self) {
        self.projectiles.retain(|_, p| match p.state {
            ProjectileState::New => false,
            ProjectileState::Updated | ProjectileState::Dead => {
                p.kill();
                true
            }
        });
    }

    /// Returns (new_health, killed)
    pub fn take_damage(&mut self, damage: u32) -> (u32, bool) {
        let (health, killed) = CombatSystem::apply_damage(self.health, damage);
        self.health = health;
        (health, killed)
    }

    /// Build this tick's delta records and advance every projectile past
    /// its announcement: `New` becomes `Updated`, `Dead` is dropped.
    pub fn take_projectile_deltas(&mut self) -> Vec<BulletInfo> {
        let deltas = self
            .projectiles
            .values()
            .map(|p| BulletInfo::for_state(&self.username, p))
            .collect();

        self.projectiles.retain(|_, p| match p.state.after_broadcast() {
            Some(next) => {
                p.state = next;
                true
            }
            None => false,
        });

        deltas
    }

    /// Full records of every live projectile, for a client that has none
    pub fn projectiles_as_new(&self) -> Vec<BulletInfo> {
        self.projectiles
            .values()
            .filter(|p| p.is_alive())
            .map(|p| BulletInfo::new_bullet(&self.username, p))
            .collect()
    }

    pub fn to_update(&self) -> ServerPlayerUpdate {
        ServerPlayerUpdate {
            player_name: self.username.clone(),
            pos_x: self.motion.x,
            pos_y: self.motion.y,
            angle: self.angle,
            health: self.health,
            score: self.score,
            firing: self.firing,
        }
    }

    /// Encode and send to this player only
    pub fn send(&self, msg: &ServerMsg) {
        match msg.encode() {
            Ok(text) => {
                send_if_open(self.connection.as_ref(), &text);
            }
            Err(e) => {
                warn!(username = %self.username, error = %e, "Failed to encode message");
            }
        }
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("username", &self.username)
            .field("name_state", &self.name_state)
            .field("motion", &self.motion)
            .field("health", &self.health)
            .field("score", &self.score)
            .field("connection", &self.connection.id())
            .finish_non_exhaustive()
    }
}
