//! Combat system - projectiles, damage, scoring

use std::sync::atomic::{AtomicU32, Ordering};

use super::physics::{Motion, PhysicsSystem};

/// Health every player spawns with
pub const MAX_HEALTH: u32 = 100;

/// Player hitbox radius (matches the client's drawn circle)
pub const PLAYER_RADIUS: f32 = 32.0;

/// Updated and dead records carry only the id, so ids are unique
/// world-wide rather than per owner.
static NEXT_PROJECTILE_ID: AtomicU32 = AtomicU32::new(1);

/// Weapon stats shared by every player
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: u32,
    /// Projectile speed
    pub projectile_speed: f32,
    /// Cooldown between shots (seconds)
    pub cooldown: f32,
    /// Projectile hitbox radius
    pub projectile_radius: f32,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self {
            damage: 10,
            projectile_speed: 800.0,
            cooldown: 0.2,
            projectile_radius: 5.0,
        }
    }
}

/// Where a projectile is in its broadcast lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileState {
    /// Spawned this tick, not yet announced
    New,
    /// Announced at least once
    Updated,
    /// Will be announced once more, then removed
    Dead,
}

impl ProjectileState {
    /// Wire code used by the client
    pub fn code(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Updated => 1,
            Self::Dead => 2,
        }
    }

    /// State after the projectile has been announced, `None` once it is gone
    pub fn after_broadcast(self) -> Option<Self> {
        match self {
            Self::New | Self::Updated => Some(Self::Updated),
            Self::Dead => None,
        }
    }
}

/// Projectile owned by one player
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u32,
    pub motion: Motion,
    pub damage: u32,
    pub radius: f32,
    pub state: ProjectileState,
}

impl Projectile {
    pub fn next_id() -> u32 {
        NEXT_PROJECTILE_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// Fire from `origin` along `angle` (radians)
    pub fn fire(id: u32, origin: &Motion, angle: f32, stats: &WeaponStats) -> Self {
        let (sin, cos) = angle.sin_cos();
        // Spawn at the edge of the shooter's hitbox
        let offset = PLAYER_RADIUS + stats.projectile_radius;
        Self {
            id,
            motion: Motion {
                x: origin.x + cos * offset,
                y: origin.y + sin * offset,
                vel_x: cos * stats.projectile_speed,
                vel_y: sin * stats.projectile_speed,
            },
            damage: stats.damage,
            radius: stats.projectile_radius,
            state: ProjectileState::New,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state != ProjectileState::Dead
    }

    pub fn kill(&mut self) {
        self.state = ProjectileState::Dead;
    }

    /// Advance the projectile; dead projectiles stay put
    pub fn advance(&mut self, dt: f32) {
        if self.is_alive() {
            PhysicsSystem::advance_projectile(&mut self.motion, dt);
        }
    }
}

/// Combat rules
pub struct CombatSystem;

impl CombatSystem {
    /// Apply damage to health, returns (new_health, is_dead). Floors at zero.
    pub fn apply_damage(current_health: u32, damage: u32) -> (u32, bool) {
        let new_health = current_health.saturating_sub(damage);
        (new_health, new_health == 0)
    }

    /// Points a killer takes from the victim: a tenth, rounded down
    pub fn kill_reward(victim_score: u32) -> u32 {
        victim_score / 10
    }
}
