//! Kinematics and movement integration

use std::str::FromStr;

/// Input acceleration magnitude applied per held direction key
pub const PLAYER_ACCELERATION: f32 = 300.0;

/// Speed cap for the momentum model
pub const PLAYER_MAX_SPEED: f32 = 400.0;

/// Per-second velocity retention on an axis with no input (momentum model)
pub const PLAYER_DRAG: f32 = 0.05;

/// Position and velocity shared by every simulated body
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

impl Motion {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vel_x.is_finite() && self.vel_y.is_finite()
    }

    /// position += velocity * dt
    pub fn integrate(&mut self, dt: f32) {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
    }

    pub fn distance_sq(&self, other: &Motion) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Latest movement keys held by a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveKeys {
    /// Acceleration derived from scratch: reset to zero, then each held key
    /// contributes. Opposing keys cancel out.
    pub fn acceleration(&self) -> (f32, f32) {
        let mut ax = 0.0;
        let mut ay = 0.0;
        if self.up {
            ay = -PLAYER_ACCELERATION;
        }
        if self.down {
            ay += PLAYER_ACCELERATION;
        }
        if self.left {
            ax = -PLAYER_ACCELERATION;
        }
        if self.right {
            ax += PLAYER_ACCELERATION;
        }
        (ax, ay)
    }
}

/// How a player's acceleration turns into displacement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MovementModel {
    /// Acceleration is this tick's velocity; nothing carries over.
    #[default]
    Direct,
    /// Acceleration accumulates into velocity, with drag and a speed cap.
    Momentum,
}

impl FromStr for MovementModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "momentum" => Ok(Self::Momentum),
            other => Err(format!("unknown movement model: {}", other)),
        }
    }
}

/// Physics system for advancing bodies
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance a player's motion one step
    pub fn advance_player(
        motion: &mut Motion,
        accel: (f32, f32),
        model: MovementModel,
        dt: f32,
    ) {
        let (ax, ay) = accel;
        match model {
            MovementModel::Direct => {
                motion.vel_x = ax;
                motion.vel_y = ay;
            }
            MovementModel::Momentum => {
                motion.vel_x = Self::accumulate(motion.vel_x, ax, dt);
                motion.vel_y = Self::accumulate(motion.vel_y, ay, dt);

                // Clamp to max speed
                let speed = (motion.vel_x * motion.vel_x + motion.vel_y * motion.vel_y).sqrt();
                if speed > PLAYER_MAX_SPEED {
                    let scale = PLAYER_MAX_SPEED / speed;
                    motion.vel_x *= scale;
                    motion.vel_y *= scale;
                }
            }
        }
        motion.integrate(dt);
    }

    fn accumulate(vel: f32, accel: f32, dt: f32) -> f32 {
        if accel == 0.0 {
            vel * PLAYER_DRAG.powf(dt)
        } else {
            vel + accel * dt
        }
    }

    /// Advance a projectile; its velocity never changes after firing
    pub fn advance_projectile(motion: &mut Motion, dt: f32) {
        motion.integrate(dt);
    }

    /// Circle/circle overlap test
    pub fn circles_overlap(a: &Motion, radius_a: f32, b: &Motion, radius_b: f32) -> bool {
        let combined = radius_a + radius_b;
        a.distance_sq(b) <= combined * combined
    }
}
