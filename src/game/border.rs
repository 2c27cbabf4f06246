//! Rectangular world border

use super::physics::Motion;

/// Fixed world extent `[0, width] x [0, height]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBorder {
    pub width: f32,
    pub height: f32,
}

impl Default for WorldBorder {
    fn default() -> Self {
        Self::new(4000.0, 4000.0)
    }
}

impl WorldBorder {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pull a body back inside the border, zeroing any velocity that
    /// points further out.
    pub fn clamp(&self, motion: &mut Motion) {
        if motion.x < 0.0 {
            motion.x = 0.0;
            motion.vel_x = motion.vel_x.max(0.0);
        } else if motion.x > self.width {
            motion.x = self.width;
            motion.vel_x = motion.vel_x.min(0.0);
        }

        if motion.y < 0.0 {
            motion.y = 0.0;
            motion.vel_y = motion.vel_y.max(0.0);
        } else if motion.y > self.height {
            motion.y = self.height;
            motion.vel_y = motion.vel_y.min(0.0);
        }
    }

    pub fn contains(&self, motion: &Motion) -> bool {
        (0.0..=self.width).contains(&motion.x) && (0.0..=self.height).contains(&motion.y)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_bodies_inside() {
        let border = WorldBorder::default();
        let cases = [
            (-10.0, 50.0),
            (4010.0, 50.0),
            (50.0, -0.5),
            (50.0, 9000.0),
            (-1.0, -1.0),
            (4001.0, 4001.0),
            (2000.0, 2000.0),
        ];
        for (x, y) in cases {
            let mut motion = Motion {
                x,
                y,
                vel_x: 5.0,
                vel_y: -5.0,
            };
            border.clamp(&mut motion);
            assert!(border.contains(&motion), "({}, {}) escaped", x, y);
        }
    }

    #[test]
    fn clamp_zeroes_only_outward_velocity() {
        let border = WorldBorder::new(100.0, 100.0);

        let mut motion = Motion {
            x: -5.0,
            y: 150.0,
            vel_x: -20.0,
            vel_y: 30.0,
        };
        border.clamp(&mut motion);
        assert_eq!((motion.x, motion.y), (0.0, 100.0));
        assert_eq!((motion.vel_x, motion.vel_y), (0.0, 0.0));

        // Already heading back in: velocity survives
        let mut returning = Motion {
            x: -5.0,
            y: 50.0,
            vel_x: 20.0,
            vel_y: 0.0,
        };
        border.clamp(&mut returning);
        assert_eq!(returning.vel_x, 20.0);
    }

    #[test]
    fn edges_count_as_inside() {
        let border = WorldBorder::new(100.0, 100.0);
        assert!(border.contains(&Motion::at(0.0, 100.0)));
        assert!(!border.contains(&Motion::at(100.1, 50.0)));
    }
}
