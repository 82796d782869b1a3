//! Position and direction primitives.

use crate::error::{SimError, SimResult};

/// A point in the world coordinate system (cm).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate (axial).
    pub z: f64,
}

impl Position {
    /// Creates a new position.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Advances this position by `dist` along `dir`.
    pub fn advance(&self, dir: Direction, dist: f64) -> Position {
        Position::new(
            self.x + dist * dir.cos_x,
            self.y + dist * dir.cos_y,
            self.z + dist * dir.cos_z,
        )
    }

    /// Squared radial distance from `(center_x, center_y)`.
    pub fn radial_dist_sq(&self, center_x: f64, center_y: f64) -> f64 {
        (self.x - center_x).powi(2) + (self.y - center_y).powi(2)
    }
}

/// A unit direction vector, expressed as direction cosines.
///
/// Invariant: `cos_x^2 + cos_y^2 + cos_z^2 == 1` within `1e-7`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    /// Direction cosine along x.
    pub cos_x: f64,
    /// Direction cosine along y.
    pub cos_y: f64,
    /// Direction cosine along z.
    pub cos_z: f64,
}

impl Direction {
    /// Builds a direction from raw cosines, validating the unit-norm
    /// invariant within `1e-7`.
    pub fn new(cos_x: f64, cos_y: f64, cos_z: f64) -> SimResult<Self> {
        let norm_sq = cos_x * cos_x + cos_y * cos_y + cos_z * cos_z;
        if (norm_sq - 1.0).abs() > 1e-7 {
            return Err(SimError::Numeric {
                context: "Direction::new",
                detail: format!("norm^2 = {norm_sq} deviates from 1.0 by more than 1e-7"),
            });
        }
        Ok(Self {
            cos_x,
            cos_y,
            cos_z,
        })
    }

    /// Builds a direction from raw cosines without validating the norm,
    /// for call sites that have already guaranteed it (e.g. immediately
    /// after a trigonometric construction). Debug builds still assert.
    pub fn new_unchecked(cos_x: f64, cos_y: f64, cos_z: f64) -> Self {
        debug_assert!(
            ((cos_x * cos_x + cos_y * cos_y + cos_z * cos_z) - 1.0).abs() <= 1e-6,
            "Direction::new_unchecked invariant violated"
        );
        Self {
            cos_x,
            cos_y,
            cos_z,
        }
    }

    /// The direction pointing along +z, used as a default emission axis
    /// before rotation.
    pub const Z_AXIS: Direction = Direction {
        cos_x: 0.0,
        cos_y: 0.0,
        cos_z: 1.0,
    };

    /// Returns the direction with every cosine negated.
    pub fn reversed(&self) -> Direction {
        Direction {
            cos_x: -self.cos_x,
            cos_y: -self.cos_y,
            cos_z: -self.cos_z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_unit_direction() {
        assert!(Direction::new(1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn accepts_unit_direction() {
        assert!(Direction::new(1.0, 0.0, 0.0).is_ok());
    }
}
