//! Rotation into the detector-aligned frame: after `rotate_into_detector_frame`,
//! the detector's face normal is `+x` and the collimator's rotation
//! axis is still `z`, matching `xform`.

use simset_core::geometry::{Direction, Position};

/// Rotates `pos`/`dir` about the z axis by `-detector_angle` so the
/// detector normal lands on `+x`.
pub fn rotate_into_detector_frame(pos: Position, dir: Direction, detector_angle: f64) -> (Position, Direction) {
    let (sin_a, cos_a) = detector_angle.sin_cos();

    let x = pos.x * cos_a + pos.y * sin_a;
    let y = -pos.x * sin_a + pos.y * cos_a;
    let rotated_pos = Position::new(x, y, pos.z);

    let cos_x = dir.cos_x * cos_a + dir.cos_y * sin_a;
    let cos_y = -dir.cos_x * sin_a + dir.cos_y * cos_a;
    let rotated_dir = Direction::new_unchecked(cos_x, cos_y, dir.cos_z);

    (rotated_pos, rotated_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_angle_is_identity() {
        let pos = Position::new(1.0, 2.0, 3.0);
        let dir = Direction::new(0.6, 0.8, 0.0).unwrap();
        let (p, d) = rotate_into_detector_frame(pos, dir, 0.0);
        assert!((p.x - 1.0).abs() < 1e-12 && (p.y - 2.0).abs() < 1e-12);
        assert!((d.cos_x - 0.6).abs() < 1e-12 && (d.cos_y - 0.8).abs() < 1e-12);
    }

    #[test]
    fn quarter_turn_swaps_axes() {
        let pos = Position::new(1.0, 0.0, 0.0);
        let dir = Direction::new(1.0, 0.0, 0.0).unwrap();
        let (p, d) = rotate_into_detector_frame(pos, dir, std::f64::consts::FRAC_PI_2);
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - (-1.0)).abs() < 1e-9);
        assert!(d.cos_x.abs() < 1e-9);
        assert!((d.cos_y - (-1.0)).abs() < 1e-9);
    }
}
