//! Rotation of a unit direction by a polar/azimuthal offset about itself.

use crate::geometry::Direction;

/// Returns a unit direction that makes angle `acos(cos_theta)` with `dir`
/// and has azimuth `phi` about `dir`.
///
/// This is the standard scatter-direction construction used after a
/// Compton or coherent interaction: `dir` is the incoming photon
/// direction, `cos_theta` the sampled scatter cosine, and `phi` the
/// sampled azimuth.
///
/// * `dir`       - The axis to rotate about.
/// * `cos_theta` - Cosine of the angle between `dir` and the result.
/// * `phi`       - Azimuth about `dir`, in radians.
pub fn rotate_about_direction(dir: Direction, cos_theta: f64, phi: f64) -> Direction {
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let cos_phi = phi.cos();
    let sin_phi = phi.sin();

    // Build an orthonormal frame (u, v, dir) with dir as the polar axis,
    // choosing u so it is well-conditioned even when dir is near an axis.
    let (ux, uy, uz) = if dir.cos_z.abs() < 0.99999 {
        let inv_len = 1.0 / (dir.cos_x * dir.cos_x + dir.cos_y * dir.cos_y).sqrt();
        (-dir.cos_y * inv_len, dir.cos_x * inv_len, 0.0)
    } else {
        // dir is (nearly) along z; use x as the reference axis instead.
        (1.0, 0.0, 0.0)
    };
    // v = dir x u
    let vx = dir.cos_y * uz - dir.cos_z * uy;
    let vy = dir.cos_z * ux - dir.cos_x * uz;
    let vz = dir.cos_x * uy - dir.cos_y * ux;

    let new_x = sin_theta * cos_phi * ux + sin_theta * sin_phi * vx + cos_theta * dir.cos_x;
    let new_y = sin_theta * cos_phi * uy + sin_theta * sin_phi * vy + cos_theta * dir.cos_y;
    let new_z = sin_theta * cos_phi * uz + sin_theta * sin_phi * vz + cos_theta * dir.cos_z;

    // Renormalize defensively: floating point error in the frame
    // construction can drift the norm by a few ULPs over many scatters.
    let norm = (new_x * new_x + new_y * new_y + new_z * new_z).sqrt();
    Direction::new_unchecked(new_x / norm, new_y / norm, new_z / norm)
}
