//! Collimator hole geometry and the constants `grfsetup` derives from
//! it: the hexagonal-close-pack cell area and the per-axis `k1/k2/k3`
//! coefficients that `response::geometric_response` uses to turn a
//! projected detector-plane intercept into a point-spread weight.

use simset_core::error::{SimError, SimResult};

/// The three hole shapes SimSET's UNC collimator model supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleGeometry {
    /// Holes bored parallel to the collimator's face normal.
    Parallel,
    /// Holes converge to a line focus in one transaxial direction only.
    Fan,
    /// Holes converge to a point focus (both axes).
    Cone,
}

/// Physical description of a SPECT collimator, as supplied by a run's
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollimatorGeometry {
    pub hole_geometry: HoleGeometry,
    /// Distance from the axis of rotation to the collimator's front
    /// face, cm.
    pub radius_of_rotation: f64,
    /// Collimator thickness, cm.
    pub thickness: f64,
    /// Hole radius, cm.
    pub hole_radius: f64,
    /// Septal (wall) thickness between adjacent holes, cm.
    pub septal_thickness: f64,
    /// Focal length, cm. Ignored for `Parallel`.
    pub focal_length: f64,
    pub z_min: f64,
    pub z_max: f64,
    /// View angular range, radians.
    pub start_angle: f64,
    pub stop_angle: f64,
    /// Number of discrete detector views spanning `[start_angle, stop_angle]`.
    pub num_views: u32,
}

impl CollimatorGeometry {
    pub fn new(
        hole_geometry: HoleGeometry,
        radius_of_rotation: f64,
        thickness: f64,
        hole_radius: f64,
        septal_thickness: f64,
        focal_length: f64,
        z_min: f64,
        z_max: f64,
        start_angle: f64,
        stop_angle: f64,
        num_views: u32,
    ) -> SimResult<Self> {
        if radius_of_rotation <= 0.0 || thickness <= 0.0 || hole_radius <= 0.0 {
            return Err(SimError::Config(
                "collimator radius of rotation, thickness and hole radius must be positive".to_string(),
            ));
        }
        if z_min >= z_max {
            return Err(SimError::Config(format!(
                "collimator zMin ({z_min}) must be less than zMax ({z_max})"
            )));
        }
        if num_views == 0 {
            return Err(SimError::Config("collimator must have at least one view".to_string()));
        }
        if hole_geometry != HoleGeometry::Parallel && focal_length <= 0.0 {
            return Err(SimError::Config(
                "fan and cone collimators require a positive focal length".to_string(),
            ));
        }
        Ok(Self {
            hole_geometry,
            radius_of_rotation,
            thickness,
            hole_radius,
            septal_thickness,
            focal_length,
            z_min,
            z_max,
            start_angle,
            stop_angle,
            num_views,
        })
    }
}

/// Constants `grfsetup` computes once from a [`CollimatorGeometry`] and
/// reuses for every photon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryConstants {
    /// Distance from the origin of rotation to the back of the
    /// collimator (`RadiusOfRotation + Thickness`).
    pub dist_origin_to_back: f64,
    /// Area of one hexagonal-close-packed hole cell.
    pub cell_unit_area: f64,
    pub k1y: f64,
    pub k2y: f64,
    pub k3y: f64,
    pub k1z: f64,
    pub k2z: f64,
    pub k3z: f64,
    /// Half-angle within which a photon can plausibly strike a view,
    /// `atan(2 * hole_radius / thickness)`.
    pub acceptance_angle: f64,
    pub range_of_det_angles: f64,
}

impl GeometryConstants {
    pub fn derive(geometry: &CollimatorGeometry) -> Self {
        let t = geometry.thickness;
        let f = geometry.focal_length;

        let (k1y, k2y, k3y, k1z, k2z, k3z) = match geometry.hole_geometry {
            HoleGeometry::Parallel => (t, 0.0, t, t, 0.0, t),
            HoleGeometry::Fan => {
                let k1y = f * t / (t + f);
                let k2y = t / (f + t);
                let k3y = t * (t + f) / (f + t);
                (k1y, k2y, k3y, t, 0.0, t)
            }
            HoleGeometry::Cone => {
                let k1 = f * t / (t + f);
                let k2 = t / (f + t);
                let k3 = t * (t + f) / (f + t);
                (k1, k2, k3, k1, k2, k3)
            }
        };

        Self {
            dist_origin_to_back: geometry.radius_of_rotation + t,
            cell_unit_area: 2.0 * 3.0_f64.sqrt() * (geometry.hole_radius + geometry.septal_thickness).powi(2),
            k1y,
            k2y,
            k3y,
            k1z,
            k2z,
            k3z,
            acceptance_angle: (2.0 * geometry.hole_radius / t).atan(),
            range_of_det_angles: geometry.stop_angle - geometry.start_angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parallel() -> CollimatorGeometry {
        CollimatorGeometry::new(HoleGeometry::Parallel, 30.0, 3.5, 0.05, 0.02, 0.0, -20.0, 20.0, 0.0, std::f64::consts::TAU, 120).unwrap()
    }

    #[test]
    fn parallel_k_constants_match_thickness() {
        let c = GeometryConstants::derive(&parallel());
        assert_eq!(c.k1y, 3.5);
        assert_eq!(c.k2y, 0.0);
        assert_eq!(c.k3y, 3.5);
        assert_eq!(c.k1z, c.k1y);
    }

    #[test]
    fn fan_z_axis_behaves_like_parallel() {
        let geometry = CollimatorGeometry::new(
            HoleGeometry::Fan, 30.0, 3.5, 0.05, 0.02, 60.0, -20.0, 20.0, 0.0, std::f64::consts::TAU, 120,
        )
        .unwrap();
        let c = GeometryConstants::derive(&geometry);
        assert_eq!(c.k1z, 3.5);
        assert_eq!(c.k2z, 0.0);
        assert!(c.k1y != c.k1z);
    }

    #[test]
    fn cone_shares_formula_across_axes() {
        let geometry = CollimatorGeometry::new(
            HoleGeometry::Cone, 30.0, 3.5, 0.05, 0.02, 60.0, -20.0, 20.0, 0.0, std::f64::consts::TAU, 120,
        )
        .unwrap();
        let c = GeometryConstants::derive(&geometry);
        assert_eq!(c.k1y, c.k1z);
        assert_eq!(c.k2y, c.k2z);
        assert_eq!(c.k3y, c.k3z);
    }

    #[test]
    fn fan_and_cone_require_focal_length() {
        assert!(CollimatorGeometry::new(HoleGeometry::Fan, 30.0, 3.5, 0.05, 0.02, 0.0, -20.0, 20.0, 0.0, 1.0, 120).is_err());
    }

    #[test]
    fn cell_unit_area_is_hex_close_pack() {
        let c = GeometryConstants::derive(&parallel());
        let expected = 2.0 * 3.0_f64.sqrt() * (0.05 + 0.02_f64).powi(2);
        assert!((c.cell_unit_area - expected).abs() < 1e-12);
    }
}
