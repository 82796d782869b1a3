//! Cylinder geometry: the Target, Object, Limit and Critical Zone
//! cylinders and the ray intersection/clipping routines that operate on
//! them, ported from `CylPos.c`.

use crate::error::{SimError, SimResult};
use crate::geometry::types::{Direction, Position};
use crate::math::{reals_equal, solve_quadratic};

/// A z-axis-aligned cylinder: radius, axial extent, and a (possibly
/// off-axis) (x, y) center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    /// Radius, strictly positive.
    pub radius: f64,
    /// Minimum z (axial) bound.
    pub z_min: f64,
    /// Maximum z (axial) bound.
    pub z_max: f64,
    /// Center x coordinate.
    pub center_x: f64,
    /// Center y coordinate.
    pub center_y: f64,
}

impl Cylinder {
    /// Builds a cylinder, validating `radius > 0` and `z_min < z_max`.
    pub fn new(radius: f64, z_min: f64, z_max: f64, center_x: f64, center_y: f64) -> SimResult<Self> {
        if radius <= 0.0 {
            return Err(SimError::Config(format!(
                "cylinder radius must be positive, got {radius}"
            )));
        }
        if z_min >= z_max {
            return Err(SimError::Config(format!(
                "cylinder zMin ({z_min}) must be less than zMax ({z_max})"
            )));
        }
        Ok(Self {
            radius,
            z_min,
            z_max,
            center_x,
            center_y,
        })
    }

    /// Axial length.
    pub fn axial_length(&self) -> f64 {
        (self.z_max - self.z_min).abs()
    }

    /// True if `pos` lies inside (or on) this cylinder's radius,
    /// ignoring axial extent.
    pub fn contains_radially(&self, pos: Position) -> bool {
        pos.radial_dist_sq(self.center_x, self.center_y) <= self.radius * self.radius
    }

    /// Distance from `pos` along `dir` to this cylinder's curved
    /// surface, per `CylPosCalcDistanceToCylSurface`: solves
    /// `a = 1 - cosZ^2`, `b = 2(x cosX + y cosY)`,
    /// `c = x^2 + y^2 - r^2` and returns the larger root when two exist
    /// (the photon is inside, exiting forward), otherwise the lone root.
    pub fn distance_to_surface(&self, pos: Position, dir: Direction) -> f64 {
        let x = pos.x - self.center_x;
        let y = pos.y - self.center_y;
        let a = 1.0 - dir.cos_z * dir.cos_z;
        let b = 2.0 * (x * dir.cos_x + y * dir.cos_y);
        let c = x * x + y * y - self.radius * self.radius;

        let (num_roots, min_root, max_root) = solve_quadratic(a, b, c);
        match num_roots {
            2 => max_root,
            1 => min_root,
            _ => f64::NAN,
        }
    }

    /// Projects `pos` along `dir` to this cylinder's curved surface.
    ///
    /// Returns `None` when `dir` is parallel to the axis (`cos_z` within
    /// `1e-7` of `+/-1`), matching `CylPosProjectToCylinder`'s edge case.
    /// Otherwise returns the surface position and the travelled
    /// distance (which may be negative if the surface lies behind
    /// `pos` along `dir`).
    pub fn project(&self, pos: Position, dir: Direction) -> Option<(Position, f64)> {
        if reals_equal(dir.cos_z, 1.0, -7, 0.0) || reals_equal(dir.cos_z, -1.0, -7, 0.0) {
            return None;
        }
        let dist = self.distance_to_surface(pos, dir);
        if dist.is_nan() {
            return None;
        }
        Some((pos.advance(dir, dist), dist))
    }
}

/// Intersection of a photon path with the critical zone, mirroring
/// `PHG_Intersection` from the original design.
#[derive(Debug, Clone, Copy)]
pub struct CriticalZoneIntersection {
    /// Distance to enter the zone (0 if already inside).
    pub dist_to_enter: f64,
    /// Distance to exit the zone.
    pub dist_to_exit: f64,
    /// Position at entry.
    pub starting_position: Position,
    /// Position at exit.
    pub final_position: Position,
    /// Direction the photon is travelling (unchanged by this test).
    pub direction: Direction,
}

/// Clips `pos` to the limit cylinder, advancing it backward along `dir`
/// when it lies outside the radius, per `CylPosClipToLimitCylinder`.
/// Further shrinks the travel distance when the projected z would exit
/// through a cap. `pos` is always left on or inside the limit cylinder
/// on return.
pub fn clip_to_limit(limit: &Cylinder, pos: &mut Position, dir: Direction) {
    let radial_sq = (pos.x - limit.center_x).powi(2) + (pos.y - limit.center_y).powi(2);
    if radial_sq <= limit.radius * limit.radius {
        return;
    }

    let mut dist_to_surface = limit.distance_to_surface(*pos, dir);
    let projected_z = pos.z + dist_to_surface * dir.cos_z;

    if projected_z > limit.z_max {
        let ratio = (limit.z_max - pos.z) / (dist_to_surface * dir.cos_z);
        dist_to_surface *= ratio;
    } else if projected_z < limit.z_min {
        let ratio = (limit.z_min - pos.z) / (dist_to_surface * dir.cos_z);
        dist_to_surface *= ratio;
    }

    *pos = pos.advance(dir, dist_to_surface);
}

/// Projects a photon to the target cylinder, returning the surface
/// position and distance if the projected axial position is within the
/// target's z-range, per `CylPosProjectToTargetCylinder`.
pub fn project_to_target_cylinder(
    target: &Cylinder,
    pos: Position,
    dir: Direction,
) -> Option<(Position, f64)> {
    let (projected, dist) = target.project(pos, dir)?;
    if projected.z < target.z_min || projected.z > target.z_max {
        None
    } else {
        Some((projected, dist))
    }
}

fn within_zone_radius(zone: &Cylinder, pos: Position) -> bool {
    let nx = (pos.x - zone.center_x) / zone.radius;
    let ny = (pos.y - zone.center_y) / zone.radius;
    nx * nx + ny * ny <= 1.0
}

/// Determines whether a photon's path will intersect the critical zone,
/// following `CylPosWillIntersectCritZone`'s four-case structure:
/// already inside, below moving up, above moving down, or moving
/// in-plane (handled by cylindrical projection). Per the documented
/// deviation from the legacy debug-assertion policy (spec §9 open
/// question), any computed negative distance is treated as "no
/// intersection" rather than being asserted against.
pub fn will_intersect_critical_zone(
    zone: &Cylinder,
    pos: Position,
    dir: Direction,
) -> Option<CriticalZoneIntersection> {
    if reals_equal(dir.cos_z.abs(), 1.0, -7, 0.0) {
        return None;
    }

    let (dist_to_enter, starting_position, will_intersect) = if pos.z >= zone.z_min && pos.z <= zone.z_max {
        (0.0, pos, true)
    } else if pos.z < zone.z_min && dir.cos_z > 0.0 {
        let dist = (zone.z_min - pos.z) / dir.cos_z;
        let entry = Position::new(pos.x + dist * dir.cos_x, pos.y + dist * dir.cos_y, zone.z_min);
        (dist, entry, within_zone_radius(zone, entry))
    } else if pos.z > zone.z_max && dir.cos_z < 0.0 {
        let dist = (zone.z_max - pos.z) / dir.cos_z;
        let entry = Position::new(pos.x + dist * dir.cos_x, pos.y + dist * dir.cos_y, zone.z_max);
        (dist, entry, within_zone_radius(zone, entry))
    } else {
        (0.0, pos, false)
    };

    if !will_intersect || dist_to_enter < 0.0 {
        return None;
    }

    let (dist_to_exit, final_position) = if dir.cos_z < 0.0 {
        let dist = (zone.z_min - pos.z) / dir.cos_z;
        let exit = Position::new(pos.x + dist * dir.cos_x, pos.y + dist * dir.cos_y, zone.z_min);
        if within_zone_radius(zone, exit) {
            (dist, exit)
        } else {
            match zone.project(pos, dir) {
                Some((p, d)) => (d, p),
                None => return None,
            }
        }
    } else if dir.cos_z > 0.0 {
        let dist = (zone.z_max - pos.z) / dir.cos_z;
        let exit = Position::new(pos.x + dist * dir.cos_x, pos.y + dist * dir.cos_y, zone.z_max);
        if within_zone_radius(zone, exit) {
            (dist, exit)
        } else {
            match zone.project(pos, dir) {
                Some((p, d)) => (d, p),
                None => return None,
            }
        }
    } else {
        match zone.project(pos, dir) {
            Some((p, d)) => (d, p),
            None => return None,
        }
    };

    if dist_to_exit < 0.0 || dist_to_exit < dist_to_enter {
        return None;
    }

    Some(CriticalZoneIntersection {
        dist_to_enter,
        dist_to_exit,
        starting_position,
        final_position,
        direction: dir,
    })
}

/// The four named cylinders composing the world geometry (spec §3).
#[derive(Debug, Clone)]
pub struct WorldGeometry {
    /// The volume from which photons may be emitted and tracked.
    pub target: Cylinder,
    /// The activity/attenuation volume.
    pub object: Cylinder,
    /// The smallest cylinder enclosing Target and Object.
    pub limit: Cylinder,
    /// The sub-region of Object used for importance computation.
    pub critical_zone: Cylinder,
}

impl WorldGeometry {
    /// Builds the world geometry from a target and object cylinder,
    /// deriving the limit cylinder (`CylPosInitLimitCylinder`) and the
    /// critical zone (`CylPosInitCriticalZone`, non-cone-beam case).
    ///
    /// `acceptance_angle_deg` is the PET acceptance angle or SPECT
    /// parallel/fan acceptance angle in degrees; pass `90.0` to clip the
    /// critical zone to the object's full axial extent.
    pub fn new(target: Cylinder, object: Cylinder, acceptance_angle_deg: f64) -> SimResult<Self> {
        if object.radius > target.radius {
            return Err(SimError::Config(format!(
                "object cylinder radius ({}) exceeds target cylinder radius ({})",
                object.radius, target.radius
            )));
        }

        let limit = Cylinder {
            radius: object.radius.max(target.radius),
            z_min: object.z_min.min(target.z_min),
            z_max: object.z_max.max(target.z_max),
            center_x: object.center_x,
            center_y: object.center_y,
        };

        let (mut zone_min, mut zone_max) = if acceptance_angle_deg != 90.0 {
            let extend = acceptance_angle_deg.to_radians().tan() * (target.radius + object.radius);
            (target.z_min - extend, target.z_max + extend)
        } else {
            (object.z_min, object.z_max)
        };
        zone_min = zone_min.max(object.z_min);
        zone_max = zone_max.min(object.z_max);

        let critical_zone = Cylinder {
            radius: object.radius,
            z_min: zone_min,
            z_max: zone_max,
            center_x: object.center_x,
            center_y: object.center_y,
        };

        Ok(Self {
            target,
            object,
            limit,
            critical_zone,
        })
    }

    /// True if `pos` is outside the object cylinder's radius
    /// (`CylPosIsOutsideObjCylinder`).
    pub fn is_outside_object(&self, pos: Position) -> bool {
        !self.object.contains_radially(pos)
    }
}
