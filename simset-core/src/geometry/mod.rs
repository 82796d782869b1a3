//! Positions, directions, and the cylinder geometry used to bound the
//! simulated world.

mod cylinder;
mod types;

pub use cylinder::{
    clip_to_limit, project_to_target_cylinder, will_intersect_critical_zone, Cylinder,
    CriticalZoneIntersection, WorldGeometry,
};
pub use types::{Direction, Position};
