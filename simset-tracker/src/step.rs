//! Single Woodcock free-path step: sample a candidate interaction
//! distance against the table-wide maximum attenuation, advance, and
//! either accept a real interaction or exit the target/limit cylinders.

use simset_core::error::SimResult;
use simset_core::geometry::{project_to_target_cylinder, Direction, Position, WorldGeometry};
use simset_core::math::Rng;
use simset_object::{MaterialTable, VoxelizedObject};

/// Mutable photon state threaded through the tracking loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonState {
    pub position: Position,
    pub direction: Direction,
    pub energy_kev: f64,
    pub weight: f64,
    pub scatter_count: u32,
}

/// What happened at the end of one Woodcock step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Candidate path crossed the target cylinder's surface.
    ExitedTarget,
    /// Candidate path left the limit cylinder without reaching target.
    LeftLimitCylinder,
    /// A real interaction was accepted at the candidate point.
    Interaction,
}

fn max_mu(materials: &MaterialTable, energy_kev: f64) -> f64 {
    materials
        .materials()
        .iter()
        .map(|m| m.mu(energy_kev))
        .fold(0.0_f64, f64::max)
}

/// Advances `state` by repeated Woodcock draws until a real interaction
/// is accepted or the photon leaves the target or limit cylinder.
pub fn advance_to_interaction(
    state: &mut PhotonState,
    geometry: &WorldGeometry,
    object: &VoxelizedObject,
    materials: &MaterialTable,
    rng: &mut impl Rng,
) -> SimResult<StepOutcome> {
    loop {
        let mu_max = max_mu(materials, state.energy_kev);
        if mu_max <= 0.0 {
            return match project_to_target_cylinder(&geometry.target, state.position, state.direction) {
                Some((surface_pos, _)) => {
                    state.position = surface_pos;
                    Ok(StepOutcome::ExitedTarget)
                }
                None => Ok(StepOutcome::LeftLimitCylinder),
            };
        }

        let u = rng.uniform();
        let free_path = -u.ln() / mu_max;
        let candidate = state.position.advance(state.direction, free_path);

        let outside_target = !geometry.target.contains_radially(candidate)
            || candidate.z < geometry.target.z_min
            || candidate.z > geometry.target.z_max;

        if outside_target {
            return match project_to_target_cylinder(&geometry.target, state.position, state.direction) {
                Some((surface_pos, _)) => {
                    state.position = surface_pos;
                    Ok(StepOutcome::ExitedTarget)
                }
                None => {
                    state.position = candidate;
                    Ok(StepOutcome::LeftLimitCylinder)
                }
            };
        }

        let outside_limit = !geometry.limit.contains_radially(candidate)
            || candidate.z < geometry.limit.z_min
            || candidate.z > geometry.limit.z_max;

        if outside_limit {
            state.position = candidate;
            return Ok(StepOutcome::LeftLimitCylinder);
        }

        state.position = candidate;

        let indices = object.position_to_indices(candidate);
        let slice = object.slice(indices.slice_index as usize)?;
        let mat_index = slice.attenuation_index(indices.x_index, indices.y_index)?;
        let material = materials.get(mat_index as usize)?;
        let mu_local = material.mu(state.energy_kev);

        if rng.uniform() < mu_local / mu_max {
            return Ok(StepOutcome::Interaction);
        }
        // Virtual collision: keep the advanced position and loop again.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simset_core::geometry::Cylinder;
    use simset_core::math::{PcgRng, StreamKind};
    use simset_object::{Material, Slice};

    fn geometry() -> WorldGeometry {
        let target = Cylinder::new(10.0, -10.0, 10.0, 0.0, 0.0).unwrap();
        let object = Cylinder::new(10.0, -10.0, 10.0, 0.0, 0.0).unwrap();
        WorldGeometry::new(target, object, 90.0).unwrap()
    }

    fn object() -> VoxelizedObject {
        let slice = Slice {
            z_min: -10.0,
            z_max: 10.0,
            x_min: -10.0,
            x_max: 10.0,
            y_min: -10.0,
            y_max: 10.0,
            num_x_bins: 1,
            num_y_bins: 1,
            attenuation_indices: vec![0],
            activity_indices: vec![1],
        };
        VoxelizedObject::without_translation(vec![slice], 1).unwrap()
    }

    fn vacuum_table() -> MaterialTable {
        MaterialTable::new(vec![Material::new(
            "vacuum",
            0.0,
            0.0,
            0.0,
            vec![simset_object::material::EnergyRow {
                energy_kev: 511.0,
                mu: 0.0,
                prob_scatter: 0.0,
                prob_compton_given_scatter: 0.0,
            }],
        )
        .unwrap()])
    }

    #[test]
    fn vacuum_always_exits_target() {
        let geometry = geometry();
        let object = object();
        let materials = vacuum_table();
        let mut rng = PcgRng::for_stream(1, StreamKind::FreePath);
        let mut state = PhotonState {
            position: Position::new(0.0, 0.0, 0.0),
            direction: Direction::new(1.0, 0.0, 0.0).unwrap(),
            energy_kev: 511.0,
            weight: 1.0,
            scatter_count: 0,
        };
        let outcome = advance_to_interaction(&mut state, &geometry, &object, &materials, &mut rng).unwrap();
        assert_eq!(outcome, StepOutcome::ExitedTarget);
        assert!((state.position.x - 10.0).abs() < 1e-7);
    }
}
