//! Photon tracker: advances a photon through the voxelized object via
//! Woodcock free-path sampling, applies Compton/coherent scattering,
//! forced detection, and weight-window variance reduction, until the
//! photon exits the target cylinder, is absorbed, or is terminated.

use simset_core::config::AcquisitionMode;
use simset_core::error::SimResult;
use simset_core::geometry::{Direction, Position, WorldGeometry};
use simset_core::math::{rotate_about_direction, Rng};
use simset_object::{MaterialTable, VoxelizedObject};

mod forced_detection;
mod step;
mod weight_window;

pub use forced_detection::ForcedDetectionEvent;
pub use weight_window::WeightWindow;

/// Hard cap on scatter events per photon (`ColTypes.h: COL_MAX_SCATTERS`).
pub const MAX_SCATTERS: u32 = 9;

/// Electron rest mass energy, keV, used in the Compton energy-shift
/// formula.
const ELECTRON_REST_ENERGY_KEV: f64 = 511.0;

/// A photon's disposition once tracking concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Exited the target cylinder and should be delivered downstream.
    Exited,
    /// Absorbed in a photoelectric interaction.
    Absorbed,
    /// Drifted out of the limit cylinder without reaching the target.
    LeftLimitCylinder,
    /// Energy fell below the configured minimum.
    BelowMinimumEnergy,
}

/// A photon at (or past) the target cylinder face, or at its point of
/// termination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingPhoton {
    pub position: Position,
    pub direction: Direction,
    pub energy_kev: f64,
    pub weight: f64,
    pub scatter_count: u32,
    pub decay_time: f64,
    pub outcome: TrackOutcome,
}

/// Physics and variance-reduction parameters governing one tracker run.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub min_energy_kev: f64,
    pub forced_detection_enabled: bool,
    pub weight_window: WeightWindow,
}

/// Tracks decays emitted under a given acquisition mode into zero, one,
/// or two tracked photons.
pub struct PhotonTracker<'a> {
    geometry: &'a WorldGeometry,
    object: &'a VoxelizedObject,
    materials: &'a MaterialTable,
    coherent: &'a simset_object::CoherentScatterTable,
    config: TrackerConfig,
}

impl<'a> PhotonTracker<'a> {
    pub fn new(
        geometry: &'a WorldGeometry,
        object: &'a VoxelizedObject,
        materials: &'a MaterialTable,
        coherent: &'a simset_object::CoherentScatterTable,
        config: TrackerConfig,
    ) -> Self {
        Self {
            geometry,
            object,
            materials,
            coherent,
            config,
        }
    }

    /// Tracks a single emitted photon, invoking `on_forced_detection`
    /// for every forced-detection copy produced along the way (spec
    /// §4.7: "emit a copy to the binner while the real photon continues
    /// to be tracked").
    pub fn track(
        &self,
        origin: Position,
        direction: Direction,
        energy_kev: f64,
        start_weight: f64,
        decay_time: f64,
        rng: &mut impl Rng,
        mut on_forced_detection: impl FnMut(ForcedDetectionEvent),
    ) -> SimResult<TrackingPhoton> {
        let mut state = step::PhotonState {
            position: origin,
            direction,
            energy_kev,
            weight: start_weight,
            scatter_count: 0,
        };

        loop {
            let outcome = step::advance_to_interaction(
                &mut state,
                self.geometry,
                self.object,
                self.materials,
                rng,
            )?;

            match outcome {
                step::StepOutcome::ExitedTarget => {
                    return Ok(TrackingPhoton {
                        position: state.position,
                        direction: state.direction,
                        energy_kev: state.energy_kev,
                        weight: state.weight,
                        scatter_count: state.scatter_count,
                        decay_time,
                        outcome: TrackOutcome::Exited,
                    });
                }
                step::StepOutcome::LeftLimitCylinder => {
                    return Ok(TrackingPhoton {
                        position: state.position,
                        direction: state.direction,
                        energy_kev: state.energy_kev,
                        weight: state.weight,
                        scatter_count: state.scatter_count,
                        decay_time,
                        outcome: TrackOutcome::LeftLimitCylinder,
                    });
                }
                step::StepOutcome::Interaction => {
                    if state.scatter_count >= MAX_SCATTERS {
                        return Ok(TrackingPhoton {
                            position: state.position,
                            direction: state.direction,
                            energy_kev: state.energy_kev,
                            weight: state.weight,
                            scatter_count: state.scatter_count,
                            decay_time,
                            outcome: TrackOutcome::Absorbed,
                        });
                    }

                    let indices = self.object.position_to_indices(state.position);
                    let slice = self.object.slice(indices.slice_index as usize)?;
                    let mat_index = slice.attenuation_index(indices.x_index, indices.y_index)?;
                    let material = self.materials.get(mat_index as usize)?;

                    let prob_scatter = material.prob_scatter(state.energy_kev);
                    let u_interaction = rng.uniform();

                    let scattered = if u_interaction < prob_scatter {
                        true
                    } else if self.config.forced_detection_enabled {
                        // Forced non-absorption: photoelectric becomes a
                        // weight multiplier applied to a guaranteed
                        // scatter rather than killing the photon.
                        state.weight *= prob_scatter;
                        true
                    } else {
                        false
                    };

                    if !scattered {
                        return Ok(TrackingPhoton {
                            position: state.position,
                            direction: state.direction,
                            energy_kev: state.energy_kev,
                            weight: state.weight,
                            scatter_count: state.scatter_count,
                            decay_time,
                            outcome: TrackOutcome::Absorbed,
                        });
                    }

                    let prob_compton = material.prob_compton_given_scatter(state.energy_kev);
                    let is_compton = rng.uniform() < prob_compton;

                    if is_compton {
                        self.apply_compton_scatter(&mut state, rng);
                    } else {
                        self.apply_coherent_scatter(&mut state, mat_index as usize, rng)?;
                    }
                    state.scatter_count += 1;

                    if state.energy_kev < self.config.min_energy_kev {
                        return Ok(TrackingPhoton {
                            position: state.position,
                            direction: state.direction,
                            energy_kev: state.energy_kev,
                            weight: state.weight,
                            scatter_count: state.scatter_count,
                            decay_time,
                            outcome: TrackOutcome::BelowMinimumEnergy,
                        });
                    }

                    if self.config.forced_detection_enabled {
                        if let Some(event) = forced_detection::forced_detect(
                            &state,
                            self.geometry,
                            self.object,
                            self.materials,
                        )? {
                            on_forced_detection(event);
                        }
                    }

                    weight_window::apply(&mut state, start_weight, &self.config.weight_window, rng);
                }
            }
        }
    }

    fn apply_compton_scatter(&self, state: &mut step::PhotonState, rng: &mut impl Rng) {
        let cos_theta = sample_klein_nishina_cos_theta(state.energy_kev, rng);
        let phi = 2.0 * std::f64::consts::PI * rng.uniform();
        state.direction = rotate_about_direction(state.direction, cos_theta, phi);
        state.energy_kev =
            state.energy_kev / (1.0 + (state.energy_kev / ELECTRON_REST_ENERGY_KEV) * (1.0 - cos_theta));
    }

    fn apply_coherent_scatter(
        &self,
        state: &mut step::PhotonState,
        material_index: usize,
        rng: &mut impl Rng,
    ) -> SimResult<()> {
        let cos_theta = self.coherent.sample_cos_theta(material_index, state.energy_kev, rng)?;
        let phi = 2.0 * std::f64::consts::PI * rng.uniform();
        state.direction = rotate_about_direction(state.direction, cos_theta, phi);
        Ok(())
    }
}

/// Samples the Klein-Nishina scatter angle cosine via rejection
/// sampling against the differential cross-section, the standard
/// approach for a distribution with no closed-form inverse CDF.
fn sample_klein_nishina_cos_theta(energy_kev: f64, rng: &mut impl Rng) -> f64 {
    let alpha = energy_kev / ELECTRON_REST_ENERGY_KEV;
    loop {
        let cos_theta = 2.0 * rng.uniform() - 1.0;
        let ratio = 1.0 / (1.0 + alpha * (1.0 - cos_theta));
        let klein_nishina = ratio * ratio * (ratio + 1.0 / ratio - (1.0 - cos_theta * cos_theta));
        // Normalized against the distribution's maximum, attained at
        // cos_theta = 1 where ratio = 1 and the bracket reduces to 2.
        if rng.uniform() * 2.0 <= klein_nishina {
            return cos_theta;
        }
    }
}

/// Produces the pair of back-to-back photon directions for a PET
/// positron decay, optionally perturbed by a non-collinearity angle
/// (a Gaussian-distributed deviation from exactly 180 degrees, modelling
/// residual positron momentum at annihilation).
pub fn annihilation_pair_directions(
    primary: Direction,
    non_collinearity_mrad: f64,
    rng: &mut impl Rng,
) -> (Direction, Direction) {
    if non_collinearity_mrad <= 0.0 {
        return (primary, primary.reversed());
    }
    let sigma = non_collinearity_mrad / 1000.0;
    let u1 = rng.uniform();
    let u2 = rng.uniform();
    let jitter = sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    let opposite = rotate_about_direction(primary.reversed(), jitter.cos(), 0.0);
    (primary, opposite)
}

/// Determines whether `mode` produces one or two annihilation photons
/// per decay.
pub fn photons_per_decay(mode: AcquisitionMode) -> u32 {
    match mode {
        AcquisitionMode::Spect => 1,
        AcquisitionMode::PetCoincidence | AcquisitionMode::PetCoincidencePlusSingles => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simset_core::geometry::Cylinder;
    use simset_core::math::{PcgRng, StreamKind};
    use simset_object::{Material, MaterialTable, Slice};

    fn uniform_object() -> VoxelizedObject {
        let slice = Slice {
            z_min: -20.0,
            z_max: 20.0,
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

    fn water_table() -> MaterialTable {
        let water = Material::new(
            "water",
            1.0,
            7.42,
            18.0,
            vec![simset_object::material::EnergyRow {
                energy_kev: 511.0,
                mu: 0.096,
                prob_scatter: 0.5,
                prob_compton_given_scatter: 1.0,
            }],
        )
        .unwrap();
        MaterialTable::new(vec![water])
    }

    fn geometry() -> WorldGeometry {
        let target = Cylinder::new(10.0, -20.0, 20.0, 0.0, 0.0).unwrap();
        let object = Cylinder::new(10.0, -20.0, 20.0, 0.0, 0.0).unwrap();
        WorldGeometry::new(target, object, 90.0).unwrap()
    }

    #[test]
    fn photon_exits_or_terminates() {
        let geometry = geometry();
        let object = uniform_object();
        let materials = water_table();
        let coherent = simset_object::CoherentScatterTable::new(vec![Vec::new()]);
        let config = TrackerConfig {
            min_energy_kev: 50.0,
            forced_detection_enabled: false,
            weight_window: WeightWindow::disabled(),
        };
        let tracker = PhotonTracker::new(&geometry, &object, &materials, &coherent, config);
        let mut rng = PcgRng::for_stream(1, StreamKind::FreePath);

        let result = tracker
            .track(
                Position::new(0.0, 0.0, 0.0),
                Direction::new(1.0, 0.0, 0.0).unwrap(),
                511.0,
                1.0,
                0.0,
                &mut rng,
                |_| {},
            )
            .unwrap();

        assert!(matches!(
            result.outcome,
            TrackOutcome::Exited | TrackOutcome::Absorbed | TrackOutcome::BelowMinimumEnergy
        ));
        assert!(result.scatter_count <= MAX_SCATTERS);
    }

    #[test]
    fn photons_per_decay_matches_acquisition_mode() {
        assert_eq!(photons_per_decay(AcquisitionMode::Spect), 1);
        assert_eq!(photons_per_decay(AcquisitionMode::PetCoincidence), 2);
    }

    #[test]
    fn annihilation_pair_without_jitter_is_exactly_opposite() {
        let mut rng = PcgRng::for_stream(1, StreamKind::Decay);
        let primary = Direction::new(0.0, 0.0, 1.0).unwrap();
        let (a, b) = annihilation_pair_directions(primary, 0.0, &mut rng);
        assert_eq!(a, primary);
        assert_eq!(b, primary.reversed());
    }
}
