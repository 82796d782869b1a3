//! Glues the simulation crates together: turns a parsed parameter file
//! into a runnable pipeline and drives it to completion.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use simset_binner::{Axis, AxisSpec, Binner, HistoryMetadata, HistoryRecord, HistoryWriter, PhotonSample};
use simset_collimator::{CollimatorGeometry, CollimatorStats, GeometryConstants, HoleGeometry};
use simset_core::config::{AcquisitionMode, ParsedParams, SimConfig};
use simset_core::error::SimError;
use simset_core::geometry::{Cylinder, WorldGeometry};
use simset_core::math::{PcgRng, StreamKind};
use simset_decay::{DecayGenerator, DecayType};
use simset_object::{io as object_io, CoherentScatterTable, MaterialTable, Slice, VoxelizedObject};
use simset_productivity::ProductivityTable;
use simset_tracker::{
    annihilation_pair_directions, photons_per_decay, PhotonTracker, TrackOutcome, TrackerConfig, TrackingPhoton,
};
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Reads the object/activity index grids and partitions them into
/// `config.num_slices` equal axial slabs spanning the object cylinder's
/// bounding square, per `SubObjGetObjGeometry`'s binary payload
/// contract.
pub fn load_object(config: &SimConfig, materials: &MaterialTable) -> Result<VoxelizedObject, CliError> {
    let voxels_per_slice = (config.num_x_bins * config.num_y_bins) as usize;
    let total_voxels = voxels_per_slice * config.num_slices as usize;

    let attenuation = object_io::read_index_grid(Path::new(&config.object_index_file), total_voxels)?;
    let activity = object_io::read_index_grid(Path::new(&config.activity_index_file), total_voxels)?;

    let slice_depth = (config.object_z_max - config.object_z_min) / config.num_slices as f64;
    let half_width = config.object_radius;

    let slices = (0..config.num_slices as usize)
        .map(|i| {
            let start = i * voxels_per_slice;
            let end = start + voxels_per_slice;
            Slice {
                z_min: config.object_z_min + i as f64 * slice_depth,
                z_max: config.object_z_min + (i + 1) as f64 * slice_depth,
                x_min: config.object_center_x - half_width,
                x_max: config.object_center_x + half_width,
                y_min: config.object_center_y - half_width,
                y_max: config.object_center_y + half_width,
                num_x_bins: config.num_x_bins,
                num_y_bins: config.num_y_bins,
                attenuation_indices: attenuation[start..end].to_vec(),
                activity_indices: activity[start..end].to_vec(),
            }
        })
        .collect();

    let attenuation_translation = config
        .attenuation_translation_file
        .as_ref()
        .map(|path| object_io::read_translation_table(Path::new(path)))
        .transpose()?;
    let activity_translation = config
        .activity_translation_file
        .as_ref()
        .map(|path| object_io::read_translation_table(Path::new(path)))
        .transpose()?;

    Ok(VoxelizedObject::new(
        slices,
        materials.len(),
        attenuation_translation.as_deref(),
        activity_translation.as_deref(),
    )?)
}

/// Builds the productivity table: the degenerate single-bin table when
/// stratification is disabled, else a uniform stratification of
/// `config.productivity_bins` bins per slice. A real run would refine
/// `max_productivity` per bin with a one-pass attenuation estimate;
/// that estimator isn't implemented here, so every bin is seeded at
/// 1.0, which only affects sampling efficiency, not correctness.
pub fn build_productivity_table(config: &SimConfig, num_slices: usize) -> Result<ProductivityTable, CliError> {
    if !config.stratification_enabled {
        return Ok(ProductivityTable::disabled(num_slices)?);
    }
    let row = ProductivityTable::uniform_bins(config.productivity_bins, 1.0);
    Ok(ProductivityTable::new(vec![row; num_slices])?)
}

/// A parsed SPECT collimator section, read from raw parameter keys
/// rather than [`SimConfig`] since it's optional and specific to one
/// acquisition mode.
pub struct CollimatorSetup {
    pub geometry: CollimatorGeometry,
    pub constants: GeometryConstants,
}

fn parse_hole_geometry(raw: &str) -> Result<HoleGeometry, CliError> {
    match raw.to_ascii_lowercase().as_str() {
        "parallel" => Ok(HoleGeometry::Parallel),
        "fan" => Ok(HoleGeometry::Fan),
        "cone" => Ok(HoleGeometry::Cone),
        other => Err(SimError::Config(format!("unknown collimator_hole_geometry `{other}`")).into()),
    }
}

/// Builds the collimator stage from `collimator_*` parameter keys, or
/// `None` when `collimator_enabled` is absent or false.
pub fn build_collimator(params: &ParsedParams) -> Result<Option<CollimatorSetup>, CliError> {
    if !params.get_bool("collimator_enabled").unwrap_or(false) {
        return Ok(None);
    }

    let hole_geometry = parse_hole_geometry(
        &params.get_string("collimator_hole_geometry").unwrap_or_else(|| "parallel".to_string()),
    )?;
    let geometry = CollimatorGeometry::new(
        hole_geometry,
        params.get_real("collimator_radius_of_rotation").unwrap_or(30.0),
        params.get_real("collimator_thickness").unwrap_or(3.5),
        params.get_real("collimator_hole_radius").unwrap_or(0.05),
        params.get_real("collimator_septal_thickness").unwrap_or(0.02),
        params.get_real("collimator_focal_length").unwrap_or(0.0),
        params.get_real("collimator_z_min").unwrap_or(-20.0),
        params.get_real("collimator_z_max").unwrap_or(20.0),
        params.get_real("collimator_start_angle").unwrap_or(0.0),
        params.get_real("collimator_stop_angle").unwrap_or(std::f64::consts::TAU),
        params.get_int("collimator_num_views").unwrap_or(64) as u32,
    )?;
    let constants = GeometryConstants::derive(&geometry);

    Ok(Some(CollimatorSetup { geometry, constants }))
}

const AXIS_NAMES: &[(&str, Axis)] = &[
    ("z1", Axis::Z1),
    ("z2", Axis::Z2),
    ("energy1", Axis::Energy1),
    ("energy2", Axis::Energy2),
    ("td", Axis::Td),
    ("aa", Axis::Aa),
    ("tof", Axis::Tof),
    ("phi", Axis::Phi),
    ("theta", Axis::Theta),
    ("xr", Axis::Xr),
    ("yr", Axis::Yr),
    ("crystal1", Axis::Crystal1),
    ("crystal2", Axis::Crystal2),
    ("scatter1", Axis::Scatter1),
    ("scatter2", Axis::Scatter2),
    ("pa", Axis::Pa),
];

/// Builds the binner's axis configuration from `axis_<name>_{min,max,bins}`
/// triples; an axis not fully specified is left out of the image
/// entirely (the binner's axis set is a configurable subset of the full
/// sixteen).
pub fn build_axes(params: &ParsedParams) -> Vec<AxisSpec> {
    AXIS_NAMES
        .iter()
        .filter_map(|(name, axis)| {
            let min = params.get_real(&format!("axis_{name}_min"))?;
            let max = params.get_real(&format!("axis_{name}_max"))?;
            let bins = params.get_int(&format!("axis_{name}_bins"))? as u32;
            Some(AxisSpec::new(*axis, min, max, bins))
        })
        .collect()
}

fn world_geometry(config: &SimConfig) -> Result<WorldGeometry, CliError> {
    let target = Cylinder::new(config.target_radius, config.target_z_min, config.target_z_max, 0.0, 0.0)?;
    let object = Cylinder::new(
        config.object_radius,
        config.object_z_min,
        config.object_z_max,
        config.object_center_x,
        config.object_center_y,
    )?;
    Ok(WorldGeometry::new(target, object, config.acceptance_angle_deg)?)
}

fn tracker_config(config: &SimConfig) -> TrackerConfig {
    TrackerConfig {
        min_energy_kev: config.min_energy_kev,
        forced_detection_enabled: config.forced_detection_enabled,
        weight_window: simset_tracker::WeightWindow {
            min_ratio: config.weight_window_min_ratio,
            max_ratio: config.weight_window_max_ratio,
        },
    }
}

/// Read-only pipeline state shared by every decay stream.
struct SharedContext<'a> {
    config: &'a SimConfig,
    object: &'a VoxelizedObject,
    materials: &'a MaterialTable,
    coherent: &'a CoherentScatterTable,
    geometry: &'a WorldGeometry,
    productivity: &'a ProductivityTable,
    collimator: Option<&'a CollimatorSetup>,
}

/// Mutable sinks every stream contends for, each guarded independently
/// so one stream binning a photon doesn't block another mid-decay.
struct SharedSink {
    binner: Mutex<Binner<u32, f64>>,
    writer: Mutex<HistoryWriter>,
    stats: Mutex<CollimatorStats>,
}

struct DetectedPhoton {
    position: simset_core::geometry::Position,
    direction: simset_core::geometry::Direction,
    energy_kev: f64,
    weight: f64,
    scatter_count: u32,
    decay_time: f64,
    transaxial: Option<f64>,
    axial: Option<f64>,
}

fn run_stream(ctx: &SharedContext, sink: &SharedSink, run_seed: u64, stream_index: u64, cancel: &AtomicBool) {
    let seed = run_seed ^ stream_index;
    let mut decay_rng = PcgRng::for_stream(seed, StreamKind::Decay);
    let mut free_path_rng = PcgRng::for_stream(seed, StreamKind::FreePath);
    let mut collimator_rng = PcgRng::for_stream(seed, StreamKind::Collimator);
    // A separate stream for annihilation non-collinearity jitter: the
    // closure below already needs `free_path_rng`/`collimator_rng`
    // mutably and can't also re-borrow `decay_rng`, which `generate_slice`
    // holds mutably for the duration of the call.
    let mut annihilation_rng = PcgRng::for_stream(seed, StreamKind::Scatter);

    let decay_type = DecayType::from(ctx.config.acquisition_mode);
    let tracker = PhotonTracker::new(ctx.geometry, ctx.object, ctx.materials, ctx.coherent, tracker_config(ctx.config));

    let mut generator = DecayGenerator::new(
        ctx.object,
        ctx.productivity,
        ctx.config.source_mode,
        decay_type,
        ctx.config.scan_length,
        ctx.config.activity_scale,
        ctx.config.object_radius,
        ctx.config.object_center_x,
        ctx.config.object_center_y,
    );

    for slice_index in 0..ctx.object.num_slices() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let result = generator.generate_slice(slice_index, &mut decay_rng, |decay| {
            let directions = match decay.decay_type {
                DecayType::Positron => {
                    let (a, b) = annihilation_pair_directions(
                        decay.direction,
                        ctx.config.angular_jitter_mrad,
                        &mut annihilation_rng,
                    );
                    vec![a, b]
                }
                _ => vec![decay.direction],
            };
            debug_assert_eq!(directions.len() as u32, photons_per_decay(ctx.config.acquisition_mode));

            let mut tracked = Vec::with_capacity(directions.len());
            for direction in directions {
                let mut forced_events = Vec::new();
                match tracker.track(
                    decay.origin,
                    direction,
                    ctx.config.isotope_energy_kev,
                    decay.start_weight,
                    decay.decay_time,
                    &mut free_path_rng,
                    |forced| forced_events.push(forced),
                ) {
                    Ok(p) => tracked.push(p),
                    Err(err) => warn!(%err, "photon tracking failed"),
                }
                // Forced-detection copies already carry their
                // straight-path transmission weight; route them
                // downstream as if they had exited the target cylinder.
                tracked.extend(forced_events.into_iter().map(|event| TrackingPhoton {
                    position: event.position,
                    direction: event.direction,
                    energy_kev: event.energy_kev,
                    weight: event.weight,
                    scatter_count: event.scatter_count,
                    decay_time: decay.decay_time,
                    outcome: TrackOutcome::Exited,
                }));
            }

            let detected: Vec<DetectedPhoton> = if let Some(setup) = ctx.collimator {
                let mut stats = sink.stats.lock().unwrap();
                match simset_collimator::collimate_decay(
                    &tracked,
                    decay.start_weight,
                    &setup.geometry,
                    &setup.constants,
                    &mut collimator_rng,
                    &mut stats,
                ) {
                    Ok(events) => events
                        .into_iter()
                        .map(|e| DetectedPhoton {
                            position: e.position,
                            direction: e.direction,
                            energy_kev: e.energy_kev,
                            weight: e.weight,
                            scatter_count: e.scatter_count,
                            decay_time: e.decay_time,
                            transaxial: Some(e.transaxial_position),
                            axial: Some(e.axial_position),
                        })
                        .collect(),
                    Err(err) => {
                        warn!(%err, "collimation failed");
                        Vec::new()
                    }
                }
            } else {
                tracked
                    .iter()
                    .filter(|p| p.outcome == TrackOutcome::Exited)
                    .map(|p| DetectedPhoton {
                        position: p.position,
                        direction: p.direction,
                        energy_kev: p.energy_kev,
                        weight: p.weight,
                        scatter_count: p.scatter_count,
                        decay_time: p.decay_time,
                        transaxial: None,
                        axial: None,
                    })
                    .collect()
            };

            if detected.is_empty() {
                return;
            }

            let mut binner = sink.binner.lock().unwrap();
            let mut writer = sink.writer.lock().unwrap();
            for photon in detected {
                let sample = PhotonSample {
                    z1: Some(photon.position.z),
                    energy1: Some(photon.energy_kev),
                    td: Some(photon.decay_time),
                    xr: photon.transaxial,
                    yr: photon.axial,
                    scatter1: Some(photon.scatter_count as f64),
                    ..Default::default()
                };
                binner.record(&sample, photon.weight);

                if let Err(err) = writer.write_record(&HistoryRecord {
                    decay_time: photon.decay_time,
                    position_x: photon.position.x,
                    position_y: photon.position.y,
                    position_z: photon.position.z,
                    cosine_x: photon.direction.cos_x,
                    cosine_y: photon.direction.cos_y,
                    cosine_z: photon.direction.cos_z,
                    energy_kev: photon.energy_kev,
                    weight: photon.weight,
                    scatter_count: photon.scatter_count,
                }) {
                    warn!(%err, "failed to write history record");
                }
            }
            if writer.records_since_flush() >= 4096 {
                if let Err(err) = writer.flush() {
                    warn!(%err, "failed to flush history file");
                }
            }
        });

        if let Err(err) = result {
            warn!(%err, stream_index, slice_index, "decay generation failed");
            cancel.store(true, Ordering::Relaxed);
        }
    }
}

/// Runs the full pipeline: object/material/productivity loading,
/// parallel decay-stream generation and tracking, optional collimation,
/// and binning/history-file output.
pub fn run_simulation(config: &SimConfig, params: &ParsedParams, num_streams: usize) -> Result<(), CliError> {
    info!(num_decays = config.num_decays, num_slices = config.num_slices, "loading object");
    let mut materials = object_io::read_material_table(Path::new(&config.material_file))?;
    let coherent = match &config.coherent_table_file {
        Some(path) => object_io::read_coherent_table(Path::new(path))?,
        None => {
            materials = materials.with_coherent_disabled();
            CoherentScatterTable::new(vec![Vec::new(); materials.len().max(1)])
        }
    };
    let object = load_object(config, &materials)?;
    let productivity = build_productivity_table(config, object.num_slices())?;
    let geometry = world_geometry(config)?;
    let collimator = build_collimator(params)?;
    let axes = build_axes(params);

    if matches!(
        config.acquisition_mode,
        AcquisitionMode::PetCoincidence | AcquisitionMode::PetCoincidencePlusSingles
    ) {
        debug!("PET run: photon pairs share one decay time and annihilation point");
    }

    let ctx = SharedContext {
        config,
        object: &object,
        materials: &materials,
        coherent: &coherent,
        geometry: &geometry,
        productivity: &productivity,
        collimator: collimator.as_ref(),
    };

    let writer = HistoryWriter::create(
        Path::new(&config.history_file),
        HistoryMetadata {
            num_decays: config.num_decays as i32,
            isotope_energy_kev: config.isotope_energy_kev,
            run_seed: config.run_seed as i32,
        },
    )?;

    let sink = SharedSink {
        binner: Mutex::new(Binner::new(axes)),
        writer: Mutex::new(writer),
        stats: Mutex::new(CollimatorStats::default()),
    };

    let cancel = AtomicBool::new(false);
    let completed = AtomicU64::new(0);

    info!(num_streams, "starting decay streams");
    rayon::scope(|scope| {
        for stream_index in 0..num_streams as u64 {
            let ctx = &ctx;
            let sink = &sink;
            let cancel = &cancel;
            let completed = &completed;
            scope.spawn(move |_| {
                run_stream(ctx, sink, config.run_seed, stream_index, cancel);
                completed.fetch_add(1, Ordering::Relaxed);
            });
        }
    });

    sink.writer.into_inner().unwrap().flush()?;
    let stats = sink.stats.into_inner().unwrap();

    info!(
        streams_completed = completed.load(Ordering::Relaxed),
        prim_weight = stats.acc_prim_weight_sum,
        scat_weight = stats.acc_scat_weight_sum,
        "run complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simset_core::config::SourceMode;

    fn sample_config() -> SimConfig {
        SimConfig {
            target_radius: 20.0,
            target_z_min: -20.0,
            target_z_max: 20.0,
            object_radius: 10.0,
            object_z_min: -10.0,
            object_z_max: 10.0,
            object_center_x: 0.0,
            object_center_y: 0.0,
            acceptance_angle_deg: 90.0,
            source_mode: SourceMode::VoxelUniform,
            stratification_enabled: false,
            productivity_bins: 8,
            isotope_energy_kev: 511.0,
            run_seed: 1,
            num_decays: 1000,
            angular_jitter_mrad: 0.0,
            acquisition_mode: AcquisitionMode::Spect,
            scan_length: 1.0,
            object_index_file: "obj.idx".to_string(),
            activity_index_file: "act.idx".to_string(),
            material_file: "materials.txt".to_string(),
            history_file: "out.hist".to_string(),
            num_slices: 2,
            num_x_bins: 4,
            num_y_bins: 4,
            min_energy_kev: 0.0,
            forced_detection_enabled: false,
            weight_window_min_ratio: 0.0,
            weight_window_max_ratio: f64::INFINITY,
            activity_scale: 1.0,
            coherent_table_file: None,
            attenuation_translation_file: None,
            activity_translation_file: None,
        }
    }

    #[test]
    fn productivity_table_disabled_has_one_bin_per_slice() {
        let config = sample_config();
        let table = build_productivity_table(&config, 2).unwrap();
        assert_eq!(table.num_slices(), 2);
        assert_eq!(table.num_bins(), 1);
    }

    #[test]
    fn productivity_table_stratified_uses_configured_bin_count() {
        let mut config = sample_config();
        config.stratification_enabled = true;
        config.productivity_bins = 6;
        let table = build_productivity_table(&config, 3).unwrap();
        assert_eq!(table.num_bins(), 6);
    }

    #[test]
    fn collimator_absent_by_default() {
        let params = simset_core::config::parse_params("object_radius=10.0\n").unwrap();
        assert!(build_collimator(&params).unwrap().is_none());
    }

    #[test]
    fn collimator_builds_from_enabled_parameters() {
        let text = "\
collimator_enabled=true
collimator_hole_geometry=parallel
collimator_radius_of_rotation=30.0
collimator_thickness=3.5
collimator_hole_radius=0.05
collimator_septal_thickness=0.02
collimator_z_min=-20.0
collimator_z_max=20.0
collimator_num_views=64
";
        let params = simset_core::config::parse_params(text).unwrap();
        let setup = build_collimator(&params).unwrap().expect("collimator enabled");
        assert_eq!(setup.geometry.num_views, 64);
    }

    #[test]
    fn unknown_hole_geometry_is_rejected() {
        let text = "collimator_enabled=true\ncollimator_hole_geometry=spiral\n";
        let params = simset_core::config::parse_params(text).unwrap();
        assert!(build_collimator(&params).is_err());
    }

    #[test]
    fn axes_only_include_fully_specified_triples() {
        let text = "\
axis_z1_min=-20.0
axis_z1_max=20.0
axis_z1_bins=64
axis_energy1_min=0.0
axis_energy1_max=700.0
";
        let params = simset_core::config::parse_params(text).unwrap();
        let axes = build_axes(&params);
        assert_eq!(axes.len(), 1);
        assert_eq!(axes[0].axis, Axis::Z1);
    }
}
