//! Parameter-file parsing and the immutable run configuration.
//!
//! The original simulator threaded a large tree of mutable global
//! parameters through every module. Per the redesign noted in
//! `DESIGN.md`, those globals collapse here into one [`SimConfig`],
//! built once from a parameter file and handed out by shared reference
//! for the rest of the run.

mod paramfile;

pub use paramfile::{parse as parse_params, ParamValue, ParsedParams};

use thiserror::Error;

/// How decay positions are sampled within the object (spec source-mode
/// family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Sample uniformly among voxels weighted by activity.
    VoxelUniform,
    /// All decays originate from a single fixed point.
    PointSource,
    /// All decays originate on a line segment parallel to the object axis.
    LineSource,
}

/// Which acquisition the run simulates, determining the decay type the
/// generator emits (`PhgEn_SinglePhoton` / `PhgEn_Positron` family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// SPECT: one gamma photon per decay.
    Spect,
    /// PET: a positron annihilation per decay.
    PetCoincidence,
    /// PET with singles events also recorded.
    PetCoincidencePlusSingles,
}

/// Validation failures building a [`SimConfig`] (spec.md §7 taxonomy).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("object cylinder radius ({object_radius}) exceeds target cylinder radius ({target_radius})")]
    ObjectLargerThanTarget { object_radius: f64, target_radius: f64 },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("object cylinder is not centered/square: xMin={x_min}, xMax={x_max}, yMin={y_min}, yMax={y_max}")]
    ObjectCylinderNotCenteredSquare {
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    },

    #[error("source mode {mode:?} is incompatible with stratification-disabled mode")]
    IncompatibleSourceModeAndStratification { mode: SourceMode },

    #[error("point-source and line-source flags cannot both be set")]
    PointAndLineSourceBothSet,

    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("parameter `{name}` has invalid value `{value}`: {detail}")]
    InvalidValue {
        name: String,
        value: String,
        detail: String,
    },
}

/// The complete, immutable configuration for one simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub target_radius: f64,
    pub target_z_min: f64,
    pub target_z_max: f64,
    pub object_radius: f64,
    pub object_z_min: f64,
    pub object_z_max: f64,
    pub object_center_x: f64,
    pub object_center_y: f64,
    pub acceptance_angle_deg: f64,
    pub source_mode: SourceMode,
    pub stratification_enabled: bool,
    pub productivity_bins: u32,
    pub isotope_energy_kev: f64,
    pub run_seed: u64,
    pub num_decays: u64,
    /// Gaussian-distributed angular jitter, in milliradians, applied at
    /// emission. Defaults to 0.0 (no jitter), preserving the legacy
    /// behaviour when the parameter is absent.
    pub angular_jitter_mrad: f64,
    pub acquisition_mode: AcquisitionMode,
    /// Length of the simulated acquisition, in seconds; decay
    /// timestamps are drawn uniformly across this span.
    pub scan_length: f64,
    pub object_index_file: String,
    pub activity_index_file: String,
    pub material_file: String,
    pub history_file: String,
    /// Number of axial slices the voxelized object is divided into,
    /// each spanning an equal fraction of `[object_z_min, object_z_max]`.
    pub num_slices: u32,
    /// Transaxial voxel grid resolution per slice; the grid spans the
    /// object cylinder's bounding square.
    pub num_x_bins: u32,
    pub num_y_bins: u32,
    /// Photon energy, keV, below which the tracker terminates a photon
    /// rather than continuing to scatter it. Defaults to 0.0 (no floor).
    pub min_energy_kev: f64,
    /// Enables the forced-non-absorption / forced-detection variance
    /// reduction path in the tracker.
    pub forced_detection_enabled: bool,
    /// Lower bound of the weight-window band, as a multiple of a
    /// photon's starting weight. Defaults to 0.0 (no lower bound).
    pub weight_window_min_ratio: f64,
    /// Upper bound of the weight-window band. Defaults to infinity (no
    /// upper bound).
    pub weight_window_max_ratio: f64,
    /// Scales expected decay counts per voxel/angle-bin cell; rolls up
    /// the legacy decays-per-curie and per-bin time factors into one
    /// multiplier. Defaults to 1.0.
    pub activity_scale: f64,
    /// Path to the list-of-files coherent angular distribution table.
    /// When absent, coherent scatter is disabled and every material's
    /// probability table is collapsed onto Compton alone.
    pub coherent_table_file: Option<String>,
    /// Path to the attenuation-index file-local -> table-local
    /// translation table. When absent, attenuation indices are used
    /// as-is.
    pub attenuation_translation_file: Option<String>,
    /// Path to the activity-index file-local -> table-local translation
    /// table. When absent, activity indices are used as-is.
    pub activity_translation_file: Option<String>,
}

impl SimConfig {
    /// Validates cross-field invariants not enforceable by parsing
    /// alone, returning every rule violated rather than stopping at the
    /// first one so a user can fix a parameter file in one pass.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.object_radius > self.target_radius {
            errors.push(ConfigError::ObjectLargerThanTarget {
                object_radius: self.object_radius,
                target_radius: self.target_radius,
            });
        }
        if self.target_radius <= 0.0 {
            errors.push(ConfigError::NonPositive {
                field: "target_radius",
                value: self.target_radius,
            });
        }
        if self.object_radius <= 0.0 {
            errors.push(ConfigError::NonPositive {
                field: "object_radius",
                value: self.object_radius,
            });
        }
        if self.productivity_bins == 0 {
            errors.push(ConfigError::NonPositive {
                field: "productivity_bins",
                value: self.productivity_bins as f64,
            });
        }
        for (field, value) in [
            ("num_slices", self.num_slices),
            ("num_x_bins", self.num_x_bins),
            ("num_y_bins", self.num_y_bins),
        ] {
            if value == 0 {
                errors.push(ConfigError::NonPositive { field, value: value as f64 });
            }
        }
        if self.activity_scale <= 0.0 {
            errors.push(ConfigError::NonPositive {
                field: "activity_scale",
                value: self.activity_scale,
            });
        }
        if self.min_energy_kev < 0.0 {
            errors.push(ConfigError::NonPositive {
                field: "min_energy_kev",
                value: self.min_energy_kev,
            });
        }

        let x_min = self.object_center_x - self.object_radius;
        let x_max = self.object_center_x + self.object_radius;
        let y_min = self.object_center_y - self.object_radius;
        let y_max = self.object_center_y + self.object_radius;
        if (x_min + x_max).abs() > 1e-7 || (y_min + y_max).abs() > 1e-7 {
            errors.push(ConfigError::ObjectCylinderNotCenteredSquare {
                x_min,
                x_max,
                y_min,
                y_max,
            });
        }

        if !self.stratification_enabled
            && matches!(self.source_mode, SourceMode::PointSource | SourceMode::LineSource)
        {
            errors.push(ConfigError::IncompatibleSourceModeAndStratification { mode: self.source_mode });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds and validates a configuration from already-parsed
    /// key/value parameters.
    pub fn from_parsed(params: &ParsedParams) -> Result<Self, Vec<ConfigError>> {
        let cfg = Self {
            target_radius: params.require_real("target_radius")?,
            target_z_min: params.require_real("target_z_min")?,
            target_z_max: params.require_real("target_z_max")?,
            object_radius: params.require_real("object_radius")?,
            object_z_min: params.require_real("object_z_min")?,
            object_z_max: params.require_real("object_z_max")?,
            object_center_x: params.get_real("object_center_x").unwrap_or(0.0),
            object_center_y: params.get_real("object_center_y").unwrap_or(0.0),
            acceptance_angle_deg: params.get_real("acceptance_angle_deg").unwrap_or(90.0),
            source_mode: parse_source_mode(params)?,
            stratification_enabled: params.get_bool("stratification_enabled").unwrap_or(true),
            productivity_bins: params.get_int("productivity_bins").unwrap_or(32) as u32,
            isotope_energy_kev: params.require_real("isotope_energy_kev")?,
            run_seed: params.get_int("run_seed").unwrap_or(1) as u64,
            num_decays: params.require_int("num_decays")? as u64,
            angular_jitter_mrad: params.get_real("angular_jitter_mrad").unwrap_or(0.0),
            acquisition_mode: parse_acquisition_mode(params)?,
            scan_length: params.get_real("scan_length").unwrap_or(1.0),
            object_index_file: params.require_string("object_index_file")?,
            activity_index_file: params.require_string("activity_index_file")?,
            material_file: params.require_string("material_file")?,
            history_file: params.require_string("history_file")?,
            num_slices: params.get_int("num_slices").unwrap_or(1) as u32,
            num_x_bins: params.get_int("num_x_bins").unwrap_or(1) as u32,
            num_y_bins: params.get_int("num_y_bins").unwrap_or(1) as u32,
            min_energy_kev: params.get_real("min_energy_kev").unwrap_or(0.0),
            forced_detection_enabled: params.get_bool("forced_detection_enabled").unwrap_or(false),
            weight_window_min_ratio: params.get_real("weight_window_min_ratio").unwrap_or(0.0),
            weight_window_max_ratio: params.get_real("weight_window_max_ratio").unwrap_or(f64::INFINITY),
            activity_scale: params.get_real("activity_scale").unwrap_or(1.0),
            coherent_table_file: params.get_string("coherent_table_file"),
            attenuation_translation_file: params.get_string("attenuation_translation_file"),
            activity_translation_file: params.get_string("activity_translation_file"),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Parses a parameter file's text and builds a validated [`SimConfig`]
/// from it in one step.
pub fn load(text: &str) -> Result<SimConfig, Vec<ConfigError>> {
    let params = parse_params(text)?;
    SimConfig::from_parsed(&params)
}

fn parse_acquisition_mode(params: &ParsedParams) -> Result<AcquisitionMode, Vec<ConfigError>> {
    let mode = params.get_string("acquisition_mode").unwrap_or_else(|| "spect".to_string());
    match mode.to_ascii_lowercase().as_str() {
        "spect" => Ok(AcquisitionMode::Spect),
        "pet_coincidence" => Ok(AcquisitionMode::PetCoincidence),
        "pet_coincidence_plus_singles" => Ok(AcquisitionMode::PetCoincidencePlusSingles),
        other => Err(vec![ConfigError::InvalidValue {
            name: "acquisition_mode".to_string(),
            value: other.to_string(),
            detail: "expected spect, pet_coincidence, or pet_coincidence_plus_singles".to_string(),
        }]),
    }
}

fn parse_source_mode(params: &ParsedParams) -> Result<SourceMode, Vec<ConfigError>> {
    let point = params.get_bool("point_source").unwrap_or(false);
    let line = params.get_bool("line_source").unwrap_or(false);
    if point && line {
        return Err(vec![ConfigError::PointAndLineSourceBothSet]);
    }
    Ok(if point {
        SourceMode::PointSource
    } else if line {
        SourceMode::LineSource
    } else {
        SourceMode::VoxelUniform
    })
}

// `ParsedParams::require_*` return a single-element `Vec<ConfigError>`
// on failure so callers collecting multiple errors can always `?` into
// the same `Result<_, Vec<ConfigError>>` shape as `validate`.
impl From<ConfigError> for Vec<ConfigError> {
    fn from(e: ConfigError) -> Self {
        vec![e]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params_text() -> String {
        "\
target_radius=20.0
target_z_min=-20.0
target_z_max=20.0
object_radius=10.0
object_z_min=-10.0
object_z_max=10.0
isotope_energy_kev=511.0
num_decays=1000000
object_index_file=obj.idx
activity_index_file=act.idx
material_file=materials.txt
history_file=out.hist
"
        .to_string()
    }

    fn base_params() -> ParsedParams {
        paramfile::parse(&base_params_text()).unwrap()
    }

    #[test]
    fn valid_config_builds() {
        let params = base_params();
        let cfg = SimConfig::from_parsed(&params).unwrap();
        assert_eq!(cfg.source_mode, SourceMode::VoxelUniform);
        assert!(cfg.stratification_enabled);
    }

    #[test]
    fn object_larger_than_target_is_rejected() {
        let mut text = String::from("object_radius=30.0\n");
        text.push_str(
            "target_radius=20.0\ntarget_z_min=-20.0\ntarget_z_max=20.0\n\
             object_z_min=-10.0\nobject_z_max=10.0\nisotope_energy_kev=511.0\n\
             num_decays=1\nobject_index_file=o\nactivity_index_file=a\n\
             material_file=m\nhistory_file=h\n",
        );
        let params = paramfile::parse(&text).unwrap();
        let errors = SimConfig::from_parsed(&params).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::ObjectLargerThanTarget { .. })));
    }

    #[test]
    fn point_and_line_source_conflict() {
        let mut params = base_params();
        params.insert_bool("point_source", true);
        params.insert_bool("line_source", true);
        let errors = SimConfig::from_parsed(&params).unwrap_err();
        assert!(matches!(errors[0], ConfigError::PointAndLineSourceBothSet));
    }

    #[test]
    fn missing_required_parameter_is_reported() {
        let params = paramfile::parse("target_radius=20.0\n").unwrap();
        assert!(SimConfig::from_parsed(&params).is_err());
    }

    #[test]
    fn translation_and_coherent_table_paths_default_to_absent() {
        let params = base_params();
        let cfg = SimConfig::from_parsed(&params).unwrap();
        assert!(cfg.coherent_table_file.is_none());
        assert!(cfg.attenuation_translation_file.is_none());
        assert!(cfg.activity_translation_file.is_none());
    }

    #[test]
    fn translation_and_coherent_table_paths_are_parsed_when_present() {
        let mut text = base_params_text();
        text.push_str(
            "coherent_table_file=coh.lst\nattenuation_translation_file=att.tr\nactivity_translation_file=act.tr\n",
        );
        let params = paramfile::parse(&text).unwrap();
        let cfg = SimConfig::from_parsed(&params).unwrap();
        assert_eq!(cfg.coherent_table_file.as_deref(), Some("coh.lst"));
        assert_eq!(cfg.attenuation_translation_file.as_deref(), Some("att.tr"));
        assert_eq!(cfg.activity_translation_file.as_deref(), Some("act.tr"));
    }

    #[test]
    fn acquisition_mode_defaults_to_spect() {
        let params = base_params();
        let cfg = SimConfig::from_parsed(&params).unwrap();
        assert_eq!(cfg.acquisition_mode, AcquisitionMode::Spect);
        assert_eq!(cfg.scan_length, 1.0);
    }

    #[test]
    fn unknown_acquisition_mode_is_rejected() {
        let mut params = base_params();
        params.insert_scalar("acquisition_mode", "not_a_mode");
        assert!(SimConfig::from_parsed(&params).is_err());
    }
}
