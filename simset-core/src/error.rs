//! Error taxonomy shared by every crate in the simulation core.

use std::path::PathBuf;

/// A single, uniform error type for the whole simulation pipeline.
///
/// Construction-time errors (`ConfigError`, `IndexOutOfRange`,
/// `HeaderSizeMismatch`) are meant to abort the run with a diagnostic.
/// `HeaderElementNotFound` is the one kind callers are expected to catch
/// and substitute a default for on a hot path.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// File open/read/write/seek failure.
    #[error("io error at {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A parameter or table file was malformed.
    #[error("malformed {kind} file {path}: {detail}")]
    Format {
        /// What kind of file this was (e.g. "material attenuation").
        kind: &'static str,
        /// The file involved.
        path: PathBuf,
        /// Human-readable detail.
        detail: String,
    },

    /// A header field was not present. Recoverable: the caller should
    /// substitute the field's registered default.
    #[error("header element {0:#010x} not found")]
    HeaderElementNotFound(u32),

    /// A header field was found but its stored size did not match the
    /// size the caller expected. Indicates schema drift; fatal.
    #[error("header element {id:#010x} size mismatch: stored {stored}, expected {expected}")]
    HeaderSizeMismatch {
        /// The field id.
        id: u32,
        /// The size on disk.
        stored: u32,
        /// The size the caller asked for.
        expected: u32,
    },

    /// An index computed during construction fell outside its valid
    /// range (e.g. a translated tissue index >= table size).
    #[error("index out of range in {context}: {index} >= {bound}")]
    IndexOutOfRange {
        /// Where this was detected.
        context: &'static str,
        /// The offending index.
        index: u64,
        /// The exclusive upper bound.
        bound: u64,
    },

    /// A numeric computation produced an invalid result (non-unit
    /// direction, cosine outside [-1, 1], negative distance where one
    /// is not permitted).
    #[error("numeric error in {context}: {detail}")]
    Numeric {
        /// Where this was detected.
        context: &'static str,
        /// Human-readable detail.
        detail: String,
    },

    /// An inconsistent or out-of-bounds configuration was supplied
    /// (object larger than target, negative dimension, incompatible
    /// flags such as both point-source and line-source).
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience context wrapper: component → operation → field, as
/// specified for user-visible diagnostics.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// The component that raised the error, e.g. `"photon_tracker"`.
    pub component: &'static str,
    /// The operation in progress, e.g. `"free_path_sample"`.
    pub operation: &'static str,
    /// The field or parameter implicated, if any.
    pub field: Option<String>,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} -> {} -> {}", self.component, self.operation, field),
            None => write!(f, "{} -> {}", self.component, self.operation),
        }
    }
}

/// Result alias used throughout the simulation core.
pub type SimResult<T> = Result<T, SimError>;
