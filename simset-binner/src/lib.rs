//! Multidimensional image accumulation and the history-file sink,
//! ported from SimSET's binning module: every detected photon
//! contributes to exactly one bin across a configurable set of axes,
//! or is silently dropped if any axis value falls out of range.

pub mod axis;
pub mod binner;
pub mod element;
pub mod history;
pub mod image;
pub mod sample;

pub use axis::{Axis, AxisSpec};
pub use binner::Binner;
pub use element::BinElement;
pub use history::{HistoryMetadata, HistoryRecord, HistoryWriter};
pub use image::Image;
pub use sample::PhotonSample;
