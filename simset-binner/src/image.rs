//! A flat, row-major multidimensional image over a fixed set of axes.

use simset_core::error::{SimError, SimResult};

use crate::axis::AxisSpec;
use crate::element::{cast_contribution, BinElement};

/// One accumulator buffer shaped by `axes`. [`crate::binner::Binner`]
/// keeps three of these (counts, weights, weights squared) sharing the
/// same shape.
#[derive(Debug, Clone)]
pub struct Image<T: BinElement> {
    axes: Vec<AxisSpec>,
    strides: Vec<usize>,
    data: Vec<T>,
}

fn strides_for(axes: &[AxisSpec]) -> (Vec<usize>, usize) {
    let mut strides = vec![0usize; axes.len()];
    let mut running = 1usize;
    for (i, axis) in axes.iter().enumerate().rev() {
        strides[i] = running;
        running *= axis.num_bins as usize;
    }
    (strides, running)
}

impl<T: BinElement> Image<T> {
    /// A fresh, zero-filled image over `axes`.
    pub fn new(axes: Vec<AxisSpec>) -> Self {
        let (strides, total) = strides_for(&axes);
        Self { axes, strides, data: vec![T::zero(); total] }
    }

    /// Preloads an existing image's contents, per the `addToExistingImg`
    /// configuration flag. `data` must already have the length implied
    /// by `axes`.
    pub fn from_existing(axes: Vec<AxisSpec>, data: Vec<T>) -> SimResult<Self> {
        let (strides, total) = strides_for(&axes);
        if data.len() != total {
            return Err(SimError::Config(format!(
                "existing image has {} elements, expected {total} for the configured axes",
                data.len()
            )));
        }
        Ok(Self { axes, strides, data })
    }

    pub fn axes(&self) -> &[AxisSpec] {
        &self.axes
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    fn linear_index(&self, bin_indices: &[usize]) -> usize {
        bin_indices
            .iter()
            .zip(&self.strides)
            .map(|(bin, stride)| bin * stride)
            .sum()
    }

    /// Adds `contribution` to the bin addressed by `bin_indices`.
    pub fn accumulate(&mut self, bin_indices: &[usize], contribution: f64) {
        let index = self.linear_index(bin_indices);
        self.data[index] = self.data[index] + cast_contribution::<T>(contribution);
    }
}
