//! Stratification / productivity table: per (slice, emission-cos-alpha
//! bin) estimate of the fraction of decays that would survive through
//! the object to the critical zone, used to bias decay generation
//! toward detectable angular bins.

use simset_core::error::{SimError, SimResult};

/// One angular bin's persisted estimate for a single slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductivityBin {
    /// Lower edge of this bin's cos(alpha) range.
    pub cos_alpha_min: f64,
    /// Upper edge of this bin's cos(alpha) range.
    pub cos_alpha_max: f64,
    /// Estimated maximum survival probability for decays emitted into
    /// this bin.
    pub max_productivity: f64,
}

impl ProductivityBin {
    /// Width of this bin's cos(alpha) range.
    pub fn angle_size(&self) -> f64 {
        self.cos_alpha_max - self.cos_alpha_min
    }
}

/// The full table: one row of `K` bins per slice.
#[derive(Debug, Clone)]
pub struct ProductivityTable {
    bins_per_slice: Vec<Vec<ProductivityBin>>,
}

impl ProductivityTable {
    /// Builds a table from precomputed per-slice bin rows. Every row
    /// must have the same bin count and must tile `[-1, 1]` exactly;
    /// violating either is a construction error since it would silently
    /// bias sampling.
    pub fn new(bins_per_slice: Vec<Vec<ProductivityBin>>) -> SimResult<Self> {
        if bins_per_slice.is_empty() {
            return Err(SimError::Config("productivity table has no slices".to_string()));
        }
        let k = bins_per_slice[0].len();
        for (slice_idx, row) in bins_per_slice.iter().enumerate() {
            if row.len() != k {
                return Err(SimError::Config(format!(
                    "slice {slice_idx} has {} productivity bins, expected {k}",
                    row.len()
                )));
            }
            if (row[0].cos_alpha_min - (-1.0)).abs() > 1e-9
                || (row[row.len() - 1].cos_alpha_max - 1.0).abs() > 1e-9
            {
                return Err(SimError::Config(format!(
                    "slice {slice_idx} productivity bins do not tile [-1, 1]"
                )));
            }
        }
        Ok(Self { bins_per_slice })
    }

    /// Builds the degenerate single-bin table used when stratification
    /// is disabled: one bin per slice spanning `[-1, 1]` with
    /// productivity 1 (spec: "if stratification is disabled the table
    /// degenerates to a single alpha-bin spanning [-1,+1] with
    /// productivity 1").
    pub fn disabled(num_slices: usize) -> SimResult<Self> {
        let row = vec![ProductivityBin {
            cos_alpha_min: -1.0,
            cos_alpha_max: 1.0,
            max_productivity: 1.0,
        }];
        Self::new(vec![row; num_slices])
    }

    pub fn num_slices(&self) -> usize {
        self.bins_per_slice.len()
    }

    pub fn num_bins(&self) -> usize {
        self.bins_per_slice[0].len()
    }

    /// Bins for a given slice.
    pub fn bins(&self, slice_index: usize) -> SimResult<&[ProductivityBin]> {
        self.bins_per_slice
            .get(slice_index)
            .map(Vec::as_slice)
            .ok_or(SimError::IndexOutOfRange {
                context: "productivity_table",
                index: slice_index as u64,
                bound: self.bins_per_slice.len() as u64,
            })
    }

    /// Finds the bin index containing `cos_alpha` for a given slice.
    pub fn bin_index(&self, slice_index: usize, cos_alpha: f64) -> SimResult<usize> {
        let bins = self.bins(slice_index)?;
        bins.iter()
            .position(|b| cos_alpha >= b.cos_alpha_min && cos_alpha <= b.cos_alpha_max)
            .ok_or(SimError::Numeric {
                context: "productivity_table::bin_index",
                detail: format!("cos_alpha {cos_alpha} outside [-1, 1]"),
            })
    }

    /// Relative sample-count weight for a (slice, bin): the product of
    /// bin width and estimated productivity, as specified ("the decay
    /// generator's per-voxel sample count is proportional to this
    /// product").
    pub fn sample_weight(&self, slice_index: usize, bin_index: usize) -> SimResult<f64> {
        let bins = self.bins(slice_index)?;
        let bin = bins.get(bin_index).ok_or(SimError::IndexOutOfRange {
            context: "productivity_table::sample_weight",
            index: bin_index as u64,
            bound: bins.len() as u64,
        })?;
        Ok(bin.angle_size() * bin.max_productivity)
    }

    /// Builds a uniformly stratified set of `k` bins over `[-1, 1]` for
    /// one slice, each given `max_productivity`. A helper for
    /// precomputing the table at object-load time, before the
    /// one-pass attenuation estimate refines `max_productivity` per bin.
    pub fn uniform_bins(k: u32, max_productivity: f64) -> Vec<ProductivityBin> {
        let width = 2.0 / k as f64;
        (0..k)
            .map(|i| ProductivityBin {
                cos_alpha_min: -1.0 + i as f64 * width,
                cos_alpha_max: -1.0 + (i + 1) as f64 * width,
                max_productivity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_table_has_one_bin_spanning_full_range() {
        let table = ProductivityTable::disabled(3).unwrap();
        assert_eq!(table.num_bins(), 1);
        let bin = &table.bins(0).unwrap()[0];
        assert_eq!(bin.cos_alpha_min, -1.0);
        assert_eq!(bin.cos_alpha_max, 1.0);
        assert_eq!(bin.max_productivity, 1.0);
    }

    #[test]
    fn bin_index_finds_containing_bin() {
        let rows = vec![ProductivityTable::uniform_bins(4, 0.5)];
        let table = ProductivityTable::new(rows).unwrap();
        assert_eq!(table.bin_index(0, -0.9).unwrap(), 0);
        assert_eq!(table.bin_index(0, 0.9).unwrap(), 3);
    }

    #[test]
    fn mismatched_bin_counts_are_rejected() {
        let rows = vec![
            ProductivityTable::uniform_bins(4, 0.5),
            ProductivityTable::uniform_bins(8, 0.5),
        ];
        assert!(ProductivityTable::new(rows).is_err());
    }

    #[test]
    fn sample_weight_is_width_times_productivity() {
        let rows = vec![ProductivityTable::uniform_bins(2, 0.5)];
        let table = ProductivityTable::new(rows).unwrap();
        let weight = table.sample_weight(0, 0).unwrap();
        assert!((weight - 0.5).abs() < 1e-9);
    }
}
