//! Coherent (Rayleigh) scatter angular distribution table, ported from
//! `SubObj.c: SubObjGetCohTheta2`.
//!
//! Each material has a table of rows indexed by energy, each row
//! holding a cumulative-probability-indexed array of cosine(theta)
//! values. The energy axis has mixed resolution: 1 keV steps up to
//! `NUM_1KEV_ENERGIES`, then 10 keV steps, then 100 keV steps — the
//! legacy table's own layout for keeping the table small at high
//! energy where the angular distribution varies slowly. Exact legacy
//! row counts aren't reproduced (non-goal: bit-identical table
//! parity); the bracket/interpolation algorithm is.

use simset_core::error::{SimError, SimResult};
use simset_core::math::Rng;

/// Number of 1 keV-resolution energy rows at the low end of the table.
pub const NUM_1KEV_ENERGIES: u32 = 150;
/// Number of 10 keV-resolution rows above `NUM_1KEV_ENERGIES`.
pub const NUM_10KEV_ENERGIES: u32 = 35;
/// Energy, in keV, at which the table switches from 10 keV to 100 keV
/// resolution.
pub const MAX_10KEV_ENERGY: u32 = NUM_1KEV_ENERGIES + NUM_10KEV_ENERGIES * 10;
/// Number of cumulative-probability angle bins per table row.
pub const NUM_COH_ANGLES: usize = 200;

/// One energy row: the energy it was tabulated at, and
/// `NUM_COH_ANGLES` cosine(theta) values indexed by cumulative
/// probability bin.
#[derive(Debug, Clone)]
pub struct CoherentEnergyRow {
    pub energy_kev: f64,
    pub angle_cosines: Vec<f64>,
}

/// The per-material coherent angular table.
#[derive(Debug, Clone)]
pub struct CoherentScatterTable {
    rows: Vec<Vec<CoherentEnergyRow>>,
}

impl CoherentScatterTable {
    pub fn new(rows: Vec<Vec<CoherentEnergyRow>>) -> Self {
        Self { rows }
    }

    pub fn num_materials(&self) -> usize {
        self.rows.len()
    }

    /// Maps a photon energy to the bracketing row indices within a
    /// material's energy axis, following the original's three-segment
    /// scheme exactly.
    fn bracket_energy_indices(&self, energy_index: i64) -> (usize, usize) {
        let one = NUM_1KEV_ENERGIES as i64;
        let ten = NUM_10KEV_ENERGIES as i64;
        let max_ten = MAX_10KEV_ENERGY as i64;

        if energy_index <= one {
            let e1 = (energy_index - 1).max(0);
            (e1 as usize, energy_index.max(0) as usize)
        } else if energy_index < max_ten {
            let mut e1 = ((energy_index - one) * ten) / (ten * 10);
            e1 += one - 1;
            (e1.max(0) as usize, (e1 + 1).max(0) as usize)
        } else {
            let num_hundred = 5i64;
            let mut e1 = (energy_index - max_ten) * num_hundred / (num_hundred * 100);
            e1 += one + ten - 1;
            (e1.max(0) as usize, (e1 + 1).max(0) as usize)
        }
    }

    /// Samples a scatter angle cosine for `material_index` at
    /// `energy_kev`, drawing a uniform cumulative-probability index and
    /// interpolating first across the angle axis, then across the two
    /// bracketing energy rows (`SubObjGetCohTheta2`).
    pub fn sample_cos_theta(
        &self,
        material_index: usize,
        energy_kev: f64,
        rng: &mut impl Rng,
    ) -> SimResult<f64> {
        let material_rows = self
            .rows
            .get(material_index)
            .ok_or(SimError::IndexOutOfRange {
                context: "coherent_scatter_table",
                index: material_index as u64,
                bound: self.rows.len() as u64,
            })?;

        if material_rows.is_empty() {
            return Err(SimError::Format {
                kind: "coherent_scatter_table",
                path: Default::default(),
                detail: format!("material {material_index} has no coherent angular rows"),
            });
        }

        let (e1, e2) = self.bracket_energy_indices(energy_kev.floor() as i64);
        let e1 = e1.min(material_rows.len() - 1);
        let e2 = e2.min(material_rows.len() - 1);

        let row1 = &material_rows[e1];
        let row2 = &material_rows[e2];

        let ad_value = NUM_COH_ANGLES as f64 * rng.uniform();
        let ad_index = ad_value.floor() as usize;

        let (cos_e1, cos_e2) = if ad_index == 0 {
            let c1 = ad_value * row1.angle_cosines[0] + (1.0 - ad_value);
            let c2 = ad_value * row2.angle_cosines[0] + (1.0 - ad_value);
            (c1, c2)
        } else if ad_index < NUM_COH_ANGLES {
            let frac = ad_value - ad_index as f64;
            let c1 = frac * row1.angle_cosines[ad_index] + (1.0 - frac) * row1.angle_cosines[ad_index - 1];
            let c2 = frac * row2.angle_cosines[ad_index] + (1.0 - frac) * row2.angle_cosines[ad_index - 1];
            (c1, c2)
        } else {
            (-1.0, -1.0)
        };

        let span = row2.energy_kev - row1.energy_kev;
        let cos_theta = if span.abs() < 1e-12 {
            cos_e1
        } else {
            ((energy_kev - row1.energy_kev) * cos_e2 + (row2.energy_kev - energy_kev) * cos_e1) / span
        };

        Ok(cos_theta.clamp(-1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simset_core::math::{PcgRng, StreamKind};

    fn single_material_table() -> CoherentScatterTable {
        let mut rows = Vec::new();
        for e in 0..3 {
            let energy = (e as f64) * 100.0 + 1.0;
            let angles: Vec<f64> = (0..NUM_COH_ANGLES)
                .map(|i| 1.0 - 2.0 * (i as f64) / (NUM_COH_ANGLES as f64 - 1.0))
                .collect();
            rows.push(CoherentEnergyRow { energy_kev: energy, angle_cosines: angles });
        }
        CoherentScatterTable::new(vec![rows])
    }

    #[test]
    fn sampled_cosine_is_in_valid_range() {
        let table = single_material_table();
        let mut rng = PcgRng::for_stream(1, StreamKind::Scatter);
        for _ in 0..1000 {
            let cos_theta = table.sample_cos_theta(0, 50.0, &mut rng).unwrap();
            assert!((-1.0..=1.0).contains(&cos_theta));
        }
    }

    #[test]
    fn unknown_material_is_an_error() {
        let table = single_material_table();
        let mut rng = PcgRng::for_stream(1, StreamKind::Scatter);
        assert!(table.sample_cos_theta(9, 50.0, &mut rng).is_err());
    }

    #[test]
    fn material_with_no_angular_rows_is_an_error_not_a_panic() {
        let table = CoherentScatterTable::new(vec![Vec::new()]);
        let mut rng = PcgRng::for_stream(1, StreamKind::Scatter);
        assert!(table.sample_cos_theta(0, 50.0, &mut rng).is_err());
    }
}
