//! Material attenuation table: density, atomic number/weight and an
//! energy-indexed table of total attenuation, scatter probability and
//! Compton-conditional-on-scatter probability, ported from the
//! `SubObjGetProbScatter`/`SubObjGetProbComptonCondnl` family.

use simset_core::error::{SimError, SimResult};

/// One row of the energy-indexed attenuation table for a material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRow {
    /// Photon energy, keV.
    pub energy_kev: f64,
    /// Linear attenuation coefficient, 1/cm.
    pub mu: f64,
    /// Probability of any scatter interaction given an interaction
    /// occurred.
    pub prob_scatter: f64,
    /// Probability the scatter was Compton given a scatter occurred
    /// (the complement is coherent).
    pub prob_compton_given_scatter: f64,
}

/// A single material's physical properties and attenuation table.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub density_g_cm3: f64,
    pub atomic_number: f64,
    pub atomic_weight: f64,
    rows: Vec<EnergyRow>,
}

impl Material {
    /// Builds a material from an energy-sorted table of rows.
    pub fn new(
        name: impl Into<String>,
        density_g_cm3: f64,
        atomic_number: f64,
        atomic_weight: f64,
        mut rows: Vec<EnergyRow>,
    ) -> SimResult<Self> {
        if rows.is_empty() {
            return Err(SimError::Format {
                kind: "material",
                path: Default::default(),
                detail: "material has no energy rows".to_string(),
            });
        }
        rows.sort_by(|a, b| a.energy_kev.total_cmp(&b.energy_kev));
        Ok(Self {
            name: name.into(),
            density_g_cm3,
            atomic_number,
            atomic_weight,
            rows,
        })
    }

    /// Collapses this material's coherent/Compton split, matching the
    /// legacy "coherent scatter disabled" behaviour
    /// (`SubObj.c`'s table-collapse step, also spec'd directly): the
    /// coherent probability mass (`probScatter * (1 - probComptonToScatter)`)
    /// is removed from the attenuation coefficient entirely rather than
    /// folded into Compton, and `probScatter` is recomputed over the
    /// remaining photoelectric/Compton split so the free-path and
    /// scatter/absorb sampling stay consistent with the now-smaller
    /// attenuation coefficient.
    pub fn with_coherent_disabled(mut self) -> Self {
        for row in &mut self.rows {
            let prob_photoelectric = 1.0 - row.prob_scatter;
            let prob_compton = row.prob_scatter * row.prob_compton_given_scatter;
            row.mu *= prob_photoelectric + prob_compton;
            let remaining = prob_compton + prob_photoelectric;
            row.prob_scatter = if remaining > 0.0 { prob_compton / remaining } else { 0.0 };
            row.prob_compton_given_scatter = 1.0;
        }
        self
    }

    fn bracket(&self, energy_kev: f64) -> (usize, usize, f64) {
        if energy_kev <= self.rows[0].energy_kev {
            return (0, 0, 0.0);
        }
        let last = self.rows.len() - 1;
        if energy_kev >= self.rows[last].energy_kev {
            return (last, last, 0.0);
        }
        let hi = self
            .rows
            .iter()
            .position(|r| r.energy_kev >= energy_kev)
            .unwrap();
        let lo = hi - 1;
        let span = self.rows[hi].energy_kev - self.rows[lo].energy_kev;
        let frac = if span > 0.0 {
            (energy_kev - self.rows[lo].energy_kev) / span
        } else {
            0.0
        };
        (lo, hi, frac)
    }

    fn interpolate(&self, energy_kev: f64, select: impl Fn(&EnergyRow) -> f64) -> f64 {
        let (lo, hi, frac) = self.bracket(energy_kev);
        let lo_v = select(&self.rows[lo]);
        let hi_v = select(&self.rows[hi]);
        lo_v + frac * (hi_v - lo_v)
    }

    /// Linear attenuation coefficient at `energy_kev`, linearly
    /// interpolated between table rows (`SubObjGetAttenuationInObj`).
    pub fn mu(&self, energy_kev: f64) -> f64 {
        self.interpolate(energy_kev, |r| r.mu)
    }

    /// Probability of a scatter interaction given an interaction
    /// occurred (`SubObjGetProbScatter`).
    pub fn prob_scatter(&self, energy_kev: f64) -> f64 {
        self.interpolate(energy_kev, |r| r.prob_scatter)
    }

    /// Probability a scatter was Compton given a scatter occurred
    /// (`SubObjGetProbComptonCondnl`).
    pub fn prob_compton_given_scatter(&self, energy_kev: f64) -> f64 {
        self.interpolate(energy_kev, |r| r.prob_compton_given_scatter)
    }
}

/// An indexed collection of materials, looked up by the small integer
/// index stored in each voxel's attenuation grid.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
}

impl MaterialTable {
    pub fn new(materials: Vec<Material>) -> Self {
        Self { materials }
    }

    /// Looks up a material by index, as stored in a voxel's
    /// attenuation array.
    pub fn get(&self, index: usize) -> SimResult<&Material> {
        self.materials
            .get(index)
            .ok_or(SimError::IndexOutOfRange {
                context: "material_table",
                index: index as u64,
                bound: self.materials.len() as u64,
            })
    }

    /// Finds a material's index by name (`SubObjGtMaterialIndex`).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// All materials, for callers that need the maximum attenuation
    /// across the whole table (Woodcock free-path sampling).
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Collapses every material's coherent/Compton split. Used when no
    /// coherent-scatter angular table is configured for the run, so
    /// `prob_compton_given_scatter` is `1.0` everywhere and the
    /// coherent-scatter branch is never sampled.
    pub fn with_coherent_disabled(self) -> Self {
        Self {
            materials: self.materials.into_iter().map(Material::with_coherent_disabled).collect(),
        }
    }
}
