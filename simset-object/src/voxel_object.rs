//! Voxelized object representation: a stack of slices, each holding an
//! activity index grid and an attenuation (material) index grid, ported
//! from `SubObjGtPositionIndexes` and `SubObjGetInnerCellDistance`.

use simset_core::error::{SimError, SimResult};
use simset_core::geometry::{Direction, Position};

/// Geometry and index grids for one axial slab of the object.
#[derive(Debug, Clone)]
pub struct Slice {
    pub z_min: f64,
    pub z_max: f64,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub num_x_bins: u32,
    pub num_y_bins: u32,
    /// Row-major (y, then x) material index per voxel.
    pub attenuation_indices: Vec<u32>,
    /// Row-major (y, then x) activity index per voxel.
    pub activity_indices: Vec<u32>,
}

impl Slice {
    pub fn voxel_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.num_x_bins as f64
    }

    pub fn voxel_height(&self) -> f64 {
        (self.y_max - self.y_min) / self.num_y_bins as f64
    }

    pub fn depth(&self) -> f64 {
        self.z_max - self.z_min
    }

    fn voxel_index(&self, x_index: u32, y_index: u32) -> usize {
        (y_index as usize * self.num_x_bins as usize) + x_index as usize
    }

    /// Material index at the given voxel.
    pub fn attenuation_index(&self, x_index: u32, y_index: u32) -> SimResult<u32> {
        let idx = self.voxel_index(x_index, y_index);
        self.attenuation_indices
            .get(idx)
            .copied()
            .ok_or(SimError::IndexOutOfRange {
                context: "slice_attenuation",
                index: idx as u64,
                bound: self.attenuation_indices.len() as u64,
            })
    }

    /// Activity index at the given voxel.
    pub fn activity_index(&self, x_index: u32, y_index: u32) -> SimResult<u32> {
        let idx = self.voxel_index(x_index, y_index);
        self.activity_indices
            .get(idx)
            .copied()
            .ok_or(SimError::IndexOutOfRange {
                context: "slice_activity",
                index: idx as u64,
                bound: self.activity_indices.len() as u64,
            })
    }
}

/// Indices identifying one voxel within the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelIndices {
    pub slice_index: u32,
    pub x_index: u32,
    pub y_index: u32,
}

/// Signed distances from a position to the edges of its containing
/// voxel, one per axis, in the direction of travel
/// (`SubObjGetInnerCellDistance`). Each distance is the (possibly
/// negative, per the y-axis's inverted convention) offset to the near
/// edge the photon is heading toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InnerCellDistances {
    pub x_dist: f64,
    pub y_dist: f64,
    pub z_dist: f64,
}

/// The full voxelized object: an axially ordered stack of slices.
#[derive(Debug, Clone)]
pub struct VoxelizedObject {
    slices: Vec<Slice>,
}

impl VoxelizedObject {
    /// Builds an object from slices, which must already be sorted by
    /// ascending `z_min`/`z_max` and contiguous. `attenuation_translation`
    /// and `activity_translation` map file-local voxel indices to
    /// table-local indices (`SubObj.c`'s translation tables); an index
    /// past the end of a translation table is left untranslated. Every
    /// translated attenuation index must then be `< num_tissues`, or
    /// construction fails with `IndexOutOfRange` — the construction
    /// guarantee that lets every later material lookup skip its own
    /// bounds check.
    pub fn new(
        mut slices: Vec<Slice>,
        num_tissues: usize,
        attenuation_translation: Option<&[u32]>,
        activity_translation: Option<&[u32]>,
    ) -> SimResult<Self> {
        if slices.is_empty() {
            return Err(SimError::Config("voxelized object has no slices".to_string()));
        }

        let translate = |table: Option<&[u32]>, index: u32| -> u32 {
            match table {
                Some(table) => table.get(index as usize).copied().unwrap_or(index),
                None => index,
            }
        };

        for slice in &mut slices {
            for index in &mut slice.attenuation_indices {
                let translated = translate(attenuation_translation, *index);
                if translated as usize >= num_tissues {
                    return Err(SimError::IndexOutOfRange {
                        context: "voxel_attenuation_index",
                        index: translated as u64,
                        bound: num_tissues as u64,
                    });
                }
                *index = translated;
            }
            for index in &mut slice.activity_indices {
                *index = translate(activity_translation, *index);
            }
        }

        Ok(Self { slices })
    }

    /// Builds an object with no index translation applied, only the
    /// `NumTissues` bound validated. Convenience for configurations that
    /// don't supply translation files.
    pub fn without_translation(slices: Vec<Slice>, num_tissues: usize) -> SimResult<Self> {
        Self::new(slices, num_tissues, None, None)
    }

    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    pub fn slice(&self, index: usize) -> SimResult<&Slice> {
        self.slices.get(index).ok_or(SimError::IndexOutOfRange {
            context: "voxelized_object",
            index: index as u64,
            bound: self.slices.len() as u64,
        })
    }

    pub fn overall_z_min(&self) -> f64 {
        self.slices[0].z_min
    }

    pub fn overall_z_max(&self) -> f64 {
        self.slices[self.slices.len() - 1].z_max
    }

    /// Maps a world position to its containing slice/x/y voxel indices
    /// (`SubObjGtPositionIndexes`). The search stops at the first slice
    /// whose `z_max` is at or beyond `pos.z`, matching the original's
    /// linear scan semantics, and clamps into range at the object's
    /// outer edges.
    pub fn position_to_indices(&self, pos: Position) -> VoxelIndices {
        let mut slice_index = 0usize;
        while slice_index + 1 < self.slices.len() && pos.z > self.slices[slice_index].z_max {
            slice_index += 1;
        }
        let slice = &self.slices[slice_index];

        let mut x_index = 0u32;
        while x_index + 1 < slice.num_x_bins
            && pos.x > slice.x_min + (x_index + 1) as f64 * slice.voxel_width()
        {
            x_index += 1;
        }

        let mut y_index = 0u32;
        while y_index + 1 < slice.num_y_bins
            && pos.y < slice.y_max - (y_index + 1) as f64 * slice.voxel_height()
        {
            y_index += 1;
        }

        VoxelIndices {
            slice_index: slice_index as u32,
            x_index,
            y_index,
        }
    }

    /// Computes the signed distance from `pos` to the near edge of its
    /// current voxel along each axis, in the sense the photon is
    /// travelling (`SubObjGetInnerCellDistance`). Note the y axis's
    /// inverted sign convention relative to x: voxel rows grow downward
    /// in y while bins grow upward in x.
    pub fn inner_cell_distance(
        &self,
        pos: Position,
        dir: Direction,
        indices: VoxelIndices,
    ) -> SimResult<InnerCellDistances> {
        let slice = self.slice(indices.slice_index as usize)?;

        let z_dist = if dir.cos_z >= 0.0 {
            slice.z_max - pos.z
        } else {
            slice.z_min - pos.z
        };

        let x_dist = if dir.cos_x >= 0.0 {
            (slice.x_min + (indices.x_index + 1) as f64 * slice.voxel_width()) - pos.x
        } else {
            (slice.x_min + indices.x_index as f64 * slice.voxel_width()) - pos.x
        };

        let y_dist = if dir.cos_y >= 0.0 {
            (slice.y_max - indices.y_index as f64 * slice.voxel_height()) - pos.y
        } else {
            (slice.y_max - (indices.y_index + 1) as f64 * slice.voxel_height()) - pos.y
        };

        Ok(InnerCellDistances { x_dist, y_dist, z_dist })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_object() -> VoxelizedObject {
        let slice = Slice {
            z_min: -1.0,
            z_max: 1.0,
            x_min: -2.0,
            x_max: 2.0,
            y_min: -2.0,
            y_max: 2.0,
            num_x_bins: 4,
            num_y_bins: 4,
            attenuation_indices: vec![0; 16],
            activity_indices: vec![1; 16],
        };
        VoxelizedObject::without_translation(vec![slice], 1).unwrap()
    }

    #[test]
    fn maps_center_position_to_center_voxel() {
        let object = sample_object();
        let indices = object.position_to_indices(Position::new(0.1, -0.1, 0.0));
        assert_eq!(indices.slice_index, 0);
        assert_eq!(indices.x_index, 2);
        assert_eq!(indices.y_index, 2);
    }

    #[test]
    fn maps_corner_positions_in_range() {
        let object = sample_object();
        let indices = object.position_to_indices(Position::new(-1.99, 1.99, 0.0));
        assert_eq!(indices.x_index, 0);
        assert_eq!(indices.y_index, 0);
    }

    #[test]
    fn inner_cell_distance_along_positive_axes_is_nonnegative() {
        let object = sample_object();
        let pos = Position::new(0.1, -0.1, 0.0);
        let indices = object.position_to_indices(pos);
        let dir = Direction::new(1.0, 0.0, 0.0).unwrap();
        let dists = object.inner_cell_distance(pos, dir, indices).unwrap();
        assert!(dists.x_dist >= 0.0);
        assert!(dists.x_dist <= object.slice(0).unwrap().voxel_width() + 1e-9);
    }

    #[test]
    fn inner_cell_distance_along_negative_axes_is_nonpositive() {
        let object = sample_object();
        let pos = Position::new(0.1, -0.1, 0.0);
        let indices = object.position_to_indices(pos);
        let dir = Direction::new(-1.0, 0.0, 0.0).unwrap();
        let dists = object.inner_cell_distance(pos, dir, indices).unwrap();
        assert!(dists.x_dist <= 0.0);
    }

    fn slice_with_indices(attenuation_indices: Vec<u32>, activity_indices: Vec<u32>) -> Slice {
        Slice {
            z_min: -1.0,
            z_max: 1.0,
            x_min: -2.0,
            x_max: 2.0,
            y_min: -2.0,
            y_max: 2.0,
            num_x_bins: 2,
            num_y_bins: 2,
            attenuation_indices,
            activity_indices,
        }
    }

    #[test]
    fn out_of_range_attenuation_index_is_rejected_at_construction() {
        let slice = slice_with_indices(vec![0, 1, 5, 0], vec![0, 0, 0, 0]);
        let err = VoxelizedObject::without_translation(vec![slice], 2).unwrap_err();
        assert!(matches!(err, SimError::IndexOutOfRange { .. }));
    }

    #[test]
    fn attenuation_translation_is_applied_and_validated() {
        let slice = slice_with_indices(vec![3, 3, 3, 3], vec![0, 0, 0, 0]);
        let translation = vec![0, 1, 2, 1];
        let object = VoxelizedObject::new(vec![slice], 2, Some(&translation), None).unwrap();
        assert_eq!(object.slice(0).unwrap().attenuation_index(0, 0).unwrap(), 1);
    }

    #[test]
    fn activity_translation_is_applied_without_num_tissues_bound() {
        let slice = slice_with_indices(vec![0, 0, 0, 0], vec![9, 9, 9, 9]);
        let translation = vec![0; 10].into_iter().enumerate().map(|(i, _)| i as u32).collect::<Vec<_>>();
        let mut translation = translation;
        translation[9] = 42;
        let object = VoxelizedObject::new(vec![slice], 1, None, Some(&translation)).unwrap();
        assert_eq!(object.slice(0).unwrap().activity_index(0, 0).unwrap(), 42);
    }
}
