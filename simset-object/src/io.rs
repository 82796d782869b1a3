//! File loading for the companion files that describe a voxelized
//! object: the raw index grids, the material text file, and the
//! coherent angular distribution file list.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use simset_core::error::{SimError, SimResult};

use crate::coherent::{CoherentEnergyRow, CoherentScatterTable};
use crate::material::{EnergyRow, Material, MaterialTable};

/// Reads a row-major `u32` index grid, as written for the activity and
/// attenuation index files (`SubObjGetObjGeometry`'s binary payload).
pub fn read_index_grid(path: &Path, expected_len: usize) -> SimResult<Vec<u32>> {
    let bytes = fs::read(path).map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
    if bytes.len() != expected_len * 4 {
        return Err(SimError::Format {
            kind: "index grid",
            path: path.to_path_buf(),
            detail: format!(
                "expected {} bytes ({} u32 entries), found {}",
                expected_len * 4,
                expected_len,
                bytes.len()
            ),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes(chunk.try_into().unwrap()))
        .collect())
}

/// Reads a material text file: one line per material, fields
/// whitespace-separated as `name density Z A energy1 mu1 ps1 pc1
/// energy2 mu2 ps2 pc2 ...` (an explicit, human-editable format
/// standing in for the legacy table's binary on-disk layout).
pub fn read_material_table(path: &Path) -> SimResult<MaterialTable> {
    let file = fs::File::open(path).map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
    let reader = BufReader::new(file);

    let mut materials = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || (fields.len() - 4) % 4 != 0 {
            return Err(SimError::Format {
                kind: "material",
                path: path.to_path_buf(),
                detail: format!("malformed line {}: '{line}'", line_no + 1),
            });
        }

        let parse_f64 = |s: &str| -> SimResult<f64> {
            s.parse().map_err(|_| SimError::Format {
                kind: "material",
                path: path.to_path_buf(),
                detail: format!("expected a number, got '{s}' on line {}", line_no + 1),
            })
        };

        let name = fields[0].to_string();
        let density = parse_f64(fields[1])?;
        let z = parse_f64(fields[2])?;
        let a = parse_f64(fields[3])?;

        let mut rows = Vec::new();
        for chunk in fields[4..].chunks_exact(4) {
            rows.push(EnergyRow {
                energy_kev: parse_f64(chunk[0])?,
                mu: parse_f64(chunk[1])?,
                prob_scatter: parse_f64(chunk[2])?,
                prob_compton_given_scatter: parse_f64(chunk[3])?,
            });
        }

        materials.push(Material::new(name, density, z, a, rows)?);
    }

    Ok(MaterialTable::new(materials))
}

/// Reads a file-local -> table-local index translation table: one
/// `file_index table_index` pair per line (blank lines and `#`
/// comments skipped), ported from `SubObj.c`'s attenuation/activity
/// translation file readers. An index absent from the file translates
/// to itself.
pub fn read_translation_table(path: &Path) -> SimResult<Vec<u32>> {
    let file = fs::File::open(path).map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
    let reader = BufReader::new(file);

    let mut pairs = Vec::new();
    let mut max_index = 0u32;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(SimError::Format {
                kind: "index translation table",
                path: path.to_path_buf(),
                detail: format!("expected 'file_index table_index' on line {}: '{line}'", line_no + 1),
            });
        }

        let parse_u32 = |s: &str| -> SimResult<u32> {
            s.parse().map_err(|_| SimError::Format {
                kind: "index translation table",
                path: path.to_path_buf(),
                detail: format!("expected an integer, got '{s}' on line {}", line_no + 1),
            })
        };

        let file_index = parse_u32(fields[0])?;
        let table_index = parse_u32(fields[1])?;
        max_index = max_index.max(file_index);
        pairs.push((file_index, table_index));
    }

    let mut table: Vec<u32> = (0..=max_index).collect();
    for (file_index, table_index) in pairs {
        table[file_index as usize] = table_index;
    }
    Ok(table)
}

/// Reads the coherent angular distribution table: `list_path` names one
/// `.ad` file per line, each holding whitespace-separated
/// `energy cos_theta_1 cos_theta_2 ... cos_theta_n` rows for that
/// material.
pub fn read_coherent_table(list_path: &Path) -> SimResult<CoherentScatterTable> {
    let list_file = fs::File::open(list_path)
        .map_err(|source| SimError::Io { path: list_path.to_path_buf(), source })?;
    let list_reader = BufReader::new(list_file);

    let mut all_rows = Vec::new();
    for line in list_reader.lines() {
        let line = line.map_err(|source| SimError::Io { path: list_path.to_path_buf(), source })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let ad_path = Path::new(line);
        let ad_file =
            fs::File::open(ad_path).map_err(|source| SimError::Io { path: ad_path.to_path_buf(), source })?;
        let ad_reader = BufReader::new(ad_file);

        let mut rows = Vec::new();
        for (line_no, ad_line) in ad_reader.lines().enumerate() {
            let ad_line = ad_line.map_err(|source| SimError::Io { path: ad_path.to_path_buf(), source })?;
            let fields: Vec<&str> = ad_line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            let energy_kev: f64 = fields[0].parse().map_err(|_| SimError::Format {
                kind: "coherent angular distribution",
                path: ad_path.to_path_buf(),
                detail: format!("expected a number on line {}", line_no + 1),
            })?;
            let angle_cosines: Vec<f64> = fields[1..]
                .iter()
                .map(|s| {
                    s.parse().map_err(|_| SimError::Format {
                        kind: "coherent angular distribution",
                        path: ad_path.to_path_buf(),
                        detail: format!("expected a number on line {}", line_no + 1),
                    })
                })
                .collect::<SimResult<_>>()?;
            rows.push(CoherentEnergyRow { energy_kev, angle_cosines });
        }
        all_rows.push(rows);
    }

    Ok(CoherentScatterTable::new(all_rows))
}
