//! Shared helpers for integration tests: builds PCRaster map stacks on disk.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use ru_ne_stack::csf::{CellRepr, CSF_SIGNATURE, DATA_OFFSET};
use ru_ne_stack::raster::mapstack_file_name;
use std::fs;
use std::path::Path;

/// Upper-left corner and cell size of every test map
pub const X_UL: f64 = 5.0;
pub const Y_UL: f64 = 52.0;
pub const CELL_SIZE: f64 = 0.5;

pub fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, d)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("valid test date")
}

/// Little-endian REAL4 CSF map with a north-up lattice. `None` cells are
/// written as missing values.
pub fn real4_map(rows: u32, cols: u32, cells: &[Option<f32>]) -> Vec<u8> {
    assert_eq!(cells.len(), (rows * cols) as usize, "cell count must match shape");

    let mut b = vec![0u8; DATA_OFFSET];
    b[..CSF_SIGNATURE.len()].copy_from_slice(CSF_SIGNATURE);
    // version 2, projection y-increases-up, byte order marker
    b[32..34].copy_from_slice(&2u16.to_le_bytes());
    b[38..40].copy_from_slice(&1u16.to_le_bytes());
    b[46..50].copy_from_slice(&1u32.to_le_bytes());

    let h = 64;
    b[h + 2..h + 4].copy_from_slice(&CellRepr::Real4.code().to_le_bytes());
    b[h + 20..h + 28].copy_from_slice(&X_UL.to_le_bytes());
    b[h + 28..h + 36].copy_from_slice(&Y_UL.to_le_bytes());
    b[h + 36..h + 40].copy_from_slice(&rows.to_le_bytes());
    b[h + 40..h + 44].copy_from_slice(&cols.to_le_bytes());
    b[h + 44..h + 52].copy_from_slice(&CELL_SIZE.to_le_bytes());
    b[h + 52..h + 60].copy_from_slice(&CELL_SIZE.to_le_bytes());

    for cell in cells {
        match cell {
            Some(v) => b.extend_from_slice(&v.to_le_bytes()),
            None => b.extend_from_slice(&u32::MAX.to_le_bytes()),
        }
    }
    b
}

/// Write map `step` (1-based) of the stack `prefix` into `dir`.
pub fn write_map(dir: &Path, prefix: &str, step: usize, rows: u32, cols: u32, cells: &[Option<f32>]) {
    let path = dir.join(mapstack_file_name(prefix, step));
    fs::write(&path, real4_map(rows, cols, cells)).expect("Failed to write test map");
}

/// Write a 2x2 stack of `count` maps. Map `n` holds `n * base + cell index`,
/// with cell `(n - 1) % 4` missing.
pub fn write_stack(dir: &Path, prefix: &str, count: usize, base: f32) {
    for step in 1..=count {
        let cells: Vec<Option<f32>> = (0..4)
            .map(|i| {
                if i == (step - 1) % 4 {
                    None
                } else {
                    Some(step as f32 * base + i as f32)
                }
            })
            .collect();
        write_map(dir, prefix, step, 2, 2, &cells);
    }
}
