//! PCRaster CSF map reader
//!
//! Map stacks are written by PCRaster in its Cross System Format (CSF 2.0): a
//! 64-byte main header, a raster header at offset 64 and the cell values from
//! offset 256, row by row starting at the upper-left corner. The byte order
//! marker in the main header tells whether the file was written little- or
//! big-endian.
//!
//! Missing cells are stored as a reserved bit pattern per cell representation.
//! They are decoded to the same sentinels GDAL reports for CSF maps, and that
//! sentinel is returned as the grid's no-data value.

use crate::errors::{Result, RuNeStackError};
use crate::geometry::GridGeometry;
use crate::raster::{Grid, RasterSource};
use ndarray::Array2;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Leading bytes of every CSF file
pub const CSF_SIGNATURE: &[u8] = b"RUU CROSS SYSTEM MAP FORMAT";

/// Offset of the first cell value
pub const DATA_OFFSET: usize = 256;

const RASTER_HEADER_OFFSET: usize = 64;
const BYTE_ORDER_OFFSET: usize = 46;
const PROJECTION_OFFSET: usize = 38;

/// Byte order marker as read in the writer's own order
const ORDER_NATIVE: u32 = 0x0000_0001;
const ORDER_SWAPPED: u32 = 0x0100_0000;

/// Projection code for maps whose y coordinate grows from top to bottom
const PT_YINCT2B: u16 = 0;

/// Cell representations, named after the CSF type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRepr {
    Uint1,
    Int4,
    Real4,
    Real8,
}

impl CellRepr {
    pub const UINT1: u16 = 0x00;
    pub const INT4: u16 = 0x26;
    pub const REAL4: u16 = 0x5A;
    pub const REAL8: u16 = 0xDB;

    fn from_code(code: u16) -> Option<Self> {
        match code {
            Self::UINT1 => Some(CellRepr::Uint1),
            Self::INT4 => Some(CellRepr::Int4),
            Self::REAL4 => Some(CellRepr::Real4),
            Self::REAL8 => Some(CellRepr::Real8),
            _ => None,
        }
    }

    /// CSF type code
    pub fn code(self) -> u16 {
        match self {
            CellRepr::Uint1 => Self::UINT1,
            CellRepr::Int4 => Self::INT4,
            CellRepr::Real4 => Self::REAL4,
            CellRepr::Real8 => Self::REAL8,
        }
    }

    /// Bytes per cell
    pub fn size(self) -> usize {
        match self {
            CellRepr::Uint1 => 1,
            CellRepr::Int4 | CellRepr::Real4 => 4,
            CellRepr::Real8 => 8,
        }
    }

    /// Value missing cells decode to
    pub fn nodata(self) -> f32 {
        match self {
            CellRepr::Uint1 => 255.0,
            CellRepr::Int4 => i32::MIN as f32,
            CellRepr::Real4 | CellRepr::Real8 => -f32::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

/// Bounds-checked field access over the raw file bytes
struct Fields<'a> {
    bytes: &'a [u8],
    order: ByteOrder,
}

impl<'a> Fields<'a> {
    fn take<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        self.bytes.get(offset..offset + N)?.try_into().ok()
    }

    fn u16(&self, offset: usize) -> Option<u16> {
        let b = self.take::<2>(offset)?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        })
    }

    fn u32(&self, offset: usize) -> Option<u32> {
        let b = self.take::<4>(offset)?;
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        })
    }

    fn f64(&self, offset: usize) -> Option<f64> {
        let b = self.take::<8>(offset)?;
        Some(match self.order {
            ByteOrder::Little => f64::from_le_bytes(b),
            ByteOrder::Big => f64::from_be_bytes(b),
        })
    }
}

/// Raster header fields needed to place and decode the cells
#[derive(Debug, Clone, Copy)]
struct RasterHeader {
    order: ByteOrder,
    cell_repr: CellRepr,
    x_ul: f64,
    y_ul: f64,
    rows: usize,
    cols: usize,
    cell_size_x: f64,
    cell_size_y: f64,
    angle: f64,
    y_increases_downwards: bool,
}

/// [`RasterSource`] for PCRaster CSF maps
#[derive(Debug, Clone, Default)]
pub struct CsfReader {
    expected: Option<GridGeometry>,
}

impl CsfReader {
    /// Reader that accepts any lattice
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader that rejects maps whose shape differs from `geometry`
    pub fn with_geometry(geometry: GridGeometry) -> Self {
        Self {
            expected: Some(geometry),
        }
    }

    /// Decode a CSF map held in memory. `path` is used for error messages.
    pub fn decode(&self, path: &Path, bytes: &[u8]) -> Result<Grid> {
        let header = parse_header(path, bytes)?;
        if header.angle != 0.0 {
            warn!(
                "{} is rotated by {} rad; rotation is ignored",
                path.display(),
                header.angle
            );
        }

        let cell_height = if header.y_increases_downwards {
            header.cell_size_y
        } else {
            -header.cell_size_y
        };
        let geometry = GridGeometry {
            x_origin: header.x_ul,
            y_origin: header.y_ul,
            cell_width: header.cell_size_x,
            cell_height,
            rows: header.rows,
            cols: header.cols,
        };
        if let Some(expected) = &self.expected {
            expected.check_shape(path, geometry.shape())?;
        }

        let cells = decode_cells(path, bytes, header)?;
        let data = Array2::from_shape_vec((header.rows, header.cols), cells)?;

        Ok(Grid {
            geometry,
            data,
            nodata: Some(header.cell_repr.nodata()),
        })
    }
}

impl RasterSource for CsfReader {
    fn read(&self, path: &Path) -> Result<Grid> {
        let bytes = fs::read(path).map_err(|e| RuNeStackError::RasterRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.decode(path, &bytes)
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> RuNeStackError {
    RuNeStackError::RasterRead {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn byte_order(path: &Path, bytes: &[u8]) -> Result<ByteOrder> {
    if !bytes.starts_with(CSF_SIGNATURE) {
        return Err(malformed(path, "not a CSF map (bad signature)"));
    }
    let marker = Fields {
        bytes,
        order: ByteOrder::Little,
    }
    .u32(BYTE_ORDER_OFFSET)
    .ok_or_else(|| malformed(path, "truncated main header"))?;

    match marker {
        ORDER_NATIVE => Ok(ByteOrder::Little),
        ORDER_SWAPPED => Ok(ByteOrder::Big),
        other => Err(malformed(path, format!("unknown byte order marker 0x{other:08X}"))),
    }
}

fn parse_header(path: &Path, bytes: &[u8]) -> Result<RasterHeader> {
    let order = byte_order(path, bytes)?;
    let fields = Fields { bytes, order };
    let truncated = || malformed(path, "truncated raster header");
    let at = |offset: usize| RASTER_HEADER_OFFSET + offset;

    let code = fields.u16(at(2)).ok_or_else(truncated)?;
    let cell_repr = CellRepr::from_code(code).ok_or_else(|| {
        RuNeStackError::UnsupportedCellRepresentation {
            path: path.to_path_buf(),
            code,
        }
    })?;

    let header = RasterHeader {
        order,
        cell_repr,
        x_ul: fields.f64(at(20)).ok_or_else(truncated)?,
        y_ul: fields.f64(at(28)).ok_or_else(truncated)?,
        rows: fields.u32(at(36)).ok_or_else(truncated)? as usize,
        cols: fields.u32(at(40)).ok_or_else(truncated)? as usize,
        cell_size_x: fields.f64(at(44)).ok_or_else(truncated)?,
        cell_size_y: fields.f64(at(52)).ok_or_else(truncated)?,
        angle: fields.f64(at(60)).ok_or_else(truncated)?,
        y_increases_downwards: fields.u16(PROJECTION_OFFSET).ok_or_else(truncated)? == PT_YINCT2B,
    };

    if header.rows == 0 || header.cols == 0 {
        return Err(malformed(path, "map has no cells"));
    }
    Ok(header)
}

fn decode_cells(path: &Path, bytes: &[u8], header: RasterHeader) -> Result<Vec<f32>> {
    let size = header.cell_repr.size();
    let (count, end) = header
        .rows
        .checked_mul(header.cols)
        .and_then(|count| Some((count, count.checked_mul(size)?.checked_add(DATA_OFFSET)?)))
        .ok_or_else(|| malformed(path, "raster dimensions overflow"))?;
    let raw = bytes
        .get(DATA_OFFSET..end)
        .ok_or_else(|| malformed(path, format!("expected {count} cells, file is too short")))?;

    let order = header.order;
    let nodata = header.cell_repr.nodata();
    let cells = raw.chunks_exact(size);
    let values: Vec<f32> = match header.cell_repr {
        CellRepr::Uint1 => cells.map(|c| f32::from(c[0])).collect(),
        CellRepr::Int4 => cells
            .map(|c| {
                let b = [c[0], c[1], c[2], c[3]];
                let v = match order {
                    ByteOrder::Little => i32::from_le_bytes(b),
                    ByteOrder::Big => i32::from_be_bytes(b),
                };
                if v == i32::MIN { nodata } else { v as f32 }
            })
            .collect(),
        CellRepr::Real4 => cells
            .map(|c| {
                let b = [c[0], c[1], c[2], c[3]];
                let bits = match order {
                    ByteOrder::Little => u32::from_le_bytes(b),
                    ByteOrder::Big => u32::from_be_bytes(b),
                };
                if bits == u32::MAX { nodata } else { f32::from_bits(bits) }
            })
            .collect(),
        CellRepr::Real8 => cells
            .map(|c| {
                let b = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                let bits = match order {
                    ByteOrder::Little => u64::from_le_bytes(b),
                    ByteOrder::Big => u64::from_be_bytes(b),
                };
                if bits == u64::MAX { nodata } else { f64::from_bits(bits) as f32 }
            })
            .collect(),
    };
    Ok(values)
}
