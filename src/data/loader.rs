use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::debug;
use thiserror::Error;

use super::model::{Column, DiagTable, TableError};
use super::schema::{parse_header, ScalarKind, ScalarType, SchemaError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong while loading diagnostic files. All variants
/// are fatal: there is no partial-result recovery.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("failed to enumerate matching files: {0}")]
    Glob(#[from] glob::GlobError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad descriptor in {path}: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
    #[error("{path}: payload offset {offset} is past the end of the file ({len} bytes)")]
    OffsetOutOfRange { path: PathBuf, offset: u64, len: usize },
    #[error("{path}: {payload} payload bytes is not a whole number of {record}-byte records")]
    MisalignedPayload {
        path: PathBuf,
        payload: usize,
        record: usize,
    },
    #[error("{path}: record layout differs from {first}")]
    LayoutMismatch { path: PathBuf, first: PathBuf },
    #[error(transparent)]
    Table(#[from] TableError),
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Read all in-situ diagnostic files matching a glob pattern into one table.
///
/// Use `*` as a wildcard to combine the per-rank output of a single beam,
/// e.g. `"diags/insitu/reduced_beam.*.txt"`. Every matched file must carry
/// an identical record layout; the combined table is sorted ascending by
/// `time` with a stable sort. A pattern matching no files yields an empty
/// table, not an error.
pub fn read_file(pattern: &str) -> Result<DiagTable, LoadError> {
    let mut table = DiagTable::empty();
    let mut first_path: Option<PathBuf> = None;

    for entry in glob::glob(pattern)? {
        let path = entry?;
        debug!("loading diagnostic file {}", path.display());
        let file = load_single(&path)?;
        if let Err(err) = table.append(file) {
            return Err(match err {
                TableError::LayoutMismatch => LoadError::LayoutMismatch {
                    first: first_path.clone().unwrap_or_else(|| path.clone()),
                    path,
                },
                other => other.into(),
            });
        }
        first_path.get_or_insert(path);
    }

    table.sort_by_time()?;
    Ok(table)
}

// ---------------------------------------------------------------------------
// Single-file decoding
// ---------------------------------------------------------------------------

/// Load one diagnostic file: descriptor prefix, then fixed-size records from
/// the declared payload offset to end-of-file.
pub(crate) fn load_single(path: &Path) -> Result<DiagTable, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // The descriptor prefix is ASCII JSON; decoding the whole file lossily
    // keeps it intact even though the payload is not valid UTF-8.
    let text = String::from_utf8_lossy(&bytes);
    let (layout, offset) = parse_header(&text).map_err(|source| LoadError::Descriptor {
        path: path.to_path_buf(),
        source,
    })?;

    if offset as usize > bytes.len() {
        return Err(LoadError::OffsetOutOfRange {
            path: path.to_path_buf(),
            offset,
            len: bytes.len(),
        });
    }
    let payload = &bytes[offset as usize..];

    // parse_header rejects field-less layouts, so the record size is
    // always at least one byte.
    let record_size = layout.byte_size();
    if payload.len() % record_size != 0 {
        return Err(LoadError::MisalignedPayload {
            path: path.to_path_buf(),
            payload: payload.len(),
            record: record_size,
        });
    }
    let n_rows = payload.len() / record_size;

    // Decode column by column within each record.
    let flat = layout.flat_fields();
    let mut builders: Vec<Vec<f64>> = flat
        .iter()
        .map(|f| Vec::with_capacity(n_rows * f.width))
        .collect();

    for row in 0..n_rows {
        let record = &payload[row * record_size..(row + 1) * record_size];
        for (field, out) in flat.iter().zip(builders.iter_mut()) {
            let scalar_size = field.ty.kind.size();
            for k in 0..field.width {
                let at = field.offset + k * scalar_size;
                out.push(read_scalar(&record[at..at + scalar_size], field.ty));
            }
        }
    }

    let columns: BTreeMap<String, Column> = flat
        .iter()
        .zip(builders)
        .map(|(f, data)| (f.name.clone(), Column::new(data, f.width)))
        .collect();

    Ok(DiagTable::new(layout, columns, n_rows))
}

/// Decode one scalar, widening to `f64`.
fn read_scalar(bytes: &[u8], ty: ScalarType) -> f64 {
    if ty.big_endian {
        read_with::<BigEndian>(bytes, ty.kind)
    } else {
        read_with::<LittleEndian>(bytes, ty.kind)
    }
}

fn read_with<B: ByteOrder>(bytes: &[u8], kind: ScalarKind) -> f64 {
    match kind {
        ScalarKind::F32 => B::read_f32(bytes) as f64,
        ScalarKind::F64 => B::read_f64(bytes),
        ScalarKind::I8 => bytes[0] as i8 as f64,
        ScalarKind::I16 => B::read_i16(bytes) as f64,
        ScalarKind::I32 => B::read_i32(bytes) as f64,
        ScalarKind::I64 => B::read_i64(bytes) as f64,
        ScalarKind::U8 => bytes[0] as f64,
        ScalarKind::U16 => B::read_u16(bytes) as f64,
        ScalarKind::U32 => B::read_u32(bytes) as f64,
        ScalarKind::U64 => B::read_u64(bytes) as f64,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
