use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Scalar type codes
// ---------------------------------------------------------------------------

/// Errors from descriptor parsing.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("file does not start with a JSON descriptor")]
    MissingDescriptor,
    #[error("invalid descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported scalar type code '{code}'")]
    TypeCode { code: String },
    #[error("field '{name}' has a zero-sized subarray shape")]
    EmptyShape { name: String },
    #[error("descriptor declares no fields")]
    EmptyRecord,
    #[error("field '{name}' occurs more than once")]
    DuplicateField { name: String },
}

/// Scalar kind + byte width, mirroring NumPy format characters
/// (`f8` = 8-byte float, `i4` = 4-byte signed int, `u1` = unsigned byte, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl ScalarKind {
    /// Width of one scalar in bytes.
    pub fn size(self) -> usize {
        match self {
            ScalarKind::I8 | ScalarKind::U8 => 1,
            ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::F32 | ScalarKind::I32 | ScalarKind::U32 => 4,
            ScalarKind::F64 | ScalarKind::I64 | ScalarKind::U64 => 8,
        }
    }
}

/// A fully resolved scalar type: kind plus byte order.
///
/// Parsed from strings like `"<f8"`, `">i4"`, `"=u2"`, `"|i1"`.
/// `=` resolves to the build target's endianness; `|` means "not applicable"
/// (single-byte types) and is treated as little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarType {
    pub kind: ScalarKind,
    pub big_endian: bool,
}

impl ScalarType {
    /// Parse a NumPy type-code string.
    pub fn parse(code: &str) -> Result<Self, SchemaError> {
        let unsupported = || SchemaError::TypeCode {
            code: code.to_string(),
        };

        let mut chars = code.chars();
        let order = chars.next().ok_or_else(unsupported)?;
        let big_endian = match order {
            '<' | '|' => false,
            '>' => true,
            '=' => cfg!(target_endian = "big"),
            _ => return Err(unsupported()),
        };

        let kind = match chars.as_str() {
            "f4" => ScalarKind::F32,
            "f8" => ScalarKind::F64,
            "i1" => ScalarKind::I8,
            "i2" => ScalarKind::I16,
            "i4" => ScalarKind::I32,
            "i8" => ScalarKind::I64,
            "u1" => ScalarKind::U8,
            "u2" => ScalarKind::U16,
            "u4" => ScalarKind::U32,
            "u8" => ScalarKind::U64,
            _ => return Err(unsupported()),
        };

        Ok(ScalarType { kind, big_endian })
    }
}

// ---------------------------------------------------------------------------
// Record layout: the parsed descriptor
// ---------------------------------------------------------------------------

/// Layout of a single named field inside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLayout {
    /// One scalar value per timestep (`["time", "<f8"]`).
    Scalar(ScalarType),
    /// A fixed-length subarray, one value per slice (`["[x]", "<f8", [64]]`).
    Array(ScalarType, usize),
    /// A nested record, used for the `average` and `total` groups
    /// (`["average", [["[x]", "<f8"], ...]]`).
    Record(Vec<FieldSpec>),
}

/// One named field of the record layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub layout: FieldLayout,
}

/// The full record layout of one diagnostic file.
///
/// Equality between two layouts is the cross-file compatibility check when
/// aggregating: field names, order, types, and subarray lengths must all
/// match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordLayout {
    pub fields: Vec<FieldSpec>,
}

/// A leaf field after flattening nested records: dotted name
/// (`"average.[x^2]"`), scalar type, number of values, and byte offset from
/// the start of the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatField {
    pub name: String,
    pub ty: ScalarType,
    pub width: usize,
    pub offset: usize,
}

impl RecordLayout {
    /// Size in bytes of one binary record.
    pub fn byte_size(&self) -> usize {
        fn size_of(fields: &[FieldSpec]) -> usize {
            fields
                .iter()
                .map(|f| match &f.layout {
                    FieldLayout::Scalar(ty) => ty.kind.size(),
                    FieldLayout::Array(ty, len) => ty.kind.size() * len,
                    FieldLayout::Record(sub) => size_of(sub),
                })
                .sum()
        }
        size_of(&self.fields)
    }

    /// Flatten nested records into leaf fields with dotted names and byte
    /// offsets, in declaration order.
    pub fn flat_fields(&self) -> Vec<FlatField> {
        fn walk(fields: &[FieldSpec], prefix: &str, offset: &mut usize, out: &mut Vec<FlatField>) {
            for f in fields {
                let name = if prefix.is_empty() {
                    f.name.clone()
                } else {
                    format!("{prefix}.{}", f.name)
                };
                match &f.layout {
                    FieldLayout::Scalar(ty) => {
                        out.push(FlatField {
                            name,
                            ty: *ty,
                            width: 1,
                            offset: *offset,
                        });
                        *offset += ty.kind.size();
                    }
                    FieldLayout::Array(ty, len) => {
                        out.push(FlatField {
                            name,
                            ty: *ty,
                            width: *len,
                            offset: *offset,
                        });
                        *offset += ty.kind.size() * len;
                    }
                    FieldLayout::Record(sub) => walk(sub, &name, offset, out),
                }
            }
        }
        let mut out = Vec::new();
        let mut offset = 0;
        walk(&self.fields, "", &mut offset, &mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// JSON descriptor parsing
// ---------------------------------------------------------------------------

/// The three shapes a field spec can take in the JSON descriptor.
/// Untagged: serde tries each variant in order against the JSON array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawField {
    Scalar(String, String),
    Array(String, String, Vec<u64>),
    Record(String, Vec<RawField>),
}

/// The full header: `[descr, offset]`.
#[derive(Debug, Deserialize)]
struct RawHeader(Vec<RawField>, u64);

fn convert_fields(raw: Vec<RawField>) -> Result<Vec<FieldSpec>, SchemaError> {
    raw.into_iter()
        .map(|f| {
            Ok(match f {
                RawField::Scalar(name, code) => FieldSpec {
                    layout: FieldLayout::Scalar(ScalarType::parse(&code)?),
                    name,
                },
                RawField::Array(name, code, shape) => {
                    let len: u64 = shape.iter().product();
                    if len == 0 {
                        return Err(SchemaError::EmptyShape { name });
                    }
                    FieldSpec {
                        layout: FieldLayout::Array(ScalarType::parse(&code)?, len as usize),
                        name,
                    }
                }
                RawField::Record(name, sub) => {
                    if sub.is_empty() {
                        return Err(SchemaError::EmptyRecord);
                    }
                    FieldSpec {
                        layout: FieldLayout::Record(convert_fields(sub)?),
                        name,
                    }
                }
            })
        })
        .collect()
}

/// Parse the leading JSON value of a diagnostic file.
///
/// The file head is `[descr, offset]` where `descr` is a structured-dtype
/// field list and `offset` is where the binary payload begins. Only the first
/// complete JSON value is consumed; everything after it (padding, then raw
/// payload bytes) is ignored here.
pub fn parse_header(text: &str) -> Result<(RecordLayout, u64), SchemaError> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<RawHeader>();
    let raw = match stream.next() {
        Some(result) => result?,
        None => return Err(SchemaError::MissingDescriptor),
    };
    if raw.0.is_empty() {
        return Err(SchemaError::EmptyRecord);
    }
    let layout = RecordLayout {
        fields: convert_fields(raw.0)?,
    };

    // Reject ambiguous layouts: a duplicate would silently shadow the
    // earlier field's payload bytes in the decoded table. Checking the
    // flattened dotted names also catches a top-level field colliding with
    // a nested group member.
    let mut seen = BTreeSet::new();
    for field in layout.flat_fields() {
        if !seen.insert(field.name.clone()) {
            return Err(SchemaError::DuplicateField { name: field.name });
        }
    }

    Ok((layout, raw.1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
