//! MATLAB level-5 MAT-file reader.
//!
//! Only the subset needed to pull motion-capture tables out of a container is
//! supported: numeric arrays of any class, char arrays, cell arrays and struct
//! arrays, optionally wrapped in zlib-compressed elements.
//!
//! # Layout
//!
//! ```text
//! UINT8[116]   - Descriptive text
//! UINT8[8]     - Subsystem data offset
//! UINT16       - Version (0x0100)
//! UINT8[2]     - Endian indicator ("IM" little-endian, "MI" big-endian)
//! foreach element
//!     UINT32   - Data type (miMATRIX, miCOMPRESSED, ...)
//!     UINT32   - Number of bytes
//!     UINT8[n] - Data, padded to 8 bytes
//! end
//! ```
//!
//! Elements whose size fits in four bytes use the packed "small element"
//! form, where type and size share the first word.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use tracing::debug;

use crate::error::{Result, TableError};

/// Size of the file header in bytes.
const HEADER_SIZE: usize = 128;

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;

const MX_CELL_CLASS: u8 = 1;
const MX_STRUCT_CLASS: u8 = 2;
const MX_CHAR_CLASS: u8 = 4;
const MX_SPARSE_CLASS: u8 = 5;

/// A decoded MATLAB array.
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    /// Numeric or logical array, values converted to `f64` (column-major).
    Numeric {
        /// Array dimensions.
        dims: Vec<usize>,
        /// Real part, column-major.
        data: Vec<f64>,
    },
    /// Character array.
    Char(String),
    /// Cell array (column-major).
    Cell {
        /// Array dimensions.
        dims: Vec<usize>,
        /// Cell contents.
        items: Vec<MatValue>,
    },
    /// Struct array.
    Struct {
        /// Array dimensions.
        dims: Vec<usize>,
        /// Field names in declaration order.
        fields: Vec<String>,
        /// One entry per struct element, each holding one value per field.
        /// Empty when the struct declares no fields.
        elements: Vec<Vec<MatValue>>,
    },
    /// A zero-byte matrix element (empty placeholder).
    Empty,
    /// An array class this reader does not decode (e.g. sparse, objects).
    Unsupported(u8),
}

impl MatValue {
    /// Number of elements described by the dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric { data, .. } => data.len(),
            Self::Char(s) => s.chars().count(),
            Self::Cell { items, .. } => items.len(),
            Self::Struct { elements, .. } => elements.len(),
            Self::Empty | Self::Unsupported(_) => 0,
        }
    }

    /// Whether the value holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Top-level variables of a MAT file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatFile {
    /// `(name, value)` pairs.
    pub variables: Vec<(String, MatValue)>,
}

impl MatFile {
    /// Look up a variable by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MatValue> {
        self.variables
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    /// Variable names in file order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.variables.iter().map(|(n, _)| n.clone()).collect()
    }
}

/// Load and decode a MAT file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a level-5 MAT file.
pub fn load_mat<P: AsRef<Path>>(path: P) -> Result<MatFile> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| TableError::from_open(path, e))?;
    let file = parse_mat(&bytes)?;
    debug!(path = %path.display(), variables = ?file.names(), "Loaded MAT file");
    Ok(file)
}

/// Decode MAT-file bytes.
///
/// # Errors
///
/// Returns an error if the header or any element is malformed.
pub fn parse_mat(bytes: &[u8]) -> Result<MatFile> {
    if bytes.len() < HEADER_SIZE {
        return Err(TableError::invalid_mat("file too small for a level-5 header"));
    }
    let big_endian = match &bytes[126..128] {
        b"IM" => false,
        b"MI" => true,
        _ => return Err(TableError::invalid_mat("missing endian indicator")),
    };

    let mut reader = ByteReader::new(&bytes[HEADER_SIZE..], big_endian);
    let mut file = MatFile::default();
    while !reader.at_end() {
        if let Some((name, value)) = read_variable(&mut reader)? {
            file.variables.push((name, value));
        }
    }
    Ok(file)
}

/// Read one top-level element; non-matrix elements are skipped.
fn read_variable(reader: &mut ByteReader<'_>) -> Result<Option<(String, MatValue)>> {
    let (data_type, payload) = reader.read_element()?;
    match data_type {
        MI_MATRIX => read_matrix(payload, reader.big_endian).map(Some),
        MI_COMPRESSED => {
            let mut inflated = Vec::new();
            ZlibDecoder::new(payload)
                .read_to_end(&mut inflated)
                .map_err(|e| TableError::invalid_mat(format!("zlib: {e}")))?;
            let mut inner = ByteReader::new(&inflated, reader.big_endian);
            read_variable(&mut inner)
        }
        other => {
            debug!(data_type = other, "Skipping non-matrix MAT element");
            Ok(None)
        }
    }
}

/// Decode the payload of a `miMATRIX` element.
fn read_matrix(payload: &[u8], big_endian: bool) -> Result<(String, MatValue)> {
    if payload.is_empty() {
        return Ok((String::new(), MatValue::Empty));
    }
    let mut reader = ByteReader::new(payload, big_endian);

    let (_, flags) = reader.read_element()?;
    let flags = reader.words_u32(flags)?;
    let class = flags
        .first()
        .map(|f| (f & 0xFF) as u8)
        .ok_or_else(|| TableError::invalid_mat("missing array flags"))?;

    let (dims_type, dims) = reader.read_element()?;
    let dims: Vec<usize> = reader
        .numeric(dims_type, dims)?
        .into_iter()
        .map(|d| d as usize)
        .collect();
    let count = element_count(&dims)?;

    let (_, name) = reader.read_element()?;
    let name = String::from_utf8_lossy(name).into_owned();

    let value = match class {
        MX_CELL_CLASS => {
            reader.ensure_nested(count)?;
            let mut items = Vec::new();
            for _ in 0..count {
                items.push(read_nested(&mut reader)?);
            }
            MatValue::Cell { dims, items }
        }
        MX_STRUCT_CLASS => {
            let (len_type, len_bytes) = reader.read_element()?;
            let name_len = reader
                .numeric(len_type, len_bytes)?
                .first()
                .map(|v| *v as usize)
                .ok_or_else(|| TableError::invalid_mat("missing field name length"))?;
            let (_, raw_names) = reader.read_element()?;
            let fields: Vec<String> = if name_len == 0 {
                Vec::new()
            } else {
                raw_names
                    .chunks(name_len)
                    .map(|chunk| {
                        let end = chunk.iter().position(|b| *b == 0).unwrap_or(chunk.len());
                        String::from_utf8_lossy(&chunk[..end]).into_owned()
                    })
                    .collect()
            };
            let nested = count
                .checked_mul(fields.len())
                .ok_or_else(|| TableError::invalid_mat("struct size overflows"))?;
            reader.ensure_nested(nested)?;
            let mut elements = Vec::new();
            if !fields.is_empty() {
                for _ in 0..count {
                    let mut values = Vec::with_capacity(fields.len());
                    for _ in &fields {
                        values.push(read_nested(&mut reader)?);
                    }
                    elements.push(values);
                }
            }
            MatValue::Struct {
                dims,
                fields,
                elements,
            }
        }
        MX_CHAR_CLASS => {
            let (data_type, data) = reader.read_element()?;
            let text = match data_type {
                MI_UTF8 | MI_INT8 | MI_UINT8 => String::from_utf8_lossy(data).into_owned(),
                _ => {
                    let units: Vec<u16> = reader
                        .numeric(data_type, data)?
                        .into_iter()
                        .map(|v| v as u16)
                        .collect();
                    String::from_utf16_lossy(&units)
                }
            };
            MatValue::Char(text)
        }
        MX_SPARSE_CLASS => MatValue::Unsupported(class),
        6..=15 => {
            let (data_type, data) = reader.read_element()?;
            let data = reader.numeric(data_type, data)?;
            MatValue::Numeric { dims, data }
        }
        other => MatValue::Unsupported(other),
    };

    Ok((name, value))
}

/// Product of the array dimensions.
fn element_count(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| TableError::invalid_mat(format!("array dimensions {dims:?} overflow")))
}

/// Read an unnamed matrix nested in a cell or struct.
fn read_nested(reader: &mut ByteReader<'_>) -> Result<MatValue> {
    let (data_type, payload) = reader.read_element()?;
    if data_type != MI_MATRIX {
        return Err(TableError::invalid_mat(format!(
            "expected nested matrix, found data type {data_type}"
        )));
    }
    read_matrix(payload, reader.big_endian).map(|(_, value)| value)
}

/// Cursor over element-structured bytes.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], big_endian: bool) -> Self {
        Self {
            data,
            pos: 0,
            big_endian,
        }
    }

    fn at_end(&self) -> bool {
        self.pos + 8 > self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Every nested matrix needs at least its 8-byte tag.
    fn ensure_nested(&self, nested: usize) -> Result<()> {
        if nested > self.remaining() / 8 {
            return Err(TableError::invalid_mat(format!(
                "{nested} nested elements declared but only {} bytes remain",
                self.remaining()
            )));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| TableError::invalid_mat(format!("unexpected end of data at {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32_from(&self, b: &[u8]) -> u32 {
        let arr = [b[0], b[1], b[2], b[3]];
        if self.big_endian {
            u32::from_be_bytes(arr)
        } else {
            u32::from_le_bytes(arr)
        }
    }

    /// Read one element tag and its payload, consuming padding.
    fn read_element(&mut self) -> Result<(u32, &'a [u8])> {
        let tag = self.take(8)?;
        let first = self.u32_from(&tag[0..4]);

        // Small data element: size in the upper half-word, data in the tag
        if first >> 16 != 0 {
            let data_type = first & 0xFFFF;
            let size = (first >> 16) as usize;
            if size > 4 {
                return Err(TableError::invalid_mat("small element larger than 4 bytes"));
            }
            return Ok((data_type, &tag[4..4 + size]));
        }

        let size = self.u32_from(&tag[4..8]) as usize;
        let payload = self.take(size)?;
        // Compressed elements are written without padding
        if first != MI_COMPRESSED {
            let padding = (8 - size % 8) % 8;
            self.pos = (self.pos + padding).min(self.data.len());
        }
        Ok((first, payload))
    }

    fn words_u32(&self, bytes: &[u8]) -> Result<Vec<u32>> {
        Ok(bytes.chunks_exact(4).map(|c| self.u32_from(c)).collect())
    }

    /// Decode a numeric payload of any `mi*` type into `f64`.
    fn numeric(&self, data_type: u32, bytes: &[u8]) -> Result<Vec<f64>> {
        let be = self.big_endian;
        let values = match data_type {
            MI_INT8 => bytes.iter().map(|b| f64::from(*b as i8)).collect(),
            MI_UINT8 | MI_UTF8 => bytes.iter().map(|b| f64::from(*b)).collect(),
            MI_INT16 => bytes
                .chunks_exact(2)
                .map(|c| {
                    let a = [c[0], c[1]];
                    f64::from(if be { i16::from_be_bytes(a) } else { i16::from_le_bytes(a) })
                })
                .collect(),
            MI_UINT16 | MI_UTF16 => bytes
                .chunks_exact(2)
                .map(|c| {
                    let a = [c[0], c[1]];
                    f64::from(if be { u16::from_be_bytes(a) } else { u16::from_le_bytes(a) })
                })
                .collect(),
            MI_INT32 => bytes
                .chunks_exact(4)
                .map(|c| {
                    let a = [c[0], c[1], c[2], c[3]];
                    f64::from(if be { i32::from_be_bytes(a) } else { i32::from_le_bytes(a) })
                })
                .collect(),
            MI_UINT32 => bytes
                .chunks_exact(4)
                .map(|c| f64::from(self.u32_from(c)))
                .collect(),
            MI_SINGLE => bytes
                .chunks_exact(4)
                .map(|c| {
                    let a = [c[0], c[1], c[2], c[3]];
                    f64::from(if be { f32::from_be_bytes(a) } else { f32::from_le_bytes(a) })
                })
                .collect(),
            MI_DOUBLE => bytes
                .chunks_exact(8)
                .map(|c| {
                    let a = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                    if be { f64::from_be_bytes(a) } else { f64::from_le_bytes(a) }
                })
                .collect(),
            MI_INT64 => bytes
                .chunks_exact(8)
                .map(|c| {
                    let a = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                    (if be { i64::from_be_bytes(a) } else { i64::from_le_bytes(a) }) as f64
                })
                .collect(),
            MI_UINT64 => bytes
                .chunks_exact(8)
                .map(|c| {
                    let a = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                    (if be { u64::from_be_bytes(a) } else { u64::from_le_bytes(a) }) as f64
                })
                .collect(),
            other => {
                return Err(TableError::invalid_mat(format!(
                    "unsupported numeric data type {other}"
                )));
            }
        };
        Ok(values)
    }
}

/// Flatten a struct variable into named columns.
///
/// Two layouts are accepted, matching how motion-capture exports are saved:
///
/// - a scalar struct whose fields are vectors (or cell arrays of scalars);
/// - a struct array whose elements hold one scalar per field.
///
/// Empty cells (`[]`) become `0.0`.
///
/// # Errors
///
/// Returns an error if the variable is not a struct or a cell holds more than
/// one value.
pub fn struct_columns(value: &MatValue) -> Result<Vec<(String, Vec<f64>)>> {
    let MatValue::Struct {
        fields, elements, ..
    } = value
    else {
        return Err(TableError::invalid_mat("expected a struct variable"));
    };

    if elements.len() == 1 {
        return fields
            .iter()
            .zip(&elements[0])
            .map(|(field, value)| Ok((field.clone(), field_vector(field, value)?)))
            .collect();
    }

    fields
        .iter()
        .enumerate()
        .map(|(f, field)| {
            let column = elements
                .iter()
                .enumerate()
                .map(|(i, element)| scalar_cell(field, i, &element[f]))
                .collect::<Result<Vec<_>>>()?;
            Ok((field.clone(), column))
        })
        .collect()
}

/// Values of one field of a scalar struct.
fn field_vector(field: &str, value: &MatValue) -> Result<Vec<f64>> {
    match value {
        MatValue::Numeric { data, .. } => Ok(data.clone()),
        MatValue::Cell { items, .. } => items
            .iter()
            .enumerate()
            .map(|(i, item)| scalar_cell(field, i, item))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

/// Coerce one cell to a scalar, mapping empty arrays to zero.
fn scalar_cell(field: &str, index: usize, value: &MatValue) -> Result<f64> {
    match value {
        MatValue::Numeric { data, .. } if data.len() == 1 => Ok(data[0]),
        v if v.is_empty() => Ok(0.0),
        v => Err(TableError::NonScalarCell {
            field: field.to_string(),
            index,
            len: v.len(),
        }),
    }
}
