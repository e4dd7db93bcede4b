//! NPY array reader and writer
//!
//! The image cube is a single `.npy` array holding every cutout:
//! - Preamble { magic="\x93NUMPY", major, minor, header_len (u16 for v1, u32 for v2/v3) }
//! - Header   { python dict literal with 'descr', 'fortran_order', 'shape' }
//! - Data     { C-ordered elements }
//!
//! Cubes are decoded into `f32` samples shaped `(count, height, width, channels)`.

use crate::error::{PanelError, PanelResult};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{Array4, ArrayBase, Data, Dimension};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic bytes opening every NPY file
const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Total preamble + header length is padded to this alignment
const HEADER_ALIGN: usize = 64;

/// Largest header dict we accept before reading it
const MAX_HEADER_LEN: usize = 1 << 16;

/// Element types we know how to widen into `f32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl Scalar {
    fn from_kind(kind: char, size: usize) -> Option<Self> {
        let scalar = match (kind, size) {
            ('b', 1) => Scalar::Bool,
            ('i', 1) => Scalar::I8,
            ('i', 2) => Scalar::I16,
            ('i', 4) => Scalar::I32,
            ('i', 8) => Scalar::I64,
            ('u', 1) => Scalar::U8,
            ('u', 2) => Scalar::U16,
            ('u', 4) => Scalar::U32,
            ('u', 8) => Scalar::U64,
            ('f', 4) => Scalar::F32,
            ('f', 8) => Scalar::F64,
            _ => return None,
        };
        Some(scalar)
    }
}

/// Decoded `descr` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DType {
    pub scalar: Scalar,
    pub big_endian: bool,
}

impl DType {
    /// Parse a numpy type string such as `<f4`, `|u1` or `>i2`
    pub fn parse(descr: &str) -> Option<Self> {
        let mut chars = descr.chars();
        let order = chars.next()?;
        let big_endian = match order {
            '<' | '|' | '=' => false,
            '>' => true,
            _ => return None,
        };
        let kind = chars.next()?;
        let size: usize = chars.as_str().parse().ok()?;
        Some(Self {
            scalar: Scalar::from_kind(kind, size)?,
            big_endian,
        })
    }
}

/// Parsed NPY header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub dtype: DType,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

impl NpyHeader {
    /// Number of elements in the data section; `None` when the shape overflows
    pub fn element_count(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Parse the python dict literal stored in the header
    pub fn parse(source: &str, text: &str) -> PanelResult<Self> {
        let descr = dict_value(text, "descr")
            .ok_or_else(|| PanelError::parse(source, "header has no 'descr'"))?;
        let descr = descr.trim().trim_matches(|c| c == '\'' || c == '"');
        let dtype = DType::parse(descr)
            .ok_or_else(|| PanelError::parse(source, format!("unsupported dtype '{}'", descr)))?;

        let fortran = dict_value(text, "fortran_order")
            .ok_or_else(|| PanelError::parse(source, "header has no 'fortran_order'"))?;
        let fortran_order = match fortran.trim() {
            "False" => false,
            "True" => true,
            other => {
                return Err(PanelError::parse(
                    source,
                    format!("invalid fortran_order '{}'", other),
                ))
            }
        };

        let shape_text = dict_value(text, "shape")
            .ok_or_else(|| PanelError::parse(source, "header has no 'shape'"))?;
        let shape = shape_text
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|_| PanelError::parse(source, format!("invalid shape entry '{}'", s)))
            })
            .collect::<PanelResult<Vec<usize>>>()?;

        let header = Self {
            dtype,
            fortran_order,
            shape,
        };
        if header.element_count().is_none() {
            return Err(PanelError::parse(
                source,
                format!("shape {:?} has too many elements", header.shape),
            ));
        }
        Ok(header)
    }
}

/// Extract the raw value text following `'key':` in a python dict literal
fn dict_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let quoted = [format!("'{}'", key), format!("\"{}\"", key)];
    let start = quoted.iter().find_map(|k| text.find(k.as_str()).map(|i| i + k.len()))?;
    let rest = text[start..].trim_start().strip_prefix(':')?;

    // Values are either a tuple (may contain commas) or a scalar ending at ',' or '}'
    let rest = rest.trim_start();
    if rest.starts_with('(') {
        let end = rest.find(')')?;
        Some(&rest[..=end])
    } else {
        let end = rest.find(|c| c == ',' || c == '}')?;
        Some(&rest[..end])
    }
}

/// Read a `.npy` image cube from disk
pub fn read_npy<P: AsRef<Path>>(path: P) -> PanelResult<Array4<f32>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PanelError::missing_resource(path));
    }
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_npy_from(&mut reader, &path.display().to_string())
}

/// Read an image cube from any reader; `source` names it in error messages
pub fn read_npy_from<R: Read>(reader: &mut R, source: &str) -> PanelResult<Array4<f32>> {
    let header = read_header(reader, source)?;
    if header.fortran_order {
        return Err(PanelError::parse(source, "Fortran-ordered arrays are not supported"));
    }

    let (count, height, width, channels) = match header.shape.as_slice() {
        [n, h, w] => (*n, *h, *w, 1),
        [n, h, w, c] => (*n, *h, *w, *c),
        other => {
            return Err(PanelError::parse(
                source,
                format!("expected a 3D or 4D image cube, got shape {:?}", other),
            ))
        }
    };

    let elements = header
        .element_count()
        .ok_or_else(|| PanelError::parse(source, "shape has too many elements"))?;
    let decoded = if header.dtype.big_endian {
        read_elements::<BigEndian, R>(reader, header.dtype.scalar, elements)
    } else {
        read_elements::<LittleEndian, R>(reader, header.dtype.scalar, elements)
    };
    let samples = decoded
        .map_err(|e| PanelError::parse(source, format!("truncated data section: {}", e)))?;

    log::debug!(
        "Decoded {} images of {}x{}x{} from {}",
        count,
        height,
        width,
        channels,
        source
    );

    Array4::from_shape_vec((count, height, width, channels), samples)
        .map_err(|e| PanelError::parse(source, e.to_string()))
}

/// Read and validate the preamble and header dict
pub fn read_header<R: Read>(reader: &mut R, source: &str) -> PanelResult<NpyHeader> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if magic != NPY_MAGIC {
        return Err(PanelError::parse(source, "invalid magic bytes: expected \\x93NUMPY"));
    }

    let major = reader.read_u8()?;
    let _minor = reader.read_u8()?;
    let header_len = match major {
        1 => reader.read_u16::<LittleEndian>()? as usize,
        2 | 3 => reader.read_u32::<LittleEndian>()? as usize,
        v => return Err(PanelError::parse(source, format!("unsupported NPY version {}", v))),
    };
    if header_len > MAX_HEADER_LEN {
        return Err(PanelError::parse(
            source,
            format!("header length {} exceeds {} bytes", header_len, MAX_HEADER_LEN),
        ));
    }

    let mut header_bytes = vec![0u8; header_len];
    reader.read_exact(&mut header_bytes)?;
    let text = String::from_utf8_lossy(&header_bytes);
    NpyHeader::parse(source, &text)
}

fn read_elements<B: ByteOrder, R: Read>(
    reader: &mut R,
    scalar: Scalar,
    count: usize,
) -> std::io::Result<Vec<f32>> {
    // The header is untrusted; grow past this as data actually arrives
    let mut out = Vec::with_capacity(count.min(1 << 24));
    for _ in 0..count {
        let value = match scalar {
            Scalar::Bool => (reader.read_u8()? != 0) as u8 as f32,
            Scalar::I8 => reader.read_i8()? as f32,
            Scalar::I16 => reader.read_i16::<B>()? as f32,
            Scalar::I32 => reader.read_i32::<B>()? as f32,
            Scalar::I64 => reader.read_i64::<B>()? as f32,
            Scalar::U8 => reader.read_u8()? as f32,
            Scalar::U16 => reader.read_u16::<B>()? as f32,
            Scalar::U32 => reader.read_u32::<B>()? as f32,
            Scalar::U64 => reader.read_u64::<B>()? as f32,
            Scalar::F32 => reader.read_f32::<B>()?,
            Scalar::F64 => reader.read_f64::<B>()? as f32,
        };
        out.push(value);
    }
    Ok(out)
}

/// Write a little-endian `f32`, C-ordered NPY v1.0 file
pub fn write_npy<P, S, D>(path: P, array: &ArrayBase<S, D>) -> PanelResult<()>
where
    P: AsRef<Path>,
    S: Data<Elem = f32>,
    D: Dimension,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_npy_to(&mut writer, array)?;
    writer.flush()?;
    Ok(())
}

pub fn write_npy_to<W, S, D>(writer: &mut W, array: &ArrayBase<S, D>) -> PanelResult<()>
where
    W: Write,
    S: Data<Elem = f32>,
    D: Dimension,
{
    let shape = match array.shape() {
        [single] => format!("({},)", single),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': {}, }}",
        shape
    );

    // magic + version + u16 length + header + '\n'
    let unpadded = NPY_MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    writer.write_all(NPY_MAGIC)?;
    writer.write_u8(1)?;
    writer.write_u8(0)?;
    writer.write_u16::<LittleEndian>(header.len() as u16)?;
    writer.write_all(header.as_bytes())?;

    // Logical iteration order is C order regardless of memory layout
    for &value in array.iter() {
        writer.write_f32::<LittleEndian>(value)?;
    }
    Ok(())
}
