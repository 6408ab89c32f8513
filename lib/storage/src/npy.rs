//! NumPy `.npy` encoding for row-major `f32` matrices.
//!
//! Only what the vector store needs: little-endian `<f4`, C order, 2-D shape.
//! Files are written as format 1.0; 2.0 and 3.0 headers are accepted on read.

use bytes::{Buf, BufMut, BytesMut};
use simgraph_core::{Error, Result, Vector};
use std::io::Read;

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGN: usize = 64;
const DESCR: &str = "<f4";
/// Largest header dict accepted on read
const MAX_HEADER_LEN: usize = 64 * 1024;

/// Shape of a stored matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NpyHeader {
    pub rows: usize,
    pub cols: usize,
}

/// Encode `vectors` as an `(N, dimension)` matrix.
pub fn encode(vectors: &[Vector], dimension: usize) -> Result<BytesMut> {
    let dict = format!(
        "{{'descr': '{DESCR}', 'fortran_order': False, 'shape': ({}, {}), }}",
        vectors.len(),
        dimension
    );
    // magic + version + u16 length + dict + '\n', padded to ALIGN
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    let header_len = dict.len() + padding + 1;
    let header_len = u16::try_from(header_len)
        .map_err(|_| Error::Serialization("npy header too large".to_string()))?;

    let mut buf = BytesMut::with_capacity(unpadded + padding + vectors.len() * dimension * 4);
    buf.put_slice(MAGIC);
    buf.put_u8(1);
    buf.put_u8(0);
    buf.put_u16_le(header_len);
    buf.put_slice(dict.as_bytes());
    buf.put_bytes(b' ', padding);
    buf.put_u8(b'\n');

    for (row, v) in vectors.iter().enumerate() {
        if v.dim() != dimension {
            return Err(Error::InvalidDimension {
                expected: dimension,
                actual: v.dim(),
                row,
            });
        }
        for x in v.as_slice() {
            buf.put_f32_le(*x);
        }
    }
    Ok(buf)
}

/// Parse the header at the start of `data`, returning it with the payload offset.
pub fn parse_header(data: &[u8]) -> Result<(NpyHeader, usize)> {
    if data.len() < MAGIC.len() + 4 || &data[..MAGIC.len()] != MAGIC {
        return Err(Error::Persistence("not an .npy file".to_string()));
    }
    let mut buf = &data[MAGIC.len()..];
    let major = buf.get_u8();
    let _minor = buf.get_u8();
    let (len, prefix) = match major {
        1 => (buf.get_u16_le() as usize, MAGIC.len() + 4),
        2 | 3 => {
            if buf.remaining() < 4 {
                return Err(Error::Persistence("truncated .npy header".to_string()));
            }
            (buf.get_u32_le() as usize, MAGIC.len() + 6)
        }
        v => return Err(Error::Persistence(format!("unsupported .npy version {v}"))),
    };
    let end = prefix + len;
    if data.len() < end {
        return Err(Error::Persistence("truncated .npy header".to_string()));
    }
    let dict = std::str::from_utf8(&data[prefix..end])
        .map_err(|_| Error::Persistence("non-utf8 .npy header".to_string()))?;
    Ok((parse_dict(dict)?, end))
}

/// Read only the header from a reader.
pub fn read_header<R: Read>(mut reader: R) -> Result<NpyHeader> {
    let mut head = vec![0u8; MAGIC.len() + 2];
    reader.read_exact(&mut head)?;
    if &head[..MAGIC.len()] != MAGIC {
        return Err(Error::Persistence("not an .npy file".to_string()));
    }
    let len_bytes = match head[MAGIC.len()] {
        1 => 2,
        2 | 3 => 4,
        v => return Err(Error::Persistence(format!("unsupported .npy version {v}"))),
    };
    let mut len = vec![0u8; len_bytes];
    reader.read_exact(&mut len)?;
    let dict_len = match len.as_slice() {
        [a, b] => u16::from_le_bytes([*a, *b]) as usize,
        [a, b, c, d] => u32::from_le_bytes([*a, *b, *c, *d]) as usize,
        _ => return Err(Error::Persistence("truncated .npy header".to_string())),
    };
    if dict_len > MAX_HEADER_LEN {
        return Err(Error::Persistence(format!("npy header of {dict_len} bytes exceeds {MAX_HEADER_LEN}")));
    }
    let mut dict = vec![0u8; dict_len];
    reader.read_exact(&mut dict)?;

    head.extend_from_slice(&len);
    head.extend_from_slice(&dict);
    parse_header(&head).map(|(h, _)| h)
}

/// Payload size in bytes of a `rows x cols` `f32` matrix.
pub fn payload_len(header: &NpyHeader) -> Result<usize> {
    header
        .rows
        .checked_mul(header.cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            Error::Persistence(format!(
                "npy shape ({}, {}) overflows the addressable size",
                header.rows, header.cols
            ))
        })
}

/// Decode a whole `.npy` buffer into rows.
pub fn decode(data: &[u8]) -> Result<(NpyHeader, Vec<Vector>)> {
    let (header, offset) = parse_header(data)?;
    if header.cols == 0 && header.rows > 0 {
        return Err(Error::Persistence(format!("npy shape ({}, 0) has no columns", header.rows)));
    }
    let expected = payload_len(&header)?;
    let mut payload = &data[offset..];
    if payload.len() != expected {
        return Err(Error::Persistence(format!(
            "npy payload is {} bytes, shape ({}, {}) needs {expected}",
            payload.len(),
            header.rows,
            header.cols
        )));
    }
    let mut rows = Vec::with_capacity(header.rows);
    for _ in 0..header.rows {
        let row: Vec<f32> = (0..header.cols).map(|_| payload.get_f32_le()).collect();
        rows.push(Vector::new(row));
    }
    Ok((header, rows))
}

fn parse_dict(dict: &str) -> Result<NpyHeader> {
    let descr = dict_value(dict, "descr")
        .map(|v| v.trim_matches(|c| c == '\'' || c == '"'))
        .ok_or_else(|| Error::Persistence("npy header lacks descr".to_string()))?;
    if descr != DESCR {
        return Err(Error::Persistence(format!("unsupported npy dtype {descr}, expected {DESCR}")));
    }
    if dict_value(dict, "fortran_order") != Some("False") {
        return Err(Error::Persistence("fortran-ordered npy arrays are not supported".to_string()));
    }

    let shape = dict
        .find("'shape'")
        .and_then(|i| {
            let rest = &dict[i..];
            let open = rest.find('(')?;
            let close = rest.find(')')?;
            Some(&rest[open + 1..close])
        })
        .ok_or_else(|| Error::Persistence("npy header lacks shape".to_string()))?;
    let dims: Vec<usize> = shape
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::Persistence(format!("bad npy shape ({shape}): {e}")))?;

    match dims.as_slice() {
        [rows, cols] => Ok(NpyHeader { rows: *rows, cols: *cols }),
        _ => Err(Error::Persistence(format!("expected a 2-D npy array, got shape ({shape})"))),
    }
}

/// Scalar value of `key` in a Python dict literal.
fn dict_value<'a>(dict: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{key}':");
    let start = dict.find(&pattern)? + pattern.len();
    let rest = dict[start..].trim_start();
    let end = rest.find([',', '}']).unwrap_or(rest.len());
    Some(rest[..end].trim())
}
