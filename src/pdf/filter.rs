//! Stream filter decoding.
//!
//! Only the filters the reader needs are implemented: FlateDecode,
//! ASCIIHexDecode, and ASCII85Decode. `/DecodeParms` predictors are not
//! applied.

use std::io::Read;

use flate2::read::ZlibDecoder;
use log::trace;

use crate::error::{PDFError, Result};

use super::object::{Object, Stream};
use super::parser::is_whitespace;

/// Decode a stream's payload by applying its `/Filter` chain in order.
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>> {
    let filter = match stream.dict.get("Filter") {
        None => return Ok(stream.data.clone()),
        Some(f) => f,
    };

    let names: Vec<&str> = match filter {
        Object::Name(n) => vec![n.as_str()],
        Object::Array(items) => items
            .iter()
            .map(|item| {
                item.as_name()
                    .ok_or_else(|| PDFError::UnsupportedFilter("non-name filter entry".into()))
            })
            .collect::<Result<_>>()?,
        _ => return Err(PDFError::UnsupportedFilter("non-name filter entry".into())),
    };

    let mut data = stream.data.clone();
    for name in names {
        trace!("applying filter {}", name);
        data = apply_filter(name, &data)?;
    }
    Ok(data)
}

/// Apply a single named filter.
pub fn apply_filter(name: &str, data: &[u8]) -> Result<Vec<u8>> {
    match name {
        "FlateDecode" => flate_decode(data),
        "ASCIIHexDecode" => ascii_hex_decode(data),
        "ASCII85Decode" => ascii85_decode(data),
        other => Err(PDFError::UnsupportedFilter(other.to_string())),
    }
}

/// Decompress zlib-wrapped deflate data.
fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PDFError::parse(0, format!("flate decode: {e}")))?;
    Ok(out)
}

/// Decode ASCII hex data terminated by `>`. Whitespace is tolerated and an
/// odd trailing nibble is padded with zero.
fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for &b in data {
        if b == b'>' {
            break;
        }
        if is_whitespace(b) {
            continue;
        }
        let v = super::parser::unhex(b)
            .ok_or_else(|| PDFError::parse(0, format!("invalid hex digit {:?}", b as char)))?;
        match pending.take() {
            None => pending = Some(v),
            Some(hi) => out.push((hi << 4) | v),
        }
    }
    if let Some(hi) = pending {
        out.push(hi << 4);
    }
    Ok(out)
}

/// Decode standard ASCII85 data terminated by `~>`.
fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = match data.windows(2).position(|w| w == b"~>") {
        Some(end) => &data[..end],
        None => data,
    };

    // Filter whitespace and expand the z shorthand for a zero group.
    let mut filtered = Vec::with_capacity(data.len());
    for &b in data {
        match b {
            b'z' => filtered.extend_from_slice(b"!!!!!"),
            b'!'..=b'u' => filtered.push(b),
            b if is_whitespace(b) => continue,
            other => {
                return Err(PDFError::parse(
                    0,
                    format!("invalid ascii85 character {:?}", other as char),
                ))
            }
        }
    }

    let mut out = Vec::with_capacity(filtered.len() * 4 / 5 + 4);
    for chunk in filtered.chunks(5) {
        if chunk.len() == 1 {
            return Err(PDFError::parse(0, "truncated ascii85 group"));
        }
        let mut padded = [b'u'; 5];
        padded[..chunk.len()].copy_from_slice(chunk);
        let mut value: u64 = 0;
        for &b in &padded {
            value = value * 85 + u64::from(b - b'!');
        }
        // Padding a partial group with the maximum digit can carry past
        // 32 bits; the encoded bytes live in the low 32.
        let bytes = (value as u32).to_be_bytes();
        if chunk.len() == 5 {
            out.extend_from_slice(&bytes);
        } else {
            out.extend_from_slice(&bytes[..chunk.len() - 1]);
        }
    }
    Ok(out)
}
