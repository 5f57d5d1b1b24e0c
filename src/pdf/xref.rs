//! Cross-reference table parsing.
//!
//! Handles both classical `xref` tables and cross-reference streams, and
//! merges `/Prev` chains so that entries from the most recent section win.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::error::{PDFError, Result};

use super::filter::decode_stream;
use super::object::{Dict, Object};
use super::parser::Parser;

/// How many bytes from the end of the file the `startxref` marker is
/// searched in.
const STARTXREF_WINDOW: usize = 1024;

/// Longest `/Prev` chain that is followed before reporting corruption.
const MAX_PREV_SECTIONS: usize = 64;

/// One cross-reference entry.
///
/// For compressed objects (type 2 in xref streams) the offset field holds
/// the containing object stream's number and the generation field holds
/// the index within that stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefEntry {
    pub offset: u64,
    pub generation: u32,
    pub in_use: bool,
}

/// Maps object numbers to their entries.
#[derive(Debug, Default)]
pub struct XrefTable {
    entries: HashMap<u32, XrefEntry>,
}

impl XrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, number: u32) -> Option<&XrefEntry> {
        self.entries.get(&number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &XrefEntry)> {
        self.entries.iter().map(|(&k, v)| (k, v))
    }

    /// Highest object number present in the table.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Insert an entry unless the object already has one. Sections are
    /// parsed from most recent to oldest, so the first insertion wins.
    fn insert_if_absent(&mut self, number: u32, entry: XrefEntry) {
        self.entries.entry(number).or_insert(entry);
    }
}

/// Locate the xref offset by reading the integer after `startxref` within
/// the last kilobyte of the file.
pub fn find_start_xref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let tail = &data[window_start..];

    let idx = rfind(tail, b"startxref")
        .ok_or_else(|| PDFError::xref("startxref marker not found"))?;

    let mut parser = Parser::at(data, window_start + idx + b"startxref".len());
    let tok = parser.read_token();
    std::str::from_utf8(tok)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| {
            PDFError::xref(format!(
                "invalid startxref offset {:?}",
                String::from_utf8_lossy(tok)
            ))
        })
}

/// Parse the cross-reference data reachable from the given offset,
/// following `/Prev` links. Returns the merged table and the most recent
/// trailer dictionary.
pub fn parse_xref(data: &[u8], start: usize) -> Result<(XrefTable, Dict)> {
    let mut table = XrefTable::new();
    let mut trailer: Option<Dict> = None;
    let mut visited: HashSet<usize> = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next {
        if !visited.insert(offset) || visited.len() > MAX_PREV_SECTIONS {
            return Err(PDFError::xref("loop in /Prev chain"));
        }
        let section_trailer = parse_section(data, offset, &mut table)?;
        next = section_trailer
            .get_int("Prev")
            .and_then(|p| usize::try_from(p).ok());
        if trailer.is_none() {
            trailer = Some(section_trailer);
        }
    }

    debug!("xref: {} entries across {} section(s)", table.len(), visited.len());
    Ok((table, trailer.unwrap_or_default()))
}

/// Parse one xref section (classical table or xref stream) into `table`,
/// returning that section's trailer dictionary.
fn parse_section(data: &[u8], offset: usize, table: &mut XrefTable) -> Result<Dict> {
    if offset >= data.len() {
        return Err(PDFError::xref(format!("xref offset {offset} out of bounds")));
    }

    if data[offset..].starts_with(b"xref") {
        parse_classical_section(data, offset, table)
    } else {
        parse_stream_section(data, offset, table)
    }
}

fn parse_classical_section(data: &[u8], offset: usize, table: &mut XrefTable) -> Result<Dict> {
    let mut parser = Parser::at(data, offset + b"xref".len());

    loop {
        parser.skip_whitespace();
        let at = parser.position();
        if at >= data.len() {
            return Err(PDFError::xref("xref table without trailer"));
        }

        if data[at..].starts_with(b"trailer") {
            let mut trailer_parser = Parser::at(data, at + b"trailer".len());
            let obj = trailer_parser.parse_object()?;
            return obj
                .as_dict()
                .cloned()
                .ok_or_else(|| PDFError::xref("trailer is not a dictionary"));
        }

        // Subsection header: start count
        let start = read_xref_int(&mut parser, "subsection start")?;
        let count = read_xref_int(&mut parser, "subsection count")?;
        trace!("xref subsection {} +{}", start, count);

        for i in 0..count {
            let entry_offset = read_xref_int(&mut parser, "entry offset")?;
            let generation = read_xref_int(&mut parser, "entry generation")?;
            let at = parser.position();
            let kind = parser.read_token();
            let in_use = match kind {
                b"n" => true,
                b"f" => false,
                _ => {
                    return Err(PDFError::xref(format!(
                        "invalid entry type at byte {at}"
                    )))
                }
            };
            table.insert_if_absent(
                (start + i) as u32,
                XrefEntry {
                    offset: entry_offset,
                    generation: generation as u32,
                    in_use,
                },
            );
        }
    }
}

fn parse_stream_section(data: &[u8], offset: usize, table: &mut XrefTable) -> Result<Dict> {
    let mut parser = Parser::at(data, offset);
    let obj = parser.parse_indirect_object()?;
    let stream = obj
        .value
        .as_stream()
        .ok_or_else(|| PDFError::xref("xref stream is not a stream object"))?;

    let decoded = decode_stream(stream)?;
    let dict = &stream.dict;

    let widths: Vec<usize> = dict
        .get_array("W")
        .map(|arr| {
            arr.iter()
                .filter_map(Object::as_int)
                .map(|w| w.max(0) as usize)
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(PDFError::xref("xref stream /W must have 3 small widths"));
    }
    let record_size: usize = widths.iter().sum();
    if record_size == 0 {
        return Err(PDFError::xref("xref stream /W is all zeros"));
    }

    // /Index holds (start, count) pairs; the default is a single run of
    // /Size entries from object 0.
    let indices: Vec<i64> = match dict.get_array("Index") {
        Some(arr) => arr.iter().filter_map(Object::as_int).collect(),
        None => vec![0, dict.get_int("Size").unwrap_or(0)],
    };

    let mut pos = 0usize;
    for pair in indices.chunks(2) {
        let [start, count] = pair else { break };
        for i in 0..*count {
            if pos + record_size > decoded.len() {
                break;
            }
            let mut fields = [0u64; 3];
            for (f, &w) in fields.iter_mut().zip(&widths) {
                for _ in 0..w {
                    *f = (*f << 8) | u64::from(decoded[pos]);
                    pos += 1;
                }
            }

            let number = (*start + i) as u32;
            // A zero-width first field defaults the record type to 1.
            let kind = if widths[0] == 0 { 1 } else { fields[0] };

            let entry = match kind {
                0 => XrefEntry {
                    offset: 0,
                    generation: fields[2] as u32,
                    in_use: false,
                },
                1 => XrefEntry {
                    offset: fields[1],
                    generation: fields[2] as u32,
                    in_use: true,
                },
                // Compressed object: keep the object stream number in the
                // offset field and the intra-stream index in generation.
                2 => XrefEntry {
                    offset: fields[1],
                    generation: fields[2] as u32,
                    in_use: true,
                },
                _ => continue,
            };
            table.insert_if_absent(number, entry);
        }
    }

    Ok(dict.clone())
}

fn read_xref_int(parser: &mut Parser<'_>, what: &str) -> Result<u64> {
    let at = parser.position();
    let tok = parser.read_token();
    std::str::from_utf8(tok)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| PDFError::xref(format!("invalid {what} at byte {at}")))
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).rev().find(|&i| &haystack[i..i + needle.len()] == needle)
}
