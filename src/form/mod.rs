//! Form filling and flattening as byte-level edits.
//!
//! Both operations treat the input buffer as the single source of truth.
//! `fill` rewrites field dictionaries in place and then rebuilds the
//! cross-reference table from scratch; `flatten` space-fills interactive
//! markers so that no byte offset moves and the original xref stays valid.

pub mod builder;

use std::collections::HashMap;
use std::path::Path;

use log::{debug, trace};
use regex::bytes::Regex;

use crate::doc::acroform::{flatten_fields, FormField};
use crate::doc::Document;
use crate::error::{PDFError, Result};

pub use builder::{Field, FieldType, FormBuilder};

/// Fill form fields by fully qualified name.
///
/// All names are validated before any byte is changed; an unknown name
/// fails the whole operation. An empty value map reproduces the input
/// byte for byte.
pub fn fill(input: &[u8], values: &HashMap<String, String>) -> Result<Vec<u8>> {
    if values.is_empty() {
        return Ok(input.to_vec());
    }

    let doc = Document::read(input.to_vec())?;
    let fields = doc.form_fields()?;
    if fields.is_empty() {
        return Err(PDFError::NoForm);
    }

    let flat = flatten_fields(&fields);
    let by_name: HashMap<&str, &FormField> =
        flat.iter().map(|f| (f.full_name.as_str(), *f)).collect();
    for name in values.keys() {
        if !by_name.contains_key(name.as_str()) {
            return Err(PDFError::FieldNotFound(name.clone()));
        }
    }

    let mut data = input.to_vec();
    for (name, value) in values {
        let field = by_name[name.as_str()];
        debug!("filling field {:?} ({})", name, field.field_type);
        data = set_field_value(data, field, value);
    }

    Ok(rebuild_xref(data))
}

/// Fill a form and write the result to a file.
pub fn fill_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    values: &HashMap<String, String>,
) -> Result<()> {
    let input = std::fs::read(input_path)?;
    let output = fill(&input, values)?;
    std::fs::write(output_path, output)?;
    Ok(())
}

/// Remove the interactive form structure while keeping every byte offset.
///
/// The output has the same length as the input; `/AcroForm` and the
/// per-field interactive markers are overwritten with spaces. A document
/// without form fields is returned unchanged.
pub fn flatten(input: &[u8]) -> Result<Vec<u8>> {
    let doc = Document::read(input.to_vec())?;
    let fields = doc.form_fields()?;
    if fields.is_empty() {
        return Ok(input.to_vec());
    }

    let mut data = input.to_vec();
    blank_acroform(&mut data);
    for field in flatten_fields(&fields) {
        blank_field_markers(&mut data, field);
    }
    Ok(data)
}

/// Flatten a form and write the result to a file.
pub fn flatten_file(input_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> Result<()> {
    let input = std::fs::read(input_path)?;
    let output = flatten(&input)?;
    std::fs::write(output_path, output)?;
    Ok(())
}

/// Escape a string for inclusion in a PDF literal string.
pub fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Rewrite every dictionary carrying this field's `/T` entry so its `/V`
/// holds the new value. A field dictionary can occur more than once (in
/// `/AcroForm /Fields` and as a page annotation); every occurrence is
/// edited.
fn set_field_value(mut data: Vec<u8>, field: &FormField, value: &str) -> Vec<u8> {
    let escaped_name = escape_pdf_string(&field.name);
    let patterns = [
        format!("/T ({escaped_name})").into_bytes(),
        format!("/T({escaped_name})").into_bytes(),
    ];

    let new_value = match field.field_type.as_str() {
        "Btn" => {
            if value == "true" || value == "Yes" || value == "on" {
                "/V /Yes /AS /Yes".to_string()
            } else {
                "/V /Off /AS /Off".to_string()
            }
        }
        _ => format!("/V ({})", escape_pdf_string(value)),
    };

    let v_string_re = Regex::new(r"/V\s*\([^)]*\)").unwrap();
    let v_name_re = Regex::new(r"/V\s+/[A-Za-z]+(\s+/AS\s+/[A-Za-z]+)?").unwrap();

    let mut search_from = 0usize;
    for _ in 0..10 {
        let hit = patterns
            .iter()
            .filter_map(|p| find(&data[search_from..], p))
            .min();
        let Some(rel) = hit else { break };
        let idx = search_from + rel;

        let Some(dict_start) = find_dict_start(&data, idx) else {
            break;
        };
        let Some(dict_end) = find_dict_end(&data, idx) else {
            break;
        };

        let field_dict = data[dict_start..dict_end + 2].to_vec();

        let new_dict = if let Some(m) = v_string_re.find(&field_dict) {
            splice(&field_dict, m.start(), m.end(), new_value.as_bytes())
        } else if let Some(m) = v_name_re.find(&field_dict) {
            splice(&field_dict, m.start(), m.end(), new_value.as_bytes())
        } else {
            // No /V yet: insert one just before the closing >>
            let mut d = field_dict[..field_dict.len() - 2].to_vec();
            d.push(b' ');
            d.extend_from_slice(new_value.as_bytes());
            d.extend_from_slice(b">>");
            d
        };

        trace!(
            "field {:?}: dict at [{dict_start}, {}) rewritten",
            field.name,
            dict_end + 2
        );
        search_from = dict_start + new_dict.len();
        data = splice(&data, dict_start, dict_end + 2, &new_dict);
    }

    data
}

/// Rebuild the classical xref table by scanning object headers.
///
/// The body up to the old `xref` keyword is kept verbatim; a fresh table
/// covering objects 0..=max follows, then the original trailer dictionary
/// and a new `startxref`.
pub(crate) fn rebuild_xref(data: Vec<u8>) -> Vec<u8> {
    let obj_re = Regex::new(r"(?m)^(\d+)[ \t]+(\d+)[ \t]+obj\b").unwrap();

    let mut offsets: HashMap<u32, (usize, u32)> = HashMap::new();
    let mut max_obj = 0u32;
    for caps in obj_re.captures_iter(&data) {
        let whole = caps.get(0).unwrap();
        let num: u32 = match std::str::from_utf8(&caps[1]).unwrap_or("").parse() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let gen: u32 = std::str::from_utf8(&caps[2])
            .unwrap_or("")
            .parse()
            .unwrap_or(0);
        offsets.insert(num, (whole.start(), gen));
        max_obj = max_obj.max(num);
    }
    if offsets.is_empty() {
        return data;
    }

    // Locate the old xref section and the trailer dictionary after it.
    let xref_idx = match rfind(&data, b"\nxref\n") {
        Some(i) => i + 1,
        None => match find(&data, b"xref\n") {
            Some(i) => i,
            None => return data,
        },
    };
    let Some(trailer_rel) = find(&data[xref_idx..], b"trailer") else {
        return data;
    };
    let trailer_abs = xref_idx + trailer_rel;
    let Some(startxref_rel) = find(&data[trailer_abs..], b"startxref") else {
        return data;
    };
    let trailer_dict =
        trim_bytes(&data[trailer_abs + b"trailer".len()..trailer_abs + startxref_rel]);

    let body = &data[..xref_idx];
    let new_xref_offset = body.len();

    let mut out = Vec::with_capacity(data.len() + 128);
    out.extend_from_slice(body);
    out.extend_from_slice(format!("xref\n0 {}\n", max_obj + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for num in 1..=max_obj {
        match offsets.get(&num) {
            Some((offset, gen)) => {
                out.extend_from_slice(format!("{offset:010} {gen:05} n \n").as_bytes())
            }
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }
    out.extend_from_slice(b"trailer\n");
    out.extend_from_slice(trailer_dict);
    out.extend_from_slice(format!("\nstartxref\n{new_xref_offset}\n%%EOF\n").as_bytes());
    out
}

/// Space-fill the catalog's /AcroForm entry, covering both the inline
/// dictionary form and the indirect reference form.
fn blank_acroform(data: &mut [u8]) {
    let Some(acro_start) = find(data, b"/AcroForm") else {
        return;
    };

    let mut pos = acro_start + b"/AcroForm".len();
    while pos < data.len() && matches!(data[pos], b' ' | b'\n' | b'\r') {
        pos += 1;
    }

    let acro_end = if data[pos..].starts_with(b"<<") {
        match find_matching_dict_close(data, pos) {
            Some(end) => end,
            None => return,
        }
    } else {
        let ref_re = Regex::new(r"^\d+\s+\d+\s+R").unwrap();
        match ref_re.find(&data[pos..]) {
            Some(m) => pos + m.end(),
            None => return,
        }
    };

    for b in &mut data[acro_start..acro_end] {
        *b = b' ';
    }
}

/// Space-fill the interactive markers of one field dictionary.
fn blank_field_markers(data: &mut Vec<u8>, field: &FormField) {
    let escaped_name = escape_pdf_string(&field.name);
    let patterns = [
        format!("/T ({escaped_name})").into_bytes(),
        format!("/T({escaped_name})").into_bytes(),
    ];

    for pattern in &patterns {
        let Some(idx) = find(data, pattern) else {
            continue;
        };
        let (Some(dict_start), Some(dict_end)) =
            (find_dict_start(data, idx), find_dict_end(data, idx))
        else {
            continue;
        };

        for re in [
            r"/FT\s+/[A-Za-z]+",
            r"/Subtype\s+/Widget",
            r"/DA\s*\([^)]*\)",
            r"/NeedAppearances\s+(true|false)",
        ] {
            let re = Regex::new(re).unwrap();
            let ranges: Vec<(usize, usize)> = re
                .find_iter(&data[dict_start..dict_end + 2])
                .map(|m| (dict_start + m.start(), dict_start + m.end()))
                .collect();
            for (a, b) in ranges {
                for byte in &mut data[a..b] {
                    *byte = b' ';
                }
            }
        }
        break;
    }
}

/// Search backward from `pos` for the `<<` opening the enclosing dict,
/// skipping over any complete nested dictionaries in between.
pub(crate) fn find_dict_start(data: &[u8], pos: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = pos;
    while i > 1 {
        i -= 1;
        if data[i] == b'>' && data.get(i + 1) == Some(&b'>') {
            depth += 1;
            i -= 1;
            continue;
        }
        if data[i] == b'<' && data[i - 1] == b'<' {
            if depth == 0 {
                return Some(i - 1);
            }
            depth -= 1;
            i -= 1;
        }
    }
    None
}

/// Search forward from `pos` (inside a dict) for the matching `>>`.
/// Returns the index of its first `>`.
pub(crate) fn find_dict_end(data: &[u8], pos: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = pos;
    while i + 1 < data.len() {
        if data[i] == b'<' && data[i + 1] == b'<' {
            depth += 1;
            i += 2;
            continue;
        }
        if data[i] == b'>' && data[i + 1] == b'>' {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 2;
            continue;
        }
        i += 1;
    }
    None
}

/// Find the end (exclusive) of the dict whose `<<` starts at `pos`.
fn find_matching_dict_close(data: &[u8], pos: usize) -> Option<usize> {
    find_dict_end(data, pos + 2).map(|i| i + 2)
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}

pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).rev().find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn splice(data: &[u8], start: usize, end: usize, replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() - (end - start) + replacement.len());
    out.extend_from_slice(&data[..start]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&data[end..]);
    out
}

fn trim_bytes(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    &data[start..end]
}
