//! Page tree traversal and the page view.

use log::warn;

use crate::error::{PDFError, Result};
use crate::pdf::filter::decode_stream;
use crate::pdf::object::{Dict, Object, Stream};

use super::Document;

/// Page tree nodes deeper than this are treated as a cycle.
const MAX_TREE_DEPTH: usize = 64;

/// A PDF rectangle, `[llx lly urx ury]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Rect {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Parse a rectangle from a 4-element numeric array.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let arr = obj
            .as_array()
            .filter(|a| a.len() == 4)
            .ok_or_else(|| PDFError::parse(0, "rectangle must be a 4-element array"))?;
        let mut vals = [0f64; 4];
        for (v, item) in vals.iter_mut().zip(arr) {
            *v = item
                .as_real()
                .ok_or_else(|| PDFError::parse(0, "rectangle element is not numeric"))?;
        }
        Ok(Self {
            llx: vals[0],
            lly: vals[1],
            urx: vals[2],
            ury: vals[3],
        })
    }
}

/// A single page, flattened out of the page tree.
///
/// MediaBox, CropBox, Resources and Rotate are the effective values after
/// inheritance from ancestor /Pages nodes.
#[derive(Debug)]
pub struct Page {
    /// 1-based page number in traversal order.
    pub number: usize,
    pub media_box: Rect,
    pub crop_box: Option<Rect>,
    pub resources: Dict,
    /// Content streams in document order, payloads still filter-encoded.
    pub contents: Vec<Stream>,
    /// Rotation in degrees.
    pub rotate: i32,
    /// Object number of the page dictionary, 0 when it was inlined.
    pub object_number: u32,
}

impl Page {
    /// The page's decoded content. Multiple streams are concatenated, each
    /// followed by a newline.
    pub fn content_stream(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for stream in &self.contents {
            let decoded = decode_stream(stream)?;
            out.extend_from_slice(&decoded);
            out.push(b'\n');
        }
        Ok(out)
    }
}

/// Flatten the page tree into an ordered page list.
pub(super) fn build_page_list(doc: &Document) -> Result<Vec<Page>> {
    let catalog = doc.catalog()?;
    let pages_obj = catalog
        .get("Pages")
        .ok_or_else(|| PDFError::parse(0, "catalog has no /Pages"))?
        .clone();
    let root = doc
        .resolve_if_ref(&pages_obj)?
        .as_dict()
        .cloned()
        .ok_or_else(|| PDFError::parse(0, "/Pages is not a dictionary"))?;
    let root_number = pages_obj.as_reference().map(|r| r.number).unwrap_or(0);

    let mut pages = Vec::new();
    traverse(doc, &root, root_number, &Dict::new(), 0, &mut pages)?;
    Ok(pages)
}

/// Recursive page tree walk. `inherited` carries the attribute values seen
/// on ancestor nodes; a node's own entries shadow them.
fn traverse(
    doc: &Document,
    node: &Dict,
    node_number: u32,
    inherited: &Dict,
    depth: usize,
    pages: &mut Vec<Page>,
) -> Result<()> {
    if depth > MAX_TREE_DEPTH {
        return Err(PDFError::CycleDetected);
    }

    let mut merged = inherited.clone();
    for key in ["MediaBox", "CropBox", "Resources", "Rotate"] {
        if let Some(v) = node.get(key) {
            merged.set(key, v.clone());
        }
    }

    if node.get_name("Type") == Some("Page") {
        pages.push(build_page(doc, node, node_number, &merged, pages.len() + 1)?);
        return Ok(());
    }

    let kids_obj = node.get("Kids").cloned().unwrap_or(Object::Null);
    let kids = match doc.resolve_if_ref(&kids_obj)? {
        Object::Array(a) => a,
        _ => Vec::new(),
    };

    for kid in kids {
        let kid_number = kid.as_reference().map(|r| r.number).unwrap_or(0);
        match doc.resolve_if_ref(&kid)? {
            Object::Dict(kid_dict) => {
                traverse(doc, &kid_dict, kid_number, &merged, depth + 1, pages)?;
            }
            _ => warn!("page tree kid is not a dictionary, skipping"),
        }
    }
    Ok(())
}

fn build_page(
    doc: &Document,
    node: &Dict,
    node_number: u32,
    merged: &Dict,
    number: usize,
) -> Result<Page> {
    let mut page = Page {
        number,
        media_box: Rect::default(),
        crop_box: None,
        resources: Dict::new(),
        contents: Vec::new(),
        rotate: 0,
        object_number: node_number,
    };

    if let Some(mb) = merged.get("MediaBox") {
        if let Ok(resolved) = doc.resolve_if_ref(mb) {
            if let Ok(rect) = Rect::from_object(&resolved) {
                page.media_box = rect;
            }
        }
    }
    if let Some(cb) = merged.get("CropBox") {
        if let Ok(resolved) = doc.resolve_if_ref(cb) {
            if let Ok(rect) = Rect::from_object(&resolved) {
                page.crop_box = Some(rect);
            }
        }
    }
    if let Some(res) = merged.get("Resources") {
        if let Ok(Object::Dict(d)) = doc.resolve_if_ref(res) {
            page.resources = d;
        }
    }
    if let Some(rot) = merged.get("Rotate") {
        if let Ok(resolved) = doc.resolve_if_ref(rot) {
            if let Some(v) = resolved.as_int() {
                page.rotate = v as i32;
            }
        }
    }

    // /Contents may be one stream or an array of streams; both forms are
    // resolved eagerly so the page needs no later access to the document.
    if let Some(contents) = node.get("Contents") {
        match doc.resolve_if_ref(contents)? {
            Object::Stream(s) => page.contents.push(s),
            Object::Array(items) => {
                for item in items {
                    match doc.resolve_if_ref(&item) {
                        Ok(Object::Stream(s)) => page.contents.push(s),
                        _ => continue,
                    }
                }
            }
            _ => {}
        }
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Document;
    use crate::testutil;

    #[test]
    fn test_rect() {
        let obj = Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(595.28),
            Object::Integer(842),
        ]);
        let rect = Rect::from_object(&obj).unwrap();
        assert_eq!(rect.width(), 595.28);
        assert_eq!(rect.height(), 842.0);

        let bad = Object::Array(vec![Object::Integer(1)]);
        assert!(Rect::from_object(&bad).is_err());
    }

    #[test]
    fn test_media_box_inheritance() {
        // The fixture sets MediaBox only on the /Pages node; the leaf page
        // must inherit it.
        let doc = Document::read(testutil::minimal_pdf("t")).unwrap();
        let page = doc.page(1).unwrap();
        assert_eq!(page.media_box.width(), 612.0);
        assert_eq!(page.media_box.height(), 792.0);
        assert!(page.object_number > 0);
    }

    #[test]
    fn test_local_override_shadows_inherited() {
        let doc = Document::read(testutil::pdf_with_page_override()).unwrap();
        // Page 1 overrides the inherited MediaBox and Rotate.
        let page = doc.page(1).unwrap();
        assert_eq!(page.media_box.width(), 200.0);
        assert_eq!(page.rotate, 90);
        // Page 2 keeps the inherited values.
        let page = doc.page(2).unwrap();
        assert_eq!(page.media_box.width(), 612.0);
        assert_eq!(page.rotate, 0);
    }

    #[test]
    fn test_content_stream_concatenation() {
        let doc = Document::read(testutil::pdf_with_split_content()).unwrap();
        let content = doc.page(1).unwrap().content_stream().unwrap();
        // Two streams joined, each with a trailing newline
        assert_eq!(content, b"BT (one) Tj ET\nBT (two) Tj ET\n");
    }

    #[test]
    fn test_page_tree_cycle_detected() {
        let err = Document::read(testutil::pdf_with_page_cycle()).unwrap_err();
        assert!(matches!(err, PDFError::CycleDetected));
    }

    #[test]
    fn test_multi_page_order() {
        let doc = Document::read(testutil::multi_page_pdf(5)).unwrap();
        assert_eq!(doc.num_pages(), 5);
        for (i, page) in doc.pages() {
            assert_eq!(page.number, i);
        }
    }
}
