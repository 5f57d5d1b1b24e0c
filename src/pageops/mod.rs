//! Page-level operations on existing documents: merge, split, extract,
//! rotate, watermark, and page numbers.
//!
//! The operations do not generate PDF content themselves. They drive a
//! writer collaborator through the [`DocumentWriter`] and [`PageImporter`]
//! traits: source pages are imported as templates and pasted onto pages of
//! a new document, with transforms applied on top.

pub mod overlay;

use std::io::Write;
use std::path::Path;

use log::debug;

use crate::doc::Document;
use crate::error::{PDFError, Result};

pub use overlay::{add_page_numbers, add_text_watermark, PageNumberStyle, Position, RGBColor, TextWatermark};

/// Handle for an imported page template.
pub type TemplateId = usize;

/// A4 fallback dimensions in points, used when an importer cannot report
/// a page size.
pub const A4_WIDTH_PT: f64 = 595.28;
pub const A4_HEIGHT_PT: f64 = 841.89;

/// The writer collaborator: a PDF generator able to add pages, paste
/// imported templates, and draw the small set of primitives the overlay
/// operations need. Page coordinates are in points with the origin at the
/// top left, matching the generator this interface was shaped around.
pub trait DocumentWriter {
    /// Add a page with the given dimensions in points.
    fn add_page(&mut self, width: f64, height: f64);
    /// Paste an imported template at the given position and size.
    fn use_template(&mut self, template: TemplateId, x: f64, y: f64, w: f64, h: f64);

    fn set_font(&mut self, family: &str, style: &str, size: f64);
    fn set_text_color(&mut self, r: u8, g: u8, b: u8);
    /// Set the fill/text alpha for subsequent drawing.
    fn set_alpha(&mut self, alpha: f64);
    /// Width of the text in the current font, in points.
    fn text_width(&mut self, text: &str) -> f64;
    fn draw_text(&mut self, x: f64, y: f64, text: &str);

    fn transform_begin(&mut self);
    fn transform_rotate(&mut self, angle: f64, cx: f64, cy: f64);
    fn transform_translate(&mut self, dx: f64, dy: f64);
    fn transform_end(&mut self);

    /// Splice a literal entry into the document catalog.
    fn add_catalog_entry(&mut self, entry: &str);
    /// Register a literal annotation on the given 1-based page.
    fn add_page_annotation(&mut self, page: usize, annotation: &str);
    /// Points per user unit, for callers that lay out in other units.
    fn scale_factor(&self) -> f64;

    /// Serialize the generated document.
    fn output(&mut self, out: &mut dyn Write) -> Result<()>;
}

/// The template importer collaborator: takes source bytes and a 1-based
/// page number, returns a template handle and the page dimensions in
/// points.
pub trait PageImporter {
    fn import_page(&mut self, source: &[u8], page: usize) -> Result<(TemplateId, f64, f64)>;
}

/// Number of pages in a PDF given as bytes.
pub fn page_count(source: &[u8]) -> Result<usize> {
    Ok(Document::read(source.to_vec())?.num_pages())
}

fn fallback_dims(w: f64, h: f64) -> (f64, f64) {
    if w == 0.0 || h == 0.0 {
        (A4_WIDTH_PT, A4_HEIGHT_PT)
    } else {
        (w, h)
    }
}

/// Append every page of `source` to the target document.
fn append_source<W: DocumentWriter, I: PageImporter>(
    pdf: &mut W,
    importer: &mut I,
    source: &[u8],
) -> Result<()> {
    let count = page_count(source)?;
    for page in 1..=count {
        let (template, w, h) = importer.import_page(source, page)?;
        let (w, h) = fallback_dims(w, h);
        pdf.add_page(w, h);
        pdf.use_template(template, 0.0, 0.0, w, h);
    }
    Ok(())
}

/// Combine multiple PDFs into one document, in order. An empty source
/// list is an error.
pub fn merge<W: DocumentWriter, I: PageImporter>(
    pdf: &mut W,
    importer: &mut I,
    sources: &[&[u8]],
) -> Result<()> {
    if sources.is_empty() {
        return Err(PDFError::OutOfRange {
            what: "merge source",
            index: 0,
            bound: 0,
        });
    }
    for (i, source) in sources.iter().enumerate() {
        debug!("merging source {} of {}", i + 1, sources.len());
        append_source(pdf, importer, source)?;
    }
    Ok(())
}

/// Copy the selected 1-based pages of `input` into the target document.
pub fn extract_pages<W: DocumentWriter, I: PageImporter>(
    pdf: &mut W,
    importer: &mut I,
    input: &[u8],
    pages: &[usize],
) -> Result<()> {
    if pages.is_empty() {
        return Err(PDFError::OutOfRange {
            what: "page selection",
            index: 0,
            bound: 0,
        });
    }
    let count = page_count(input)?;
    for &page in pages {
        if page < 1 || page > count {
            return Err(PDFError::OutOfRange {
                what: "page",
                index: page as i64,
                bound: count as i64,
            });
        }
        let (template, w, h) = importer.import_page(input, page)?;
        let (w, h) = fallback_dims(w, h);
        pdf.add_page(w, h);
        pdf.use_template(template, 0.0, 0.0, w, h);
    }
    Ok(())
}

/// Copy an inclusive 1-based page range. A reversed or non-positive range
/// is an error.
pub fn extract_page_range<W: DocumentWriter, I: PageImporter>(
    pdf: &mut W,
    importer: &mut I,
    input: &[u8],
    start: usize,
    end: usize,
) -> Result<()> {
    if start < 1 || end < start {
        return Err(PDFError::OutOfRange {
            what: "page range",
            index: start as i64,
            bound: end as i64,
        });
    }
    let pages: Vec<usize> = (start..=end).collect();
    extract_pages(pdf, importer, input, &pages)
}

/// Split a PDF into one file per page, written as `page_NNN.pdf` into an
/// existing directory.
pub fn split_to_files<W, I, F>(
    mut make_writer: F,
    importer: &mut I,
    input: &[u8],
    output_dir: &Path,
) -> Result<()>
where
    W: DocumentWriter,
    I: PageImporter,
    F: FnMut() -> W,
{
    if !output_dir.is_dir() {
        return Err(PDFError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", output_dir.display()),
        )));
    }

    let count = page_count(input)?;
    for page in 1..=count {
        let mut pdf = make_writer();
        extract_pages(&mut pdf, importer, input, &[page])?;

        let path = output_dir.join(format!("page_{page:03}.pdf"));
        let mut file = std::fs::File::create(&path)?;
        pdf.output(&mut file)?;
        debug!("wrote {}", path.display());
    }
    Ok(())
}

/// Rotate pages by 90, 180 or 270 degrees. `pages` selects 1-based pages;
/// `None` rotates every page. For 90 and 270 the target page has swapped
/// dimensions.
pub fn rotate_pages<W: DocumentWriter, I: PageImporter>(
    pdf: &mut W,
    importer: &mut I,
    input: &[u8],
    angle: i32,
    pages: Option<&[usize]>,
) -> Result<()> {
    if !matches!(angle, 90 | 180 | 270) {
        return Err(PDFError::OutOfRange {
            what: "rotation angle",
            index: angle as i64,
            bound: 270,
        });
    }

    let count = page_count(input)?;
    let selected = |page: usize| match pages {
        None => true,
        Some(list) => list.contains(&page),
    };

    for page in 1..=count {
        let (template, w, h) = importer.import_page(input, page)?;
        let (w, h) = fallback_dims(w, h);

        if !selected(page) {
            pdf.add_page(w, h);
            pdf.use_template(template, 0.0, 0.0, w, h);
            continue;
        }

        if angle == 90 || angle == 270 {
            pdf.add_page(h, w);
        } else {
            pdf.add_page(w, h);
        }

        pdf.transform_begin();
        match angle {
            90 => {
                pdf.transform_rotate(-90.0, 0.0, 0.0);
                pdf.transform_translate(0.0, w);
            }
            180 => {
                pdf.transform_rotate(-180.0, w / 2.0, h / 2.0);
            }
            270 => {
                pdf.transform_rotate(-270.0, 0.0, 0.0);
                pdf.transform_translate(h, 0.0);
            }
            _ => unreachable!(),
        }
        pdf.use_template(template, 0.0, 0.0, w, h);
        pdf.transform_end();
    }
    Ok(())
}
