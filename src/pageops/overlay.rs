//! Watermarks and page numbers drawn over imported pages.

use log::debug;

use crate::error::Result;

use super::{fallback_dims, page_count, DocumentWriter, PageImporter};

/// Placement of an element on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    Center,
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    #[default]
    BottomCenter,
    BottomRight,
}

/// An RGB color value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RGBColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A text watermark. Zero-valued fields fall back to the defaults:
/// Helvetica-Bold 60pt, light gray, 30% opacity, 45 degrees.
#[derive(Debug, Clone)]
pub struct TextWatermark {
    pub text: String,
    pub font_size: f64,
    pub color: RGBColor,
    pub opacity: f64,
    pub angle: f64,
}

impl TextWatermark {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: 0.0,
            color: RGBColor::default(),
            opacity: 0.0,
            angle: 0.0,
        }
    }

    fn with_defaults(mut self) -> Self {
        if self.font_size == 0.0 {
            self.font_size = 60.0;
        }
        if self.opacity == 0.0 {
            self.opacity = 0.3;
        }
        if self.angle == 0.0 {
            self.angle = 45.0;
        }
        if self.color == RGBColor::default() {
            self.color = RGBColor {
                r: 200,
                g: 200,
                b: 200,
            };
        }
        self
    }
}

/// Overlay a text watermark on the selected 1-based pages of `input`,
/// or on every page when `pages` is `None`.
pub fn add_text_watermark<W: DocumentWriter, I: PageImporter>(
    pdf: &mut W,
    importer: &mut I,
    input: &[u8],
    watermark: TextWatermark,
    pages: Option<&[usize]>,
) -> Result<()> {
    let wm = watermark.with_defaults();
    let count = page_count(input)?;
    debug!("watermarking {:?} over {count} page(s)", wm.text);

    let selected = |page: usize| match pages {
        None => true,
        Some(list) => list.contains(&page),
    };

    for page in 1..=count {
        let (template, w, h) = importer.import_page(input, page)?;
        let (w, h) = fallback_dims(w, h);
        pdf.add_page(w, h);
        pdf.use_template(template, 0.0, 0.0, w, h);

        if selected(page) {
            draw_watermark(pdf, &wm, w, h);
        }
    }
    Ok(())
}

fn draw_watermark<W: DocumentWriter>(pdf: &mut W, wm: &TextWatermark, page_w: f64, page_h: f64) {
    pdf.set_font("Helvetica", "B", wm.font_size);
    pdf.set_text_color(wm.color.r, wm.color.g, wm.color.b);
    pdf.set_alpha(wm.opacity);

    let text_w = pdf.text_width(&wm.text);
    let cx = page_w / 2.0;
    let cy = page_h / 2.0;

    pdf.transform_begin();
    pdf.transform_rotate(wm.angle, cx, cy);
    // Center the baseline on the rotation point
    pdf.draw_text(cx - text_w / 2.0, cy + wm.font_size / 3.0, &wm.text);
    pdf.transform_end();

    pdf.set_alpha(1.0);
}

/// Appearance and placement of page numbers. Zero-valued fields fall back
/// to the defaults: "Page {page} of {pages}", 10pt, black, 30pt margin,
/// bottom center.
#[derive(Debug, Clone, Default)]
pub struct PageNumberStyle {
    /// Text template; `{page}` and `{pages}` are replaced per page.
    pub format: String,
    pub position: Position,
    pub font_size: f64,
    pub color: RGBColor,
    pub margin: f64,
}

impl PageNumberStyle {
    fn with_defaults(mut self) -> Self {
        if self.format.is_empty() {
            self.format = "Page {page} of {pages}".to_string();
        }
        if self.font_size == 0.0 {
            self.font_size = 10.0;
        }
        if self.margin == 0.0 {
            self.margin = 30.0;
        }
        self
    }
}

/// Stamp a page number onto every page of `input`.
pub fn add_page_numbers<W: DocumentWriter, I: PageImporter>(
    pdf: &mut W,
    importer: &mut I,
    input: &[u8],
    style: PageNumberStyle,
) -> Result<()> {
    let style = style.with_defaults();
    let count = page_count(input)?;

    for page in 1..=count {
        let (template, w, h) = importer.import_page(input, page)?;
        let (w, h) = fallback_dims(w, h);
        pdf.add_page(w, h);
        pdf.use_template(template, 0.0, 0.0, w, h);

        let text = style
            .format
            .replace("{page}", &page.to_string())
            .replace("{pages}", &count.to_string());
        pdf.set_font("Helvetica", "", style.font_size);
        pdf.set_text_color(style.color.r, style.color.g, style.color.b);

        let text_w = pdf.text_width(&text);
        let (x, y) = position_for(style.position, w, h, text_w, style.font_size, style.margin);
        pdf.draw_text(x, y, &text);
    }
    Ok(())
}

/// Text coordinates for a placement, measured to the text baseline.
fn position_for(
    pos: Position,
    page_w: f64,
    page_h: f64,
    text_w: f64,
    text_h: f64,
    margin: f64,
) -> (f64, f64) {
    match pos {
        Position::TopLeft => (margin, margin + text_h),
        Position::TopCenter => ((page_w - text_w) / 2.0, margin + text_h),
        Position::TopRight => (page_w - text_w - margin, margin + text_h),
        Position::BottomLeft => (margin, page_h - margin),
        Position::BottomRight => (page_w - text_w - margin, page_h - margin),
        Position::Center => ((page_w - text_w) / 2.0, page_h / 2.0),
        Position::BottomCenter => ((page_w - text_w) / 2.0, page_h - margin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pageops::testwriter::{MockImporter, MockWriter};
    use crate::testutil;

    #[test]
    fn test_watermark_defaults() {
        let input = testutil::multi_page_pdf(2);
        let mut pdf = MockWriter::default();
        let mut imp = MockImporter::default();

        add_text_watermark(&mut pdf, &mut imp, &input, TextWatermark::new("DRAFT"), None).unwrap();

        assert!(pdf.ops.contains(&"font Helvetica B 60".to_string()));
        assert!(pdf.ops.contains(&"color 200,200,200".to_string()));
        assert!(pdf.ops.contains(&"alpha 0.3".to_string()));
        assert!(pdf.ops.contains(&"rotate 45 about 306,396".to_string()));
        // Alpha resets after each stamped page
        assert_eq!(pdf.ops.iter().filter(|o| *o == "alpha 1").count(), 2);
    }

    #[test]
    fn test_watermark_selected_pages() {
        let input = testutil::multi_page_pdf(3);
        let mut pdf = MockWriter::default();
        let mut imp = MockImporter::default();

        add_text_watermark(
            &mut pdf,
            &mut imp,
            &input,
            TextWatermark::new("DRAFT"),
            Some(&[2]),
        )
        .unwrap();

        // All three pages pasted, exactly one watermark drawn
        assert_eq!(
            pdf.ops.iter().filter(|o| o.starts_with("page ")).count(),
            3
        );
        assert_eq!(
            pdf.ops.iter().filter(|o| o.starts_with("text ")).count(),
            1
        );
    }

    #[test]
    fn test_page_numbers_default_format() {
        let input = testutil::multi_page_pdf(2);
        let mut pdf = MockWriter::default();
        let mut imp = MockImporter::default();

        add_page_numbers(&mut pdf, &mut imp, &input, PageNumberStyle::default()).unwrap();

        assert!(pdf.ops.iter().any(|o| o.contains("\"Page 1 of 2\"")));
        assert!(pdf.ops.iter().any(|o| o.contains("\"Page 2 of 2\"")));
        assert!(pdf.ops.contains(&"font Helvetica  10".to_string()));
    }

    #[test]
    fn test_page_number_positions() {
        // 612x792 page, 30pt margin, "Page 1 of 1" is 11 chars = 66pt in
        // the mock metric.
        let (x, y) = position_for(Position::BottomCenter, 612.0, 792.0, 66.0, 10.0, 30.0);
        assert_eq!((x, y), (273.0, 762.0));

        let (x, y) = position_for(Position::TopRight, 612.0, 792.0, 66.0, 10.0, 30.0);
        assert_eq!((x, y), (516.0, 40.0));

        let (x, y) = position_for(Position::Center, 612.0, 792.0, 66.0, 10.0, 30.0);
        assert_eq!((x, y), (273.0, 396.0));
    }
}
