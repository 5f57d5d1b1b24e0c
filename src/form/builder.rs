//! Interactive form creation for generated documents.
//!
//! The builder collects field definitions and injects the AcroForm
//! structure into a writer-produced document: each field becomes a widget
//! annotation on its page, and a catalog entry ties the fields together.

use crate::error::Result;
use crate::pageops::DocumentWriter;

use super::escape_pdf_string;

/// The kind of form field to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Single or multi-line text input.
    Text,
    /// Checkbox (on/off).
    Checkbox,
    /// Dropdown / combo box.
    Dropdown,
    /// Push button.
    Button,
}

/// A form field definition. Coordinates are in the writer's user units.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    /// 1-based page number the widget is placed on.
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub value: String,
    pub options: Vec<String>,
    pub font_size: f64,
    pub max_len: usize,
    pub read_only: bool,
    pub required: bool,
    pub multi_line: bool,
}

impl Field {
    fn new(name: &str, field_type: FieldType, page: usize, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            page,
            x,
            y,
            w,
            h,
            value: String::new(),
            options: Vec::new(),
            font_size: 12.0,
            max_len: 0,
            read_only: false,
            required: false,
            multi_line: false,
        }
    }

    pub fn set_value(&mut self, v: impl Into<String>) -> &mut Self {
        self.value = v.into();
        self
    }

    pub fn set_required(&mut self, required: bool) -> &mut Self {
        self.required = required;
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) -> &mut Self {
        self.read_only = read_only;
        self
    }

    pub fn set_max_len(&mut self, n: usize) -> &mut Self {
        self.max_len = n;
        self
    }

    pub fn set_multi_line(&mut self, multi_line: bool) -> &mut Self {
        self.multi_line = multi_line;
        self
    }
}

/// Collects form fields and writes them into a document.
pub struct FormBuilder {
    fields: Vec<Field>,
}

impl Default for FormBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormBuilder {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add a text input field.
    pub fn text_field(&mut self, name: &str, page: usize, x: f64, y: f64, w: f64, h: f64) -> &mut Field {
        self.push(Field::new(name, FieldType::Text, page, x, y, w, h))
    }

    /// Add a checkbox.
    pub fn checkbox(&mut self, name: &str, page: usize, x: f64, y: f64, size: f64) -> &mut Field {
        self.push(Field::new(name, FieldType::Checkbox, page, x, y, size, size))
    }

    /// Add a dropdown with the given options.
    pub fn dropdown(
        &mut self,
        name: &str,
        page: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        options: &[&str],
    ) -> &mut Field {
        let mut field = Field::new(name, FieldType::Dropdown, page, x, y, w, h);
        field.options = options.iter().map(|s| s.to_string()).collect();
        self.push(field)
    }

    /// Add a push button with a label.
    pub fn button(
        &mut self,
        name: &str,
        page: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        label: &str,
    ) -> &mut Field {
        let mut field = Field::new(name, FieldType::Button, page, x, y, w, h);
        field.value = label.to_string();
        self.push(field)
    }

    fn push(&mut self, field: Field) -> &mut Field {
        self.fields.push(field);
        self.fields.last_mut().unwrap()
    }

    /// Inject the AcroForm structure into the document. Call after all
    /// pages exist and before the writer's output.
    pub fn build<W: DocumentWriter>(&self, pdf: &mut W) -> Result<()> {
        if self.fields.is_empty() {
            return Ok(());
        }

        let k = pdf.scale_factor();
        let mut field_refs = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            let annotation = field_annotation(field, k);
            pdf.add_page_annotation(field.page, &annotation);
            field_refs.push(annotation);
        }

        let acro_form = format!(
            "/AcroForm <</Fields [{}] /DR <</Font <</Helv <</Type /Font /Subtype /Type1 /BaseFont /Helvetica>>>>>> /DA (/Helv 0 Tf 0 g) /NeedAppearances true>>",
            field_refs.join(" ")
        );
        pdf.add_catalog_entry(&acro_form);
        Ok(())
    }
}

/// Build the widget annotation dictionary for a field. The annotation is
/// the field itself, so the same text serves both as the page annotation
/// and as the entry in /Fields.
fn field_annotation(field: &Field, k: f64) -> String {
    let x = field.x * k;
    let y = field.y * k;
    let w = field.w * k;
    let h = field.h * k;

    let mut flags: i32 = 0;
    if field.read_only {
        flags |= 1;
    }
    if field.required {
        flags |= 2;
    }

    let mut out = format!(
        "<</Type /Annot /Subtype /Widget /T ({}) /Rect [{:.2} {:.2} {:.2} {:.2}]",
        escape_pdf_string(&field.name),
        x,
        y,
        x + w,
        y + h
    );

    match field.field_type {
        FieldType::Text => {
            out.push_str(" /FT /Tx");
            if field.font_size > 0.0 {
                out.push_str(&format!(" /DA (/Helv {:.1} Tf 0 g)", field.font_size));
            }
            if !field.value.is_empty() {
                out.push_str(&format!(" /V ({})", escape_pdf_string(&field.value)));
            }
            if field.max_len > 0 {
                out.push_str(&format!(" /MaxLen {}", field.max_len));
            }
            if field.multi_line {
                flags |= 1 << 12;
            }
        }
        FieldType::Checkbox => {
            out.push_str(" /FT /Btn");
            if field.value == "Yes" || field.value == "true" || field.value == "on" {
                out.push_str(" /V /Yes /AS /Yes");
            } else {
                out.push_str(" /V /Off /AS /Off");
            }
        }
        FieldType::Dropdown => {
            out.push_str(" /FT /Ch");
            flags |= 1 << 17;
            if !field.options.is_empty() {
                let opts: Vec<String> = field
                    .options
                    .iter()
                    .map(|o| format!("({})", escape_pdf_string(o)))
                    .collect();
                out.push_str(&format!(" /Opt [{}]", opts.join(" ")));
            }
            if !field.value.is_empty() {
                out.push_str(&format!(" /V ({})", escape_pdf_string(&field.value)));
            }
            if field.font_size > 0.0 {
                out.push_str(&format!(" /DA (/Helv {:.1} Tf 0 g)", field.font_size));
            }
        }
        FieldType::Button => {
            out.push_str(" /FT /Btn");
            flags |= 1 << 16;
            if !field.value.is_empty() {
                out.push_str(&format!(" /MK <</CA ({})>>", escape_pdf_string(&field.value)));
            }
        }
    }

    if flags != 0 {
        out.push_str(&format!(" /Ff {flags}"));
    }
    out.push_str(">>");
    out
}
