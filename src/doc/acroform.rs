//! AcroForm field hierarchy.

use log::warn;

use crate::error::Result;
use crate::pdf::object::Object;

use super::page::Rect;
use super::text::decode_pdf_string;
use super::Document;

/// A form field parsed from the document's AcroForm tree.
#[derive(Debug, Clone, Default)]
pub struct FormField {
    /// Partial field name (/T).
    pub name: String,
    /// Fully qualified dotted name.
    pub full_name: String,
    /// Field type: "Tx", "Btn", "Ch" or "Sig"; inherited from the parent
    /// when absent on a leaf.
    pub field_type: String,
    /// Current value (/V), stringified.
    pub value: String,
    /// Default value (/DV), stringified.
    pub default: String,
    /// Field flags (/Ff).
    pub flags: i32,
    /// Widget annotation rectangle (/Rect).
    pub rect: Rect,
    /// Choice options (/Opt) for "Ch" fields.
    pub options: Vec<String>,
    /// Child fields.
    pub kids: Vec<FormField>,
    /// Object number when the field came from an indirect object.
    pub object_number: u32,
}

impl FormField {
    /// Bit 1: the field is read-only.
    pub fn is_read_only(&self) -> bool {
        self.flags & 1 != 0
    }

    /// Bit 2: the field is required.
    pub fn is_required(&self) -> bool {
        self.flags & 2 != 0
    }

    /// Bit 13: a text field accepts multiple lines.
    pub fn is_multiline(&self) -> bool {
        self.flags & (1 << 12) != 0
    }

    /// Bit 17: a button field is a pushbutton.
    pub fn is_pushbutton(&self) -> bool {
        self.flags & (1 << 16) != 0
    }

    /// Bit 18: a choice field is a combo box.
    pub fn is_combo(&self) -> bool {
        self.flags & (1 << 17) != 0
    }
}

impl Document {
    /// All form field trees in the document's AcroForm. An empty vector
    /// when the document has no form.
    pub fn form_fields(&self) -> Result<Vec<FormField>> {
        let catalog = match self.catalog() {
            Ok(c) => c,
            Err(_) => return Ok(Vec::new()),
        };

        let acro_obj = match catalog.get("AcroForm") {
            Some(o) => o.clone(),
            None => return Ok(Vec::new()),
        };
        let acro = match self.resolve_if_ref(&acro_obj)? {
            Object::Dict(d) => d,
            _ => return Ok(Vec::new()),
        };

        let fields_obj = match acro.get("Fields") {
            Some(o) => o.clone(),
            None => return Ok(Vec::new()),
        };
        let fields_arr = match self.resolve_if_ref(&fields_obj)? {
            Object::Array(a) => a,
            _ => return Ok(Vec::new()),
        };

        let mut fields = Vec::new();
        for field_obj in &fields_arr {
            match self.parse_form_field(field_obj, "") {
                Ok(field) => fields.push(field),
                Err(e) => warn!("skipping malformed form field: {e}"),
            }
        }
        Ok(fields)
    }

    /// Find a form field by its fully qualified name.
    pub fn form_field(&self, full_name: &str) -> Result<Option<FormField>> {
        let fields = self.form_fields()?;
        Ok(find_field(&fields, full_name).cloned())
    }

    fn parse_form_field(&self, obj: &Object, parent_name: &str) -> Result<FormField> {
        let object_number = obj.as_reference().map(|r| r.number).unwrap_or(0);
        let dict = self
            .resolve_if_ref(obj)?
            .as_dict()
            .cloned()
            .ok_or_else(|| crate::error::PDFError::parse(0, "form field is not a dictionary"))?;

        let mut field = FormField {
            object_number,
            ..FormField::default()
        };

        if let Some(t) = dict.get_string("T") {
            field.name = decode_pdf_string(&t.data);
        }

        field.full_name = match (parent_name.is_empty(), field.name.is_empty()) {
            (false, false) => format!("{parent_name}.{}", field.name),
            (true, false) => field.name.clone(),
            _ => parent_name.to_string(),
        };

        if let Some(ft) = dict.get_name("FT") {
            field.field_type = ft.to_string();
        }
        if let Some(v) = dict.get("V") {
            field.value = self.resolve_if_ref(v).unwrap_or(Object::Null).to_text();
        }
        if let Some(dv) = dict.get("DV") {
            field.default = self.resolve_if_ref(dv).unwrap_or(Object::Null).to_text();
        }
        if let Some(ff) = dict.get_int("Ff") {
            field.flags = ff as i32;
        }
        if let Some(rect_obj) = dict.get("Rect") {
            if let Ok(resolved) = self.resolve_if_ref(rect_obj) {
                if let Ok(rect) = Rect::from_object(&resolved) {
                    field.rect = rect;
                }
            }
        }
        if let Some(opt) = dict.get("Opt") {
            if let Ok(Object::Array(items)) = self.resolve_if_ref(opt) {
                field.options = items.iter().map(Object::to_text).collect();
            }
        }

        if let Some(kids_obj) = dict.get("Kids") {
            if let Ok(Object::Array(kids)) = self.resolve_if_ref(kids_obj) {
                for kid_obj in &kids {
                    match self.parse_form_field(kid_obj, &field.full_name) {
                        Ok(mut kid) => {
                            // /FT is inheritable within the field tree
                            if kid.field_type.is_empty() {
                                kid.field_type = field.field_type.clone();
                            }
                            field.kids.push(kid);
                        }
                        Err(e) => warn!("skipping malformed field kid: {e}"),
                    }
                }
            }
        }

        Ok(field)
    }
}

/// Depth-first search of a field forest by fully qualified name.
pub fn find_field<'a>(fields: &'a [FormField], full_name: &str) -> Option<&'a FormField> {
    for field in fields {
        if field.full_name == full_name {
            return Some(field);
        }
        if let Some(found) = find_field(&field.kids, full_name) {
            return Some(found);
        }
    }
    None
}

/// Flatten a field forest into a list including every descendant.
pub fn flatten_fields(fields: &[FormField]) -> Vec<&FormField> {
    let mut out = Vec::new();
    for field in fields {
        out.push(field);
        out.extend(flatten_fields(&field.kids));
    }
    out
}
