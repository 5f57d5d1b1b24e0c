//! Shared fixture builders for tests.
//!
//! PDFs are assembled object by object so the xref offsets are always
//! correct, no matter how a fixture is tweaked.

use crate::crypto::standard::{compute_owner_hash, compute_user_hash, EncryptInfo};
use crate::pdf::object::{Object, PDFString};

/// Assemble a complete PDF from numbered object bodies and a trailer
/// dictionary body (without the `trailer` keyword).
pub fn assemble_pdf(objects: &[(u32, Vec<u8>)], trailer_dict: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let max_num = objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
    let mut offsets = vec![None; max_num as usize + 1];

    for (num, body) in objects {
        offsets[*num as usize] = Some(out.len());
        out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", max_num + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        match offset {
            Some(at) => out.extend_from_slice(format!("{at:010} 00000 n \n").as_bytes()),
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }
    out.extend_from_slice(b"trailer\n");
    out.extend_from_slice(trailer_dict.as_bytes());
    out.extend_from_slice(format!("\nstartxref\n{xref_at}\n%%EOF\n").as_bytes());
    out
}

fn content_object(text: &str) -> Vec<u8> {
    let payload = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let mut body = format!("<< /Length {} >>\nstream\n", payload.len()).into_bytes();
    body.extend_from_slice(payload.as_bytes());
    body.extend_from_slice(b"\nendstream");
    body
}

/// One page, one content stream, an /Info dictionary with the given title.
pub fn minimal_pdf(title: &str) -> Vec<u8> {
    let mut title_string = Vec::new();
    Object::String(PDFString::literal(title.as_bytes().to_vec())).write_to(&mut title_string);
    minimal_pdf_with_title_object(&title_string)
}

/// Like [`minimal_pdf`], but the /Title value is the given raw bytes
/// serialized as a PDF string (used for UTF-16BE titles).
pub fn minimal_pdf_with_title_bytes(title_bytes: &[u8]) -> Vec<u8> {
    let mut title_string = Vec::new();
    Object::String(PDFString::hexadecimal(title_bytes.to_vec())).write_to(&mut title_string);
    minimal_pdf_with_title_object(&title_string)
}

fn minimal_pdf_with_title_object(title_string: &[u8]) -> Vec<u8> {
    let objects = vec![
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (3, b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec()),
        (4, content_object("Hello from page one")),
        (
            5,
            [b"<< /Title ".as_ref(), title_string, b" >>".as_ref()].concat(),
        ),
    ];
    assemble_pdf(&objects, "<< /Size 6 /Root 1 0 R /Info 5 0 R >>")
}

/// A document with `n` pages, each with its own content stream.
pub fn multi_page_pdf(n: usize) -> Vec<u8> {
    let mut objects: Vec<(u32, Vec<u8>)> = Vec::new();
    objects.push((1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()));

    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    objects.push((
        2,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {n} /MediaBox [0 0 612 792] >>",
            kids.join(" ")
        )
        .into_bytes(),
    ));

    for i in 0..n {
        let page_num = 3 + 2 * i as u32;
        objects.push((
            page_num,
            format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page_num + 1).into_bytes(),
        ));
        objects.push((page_num + 1, content_object(&format!("Page {}", i + 1))));
    }

    let size = 3 + 2 * n;
    assemble_pdf(&objects, &format!("<< /Size {size} /Root 1 0 R >>"))
}

/// Two pages; the first overrides the inherited MediaBox and Rotate.
pub fn pdf_with_page_override() -> Vec<u8> {
    let objects = vec![
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 400] /Rotate 90 /Contents 5 0 R >>"
                .to_vec(),
        ),
        (4, b"<< /Type /Page /Parent 2 0 R /Contents 5 0 R >>".to_vec()),
        (5, content_object("shared")),
    ];
    assemble_pdf(&objects, "<< /Size 6 /Root 1 0 R >>")
}

/// One page whose /Contents is an array of two streams.
pub fn pdf_with_split_content() -> Vec<u8> {
    let one = b"BT (one) Tj ET";
    let two = b"BT (two) Tj ET";
    let mut s1 = format!("<< /Length {} >>\nstream\n", one.len()).into_bytes();
    s1.extend_from_slice(one);
    s1.extend_from_slice(b"\nendstream");
    let mut s2 = format!("<< /Length {} >>\nstream\n", two.len()).into_bytes();
    s2.extend_from_slice(two);
    s2.extend_from_slice(b"\nendstream");

    let objects = vec![
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents [4 0 R 5 0 R] >>".to_vec(),
        ),
        (4, s1),
        (5, s2),
    ];
    assemble_pdf(&objects, "<< /Size 6 /Root 1 0 R >>")
}

/// A page tree whose root lists itself as a kid.
pub fn pdf_with_page_cycle() -> Vec<u8> {
    let objects = vec![
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (2, b"<< /Type /Pages /Kids [2 0 R] /Count 1 >>".to_vec()),
    ];
    assemble_pdf(&objects, "<< /Size 3 /Root 1 0 R >>")
}

/// A one-page document with three top-level fields: text fields `name`
/// and `email` (no initial /V) and a choice field `country` preset to ES.
pub fn form_pdf() -> Vec<u8> {
    let objects = vec![
        (
            1,
            b"<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R 6 0 R 7 0 R] /NeedAppearances true >> >>"
                .to_vec(),
        ),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Annots [5 0 R 6 0 R 7 0 R] >>".to_vec(),
        ),
        (4, content_object("form page")),
        (
            5,
            b"<< /Type /Annot /Subtype /Widget /T (name) /FT /Tx /Rect [50 700 250 720] /DA (/Helv 12 Tf 0 g) >>"
                .to_vec(),
        ),
        (
            6,
            b"<< /Type /Annot /Subtype /Widget /T (email) /FT /Tx /Rect [50 660 250 680] /DA (/Helv 12 Tf 0 g) >>"
                .to_vec(),
        ),
        (
            7,
            b"<< /Type /Annot /Subtype /Widget /T (country) /FT /Ch /Opt [(ES) (FR) (PT)] /V (ES) /Rect [50 620 250 640] >>"
                .to_vec(),
        ),
    ];
    assemble_pdf(&objects, "<< /Size 8 /Root 1 0 R >>")
}

/// A one-page document with a single checkbox field `agree`, initially off.
pub fn checkbox_form_pdf() -> Vec<u8> {
    let objects = vec![
        (
            1,
            b"<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R] >> >>".to_vec(),
        ),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Annots [5 0 R] >>".to_vec(),
        ),
        (4, content_object("checkbox page")),
        (
            5,
            b"<< /Type /Annot /Subtype /Widget /T (agree) /FT /Btn /V /Off /AS /Off /Rect [50 700 65 715] >>"
                .to_vec(),
        ),
    ];
    assemble_pdf(&objects, "<< /Size 6 /Root 1 0 R >>")
}

/// A form with one parent field `address` and two kids, `street` and
/// `city`. The parent carries /FT so `street` exercises inheritance.
pub fn hierarchical_form_pdf() -> Vec<u8> {
    let objects = vec![
        (
            1,
            b"<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R] >> >>".to_vec(),
        ),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (3, b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec()),
        (4, content_object("hierarchy")),
        (
            5,
            b"<< /T (address) /FT /Tx /Kids [6 0 R 7 0 R] >>".to_vec(),
        ),
        (
            6,
            b"<< /T (street) /Parent 5 0 R /Subtype /Widget /Rect [10 10 100 30] >>".to_vec(),
        ),
        (
            7,
            b"<< /T (city) /Parent 5 0 R /FT /Tx /Subtype /Widget /Rect [10 40 100 60] >>".to_vec(),
        ),
    ];
    assemble_pdf(&objects, "<< /Size 8 /Root 1 0 R >>")
}

/// Build an RC4-128 (V=2, R=3) encrypted one-page document. The content
/// stream and the /Info title "Secret" are encrypted with per-object keys
/// derived from the user password.
pub fn encrypted_pdf(user_password: &str, owner_password: &str) -> Vec<u8> {
    let file_id = b"0123456789abcdef".to_vec();
    let permissions: i32 = -44;
    let revision = 3;
    let key_length = 16;

    let owner_hash = compute_owner_hash(
        owner_password.as_bytes(),
        user_password.as_bytes(),
        revision,
        key_length,
    );

    let mut info = EncryptInfo {
        version: 2,
        revision,
        key_length,
        owner_hash,
        user_hash: Vec::new(),
        permissions,
        file_id: file_id.clone(),
        key: Vec::new(),
    };
    let file_key = info.compute_file_key(user_password.as_bytes());
    info.user_hash = compute_user_hash(&file_key, &file_id, revision);
    info.key = file_key;

    // Encrypt the content stream with the key for object 4.
    let mut payload = b"BT /F1 12 Tf (Kept) Tj ET".to_vec();
    info.object_cipher(4, 0).apply(&mut payload);
    let mut content = format!("<< /Length {} >>\nstream\n", payload.len()).into_bytes();
    content.extend_from_slice(&payload);
    content.extend_from_slice(b"\nendstream");

    // Encrypt the Info title with the key for object 5.
    let mut title = b"Secret".to_vec();
    info.object_cipher(5, 0).apply(&mut title);
    let mut info_body = b"<< /Title ".to_vec();
    Object::String(PDFString::hexadecimal(title)).write_to(&mut info_body);
    info_body.extend_from_slice(b" >>");

    let mut encrypt_body = format!(
        "<< /Filter /Standard /V 2 /R 3 /Length 128 /P {permissions} /O "
    )
    .into_bytes();
    Object::String(PDFString::hexadecimal(info.owner_hash.clone())).write_to(&mut encrypt_body);
    encrypt_body.extend_from_slice(b" /U ");
    Object::String(PDFString::hexadecimal(info.user_hash.clone())).write_to(&mut encrypt_body);
    encrypt_body.extend_from_slice(b" >>");

    let id_hex = file_id.iter().fold(String::new(), |mut acc, b| {
        acc.push_str(&format!("{b:02X}"));
        acc
    });

    let objects = vec![
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (3, b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec()),
        (4, content),
        (5, info_body),
        (6, encrypt_body),
    ];
    assemble_pdf(
        &objects,
        &format!("<< /Size 7 /Root 1 0 R /Info 5 0 R /Encrypt 6 0 R /ID [<{id_hex}> <{id_hex}>] >>"),
    )
}
