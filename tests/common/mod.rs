//! Fixture helpers shared by the integration tests. Documents are
//! assembled object by object so the xref offsets stay correct.

#![allow(dead_code)]

use pdfbyte::crypto::standard::{compute_owner_hash, compute_user_hash, EncryptInfo};

/// Assemble a complete PDF from numbered object bodies and a trailer
/// dictionary body.
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

/// One page with an /Info title.
pub fn one_page_pdf(title: &str) -> Vec<u8> {
    let objects = vec![
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (3, b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec()),
        (4, content_object("Body text")),
        (5, format!("<< /Title ({title}) >>").into_bytes()),
    ];
    assemble_pdf(&objects, "<< /Size 6 /Root 1 0 R /Info 5 0 R >>")
}

/// `n` pages, each 612x792 with its own content stream.
pub fn n_page_pdf(n: usize) -> Vec<u8> {
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

/// Text fields `name` and `email` plus a choice field `country` preset to
/// ES, all referenced from both /AcroForm and the page's /Annots.
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

/// RC4-128 encrypted one-page document whose content stream and /Info
/// title (`Secret`) are encrypted with per-object keys.
pub fn encrypted_pdf(user_password: &str, owner_password: &str) -> Vec<u8> {
    let file_id = b"fedcba9876543210".to_vec();
    let permissions: i32 = -44;

    let owner_hash = compute_owner_hash(
        owner_password.as_bytes(),
        user_password.as_bytes(),
        3,
        16,
    );

    let mut info = EncryptInfo {
        version: 2,
        revision: 3,
        key_length: 16,
        owner_hash,
        user_hash: Vec::new(),
        permissions,
        file_id: file_id.clone(),
        key: Vec::new(),
    };
    let file_key = info.compute_file_key(user_password.as_bytes());
    info.user_hash = compute_user_hash(&file_key, &file_id, 3);
    info.key = file_key;

    let mut payload = b"BT /F1 12 Tf (Kept) Tj ET".to_vec();
    info.object_cipher(4, 0).apply(&mut payload);
    let mut content = format!("<< /Length {} >>\nstream\n", payload.len()).into_bytes();
    content.extend_from_slice(&payload);
    content.extend_from_slice(b"\nendstream");

    let mut title = b"Secret".to_vec();
    info.object_cipher(5, 0).apply(&mut title);
    let info_body = format!("<< /Title <{}> >>", hex_upper(&title)).into_bytes();

    let encrypt_body = format!(
        "<< /Filter /Standard /V 2 /R 3 /Length 128 /P {permissions} /O <{}> /U <{}> >>",
        hex_upper(&info.owner_hash),
        hex_upper(&info.user_hash)
    )
    .into_bytes();

    let id_hex = hex_upper(&file_id);
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

fn hex_upper(data: &[u8]) -> String {
    data.iter().fold(String::new(), |mut acc, b| {
        acc.push_str(&format!("{b:02X}"));
        acc
    })
}

// ---- minimal DER, for the self-signed test certificate ------------------

fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    if content.len() < 0x80 {
        out.push(content.len() as u8);
    } else {
        let bytes = content.len().to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}

fn der_seq(parts: &[&[u8]]) -> Vec<u8> {
    der_tlv(0x30, &parts.concat())
}

fn der_int(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take_while(|&&b| b == 0)
        .count()
        .min(bytes.len() - 1);
    let mut content = Vec::new();
    if bytes[skip] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(&bytes[skip..]);
    der_tlv(0x02, &content)
}

/// A syntactically valid self-signed certificate carrying the given
/// uncompressed P-256 public point. The certificate's own signature is a
/// dummy; signing tests only need the parseable structure.
pub fn test_certificate(public_point: &[u8]) -> Vec<u8> {
    let oid = |body: &[u8]| der_tlv(0x06, body);
    let ecdsa_sha256 = der_seq(&[&oid(&[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x02])]);

    let name = der_seq(&[&der_tlv(
        0x31,
        &der_seq(&[&oid(&[0x55, 0x04, 0x03]), &der_tlv(0x0C, b"Integration Signer")]),
    )]);
    let validity = der_seq(&[
        &der_tlv(0x17, b"250101000000Z"),
        &der_tlv(0x17, b"350101000000Z"),
    ]);

    let mut point = vec![0u8];
    point.extend_from_slice(public_point);
    let spki = der_seq(&[
        &der_seq(&[
            &oid(&[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x02, 0x01]),
            &oid(&[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07]),
        ]),
        &der_tlv(0x03, &point),
    ]);

    let tbs = der_seq(&[
        &der_tlv(0xA0, &der_int(2)),
        &der_int(0x2002),
        &ecdsa_sha256,
        &name,
        &validity,
        &name,
        &spki,
    ]);

    let mut dummy_sig = vec![0u8];
    dummy_sig.extend_from_slice(&der_seq(&[&der_int(1), &der_int(1)]));
    der_seq(&[&tbs, &ecdsa_sha256, &der_tlv(0x03, &dummy_sig)])
}
