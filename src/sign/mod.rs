//! Detached PKCS#7 signing and verification.
//!
//! Signing appends an incremental-update section so that no existing byte
//! moves: a signature dictionary with a wide `/ByteRange` placeholder and
//! a zero-filled `/Contents` slot, a signature widget, an AcroForm entry,
//! a replacement catalog, and a new xref chained to the old one through
//! `/Prev`. The byte range is then finalized in place, the digest is
//! computed over the two covered intervals, and the hex-encoded
//! `SignedData` is patched into the slot.

pub mod pkcs7;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;
use regex::bytes::Regex;
use sha2::{Digest, Sha256};

use crate::doc::Document;
use crate::error::{PDFError, Result};
use crate::form::{escape_pdf_string, find, find_dict_end, find_dict_start};
use crate::pdf::object::Object;
use crate::pdf::xref::find_start_xref;

use pkcs7::SignatureAlgorithm;

/// Hex digits reserved for the signature in `/Contents`. The DER-encoded
/// SignedData must hex-encode into at most this many nibbles.
const CONTENTS_NIBBLES: usize = 16384;

/// The `/ByteRange` placeholder; each slot is wide enough for any offset
/// the final values may take.
const BYTE_RANGE_PLACEHOLDER: &[u8] = b"[0 0000000000 0000000000 0000000000]";

/// A private key accepted for signing.
pub enum SigningKey {
    EcdsaP256(p256::ecdsa::SigningKey),
    Rsa(Box<rsa::RsaPrivateKey>),
}

/// A trusted public key for full verification.
pub enum VerifyingKey {
    EcdsaP256(p256::ecdsa::VerifyingKey),
    Rsa(Box<rsa::RsaPublicKey>),
}

/// Signing parameters.
pub struct SignOptions {
    /// DER-encoded signer certificate, embedded in the SignedData.
    pub certificate_der: Vec<u8>,
    pub key: SigningKey,
    pub reason: String,
    pub location: String,
    /// Timestamp recorded in `/M`; the current time when `None`.
    pub signed_at: Option<DateTime<Utc>>,
}

/// What verification learned about one signature.
pub struct SignatureInfo {
    pub reason: String,
    pub location: String,
    pub signed_at: Option<DateTime<Utc>>,
    /// The `/ByteRange` values as found.
    pub byte_range: [i64; 4],
    /// Whether the recomputed digest matches the one inside the PKCS#7.
    pub digest_ok: bool,
    /// Cryptographic verdict; `None` when no trusted key was supplied.
    pub valid: Option<bool>,
    /// Problems encountered while checking this signature.
    pub errors: Vec<PDFError>,
}

/// Sign a PDF, returning a new buffer ending in the signed incremental
/// update. The input buffer is never modified.
pub fn sign(input: &[u8], options: &SignOptions) -> Result<Vec<u8>> {
    let (mut out, update_start) = emplace_placeholder(input, options)?;
    let (g1, g2) = finalize_byte_range(&mut out, update_start)?;

    // Digest over the two complementary intervals around the /Contents gap.
    let mut hasher = Sha256::new();
    hasher.update(&out[..g1]);
    hasher.update(&out[g2..]);
    let digest = hasher.finalize();

    let signed_attrs = pkcs7::signed_attributes(&digest);
    let (algorithm, signature) = raw_signature(&options.key, &signed_attrs)?;

    let (_, cert) = x509_parser::parse_x509_certificate(&options.certificate_der)
        .map_err(|e| PDFError::malformed_signature(format!("signer certificate: {e}")))?;
    let identity = pkcs7::SignerIdentity {
        issuer_der: cert.tbs_certificate.issuer.as_raw(),
        serial: cert.tbs_certificate.raw_serial(),
    };

    let der = pkcs7::build_signed_data(
        &options.certificate_der,
        &identity,
        algorithm,
        &signed_attrs,
        &signature,
    );

    let hex_sig = hex::encode(der);
    if hex_sig.len() > CONTENTS_NIBBLES {
        return Err(PDFError::malformed_signature(
            "signature does not fit the /Contents placeholder",
        ));
    }
    out[g1 + 1..g1 + 1 + hex_sig.len()].copy_from_slice(hex_sig.as_bytes());

    debug!(
        "signed: byte ranges [0, {g1}) and [{g2}, {}), {} hex digits",
        out.len(),
        hex_sig.len()
    );
    Ok(out)
}

fn raw_signature(key: &SigningKey, message: &[u8]) -> Result<(SignatureAlgorithm, Vec<u8>)> {
    match key {
        SigningKey::EcdsaP256(k) => {
            use p256::ecdsa::signature::Signer;
            let signature: p256::ecdsa::Signature = k
                .try_sign(message)
                .map_err(|e| PDFError::InvalidSignature(e.to_string()))?;
            Ok((
                SignatureAlgorithm::EcdsaP256Sha256,
                signature.to_der().as_bytes().to_vec(),
            ))
        }
        SigningKey::Rsa(k) => {
            use rsa::signature::{SignatureEncoding, Signer};
            let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new((**k).clone());
            let signature = signing_key
                .try_sign(message)
                .map_err(|e| PDFError::InvalidSignature(e.to_string()))?;
            Ok((SignatureAlgorithm::RsaSha256, signature.to_vec()))
        }
    }
}

/// Pass 1: append the incremental-update section holding the signature
/// dictionary placeholder, widget, AcroForm and replacement catalog.
fn emplace_placeholder(input: &[u8], options: &SignOptions) -> Result<(Vec<u8>, usize)> {
    let doc = Document::read(input.to_vec())?;

    let catalog_ref = doc
        .trailer()
        .get_reference("Root")
        .ok_or_else(|| PDFError::parse(0, "catalog is not an indirect object"))?;
    let mut catalog = doc.catalog()?;

    let first_page = doc.page(1)?.object_number;
    if first_page == 0 {
        return Err(PDFError::parse(0, "page 1 is not an indirect object"));
    }

    let prev_xref = find_start_xref(input)?;
    let next_obj = doc.xref().max_object_number() + 1;
    let (sig_obj, acro_obj, widget_obj) = (next_obj, next_obj + 1, next_obj + 2);

    let signed_at = options.signed_at.unwrap_or_else(Utc::now);
    let date = format_pdf_date(&signed_at);

    let mut out = input.to_vec();
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }

    let sig_pos = out.len();
    out.extend_from_slice(format!("{sig_obj} 0 obj\n<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /adbe.pkcs7.detached /ByteRange ").as_bytes());
    out.extend_from_slice(BYTE_RANGE_PLACEHOLDER);
    out.extend_from_slice(b" /Contents <");
    out.resize(out.len() + CONTENTS_NIBBLES, b'0');
    out.extend_from_slice(
        format!(
            "> /Reason ({}) /Location ({}) /M ({date}) >>\nendobj\n",
            escape_pdf_string(&options.reason),
            escape_pdf_string(&options.location)
        )
        .as_bytes(),
    );

    let acro_pos = out.len();
    out.extend_from_slice(
        format!("{acro_obj} 0 obj\n<< /Type /AcroForm /SigFlags 3 /Fields [{widget_obj} 0 R] >>\nendobj\n")
            .as_bytes(),
    );

    let widget_pos = out.len();
    out.extend_from_slice(
        format!(
            "{widget_obj} 0 obj\n<< /Type /Annot /Subtype /Widget /FT /Sig /Rect [0 0 0 0] /F 4 /T (Signature1) /V {sig_obj} 0 R /P {first_page} 0 R >>\nendobj\n"
        )
        .as_bytes(),
    );

    // Re-emit the catalog with the /AcroForm entry pointing at the new
    // form object; the old catalog object stays in place and the new xref
    // shadows it.
    catalog.set(
        "AcroForm",
        Object::Reference(crate::pdf::object::ObjectRef::new(acro_obj, 0)),
    );
    let catalog_pos = out.len();
    out.extend_from_slice(format!("{} 0 obj\n", catalog_ref.number).as_bytes());
    let mut catalog_bytes = Vec::new();
    catalog.write_to(&mut catalog_bytes);
    out.extend_from_slice(&catalog_bytes);
    out.extend_from_slice(b"\nendobj\n");

    let xref_pos = out.len();
    out.extend_from_slice(
        format!(
            "xref\n0 1\n0000000000 65535 f \n{} 1\n{catalog_pos:010} 00000 n \n{sig_obj} 3\n{sig_pos:010} 00000 n \n{acro_pos:010} 00000 n \n{widget_pos:010} 00000 n \n",
            catalog_ref.number
        )
        .as_bytes(),
    );
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root {} 0 R /Prev {prev_xref}",
            widget_obj + 1,
            catalog_ref.number
        )
        .as_bytes(),
    );
    // /Info and /ID carry over so the update does not orphan them.
    for key in ["Info", "ID"] {
        if let Some(value) = doc.trailer().get(key) {
            out.extend_from_slice(format!(" /{key} ").as_bytes());
            value.write_to(&mut out);
        }
    }
    out.extend_from_slice(format!(" >>\nstartxref\n{xref_pos}\n%%EOF\n").as_bytes());

    Ok((out, sig_pos))
}

/// Pass 2: locate the `/Contents` hex slot in the appended section and
/// write the final byte-range values into the fixed-width placeholder.
/// Returns the gap offsets `(g1, g2)`: `g1` is the offset of `<`, `g2`
/// one past `>`.
fn finalize_byte_range(out: &mut [u8], update_start: usize) -> Result<(usize, usize)> {
    let contents_at = update_start
        + find(&out[update_start..], b"/Contents <")
            .ok_or_else(|| PDFError::malformed_signature("missing /Contents placeholder"))?;
    let g1 = contents_at + b"/Contents ".len();
    let g2 = g1 + 1 + CONTENTS_NIBBLES + 1;
    if out.get(g2 - 1) != Some(&b'>') {
        return Err(PDFError::malformed_signature("malformed /Contents placeholder"));
    }

    let br_at = update_start
        + find(&out[update_start..], BYTE_RANGE_PLACEHOLDER)
            .ok_or_else(|| PDFError::malformed_signature("missing /ByteRange placeholder"))?;
    let values = format!(
        "[0 {:010} {:010} {:010}]",
        g1,
        g2,
        out.len() - g2
    );
    out[br_at..br_at + BYTE_RANGE_PLACEHOLDER.len()].copy_from_slice(values.as_bytes());
    Ok((g1, g2))
}

/// Discover and check every signature in a document. Digest integrity is
/// always checked; the cryptographic verdict is left open because no
/// trusted key is supplied.
pub fn verify(input: &[u8]) -> Result<Vec<SignatureInfo>> {
    verify_inner(input, None)
}

/// Verify every signature against a trusted public key.
pub fn verify_with_key(input: &[u8], key: &VerifyingKey) -> Result<Vec<SignatureInfo>> {
    verify_inner(input, Some(key))
}

fn verify_inner(input: &[u8], key: Option<&VerifyingKey>) -> Result<Vec<SignatureInfo>> {
    let sig_type_re = Regex::new(r"/Type\s*/Sig\b").unwrap();
    let mut results = Vec::new();

    for m in sig_type_re.find_iter(input) {
        let (Some(dict_start), Some(dict_end)) = (
            find_dict_start(input, m.start()),
            find_dict_end(input, m.start()),
        ) else {
            continue;
        };
        let dict = &input[dict_start..dict_end + 2];

        let mut info = SignatureInfo {
            reason: extract_text_entry(dict, "/Reason").unwrap_or_default(),
            location: extract_text_entry(dict, "/Location").unwrap_or_default(),
            signed_at: extract_text_entry(dict, "/M").and_then(|s| parse_pdf_date(&s)),
            byte_range: extract_byte_range(dict),
            digest_ok: false,
            valid: None,
            errors: Vec::new(),
        };

        check_signature(input, dict, &mut info, key);
        results.push(info);
    }

    Ok(results)
}

fn check_signature(
    data: &[u8],
    dict: &[u8],
    info: &mut SignatureInfo,
    key: Option<&VerifyingKey>,
) {
    let contents = match extract_contents(dict) {
        Ok(c) => c,
        Err(e) => {
            info.errors.push(e);
            if key.is_some() {
                info.valid = Some(false);
            }
            return;
        }
    };

    let digest = match byte_range_digest(data, info.byte_range) {
        Ok(d) => d,
        Err(e) => {
            info.errors.push(e);
            if key.is_some() {
                info.valid = Some(false);
            }
            return;
        }
    };

    let parsed = match pkcs7::parse_signed_data(&contents) {
        Ok(p) => p,
        Err(e) => {
            info.errors.push(e);
            if key.is_some() {
                info.valid = Some(false);
            }
            return;
        }
    };

    info.digest_ok = parsed.message_digest == digest;
    if !info.digest_ok {
        info.errors
            .push(PDFError::InvalidSignature("byte-range digest mismatch".into()));
    }

    let Some(key) = key else {
        return;
    };

    let crypto_ok = match verify_raw(key, &parsed) {
        Ok(ok) => ok,
        Err(e) => {
            info.errors.push(e);
            info.valid = Some(false);
            return;
        }
    };
    if !crypto_ok {
        info.errors
            .push(PDFError::InvalidSignature("signature verification failed".into()));
    }
    info.valid = Some(crypto_ok && info.digest_ok);
}

fn verify_raw(key: &VerifyingKey, parsed: &pkcs7::ParsedSignature) -> Result<bool> {
    let algorithm = SignatureAlgorithm::from_oid(&parsed.algorithm_oid).ok_or_else(|| {
        PDFError::UnsupportedAlgorithm(format!("OID {}", hex::encode(&parsed.algorithm_oid)))
    })?;

    match (key, algorithm) {
        (VerifyingKey::EcdsaP256(k), SignatureAlgorithm::EcdsaP256Sha256) => {
            use p256::ecdsa::signature::Verifier;
            let signature = p256::ecdsa::Signature::from_der(&parsed.signature)
                .map_err(|e| PDFError::malformed_signature(e.to_string()))?;
            Ok(k.verify(&parsed.signed_attrs, &signature).is_ok())
        }
        (VerifyingKey::Rsa(k), SignatureAlgorithm::RsaSha256) => {
            use rsa::signature::Verifier;
            let signature = rsa::pkcs1v15::Signature::try_from(parsed.signature.as_slice())
                .map_err(|e| PDFError::malformed_signature(e.to_string()))?;
            let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new((**k).clone());
            Ok(verifying_key.verify(&parsed.signed_attrs, &signature).is_ok())
        }
        _ => Err(PDFError::UnsupportedAlgorithm(
            "signature algorithm does not match the supplied key".into(),
        )),
    }
}

/// SHA-256 over the two byte intervals of a `/ByteRange`.
fn byte_range_digest(data: &[u8], br: [i64; 4]) -> Result<Vec<u8>> {
    if br.iter().any(|&v| v < 0) {
        return Err(PDFError::BadByteRange);
    }
    let (a, b, c, d) = (br[0] as usize, br[1] as usize, br[2] as usize, br[3] as usize);
    match (a.checked_add(b), c.checked_add(d)) {
        (Some(first), Some(second)) if first <= data.len() && second <= data.len() => {}
        _ => return Err(PDFError::BadByteRange),
    }

    let mut hasher = Sha256::new();
    hasher.update(&data[a..a + b]);
    hasher.update(&data[c..c + d]);
    Ok(hasher.finalize().to_vec())
}

/// Pull the `/ByteRange [a b c d]` values out of a signature dictionary.
fn extract_byte_range(dict: &[u8]) -> [i64; 4] {
    let re = Regex::new(r"/ByteRange\s*\[([^\]]+)\]").unwrap();
    let mut out = [0i64; 4];
    let Some(caps) = re.captures(dict) else {
        return out;
    };
    let inner = String::from_utf8_lossy(&caps[1]);
    for (slot, tok) in out.iter_mut().zip(inner.split_whitespace()) {
        if let Ok(v) = tok.parse::<i64>() {
            *slot = v;
        }
    }
    out
}

/// Extract and hex-decode `/Contents`. The zero padding after the DER
/// structure is kept; the DER reader stops at the end of the declared
/// length, so padding bytes are simply never read. Trimming them off
/// first would corrupt signatures that genuinely end in zero bytes.
fn extract_contents(dict: &[u8]) -> Result<Vec<u8>> {
    let re = Regex::new(r"/Contents\s*<([0-9a-fA-F]*)>").unwrap();
    let caps = re
        .captures(dict)
        .ok_or_else(|| PDFError::malformed_signature("missing /Contents"))?;
    let mut hex_str = String::from_utf8_lossy(&caps[1]).into_owned();

    if hex_str.len() % 2 != 0 {
        hex_str.push('0');
    }
    if hex_str.trim_end_matches('0').is_empty() {
        return Err(PDFError::malformed_signature("empty /Contents"));
    }
    hex::decode(&hex_str).map_err(|e| PDFError::malformed_signature(e.to_string()))
}

/// Extract a literal-string entry such as `/Reason (...)`.
fn extract_text_entry(dict: &[u8], keyword: &str) -> Option<String> {
    let re = Regex::new(&format!(r"{}\s*\(([^)]*)\)", regex::escape(keyword))).unwrap();
    re.captures(dict)
        .map(|caps| String::from_utf8_lossy(&caps[1]).into_owned())
}

/// Format a timestamp in PDF date form, UTC.
fn format_pdf_date(t: &DateTime<Utc>) -> String {
    format!("D:{}+00'00'", t.format("%Y%m%d%H%M%S"))
}

/// Parse the four accepted PDF date forms: bare, `Z`, `+HH'MM'`, `-HH'MM'`.
fn parse_pdf_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);
    if s.len() < 14 {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&s[..14], "%Y%m%d%H%M%S").ok()?;
    let base = Utc.from_utc_datetime(&naive);

    let rest = &s[14..];
    if rest.is_empty() || rest == "Z" {
        return Some(base);
    }
    let sign = match rest.as_bytes()[0] {
        b'+' => 1i64,
        b'-' => -1i64,
        _ => return Some(base),
    };
    let hours: i64 = rest.get(1..3)?.parse().ok()?;
    let minutes: i64 = rest.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(0);
    Some(base - chrono::Duration::minutes(sign * (hours * 60 + minutes)))
}
