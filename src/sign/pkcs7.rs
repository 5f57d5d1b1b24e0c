//! PKCS#7 / CMS `SignedData` for detached PDF signatures.
//!
//! Only the profile this crate emits is handled: SHA-256 digests, one
//! signer, signed attributes carrying contentType and messageDigest, the
//! signer certificate embedded, and ECDSA P-256 or RSA PKCS#1 v1.5
//! signatures. The structures are encoded and decoded directly as DER
//! tag-length-value sequences.

use crate::error::{PDFError, Result};

// OID content bytes (without the 0x06 tag).
pub(crate) const OID_SIGNED_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];
pub(crate) const OID_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01];
pub(crate) const OID_SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
pub(crate) const OID_CONTENT_TYPE: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x03];
pub(crate) const OID_MESSAGE_DIGEST: &[u8] =
    &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x04];
pub(crate) const OID_ECDSA_SHA256: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x02];
pub(crate) const OID_RSA_SHA256: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];

/// The signature algorithm recorded in the SignerInfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    EcdsaP256Sha256,
    RsaSha256,
}

impl SignatureAlgorithm {
    pub(crate) fn oid(self) -> &'static [u8] {
        match self {
            Self::EcdsaP256Sha256 => OID_ECDSA_SHA256,
            Self::RsaSha256 => OID_RSA_SHA256,
        }
    }

    /// Map an OID back to an algorithm, for verification.
    pub(crate) fn from_oid(oid: &[u8]) -> Option<Self> {
        if oid == OID_ECDSA_SHA256 {
            Some(Self::EcdsaP256Sha256)
        } else if oid == OID_RSA_SHA256 {
            Some(Self::RsaSha256)
        } else {
            None
        }
    }
}

// ---- DER encoding -------------------------------------------------------

fn der_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let mut out = vec![0x80 | (bytes.len() - skip) as u8];
    out.extend_from_slice(&bytes[skip..]);
    out
}

pub(crate) fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&der_length(content.len()));
    out.extend_from_slice(content);
    out
}

pub(crate) fn seq(parts: &[&[u8]]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

pub(crate) fn set(parts: &[&[u8]]) -> Vec<u8> {
    tlv(0x31, &parts.concat())
}

pub(crate) fn oid(body: &[u8]) -> Vec<u8> {
    tlv(0x06, body)
}

pub(crate) fn octet_string(data: &[u8]) -> Vec<u8> {
    tlv(0x04, data)
}

pub(crate) fn integer(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take_while(|&&b| b == 0)
        .count()
        .min(bytes.len() - 1);
    integer_from_bytes(&bytes[skip..])
}

/// INTEGER from raw magnitude bytes, prepending a zero when the high bit
/// is set so the value stays non-negative.
pub(crate) fn integer_from_bytes(magnitude: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(magnitude.len() + 1);
    if magnitude.first().is_some_and(|&b| b & 0x80 != 0) {
        content.push(0);
    }
    content.extend_from_slice(magnitude);
    tlv(0x02, &content)
}

fn null() -> Vec<u8> {
    vec![0x05, 0x00]
}

fn digest_algorithm_sha256() -> Vec<u8> {
    seq(&[&oid(OID_SHA256), &null()])
}

fn signature_algorithm(alg: SignatureAlgorithm) -> Vec<u8> {
    match alg {
        // ecdsa-with-SHA256 takes no parameters
        SignatureAlgorithm::EcdsaP256Sha256 => seq(&[&oid(alg.oid())]),
        SignatureAlgorithm::RsaSha256 => seq(&[&oid(alg.oid()), &null()]),
    }
}

/// The DER SET OF signed attributes: contentType (pkcs7-data) and
/// messageDigest. This encoding, with the SET OF tag, is the exact byte
/// string the signature is computed over.
pub fn signed_attributes(message_digest: &[u8]) -> Vec<u8> {
    let content_type = seq(&[&oid(OID_CONTENT_TYPE), &set(&[&oid(OID_DATA)])]);
    let digest = seq(&[&oid(OID_MESSAGE_DIGEST), &set(&[&octet_string(message_digest)])]);
    // The attributes happen to already be in the DER SET OF ordering.
    set(&[&content_type, &digest])
}

/// Identity of the signer, taken from its certificate.
pub struct SignerIdentity<'a> {
    /// Raw DER of the issuer Name.
    pub issuer_der: &'a [u8],
    /// Raw serial number magnitude bytes.
    pub serial: &'a [u8],
}

/// Assemble the detached `SignedData`, wrapped in a ContentInfo.
///
/// `signed_attrs` must be the output of [`signed_attributes`];
/// `signature` is the raw signature over those bytes.
pub fn build_signed_data(
    certificate_der: &[u8],
    identity: &SignerIdentity<'_>,
    algorithm: SignatureAlgorithm,
    signed_attrs: &[u8],
    signature: &[u8],
) -> Vec<u8> {
    // Inside the SignerInfo the attributes are tagged [0] IMPLICIT.
    let mut attrs_implicit = signed_attrs.to_vec();
    attrs_implicit[0] = 0xA0;

    let issuer_and_serial = seq(&[identity.issuer_der, &integer_from_bytes(identity.serial)]);

    let signer_info = seq(&[
        &integer(1),
        &issuer_and_serial,
        &digest_algorithm_sha256(),
        &attrs_implicit,
        &signature_algorithm(algorithm),
        &octet_string(signature),
    ]);

    let signed_data = seq(&[
        &integer(1),
        &set(&[&digest_algorithm_sha256()]),
        // Detached: the encapsulated content is named but absent.
        &seq(&[&oid(OID_DATA)]),
        // certificates [0] IMPLICIT
        &tlv(0xA0, certificate_der),
        &set(&[&signer_info]),
    ]);

    seq(&[&oid(OID_SIGNED_DATA), &tlv(0xA0, &signed_data)])
}

// ---- DER decoding -------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read one TLV, returning (tag, content, whole encoding).
    fn read(&mut self) -> Result<(u8, &'a [u8], &'a [u8])> {
        let start = self.pos;
        let tag = *self
            .data
            .get(self.pos)
            .ok_or_else(|| PDFError::malformed_signature("truncated DER"))?;
        self.pos += 1;

        let first = *self
            .data
            .get(self.pos)
            .ok_or_else(|| PDFError::malformed_signature("truncated DER length"))?;
        self.pos += 1;

        let len = if first < 0x80 {
            usize::from(first)
        } else {
            let n = usize::from(first & 0x7F);
            if n == 0 || n > 4 {
                return Err(PDFError::malformed_signature("unsupported DER length"));
            }
            let mut len = 0usize;
            for _ in 0..n {
                let b = *self
                    .data
                    .get(self.pos)
                    .ok_or_else(|| PDFError::malformed_signature("truncated DER length"))?;
                self.pos += 1;
                len = (len << 8) | usize::from(b);
            }
            len
        };

        if self.pos + len > self.data.len() {
            return Err(PDFError::malformed_signature("DER value exceeds input"));
        }
        let content = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok((tag, content, &self.data[start..self.pos]))
    }

    fn expect(&mut self, expected: u8, what: &str) -> Result<&'a [u8]> {
        let (tag, content, _) = self.read()?;
        if tag != expected {
            return Err(PDFError::malformed_signature(format!(
                "expected {what} (tag {expected:#04x}), found tag {tag:#04x}"
            )));
        }
        Ok(content)
    }
}

/// The pieces of a parsed detached signature needed for verification.
pub struct ParsedSignature {
    /// messageDigest attribute value.
    pub message_digest: Vec<u8>,
    /// Signed attributes re-encoded with the SET OF tag; the byte string
    /// the signature covers.
    pub signed_attrs: Vec<u8>,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
    /// Signature algorithm OID content bytes.
    pub algorithm_oid: Vec<u8>,
}

/// Parse a ContentInfo-wrapped `SignedData` and pull out the first
/// signer's digest, attributes and signature.
pub fn parse_signed_data(der: &[u8]) -> Result<ParsedSignature> {
    let mut top = Reader::new(der);
    let content_info = top.expect(0x30, "ContentInfo")?;

    let mut ci = Reader::new(content_info);
    let content_type = ci.expect(0x06, "content type OID")?;
    if content_type != OID_SIGNED_DATA {
        return Err(PDFError::malformed_signature("not a SignedData structure"));
    }
    let wrapped = ci.expect(0xA0, "SignedData wrapper")?;

    let mut sd_outer = Reader::new(wrapped);
    let signed_data = sd_outer.expect(0x30, "SignedData")?;

    let mut sd = Reader::new(signed_data);
    sd.expect(0x02, "version")?;
    sd.expect(0x31, "digest algorithms")?;
    sd.expect(0x30, "encapsulated content")?;
    // Optional certificates [0] and crls [1]
    while matches!(sd.peek_tag(), Some(0xA0) | Some(0xA1)) {
        sd.read()?;
    }
    let signer_infos = sd.expect(0x31, "signer infos")?;

    let mut infos = Reader::new(signer_infos);
    let signer_info = infos.expect(0x30, "SignerInfo")?;

    let mut si = Reader::new(signer_info);
    si.expect(0x02, "signer version")?;
    si.expect(0x30, "issuer and serial")?;
    si.expect(0x30, "digest algorithm")?;

    let (attrs_tag, attrs_content, attrs_whole) = si.read()?;
    if attrs_tag != 0xA0 {
        return Err(PDFError::malformed_signature("missing signed attributes"));
    }
    let mut signed_attrs = attrs_whole.to_vec();
    signed_attrs[0] = 0x31;

    let message_digest = extract_message_digest(attrs_content)?;

    let sig_alg = si.expect(0x30, "signature algorithm")?;
    let mut alg = Reader::new(sig_alg);
    let algorithm_oid = alg.expect(0x06, "signature algorithm OID")?.to_vec();

    let signature = si.expect(0x04, "signature")?.to_vec();

    Ok(ParsedSignature {
        message_digest,
        signed_attrs,
        signature,
        algorithm_oid,
    })
}

/// Scan the attribute list for the messageDigest attribute.
fn extract_message_digest(attrs: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::new(attrs);
    while !reader.done() {
        let (tag, attr, _) = reader.read()?;
        if tag != 0x30 {
            continue;
        }
        let mut a = Reader::new(attr);
        let attr_oid = a.expect(0x06, "attribute OID")?;
        if attr_oid != OID_MESSAGE_DIGEST {
            continue;
        }
        let values = a.expect(0x31, "attribute values")?;
        let mut v = Reader::new(values);
        return Ok(v.expect(0x04, "message digest")?.to_vec());
    }
    Err(PDFError::malformed_signature("no messageDigest attribute"))
}

// ---- test certificate ---------------------------------------------------

/// Build a syntactically valid self-signed certificate around the given
/// uncompressed P-256 public point. The signature on the certificate is a
/// dummy; only the parseable structure matters for tests.
#[cfg(test)]
pub(crate) fn test_certificate(public_point: &[u8]) -> Vec<u8> {
    const OID_CN: &[u8] = &[0x55, 0x04, 0x03];
    const OID_EC_PUBLIC_KEY: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x02, 0x01];
    const OID_PRIME256V1: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07];

    let name = seq(&[&set(&[&seq(&[
        &oid(OID_CN),
        &tlv(0x0C, b"Test Signer"),
    ])])]);
    let validity = seq(&[
        &tlv(0x17, b"250101000000Z"),
        &tlv(0x17, b"350101000000Z"),
    ]);

    let mut point = vec![0u8];
    point.extend_from_slice(public_point);
    let spki = seq(&[
        &seq(&[&oid(OID_EC_PUBLIC_KEY), &oid(OID_PRIME256V1)]),
        &tlv(0x03, &point),
    ]);

    let sig_alg = seq(&[&oid(OID_ECDSA_SHA256)]);
    let tbs = seq(&[
        &tlv(0xA0, &integer(2)),
        &integer(0x1001),
        &sig_alg,
        &name,
        &validity,
        &name,
        &spki,
    ]);

    let mut dummy_sig = vec![0u8];
    dummy_sig.extend_from_slice(&seq(&[&integer(1), &integer(1)]));
    seq(&[&tbs, &sig_alg, &tlv(0x03, &dummy_sig)])
}
