//! Standard security handler for RC4-encrypted documents.
//!
//! Implements the password algorithms of the PDF specification for
//! /V 1 and /V 2 (RC4 40-bit and RC4 up to 128-bit). Higher versions are
//! rejected as unsupported.

use log::{debug, trace};
use md5::{Digest, Md5};
use zeroize::Zeroize;

use crate::error::{EncryptionErrorKind, PDFError, Result};
use crate::pdf::object::Dict;

use super::rc4::Rc4;

/// Standard padding string from the PDF specification (ISO 32000-1,
/// section 7.6.3.3).
const PDF_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Parameters parsed from the /Encrypt dictionary, plus the derived file
/// key once a password has validated.
#[derive(Debug)]
pub struct EncryptInfo {
    pub version: i32,
    pub revision: i32,
    /// File key length in bytes.
    pub key_length: usize,
    /// /O value.
    pub owner_hash: Vec<u8>,
    /// /U value.
    pub user_hash: Vec<u8>,
    /// /P value (signed).
    pub permissions: i32,
    /// First element of the trailer /ID array.
    pub file_id: Vec<u8>,
    /// Derived file key, empty until authentication succeeds.
    pub key: Vec<u8>,
}

impl Drop for EncryptInfo {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl EncryptInfo {
    /// Build encryption info from a parsed /Encrypt dictionary and the
    /// trailer file ID.
    pub fn from_dict(dict: &Dict, file_id: Vec<u8>) -> Result<Self> {
        let version = dict.get_int("V").unwrap_or(1) as i32;
        if version > 2 {
            return Err(PDFError::Encryption(EncryptionErrorKind::UnsupportedVersion(version)));
        }

        let revision = dict.get_int("R").unwrap_or(2) as i32;
        // The key is max(5, Length/8) bytes; V=1 files normally omit /Length.
        let key_length = dict
            .get_int("Length")
            .map(|bits| (bits / 8).max(5) as usize)
            .unwrap_or(5)
            .min(16);

        let owner_hash = dict
            .get_string("O")
            .map(|s| s.data.clone())
            .unwrap_or_default();
        let user_hash = dict
            .get_string("U")
            .map(|s| s.data.clone())
            .unwrap_or_default();
        let permissions = dict.get_int("P").unwrap_or(0) as i32;

        if file_id.is_empty() {
            return Err(PDFError::Encryption(EncryptionErrorKind::MissingID));
        }

        debug!(
            "encrypt dict: V={} R={} key_length={}",
            version, revision, key_length
        );

        Ok(Self {
            version,
            revision,
            key_length,
            owner_hash,
            user_hash,
            permissions,
            file_id,
            key: Vec::new(),
        })
    }

    /// Try the password as a user password, then as an owner password.
    /// On success the derived file key is stored.
    pub fn authenticate(&mut self, password: &[u8]) -> Result<()> {
        let key = self.compute_file_key(password);
        if self.validate_user_password(&key) {
            trace!("user password accepted");
            self.key = key;
            return Ok(());
        }

        let mut user_pass = self.user_password_from_owner(password);
        let key = self.compute_file_key(&user_pass);
        user_pass.zeroize();
        if self.validate_user_password(&key) {
            trace!("owner password accepted");
            self.key = key;
            return Ok(());
        }

        Err(PDFError::Encryption(EncryptionErrorKind::InvalidPassword))
    }

    /// Algorithm 2: derive the file key from a (user) password.
    pub fn compute_file_key(&self, password: &[u8]) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(pad_password(password));
        hasher.update(&self.owner_hash);
        hasher.update((self.permissions as u32).to_le_bytes());
        hasher.update(&self.file_id);
        let mut digest = hasher.finalize().to_vec();

        // Revision 3 and later stretch the key with 50 further MD5 rounds
        // over the first key_length bytes. All 50 rounds are required.
        if self.revision >= 3 {
            for _ in 0..50 {
                let mut hasher = Md5::new();
                hasher.update(&digest[..self.key_length]);
                digest = hasher.finalize().to_vec();
            }
        }

        digest.truncate(self.key_length);
        digest
    }

    /// Algorithms 4 and 5: check a candidate file key against /U.
    pub fn validate_user_password(&self, key: &[u8]) -> bool {
        if self.revision == 2 {
            // Revision 2: RC4 over the padding must reproduce /U.
            let mut computed = PDF_PADDING.to_vec();
            Rc4::process(key, &mut computed);
            return computed == self.user_hash;
        }

        // Revision 3+: hash padding and file ID, one RC4 pass, then 19
        // passes with the key XORed by the round number.
        let mut hasher = Md5::new();
        hasher.update(PDF_PADDING);
        hasher.update(&self.file_id);
        let mut digest = hasher.finalize().to_vec();

        Rc4::process(key, &mut digest);
        for round in 1u8..=19 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
            Rc4::process(&round_key, &mut digest);
        }

        digest.len() >= 16 && self.user_hash.len() >= 16 && digest[..16] == self.user_hash[..16]
    }

    /// Algorithm 7: recover the user password from an owner password by
    /// decrypting /O in reverse.
    pub fn user_password_from_owner(&self, owner_password: &[u8]) -> Vec<u8> {
        let mut digest = Md5::digest(pad_password(owner_password)).to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                digest = Md5::digest(&digest).to_vec();
            }
        }
        let key = &digest[..self.key_length];

        let mut user_pass = self.owner_hash.clone();
        if self.revision == 2 {
            Rc4::process(key, &mut user_pass);
        } else {
            for round in (0u8..=19).rev() {
                let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
                Rc4::process(&round_key, &mut user_pass);
            }
        }
        user_pass
    }

    /// Build the RC4 cipher for one indirect object. The per-object key is
    /// MD5 over the file key, the object number (3 bytes LE) and the
    /// generation (2 bytes LE), truncated to min(16, key_length + 5).
    pub fn object_cipher(&self, number: u32, generation: u16) -> Rc4 {
        let mut hasher = Md5::new();
        hasher.update(&self.key);
        hasher.update(&number.to_le_bytes()[..3]);
        hasher.update(&u32::from(generation).to_le_bytes()[..2]);
        let digest = hasher.finalize();

        let key_len = (self.key.len() + 5).min(16);
        Rc4::new(&digest[..key_len])
    }
}

/// Pad or truncate a password to 32 bytes with the standard padding.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let n = password.len().min(32);
    padded[..n].copy_from_slice(&password[..n]);
    padded[n..].copy_from_slice(&PDF_PADDING[..32 - n]);
    padded
}

/// Compute the /O value for a document, used to build encrypted fixtures
/// and by callers that emit /Encrypt dictionaries.
pub fn compute_owner_hash(
    owner_password: &[u8],
    user_password: &[u8],
    revision: i32,
    key_length: usize,
) -> Vec<u8> {
    let mut digest = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            digest = Md5::digest(&digest).to_vec();
        }
    }
    let key = &digest[..key_length];

    let mut o_value = pad_password(user_password).to_vec();
    Rc4::process(key, &mut o_value);
    if revision >= 3 {
        for round in 1u8..=19 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
            Rc4::process(&round_key, &mut o_value);
        }
    }
    o_value
}

/// Compute the /U value for a document from an already-derived file key.
pub fn compute_user_hash(file_key: &[u8], file_id: &[u8], revision: i32) -> Vec<u8> {
    if revision == 2 {
        let mut u_value = PDF_PADDING.to_vec();
        Rc4::process(file_key, &mut u_value);
        return u_value;
    }

    let mut hasher = Md5::new();
    hasher.update(PDF_PADDING);
    hasher.update(file_id);
    let mut digest = hasher.finalize().to_vec();

    Rc4::process(file_key, &mut digest);
    for round in 1u8..=19 {
        let round_key: Vec<u8> = file_key.iter().map(|b| b ^ round).collect();
        Rc4::process(&round_key, &mut digest);
    }
    // Revision 3 stores the 16-byte hash padded to 32 bytes.
    digest.resize(32, 0);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::object::{Object, PDFString};
    use test_log::test;

    fn make_info(revision: i32, key_length: usize, user: &[u8], owner: &[u8]) -> EncryptInfo {
        let file_id = b"0123456789abcdef".to_vec();
        let permissions: i32 = -4;
        let owner_hash = compute_owner_hash(owner, user, revision, key_length);

        let mut info = EncryptInfo {
            version: if revision == 2 { 1 } else { 2 },
            revision,
            key_length,
            owner_hash,
            user_hash: Vec::new(),
            permissions,
            file_id,
            key: Vec::new(),
        };
        let file_key = info.compute_file_key(user);
        info.user_hash = compute_user_hash(&file_key, &info.file_id, revision);
        info
    }

    #[test]
    fn test_pad_password() {
        let padded = pad_password(b"test");
        assert_eq!(padded.len(), 32);
        assert_eq!(&padded[..4], b"test");
        assert_eq!(&padded[4..], &PDF_PADDING[..28]);

        // Long passwords truncate to 32 bytes
        let long = vec![b'x'; 64];
        assert_eq!(pad_password(&long), [b'x'; 32]);
    }

    #[test]
    fn test_key_length_rev2() {
        let info = make_info(2, 5, b"user", b"owner");
        assert_eq!(info.compute_file_key(b"user").len(), 5);
    }

    #[test]
    fn test_key_length_rev3() {
        let info = make_info(3, 16, b"user", b"owner");
        assert_eq!(info.compute_file_key(b"user").len(), 16);
    }

    #[test]
    fn test_user_password_roundtrip_rev2() {
        let mut info = make_info(2, 5, b"user", b"owner");
        assert!(info.authenticate(b"user").is_ok());
        assert_eq!(info.key.len(), 5);
    }

    #[test]
    fn test_user_password_roundtrip_rev3() {
        let mut info = make_info(3, 16, b"user", b"owner");
        assert!(info.authenticate(b"user").is_ok());
        assert_eq!(info.key.len(), 16);
    }

    #[test]
    fn test_owner_password_recovers_user() {
        let mut info = make_info(3, 16, b"user", b"owner");
        let recovered = info.user_password_from_owner(b"owner");
        assert_eq!(&recovered[..4], b"user");
        assert!(info.authenticate(b"owner").is_ok());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let mut info = make_info(3, 16, b"user", b"owner");
        let err = info.authenticate(b"wrong").unwrap_err();
        assert!(matches!(
            err,
            PDFError::Encryption(EncryptionErrorKind::InvalidPassword)
        ));
    }

    #[test]
    fn test_empty_password_against_owner_only_protection() {
        // Owner-only protection: user password is empty. Both an empty
        // password and the owner password must open the document.
        let mut info = make_info(3, 16, b"", b"owner");
        assert!(info.authenticate(b"").is_ok());

        let mut info = make_info(3, 16, b"", b"owner");
        assert!(info.authenticate(b"owner").is_ok());
    }

    #[test]
    fn test_object_cipher_key_truncation() {
        let mut info = make_info(2, 5, b"", b"");
        info.authenticate(b"").unwrap();
        // 5-byte file key gives a 10-byte object key; two distinct objects
        // must get distinct keystreams.
        let mut a = b"same bytes".to_vec();
        let mut b = b"same bytes".to_vec();
        info.object_cipher(1, 0).apply(&mut a);
        info.object_cipher(2, 0).apply(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_dict_rejects_high_version() {
        let mut dict = Dict::new();
        dict.set("V", Object::Integer(4));
        dict.set("R", Object::Integer(4));
        let err = EncryptInfo::from_dict(&dict, b"id".to_vec()).unwrap_err();
        assert!(matches!(
            err,
            PDFError::Encryption(EncryptionErrorKind::UnsupportedVersion(4))
        ));
    }

    #[test]
    fn test_from_dict_requires_file_id() {
        let mut dict = Dict::new();
        dict.set("V", Object::Integer(1));
        dict.set("R", Object::Integer(2));
        dict.set("O", Object::String(PDFString::literal(vec![0; 32])));
        dict.set("U", Object::String(PDFString::literal(vec![0; 32])));
        let err = EncryptInfo::from_dict(&dict, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            PDFError::Encryption(EncryptionErrorKind::MissingID)
        ));
    }

    #[test]
    fn test_from_dict_key_length() {
        let mut dict = Dict::new();
        dict.set("V", Object::Integer(2));
        dict.set("R", Object::Integer(3));
        dict.set("Length", Object::Integer(128));
        dict.set("P", Object::Integer(-44));
        let info = EncryptInfo::from_dict(&dict, b"id".to_vec()).unwrap();
        assert_eq!(info.key_length, 16);
        assert_eq!(info.permissions, -44);
    }
}
