//! Keystore credential validation.
//!
//! [`Keystore::load`] tells the two formats `keytool` writes apart: DER
//! input is PKCS#12 (see [`super::pkcs12`]), anything else must be JKS.
//!
//! A JKS file is read just far enough to confirm the store password (integrity
//! digest), the alias (private key entry present) and the key password
//! (key recovery succeeds). Certificates are carried as opaque bytes.
//!
//! # Format
//!
//! ```text
//! u32 magic (0xFEEDFEED)   u32 version (1|2)   u32 entry count
//! entry*: u32 tag, UTF alias, u64 timestamp, then
//!   tag 1 (private key): u32 len + EncryptedPrivateKeyInfo DER,
//!                        u32 chain length, certificate*
//!   tag 2 (trusted cert): certificate
//!   certificate: [UTF type if version 2] u32 len + bytes
//! 20-byte SHA-1 of (password UTF-16BE || "Mighty Aphrodite" || preceding bytes)
//! ```

use super::pkcs12::Pkcs12Store;
use crate::pack::error::CredentialProblem;
use sha1::{Digest, Sha1};

pub(crate) const JKS_MAGIC: u32 = 0xFEED_FEED;
const JCEKS_MAGIC: u32 = 0xCECE_CECE;
pub(crate) const INTEGRITY_WHITENER: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;

const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;

/// DER encoding of OID 1.3.6.1.4.1.42.2.17.1.1 (Sun JKS key protector).
pub(crate) const KEY_PROTECTOR_OID: &[u8] = &[
    0x2B, 0x06, 0x01, 0x04, 0x01, 0x2A, 0x02, 0x11, 0x01, 0x01,
];

/// A keystore opened with its store password.
#[derive(Debug)]
pub enum Keystore {
    Jks(JavaKeyStore),
    Pkcs12(Pkcs12Store),
}

impl Keystore {
    /// Detects the format of `data` and verifies it with `store_password`.
    pub fn load(data: &[u8], store_password: &str) -> Result<Self, CredentialProblem> {
        if data.first() == Some(&0x30) {
            Pkcs12Store::load(data, store_password).map(Self::Pkcs12)
        } else {
            JavaKeyStore::load(data, store_password).map(Self::Jks)
        }
    }

    /// Recovers the private key under `alias` with `key_password`.
    pub fn recover_key(&self, alias: &str, key_password: &str) -> Result<Vec<u8>, CredentialProblem> {
        match self {
            Self::Jks(store) => store.recover_key(alias, key_password),
            Self::Pkcs12(store) => store.recover_key(alias, key_password),
        }
    }
}

/// A parsed keystore entry.
#[derive(Debug, Clone)]
enum Entry {
    PrivateKey {
        alias: String,
        protected_key: Vec<u8>,
    },
    TrustedCert {
        alias: String,
    },
}

impl Entry {
    fn alias(&self) -> &str {
        match self {
            Self::PrivateKey { alias, .. } | Self::TrustedCert { alias } => alias,
        }
    }
}

/// A JKS keystore whose integrity has been verified against a password.
#[derive(Debug)]
pub struct JavaKeyStore {
    entries: Vec<Entry>,
}

impl JavaKeyStore {
    /// Parses `data` and checks the integrity digest with `store_password`.
    pub fn load(data: &[u8], store_password: &str) -> Result<Self, CredentialProblem> {
        if data.len() < 12 + DIGEST_LEN {
            return Err(CredentialProblem::Malformed("file too short".into()));
        }

        let (body, stored_digest) = data.split_at(data.len() - DIGEST_LEN);
        let mut reader = Reader::new(body);

        match reader.u32()? {
            JKS_MAGIC => {}
            JCEKS_MAGIC => return Err(CredentialProblem::UnsupportedFormat("JCEKS".into())),
            other => {
                return Err(CredentialProblem::Malformed(format!(
                    "unknown magic {other:#010x}"
                )));
            }
        }
        let version = reader.u32()?;
        if version != 1 && version != 2 {
            return Err(CredentialProblem::Malformed(format!(
                "unsupported version {version}"
            )));
        }

        let count = reader.u32()?;
        let mut entries = Vec::new();
        for _ in 0..count {
            let tag = reader.u32()?;
            let alias = reader.utf()?;
            let _timestamp = reader.u64()?;
            match tag {
                TAG_PRIVATE_KEY => {
                    let protected_key = reader.sized_bytes()?.to_vec();
                    let chain = reader.u32()?;
                    for _ in 0..chain {
                        reader.certificate(version)?;
                    }
                    entries.push(Entry::PrivateKey {
                        alias,
                        protected_key,
                    });
                }
                TAG_TRUSTED_CERT => {
                    reader.certificate(version)?;
                    entries.push(Entry::TrustedCert { alias });
                }
                other => {
                    return Err(CredentialProblem::Malformed(format!(
                        "unknown entry tag {other}"
                    )));
                }
            }
        }
        if !reader.is_empty() {
            return Err(CredentialProblem::Malformed("trailing data".into()));
        }

        if integrity_digest(store_password, body).as_slice() != stored_digest {
            return Err(CredentialProblem::KeystorePasswordIncorrect);
        }

        Ok(Self { entries })
    }

    /// Aliases in file order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Entry::alias)
    }

    /// Recovers the private key under `alias` with `key_password`.
    ///
    /// Aliases are case-insensitive, as JKS stores them lowercased.
    /// Returns the PKCS#8 bytes of the key.
    pub fn recover_key(&self, alias: &str, key_password: &str) -> Result<Vec<u8>, CredentialProblem> {
        let wanted = alias.to_lowercase();
        let protected = self
            .entries
            .iter()
            .find_map(|entry| match entry {
                Entry::PrivateKey {
                    alias,
                    protected_key,
                } if alias.to_lowercase() == wanted => Some(protected_key),
                _ => None,
            })
            .ok_or_else(|| CredentialProblem::AliasNotFound(alias.to_string()))?;

        let encrypted = parse_encrypted_private_key_info(protected)?;
        unprotect_key(encrypted, key_password)
    }
}

/// UTF-16BE bytes of a password, as JKS hashes them.
pub(crate) fn password_bytes(password: &str) -> Vec<u8> {
    password.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

pub(crate) fn integrity_digest(password: &str, body: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(password_bytes(password));
    hasher.update(INTEGRITY_WHITENER);
    hasher.update(body);
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// XOR keystream of the JKS key protector: SHA-1 chained over the password
/// starting from the salt.
pub(crate) fn keystream(password: &[u8], salt: &[u8], len: usize) -> Vec<u8> {
    let mut stream = Vec::with_capacity(len + DIGEST_LEN);
    let mut block = salt.to_vec();
    while stream.len() < len {
        let mut hasher = Sha1::new();
        hasher.update(password);
        hasher.update(&block);
        block = hasher.finalize().to_vec();
        stream.extend_from_slice(&block);
    }
    stream.truncate(len);
    stream
}

pub(crate) fn key_check_digest(password: &[u8], plain: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(password);
    hasher.update(plain);
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Decrypts `salt || ciphertext || check` and verifies the check digest.
fn unprotect_key(protected: &[u8], key_password: &str) -> Result<Vec<u8>, CredentialProblem> {
    if protected.len() < 2 * DIGEST_LEN {
        return Err(CredentialProblem::Malformed("protected key too short".into()));
    }
    let (salt, rest) = protected.split_at(DIGEST_LEN);
    let (cipher, check) = rest.split_at(rest.len() - DIGEST_LEN);

    let password = password_bytes(key_password);
    let plain: Vec<u8> = cipher
        .iter()
        .zip(keystream(&password, salt, cipher.len()))
        .map(|(c, k)| c ^ k)
        .collect();

    if key_check_digest(&password, &plain).as_slice() != check {
        return Err(CredentialProblem::KeyPasswordIncorrect);
    }
    Ok(plain)
}

/// Extracts the encrypted octets from an `EncryptedPrivateKeyInfo`,
/// requiring the JKS key protector algorithm.
fn parse_encrypted_private_key_info(der: &[u8]) -> Result<&[u8], CredentialProblem> {
    let (info, _) = der_element(der, 0x30)?;
    let (algorithm, rest) = der_element(info, 0x30)?;
    let (oid, _) = der_element(algorithm, 0x06)?;
    if oid != KEY_PROTECTOR_OID {
        return Err(CredentialProblem::UnsupportedFormat(
            "key not protected with the JKS algorithm".into(),
        ));
    }
    let (encrypted, _) = der_element(rest, 0x04)?;
    Ok(encrypted)
}

/// Reads one DER element with the expected tag; returns (contents, remainder).
pub(super) fn der_element(data: &[u8], tag: u8) -> Result<(&[u8], &[u8]), CredentialProblem> {
    let malformed = || CredentialProblem::Malformed("invalid key encoding".into());

    let (&actual, rest) = data.split_first().ok_or_else(malformed)?;
    if actual != tag {
        return Err(malformed());
    }
    let (&first, mut rest) = rest.split_first().ok_or_else(malformed)?;
    let len = if first & 0x80 == 0 {
        usize::from(first)
    } else {
        let octets = usize::from(first & 0x7F);
        if octets == 0 || octets > 4 || rest.len() < octets {
            return Err(malformed());
        }
        let len = rest[..octets]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
        rest = &rest[octets..];
        len
    };
    if rest.len() < len {
        return Err(malformed());
    }
    Ok(rest.split_at(len))
}

/// Big-endian cursor over keystore bytes.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CredentialProblem> {
        if self.data.len() < n {
            return Err(CredentialProblem::Malformed("unexpected end of keystore".into()));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u16(&mut self) -> Result<u16, CredentialProblem> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CredentialProblem> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, CredentialProblem> {
        let hi = u64::from(self.u32()?);
        let lo = u64::from(self.u32()?);
        Ok((hi << 32) | lo)
    }

    /// Java `writeUTF` string. Aliases are ASCII in practice, so modified
    /// UTF-8 is decoded leniently.
    fn utf(&mut self) -> Result<String, CredentialProblem> {
        let len = usize::from(self.u16()?);
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn sized_bytes(&mut self) -> Result<&'a [u8], CredentialProblem> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn certificate(&mut self, version: u32) -> Result<(), CredentialProblem> {
        if version == 2 {
            self.utf()?;
        }
        self.sized_bytes()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::fakes::KeystoreFixture;

    const KEYTOOL_JKS: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/keystores/release.jks"
    ));
    const KEYTOOL_PKCS12: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/keystores/release.p12"
    ));

    fn fixture() -> Vec<u8> {
        KeystoreFixture::new("storepass")
            .private_key("Upload", "keypass", b"pkcs8-key-bytes")
            .trusted_cert("ca")
            .to_bytes()
    }

    #[test]
    fn valid_credential_recovers_key() {
        let store = JavaKeyStore::load(&fixture(), "storepass").unwrap();
        let key = store.recover_key("upload", "keypass").unwrap();
        assert_eq!(key, b"pkcs8-key-bytes");
        assert_eq!(store.aliases().collect::<Vec<_>>(), ["upload", "ca"]);
    }

    #[test]
    fn alias_lookup_ignores_case() {
        let store = JavaKeyStore::load(&fixture(), "storepass").unwrap();
        assert!(store.recover_key("UPLOAD", "keypass").is_ok());
    }

    #[test]
    fn wrong_store_password() {
        let err = JavaKeyStore::load(&fixture(), "nope").unwrap_err();
        assert_eq!(err, CredentialProblem::KeystorePasswordIncorrect);
    }

    #[test]
    fn unknown_alias() {
        let store = JavaKeyStore::load(&fixture(), "storepass").unwrap();
        let err = store.recover_key("release", "keypass").unwrap_err();
        assert_eq!(err, CredentialProblem::AliasNotFound("release".into()));
    }

    #[test]
    fn trusted_cert_alias_is_not_a_key() {
        let store = JavaKeyStore::load(&fixture(), "storepass").unwrap();
        let err = store.recover_key("ca", "keypass").unwrap_err();
        assert_eq!(err, CredentialProblem::AliasNotFound("ca".into()));
    }

    #[test]
    fn wrong_key_password() {
        let store = JavaKeyStore::load(&fixture(), "storepass").unwrap();
        let err = store.recover_key("upload", "storepass").unwrap_err();
        assert_eq!(err, CredentialProblem::KeyPasswordIncorrect);
    }

    #[test]
    fn keytool_jks_store() {
        let store = Keystore::load(KEYTOOL_JKS, "storepass").unwrap();
        assert!(matches!(store, Keystore::Jks(_)));
        let key = store.recover_key("upload", "keypass").unwrap();
        assert_eq!(key[0], 0x30);

        assert_eq!(
            Keystore::load(KEYTOOL_JKS, "keypass").unwrap_err(),
            CredentialProblem::KeystorePasswordIncorrect
        );
        assert_eq!(
            store.recover_key("release", "keypass").unwrap_err(),
            CredentialProblem::AliasNotFound("release".into())
        );
        assert_eq!(
            store.recover_key("upload", "storepass").unwrap_err(),
            CredentialProblem::KeyPasswordIncorrect
        );
    }

    #[test]
    fn keytool_pkcs12_store() {
        let store = Keystore::load(KEYTOOL_PKCS12, "storepass").unwrap();
        assert!(matches!(store, Keystore::Pkcs12(_)));
        let key = store.recover_key("UPLOAD", "storepass").unwrap();
        assert_eq!(key[0], 0x30);

        assert_eq!(
            Keystore::load(KEYTOOL_PKCS12, "keypass").unwrap_err(),
            CredentialProblem::KeystorePasswordIncorrect
        );
        assert_eq!(
            store.recover_key("release", "storepass").unwrap_err(),
            CredentialProblem::AliasNotFound("release".into())
        );
        assert_eq!(
            store.recover_key("upload", "keypass").unwrap_err(),
            CredentialProblem::KeyPasswordIncorrect
        );
    }

    #[test]
    fn jceks_is_unsupported() {
        let mut data = JCEKS_MAGIC.to_be_bytes().to_vec();
        data.resize(64, 0);
        let err = Keystore::load(&data, "x").unwrap_err();
        assert_eq!(err, CredentialProblem::UnsupportedFormat("JCEKS".into()));
    }

    #[test]
    fn truncated_store_is_malformed() {
        let data = fixture();
        let err = JavaKeyStore::load(&data[..30], "storepass").unwrap_err();
        assert!(matches!(err, CredentialProblem::Malformed(_)));
    }

    #[test]
    fn keystream_spans_multiple_blocks() {
        let stream = keystream(b"pw", &[0u8; 20], 45);
        assert_eq!(stream.len(), 45);
        assert_ne!(stream[..20], stream[20..40]);
    }
}
