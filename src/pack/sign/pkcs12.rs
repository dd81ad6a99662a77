//! PKCS#12 credential validation.
//!
//! `keytool` writes PKCS#12 by default, whatever the file extension. Only
//! the parts a credential check needs are read: the MAC proves the store
//! password, `friendlyName` attributes on key bags name the aliases, and
//! decrypting a shrouded key bag proves the key password. Certificate bags
//! live in encrypted content and are skipped.
//!
//! Supported protection: HMAC-SHA1/SHA-256 store MACs, PBES2 (PBKDF2 with
//! HMAC-SHA1/SHA-256, AES-CBC) and `pbeWithSHAAnd3-KeyTripleDES-CBC` keys.

use super::keystore::der_element;
use crate::pack::error::CredentialProblem;
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7};
use des::TdesEde3;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OID: u8 = 0x06;
const TAG_BMP_STRING: u8 = 0x1E;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const TAG_EXPLICIT_0: u8 = 0xA0;

/// 1.2.840.113549.1.7.1
const OID_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01];
/// 1.2.840.113549.1.12.10.1.1
const OID_KEY_BAG: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x0C, 0x0A, 0x01, 0x01];
/// 1.2.840.113549.1.12.10.1.2
const OID_SHROUDED_KEY_BAG: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x0C, 0x0A, 0x01, 0x02];
/// 1.2.840.113549.1.9.20
const OID_FRIENDLY_NAME: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x14];

/// 1.3.14.3.2.26
const OID_SHA1: &[u8] = &[0x2B, 0x0E, 0x03, 0x02, 0x1A];
/// 2.16.840.1.101.3.4.2.1
const OID_SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];

/// 1.2.840.113549.1.5.13
const OID_PBES2: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x05, 0x0D];
/// 1.2.840.113549.1.5.12
const OID_PBKDF2: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x05, 0x0C];
/// 1.2.840.113549.2.7
const OID_HMAC_SHA1: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x07];
/// 1.2.840.113549.2.9
const OID_HMAC_SHA256: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x09];
/// 2.16.840.1.101.3.4.1.{2,22,42}
const OID_AES_CBC_PREFIX: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01];
/// 1.2.840.113549.1.12.1.3
const OID_PBE_SHA1_3DES: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x0C, 0x01, 0x03];

/// Hash input block size of SHA-1 and SHA-256.
const HASH_BLOCK_LEN: usize = 64;

/// PKCS#12 key derivation purposes (RFC 7292, appendix B.3).
const KDF_KEY: u8 = 1;
const KDF_IV: u8 = 2;
const KDF_MAC: u8 = 3;

#[derive(Debug, Clone)]
struct KeyBag {
    alias: String,
    /// `EncryptedPrivateKeyInfo` of a shrouded bag.
    encrypted: Option<Vec<u8>>,
    /// `PrivateKeyInfo` of a plain key bag.
    plain: Option<Vec<u8>>,
}

/// A PKCS#12 store whose MAC has been verified against a password.
#[derive(Debug)]
pub struct Pkcs12Store {
    keys: Vec<KeyBag>,
}

impl Pkcs12Store {
    /// Parses `data` and verifies the store MAC with `store_password`.
    pub fn load(data: &[u8], store_password: &str) -> Result<Self, CredentialProblem> {
        let (pfx, _) = der_element(data, TAG_SEQUENCE)?;
        let (_version, rest) = der_element(pfx, TAG_INTEGER)?;
        let (auth_safe, rest) = der_element(rest, TAG_SEQUENCE)?;
        let auth_safe = data_content(auth_safe)?.ok_or_else(|| {
            CredentialProblem::UnsupportedFormat("PKCS#12 with public-key integrity".into())
        })?;

        if !rest.is_empty() {
            let (mac_data, _) = der_element(rest, TAG_SEQUENCE)?;
            verify_mac(mac_data, auth_safe, store_password)?;
        }

        let mut keys = Vec::new();
        let (contents, _) = der_element(auth_safe, TAG_SEQUENCE)?;
        for content_info in elements(contents, TAG_SEQUENCE) {
            // Encrypted content holds the certificate bags.
            let Some(safe_contents) = data_content(content_info?)? else {
                continue;
            };
            let (bags, _) = der_element(safe_contents, TAG_SEQUENCE)?;
            for bag in elements(bags, TAG_SEQUENCE) {
                if let Some(key) = key_bag(bag?)? {
                    keys.push(key);
                }
            }
        }

        Ok(Self { keys })
    }

    /// Aliases of the private keys, in file order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|key| key.alias.as_str())
    }

    /// Decrypts the private key under `alias` with `key_password`.
    ///
    /// Aliases are matched case-insensitively. Returns the PKCS#8 bytes.
    pub fn recover_key(&self, alias: &str, key_password: &str) -> Result<Vec<u8>, CredentialProblem> {
        let wanted = alias.to_lowercase();
        let bag = self
            .keys
            .iter()
            .find(|key| key.alias.to_lowercase() == wanted)
            .ok_or_else(|| CredentialProblem::AliasNotFound(alias.to_string()))?;

        match (&bag.encrypted, &bag.plain) {
            (Some(encrypted), _) => decrypt_private_key(encrypted, key_password),
            (None, Some(plain)) => Ok(plain.clone()),
            (None, None) => Err(CredentialProblem::Malformed("empty key bag".into())),
        }
    }
}

/// Iterates the DER elements packed in `data`, each expected to carry `tag`.
fn elements(data: &[u8], tag: u8) -> impl Iterator<Item = Result<&[u8], CredentialProblem>> {
    let mut rest = data;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        Some(der_element(rest, tag).map(|(element, tail)| {
            rest = tail;
            element
        }))
    })
}

fn uint(contents: &[u8]) -> Result<u32, CredentialProblem> {
    let digits = match contents {
        [0, rest @ ..] => rest,
        other => other,
    };
    if digits.len() > 4 {
        return Err(CredentialProblem::Malformed("integer out of range".into()));
    }
    Ok(digits.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Octets of a `data` ContentInfo, `None` for any other content type.
fn data_content(content_info: &[u8]) -> Result<Option<&[u8]>, CredentialProblem> {
    let (oid, rest) = der_element(content_info, TAG_OID)?;
    if oid != OID_DATA {
        return Ok(None);
    }
    let (explicit, _) = der_element(rest, TAG_EXPLICIT_0)?;
    let (octets, _) = der_element(explicit, TAG_OCTET_STRING)?;
    Ok(Some(octets))
}

fn key_bag(bag: &[u8]) -> Result<Option<KeyBag>, CredentialProblem> {
    let (bag_id, rest) = der_element(bag, TAG_OID)?;
    let shrouded = bag_id == OID_SHROUDED_KEY_BAG;
    if !shrouded && bag_id != OID_KEY_BAG {
        return Ok(None);
    }
    let (value, attributes) = der_element(rest, TAG_EXPLICIT_0)?;
    let Some(alias) = friendly_name(attributes)? else {
        return Ok(None);
    };

    let value = value.to_vec();
    Ok(Some(if shrouded {
        KeyBag {
            alias,
            encrypted: Some(value),
            plain: None,
        }
    } else {
        KeyBag {
            alias,
            encrypted: None,
            plain: Some(value),
        }
    }))
}

fn friendly_name(attributes: &[u8]) -> Result<Option<String>, CredentialProblem> {
    if attributes.is_empty() {
        return Ok(None);
    }
    let (attributes, _) = der_element(attributes, TAG_SET)?;
    for attribute in elements(attributes, TAG_SEQUENCE) {
        let (id, values) = der_element(attribute?, TAG_OID)?;
        if id != OID_FRIENDLY_NAME {
            continue;
        }
        let (values, _) = der_element(values, TAG_SET)?;
        let (name, _) = der_element(values, TAG_BMP_STRING)?;
        let units: Vec<u16> = name
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Ok(Some(String::from_utf16_lossy(&units)));
    }
    Ok(None)
}

/// UTF-16BE password with a terminating NUL, as the PKCS#12 KDF expects.
fn bmp_password(password: &str) -> Vec<u8> {
    password
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_be_bytes)
        .collect()
}

/// PKCS#12 key derivation (RFC 7292, appendix B.2).
fn pkcs12_kdf<D: Digest>(password: &[u8], salt: &[u8], id: u8, iterations: u32, len: usize) -> Vec<u8> {
    let fill = |source: &[u8]| -> Vec<u8> {
        if source.is_empty() {
            return Vec::new();
        }
        let target = HASH_BLOCK_LEN * source.len().div_ceil(HASH_BLOCK_LEN);
        source.iter().copied().cycle().take(target).collect()
    };
    let diversifier = [id; HASH_BLOCK_LEN];
    let mut input = fill(salt);
    input.extend(fill(password));

    let mut out = Vec::with_capacity(len);
    loop {
        let mut block = D::new()
            .chain_update(diversifier)
            .chain_update(&input)
            .finalize()
            .to_vec();
        for _ in 1..iterations {
            block = D::digest(&block).to_vec();
        }
        out.extend_from_slice(&block);
        if out.len() >= len {
            break;
        }

        let addend: Vec<u8> = block.iter().copied().cycle().take(HASH_BLOCK_LEN).collect();
        for chunk in input.chunks_mut(HASH_BLOCK_LEN) {
            let mut carry = 1u16;
            for (byte, add) in chunk.iter_mut().rev().zip(addend.iter().rev()) {
                let sum = u16::from(*byte) + u16::from(*add) + carry;
                *byte = sum as u8;
                carry = sum >> 8;
            }
        }
    }
    out.truncate(len);
    out
}

fn hmac_matches<M: Mac + KeyInit>(key: &[u8], data: &[u8], expected: &[u8]) -> bool {
    match <M as KeyInit>::new_from_slice(key) {
        Ok(mut mac) => {
            Mac::update(&mut mac, data);
            mac.verify_slice(expected).is_ok()
        }
        Err(_) => false,
    }
}

/// Checks `MacData` over the authenticated safe.
fn verify_mac(mac_data: &[u8], auth_safe: &[u8], password: &str) -> Result<(), CredentialProblem> {
    let (digest_info, rest) = der_element(mac_data, TAG_SEQUENCE)?;
    let (algorithm, digest_rest) = der_element(digest_info, TAG_SEQUENCE)?;
    let (algorithm, _) = der_element(algorithm, TAG_OID)?;
    let (expected, _) = der_element(digest_rest, TAG_OCTET_STRING)?;
    let (salt, rest) = der_element(rest, TAG_OCTET_STRING)?;
    let iterations = if rest.is_empty() {
        1
    } else {
        uint(der_element(rest, TAG_INTEGER)?.0)?
    };

    let password = bmp_password(password);
    let matches = if algorithm == OID_SHA1 {
        let key = pkcs12_kdf::<Sha1>(&password, salt, KDF_MAC, iterations, 20);
        hmac_matches::<Hmac<Sha1>>(&key, auth_safe, expected)
    } else if algorithm == OID_SHA256 {
        let key = pkcs12_kdf::<Sha256>(&password, salt, KDF_MAC, iterations, 32);
        hmac_matches::<Hmac<Sha256>>(&key, auth_safe, expected)
    } else {
        return Err(CredentialProblem::UnsupportedFormat(
            "PKCS#12 MAC algorithm".into(),
        ));
    };

    if matches {
        Ok(())
    } else {
        Err(CredentialProblem::KeystorePasswordIncorrect)
    }
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Option<Vec<u8>>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    cbc::Decryptor::<C>::new_from_slices(key, iv)
        .ok()?
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .ok()
}

/// Decrypts an `EncryptedPrivateKeyInfo` and checks the result is a key.
fn decrypt_private_key(der: &[u8], password: &str) -> Result<Vec<u8>, CredentialProblem> {
    let (info, _) = der_element(der, TAG_SEQUENCE)?;
    let (algorithm, rest) = der_element(info, TAG_SEQUENCE)?;
    let (ciphertext, _) = der_element(rest, TAG_OCTET_STRING)?;
    let (oid, params) = der_element(algorithm, TAG_OID)?;

    let plain = if oid == OID_PBES2 {
        decrypt_pbes2(params, password, ciphertext)?
    } else if oid == OID_PBE_SHA1_3DES {
        let (params, _) = der_element(params, TAG_SEQUENCE)?;
        let (salt, rest) = der_element(params, TAG_OCTET_STRING)?;
        let iterations = uint(der_element(rest, TAG_INTEGER)?.0)?;
        let password = bmp_password(password);
        let key = pkcs12_kdf::<Sha1>(&password, salt, KDF_KEY, iterations, 24);
        let iv = pkcs12_kdf::<Sha1>(&password, salt, KDF_IV, iterations, 8);
        cbc_decrypt::<TdesEde3>(&key, &iv, ciphertext)
    } else {
        return Err(CredentialProblem::UnsupportedFormat(
            "PKCS#12 key encryption algorithm".into(),
        ));
    };

    // A wrong password shows up as bad padding or as garbage that is not a
    // PrivateKeyInfo.
    match plain {
        Some(plain) if is_private_key_info(&plain) => Ok(plain),
        _ => Err(CredentialProblem::KeyPasswordIncorrect),
    }
}

fn decrypt_pbes2(params: &[u8], password: &str, ciphertext: &[u8]) -> Result<Option<Vec<u8>>, CredentialProblem> {
    let unsupported = || CredentialProblem::UnsupportedFormat("PKCS#12 PBES2 parameters".into());

    let (params, _) = der_element(params, TAG_SEQUENCE)?;
    let (kdf, rest) = der_element(params, TAG_SEQUENCE)?;
    let (scheme, _) = der_element(rest, TAG_SEQUENCE)?;

    let (kdf_oid, kdf_params) = der_element(kdf, TAG_OID)?;
    if kdf_oid != OID_PBKDF2 {
        return Err(unsupported());
    }
    let (kdf_params, _) = der_element(kdf_params, TAG_SEQUENCE)?;
    let (salt, rest) = der_element(kdf_params, TAG_OCTET_STRING)?;
    let (iterations, mut rest) = der_element(rest, TAG_INTEGER)?;
    let iterations = uint(iterations)?;
    if rest.first() == Some(&TAG_INTEGER) {
        // Optional keyLength; the cipher fixes it anyway.
        rest = der_element(rest, TAG_INTEGER)?.1;
    }
    let prf = if rest.is_empty() {
        OID_HMAC_SHA1
    } else {
        let (prf, _) = der_element(rest, TAG_SEQUENCE)?;
        der_element(prf, TAG_OID)?.0
    };

    let (cipher_oid, cipher_params) = der_element(scheme, TAG_OID)?;
    let key_len = match cipher_oid.strip_prefix(OID_AES_CBC_PREFIX) {
        Some([0x02]) => 16,
        Some([0x16]) => 24,
        Some([0x2A]) => 32,
        _ => return Err(unsupported()),
    };
    let (iv, _) = der_element(cipher_params, TAG_OCTET_STRING)?;

    let mut key = vec![0u8; key_len];
    if prf == OID_HMAC_SHA256 {
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    } else if prf == OID_HMAC_SHA1 {
        pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key);
    } else {
        return Err(unsupported());
    }

    Ok(match key_len {
        16 => cbc_decrypt::<Aes128>(&key, iv, ciphertext),
        24 => cbc_decrypt::<Aes192>(&key, iv, ciphertext),
        _ => cbc_decrypt::<Aes256>(&key, iv, ciphertext),
    })
}

fn is_private_key_info(plain: &[u8]) -> bool {
    matches!(der_element(plain, TAG_SEQUENCE), Ok((body, rest))
        if rest.is_empty() && der_element(body, TAG_INTEGER).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/keystores/release.p12"
    ));
    const LEGACY: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/keystores/legacy.p12"
    ));

    #[test]
    fn aes_store_recovers_key() {
        let store = Pkcs12Store::load(RELEASE, "storepass").unwrap();
        assert_eq!(store.aliases().collect::<Vec<_>>(), ["upload"]);
        let key = store.recover_key("upload", "storepass").unwrap();
        assert_eq!(key[0], TAG_SEQUENCE);
    }

    #[test]
    fn triple_des_store_recovers_key() {
        let store = Pkcs12Store::load(LEGACY, "storepass").unwrap();
        let key = store.recover_key("Upload", "storepass").unwrap();
        assert_eq!(key[0], TAG_SEQUENCE);
    }

    #[test]
    fn wrong_store_password_fails_mac() {
        for data in [RELEASE, LEGACY] {
            let err = Pkcs12Store::load(data, "storepas").unwrap_err();
            assert_eq!(err, CredentialProblem::KeystorePasswordIncorrect);
        }
    }

    #[test]
    fn certificate_alias_is_not_a_key() {
        let store = Pkcs12Store::load(RELEASE, "storepass").unwrap();
        let err = store.recover_key("ca", "storepass").unwrap_err();
        assert_eq!(err, CredentialProblem::AliasNotFound("ca".into()));
    }

    #[test]
    fn wrong_key_password_fails_decryption() {
        for data in [RELEASE, LEGACY] {
            let store = Pkcs12Store::load(data, "storepass").unwrap();
            let err = store.recover_key("upload", "keypass").unwrap_err();
            assert_eq!(err, CredentialProblem::KeyPasswordIncorrect);
        }
    }

    #[test]
    fn kdf_extends_past_one_digest() {
        let password = bmp_password("pw");
        let short = pkcs12_kdf::<Sha1>(&password, b"salt", KDF_KEY, 1, 20);
        let long = pkcs12_kdf::<Sha1>(&password, b"salt", KDF_KEY, 1, 24);
        assert_eq!(long.len(), 24);
        assert_eq!(long[..20], short[..]);
    }

    #[test]
    fn bmp_password_is_nul_terminated() {
        assert_eq!(bmp_password("ab"), [0, b'a', 0, b'b', 0, 0]);
    }
}
