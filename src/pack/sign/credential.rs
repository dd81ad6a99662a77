//! Signing credentials and their properties-file source.

use crate::pack::error::{Error, ErrorExt, Result};
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

/// Keystore location plus the secrets needed to use one key in it.
///
/// `Debug` redacts both passwords.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredential {
    pub keystore_path: PathBuf,
    pub keystore_password: String,
    pub key_alias: String,
    pub key_password: String,
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("keystore_path", &self.keystore_path)
            .field("keystore_password", &"<redacted>")
            .field("key_alias", &self.key_alias)
            .field("key_password", &"<redacted>")
            .finish()
    }
}

impl SigningCredential {
    /// Loads a credential from a properties file with the keys
    /// `keyStorePath`, `keyStorePassword`, `keyAlias` and `keyPassword`.
    ///
    /// A relative `keyStorePath` is resolved against the file's directory.
    pub async fn from_properties_file(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .fs_context("reading signing config", path)?;
        let props = parse_properties(&text);

        let required = |key: &str| -> Result<String> {
            props.get(key).cloned().ok_or_else(|| Error::SignConfigInvalid {
                path: path.to_path_buf(),
                reason: format!("missing key '{key}'"),
            })
        };

        let keystore_path = PathBuf::from(required("keyStorePath")?);
        let keystore_path = if keystore_path.is_relative() {
            path.parent()
                .map(|dir| dir.join(&keystore_path))
                .unwrap_or(keystore_path)
        } else {
            keystore_path
        };

        Ok(Self {
            keystore_path,
            keystore_password: required("keyStorePassword")?,
            key_alias: required("keyAlias")?,
            key_password: required("keyPassword")?,
        })
    }
}

/// Parses Java properties text.
///
/// Supports `#`/`!` comments, `=`, `:` or whitespace separators, backslash
/// line continuations and the `\t \n \r \f \uXXXX` escapes. Later keys win.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let mut logical = line.trim_start().to_string();
        if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        props.insert(unescape(key), unescape(value));
    }

    props
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..i], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
