//! Signing stage settings.

use std::path::{Path, PathBuf};

/// Timestamp authority used when none is configured.
pub const DEFAULT_TSA_URL: &str = "http://timestamp.digicert.com";

/// Where the signing credential comes from and how the signer is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningSettings {
    /// Properties file holding `keyStorePath`, `keyStorePassword`, `keyAlias`, `keyPassword`.
    pub config_file: PathBuf,

    /// Timestamp authority URL; `None` signs without a timestamp.
    pub tsa_url: Option<String>,
}

impl SigningSettings {
    /// Creates settings with the default timestamp authority.
    pub fn new(config_file: impl AsRef<Path>) -> Self {
        Self {
            config_file: config_file.as_ref().to_path_buf(),
            tsa_url: Some(DEFAULT_TSA_URL.to_string()),
        }
    }
}
