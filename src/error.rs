//! Error types for the pack command line tool.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for packer operations
pub type Result<T> = std::result::Result<T, PackerError>;

/// Main error type for the command line tool
#[derive(Error, Debug)]
pub enum PackerError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    ConfigRead {
        /// Config file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing errors
    #[error("Invalid config {}: {source}", path.display())]
    Toml {
        /// Config file path
        path: PathBuf,
        /// Parse error
        #[source]
        source: toml::de::Error,
    },

    /// Pipeline errors
    #[error(transparent)]
    Pack(#[from] crate::pack::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Invalid value in the config file
    #[error("Invalid config value '{key}': {reason}")]
    InvalidConfig {
        /// Config key
        key: String,
        /// Reason for the error
        reason: String,
    },
}

impl PackerError {
    /// Hint printed after the error, if the failure has an obvious fix.
    pub fn recovery_suggestion(&self) -> Option<String> {
        use crate::pack::Error as Pack;

        match self {
            Self::Pack(Pack::ConfigMissing { path }) => Some(format!(
                "Review the generated device config at {} and run again",
                path.display()
            )),
            Self::Pack(Pack::ArchiveNotFound { .. }) => {
                Some("Build the host project first or pass --source-archive".to_string())
            }
            Self::Pack(Pack::CredentialInvalid { .. } | Pack::KeystoreNotFound { .. }) => {
                Some("Check the signing properties file referenced by [signing]".to_string())
            }
            Self::Pack(Pack::BridgeServerUnavailable { .. }) => {
                Some("Check that adb works ('adb start-server') or set [tools] adb".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_errors_display_unchanged() {
        let err: PackerError = crate::pack::Error::NoPayloadFound {
            archive: PathBuf::from("app.apk"),
            pattern: "classes.dex".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Could not find a single entry matching 'classes.dex' in app.apk"
        );
        assert!(err.recovery_suggestion().is_none());
    }

    #[test]
    fn config_missing_suggests_review() {
        let err: PackerError = crate::pack::Error::ConfigMissing {
            path: PathBuf::from("devices.json"),
        }
        .into();
        assert!(err.recovery_suggestion().unwrap().contains("devices.json"));
    }
}
