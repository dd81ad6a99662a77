//! Error types for the pack pipeline.
//!
//! Every stage failure carries the archive path, device name or subprocess
//! exit code needed to diagnose it without re-running.

use std::{
    fmt::Display,
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Result type alias for pack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a signing credential was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialProblem {
    /// The store password does not match the keystore integrity digest
    #[error("keystore password incorrect")]
    KeystorePasswordIncorrect,

    /// No private key entry exists under the alias
    #[error("keystore does not contain a key with alias '{0}'")]
    AliasNotFound(String),

    /// The key entry exists but cannot be recovered with the key password
    #[error("key password incorrect")]
    KeyPasswordIncorrect,

    /// The file is a keystore type or protection algorithm we cannot read
    #[error("unsupported keystore format ({0})")]
    UnsupportedFormat(String),

    /// The file is truncated or structurally invalid
    #[error("malformed keystore: {0}")]
    Malformed(String),
}

/// Errors raised by the pack pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Source archive does not exist
    #[error("Source archive does not exist, cannot extract payloads ('{}')", path.display())]
    ArchiveNotFound {
        /// Path that was expected to hold the archive
        path: PathBuf,
    },

    /// No entry in the source archive matched the payload pattern
    #[error("Could not find a single entry matching '{pattern}' in {}", archive.display())]
    NoPayloadFound {
        /// Archive that was scanned
        archive: PathBuf,
        /// Pattern entries were matched against
        pattern: String,
    },

    /// Assembling the pack archive failed
    #[error("Failed to assemble {} (exit code: {}): {stderr}", output.display(), display_code(*exit_code))]
    AssemblyFailed {
        /// Final output path that was not produced
        output: PathBuf,
        /// Exit code of the archiving tool, if one ran
        exit_code: Option<i32>,
        /// Captured stderr or in-process failure text
        stderr: String,
    },

    /// Keystore file does not exist
    #[error("Specified keystore file does not exist ('{}')", path.display())]
    KeystoreNotFound {
        /// Configured keystore path
        path: PathBuf,
    },

    /// Signing credential rejected by the keystore
    #[error("Invalid signing credential for {}: {problem}", keystore.display())]
    CredentialInvalid {
        /// Keystore that was checked
        keystore: PathBuf,
        /// What was wrong with the credential
        problem: CredentialProblem,
    },

    /// Credential source file is missing keys or unreadable
    #[error("Invalid signing config {}: {reason}", path.display())]
    SignConfigInvalid {
        /// Properties file path
        path: PathBuf,
        /// Description of the problem
        reason: String,
    },

    /// The signing tool exited non-zero
    #[error("Signing {} failed (exit code: {}): {stderr}", archive.display(), display_code(*exit_code))]
    SigningFailed {
        /// Unsigned archive given to the signer
        archive: PathBuf,
        /// Exit code of the signer
        exit_code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// A push target directory is not absolute
    #[error("Push path for device {device} must be absolute / start with '/' (got '{path}')")]
    InvalidPushPath {
        /// Device the path was resolved for
        device: String,
        /// Offending directory
        path: String,
    },

    /// Transfer to a single device failed
    #[error("Could not push file to device {device} ('{remote_path}'): {cause}")]
    PushFailed {
        /// Device serial
        device: String,
        /// Remote path the transfer targeted
        remote_path: String,
        /// Underlying failure
        #[source]
        cause: Box<Error>,
    },

    /// The device bridge server could not be started or reached
    #[error("Unable to start the device bridge server: {reason}")]
    BridgeServerUnavailable {
        /// What went wrong, including exit code when known
        reason: String,
    },

    /// Device configuration document was missing and has been generated
    #[error(
        "Device config was not found; a template was generated at {}. Please customize it and re-run",
        path.display()
    )]
    ConfigMissing {
        /// Path of the generated template
        path: PathBuf,
    },

    /// An external command could not be spawned or awaited
    #[error("Failed to run {command}: {error}")]
    CommandFailed {
        /// Program that was invoked
        command: String,
        /// Spawn or wait error
        #[source]
        error: io::Error,
    },

    /// An external command exceeded its timeout and was killed
    #[error("{command} timed out after {}s and was terminated", timeout.as_secs())]
    CommandTimedOut {
        /// Program that was invoked
        command: String,
        /// Timeout that expired
        timeout: Duration,
    },

    /// Filesystem operation failed on a known path
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// Action being performed
        context: String,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        error: io::Error,
    },

    /// IO errors
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Zip archive errors
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    /// Invalid payload entry pattern
    #[error("{0}")]
    Regex(#[from] regex::Error),

    /// Device config document errors
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Anything else
    #[error("{0}")]
    GenericError(String),
}

fn display_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Attaches filesystem context to IO results.
pub trait ErrorExt<T> {
    /// Wraps the IO error with the action and path involved.
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context: context.to_string(),
            path: path.as_ref().to_path_buf(),
            error,
        })
    }
}

/// Turns a missing value into an error.
pub trait Context<T> {
    /// Converts to an error carrying `msg`.
    fn context<C: Display>(self, msg: C) -> Result<T>;
}

impl<T> Context<T> for Option<T> {
    fn context<C: Display>(self, msg: C) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(msg.to_string()))
    }
}

/// Returns early with a [`Error::GenericError`].
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::pack::Error::GenericError(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembly_error_reports_exit_code_and_stderr() {
        let err = Error::AssemblyFailed {
            output: PathBuf::from("out/pack.jar"),
            exit_code: Some(2),
            stderr: "bad manifest".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("out/pack.jar"));
        assert!(msg.contains("exit code: 2"));
        assert!(msg.contains("bad manifest"));
    }

    #[test]
    fn push_failure_names_device_and_cause() {
        let err = Error::PushFailed {
            device: "phone1".into(),
            remote_path: "/sdcard/Packs/p.jar".into(),
            cause: Box::new(Error::GenericError("device vanished".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("phone1"));
        assert!(msg.contains("device vanished"));
    }

    #[test]
    fn fs_context_keeps_path() {
        let res: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = res.fs_context("reading manifest", "a/b.MF").unwrap_err();
        assert!(err.to_string().starts_with("reading manifest a/b.MF"));
    }
}
