//! Pack signing.
//!
//! The credential is validated against the keystore before the signer is
//! spawned, so a mistyped password or alias fails fast with a specific
//! [`CredentialProblem`] instead of an opaque signer exit code.

mod credential;
mod jarsigner;
pub mod keystore;
pub mod pkcs12;

pub use credential::{SigningCredential, parse_properties};
pub use jarsigner::jarsigner_command;

use crate::pack::{
    error::{CredentialProblem, Error, ErrorExt, Result},
    process::CommandRunner,
    utils::fs,
};
use keystore::Keystore;
use std::path::{Path, PathBuf};

/// Confirms that `credential` unlocks its key.
///
/// # Errors
///
/// - [`Error::KeystoreNotFound`] if the keystore file does not exist
/// - [`Error::CredentialInvalid`] with
///   [`KeystorePasswordIncorrect`](CredentialProblem::KeystorePasswordIncorrect),
///   [`AliasNotFound`](CredentialProblem::AliasNotFound) or
///   [`KeyPasswordIncorrect`](CredentialProblem::KeyPasswordIncorrect)
pub async fn check_credential(credential: &SigningCredential) -> Result<()> {
    let path = &credential.keystore_path;
    if !tokio::fs::try_exists(path)
        .await
        .fs_context("checking keystore", path)?
    {
        return Err(Error::KeystoreNotFound { path: path.clone() });
    }

    let data = tokio::fs::read(path)
        .await
        .fs_context("reading keystore", path)?;
    let invalid = |problem: CredentialProblem| Error::CredentialInvalid {
        keystore: path.clone(),
        problem,
    };

    let store = Keystore::load(&data, &credential.keystore_password).map_err(invalid)?;
    store
        .recover_key(&credential.key_alias, &credential.key_password)
        .map_err(invalid)?;

    log::debug!(
        "Credential for alias '{}' verified against {}",
        credential.key_alias,
        path.display()
    );
    Ok(())
}

/// Signs archives with an external signer.
pub struct SigningService<'a> {
    runner: &'a dyn CommandRunner,
    signer: PathBuf,
    tsa_url: Option<String>,
}

impl<'a> SigningService<'a> {
    /// Creates a service invoking `signer` (a `jarsigner` executable).
    pub fn new(runner: &'a dyn CommandRunner, signer: PathBuf, tsa_url: Option<String>) -> Self {
        Self {
            runner,
            signer,
            tsa_url,
        }
    }

    /// Validates `credential`, then signs `unsigned` into `output`.
    ///
    /// Passwords reach the signer through stdin only. The signed archive is
    /// staged and moved into place on success.
    ///
    /// # Errors
    ///
    /// Credential errors from [`check_credential`]; [`Error::SigningFailed`]
    /// if the signer exits non-zero.
    pub async fn sign(
        &self,
        unsigned: &Path,
        credential: &SigningCredential,
        output: &Path,
    ) -> Result<PathBuf> {
        check_credential(credential).await?;

        if !tokio::fs::try_exists(unsigned)
            .await
            .fs_context("checking archive to sign", unsigned)?
        {
            return Err(Error::GenericError(format!(
                "File to be signed does not exist ('{}')",
                unsigned.display()
            )));
        }

        log::info!(
            "Signing {} with alias '{}'",
            unsigned.display(),
            credential.key_alias
        );

        let staged = fs::staging_path(output).await?;
        let spec = jarsigner_command(
            &self.signer,
            unsigned,
            credential,
            &staged,
            self.tsa_url.as_deref(),
        );
        let result = self.runner.run(&spec).await?;

        if !result.success() {
            return Err(Error::SigningFailed {
                archive: unsigned.to_path_buf(),
                exit_code: result.exit_code,
                stderr: result.failure_text(),
            });
        }

        fs::persist(staged, output)?;
        log::info!("✓ Signed {}", output.display());
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{
        fakes::{FakeCommandRunner, KeystoreFixture},
        process::CommandOutput,
    };
    use tempfile::TempDir;

    fn credential(dir: &Path) -> SigningCredential {
        let keystore = dir.join("release.jks");
        std::fs::write(
            &keystore,
            KeystoreFixture::new("storepass")
                .private_key("upload", "keypass", b"key")
                .to_bytes(),
        )
        .unwrap();
        SigningCredential {
            keystore_path: keystore,
            keystore_password: "storepass".into(),
            key_alias: "upload".into(),
            key_password: "keypass".into(),
        }
    }

    fn problem(err: Error) -> CredentialProblem {
        match err {
            Error::CredentialInvalid { problem, .. } => problem,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn accepts_valid_credential() {
        let dir = TempDir::new().unwrap();
        check_credential(&credential(dir.path())).await.unwrap();
    }

    #[tokio::test]
    async fn accepts_keytool_default_store_named_jks() {
        let dir = TempDir::new().unwrap();
        let keystore = dir.path().join("upload.jks");
        std::fs::copy(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/keystores/release.p12"),
            &keystore,
        )
        .unwrap();
        let mut cred = SigningCredential {
            keystore_path: keystore,
            keystore_password: "storepass".into(),
            key_alias: "upload".into(),
            key_password: "storepass".into(),
        };

        check_credential(&cred).await.unwrap();

        cred.key_password = "keypass".into();
        let err = check_credential(&cred).await.unwrap_err();
        assert_eq!(problem(err), CredentialProblem::KeyPasswordIncorrect);
    }

    #[tokio::test]
    async fn rejects_missing_keystore() {
        let dir = TempDir::new().unwrap();
        let mut cred = credential(dir.path());
        cred.keystore_path = dir.path().join("missing.jks");
        let err = check_credential(&cred).await.unwrap_err();
        assert!(matches!(err, Error::KeystoreNotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_wrong_store_password() {
        let dir = TempDir::new().unwrap();
        let mut cred = credential(dir.path());
        cred.keystore_password = "wrong".into();
        let err = check_credential(&cred).await.unwrap_err();
        assert_eq!(problem(err), CredentialProblem::KeystorePasswordIncorrect);
    }

    #[tokio::test]
    async fn rejects_unknown_alias() {
        let dir = TempDir::new().unwrap();
        let mut cred = credential(dir.path());
        cred.key_alias = "release".into();
        let err = check_credential(&cred).await.unwrap_err();
        assert_eq!(
            problem(err),
            CredentialProblem::AliasNotFound("release".into())
        );
    }

    #[tokio::test]
    async fn rejects_wrong_key_password() {
        let dir = TempDir::new().unwrap();
        let mut cred = credential(dir.path());
        cred.key_password = "wrong".into();
        let err = check_credential(&cred).await.unwrap_err();
        assert_eq!(problem(err), CredentialProblem::KeyPasswordIncorrect);
    }

    #[tokio::test]
    async fn bad_credential_never_spawns_signer() {
        let dir = TempDir::new().unwrap();
        let unsigned = dir.path().join("pack_unsigned.jar");
        std::fs::write(&unsigned, b"jar").unwrap();
        let mut cred = credential(dir.path());
        cred.key_password = "wrong".into();
        let runner = FakeCommandRunner::new();

        let service = SigningService::new(&runner, PathBuf::from("jarsigner"), None);
        let result = service
            .sign(&unsigned, &cred, &dir.path().join("pack.jar"))
            .await;

        assert!(result.is_err());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn signer_failure_is_signing_failed() {
        let dir = TempDir::new().unwrap();
        let unsigned = dir.path().join("pack_unsigned.jar");
        std::fs::write(&unsigned, b"jar").unwrap();
        let output = dir.path().join("pack.jar");
        let runner = FakeCommandRunner::with_handler(|_| CommandOutput {
            exit_code: Some(1),
            stdout: "jarsigner: unable to sign jar: TSA unreachable\n".into(),
            stderr: String::new(),
        });

        let err = SigningService::new(&runner, PathBuf::from("jarsigner"), None)
            .sign(&unsigned, &credential(dir.path()), &output)
            .await
            .unwrap_err();

        match err {
            Error::SigningFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert!(stderr.contains("TSA unreachable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn successful_signing_moves_output_into_place() {
        let dir = TempDir::new().unwrap();
        let unsigned = dir.path().join("pack_unsigned.jar");
        std::fs::write(&unsigned, b"jar").unwrap();
        let output = dir.path().join("pack.jar");
        let runner = FakeCommandRunner::with_handler(|spec| {
            let args = spec.get_args();
            let signed = args.iter().position(|a| a == "-signedjar").unwrap() + 1;
            std::fs::write(&args[signed], b"signed-jar").unwrap();
            CommandOutput {
                exit_code: Some(0),
                ..Default::default()
            }
        });

        let signed = SigningService::new(&runner, PathBuf::from("jarsigner"), None)
            .sign(&unsigned, &credential(dir.path()), &output)
            .await
            .unwrap();

        assert_eq!(signed, output);
        assert_eq!(std::fs::read(&output).unwrap(), b"signed-jar");
        assert_eq!(
            runner.calls()[0].get_stdin().map(|s| s.expose()),
            Some("storepass\nkeypass\n")
        );
    }
}
