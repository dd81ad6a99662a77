//! jarsigner invocation.

use super::SigningCredential;
use crate::pack::process::{CommandSpec, SecretInput};
use std::path::Path;

/// Builds the jarsigner command for `credential`.
///
/// Passwords are not placed on the command line: jarsigner prompts for the
/// store password and then the key password, and both answers are piped
/// through stdin.
pub fn jarsigner_command(
    signer: &Path,
    unsigned: &Path,
    credential: &SigningCredential,
    signed: &Path,
    tsa_url: Option<&str>,
) -> CommandSpec {
    let mut spec = CommandSpec::new(signer)
        .arg("-keystore")
        .arg(&credential.keystore_path)
        .arg("-signedjar")
        .arg(signed);

    if let Some(url) = tsa_url.filter(|u| !u.is_empty()) {
        spec = spec.arg("-tsa").arg(url);
    }

    spec.arg(unsigned)
        .arg(&credential.key_alias)
        .stdin(SecretInput::new(format!(
            "{}\n{}\n",
            credential.keystore_password, credential.key_password
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn credential() -> SigningCredential {
        SigningCredential {
            keystore_path: PathBuf::from("/keys/release.jks"),
            keystore_password: "storepw".into(),
            key_alias: "upload".into(),
            key_password: "keypw".into(),
        }
    }

    fn args(spec: &CommandSpec) -> Vec<String> {
        spec.get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn passwords_only_travel_on_stdin() {
        let spec = jarsigner_command(
            Path::new("jarsigner"),
            Path::new("in.jar"),
            &credential(),
            Path::new("out.jar"),
            Some("http://timestamp.digicert.com"),
        );
        let args = args(&spec);

        assert!(args.iter().all(|a| !a.contains("storepw") && !a.contains("keypw")));
        assert_eq!(
            args,
            [
                "-keystore",
                "/keys/release.jks",
                "-signedjar",
                "out.jar",
                "-tsa",
                "http://timestamp.digicert.com",
                "in.jar",
                "upload"
            ]
        );
        assert_eq!(spec.get_stdin().unwrap().expose(), "storepw\nkeypw\n");
    }

    #[test]
    fn empty_tsa_is_omitted() {
        let spec = jarsigner_command(
            Path::new("jarsigner"),
            Path::new("in.jar"),
            &credential(),
            Path::new("out.jar"),
            Some(""),
        );
        assert!(!args(&spec).contains(&"-tsa".to_string()));
    }
}
