//! `Pack.toml` project configuration.
//!
//! ```toml
//! [pack]
//! name = "MyPack"
//! project_name = "app"
//! build_dir = "app/build"
//!
//! [attributes]
//! Pack-Name = "MyPack"
//! Pack-Version = "1.2.0"
//!
//! [signing]
//! config_file = "signing.properties"
//!
//! [push]
//! device_config = "pack-config/devices.json"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use crate::{
    error::{CliError, PackerError, Result},
    pack::{
        AssemblyBackend, DEFAULT_TSA_URL, ManifestAttributes, PushSettings, SettingsBuilder,
        SigningSettings, ToolSettings,
    },
};
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Default config file name.
pub const CONFIG_FILE: &str = "Pack.toml";

/// Parsed `Pack.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackConfig {
    pub pack: PackSection,
    /// Manifest attributes in document order.
    #[serde(default)]
    pub attributes: toml::Table,
    pub signing: Option<SigningSection>,
    pub push: Option<PushSection>,
    #[serde(default)]
    pub tools: ToolsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackSection {
    pub name: String,
    pub project_name: Option<String>,
    pub build_dir: Option<PathBuf>,
    pub build_type: Option<String>,
    pub source_archive: Option<PathBuf>,
    pub entry_pattern: Option<String>,
    pub backend: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningSection {
    pub config_file: PathBuf,
    /// Empty disables timestamping.
    pub tsa_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushSection {
    pub device_config: Option<PathBuf>,
    pub default_path: Option<String>,
    pub directory: Option<String>,
    pub parallelism: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsSection {
    pub jdk_path: Option<PathBuf>,
    pub adb: Option<PathBuf>,
    /// Zero disables the timeout.
    pub timeout_secs: Option<u64>,
}

/// Command line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub build_type: Option<String>,
    pub source_archive: Option<PathBuf>,
    pub no_sign: bool,
    pub no_push: bool,
    pub timeout_secs: Option<u64>,
}

impl PackConfig {
    /// Parses config text.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| PackerError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads and parses the config at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PackerError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&text, path)
    }

    /// Builds pipeline settings. `base` is the directory relative paths are
    /// resolved against and the project root.
    pub fn into_builder(self, base: &Path, overrides: &Overrides) -> Result<SettingsBuilder> {
        let resolve = |p: &Path| -> Result<PathBuf> { Ok(p.absolutize_from(base)?.into_owned()) };
        let pack = self.pack;

        let mut builder = SettingsBuilder::new()
            .name(pack.name)
            .project_root(resolve(base)?)
            .build_dir(resolve(
                pack.build_dir.as_deref().unwrap_or(Path::new("build")),
            )?)
            .attributes(render_attributes(&self.attributes));

        if let Some(project_name) = pack.project_name {
            builder = builder.project_name(project_name);
        }
        if let Some(build_type) = overrides.build_type.clone().or(pack.build_type) {
            builder = builder.build_type(build_type);
        }
        if let Some(archive) = overrides.source_archive.as_deref().or(pack.source_archive.as_deref()) {
            builder = builder.source_archive(resolve(archive)?);
        }
        if let Some(pattern) = pack.entry_pattern {
            builder = builder.entry_pattern(pattern);
        }
        if let Some(backend) = pack.backend {
            let backend: AssemblyBackend = backend.parse().map_err(|reason| CliError::InvalidConfig {
                key: "pack.backend".to_string(),
                reason,
            })?;
            builder = builder.backend(backend);
        }

        if let Some(signing) = self.signing.filter(|_| !overrides.no_sign) {
            builder = builder.signing(SigningSettings {
                config_file: resolve(&signing.config_file)?,
                tsa_url: match signing.tsa_url {
                    Some(url) if url.is_empty() => None,
                    Some(url) => Some(url),
                    None => Some(DEFAULT_TSA_URL.to_string()),
                },
            });
        }

        if let Some(push) = self.push.filter(|_| !overrides.no_push) {
            let defaults = PushSettings::default();
            let parallelism = push.parallelism.unwrap_or(defaults.parallelism);
            if parallelism == 0 {
                return Err(CliError::InvalidConfig {
                    key: "push.parallelism".to_string(),
                    reason: "must be at least 1".to_string(),
                }
                .into());
            }
            builder = builder.push(PushSettings {
                device_config: push.device_config.as_deref().map(resolve).transpose()?,
                default_path: push.default_path.unwrap_or(defaults.default_path),
                directory: push.directory.unwrap_or(defaults.directory),
                parallelism,
            });
        }

        let timeout_secs = overrides.timeout_secs.or(self.tools.timeout_secs);
        builder = builder.tools(ToolSettings {
            jdk_path: self.tools.jdk_path.as_deref().map(resolve).transpose()?,
            adb: self.tools.adb.as_deref().map(resolve).transpose()?,
            timeout: match timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => ToolSettings::default().timeout,
            },
        });

        Ok(builder)
    }
}

/// Converts `[attributes]` to manifest attributes. Strings are used as is;
/// other values keep their TOML text.
pub fn render_attributes(table: &toml::Table) -> ManifestAttributes {
    table
        .iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [pack]
        name = "MyPack"
        project_name = "app"
        build_dir = "app/build"
        build_type = "debug"

        [attributes]
        Pack-Name = "MyPack"
        Pack-Version = "1.2.0"
        Pack-Flavor = "beta"
        Pack-Code = 12
        Dev = true

        [signing]
        config_file = "signing.properties"
        tsa_url = ""

        [push]
        device_config = "pack-config/devices.json"
        parallelism = 2

        [tools]
        timeout_secs = 0
    "#;

    fn path() -> &'static Path {
        Path::new("/proj/Pack.toml")
    }

    #[test]
    fn builds_settings_with_resolved_paths() {
        let config = PackConfig::parse(FULL, path()).unwrap();
        let settings = config
            .into_builder(Path::new("/proj"), &Overrides::default())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(settings.build_dir(), Path::new("/proj/app/build"));
        assert_eq!(settings.build_type(), "debug");
        assert_eq!(settings.project_root(), Path::new("/proj"));

        let signing = settings.signing().unwrap();
        assert_eq!(signing.config_file, PathBuf::from("/proj/signing.properties"));
        assert_eq!(signing.tsa_url, None);

        let push = settings.push().unwrap();
        assert_eq!(
            push.device_config.as_deref(),
            Some(Path::new("/proj/pack-config/devices.json"))
        );
        assert_eq!(push.parallelism, 2);
        assert_eq!(push.directory, "Packs");
        assert_eq!(settings.tools().timeout, None);
    }

    #[test]
    fn attributes_keep_document_order() {
        let config = PackConfig::parse(FULL, path()).unwrap();
        let attributes = render_attributes(&config.attributes);
        let pairs: Vec<_> = attributes.iter().collect();
        assert_eq!(
            pairs,
            [
                ("Pack-Name", "MyPack"),
                ("Pack-Version", "1.2.0"),
                ("Pack-Flavor", "beta"),
                ("Pack-Code", "12"),
                ("Dev", "true"),
            ]
        );
    }

    #[test]
    fn overrides_take_precedence() {
        let config = PackConfig::parse(FULL, path()).unwrap();
        let overrides = Overrides {
            build_type: Some("release".into()),
            source_archive: Some("out/app.apk".into()),
            no_sign: true,
            no_push: true,
            timeout_secs: Some(30),
        };
        let settings = config
            .into_builder(Path::new("/proj"), &overrides)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(settings.build_type(), "release");
        assert_eq!(settings.source_archive(), PathBuf::from("/proj/out/app.apk"));
        assert!(settings.signing().is_none());
        assert!(settings.push().is_none());
        assert_eq!(settings.tools().timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = PackConfig::parse("[pack]\nname = \"P\"\n", path()).unwrap();
        let settings = config
            .into_builder(Path::new("/proj"), &Overrides::default())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(settings.build_dir(), Path::new("/proj/build"));
        assert_eq!(settings.build_type(), "release");
        assert!(settings.signing().is_none());
        assert_eq!(settings.tools().timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn rejects_unknown_backend_and_keys() {
        let config = PackConfig::parse("[pack]\nname = \"P\"\nbackend = \"ant\"\n", path()).unwrap();
        assert!(
            config
                .into_builder(Path::new("/proj"), &Overrides::default())
                .is_err()
        );
        assert!(PackConfig::parse("[pack]\nname = \"P\"\nversion = 1\n", path()).is_err());
    }
}
