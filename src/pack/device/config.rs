//! Device configuration document.
//!
//! A JSON array of rules:
//!
//! ```json
//! [
//!   { "name": "emulator_default", "enabled": true },
//!   { "name": "device_default", "enabled": false },
//!   { "name": "R58M12ABCDE", "enabled": true, "pushPath": "/sdcard/" }
//! ]
//! ```

use crate::pack::error::{Error, ErrorExt, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rule name that sets the default for emulators.
pub const EMULATOR_DEFAULT: &str = "emulator_default";
/// Rule name that sets the default for physical devices.
pub const DEVICE_DEFAULT: &str = "device_default";

const TEMPLATE: &str = r#"[
  {
    "comment": "Default for every emulator (serials containing 'emulator')",
    "name": "emulator_default",
    "enabled": true
  },
  {
    "comment": "Default for every physical device",
    "name": "device_default",
    "enabled": true
  },
  {
    "comment": "Per-device override, keyed by serial as shown by 'adb devices'",
    "name": "REPLACE_WITH_SERIAL",
    "enabled": false,
    "pushPath": "/storage/emulated/0/"
  }
]
"#;

/// One rule of the device configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_path: Option<String>,
}

impl DeviceRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: None,
            push_path: None,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn push_path(mut self, path: impl Into<String>) -> Self {
        self.push_path = Some(path.into());
        self
    }
}

/// Parses a device configuration document. Unknown fields are ignored.
pub fn parse_rules(json: &str) -> Result<Vec<DeviceRule>> {
    Ok(serde_json::from_str(json)?)
}

/// Loads the rules at `path`.
///
/// A missing document is replaced by a template (see
/// [`write_template`]) and the run stops with [`Error::ConfigMissing`] so the
/// operator can review it.
pub async fn load_rules(path: &Path, project_root: &Path) -> Result<Vec<DeviceRule>> {
    if !tokio::fs::try_exists(path)
        .await
        .fs_context("checking device config", path)?
    {
        write_template(path, project_root).await?;
        log::warn!("Device config was not found. A template was generated, configure it and re-run.");
        log::warn!("Path to device config: {}", path.display());
        return Err(Error::ConfigMissing {
            path: path.to_path_buf(),
        });
    }

    let text = tokio::fs::read_to_string(path)
        .await
        .fs_context("reading device config", path)?;
    let rules = parse_rules(&text)?;
    log::debug!("Loaded {} device rule(s) from {}", rules.len(), path.display());
    Ok(rules)
}

/// Writes the template document to `path`.
///
/// When the document's directory has to be created, it is also added to
/// `project_root/.gitignore` unless already listed there.
pub async fn write_template(path: &Path, project_root: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !tokio::fs::try_exists(parent)
            .await
            .fs_context("checking device config directory", parent)?
        {
            ignore_in_git(parent, project_root).await?;
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating device config directory", parent)?;
        }
    }
    tokio::fs::write(path, TEMPLATE)
        .await
        .fs_context("writing device config template", path)?;
    Ok(())
}

/// Appends `dir` (relative to `project_root`) to the project's `.gitignore`.
/// Directories outside the project are left alone.
async fn ignore_in_git(dir: &Path, project_root: &Path) -> Result<Option<PathBuf>> {
    let Ok(relative) = dir.strip_prefix(project_root) else {
        return Ok(None);
    };
    let relative = relative.to_string_lossy().replace('\\', "/");
    if relative.is_empty() {
        return Ok(None);
    }

    let gitignore = project_root.join(".gitignore");
    let existing = match tokio::fs::read_to_string(&gitignore).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).fs_context("reading .gitignore", &gitignore),
    };
    if existing.lines().any(|line| line.contains(relative.as_str())) {
        return Ok(None);
    }

    let mut updated = existing;
    updated.push('\n');
    updated.push_str(&relative);
    updated.push('\n');
    tokio::fs::write(&gitignore, updated)
        .await
        .fs_context("updating .gitignore", &gitignore)?;
    log::warn!("{} has been modified to include /{}", gitignore.display(), relative);
    Ok(Some(gitignore))
}
