//! Core PackSettings struct and the on-disk artifact layout.

use super::{ManifestAttributes, PushSettings, SigningSettings, ToolSettings};
use crate::pack::extract::EntryPattern;
use std::path::{Path, PathBuf};

/// How the pack archive is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssemblyBackend {
    /// Written in-process with the `zip` crate.
    #[default]
    Native,
    /// Written by the JDK `jar` tool.
    JarTool,
}

impl std::str::FromStr for AssemblyBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "jar-tool" | "jar" => Ok(Self::JarTool),
            other => Err(format!(
                "Invalid assembly backend: {other}. Valid backends: native, jar-tool"
            )),
        }
    }
}

/// Main settings for a pack run.
///
/// Constructed via [`SettingsBuilder`](super::SettingsBuilder). Paths of
/// intermediate and final artifacts are derived from `build_dir` and
/// `build_type`:
///
/// ```text
/// <build_dir>/outputs/apk/<type>/<project>-<type>.apk     source archive
/// <build_dir>/pack_compiler/<type>/dexes/                  extracted payloads
/// <build_dir>/pack_compiler/<type>/MANIFEST.MF             rendered manifest
/// <build_dir>/outputs/pack/<type>/<name>_unsigned.jar      unsigned pack
/// <build_dir>/outputs/pack/<type>/<name>.jar               signed pack
/// ```
#[derive(Clone, Debug)]
pub struct PackSettings {
    pub(super) name: String,
    pub(super) project_name: String,
    pub(super) build_type: String,
    pub(super) build_dir: PathBuf,
    pub(super) project_root: PathBuf,
    pub(super) source_archive: Option<PathBuf>,
    pub(super) entry_pattern: EntryPattern,
    pub(super) attributes: ManifestAttributes,
    pub(super) backend: AssemblyBackend,
    pub(super) signing: Option<SigningSettings>,
    pub(super) push: Option<PushSettings>,
    pub(super) tools: ToolSettings,
}

impl PackSettings {
    /// Returns the pack base name (without extension).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn build_type(&self) -> &str {
        &self.build_type
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Root of the project; `.gitignore` updates happen here.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn entry_pattern(&self) -> &EntryPattern {
        &self.entry_pattern
    }

    pub fn attributes(&self) -> &ManifestAttributes {
        &self.attributes
    }

    pub fn backend(&self) -> AssemblyBackend {
        self.backend
    }

    /// Signing configuration; `None` skips the signing stage.
    pub fn signing(&self) -> Option<&SigningSettings> {
        self.signing.as_ref()
    }

    /// Device push configuration; `None` skips the push stage.
    pub fn push(&self) -> Option<&PushSettings> {
        self.push.as_ref()
    }

    pub fn tools(&self) -> &ToolSettings {
        &self.tools
    }

    /// Archive produced by the host build.
    pub fn source_archive(&self) -> PathBuf {
        self.source_archive.clone().unwrap_or_else(|| {
            self.build_dir
                .join("outputs/apk")
                .join(&self.build_type)
                .join(format!("{}-{}.apk", self.project_name, self.build_type))
        })
    }

    fn work_dir(&self) -> PathBuf {
        self.build_dir.join("pack_compiler").join(&self.build_type)
    }

    /// Directory extracted payloads are written to.
    pub fn payload_dir(&self) -> PathBuf {
        self.work_dir().join("dexes")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir().join("MANIFEST.MF")
    }

    /// Directory holding the unsigned and signed packs.
    pub fn output_dir(&self) -> PathBuf {
        self.build_dir.join("outputs/pack").join(&self.build_type)
    }

    pub fn unsigned_pack(&self) -> PathBuf {
        self.output_dir()
            .join(format!("{}_unsigned.jar", self.name))
    }

    pub fn signed_pack(&self) -> PathBuf {
        self.output_dir().join(format!("{}.jar", self.name))
    }
}
