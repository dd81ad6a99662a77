//! Builder for constructing PackSettings.

use super::{
    AssemblyBackend, ManifestAttributes, PackSettings, PushSettings, SigningSettings,
    ToolSettings,
};
use crate::pack::extract::{DEFAULT_ENTRY_PATTERN, EntryPattern};
use std::path::{Path, PathBuf};

/// Builder for constructing [`PackSettings`].
///
/// # Examples
///
/// ```
/// use kodegen_bundler_pack::pack::{ManifestAttributes, SettingsBuilder};
///
/// # fn example() -> kodegen_bundler_pack::pack::Result<()> {
/// let settings = SettingsBuilder::new()
///     .name("MyPack")
///     .project_name("app")
///     .build_dir("build")
///     .attributes([("Pack-Version", "1.0")].into_iter().collect())
///     .build()?;
///
/// assert!(settings.unsigned_pack().ends_with("outputs/pack/release/MyPack_unsigned.jar"));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    name: Option<String>,
    project_name: Option<String>,
    build_type: Option<String>,
    build_dir: Option<PathBuf>,
    project_root: Option<PathBuf>,
    source_archive: Option<PathBuf>,
    entry_pattern: Option<String>,
    attributes: ManifestAttributes,
    backend: AssemblyBackend,
    signing: Option<SigningSettings>,
    push: Option<PushSettings>,
    tools: ToolSettings,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the pack base name.
    ///
    /// # Required
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the host project name used in the default source archive name.
    ///
    /// Default: the pack name
    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Sets the build variant.
    ///
    /// Default: `release`
    pub fn build_type(mut self, build_type: impl Into<String>) -> Self {
        self.build_type = Some(build_type.into());
        self
    }

    /// Sets the host build output directory.
    ///
    /// Default: `build`
    pub fn build_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.build_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the project root.
    ///
    /// Default: parent of the build directory
    pub fn project_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.project_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Overrides the source archive path instead of deriving it from the layout.
    pub fn source_archive<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_archive = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the payload entry regex.
    ///
    /// Default: `classes\d*\.dex`
    pub fn entry_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.entry_pattern = Some(pattern.into());
        self
    }

    /// Sets the manifest attributes.
    pub fn attributes(mut self, attributes: ManifestAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the assembly backend.
    ///
    /// Default: [`AssemblyBackend::Native`]
    pub fn backend(mut self, backend: AssemblyBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Enables the signing stage.
    pub fn signing(mut self, signing: SigningSettings) -> Self {
        self.signing = Some(signing);
        self
    }

    /// Enables the device push stage.
    pub fn push(mut self, push: PushSettings) -> Self {
        self.push = Some(push);
        self
    }

    /// Sets external tool configuration.
    pub fn tools(mut self, tools: ToolSettings) -> Self {
        self.tools = tools;
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is missing or the entry pattern is not a
    /// valid regex.
    pub fn build(self) -> crate::pack::Result<PackSettings> {
        use crate::pack::error::Context;

        let name = self.name.context("pack name is required")?;
        if name.trim().is_empty() {
            crate::bail!("pack name cannot be empty");
        }
        let build_dir = self.build_dir.unwrap_or_else(|| PathBuf::from("build"));
        let project_root = self.project_root.unwrap_or_else(|| {
            build_dir
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        let entry_pattern = EntryPattern::regex(
            self.entry_pattern
                .as_deref()
                .unwrap_or(DEFAULT_ENTRY_PATTERN),
        )?;

        Ok(PackSettings {
            project_name: self.project_name.unwrap_or_else(|| name.clone()),
            name,
            build_type: self.build_type.unwrap_or_else(|| "release".to_string()),
            build_dir,
            project_root,
            source_archive: self.source_archive,
            entry_pattern,
            attributes: self.attributes,
            backend: self.backend,
            signing: self.signing,
            push: self.push,
            tools: self.tools,
        })
    }
}
