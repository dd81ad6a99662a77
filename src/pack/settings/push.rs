//! Device push stage settings.

use std::path::PathBuf;

/// Device push configuration.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_pack::pack::PushSettings;
///
/// let push = PushSettings::default();
/// assert_eq!(push.default_path, "/storage/emulated/0/");
/// assert_eq!(push.directory, "Packs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSettings {
    /// JSON device rule document. `None` applies the built-in defaults
    /// (every ready device enabled, default path).
    pub device_config: Option<PathBuf>,

    /// Remote directory used when a device has no path override.
    pub default_path: String,

    /// Distribution subdirectory appended under the target directory.
    pub directory: String,

    /// Maximum number of concurrent device transfers.
    pub parallelism: usize,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            device_config: None,
            default_path: "/storage/emulated/0/".to_string(),
            directory: "Packs".to_string(),
            parallelism: 4,
        }
    }
}
