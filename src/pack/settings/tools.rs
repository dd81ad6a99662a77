//! External tool locations and limits.

use std::{path::PathBuf, time::Duration};

/// External tool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// JDK home; `jar` and `jarsigner` are looked up in its `bin/`.
    pub jdk_path: Option<PathBuf>,

    /// Explicit `adb` executable.
    pub adb: Option<PathBuf>,

    /// Per-subprocess timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            jdk_path: None,
            adb: None,
            timeout: Some(Duration::from_secs(600)),
        }
    }
}
