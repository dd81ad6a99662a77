//! External tool detection.
//!
//! `jar` and `jarsigner` come from the configured JDK, then `JAVA_HOME`, then
//! `PATH`. `adb` comes from the configured path, then the Android SDK
//! (`ANDROID_HOME`, `ANDROID_SDK_ROOT`), then `PATH`.

use crate::pack::{Error, Result, ToolSettings};
use std::path::PathBuf;

/// Appends the platform executable suffix.
fn executable(name: &str) -> String {
    format!("{name}{}", std::env::consts::EXE_SUFFIX)
}

/// Resolves tool paths from settings and environment.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    jdk_path: Option<PathBuf>,
    adb: Option<PathBuf>,
    java_home: Option<PathBuf>,
    android_sdk: Vec<PathBuf>,
}

impl ToolLocator {
    /// Locator using `tools` plus `JAVA_HOME`, `ANDROID_HOME` and
    /// `ANDROID_SDK_ROOT`.
    pub fn from_env(tools: &ToolSettings) -> Self {
        let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            jdk_path: tools.jdk_path.clone(),
            adb: tools.adb.clone(),
            java_home: var("JAVA_HOME"),
            android_sdk: ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
                .into_iter()
                .filter_map(var)
                .collect(),
        }
    }

    /// Locates a JDK tool such as `jar` or `jarsigner`.
    ///
    /// A configured JDK is authoritative: a missing tool there is an error
    /// naming the path tried.
    pub fn jdk_tool(&self, name: &str) -> Result<PathBuf> {
        let file = executable(name);

        if let Some(jdk) = &self.jdk_path {
            let candidate = jdk.join("bin").join(&file);
            return existing(candidate, name);
        }
        if let Some(home) = &self.java_home {
            let candidate = home.join("bin").join(&file);
            if candidate.is_file() {
                log::debug!("Found {} via JAVA_HOME: {}", name, candidate.display());
                return Ok(candidate);
            }
        }
        on_path(name)
    }

    /// Locates the `adb` executable.
    pub fn adb(&self) -> Result<PathBuf> {
        if let Some(adb) = &self.adb {
            return existing(adb.clone(), "adb");
        }
        let file = executable("adb");
        for sdk in &self.android_sdk {
            let candidate = sdk.join("platform-tools").join(&file);
            if candidate.is_file() {
                log::debug!("Found adb in Android SDK: {}", candidate.display());
                return Ok(candidate);
            }
        }
        on_path("adb")
    }
}

fn existing(candidate: PathBuf, name: &str) -> Result<PathBuf> {
    if candidate.is_file() {
        log::debug!("Using {} at {}", name, candidate.display());
        Ok(candidate)
    } else {
        Err(Error::GenericError(format!(
            "{name} not found at configured path {}",
            candidate.display()
        )))
    }
}

fn on_path(name: &str) -> Result<PathBuf> {
    match which::which(name) {
        Ok(path) => {
            log::debug!("Found {} at: {}", name, path.display());
            Ok(path)
        }
        Err(e) => Err(Error::GenericError(format!(
            "{name} not found in PATH ({e}); configure its location in Pack.toml [tools]"
        ))),
    }
}
