//! Transfers a pack to resolved devices.

use super::{bridge::DeviceBridge, resolver::ResolvedTarget};
use crate::pack::error::{Error, Result};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Semaphore;

/// Outcome of a push stage, in target order.
#[derive(Debug, Default)]
pub struct PushReport {
    /// Serials that received the file.
    pub pushed: Vec<String>,
    /// One [`Error::PushFailed`] per device that did not.
    pub failed: Vec<Error>,
}

impl PushReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Joins remote path segments with `/`, normalizing `\` separators and
/// repeated slashes.
pub fn remote_path(directory: &str, subdirectory: &str, file_name: &str) -> String {
    let segments: Vec<&str> = [directory, subdirectory, file_name]
        .into_iter()
        .flat_map(|part| part.split(['/', '\\']))
        .filter(|segment| !segment.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Pushes files over a [`DeviceBridge`] with bounded concurrency.
pub struct DevicePusher {
    bridge: Arc<dyn DeviceBridge>,
    subdirectory: String,
    parallelism: usize,
}

impl DevicePusher {
    /// `subdirectory` is placed between each target directory and the file
    /// name. `parallelism` is clamped to at least one transfer.
    pub fn new(bridge: Arc<dyn DeviceBridge>, subdirectory: impl Into<String>, parallelism: usize) -> Self {
        Self {
            bridge,
            subdirectory: subdirectory.into(),
            parallelism: parallelism.max(1),
        }
    }

    /// Pushes `local` to every target.
    ///
    /// Every target directory is checked before the first transfer; a
    /// relative one fails the whole stage with [`Error::InvalidPushPath`].
    /// A failed transfer is recorded in the report and does not stop the
    /// others.
    pub async fn push(&self, targets: &[ResolvedTarget], local: &Path) -> Result<PushReport> {
        for target in targets {
            if !target.directory.starts_with('/') {
                return Err(Error::InvalidPushPath {
                    device: target.serial.clone(),
                    path: target.directory.clone(),
                });
            }
        }

        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::GenericError(format!("'{}' has no file name", local.display()))
            })?;

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let remote = remote_path(&target.directory, &self.subdirectory, &file_name);
            let serial = target.serial.clone();
            let bridge = Arc::clone(&self.bridge);
            let semaphore = Arc::clone(&semaphore);
            let local: PathBuf = local.to_path_buf();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::GenericError(format!("push pool closed: {e}")))?;
                log::debug!("Pushing {} to {}:{}", local.display(), serial, remote);
                bridge
                    .push(&serial, &local, &remote)
                    .await
                    .map_err(|cause| Error::PushFailed {
                        device: serial.clone(),
                        remote_path: remote.clone(),
                        cause: Box::new(cause),
                    })?;
                Ok::<String, Error>(serial)
            }));
        }

        let mut report = PushReport::default();
        for (target, handle) in targets.iter().zip(handles) {
            match handle.await {
                Ok(Ok(serial)) => {
                    log::info!("✓ Pushed to {}", serial);
                    report.pushed.push(serial);
                }
                Ok(Err(err)) => {
                    log::warn!("{}", err);
                    report.failed.push(err);
                }
                Err(join) => {
                    let err = Error::PushFailed {
                        device: target.serial.clone(),
                        remote_path: target.directory.clone(),
                        cause: Box::new(Error::GenericError(format!("push task failed: {join}"))),
                    };
                    log::warn!("{}", err);
                    report.failed.push(err);
                }
            }
        }

        Ok(report)
    }
}
