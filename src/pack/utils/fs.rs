//! File system utilities for pack outputs.
//!
//! Final artifacts are staged under a temporary name next to their
//! destination and renamed into place, so a failed stage never leaves a
//! truncated file under the final name.

use crate::pack::error::{Error, ErrorExt, Result};
use std::{io, path::Path};
use tempfile::TempPath;
use tokio::fs;

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        // Try removal, ignore NotFound (idempotent)
        match fs::remove_dir_all(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).fs_context("removing directory", path),
        }
    }

    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Reserves an empty temporary file in the same directory as `output`.
///
/// The file is deleted when the returned path is dropped unless it is
/// handed to [`persist`].
pub async fn staging_path(output: &Path) -> Result<TempPath> {
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    create_dir_all(parent, false).await?;

    let stem = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pack".to_string());

    tempfile::Builder::new()
        .prefix(&format!(".{stem}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map(|f| f.into_temp_path())
        .fs_context("creating staging file in", parent)
}

/// Moves a staged file to `output`, replacing any previous file.
pub fn persist(staged: TempPath, output: &Path) -> Result<()> {
    staged.persist(output).map_err(|e| Error::Fs {
        context: "moving staged file to".to_string(),
        path: output.to_path_buf(),
        error: e.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn staged_file_replaces_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out/pack.jar");

        let staged = staging_path(&output).await.unwrap();
        assert!(staged.starts_with(dir.path().join("out")));
        std::fs::write(&staged, b"new").unwrap();
        persist(staged, &output).unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"new");
    }

    #[tokio::test]
    async fn dropped_staging_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("pack.jar");

        let staged = staging_path(&output).await.unwrap();
        let staged_path = staged.to_path_buf();
        assert!(staged_path.exists());
        drop(staged);

        assert!(!staged_path.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn erase_recreates_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("dexes");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("old.dex"), b"x").unwrap();

        create_dir_all(&target, true).await.unwrap();

        assert!(target.is_dir());
        assert!(!target.join("old.dex").exists());
    }
}
