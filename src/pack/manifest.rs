//! Manifest rendering.

use crate::pack::{
    ManifestAttributes,
    error::{ErrorExt, Result},
};
use std::path::{Path, PathBuf};

/// Renders attributes as `key: value` lines in insertion order.
pub fn render_manifest(attributes: &ManifestAttributes) -> String {
    let mut out = String::new();
    for (key, value) in attributes.iter() {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Writes the manifest for `attributes` to `destination`, creating parent
/// directories and replacing any previous file.
pub async fn build_manifest(
    attributes: &ManifestAttributes,
    destination: &Path,
) -> Result<PathBuf> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating manifest directory", parent)?;
    }
    tokio::fs::write(destination, render_manifest(attributes))
        .await
        .fs_context("writing manifest", destination)?;

    log::debug!(
        "Wrote manifest with {} attribute(s) to {}",
        attributes.len(),
        destination.display()
    );
    Ok(destination.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn attrs() -> ManifestAttributes {
        [
            ("Pack-Name", "Example"),
            ("Pack-Version", "2.1.0"),
            ("Min-Host-Version", "10.3.1"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn renders_in_insertion_order() {
        assert_eq!(
            render_manifest(&attrs()),
            "Pack-Name: Example\nPack-Version: 2.1.0\nMin-Host-Version: 10.3.1\n"
        );
    }

    #[tokio::test]
    async fn rebuilding_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/MANIFEST.MF");

        build_manifest(&attrs(), &path).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        build_manifest(&attrs(), &path).await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn replaces_longer_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("MANIFEST.MF");
        std::fs::write(&path, "Old: value\nMore: stuff\nAnd: more\nAnd-Even: more\n").unwrap();

        let single: ManifestAttributes = [("A", "1")].into_iter().collect();
        build_manifest(&single, &path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A: 1\n");
    }
}
