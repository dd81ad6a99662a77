//! Payload extraction from the host build's archive.
//!
//! Scans a zip archive in entry order and copies every entry whose name
//! matches an [`EntryPattern`] into a destination directory. Multi-shard
//! builds (`classes.dex`, `classes2.dex`, ...) yield one file per shard.

use crate::pack::error::{Error, ErrorExt, Result};
use regex::Regex;
use std::{
    fmt,
    fs::File,
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};

/// Matches every numbered bytecode shard at the archive root.
pub const DEFAULT_ENTRY_PATTERN: &str = r"classes\d*\.dex";

/// Matcher for payload entry names. Always matches the whole name.
#[derive(Clone)]
pub enum EntryPattern {
    /// Entry name must equal the string.
    Exact(String),
    /// Entry name must match the anchored regex.
    Regex { source: String, regex: Regex },
}

impl EntryPattern {
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    /// Compiles `pattern` anchored at both ends.
    pub fn regex(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self::Regex {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => name == exact,
            Self::Regex { regex, .. } => regex.is_match(name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(exact) => exact,
            Self::Regex { source, .. } => source,
        }
    }
}

impl fmt::Debug for EntryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => f.debug_tuple("Exact").field(s).finish(),
            Self::Regex { source, .. } => f.debug_tuple("Regex").field(source).finish(),
        }
    }
}

impl fmt::Display for EntryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extracted payload file and the entry it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Entry name in the source archive, `/`-separated.
    pub entry: String,
    /// Extracted file on disk.
    pub path: PathBuf,
}

impl Payload {
    /// Directory that [`Payload::entry`] is relative to.
    pub fn root(&self) -> &Path {
        let depth = self.entry.split('/').count();
        self.path
            .ancestors()
            .nth(depth)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }
}

/// Extracts matching payload entries from `source_archive` into `destination`.
///
/// Entries are streamed to disk through a fixed-size buffer; existing files
/// are overwritten. Returns the payloads in archive order, keeping nested
/// entry names.
///
/// # Errors
///
/// - [`Error::ArchiveNotFound`] if `source_archive` does not exist
/// - [`Error::NoPayloadFound`] if no entry matched
pub async fn extract_payloads(
    source_archive: &Path,
    pattern: &EntryPattern,
    destination: &Path,
) -> Result<Vec<Payload>> {
    if !tokio::fs::try_exists(source_archive)
        .await
        .fs_context("checking source archive", source_archive)?
    {
        return Err(Error::ArchiveNotFound {
            path: source_archive.to_path_buf(),
        });
    }

    log::info!(
        "Extracting '{}' entries from {}",
        pattern,
        source_archive.display()
    );

    let source = source_archive.to_path_buf();
    let pattern = pattern.clone();
    let destination = destination.to_path_buf();

    tokio::task::spawn_blocking(move || extract_blocking(&source, &pattern, &destination))
        .await
        .map_err(|e| Error::GenericError(format!("Payload extraction task panicked: {e}")))?
}

fn extract_blocking(
    source: &Path,
    pattern: &EntryPattern,
    destination: &Path,
) -> Result<Vec<Payload>> {
    let file = File::open(source).fs_context("opening source archive", source)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !pattern.matches(entry.name()) {
            continue;
        }

        // enclosed_name rejects absolute paths and `..` components.
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping payload entry with unsafe path: {}", entry.name());
            continue;
        };
        let target = destination.join(&relative);
        let entry_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).fs_context("creating payload directory", parent)?;
        }
        let mut out = BufWriter::new(
            File::create(&target).fs_context("creating payload file", &target)?,
        );
        io::copy(&mut entry, &mut out).fs_context("writing payload", &target)?;
        out.into_inner()
            .map_err(|e| e.into_error())
            .fs_context("flushing payload", &target)?;

        log::debug!("Extracted {} -> {}", entry.name(), target.display());
        // A repeated entry overwrote the earlier file.
        extracted.retain(|payload: &Payload| payload.entry != entry_name);
        extracted.push(Payload {
            entry: entry_name,
            path: target,
        });
    }

    if extracted.is_empty() {
        return Err(Error::NoPayloadFound {
            archive: source.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }

    log::info!("Extracted {} payload(s)", extracted.len());
    Ok(extracted)
}
