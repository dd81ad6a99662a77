//! Pack archive assembly.
//!
//! Builds the pack from the rendered manifest and the extracted payloads,
//! either in-process ([`AssemblyBackend::Native`]) or through the JDK `jar`
//! tool ([`AssemblyBackend::JarTool`]). Both stage the archive next to the
//! output and rename it into place only on success.

use crate::pack::{
    AssemblyBackend,
    error::{Error, ErrorExt, Result},
    extract::Payload,
    process::{CommandRunner, CommandSpec},
    utils::fs,
};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use zip::{CompressionMethod, DateTime, write::SimpleFileOptions};

const MANIFEST_DIR: &str = "META-INF/";
const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";
const MANIFEST_VERSION: &str = "Manifest-Version: 1.0";

/// Assembles pack archives with the configured backend.
pub struct ArchiveAssembler<'a> {
    backend: AssemblyBackend,
    runner: &'a dyn CommandRunner,
    jar_tool: Option<PathBuf>,
}

impl<'a> ArchiveAssembler<'a> {
    /// Creates an in-process assembler.
    pub fn native(runner: &'a dyn CommandRunner) -> Self {
        Self {
            backend: AssemblyBackend::Native,
            runner,
            jar_tool: None,
        }
    }

    /// Creates an assembler that shells out to `jar_tool`.
    pub fn jar_tool(runner: &'a dyn CommandRunner, jar_tool: PathBuf) -> Self {
        Self {
            backend: AssemblyBackend::JarTool,
            runner,
            jar_tool: Some(jar_tool),
        }
    }

    /// Writes a new archive at `output` holding the manifest and every payload
    /// under its original entry name. Any previous file at `output` is
    /// replaced.
    ///
    /// # Errors
    ///
    /// [`Error::AssemblyFailed`] if the archive could not be written; nothing
    /// is left at `output` in that case.
    pub async fn assemble(
        &self,
        manifest: &Path,
        payloads: &[Payload],
        output: &Path,
    ) -> Result<PathBuf> {
        log::info!(
            "Assembling {} payload(s) into {}",
            payloads.len(),
            output.display()
        );

        let staged = fs::staging_path(output).await?;

        match (self.backend, &self.jar_tool) {
            (AssemblyBackend::JarTool, Some(jar)) => {
                self.run_jar_tool(jar, manifest, payloads, &staged, output)
                    .await?
            }
            _ => write_native(manifest, payloads, &staged, output).await?,
        }

        fs::persist(staged, output)?;
        log::info!("✓ Assembled {}", output.display());
        Ok(output.to_path_buf())
    }

    async fn run_jar_tool(
        &self,
        jar: &Path,
        manifest: &Path,
        payloads: &[Payload],
        staged: &Path,
        output: &Path,
    ) -> Result<()> {
        let mut spec = CommandSpec::new(jar)
            .arg("--create")
            .arg("--file")
            .arg(staged)
            .arg("--manifest")
            .arg(manifest);

        for payload in payloads {
            spec = spec.arg("-C").arg(payload.root()).arg(&payload.entry);
        }

        let result = self.runner.run(&spec).await?;
        if !result.success() {
            return Err(Error::AssemblyFailed {
                output: output.to_path_buf(),
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

async fn write_native(
    manifest: &Path,
    payloads: &[Payload],
    staged: &Path,
    output: &Path,
) -> Result<()> {
    let manifest = manifest.to_path_buf();
    let payloads = payloads.to_vec();
    let staged = staged.to_path_buf();

    let written = tokio::task::spawn_blocking(move || {
        write_archive(&manifest, &payloads, &staged)
    })
    .await
    .map_err(|e| Error::GenericError(format!("Assembly task panicked: {e}")))?;

    written.map_err(|e| Error::AssemblyFailed {
        output: output.to_path_buf(),
        exit_code: None,
        stderr: e.to_string(),
    })
}

fn write_archive(manifest: &Path, payloads: &[Payload], staged: &Path) -> Result<()> {
    // Fixed timestamps keep identical inputs byte-identical.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let file = File::create(staged).fs_context("creating archive", staged)?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));

    let manifest_text =
        std::fs::read_to_string(manifest).fs_context("reading manifest", manifest)?;
    zip.add_directory(MANIFEST_DIR, options)?;
    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(normalize_manifest(&manifest_text).as_bytes())?;

    for payload in payloads {
        zip.start_file(payload.entry.as_str(), options)?;
        let path = &payload.path;
        let mut input = BufReader::new(File::open(path).fs_context("opening payload", path)?);
        io::copy(&mut input, &mut zip).fs_context("archiving payload", path)?;
    }

    let mut inner = zip.finish()?;
    inner.flush().fs_context("flushing archive", staged)?;
    Ok(())
}

/// Prepends `Manifest-Version` when absent and ensures a trailing newline,
/// matching what the `jar` tool writes.
fn normalize_manifest(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + MANIFEST_VERSION.len() + 2);
    if !text.starts_with("Manifest-Version:") {
        out.push_str(MANIFEST_VERSION);
        out.push('\n');
    }
    out.push_str(text);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
