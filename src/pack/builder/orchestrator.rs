//! Pack pipeline orchestration.
//!
//! Runs extraction, manifest rendering and assembly unconditionally, then
//! signing when a credential is configured and device push when push
//! settings are present. The first failing stage ends the run with its own
//! error.

use super::{checksum::calculate_sha256, tool_detection::ToolLocator};
use crate::pack::{
    AssemblyBackend, PackSettings, Result,
    assemble::ArchiveAssembler,
    device::{AdbBridge, DeviceBridge, DevicePusher, PushReport, load_rules, resolve},
    extract::{Payload, extract_payloads},
    manifest::build_manifest,
    process::CommandRunner,
    sign::{SigningCredential, SigningService},
    utils::fs,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// What a pipeline run produced.
#[derive(Debug)]
pub struct PackOutcome {
    /// Extracted payloads, in source archive order.
    pub payloads: Vec<Payload>,
    pub manifest: PathBuf,
    pub unsigned: PathBuf,
    /// Present when the signing stage ran.
    pub signed: Option<PathBuf>,
    /// SHA-256 of [`PackOutcome::artifact`].
    pub checksum: String,
    /// Present when the push stage ran.
    pub push: Option<PushReport>,
}

impl PackOutcome {
    /// The final pack: the signed archive if any, else the unsigned one.
    pub fn artifact(&self) -> &Path {
        self.signed.as_deref().unwrap_or(&self.unsigned)
    }

    /// False when any device push failed.
    pub fn is_success(&self) -> bool {
        self.push.as_ref().is_none_or(PushReport::is_success)
    }
}

/// Main pack orchestrator.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_pack::pack::{Pipeline, SettingsBuilder, TokioCommandRunner};
/// use std::sync::Arc;
///
/// # async fn example() -> kodegen_bundler_pack::pack::Result<()> {
/// let settings = SettingsBuilder::new()
///     .name("MyPack")
///     .build_dir("app/build")
///     .build()?;
///
/// let outcome = Pipeline::new(settings, Arc::new(TokioCommandRunner::default()))
///     .run()
///     .await?;
/// println!("{} ({})", outcome.artifact().display(), outcome.checksum);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    settings: PackSettings,
    runner: Arc<dyn CommandRunner>,
    bridge: Option<Arc<dyn DeviceBridge>>,
    tools: ToolLocator,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .field("bridge", &self.bridge.as_ref().map(|_| "<DeviceBridge>"))
            .field("tools", &self.tools)
            .finish()
    }
}

impl Pipeline {
    /// Creates a pipeline running external tools through `runner`.
    ///
    /// Tools are located from the settings and the environment; the device
    /// bridge defaults to `adb`.
    pub fn new(settings: PackSettings, runner: Arc<dyn CommandRunner>) -> Self {
        let tools = ToolLocator::from_env(settings.tools());
        Self {
            settings,
            runner,
            bridge: None,
            tools,
        }
    }

    /// Uses `bridge` instead of an `adb` client.
    pub fn with_bridge(mut self, bridge: Arc<dyn DeviceBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn settings(&self) -> &PackSettings {
        &self.settings
    }

    /// Runs every configured stage in order.
    pub async fn run(&self) -> Result<PackOutcome> {
        let settings = &self.settings;

        log::info!("Packing {} ({})", settings.name(), settings.build_type());

        let payload_dir = settings.payload_dir();
        fs::create_dir_all(&payload_dir, true).await?;
        let payloads = extract_payloads(
            &settings.source_archive(),
            settings.entry_pattern(),
            &payload_dir,
        )
        .await?;

        let manifest = build_manifest(settings.attributes(), &settings.manifest_path()).await?;

        let unsigned = self
            .assembler()?
            .assemble(&manifest, &payloads, &settings.unsigned_pack())
            .await?;

        let signed = match settings.signing() {
            Some(signing) => {
                let credential = SigningCredential::from_properties_file(&signing.config_file).await?;
                let signer = self.tools.jdk_tool("jarsigner")?;
                let service =
                    SigningService::new(self.runner.as_ref(), signer, signing.tsa_url.clone());
                Some(
                    service
                        .sign(&unsigned, &credential, &settings.signed_pack())
                        .await?,
                )
            }
            None => {
                log::debug!("No signing config, skipping signing");
                None
            }
        };

        let artifact = signed.clone().unwrap_or_else(|| unsigned.clone());
        let checksum = calculate_sha256(&artifact).await?;
        log::info!("SHA256 {}  {}", checksum, artifact.display());

        let push = match settings.push() {
            Some(_) => Some(self.push(&artifact).await?),
            None => None,
        };

        Ok(PackOutcome {
            payloads,
            manifest,
            unsigned,
            signed,
            checksum,
            push,
        })
    }

    fn assembler(&self) -> Result<ArchiveAssembler<'_>> {
        Ok(match self.settings.backend() {
            AssemblyBackend::Native => ArchiveAssembler::native(self.runner.as_ref()),
            AssemblyBackend::JarTool => {
                ArchiveAssembler::jar_tool(self.runner.as_ref(), self.tools.jdk_tool("jar")?)
            }
        })
    }

    async fn push(&self, artifact: &Path) -> Result<PushReport> {
        let settings = &self.settings;
        let Some(push) = settings.push() else {
            return Ok(PushReport::default());
        };

        let rules = match &push.device_config {
            Some(path) => load_rules(path, settings.project_root()).await?,
            None => Vec::new(),
        };

        let bridge: Arc<dyn DeviceBridge> = match &self.bridge {
            Some(bridge) => Arc::clone(bridge),
            None => Arc::new(AdbBridge::new(self.tools.adb()?, Arc::clone(&self.runner))),
        };
        bridge.ensure_server().await?;

        let devices = bridge.list_devices().await?;
        let targets = resolve(&rules, &devices, &push.default_path);
        log::info!(
            "Pushing to {} of {} connected device(s)",
            targets.len(),
            devices.len()
        );

        DevicePusher::new(bridge, push.directory.clone(), push.parallelism)
            .push(&targets, artifact)
            .await
    }
}
