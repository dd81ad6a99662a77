//! Command line argument parsing and validation.

use clap::Parser;
use std::path::PathBuf;

/// Packs the bytecode of an Android build into a standalone, signed pack
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_pack",
    version,
    about = "Packs the bytecode of an Android build into a standalone pack",
    long_about = "Extracts the dex payloads of a host build archive, assembles them with a manifest \
into a pack, optionally signs it with jarsigner and pushes it to connected devices.

Usage:
  kodegen_bundler_pack
  kodegen_bundler_pack --config app/Pack.toml --build-type debug
  kodegen_bundler_pack --no-sign --no-push --source-archive out/app-release.apk

Exit code 0 = pack built and, if configured, pushed to every targeted device."
)]
pub struct Args {
    /// Project configuration file
    #[arg(short, long, value_name = "PATH", default_value = crate::config::CONFIG_FILE, env = "PACK_CONFIG")]
    pub config: PathBuf,

    /// Build type (variant) to pack, e.g. release or debug
    #[arg(short, long, value_name = "TYPE")]
    pub build_type: Option<String>,

    /// Source archive to extract payloads from, instead of the build layout default
    #[arg(short, long, value_name = "PATH")]
    pub source_archive: Option<PathBuf>,

    /// Skip the signing stage
    #[arg(long)]
    pub no_sign: bool,

    /// Skip the device push stage
    #[arg(long)]
    pub no_push: bool,

    /// Subprocess timeout in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Show debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.config.as_os_str().is_empty() {
            return Err("Config path cannot be empty".to_string());
        }
        if let Some(build_type) = &self.build_type {
            if build_type.is_empty() || build_type.contains(['/', '\\']) {
                return Err(format!("Invalid build type: '{build_type}'"));
            }
        }
        Ok(())
    }

    /// Command line values that override the config file.
    pub fn overrides(&self) -> crate::config::Overrides {
        crate::config::Overrides {
            build_type: self.build_type.clone(),
            source_archive: self.source_archive.clone(),
            no_sign: self.no_sign,
            no_push: self.no_push,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}
