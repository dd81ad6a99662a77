//! Command line interface for the pack pipeline.
//!
//! Parses arguments, loads `Pack.toml`, runs the [`Pipeline`] and reports
//! the outcome.

mod args;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;

use crate::{
    config::PackConfig,
    error::{CliError, Result},
    pack::{PackOutcome, Pipeline, TokioCommandRunner},
};
use path_absolutize::Absolutize;
use std::{path::Path, sync::Arc};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(&args);
    run_with(&args).await
}

/// Runs with already parsed arguments. Returns the process exit code.
pub async fn run_with(args: &Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;
    let runtime = RuntimeConfig::from(args);
    let output = runtime.output();

    let config = PackConfig::load(&args.config).await?;
    let base = args
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .absolutize()?
        .into_owned();
    log::debug!("Using config {} (base {})", args.config.display(), base.display());

    let settings = config.into_builder(&base, &args.overrides())?.build()?;
    let runner = Arc::new(TokioCommandRunner::new(settings.tools().timeout));

    output.section(&format!("Packing {} ({})", settings.name(), settings.build_type()))?;
    output.verbose(&format!("Source archive: {}", settings.source_archive().display()))?;

    let outcome = Pipeline::new(settings, runner).run().await?;
    report(output, &outcome)?;

    Ok(if outcome.is_success() { 0 } else { 1 })
}

fn report(output: &OutputManager, outcome: &PackOutcome) -> std::io::Result<()> {
    output.success(&format!("Extracted {} payload(s)", outcome.payloads.len()))?;
    for payload in &outcome.payloads {
        output.verbose(&format!("  {} ({})", payload.entry, payload.path.display()))?;
    }
    output.success(&format!("Assembled {}", outcome.unsigned.display()))?;
    if let Some(signed) = &outcome.signed {
        output.success(&format!("Signed {}", signed.display()))?;
    }
    output.println(&format!("SHA256: {}", outcome.checksum))?;

    if let Some(push) = &outcome.push {
        output.println(&format!("Pushed to {} device(s):", push.pushed.len()))?;
        for serial in &push.pushed {
            output.indent(serial)?;
        }
        for failure in &push.failed {
            output.error(&failure.to_string())?;
        }
    }
    Ok(())
}

/// Sets up `env_logger`; `RUST_LOG` wins over the flags.
fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}
