//! Pack artifact pipeline.
//!
//! Turns the bytecode payloads of a host build archive into a standalone
//! pack:
//!
//! 1. [`extract`] copies every matching payload entry out of the source archive
//! 2. [`manifest`] renders the manifest attributes
//! 3. [`assemble`] writes the pack archive
//! 4. [`sign`] validates the credential and runs the signer (optional)
//! 5. [`device`] resolves target devices and pushes the pack (optional)
//!
//! [`Pipeline`] runs the stages in order from a [`PackSettings`].

pub mod assemble;
pub mod builder;
pub mod device;
pub mod error;
pub mod extract;
pub mod fakes;
pub mod manifest;
pub mod process;
pub mod settings;
pub mod sign;
pub mod utils;

pub use builder::{PackOutcome, Pipeline, ToolLocator, calculate_sha256};
pub use device::{PushReport, ResolvedTarget};
pub use error::{Context, CredentialProblem, Error, ErrorExt, Result};
pub use extract::{DEFAULT_ENTRY_PATTERN, EntryPattern, Payload};
pub use process::{CommandOutput, CommandRunner, CommandSpec, TokioCommandRunner};
pub use settings::{
    AssemblyBackend, DEFAULT_TSA_URL, ManifestAttributes, PackSettings, PushSettings,
    SettingsBuilder, SigningSettings, ToolSettings,
};
pub use sign::{SigningCredential, SigningService};
