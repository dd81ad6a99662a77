//! Pack builder library for Android application fragments
//!
//! This library extracts the bytecode payloads of a host build archive,
//! assembles them with a manifest into a standalone pack, signs the pack and
//! pushes it to connected devices according to per-device rules.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod config;
pub mod error;
pub mod pack;

// Re-export commonly used types
pub use error::{CliError, PackerError, Result};
