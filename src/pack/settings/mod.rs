//! Configuration structures for pack operations.
//!
//! [`PackSettings`] is constructed through [`SettingsBuilder`], usually from a
//! parsed `Pack.toml` (see [`crate::config`]).

mod attributes;
mod builder;
mod core;
mod push;
mod signing;
mod tools;

pub use attributes::ManifestAttributes;
pub use builder::SettingsBuilder;
pub use core::{AssemblyBackend, PackSettings};
pub use push::PushSettings;
pub use signing::{DEFAULT_TSA_URL, SigningSettings};
pub use tools::ToolSettings;
