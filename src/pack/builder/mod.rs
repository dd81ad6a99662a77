//! Pack orchestration and coordination.
//!
//! - [`checksum`] - SHA256 checksum of the final pack
//! - [`orchestrator`] - [`Pipeline`] sequencing every stage
//! - [`tool_detection`] - locating `jar`, `jarsigner` and `adb`

mod checksum;
mod orchestrator;
mod tool_detection;

pub use checksum::calculate_sha256;
pub use orchestrator::{PackOutcome, Pipeline};
pub use tool_detection::ToolLocator;
