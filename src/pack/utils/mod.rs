//! Shared helpers for pack stages.

pub mod fs;
