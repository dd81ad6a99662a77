//! Terminal output for operators.
//!
//! Diagnostics go through `log`; this is the human-facing summary. Errors go
//! to stderr, everything else to stdout.

use std::io::{self, Write};

/// Output manager honouring `--verbose` and `--quiet`.
#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    fn out(&self, line: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(io::stdout().lock(), "{line}")
    }

    /// Section header.
    pub fn section(&self, title: &str) -> io::Result<()> {
        self.out(&format!("\n{title}"))?;
        self.out(&"=".repeat(title.chars().count()))
    }

    pub fn success(&self, message: &str) -> io::Result<()> {
        self.out(&format!("✓ {message}"))
    }

    pub fn indent(&self, message: &str) -> io::Result<()> {
        self.out(&format!("\t* {message}"))
    }

    pub fn println(&self, message: &str) -> io::Result<()> {
        self.out(message)
    }

    /// Printed only with `--verbose`.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if self.verbose {
            self.out(message)?;
        }
        Ok(())
    }

    /// Always printed.
    pub fn error(&self, message: &str) -> io::Result<()> {
        writeln!(io::stderr().lock(), "✗ {message}")
    }
}
