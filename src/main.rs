//! Kodegen Bundler Pack - packs Android build bytecode into standalone packs.
//!
//! Extracts dex payloads from a host build archive, assembles and signs the
//! pack, and pushes it to connected devices.

use kodegen_bundler_pack::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.recovery_suggestion() {
                eprintln!("  {}", hint);
            }
            1
        }
    };

    process::exit(exit_code);
}
