//! Harmony CLI
//!
//! Parses, validates and runs Harmony Response Format envelopes from files
//! or stdin. Useful for checking hand-written envelopes and scripts.

use harmony_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
