//! Background removal server
//!
//! Serves `POST /api/remove-background` over HTTP, or processes a single file
//! with `--input`. Run with `--help` for all options.

#[cfg(feature = "cli")]
use bgremove_server::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
