//! One-shot link check: open, reset, START, print the board.

use anyhow::{Context, Result};
use pyramid_client::{GameClient, Link};

use crate::render;

/// Run the probe command.
pub async fn run<L: Link + 'static>(client: &GameClient<L>, port: &str) -> Result<()> {
    client
        .connect(port)
        .await
        .with_context(|| format!("Failed to open {}", port))?;

    let result = client.new_game().await;
    client.disconnect().await;
    let view = result.context("START exchange failed")?;

    println!("=== {} ===", port);
    print!("{}", render::board(&view));
    println!("Checksum OK, {} tiles dealt", view.remaining);
    Ok(())
}
