//! List serial endpoints.

use anyhow::{Context, Result};
use pyramid_client::Link;

/// Run the ports command.
pub async fn run<L: Link>(link: &L) -> Result<()> {
    let ports = link
        .list_endpoints()
        .await
        .context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}
