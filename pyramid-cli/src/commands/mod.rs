//! CLI command implementations.

pub mod play;
pub mod ports;
pub mod probe;

use anyhow::{bail, Result};
use pyramid_client::Link;

/// Pick the endpoint: `--port`, then the config file, then the only
/// endpoint present.
pub async fn resolve_port<L: Link>(
    link: &L,
    explicit: Option<String>,
    configured: Option<&str>,
) -> Result<String> {
    if let Some(port) = explicit.or_else(|| configured.map(str::to_string)) {
        return Ok(port);
    }
    let mut present = link.list_endpoints().await?;
    match present.len() {
        0 => bail!("No serial ports found. Is the board plugged in?"),
        1 => Ok(present.remove(0)),
        _ => bail!(
            "Several serial ports found ({}); choose one with --port",
            present.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyramid_client::MockLink;

    #[tokio::test]
    async fn explicit_port_wins() {
        let link = MockLink::with_endpoint("COM3");
        let port = resolve_port(&link, Some("COM9".into()), Some("COM4"))
            .await
            .unwrap();
        assert_eq!(port, "COM9");
    }

    #[tokio::test]
    async fn configured_port_is_next() {
        let link = MockLink::with_endpoint("COM3");
        let port = resolve_port(&link, None, Some("COM4")).await.unwrap();
        assert_eq!(port, "COM4");
    }

    #[tokio::test]
    async fn single_endpoint_is_picked() {
        let link = MockLink::with_endpoint("/dev/ttyACM0");
        let port = resolve_port(&link, None, None).await.unwrap();
        assert_eq!(port, "/dev/ttyACM0");
    }

    #[tokio::test]
    async fn ambiguous_or_missing_endpoint_fails() {
        let link = MockLink::new();
        assert!(resolve_port(&link, None, None).await.is_err());

        link.add_endpoint("a");
        link.add_endpoint("b");
        let err = resolve_port(&link, None, None).await.unwrap_err();
        assert!(err.to_string().contains("a, b"));
    }
}
