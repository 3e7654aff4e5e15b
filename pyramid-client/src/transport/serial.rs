//! Serial port link over `tokio-serial`.
//!
//! 8N1, no flow control. The read timeout is enforced per call with a
//! deadline across repeated reads, since a reply can arrive in pieces.

use super::{Link, LinkError};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

/// A real serial endpoint.
#[derive(Default)]
pub struct SerialLink {
    port: Mutex<Option<SerialStream>>,
}

impl SerialLink {
    /// Create a closed link.
    pub fn new() -> Self {
        Self::default()
    }
}

fn control_error(err: tokio_serial::Error) -> LinkError {
    LinkError::Io(io::Error::from(err))
}

#[async_trait]
impl Link for SerialLink {
    async fn open(&self, endpoint: &str, baud_rate: u32) -> Result<(), LinkError> {
        let mut port = self.port.lock().await;
        // Drop any previous handle first so the same endpoint can be reopened
        port.take();

        let stream = tokio_serial::new(endpoint, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| LinkError::OpenFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!("Opened {} at {} baud", endpoint, baud_rate);
        *port = Some(stream);
        Ok(())
    }

    async fn close(&self) -> Result<(), LinkError> {
        if self.port.lock().await.take().is_some() {
            tracing::info!("Closed serial link");
        }
        Ok(())
    }

    async fn reset_pulse(&self, hold: Duration, boot: Duration) -> Result<(), LinkError> {
        let mut guard = self.port.lock().await;
        let Some(port) = guard.as_mut() else {
            return Ok(());
        };

        tracing::debug!("Reset pulse: DTR low for {:?}", hold);
        port.write_data_terminal_ready(false).map_err(control_error)?;
        tokio::time::sleep(hold).await;
        port.write_data_terminal_ready(true).map_err(control_error)?;
        tokio::time::sleep(boot).await;
        Ok(())
    }

    async fn write_all(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut guard = self.port.lock().await;
        let port = guard.as_mut().ok_or(LinkError::NotOpen)?;
        port.write_all(bytes).await?;
        port.flush().await?;
        Ok(())
    }

    async fn read_exact(&self, count: usize, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let mut guard = self.port.lock().await;
        let port = guard.as_mut().ok_or(LinkError::NotOpen)?;

        let mut buf = vec![0u8; count];
        let mut filled = 0;
        let deadline = Instant::now() + timeout;

        while filled < count {
            match tokio::time::timeout_at(deadline, port.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) => return Err(LinkError::Io(e)),
                Err(_) if filled == 0 => return Err(LinkError::Timeout),
                Err(_) => {
                    return Err(LinkError::ShortRead {
                        expected: count,
                        received: filled,
                    })
                }
            }
        }
        Ok(buf)
    }

    async fn flush_input(&self) -> Result<(), LinkError> {
        let guard = self.port.lock().await;
        if let Some(port) = guard.as_ref() {
            port.clear(ClearBuffer::Input).map_err(control_error)?;
        }
        Ok(())
    }

    async fn list_endpoints(&self) -> Result<Vec<String>, LinkError> {
        let ports = tokio_serial::available_ports().map_err(control_error)?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    async fn is_open(&self) -> bool {
        self.port.lock().await.is_some()
    }
}
