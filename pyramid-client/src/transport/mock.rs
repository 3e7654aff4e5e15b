//! Mock link for testing.
//!
//! Plays the device: each written request releases one queued reply into
//! the receive buffer, and every write, read, flush and reset pulse is
//! captured for verification.

use super::{Link, LinkError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock link for testing.
///
/// Clones share state, so a test can keep one handle while the client
/// owns another.
#[derive(Debug, Default)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

#[derive(Debug, Default)]
struct MockLinkInner {
    open: bool,
    endpoint: Option<String>,
    baud_rate: Option<u32>,
    endpoints: Vec<String>,
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    silent: bool,
    written: Vec<Vec<u8>>,
    reads: Vec<usize>,
    flushes: usize,
    resets: usize,
    opens: usize,
    closes: usize,
    fail_next_open: Option<String>,
    fail_next_write: Option<String>,
}

impl MockLink {
    /// Create a new mock link with no endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock link that reports one endpoint.
    pub fn with_endpoint(endpoint: &str) -> Self {
        let link = Self::new();
        link.add_endpoint(endpoint);
        link
    }

    /// Make an endpoint appear (device plugged in).
    pub fn add_endpoint(&self, endpoint: &str) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.endpoints.iter().any(|e| e == endpoint) {
            inner.endpoints.push(endpoint.to_string());
        }
    }

    /// Make an endpoint disappear (device unplugged).
    pub fn remove_endpoint(&self, endpoint: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.endpoints.retain(|e| e != endpoint);
    }

    /// Queue the reply the device sends after the next request.
    pub fn queue_reply(&self, bytes: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.replies.push_back(bytes);
    }

    /// Put bytes straight into the receive buffer, as if left over from an
    /// earlier exchange.
    pub fn inject_stale(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.rx.extend(bytes);
    }

    /// Stop (or resume) answering requests. A silent device makes every
    /// read time out.
    pub fn set_silent(&self, silent: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.silent = silent;
    }

    /// Cause the next open() to fail with the given error.
    pub fn fail_next_open(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_open = Some(error.to_string());
    }

    /// Cause the next write_all() to fail with the given error.
    pub fn fail_next_write(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_write = Some(error.to_string());
    }

    /// Get all requests that were written.
    pub fn written(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.written.clone()
    }

    /// Get the last request that was written.
    pub fn last_written(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.written.last().cloned()
    }

    /// Byte counts requested by each read_exact() call, in order.
    pub fn reads(&self) -> Vec<usize> {
        let inner = self.inner.lock().unwrap();
        inner.reads.clone()
    }

    /// Number of flush_input() calls.
    pub fn flushes(&self) -> usize {
        self.inner.lock().unwrap().flushes
    }

    /// Number of reset pulses sent while open.
    pub fn resets(&self) -> usize {
        self.inner.lock().unwrap().resets
    }

    /// Number of successful opens.
    pub fn opens(&self) -> usize {
        self.inner.lock().unwrap().opens
    }

    /// Number of close() calls on an open link.
    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    /// Endpoint that is currently open.
    pub fn open_endpoint(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.endpoint.clone()
    }

    /// Baud rate of the last successful open.
    pub fn baud_rate(&self) -> Option<u32> {
        self.inner.lock().unwrap().baud_rate
    }

    /// Replies still waiting for a request.
    pub fn pending_replies(&self) -> usize {
        self.inner.lock().unwrap().replies.len()
    }

    /// Forget captured writes and reads, keeping link state.
    pub fn clear_log(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.written.clear();
        inner.reads.clear();
    }
}

impl Clone for MockLink {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Link for MockLink {
    async fn open(&self, endpoint: &str, baud_rate: u32) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(reason) = inner.fail_next_open.take() {
            return Err(LinkError::OpenFailed {
                endpoint: endpoint.to_string(),
                reason,
            });
        }

        if !inner.endpoints.iter().any(|e| e == endpoint) {
            return Err(LinkError::OpenFailed {
                endpoint: endpoint.to_string(),
                reason: "no such device".into(),
            });
        }

        inner.open = true;
        inner.endpoint = Some(endpoint.to_string());
        inner.baud_rate = Some(baud_rate);
        inner.rx.clear();
        inner.opens += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.open {
            inner.closes += 1;
        }
        inner.open = false;
        inner.endpoint = None;
        Ok(())
    }

    async fn reset_pulse(&self, _hold: Duration, _boot: Duration) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.open {
            inner.resets += 1;
        }
        Ok(())
    }

    async fn write_all(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.open {
            return Err(LinkError::NotOpen);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_write.take() {
            return Err(LinkError::Io(io::Error::new(io::ErrorKind::BrokenPipe, error)));
        }

        inner.written.push(bytes.to_vec());
        if !inner.silent {
            if let Some(reply) = inner.replies.pop_front() {
                inner.rx.extend(reply);
            }
        }
        Ok(())
    }

    async fn read_exact(&self, count: usize, _timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.open {
            return Err(LinkError::NotOpen);
        }

        inner.reads.push(count);
        if inner.rx.is_empty() {
            return Err(LinkError::Timeout);
        }
        if inner.rx.len() < count {
            let received = inner.rx.len();
            inner.rx.clear();
            return Err(LinkError::ShortRead {
                expected: count,
                received,
            });
        }
        Ok(inner.rx.drain(..count).collect())
    }

    async fn flush_input(&self) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().unwrap();
        inner.rx.clear();
        inner.flushes += 1;
        Ok(())
    }

    async fn list_endpoints(&self) -> Result<Vec<String>, LinkError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.endpoints.clone())
    }

    async fn is_open(&self) -> bool {
        self.inner.lock().unwrap().open
    }
}
