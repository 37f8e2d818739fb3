pub mod conn;
pub mod writer;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::frame::DEFAULT_MAX_FRAME_LEN;
use crate::retry::RetryPolicy;

/// Configuration for the relay listener and its per-connection pipeline.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to listen on for inbound tuple streams.
    pub listen_addr: SocketAddr,

    /// Cap on a single inbound frame, including its length field.
    pub max_frame_len: u32,

    /// Maximum in-flight per-tuple computations per connection.
    pub compute_concurrency: usize,

    /// Time allowed for the handshake and register message to arrive.
    pub handshake_timeout: Duration,

    /// Optional bounded retry for the downstream dial.
    pub dial_retry: Option<RetryPolicy>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 6000)),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            compute_concurrency: default_concurrency(),
            handshake_timeout: Duration::from_secs(30),
            dial_retry: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}

impl RelayConfig {
    /// Create a builder for constructing a `RelayConfig`.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug, Clone, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.config.listen_addr = addr;
        self
    }

    pub fn max_frame_len(mut self, len: u32) -> Self {
        self.config.max_frame_len = len;
        self
    }

    pub fn compute_concurrency(mut self, limit: usize) -> Self {
        self.config.compute_concurrency = limit;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn dial_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.dial_retry = Some(policy);
        self
    }

    /// Build the `RelayConfig`, validating that all values are sensible.
    pub fn build(self) -> Result<RelayConfig> {
        if self.config.max_frame_len < crate::frame::LEN_FIELD_SIZE as u32 {
            return Err(Error::Config(
                "max_frame_len must cover at least the length field".into(),
            ));
        }
        if self.config.compute_concurrency == 0 {
            return Err(Error::Config("compute_concurrency must be > 0".into()));
        }
        if self.config.handshake_timeout.is_zero() {
            return Err(Error::Config("handshake_timeout must be > 0".into()));
        }
        Ok(self.config)
    }
}

/// Run the relay listener until `shutdown` is cancelled.
///
/// Every accepted connection gets its own handler task; a handler failure is
/// logged and closes that connection only.
pub async fn run_relay(config: RelayConfig, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, "relay listening");

    let config = Arc::new(config);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("relay shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                stream.set_nodelay(true).ok();

                let config = Arc::clone(&config);
                let token = shutdown.child_token();

                tokio::spawn(async move {
                    tracing::debug!(%peer_addr, "accepted connection");
                    if let Err(e) = conn::handle_connection(stream, config, token).await {
                        tracing::warn!(%peer_addr, error = %e, "connection handler error");
                    }
                });
            }
        }
    }
}
