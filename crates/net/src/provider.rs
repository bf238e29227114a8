//! Single-source HTTP fetching.

use crate::buffer::CappedBuffer;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};
use url::Url;

/// Fetches a whole resource into memory.
#[async_trait]
pub trait HttpProvider: Send + Sync {
    async fn fetch(&self, uri: &Url) -> Result<Vec<u8>>;

    /// Cheap "are we online at all" check used to tell a dead host from a dead
    /// link. Providers that cannot tell should say `true`.
    async fn has_connection(&self) -> bool {
        true
    }
}

pub type ProviderHandle = Arc<dyn HttpProvider>;

/// Tunables for [`ReqwestProvider`].
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub max_size: usize,
    pub timeout: Duration,
    pub user_agent: String,
    /// `host:port` to open a TCP connection to when diagnosing failures.
    /// `None` skips the probe and assumes connectivity.
    pub probe: Option<String>,
    pub probe_timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            max_size: 100 * 1024 * 1024,
            timeout: Duration::from_secs(30),
            user_agent: concat!("trove/", env!("CARGO_PKG_VERSION")).to_string(),
            probe: None,
            probe_timeout: Duration::from_secs(3),
        }
    }
}

/// [`HttpProvider`] backed by `reqwest`, streaming into a [`CappedBuffer`].
pub struct ReqwestProvider {
    client: reqwest::Client,
    options: ProviderOptions,
}

impl ReqwestProvider {
    pub fn new(options: ProviderOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()
            .or_raise(|| ErrorKind::Configuration)?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Transport failures become [`ErrorKind::NoConnectivity`] when the probe
    /// says we're offline.
    async fn transport_kind(&self) -> ErrorKind {
        if self.has_connection().await {
            ErrorKind::Transport
        } else {
            ErrorKind::NoConnectivity
        }
    }
}

#[async_trait]
impl HttpProvider for ReqwestProvider {
    #[instrument(level = "debug", skip(self), fields(uri = %uri))]
    async fn fetch(&self, uri: &Url) -> Result<Vec<u8>> {
        let limit = self.options.max_size;
        let mut response = match self.client.get(uri.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = self.transport_kind().await;
                return Err(err).or_raise(|| kind);
            },
        };
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        let hint = response.content_length();
        if let Some(length) = hint
            && length > limit as u64
        {
            debug!(length, limit, "Refusing oversized response");
            exn::bail!(ErrorKind::TooLarge { limit });
        }
        let mut buffer = CappedBuffer::new(hint, limit);
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => buffer.push(&chunk)?,
                Ok(None) => break,
                Err(err) => {
                    let kind = self.transport_kind().await;
                    return Err(err).or_raise(|| kind);
                },
            }
        }
        debug!(bytes = buffer.len(), "Fetched");
        Ok(buffer.into_inner())
    }

    async fn has_connection(&self) -> bool {
        let Some(probe) = &self.options.probe else {
            return true;
        };
        match tokio::time::timeout(self.options.probe_timeout, TcpStream::connect(probe.as_str())).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                warn!(probe = %probe, error = %err, "Connectivity probe failed");
                false
            },
            Err(_) => {
                warn!(probe = %probe, "Connectivity probe timed out");
                false
            },
        }
    }
}
