use async_trait::async_trait;
use reqwest::Client;
use std::{fmt::Debug, sync::Arc};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Status line and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 408 Request Timeout or 504 Gateway Timeout.
    pub fn is_timeout_status(&self) -> bool {
        self.status == 408 || self.status == 504
    }
}

/// The one capability the client needs from an HTTP stack.
///
/// Implementations must return promptly with [`TransportError::Cancelled`]
/// once `cancel` fires, aborting the request in flight.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<HttpReply, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<HttpReply, TransportError> {
        (**self).get(url, cancel).await
    }
}

/// Default transport backed by a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let http = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { http })
    }

    /// Wrap a preconfigured client (proxies, custom TLS roots, timeouts, ...).
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    async fn send(&self, url: &str) -> Result<HttpReply, TransportError> {
        let res = self.http.get(url).send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<HttpReply, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            reply = self.send(url) => reply,
        }
    }
}
