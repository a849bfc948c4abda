use async_trait::async_trait;
use std::{fmt::Debug, net::SocketAddr, time::Duration};
use tokio::net::TcpStream;
use tracing::debug;

/// Best-effort reachability check run before any API request.
///
/// Cancellation is handled by the caller racing this future against its token.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + Debug {
    async fn is_reachable(&self) -> bool;
}

/// Opens (and immediately drops) a TCP connection to a well-known address.
///
/// ICMP echo needs raw-socket privileges on most systems, a TCP handshake
/// does not.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_stream)) => {
                debug!("Connectivity probe to {} succeeded", self.addr);
                true
            }
            Ok(Err(e)) => {
                debug!("Connectivity probe to {} failed: {e}", self.addr);
                false
            }
            Err(_) => {
                debug!("Connectivity probe to {} timed out after {:?}", self.addr, self.timeout);
                false
            }
        }
    }
}

/// Skips the check entirely, for hosts where outbound probing is blocked.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeReachable;

#[async_trait]
impl ConnectivityProbe for AssumeReachable {
    async fn is_reachable(&self) -> bool {
        true
    }
}
