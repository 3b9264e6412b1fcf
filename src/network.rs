//! Network association checks.
//!
//! The tracker does not manage the link itself; it only asks whether one is
//! up before each fetch.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Associated,
    NotAssociated,
}

#[async_trait]
pub trait Network: Send + Sync {
    async fn status(&self) -> LinkStatus;

    async fn local_address(&self) -> Option<IpAddr>;
}

/// The host's own network stack.
///
/// Connecting a UDP socket only selects a route and source address; nothing
/// is sent. If the OS has no route to the probe address, the link counts as
/// not associated.
#[derive(Debug, Clone)]
pub struct HostNetwork {
    probe: SocketAddr,
}

impl HostNetwork {
    pub fn new(probe: SocketAddr) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl Network for HostNetwork {
    async fn status(&self) -> LinkStatus {
        match self.local_address().await {
            Some(_) => LinkStatus::Associated,
            None => LinkStatus::NotAssociated,
        }
    }

    async fn local_address(&self) -> Option<IpAddr> {
        let bind: IpAddr = match self.probe {
            SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        let socket = UdpSocket::bind((bind, 0)).await.ok()?;
        socket.connect(self.probe).await.ok()?;
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified()).then_some(ip)
    }
}
