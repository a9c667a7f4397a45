//! Minimal, pluggable DHCPv4 server loop (spec.md §4.7/§6).
//!
//! Generalises the receive/decode/dispatch/send shape of
//! `fp_core::netio::{netlistener, netoutput}` into a single-socket loop
//! that hands every decoded request to an embedder-supplied
//! [`DhcpDecider`] — the core owns no lease policy (spec.md §1).

use std::net::{Ipv4Addr, SocketAddr};
use std::panic::AssertUnwindSafe;

use tokio::net::UdpSocket;

use crate::config::DhcpServerConfig;
use crate::dhcp::packet::DhcpV4Packet;
use crate::error::panic_message;
use crate::net::{bind_udp, limited_broadcast};

const RECV_BUFFER_LEN: usize = 1 << 16;

/// Maps a decoded DHCP request to an optional reply. Implementations are
/// pure, synchronous functions over the request (spec.md §6); returning
/// `None` means the server silently drops the datagram.
pub trait DhcpDecider: Send + Sync {
    fn decide(&self, request: &DhcpV4Packet) -> Option<DhcpV4Packet>;
}

impl<F> DhcpDecider for F
where
    F: Fn(&DhcpV4Packet) -> Option<DhcpV4Packet> + Send + Sync,
{
    fn decide(&self, request: &DhcpV4Packet) -> Option<DhcpV4Packet> {
        self(request)
    }
}

/// A single-socket DHCPv4 server. It never replies to the source
/// address: replies go to the limited broadcast address, or to the
/// relay agent's `giaddr` when the request carries one (RFC 1542 §4.1,
/// the SHOULD-fix recorded in spec.md §9).
pub struct DhcpServer<D: DhcpDecider> {
    socket: UdpSocket,
    decider: D,
}

impl<D: DhcpDecider> DhcpServer<D> {
    pub async fn bind(config: &DhcpServerConfig, decider: D) -> std::io::Result<Self> {
        let socket = bind_udp(&config.bind_addr, true, config.interface.as_deref())?;
        log::info!("DHCP server bound to {}", config.bind_addr);
        Ok(Self { socket, decider })
    }

    /// Runs the receive loop forever. Each datagram is handled to
    /// completion before the next `recv_from` (spec.md §5: "no
    /// suspension inside `on_packet`" other than the send itself).
    pub async fn run(&self) -> std::io::Result<()> {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            self.handle_datagram(&buf[..len], peer).await;
        }
    }

    async fn handle_datagram(&self, bytes: &[u8], peer: SocketAddr) {
        let request = match DhcpV4Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                log::debug!("dropping malformed DHCP datagram from {peer}: {e}");
                return;
            }
        };

        let decider = AssertUnwindSafe(&self.decider);
        let reply = std::panic::catch_unwind(move || decider.decide(&request));
        let reply = match reply {
            Ok(reply) => reply,
            Err(payload) => {
                log::error!("DHCP decider panicked for {peer}: {}", panic_message(&*payload));
                return;
            }
        };

        let Some(reply) = reply else {
            return;
        };

        let target = reply_target(&reply);
        let bytes = reply.encode();
        log::info!(
            "peer={peer} op=reply xid={:#010x} yiaddr={} target={target}",
            reply.xid,
            reply.yiaddr
        );
        if let Err(e) = self.socket.send_to(&bytes, target).await {
            log::error!("failed to send DHCP reply to {target}: {e}");
        }
    }
}

fn reply_target(reply: &DhcpV4Packet) -> SocketAddr {
    if reply.giaddr != Ipv4Addr::UNSPECIFIED {
        SocketAddr::new(reply.giaddr.into(), 67)
    } else {
        limited_broadcast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dhcp::option::{DhcpMessageType, DhcpOption};

    #[test]
    fn reply_target_defaults_to_limited_broadcast() {
        let reply = DhcpV4Packet::empty();
        assert_eq!(reply_target(&reply), limited_broadcast());
    }

    #[test]
    fn reply_target_uses_giaddr_when_present() {
        let mut reply = DhcpV4Packet::empty();
        reply.giaddr = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(reply_target(&reply), SocketAddr::new(reply.giaddr.into(), 67));
    }

    #[tokio::test]
    async fn drops_malformed_datagram_without_panicking() {
        let server = DhcpServer::bind(
            &DhcpServerConfig { bind_addr: "127.0.0.1:0".to_string(), interface: None },
            |_: &DhcpV4Packet| None,
        )
        .await
        .unwrap();
        server.handle_datagram(b"short", "127.0.0.1:12345".parse().unwrap()).await;
    }

    #[tokio::test]
    async fn decider_panic_is_caught_and_logged() {
        let server = DhcpServer::bind(
            &DhcpServerConfig { bind_addr: "127.0.0.1:0".to_string(), interface: None },
            |_: &DhcpV4Packet| -> Option<DhcpV4Packet> { panic!("boom") },
        )
        .await
        .unwrap();
        let mut request = DhcpV4Packet::empty();
        request.hlen = 6;
        request.options.add(DhcpOption::DhcpMessageType(DhcpMessageType::Discover));
        server.handle_datagram(&request.encode(), "127.0.0.1:12345".parse().unwrap()).await;
    }
}
