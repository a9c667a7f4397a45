//! Shared UDP socket setup: binding, `SO_BROADCAST`, and optional
//! bind-to-device (spec.md §6).
//!
//! Generalises `fp_core::netio::{netlistener, netoutput}`'s plain
//! `UdpSocket::bind` into a helper that also configures the broadcast
//! and interface-binding socket options the DHCP/TFTP servers need, via
//! `socket2` (used the same way the TFTP/DHCP repos in the retrieval
//! pack reach for raw socket options tokio itself doesn't expose).

use std::net::SocketAddr;

use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;

/// Binds a UDP socket to `addr`, optionally enabling `SO_BROADCAST` and
/// binding to a named network interface. Interface binding is a no-op,
/// logged at DEBUG, on platforms (anything but Linux/Android) that don't
/// support `SO_BINDTODEVICE`.
pub fn bind_udp(addr: &str, broadcast: bool, interface: Option<&str>) -> std::io::Result<UdpSocket> {
    let sock_addr: SocketAddr = addr
        .parse()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid bind address"))?;

    let domain = if sock_addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    if broadcast {
        socket.set_broadcast(true)?;
    }
    if let Some(name) = interface {
        bind_to_device(&socket, name);
    }
    socket.set_nonblocking(true)?;
    socket.bind(&sock_addr.into())?;

    UdpSocket::from_std(socket.into())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn bind_to_device(socket: &Socket, name: &str) {
    if let Err(e) = socket.bind_device(Some(name.as_bytes())) {
        log::debug!("failed to bind socket to device {name}: {e}");
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn bind_to_device(_socket: &Socket, name: &str) {
    log::debug!("bind-to-device({name}) is a no-op on this platform");
}

/// The DHCP limited-broadcast reply target (spec.md §6/§9).
pub fn limited_broadcast() -> SocketAddr {
    "255.255.255.255:68".parse().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_udp_accepts_ephemeral_port() {
        let socket = bind_udp("127.0.0.1:0", false, None).unwrap();
        assert!(socket.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn limited_broadcast_is_68() {
        assert_eq!(limited_broadcast().to_string(), "255.255.255.255:68");
    }
}
