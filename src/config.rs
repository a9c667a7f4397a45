//! Typed server configuration (spec.md §1 expansion: the core has no
//! network-facing config *file* format — embedders build these structs
//! directly, the way `fp_core::main` constructs its storage and pool
//! configuration by hand).

use std::time::Duration;

/// Configuration for [`crate::dhcp::server::DhcpServer`].
#[derive(Debug, Clone)]
pub struct DhcpServerConfig {
    /// Address to bind the listening socket to (default `0.0.0.0:67`).
    pub bind_addr: String,
    /// Optional network interface to bind the socket to
    /// (`SO_BINDTODEVICE` on Linux; a logged no-op elsewhere).
    pub interface: Option<String>,
}

impl Default for DhcpServerConfig {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0:67".to_string(), interface: None }
    }
}

/// Configuration for [`crate::tftp::server::TftpServer`].
#[derive(Debug, Clone)]
pub struct TftpServerConfig {
    /// Address to bind the listening socket to (default `0.0.0.0:69`).
    pub bind_addr: String,
    pub interface: Option<String>,
    /// Upper bound the server will accept for a client-negotiated
    /// blksize; requests above this are capped, not rejected.
    pub max_blksize: u16,
    /// How long a session may sit idle before the sweeper reclaims it.
    pub idle_timeout: Duration,
    /// How often the sweeper scans the session map.
    pub sweep_interval: Duration,
}

impl Default for TftpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:69".to_string(),
            interface: None,
            max_blksize: 4096,
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
        }
    }
}
