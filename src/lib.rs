//! Wire codecs and per-client protocol engines for DHCPv4 and TFTP PXE
//! boot services.
//!
//! The crate owns the wire format and the transaction state machines
//! (spec.md §1); lease policy, address pools, and file provisioning are
//! the embedder's concern, plugged in via the `DhcpDecider`,
//! `TftpReadProvider`, `TftpWriteProvider`, and `TftpCompletion` traits.

pub mod bytes;
pub mod config;
pub mod dhcp;
pub mod error;
pub mod logging;
pub mod net;
pub mod tftp;
