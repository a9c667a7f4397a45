//! Error taxonomy for the DHCPv4 and TFTP wire codecs and servers.
//!
//! Mirrors the concept table in the design notes: codec errors are always
//! silent-drop material for the server loops, while the TFTP engine errors
//! map onto specific TFTP `Error` packets.

use std::fmt;
use std::net::SocketAddr;

/// Errors raised while decoding or encoding DHCPv4 wire data.
#[derive(Debug)]
pub enum DhcpError {
    /// Packet shorter than the fixed 240-byte BOOTP header.
    TruncatedPacket { len: usize },
    /// Magic cookie missing or wrong at offset 236.
    BadMagicCookie,
    /// `op` field outside `{1, 2}`.
    BadOp(u8),
    /// `htype` is not a hardware type this codec knows about.
    BadEnumValue { table: &'static str, value: u8 },
    /// `hlen` outside `[1, 16]`.
    BadHlen(u8),
    /// An option's declared length runs past the end of the buffer.
    TruncatedOption { opcode: u8 },
    /// An option with a fixed-width payload had the wrong length.
    BadOptionLength { opcode: u8, got: usize, expected: usize },
}

impl fmt::Display for DhcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhcpError::TruncatedPacket { len } => {
                write!(f, "packet too short for a BOOTP header: {len} bytes")
            }
            DhcpError::BadMagicCookie => write!(f, "missing or invalid DHCP magic cookie"),
            DhcpError::BadOp(op) => write!(f, "bad op code {op}, expected 1 or 2"),
            DhcpError::BadEnumValue { table, value } => {
                write!(f, "value {value} is not a known {table}")
            }
            DhcpError::BadHlen(hlen) => write!(f, "hlen {hlen} outside [1, 16]"),
            DhcpError::TruncatedOption { opcode } => {
                write!(f, "option {opcode} declares a length past the end of the buffer")
            }
            DhcpError::BadOptionLength { opcode, got, expected } => {
                write!(f, "option {opcode} has length {got}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for DhcpError {}

/// Errors raised while decoding or encoding TFTP wire data, or while
/// driving a read/write transaction.
#[derive(Debug)]
pub enum TftpError {
    /// Packet shorter than the 2-byte opcode field.
    TruncatedPacket,
    /// Opcode outside `{1..=6}`.
    BadOpcode(u16),
    /// A request/OACK string field was not NUL-terminated.
    MissingTerminator,
    /// An option name was recognised but its value was not a valid
    /// decimal integer.
    BadOptionValue { name: String },
    /// Block number did not match the block the engine expected.
    BadBlock { got: u16, want: u16 },
    /// A packet arrived that the current engine state cannot accept.
    UnexpectedOpcode,
    /// A data payload exceeded the negotiated block size.
    IllegalOperation(String),
    /// The peer itself reported an error; the session is torn down with
    /// no reply sent.
    PeerError { code: u16, message: String },
    /// Neither `open_read` nor `open_write` produced a buffer.
    ProviderMiss,
    /// A provider or callback panicked.
    Internal(String),
}

impl fmt::Display for TftpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TftpError::TruncatedPacket => write!(f, "packet too short for a TFTP opcode"),
            TftpError::BadOpcode(code) => write!(f, "unknown TFTP opcode {code}"),
            TftpError::MissingTerminator => write!(f, "expected a NUL-terminated field"),
            TftpError::BadOptionValue { name } => write!(f, "option {name} has a non-numeric value"),
            TftpError::BadBlock { got, want } => {
                write!(f, "bad block={got}, expected={want}")
            }
            TftpError::UnexpectedOpcode => write!(f, "packet not valid for the current transaction state"),
            TftpError::IllegalOperation(reason) => write!(f, "illegal operation: {reason}"),
            TftpError::PeerError { code, message } => {
                write!(f, "peer reported error {code}: {message}")
            }
            TftpError::ProviderMiss => write!(f, "no file provider produced a buffer"),
            TftpError::Internal(reason) => write!(f, "internal server error: {reason}"),
        }
    }
}

impl std::error::Error for TftpError {}

impl TftpError {
    /// Maps this error onto the TFTP error code/message pair that should
    /// be sent to the peer, or `None` when the spec says no reply should
    /// be sent (the peer-originated error case).
    pub fn to_wire(&self) -> Option<(u16, String)> {
        match self {
            TftpError::BadOpcode(_) | TftpError::UnexpectedOpcode => {
                Some((4, "illegal operation".to_string()))
            }
            TftpError::BadBlock { got, want } => {
                Some((4, format!("bad block={got}, expected={want}")))
            }
            TftpError::IllegalOperation(reason) => Some((4, reason.clone())),
            TftpError::ProviderMiss => None,
            TftpError::PeerError { .. } => None,
            TftpError::Internal(_) => Some((0, "internal server error".to_string())),
            TftpError::TruncatedPacket
            | TftpError::MissingTerminator
            | TftpError::BadOptionValue { .. } => None,
        }
    }
}

/// Context attached to a log line when a handler or provider panics, used
/// by both server loops for the ERROR-level log (§6).
#[derive(Debug)]
pub struct HandlerPanic {
    pub peer: Option<SocketAddr>,
    pub payload: String,
}

impl fmt::Display for HandlerPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peer {
            Some(peer) => write!(f, "handler panicked for peer {peer}: {}", self.payload),
            None => write!(f, "handler panicked: {}", self.payload),
        }
    }
}

/// Extracts a printable message from a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
