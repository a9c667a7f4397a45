//! TFTP packet codec: Request/OACK/Ack/Data/Error (RFC 1350/2347,
//! spec.md §3/§4.5).
//!
//! No teacher module covers TFTP; built fresh, matching the enum-plus-
//! `match` codec shape used for [`crate::dhcp::packet`].

use crate::error::TftpError;
use crate::tftp::option::TftpOptions;

const OP_RRQ: u16 = 1;
const OP_WRQ: u16 = 2;
const OP_DATA: u16 = 3;
const OP_ACK: u16 = 4;
const OP_ERROR: u16 = 5;
const OP_OACK: u16 = 6;

/// Whether a `Request` packet is a read or a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
}

/// TFTP transfer mode (RFC 1350 §5). Only `Octet` is translated by this
/// crate's engine; `Netascii`/`Mail` round-trip but their payloads are
/// stored verbatim (spec.md §1 Non-goals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TftpMode {
    Netascii,
    Octet,
    Mail,
    /// A mode string outside the three RFC 1350 modes, preserved as-is.
    Other(String),
}

impl TftpMode {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "netascii" => TftpMode::Netascii,
            "octet" => TftpMode::Octet,
            "mail" => TftpMode::Mail,
            _ => TftpMode::Other(s.to_string()),
        }
    }

    fn as_wire_str(&self) -> &str {
        match self {
            TftpMode::Netascii => "netascii",
            TftpMode::Octet => "octet",
            TftpMode::Mail => "mail",
            TftpMode::Other(s) => s,
        }
    }
}

/// A decoded (or to-be-encoded) TFTP packet.
#[derive(Debug, Clone, PartialEq)]
pub enum TftpPacket {
    Request { kind: RequestKind, filename: Vec<u8>, mode: TftpMode, options: TftpOptions },
    Data { block: u16, payload: Vec<u8> },
    Ack { block: u16 },
    Error { code: u16, message: String },
    Oack { options: TftpOptions },
}

impl TftpPacket {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            TftpPacket::Request { kind, filename, mode, options } => {
                let opcode = match kind {
                    RequestKind::Read => OP_RRQ,
                    RequestKind::Write => OP_WRQ,
                };
                buf.extend_from_slice(&opcode.to_be_bytes());
                buf.extend_from_slice(filename);
                buf.push(0);
                buf.extend_from_slice(mode.as_wire_str().as_bytes());
                buf.push(0);
                buf.extend_from_slice(&options.encode());
            }
            TftpPacket::Data { block, payload } => {
                buf.extend_from_slice(&OP_DATA.to_be_bytes());
                buf.extend_from_slice(&block.to_be_bytes());
                buf.extend_from_slice(payload);
            }
            TftpPacket::Ack { block } => {
                buf.extend_from_slice(&OP_ACK.to_be_bytes());
                buf.extend_from_slice(&block.to_be_bytes());
            }
            TftpPacket::Error { code, message } => {
                buf.extend_from_slice(&OP_ERROR.to_be_bytes());
                buf.extend_from_slice(&code.to_be_bytes());
                buf.extend_from_slice(message.as_bytes());
                buf.push(0);
            }
            TftpPacket::Oack { options } => {
                buf.extend_from_slice(&OP_OACK.to_be_bytes());
                buf.extend_from_slice(&options.encode());
            }
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TftpError> {
        if bytes.len() < 2 {
            return Err(TftpError::TruncatedPacket);
        }
        let opcode = u16::from_be_bytes([bytes[0], bytes[1]]);
        let rest = &bytes[2..];
        match opcode {
            OP_RRQ | OP_WRQ => {
                let kind = if opcode == OP_RRQ { RequestKind::Read } else { RequestKind::Write };
                let (filename, rest) = split_at_nul(rest)?;
                let (mode, rest) = split_at_nul(rest)?;
                let mode = TftpMode::parse(
                    std::str::from_utf8(mode).map_err(|_| TftpError::MissingTerminator)?,
                );
                let options = TftpOptions::decode(rest)?;
                Ok(TftpPacket::Request { kind, filename: filename.to_vec(), mode, options })
            }
            OP_DATA => {
                if rest.len() < 2 {
                    return Err(TftpError::TruncatedPacket);
                }
                let block = u16::from_be_bytes([rest[0], rest[1]]);
                Ok(TftpPacket::Data { block, payload: rest[2..].to_vec() })
            }
            OP_ACK => {
                if rest.len() < 2 {
                    return Err(TftpError::TruncatedPacket);
                }
                let block = u16::from_be_bytes([rest[0], rest[1]]);
                Ok(TftpPacket::Ack { block })
            }
            OP_ERROR => {
                if rest.len() < 2 {
                    return Err(TftpError::TruncatedPacket);
                }
                let code = u16::from_be_bytes([rest[0], rest[1]]);
                let (message, _) = split_at_nul(&rest[2..])?;
                let message =
                    std::str::from_utf8(message).map_err(|_| TftpError::MissingTerminator)?.to_string();
                Ok(TftpPacket::Error { code, message })
            }
            OP_OACK => Ok(TftpPacket::Oack { options: TftpOptions::decode(rest)? }),
            other => Err(TftpError::BadOpcode(other)),
        }
    }
}

fn split_at_nul(buf: &[u8]) -> Result<(&[u8], &[u8]), TftpError> {
    match buf.iter().position(|&b| b == 0) {
        Some(pos) => Ok((&buf[..pos], &buf[pos + 1..])),
        None => Err(TftpError::MissingTerminator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tftp::option::TftpOption;

    #[test]
    fn rrq_with_blksize_scenario() {
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(b"foo\0octet\0blksize\x001468\x00");
        let packet = TftpPacket::decode(&bytes).unwrap();
        match packet {
            TftpPacket::Request { kind, filename, mode, options } => {
                assert_eq!(kind, RequestKind::Read);
                assert_eq!(filename, b"foo");
                assert_eq!(mode, TftpMode::Octet);
                assert_eq!(options.blksize(), Some(1468));
            }
            _ => panic!("expected Request"),
        }
    }

    #[test]
    fn ack_and_data_length_invariants() {
        let ack = TftpPacket::Ack { block: 4 };
        assert_eq!(ack.encode().len(), 4);

        let data = TftpPacket::Data { block: 1, payload: vec![1, 2, 3, 4, 5] };
        assert_eq!(data.encode().len(), 4 + 5);
    }

    #[test]
    fn round_trip_every_variant() {
        let mut options = TftpOptions::new();
        options.add(TftpOption::BlockSize(1024));

        let packets = vec![
            TftpPacket::Request {
                kind: RequestKind::Write,
                filename: b"bar".to_vec(),
                mode: TftpMode::Octet,
                options: options.clone(),
            },
            TftpPacket::Data { block: 7, payload: vec![9, 9, 9] },
            TftpPacket::Ack { block: 7 },
            TftpPacket::Error { code: 1, message: "file not found".to_string() },
            TftpPacket::Oack { options },
        ];
        for packet in packets {
            let bytes = packet.encode();
            assert_eq!(TftpPacket::decode(&bytes).unwrap(), packet);
        }
    }

    #[test]
    fn decode_rejects_opcode_outside_1_to_6() {
        let bytes = [0x00, 0x07];
        assert!(matches!(TftpPacket::decode(&bytes), Err(TftpError::BadOpcode(7))));
    }

    #[test]
    fn decode_rejects_truncated_opcode() {
        assert!(matches!(TftpPacket::decode(&[0x00]), Err(TftpError::TruncatedPacket)));
    }

    #[test]
    fn mode_parsing_is_case_insensitive() {
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(b"foo\0OCTET\0");
        let packet = TftpPacket::decode(&bytes).unwrap();
        assert!(matches!(packet, TftpPacket::Request { mode: TftpMode::Octet, .. }));
    }
}
