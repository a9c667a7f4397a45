//! DHCPv4 packet codec: fixed BOOTP header + magic cookie + options
//! (spec.md §3/§4.3).
//!
//! Generalises `fp_core::core::message_type::DhcpV4Packet`, whose
//! `from_raw_bytes` this crate's decoder is grounded on — with the xid
//! and secs offsets corrected to RFC 2131 (`4..8` and `8..10`), per the
//! Open Question resolved in spec.md §9 (the teacher copied the
//! upstream Python source's two *disagreeing* `from_bytes`
//! implementations; `dhcp/dhcp4/dhcp.py` is the one followed here,
//! not the variant that reads `hops` out of `raw[4]`).

use std::net::Ipv4Addr;

use crate::bytes::{self, HardwareAddress};
use crate::dhcp::option::DhcpOptions;
use crate::error::DhcpError;

const FIXED_HEADER_LEN: usize = 240;
const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

/// BOOTP `op` field (RFC 951 §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOp {
    BootRequest = 1,
    BootReply = 2,
}

impl BootOp {
    fn from_u8(v: u8) -> Result<Self, DhcpError> {
        match v {
            1 => Ok(BootOp::BootRequest),
            2 => Ok(BootOp::BootReply),
            other => Err(DhcpError::BadOp(other)),
        }
    }
}

/// A decoded (or to-be-encoded) DHCPv4 packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DhcpV4Packet {
    pub op: BootOp,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: [u8; 2],
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: HardwareAddress,
    pub sname: String,
    pub file: String,
    pub options: DhcpOptions,
}

impl DhcpV4Packet {
    /// An all-zero `BootRequest` packet with no options, used as a base
    /// for embedders building a reply by hand or for tests.
    pub fn empty() -> Self {
        Self {
            op: BootOp::BootRequest,
            htype: 1,
            hlen: 0,
            hops: 0,
            xid: 0,
            secs: 0,
            flags: [0, 0],
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: HardwareAddress::empty(),
            sname: String::new(),
            file: String::new(),
            options: DhcpOptions::new(),
        }
    }

    /// Encodes the packet to its wire representation: exactly
    /// `240 + len(options TLV stream) + 1` bytes (spec.md §8).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FIXED_HEADER_LEN + 16);
        buf.push(self.op as u8);
        buf.push(self.htype);
        buf.push(self.hlen);
        buf.push(self.hops);
        buf.extend_from_slice(&self.xid.to_be_bytes());
        buf.extend_from_slice(&self.secs.to_be_bytes());
        buf.extend_from_slice(&self.flags);
        buf.extend_from_slice(&self.ciaddr.octets());
        buf.extend_from_slice(&self.yiaddr.octets());
        buf.extend_from_slice(&self.siaddr.octets());
        buf.extend_from_slice(&self.giaddr.octets());
        buf.extend_from_slice(&self.chaddr.to_chaddr());
        buf.extend_from_slice(&bytes::pad_string(&self.sname, 64));
        buf.extend_from_slice(&bytes::pad_string(&self.file, 128));
        buf.extend_from_slice(&MAGIC_COOKIE);
        buf.extend_from_slice(&self.options.encode());
        buf
    }

    /// Decodes a DHCPv4 packet, validating the fixed header and magic
    /// cookie per spec.md §4.3.
    pub fn decode(raw: &[u8]) -> Result<Self, DhcpError> {
        if raw.len() < FIXED_HEADER_LEN {
            return Err(DhcpError::TruncatedPacket { len: raw.len() });
        }
        if raw[236..240] != MAGIC_COOKIE {
            return Err(DhcpError::BadMagicCookie);
        }

        let op = BootOp::from_u8(raw[0])?;
        let htype = raw[1];
        bytes::hardware_type_name(htype)?;
        let hlen = raw[2];
        if hlen == 0 || hlen > 16 {
            return Err(DhcpError::BadHlen(hlen));
        }
        let hops = raw[3];
        let xid = u32::from_be_bytes(raw[4..8].try_into().unwrap());
        let secs = u16::from_be_bytes(raw[8..10].try_into().unwrap());
        let flags = [raw[10], raw[11]];
        let ciaddr = ipv4_at(raw, 12);
        let yiaddr = ipv4_at(raw, 16);
        let siaddr = ipv4_at(raw, 20);
        let giaddr = ipv4_at(raw, 24);
        let chaddr_bytes: [u8; 16] = raw[28..44].try_into().unwrap();
        let chaddr = HardwareAddress::from_chaddr(&chaddr_bytes, hlen)?;
        let sname = bytes::trim_padded_string(&raw[44..108]);
        let file = bytes::trim_padded_string(&raw[108..236]);
        let options = DhcpOptions::decode(&raw[240..])?;

        Ok(Self {
            op,
            htype,
            hlen,
            hops,
            xid,
            secs,
            flags,
            ciaddr,
            yiaddr,
            siaddr,
            giaddr,
            chaddr,
            sname,
            file,
            options,
        })
    }
}

fn ipv4_at(raw: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dhcp::option::{DhcpMessageType, DhcpOption};

    fn discover_packet() -> DhcpV4Packet {
        let mut packet = DhcpV4Packet::empty();
        packet.op = BootOp::BootRequest;
        packet.htype = 1;
        packet.hlen = 6;
        packet.xid = 0xDEADBEEF;
        packet.chaddr = HardwareAddress::new(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55], 6);
        packet.options.add(DhcpOption::DhcpMessageType(DhcpMessageType::Discover));
        packet
            .options
            .add(DhcpOption::ParameterRequestList(vec![1, 3, 6, 51]));
        packet
    }

    #[test]
    fn discover_round_trip_scenario() {
        let packet = discover_packet();
        let bytes = packet.encode();
        // 240 fixed + (53,1,1)=3 + (55,4,1,3,6,51)=6 + end(1) = 250
        assert_eq!(bytes.len(), 250);
        assert_eq!(&bytes[236..240], &MAGIC_COOKIE);
        assert_eq!(*bytes.last().unwrap(), 0xFF);

        let decoded = DhcpV4Packet::decode(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn encode_is_deterministic() {
        let packet = discover_packet();
        assert_eq!(packet.encode(), packet.encode());
    }

    #[test]
    fn decode_rejects_missing_magic_cookie() {
        let mut bytes = discover_packet().encode();
        bytes[236] = 0;
        assert!(matches!(DhcpV4Packet::decode(&bytes), Err(DhcpError::BadMagicCookie)));
    }

    #[test]
    fn decode_rejects_short_packet() {
        let bytes = vec![0u8; 100];
        assert!(matches!(
            DhcpV4Packet::decode(&bytes),
            Err(DhcpError::TruncatedPacket { len: 100 })
        ));
    }

    #[test]
    fn decode_rejects_hlen_out_of_range() {
        let mut bytes = discover_packet().encode();
        bytes[2] = 0;
        assert!(matches!(DhcpV4Packet::decode(&bytes), Err(DhcpError::BadHlen(0))));
    }

    #[test]
    fn decode_trims_trailing_nuls_from_sname_and_file() {
        let mut packet = discover_packet();
        packet.sname = "boot-server".to_string();
        packet.file = "pxelinux.0".to_string();
        let bytes = packet.encode();
        let decoded = DhcpV4Packet::decode(&bytes).unwrap();
        assert_eq!(decoded.sname, "boot-server");
        assert_eq!(decoded.file, "pxelinux.0");
    }

    #[test]
    fn reads_xid_from_offset_4_and_secs_from_offset_8_per_rfc_2131() {
        let packet = discover_packet();
        let bytes = packet.encode();
        assert_eq!(u32::from_be_bytes(bytes[4..8].try_into().unwrap()), 0xDEADBEEF);
        let decoded = DhcpV4Packet::decode(&bytes).unwrap();
        assert_eq!(decoded.xid, 0xDEADBEEF);
    }
}
