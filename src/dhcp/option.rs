//! DHCPv4 option codec (spec.md §3/§4.2).
//!
//! Generalises `fp_core::core::message_type::DhcpOption`/`DhcpOptions`
//! from a single `Vec<u8>` payload per opcode to a typed payload per
//! opcode, per the table in spec.md §3, while keeping the teacher's
//! tagged-union-plus-index shape (design note in spec.md §9).

use std::collections::HashMap;
use std::net::Ipv4Addr;
use uuid::Uuid;

use crate::error::DhcpError;

/// DHCP message type (option 53), RFC 2132 §9.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpMessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl DhcpMessageType {
    fn from_u8(v: u8) -> Result<Self, DhcpError> {
        use DhcpMessageType::*;
        match v {
            1 => Ok(Discover),
            2 => Ok(Offer),
            3 => Ok(Request),
            4 => Ok(Decline),
            5 => Ok(Ack),
            6 => Ok(Nak),
            7 => Ok(Release),
            8 => Ok(Inform),
            _ => Err(DhcpError::BadEnumValue { table: "DHCP message type", value: v }),
        }
    }
}

/// A single DHCPv4 option, tagged by opcode. Opcodes not listed in
/// spec.md §3's table round-trip as [`DhcpOption::Raw`].
#[derive(Debug, Clone, PartialEq)]
pub enum DhcpOption {
    SubnetMask(Ipv4Addr),
    Router(Ipv4Addr),
    DomainNameServer(Ipv4Addr),
    RequestedIpAddress(Ipv4Addr),
    IpAddressLeaseTime(u32),
    DhcpMessageType(DhcpMessageType),
    ServerIdentifier(Ipv4Addr),
    ParameterRequestList(Vec<u8>),
    MaximumDhcpMessageSize(u16),
    ClassIdentifier(Vec<u8>),
    ClientIdentifier { htype: u8, hwaddr: Vec<u8> },
    TftpServerName(Vec<u8>),
    BootfileName(Vec<u8>),
    UserClassInformation(Vec<u8>),
    ClientSystemArchitecture(Vec<u16>),
    ClientNetworkInterface { major: u8, minor: u8 },
    ClientMachineIdentifier(Uuid),
    TftpServerIpAddress(Ipv4Addr),
    EtherBoot(Vec<u8>),
    /// Any opcode without a typed payload above, including Pad (0) when
    /// it appears with a payload — Pad itself has none and is handled
    /// separately by the container.
    Raw { opcode: u8, bytes: Vec<u8> },
}

impl DhcpOption {
    /// The wire opcode for this option.
    pub fn opcode(&self) -> u8 {
        use DhcpOption::*;
        match self {
            SubnetMask(_) => 1,
            Router(_) => 3,
            DomainNameServer(_) => 6,
            RequestedIpAddress(_) => 50,
            IpAddressLeaseTime(_) => 51,
            DhcpMessageType(_) => 53,
            ServerIdentifier(_) => 54,
            ParameterRequestList(_) => 55,
            MaximumDhcpMessageSize(_) => 57,
            ClassIdentifier(_) => 60,
            ClientIdentifier { .. } => 61,
            TftpServerName(_) => 66,
            BootfileName(_) => 67,
            UserClassInformation(_) => 77,
            ClientSystemArchitecture(_) => 93,
            ClientNetworkInterface { .. } => 94,
            ClientMachineIdentifier(_) => 97,
            TftpServerIpAddress(_) => 128,
            EtherBoot(_) => 175,
            Raw { opcode, .. } => *opcode,
        }
    }

    fn encode_payload(&self) -> Vec<u8> {
        use DhcpOption::*;
        match self {
            SubnetMask(ip) | Router(ip) | DomainNameServer(ip) | RequestedIpAddress(ip)
            | ServerIdentifier(ip) | TftpServerIpAddress(ip) => ip.octets().to_vec(),
            IpAddressLeaseTime(secs) => secs.to_be_bytes().to_vec(),
            DhcpMessageType(mt) => vec![*mt as u8],
            ParameterRequestList(opcodes) => opcodes.clone(),
            MaximumDhcpMessageSize(size) => size.to_be_bytes().to_vec(),
            ClassIdentifier(bytes) | TftpServerName(bytes) | BootfileName(bytes)
            | UserClassInformation(bytes) | EtherBoot(bytes) => bytes.clone(),
            ClientIdentifier { htype, hwaddr } => {
                let mut buf = vec![*htype];
                buf.extend_from_slice(hwaddr);
                buf
            }
            ClientSystemArchitecture(arches) => {
                arches.iter().flat_map(|a| a.to_be_bytes()).collect()
            }
            ClientNetworkInterface { major, minor } => vec![1, *major, *minor],
            ClientMachineIdentifier(uuid) => {
                let mut buf = vec![0u8];
                buf.extend_from_slice(uuid.as_bytes());
                buf
            }
            Raw { bytes, .. } => bytes.clone(),
        }
    }

    fn decode(opcode: u8, payload: &[u8]) -> Result<Self, DhcpError> {
        use DhcpOption::*;
        let ipv4 = |bytes: &[u8]| -> Result<Ipv4Addr, DhcpError> {
            if bytes.len() != 4 {
                return Err(DhcpError::BadOptionLength { opcode, got: bytes.len(), expected: 4 });
            }
            Ok(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
        };
        Ok(match opcode {
            1 => SubnetMask(ipv4(payload)?),
            3 => Router(ipv4(payload)?),
            6 => DomainNameServer(ipv4(payload)?),
            50 => RequestedIpAddress(ipv4(payload)?),
            51 => {
                let bytes: [u8; 4] = payload
                    .try_into()
                    .map_err(|_| DhcpError::BadOptionLength { opcode, got: payload.len(), expected: 4 })?;
                IpAddressLeaseTime(u32::from_be_bytes(bytes))
            }
            53 => {
                if payload.len() != 1 {
                    return Err(DhcpError::BadOptionLength { opcode, got: payload.len(), expected: 1 });
                }
                DhcpMessageType(self::DhcpMessageType::from_u8(payload[0])?)
            }
            54 => ServerIdentifier(ipv4(payload)?),
            55 => ParameterRequestList(payload.to_vec()),
            57 => {
                let bytes: [u8; 2] = payload
                    .try_into()
                    .map_err(|_| DhcpError::BadOptionLength { opcode, got: payload.len(), expected: 2 })?;
                MaximumDhcpMessageSize(u16::from_be_bytes(bytes))
            }
            60 => ClassIdentifier(payload.to_vec()),
            61 => {
                if payload.is_empty() {
                    return Err(DhcpError::BadOptionLength { opcode, got: 0, expected: 1 });
                }
                ClientIdentifier { htype: payload[0], hwaddr: payload[1..].to_vec() }
            }
            66 => TftpServerName(payload.to_vec()),
            67 => BootfileName(payload.to_vec()),
            77 => UserClassInformation(payload.to_vec()),
            93 => {
                if payload.len() % 2 != 0 {
                    return Err(DhcpError::BadOptionLength {
                        opcode,
                        got: payload.len(),
                        expected: payload.len() + 1,
                    });
                }
                ClientSystemArchitecture(
                    payload.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect(),
                )
            }
            94 => {
                if payload.len() != 3 {
                    return Err(DhcpError::BadOptionLength { opcode, got: payload.len(), expected: 3 });
                }
                ClientNetworkInterface { major: payload[1], minor: payload[2] }
            }
            97 => {
                if payload.len() != 17 {
                    return Err(DhcpError::BadOptionLength { opcode, got: payload.len(), expected: 17 });
                }
                let bytes: [u8; 16] = payload[1..].try_into().unwrap();
                ClientMachineIdentifier(Uuid::from_bytes(bytes))
            }
            128 => TftpServerIpAddress(ipv4(payload)?),
            175 => EtherBoot(payload.to_vec()),
            _ => Raw { opcode, bytes: payload.to_vec() },
        })
    }
}

/// An order-preserving, O(1)-lookup-by-opcode collection of DHCP options
/// (spec.md §3: "duplicate opcodes: last wins on lookup, all preserved on
/// iteration").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DhcpOptions {
    entries: Vec<DhcpOption>,
    index: HashMap<u8, usize>,
}

impl DhcpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an option, updating the lookup index so a later duplicate
    /// opcode wins on `get`/`ip_of` while both copies remain in
    /// `iter()`.
    pub fn add(&mut self, option: DhcpOption) -> &mut Self {
        let opcode = option.opcode();
        self.index.insert(opcode, self.entries.len());
        self.entries.push(option);
        self
    }

    pub fn contains(&self, opcode: u8) -> bool {
        self.index.contains_key(&opcode)
    }

    pub fn get(&self, opcode: u8) -> Option<&DhcpOption> {
        self.index.get(&opcode).map(|&i| &self.entries[i])
    }

    pub fn get_or<'a>(&'a self, opcode: u8, default: &'a DhcpOption) -> &'a DhcpOption {
        self.get(opcode).unwrap_or(default)
    }

    /// Returns the IPv4 payload of `opcode` if it is one of the
    /// single-IPv4 option variants.
    pub fn ip_of(&self, opcode: u8) -> Option<Ipv4Addr> {
        use DhcpOption::*;
        match self.get(opcode)? {
            SubnetMask(ip) | Router(ip) | DomainNameServer(ip) | RequestedIpAddress(ip)
            | ServerIdentifier(ip) | TftpServerIpAddress(ip) => Some(*ip),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DhcpOption> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenates `opcode, length, payload` triples for every option in
    /// insertion order, then appends a single End (0xFF) terminator.
    /// Callers must not add an explicit End option; none of the
    /// constructors above can produce one.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for option in &self.entries {
            let payload = option.encode_payload();
            buf.push(option.opcode());
            buf.push(payload.len() as u8);
            buf.extend_from_slice(&payload);
        }
        buf.push(0xFF);
        buf
    }

    /// Reads TLVs until a `0xFF` (End) opcode is seen. Opcode `0` (Pad)
    /// is consumed as a single byte with no length and is not added to
    /// the container (it carries no information).
    pub fn decode(bytes: &[u8]) -> Result<Self, DhcpError> {
        let mut options = Self::new();
        let mut cursor = 0usize;
        while cursor < bytes.len() {
            let opcode = bytes[cursor];
            cursor += 1;
            if opcode == 0 {
                continue;
            }
            if opcode == 0xFF {
                break;
            }
            let len = *bytes.get(cursor).ok_or(DhcpError::TruncatedOption { opcode })? as usize;
            cursor += 1;
            let payload = bytes
                .get(cursor..cursor + len)
                .ok_or(DhcpError::TruncatedOption { opcode })?;
            cursor += len;
            options.add(DhcpOption::decode(opcode, payload)?);
        }
        Ok(options)
    }
}
