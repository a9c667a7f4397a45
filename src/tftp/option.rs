//! TFTP option negotiation (RFC 2347–2349): `blksize`, `timeout`,
//! `tsize` (spec.md §3/§4.4).
//!
//! There is no teacher module for this — `fp_core` has no TFTP surface —
//! so this is built fresh in the teacher's idiom: a small typed
//! container over an order-preserving list, mirroring the shape of
//! [`crate::dhcp::option::DhcpOptions`].

use std::collections::HashMap;

use crate::error::TftpError;

pub const DEFAULT_BLKSIZE: u16 = 512;

/// A single negotiated (or requested) TFTP option.
#[derive(Debug, Clone, PartialEq)]
pub enum TftpOption {
    BlockSize(u16),
    Timeout(u16),
    TransferSize(u64),
    /// An option name this codec does not special-case, preserved
    /// verbatim so it can still be echoed back or inspected.
    Raw { name: String, value: String },
}

impl TftpOption {
    pub fn name(&self) -> &str {
        match self {
            TftpOption::BlockSize(_) => "blksize",
            TftpOption::Timeout(_) => "timeout",
            TftpOption::TransferSize(_) => "tsize",
            TftpOption::Raw { name, .. } => name,
        }
    }

    fn value_string(&self) -> String {
        match self {
            TftpOption::BlockSize(v) => v.to_string(),
            TftpOption::Timeout(v) => v.to_string(),
            TftpOption::TransferSize(v) => v.to_string(),
            TftpOption::Raw { value, .. } => value.clone(),
        }
    }

    fn parse(name: &str, value: &str) -> Result<Self, TftpError> {
        let numeric = |v: &str| v.parse().map_err(|_| TftpError::BadOptionValue { name: name.to_string() });
        match name.to_ascii_lowercase().as_str() {
            "blksize" => Ok(TftpOption::BlockSize(numeric(value)?)),
            "timeout" => Ok(TftpOption::Timeout(numeric(value)?)),
            "tsize" => Ok(TftpOption::TransferSize(numeric(value)?.into())),
            _ => Ok(TftpOption::Raw { name: name.to_string(), value: value.to_string() }),
        }
    }
}

/// An order-preserving, lookup-by-name collection of TFTP options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TftpOptions {
    entries: Vec<TftpOption>,
    index: HashMap<String, usize>,
}

impl TftpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, option: TftpOption) -> &mut Self {
        self.index.insert(option.name().to_ascii_lowercase(), self.entries.len());
        self.entries.push(option);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TftpOption> {
        self.index.get(&name.to_ascii_lowercase()).map(|&i| &self.entries[i])
    }

    pub fn blksize(&self) -> Option<u16> {
        match self.get("blksize") {
            Some(TftpOption::BlockSize(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Option<u16> {
        match self.get("timeout") {
            Some(TftpOption::Timeout(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn tsize(&self) -> Option<u64> {
        match self.get("tsize") {
            Some(TftpOption::TransferSize(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TftpOption> {
        self.entries.iter()
    }

    /// Encodes `{name\0 value\0}*`, lowercasing names; values are always
    /// decimal ASCII (or the raw string for unknown options). No length
    /// byte is ever emitted, only NUL terminators.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for option in &self.entries {
            buf.extend_from_slice(option.name().to_ascii_lowercase().as_bytes());
            buf.push(0);
            buf.extend_from_slice(option.value_string().as_bytes());
            buf.push(0);
        }
        buf
    }

    /// Decodes a run of `{name\0 value\0}*` pairs from `buf`.
    pub fn decode(mut buf: &[u8]) -> Result<Self, TftpError> {
        let mut options = Self::new();
        while !buf.is_empty() {
            let (name, after_name) = split_at_nul(buf)?;
            let (value, after_value) = split_at_nul(after_name)?;
            buf = after_value;
            let name = std::str::from_utf8(name).map_err(|_| TftpError::MissingTerminator)?;
            let value = std::str::from_utf8(value).map_err(|_| TftpError::MissingTerminator)?;
            options.add(TftpOption::parse(name, value)?);
        }
        Ok(options)
    }
}

/// Splits `buf` at the first NUL, failing if none is present — unlike
/// [`crate::bytes::read_cstring`], a missing terminator here is a
/// protocol error rather than "the rest of the buffer".
fn split_at_nul(buf: &[u8]) -> Result<(&[u8], &[u8]), TftpError> {
    match buf.iter().position(|&b| b == 0) {
        Some(pos) => Ok((&buf[..pos], &buf[pos + 1..])),
        None => Err(TftpError::MissingTerminator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_uses_nul_terminators_only() {
        let mut opts = TftpOptions::new();
        opts.add(TftpOption::BlockSize(1468));
        assert_eq!(opts.encode(), b"blksize\x001468\x00".to_vec());
    }

    #[test]
    fn decode_parses_known_numeric_options() {
        let bytes = b"blksize\x001468\x00tsize\x003000\x00";
        let opts = TftpOptions::decode(bytes).unwrap();
        assert_eq!(opts.blksize(), Some(1468));
        assert_eq!(opts.tsize(), Some(3000));
    }

    #[test]
    fn decode_preserves_unknown_option_names() {
        let bytes = b"windowsize\x004\x00";
        let opts = TftpOptions::decode(bytes).unwrap();
        assert!(matches!(
            opts.get("windowsize"),
            Some(TftpOption::Raw { value, .. }) if value == "4"
        ));
    }

    #[test]
    fn decode_rejects_non_numeric_known_option() {
        let bytes = b"blksize\x00big\x00";
        assert!(matches!(
            TftpOptions::decode(bytes),
            Err(TftpError::BadOptionValue { name }) if name == "blksize"
        ));
    }

    #[test]
    fn decode_rejects_missing_terminator() {
        let bytes = b"blksize\x001468"; // no trailing NUL
        assert!(matches!(TftpOptions::decode(bytes), Err(TftpError::MissingTerminator)));
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let mut opts = TftpOptions::new();
        opts.add(TftpOption::BlockSize(1024));
        opts.add(TftpOption::Timeout(5));
        let decoded = TftpOptions::decode(&opts.encode()).unwrap();
        assert_eq!(decoded, opts);
    }
}
