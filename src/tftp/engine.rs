//! Per-peer TFTP transaction state machines (spec.md §4.6): Reader
//! drives an RRQ, Writer drives a WRQ. Both own a [`SeekableBuffer`] and
//! are the sole mutator of its cursor.
//!
//! No teacher module covers this; the state-machine-over-an-enum shape
//! mirrors `fp_core::core::state_switcher::StateSwitcher`'s approach of
//! holding one explicit state value and stepping it on each input.

use std::net::SocketAddr;

use crate::error::TftpError;
use crate::tftp::buffer::SeekableBuffer;
use crate::tftp::option::{TftpOption, TftpOptions, DEFAULT_BLKSIZE};
use crate::tftp::packet::{RequestKind, TftpMode, TftpPacket};

/// The request that created a session, retained for logging and for the
/// provider/completion hooks (spec.md §6).
#[derive(Debug, Clone)]
pub struct TftpRequest {
    pub peer: SocketAddr,
    pub kind: RequestKind,
    pub filename: Vec<u8>,
    pub mode: TftpMode,
    pub options: TftpOptions,
}

fn negotiate_blksize(requested: &TftpOptions, cap: u16) -> u16 {
    requested.blksize().unwrap_or(DEFAULT_BLKSIZE).min(cap)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    OackSent,
    Sending(u16),
    Closed,
}

/// Drives an RRQ transfer: reads `buffer` forward in `blksize` chunks,
/// emitting `Data` and consuming `Ack`.
pub struct TftpReader {
    buffer: Box<dyn SeekableBuffer>,
    blksize: u16,
    state: ReaderState,
    final_sent: bool,
}

impl TftpReader {
    /// Opens a transfer over `buffer`, returning the reader and its first
    /// response: an `Oack` when the request carried options, otherwise
    /// `Data(block=1, ..)` directly.
    pub async fn start(
        mut buffer: Box<dyn SeekableBuffer>,
        requested: &TftpOptions,
        blksize_cap: u16,
    ) -> Result<(Self, TftpPacket), TftpError> {
        let blksize = negotiate_blksize(requested, blksize_cap);

        if requested.is_empty() {
            let payload = buffer
                .read(blksize as usize)
                .await
                .map_err(|e| TftpError::Internal(e.to_string()))?;
            let final_sent = payload.len() < blksize as usize;
            let reader = Self { buffer, blksize, state: ReaderState::Sending(1), final_sent };
            return Ok((reader, TftpPacket::Data { block: 1, payload }));
        }

        let size = buffer.size().await.map_err(|e| TftpError::Internal(e.to_string()))?;
        let mut accepted = TftpOptions::new();
        accepted.add(TftpOption::BlockSize(blksize));
        if requested.timeout().is_some() {
            accepted.add(TftpOption::Timeout(requested.timeout().unwrap()));
        }
        if requested.tsize().is_some() {
            accepted.add(TftpOption::TransferSize(size));
        }
        let reader = Self { buffer, blksize, state: ReaderState::OackSent, final_sent: false };
        Ok((reader, TftpPacket::Oack { options: accepted }))
    }

    pub fn is_closed(&self) -> bool {
        self.state == ReaderState::Closed
    }

    /// Advances the machine on an incoming `Ack(block)`, returning the
    /// next `Data` packet or `None` once the transfer has closed.
    pub async fn on_ack(&mut self, block: u16) -> Result<Option<TftpPacket>, TftpError> {
        match self.state {
            ReaderState::OackSent => {
                if block != 0 {
                    return Err(TftpError::BadBlock { got: block, want: 0 });
                }
                self.send_next(1).await
            }
            ReaderState::Sending(current) => {
                if block != current {
                    return Err(TftpError::BadBlock { got: block, want: current });
                }
                if self.final_sent {
                    self.state = ReaderState::Closed;
                    return Ok(None);
                }
                self.send_next(current.wrapping_add(1)).await
            }
            ReaderState::Closed => Err(TftpError::UnexpectedOpcode),
        }
    }

    async fn send_next(&mut self, block: u16) -> Result<Option<TftpPacket>, TftpError> {
        let payload = self
            .buffer
            .read(self.blksize as usize)
            .await
            .map_err(|e| TftpError::Internal(e.to_string()))?;
        self.final_sent = payload.len() < self.blksize as usize;
        self.state = ReaderState::Sending(block);
        Ok(Some(TftpPacket::Data { block, payload }))
    }

    pub fn into_buffer(self) -> Box<dyn SeekableBuffer> {
        self.buffer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    OackSent,
    Receiving(u16),
    Closed,
}

/// Drives a WRQ transfer: appends incoming `Data` payloads to `buffer`
/// in order and acknowledges each block.
pub struct TftpWriter {
    buffer: Box<dyn SeekableBuffer>,
    blksize: u16,
    state: WriterState,
}

impl TftpWriter {
    /// Opens a transfer into `buffer`, returning the writer and its
    /// first response: an `Oack` when the request carried options,
    /// otherwise `Ack(0)` directly.
    pub async fn start(
        buffer: Box<dyn SeekableBuffer>,
        requested: &TftpOptions,
        blksize_cap: u16,
    ) -> (Self, TftpPacket) {
        let blksize = negotiate_blksize(requested, blksize_cap);
        if requested.is_empty() {
            let writer = Self { buffer, blksize, state: WriterState::Receiving(0) };
            (writer, TftpPacket::Ack { block: 0 })
        } else {
            let mut accepted = TftpOptions::new();
            accepted.add(TftpOption::BlockSize(blksize));
            if let Some(t) = requested.timeout() {
                accepted.add(TftpOption::Timeout(t));
            }
            if let Some(s) = requested.tsize() {
                accepted.add(TftpOption::TransferSize(s));
            }
            let writer = Self { buffer, blksize, state: WriterState::OackSent };
            (writer, TftpPacket::Oack { options: accepted })
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    /// Advances the machine on an incoming `Data(block, payload)`,
    /// returning the `Ack` to send back.
    pub async fn on_data(&mut self, block: u16, payload: &[u8]) -> Result<TftpPacket, TftpError> {
        if payload.len() > self.blksize as usize {
            return Err(TftpError::IllegalOperation("data payload exceeds negotiated blksize".to_string()));
        }
        let expected = match self.state {
            WriterState::OackSent => 1,
            WriterState::Receiving(current) => current.wrapping_add(1),
            WriterState::Closed => return Err(TftpError::UnexpectedOpcode),
        };
        if block != expected {
            return Err(TftpError::BadBlock { got: block, want: expected });
        }

        self.buffer.write(payload).await.map_err(|e| TftpError::Internal(e.to_string()))?;

        self.state = if payload.len() < self.blksize as usize {
            WriterState::Closed
        } else {
            WriterState::Receiving(block)
        };
        Ok(TftpPacket::Ack { block })
    }

    pub fn into_buffer(self) -> Box<dyn SeekableBuffer> {
        self.buffer
    }
}
