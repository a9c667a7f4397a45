//! Seekable byte storage abstraction for TFTP transfers (spec.md §9
//! Design Notes).
//!
//! Grounded on `fp_core`'s `Input`/`Output` async-trait pattern
//! (`src/core/state_switcher.rs`): a small async trait embedders
//! implement once per storage backend, called from the engine without
//! it knowing whether the bytes live in memory, on disk, or somewhere
//! else.

use std::io::SeekFrom;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// A seekable byte store a TFTP transfer reads from or writes into.
/// Block-sized chunking and sequencing live in [`crate::tftp::engine`];
/// implementors only need to honor `seek`/`read`/`write`/`size`.
#[async_trait]
pub trait SeekableBuffer: Send {
    async fn read(&mut self, len: usize) -> std::io::Result<Vec<u8>>;
    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    async fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64>;
    async fn size(&mut self) -> std::io::Result<u64>;
}

/// An in-memory [`SeekableBuffer`], used by tests and by embedders that
/// hold small generated payloads (e.g. boot menus) entirely in RAM.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl MemoryBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, cursor: 0 }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[async_trait]
impl SeekableBuffer for MemoryBuffer {
    async fn read(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        let end = (self.cursor + len).min(self.data.len());
        let chunk = self.data[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(chunk)
    }

    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let end = self.cursor + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
        Ok(())
    }

    async fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_cursor = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(n) => self.data.len() as i64 + n,
            SeekFrom::Current(n) => self.cursor as i64 + n,
        };
        if new_cursor < 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "negative seek"));
        }
        self.cursor = new_cursor as usize;
        Ok(self.cursor as u64)
    }

    async fn size(&mut self) -> std::io::Result<u64> {
        Ok(self.data.len() as u64)
    }
}

/// A `tokio::fs::File`-backed [`SeekableBuffer`], used by the demo
/// binary to serve real boot files from disk.
pub struct FileBuffer {
    file: tokio::fs::File,
}

impl FileBuffer {
    pub fn new(file: tokio::fs::File) -> Self {
        Self { file }
    }
}

#[async_trait]
impl SeekableBuffer for FileBuffer {
    async fn read(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = self.file.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes).await
    }

    async fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos).await
    }

    async fn size(&mut self) -> std::io::Result<u64> {
        let metadata = self.file.metadata().await?;
        Ok(metadata.len())
    }
}
