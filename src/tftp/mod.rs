//! TFTP wire codec (C4/C5), transaction engine (C6), and pluggable
//! server (C7 TFTP half).

pub mod buffer;
pub mod engine;
pub mod option;
pub mod packet;
pub mod server;

pub use buffer::{FileBuffer, MemoryBuffer, SeekableBuffer};
pub use engine::{TftpReader, TftpRequest, TftpWriter};
pub use option::{TftpOption, TftpOptions};
pub use packet::{RequestKind, TftpMode, TftpPacket};
pub use server::{TftpCompletion, TftpReadProvider, TftpServer, TftpWriteProvider};
