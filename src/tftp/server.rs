//! Multiplexing TFTP server (spec.md §4.7/§4.8): one socket, many
//! concurrent per-peer transactions tracked in a session map.
//!
//! Grounded on `fp_core::netio::{netlistener, netoutput}` for the
//! bind/recv/send shape and on `fp_core::main`'s periodic
//! `RuntimeStorage::sync` task for the idle-sweeper background loop.
//! Handler panics are isolated the way `dhcp::server` isolates decider
//! panics (spec.md §4.7/§7); since the work here spans `.await` points
//! into provider/engine code, `catch_unwind` alone can't wrap it, so the
//! per-datagram work runs in a spawned task and a panicking task is
//! detected via `JoinError::is_panic()` instead.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use crate::config::TftpServerConfig;
use crate::error::{panic_message, TftpError};
use crate::net::bind_udp;
use crate::tftp::buffer::SeekableBuffer;
use crate::tftp::engine::{TftpReader, TftpRequest, TftpWriter};
use crate::tftp::packet::{RequestKind, TftpPacket};

const RECV_BUFFER_LEN: usize = 1 << 16;

/// Supplies the byte buffer to read from for an RRQ. Returning `None`
/// maps to `Error(FileNotFound)`.
#[async_trait]
pub trait TftpReadProvider: Send + Sync {
    async fn open_read(&self, request: &TftpRequest) -> Option<Box<dyn SeekableBuffer>>;
}

/// Supplies the byte buffer to write into for a WRQ. Returning `None`
/// maps to `Error(FileAlreadyExists)`.
#[async_trait]
pub trait TftpWriteProvider: Send + Sync {
    async fn open_write(&self, request: &TftpRequest) -> Option<Box<dyn SeekableBuffer>>;
}

/// Invoked once a transfer reaches a terminal state, with the buffer
/// rewound to offset 0.
#[async_trait]
pub trait TftpCompletion: Send + Sync {
    async fn on_complete(&self, request: &TftpRequest, buffer: Box<dyn SeekableBuffer>);
}

enum Handler {
    Read(TftpReader),
    Write(TftpWriter),
}

struct Session {
    request: TftpRequest,
    handler: Handler,
    last_activity: Instant,
}

const ERR_NOT_DEFINED: u16 = 0;
const ERR_FILE_NOT_FOUND: u16 = 1;
const ERR_ILLEGAL_OPERATION: u16 = 4;
const ERR_FILE_ALREADY_EXISTS: u16 = 6;

fn error_packet(code: u16, message: &str) -> TftpPacket {
    TftpPacket::Error { code, message: message.to_string() }
}

/// A single-socket TFTP server multiplexing many peers, each identified
/// by its source `SocketAddr` (spec.md's "concurrency note": this core
/// does not migrate sessions to a fresh ephemeral port per RFC 1350's
/// strict TID behaviour).
pub struct TftpServer<P> {
    socket: UdpSocket,
    providers: Arc<P>,
    sessions: Mutex<HashMap<SocketAddr, Session>>,
    config: TftpServerConfig,
}

impl<P> TftpServer<P>
where
    P: TftpReadProvider + TftpWriteProvider + TftpCompletion + Send + Sync + 'static,
{
    pub async fn bind(config: TftpServerConfig, providers: P) -> std::io::Result<Arc<Self>> {
        let socket = bind_udp(&config.bind_addr, false, config.interface.as_deref())?;
        log::info!("TFTP server bound to {}", config.bind_addr);
        Ok(Arc::new(Self {
            socket,
            providers: Arc::new(providers),
            sessions: Mutex::new(HashMap::new()),
            config,
        }))
    }

    /// Runs the receive loop forever. Callers typically also spawn
    /// [`Self::run_idle_sweeper`] alongside this.
    pub async fn run(self: &Arc<Self>) -> std::io::Result<()> {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            self.handle_datagram(&buf[..len], peer).await;
        }
    }

    /// Background task reclaiming sessions idle past `config.idle_timeout`
    /// (spec.md §4.8).
    pub async fn run_idle_sweeper(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        loop {
            interval.tick().await;
            let mut sessions = self.sessions.lock().await;
            sessions.retain(|peer, session| {
                let elapsed = session.last_activity.elapsed();
                let keep = elapsed < self.config.idle_timeout;
                if !keep {
                    log::debug!("sweeping idle TFTP session for {peer} after {elapsed:?}");
                }
                keep
            });
        }
    }

    async fn handle_datagram(self: &Arc<Self>, bytes: &[u8], peer: SocketAddr) {
        let packet = match TftpPacket::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                log::debug!("dropping malformed TFTP datagram from {peer}: {e}");
                return;
            }
        };

        let server = Arc::clone(self);
        let outcome = tokio::spawn(async move { server.process_packet(peer, packet).await }).await;

        match outcome {
            Ok(Ok(Some(reply))) => self.send(&reply, peer).await,
            Ok(Ok(None)) => {}
            Ok(Err(reply)) => self.send(&reply, peer).await,
            Err(join_error) => {
                if join_error.is_panic() {
                    let payload = join_error.into_panic();
                    log::error!("TFTP handler panicked for {peer}: {}", panic_message(&*payload));
                } else {
                    log::error!("TFTP handler task for {peer} did not complete: {join_error}");
                }
                self.send(&error_packet(ERR_NOT_DEFINED, "internal server error"), peer).await;
            }
        }
    }

    /// Runs the session-map lookup and dispatch under the panic boundary
    /// set up in [`Self::handle_datagram`].
    async fn process_packet(&self, peer: SocketAddr, packet: TftpPacket) -> Result<Option<TftpPacket>, TftpPacket> {
        let mut sessions = self.sessions.lock().await;
        let has_session = sessions.contains_key(&peer);
        if has_session {
            self.step_existing(&mut sessions, peer, packet).await
        } else {
            self.start_session(&mut sessions, peer, packet).await
        }
    }

    async fn start_session(
        &self,
        sessions: &mut HashMap<SocketAddr, Session>,
        peer: SocketAddr,
        packet: TftpPacket,
    ) -> Result<Option<TftpPacket>, TftpPacket> {
        let TftpPacket::Request { kind, filename, mode, options } = packet else {
            return Err(error_packet(ERR_ILLEGAL_OPERATION, "no active transfer for this peer"));
        };
        let request = TftpRequest { peer, kind, filename, mode, options };

        match kind {
            RequestKind::Read => {
                let Some(buffer) = self.providers.open_read(&request).await else {
                    log::debug!("peer={peer} {}", TftpError::ProviderMiss);
                    return Err(error_packet(ERR_FILE_NOT_FOUND, "file not found"));
                };
                let blksize_cap = self.config.max_blksize;
                match TftpReader::start(buffer, &request.options, blksize_cap).await {
                    Ok((reader, reply)) => {
                        log::info!("peer={peer} op=RRQ file={:?}", String::from_utf8_lossy(&request.filename));
                        let closed = reader.is_closed();
                        sessions.insert(
                            peer,
                            Session { request: request.clone(), handler: Handler::Read(reader), last_activity: Instant::now() },
                        );
                        if closed {
                            self.finish_session(sessions, peer).await;
                        }
                        Ok(Some(reply))
                    }
                    Err(e) => Err(self.error_for(&e)),
                }
            }
            RequestKind::Write => {
                let Some(buffer) = self.providers.open_write(&request).await else {
                    log::debug!("peer={peer} {}", TftpError::ProviderMiss);
                    return Err(error_packet(ERR_FILE_ALREADY_EXISTS, "file already exists"));
                };
                let blksize_cap = self.config.max_blksize;
                let (writer, reply) = TftpWriter::start(buffer, &request.options, blksize_cap).await;
                log::info!("peer={peer} op=WRQ file={:?}", String::from_utf8_lossy(&request.filename));
                sessions.insert(peer, Session { request, handler: Handler::Write(writer), last_activity: Instant::now() });
                Ok(Some(reply))
            }
        }
    }

    async fn step_existing(
        &self,
        sessions: &mut HashMap<SocketAddr, Session>,
        peer: SocketAddr,
        packet: TftpPacket,
    ) -> Result<Option<TftpPacket>, TftpPacket> {
        if matches!(packet, TftpPacket::Request { .. }) {
            return Err(error_packet(ERR_ILLEGAL_OPERATION, "transfer already in progress"));
        }

        let session = sessions.get_mut(&peer).expect("checked contains_key above");
        session.last_activity = Instant::now();

        let step_result = match (&mut session.handler, &packet) {
            (Handler::Read(reader), TftpPacket::Ack { block }) => reader.on_ack(*block).await,
            (Handler::Write(writer), TftpPacket::Data { block, payload }) => {
                writer.on_data(*block, payload).await.map(Some)
            }
            (_, TftpPacket::Error { code, message }) => {
                log::debug!("peer {peer} reported error {code}: {message}");
                Err(TftpError::PeerError { code: *code, message: message.clone() })
            }
            _ => Err(TftpError::UnexpectedOpcode),
        };

        match step_result {
            Ok(reply) => {
                let closed = match &session.handler {
                    Handler::Read(reader) => reader.is_closed(),
                    Handler::Write(writer) => writer.is_closed(),
                };
                if closed {
                    self.finish_session(sessions, peer).await;
                }
                Ok(reply)
            }
            Err(TftpError::PeerError { .. }) => {
                sessions.remove(&peer);
                Ok(None)
            }
            Err(e) => {
                sessions.remove(&peer);
                Err(self.error_for(&e))
            }
        }
    }

    async fn finish_session(&self, sessions: &mut HashMap<SocketAddr, Session>, peer: SocketAddr) {
        let Some(session) = sessions.remove(&peer) else { return };
        let mut buffer = match session.handler {
            Handler::Read(reader) => reader.into_buffer(),
            Handler::Write(writer) => writer.into_buffer(),
        };
        if let Err(e) = buffer.seek(std::io::SeekFrom::Start(0)).await {
            log::error!("failed to rewind completed TFTP buffer for {peer}: {e}");
            return;
        }
        self.providers.on_complete(&session.request, buffer).await;
    }

    fn error_for(&self, e: &TftpError) -> TftpPacket {
        match e.to_wire() {
            Some((code, message)) => error_packet(code, &message),
            None => error_packet(ERR_NOT_DEFINED, "internal server error"),
        }
    }

    async fn send(&self, packet: &TftpPacket, peer: SocketAddr) {
        let bytes = packet.encode();
        if let Err(e) = self.socket.send_to(&bytes, peer).await {
            log::error!("failed to send TFTP reply to {peer}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tftp::buffer::MemoryBuffer;
    use crate::tftp::option::{TftpOption, TftpOptions};
    use std::sync::Mutex as StdMutex;

    struct FixedFs {
        files: HashMap<Vec<u8>, Vec<u8>>,
        writes_allowed: bool,
        completed: StdMutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl TftpReadProvider for FixedFs {
        async fn open_read(&self, request: &TftpRequest) -> Option<Box<dyn SeekableBuffer>> {
            self.files.get(&request.filename).map(|data| Box::new(MemoryBuffer::new(data.clone())) as Box<dyn SeekableBuffer>)
        }
    }

    #[async_trait]
    impl TftpWriteProvider for FixedFs {
        async fn open_write(&self, _request: &TftpRequest) -> Option<Box<dyn SeekableBuffer>> {
            if self.writes_allowed {
                Some(Box::new(MemoryBuffer::new(Vec::new())))
            } else {
                None
            }
        }
    }

    #[async_trait]
    impl TftpCompletion for FixedFs {
        async fn on_complete(&self, request: &TftpRequest, _buffer: Box<dyn SeekableBuffer>) {
            self.completed.lock().unwrap().push(request.filename.clone());
        }
    }

    fn config() -> TftpServerConfig {
        TftpServerConfig { bind_addr: "127.0.0.1:0".to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn full_read_handshake_with_negotiated_blksize() {
        let mut files = HashMap::new();
        files.insert(b"boot.bin".to_vec(), vec![7u8; 3000]);
        let fs = FixedFs { files, writes_allowed: false, completed: StdMutex::new(Vec::new()) };
        let server = TftpServer::bind(config(), fs).await.unwrap();

        let mut options = TftpOptions::new();
        options.add(TftpOption::BlockSize(1000));
        let request = TftpPacket::Request {
            kind: RequestKind::Read,
            filename: b"boot.bin".to_vec(),
            mode: crate::tftp::packet::TftpMode::Octet,
            options,
        };
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let mut sessions = server.sessions.lock().await;
        let reply = server.start_session(&mut sessions, peer, request).await.unwrap().unwrap();
        assert!(matches!(reply, TftpPacket::Oack { .. }));

        let mut block = 0u16;
        let mut data_blocks = 0;
        loop {
            let packet = TftpPacket::Ack { block };
            let outcome = server.step_existing(&mut sessions, peer, packet).await;
            match outcome {
                Ok(Some(TftpPacket::Data { block: b, payload })) => {
                    data_blocks += 1;
                    block = b;
                    if payload.len() < 1000 {
                        let final_ack = TftpPacket::Ack { block };
                        let _ = server.step_existing(&mut sessions, peer, final_ack).await;
                        break;
                    }
                }
                _ => panic!("unexpected reply mid-transfer"),
            }
        }
        assert_eq!(data_blocks, 4);
        assert!(!sessions.contains_key(&peer));
        drop(sessions);
        assert_eq!(server.providers.completed.lock().unwrap().as_slice(), [b"boot.bin".to_vec()]);
    }

    #[tokio::test]
    async fn write_transfer_completes_and_invokes_callback() {
        let fs = FixedFs { files: HashMap::new(), writes_allowed: true, completed: StdMutex::new(Vec::new()) };
        let server = TftpServer::bind(config(), fs).await.unwrap();
        let request = TftpPacket::Request {
            kind: RequestKind::Write,
            filename: b"upload.bin".to_vec(),
            mode: crate::tftp::packet::TftpMode::Octet,
            options: TftpOptions::new(),
        };
        let peer: SocketAddr = "127.0.0.1:40004".parse().unwrap();
        let mut sessions = server.sessions.lock().await;
        let first = server.start_session(&mut sessions, peer, request).await.unwrap().unwrap();
        assert!(matches!(first, TftpPacket::Ack { block: 0 }));

        let data = TftpPacket::Data { block: 1, payload: b"small file".to_vec() };
        let reply = server.step_existing(&mut sessions, peer, data).await.unwrap();
        assert!(matches!(reply, Some(TftpPacket::Ack { block: 1 })));
        assert!(!sessions.contains_key(&peer));
        drop(sessions);
        assert_eq!(server.providers.completed.lock().unwrap().as_slice(), [b"upload.bin".to_vec()]);
    }

    #[tokio::test]
    async fn write_request_rejected_when_provider_disallows() {
        let fs = FixedFs { files: HashMap::new(), writes_allowed: false, completed: StdMutex::new(Vec::new()) };
        let server = TftpServer::bind(config(), fs).await.unwrap();
        let request = TftpPacket::Request {
            kind: RequestKind::Write,
            filename: b"locked.bin".to_vec(),
            mode: crate::tftp::packet::TftpMode::Octet,
            options: TftpOptions::new(),
        };
        let peer: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        let mut sessions = server.sessions.lock().await;
        let outcome = server.start_session(&mut sessions, peer, request).await;
        assert!(matches!(outcome, Err(TftpPacket::Error { code: ERR_FILE_ALREADY_EXISTS, .. })));
        assert!(!sessions.contains_key(&peer));
    }

    #[tokio::test]
    async fn bad_block_closes_session_with_illegal_operation() {
        let mut files = HashMap::new();
        files.insert(b"f".to_vec(), vec![1, 2, 3]);
        let fs = FixedFs { files, writes_allowed: false, completed: StdMutex::new(Vec::new()) };
        let server = TftpServer::bind(config(), fs).await.unwrap();
        let request = TftpPacket::Request {
            kind: RequestKind::Read,
            filename: b"f".to_vec(),
            mode: crate::tftp::packet::TftpMode::Octet,
            options: TftpOptions::new(),
        };
        let peer: SocketAddr = "127.0.0.1:40002".parse().unwrap();
        let mut sessions = server.sessions.lock().await;
        server.start_session(&mut sessions, peer, request).await.unwrap();

        let bad_ack = TftpPacket::Ack { block: 99 };
        let outcome = server.step_existing(&mut sessions, peer, bad_ack).await;
        assert!(matches!(outcome, Err(TftpPacket::Error { code: ERR_ILLEGAL_OPERATION, .. })));
        assert!(!sessions.contains_key(&peer));
    }

    #[tokio::test]
    async fn provider_panic_is_caught_and_replies_with_internal_error() {
        struct PanicProvider;

        #[async_trait]
        impl TftpReadProvider for PanicProvider {
            async fn open_read(&self, _request: &TftpRequest) -> Option<Box<dyn SeekableBuffer>> {
                panic!("boom")
            }
        }

        #[async_trait]
        impl TftpWriteProvider for PanicProvider {
            async fn open_write(&self, _request: &TftpRequest) -> Option<Box<dyn SeekableBuffer>> {
                None
            }
        }

        #[async_trait]
        impl TftpCompletion for PanicProvider {
            async fn on_complete(&self, _request: &TftpRequest, _buffer: Box<dyn SeekableBuffer>) {}
        }

        let server = TftpServer::bind(config(), PanicProvider).await.unwrap();
        let request = TftpPacket::Request {
            kind: RequestKind::Read,
            filename: b"f".to_vec(),
            mode: crate::tftp::packet::TftpMode::Octet,
            options: TftpOptions::new(),
        };
        let peer: SocketAddr = "127.0.0.1:40005".parse().unwrap();

        // Must not unwind out of `handle_datagram`; the panic is caught at
        // the task boundary and mapped to an internal-error reply instead.
        server.handle_datagram(&request.encode(), peer).await;
        assert!(!server.sessions.lock().await.contains_key(&peer));
    }

    #[tokio::test]
    async fn idle_sweeper_removes_stale_sessions() {
        let mut files = HashMap::new();
        files.insert(b"f".to_vec(), vec![1, 2, 3]);
        let fs = FixedFs { files, writes_allowed: false, completed: StdMutex::new(Vec::new()) };
        let mut cfg = config();
        cfg.idle_timeout = std::time::Duration::from_millis(1);
        let server = TftpServer::bind(cfg, fs).await.unwrap();
        let request = TftpPacket::Request {
            kind: RequestKind::Read,
            filename: b"f".to_vec(),
            mode: crate::tftp::packet::TftpMode::Octet,
            options: TftpOptions::new(),
        };
        let peer: SocketAddr = "127.0.0.1:40003".parse().unwrap();
        {
            let mut sessions = server.sessions.lock().await;
            server.start_session(&mut sessions, peer, request).await.unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut sessions = server.sessions.lock().await;
        sessions.retain(|_, s| s.last_activity.elapsed() < server.config.idle_timeout);
        assert!(!sessions.contains_key(&peer));
    }
}
