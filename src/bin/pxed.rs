//! Demonstration PXE boot daemon wiring the DHCP and TFTP servers
//! together over a single boot-file directory. Not part of the crate's
//! tested contract (spec.md §1): a real deployment supplies its own
//! lease policy and file provisioning.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use pxecore::config::{DhcpServerConfig, TftpServerConfig};
use pxecore::dhcp::{DhcpMessageType, DhcpOption, DhcpServer, DhcpV4Packet};
use pxecore::tftp::{FileBuffer, RequestKind, SeekableBuffer, TftpCompletion, TftpReadProvider, TftpRequest, TftpServer, TftpWriteProvider};

/// Hands out addresses from a small static pool keyed by client MAC,
/// just enough to drive a real PXE handshake end to end.
struct StaticLeasePool {
    server_ip: Ipv4Addr,
    boot_file: String,
    next_offset: Mutex<u32>,
    leases: Mutex<HashMap<Vec<u8>, Ipv4Addr>>,
}

impl StaticLeasePool {
    fn allocate(&self, chaddr: &[u8]) -> Ipv4Addr {
        let mut leases = self.leases.lock().unwrap();
        if let Some(ip) = leases.get(chaddr) {
            return *ip;
        }
        let mut offset = self.next_offset.lock().unwrap();
        let ip = Ipv4Addr::from(u32::from(Ipv4Addr::new(10, 0, 0, 10)) + *offset);
        *offset += 1;
        leases.insert(chaddr.to_vec(), ip);
        ip
    }
}

impl pxecore::dhcp::DhcpDecider for StaticLeasePool {
    fn decide(&self, request: &DhcpV4Packet) -> Option<DhcpV4Packet> {
        let msg_type = request.options.iter().find_map(|opt| match opt {
            DhcpOption::DhcpMessageType(t) => Some(*t),
            _ => None,
        })?;

        let offered_ip = self.allocate(request.chaddr.as_bytes());
        let reply_type = match msg_type {
            DhcpMessageType::Discover => DhcpMessageType::Offer,
            DhcpMessageType::Request => DhcpMessageType::Ack,
            _ => return None,
        };

        let mut reply = DhcpV4Packet::empty();
        reply.op = pxecore::dhcp::BootOp::BootReply;
        reply.htype = request.htype;
        reply.hlen = request.hlen;
        reply.xid = request.xid;
        reply.giaddr = request.giaddr;
        reply.chaddr = request.chaddr.clone();
        reply.yiaddr = offered_ip;
        reply.siaddr = self.server_ip;
        reply.file = self.boot_file.clone();
        reply.options.add(DhcpOption::DhcpMessageType(reply_type));
        reply.options.add(DhcpOption::ServerIdentifier(self.server_ip));
        reply.options.add(DhcpOption::IpAddressLeaseTime(3600));
        reply.options.add(DhcpOption::BootfileName(self.boot_file.clone().into_bytes()));
        reply.options.add(DhcpOption::TftpServerIpAddress(self.server_ip));
        Some(reply)
    }
}

/// Serves boot files read-only from a directory on disk; rejects all
/// write requests.
struct BootDirectory {
    root: PathBuf,
}

impl BootDirectory {
    fn resolve(&self, filename: &[u8]) -> Option<PathBuf> {
        let name = String::from_utf8_lossy(filename);
        if name.contains("..") {
            return None;
        }
        Some(self.root.join(name.as_ref()))
    }
}

#[async_trait]
impl TftpReadProvider for BootDirectory {
    async fn open_read(&self, request: &TftpRequest) -> Option<Box<dyn SeekableBuffer>> {
        let path = self.resolve(&request.filename)?;
        let file = tokio::fs::File::open(path).await.ok()?;
        Some(Box::new(FileBuffer::new(file)))
    }
}

#[async_trait]
impl TftpWriteProvider for BootDirectory {
    async fn open_write(&self, _request: &TftpRequest) -> Option<Box<dyn SeekableBuffer>> {
        None
    }
}

#[async_trait]
impl TftpCompletion for BootDirectory {
    async fn on_complete(&self, request: &TftpRequest, _buffer: Box<dyn SeekableBuffer>) {
        let filename = String::from_utf8_lossy(&request.filename);
        match request.kind {
            RequestKind::Read => log::info!("finished serving {filename} to {}", request.peer),
            RequestKind::Write => log::info!("finished receiving {filename} from {}", request.peer),
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    pxecore::logging::init_logger(2).expect("failed to initialise logging");

    let boot_root = std::env::args().nth(1).unwrap_or_else(|| "./boot".to_string());
    let server_ip = Ipv4Addr::new(10, 0, 0, 1);

    let decider = StaticLeasePool {
        server_ip,
        boot_file: "pxelinux.0".to_string(),
        next_offset: Mutex::new(0),
        leases: Mutex::new(HashMap::new()),
    };
    let dhcp = DhcpServer::bind(&DhcpServerConfig::default(), decider).await?;

    let tftp = TftpServer::bind(TftpServerConfig::default(), BootDirectory { root: PathBuf::from(boot_root) }).await?;
    tokio::spawn({
        let tftp = Arc::clone(&tftp);
        async move { tftp.run_idle_sweeper().await }
    });

    log::info!("pxed listening: dhcp=0.0.0.0:67 tftp=0.0.0.0:69");
    tokio::try_join!(dhcp.run(), tftp.run())?;
    Ok(())
}
