use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use netinv_common::network::host::OpenService;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Outcome of connecting to every configured port of one host.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PortSweep {
    /// Ports that accepted a connection, ordered by port.
    pub open: Vec<OpenService>,
    /// The host answered on at least one port, open or refused.
    pub responded: bool,
}

enum PortState {
    Open,
    Refused,
    Silent,
}

/// Connects to all `ports` of `addr` concurrently, each bounded by `probe_timeout`.
pub async fn sweep_ports(
    addr: Ipv4Addr,
    ports: &[(u16, String)],
    probe_timeout: Duration,
) -> PortSweep {
    let mut tasks: JoinSet<(u16, String, PortState)> = JoinSet::new();
    for (port, name) in ports.iter().cloned() {
        tasks.spawn(async move {
            let state = handshake(SocketAddr::new(IpAddr::V4(addr), port), probe_timeout).await;
            (port, name, state)
        });
    }

    let mut sweep = PortSweep::default();
    while let Some(joined) = tasks.join_next().await {
        let Ok((port, name, state)) = joined else {
            continue;
        };
        match state {
            PortState::Open => {
                sweep.responded = true;
                sweep.open.push(OpenService::new(name, port));
            }
            PortState::Refused => sweep.responded = true,
            PortState::Silent => {}
        }
    }
    sweep.open.sort_by_key(|svc| svc.port);
    sweep
}

async fn handshake(socket_addr: SocketAddr, probe_timeout: Duration) -> PortState {
    match timeout(probe_timeout, TcpStream::connect(socket_addr)).await {
        Ok(Ok(_)) => PortState::Open,
        // A reset means a live stack answered.
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => PortState::Refused,
        Ok(Err(_)) | Err(_) => PortState::Silent,
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
