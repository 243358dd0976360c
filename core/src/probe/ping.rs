//! ICMP reachability through the operating system's `ping` tool.
//!
//! Raw ICMP sockets need privileges; the setuid/capability-enabled system
//! binary does not.

use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::ProbeError;

pub const PING_PROGRAM: &str = "ping";
const SPAWN_GRACE: Duration = Duration::from_millis(500);

/// Sends one echo request. `Ok(false)` covers both "no reply" and "the
/// tool gave up"; only failing to run the tool at all is an error.
pub async fn ping(program: &str, addr: Ipv4Addr, wait: Duration) -> Result<bool, ProbeError> {
    let mut cmd = Command::new(program);
    cmd.args(wait_args(wait))
        .arg(addr.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let child = cmd.status();
    match tokio::time::timeout(wait + SPAWN_GRACE, child).await {
        Ok(Ok(status)) => Ok(status.success()),
        Ok(Err(e)) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
            Err(ProbeError::unexpected(addr, format!("cannot run {program}: {e}")))
        }
        Ok(Err(e)) => Err(ProbeError::unexpected(addr, format!("{program} failed: {e}"))),
        Err(_elapsed) => Ok(false),
    }
}

#[cfg(target_os = "macos")]
fn wait_args(wait: Duration) -> Vec<String> {
    // -W is in milliseconds on BSD ping
    let millis = wait.as_millis().max(1);
    vec![String::from("-c"), String::from("1"), String::from("-W"), millis.to_string()]
}

#[cfg(not(target_os = "macos"))]
fn wait_args(wait: Duration) -> Vec<String> {
    let secs = wait.as_secs().max(1);
    vec![String::from("-c"), String::from("1"), String::from("-W"), secs.to_string()]
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
