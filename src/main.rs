//! Demo binary wiring [`swift_mptp::SwiftProtocol`] to a real raw-IP socket.
//!
//! A tokio event loop that owns the actual socket and feeds bytes into the
//! core. `handle_inbound` enqueues synchronously and there is nothing to
//! schedule, so the loop here just reads, hands off, and repeats.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use swift_mptp::{AddressRecord, RawIpTransport, SwiftProtocol, SwiftSocket};

#[derive(Parser, Debug)]
#[command(about = "Swift/MPTP demo: binds a single socket and logs inbound datagrams")]
struct Cli {
    /// Source port to bind the demo socket to.
    #[arg(long, env = "SWIFT_PORT", default_value_t = 10)]
    port: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let Cli { port } = Cli::parse();

    let transport = Arc::new(RawIpTransport::bind()?);
    let protocol = SwiftProtocol::new(transport.clone());

    let socket = SwiftSocket::create(&protocol);
    socket.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, port))?;

    tracing::info!(port, "listening for Swift/MPTP traffic");

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<(Ipv4Addr, Vec<u8>)>(1024);
    spawn_receive_loop(transport, inbound_tx);

    loop {
        let mut buffers = vec![vec![0u8; 65535]];

        tokio::select! {
            Some((source, datagram)) = inbound_rx.recv() => {
                protocol.handle_inbound(&datagram, source);
            }
            result = socket.recvmsg(&mut buffers, None, false) => {
                let report = result?;
                tracing::info!(bytes = report.bytes_copied, truncated = report.truncated, "received datagram");
            }
        }
    }
}

/// Drives the raw socket on a blocking thread and forwards what it reads
/// over a channel. A cooperative-enqueue loop standing in for the
/// interrupt-context handler a real kernel driver would use.
fn spawn_receive_loop(transport: Arc<RawIpTransport>, tx: mpsc::Sender<(Ipv4Addr, Vec<u8>)>) {
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; 65535];

        loop {
            match transport.try_recv(&mut buf) {
                Ok(Some((source, len))) => {
                    if tx.blocking_send((source, buf[..len].to_vec())).is_err() {
                        return;
                    }
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(1)),
                Err(e) => {
                    tracing::warn!("raw socket receive failed: {e}");
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    });
}
