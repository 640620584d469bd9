//! Telemetry example — one muxer/demuxer pair over loopback TCP.
//!
//! Run with:
//!   cargo run --example telemetry

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use packetmux::{IdRegistry, PacketDemuxer, PacketMuxer};
use packetmux_transport::TcpTransport;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .with_target(false)
        .init();

    // Both ends must agree on the same ordered name list.
    let registry = Arc::new(IdRegistry::from_names(["Telemetry", "Command"])?);

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let client = TcpStream::connect(addr)?;
    let (server, _) = listener.accept()?;

    let muxer = PacketMuxer::new(TcpTransport::new(client), Arc::clone(&registry));
    let demuxer = PacketDemuxer::new(TcpTransport::new(server), Arc::clone(&registry));

    let _telemetry = demuxer.subscribe("Telemetry", |packet| {
        eprintln!(
            "[receiver] telemetry: {}",
            String::from_utf8_lossy(packet.data())
        );
    })?;
    let _command = demuxer.subscribe("Command", |packet| {
        eprintln!(
            "[receiver] command: {}",
            String::from_utf8_lossy(packet.data())
        );
    })?;

    for reading in 0..5 {
        muxer.post("Telemetry", format!("battery={}%", 90 - reading).into_bytes())?;
    }
    muxer.post("Command", b"halt".to_vec())?;

    // Let the pair drain before tearing down.
    while muxer.sent_count() != muxer.posted_count() {
        std::thread::sleep(Duration::from_millis(5));
    }
    std::thread::sleep(Duration::from_millis(100));

    eprintln!(
        "[sender] posted={} sent={}",
        muxer.posted_count(),
        muxer.sent_count()
    );
    Ok(())
}
