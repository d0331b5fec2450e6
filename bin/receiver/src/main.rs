#![deny(unsafe_code)]

//! CLI front end for the receiver side of a transfer: answers discovery
//! probes, binds a transfer to whichever sender sends `CHOSEN`, and writes
//! exactly one incoming transfer to `received_file.<ext>` before exiting.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

use discovery::config::DiscoveryConfig;
use discovery::receiver::respond_until_chosen;
use transfer::config::TransferConfig;
use transfer::io::{ChunkSink, FileChunkSink};
use transfer::{ReceiveOutcome, ReceiverEngine, SinkFactory};
use wire::MetaHeader;

/// Waits for a transfer, accepts exactly one, and exits once it completes.
#[derive(Parser, Debug)]
#[command(name = "receiver", version, about)]
struct Cli {
    /// Name this receiver advertises in its `HERE` replies.
    #[arg(long, default_value = "receiver")]
    name: String,

    /// UDP port both peers use for DISCOVER/HERE/CHOSEN.
    #[arg(long, default_value_t = discovery::config::DEFAULT_DISCOVERY_PORT)]
    port_discovery: u16,

    /// UDP port META/DATA frames are received on.
    #[arg(long, default_value_t = transfer::config::DEFAULT_DATA_PORT)]
    port_data: u16,

    /// UDP port ACK_BATCH frames are sent to.
    #[arg(long, default_value_t = transfer::config::DEFAULT_ACK_PORT)]
    port_ack: u16,

    /// Receiver ACK_BATCH flush threshold, in pending ids.
    #[arg(long, default_value_t = transfer::config::DEFAULT_ACK_FLUSH_COUNT)]
    ack_flush_count: usize,

    /// Receiver ACK_BATCH flush threshold, in milliseconds since the last flush.
    #[arg(long, default_value_t = transfer::config::DEFAULT_ACK_FLUSH_INTERVAL.as_millis() as u64)]
    ack_flush_interval_ms: u64,

    /// Directory to write the received file into.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Repeat to increase log verbosity (overridden by RUST_LOG).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Opens `received_file.<ext>` (truncating) under a fixed output directory,
/// the receiver-side I/O the core treats as an external collaborator.
struct FileSinkFactory {
    out_dir: PathBuf,
}

impl SinkFactory<FileChunkSink> for FileSinkFactory {
    fn open(&mut self, meta: &MetaHeader) -> io::Result<FileChunkSink> {
        let name = format!("received_file.{}", meta.ext_as_str());
        let path = self.out_dir.join(name);
        info!(path = %path.display(), "opening output file");
        FileChunkSink::create_truncated(&path)
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let discovery_socket = UdpSocket::bind(("0.0.0.0", cli.port_discovery))
        .await
        .map_err(|err| format!("could not bind discovery socket on port {}: {err}", cli.port_discovery))?;
    let data_socket = UdpSocket::bind(("0.0.0.0", cli.port_data))
        .await
        .map_err(|err| format!("could not bind data socket on port {}: {err}", cli.port_data))?;
    let ack_socket = UdpSocket::bind(("0.0.0.0", 0))
        .await
        .map_err(|err| format!("could not open ack socket: {err}"))?;

    let _discovery_config = DiscoveryConfig {
        port: cli.port_discovery,
        ..DiscoveryConfig::default()
    };

    info!(name = %cli.name, port = cli.port_discovery, "waiting for DISCOVER");
    let chosen_from: SocketAddr = respond_until_chosen(&discovery_socket, &cli.name, cli.port_data)
        .await
        .map_err(|err| format!("discovery handshake failed: {err}"))?;
    info!(%chosen_from, "bound transfer to chosen peer");

    let config = TransferConfig {
        data_port: cli.port_data,
        ack_port: cli.port_ack,
        ack_flush_count: cli.ack_flush_count,
        ack_flush_interval: std::time::Duration::from_millis(cli.ack_flush_interval_ms),
        ..TransferConfig::default()
    };

    let sink_factory = FileSinkFactory {
        out_dir: cli.out_dir,
    };
    let mut engine = ReceiverEngine::new(data_socket, ack_socket, sink_factory, config, Some(chosen_from));

    loop {
        match engine.poll_once(Instant::now()) {
            Ok(ReceiveOutcome::TransferComplete) => break,
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => warn!(%err, "data socket error, continuing"),
        }
        tokio::time::sleep(config.poll_yield).await;
    }

    info!("transfer complete, exiting");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    landrop_logging::init(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("could not start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
