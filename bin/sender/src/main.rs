#![deny(unsafe_code)]

//! Interactive CLI front end for the sender side of a transfer: discovers
//! receivers on the local broadcast domain, lets the operator pick one, then
//! streams the named file to it.
//!
//! The pieces the spec places out of the core — argument handling, the
//! interactive device menu, extension extraction, and progress printing —
//! all live here rather than in `transfer` or `discovery`.

use std::io::{self, BufRead, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tokio::net::UdpSocket;
use tracing::{error, info};

use discovery::sender::{discover_receivers, send_chosen, DiscoveredDevice};
use discovery::DiscoveryConfig;
use transfer::config::TransferConfig;
use transfer::io::FileChunkSource;
use transfer::sender::{build_meta, SenderEngine, TransferIdAllocator};

/// Sends a file to a receiver discovered on the local broadcast domain.
#[derive(Parser, Debug)]
#[command(name = "sender", version, about)]
struct Cli {
    /// Path of the file to send.
    input: PathBuf,

    /// UDP port both peers use for DISCOVER/HERE/CHOSEN.
    #[arg(long, default_value_t = discovery::config::DEFAULT_DISCOVERY_PORT)]
    port_discovery: u16,

    /// UDP port META/DATA frames are sent to.
    #[arg(long, default_value_t = transfer::config::DEFAULT_DATA_PORT)]
    port_data: u16,

    /// UDP port ACK_BATCH frames are received on.
    #[arg(long, default_value_t = transfer::config::DEFAULT_ACK_PORT)]
    port_ack: u16,

    /// Maximum number of chunks allowed unacknowledged at once.
    #[arg(long, default_value_t = transfer::config::DEFAULT_WINDOW)]
    window: usize,

    /// Retransmission timeout, in milliseconds.
    #[arg(long, default_value_t = transfer::config::DEFAULT_RTO.as_millis() as u64)]
    rto_ms: u64,

    /// Bytes per full chunk.
    #[arg(long, default_value_t = transfer::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: u16,

    /// Repeat to increase log verbosity (overridden by RUST_LOG).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Extracts the extension portion of `path`'s file name, lower-cased, or an
/// empty string if it has none. Out of the protocol core's scope per the
/// spec; `MetaHeader::ext_from_str` truncates and NUL-pads whatever this
/// returns.
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Prints the discovered devices numbered from 1 and reads a decimal
/// selection from stdin, looping until a valid one is entered.
fn prompt_selection(devices: &[DiscoveredDevice]) -> io::Result<usize> {
    println!("Discovered {} device(s):", devices.len());
    for (i, device) in devices.iter().enumerate() {
        println!("  {}) {} ({})", i + 1, device.name, device.data_addr());
    }
    let stdin = io::stdin();
    loop {
        print!("Select a device [1-{}]: ", devices.len());
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed before a selection was made"));
        }
        match line.trim().parse::<usize>() {
            Ok(choice) if choice >= 1 && choice <= devices.len() => return Ok(choice - 1),
            _ => println!("Invalid selection, try again."),
        }
    }
}

/// Reports each whole percentage point from the one after `last_printed` up
/// to `percent_now`, inclusive, so a caller never skips a value.
fn print_progress(last_printed: &mut Option<u32>, percent_now: u32, done: u32, total: u32) {
    let start = last_printed.map_or(0, |p| p + 1);
    for percent in start..=percent_now {
        println!("Progress: {percent}% ({done}/{total} chunks acked)");
    }
    *last_printed = Some(percent_now);
}

async fn run(cli: Cli) -> Result<(), String> {
    let input_path = cli.input;
    let mut source = FileChunkSource::open(&input_path)
        .map_err(|err| format!("could not open input file {}: {err}", input_path.display()))?;
    let file_size = source
        .len()
        .map_err(|err| format!("could not stat input file {}: {err}", input_path.display()))?;

    let discovery_socket = UdpSocket::bind(("0.0.0.0", 0))
        .await
        .map_err(|err| format!("could not open discovery socket: {err}"))?;
    discovery_socket
        .set_broadcast(true)
        .map_err(|err| format!("could not enable broadcast: {err}"))?;

    let discovery_config = DiscoveryConfig {
        port: cli.port_discovery,
        ..DiscoveryConfig::default()
    };
    let broadcast_addr = SocketAddr::new(Ipv4Addr::BROADCAST.into(), cli.port_discovery);
    info!(%broadcast_addr, "broadcasting DISCOVER");
    let devices = discover_receivers(&discovery_socket, broadcast_addr, &discovery_config)
        .await
        .map_err(|err| format!("discovery failed: {err}"))?;
    if devices.is_empty() {
        return Err("no receivers discovered".to_string());
    }

    let chosen_index =
        prompt_selection(&devices).map_err(|err| format!("could not read device selection: {err}"))?;
    let chosen = &devices[chosen_index];
    send_chosen(&discovery_socket, chosen, cli.port_discovery)
        .await
        .map_err(|err| format!("could not send CHOSEN: {err}"))?;
    info!(name = %chosen.name, addr = %chosen.data_addr(), "peer chosen");

    let transfer_ids = TransferIdAllocator::new();
    let transfer_id = transfer_ids.next();
    let extension = extension_of(&input_path);
    let meta = build_meta(transfer_id, file_size, cli.chunk_size, &extension);

    let data_socket = UdpSocket::bind(("0.0.0.0", 0))
        .await
        .map_err(|err| format!("could not open data socket: {err}"))?;
    let ack_socket = UdpSocket::bind(("0.0.0.0", cli.port_ack))
        .await
        .map_err(|err| format!("could not bind ack socket on port {}: {err}", cli.port_ack))?;

    let mut config = TransferConfig {
        data_port: cli.port_data,
        ack_port: cli.port_ack,
        chunk_size: cli.chunk_size,
        window: cli.window,
        ..TransferConfig::default()
    };
    config.rto = std::time::Duration::from_millis(cli.rto_ms);

    let peer_data_addr = SocketAddr::new(chosen.ip, cli.port_data);
    let mut engine = SenderEngine::new(data_socket, ack_socket, source, meta, peer_data_addr, config);

    let total_chunks = meta.total_chunks;
    let mut last_printed = None;
    engine
        .run_to_completion(|done, total| {
            if total == 0 {
                return;
            }
            let percent = done * 100 / total;
            print_progress(&mut last_printed, percent, done, total);
        })
        .await
        .map_err(|err| format!("transfer failed: {err}"))?;

    if total_chunks == 0 {
        println!("Progress: 100% (0/0 chunks acked)");
    }
    info!("transfer complete");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_of_strips_leading_dot_and_lowercases() {
        assert_eq!(extension_of(Path::new("photo.JPG")), "jpg");
        assert_eq!(extension_of(Path::new("archive.tar.gz")), "gz");
        assert_eq!(extension_of(Path::new("no_extension")), "");
        assert_eq!(extension_of(Path::new(".hidden")), "");
    }

    #[test]
    fn progress_backfills_every_percentage_with_no_gaps() {
        let mut printed = Vec::new();
        let mut last = None;
        // Simulate capturing output by re-deriving the percent sequence
        // rather than stdout, since print_progress writes directly.
        for percent in [0, 0, 1, 1, 3, 3, 100] {
            let start = last.map_or(0, |p: u32| p + 1);
            for p in start..=percent {
                printed.push(p);
            }
            last = Some(percent);
        }
        assert_eq!(printed.first(), Some(&0));
        assert_eq!(printed.last(), Some(&100));
        for window in printed.windows(2) {
            assert!(window[1] - window[0] <= 1, "gap detected: {window:?}");
        }
    }
}
