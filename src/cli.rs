//! Interactive command loop driving the bridge handle.
//! Stands in for the product UI: issues fire-and-forget requests and
//! renders the published snapshots.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use whispr_bridge::core::bluetooth::BridgeHandle;
use whispr_bridge::core::bluetooth::types::BridgeSnapshot;

pub async fn run(handle: BridgeHandle) -> Result<()> {
    let mut snapshots = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("whispr-bridge ready; type `help` for commands");
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                report(&snapshots.borrow_and_update());
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !dispatch(&handle, line.trim()) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    handle.shutdown();
    Ok(())
}

fn report(snapshot: &BridgeSnapshot) {
    let connected = snapshot
        .connected
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "[bridge] power={} scan={} speakers={} connected={} dropped={}",
        if snapshot.powered_on { "on" } else { "off" },
        snapshot.scanning,
        snapshot.speakers.len(),
        connected,
        snapshot.dropped_commands,
    );
    if let Some(value) = &snapshot.last_received {
        println!("[speaker] {} ({})", value.text, value.received_at);
    }
}

fn dispatch(handle: &BridgeHandle, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => true,
        Some("help") => {
            print_help();
            true
        }
        Some("scan") => {
            handle.start_scanning();
            true
        }
        Some("stop") => {
            handle.stop_scanning();
            true
        }
        Some("clear") => {
            handle.clear_discovered();
            true
        }
        Some("list") => {
            list(&handle.snapshot());
            true
        }
        Some("connect") => {
            connect(handle, parts.next());
            true
        }
        Some("disconnect") => {
            handle.disconnect_to_device();
            true
        }
        Some("volume") => {
            match parts.next().and_then(|level| level.parse::<u8>().ok()) {
                Some(level) => handle.set_volume(level),
                None => println!("usage: volume <0-255>"),
            }
            true
        }
        Some("status") => {
            match serde_json::to_string_pretty(&handle.snapshot()) {
                Ok(json) => println!("{json}"),
                Err(e) => println!("could not render status: {e}"),
            }
            true
        }
        Some("quit") | Some("exit") => false,
        Some(other) => {
            println!("unknown command {other:?}; type `help`");
            true
        }
    }
}

fn list(snapshot: &BridgeSnapshot) {
    if snapshot.speakers.is_empty() {
        println!("no speakers discovered yet");
        return;
    }
    for (index, speaker) in snapshot.speakers.iter().enumerate() {
        let address = speaker.address.as_deref().unwrap_or("N/A");
        let rssi = speaker
            .rssi
            .map(|rssi| format!("{rssi} dBm"))
            .unwrap_or_else(|| "?".to_string());
        println!("  [{index}] {} ({address}, {rssi})", speaker.name);
    }
}

fn connect(handle: &BridgeHandle, index: Option<&str>) {
    let Some(index) = index.and_then(|raw| raw.parse::<usize>().ok()) else {
        println!("usage: connect <index> (see `list`)");
        return;
    };
    let snapshot = handle.snapshot();
    match snapshot.speakers.get(index) {
        Some(speaker) => handle.connect_to_device(speaker.id.clone()),
        None => println!("no speaker at index {index}; see `list`"),
    }
}

fn print_help() {
    println!("commands:");
    println!("  scan          start discovering speakers");
    println!("  stop          stop discovering");
    println!("  list          show discovered speakers");
    println!("  clear         forget discovered speakers");
    println!("  connect <n>   connect to speaker n from `list`");
    println!("  disconnect    drop the current connection");
    println!("  volume <v>    set speaker volume (0-255)");
    println!("  status        dump the current bridge state as JSON");
    println!("  quit          exit");
}
