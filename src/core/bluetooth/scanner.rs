//! Continuous peripheral discovery for the bluest backend.
//! Scanning runs as a spawned task over the adapter's advertisement stream
//! and is torn down through a cancellation token.

use bluest::Adapter;
use futures_util::StreamExt;
use log::{debug, error, info};
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::event::RadioEvent;
use crate::core::bluetooth::radio::DeviceMap;
use crate::core::bluetooth::types::SpeakerId;

pub(crate) struct ScanTask {
    cancel_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ScanTask {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Spawns the scan task. A task that is still running is left alone;
    /// restarting the platform scan would only churn the stream.
    pub fn start(
        &mut self,
        adapter: Adapter,
        devices: DeviceMap,
        events: mpsc::UnboundedSender<RadioEvent>,
    ) {
        if self
            .task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            debug!("scan task already running");
            return;
        }

        self.cancel_token = CancellationToken::new();
        let cancel_token = self.cancel_token.clone();
        self.task_handle = Some(tokio::spawn(async move {
            Self::run(adapter, devices, events, cancel_token).await;
        }));
        info!("device scan task started");
    }

    async fn run(
        adapter: Adapter,
        devices: DeviceMap,
        events: mpsc::UnboundedSender<RadioEvent>,
        cancel_token: CancellationToken,
    ) {
        let mut scan_stream = match adapter.scan(&[]).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("failed to start bluetooth scan: {e}");
                return;
            }
        };

        loop {
            tokio::select! {
                next = scan_stream.next() => {
                    match next {
                        Some(discovered) => {
                            let device = discovered.device;
                            let rssi = discovered.rssi;
                            let id = SpeakerId(device.id().to_string());
                            let name = device.name().ok();
                            let address = extract_address(&id.0);
                            debug!("advertisement from {id}: name {name:?}, rssi {rssi:?}");

                            devices.lock().unwrap().insert(id.clone(), device);
                            let _ = events.send(RadioEvent::Discovered { id, name, address, rssi });
                        }
                        None => {
                            info!("bluetooth scan stream has ended");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => break,
            }
        }
        info!("scan task finished");
    }

    /// Cancels the scan task and waits for it to wind down. Safe to call
    /// when no scan is running.
    pub async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(()) => info!("scan task stopped"),
                Err(e) if e.is_cancelled() => info!("scan task was cancelled"),
                Err(e) => error!("scan task finished with a join error: {e:?}"),
            }
        }
    }
}

/// Pulls a MAC-looking token out of a platform device id for display.
/// Some platforms embed it in the id string; others (macOS) never expose it.
pub(crate) fn extract_address(device_id: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").expect("static pattern");
    re.find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
}
