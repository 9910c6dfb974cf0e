//! midi-spy-hub daemon
//!
//! Runs a hub with its control server. Captured traffic is read from stdin,
//! one batch per line:
//!
//! ```text
//! <channel> <hex byte> <hex byte> ...
//! 0 90 40 7f
//! ```
//!
//! Lines are only forwarded while at least one listener is attached.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use midi_spy_hub::{Broadcaster, BroadcasterDelegate, Channel, ControlServer, HubConfig, UnixTransport};

/// Turns capture on while anyone is listening
#[derive(Debug, Default)]
struct CaptureGate {
    capturing: AtomicBool,
}

impl CaptureGate {
    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }
}

impl BroadcasterDelegate for CaptureGate {
    fn listener_count_became_nonzero(&self) {
        self.capturing.store(true, Ordering::Release);
        tracing::info!("First listener attached, capture enabled");
    }

    fn listener_count_became_zero(&self) {
        self.capturing.store(false, Ordering::Release);
        tracing::info!("Last listener detached, capture disabled");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = HubConfig::from_env()?;
    tracing::info!(
        hub = %config.name,
        socket_dir = %config.socket_dir.display(),
        send_timeout_ms = config.send_timeout.as_millis() as u64,
        "Starting midi-spy-hub"
    );

    let gate = Arc::new(CaptureGate::default());
    let transport = UnixTransport::new(&config.socket_dir);
    let (hub, monitor) = Broadcaster::with_delegate(
        &config,
        transport,
        Arc::clone(&gate) as Arc<dyn BroadcasterDelegate>,
    );
    let monitor_handle = monitor.spawn();

    let server = ControlServer::bind(config, Arc::clone(&hub))?;

    spawn_producer(Arc::clone(&hub), gate);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    monitor_handle.abort();

    let stats = hub.stats();
    tracing::info!(
        broadcasts = stats.broadcasts,
        deliveries = stats.deliveries,
        failed_sends = stats.failed_sends,
        delivery_ratio = stats.delivery_ratio(),
        uptime_secs = stats.uptime.as_secs(),
        "midi-spy-hub stopped"
    );

    Ok(())
}

/// Feed stdin lines into the hub from a dedicated thread
fn spawn_producer(hub: Arc<Broadcaster>, gate: Arc<CaptureGate>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();

        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read capture input");
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match parse_capture_line(&line) {
                Ok((channel, data)) => {
                    if gate.is_capturing() {
                        hub.broadcast(&data, channel);
                    }
                }
                Err(e) => tracing::warn!(line = %line, error = %e, "Ignoring capture line"),
            }
        }

        tracing::info!("Capture input closed");
    });
}

/// Parse `<channel> <hex byte>...`
fn parse_capture_line(line: &str) -> Result<(Channel, Vec<u8>), String> {
    let mut fields = line.split_whitespace();

    let channel = fields
        .next()
        .ok_or_else(|| "missing channel".to_string())?
        .parse::<i32>()
        .map_err(|e| format!("bad channel: {e}"))?;

    let data = fields
        .map(|byte| {
            u8::from_str_radix(byte.trim_start_matches("0x"), 16)
                .map_err(|e| format!("bad byte {byte:?}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if data.is_empty() {
        return Err("no data bytes".to_string());
    }

    Ok((Channel::new(channel), data))
}
