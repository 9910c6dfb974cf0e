//! Spy listener example
//!
//! Attaches to a running hub and prints every batch captured on the given
//! channels.
//!
//! Run with: cargo run --example spy_listener [CHANNEL...]
//!
//! Examples:
//!   cargo run --example spy_listener              # channel 0
//!   cargo run --example spy_listener 0 3 -1       # channels 0, 3 and -1
//!
//! The hub name and socket directory come from `MIDI_SPY_HUB_NAME` and
//! `MIDI_SPY_SOCKET_DIR`, the same variables the daemon reads. Start the
//! daemon first:
//!
//!   cargo run --bin midi-spy-hub
//!
//! and type lines such as `0 90 40 7f` into it.

use tracing_subscriber::EnvFilter;

use midi_spy_hub::client::{ClientConfig, SpyListener};
use midi_spy_hub::HubConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let channels = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<i32>())
        .collect::<Result<Vec<_>, _>>()?;
    let channels = if channels.is_empty() { vec![0] } else { channels };

    // Resolve the hub the same way the daemon does
    let hub = HubConfig::from_env()?;
    let config = ClientConfig::new(hub.name).socket_dir(hub.socket_dir);

    let mut listener = SpyListener::connect(config).await?;
    println!("Attached as listener {}", listener.id());

    for &channel in &channels {
        listener.connect_channel(channel).await?;
        println!("Connected to channel {}", channel);
    }

    loop {
        tokio::select! {
            data = listener.recv() => {
                let data = data?;
                println!("{} bytes: {:02X?}", data.len(), &data[..]);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Detaching");
                break;
            }
        }
    }

    Ok(())
}
