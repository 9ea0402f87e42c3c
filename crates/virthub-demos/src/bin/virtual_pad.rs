//! Reference client: a virtual Xbox 360 pad sending a 60 Hz input pattern
//! while printing rumble commands pushed by the host.
//!
//! The rumble stream is drained from its own task via an `OutputStream`;
//! records are fixed 2-byte pairs and may arrive coalesced, so the drain
//! loop splits each delivery.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use virthub_client::{DeviceCreateOptions, HubAddr, HubClient};
use virthub_core::devices::xbox360;

#[derive(Parser)]
#[command(about = "Virtual Xbox 360 pad demo for a virthub hub")]
struct Args {
    /// Hub address as host:port.
    #[arg(env = "VIRTHUB_ADDR", default_value = "127.0.0.1:3242")]
    addr: String,

    /// Milliseconds between input reports.
    #[arg(long, default_value_t = 16)]
    period_ms: u64,
}

/// Input pattern for one frame: cycle A/B/X/Y once per second at 60 fps,
/// sweep the triggers, hold the left stick diagonally.
fn frame_input(frame: u64) -> xbox360::PadInput {
    let buttons = match (frame / 60) % 4 {
        0 => xbox360::BUTTON_A,
        1 => xbox360::BUTTON_B,
        2 => xbox360::BUTTON_X,
        _ => xbox360::BUTTON_Y,
    };
    xbox360::PadInput {
        buttons,
        lt: ((frame * 2) % 256) as u8,
        rt: ((frame * 3) % 256) as u8,
        lx: 14_142,
        ly: 14_142,
        rx: 0,
        ry: 0,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let addr = HubAddr::parse(&args.addr).context("parse hub address")?;

    let client = HubClient::connect(&addr)
        .await
        .with_context(|| format!("connect to hub at {addr}"))?;

    let bus = client.choose_or_create_bus().await.context("pick a bus")?;
    if bus.created {
        info!("created bus {}", bus.bus_id);
    } else {
        info!("using existing bus {}", bus.bus_id);
    }

    let (info, dev) = client
        .create_and_connect(bus.bus_id, xbox360::DEVICE_TYPE, DeviceCreateOptions::default())
        .await
        .context("create and connect pad")?;
    info!(
        "created and connected device {} on bus {} (type: {})",
        info.dev_id, info.bus_id, info.device_type
    );

    // Drain rumble commands from a separate task so a chatty host never
    // delays the send loop.
    let mut rumble_stream = dev.take_output_stream().context("claim output stream")?;
    let rumble_task = tokio::spawn(async move {
        while let Some(delivery) = rumble_stream.recv().await {
            for rumble in xbox360::Rumble::split(&delivery) {
                info!("<- rumble: left={} right={}", rumble.left, rumble.right);
            }
        }
        info!("rumble stream ended");
    });

    info!(
        "sending input reports every {}ms; Ctrl-C to stop",
        args.period_ms
    );
    let mut period = tokio::time::interval(Duration::from_millis(args.period_ms));
    let mut frame = 0u64;
    loop {
        tokio::select! {
            _ = period.tick() => {
                frame += 1;
                let state = frame_input(frame);
                if let Err(e) = dev.send(&state.report()).await {
                    warn!("send failed: {e}");
                    break;
                }
                if frame % 60 == 0 {
                    info!(
                        "-> sent input (frame {frame}): buttons=0x{:04x} lt={} rt={}",
                        state.buttons, state.lt, state.rt
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Remove what this run created; leave pre-existing buses alone.
    dev.close().await;
    rumble_task.abort();
    if let Err(e) = client.release_device(&info).await {
        warn!("failed to release device {}: {e}", info.dev_id);
    }
    if bus.created {
        if let Err(e) = client.remove_bus(bus.bus_id).await {
            warn!("failed to remove bus {}: {e}", bus.bus_id);
        }
    }
    client.shutdown().await;
    Ok(())
}
