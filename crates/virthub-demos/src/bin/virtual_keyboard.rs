//! Reference client: a virtual keyboard that types "Hello!" and Enter
//! every few seconds and prints LED state changes pushed by the host.
//!
//! Flow:
//! 1. Pick the lowest existing bus, or create one.
//! 2. Create and connect a `"keyboard"` device in one call.
//! 3. Register an LED callback. LED records are 1 byte each and may
//!    arrive coalesced, so the callback splits the delivery itself.
//! 4. Type on a fixed period until Ctrl-C, then clean up what we created.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use virthub_client::{DeviceCreateOptions, DeviceHandle, HubAddr, HubClient};
use virthub_core::devices::keyboard;

#[derive(Parser)]
#[command(about = "Virtual keyboard demo for a virthub hub")]
struct Args {
    /// Hub address as host:port.
    #[arg(env = "VIRTHUB_ADDR", default_value = "127.0.0.1:3242")]
    addr: String,

    /// Seconds between typed greetings.
    #[arg(long, default_value_t = 5)]
    period_secs: u64,
}

/// Presses the given key chord, then releases everything.
async fn press_and_release(dev: &DeviceHandle, modifiers: u8, key: u8) -> anyhow::Result<()> {
    let mut input = keyboard::KeyboardInput::new();
    input.modifiers = modifiers;
    input.press(key);
    dev.send(&input.report()).await.context("send key press")?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    input.clear();
    dev.send(&input.report()).await.context("send key release")?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

async fn type_greeting(dev: &DeviceHandle) -> anyhow::Result<()> {
    // H e l l o !
    press_and_release(dev, keyboard::MOD_LEFT_SHIFT, keyboard::KEY_H).await?;
    for key in [
        keyboard::KEY_E,
        keyboard::KEY_L,
        keyboard::KEY_L,
        keyboard::KEY_O,
    ] {
        press_and_release(dev, 0, key).await?;
    }
    // '!' is Shift + '1'
    press_and_release(dev, keyboard::MOD_LEFT_SHIFT, keyboard::KEY_1).await?;
    press_and_release(dev, 0, keyboard::KEY_ENTER).await?;
    Ok(())
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
        .create_and_connect(bus.bus_id, keyboard::DEVICE_TYPE, DeviceCreateOptions::default())
        .await
        .context("create and connect keyboard")?;
    info!(
        "created and connected device {} on bus {} (type: {})",
        info.dev_id, info.bus_id, info.device_type
    );

    dev.register_output(|delivery| {
        for leds in keyboard::LedState::split(delivery) {
            info!(
                "<- LEDs: num={} caps={} scroll={} compose={} kana={}",
                leds.num_lock, leds.caps_lock, leds.scroll_lock, leds.compose, leds.kana
            );
        }
    })
    .context("register LED callback")?;

    info!(
        "typing 'Hello!' + Enter every {}s; Ctrl-C to stop",
        args.period_secs
    );
    let mut period = tokio::time::interval(Duration::from_secs(args.period_secs));
    loop {
        tokio::select! {
            _ = period.tick() => {
                if let Err(e) = type_greeting(&dev).await {
                    warn!("typing failed: {e}");
                    break;
                }
                info!("-> typed: Hello!");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Remove what this run created; leave pre-existing buses alone.
    dev.close().await;
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
