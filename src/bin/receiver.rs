//! Receiver Application
//!
//! Reads frame datagrams on every configured interface, reassembles and
//! decodes them, and reports stream statistics.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use depth_stream::{
    config::AppConfig,
    frame::CompressedFrame,
    network::{ReaderEvent, ReaderEventKind, UdpReaderManager},
    pipeline::GrabberPipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "receiver.toml".to_string());
    let config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting depth receiver");

    let pipeline = GrabberPipeline::from_config(&config.pipeline);
    pipeline.start();

    let mut manager = UdpReaderManager::from_config(&config.network);
    if !manager.enable_reading(config.network.port) {
        let states = manager.connection_states();
        if !states.iter().any(|&reading| reading) {
            pipeline.clean();
            bail!("no interface could be enabled on port {}", config.network.port);
        }
        tracing::warn!("Some interfaces failed to start: {:?}", states);
    }

    let stale_after = Duration::from_millis(config.pipeline.stale_after_ms);
    let mut poll = tokio::time::interval(Duration::from_millis(2));
    let mut report = tokio::time::interval(Duration::from_secs(5));

    tracing::info!("Receiving on port {} - press Ctrl+C to stop", config.network.port);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {
                while let Ok(event) = manager.events().try_recv() {
                    handle_event(event, &pipeline);
                }
            }
            _ = report.tick() => {
                let health = pipeline.health();
                let latest = pipeline.get_frame().map(|f| f.id);
                for (index, stats) in manager.stats().iter().enumerate() {
                    tracing::info!(
                        "Interface {}: {} datagrams, {:.1} KB, {} frames, {} dropped, {} late, {} invalid",
                        index,
                        stats.datagrams,
                        stats.bytes as f64 / 1024.0,
                        stats.frames_completed,
                        stats.frames_dropped,
                        stats.late_packets,
                        stats.invalid_packets
                    );
                }
                tracing::info!(
                    "Decoded {} frames ({} failed, {} overwritten), latest {:?}",
                    health.decoded,
                    health.decode_failures,
                    health.overwritten,
                    latest
                );
                if health.is_stale(stale_after) {
                    tracing::warn!("No frame decoded within {:?}", stale_after);
                }
            }
        }
    }

    tracing::info!("Stopping receiver");
    manager.disable_reading();
    pipeline.clean();
    Ok(())
}

fn handle_event(event: ReaderEvent, pipeline: &GrabberPipeline) {
    let interface = event.interface;
    match event.kind {
        ReaderEventKind::Payload { frame_id, data, .. } => {
            match CompressedFrame::init_from_data(&data) {
                Ok(cframe) => pipeline.new_compressed_frame(Arc::new(cframe)),
                Err(e) => tracing::warn!("Interface {}: bad payload for frame {}: {}", interface, frame_id, e),
            }
        }
        ReaderEventKind::ConnectionState(reading) => {
            tracing::info!("Interface {} reading: {}", interface, reading);
        }
        ReaderEventKind::Message(message) => tracing::info!("Interface {}: {}", interface, message),
        ReaderEventKind::Error(error) => tracing::error!("Interface {}: {}", interface, error),
        ReaderEventKind::FrameDropped {
            frame_id,
            received,
            expected,
        } => {
            tracing::debug!(
                "Interface {}: frame {} dropped with {}/{} packets",
                interface,
                frame_id,
                received,
                expected
            );
        }
        ReaderEventKind::PacketsReceived { .. } => {}
        ReaderEventKind::Timeout => tracing::trace!("Interface {}: no data", interface),
    }
}
