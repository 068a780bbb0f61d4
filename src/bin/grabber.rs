//! Grabber Application
//!
//! Produces synthetic depth/color frames, compresses them and streams them
//! to a receiver over UDP. A local pipeline decodes the compressed frames
//! the same way a remote receiver does.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use depth_stream::{
    codec::FrameCompressor,
    config::{AppConfig, CaptureConfig},
    frame::{DeviceFrameStore, Modalities},
    io::BinaryRecord,
    network::FrameSender,
    pipeline::GrabberPipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "grabber.toml".to_string());
    let mut config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting depth grabber");

    if let Some(target) = std::env::args().nth(2) {
        config.network.target = target
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid target address {}", target))?;
    }

    let capture = config.capture.clone();
    let modalities = config.data.sent_modalities();
    tracing::info!(
        "Capture {}x{} depth, {}x{} color at {} fps, sending {:?}",
        capture.depth_width,
        capture.depth_height,
        capture.color_width,
        capture.color_height,
        capture.fps,
        modalities
    );
    tracing::debug!(
        "Color settings record: {} bytes, data settings record: {} bytes",
        config.color.to_bytes().len(),
        config.data.to_bytes().len()
    );

    let mut store = DeviceFrameStore::new();
    store.reset(
        modalities.contains(Modalities::DEPTH),
        capture.depth_width as usize * capture.depth_height as usize,
        modalities.contains(Modalities::COLOR),
        capture.color_width as usize,
        capture.color_height as usize,
    );

    let mut compressor = FrameCompressor::from_settings(&config.data);
    let mut sender = FrameSender::from_config(&config.network)?;
    let pipeline = GrabberPipeline::from_config(&config.pipeline);
    pipeline.start();

    let stale_after = Duration::from_millis(config.pipeline.stale_after_ms);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / capture.fps.max(1) as f64));
    let stats_every = u32::max(capture.fps * 5, 1);
    let mut frame_id: u32 = 0;

    tracing::info!("Streaming to {} - press Ctrl+C to stop", sender.target());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        fill_synthetic(&mut store, &capture, frame_id);
        let valid = store.update_depth_validity(capture.depth_min_mm, capture.depth_max_mm);
        let frame = store.build_frame(
            frame_id,
            now_us(),
            (capture.depth_width, capture.depth_height),
            modalities,
        );
        store.reset_spans();

        let cframe = Arc::new(compressor.compress(&frame));
        if let Err(e) = sender.send_frame(&cframe) {
            tracing::warn!("Failed to send frame {}: {}", frame_id, e);
        }
        pipeline.new_compressed_frame(cframe);

        frame_id = frame_id.wrapping_add(1);

        // Periodic stats logging
        if frame_id % stats_every == 0 {
            let codec = compressor.stats();
            let net = sender.stats();
            let health = pipeline.health();
            tracing::info!(
                "Stats: {} frames compressed (ratio {:.2}), {} datagrams, {:.1} KB sent, {} valid depth px, {} decoded",
                codec.frames_compressed,
                codec.ratio,
                net.datagrams_sent,
                net.bytes_sent as f64 / 1024.0,
                valid,
                health.decoded
            );
            if health.is_stale(stale_after) {
                tracing::warn!(
                    "Local preview is stale: {} consecutive decode failures",
                    health.consecutive_failures
                );
            }
        }
    }

    tracing::info!("Stopping grabber");
    pipeline.clean();
    Ok(())
}

/// Moving depth ramp, matching color gradient and a fake IMU sample
fn fill_synthetic(store: &mut DeviceFrameStore, capture: &CaptureConfig, frame_id: u32) {
    let width = capture.depth_width as usize;
    let height = capture.depth_height as usize;
    let phase = (frame_id % 256) as usize;

    store.spans.depth.clear();
    store.spans.depth.extend((0..width * height).map(|i| {
        let x = i % width;
        let y = i / width;
        // leave a band of zeros to exercise the validity mask
        if y < height / 16 {
            0
        } else {
            (capture.depth_min_mm as usize + ((x + phase) * 16) % 4_000) as u16
        }
    }));

    let color_width = capture.color_width.max(1) as usize;
    for (i, px) in store.converted_color_mut().iter_mut().enumerate() {
        let x = i % color_width;
        let y = i / color_width;
        *px = [(x + phase) as u8, y as u8, phase as u8, 255];
    }

    store.spans.imu.clear();
    store.spans.imu.extend_from_slice(&frame_id.to_ne_bytes());
    store.spans.imu.extend_from_slice(&[0u8; 20]);
}

fn now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or_default()
}
