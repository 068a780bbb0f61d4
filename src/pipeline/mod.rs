//! Grabber data pipeline
//!
//! Hands frames from the capture thread to a background decode worker
//! without blocking either side:
//!
//! ```text
//!  capture thread            decode worker              readers
//!  ──────────────            ─────────────              ───────
//!  new_compressed_frame ──▶ [pending] ──take──▶ uncompress
//!                                                  │
//!  new_frame ────────────▶ [pending] ──take──┐     ▼
//!                                            └─▶ [published] ◀── get_frame
//! ```
//!
//! Every slot holds at most one value and a new value overwrites an
//! unconsumed one. The slot lock only covers pointer swaps; decoding runs
//! with no lock held on the slots.
//!
//! Each `new_*` call takes a sequence number. A decoded frame is only
//! published if no later direct frame was published in the meantime, so
//! the published frame is always the most recently supplied one.

pub mod health;

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::codec::{FrameDecompressor, FrameUncompressor};
use crate::config::PipelineConfig;
use crate::frame::{CompressedFrame, Frame};

pub use health::PipelineHealth;

#[derive(Default)]
struct Slots {
    pending_compressed: Option<(u64, Arc<CompressedFrame>)>,
    pending_frame: Option<(u64, Arc<Frame>)>,
    compressed: Option<Arc<CompressedFrame>>,
    frame: Option<Arc<Frame>>,
    /// Sequence number of the supply that produced `frame`
    frame_seq: u64,
    next_seq: u64,
}

impl Slots {
    fn has_pending(&self) -> bool {
        self.pending_compressed.is_some() || self.pending_frame.is_some()
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Publish `frame` unless a later supply is already published
    fn publish(&mut self, seq: u64, frame: Arc<Frame>) -> bool {
        if seq < self.frame_seq {
            return false;
        }
        self.frame = Some(frame);
        self.frame_seq = seq;
        true
    }
}

struct Shared {
    slots: Mutex<Slots>,
    wake: Condvar,
    running: AtomicBool,
    health: Mutex<PipelineHealth>,
}

/// Producer/consumer frame pipeline with one decode worker
pub struct GrabberPipeline {
    shared: Arc<Shared>,
    decoder: Arc<Mutex<Box<dyn FrameUncompressor>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    idle_wait: Duration,
}

impl GrabberPipeline {
    /// Create a stopped pipeline around `decoder`
    pub fn new(decoder: impl FrameUncompressor + 'static, idle_wait: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(Slots::default()),
                wake: Condvar::new(),
                running: AtomicBool::new(false),
                health: Mutex::new(PipelineHealth::default()),
            }),
            decoder: Arc::new(Mutex::new(Box::new(decoder))),
            worker: Mutex::new(None),
            idle_wait,
        }
    }

    /// Create a pipeline decoding with [`FrameDecompressor`]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            FrameDecompressor::new(),
            Duration::from_millis(config.idle_wait_ms.max(1)),
        )
    }

    /// Spawn the decode worker if it is not running
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let shared = self.shared.clone();
        let decoder = self.decoder.clone();
        let idle_wait = self.idle_wait;

        match thread::Builder::new()
            .name("grabber-decode".into())
            .spawn(move || decode_loop(shared, decoder, idle_wait))
        {
            Ok(handle) => {
                *worker = Some(handle);
                tracing::debug!("decode worker started");
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                tracing::error!("Failed to spawn decode worker: {}", e);
            }
        }
    }

    /// Stop the decode worker and wait for it to exit
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        self.shared.running.store(false, Ordering::SeqCst);
        {
            // notify under the lock so the worker cannot miss the wakeup
            let _slots = self.shared.slots.lock();
            self.shared.wake.notify_all();
        }

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::error!("decode worker panicked");
            }
            tracing::debug!("decode worker stopped");
        }
    }

    /// Stop the worker and drop every pending and published value
    pub fn clean(&self) {
        self.stop();
        *self.shared.slots.lock() = Slots::default();
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Queue the latest compressed frame for decoding
    ///
    /// A pending frame the worker has not taken yet is overwritten.
    pub fn new_compressed_frame(&self, cframe: Arc<CompressedFrame>) {
        let overwritten = {
            let mut slots = self.shared.slots.lock();
            let seq = slots.next_seq();
            let previous = slots.pending_compressed.replace((seq, cframe));
            self.shared.wake.notify_one();
            previous.is_some()
        };
        if overwritten {
            self.shared.health.lock().overwritten += 1;
        }
    }

    /// Publish an already decoded frame
    pub fn new_frame(&self, frame: Arc<Frame>) {
        let mut slots = self.shared.slots.lock();
        let seq = slots.next_seq();
        slots.pending_frame = Some((seq, frame));
        self.shared.wake.notify_one();
    }

    /// Latest published frame
    pub fn get_frame(&self) -> Option<Arc<Frame>> {
        self.shared.slots.lock().frame.clone()
    }

    /// Latest compressed frame taken by the worker
    pub fn get_compressed_frame(&self) -> Option<Arc<CompressedFrame>> {
        self.shared.slots.lock().compressed.clone()
    }

    pub fn invalid_frame(&self) {
        self.shared.slots.lock().frame = None;
    }

    pub fn invalid_compressed_frame(&self) {
        self.shared.slots.lock().compressed = None;
    }

    /// Decode health snapshot
    pub fn health(&self) -> PipelineHealth {
        self.shared.health.lock().clone()
    }
}

impl Drop for GrabberPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decode_loop(
    shared: Arc<Shared>,
    decoder: Arc<Mutex<Box<dyn FrameUncompressor>>>,
    idle_wait: Duration,
) {
    while shared.running.load(Ordering::SeqCst) {
        let to_decode = {
            let mut slots = shared.slots.lock();
            if !slots.has_pending() && shared.running.load(Ordering::SeqCst) {
                shared.wake.wait_for(&mut slots, idle_wait);
            }

            if let Some((seq, frame)) = slots.pending_frame.take() {
                slots.publish(seq, frame);
            }
            let pending = slots.pending_compressed.take();
            if let Some((_, cframe)) = &pending {
                slots.compressed = Some(cframe.clone());
            }
            pending
        };

        let Some((seq, cframe)) = to_decode else {
            continue;
        };

        let decoded = decoder.lock().uncompress(&cframe);
        match decoded {
            Ok(frame) => {
                let published = shared.slots.lock().publish(seq, Arc::new(frame));
                if !published {
                    tracing::trace!("Decoded frame {} superseded by a direct frame", cframe.id());
                }
                shared.health.lock().record_success();
            }
            Err(e) => {
                let mut health = shared.health.lock();
                health.record_failure();
                if health.consecutive_failures == 1 {
                    tracing::warn!("Failed to decode frame {}: {}", cframe.id(), e);
                } else {
                    tracing::debug!(
                        "Failed to decode frame {} ({} in a row): {}",
                        cframe.id(),
                        health.consecutive_failures,
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use std::time::Instant;

    /// Decoder recording every id it sees, failing on `fail_ids`
    struct RecordingDecoder {
        seen: Arc<Mutex<Vec<u32>>>,
        fail_ids: Vec<u32>,
    }

    impl FrameUncompressor for RecordingDecoder {
        fn uncompress(&mut self, cframe: &CompressedFrame) -> Result<Frame, CodecError> {
            self.seen.lock().push(cframe.id());
            if self.fail_ids.contains(&cframe.id()) {
                return Err(CodecError::Decompress("corrupt".into()));
            }
            Ok(Frame {
                id: cframe.id(),
                ..Default::default()
            })
        }
    }

    fn pipeline(fail_ids: Vec<u32>) -> (GrabberPipeline, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let decoder = RecordingDecoder {
            seen: seen.clone(),
            fail_ids,
        };
        (GrabberPipeline::new(decoder, Duration::from_millis(1)), seen)
    }

    fn cframe(id: u32) -> Arc<CompressedFrame> {
        Arc::new(CompressedFrame {
            id,
            ..Default::default()
        })
    }

    fn direct(id: u32) -> Arc<Frame> {
        Arc::new(Frame {
            id,
            ..Default::default()
        })
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn frame_id(p: &GrabberPipeline) -> Option<u32> {
        p.get_frame().map(|f| f.id)
    }

    #[test]
    fn test_empty_before_first_frame() {
        let (p, _) = pipeline(vec![]);
        assert!(p.get_frame().is_none());
        assert!(p.get_compressed_frame().is_none());
    }

    #[test]
    fn test_latest_frame_wins() {
        let (p, _) = pipeline(vec![]);
        p.start();
        for id in 1..=20 {
            p.new_compressed_frame(cframe(id));
        }
        assert!(wait_until(|| frame_id(&p) == Some(20)));

        // settled: nothing older shows up afterwards
        thread::sleep(Duration::from_millis(20));
        assert_eq!(frame_id(&p), Some(20));
        assert_eq!(p.get_compressed_frame().map(|c| c.id()), Some(20));
        p.stop();
    }

    #[test]
    fn test_pending_frame_is_overwritten() {
        let (p, seen) = pipeline(vec![]);
        p.new_compressed_frame(cframe(1));
        p.new_compressed_frame(cframe(2));
        p.start();

        assert!(wait_until(|| frame_id(&p) == Some(2)));
        p.stop();
        assert_eq!(*seen.lock(), vec![2]);
        assert_eq!(p.health().overwritten, 1);
    }

    #[test]
    fn test_restart_joins_worker() {
        let (p, _) = pipeline(vec![]);
        p.start();
        p.start();
        p.stop();
        assert!(!p.is_running());
        assert_eq!(Arc::strong_count(&p.shared), 1);

        p.start();
        p.new_compressed_frame(cframe(4));
        assert!(wait_until(|| frame_id(&p) == Some(4)));
        p.stop();
        p.stop();
        assert_eq!(Arc::strong_count(&p.shared), 1);
    }

    #[test]
    fn test_decode_failure_keeps_last_good() {
        let (p, _) = pipeline(vec![2]);
        p.start();
        p.new_compressed_frame(cframe(1));
        assert!(wait_until(|| frame_id(&p) == Some(1)));

        p.new_compressed_frame(cframe(2));
        assert!(wait_until(|| p.health().decode_failures == 1));
        assert_eq!(frame_id(&p), Some(1));
        assert_eq!(p.health().consecutive_failures, 1);
        p.stop();
    }

    #[test]
    fn test_direct_frame_bypasses_decoder() {
        let (p, seen) = pipeline(vec![]);
        p.start();
        p.new_frame(direct(11));
        assert!(wait_until(|| frame_id(&p) == Some(11)));
        p.stop();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_direct_frame_after_compressed_wins() {
        let (p, _) = pipeline(vec![]);
        p.new_compressed_frame(cframe(1));
        p.new_frame(direct(2));
        p.start();

        assert!(wait_until(|| p.health().decoded == 1));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(frame_id(&p), Some(2));
        p.stop();
    }

    #[test]
    fn test_compressed_after_direct_frame_wins() {
        let (p, _) = pipeline(vec![]);
        p.new_frame(direct(1));
        p.new_compressed_frame(cframe(2));
        p.start();

        assert!(wait_until(|| frame_id(&p) == Some(2)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(frame_id(&p), Some(2));
        p.stop();
    }

    #[test]
    fn test_snapshot_outlives_invalidation() {
        let (p, _) = pipeline(vec![]);
        p.start();
        p.new_compressed_frame(cframe(3));
        assert!(wait_until(|| frame_id(&p) == Some(3)));

        let held = p.get_frame().unwrap();
        p.invalid_frame();
        p.invalid_compressed_frame();
        assert!(p.get_frame().is_none());
        assert!(p.get_compressed_frame().is_none());
        assert_eq!(held.id, 3);
        p.clean();
    }
}
