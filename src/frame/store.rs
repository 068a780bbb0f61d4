//! Per-session capture buffers
//!
//! The store owns two kinds of storage:
//! - data spans, refilled by the capture device on every frame and emptied
//!   with [`DeviceFrameStore::reset_spans`]
//! - processing buffers sized to the active capture mode, reallocated with
//!   [`DeviceFrameStore::reset`] whenever that mode changes
//!
//! `reset` trusts its arguments: flag/size consistency is the caller's
//! contract.

use super::{AudioBuffer, Frame, Modalities, Rgba8, Vertex};

/// Data written by the capture device for the current frame
#[derive(Debug, Default)]
pub struct FrameSpans {
    /// Device-native color bytes
    pub raw_color: Vec<u8>,
    /// Color resampled to the depth resolution
    pub resized_color: Vec<Rgba8>,
    pub depth: Vec<u16>,
    pub infra: Vec<u16>,
    pub body_ids: Vec<u8>,
    pub cloud: Vec<Vertex>,
    pub imu: Vec<u8>,
    pub audio: AudioBuffer,
}

impl FrameSpans {
    /// Empty every span, capacity is kept
    pub fn clear(&mut self) {
        self.raw_color.clear();
        self.resized_color.clear();
        self.depth.clear();
        self.infra.clear();
        self.body_ids.clear();
        self.cloud.clear();
        self.imu.clear();
        self.audio.clear();
    }
}

/// Capture buffers owned by one capture session
#[derive(Debug, Default)]
pub struct DeviceFrameStore {
    pub spans: FrameSpans,

    // processing
    depth_mask: Vec<bool>,
    filtering_mask: Vec<u8>,
    depth_filtering: Vec<u16>,
    zones: Vec<i16>,
    hsv_diff_mask: Vec<u8>,
    converted_color: Vec<Rgba8>,
    color_width: usize,
    color_height: usize,
}

impl DeviceFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize processing buffers for a new capture mode
    pub fn reset(
        &mut self,
        has_depth: bool,
        depth_size: usize,
        has_color: bool,
        color_width: usize,
        color_height: usize,
    ) {
        if has_depth {
            self.depth_mask.resize(depth_size, false);
            self.filtering_mask.resize(depth_size, 0);
            self.depth_filtering.resize(depth_size, 0);
            self.zones.resize(depth_size, 0);
        } else {
            self.depth_mask.clear();
            self.filtering_mask.clear();
            self.depth_filtering.clear();
            self.zones.clear();
        }

        if has_color {
            self.converted_color.resize(color_width * color_height, [0; 4]);
            self.color_width = color_width;
            self.color_height = color_height;
        } else {
            self.converted_color = Vec::new();
            self.color_width = 0;
            self.color_height = 0;
        }

        if has_depth && has_color {
            self.hsv_diff_mask.resize(depth_size, 0);
        } else {
            self.hsv_diff_mask.clear();
        }

        tracing::debug!(
            has_depth,
            depth_size,
            has_color,
            color_width,
            color_height,
            "capture buffers reset"
        );
    }

    /// Drop the current frame's data, processing buffers untouched
    ///
    /// The converted color of a frame lives in `spans.resized_color` and is
    /// cleared here with the other spans. [`converted_color`] is a
    /// processing buffer: `reset` sizes it and it keeps its contents.
    ///
    /// [`converted_color`]: Self::converted_color
    pub fn reset_spans(&mut self) {
        self.spans.clear();
    }

    pub fn depth_mask(&self) -> &[bool] {
        &self.depth_mask
    }

    pub fn filtering_mask(&self) -> &[u8] {
        &self.filtering_mask
    }

    pub fn filtering_mask_mut(&mut self) -> &mut [u8] {
        &mut self.filtering_mask
    }

    pub fn depth_filtering(&self) -> &[u16] {
        &self.depth_filtering
    }

    pub fn zones(&self) -> &[i16] {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut [i16] {
        &mut self.zones
    }

    pub fn hsv_diff_mask(&self) -> &[u8] {
        &self.hsv_diff_mask
    }

    pub fn converted_color(&self) -> &[Rgba8] {
        &self.converted_color
    }

    /// Conversion target for the raw color span
    pub fn converted_color_mut(&mut self) -> &mut [Rgba8] {
        &mut self.converted_color
    }

    pub fn color_dimensions(&self) -> (usize, usize) {
        (self.color_width, self.color_height)
    }

    /// Mark depth pixels inside `[min_mm, max_mm]` as valid
    ///
    /// Returns the number of valid pixels. The working copy used by later
    /// filters is refreshed from the depth span at the same time.
    pub fn update_depth_validity(&mut self, min_mm: u16, max_mm: u16) -> usize {
        let mut valid = 0;
        for ((mask, filtered), &depth) in self
            .depth_mask
            .iter_mut()
            .zip(self.depth_filtering.iter_mut())
            .zip(self.spans.depth.iter())
        {
            *mask = depth != 0 && depth >= min_mm && depth <= max_mm;
            *filtered = depth;
            if *mask {
                valid += 1;
            }
        }
        valid
    }

    /// Build a decoded frame from the current spans
    ///
    /// Depth pixels rejected by the validity mask are zeroed.
    pub fn build_frame(
        &self,
        id: u32,
        capture_ts_us: i64,
        depth_dimensions: (u16, u16),
        modalities: Modalities,
    ) -> Frame {
        let mut frame = Frame {
            id,
            capture_ts_us,
            ..Default::default()
        };

        if modalities.contains(Modalities::COLOR) && !self.converted_color.is_empty() {
            frame.color_width = self.color_width as u16;
            frame.color_height = self.color_height as u16;
            frame.color = self.converted_color.clone();
        }
        if modalities.contains(Modalities::DEPTH) && !self.spans.depth.is_empty() {
            (frame.depth_width, frame.depth_height) = depth_dimensions;
            frame.depth = if self.depth_mask.len() == self.spans.depth.len() {
                self.spans
                    .depth
                    .iter()
                    .zip(&self.depth_mask)
                    .map(|(&d, &valid)| if valid { d } else { 0 })
                    .collect()
            } else {
                self.spans.depth.clone()
            };
        }
        if modalities.contains(Modalities::INFRA) {
            frame.infra = self.spans.infra.clone();
        }
        if modalities.contains(Modalities::BODIES) {
            frame.body_ids = self.spans.body_ids.clone();
        }
        if modalities.contains(Modalities::CLOUD) {
            frame.cloud = self.spans.cloud.clone();
        }
        if modalities.contains(Modalities::IMU) {
            frame.imu = self.spans.imu.clone();
        }
        if modalities.contains(Modalities::AUDIO) {
            frame.audio = self.spans.audio.clone();
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_depth_and_color() {
        let mut store = DeviceFrameStore::new();
        store.reset(true, 100, true, 10, 10);
        assert_eq!(store.depth_mask().len(), 100);
        assert_eq!(store.filtering_mask().len(), 100);
        assert_eq!(store.depth_filtering().len(), 100);
        assert_eq!(store.zones().len(), 100);
        assert_eq!(store.converted_color().len(), 100);
        assert_eq!(store.hsv_diff_mask().len(), 100);
        assert_eq!(store.color_dimensions(), (10, 10));
    }

    #[test]
    fn test_reset_nothing() {
        let mut store = DeviceFrameStore::new();
        store.reset(true, 100, true, 10, 10);
        store.reset(false, 100, false, 10, 10);
        assert!(store.depth_mask().is_empty());
        assert!(store.filtering_mask().is_empty());
        assert!(store.depth_filtering().is_empty());
        assert!(store.zones().is_empty());
        assert!(store.converted_color().is_empty());
        assert!(store.hsv_diff_mask().is_empty());
        assert_eq!(store.color_dimensions(), (0, 0));
    }

    #[test]
    fn test_hsv_mask_needs_both() {
        let mut store = DeviceFrameStore::new();
        store.reset(true, 64, false, 8, 8);
        assert_eq!(store.depth_mask().len(), 64);
        assert!(store.hsv_diff_mask().is_empty());

        store.reset(false, 64, true, 8, 8);
        assert!(store.depth_mask().is_empty());
        assert_eq!(store.converted_color().len(), 64);
        assert!(store.hsv_diff_mask().is_empty());
    }

    #[test]
    fn test_reset_spans_keeps_processing_buffers() {
        let mut store = DeviceFrameStore::new();
        store.reset(true, 16, true, 4, 4);
        store.spans.depth = vec![500; 16];
        store.spans.imu = vec![1; 32];
        store.spans.audio = AudioBuffer::new(2, vec![0.5; 8]);
        store.spans.raw_color = vec![9; 64];
        store.spans.resized_color = vec![[1, 2, 3, 255]; 16];
        store.converted_color_mut()[0] = [4, 5, 6, 255];
        let depth_capacity = store.spans.depth.capacity();

        store.reset_spans();

        assert!(store.spans.depth.is_empty());
        assert!(store.spans.imu.is_empty());
        assert!(store.spans.audio.is_empty());
        assert_eq!(store.spans.depth.capacity(), depth_capacity);
        assert_eq!(store.depth_mask().len(), 16);
        assert!(store.spans.raw_color.is_empty());
        assert!(store.spans.resized_color.is_empty());
        assert_eq!(store.converted_color().len(), 16);
        assert_eq!(store.converted_color()[0], [4, 5, 6, 255]);
    }

    #[test]
    fn test_depth_validity_and_frame() {
        let mut store = DeviceFrameStore::new();
        store.reset(true, 4, false, 0, 0);
        store.spans.depth = vec![0, 400, 1200, 9000];

        assert_eq!(store.update_depth_validity(300, 5000), 2);
        assert_eq!(store.depth_mask(), &[false, true, true, false]);

        let frame = store.build_frame(3, 10, (2, 2), Modalities::DEPTH | Modalities::COLOR);
        assert_eq!(frame.depth, vec![0, 400, 1200, 0]);
        assert_eq!(frame.depth_size(), 4);
        assert!(frame.color.is_empty());
        assert_eq!(frame.modalities(), Modalities::DEPTH);
    }
}
