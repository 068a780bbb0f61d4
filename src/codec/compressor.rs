//! Frame compressor
//!
//! Produces the [`CompressedFrame`] sent to remote consumers from a
//! decoded [`Frame`], keeping only the configured modalities.

use bytes::Bytes;

use crate::frame::{CompressedFrame, Frame, Modalities};
use crate::io::{self, Scalar};
use crate::settings::DataSettings;

/// LZ4 frame compressor
pub struct FrameCompressor {
    /// Modalities kept in compressed output
    modalities: Modalities,
    /// Scratch buffer (reused to avoid allocations)
    scratch: Vec<u8>,
    /// Frames compressed
    frames_compressed: u64,
    /// Total uncompressed bytes consumed
    bytes_in: u64,
    /// Total compressed bytes produced
    bytes_out: u64,
}

impl FrameCompressor {
    /// Create a compressor keeping `modalities`
    pub fn new(modalities: Modalities) -> Self {
        Self {
            modalities,
            scratch: Vec::new(),
            frames_compressed: 0,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Create a compressor for what the data settings send
    pub fn from_settings(settings: &DataSettings) -> Self {
        Self::new(settings.sent_modalities())
    }

    /// Change the kept modalities
    pub fn set_modalities(&mut self, modalities: Modalities) {
        self.modalities = modalities;
    }

    pub fn modalities(&self) -> Modalities {
        self.modalities
    }

    /// Compress a decoded frame
    ///
    /// Modalities that are configured but empty in `frame` are left out.
    pub fn compress(&mut self, frame: &Frame) -> CompressedFrame {
        let wanted = self.modalities;
        let mut cframe = CompressedFrame {
            id: frame.id,
            capture_ts_us: frame.capture_ts_us,
            ..Default::default()
        };

        if wanted.contains(Modalities::COLOR) && !frame.color.is_empty() {
            cframe.color_width = frame.color_width;
            cframe.color_height = frame.color_height;
            cframe.color = self.lz4(frame.color.as_flattened());
            cframe.modalities.insert(Modalities::COLOR);
        }

        let has_depth_dims = frame.depth_size() > 0;
        if has_depth_dims {
            cframe.depth_width = frame.depth_width;
            cframe.depth_height = frame.depth_height;
        }
        if wanted.contains(Modalities::DEPTH) && !frame.depth.is_empty() {
            cframe.depth = self.lz4(&frame.depth);
            cframe.modalities.insert(Modalities::DEPTH);
        }
        if wanted.contains(Modalities::INFRA) && !frame.infra.is_empty() {
            cframe.infra = self.lz4(&frame.infra);
            cframe.modalities.insert(Modalities::INFRA);
        }
        if wanted.contains(Modalities::BODIES) && !frame.body_ids.is_empty() {
            cframe.bodies = self.lz4(&frame.body_ids);
            cframe.modalities.insert(Modalities::BODIES);
        }
        if wanted.contains(Modalities::CLOUD) && !frame.cloud.is_empty() {
            cframe.cloud = self.lz4(frame.cloud.as_flattened());
            cframe.modalities.insert(Modalities::CLOUD);
        }
        if wanted.contains(Modalities::IMU) && !frame.imu.is_empty() {
            self.bytes_in += frame.imu.len() as u64;
            cframe.imu = Bytes::copy_from_slice(&frame.imu);
            cframe.modalities.insert(Modalities::IMU);
        }
        if wanted.contains(Modalities::AUDIO) && !frame.audio.is_empty() {
            encode_raw(&frame.audio.samples, &mut self.scratch);
            self.bytes_in += self.scratch.len() as u64;
            cframe.audio_channels = frame.audio.channels;
            cframe.audio = Bytes::copy_from_slice(&self.scratch);
            cframe.modalities.insert(Modalities::AUDIO);
        }

        self.frames_compressed += 1;
        self.bytes_out += cframe.size() as u64;
        cframe
    }

    fn lz4<T: Scalar>(&mut self, values: &[T]) -> Bytes {
        encode_raw(values, &mut self.scratch);
        self.bytes_in += self.scratch.len() as u64;
        Bytes::from(lz4_flex::compress_prepend_size(&self.scratch))
    }

    /// Get statistics
    pub fn stats(&self) -> CompressorStats {
        CompressorStats {
            frames_compressed: self.frames_compressed,
            bytes_in: self.bytes_in,
            bytes_out: self.bytes_out,
            ratio: if self.bytes_in > 0 {
                self.bytes_out as f32 / self.bytes_in as f32
            } else {
                1.0
            },
        }
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.frames_compressed = 0;
        self.bytes_in = 0;
        self.bytes_out = 0;
    }
}

/// Host-order byte image of `values`
fn encode_raw<T: Scalar>(values: &[T], out: &mut Vec<u8>) {
    out.clear();
    out.resize(values.len() * T::SIZE, 0);
    let mut offset = 0;
    io::write_array(values, out, &mut offset);
}

/// Compressor statistics
#[derive(Debug, Clone)]
pub struct CompressorStats {
    pub frames_compressed: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Compressed over uncompressed size
    pub ratio: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::AudioBuffer;

    fn depth_frame() -> Frame {
        Frame {
            id: 5,
            capture_ts_us: 1234,
            depth_width: 32,
            depth_height: 24,
            depth: (0..32 * 24).map(|i| 800 + (i % 32) as u16).collect(),
            color_width: 8,
            color_height: 8,
            color: vec![[10, 20, 30, 255]; 64],
            audio: AudioBuffer::new(1, vec![0.25; 48]),
            ..Default::default()
        }
    }

    #[test]
    fn test_only_configured_modalities() {
        let mut compressor = FrameCompressor::new(Modalities::DEPTH);
        let cframe = compressor.compress(&depth_frame());
        assert_eq!(cframe.modalities(), Modalities::DEPTH);
        assert!(cframe.color.is_empty());
        assert!(cframe.audio.is_empty());
        assert_eq!(cframe.depth_dimensions(), (32, 24));
        assert_eq!(cframe.id(), 5);
    }

    #[test]
    fn test_empty_modalities_skipped() {
        let mut compressor = FrameCompressor::new(Modalities::DEPTH | Modalities::INFRA);
        let cframe = compressor.compress(&depth_frame());
        assert!(!cframe.modalities().contains(Modalities::INFRA));
    }

    #[test]
    fn test_depth_is_compressed() {
        let mut compressor = FrameCompressor::new(Modalities::DEPTH | Modalities::COLOR);
        let cframe = compressor.compress(&depth_frame());
        assert!(cframe.depth.len() < 32 * 24 * 2);

        let stats = compressor.stats();
        assert_eq!(stats.frames_compressed, 1);
        assert!(stats.ratio < 1.0);
    }
}
