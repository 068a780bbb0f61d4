//! Frame decompressor
//!
//! Rebuilds a [`Frame`] from a [`CompressedFrame`], checking every
//! decoded modality against the dimensions the frame declares.

use crate::error::CodecError;
use crate::frame::{AudioBuffer, CompressedFrame, Frame, Modalities, Rgba8, Vertex};
use crate::io::{self, Scalar};

/// Upper bound for one decoded section
const MAX_SECTION_BYTES: usize = 64 * 1024 * 1024;

/// Decoding seam used by the grabber pipeline
pub trait FrameUncompressor: Send {
    /// Decode `cframe` into a fresh frame
    fn uncompress(&mut self, cframe: &CompressedFrame) -> Result<Frame, CodecError>;
}

/// LZ4 frame decompressor
pub struct FrameDecompressor {
    /// Decompression buffer (reused to avoid allocations)
    scratch: Vec<u8>,
    /// Frames decoded
    frames_decoded: u64,
    /// Frames rejected
    frames_failed: u64,
}

impl FrameDecompressor {
    pub fn new() -> Self {
        Self {
            scratch: Vec::new(),
            frames_decoded: 0,
            frames_failed: 0,
        }
    }

    fn decode(&mut self, cframe: &CompressedFrame) -> Result<Frame, CodecError> {
        let m = cframe.modalities;
        let depth_size = cframe.depth_width as usize * cframe.depth_height as usize;
        let mut frame = Frame {
            id: cframe.id,
            capture_ts_us: cframe.capture_ts_us,
            depth_width: cframe.depth_width,
            depth_height: cframe.depth_height,
            ..Default::default()
        };

        if m.contains(Modalities::COLOR) {
            let color_size = cframe.color_width as usize * cframe.color_height as usize;
            self.lz4(&cframe.color, "color", Some(color_size * 4))?;
            frame.color_width = cframe.color_width;
            frame.color_height = cframe.color_height;
            frame.color = self
                .scratch
                .chunks_exact(4)
                .map(|px| -> Rgba8 { [px[0], px[1], px[2], px[3]] })
                .collect();
        }
        if m.contains(Modalities::DEPTH) {
            self.lz4(&cframe.depth, "depth", Some(depth_size * 2))?;
            frame.depth = decode_raw(&self.scratch);
        }
        if m.contains(Modalities::INFRA) {
            self.lz4(&cframe.infra, "infra", Some(depth_size * 2))?;
            frame.infra = decode_raw(&self.scratch);
        }
        if m.contains(Modalities::BODIES) {
            self.lz4(&cframe.bodies, "bodies", Some(depth_size))?;
            frame.body_ids = self.scratch.clone();
        }
        if m.contains(Modalities::CLOUD) {
            self.lz4(&cframe.cloud, "cloud", None)?;
            let coords: Vec<i16> = decode_raw(&self.scratch);
            if coords.len() % 3 != 0 {
                return Err(CodecError::SizeMismatch {
                    modality: "cloud",
                    expected: coords.len() - coords.len() % 3,
                    actual: coords.len(),
                });
            }
            frame.cloud = coords
                .chunks_exact(3)
                .map(|v| -> Vertex { [v[0], v[1], v[2]] })
                .collect();
        }
        if m.contains(Modalities::IMU) {
            frame.imu = cframe.imu.to_vec();
        }
        if m.contains(Modalities::AUDIO) {
            let channels = cframe.audio_channels as usize;
            let samples: Vec<f32> = decode_raw(&cframe.audio);
            if channels == 0 || cframe.audio.len() % 4 != 0 || samples.len() % channels != 0 {
                return Err(CodecError::SizeMismatch {
                    modality: "audio",
                    expected: channels.max(1) * samples.len().div_ceil(channels.max(1)),
                    actual: samples.len(),
                });
            }
            frame.audio = AudioBuffer::new(cframe.audio_channels, samples);
        }

        Ok(frame)
    }

    /// Decompress `data` into the scratch buffer
    ///
    /// The declared size must equal `expected` when the dimensions fix it,
    /// including zero. It is checked before anything is allocated.
    fn lz4(
        &mut self,
        data: &[u8],
        modality: &'static str,
        expected: Option<usize>,
    ) -> Result<(), CodecError> {
        if data.len() < 4 {
            return Err(CodecError::Truncated {
                needed: 4,
                available: data.len(),
            });
        }
        let declared = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if expected.is_some_and(|n| n != declared) || declared > MAX_SECTION_BYTES {
            return Err(CodecError::SizeMismatch {
                modality,
                expected: expected.unwrap_or(MAX_SECTION_BYTES),
                actual: declared,
            });
        }

        self.scratch.clear();
        self.scratch.resize(declared, 0);
        let written = lz4_flex::block::decompress_into(&data[4..], &mut self.scratch)
            .map_err(|e| CodecError::Decompress(format!("{modality}: {e}")))?;
        if written != declared {
            return Err(CodecError::SizeMismatch {
                modality,
                expected: declared,
                actual: written,
            });
        }
        Ok(())
    }

    /// Get statistics
    pub fn stats(&self) -> DecompressorStats {
        DecompressorStats {
            frames_decoded: self.frames_decoded,
            frames_failed: self.frames_failed,
        }
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.frames_decoded = 0;
        self.frames_failed = 0;
    }
}

impl Default for FrameDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameUncompressor for FrameDecompressor {
    fn uncompress(&mut self, cframe: &CompressedFrame) -> Result<Frame, CodecError> {
        match self.decode(cframe) {
            Ok(frame) => {
                self.frames_decoded += 1;
                Ok(frame)
            }
            Err(e) => {
                self.frames_failed += 1;
                Err(e)
            }
        }
    }
}

/// Values from a host-order byte image, trailing partial values dropped
fn decode_raw<T: Scalar + Default>(data: &[u8]) -> Vec<T> {
    let mut values = vec![T::default(); data.len() / T::SIZE];
    let mut offset = 0;
    io::read_array(&mut values, data, &mut offset);
    values
}

/// Decompressor statistics
#[derive(Debug, Clone)]
pub struct DecompressorStats {
    pub frames_decoded: u64,
    pub frames_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameCompressor;
    use bytes::Bytes;

    fn full_frame() -> Frame {
        Frame {
            id: 9,
            capture_ts_us: 77,
            color_width: 4,
            color_height: 2,
            color: (0..8).map(|i| [i as u8, 0, 255, 255]).collect(),
            depth_width: 4,
            depth_height: 4,
            depth: (0..16).map(|i| 1000 + i as u16).collect(),
            infra: vec![3000; 16],
            body_ids: vec![1; 16],
            cloud: vec![[1, -2, 3], [4, 5, -6]],
            imu: vec![7; 24],
            audio: AudioBuffer::new(2, vec![0.5, -0.5, 0.25, -0.25]),
        }
    }

    #[test]
    fn test_decode_all_modalities() {
        let frame = full_frame();
        let all = Modalities::COLOR
            | Modalities::DEPTH
            | Modalities::INFRA
            | Modalities::BODIES
            | Modalities::CLOUD
            | Modalities::IMU
            | Modalities::AUDIO;
        let cframe = FrameCompressor::new(all).compress(&frame);

        let mut decompressor = FrameDecompressor::new();
        let decoded = decompressor.uncompress(&cframe).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decompressor.stats().frames_decoded, 1);
    }

    #[test]
    fn test_corrupt_section_fails() {
        let mut cframe = FrameCompressor::new(Modalities::DEPTH).compress(&full_frame());
        cframe.depth = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0x7F, 1, 2]);

        let mut decompressor = FrameDecompressor::new();
        assert!(decompressor.uncompress(&cframe).is_err());
        assert_eq!(decompressor.stats().frames_failed, 1);
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let mut cframe = FrameCompressor::new(Modalities::DEPTH).compress(&full_frame());
        cframe.depth_width = 8;

        let err = FrameDecompressor::new().uncompress(&cframe).unwrap_err();
        assert_eq!(
            err,
            CodecError::SizeMismatch {
                modality: "depth",
                expected: 64,
                actual: 32
            }
        );
    }

    #[test]
    fn test_zero_dimensions_reject_data() {
        let mut cframe = FrameCompressor::new(Modalities::DEPTH).compress(&full_frame());
        cframe.depth_width = 0;
        cframe.depth_height = 0;

        let mut decompressor = FrameDecompressor::new();
        let err = decompressor.uncompress(&cframe).unwrap_err();
        assert_eq!(
            err,
            CodecError::SizeMismatch {
                modality: "depth",
                expected: 0,
                actual: 32
            }
        );
        assert_eq!(decompressor.stats().frames_failed, 1);
    }
}
