//! Frame types shared by capture, codec, pipeline and network
//!
//! A [`Frame`] is a decoded multi-modality sample. A [`CompressedFrame`] is
//! its encoded counterpart and doubles as the payload carried over UDP.
//! Both are shared as `Arc` handles once published and never mutated
//! afterwards.

pub mod store;

use bytes::Bytes;

use crate::error::CodecError;
use crate::io;

pub use store::DeviceFrameStore;

/// RGBA pixel
pub type Rgba8 = [u8; 4];

/// Point cloud vertex in millimetres
pub type Vertex = [i16; 3];

/// Set of modalities present in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Modalities(u16);

impl Modalities {
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);
    pub const INFRA: Self = Self(1 << 2);
    pub const BODIES: Self = Self(1 << 3);
    pub const CLOUD: Self = Self(1 << 4);
    pub const IMU: Self = Self(1 << 5);
    pub const AUDIO: Self = Self(1 << 6);

    const ALL_BITS: u16 = 0x7F;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Unknown bits are dropped
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Modalities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Interleaved audio samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBuffer {
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(channels: u16, samples: Vec<f32>) -> Self {
        Self { channels, samples }
    }

    /// Get number of samples per channel
    pub fn samples_per_channel(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn clear(&mut self) {
        self.channels = 0;
        self.samples.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decoded capture sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub id: u32,
    /// Capture timestamp in microseconds since the epoch
    pub capture_ts_us: i64,
    pub color_width: u16,
    pub color_height: u16,
    pub color: Vec<Rgba8>,
    pub depth_width: u16,
    pub depth_height: u16,
    pub depth: Vec<u16>,
    pub infra: Vec<u16>,
    pub body_ids: Vec<u8>,
    pub cloud: Vec<Vertex>,
    pub imu: Vec<u8>,
    pub audio: AudioBuffer,
}

impl Frame {
    pub fn color_size(&self) -> usize {
        self.color_width as usize * self.color_height as usize
    }

    pub fn depth_size(&self) -> usize {
        self.depth_width as usize * self.depth_height as usize
    }

    /// Modalities holding data
    pub fn modalities(&self) -> Modalities {
        let mut m = Modalities::empty();
        let present = [
            (!self.color.is_empty(), Modalities::COLOR),
            (!self.depth.is_empty(), Modalities::DEPTH),
            (!self.infra.is_empty(), Modalities::INFRA),
            (!self.body_ids.is_empty(), Modalities::BODIES),
            (!self.cloud.is_empty(), Modalities::CLOUD),
            (!self.imu.is_empty(), Modalities::IMU),
            (!self.audio.is_empty(), Modalities::AUDIO),
        ];
        for (has, flag) in present {
            if has {
                m.insert(flag);
            }
        }
        m
    }
}

/// Encoded capture sample
///
/// Constructed by the compressor or parsed from a reassembled network
/// payload; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressedFrame {
    pub(crate) id: u32,
    pub(crate) capture_ts_us: i64,
    pub(crate) modalities: Modalities,
    pub(crate) color_width: u16,
    pub(crate) color_height: u16,
    pub(crate) depth_width: u16,
    pub(crate) depth_height: u16,
    pub(crate) audio_channels: u16,
    pub(crate) color: Bytes,
    pub(crate) depth: Bytes,
    pub(crate) infra: Bytes,
    pub(crate) bodies: Bytes,
    pub(crate) cloud: Bytes,
    pub(crate) imu: Bytes,
    pub(crate) audio: Bytes,
}

impl CompressedFrame {
    /// Fixed part of the wire payload: id, timestamp, modalities, five u16 sizes
    pub const INFOS_SIZE: usize = 4 + 8 + 2 + 2 * 5;

    const SECTION_COUNT: usize = 7;

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn capture_ts_us(&self) -> i64 {
        self.capture_ts_us
    }

    pub fn modalities(&self) -> Modalities {
        self.modalities
    }

    pub fn color_dimensions(&self) -> (u16, u16) {
        (self.color_width, self.color_height)
    }

    pub fn depth_dimensions(&self) -> (u16, u16) {
        (self.depth_width, self.depth_height)
    }

    fn sections(&self) -> [&Bytes; Self::SECTION_COUNT] {
        [
            &self.color,
            &self.depth,
            &self.infra,
            &self.bodies,
            &self.cloud,
            &self.imu,
            &self.audio,
        ]
    }

    /// Encoded payload bytes, excluding framing
    pub fn size(&self) -> usize {
        self.sections().iter().map(|s| s.len()).sum()
    }

    /// Size of the wire payload produced by [`write_to_data`](Self::write_to_data)
    pub fn total_data_size(&self) -> usize {
        Self::INFOS_SIZE + Self::SECTION_COUNT * 4 + self.size()
    }

    /// Serialize into the wire payload
    pub fn write_to_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.total_data_size()];
        let mut offset = 0;
        io::write(self.id, &mut data, &mut offset);
        io::write(self.capture_ts_us, &mut data, &mut offset);
        io::write(self.modalities.bits(), &mut data, &mut offset);
        io::write(self.color_width, &mut data, &mut offset);
        io::write(self.color_height, &mut data, &mut offset);
        io::write(self.depth_width, &mut data, &mut offset);
        io::write(self.depth_height, &mut data, &mut offset);
        io::write(self.audio_channels, &mut data, &mut offset);
        for section in self.sections() {
            io::write(section.len() as u32, &mut data, &mut offset);
            io::write_array(&section[..], &mut data, &mut offset);
        }
        data
    }

    /// Parse a wire payload
    ///
    /// Sections are sliced out of `payload` without copying.
    pub fn init_from_data(payload: &Bytes) -> Result<Self, CodecError> {
        let data = payload.as_ref();
        if data.len() < Self::INFOS_SIZE {
            return Err(CodecError::Truncated {
                needed: Self::INFOS_SIZE,
                available: data.len(),
            });
        }

        let mut offset = 0;
        let mut frame = Self {
            id: io::read_value(data, &mut offset),
            capture_ts_us: io::read_value(data, &mut offset),
            modalities: Modalities::from_bits_truncate(io::read_value(data, &mut offset)),
            color_width: io::read_value(data, &mut offset),
            color_height: io::read_value(data, &mut offset),
            depth_width: io::read_value(data, &mut offset),
            depth_height: io::read_value(data, &mut offset),
            audio_channels: io::read_value(data, &mut offset),
            ..Default::default()
        };

        let next_section = |offset: &mut usize| -> Result<Bytes, CodecError> {
            let mut len = 0u32;
            if !io::read(&mut len, data, offset) {
                return Err(CodecError::Truncated {
                    needed: *offset + 4,
                    available: data.len(),
                });
            }
            let start = *offset;
            let end = start.saturating_add(len as usize);
            if end > data.len() {
                return Err(CodecError::Truncated {
                    needed: end,
                    available: data.len(),
                });
            }
            *offset = end;
            Ok(payload.slice(start..end))
        };

        frame.color = next_section(&mut offset)?;
        frame.depth = next_section(&mut offset)?;
        frame.infra = next_section(&mut offset)?;
        frame.bodies = next_section(&mut offset)?;
        frame.cloud = next_section(&mut offset)?;
        frame.imu = next_section(&mut offset)?;
        frame.audio = next_section(&mut offset)?;
        Ok(frame)
    }
}
