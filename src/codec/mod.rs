//! Frame codec
//!
//! Converts between decoded [`Frame`](crate::frame::Frame)s and
//! [`CompressedFrame`](crate::frame::CompressedFrame)s. Image-like
//! modalities are LZ4 compressed one by one; the IMU blob and audio
//! samples travel raw.

pub mod compressor;
pub mod decompressor;

pub use compressor::FrameCompressor;
pub use decompressor::{FrameDecompressor, FrameUncompressor};
