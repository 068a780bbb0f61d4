//! Error types for the depth streaming library

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame compression and wire payload errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated payload: {needed} bytes needed, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Size mismatch for {modality}: expected {expected}, got {actual}")]
    SizeMismatch {
        modality: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed on {address}: {source}")]
    BindFailed {
        address: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Socket option failed: {0}")]
    SocketOption(std::io::Error),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid packet: {0}")]
    InvalidPacket(&'static str),

    #[error("Failed to spawn reader thread: {0}")]
    Spawn(std::io::Error),
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
