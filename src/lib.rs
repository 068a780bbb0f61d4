//! # Depth Stream
//!
//! Low-latency depth-camera frame pipeline with a loss-tolerant UDP
//! transport.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────── GRABBER ────────────────────────────────┐
//! │                                                                         │
//! │  capture device ──▶ DeviceFrameStore (frame::store)                     │
//! │                          │  build_frame                                 │
//! │                          ▼                                              │
//! │                     FrameCompressor (codec) ──▶ GrabberPipeline         │
//! │                          │                      (pipeline)              │
//! │                          ▼                                              │
//! │                     FrameSender (network::sender)                       │
//! │                     [header | fragment] datagrams                       │
//! └──────────────────────────┼──────────────────────────────────────────────┘
//!                            │ UDP over LAN
//!                            ▼
//! ┌──────────────────────────┼───────────── RECEIVER ───────────────────────┐
//! │   UdpReaderManager (network::manager)                                   │
//! │     ├── UdpReader #0 ── Reassembler ──┐                                 │
//! │     └── UdpReader #1 ── Reassembler ──┤  ReaderEvent channel            │
//! │                                       ▼                                 │
//! │   CompressedFrame::init_from_data ──▶ GrabberPipeline                   │
//! │                                       │ decode worker                   │
//! │                                       ▼                                 │
//! │                                   get_frame()                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Settings records ([`settings`]) and datagram headers share the bounds
//! checked byte codec in [`io`].

pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod io;
pub mod network;
pub mod pipeline;
pub mod settings;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default UDP port for frame streaming
    pub const DEFAULT_UDP_PORT: u16 = 8888;

    /// Receive watchdog interval in milliseconds
    pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 500;

    /// Largest datagram sent or received, header included
    pub const MAX_DATAGRAM_SIZE: usize = 9000;

    /// Socket receive buffer, room for ten full datagrams
    pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = MAX_DATAGRAM_SIZE * 10;

    /// Datagram header size
    pub const PACKET_HEADER_SIZE: usize = crate::network::PacketHeader::SIZE;

    /// Reader event queue length
    pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

    /// Longest idle wait of the decode worker in milliseconds
    pub const DEFAULT_IDLE_WAIT_MS: u64 = 5;
}
