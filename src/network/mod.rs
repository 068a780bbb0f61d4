//! UDP transport for compressed frames
//!
//! The sending side fragments each frame payload into datagrams carrying a
//! [`PacketHeader`]. The receiving side runs one [`UdpReader`] per local
//! interface under a [`UdpReaderManager`]; readers reassemble fragments
//! and report everything through [`ReaderEvent`]s.

pub mod events;
pub mod header;
pub mod manager;
pub mod reader;
pub mod reassembly;
pub mod sender;

pub use events::{ReaderEvent, ReaderEventKind, ReaderState};
pub use header::PacketHeader;
pub use manager::UdpReaderManager;
pub use reader::{ReaderOptions, ReaderStats, UdpReader};
pub use reassembly::{Reassembler, ReassemblyState};
pub use sender::{FrameSender, SenderStats};
