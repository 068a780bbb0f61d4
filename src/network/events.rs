//! Reader notifications
//!
//! Readers never return errors across threads. Everything a receive loop
//! observes is reported as a [`ReaderEvent`] on a bounded channel shared by
//! all readers of a manager. Events carry the originating interface index;
//! there is no ordering guarantee between interfaces.

use bytes::Bytes;
use crossbeam_channel::{Sender, TrySendError};

/// Reader lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Disabled,
    Enabling,
    Reading,
    /// Receive loop stopped on a socket error, `disable_reading` resets it
    Error,
}

#[derive(Debug, Clone)]
pub enum ReaderEventKind {
    /// Socket bound and receive loop running (true) or stopped (false)
    ConnectionState(bool),
    Message(String),
    Error(String),
    /// All fragments of a frame arrived
    PacketsReceived {
        frame_id: u32,
        packet_count: u16,
        bytes: usize,
    },
    /// Reassembled frame payload
    Payload {
        frame_id: u32,
        timestamp_us: i64,
        data: Bytes,
    },
    /// An incomplete frame was abandoned
    FrameDropped {
        frame_id: u32,
        received: u16,
        expected: u16,
    },
    /// No datagram within the watchdog interval
    Timeout,
}

impl ReaderEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionState(_) => "connection-state",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::PacketsReceived { .. } => "packets-received",
            Self::Payload { .. } => "payload",
            Self::FrameDropped { .. } => "frame-dropped",
            Self::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderEvent {
    /// Index of the interface the event comes from
    pub interface: usize,
    pub kind: ReaderEventKind,
}

/// Interface-tagged sending half of the event channel
#[derive(Clone)]
pub(crate) struct EventSink {
    interface: usize,
    tx: Sender<ReaderEvent>,
}

impl EventSink {
    pub(crate) fn new(interface: usize, tx: Sender<ReaderEvent>) -> Self {
        Self { interface, tx }
    }

    /// Queue an event without blocking, full queues drop it
    pub(crate) fn emit(&self, kind: ReaderEventKind) {
        let event = ReaderEvent {
            interface: self.interface,
            kind,
        };
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    "Event queue full, dropping {} event from interface {}",
                    event.kind.name(),
                    self.interface
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!("No event consumer for interface {}", self.interface);
            }
        }
    }
}
