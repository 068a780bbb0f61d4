//! Frame reassembly
//!
//! A [`Reassembler`] keeps at most one [`ReassemblyState`]. Fragments of
//! the active frame are collected by index; a fragment of a newer frame
//! abandons the active one. Frame ids are compared as serial numbers so
//! late fragments of an older frame are ignored instead of superseding a
//! newer one, while a sender restarting its counter far from the current
//! id is still followed.

use bytes::{Bytes, BytesMut};
use std::time::Instant;

use super::header::PacketHeader;

/// Ids at most this far behind a reference id count as late
const LATE_WINDOW: u32 = 1024;

/// Accumulator for the fragments of one frame
#[derive(Debug)]
pub struct ReassemblyState {
    frame_id: u32,
    timestamp_us: i64,
    frame_bytes: u32,
    fragments: Vec<Option<Bytes>>,
    received: u16,
    started: Instant,
}

impl ReassemblyState {
    fn new(header: &PacketHeader) -> Self {
        Self {
            frame_id: header.frame_id,
            timestamp_us: header.timestamp_us,
            frame_bytes: header.frame_bytes,
            fragments: vec![None; header.packet_count as usize],
            received: 0,
            started: Instant::now(),
        }
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    pub fn expected(&self) -> u16 {
        self.fragments.len() as u16
    }

    pub fn received(&self) -> u16 {
        self.received
    }

    /// Time since the first fragment arrived
    pub fn age(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    fn is_complete(&self) -> bool {
        self.received == self.expected()
    }

    fn dropped(&self) -> DroppedFrame {
        DroppedFrame {
            frame_id: self.frame_id,
            received: self.received,
            expected: self.expected(),
        }
    }

    fn assemble(self) -> Result<CompletedFrame, DroppedFrame> {
        let total: usize = self.fragments.iter().flatten().map(Bytes::len).sum();
        if total != self.frame_bytes as usize {
            return Err(self.dropped());
        }

        let packet_count = self.expected();
        let mut payload = BytesMut::with_capacity(total);
        for fragment in self.fragments.iter().flatten() {
            payload.extend_from_slice(fragment);
        }
        Ok(CompletedFrame {
            frame_id: self.frame_id,
            timestamp_us: self.timestamp_us,
            packet_count,
            payload: payload.freeze(),
        })
    }
}

/// What happened to one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    Accepted,
    /// Index already received for the active frame
    Duplicate,
    /// Fragment of a retired or older frame
    Late,
    /// Header disagrees with the active frame's packet count or size
    Inconsistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedFrame {
    pub frame_id: u32,
    pub received: u16,
    pub expected: u16,
}

#[derive(Debug, Clone)]
pub struct CompletedFrame {
    pub frame_id: u32,
    pub timestamp_us: i64,
    pub packet_count: u16,
    pub payload: Bytes,
}

/// Outcome of [`Reassembler::push`]
///
/// `dropped` is always reported before `completed` is considered: a
/// superseded frame is abandoned before the new one starts.
#[derive(Debug, Clone)]
pub struct PushResult {
    pub fragment: Fragment,
    pub dropped: Option<DroppedFrame>,
    pub completed: Option<CompletedFrame>,
}

impl PushResult {
    fn only(fragment: Fragment) -> Self {
        Self {
            fragment,
            dropped: None,
            completed: None,
        }
    }
}

/// Single-frame reassembler owned by one reader
#[derive(Debug, Default)]
pub struct Reassembler {
    active: Option<ReassemblyState>,
    last_retired: Option<u32>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&ReassemblyState> {
        self.active.as_ref()
    }

    /// Add one fragment, `fragment` being the datagram bytes after the header
    pub fn push(&mut self, header: &PacketHeader, fragment: &[u8]) -> PushResult {
        let mut dropped = None;

        match &self.active {
            Some(state) if state.frame_id == header.frame_id => {
                if state.expected() != header.packet_count || state.frame_bytes != header.frame_bytes {
                    return PushResult::only(Fragment::Inconsistent);
                }
            }
            Some(state) if is_late(header.frame_id, state.frame_id) => {
                return PushResult::only(Fragment::Late);
            }
            Some(_) => {
                if let Some(state) = self.active.take() {
                    self.last_retired = Some(state.frame_id);
                    dropped = Some(state.dropped());
                }
            }
            None => {
                if self
                    .last_retired
                    .is_some_and(|retired| is_late(header.frame_id, retired))
                {
                    return PushResult::only(Fragment::Late);
                }
            }
        }

        let state = self.active.get_or_insert_with(|| ReassemblyState::new(header));
        let slot = &mut state.fragments[header.packet_index as usize];
        if slot.is_some() {
            return PushResult {
                fragment: Fragment::Duplicate,
                dropped,
                completed: None,
            };
        }
        *slot = Some(Bytes::copy_from_slice(fragment));
        state.received += 1;

        let mut completed = None;
        if state.is_complete() {
            if let Some(state) = self.active.take() {
                self.last_retired = Some(state.frame_id);
                match state.assemble() {
                    Ok(frame) => completed = Some(frame),
                    Err(bad_size) => dropped = Some(bad_size),
                }
            }
        }

        PushResult {
            fragment: Fragment::Accepted,
            dropped,
            completed,
        }
    }

    /// Discard the active frame and forget retired ids
    pub fn clear(&mut self) {
        self.active = None;
        self.last_retired = None;
    }
}

/// True when `id` equals `reference` or trails it by less than the late window
fn is_late(id: u32, reference: u32) -> bool {
    reference.wrapping_sub(id) < LATE_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(frame_id: u32, index: u16, count: u16, frame_bytes: u32) -> PacketHeader {
        PacketHeader {
            timestamp_us: 5,
            frame_id,
            frame_bytes,
            packet_index: index,
            packet_count: count,
        }
    }

    #[test]
    fn test_out_of_order_fragments() {
        let mut r = Reassembler::new();
        assert!(r.push(&header(1, 2, 3, 6), b"ef").completed.is_none());
        assert!(r.push(&header(1, 0, 3, 6), b"ab").completed.is_none());
        let done = r.push(&header(1, 1, 3, 6), b"cd").completed.unwrap();

        assert_eq!(done.frame_id, 1);
        assert_eq!(done.packet_count, 3);
        assert_eq!(&done.payload[..], b"abcdef");
        assert!(r.active().is_none());
    }

    #[test]
    fn test_superseded_frame_is_dropped() {
        let mut r = Reassembler::new();
        for index in 0..3 {
            let result = r.push(&header(7, index, 4, 8), b"xx");
            assert!(result.dropped.is_none());
        }

        let result = r.push(&header(8, 0, 1, 2), b"yy");
        assert_eq!(
            result.dropped,
            Some(DroppedFrame {
                frame_id: 7,
                received: 3,
                expected: 4
            })
        );
        assert_eq!(result.completed.unwrap().frame_id, 8);
    }

    #[test]
    fn test_late_fragment_ignored() {
        let mut r = Reassembler::new();
        r.push(&header(10, 0, 2, 4), b"aa");

        let result = r.push(&header(9, 1, 2, 4), b"zz");
        assert_eq!(result.fragment, Fragment::Late);
        assert!(result.dropped.is_none());
        assert_eq!(r.active().unwrap().frame_id(), 10);
    }

    #[test]
    fn test_retired_frame_not_restarted() {
        let mut r = Reassembler::new();
        r.push(&header(3, 0, 1, 1), b"a");

        let result = r.push(&header(3, 0, 1, 1), b"a");
        assert_eq!(result.fragment, Fragment::Late);
        assert!(result.completed.is_none());
        assert!(r.active().is_none());
    }

    #[test]
    fn test_duplicate_fragment_ignored() {
        let mut r = Reassembler::new();
        r.push(&header(1, 0, 2, 4), b"aa");
        let result = r.push(&header(1, 0, 2, 4), b"aa");
        assert_eq!(result.fragment, Fragment::Duplicate);
        assert_eq!(r.active().unwrap().received(), 1);
    }

    #[test]
    fn test_sender_restart_followed() {
        let mut r = Reassembler::new();
        r.push(&header(50_000, 0, 1, 1), b"a");
        let result = r.push(&header(0, 0, 1, 1), b"b");
        assert_eq!(result.completed.unwrap().frame_id, 0);
    }

    #[test]
    fn test_id_wraparound_is_newer() {
        let mut r = Reassembler::new();
        r.push(&header(u32::MAX, 0, 2, 2), b"a");
        let result = r.push(&header(0, 0, 1, 1), b"b");
        assert_eq!(result.dropped.unwrap().frame_id, u32::MAX);
        assert!(result.completed.is_some());
    }

    #[test]
    fn test_inconsistent_header_ignored() {
        let mut r = Reassembler::new();
        r.push(&header(1, 0, 2, 4), b"aa");
        let result = r.push(&header(1, 1, 3, 4), b"bb");
        assert_eq!(result.fragment, Fragment::Inconsistent);
        assert_eq!(r.active().unwrap().expected(), 2);
    }

    #[test]
    fn test_size_mismatch_drops_frame() {
        let mut r = Reassembler::new();
        let result = r.push(&header(1, 0, 1, 10), b"short");
        assert!(result.completed.is_none());
        assert_eq!(result.dropped.unwrap().received, 1);
    }
}
