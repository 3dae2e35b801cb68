//! Carves an unbounded byte stream of concatenated JPEG frames into
//! discrete frames, either by auto-detecting the JPEG end-of-image /
//! start-of-image junction or by splitting on a user-supplied separator.

use bytes::{Buf, BytesMut};

/// Accumulator capacity. A single read that would push the accumulator
/// past this is discarded wholesale rather than grown further.
pub const ACCUMULATOR_CAPACITY: usize = 10 * 1024 * 1024;

/// Upper bound on a single `read()` from the input stream.
pub const INPUT_READ_CHUNK: usize = 1024 * 1024;

/// JPEG start-of-image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
/// Auto-mode separator: EOI immediately followed by SOI.
pub const AUTO_SEPARATOR: [u8; 4] = [0xFF, 0xD9, 0xFF, 0xD8];

/// How the producer recognizes a frame boundary in the input stream.
#[derive(Debug, Clone)]
pub enum Separator {
    /// Split on `FF D9 FF D8`; the emitted frame keeps the `FF D9`, the
    /// carry-over keeps the `FF D8`.
    Auto,
    /// Split on caller-supplied bytes, which are consumed (neither the
    /// emitted frame nor the carry-over contains them).
    Explicit(Vec<u8>),
}

impl Separator {
    fn bytes(&self) -> &[u8] {
        match self {
            Separator::Auto => &AUTO_SEPARATOR,
            Separator::Explicit(sep) => sep,
        }
    }
}

/// Outcome of feeding a chunk of input bytes to the accumulator.
#[derive(Debug)]
pub enum FrameEvent {
    /// No complete frame yet; more input is needed.
    Pending,
    /// A complete frame was carved out; the accumulator now holds only
    /// the carry-over bytes for the next frame.
    Ready(Vec<u8>),
    /// The accumulator would have exceeded capacity; it was discarded.
    Overflow,
}

/// Growing byte accumulator that carves frames out of a stream of reads.
pub struct FrameAccumulator {
    buf: BytesMut,
    separator: Separator,
}

impl FrameAccumulator {
    pub fn new(separator: Separator) -> Self {
        Self {
            buf: BytesMut::with_capacity(INPUT_READ_CHUNK * 2),
            separator,
        }
    }

    /// Feeds newly-read bytes into the accumulator, returning at most
    /// one carved frame. Callers that get `Ready` should call `feed`
    /// again on the following read even if `data` had trailing bytes
    /// past the separator — those bytes already live in the carry-over.
    pub fn feed(&mut self, data: &[u8]) -> FrameEvent {
        if self.buf.len() + data.len() > ACCUMULATOR_CAPACITY {
            self.buf.clear();
            return FrameEvent::Overflow;
        }

        self.buf.extend_from_slice(data);

        let sep = self.separator.bytes();
        let window_start = self
            .buf
            .len()
            .saturating_sub((2 * INPUT_READ_CHUNK).max(sep.len()));
        let Some(rel_pos) = find_subslice(&self.buf[window_start..], sep) else {
            return FrameEvent::Pending;
        };
        let match_pos = window_start + rel_pos;

        let (frame_end, carry_start) = match &self.separator {
            // Auto: "FF D9 | FF D8" - frame keeps FF D9, carry-over keeps FF D8.
            Separator::Auto => (match_pos + 2, match_pos + 2),
            // Explicit: separator is consumed entirely.
            Separator::Explicit(_) => (match_pos, match_pos + sep.len()),
        };

        let frame = self.buf[..frame_end].to_vec();
        self.buf.advance(carry_start);
        FrameEvent::Ready(frame)
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_mode_round_trip_single_feed() {
        let mut acc = FrameAccumulator::new(Separator::Auto);
        let stream = [
            0xFFu8, 0xD8, b'a', b'b', 0xFF, 0xD9, // frame 1
            0xFF, 0xD8, b'c', 0xFF, 0xD9, // frame 2
        ];
        match acc.feed(&stream) {
            FrameEvent::Ready(frame) => assert_eq!(frame, vec![0xFF, 0xD8, b'a', b'b', 0xFF, 0xD9]),
            other => panic!("expected Ready, got {other:?}"),
        }
        match acc.feed(&[]) {
            FrameEvent::Ready(frame) => assert_eq!(frame, vec![0xFF, 0xD8, b'c', 0xFF, 0xD9]),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn auto_mode_round_trip_many_frames() {
        let mut acc = FrameAccumulator::new(Separator::Auto);
        let mut stream = Vec::new();
        let mut expected = Vec::new();
        for i in 0..5u8 {
            let body = vec![i; 10];
            let mut frame = vec![0xFF, 0xD8];
            frame.extend_from_slice(&body);
            frame.extend_from_slice(&[0xFF, 0xD9]);
            stream.extend_from_slice(&frame);
            expected.push(frame);
        }

        let mut got = Vec::new();
        loop {
            match acc.feed(&stream) {
                FrameEvent::Ready(frame) => got.push(frame),
                FrameEvent::Pending => break,
                FrameEvent::Overflow => panic!("unexpected overflow"),
            }
            stream.clear();
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn explicit_separator_excludes_separator_bytes() {
        let mut acc = FrameAccumulator::new(Separator::Explicit(b"XYZ".to_vec()));
        let stream = b"AAABBBXYZCCCXYZDDD";
        let mut parts = Vec::new();
        let mut fed = false;
        loop {
            let event = if fed {
                acc.feed(b"")
            } else {
                fed = true;
                acc.feed(stream)
            };
            match event {
                FrameEvent::Ready(frame) => parts.push(frame),
                FrameEvent::Pending => break,
                FrameEvent::Overflow => panic!("unexpected overflow"),
            }
        }
        assert_eq!(parts, vec![b"AAABBB".to_vec(), b"CCC".to_vec()]);
        // "DDD" remains in carry-over, never delivered.
    }

    #[test]
    fn separator_straddling_a_read_boundary_is_still_found() {
        let mut acc = FrameAccumulator::new(Separator::Auto);
        assert!(matches!(
            acc.feed(&[0xFF, 0xD8, b'x', 0xFF]),
            FrameEvent::Pending
        ));
        match acc.feed(&[0xD9, 0xFF, 0xD8, b'y', 0xFF, 0xD9]) {
            FrameEvent::Ready(frame) => assert_eq!(frame, vec![0xFF, 0xD8, b'x', 0xFF, 0xD9]),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn overflow_discards_the_accumulator() {
        let mut acc = FrameAccumulator::new(Separator::Auto);
        let chunk = vec![0u8; INPUT_READ_CHUNK];
        let mut saw_overflow = false;
        for _ in 0..(ACCUMULATOR_CAPACITY / INPUT_READ_CHUNK + 2) {
            if matches!(acc.feed(&chunk), FrameEvent::Overflow) {
                saw_overflow = true;
                break;
            }
        }
        assert!(saw_overflow);
        assert!(acc.buf.len() <= ACCUMULATOR_CAPACITY);
    }

    #[test]
    fn empty_explicit_separator_never_matches() {
        // Guarded against at the configuration boundary, but the carver
        // itself should not panic or loop if it ever sees one.
        let mut acc = FrameAccumulator::new(Separator::Explicit(Vec::new()));
        assert!(matches!(acc.feed(b"anything"), FrameEvent::Pending));
    }
}
