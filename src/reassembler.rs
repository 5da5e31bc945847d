//! Component C: merges overlapping, out-of-order byte segments into the
//! in-order byte stream `output`, under `output`'s fixed capacity.
//!
//! Pending segments are kept as a `BTreeMap<u64, Vec<u8>>` from absolute
//! index to an owned byte range -- an ordered map standing in for the
//! in-memory interval bookkeeping the original implementation mutated by
//! hand; a single linear sweep resolves overlaps per push.

use std::collections::BTreeMap;

use crate::byte_stream::ByteStream;

#[derive(Debug)]
pub struct StreamReassembler {
    pub output: ByteStream,
    pending: BTreeMap<u64, Vec<u8>>,
    unassembled: usize,
    eof_index: Option<u64>,
}

impl StreamReassembler {
    pub fn new(capacity: usize) -> Self {
        StreamReassembler {
            output: ByteStream::new(capacity),
            pending: BTreeMap::new(),
            unassembled: 0,
            eof_index: None,
        }
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.unassembled
    }

    pub fn empty(&self) -> bool {
        self.unassembled == 0
    }

    fn window_end(&self) -> u64 {
        self.output.bytes_written() + self.output.remaining_capacity() as u64
    }

    pub fn push_substring(&mut self, data: &[u8], index: u64, eof: bool) {
        if eof {
            self.eof_index = Some(index + data.len() as u64);
        }

        let written = self.output.bytes_written();
        let window_end = self.window_end();

        // Clamp [index, index + data.len()) to [written, window_end).
        let start = index.max(written);
        let end = (index + data.len() as u64).min(window_end);

        if start < end {
            let lo = (start - index) as usize;
            let hi = (end - index) as usize;
            self.insert(start, &data[lo..hi]);
        }

        self.drain_ready();
    }

    /// Resolves overlaps against the pending set and inserts the remainder.
    fn insert(&mut self, mut i: u64, mut d: &[u8]) {
        let overlapping: Vec<(u64, usize)> = self
            .pending
            .range(..i + d.len() as u64)
            .filter(|(&k, v)| k + v.len() as u64 > i)
            .map(|(&k, v)| (k, v.len()))
            .collect();

        for (k, len) in overlapping {
            if d.is_empty() {
                break;
            }
            if i < k {
                // left-only slice [i, k)
                let left_len = (k - i) as usize;
                let left = d[..left_len].to_vec();
                self.unassembled += left.len();
                self.pending.insert(i, left);
                d = &d[left_len..];
                i = k;
            }
            let existing_end = k + len as u64;
            if i + (d.len() as u64) <= existing_end {
                // fully covered by the existing range
                d = &[];
            } else {
                let skip = (existing_end - i) as usize;
                d = &d[skip..];
                i = existing_end;
            }
        }

        if !d.is_empty() {
            self.unassembled += d.len();
            self.pending.insert(i, d.to_vec());
        }
    }

    fn drain_ready(&mut self) {
        loop {
            let written = self.output.bytes_written();
            let Some((&k, _)) = self.pending.iter().next() else {
                break;
            };
            if k > written {
                break;
            }
            let (_, v) = self.pending.pop_first().unwrap();
            self.unassembled -= v.len();
            let skip = (written - k) as usize;
            self.output.write(&v[skip..]);
        }

        if let Some(eof_index) = self.eof_index {
            if self.output.bytes_written() == eof_index {
                self.output.end_input();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(r: &StreamReassembler) -> Vec<u8> {
        r.output.peek(r.output.buffered_bytes())
    }

    #[test]
    fn in_order_pushes_pass_straight_through() {
        let mut r = StreamReassembler::new(16);
        r.push_substring(b"ab", 0, false);
        r.push_substring(b"cd", 2, true);
        assert_eq!(written(&r), b"abcd");
        assert!(r.output.eof());
        assert_eq!(r.unassembled_bytes(), 0);
    }

    #[test]
    fn out_of_order_then_fill_gap() {
        let mut r = StreamReassembler::new(8);
        r.push_substring(b"ef", 4, false);
        assert_eq!(r.output.bytes_written(), 0);
        assert_eq!(r.unassembled_bytes(), 2);

        r.push_substring(b"cd", 2, false);
        assert_eq!(r.output.bytes_written(), 0);
        assert_eq!(r.unassembled_bytes(), 4);

        r.push_substring(b"ab", 0, true);
        assert_eq!(r.output.bytes_written(), 6);
        assert_eq!(r.unassembled_bytes(), 0);
        assert!(r.output.eof());
        assert_eq!(written(&r), b"abcdef");
    }

    #[test]
    fn overlap_existing_bytes_win() {
        let mut r = StreamReassembler::new(16);
        r.push_substring(b"abcdef", 0, false);
        r.push_substring(b"cdXXgh", 2, false);
        assert_eq!(written(&r), b"abcdefgh");
        assert_eq!(r.unassembled_bytes(), 0);
    }

    #[test]
    fn bytes_past_window_are_dropped() {
        let mut r = StreamReassembler::new(4);
        r.push_substring(b"abcdefgh", 0, false);
        // Only the first 4 bytes fit the capacity; the rest is clamped away.
        assert_eq!(r.output.bytes_written(), 4);
        assert_eq!(r.unassembled_bytes(), 0);
    }

    #[test]
    fn idempotent_resend() {
        let mut r1 = StreamReassembler::new(16);
        r1.push_substring(b"hello", 0, true);
        r1.push_substring(b"hello", 0, true);

        let mut r2 = StreamReassembler::new(16);
        r2.push_substring(b"hello", 0, true);

        assert_eq!(written(&r1), written(&r2));
        assert_eq!(r1.unassembled_bytes(), r2.unassembled_bytes());
    }

    #[test]
    fn commutative_over_covering_order() {
        let mut a = StreamReassembler::new(16);
        a.push_substring(b"lo", 3, true);
        a.push_substring(b"hel", 0, false);

        let mut b = StreamReassembler::new(16);
        b.push_substring(b"hel", 0, false);
        b.push_substring(b"lo", 3, true);

        assert_eq!(written(&a), written(&b));
        assert_eq!(written(&a), b"hello");
    }
}
