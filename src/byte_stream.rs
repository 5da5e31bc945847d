//! Component A: a bounded FIFO byte stream with writer/reader sides, EOF,
//! and an error flag. Backed by a `VecDeque<u8>`, the same structure the
//! teacher uses for its `ingress`/`unacked` queues -- O(1) amortized on
//! write and pop, no operation blocks.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct ByteStream {
    capacity: usize,
    buf: VecDeque<u8>,
    written_total: u64,
    read_total: u64,
    input_ended: bool,
    error: bool,
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        ByteStream {
            capacity,
            buf: VecDeque::new(),
            written_total: 0,
            read_total: 0,
            input_ended: false,
            error: false,
        }
    }

    /// Appends up to `remaining_capacity` bytes, returns the accepted count.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.input_ended {
            return 0;
        }
        let accepted = data.len().min(self.remaining_capacity());
        self.buf.extend(&data[..accepted]);
        self.written_total += accepted as u64;
        accepted
    }

    /// Returns up to `min(n, buffered)` bytes from the head without removing them.
    pub fn peek(&self, n: usize) -> Vec<u8> {
        let n = n.min(self.buf.len());
        self.buf.iter().take(n).copied().collect()
    }

    /// Removes up to `min(n, buffered)` bytes from the head.
    pub fn pop(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
        self.read_total += n as u64;
    }

    /// `peek` followed by `pop`.
    pub fn read(&mut self, n: usize) -> Vec<u8> {
        let out = self.peek(n);
        self.pop(out.len());
        out
    }

    pub fn end_input(&mut self) {
        self.input_ended = true;
    }

    pub fn set_error(&mut self) {
        self.error = true;
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn eof(&self) -> bool {
        self.input_ended && self.buf.is_empty()
    }

    pub fn bytes_written(&self) -> u64 {
        self.written_total
    }

    pub fn bytes_read(&self) -> u64 {
        self.read_total
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_respects_capacity() {
        let mut s = ByteStream::new(4);
        assert_eq!(s.write(b"hello"), 4);
        assert_eq!(s.buffered_bytes(), 4);
        assert_eq!(s.remaining_capacity(), 0);
        assert_eq!(s.write(b"x"), 0);
    }

    #[test]
    fn read_drains_in_order() {
        let mut s = ByteStream::new(8);
        s.write(b"abcdef");
        assert_eq!(s.read(3), b"abc");
        assert_eq!(s.peek(10), b"def");
        s.pop(10);
        assert_eq!(s.buffered_bytes(), 0);
        assert_eq!(s.bytes_read(), 6);
        assert_eq!(s.bytes_written(), 6);
    }

    #[test]
    fn eof_requires_input_ended_and_drained() {
        let mut s = ByteStream::new(4);
        s.write(b"ab");
        s.end_input();
        assert!(!s.eof());
        s.pop(2);
        assert!(s.eof());
    }

    #[test]
    fn ended_stream_accepts_no_more_writes() {
        let mut s = ByteStream::new(4);
        s.end_input();
        assert_eq!(s.write(b"a"), 0);
    }
}
