//! Component D: wraps the `StreamReassembler`, translating wire segments
//! into an in-order byte stream while tracking SYN capture, the ackno, and
//! the advertised receive window.

use crate::reassembler::StreamReassembler;
use crate::tcp::segment::TcpSegment;
use crate::wrap::WrappingInt32;

#[derive(Debug)]
pub struct TcpReceiver {
    isn: Option<WrappingInt32>,
    reassembler: StreamReassembler,
}

impl TcpReceiver {
    pub fn new(capacity: usize) -> Self {
        TcpReceiver {
            isn: None,
            reassembler: StreamReassembler::new(capacity),
        }
    }

    pub fn syn_received(&self) -> bool {
        self.isn.is_some()
    }

    pub fn fin_received(&self) -> bool {
        self.reassembler.output.input_ended()
    }

    pub fn stream_out(&self) -> &crate::byte_stream::ByteStream {
        &self.reassembler.output
    }

    pub fn stream_out_mut(&mut self) -> &mut crate::byte_stream::ByteStream {
        &mut self.reassembler.output
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    pub fn segment_received(&mut self, seg: &TcpSegment) {
        if !self.syn_received() && !seg.syn() {
            return; // drop: no connection yet
        }
        if self.syn_received() && seg.syn() {
            return; // drop: duplicate SYN
        }

        if seg.syn() {
            self.isn = Some(seg.seqno);
        }
        let isn = self.isn.unwrap();

        let index = if seg.syn() {
            0u64
        } else {
            let checkpoint = self.reassembler.output.bytes_written() + 1;
            seg.seqno.unwrap(isn, checkpoint) - 1
        };

        self.reassembler
            .push_substring(&seg.payload, index, seg.fin());
    }

    /// Wire-form ackno: absent until the SYN has been seen.
    pub fn ackno(&self) -> Option<WrappingInt32> {
        let isn = self.isn?;
        let written = self.reassembler.output.bytes_written();
        let abs = written + 1 + self.fin_received() as u64;
        Some(WrappingInt32::wrap(abs, isn))
    }

    pub fn window_size(&self) -> usize {
        self.reassembler.output.remaining_capacity()
    }
}
