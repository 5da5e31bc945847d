//! Component E: windows the outbound byte stream into segments, tracks
//! in-flight bytes, and runs the exponentially-backed-off retransmission
//! timer. Congestion control is explicitly out of scope -- the sender
//! obeys only the peer-advertised window.

use std::collections::VecDeque;

use crate::byte_stream::ByteStream;
use crate::tcp::segment::{TcpFlags, TcpSegment};
use crate::wrap::WrappingInt32;

#[derive(Debug)]
struct InFlight {
    seqno_abs: u64,
    segment: TcpSegment,
}

#[derive(Debug)]
pub struct TcpSender {
    isn: WrappingInt32,
    pub stream_in: ByteStream,
    next_seqno_abs: u64,
    recv_ackno_abs: u64,
    recv_win: u16,
    retrans_cnt: u32,
    rto: u64,
    rto_timer: Option<u64>,
    initial_rto: u64,
    max_payload_size: usize,
    fin_sent: bool,
    outbound_queue: VecDeque<TcpSegment>,
    in_flight_queue: VecDeque<InFlight>,
}

impl TcpSender {
    pub fn new(
        capacity: usize,
        isn: WrappingInt32,
        initial_rto: u64,
        max_payload_size: usize,
    ) -> Self {
        TcpSender {
            isn,
            stream_in: ByteStream::new(capacity),
            next_seqno_abs: 0,
            recv_ackno_abs: 0,
            recv_win: 1,
            retrans_cnt: 0,
            rto: initial_rto,
            rto_timer: None,
            initial_rto,
            max_payload_size,
            fin_sent: false,
            outbound_queue: VecDeque::new(),
            in_flight_queue: VecDeque::new(),
        }
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.next_seqno_abs - self.recv_ackno_abs
    }

    pub fn syn_sent(&self) -> bool {
        self.next_seqno_abs >= 1
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    pub fn syn_acked(&self) -> bool {
        self.recv_ackno_abs >= 1
    }

    pub fn fin_acked(&self) -> bool {
        self.fin_sent && self.recv_ackno_abs == self.next_seqno_abs
    }

    pub fn consecutive_retransmissions(&self) -> u32 {
        self.retrans_cnt
    }

    pub fn next_segment(&mut self) -> Option<TcpSegment> {
        self.outbound_queue.pop_front()
    }

    /// Discards any queued-but-undrained segments (including stale
    /// retransmissions). Used when building a RST, so the segment that
    /// follows is the only one `next_segment` will return.
    pub fn clear_outbound_queue(&mut self) {
        self.outbound_queue.clear();
    }

    fn enqueue(&mut self, seg: TcpSegment) {
        let len = seg.sequence_length();
        if len > 0 {
            if seg.fin() {
                self.fin_sent = true;
            }
            self.in_flight_queue.push_back(InFlight {
                seqno_abs: self.next_seqno_abs,
                segment: seg.clone(),
            });
            self.next_seqno_abs += len as u64;
            if self.rto_timer.is_none() {
                self.rto_timer = Some(self.rto);
            }
        }
        self.outbound_queue.push_back(seg);
    }

    /// Fills the peer's advertised window as much as possible, one segment
    /// at a time, until the window is exhausted or there's nothing left to
    /// send.
    pub fn fill_window(&mut self) {
        loop {
            let window = (self.recv_win as u64).max(1);
            let limit = self.recv_ackno_abs + window;
            if self.next_seqno_abs >= limit {
                break;
            }
            let mut budget = (limit - self.next_seqno_abs) as usize;

            let mut flags = TcpFlags::empty();
            if !self.syn_sent() {
                flags |= TcpFlags::SYN;
                budget -= 1;
            }

            let payload_len = budget
                .min(self.max_payload_size)
                .min(self.stream_in.buffered_bytes());
            let payload = self.stream_in.read(payload_len);
            budget -= payload.len();

            if !self.fin_sent && self.stream_in.eof() && budget > 0 {
                flags |= TcpFlags::FIN;
            }

            let seg = TcpSegment {
                seqno: WrappingInt32::wrap(self.next_seqno_abs, self.isn),
                ackno: None,
                flags,
                window_size: 0,
                payload,
            };

            if seg.sequence_length() == 0 {
                break;
            }

            self.enqueue(seg);
        }
    }

    pub fn ack_received(&mut self, ackno: WrappingInt32, window_size: u16) {
        let checkpoint = self.next_seqno_abs;
        let ackno_abs = ackno.unwrap(self.isn, checkpoint);

        if ackno_abs < self.recv_ackno_abs || ackno_abs > self.next_seqno_abs {
            return; // stale, or acknowledges bytes we haven't sent: ignore
        }

        self.recv_ackno_abs = ackno_abs;
        self.recv_win = window_size;

        let mut dropped_any = false;
        while let Some(front) = self.in_flight_queue.front() {
            if front.seqno_abs + front.segment.sequence_length() as u64 <= self.recv_ackno_abs {
                self.in_flight_queue.pop_front();
                dropped_any = true;
            } else {
                break;
            }
        }

        if dropped_any {
            self.retrans_cnt = 0;
            self.rto = self.initial_rto;
            self.rto_timer = if self.in_flight_queue.is_empty() {
                None
            } else {
                Some(self.rto)
            };
        }
    }

    /// Advances the retransmission timer by `ms`. On expiry, the oldest
    /// in-flight segment is resent verbatim; the timer only backs off if
    /// the peer's window is non-zero -- a genuinely zero-windowed peer
    /// must not be punished for our own probing.
    pub fn tick(&mut self, ms: u64) {
        let Some(remaining) = self.rto_timer else {
            return;
        };
        if ms < remaining {
            self.rto_timer = Some(remaining - ms);
            return;
        }

        if let Some(front) = self.in_flight_queue.front() {
            self.outbound_queue.push_back(front.segment.clone());

            if self.recv_win > 0 {
                self.retrans_cnt += 1;
                self.rto *= 2;
            }
        }
        self.rto_timer = Some(self.rto);
    }

    /// Pushes a flagless, payload-less segment at the current send
    /// sequence number. Used for pure ACKs, keepalive probes, and (via
    /// `TcpConnection::shutdown`) as the carrier for a RST.
    pub fn send_empty_segment(&mut self) {
        let seg = TcpSegment {
            seqno: WrappingInt32::wrap(self.next_seqno_abs, self.isn),
            ackno: None,
            flags: TcpFlags::empty(),
            window_size: 0,
            payload: Vec::new(),
        };
        self.outbound_queue.push_back(seg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_sender(rto: u64) -> TcpSender {
        TcpSender::new(4096, WrappingInt32::new(0), rto, 1000)
    }

    #[test]
    fn fill_window_sends_syn_first() {
        let mut s = new_sender(1000);
        s.recv_win = 500;
        s.fill_window();
        let seg = s.next_segment().unwrap();
        assert!(seg.syn());
        assert_eq!(seg.seqno.raw_value(), 0);
        assert_eq!(s.bytes_in_flight(), 1);
    }

    #[test]
    fn ack_clears_in_flight_and_resets_backoff() {
        let mut s = new_sender(1000);
        s.recv_win = 500;
        s.fill_window();
        s.retrans_cnt = 3;
        s.rto = 4000;
        s.ack_received(WrappingInt32::new(1), 500);
        assert_eq!(s.bytes_in_flight(), 0);
        assert_eq!(s.consecutive_retransmissions(), 0);
        assert_eq!(s.rto, 1000);
    }

    #[test]
    fn stale_ack_is_ignored() {
        let mut s = new_sender(1000);
        s.recv_win = 500;
        s.fill_window(); // sends SYN, next_seqno_abs = 1
        s.ack_received(WrappingInt32::new(1), 500); // una = 1
        s.ack_received(WrappingInt32::new(0), 500); // behind una: ignored
        assert_eq!(s.bytes_in_flight(), 0);
    }

    #[test]
    fn zero_window_probes_one_byte_without_backoff() {
        let mut s = new_sender(1000);
        s.recv_win = 500;
        s.fill_window();
        s.ack_received(WrappingInt32::new(1), 0); // peer now advertises 0
        s.stream_in.write(b"hello");
        s.fill_window();
        let seg = s.next_segment().unwrap();
        assert_eq!(seg.payload.len(), 1); // zero-window probe

        s.tick(s.rto);
        assert_eq!(s.consecutive_retransmissions(), 0);
        assert_eq!(s.rto, 1000);
    }

    #[test]
    fn retransmission_backs_off_exponentially() {
        let mut s = new_sender(1000);
        s.recv_win = 500;
        s.fill_window();

        s.tick(999);
        assert_eq!(s.consecutive_retransmissions(), 0);

        s.tick(1);
        assert_eq!(s.consecutive_retransmissions(), 1);
        assert_eq!(s.rto, 2000);

        s.tick(2000);
        assert_eq!(s.consecutive_retransmissions(), 2);
        assert_eq!(s.rto, 4000);

        s.ack_received(WrappingInt32::new(1), 500);
        assert_eq!(s.consecutive_retransmissions(), 0);
        assert_eq!(s.rto, 1000);
    }

    #[test]
    fn fin_is_sent_once_stream_ends_and_window_allows() {
        let mut s = new_sender(1000);
        s.recv_win = 500;
        s.fill_window(); // SYN
        s.ack_received(WrappingInt32::new(1), 500);
        s.stream_in.write(b"hi");
        s.stream_in.end_input();
        s.fill_window();
        let seg = s.next_segment().unwrap();
        assert_eq!(seg.payload, b"hi");
        assert!(seg.fin());
        assert!(s.fin_sent());
    }
}
