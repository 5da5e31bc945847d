//! Component F: the bidirectional state machine orchestrating a
//! `TcpSender` and `TcpReceiver` -- RST handling, linger, and keepalive-ACK
//! policy. This is the "TCB" the teacher's `tcp::connection` module names,
//! generalized from a single-direction accept-only sketch into the full
//! RFC 793 lifecycle the original `sponge` lab drives.

use std::net::Ipv4Addr;

use crate::tcp::config::TcpConfig;
use crate::tcp::receiver::TcpReceiver;
use crate::tcp::segment::{TcpFlags, TcpSegment};
use crate::tcp::sender::TcpSender;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct Tcp4Tuple {
    pub src: (Ipv4Addr, u16),
    pub dst: (Ipv4Addr, u16),
}

/// The canonical 11-state RFC 793 diagram, plus a fictional `Reset` state
/// for a connection an RST has torn down. Derived, not stored: see
/// `TcpConnection::state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Listen,
    SynSent,
    SynRcvd,
    Established,
    FinWait1,
    FinWait2,
    Closing,
    TimeWait,
    CloseWait,
    LastAck,
    Reset,
}

#[derive(Debug)]
pub struct TcpConnection {
    sender: TcpSender,
    receiver: TcpReceiver,
    initial_rto: u64,
    linger_after_streams_finish: bool,
    ms_since_last_segment_received: u64,
    error: bool,
    max_retx_attempts: u32,
    outbound_segments: std::collections::VecDeque<TcpSegment>,
    /// Set once the peer's FIN arrives before we've sent our own -- the
    /// passive side of a close sequence moves CLOSE_WAIT -> LAST_ACK rather
    /// than -> CLOSING.
    passive_close: bool,
}

impl TcpConnection {
    pub fn new(config: &TcpConfig) -> Self {
        let isn = config.isn();
        TcpConnection {
            sender: TcpSender::new(
                config.send_capacity,
                isn,
                config.rt_timeout,
                config.max_payload_size,
            ),
            receiver: TcpReceiver::new(config.recv_capacity),
            initial_rto: config.rt_timeout,
            linger_after_streams_finish: true,
            ms_since_last_segment_received: 0,
            error: false,
            max_retx_attempts: config.max_retx_attempts,
            outbound_segments: std::collections::VecDeque::new(),
            passive_close: false,
        }
    }

    pub fn inbound_stream(&self) -> &crate::byte_stream::ByteStream {
        self.receiver.stream_out()
    }

    pub fn inbound_stream_mut(&mut self) -> &mut crate::byte_stream::ByteStream {
        self.receiver.stream_out_mut()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn active(&self) -> bool {
        if self.error {
            return false;
        }
        let outbound_done = self.sender.stream_in.eof() && self.sender.fin_acked();
        let inbound_done = self.receiver.fin_received();
        if !inbound_done || !outbound_done || self.bytes_in_flight() > 0 {
            return true;
        }
        self.linger_after_streams_finish
            && self.ms_since_last_segment_received < 10 * self.initial_rto
    }

    pub fn state(&self) -> State {
        if self.error {
            return State::Reset;
        }
        let syn_sent = self.sender.syn_sent();
        let syn_rcvd = self.receiver.syn_received();
        let syn_acked = self.sender.syn_acked();
        let fin_sent = self.sender.fin_sent();
        let fin_acked = self.sender.fin_acked();
        let fin_rcvd = self.receiver.fin_received();

        match (syn_sent, syn_rcvd, syn_acked, fin_sent, fin_acked, fin_rcvd) {
            (false, false, ..) => State::Closed,
            (false, true, ..) => State::Listen,
            (true, false, ..) => State::SynSent,
            (true, true, false, ..) => State::SynRcvd,
            (true, true, true, false, _, false) => State::Established,
            (true, true, true, true, false, false) => State::FinWait1,
            (true, true, true, true, true, false) => State::FinWait2,
            (true, true, true, false, _, true) => State::CloseWait,
            (true, true, true, true, false, true) if self.passive_close => State::LastAck,
            (true, true, true, true, false, true) => State::Closing,
            (true, true, true, true, true, true) if self.active() => State::TimeWait,
            (true, true, true, true, true, true) => State::Closed,
        }
    }

    fn flush(&mut self) {
        while let Some(mut seg) = self.sender.next_segment() {
            if let Some(ackno) = self.receiver.ackno() {
                seg.ackno = Some(ackno);
                seg.flags |= TcpFlags::ACK;
            }
            seg.window_size = self.receiver.window_size().min(u16::MAX as usize) as u16;
            self.outbound_segments.push_back(seg);
        }
    }

    /// Drains segments the connection has queued for transmission (by the
    /// host's egress adapter, after every call into the connection).
    pub fn next_outbound_segment(&mut self) -> Option<TcpSegment> {
        self.outbound_segments.pop_front()
    }

    pub fn connect(&mut self) {
        self.sender.fill_window();
        self.flush();
    }

    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = self.sender.stream_in.write(data);
        self.sender.fill_window();
        self.flush();
        n
    }

    pub fn end_input_stream(&mut self) {
        self.sender.stream_in.end_input();
        self.sender.fill_window();
        self.flush();
    }

    pub fn tick(&mut self, ms: u64) {
        if self.error {
            return; // already reset; the RST below has already gone out once
        }
        self.ms_since_last_segment_received += ms;
        self.sender.tick(ms);
        if self.sender.consecutive_retransmissions() > self.max_retx_attempts {
            self.unclean_reset();
            return;
        }
        self.flush();
    }

    /// Tears the connection down with a single empty RST segment. Clears
    /// both the sender's and the connection's outbound queues first, so a
    /// retransmission `sender.tick` just enqueued can't be the segment
    /// `next_segment` hands back to have RST OR'd onto it.
    fn unclean_reset(&mut self) {
        self.error = true;
        self.outbound_segments.clear();
        self.sender.clear_outbound_queue();
        self.sender.send_empty_segment();
        if let Some(mut seg) = self.sender.next_segment() {
            seg.flags |= TcpFlags::RST;
            self.outbound_segments.push_back(seg);
        }
    }

    pub fn segment_received(&mut self, seg: &TcpSegment) {
        if !self.active() {
            return;
        }
        if !self.sender.syn_sent() && seg.ack() {
            return; // LISTEN: only a SYN means anything here
        }
        if seg.rst() {
            self.error = true;
            self.sender.stream_in.set_error();
            self.receiver.stream_out_mut().set_error();
            return;
        }

        self.ms_since_last_segment_received = 0;

        if seg.ack() {
            if let Some(ackno) = seg.ackno {
                self.sender.ack_received(ackno, seg.window_size);
                self.sender.fill_window();
                self.flush();
            }
        }

        let receiver_had_syn = self.receiver.syn_received();
        let ackno_before = self.receiver.ackno();
        self.receiver.segment_received(seg);

        if self.receiver.fin_received() && !self.sender.fin_sent() {
            self.passive_close = true;
        }

        if seg.sequence_length() >= 1 {
            self.sender.fill_window();
            self.flush();
            if self.outbound_segments.is_empty() {
                self.sender.send_empty_segment();
                self.flush();
            }
        } else if receiver_had_syn {
            // keepalive probe: peer re-sends the byte just before our ackno
            if let Some(ackno) = ackno_before {
                let probe_seqno = ackno.raw_value().wrapping_sub(1);
                if seg.seqno.raw_value() == probe_seqno {
                    self.sender.send_empty_segment();
                    self.flush();
                }
            }
        }

        if self.receiver.fin_received() && !self.sender.stream_in.eof() {
            self.linger_after_streams_finish = false;
        }
    }

    /// Best-effort RST on unclean shutdown; called from `Drop`. Mirrors the
    /// original `sponge` destructor, re-architected as an explicit method
    /// per the design notes (no reliance on unwind semantics).
    pub fn shutdown(&mut self) {
        if self.active() && !self.error {
            eprintln!("warning: TCPConnection destroyed while still active, sending RST");
            self.unclean_reset();
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
