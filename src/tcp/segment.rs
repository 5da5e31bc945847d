//! The core's wire-decoupled TCP segment. Conversions to/from
//! `etherparse::{TcpHeader, TcpHeaderSlice}` live at the boundary
//! (`net::codec`), keeping the sender/receiver/connection state
//! machines independent of any particular header codec.

use bitflags::bitflags;

use crate::wrap::WrappingInt32;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TcpFlags: u8 {
        const SYN = 0b0001;
        const ACK = 0b0010;
        const FIN = 0b0100;
        const RST = 0b1000;
    }
}

#[derive(Debug, Clone, Default)]
pub struct TcpSegment {
    pub seqno: WrappingInt32,
    pub ackno: Option<WrappingInt32>,
    pub flags: TcpFlags,
    pub window_size: u16,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    pub fn syn(&self) -> bool {
        self.flags.contains(TcpFlags::SYN)
    }

    pub fn ack(&self) -> bool {
        self.flags.contains(TcpFlags::ACK)
    }

    pub fn fin(&self) -> bool {
        self.flags.contains(TcpFlags::FIN)
    }

    pub fn rst(&self) -> bool {
        self.flags.contains(TcpFlags::RST)
    }

    /// Payload bytes + SYN + FIN, i.e. how much of the sequence space this
    /// segment occupies.
    pub fn sequence_length(&self) -> usize {
        self.payload.len() + self.syn() as usize + self.fin() as usize
    }
}
