//! Converts between the core's wire-decoupled `TcpSegment` and serialized
//! IPv4+TCP bytes. Uses `etherparse` the same way the teacher's connection
//! module does: build the TCP header, compute its checksum against the
//! finished IP header, then write both headers followed by the payload.

use std::net::Ipv4Addr;

use etherparse::{IpNumber, Ipv4Header, Ipv4HeaderSlice, TcpHeader, TcpHeaderSlice};

use crate::error::StackError;
use crate::tcp::connection::Tcp4Tuple;
use crate::tcp::segment::{TcpFlags, TcpSegment};
use crate::wrap::WrappingInt32;

const DEFAULT_TTL: u8 = 64;

/// Parses a serialized IPv4 datagram carrying a TCP segment, returning the
/// 4-tuple as seen by the receiver (`src` is the remote peer) and the
/// decoded segment.
pub fn parse_segment(datagram: &[u8]) -> Result<(Tcp4Tuple, TcpSegment), StackError> {
    let ip =
        Ipv4HeaderSlice::from_slice(datagram).map_err(|_| StackError::ParseFailure("IPv4"))?;
    if ip.protocol() != IpNumber::TCP {
        return Err(StackError::ParseFailure("IPv4: not TCP"));
    }
    let ip_len = ip.slice().len();
    let tcp_raw = &datagram[ip_len..];
    let tcp = TcpHeaderSlice::from_slice(tcp_raw).map_err(|_| StackError::ParseFailure("TCP"))?;
    let tcp_len = tcp.slice().len();
    let payload = tcp_raw[tcp_len..].to_vec();

    let mut flags = TcpFlags::empty();
    if tcp.syn() {
        flags |= TcpFlags::SYN;
    }
    if tcp.ack() {
        flags |= TcpFlags::ACK;
    }
    if tcp.fin() {
        flags |= TcpFlags::FIN;
    }
    if tcp.rst() {
        flags |= TcpFlags::RST;
    }

    let segment = TcpSegment {
        seqno: WrappingInt32::new(tcp.sequence_number()),
        ackno: tcp
            .ack()
            .then(|| WrappingInt32::new(tcp.acknowledgment_number())),
        flags,
        window_size: tcp.window_size(),
        payload,
    };

    let tuple = Tcp4Tuple {
        src: (ip.source_addr(), tcp.source_port()),
        dst: (ip.destination_addr(), tcp.destination_port()),
    };

    Ok((tuple, segment))
}

/// Serializes `segment` as an IPv4 datagram from `local` to `remote`.
pub fn build_datagram(
    segment: &TcpSegment,
    local: (Ipv4Addr, u16),
    remote: (Ipv4Addr, u16),
) -> Result<Vec<u8>, StackError> {
    let mut tcp_header = TcpHeader::new(
        local.1,
        remote.1,
        segment.seqno.raw_value(),
        segment.window_size,
    );
    tcp_header.syn = segment.syn();
    tcp_header.ack = segment.ack();
    tcp_header.fin = segment.fin();
    tcp_header.rst = segment.rst();
    if let Some(ackno) = segment.ackno {
        tcp_header.acknowledgment_number = ackno.raw_value();
    }

    let ip_header = Ipv4Header::new(
        (tcp_header.header_len() as usize + segment.payload.len()) as u16,
        DEFAULT_TTL,
        IpNumber::TCP,
        local.0.octets(),
        remote.0.octets(),
    )
    .map_err(|_| StackError::ParseFailure("IPv4 header"))?;

    tcp_header.checksum = tcp_header
        .calc_checksum_ipv4(&ip_header, &segment.payload)
        .map_err(|_| StackError::ParseFailure("TCP checksum"))?;

    let mut buf = Vec::with_capacity(
        ip_header.header_len() as usize + tcp_header.header_len() as usize + segment.payload.len(),
    );
    ip_header.write(&mut buf)?;
    tcp_header.write(&mut buf)?;
    buf.extend_from_slice(&segment.payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_survives_a_build_parse_roundtrip() {
        let seg = TcpSegment {
            seqno: WrappingInt32::new(42),
            ackno: Some(WrappingInt32::new(7)),
            flags: TcpFlags::ACK | TcpFlags::FIN,
            window_size: 1000,
            payload: b"hello".to_vec(),
        };
        let local = (Ipv4Addr::new(10, 0, 0, 1), 1234);
        let remote = (Ipv4Addr::new(10, 0, 0, 2), 80);

        let bytes = build_datagram(&seg, local, remote).unwrap();
        let (tuple, parsed) = parse_segment(&bytes).unwrap();

        assert_eq!(tuple.src, local);
        assert_eq!(tuple.dst, remote);
        assert_eq!(parsed.seqno.raw_value(), 42);
        assert_eq!(parsed.ackno.unwrap().raw_value(), 7);
        assert!(parsed.ack());
        assert!(parsed.fin());
        assert!(!parsed.syn());
        assert_eq!(parsed.payload, b"hello");
    }

    #[test]
    fn non_tcp_datagram_is_rejected() {
        // protocol byte (offset 9) left as 0 (reserved), not TCP
        let raw = vec![0x45u8, 0, 0, 20, 0, 0, 0, 0, 64, 0, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2];
        assert!(parse_segment(&raw).is_err());
    }
}
