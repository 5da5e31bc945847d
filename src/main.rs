//! The single-threaded, cooperative packet pump: reads Ethernet frames off
//! a TAP device, feeds them through ARP resolution, demuxes TCP segments
//! to connections, and calls `tick` on a schedule bounded by `nix::poll`
//! so retransmission timers fire even when no frames arrive.
//!
//! This binary terminates TCP locally rather than forwarding; `net::router`
//! is the multi-interface forwarding component and is exercised by its own
//! tests rather than wired into this single-homed demo.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;
use std::time::Instant;

use nix::poll::{poll, PollFd, PollFlags};

use packetkeeper::net::codec;
use packetkeeper::net::interface::NetworkInterface;
use packetkeeper::tcp::config::TcpConfig;
use packetkeeper::tcp::connection::{Tcp4Tuple, TcpConnection};

const BUFFER_SIZE: usize = 1522; // 14 (Ethernet) + 1500 (MTU) + slack
const TICK_INTERVAL_MS: u16 = 100;
const MY_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
const MY_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const LISTEN_PORT: u16 = 9000;

fn main() -> std::io::Result<()> {
    let nic = tun_tap::Iface::new("tap0", tun_tap::Mode::Tap).expect("failed to create TAP device");

    let mut iface = NetworkInterface::new(MY_MAC, MY_IP);
    let mut connections: HashMap<Tcp4Tuple, TcpConnection> = HashMap::new();
    let mut buf = [0u8; BUFFER_SIZE];
    let mut last_tick = Instant::now();

    loop {
        let fd = PollFd::new(nic.as_raw_fd(), PollFlags::POLLIN);
        let timeout = TICK_INTERVAL_MS as i32;
        let n_ready = poll(&mut [fd], timeout).unwrap_or(0);

        if n_ready > 0 {
            match nic.recv(&mut buf[..]) {
                Ok(nbytes) => match iface.recv_frame(&buf[..nbytes]) {
                    Ok(Some(payload)) => demux_datagram(&payload, &mut connections),
                    Ok(None) => {}
                    Err(e) => eprintln!("dropping malformed frame: {e}"),
                },
                Err(e) => eprintln!("tap read error: {e}"),
            }
        }

        let elapsed = last_tick.elapsed().as_millis() as u64;
        if elapsed >= TICK_INTERVAL_MS as u64 {
            iface.tick(elapsed);
            for conn in connections.values_mut() {
                conn.tick(elapsed);
            }
            last_tick = Instant::now();
        }

        flush_connections(&mut iface, &mut connections);
        while let Some(frame) = iface.next_outbound_frame() {
            let _ = nic.send(&frame);
        }
    }
}

/// Parses an IPv4 datagram already known to be addressed to us as a TCP
/// segment and demuxes it to the matching connection (or a fresh one, if
/// a SYN arrives on our listening port).
fn demux_datagram(payload: &[u8], connections: &mut HashMap<Tcp4Tuple, TcpConnection>) {
    let (tuple, segment) = match codec::parse_segment(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("ignoring datagram: {e}");
            return;
        }
    };

    match connections.get_mut(&tuple) {
        Some(conn) => conn.segment_received(&segment),
        None if segment.syn() && tuple.dst.1 == LISTEN_PORT => {
            let mut conn = TcpConnection::new(&TcpConfig::default());
            conn.segment_received(&segment);
            connections.insert(tuple, conn);
        }
        None => {}
    }
}

fn flush_connections(iface: &mut NetworkInterface, connections: &mut HashMap<Tcp4Tuple, TcpConnection>) {
    for (tuple, conn) in connections.iter_mut() {
        while let Some(seg) = conn.next_outbound_segment() {
            match codec::build_datagram(&seg, (MY_IP, tuple.dst.1), (tuple.src.0, tuple.src.1)) {
                Ok(bytes) => iface.send_datagram(bytes, tuple.src.0),
                Err(e) => eprintln!("failed to serialize outbound segment: {e}"),
            }
        }
    }
}
