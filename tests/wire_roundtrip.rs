//! Cross-component scenarios that don't fit neatly into any one module's
//! inline unit tests: a full connection exchange serialized onto and back
//! off of the wire via `net::codec`, and multi-interface routing.

use std::net::Ipv4Addr;

use packetkeeper::net::codec;
use packetkeeper::net::datagram::Ipv4Datagram;
use packetkeeper::net::interface::NetworkInterface;
use packetkeeper::net::router::Router;
use packetkeeper::tcp::config::TcpConfig;
use packetkeeper::tcp::connection::TcpConnection;
use packetkeeper::wrap::WrappingInt32;

const CLIENT_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 0, 0, 1), 40000);
const SERVER_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 0, 0, 2), 9000);

fn config_with_isn(isn: u32) -> TcpConfig {
    TcpConfig {
        fixed_isn: Some(WrappingInt32::new(isn)),
        ..Default::default()
    }
}

/// Pumps every segment `from` has queued onto the wire and into `to`,
/// serializing and re-parsing each one through `net::codec` exactly as a
/// real device boundary would.
fn deliver_all(from: &mut TcpConnection, from_addr: (Ipv4Addr, u16), to: &mut TcpConnection, to_addr: (Ipv4Addr, u16)) {
    while let Some(seg) = from.next_outbound_segment() {
        let bytes = codec::build_datagram(&seg, from_addr, to_addr).unwrap();
        let (_tuple, parsed) = codec::parse_segment(&bytes).unwrap();
        to.segment_received(&parsed);
    }
}

#[test]
fn full_handshake_and_transfer_survive_the_wire_codec() {
    let mut client = TcpConnection::new(&config_with_isn(100));
    let mut server = TcpConnection::new(&config_with_isn(9000));

    client.connect();
    deliver_all(&mut client, CLIENT_ADDR, &mut server, SERVER_ADDR);
    deliver_all(&mut server, SERVER_ADDR, &mut client, CLIENT_ADDR);

    client.write(b"hello from client");
    deliver_all(&mut client, CLIENT_ADDR, &mut server, SERVER_ADDR);

    let received = server.inbound_stream_mut().read(64);
    assert_eq!(received, b"hello from client");

    deliver_all(&mut server, SERVER_ADDR, &mut client, CLIENT_ADDR);
    assert_eq!(client.bytes_in_flight(), 0);

    client.end_input_stream();
    deliver_all(&mut client, CLIENT_ADDR, &mut server, SERVER_ADDR);
    assert!(server.inbound_stream().eof());

    deliver_all(&mut server, SERVER_ADDR, &mut client, CLIENT_ADDR);
}

#[test]
fn datagram_crosses_two_interfaces_via_longest_prefix_route() {
    let mut router = Router::new();
    router.add_route(Ipv4Addr::new(0, 0, 0, 0), 0, Some(Ipv4Addr::new(192, 168, 1, 1)), 0);
    router.add_route(Ipv4Addr::new(10, 1, 0, 0), 16, None, 1);

    let mut interfaces = vec![
        NetworkInterface::new([0; 6], Ipv4Addr::new(192, 168, 1, 2)),
        NetworkInterface::new([1; 6], Ipv4Addr::new(10, 1, 0, 1)),
    ];

    let dgram = Ipv4Datagram::new(
        Ipv4Addr::new(172, 16, 0, 5),
        Ipv4Addr::new(10, 1, 2, 3),
        5,
        b"payload".to_vec(),
    );
    router.route_one_datagram(dgram, &mut interfaces);

    // no neighbor is known yet on iface 1, so the frame is an ARP request,
    // not the forwarded datagram itself.
    assert!(interfaces[0].next_outbound_frame().is_none());
    assert!(interfaces[1].next_outbound_frame().is_some());
}
