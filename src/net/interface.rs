//! Component G: IPv4-over-Ethernet encapsulation and ARP resolution with
//! caching and request throttling. Owns the ARP table and the per-IP
//! pending-frame queues; every pending-frame entry has a companion
//! `eth: None` ARP-table entry, and learning an address flushes its queue.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

use crate::error::StackError;
use crate::net::arp::{ArpOpcode, ArpPacket, ETHERTYPE_ARP};
use crate::net::datagram::Ipv4Datagram;
use crate::net::ethernet::{self, EthernetHeader, ETHERTYPE_IPV4};

pub const BROADCAST_MAC: [u8; 6] = [0xff; 6];
const ARP_REQUEST_TIMEOUT_MS: u64 = 5_000;
const ARP_ENTRY_TTL_MS: u64 = 30_000;

#[derive(Debug)]
struct ArpEntry {
    eth: Option<[u8; 6]>,
    learned_at: u64,
    requested_at: u64,
}

#[derive(Debug)]
pub struct NetworkInterface {
    my_eth: [u8; 6],
    my_ip: Ipv4Addr,
    outbound_frames: VecDeque<Vec<u8>>,
    inbound_datagrams: VecDeque<Ipv4Datagram>,
    arp_table: HashMap<Ipv4Addr, ArpEntry>,
    pending_frames: HashMap<Ipv4Addr, Vec<Vec<u8>>>,
    ms_clock: u64,
}

impl NetworkInterface {
    pub fn new(my_eth: [u8; 6], my_ip: Ipv4Addr) -> Self {
        NetworkInterface {
            my_eth,
            my_ip,
            outbound_frames: VecDeque::new(),
            inbound_datagrams: VecDeque::new(),
            arp_table: HashMap::new(),
            pending_frames: HashMap::new(),
            ms_clock: 0,
        }
    }

    pub fn my_ip(&self) -> Ipv4Addr {
        self.my_ip
    }

    fn push_frame(&mut self, dst: [u8; 6], ethertype: u16, payload: &[u8]) {
        self.outbound_frames
            .push_back(ethernet::build_frame(dst, self.my_eth, ethertype, payload));
    }

    /// Sends a serialized IPv4 datagram to `next_hop`, resolving its MAC
    /// address via ARP (queueing the frame, and broadcasting a request, if
    /// the mapping isn't known yet).
    pub fn send_datagram(&mut self, datagram: Vec<u8>, next_hop: Ipv4Addr) {
        if let Some(entry) = self.arp_table.get(&next_hop) {
            if let Some(mac) = entry.eth {
                self.push_frame(mac, ETHERTYPE_IPV4, &datagram);
                return;
            }
        }

        self.pending_frames.entry(next_hop).or_default().push(datagram);

        let should_request = match self.arp_table.get(&next_hop) {
            None => true,
            Some(entry) => {
                entry.eth.is_none() && self.ms_clock - entry.requested_at >= ARP_REQUEST_TIMEOUT_MS
            }
        };

        if should_request {
            self.arp_table.insert(
                next_hop,
                ArpEntry {
                    eth: None,
                    learned_at: 0,
                    requested_at: self.ms_clock,
                },
            );
            let req = ArpPacket::request(self.my_eth, self.my_ip, next_hop);
            self.push_frame(BROADCAST_MAC, ETHERTYPE_ARP, &req.serialize());
        }
    }

    /// Parses an inbound Ethernet frame. Returns the enclosed IPv4 datagram
    /// bytes when this frame is one we should hand up the stack; learns
    /// and replies to ARP traffic as a side effect.
    pub fn recv_frame(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>, StackError> {
        let header = EthernetHeader::parse(frame)?;
        let payload = &frame[ethernet::HEADER_LEN..];

        match header.ethertype {
            ETHERTYPE_IPV4 => {
                if header.destination == self.my_eth || header.destination == BROADCAST_MAC {
                    if let Ok(dgram) = Ipv4Datagram::parse(payload) {
                        self.inbound_datagrams.push_back(dgram);
                    }
                    Ok(Some(payload.to_vec()))
                } else {
                    Ok(None)
                }
            }
            ETHERTYPE_ARP => {
                let arp = ArpPacket::parse(payload)?;
                self.learn(arp.sender_ip, arp.sender_mac);
                if arp.opcode == ArpOpcode::Request && arp.target_ip == self.my_ip {
                    let reply =
                        ArpPacket::reply(self.my_eth, self.my_ip, arp.sender_mac, arp.sender_ip);
                    self.push_frame(arp.sender_mac, ETHERTYPE_ARP, &reply.serialize());
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn learn(&mut self, ip: Ipv4Addr, mac: [u8; 6]) {
        self.arp_table.insert(
            ip,
            ArpEntry {
                eth: Some(mac),
                learned_at: self.ms_clock,
                requested_at: 0,
            },
        );
        if let Some(queued) = self.pending_frames.remove(&ip) {
            for datagram in queued {
                self.push_frame(mac, ETHERTYPE_IPV4, &datagram);
            }
        }
    }

    pub fn tick(&mut self, ms: u64) {
        self.ms_clock += ms;
        let now = self.ms_clock;
        self.arp_table.retain(|_, entry| match entry.eth {
            None => now - entry.requested_at < ARP_REQUEST_TIMEOUT_MS,
            Some(_) => now - entry.learned_at < ARP_ENTRY_TTL_MS,
        });
    }

    pub fn next_outbound_frame(&mut self) -> Option<Vec<u8>> {
        self.outbound_frames.pop_front()
    }

    /// Pops the next datagram queued for routing by `Router::route`. Every
    /// successfully parsed inbound IPv4 datagram lands here, in addition to
    /// being returned directly by `recv_frame` for a host that terminates
    /// TCP itself rather than forwarding.
    pub fn next_inbound_datagram(&mut self) -> Option<Ipv4Datagram> {
        self.inbound_datagrams.pop_front()
    }

    #[cfg(test)]
    fn arp_entries(&self) -> usize {
        self.arp_table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IFACE_MAC: [u8; 6] = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01];
    const PEER_MAC: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];

    #[test]
    fn arp_miss_queues_and_broadcasts_once() {
        let mut iface = NetworkInterface::new(IFACE_MAC, Ipv4Addr::new(10, 0, 0, 1));
        iface.send_datagram(b"hello".to_vec(), Ipv4Addr::new(10, 0, 0, 2));
        iface.send_datagram(b"again".to_vec(), Ipv4Addr::new(10, 0, 0, 2));

        let mut ip_frames = 0;
        let mut arp_frames = 0;
        while let Some(frame) = iface.next_outbound_frame() {
            let hdr = EthernetHeader::parse(&frame).unwrap();
            match hdr.ethertype {
                ETHERTYPE_IPV4 => ip_frames += 1,
                ETHERTYPE_ARP => arp_frames += 1,
                _ => unreachable!(),
            }
        }
        assert_eq!(ip_frames, 0);
        assert_eq!(arp_frames, 1); // throttled: second send doesn't re-request
    }

    #[test]
    fn learning_flushes_pending_frames() {
        let mut iface = NetworkInterface::new(IFACE_MAC, Ipv4Addr::new(10, 0, 0, 1));
        iface.send_datagram(b"payload".to_vec(), Ipv4Addr::new(10, 0, 0, 2));
        while iface.next_outbound_frame().is_some() {} // drain the ARP request

        let reply = ArpPacket::reply(
            PEER_MAC,
            Ipv4Addr::new(10, 0, 0, 2),
            IFACE_MAC,
            Ipv4Addr::new(10, 0, 0, 1),
        );
        let frame = ethernet::build_frame(IFACE_MAC, PEER_MAC, ETHERTYPE_ARP, &reply.serialize());

        assert!(iface.recv_frame(&frame).unwrap().is_none());
        assert_eq!(iface.arp_entries(), 1);

        let queued = iface.next_outbound_frame().unwrap();
        let hdr = EthernetHeader::parse(&queued).unwrap();
        assert_eq!(hdr.destination, PEER_MAC);
    }

    #[test]
    fn stale_arp_request_expires() {
        let mut iface = NetworkInterface::new(IFACE_MAC, Ipv4Addr::new(10, 0, 0, 1));
        iface.send_datagram(b"x".to_vec(), Ipv4Addr::new(10, 0, 0, 2));
        iface.tick(5_000);
        assert_eq!(iface.arp_entries(), 0);
    }
}
