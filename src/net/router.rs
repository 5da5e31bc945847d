//! Component H: longest-prefix-match IPv4 forwarding across a caller-owned
//! set of interfaces. The router holds indices into that set, not the
//! interfaces themselves -- routing mutates an interface's outbound queue
//! but the router has no ownership stake in it.

use std::net::Ipv4Addr;

use crate::net::datagram::Ipv4Datagram;
use crate::net::interface::NetworkInterface;

#[derive(Debug, Clone, Copy)]
struct Route {
    prefix: u32,
    mask: u32,
    mask_len: u8,
    next_hop: Option<Ipv4Addr>,
    iface: usize,
}

#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Router { routes: Vec::new() }
    }

    /// Adds a route and re-sorts by mask length descending (longest prefix
    /// first). Ties keep their relative insertion order, since `sort_by_key`
    /// is stable.
    pub fn add_route(
        &mut self,
        prefix: Ipv4Addr,
        mask_len: u8,
        next_hop: Option<Ipv4Addr>,
        iface: usize,
    ) {
        let mask: u32 = if mask_len == 0 {
            0
        } else {
            0xFFFF_FFFFu32 << (32 - mask_len)
        };
        self.routes.push(Route {
            prefix: u32::from(prefix) & mask,
            mask,
            mask_len,
            next_hop,
            iface,
        });
        self.routes.sort_by_key(|r| std::cmp::Reverse(r.mask_len));
    }

    fn find_route(&self, dst: Ipv4Addr) -> Option<&Route> {
        let dst: u32 = dst.into();
        self.routes.iter().find(|r| dst & r.mask == r.prefix)
    }

    /// Routes one already-decoded datagram. Drops it silently if the TTL
    /// has expired or no route matches.
    pub fn route_one_datagram(&self, dgram: Ipv4Datagram, interfaces: &mut [NetworkInterface]) {
        if dgram.ttl() <= 1 {
            return;
        }
        let Some(route) = self.find_route(dgram.destination()) else {
            return;
        };
        let next_hop = route.next_hop.unwrap_or_else(|| dgram.destination());
        let decremented = dgram.with_ttl_decremented();
        interfaces[route.iface].send_datagram(decremented.into_bytes(), next_hop);
    }

    /// Drains every interface's inbound datagram queue through
    /// `route_one_datagram`.
    pub fn route(&self, interfaces: &mut [NetworkInterface]) {
        let pending: Vec<Ipv4Datagram> = interfaces
            .iter_mut()
            .flat_map(|iface| std::iter::from_fn(|| iface.next_inbound_datagram()))
            .collect();
        for dgram in pending {
            self.route_one_datagram(dgram, interfaces);
        }
    }
}
