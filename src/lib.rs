//! A userspace TCP/IP stack core, plus a thin blocking-socket convenience
//! layer built on top of it.
//!
//! The core (`byte_stream`, `wrap`, `reassembler`, `tcp`, `net`) is
//! single-threaded and synchronous: it never blocks and never spawns.
//! `Interface`/`TcpListener`/`TcpStream` below are a background-thread
//! adapter around that core, in the same shape the teacher built theirs
//! in, so the crate is directly usable as a `std::io::Read`/`Write`
//! socket library.

pub mod byte_stream;
pub mod error;
pub mod net;
pub mod reassembler;
pub mod tcp;
pub mod wrap;

use std::collections::{hash_map, HashMap, VecDeque};
use std::io;
use std::net::Ipv4Addr;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::net::codec;
use crate::tcp::config::TcpConfig;
use crate::tcp::connection::{Tcp4Tuple, TcpConnection};

const BUFFER_SIZE: usize = 1504;

type InterfaceHandle = Arc<InterfaceManager>;

#[derive(Default)]
struct InterfaceManager {
    manager: Mutex<ConnectionManager>,
    pending_var: Condvar,
    receive_var: Condvar,
}

/// Tracks listening ports and accepted connections.
#[derive(Default)]
pub struct ConnectionManager {
    pending: HashMap<u16, VecDeque<Tcp4Tuple>>,
    connections: HashMap<Tcp4Tuple, TcpConnection>,
    terminate: bool,
}

/// Interfaces to the thread that pumps TUN frames through the core and
/// dispatches them into `ConnectionManager`.
pub struct Interface {
    ih: Option<InterfaceHandle>,
    jh: Option<thread::JoinHandle<io::Result<()>>>,
}

/// Drains a connection's queued outbound segments onto the wire.
fn drain_outbound(nic: &tun_tap::Iface, local_ip: Ipv4Addr, tuple: Tcp4Tuple, conn: &mut TcpConnection) {
    while let Some(seg) = conn.next_outbound_segment() {
        match codec::build_datagram(&seg, (local_ip, tuple.dst.1), (tuple.src.0, tuple.src.1)) {
            Ok(bytes) => {
                let _ = nic.send(&bytes);
            }
            Err(e) => eprintln!("failed to serialize outbound segment: {e}"),
        }
    }
}

fn packet_loop(nic: tun_tap::Iface, local_ip: Ipv4Addr, ih: InterfaceHandle) -> io::Result<()> {
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        let nbytes = nic.recv(&mut buf[..])?;
        let version = buf[0] >> 4;
        if version != 4 {
            continue; // ignore non-ip
        }

        let (tuple, segment) = match codec::parse_segment(&buf[..nbytes]) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("ignoring packet. len:{nbytes} err: {e}");
                continue;
            }
        };
        let dstp = tuple.dst.1;

        let mut cm_guard = ih.manager.lock().unwrap();
        if cm_guard.terminate {
            return Ok(());
        }
        let cm = &mut *cm_guard;

        match cm.connections.entry(tuple) {
            hash_map::Entry::Occupied(mut entry) => {
                let conn = entry.get_mut();
                conn.segment_received(&segment);
                let readable = conn.inbound_stream().buffered_bytes() > 0 || conn.inbound_stream().eof();
                drain_outbound(&nic, local_ip, tuple, conn);
                drop(cm_guard);
                if readable {
                    ih.receive_var.notify_all();
                }
            }
            hash_map::Entry::Vacant(e) => {
                if segment.syn() && cm.pending.contains_key(&dstp) {
                    let mut conn = TcpConnection::new(&TcpConfig::default());
                    conn.segment_received(&segment);
                    let conn = e.insert(conn);
                    drain_outbound(&nic, local_ip, tuple, conn);
                    cm.pending.get_mut(&dstp).unwrap().push_back(tuple);
                    drop(cm_guard);
                    ih.pending_var.notify_all();
                }
            }
        }
    }
}

impl Interface {
    pub fn new(local_ip: Ipv4Addr) -> io::Result<Self> {
        let nic = tun_tap::Iface::without_packet_info("tun0", tun_tap::Mode::Tun)?;
        let ih: InterfaceHandle = Arc::default();

        let jh = {
            let ih = ih.clone();
            Some(thread::spawn(move || packet_loop(nic, local_ip, ih)))
        };

        Ok(Interface { ih: Some(ih), jh })
    }

    pub fn bind(&mut self, port: u16) -> io::Result<TcpListener> {
        let mut cm = self.ih.as_mut().unwrap().manager.lock().unwrap();
        match cm.pending.entry(port) {
            hash_map::Entry::Vacant(v) => {
                v.insert(VecDeque::new());
            }
            hash_map::Entry::Occupied(_) => {
                return Err(io::Error::new(io::ErrorKind::AddrInUse, "port in use"));
            }
        }
        drop(cm);
        Ok(TcpListener {
            ih: self.ih.as_mut().unwrap().clone(),
            port,
        })
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        self.ih.as_mut().unwrap().manager.lock().unwrap().terminate = true;
        drop(self.ih.take());
        if let Some(jh) = self.jh.take() {
            let _ = jh.join();
        }
    }
}

pub struct TcpListener {
    ih: InterfaceHandle,
    port: u16,
}

impl TcpListener {
    pub fn accept(&mut self) -> io::Result<TcpStream> {
        let mut cm = self.ih.manager.lock().unwrap();
        loop {
            if let Some(tuple) = cm
                .pending
                .get_mut(&self.port)
                .expect("port closed while listener is active")
                .pop_front()
            {
                return Ok(TcpStream {
                    ih: self.ih.clone(),
                    tuple,
                });
            }
            cm = self.ih.pending_var.wait(cm).unwrap();
        }
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        let mut cm = self.ih.manager.lock().unwrap();
        cm.pending
            .remove(&self.port)
            .expect("failed to remove port listener");
    }
}

pub struct TcpStream {
    ih: InterfaceHandle,
    tuple: Tcp4Tuple,
}

impl io::Read for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut cm = self.ih.manager.lock().unwrap();
        loop {
            let conn = cm
                .connections
                .get_mut(&self.tuple)
                .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"))?;

            let inbound = conn.inbound_stream_mut();
            if inbound.eof() && inbound.buffered_bytes() == 0 {
                return Ok(0);
            }
            if inbound.buffered_bytes() > 0 {
                let data = inbound.read(buf.len());
                buf[..data.len()].copy_from_slice(&data);
                return Ok(data.len());
            }
            cm = self.ih.receive_var.wait(cm).unwrap();
        }
    }
}

impl io::Write for TcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut cm = self.ih.manager.lock().unwrap();
        let conn = cm
            .connections
            .get_mut(&self.tuple)
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"))?;
        Ok(conn.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut cm = self.ih.manager.lock().unwrap();
        let conn = cm
            .connections
            .get_mut(&self.tuple)
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"))?;
        if conn.bytes_in_flight() == 0 {
            return Ok(());
        }
        Err(io::Error::new(io::ErrorKind::WouldBlock, "unacked data remains"))
    }
}

impl TcpStream {
    pub fn shutdown(&self, _how: std::net::Shutdown) -> io::Result<()> {
        let mut cm = self.ih.manager.lock().unwrap();
        if let Some(conn) = cm.connections.get_mut(&self.tuple) {
            conn.end_input_stream();
        }
        Ok(())
    }
}
