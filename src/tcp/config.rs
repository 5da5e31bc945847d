//! TCPConfig: the wire-tunable knobs (§6), plus a pluggable ISN source so
//! tests can inject a `fixed_isn` deterministically (the teacher's sibling
//! `maminrayej-handshake` pulls in `rand` for the same reason).

use crate::wrap::WrappingInt32;

pub const DEFAULT_CAPACITY: usize = 64 * 1024;
pub const DEFAULT_RT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_RETX_ATTEMPTS: u32 = 8;
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct TcpConfig {
    pub recv_capacity: usize,
    pub send_capacity: usize,
    pub rt_timeout: u64,
    pub fixed_isn: Option<WrappingInt32>,
    pub max_retx_attempts: u32,
    pub max_payload_size: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            recv_capacity: DEFAULT_CAPACITY,
            send_capacity: DEFAULT_CAPACITY,
            rt_timeout: DEFAULT_RT_TIMEOUT_MS,
            fixed_isn: None,
            max_retx_attempts: DEFAULT_MAX_RETX_ATTEMPTS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl TcpConfig {
    /// Returns the configured ISN, or a fresh random one if none was fixed.
    pub fn isn(&self) -> WrappingInt32 {
        self.fixed_isn
            .unwrap_or_else(|| WrappingInt32::new(rand::random()))
    }
}
