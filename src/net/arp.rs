//! RFC 826 ARP parse/serialize. `etherparse` has no ARP support, so this is
//! the one wire codec the core writes by hand (the rest delegate to
//! `etherparse`, per § 4.I of the design doc).

use std::net::Ipv4Addr;

use crate::error::StackError;

pub const ETHERTYPE_ARP: u16 = 0x0806;

const HW_TYPE_ETHERNET: u16 = 1;
const PROTO_TYPE_IPV4: u16 = 0x0800;
const HW_ADDR_LEN: u8 = 6;
const PROTO_ADDR_LEN: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOpcode {
    Request,
    Reply,
}

#[derive(Debug, Clone, Copy)]
pub struct ArpPacket {
    pub opcode: ArpOpcode,
    pub sender_mac: [u8; 6],
    pub sender_ip: Ipv4Addr,
    pub target_mac: [u8; 6],
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub fn request(my_mac: [u8; 6], my_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpPacket {
            opcode: ArpOpcode::Request,
            sender_mac: my_mac,
            sender_ip: my_ip,
            target_mac: [0; 6],
            target_ip,
        }
    }

    pub fn reply(my_mac: [u8; 6], my_ip: Ipv4Addr, to_mac: [u8; 6], to_ip: Ipv4Addr) -> Self {
        ArpPacket {
            opcode: ArpOpcode::Reply,
            sender_mac: my_mac,
            sender_ip: my_ip,
            target_mac: to_mac,
            target_ip: to_ip,
        }
    }

    pub fn serialize(&self) -> [u8; 28] {
        let mut buf = [0u8; 28];
        buf[0..2].copy_from_slice(&HW_TYPE_ETHERNET.to_be_bytes());
        buf[2..4].copy_from_slice(&PROTO_TYPE_IPV4.to_be_bytes());
        buf[4] = HW_ADDR_LEN;
        buf[5] = PROTO_ADDR_LEN;
        let opcode: u16 = match self.opcode {
            ArpOpcode::Request => 1,
            ArpOpcode::Reply => 2,
        };
        buf[6..8].copy_from_slice(&opcode.to_be_bytes());
        buf[8..14].copy_from_slice(&self.sender_mac);
        buf[14..18].copy_from_slice(&self.sender_ip.octets());
        buf[18..24].copy_from_slice(&self.target_mac);
        buf[24..28].copy_from_slice(&self.target_ip.octets());
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self, StackError> {
        if data.len() < 28 {
            return Err(StackError::ParseFailure("ARP"));
        }
        let hw_type = u16::from_be_bytes([data[0], data[1]]);
        let proto_type = u16::from_be_bytes([data[2], data[3]]);
        let hw_len = data[4];
        let proto_len = data[5];
        if hw_type != HW_TYPE_ETHERNET
            || proto_type != PROTO_TYPE_IPV4
            || hw_len != HW_ADDR_LEN
            || proto_len != PROTO_ADDR_LEN
        {
            return Err(StackError::ParseFailure("ARP"));
        }
        let opcode = match u16::from_be_bytes([data[6], data[7]]) {
            1 => ArpOpcode::Request,
            2 => ArpOpcode::Reply,
            _ => return Err(StackError::ParseFailure("ARP")),
        };
        let mut sender_mac = [0u8; 6];
        sender_mac.copy_from_slice(&data[8..14]);
        let sender_ip = Ipv4Addr::new(data[14], data[15], data[16], data[17]);
        let mut target_mac = [0u8; 6];
        target_mac.copy_from_slice(&data[18..24]);
        let target_ip = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        Ok(ArpPacket {
            opcode,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }
}
