//! Frame builders and in-memory capture endpoints for tests.

use super::frame::MacAddr;
use crate::capture::{CaptureMetadata, FrameSink, FrameSource, SourceEvent};
use crate::error::CaptureError;
use bytes::Bytes;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SRC_MAC: MacAddr = MacAddr::new([0xFF, 0xAA, 0xFA, 0xAA, 0xFF, 0xAA]);
pub const DST_MAC: MacAddr = MacAddr::new([0xBD, 0xBD, 0xBD, 0xBD, 0xBD, 0xBD]);
pub const BRIDGE_MAC: MacAddr = MacAddr::new([0xF2, 0xAA, 0xFA, 0xAA, 0xFF, 0xAA]);
pub const VLAN_ID: u16 = 30;

const SRC_IPV4: Ipv4Addr = Ipv4Addr::new(192, 168, 30, 10);
const SRC_IPV6: Ipv6Addr = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0x10);

fn encode_name(out: &mut Vec<u8>, name: &str) {
    for label in name.split('.') {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
}

fn dns_header(id: u16, flags: u16, qd_count: u16, an_count: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    for field in [id, flags, qd_count, an_count, 0, 0] {
        out.extend_from_slice(&field.to_be_bytes());
    }
    out
}

/// One question: `example.com A IN`.
pub fn dns_query_payload() -> Vec<u8> {
    dns_query_payload_with_id(0)
}

fn dns_query_payload_with_id(id: u16) -> Vec<u8> {
    let mut out = dns_header(id, 0x0000, 1, 0);
    encode_name(&mut out, "example.com");
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out
}

/// One answer: `example.com A IN 1024 1.2.3.4`, QR and AA set.
pub fn dns_answer_payload() -> Vec<u8> {
    dns_answer_payload_with_id(0)
}

fn dns_answer_payload_with_id(id: u16) -> Vec<u8> {
    let mut out = dns_header(id, 0x8400, 0, 1);
    encode_name(&mut out, "example.com");
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&1024u32.to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&[1, 2, 3, 4]);
    out
}

/// Builds Ethernet / 802.1Q / IP / UDP / DNS frames.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    src_mac: MacAddr,
    dst_mac: MacAddr,
    vlan: Option<u16>,
    priority: u8,
    dst_ip: IpAddr,
    dst_port: u16,
    ipv4_options: usize,
    query: bool,
    dns_id: u16,
}

impl FrameBuilder {
    pub fn mdns_query() -> Self {
        Self {
            src_mac: SRC_MAC,
            dst_mac: DST_MAC,
            vlan: Some(VLAN_ID),
            priority: 0,
            dst_ip: IpAddr::V4(Ipv4Addr::new(224, 0, 0, 251)),
            dst_port: 5353,
            ipv4_options: 0,
            query: true,
            dns_id: 0,
        }
    }

    pub fn mdns_answer() -> Self {
        Self {
            query: false,
            ..Self::mdns_query()
        }
    }

    /// Switches to IPv6 with the mDNS group as destination.
    pub fn ipv6(mut self) -> Self {
        self.dst_ip = IpAddr::V6(Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb));
        self
    }

    pub fn dst_ip(mut self, dst_ip: IpAddr) -> Self {
        self.dst_ip = dst_ip;
        self
    }

    pub fn dst_port(mut self, dst_port: u16) -> Self {
        self.dst_port = dst_port;
        self
    }

    pub fn src_mac(mut self, src_mac: MacAddr) -> Self {
        self.src_mac = src_mac;
        self
    }

    pub fn untagged(mut self) -> Self {
        self.vlan = None;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Pads the IPv4 header with `words` 32-bit words of NOP options.
    pub fn ipv4_options(mut self, words: usize) -> Self {
        self.ipv4_options = words;
        self
    }

    pub fn dns_id(mut self, id: u16) -> Self {
        self.dns_id = id;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let payload = if self.query {
            dns_query_payload_with_id(self.dns_id)
        } else {
            dns_answer_payload_with_id(self.dns_id)
        };

        let mut udp = Vec::with_capacity(8 + payload.len());
        udp.extend_from_slice(&5353u16.to_be_bytes());
        udp.extend_from_slice(&self.dst_port.to_be_bytes());
        udp.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        udp.extend_from_slice(&[0, 0]);
        udp.extend_from_slice(&payload);

        let (ether_type, ip) = match self.dst_ip {
            IpAddr::V4(dst) => (0x0800u16, self.ipv4(dst, &udp)),
            IpAddr::V6(dst) => (0x86DDu16, Self::ipv6_packet(dst, &udp)),
        };

        let mut frame = Vec::new();
        frame.extend_from_slice(&self.dst_mac.octets());
        frame.extend_from_slice(&self.src_mac.octets());
        if let Some(vlan) = self.vlan {
            let tci = (u16::from(self.priority) << 13) | vlan;
            frame.extend_from_slice(&0x8100u16.to_be_bytes());
            frame.extend_from_slice(&tci.to_be_bytes());
        }
        frame.extend_from_slice(&ether_type.to_be_bytes());
        frame.extend_from_slice(&ip);
        frame
    }

    fn ipv4(&self, dst: Ipv4Addr, udp: &[u8]) -> Vec<u8> {
        let header_len = 20 + self.ipv4_options * 4;
        let total_len = (header_len + udp.len()) as u16;

        let mut out = Vec::with_capacity(header_len + udp.len());
        out.push(0x40 | (header_len / 4) as u8);
        out.push(0);
        out.extend_from_slice(&total_len.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.push(255);
        out.push(17);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&SRC_IPV4.octets());
        out.extend_from_slice(&dst.octets());
        out.resize(header_len, 1);
        out.extend_from_slice(udp);
        out
    }

    fn ipv6_packet(dst: Ipv6Addr, udp: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(40 + udp.len());
        out.extend_from_slice(&[0x60, 0, 0, 0]);
        out.extend_from_slice(&(udp.len() as u16).to_be_bytes());
        out.push(17);
        out.push(255);
        out.extend_from_slice(&SRC_IPV6.octets());
        out.extend_from_slice(&dst.octets());
        out.extend_from_slice(udp);
        out
    }
}

/// Replays a fixed list of frames, then reports end-of-data.
pub struct VecSource {
    frames: VecDeque<Vec<u8>>,
    fail_at_end: bool,
    idle_at_end: bool,
}

impl VecSource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: frames.into(),
            fail_at_end: false,
            idle_at_end: false,
        }
    }

    /// Fail with a read error instead of ending cleanly.
    pub fn then_fail(mut self) -> Self {
        self.fail_at_end = true;
        self
    }

    /// Keep timing out instead of ending, like a quiet live interface.
    pub fn idle_forever(mut self) -> Self {
        self.idle_at_end = true;
        self
    }
}

impl FrameSource for VecSource {
    fn read_frame(&mut self) -> Result<SourceEvent, CaptureError> {
        if let Some(frame) = self.frames.pop_front() {
            let metadata = CaptureMetadata::now(frame.len());
            return Ok(SourceEvent::Frame(Bytes::from(frame), metadata));
        }

        if self.fail_at_end {
            return Err(CaptureError::Read(pcap::Error::PcapError(
                "device went away".to_string(),
            )));
        }
        if self.idle_at_end {
            std::thread::sleep(Duration::from_millis(1));
            return Ok(SourceEvent::Idle);
        }
        Ok(SourceEvent::Exhausted)
    }
}

/// Records injected frames; can be told to fail its first writes.
pub struct MemorySink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    failures_left: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures_left: failures,
        }
    }

    /// Shared view of the sent frames, usable after the sink moved into a task.
    pub fn handle(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.sent)
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl FrameSink for MemorySink {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), CaptureError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(CaptureError::Write {
                interface: "memory".to_string(),
                source: pcap::Error::PcapError("send failed".to_string()),
            });
        }
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }
}
