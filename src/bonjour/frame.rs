use crate::error::ConfigError;
use bytes::Bytes;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::Range;
use std::str::FromStr;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const DOT1Q_TAG_LEN: usize = 4;
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;
pub const ETHERTYPE_DOT1Q: u16 = 0x8100;
pub const VLAN_ID_MASK: u16 = 0x0FFF;

/// Offset of the source MAC inside the Ethernet header
pub const SRC_MAC_OFFSET: usize = 6;
/// Offset of the EtherType (or 802.1Q TPID) inside the Ethernet header
pub const ETHERTYPE_OFFSET: usize = 12;

const IP_PROTOCOL_UDP: u8 = 17;
const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;
const UDP_HEADER_LEN: usize = 8;
const IPV4_FRAGMENT_OFFSET_MASK: u16 = 0x1FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Accepts `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`, any case.
impl FromStr for MacAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidMac(s.to_string());
        let parts: Vec<&str> = s.split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        Ok(Self::new(bytes))
    }
}

/// A captured link-layer frame.
///
/// Holds only the raw bytes; every `parse_*` function below decodes the
/// headers it needs on demand, so a frame that fails an early check never
/// pays for the deeper layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Decoded IP header: where the transport segment lives in the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IpHeader {
    destination: IpAddr,
    protocol: u8,
    /// Non-zero for every IPv4 fragment but the first; always 0 for IPv6
    fragment_offset: u16,
    payload: Range<usize>,
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Parse the Ethernet II header (RFC 894)
///
/// ```text
/// [0-5]:   Destination MAC
/// [6-11]:  Source MAC
/// [12-13]: EtherType (0x8100 when an 802.1Q tag follows)
/// ```
///
/// Returns: (source MAC, destination MAC)
pub fn parse_ethernet_layer(frame: &Frame) -> Option<(MacAddr, MacAddr)> {
    let data = frame.data();
    if data.len() < ETHERNET_HEADER_LEN {
        return None;
    }

    let mut dst = [0u8; 6];
    let mut src = [0u8; 6];
    dst.copy_from_slice(&data[0..6]);
    src.copy_from_slice(&data[SRC_MAC_OFFSET..SRC_MAC_OFFSET + 6]);

    Some((MacAddr(src), MacAddr(dst)))
}

/// Raw Tag Control Information of the 802.1Q tag, if the frame carries one.
///
/// ```text
/// [12-13]: TPID 0x8100
/// [14-15]: TCI = PCP (3 bits) | DEI (1 bit) | VID (12 bits)
/// [16-17]: EtherType of the encapsulated payload
/// ```
pub fn parse_dot1q_tci(frame: &Frame) -> Option<u16> {
    let data = frame.data();
    if data.len() < ETHERNET_HEADER_LEN + DOT1Q_TAG_LEN {
        return None;
    }
    if be_u16(data, ETHERTYPE_OFFSET) != ETHERTYPE_DOT1Q {
        return None;
    }
    Some(be_u16(data, ETHERTYPE_OFFSET + 2))
}

pub fn parse_vlan_tag(frame: &Frame) -> Option<u16> {
    parse_dot1q_tci(frame).map(|tci| tci & VLAN_ID_MASK)
}

/// EtherType of the network layer and the offset where it starts,
/// looking through at most one 802.1Q tag.
fn network_layer(frame: &Frame) -> Option<(u16, usize)> {
    let data = frame.data();
    if data.len() < ETHERNET_HEADER_LEN {
        return None;
    }

    let eth_type = be_u16(data, ETHERTYPE_OFFSET);
    if eth_type != ETHERTYPE_DOT1Q {
        return Some((eth_type, ETHERNET_HEADER_LEN));
    }

    let offset = ETHERNET_HEADER_LEN + DOT1Q_TAG_LEN;
    if data.len() < offset {
        return None;
    }
    Some((be_u16(data, ETHERTYPE_OFFSET + DOT1Q_TAG_LEN), offset))
}

fn ip_header(frame: &Frame) -> Option<IpHeader> {
    let (eth_type, offset) = network_layer(frame)?;
    let data = &frame.data()[offset..];

    let mut header = match eth_type {
        ETHERTYPE_IPV4 => parse_ipv4(data)?,
        ETHERTYPE_IPV6 => parse_ipv6(data)?,
        _ => return None,
    };

    header.payload = header.payload.start + offset..header.payload.end + offset;
    Some(header)
}

/// Parse IPv4 header (RFC 791)
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |Version|  IHL  |Type of Service|          Total Length         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Identification        |Flags|      Fragment Offset    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Time to Live |    Protocol   |         Header Checksum       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Source Address                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    Destination Address                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The payload ends at Total Length, clamped to the captured bytes so that
/// truncated captures still decode. Only the first fragment of a datagram
/// starts with the transport header.
fn parse_ipv4(data: &[u8]) -> Option<IpHeader> {
    if data.len() < IPV4_MIN_HEADER_LEN || data[0] >> 4 != 4 {
        return None;
    }

    let ihl = (data[0] & 0x0F) as usize * 4;
    if ihl < IPV4_MIN_HEADER_LEN || data.len() < ihl {
        return None;
    }

    let total_len = be_u16(data, 2) as usize;
    let end = total_len.clamp(ihl, data.len());
    let destination = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

    Some(IpHeader {
        destination: IpAddr::V4(destination),
        protocol: data[9],
        fragment_offset: be_u16(data, 6) & IPV4_FRAGMENT_OFFSET_MASK,
        payload: ihl..end,
    })
}

/// Parse IPv6 fixed header (RFC 8200)
///
/// ```text
/// [0-3]:   Version | Traffic Class | Flow Label
/// [4-5]:   Payload Length
/// [6]:     Next Header
/// [7]:     Hop Limit
/// [8-23]:  Source Address
/// [24-39]: Destination Address
/// ```
///
/// Extension headers are not walked: mDNS datagrams carry UDP directly.
fn parse_ipv6(data: &[u8]) -> Option<IpHeader> {
    if data.len() < IPV6_HEADER_LEN || data[0] >> 4 != 6 {
        return None;
    }

    let payload_len = be_u16(data, 4) as usize;
    let end = (IPV6_HEADER_LEN + payload_len).min(data.len());

    let mut octets = [0u8; 16];
    octets.copy_from_slice(&data[24..40]);

    Some(IpHeader {
        destination: IpAddr::V6(Ipv6Addr::from(octets)),
        protocol: data[6],
        fragment_offset: 0,
        payload: IPV6_HEADER_LEN..end,
    })
}

/// Returns: (destination address, is IPv6)
pub fn parse_ip_layer(frame: &Frame) -> Option<(IpAddr, bool)> {
    let header = ip_header(frame)?;
    Some((header.destination, header.destination.is_ipv6()))
}

/// Parse the UDP header (RFC 768) carried by the IP layer
///
/// ```text
/// [0-1]: Source Port
/// [2-3]: Destination Port
/// [4-5]: Length
/// [6-7]: Checksum
/// ```
///
/// The payload is bounded by the Length field when it is sane, which strips
/// Ethernet padding from short frames. A non-first IPv4 fragment carries
/// the middle of a datagram and has no UDP layer.
///
/// Returns: (destination port, payload)
pub fn parse_udp_layer(frame: &Frame) -> Option<(u16, &[u8])> {
    let header = ip_header(frame)?;
    if header.protocol != IP_PROTOCOL_UDP || header.fragment_offset != 0 {
        return None;
    }

    let segment = &frame.data()[header.payload];
    if segment.len() < UDP_HEADER_LEN {
        return None;
    }

    let dst_port = be_u16(segment, 2);
    let udp_len = be_u16(segment, 4) as usize;
    let end = if udp_len >= UDP_HEADER_LEN {
        udp_len.min(segment.len())
    } else {
        segment.len()
    };

    Some((dst_port, &segment[UDP_HEADER_LEN..end]))
}
