use super::dns;
use super::frame::{Frame, MacAddr, parse_udp_layer};
use crate::capture::CaptureMetadata;
use std::fmt;

/// A frame that passed the mDNS filter, ready to be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPacket {
    pub frame: Frame,
    /// VLAN the frame was observed on; `None` for untagged frames
    pub vlan_tag: Option<u16>,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub is_dns_query: bool,
    pub metadata: CaptureMetadata,
}

impl ClassifiedPacket {
    pub fn kind(&self) -> &'static str {
        if self.is_dns_query { "query" } else { "response" }
    }
}

/// One-line description for logs, e.g.
/// `query ff:aa:fa:aa:ff:aa -> bd:bd:bd:bd:bd:bd on VLAN 30 (example.com A)`.
impl fmt::Display for ClassifiedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.kind(), self.src_mac, self.dst_mac)?;
        match self.vlan_tag {
            Some(vlan) => write!(f, " on VLAN {vlan}")?,
            None => f.write_str(" untagged")?,
        }

        let question = parse_udp_layer(&self.frame)
            .and_then(|(_, payload)| dns::first_question(payload));
        if let Some((name, qtype)) = question {
            write!(f, " ({} {qtype})", String::from_utf8_lossy(&name))?;
        }
        Ok(())
    }
}
