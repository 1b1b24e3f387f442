use super::dns::parse_dns_payload;
use super::frame::{
    Frame, MacAddr, parse_ethernet_layer, parse_ip_layer, parse_udp_layer, parse_vlan_tag,
};
use super::packet::ClassifiedPacket;
use crate::capture::{CaptureMetadata, FrameSource, SourceEvent};
use crate::error::CaptureError;
use log::{debug, info, trace};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// mDNS IPv4 link-local multicast group (RFC 6762 Section 3)
pub const MDNS_IPV4_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
/// mDNS IPv6 link-local multicast group
pub const MDNS_IPV6_GROUP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);
pub const MDNS_PORT: u16 = 5353;

/// Why a frame was not classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotEthernet,
    /// Source MAC is our bridge MAC: we relayed this frame ourselves
    OwnFrame,
    NotIp,
    NotMdnsGroup,
    NotUdp,
    NotMdnsPort,
    MalformedDns,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NotEthernet => "no Ethernet header",
            Self::OwnFrame => "sent by this relay",
            Self::NotIp => "not IPv4/IPv6",
            Self::NotMdnsGroup => "not addressed to the mDNS group",
            Self::NotUdp => "not UDP",
            Self::NotMdnsPort => "not addressed to port 5353",
            Self::MalformedDns => "malformed DNS payload",
        };
        f.write_str(reason)
    }
}

pub fn is_mdns_group(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4 == MDNS_IPV4_GROUP,
        IpAddr::V6(v6) => v6 == MDNS_IPV6_GROUP,
    }
}

/// Staged match: each layer is decoded only once the previous check passed.
pub fn classify(
    frame: Frame,
    metadata: CaptureMetadata,
    bridge_mac: MacAddr,
) -> Result<ClassifiedPacket, Rejection> {
    let (src_mac, dst_mac) = parse_ethernet_layer(&frame).ok_or(Rejection::NotEthernet)?;
    if src_mac == bridge_mac {
        return Err(Rejection::OwnFrame);
    }

    let (dst_ip, _is_ipv6) = parse_ip_layer(&frame).ok_or(Rejection::NotIp)?;
    if !is_mdns_group(dst_ip) {
        return Err(Rejection::NotMdnsGroup);
    }

    let (dst_port, payload) = parse_udp_layer(&frame).ok_or(Rejection::NotUdp)?;
    if dst_port != MDNS_PORT {
        return Err(Rejection::NotMdnsPort);
    }

    let is_dns_query = parse_dns_payload(payload).ok_or(Rejection::MalformedDns)?;
    let vlan_tag = parse_vlan_tag(&frame);

    Ok(ClassifiedPacket {
        frame,
        vlan_tag,
        src_mac,
        dst_mac,
        is_dns_query,
        metadata,
    })
}

/// Counters reported by the capture task when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub frames: u64,
    pub matched: u64,
    pub own_frames: u64,
    pub not_mdns: u64,
    pub undecodable: u64,
}

impl FilterSummary {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::OwnFrame => self.own_frames += 1,
            Rejection::NotMdnsGroup | Rejection::NotMdnsPort => self.not_mdns += 1,
            Rejection::NotEthernet
            | Rejection::NotIp
            | Rejection::NotUdp
            | Rejection::MalformedDns => self.undecodable += 1,
        }
    }
}

impl fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames read, {} matched, {} own, {} not mDNS, {} undecodable",
            self.frames, self.matched, self.own_frames, self.not_mdns, self.undecodable
        )
    }
}

/// Spawns the capture task and returns the stream of matching packets.
///
/// The task runs on the blocking pool, reads frames in arrival order and
/// pushes matches into a channel of `capacity` entries; a full channel blocks
/// the task. It stops when the source is exhausted, the token is cancelled,
/// or the receiver is dropped (all `Ok`), or on a read error (`Err`). The
/// channel is closed in every case.
pub fn filter_bonjour_packets<S>(
    mut source: S,
    bridge_mac: MacAddr,
    capacity: usize,
    cancel: CancellationToken,
) -> (
    JoinHandle<Result<FilterSummary, CaptureError>>,
    mpsc::Receiver<ClassifiedPacket>,
)
where
    S: FrameSource + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);

    let handle = tokio::task::spawn_blocking(move || -> Result<FilterSummary, CaptureError> {
        let mut summary = FilterSummary::default();

        loop {
            if cancel.is_cancelled() {
                info!("Capture cancelled");
                break;
            }

            match source.read_frame()? {
                SourceEvent::Frame(data, metadata) => {
                    summary.frames += 1;
                    match classify(Frame::new(data), metadata, bridge_mac) {
                        Ok(packet) => {
                            summary.matched += 1;
                            debug!(
                                "Matched mDNS {packet} ({}/{} bytes at {})",
                                packet.metadata.caplen,
                                packet.metadata.len,
                                packet.metadata.timestamp.format("%H:%M:%S%.3f")
                            );
                            if tx.blocking_send(packet).is_err() {
                                info!("Packet stream closed, stopping capture");
                                break;
                            }
                        }
                        Err(rejection) => {
                            trace!("Dropping frame: {rejection}");
                            summary.record(rejection);
                        }
                    }
                }
                SourceEvent::Idle => {}
                SourceEvent::Exhausted => {
                    info!("Capture source exhausted");
                    break;
                }
            }
        }

        info!("Packet capture task terminated: {summary}");
        Ok(summary)
    });

    (handle, rx)
}
