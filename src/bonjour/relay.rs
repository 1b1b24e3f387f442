use super::frame::{
    DOT1Q_TAG_LEN, ETHERNET_HEADER_LEN, ETHERTYPE_DOT1Q, ETHERTYPE_OFFSET, MacAddr,
    SRC_MAC_OFFSET, VLAN_ID_MASK, parse_dot1q_tci,
};
use super::packet::ClassifiedPacket;
use crate::capture::FrameSink;
use crate::error::CaptureError;
use clap::ValueEnum;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What to do with a matching frame that carried no 802.1Q tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum UntaggedPolicy {
    /// Do not relay it
    #[default]
    Drop,
    /// Insert a tag for the target VLAN
    Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent,
    SkippedUntagged,
}

/// Where a relay consumer writes and how it stamps frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTarget {
    pub vlan: u16,
    pub bridge_mac: MacAddr,
    pub untagged: UntaggedPolicy,
}

/// Copies the frame, replacing the VLAN ID and the Ethernet source.
///
/// Priority and DEI bits of an existing tag are kept. Every byte after the
/// tag is carried over untouched, so IP/UDP checksums stay valid. Returns
/// `None` when the frame is untagged and the policy is [`UntaggedPolicy::Drop`].
pub fn rewrite_frame(
    packet: &ClassifiedPacket,
    target_vlan: u16,
    bridge_mac: MacAddr,
    untagged: UntaggedPolicy,
) -> Option<Vec<u8>> {
    let data = packet.frame.data();
    if data.len() < ETHERNET_HEADER_LEN {
        return None;
    }

    let vid = target_vlan & VLAN_ID_MASK;
    let mut out = match (parse_dot1q_tci(&packet.frame), untagged) {
        (Some(tci), _) => {
            let mut out = data.to_vec();
            let tci = (tci & !VLAN_ID_MASK) | vid;
            out[ETHERTYPE_OFFSET + 2..ETHERTYPE_OFFSET + DOT1Q_TAG_LEN]
                .copy_from_slice(&tci.to_be_bytes());
            out
        }
        (None, UntaggedPolicy::Tag) => {
            let mut out = Vec::with_capacity(data.len() + DOT1Q_TAG_LEN);
            out.extend_from_slice(&data[..ETHERTYPE_OFFSET]);
            out.extend_from_slice(&ETHERTYPE_DOT1Q.to_be_bytes());
            out.extend_from_slice(&vid.to_be_bytes());
            out.extend_from_slice(&data[ETHERTYPE_OFFSET..]);
            out
        }
        (None, UntaggedPolicy::Drop) => return None,
    };

    out[SRC_MAC_OFFSET..SRC_MAC_OFFSET + 6].copy_from_slice(&bridge_mac.octets());
    Some(out)
}

pub fn relay_packet<K: FrameSink + ?Sized>(
    sink: &mut K,
    packet: &ClassifiedPacket,
    target_vlan: u16,
    bridge_mac: MacAddr,
    untagged: UntaggedPolicy,
) -> Result<RelayOutcome, CaptureError> {
    let Some(frame) = rewrite_frame(packet, target_vlan, bridge_mac, untagged) else {
        return Ok(RelayOutcome::SkippedUntagged);
    };
    sink.send_frame(&frame)?;
    Ok(RelayOutcome::Sent)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub relayed: u64,
    pub skipped_untagged: u64,
    pub failed: u64,
}

impl fmt::Display for RelaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} relayed, {} untagged skipped, {} failed",
            self.relayed, self.skipped_untagged, self.failed
        )
    }
}

/// Relay consumer for one VLAN; owns its sink exclusively.
///
/// Runs until the stream closes (after draining it) or the token fires.
/// A failed write is logged and counted, never fatal.
pub async fn run_relay<K: FrameSink>(
    mut rx: mpsc::Receiver<Arc<ClassifiedPacket>>,
    mut sink: K,
    target: RelayTarget,
    cancel: CancellationToken,
) -> RelaySummary {
    let mut summary = RelaySummary::default();
    info!("Relay to VLAN {} started", target.vlan);

    loop {
        let packet = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            packet = rx.recv() => match packet {
                Some(packet) => packet,
                None => break,
            },
        };

        match relay_packet(
            &mut sink,
            &packet,
            target.vlan,
            target.bridge_mac,
            target.untagged,
        ) {
            Ok(RelayOutcome::Sent) => {
                summary.relayed += 1;
                debug!("Relayed {packet} to VLAN {}", target.vlan);
            }
            Ok(RelayOutcome::SkippedUntagged) => {
                summary.skipped_untagged += 1;
                debug!("Not relaying untagged {packet}");
            }
            Err(e) => {
                summary.failed += 1;
                warn!("Failed to relay {packet} to VLAN {}: {e}", target.vlan);
            }
        }
    }

    info!("Relay to VLAN {} stopped: {summary}", target.vlan);
    summary
}

/// Hands every classified packet to each relay consumer except the one for
/// the VLAN it was captured on.
///
/// A consumer whose receiver is gone is removed; fan-out ends when the input
/// closes, the token fires, or no consumer is left. Dropping the senders on
/// exit lets consumers drain and stop.
pub async fn fan_out(
    mut rx: mpsc::Receiver<ClassifiedPacket>,
    mut targets: Vec<(u16, mpsc::Sender<Arc<ClassifiedPacket>>)>,
    cancel: CancellationToken,
) {
    while !targets.is_empty() {
        let packet = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            packet = rx.recv() => match packet {
                Some(packet) => Arc::new(packet),
                None => break,
            },
        };

        for (vlan, tx) in &targets {
            if packet.vlan_tag == Some(*vlan) {
                continue;
            }

            let sent = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                sent = tx.send(Arc::clone(&packet)) => sent,
            };
            if sent.is_err() {
                warn!("Relay for VLAN {vlan} is gone, no longer forwarding to it");
            }
        }

        targets.retain(|(_, tx)| !tx.is_closed());
    }
}
