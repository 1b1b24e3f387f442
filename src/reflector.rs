use crate::bonjour::{FilterSummary, RelaySummary, fan_out, filter_bonjour_packets, run_relay};
use crate::capture::{FrameSink, FrameSource};
use crate::config::RelayConfig;
use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectorSummary {
    pub filter: FilterSummary,
    pub relays: Vec<(u16, RelaySummary)>,
}

/// Wires capture → filter → fan-out → one relay consumer per target VLAN.
pub struct Reflector {
    config: RelayConfig,
}

impl Reflector {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Runs until the source ends, fails, or `cancel` fires.
    ///
    /// All sinks are opened before capture starts. After the capture task
    /// stops, buffered packets are still relayed; a capture error is
    /// returned only once every consumer has finished.
    pub async fn run<S, K, F>(
        self,
        source: S,
        mut open_sink: F,
        cancel: CancellationToken,
    ) -> Result<ReflectorSummary>
    where
        S: FrameSource + Send + 'static,
        K: FrameSink + 'static,
        F: FnMut(u16) -> Result<K>,
    {
        let capacity = self.config.queue_capacity;

        let mut senders = Vec::with_capacity(self.config.target_vlans.len());
        let mut relays = Vec::with_capacity(self.config.target_vlans.len());
        for target in self.config.targets() {
            let sink = open_sink(target.vlan)
                .with_context(|| format!("Failed to open sink for VLAN {}", target.vlan))?;
            let (tx, rx) = mpsc::channel::<Arc<_>>(capacity);
            senders.push((target.vlan, tx));
            relays.push((
                target.vlan,
                tokio::spawn(run_relay(rx, sink, target, cancel.clone())),
            ));
        }

        info!(
            "Relaying mDNS onto VLANs {:?} as {}",
            self.config.target_vlans, self.config.bridge_mac
        );

        let (capture, packets) =
            filter_bonjour_packets(source, self.config.bridge_mac, capacity, cancel.clone());
        let dispatcher = tokio::spawn(fan_out(packets, senders, cancel));

        let capture_result = capture.await.context("Capture task panicked")?;
        dispatcher.await.context("Fan-out task panicked")?;

        let mut summaries = Vec::with_capacity(relays.len());
        for (vlan, handle) in relays {
            let summary = handle
                .await
                .with_context(|| format!("Relay for VLAN {vlan} panicked"))?;
            summaries.push((vlan, summary));
        }

        match capture_result {
            Ok(filter) => Ok(ReflectorSummary {
                filter,
                relays: summaries,
            }),
            Err(e) => {
                error!("Packet capture failed: {e}");
                Err(e).context("Packet capture stopped")
            }
        }
    }
}
