use crate::bonjour::{MacAddr, RelayTarget, UntaggedPolicy};
use crate::error::ConfigError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

const MIN_VLAN: u16 = 1;
const MAX_VLAN: u16 = 4094;

/// Startup settings for the relay, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bridge_mac: MacAddr,
    /// Sorted, without duplicates
    pub target_vlans: Vec<u16>,
    pub untagged: UntaggedPolicy,
    pub queue_capacity: usize,
}

impl RelayConfig {
    pub fn new(
        bridge_mac: MacAddr,
        vlans: &[u16],
        untagged: UntaggedPolicy,
        queue_capacity: usize,
    ) -> Result<Self, ConfigError> {
        if let Some(&vlan) = vlans.iter().find(|v| !(MIN_VLAN..=MAX_VLAN).contains(*v)) {
            return Err(ConfigError::VlanOutOfRange(vlan));
        }
        if queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        let mut target_vlans = vlans.to_vec();
        target_vlans.sort_unstable();
        target_vlans.dedup();
        if target_vlans.is_empty() {
            return Err(ConfigError::NoTargetVlans);
        }

        Ok(Self {
            bridge_mac,
            target_vlans,
            untagged,
            queue_capacity,
        })
    }

    pub fn targets(&self) -> impl Iterator<Item = RelayTarget> + '_ {
        self.target_vlans.iter().map(|&vlan| RelayTarget {
            vlan,
            bridge_mac: self.bridge_mac,
            untagged: self.untagged,
        })
    }
}
