use crate::error::CaptureError;
use anyhow::{Context, Result};
use log::info;
use pcap::{Active, Capture, Device, Offline};
use std::path::Path;

/// BPF program that keeps the kernel from copying anything but mDNS up to us.
/// The `vlan` clause shifts the offsets for 802.1Q-tagged frames.
pub const MDNS_BPF_FILTER: &str = "udp dst port 5353 or (vlan and udp dst port 5353)";

/// Read timeout, so the capture loop can notice cancellation.
const READ_TIMEOUT_MS: i32 = 100;
const SNAPLEN: i32 = 65535;

/// Matches no frame; injector handles are never read.
const INJECTOR_BPF_FILTER: &str = "less 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Listener,
    Injector,
}

impl Role {
    /// Frames of other VLANs are addressed to multicast groups this host
    /// never joined, so only the listener needs promiscuous mode.
    fn promisc(self) -> bool {
        matches!(self, Self::Listener)
    }

    fn filter(self) -> &'static str {
        match self {
            Self::Listener => MDNS_BPF_FILTER,
            Self::Injector => INJECTOR_BPF_FILTER,
        }
    }
}

pub struct CaptureLoader;

impl CaptureLoader {
    pub fn list_interfaces() -> Result<Vec<Device>> {
        Ok(Device::list()?)
    }

    /// First usable non-loopback interface, falling back to any that is up.
    pub fn select_default_interface() -> Result<String> {
        let devices: Vec<Device> =
            Device::list()?.into_iter().filter(|d| d.name != "any").collect();

        devices
            .iter()
            .find(|d| !d.flags.is_loopback() && d.flags.is_up() && d.flags.is_running())
            .or_else(|| devices.iter().find(|d| d.flags.is_up()))
            .map(|d| d.name.clone())
            .ok_or_else(|| anyhow::anyhow!("No suitable network interface found"))
    }

    fn find_device(interface: &str) -> Result<Device, CaptureError> {
        Device::list()
            .map_err(|source| CaptureError::Open {
                interface: interface.to_string(),
                source,
            })?
            .into_iter()
            .find(|d| d.name == interface)
            .ok_or_else(|| CaptureError::InterfaceNotFound(interface.to_string()))
    }

    fn open_device(interface: &str, role: Role) -> Result<Capture<Active>, CaptureError> {
        let device = Self::find_device(interface)?;
        let open_error = |source| CaptureError::Open {
            interface: interface.to_string(),
            source,
        };

        let mut cap = Capture::from_device(device)
            .map_err(open_error)?
            .promisc(role.promisc())
            .snaplen(SNAPLEN)
            .immediate_mode(true)
            .timeout(READ_TIMEOUT_MS)
            .open()
            .map_err(open_error)?;
        cap.filter(role.filter(), true).map_err(open_error)?;
        Ok(cap)
    }

    /// Opens the trunk interface the relay listens on.
    pub fn open_live(interface: &str) -> Result<Capture<Active>> {
        info!("Opening capture on interface: {interface}");

        let cap = Self::open_device(interface, Role::Listener)
            .with_context(|| format!("Failed to start capture on {interface}"))?;

        info!("Capture started on interface: {interface}");
        Ok(cap)
    }

    /// Opens a handle used only for injection; one per target VLAN.
    pub fn open_injector(interface: &str) -> Result<Capture<Active>> {
        let cap = Self::open_device(interface, Role::Injector)
            .with_context(|| format!("Failed to open injector on {interface}"))?;
        info!("Injector opened on interface: {interface}");
        Ok(cap)
    }

    /// Replays a savefile instead of a live interface.
    pub fn open_file(path: &Path) -> Result<Capture<Offline>> {
        info!("Reading frames from {}", path.display());

        let mut cap = Capture::from_file(path)
            .with_context(|| format!("Failed to open capture file {}", path.display()))?;
        cap.filter(MDNS_BPF_FILTER, true)
            .with_context(|| format!("Failed to apply capture filter on {}", path.display()))?;

        Ok(cap)
    }
}
