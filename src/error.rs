use thiserror::Error;

/// Failures at the capture boundary (libpcap handles).
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open capture on {interface}: {source}")]
    Open {
        interface: String,
        #[source]
        source: pcap::Error,
    },

    #[error("failed to read from capture: {0}")]
    Read(#[source] pcap::Error),

    #[error("failed to inject frame on {interface}: {source}")]
    Write {
        interface: String,
        #[source]
        source: pcap::Error,
    },

    #[error("interface not found: {0}")]
    InterfaceNotFound(String),
}

/// Invalid startup configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("VLAN {0} is out of range (1-4094)")]
    VlanOutOfRange(u16),

    #[error("at least one target VLAN is required")]
    NoTargetVlans,

    #[error("queue capacity must be at least 1")]
    ZeroCapacity,
}
