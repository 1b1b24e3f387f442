use std::fmt;

/// DNS record types seen in mDNS/DNS-SD traffic (RFC 1035, RFC 6762, RFC 6763)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsRecordType {
    /// IPv4 host address
    A,
    /// Service instance enumeration (DNS-SD browse)
    Ptr,
    /// Host information
    Hinfo,
    /// Service metadata key/value pairs
    Txt,
    /// IPv6 host address
    Aaaa,
    /// Service location (target host and port)
    Srv,
    /// Negative responses in mDNS (RFC 6762 Section 6.1)
    Nsec,
    /// Wildcard question, used by mDNS probing
    Any,
    Unknown(u16),
}

impl DnsRecordType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            12 => Self::Ptr,
            13 => Self::Hinfo,
            16 => Self::Txt,
            28 => Self::Aaaa,
            33 => Self::Srv,
            47 => Self::Nsec,
            255 => Self::Any,
            n => Self::Unknown(n),
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::Ptr => f.write_str("PTR"),
            Self::Hinfo => f.write_str("HINFO"),
            Self::Txt => f.write_str("TXT"),
            Self::Aaaa => f.write_str("AAAA"),
            Self::Srv => f.write_str("SRV"),
            Self::Nsec => f.write_str("NSEC"),
            Self::Any => f.write_str("ANY"),
            Self::Unknown(n) => write!(f, "TYPE{n}"),
        }
    }
}
