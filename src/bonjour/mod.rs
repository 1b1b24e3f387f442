mod dns;
mod filter;
mod frame;
mod packet;
mod relay;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use filter::{
    FilterSummary, MDNS_IPV4_GROUP, MDNS_IPV6_GROUP, MDNS_PORT, filter_bonjour_packets,
};
pub use frame::MacAddr;
pub use relay::{RelaySummary, RelayTarget, UntaggedPolicy, fan_out, run_relay};
