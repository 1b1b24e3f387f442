use crate::bonjour::{MacAddr, UntaggedPolicy};
use crate::config::DEFAULT_QUEUE_CAPACITY;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bonjour-reflector")]
#[command(version)]
#[command(about = "Relay mDNS (Bonjour) traffic between VLANs", long_about = None)]
pub struct Args {
    /// Trunk interface to capture mDNS frames on
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Interface to inject relayed frames on (defaults to the capture interface)
    #[arg(short, long)]
    pub output_interface: Option<String>,

    /// Replay frames from a pcap file instead of a live interface
    #[arg(short, long, conflicts_with = "interface")]
    pub read_file: Option<PathBuf>,

    /// Source MAC stamped on relayed frames; frames from it are never relayed
    #[arg(short, long, required_unless_present = "list_interfaces")]
    pub bridge_mac: Option<MacAddr>,

    /// VLAN to relay onto (repeatable)
    #[arg(
        short = 'v',
        long = "vlan",
        required_unless_present = "list_interfaces",
        value_parser = clap::value_parser!(u16).range(1..=4094)
    )]
    pub vlans: Vec<u16>,

    /// What to do with matching frames that carry no VLAN tag
    #[arg(long, value_enum, default_value_t = UntaggedPolicy::Drop)]
    pub untagged: UntaggedPolicy,

    /// Frames buffered between capture and relay before capture blocks
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Log relayed frames instead of injecting them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    #[arg(long)]
    pub list_interfaces: bool,
}
