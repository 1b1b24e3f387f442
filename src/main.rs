mod bonjour;
mod capture;
mod cli;
mod config;
mod error;
mod reflector;

use anyhow::{Context, Result};
use capture::{CaptureLoader, FrameSink, FrameSource, LogSink, PcapSink, PcapSource};
use clap::Parser;
use cli::Args;
use config::RelayConfig;
use log::info;
use pcap::Device;
use reflector::{Reflector, ReflectorSummary};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_interfaces {
        print_interfaces(&CaptureLoader::list_interfaces()?);
        return Ok(());
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let bridge_mac = args.bridge_mac.context("--bridge-mac is required")?;
    let config = RelayConfig::new(bridge_mac, &args.vlans, args.untagged, args.queue_capacity)?;

    info!("Starting Bonjour reflector");
    info!(
        "mDNS groups: {} / {}, port {}",
        bonjour::MDNS_IPV4_GROUP,
        bonjour::MDNS_IPV6_GROUP,
        bonjour::MDNS_PORT
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received shutdown signal");
            ctrl_c.cancel();
        }
    });

    let summary = if let Some(path) = &args.read_file {
        let source = PcapSource::new(CaptureLoader::open_file(path)?);
        let output = match &args.output_interface {
            Some(iface) => Some(iface.clone()),
            None if args.dry_run => None,
            None => anyhow::bail!("--output-interface is required when replaying a file"),
        };
        run(config, source, output, args.dry_run, cancel).await?
    } else {
        let interface = match &args.interface {
            Some(iface) => iface.clone(),
            None => CaptureLoader::select_default_interface()?,
        };
        info!("Interface: {interface}");

        let source = PcapSource::new(CaptureLoader::open_live(&interface)?);
        let output = args.output_interface.clone().unwrap_or(interface);
        run(config, source, Some(output), args.dry_run, cancel).await?
    };

    info!("Capture: {}", summary.filter);
    for (vlan, relay) in &summary.relays {
        info!("VLAN {vlan}: {relay}");
    }
    info!("Bonjour reflector stopped");
    Ok(())
}

fn print_interfaces(devices: &[Device]) {
    println!("Interfaces usable with --interface:");
    for device in devices {
        let flags = &device.flags;
        let mut state = vec![if flags.is_up() { "up" } else { "down" }];
        if flags.is_running() {
            state.push("running");
        }
        if flags.is_loopback() {
            state.push("loopback");
        }

        match &device.desc {
            Some(desc) => println!("  {:<16} {:<22} {desc}", device.name, state.join(",")),
            None => println!("  {:<16} {}", device.name, state.join(",")),
        }
    }
}

async fn run<S>(
    config: RelayConfig,
    source: S,
    output: Option<String>,
    dry_run: bool,
    cancel: CancellationToken,
) -> Result<ReflectorSummary>
where
    S: FrameSource + Send + 'static,
{
    if dry_run {
        info!("DRY RUN MODE - frames will not actually be injected");
    }

    let open_sink = |vlan: u16| -> Result<Box<dyn FrameSink>> {
        match &output {
            Some(iface) if !dry_run => {
                let capture = CaptureLoader::open_injector(iface)?;
                Ok(Box::new(PcapSink::new(iface.clone(), capture)))
            }
            _ => Ok(Box::new(LogSink::new(format!("VLAN {vlan}")))),
        }
    };

    Reflector::new(config).run(source, open_sink, cancel).await
}
