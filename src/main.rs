use clap::{Parser, Subcommand};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::info;
use vrouter::config::{self, NetworkConfigEvent, RouterConfigDoc, Settings};
use vrouter::controller::{self, ControllerHandle};
use vrouter::dataplane::{ConfigOutcome, VRouter};
use vrouter::platform::memory::MemoryPlatform;
use vrouter::platform::{ConnectPoint, InboundPacket, PacketContext};
use vrouter::protocol::ethernet::FrameBuilder;
use vrouter::protocol::ipv4::Ipv4Builder;
use vrouter::protocol::{EtherType, MacAddr};
use vrouter::telemetry::init_logging;

#[derive(Parser)]
#[command(name = "vrouter")]
#[command(about = "Reactive virtual router for an SDN controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Apply a router configuration and show the peering rules it installs
    Provision {
        /// Path to the netcfg JSON file
        #[arg(short, long, default_value = "netcfg.json")]
        netcfg: PathBuf,

        /// Path to the controller settings file
        #[arg(short, long, default_value = "settings.toml")]
        settings: PathBuf,
    },
    /// Feed one IPv4 packet to a configured router and show the decision
    Decide {
        /// Path to the netcfg JSON file
        #[arg(short, long, default_value = "netcfg.json")]
        netcfg: PathBuf,

        /// Path to the controller settings file
        #[arg(short, long, default_value = "settings.toml")]
        settings: PathBuf,

        /// Arrival point, `<device-id>/<port>`
        #[arg(long)]
        in_point: ConnectPoint,

        #[arg(long)]
        src: Ipv4Addr,

        #[arg(long)]
        dst: Ipv4Addr,

        #[arg(long, default_value = "02:00:00:00:00:01")]
        src_mac: MacAddr,

        /// Defaults to the configured virtual MAC
        #[arg(long)]
        dst_mac: Option<MacAddr>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the router block of a netcfg JSON file
    Validate {
        /// Path to the netcfg JSON file
        #[arg(short, long, default_value = "netcfg.json")]
        netcfg: PathBuf,
    },
}

/// Synthetic packet for `decide`
struct Probe {
    in_point: ConnectPoint,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    src_mac: MacAddr,
    dst_mac: Option<MacAddr>,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config {
            action: ConfigAction::Validate { netcfg },
        } => {
            init_logging(None);
            cmd_config_validate(&netcfg)
        }
        Commands::Provision { netcfg, settings } => cmd_run(&netcfg, &settings, None),
        Commands::Decide {
            netcfg,
            settings,
            in_point,
            src,
            dst,
            src_mac,
            dst_mac,
        } => {
            let probe = Probe {
                in_point,
                src,
                dst,
                src_mac,
                dst_mac,
            };
            cmd_run(&netcfg, &settings, Some(probe))
        }
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn load_router_doc(netcfg: &Path) -> Result<RouterConfigDoc, String> {
    config::load_netcfg(netcfg)
        .map_err(|e| format!("Failed to load {}: {}", netcfg.display(), e))?
        .ok_or_else(|| {
            format!(
                "{} has no apps.{}.{} block",
                netcfg.display(),
                config::APP_NAME,
                config::CONFIG_KEY
            )
        })
}

fn cmd_config_validate(netcfg: &Path) -> Result<(), String> {
    println!("[INFO] Validating {}...", netcfg.display());

    let doc = load_router_doc(netcfg)?;
    let validation = config::validate(&doc);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}

fn cmd_run(netcfg: &Path, settings_path: &Path, probe: Option<Probe>) -> Result<(), String> {
    use tokio::runtime::Runtime;

    let settings: Settings = config::load_settings(settings_path)
        .map_err(|e| format!("Failed to load {}: {}", settings_path.display(), e))?;
    init_logging(Some(&settings.logging));

    let doc = load_router_doc(netcfg)?;
    let platform = MemoryPlatform::from_settings(&settings)
        .map_err(|e| format!("Invalid platform in {}: {}", settings_path.display(), e))?;
    info!(
        hosts = platform.hosts.len(),
        routes = platform.routes.len(),
        interfaces = platform.interfaces.len(),
        "platform loaded"
    );

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;

    rt.block_on(async move {
        let (handle, task) = controller::spawn(VRouter::new(platform.services()));

        let result = drive(&handle, doc, probe).await;

        handle
            .shutdown()
            .await
            .map_err(|e| format!("Failed to stop controller: {}", e))?;
        task.await
            .map_err(|e| format!("Controller task failed: {}", e))?;
        result
    })
}

async fn drive(
    handle: &ControllerHandle,
    doc: RouterConfigDoc,
    probe: Option<Probe>,
) -> Result<(), String> {
    let outcome = handle
        .config(NetworkConfigEvent::added(doc))
        .await
        .map_err(|e| e.to_string())?;

    match &outcome {
        ConfigOutcome::Applied { report, .. } => {
            println!(
                "[INFO] Configuration applied: {} peer(s) provisioned",
                report.provisioned.len()
            );
            for (peer, reason) in &report.skipped {
                println!("[WARN] peer {} skipped: {:?}", peer, reason);
            }
        }
        ConfigOutcome::Rejected { errors } => {
            for error in errors {
                println!("[ERROR] {}", error);
            }
            return Err("Configuration rejected".to_string());
        }
        other => return Err(format!("Unexpected configuration outcome: {:?}", other)),
    }

    if let Some(probe) = probe {
        let snapshot = handle.snapshot().await.map_err(|e| e.to_string())?;
        let dst_mac = probe
            .dst_mac
            .or_else(|| snapshot.config.as_ref().map(|c| c.virtual_mac))
            .unwrap_or(MacAddr::BROADCAST);

        let packet = Ipv4Builder::new()
            .src_addr(probe.src)
            .dst_addr(probe.dst)
            .build();
        let data = FrameBuilder::new()
            .dst_mac(dst_mac)
            .src_mac(probe.src_mac)
            .ethertype(EtherType::Ipv4 as u16)
            .payload(&packet)
            .build();
        let context = PacketContext::new(InboundPacket {
            received_from: probe.in_point,
            data,
        });

        let (outcome, context) = handle.packet(context).await.map_err(|e| e.to_string())?;
        println!(
            "[INFO] {} -> {}: {:?} (handled: {})",
            probe.src,
            probe.dst,
            outcome,
            context.is_handled()
        );
    }

    let snapshot = handle.snapshot().await.map_err(|e| e.to_string())?;
    println!("[INFO] {} installed rule(s)", snapshot.rules.len());
    for (key, rule) in &snapshot.rules {
        println!("  {}  {}", key, rule);
    }
    Ok(())
}
