#![allow(dead_code)]

mod config;
mod error;
mod runtime;
mod tick;

mod network {
    pub mod ethernet;
    pub mod device {
        pub mod bpdu;
        pub mod cable;
        pub mod stp;
        pub mod switch;
    }
}


use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{LinkSpec, SwitchConfig};
use error::{Error, Result};
use tick::ANNOUNCE_INTERVAL;
use network::device::{
    cable::{Inbox, PatchPanel},
    switch::Switch,
};

/// Simulates VLAN-aware bridges wired together and reports where the spanning tree settles.
#[derive(Parser, Debug)]
#[command(name = "vlan-bridge", version)]
struct Cli {
    /// Bridge configuration file; repeat once per bridge
    #[arg(short, long = "config", value_name = "FILE", required = true)]
    configs: Vec<PathBuf>,

    /// Cable between two bridges as <bridge>:<port>-<bridge>:<port>, bridges numbered by --config order
    #[arg(short, long = "link", value_name = "LINK")]
    links: Vec<String>,

    /// Seconds to run before reporting
    #[arg(short, long, default_value = "5")]
    duration: u64,

    /// Milliseconds between root announcements
    #[arg(
        long,
        default_value_t = ANNOUNCE_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    announce_ms: u64,

    /// Verbose output (-v, -vv for increasing verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Plugs a cable between two ports, possibly on the same panel.
fn wire(panels: &mut [(PatchPanel, Inbox)], link: LinkSpec) {
    let ((a, a_port), (b, b_port)) = (link.a, link.b);

    if a == b {
        let panel = &mut panels[a].0;
        let (to_a, to_b) = (panel.jack(a_port), panel.jack(b_port));
        panel.plug(a_port, to_b);
        panel.plug(b_port, to_a);
        return;
    }

    let (low, high) = panels.split_at_mut(a.max(b));
    let (first, second) = (&mut low[a.min(b)].0, &mut high[0].0);
    if a < b {
        PatchPanel::connect(first, a_port, second, b_port);
    } else {
        PatchPanel::connect(second, a_port, first, b_port);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let configs = cli
        .configs
        .iter()
        .map(SwitchConfig::load)
        .collect::<Result<Vec<_>>>()?;

    let links = cli
        .links
        .iter()
        .map(|l| l.parse::<LinkSpec>())
        .collect::<Result<Vec<_>>>()?;

    let mut panels: Vec<(PatchPanel, Inbox)> = configs.iter().map(|_| PatchPanel::new()).collect();

    for link in links {
        for (bridge, port) in [link.a, link.b] {
            let config = configs
                .get(bridge)
                .ok_or_else(|| Error::InvalidLink(format!("no bridge {}", bridge)))?;
            if port >= config.ports.len() {
                return Err(Error::UnknownPort(port));
            }
        }
        wire(&mut panels, link);
    }

    let period = Duration::from_millis(cli.announce_ms);
    let bridges: Vec<_> = configs
        .iter()
        .zip(panels)
        .enumerate()
        .map(|(i, (config, (panel, inbox)))| {
            let mac = crate::mac_addr!(0x0200_0000_0000u64 + ((i as u64 + 1) << 8));
            runtime::start(Switch::from_config(config, mac, panel), inbox, period)
        })
        .collect();

    tokio::time::sleep(Duration::from_secs(cli.duration)).await;

    for bridge in &bridges {
        let snapshot = bridge.handle.snapshot().await?;
        let root_port = match snapshot.root_port {
            Some(port) => bridge.handle.interface_name(port).await?,
            None => None,
        };
        info!(
            bridge_id = snapshot.own_id,
            root_id = snapshot.root_id,
            root_path_cost = snapshot.root_path_cost,
            root_port = ?root_port,
            "Spanning tree settled"
        );
        for (port, state) in &snapshot.port_states {
            let interface = bridge.handle.interface_name(*port).await?.unwrap_or_default();
            info!(
                bridge_id = snapshot.own_id,
                %interface,
                ?state,
                "Trunk port"
            );
        }
    }

    for bridge in bridges {
        bridge.shutdown().await;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bridge failed to start");
            ExitCode::FAILURE
        }
    }
}
