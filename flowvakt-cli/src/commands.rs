use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use validator::Validate;

use flowvakt_capture::{list_interfaces, CaptureError, InterfaceInfo};
use flowvakt_config::FlowvaktConfig;
use flowvakt_engine::{EventProcessor, RecordWriter, Runtime, RuntimeError, TraceProcessor};
use flowvakt_telemetry::EventLogger;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Observe live traffic and track per-flow counters
    Run(RunArgs),
    /// List capture devices
    Interfaces,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Interface to observe; overrides `capture.interface`
    #[arg(short, long)]
    pub interface: Option<String>,
    /// Configuration file; defaults to the `config/` hierarchy
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Do not observe traffic arriving at the interface
    #[arg(long)]
    pub no_ingress: bool,
    /// Do not observe traffic leaving the interface
    #[arg(long)]
    pub no_egress: bool,
    /// Write the flow table as YAML on exit
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// Append every packet record, in wire layout, to this file
    #[arg(long)]
    pub events: Option<PathBuf>,
    /// Write Prometheus metrics in text format on exit
    #[arg(long)]
    pub metrics: Option<PathBuf>,
}

impl RunArgs {
    fn load_config(&self) -> anyhow::Result<FlowvaktConfig> {
        let mut config = match &self.config {
            Some(path) => FlowvaktConfig::load_from_path(path)?,
            None => FlowvaktConfig::load()?,
        };
        self.apply(&mut config);
        config.validate().context("Invalid command line overrides")?;
        Ok(config)
    }

    fn apply(&self, config: &mut FlowvaktConfig) {
        if let Some(interface) = &self.interface {
            config.capture.interface = interface.clone();
        }
        if self.no_ingress {
            config.capture.ingress = false;
        }
        if self.no_egress {
            config.capture.egress = false;
        }
    }

    fn processor(&self) -> anyhow::Result<Arc<dyn EventProcessor>> {
        Ok(match &self.events {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Cannot create {}", path.display()))?;
                Arc::new(RecordWriter::new(BufWriter::new(file)))
            }
            None => Arc::new(TraceProcessor),
        })
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.load_config()?;
    EventLogger::init(&config.telemetry.log_level).map_err(|e| anyhow!(e))?;

    let runtime = Runtime::new(config)?;
    let processor = args.processor()?;

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Cannot listen for Ctrl-C, stopping");
        }
    };

    let summary = match runtime.run(processor, shutdown).await {
        Ok(summary) => summary,
        Err(RuntimeError::Capture(CaptureError::DeviceNotFound { name, .. })) => {
            eprintln!("Interface '{name}' not found. Available interfaces:");
            print_interfaces(&list_interfaces()?);
            return Err(anyhow!("Interface '{name}' not found"));
        }
        Err(err) => return Err(err.into()),
    };

    info!(?summary, "Stopped");
    for (direction, frames) in &summary.frames {
        println!("{direction:>8}: {frames} frames");
    }
    println!(
        "  events: {} processed, {} dropped",
        summary.events_processed, summary.events_dropped
    );
    println!("   flows: {} active", summary.active_flows);

    if let Some(path) = &args.snapshot {
        runtime
            .report()
            .save(path)
            .with_context(|| format!("Cannot write snapshot to {}", path.display()))?;
        println!("Flow table written to {}", path.display());
    }
    if let Some(path) = &args.metrics {
        std::fs::write(path, runtime.metrics().gather_metrics()?)
            .with_context(|| format!("Cannot write metrics to {}", path.display()))?;
    }
    Ok(())
}

pub fn interfaces() -> anyhow::Result<()> {
    print_interfaces(&list_interfaces()?);
    Ok(())
}

fn print_interfaces(interfaces: &[InterfaceInfo]) {
    for interface in interfaces {
        let state = match (interface.up, interface.loopback) {
            (true, true) => "up, loopback",
            (true, false) => "up",
            (false, true) => "down, loopback",
            (false, false) => "down",
        };
        let addresses: Vec<String> = interface.addresses.iter().map(|a| a.to_string()).collect();
        println!("{:<16} [{}] {}", interface.name, state, addresses.join(" "));
        if let Some(description) = &interface.description {
            println!("{:<16} {}", "", description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "flowvakt",
            "run",
            "-i",
            "br-lan",
            "--no-egress",
            "--snapshot",
            "flows.yaml",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.interface.as_deref(), Some("br-lan"));
        assert!(args.no_egress && !args.no_ingress);
        assert_eq!(args.snapshot, Some(PathBuf::from("flows.yaml")));
    }

    #[test]
    fn overrides_apply_on_top_of_config() {
        let args = RunArgs {
            interface: Some("wlan0".into()),
            no_ingress: true,
            ..RunArgs::default()
        };
        let mut config = FlowvaktConfig::default();
        args.apply(&mut config);

        assert_eq!(config.capture.interface, "wlan0");
        assert!(!config.capture.ingress);
        assert!(config.capture.egress);
        config.validate().unwrap();
    }

    #[test]
    fn disabling_both_directions_fails_validation() {
        let args = RunArgs {
            no_ingress: true,
            no_egress: true,
            ..RunArgs::default()
        };
        let mut config = FlowvaktConfig::default();
        args.apply(&mut config);
        assert!(config.validate().is_err());
    }
}
