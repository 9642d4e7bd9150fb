use crate::commands::{Action, ALL_ACTIONS};
use crate::engine::RunControl;
use crate::model::{LogRecord, Params, RcConfig, Topology};
use crate::orchestrator::{run_controller, ControlRequest};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "rc",
    version,
    about = "Run control for a hierarchy of data-acquisition applications"
)]
pub struct Cli {
    /// Commands to run in order, e.g. `boot start_run shutdown`
    pub actions: Vec<String>,

    /// Time one command takes to reach the applications
    #[arg(long, default_value = "10s")]
    pub command_duration: humantime::Duration,

    /// Progress records per command
    #[arg(long, default_value_t = 10)]
    pub sub_steps: u32,

    /// JSON file describing the controlled hierarchy
    #[arg(long)]
    pub topology: Option<PathBuf>,

    /// Session name passed to `boot`
    #[arg(long, default_value = "rc")]
    pub session: String,

    /// Configuration name passed to `conf`
    #[arg(long = "config-name", default_value = "default")]
    pub config_name: String,

    /// Extra command parameter as key=value (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// List every command with its required parameters and exit
    #[arg(long)]
    pub list: bool,

    /// Print the final status as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Emit diagnostics as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

/// Build a `RcConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RcConfig> {
    let topology = match args.topology.as_deref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read topology {}", path.display()))?;
            serde_json::from_str::<Topology>(&raw)
                .with_context(|| format!("invalid topology {}", path.display()))?
        }
        None => Topology::default(),
    };
    Ok(RcConfig {
        command_duration: Duration::from(args.command_duration),
        sub_steps: args.sub_steps,
        topology,
        ..RcConfig::default()
    })
}

/// Parameters sent with every requested action.
pub fn build_params(args: &Cli) -> Params {
    let mut params = Params::new();
    params.insert("session".into(), args.session.clone());
    params.insert("config".into(), args.config_name.clone());
    params.extend(args.params.iter().cloned());
    params
}

/// Parse command names up front so a typo fails before anything runs.
pub fn parse_actions(names: &[String]) -> Result<Vec<Action>> {
    names
        .iter()
        .map(|n| n.parse::<Action>().map_err(anyhow::Error::from))
        .collect()
}

pub async fn run(args: Cli) -> Result<()> {
    if args.list {
        for action in ALL_ACTIONS {
            let params = action.required_params();
            if params.is_empty() {
                println!("{action}");
            } else {
                println!("{action} ({})", params.join(", "));
            }
        }
        return Ok(());
    }

    let actions = parse_actions(&args.actions)?;
    let cfg = build_config(&args)?;
    let params = build_params(&args);

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::channel::<LogRecord>(cfg.event_capacity);
    let rc = Arc::new(RunControl::with_events(cfg, evt_tx));

    let printer = {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            while let Some(record) = evt_rx.recv().await {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "[{}] {}",
                    record.timestamp_utc,
                    record.event.to_message()
                )));
            }
        })
    };

    let (req_tx, req_rx) = mpsc::unbounded_channel::<ControlRequest>();
    for action in actions {
        let _ = req_tx.send(ControlRequest::Run {
            action,
            params: params.clone(),
        });
    }
    // Ctrl-C finishes the running command and drops the rest. The weak handle
    // keeps the request channel closable so the controller stops once drained.
    let quit_tx = req_tx.downgrade();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if let Some(tx) = quit_tx.upgrade() {
                let _ = tx.send(ControlRequest::Quit);
            }
        }
    });
    drop(req_tx);

    let controller = tokio::spawn(run_controller(rc.clone(), req_rx));
    let summary = controller.await.context("controller task failed")??;
    signal.abort();

    let snapshot = rc.snapshot();
    // Last sender goes with `rc`; the printer drains what is left and stops.
    drop(rc);
    let _ = printer.await;

    if args.json {
        let out = serde_json::to_string_pretty(&snapshot)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in crate::text_summary::build_text_summary(&snapshot).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    drop(out_tx);
    let _ = out_handle.await;

    if summary.failed > 0 {
        anyhow::bail!(
            "{} of {} command(s) failed",
            summary.failed,
            summary.failed + summary.executed
        );
    }
    Ok(())
}
