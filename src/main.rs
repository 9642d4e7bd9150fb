use anyhow::Result;
use clap::Parser;
use rc_orchestrator::{cli, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    telemetry::init_tracing(&args.log_level, args.log_json)?;

    if let Err(e) = cli::run(args).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}
