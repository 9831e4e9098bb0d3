mod cli;

use crate::cli::RunArgs;
use crate::cli::logs::{LogMode, run_logs};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use easyhaproxy_core::dashboard::{DashboardServer, cached_asset};
use easyhaproxy_core::logging::{INIT, init_logging, single_line};
use easyhaproxy_core::reconcile::{Reconciler, load_static_options};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "easyhaproxy",
    version,
    about = "EasyHAProxy: label-based HAProxy configuration for Docker, Swarm, Kubernetes and static files"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the configuration once and print it
    Render(RunArgs),

    /// Format JSON log lines read from stdin
    Logs {
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Logs { raw }) => {
            let mode = if raw { LogMode::Raw } else { LogMode::Pretty };
            run_logs(mode)
        }
        Some(Command::Render(args)) => cli::render::run(args).await,
        None => run(cli.run).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = single_line(&format!("{e:#}"));
            tracing::error!(target: INIT, error = %message, "startup failed");
            eprintln!("easyhaproxy: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let (options, paths) = args.resolve()?;

    // Static option blocks may change the log levels, so they are merged first.
    let (options, static_error) = load_static_options(options, &paths);
    init_logging(&options.log_levels);
    if let Some(e) = static_error {
        tracing::warn!(target: INIT, error = %single_line(&e.to_string()), "ignoring static option blocks");
    }

    tracing::info!(
        target: INIT,
        discover = %options.discover,
        base_path = %paths.base.display(),
        label_prefix = %options.label_prefix,
        ssl_mode = ?options.ssl_mode,
        refresh_secs = options.refresh_interval.as_secs(),
        "starting easyhaproxy"
    );

    if !options.haproxy_bin.is_file() {
        bail!("HAProxy binary not found at {}", options.haproxy_bin.display());
    }

    let dashboard_port = options.dashboard_port;
    let reconciler = Reconciler::prepare(options, paths.clone()).await?;

    let dashboard = DashboardServer::bind(dashboard_port, cached_asset(&paths.dashboard_asset()))
        .await
        .with_context(|| format!("failed to bind dashboard on 127.0.0.1:{dashboard_port}"))?;
    tokio::spawn(dashboard.serve());

    reconciler.run().await
}
