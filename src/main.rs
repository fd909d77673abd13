// Tunnelkeeper - lifecycle control and log access for the cloudflared tunnel service
// Main entry point

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tunnelkeeper::config::Config;
use tunnelkeeper::journal::{self, LogSnapshotReader, LogStreamer, StreamOptions};
use tunnelkeeper::systemd::{JobKind, ManagerConnection, ServiceController, StatusQuery, UNIT_NAME};
use tunnelkeeper::tunnel_config;
use tunnelkeeper::version::build_info;

#[derive(Parser, Debug)]
#[command(name = "tunnelkeeper")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show version information
    #[arg(short = 'V', long)]
    version: bool,

    /// Show detailed build information
    #[arg(long)]
    build_info: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start cloudflared.service and wait for the job to finish
    Start {
        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Stop cloudflared.service and wait for the job to finish
    Stop {
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Restart cloudflared.service and wait for the job to finish
    Restart {
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the unit's current state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the most recent log entries
    Logs {
        /// Number of entries to read
        #[arg(short = 'n', long)]
        lines: Option<usize>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stream log lines to stdout
    Tail {
        /// Keep streaming new entries until interrupted
        #[arg(short, long)]
        follow: bool,
    },
    /// Inspect or replace the tunnel daemon's config.yml
    TunnelConfig {
        #[command(subcommand)]
        action: TunnelConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum TunnelConfigAction {
    /// Print the parsed config
    Show {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Check the config for a usable ingress list
    Validate {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Validate FILE and install it as the daemon config
    Apply {
        file: PathBuf,

        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version flag
    if cli.version {
        println!("{}", build_info().format_detailed());
        return Ok(());
    }

    // Handle build info flag
    if cli.build_info {
        println!("{}", build_info().format_detailed());
        println!("\n{}", build_info().format_build_info());
        return Ok(());
    }

    let stderr = std::io::stderr();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_ansi(stderr.is_terminal())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = Config::load(cli.config).context("Failed to load configuration")?;
    tracing::debug!("Using config {:?}", config);

    match command {
        Commands::Start { timeout } => run_job(JobKind::Start, timeout).await,
        Commands::Stop { timeout } => run_job(JobKind::Stop, timeout).await,
        Commands::Restart { timeout } => run_job(JobKind::Restart, timeout).await,
        Commands::Status { json } => show_status(json).await,
        Commands::Logs { lines, json } => {
            show_logs(&config, lines.unwrap_or(config.recent_log_lines), json).await
        }
        Commands::Tail { follow } => tail(&config, follow).await,
        Commands::TunnelConfig { action } => {
            tunnel_config_command(action, &config.tunnel_config_path)
        }
    }
}

async fn run_job(kind: JobKind, timeout: Option<u64>) -> Result<()> {
    let connection = ManagerConnection::system().await?;
    let controller = ServiceController::new(Arc::new(connection.clone()));

    let job = async {
        match kind {
            JobKind::Start => controller.start().await,
            JobKind::Stop => controller.stop().await,
            JobKind::Restart => controller.restart().await,
        }
    };

    let outcome = match timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), job)
            .await
            .map_err(|_| anyhow!("Gave up waiting for {} of {} after {}s", kind, UNIT_NAME, secs))
            .and_then(|result| result.map_err(anyhow::Error::from)),
        None => job.await.map_err(anyhow::Error::from),
    };

    connection.close().await;
    outcome?;

    println!("{}: {} done", UNIT_NAME, kind);
    Ok(())
}

async fn show_status(json: bool) -> Result<()> {
    let connection = ManagerConnection::system().await?;
    let query = StatusQuery::new(Arc::new(connection.clone()));
    let status = query.status().await;
    connection.close().await;
    let status = status?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{} - {}", UNIT_NAME, status.description);
    println!("  Loaded: {}", status.load_state);
    println!("  Active: {} ({})", status.active_state, status.sub_state);
    if status.main_pid != 0 {
        println!("  Main PID: {}", status.main_pid);
    }
    println!("  Memory: {}", status.memory_formatted());
    println!("  CPU: {:?}", status.cpu_time());
    Ok(())
}

async fn show_logs(config: &Config, count: usize, json: bool) -> Result<()> {
    let reader = LogSnapshotReader::new(journal::source_from_config(config)?);
    let entries = reader.recent_logs(count).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in entries {
        let local: chrono::DateTime<chrono::Local> = entry.timestamp.into();
        println!(
            "{} {:<7} {}",
            local.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.priority_label(),
            entry.message
        );
    }
    Ok(())
}

async fn tail(config: &Config, follow: bool) -> Result<()> {
    let streamer = LogStreamer::with_options(
        journal::source_from_config(config)?,
        StreamOptions::from(config),
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupted, stopping log stream");
            interrupt.cancel();
        }
    });

    let mut stdout = tokio::io::stdout();
    streamer.stream_logs(cancel, &mut stdout, follow).await?;
    Ok(())
}

fn tunnel_config_command(action: TunnelConfigAction, default_path: &Path) -> Result<()> {
    match action {
        TunnelConfigAction::Show { path } => {
            let path = path.unwrap_or_else(|| default_path.to_path_buf());
            let config = tunnel_config::read(&path)?;
            print!("{}", serde_yaml::to_string(&config)?);
        }
        TunnelConfigAction::Validate { path } => {
            let path = path.unwrap_or_else(|| default_path.to_path_buf());
            let config = tunnel_config::read(&path)?;
            tunnel_config::validate(&path, &config)?;
            println!("{}: OK ({} ingress rules)", path.display(), config.ingress.len());
        }
        TunnelConfigAction::Apply { file, path } => {
            let path = path.unwrap_or_else(|| default_path.to_path_buf());
            let config = tunnel_config::read(&file)?;
            tunnel_config::validate(&file, &config)?;
            tunnel_config::write(&path, &config)?;
            println!("Applied {} to {}", file.display(), path.display());
        }
    }
    Ok(())
}
