// ============================================================================
// src/main.rs – sqlock CLI entrypoint
// ============================================================================

mod cmd;
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

use cmd::enroll::EnrollArgs;
use cmd::Gate;
use sqlock::config::{Config, LoggingCfg};
use ui::UX;

#[derive(Debug, Parser)]
#[command(name = "sqlock", version, about = "Injection-aware authentication gate")]
struct Cli {
    /// Path to config (TOML or YAML). Defaults to /etc/sqlock.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit structured logs as JSON on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Suppress human-readable status lines.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score a string for SQL-injection patterns and print a JSON verdict.
    Scan {
        #[arg(long)]
        query: String,
        /// Identity to associate with the analysis.
        #[arg(long)]
        username: Option<String>,
        /// Lock `--username` immediately when the input is malicious.
        #[arg(long)]
        apply_lockout: bool,
    },
    /// Authenticate an identity; prints the public profile on success.
    Login {
        #[arg(long)]
        identity: String,
        /// Read the secret from the first line of stdin instead of prompting.
        #[arg(long)]
        secret_stdin: bool,
    },
    /// Show lockout state for an identity.
    Status {
        #[arg(long)]
        identity: String,
    },
    /// Clear the failure counter (injection locks are kept).
    Reset {
        #[arg(long)]
        identity: String,
    },
    /// Administrative override: clear every lock, including injection locks.
    Unlock {
        #[arg(long)]
        identity: String,
    },
    /// Add or replace an account in the credential store.
    Enroll {
        #[arg(long)]
        identity: String,
        #[arg(long)]
        display_name: String,
        #[arg(long, default_value = "")]
        contact: String,
        #[arg(long)]
        id: Option<u64>,
        #[arg(long)]
        secret_stdin: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let ui = UX::new(cli.quiet);

    let cfg = Config::resolve(cli.config.as_deref())?;
    init_tracing(&cfg.logging, cli.json_logs);

    let gate = Gate::open(&cfg)?;
    let ok = match &cli.command {
        Command::Scan {
            query,
            username,
            apply_lockout,
        } => cmd::scan::run_scan(&ui, &gate, query, username.as_deref(), *apply_lockout)?,
        Command::Login {
            identity,
            secret_stdin,
        } => cmd::login::run_login(&ui, &gate, identity, *secret_stdin)?,
        Command::Status { identity } => cmd::status::run_status(&ui, &gate, identity)?,
        Command::Reset { identity } => cmd::status::run_reset(&ui, &gate, identity)?,
        Command::Unlock { identity } => cmd::status::run_unlock(&ui, &gate, identity)?,
        Command::Enroll {
            identity,
            display_name,
            contact,
            id,
            secret_stdin,
        } => cmd::enroll::run_enroll(
            &ui,
            &gate,
            EnrollArgs {
                id: *id,
                identity,
                display_name,
                contact,
                secret_stdin: *secret_stdin,
            },
        )?,
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing(cfg: &LoggingCfg, force_json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.filter));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if cfg.json || force_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
