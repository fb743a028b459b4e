//! `beacon` command line.
//!
//! Keep accounts present on the gateway:
//!   beacon run --config beacon.toml
//!
//! One-shot account changes:
//!   beacon profile --config beacon.toml --account main --bio "hello"
//!   beacon house --config beacon.toml --account main balance

use anyhow::{Context, bail};
use beacon_client::MutationOutcome;
use beacon_core::{HypeSquadHouse, ProfilePatch};
use beacon_daemon::{DaemonConfig, Supervisor};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beacon", version, about = "Keep account presences live on the gateway")]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Relay websocket address, overriding the config file.
    #[arg(long, env = "BEACON_RELAY_URL", global = true)]
    relay_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect every configured account until interrupted.
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate the config and print each account's route.
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Change an account's profile fields.
    Profile {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        account: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        /// Hex (`#1abc9c`, `0x1abc9c`) or decimal.
        #[arg(long, value_parser = parse_color)]
        accent_color: Option<u32>,
        #[arg(long)]
        pronouns: Option<String>,
    },
    /// Join a HypeSquad house.
    House {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        account: String,
        /// bravery, brilliance, or balance
        house: HypeSquadHouse,
    },
}

fn parse_color(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let hex = s
        .strip_prefix('#')
        .or_else(|| s.strip_prefix("0x"))
        .or_else(|| s.strip_prefix("0X"));
    let parsed = match hex {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed
        .ok()
        .filter(|c| *c <= 0xFF_FFFF)
        .ok_or_else(|| format!("invalid color {s:?}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["beacon", "beacon_core", "beacon_client", "beacon_daemon"] {
        filter = filter.add_directive(format!("{target}={level}").parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Run { config } => run(&config, cli.relay_url).await,
        Command::Check { config } => check(&config, cli.relay_url),
        Command::Profile {
            config,
            account,
            display_name,
            bio,
            accent_color,
            pronouns,
        } => {
            let patch = ProfilePatch {
                global_name: display_name,
                bio,
                accent_color,
                pronouns,
            };
            if patch.is_empty() {
                bail!("nothing to change; pass at least one profile field");
            }
            let config = load(&config)?;
            let engine = beacon_daemon::engine(&config, cli.relay_url)?;
            let (session, _events) = engine.session(config.account(&account)?.clone());
            finish(session.update_profile(patch).await)
        }
        Command::House {
            config,
            account,
            house,
        } => {
            let config = load(&config)?;
            let engine = beacon_daemon::engine(&config, cli.relay_url)?;
            let (session, _events) = engine.session(config.account(&account)?.clone());
            finish(session.change_house(house).await)
        }
    }
}

fn load(path: &std::path::Path) -> anyhow::Result<DaemonConfig> {
    DaemonConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

async fn run(path: &std::path::Path, relay_url: Option<String>) -> anyhow::Result<()> {
    let config = load(path)?;
    if config.accounts.is_empty() {
        bail!("{} has no accounts", path.display());
    }
    let engine = beacon_daemon::engine(&config, relay_url)?;
    match engine.relay_address() {
        Some(relay) => tracing::info!("Relay at {}", relay),
        None => tracing::info!("No relay configured"),
    }

    let supervisor = Supervisor::new(&engine, config.accounts);
    supervisor.start();

    tokio::signal::ctrl_c().await?;
    let now = Utc::now();
    let statuses = supervisor.statuses();
    tracing::info!("Shutting down");
    supervisor.shutdown().await;

    for status in statuses {
        let uptime = status
            .uptime(now)
            .map(|d| format!("{}s", d.num_seconds()))
            .unwrap_or_else(|| "-".to_string());
        let name = status
            .profile
            .as_ref()
            .map(|p| p.display_name().to_string())
            .unwrap_or_default();
        let rotation = status
            .rotation_index
            .map(|i| format!(" rotation #{i}"))
            .unwrap_or_default();
        println!(
            "{:<16} {:<10} up {:<8} {}{}",
            status.label,
            status.state.as_str(),
            uptime,
            name,
            rotation
        );
    }
    Ok(())
}

fn check(path: &std::path::Path, relay_url: Option<String>) -> anyhow::Result<()> {
    let config = load(path)?;
    let relay = relay_url.or_else(|| config.relay_url.clone());

    println!(
        "{} account(s), {} proxy(ies), relay: {}",
        config.accounts.len(),
        config.proxies.len(),
        relay.as_deref().unwrap_or("none")
    );
    for account in &config.accounts {
        let kind = match account.rotation() {
            Some(rotation) => format!(
                "rotating {} status(es) every {}s",
                rotation.statuses.len(),
                beacon_client::effective_period(rotation.interval_secs).as_secs()
            ),
            None => "static".to_string(),
        };
        println!(
            "  {:<16} {:<9} {:<36} {}",
            account.label,
            account.status.as_str(),
            kind,
            beacon_daemon::route_summary(account, relay.as_deref())
        );
    }
    Ok(())
}

fn finish(outcome: MutationOutcome) -> anyhow::Result<()> {
    if !outcome.success {
        bail!(outcome.message);
    }
    println!("{}", outcome.message);
    if let Some(profile) = outcome.profile {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    }
    Ok(())
}
