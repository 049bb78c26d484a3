use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lobby_agent::{AfterLobbyCreated, AgentConfig, Client, SimulatedCoordinator};

/// Keep a custom lobby request alive until the game coordinator confirms it.
#[derive(Debug, Parser)]
#[command(name = "lobby-agent", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "lobby-agent.toml")]
    config: PathBuf,

    /// Override the account name from the config file
    #[arg(short, long)]
    user: Option<String>,

    /// Override the account password from the config file
    #[arg(long, env = "LOBBY_AGENT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Exit once the lobby is confirmed instead of staying connected
    #[arg(long)]
    exit_on_create: bool,

    /// Have the simulated coordinator ignore this many create-requests
    #[arg(long, default_value_t = 0)]
    simulate_drops: u32,

    /// Have the simulated coordinator refuse the login
    #[arg(long)]
    simulate_login_failure: bool,
}

fn load_config(args: &Args) -> Result<AgentConfig> {
    let mut config = AgentConfig::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    if let Some(user) = &args.user {
        config.credentials.username = user.clone();
    }
    if let Some(password) = &args.password {
        config.credentials.password = password.clone();
    }
    if args.exit_on_create {
        config.client = config
            .client
            .with_after_lobby_created(AfterLobbyCreated::Shutdown);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        user = %config.credentials.username,
        map = %config.lobby.custom_map_name,
        game_id = config.lobby.custom_game_id,
        "starting lobby agent"
    );

    let mut transport = SimulatedCoordinator::new().with_dropped_creates(args.simulate_drops);
    if args.simulate_login_failure {
        transport = transport.with_login_denied("InvalidPassword");
    }

    let mut client = Client::new(transport, config).context("invalid configuration")?;
    let snapshot = client.run().await.context("lobby agent stopped")?;

    info!(snapshot = %snapshot.to_json(), "lobby agent finished");
    Ok(())
}
