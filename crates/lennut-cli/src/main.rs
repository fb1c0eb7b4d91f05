//! lennut CLI
//!
//! Single binary for both ends of the tunnel:
//! - Broker (public host, pairs end clients with parked agent connections)
//! - Agent (next to the private backend, parks connections at the broker)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{de::DeserializeOwned, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lennut_agent::Agent;
use lennut_broker::Broker;
use lennut_core::config::{self, AgentConfig, BrokerConfig};

#[derive(Parser)]
#[command(name = "lennut")]
#[command(author, version, about = "Reverse TCP tunnel through NATs and firewalls")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker on a publicly reachable host
    /// Alias: server
    #[command(alias = "server")]
    Broker {
        /// Address to listen for inbound connections to proxy
        #[arg(long, env = "LENNUT_BIND_PROXY")]
        bind_proxy: Option<String>,
        /// Address to listen for agents offering backend connections
        #[arg(long, env = "LENNUT_BIND_CLIENT")]
        bind_client: Option<String>,
        /// Maximum number of parked agent connections
        #[arg(long)]
        queue_capacity: Option<usize>,
    },

    /// Run the agent next to the private backend
    /// Alias: client
    #[command(alias = "client")]
    Agent {
        /// Broker address to connect to
        #[arg(long, env = "LENNUT_SERVER_ADDR")]
        server_addr: Option<String>,
        /// Backend address to proxy connections to
        #[arg(long, env = "LENNUT_PROXY_TO")]
        proxy_to: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration for a role
    Show { role: Role },
    /// Write a configuration file with default values
    Init {
        role: Role,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Broker,
    Agent,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Role::Broker => "broker",
            Role::Agent => "agent",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Broker {
            bind_proxy,
            bind_client,
            queue_capacity,
        } => {
            let mut config: BrokerConfig = load_role_config(cli.config.as_deref(), Role::Broker)?;
            if let Some(addr) = bind_proxy {
                config.inbound_address = addr;
            }
            if let Some(addr) = bind_client {
                config.agent_address = addr;
            }
            if let Some(capacity) = queue_capacity {
                config.queue_capacity = capacity;
            }
            run_broker(config).await
        }

        Commands::Agent {
            server_addr,
            proxy_to,
        } => {
            let mut config: AgentConfig = load_role_config(cli.config.as_deref(), Role::Agent)?;
            if let Some(addr) = server_addr {
                config.broker_address = addr;
            }
            if let Some(addr) = proxy_to {
                config.backend_address = addr;
            }
            run_agent(config).await
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { role } => match role {
                Role::Broker => show_config::<BrokerConfig>(cli.config.as_deref(), role),
                Role::Agent => show_config::<AgentConfig>(cli.config.as_deref(), role),
            },
            ConfigAction::Init { role, force } => {
                let path = cli
                    .config
                    .clone()
                    .unwrap_or_else(|| config::default_config_path(role.name()));
                match role {
                    Role::Broker => init_config(&path, &BrokerConfig::default(), force),
                    Role::Agent => init_config(&path, &AgentConfig::default(), force),
                }
            }
        },
    }
}

async fn run_broker(config: BrokerConfig) -> Result<()> {
    let broker = Arc::new(Broker::new(config));

    let stopper = Arc::clone(&broker);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = stopper.close();
    });

    broker.run().await.context("Broker failed to start")?;
    Ok(())
}

async fn run_agent(config: AgentConfig) -> Result<()> {
    let agent = Arc::new(Agent::new(config));

    let stopper = Arc::clone(&agent);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = stopper.close();
    });

    agent.run().await.context("Agent failed")?;
    Ok(())
}

/// Resolve once Ctrl+C or SIGTERM arrives
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Caught Ctrl+C, exiting");
        }
        _ = terminate => {
            tracing::info!("Caught SIGTERM, exiting");
        }
    }
}

/// Load the config for a role
///
/// An explicit path must load. The default path is optional and falls back
/// to built-in defaults if unreadable.
fn load_role_config<T>(explicit: Option<&Path>, role: Role) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if let Some(path) = explicit {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path(role.name());
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            T::default()
        }))
    } else {
        tracing::debug!("Using default {} configuration", role.name());
        Ok(T::default())
    }
}

fn show_config<T>(explicit: Option<&Path>, role: Role) -> Result<()>
where
    T: DeserializeOwned + Serialize + Default,
{
    let config: T = load_role_config(explicit, role)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    print!("{}", rendered);
    Ok(())
}

fn init_config<T: Serialize>(path: &Path, config: &T, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file {:?} already exists (use --force to overwrite)",
            path
        );
    }

    config::save_config(path, config)
        .with_context(|| format!("Failed to write config to {:?}", path))?;
    println!("Wrote {}", path.display());
    Ok(())
}
