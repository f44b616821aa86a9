//! Blocky Agent - poller and control surface for a Blocky DNS blocker
//!
//! Keeps a live view of one Blocky instance:
//! - Periodic status and Prometheus polling through `blocky-coordinator`
//! - Status, timer, group and metric sensors
//! - Blocking switch and action buttons (refresh lists, flush cache, timed disable)
//! - One-shot commands for scripts (status, press, switch, query)

mod config;
mod entities;
mod registry;
mod scheduler;
mod setup;

use anyhow::{bail, Context, Result};
use blocky_coordinator::Coordinator;
use clap::{Parser, Subcommand, ValueEnum};
use config::AgentConfig;
use entities::EntitySet;
use registry::CoordinatorRegistry;
use scheduler::Scheduler;
use setup::SetupWizard;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blocky-agent")]
#[command(about = "Poll and control a Blocky DNS blocker")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $BLOCKY_AGENT_CONFIG, then the OS config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll until interrupted (default)
    Run,
    /// Interactive first-time configuration
    Setup,
    /// Validate the configured connection
    Check,
    /// Refresh once and print every entity
    Status {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Trigger an action button
    Press {
        /// refresh_lists, flush_cache, disable_5min, disable_15min or disable_1hour
        button: String,
    },
    /// Turn blocking on or off
    Switch {
        #[arg(value_enum)]
        state: SwitchState,
    },
    /// Resolve a name through Blocky
    Query {
        name: String,
        #[arg(default_value = "A")]
        record_type: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SwitchState {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("blocky_agent=info,blocky_coordinator=info")),
        )
        .init();

    let cli = Cli::parse();
    let path = AgentConfig::resolve_path(cli.config)?;

    if let Some(Command::Setup) = cli.command {
        return SetupWizard::run(&path).await;
    }

    let config = AgentConfig::load(&path).await?;

    let mut registry = CoordinatorRegistry::new();
    let coordinator = Arc::new(Coordinator::new(
        config
            .coordinator_config()
            .context("Invalid configuration")?,
    ));
    let entry_id = coordinator.config().entry_id();
    registry.insert(Arc::clone(&coordinator));

    let entities = EntitySet::from_registry(&registry, &entry_id)
        .context("Entry missing from registry")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(coordinator, &entities, &mut registry).await,
        Command::Setup => Ok(()),
        Command::Check => SetupWizard::check(&config).await.map(|_| ()),
        Command::Status { json } => status(&coordinator, &entities, json).await,
        Command::Press { button } => press(&entities, &button).await,
        Command::Switch { state } => {
            let success = match state {
                SwitchState::On => entities.switch.turn_on().await,
                SwitchState::Off => entities.switch.turn_off().await,
            };
            if !success {
                bail!("Blocky did not accept the switch command");
            }
            print_entities(&entities);
            Ok(())
        }
        Command::Query { name, record_type } => {
            match coordinator.query_dns(&name, &record_type).await {
                Some(answer) => {
                    println!("{}", serde_json::to_string_pretty(&answer)?);
                    Ok(())
                }
                None => bail!("Query for {} {} failed", name, record_type),
            }
        }
    }
}

async fn run(
    coordinator: Arc<Coordinator>,
    entities: &EntitySet,
    registry: &mut CoordinatorRegistry,
) -> Result<()> {
    if registry.is_empty() {
        bail!("No Blocky entry configured");
    }
    info!("Blocky agent starting with {} entry", registry.len());

    let entry_id = coordinator.config().entry_id();
    let mut scheduler = Scheduler::new(coordinator);
    scheduler.first_refresh().await?;
    print_entities(entities);

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    registry.remove(&entry_id);
    info!("Blocky agent stopped");
    Ok(())
}

async fn status(coordinator: &Coordinator, entities: &EntitySet, json: bool) -> Result<()> {
    let snapshot = coordinator
        .refresh()
        .await
        .with_context(|| format!("Unable to connect to Blocky at {}", coordinator.config().entry_id()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        print_entities(entities);
    }
    Ok(())
}

async fn press(entities: &EntitySet, key: &str) -> Result<()> {
    let Some(button) = entities.button(key) else {
        let known: Vec<&str> = entities.buttons.iter().map(|b| b.key()).collect();
        bail!("Unknown button '{}', expected one of: {}", key, known.join(", "));
    };

    if !button.trigger().await {
        bail!("{} failed", button.name());
    }
    println!("{}: done", button.name());
    Ok(())
}

fn print_entities(entities: &EntitySet) {
    for line in entities.render() {
        println!("{}", line);
    }
    for sensor in &entities.sensors {
        let attributes = sensor.attributes();
        if !attributes.is_empty() {
            println!("  {} {}", sensor.unique_id(), serde_json::Value::Object(attributes));
        }
    }
}
