//! Venue wayfinder CLI
//!
//! Loads venues, stylesheet and links from the TOML configuration, then
//! answers one routing or level query and prints it as JSON.
//!
//! Module structure:
//! - `domain/` - Identifiers, venue data, styles, routes, errors
//! - `io/` - External interfaces (render surface, outdoor router, file loaders)
//! - `services/` - Geometry store, venue graph, controllers, wayfinding, coordinator
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use venue_wayfinder::domain::{GlobalWaypoint, VenueId};
use venue_wayfinder::infra::{Config, Metrics};
use venue_wayfinder::io::{create_router, stylesheet, venue_loader, NullSurface};
use venue_wayfinder::services::{ControllerOptions, MultiVenueCoordinator, WayfindingEngine};

/// Indoor/outdoor venue wayfinding
#[derive(Parser, Debug)]
#[command(name = "venue-wayfinder", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Route between two waypoints, each given as <venue>:<waypoint>
    Route {
        #[arg(long)]
        from: GlobalWaypoint,
        #[arg(long)]
        to: GlobalWaypoint,
        /// Minimum edge accessibility rating (0-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        accessibility: Option<u8>,
    },
    /// Print the level range of the given venues (all when none given)
    Levels {
        #[arg(long = "venue")]
        venues: Vec<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for search and render detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load_from_path(Config::resolve_config_path(args.config.as_deref()));
    info!(
        config_file = %config.config_file(),
        engine_id = %config.engine_id(),
        outdoor_mode = ?config.outdoor_mode(),
        default_accessibility = %config.default_accessibility(),
        venues = config.venue_files().len(),
        links = config.links().len(),
        "config_loaded"
    );

    let sheet = stylesheet::load_optional(config.stylesheet())?;
    let venues = venue_loader::load_venues(config.venue_files())?;

    let metrics = Arc::new(Metrics::new());
    let router = create_router(&config)?;
    let engine = WayfindingEngine::from_config(&config, router, metrics.clone());

    let mut coordinator = MultiVenueCoordinator::new(
        Arc::new(engine),
        sheet,
        Arc::new(NullSurface),
        ControllerOptions::from_config(&config),
    );
    coordinator.update_active_venues(venues);
    coordinator.parse_venues(&coordinator.venue_ids()).await?;
    for link in config.links() {
        coordinator.add_venue_link(link.clone())?;
    }

    // Start metrics reporter (lock-free reads)
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    match args.command {
        Command::Route { from, to, accessibility } => {
            let route = coordinator.wayfind_venue_to_venue(from, to, accessibility).await?;
            println!("{}", serde_json::to_string_pretty(&route)?);
        }
        Command::Levels { venues } => {
            let ids: Vec<VenueId> = if venues.is_empty() {
                coordinator.venue_ids()
            } else {
                venues.into_iter().map(VenueId).collect()
            };
            let output = serde_json::json!({
                "venues": ids,
                "level_range": coordinator.level_range(&ids),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    metrics.report().log();
    info!("venue-wayfinder done");
    Ok(())
}
