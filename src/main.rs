use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;
use std::time::Duration;

use zoneticket::config::Config;
use zoneticket::confirmation::ConfirmationService;
use zoneticket::crypto::hash_secret;
use zoneticket::db::{AppState, create_pool, init_db, queries};
use zoneticket::handlers;
use zoneticket::models::{CreatePricing, CreateZone, ImportTicket};
use zoneticket::payments::{MonerooClient, PaymentGateway};

/// Pending payments re-verified per sweep.
const SWEEP_BATCH: i64 = 50;

#[derive(Parser, Debug)]
#[command(name = "zoneticket")]
#[command(about = "Mobile-money Wi-Fi ticket sales for captive portals")]
struct Cli {
    /// Seed the database with dev data (zone, pricings, tickets)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds a demo zone with two pricing tiers and a sheet of free tickets.
/// Only runs in dev mode and when no zone exists.
fn seed_dev_data(state: &AppState) {
    let mut conn = state.db.get().expect("Failed to get db connection for seeding");

    let zones = queries::list_zones(&conn).expect("Failed to list zones");
    if !zones.is_empty() {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let zone = queries::create_zone(
        &conn,
        &CreateZone {
            name: "Dev Hotspot".to_string(),
            location: Some("Cotonou".to_string()),
            description: Some("Local development zone".to_string()),
            router_ip: Some("192.168.88.1".to_string()),
        },
    )
    .expect("Failed to create dev zone");

    let hourly = queries::create_pricing(
        &conn,
        &zone.id,
        &CreatePricing {
            name: "1 hour".to_string(),
            amount: 100,
            duration_hours: 1,
            description: None,
            is_active: true,
        },
    )
    .expect("Failed to create dev pricing");
    let daily = queries::create_pricing(
        &conn,
        &zone.id,
        &CreatePricing {
            name: "24 hours".to_string(),
            amount: 500,
            duration_hours: 24,
            description: None,
            is_active: true,
        },
    )
    .expect("Failed to create dev pricing");

    let tickets: Vec<ImportTicket> = (1..=20)
        .map(|n| ImportTicket {
            username: format!("dev{:03}", n),
            password: format!("pw{:03}", n),
            profile: Some(if n % 2 == 0 { "24h" } else { "1h" }.to_string()),
        })
        .collect();
    let imported = queries::import_tickets(&mut conn, &zone.id, &tickets)
        .expect("Failed to import dev tickets");

    tracing::info!("Zone: {} (id: {})", zone.name, zone.id);
    tracing::info!("Tickets imported: {}", imported.imported);
    tracing::info!("============================================");

    // Copy-paste friendly output for API clients
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  zone_id: {}", zone.id);
    println!("  pricing_1h_id: {}", hourly.id);
    println!("  pricing_24h_id: {}", daily.id);
    println!("--- END COPY ---");
    println!();
}

/// Spawns a background task that re-verifies stale pending payments with the
/// gateway, so a lost webhook does not leave a paying customer without a ticket.
fn spawn_pending_sweep(confirmation: ConfirmationService, interval_secs: u64, min_age_secs: i64) {
    if interval_secs == 0 {
        tracing::info!("Pending payment sweep disabled");
        return;
    }

    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_secs);

        loop {
            tokio::time::sleep(interval).await;

            match confirmation.sweep_pending(min_age_secs, SWEEP_BATCH).await {
                Ok(report) if report.checked > 0 => {
                    tracing::info!(
                        checked = report.checked,
                        resolved = report.resolved,
                        errors = report.errors,
                        "Pending payment sweep finished"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Pending payment sweep failed: {}", e),
            }
        }
    });

    tracing::info!("Pending payment sweep started (every {}s)", interval_secs);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zoneticket=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.gateway.api_key.is_none() {
        tracing::warn!("MONEROO_API_KEY is not set - payment intents will fail");
    }
    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY is not set - admin API disabled");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(MonerooClient::new(&config.gateway).expect("Failed to build gateway client"));
    let confirmation = ConfirmationService::with_sqlite(
        db_pool.clone(),
        gateway.clone(),
        &config.gateway.webhook_secret,
    );

    let state = AppState {
        db: db_pool,
        confirmation: confirmation.clone(),
        gateway,
        frontend_url: config.frontend_url.clone(),
        currency: config.currency.clone(),
        payment_methods: config.gateway.methods.clone(),
        admin_key_hash: config.admin_api_key.as_deref().map(hash_secret),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set ZONETICKET_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    spawn_pending_sweep(
        confirmation,
        config.pending_sweep_interval_secs,
        config.pending_sweep_min_age_secs,
    );

    let app = handlers::app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("zoneticket listening on {} (public URL {})", addr, config.base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
