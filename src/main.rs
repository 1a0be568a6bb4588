//! medtrace gateway binary
//!
//! ```text
//! medtrace [--env dev] [--port 8080]
//! ```
//!
//! Reads `config/<env>.yaml`. With `postgres_url` set the ledger runs on
//! PostgreSQL; otherwise it runs in memory with the directory from `seed`.

use std::sync::Arc;

use anyhow::Context;
use medtrace::config::{AppConfig, SeedConfig};
use medtrace::context::LedgerContext;
use medtrace::db::Database;
use medtrace::directory::{
    InMemoryDirectory, Organization, OrganizationDirectory, PgDirectory, Product, ProductCatalog,
};
use medtrace::gateway::{self, state::AppState};
use medtrace::outbox::{LogSink, OutboxWorker};
use medtrace::store::{LedgerStore, MemoryStore, PgStore, schema};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

type Backend = (
    Arc<dyn LedgerStore>,
    Arc<dyn OrganizationDirectory>,
    Arc<dyn ProductCatalog>,
);

async fn connect_postgres(url: &str) -> anyhow::Result<Backend> {
    let db = Database::connect(url)
        .await
        .context("failed to connect to PostgreSQL")?;
    schema::init_schema(db.pool())
        .await
        .context("failed to apply schema")?;
    let directory = Arc::new(PgDirectory::new(db.pool().clone()));
    Ok((
        Arc::new(PgStore::new(db.pool().clone())),
        directory.clone(),
        directory,
    ))
}

fn in_memory(seed: &SeedConfig) -> Backend {
    let directory = InMemoryDirectory::new();
    for org in &seed.organizations {
        directory.upsert_organization(Organization::new(&org.id, &org.name, org.org_type));
    }
    for product in &seed.products {
        directory.upsert_product(Product::new(&product.id, &product.name, &product.owner_org_id));
    }
    tracing::info!(
        organizations = seed.organizations.len(),
        products = seed.products.len(),
        "In-memory directory seeded"
    );
    let directory = Arc::new(directory);
    (Arc::new(MemoryStore::new()), directory.clone(), directory)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = medtrace::logging::init_logging(&app_config);

    tracing::info!(
        "Starting medtrace {} in {} mode",
        env!("GIT_HASH"),
        env
    );

    let (store, directory, catalog) = match app_config.postgres_url.as_deref() {
        Some(url) => connect_postgres(url).await?,
        None => {
            tracing::warn!("postgres_url not set, ledger state is in memory only");
            in_memory(&app_config.seed)
        }
    };

    let ctx = LedgerContext::new(store, directory, catalog, app_config.ledger.clone());

    if app_config.ledger.notification_poll_ms > 0 {
        let worker = OutboxWorker::new(
            ctx.store.clone(),
            Arc::new(LogSink),
            ctx.clock.clone(),
            app_config.ledger.notification_poll_ms,
        );
        tokio::spawn(async move { worker.run().await });
    }

    let state = Arc::new(AppState::new(ctx, app_config.jwt_secret.clone()));
    gateway::run_server(&app_config.gateway, state).await
}
