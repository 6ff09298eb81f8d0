use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth_reconcile::{Catalog, EventFilters, HearthConfig, LogFormat, Page, Stores, SystemClock};
use hearth_storage::{HttpContentStore, PgOperationalStore};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "hearth")]
#[command(about = "Hearth community reconciliation layer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the JSON API.
    Serve,
    /// Apply the operational schema migrations.
    Migrate,
    /// Print one page of reconciled events as JSON.
    Events {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
        /// Attach this user's participation records.
        #[arg(long)]
        user: Option<String>,
    },
    /// Print the application status catalog as JSON.
    Statuses,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = tracing::subscriber::with_default(
        bootstrap_subscriber(std::io::stderr),
        HearthConfig::from_env,
    )
    .context("loading hearth configuration")?;
    init_tracing(&config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let catalog = connect_catalog(&config).await?;
            hearth_web::serve(hearth_web::AppState::new(catalog), config.web_port).await?;
        }
        Commands::Migrate => {
            let store = PgOperationalStore::connect(&config.pg_config())
                .await
                .context("connecting to the operational database")?;
            store.migrate().await.context("running migrations")?;
            tracing::info!("migrations applied");
        }
        Commands::Events {
            offset,
            limit,
            user,
        } => {
            let catalog = connect_catalog(&config).await?;
            let page = Page::new(offset, limit.unwrap_or(catalog.default_page().limit));
            let listing = catalog
                .list_events(&EventFilters::default(), page, user.as_deref())
                .await
                .context("listing events")?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Commands::Statuses => {
            let statuses = status_catalog_json();
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
    }

    Ok(())
}

/// Reports config loading problems until the configured subscriber is installed.
fn bootstrap_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_ansi(false)
        .with_writer(writer)
        .finish()
}

fn init_tracing(config: &HearthConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
}

async fn connect_catalog(config: &HearthConfig) -> Result<Catalog> {
    let operational = PgOperationalStore::connect(&config.pg_config())
        .await
        .context("connecting to the operational database")?;
    let content = HttpContentStore::new(config.content_store_config())
        .context("building the content store client")?;
    let operational = Arc::new(operational);
    let stores = Stores::shared(operational.clone(), Arc::new(content), operational);
    Ok(Catalog::new(
        stores,
        config.reconcile.clone(),
        Arc::new(SystemClock),
    ))
}

fn status_catalog_json() -> Vec<serde_json::Value> {
    hearth_mapping::status_catalog()
        .into_iter()
        .map(|(status, descriptor)| {
            serde_json::json!({
                "status": status,
                "label": descriptor.label,
                "description": descriptor.description,
                "next_steps": descriptor.next_steps,
                "color": descriptor.color,
            })
        })
        .collect()
}
