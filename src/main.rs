use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use islandflow_core::bus::{InProcessBus, Publisher};
use islandflow_core::config::PipelineConfig;
use islandflow_core::orchestrator;
use islandflow_core::storage::{SqliteStore, Store};
use islandflow_core::Pipeline;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cfg = PipelineConfig::from_env();
    info!(cluster_window_ms = cfg.cluster_window_ms, "starting islandflow-core");

    let db_path = PipelineConfig::database_path();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).context("opening flow packet store")?);
    let bus = Arc::new(InProcessBus::new());
    let publisher: Arc<dyn Publisher + Send + Sync> = bus.clone();

    let pipeline = Arc::new(tokio::sync::Mutex::new(Pipeline::new(cfg.clone())));
    let nbbo_cache = pipeline.lock().await.nbbo_cache();
    let equity_quote_cache = pipeline.lock().await.equity_quote_cache();

    let option_prints = Box::new(bus.subscribe("option.prints"));
    let option_nbbo = Box::new(bus.subscribe("option.nbbo"));
    let equity_prints = Box::new(bus.subscribe("equity.prints"));
    let equity_quotes = Box::new(bus.subscribe("equity.quotes"));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    orchestrator::run(
        pipeline,
        publisher,
        option_prints,
        option_nbbo,
        equity_prints,
        equity_quotes,
        store,
        nbbo_cache,
        equity_quote_cache,
        cfg.equity_quote_max_age_ms,
        shutdown,
    )
    .await
    .context("pipeline orchestrator exited with an error")?;

    info!("islandflow-core shut down cleanly");
    Ok(())
}
