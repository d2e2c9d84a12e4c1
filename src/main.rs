use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use trendbot::api::{ExchangeClient, StaticTokenProvider};
use trendbot::config::Settings;
use trendbot::db::TradeStore;
use trendbot::engine::{Engine, RuleTable};

#[derive(Debug, Parser)]
#[command(name = "trendbot", about = "MACD trend-following trading bot")]
struct Args {
    /// Path to a TOML config file (defaults to ./trendbot.toml if present)
    #[arg(long)]
    config: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    tracing::info!("trendbot starting for {}", settings.exchange.product_id);
    tracing::info!(
        "  granularity: {}  lookback: {}s  cycle delay: {}s",
        settings.trading.granularity,
        settings.trading.lookback_secs,
        settings.trading.cycle_delay_secs
    );

    let store = connect_store(settings.database_url.as_deref()).await;

    let auth = Arc::new(StaticTokenProvider(settings.exchange.bearer_token.clone()));
    let client = Arc::new(ExchangeClient::new(
        settings.exchange.base_url.clone(),
        settings.exchange.product_id.clone(),
        settings.exchange.http_timeout_secs,
        auth,
    )?);

    let mut engine = Engine::new(
        client.clone(),
        client,
        store,
        RuleTable::default(),
        settings.trading.clone(),
    );

    if args.once {
        match engine.run_cycle().await {
            Ok(report) => tracing::info!("single cycle done: {:?}", report.action),
            Err(e) => tracing::error!("single cycle failed: {}", e),
        }
        return Ok(());
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down...");
        }
        _ = engine.run() => {}
    }

    tracing::info!("trendbot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendbot=info")),
        )
        .init();
}

async fn connect_store(database_url: Option<&str>) -> Option<TradeStore> {
    let url = match database_url {
        Some(url) => url.to_string(),
        None => {
            tracing::warn!("no database_url configured, running without persistence");
            return None;
        }
    };

    match TradeStore::connect(&url).await {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Postgres ({}), continuing without persistence",
                e
            );
            None
        }
    }
}
