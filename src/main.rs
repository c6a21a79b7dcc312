use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use council_trader::agents::{AgentGateway, HttpAgentGateway};
use council_trader::config::Config;
use council_trader::decision::{ConfluenceThresholds, DecisionEngine};
use council_trader::execution::{BinanceClient, ExecutionSink};
use council_trader::notify;
use council_trader::orchestrator::Orchestrator;
use council_trader::server;
use council_trader::store::ReceiptStore;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (also pulls in .env)
    let config = Config::from_env()?;

    // Initialize logging; RUST_LOG wins over LOG_LEVEL
    let default_filter = format!("council_trader={},info", config.log_level.to_lowercase());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner(&config);

    // Wire the pipeline: store, exchange, collaborator gateway, notifier,
    // decision engine, execution sink, orchestrator, HTTP surface.
    let store = ReceiptStore::connect(&config.database.url).await?;

    let exchange = Arc::new(BinanceClient::connect(&config.exchange).await);

    let gateway: Arc<dyn AgentGateway> = Arc::new(HttpAgentGateway::new(config.agents.clone())?);

    let notifier = notify::spawn(config.notifier.clone());

    let engine = DecisionEngine::new(
        Arc::clone(&gateway),
        ConfluenceThresholds::from(&config.pipeline),
    );

    let sink = ExecutionSink::new(exchange, store.clone(), config.exchange.testnet);

    let orchestrator = Arc::new(Orchestrator::new(
        gateway,
        engine,
        sink,
        notifier,
        config.pipeline.min_history,
        Duration::from_secs_f64(config.cycle_deadline_secs()),
    ));

    server::run(orchestrator, store, config.server.clone()).await
}

fn print_banner(config: &Config) {
    println!("\n╔═══════════════════════════════════════════════════════════╗");
    println!("║            Council Trader - Decision Orchestrator         ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "📊 Mode: {}",
        if config.exchange.testnet {
            "TESTNET (Safe Mode)"
        } else {
            "⚠️  LIVE TRADING ⚠️"
        }
    );
    println!("🧮 Pipeline:");
    println!("   • Warmup: {} closes", config.pipeline.min_history);
    println!(
        "   • RSI bands: {:.0} / {:.0}",
        config.pipeline.rsi_oversold, config.pipeline.rsi_overbought
    );
    println!(
        "   • Sentiment threshold: ±{:.2}",
        config.pipeline.sentiment_threshold
    );
    println!("⏱️  Timeouts:");
    println!("   • Analyzers: {:.0}s", config.agents.default_timeout_secs);
    println!("   • Decision: {:.0}s", config.agents.decision_timeout_secs);
    println!("   • Exchange: {:.0}s", config.exchange.timeout_secs);
    println!("🌐 Bind: {}", config.server.bind_addr);
    println!();
}
