//! Scalp Ladder - Main Entry Point
//!
//! Runs the depth-ladder scalping loop against live or replayed market data
//! with paper leg execution.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal_macros::dec;
use scalp_ladder::config::Config;
use scalp_ladder::exchange::{
    BinanceClient, CsvTickerFeed, ExchangeGateway, MockLegExecutor, PaperBook, PaperGateway,
};
use scalp_ladder::persistence::SqliteReportStore;
use scalp_ladder::reporting::{CsvReportWriter, RemoteCollector, Reporter};
use scalp_ladder::strategy::{Orchestrator, OrchestratorContext, StrategyError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Scalp Ladder CLI
#[derive(Parser)]
#[command(name = "scalp-ladder")]
#[command(version, about = "Depth-ladder scalping orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scalping loop (default)
    Run {
        /// Path to a config file (default: ./config.toml if present)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Summarise closed scalps from the report database
    Status {
        /// Path to SQLite database
        #[arg(short, long, default_value = "data/scalps.db")]
        db: String,

        /// Show the most recent scalps
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config_path = match cli.command {
        Some(Commands::Status { db, verbose }) => {
            return show_status(&db, verbose);
        }
        Some(Commands::Run { config }) => config,
        None => None,
    };

    info!(
        "Scalp Ladder v{} - paper execution",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load(config_path.as_deref())?;
    config.validate()?;
    log_config(&config);

    let book = Arc::new(PaperBook::new());
    match &config.exchange.offline_tickers_file {
        Some(path) => {
            info!(%path, "Replaying tickers from file");
            let feed = CsvTickerFeed::new(path)?;
            run_loop(&config, PaperGateway::new(feed, book.clone()), book).await
        }
        None => {
            let client = BinanceClient::new(&config.exchange)?;
            run_loop(&config, PaperGateway::new(client, book.clone()), book).await
        }
    }
}

/// Wire the orchestrator to `gateway` and run it until it finishes.
async fn run_loop<G: ExchangeGateway>(
    config: &Config,
    gateway: G,
    book: Arc<PaperBook>,
) -> Result<()> {
    let ctx = match OrchestratorContext::new(config) {
        Ok(ctx) => ctx,
        Err(e @ StrategyError::UnknownDirection { .. }) => {
            error!(error = %e, "Invalid trading direction");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let executor = MockLegExecutor::new(book, config.exchange.paper_fee_rate);
    let reporter = build_reporter(config)?;
    info!(sinks = reporter.len(), "Reporting configured");

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, letting open legs finish");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let mut orchestrator = Orchestrator::new(ctx, gateway, executor, reporter);
    orchestrator
        .run(shutdown)
        .await
        .context("Scalp loop aborted")?;

    let ctx = orchestrator.context();
    info!(
        total_result = %ctx.total_result,
        currency = %ctx.scalp_config.start_currency,
        scalps = ctx.scalps_closed,
        "Done"
    );
    Ok(())
}

fn build_reporter(config: &Config) -> Result<Reporter> {
    let mut reporter = Reporter::new().with_sink(CsvReportWriter::new(&config.report.csv_path));

    if let Some(db_path) = &config.report.db_path {
        if let Some(dir) = std::path::Path::new(db_path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        reporter = reporter.with_sink(SqliteReportStore::new(db_path)?);
    }

    if let Some(url) = &config.report.remote_url {
        match RemoteCollector::new(url, config.exchange.request_timeout_secs) {
            Ok(collector) => reporter = reporter.with_sink(collector),
            Err(e) => warn!(%url, error = %e, "Remote collector disabled"),
        }
    }

    Ok(reporter)
}

/// Initialize logging to stdout and an hourly log file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "scalp-ladder.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the whole process
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("scalp_ladder=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    let scalp = &config.scalp;
    info!("Configuration:");
    info!(
        "   Pair: {} ({} -> {} -> {})",
        scalp.symbol, scalp.start_currency, scalp.dest_currency, scalp.start_currency
    );
    info!("   Start Amount: {} {}", scalp.start_amount, scalp.start_currency);
    info!(
        "   Profit: {:.3}%  Commission: {:.3}%",
        scalp.profit * dec!(100),
        scalp.commission * dec!(100)
    );
    info!(
        "   Ladder: {} depths, step {}x profit, {} runs of {} first legs",
        config.ladder.max_depth,
        config.ladder.depth_step,
        config.ladder.max_runs,
        config.ladder.max_leg1_per_run
    );
    info!(
        "   Signal: SMA {}/{} (lookback {}), threshold {}",
        config.signal.short_window,
        config.signal.long_window,
        config.signal.lookback,
        config.signal.threshold
    );
    info!("   Tick Delay: {}ms", config.runtime.tick_delay_ms);
}

/// Print a summary of the report database.
fn show_status(db_path: &str, verbose: bool) -> Result<()> {
    use std::path::Path;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║                 SCALP LADDER STATUS                        ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !Path::new(db_path).exists() {
        println!("\nDatabase not found: {}", db_path);
        println!("   Set report.db_path and run the loop first, or pass --db.");
        return Ok(());
    }

    let store = SqliteReportStore::new(db_path)?;
    let summary = store.summary(if verbose { 20 } else { 0 })?;

    if summary.scalps == 0 {
        println!("\nNo closed scalps recorded yet.");
        return Ok(());
    }

    println!("\nResults");
    println!("   ├─ Closed Scalps:    {}", summary.scalps);
    println!("   ├─ Profitable:       {}", summary.wins);
    println!("   ├─ Leg 1 Unfilled:   {}", summary.unfilled);
    if let Some(rate) = summary.win_rate() {
        println!("   ├─ Win Rate:         {:.1}%", rate * dec!(100));
    }
    println!("   └─ Total Result:     {}", summary.total_result);

    if verbose && !summary.recent.is_empty() {
        println!("\nRecent Scalps");
        for scalp in &summary.recent {
            println!(
                "   ├─ {} {} depth {} result {} (leg1 {}, leg2 {})",
                scalp.closed_at.format("%Y-%m-%d %H:%M:%S"),
                scalp.symbol,
                scalp.depth,
                scalp
                    .result
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                scalp.leg1_status.as_deref().unwrap_or("-"),
                scalp.leg2_status.as_deref().unwrap_or("-"),
            );
        }
    }

    println!();
    Ok(())
}
