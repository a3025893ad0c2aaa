use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tokio::select;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coin_tracker::coin::parse_amount;
use coin_tracker::marketplace::coinpaprika::{CoinPaprika, ENDPOINT};
use coin_tracker::marketplace::simulation::SimulationMarketplace;
use coin_tracker::marketplace::Marketplace;
use coin_tracker::persistence::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
use coin_tracker::portfolio::SubmitError;
use coin_tracker::settings::Settings;
use coin_tracker::tracker::Tracker;
use coin_tracker::tui::app::App;
use coin_tracker::*;

#[derive(Parser, Debug)]
#[command(version, about = "Track the value of coin holdings")]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Options {
    /// Directory holding the COINS.json snapshot
    #[arg(long, env = "COIN_TRACKER_DATA_DIR", default_value = ".", global = true)]
    data_dir: PathBuf,
    #[arg(long, env = "COIN_TRACKER_ENDPOINT", default_value = ENDPOINT, global = true)]
    endpoint: String,
    #[arg(long, default_value = "usd", global = true)]
    quote: String,
    /// Seconds between two quote fetches of a holding
    #[arg(long, default_value = "60", global = true)]
    quote_interval: u64,
    /// Milliseconds between two total computations
    #[arg(long, default_value = "500", global = true)]
    total_interval: u64,
    #[arg(long, default_value = "30", global = true)]
    request_timeout: u64,
    /// Use an in-memory marketplace and snapshot instead of the real ones
    #[arg(long, global = true)]
    simulate: bool,
}

impl From<&Options> for Settings {
    fn from(options: &Options) -> Self {
        Self {
            endpoint: options.endpoint.clone(),
            quote: options.quote.clone(),
            quote_interval: Duration::from_secs(options.quote_interval.max(1)),
            total_interval: Duration::from_millis(options.total_interval.max(1)),
            request_timeout: Duration::from_secs(options.request_timeout),
            data_dir: options.data_dir.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add an amount of a coin to the holdings
    Add { name: String, amount: String },
    /// Print holdings with their current value
    List,
    /// Keep refreshing values until interrupted
    Watch,
    /// Interactive view
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::from(&cli.options);

    init_tracing(&cli.command, &settings)?;

    if cli.options.simulate {
        let marketplace = SimulationMarketplace::demo().await;
        let tracker = Tracker::load(marketplace, MemorySnapshotStore::new(), settings).await?;
        run(cli.command, tracker).await
    } else {
        let marketplace = CoinPaprika::new(&settings)?;
        let store = FileSnapshotStore::new(&settings.data_dir);
        let tracker = Tracker::load(marketplace, store, settings).await?;
        run(cli.command, tracker).await
    }
}

fn init_tracing(command: &Commands, settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}=debug,coin_tracker=debug,reqwest=info",
            env!("CARGO_CRATE_NAME")
        )
        .into()
    });

    match command {
        // keep logs off the terminal the view draws on
        Commands::Tui => {
            std::fs::create_dir_all(&settings.data_dir)?;
            let path = settings.data_dir.join("tracker.log");
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
    Ok(())
}

async fn run<M: Marketplace, S: SnapshotStore>(
    command: Commands,
    tracker: Tracker<M, S>,
) -> Result<()> {
    match command {
        Commands::Add { name, amount } => run_add(tracker, name, amount).await,
        Commands::List => run_list(tracker).await,
        Commands::Watch => run_watch(tracker).await,
        Commands::Tui => run_tui(tracker).await,
    }
}

async fn run_add<M: Marketplace, S: SnapshotStore>(
    mut tracker: Tracker<M, S>,
    name: String,
    amount: String,
) -> Result<()> {
    let amount = parse_amount(&amount).ok_or(SubmitError::InvalidAmount)?;
    let coin = tracker.submit(&name, amount).await?;

    println!(
        "{} {} ({})",
        coin.name.blue(),
        coin.amount.to_string().purple(),
        coin.id
    );

    Ok(())
}

async fn run_list<M: Marketplace, S: SnapshotStore>(tracker: Tracker<M, S>) -> Result<()> {
    tracker.refresh_all().await;

    for row in tracker.holdings().await {
        println!(
            "{:<24} {:>16} {:>16}",
            row.coin.name.blue(),
            row.coin.amount.to_string().purple(),
            row.value
                .map_or("?".to_string(), |value| value.round_dp(2).to_string())
                .yellow()
        );
    }
    println!(
        "{:<24} {:>16} {:>16}",
        "",
        "Total Sum:",
        tracker.total().await.round_dp(2).to_string().yellow()
    );

    Ok(())
}

async fn run_watch<M: Marketplace, S: SnapshotStore>(mut tracker: Tracker<M, S>) -> Result<()> {
    tracker.start().await;

    let overview_task = tokio::task::spawn({
        let state = tracker.state();
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                {
                    let state = state.read().await;
                    info!("{}", *state);
                }
            }
        }
    });

    let events_task = tokio::task::spawn({
        let mut rx = tracker.subscribe();
        async move {
            loop {
                match rx.recv().await {
                    Ok(AppEvent::Valuation(valuation)) => {
                        info!(
                            "{} @ {} = {}",
                            valuation.name,
                            valuation.price,
                            valuation.value.round_dp(2).to_string().yellow()
                        );
                    }
                    Ok(AppEvent::Total(total)) => {
                        info!("Total Sum: {}", total.round_dp(2).to_string().yellow());
                    }
                    Ok(AppEvent::Holding(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        error!("Dropped {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    info!("{}", "WATCHING HOLDINGS".green());

    select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for ctrl-c")?;
            info!("Interrupted");
        }
        _ = events_task => {}
    }

    overview_task.abort();
    tracker.shutdown();

    Ok(())
}

async fn run_tui<M: Marketplace, S: SnapshotStore>(tracker: Tracker<M, S>) -> Result<()> {
    let mut app = App::new(tracker);
    let res = app.run().await;

    ratatui::restore();

    res
}
