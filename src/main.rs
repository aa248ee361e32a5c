use clap::Parser;
use std::sync::Arc;
use stoxxcast::data::artifacts::ArtifactStore;
use stoxxcast::data::gateway::{IntradayClient, QuoteGateway};
use stoxxcast::domain::{merge_live, Ticker};
use stoxxcast::forecast::pipeline::Forecaster;
use stoxxcast::live::scheduler::{QuoteScheduler, SchedulerConfig, Visibility};
use tokio::sync::watch;

#[derive(Parser)]
#[command(
    name = "stoxxcast",
    about = "3-day ML close forecasts for the top 10 STOXX Europe 600 companies"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a one-shot forecast from the cached historical series
    Forecast {
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long, default_value = "180")]
        days: usize,
        #[arg(long, default_value = "data")]
        data_dir: String,
        #[arg(long, default_value = "models")]
        artifacts: String,
    },
    /// Forecast once, then follow live quotes and print augmented-series updates
    Watch {
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long, default_value = "180")]
        days: usize,
        #[arg(long, default_value = "data")]
        data_dir: String,
        #[arg(long, default_value = "models")]
        artifacts: String,
        #[arg(long, default_value = "http://localhost:3000")]
        gateway: String,
    },
    /// Fetch and print the latest live quote for a ticker
    Quote {
        #[arg(short, long)]
        ticker: String,
        #[arg(long, default_value = "http://localhost:3000")]
        gateway: String,
    },
    /// Back-fill indicator columns of a cached series
    Prepare {
        #[arg(short, long)]
        ticker: String,
        #[arg(long, default_value = "data")]
        data_dir: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Forecast {
            ticker,
            days,
            data_dir,
            artifacts,
        } => run_forecast(&ticker, days, &data_dir, &artifacts).await?,
        Commands::Watch {
            ticker,
            days,
            data_dir,
            artifacts,
            gateway,
        } => run_watch(&ticker, days, &data_dir, &artifacts, &gateway).await?,
        Commands::Quote { ticker, gateway } => run_quote(&ticker, &gateway).await?,
        Commands::Prepare { ticker, data_dir } => run_prepare(&ticker, &data_dir)?,
    }

    Ok(())
}

async fn run_forecast(
    ticker: &str,
    days: usize,
    data_dir: &str,
    artifacts: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ticker = Ticker::new(ticker)?;
    let series = stoxxcast::data::store::load_last_days(&ticker, days, data_dir)?;
    let info = ticker.info();

    println!("=== {} ({}) — {} ===", info.company_name, ticker, info.sector);
    println!(
        "{} sessions loaded, latest close {:.2} on {}",
        series.len(),
        series.last().map(|p| p.close).unwrap_or(f64::NAN),
        series.last().map(|p| p.date.to_string()).unwrap_or_default()
    );

    let store = ArtifactStore::new(artifacts, &format!("{data_dir}/model_cache"));
    let mut forecaster = Forecaster::new(store);
    let forecast = forecaster.forecast(&ticker, &series).await?;

    println!("\n3-day forecast:");
    for point in &forecast {
        println!("  {}  {:>10.2}", point.date, point.predicted_close);
    }
    Ok(())
}

async fn run_watch(
    ticker: &str,
    days: usize,
    data_dir: &str,
    artifacts: &str,
    gateway: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ticker = Ticker::new(ticker)?;
    let history = stoxxcast::data::store::load_last_days(&ticker, days, data_dir)?;
    println!(
        "Watching {} ({} sessions of history)",
        ticker,
        history.len()
    );

    // One forecast from the freshly loaded historical series. Live ticks
    // below update the augmented series only; they do not re-run the model.
    let store = ArtifactStore::new(artifacts, &format!("{data_dir}/model_cache"));
    let mut forecaster = Forecaster::new(store);
    match forecaster.forecast(&ticker, &history).await {
        Ok(forecast) => {
            println!("3-day forecast:");
            for point in &forecast {
                println!("  {}  {:>10.2}", point.date, point.predicted_close);
            }
        }
        Err(e) => eprintln!("forecast unavailable: {e}"),
    }

    let client = Arc::new(IntradayClient::new(gateway)?);
    let scheduler = QuoteScheduler::new(client, SchedulerConfig::default());
    let (_visibility_tx, visibility_rx) = watch::channel(Visibility::Foreground);
    let mut subscription = scheduler.start(ticker.clone(), visibility_rx);

    println!("Polling live quotes (Ctrl-C to stop)...");
    loop {
        tokio::select! {
            changed = subscription.quotes.changed() => {
                if changed.is_err() {
                    break;
                }
                let quote = subscription.quotes.borrow_and_update().clone();
                let augmented = merge_live(&history, quote.as_ref());
                if let Some(last) = augmented.last() {
                    println!(
                        "{}  close {:>10.2}  ({} sessions in augmented series)",
                        last.date,
                        last.close,
                        augmented.len()
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("stopping");
                break;
            }
        }
    }

    subscription.stopped().await;
    Ok(())
}

async fn run_quote(ticker: &str, gateway: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ticker = Ticker::new(ticker)?;
    let client = IntradayClient::new(gateway)?;

    match client.latest_quote(&ticker).await? {
        Some(quote) => {
            println!(
                "{} {} close {:.2} (volume {})",
                quote.date,
                ticker,
                quote.close,
                quote
                    .volume
                    .map(|v| format!("{v:.0}"))
                    .unwrap_or_else(|| "n/a".to_string())
            );
        }
        None => println!("No usable quote for {ticker} right now"),
    }
    Ok(())
}

fn run_prepare(ticker: &str, data_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ticker = Ticker::new(ticker)?;
    let path = stoxxcast::data::store::history_path(&ticker, data_dir);
    let mut series = stoxxcast::data::store::load_history(&path)?;

    stoxxcast::domain::indicators::backfill(&mut series);
    stoxxcast::data::store::save_history(&series, &path)?;

    println!(
        "Back-filled indicators for {} sessions of {} at {}",
        series.len(),
        ticker,
        path
    );
    Ok(())
}
