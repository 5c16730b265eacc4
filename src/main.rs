use anyhow::Result;
use clap::Parser;
use rusqlite::Connection;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use xsmb_lib::api::GeminiClient;
use xsmb_lib::database::{
    clear_analysis, get_prediction_history, record_analysis, restore_analysis,
};
use xsmb_lib::{
    AcquisitionPipeline, LotteryResult, PollingController, Predictor,
    TimeService, config, connection, dates,
};

const HOST_TICK: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "xsmb", about = "XSMB lottery results with AI commentary")]
struct Cli {
    /// Draw date (YYYY-MM-DD). Defaults to the latest completed draw.
    #[arg(long)]
    date: Option<String>,

    /// Move the chosen date by this many days (never past today).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset: i64,

    /// List the last 7 draw dates and exit.
    #[arg(long)]
    recent: bool,

    /// Forget the stored analysis for the date and exit.
    #[arg(long)]
    clear: bool,

    /// Ask the predictor for commentary and store it.
    #[arg(long)]
    analyze: bool,

    /// Keep running and follow the live draw. Press Enter to reload.
    #[arg(long)]
    watch: bool,

    /// Print stored predictions and exit.
    #[arg(long)]
    history: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let db = connection::conn(&config.database_url)?;

    if cli.history {
        return print_history(&db);
    }

    let time = TimeService::system();
    if cli.recent {
        return print_recent(&time);
    }

    let date = resolve_date(&time, cli.date.as_deref(), cli.offset)?;
    if dates::can_advance(&time.current_date_string(), &date) {
        tracing::warn!("{} is in the future; expect an empty result", date);
    }

    if cli.clear {
        clear_analysis(&db, &date)?;
        println!("🧹 Cleared stored analysis for {}", dates::format_human(&date)?);
        return Ok(());
    }

    let gemini = Arc::new(GeminiClient::new(&config)?);
    let pipeline = Arc::new(AcquisitionPipeline::new(gemini.clone(), time.clone()));

    if cli.watch {
        let reloads = spawn_reload_reader();
        return watch(pipeline, &date, reloads, tokio::signal::ctrl_c()).await;
    }

    println!("📅 {}", dates::format_human(&date)?);
    let result = pipeline.fetch_result(&date).await;
    print_result(&result)?;

    if cli.analyze {
        println!("🔮 Analyzing...");
        let analysis = gemini.analyze(&result).await;
        let status = record_analysis(&db, &date, &analysis)?;
        println!("{} ({})", serde_json::to_string_pretty(&analysis)?, status.as_str());
    } else {
        let cached = restore_analysis(&db, &date)?;
        if let Some(analysis) = cached.result {
            println!("📋 Stored analysis ({}):", cached.status.as_str());
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
    }

    Ok(())
}

/// Picks the explicit date (or the latest completed draw), then applies the
/// day offset. Navigation never moves past today.
fn resolve_date(time: &TimeService, requested: Option<&str>, offset: i64) -> Result<String> {
    let base = match requested {
        Some(date) => {
            dates::parse_date(date)?;
            date.to_string()
        }
        None => time.default_date_string(),
    };

    if offset == 0 {
        return Ok(base);
    }
    Ok(dates::navigate(&base, offset, &time.current_date_string())?)
}

fn print_recent(time: &TimeService) -> Result<()> {
    for date in dates::recent_dates(&time.current_date_string(), 7)? {
        println!("📅 {} ({})", dates::format_human(&date)?, date);
    }
    Ok(())
}

fn print_result(result: &LotteryResult) -> Result<()> {
    if !result.has_results() {
        println!("⚠ No results available yet for {}", result.date);
    }
    if result.is_live {
        println!("🔴 Live draw in progress");
    }
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn print_history(db: &Connection) -> Result<()> {
    let history = get_prediction_history(db)?;
    if history.is_empty() {
        println!("⚠ No stored predictions.");
        return Ok(());
    }

    for (date, analysis) in history {
        println!(
            "📜 {} | Bạch thủ: {} | Song thủ: {} | Đặc biệt: {}",
            dates::format_human(&date)?,
            analysis.tomorrow.bach_thu,
            analysis.tomorrow.song_thu,
            analysis.tomorrow.dac_biet
        );
    }
    Ok(())
}

/// Each line on stdin asks for a reload of the watched date.
fn spawn_reload_reader() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

async fn watch<S, E>(
    pipeline: Arc<AcquisitionPipeline>,
    date: &str,
    mut reloads: mpsc::UnboundedReceiver<()>,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    let (mut controller, mut outcomes) = PollingController::new(pipeline);
    controller.select_date(date);

    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(HOST_TICK);
    loop {
        tokio::select! {
            Some(outcome) = outcomes.recv() => {
                let quiet = outcome.quiet;
                if let Some(result) = controller.accept(outcome) {
                    if quiet {
                        println!("🔄 Auto-update");
                    }
                    print_result(&result)?;
                }
            }
            Some(()) = reloads.recv() => {
                println!("🔁 Reloading {}", date);
                controller.refresh();
            }
            _ = ticker.tick() => {
                controller.tick();
                tracing::debug!("Host tick: {:?}", controller.state());
            }
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    tracing::warn!("Shutdown signal failed: {}", e);
                }
                println!("👋 Stopped watching {}", date);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use xsmb_lib::{FixedClock, ResultLookup};

    #[derive(Default)]
    struct CountingLookup {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ResultLookup for CountingLookup {
        async fn lookup(&self, _search_date: &str) -> xsmb_lib::Result<String> {
            *self.calls.lock().unwrap() += 1;
            Ok(r#"{"prizeSpecial": "12345", "prize7": ["11", "22", "33", "44"]}"#.to_string())
        }
    }

    fn time_at(hour: u32, minute: u32) -> TimeService {
        TimeService::new(Arc::new(FixedClock::at_civil(2024, 5, 10, hour, minute).unwrap()))
    }

    #[test]
    fn cli_accepts_negative_offset() {
        let cli = Cli::try_parse_from(["xsmb", "--date", "2024-05-10", "--offset", "-3"]).unwrap();
        assert_eq!(cli.offset, -3);
        assert!(!cli.clear && !cli.recent);
    }

    #[test]
    fn resolve_date_navigates_but_stops_at_today() {
        let time = time_at(20, 0);
        assert_eq!(resolve_date(&time, None, 0).unwrap(), "2024-05-10");
        assert_eq!(resolve_date(&time, None, -1).unwrap(), "2024-05-09");
        assert_eq!(resolve_date(&time, Some("2024-05-08"), 1).unwrap(), "2024-05-09");
        assert_eq!(resolve_date(&time, Some("2024-05-08"), 7).unwrap(), "2024-05-10");
        assert!(resolve_date(&time, Some("10/05/2024"), 0).is_err());
    }

    #[test]
    fn resolve_date_defaults_to_yesterday_before_cutoff() {
        let time = time_at(9, 0);
        assert_eq!(resolve_date(&time, None, 0).unwrap(), "2024-05-09");
        assert_eq!(resolve_date(&time, None, 1).unwrap(), "2024-05-10");
    }

    #[tokio::test(start_paused = true)]
    async fn watch_reloads_on_request_and_stops_on_shutdown() {
        let lookup = Arc::new(CountingLookup::default());
        let pipeline = Arc::new(AcquisitionPipeline::new(lookup.clone(), time_at(20, 0)));
        let (tx, reloads) = mpsc::unbounded_channel();
        tx.send(()).unwrap();

        let shutdown = async {
            tokio::time::sleep(Duration::from_secs(150)).await;
            Ok::<(), std::io::Error>(())
        };
        watch(pipeline, "2024-05-10", reloads, shutdown).await.unwrap();

        assert_eq!(*lookup.calls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn watch_shutdown_fires_while_polling() {
        let lookup = Arc::new(CountingLookup::default());
        let pipeline = Arc::new(AcquisitionPipeline::new(lookup.clone(), time_at(18, 20)));
        let (_tx, reloads) = mpsc::unbounded_channel();

        // Polls keep arriving while the shutdown timer runs; it must still fire.
        let shutdown = async {
            tokio::time::sleep(Duration::from_secs(100)).await;
            Ok::<(), std::io::Error>(())
        };
        watch(pipeline, "2024-05-10", reloads, shutdown).await.unwrap();

        assert!(*lookup.calls.lock().unwrap() >= 3);
    }
}
