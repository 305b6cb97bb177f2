//! signal-cli: score instruments from a JSON market snapshot.
//!
//! Usage:
//!   signal-cli analyze <snapshot.json> <SYMBOL>
//!   signal-cli compare <snapshot.json> <SYMBOL> <SYMBOL> [SYMBOL] [--days N]
//!
//! Symbols may carry a market suffix (`7203.JP`). Setting `AI_ADVISOR_URL`
//! switches scoring to the AI-assisted strategy.

mod snapshot;

use analysis_core::EngineConfig;
use analysis_orchestrator::{AiAssistedScorer, AnalysisOrchestrator, RuleBasedScorer};
use anyhow::{bail, Context};
use ml_client::{AdvisorConfig, HttpReasoningService};
use snapshot::Snapshot;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const USAGE: &str = "Usage:
  signal-cli analyze <snapshot.json> <SYMBOL>
  signal-cli compare <snapshot.json> <SYMBOL> <SYMBOL> [SYMBOL] [--days N]";

/// Pulls `--days N` out of the argument list.
fn take_days(args: Vec<String>) -> anyhow::Result<(Vec<String>, Option<u32>)> {
    let mut rest = Vec::with_capacity(args.len());
    let mut days = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--days" {
            let value = iter.next().context("--days needs a value")?;
            let n: u32 = value.parse().with_context(|| format!("invalid --days '{}'", value))?;
            if n == 0 {
                bail!("--days must be positive");
            }
            days = Some(n);
        } else {
            rest.push(arg);
        }
    }
    Ok((rest, days))
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "signal_cli=info,analysis_orchestrator=info".into());

    // Logs go to stderr so stdout stays clean JSON
    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_orchestrator(config: EngineConfig, snapshot: Arc<Snapshot>) -> anyhow::Result<AnalysisOrchestrator> {
    let timeout = Duration::from_millis(config.ai_timeout_ms);
    let advisor = AdvisorConfig::from_env(timeout);
    let rule_based = RuleBasedScorer::new(&config);
    let as_of = snapshot.as_of;

    let mut orchestrator = AnalysisOrchestrator::new(config, snapshot.clone(), snapshot.clone())
        .with_news_provider(snapshot);

    if advisor.is_enabled() {
        let service = HttpReasoningService::from_config(&advisor).context("building AI advisor client")?;
        let scorer = AiAssistedScorer::new(Arc::new(service), rule_based, timeout).with_model(advisor.model.clone());
        orchestrator = orchestrator.with_strategy(Arc::new(scorer));
    } else {
        orchestrator = orchestrator.with_strategy(Arc::new(rule_based));
    }
    if let Some(as_of) = as_of {
        orchestrator = orchestrator.with_as_of(as_of);
    }

    tracing::info!("Scoring strategy: {}", orchestrator.strategy_name());
    Ok(orchestrator)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let (args, lookback_days) = take_days(std::env::args().skip(1).collect())?;
    let (command, path, symbols) = match args.as_slice() {
        [command, path, symbols @ ..] if !symbols.is_empty() => (command.as_str(), PathBuf::from(path), symbols),
        _ => {
            eprintln!("{}", USAGE);
            bail!("missing arguments");
        }
    };

    let config = EngineConfig::from_env().context("loading engine configuration")?;
    let snapshot = Arc::new(Snapshot::load(&path)?);
    tracing::info!("Loaded {} instruments from {}", snapshot.instruments.len(), path.display());

    let instruments = symbols
        .iter()
        .map(|s| snapshot.resolve(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let orchestrator = build_orchestrator(config, snapshot)?;

    let output = match command {
        "analyze" => {
            let [instrument] = instruments.as_slice() else {
                bail!("analyze takes exactly one symbol\n{}", USAGE);
            };
            let analysis = orchestrator
                .analyze(instrument)
                .await
                .with_context(|| format!("analyzing {}", instrument.instrument_id()))?;
            serde_json::to_string_pretty(&analysis)?
        }
        "compare" => {
            let result = orchestrator
                .compare(&instruments, lookback_days)
                .await
                .context("comparing instruments")?;
            serde_json::to_string_pretty(&result)?
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("unknown command '{}'", other);
        }
    };

    println!("{}", output);
    Ok(())
}
