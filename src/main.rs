use adaptive_tuner::application::context::AppContext;
use adaptive_tuner::application::optimization::OptimizationRequest;
use adaptive_tuner::config::{Config, RunFile};
use adaptive_tuner::domain::knowledge::ConvergenceResult;
use adaptive_tuner::domain::monitoring::AnalyzerState;
use adaptive_tuner::domain::monitoring::correlation::MAX_INTERVAL_HOURS;
use adaptive_tuner::domain::optimization::BacktestWindow;
use adaptive_tuner::domain::optimization::window::period_to_days;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Genetic strategy-parameter tuner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one genetic optimization
    Optimize {
        /// Strategy to tune
        #[arg(long, default_value = "ma_crossover")]
        strategy: String,

        /// Ticker to backtest on
        #[arg(short, long, default_value = "SPY")]
        ticker: String,

        /// Command used as the fitness function
        #[arg(long, default_value = "backtest")]
        command: String,

        /// Trailing period (e.g. 6mo, 1y, 5y); ignored when --start/--end are given
        #[arg(long, default_value = "1y")]
        period: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,

        #[arg(long)]
        generations: Option<usize>,

        #[arg(long)]
        population: Option<usize>,

        /// TOML file overriding strategy, window, GA settings and seeds
        #[arg(long)]
        run_file: Option<PathBuf>,
    },
    /// Classify the current market regime
    Regime {
        #[arg(short, long, default_value = "SPY")]
        ticker: String,
    },
    /// Detect, map, re-tune and publish the live strategy
    Autonomous {
        /// Keep running a cycle every AUTONOMOUS_INTERVAL_HOURS
        #[arg(long)]
        periodic: bool,
    },
    /// Control the background correlation analyzer
    Analyzer {
        #[command(subcommand)]
        action: AnalyzerAction,
    },
    /// Long-running mode: analyzer supervisor, optionally with the autonomous loop
    Serve {
        #[arg(long)]
        autonomous: bool,
    },
    /// Show recent command executions and per-command statistics
    History {
        /// Only this command
        #[arg(long)]
        command: Option<String>,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Load historical convergence results from a JSON array
    ImportConvergence { file: PathBuf },
}

#[derive(Subcommand)]
enum AnalyzerAction {
    Activate,
    Deactivate,
    /// Set the cycle interval in hours
    Interval { hours: f64 },
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let ctx = AppContext::build(config).await?;

    let result = run(&ctx, cli.command).await;
    ctx.shutdown().await;
    result
}

async fn run(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Optimize {
            strategy,
            ticker,
            command,
            period,
            start,
            end,
            generations,
            population,
            run_file,
        } => {
            let run_file = match run_file {
                Some(path) => {
                    info!("Loading run file from: {}", path.display());
                    RunFile::load(&path)?
                }
                None => RunFile::default(),
            };
            let settings = run_file.apply(&ctx.config.optimizer);

            let window = match (start, end) {
                (Some(start), Some(end)) => BacktestWindow::Range { start, end },
                _ => run_file
                    .window()
                    .unwrap_or_else(|| BacktestWindow::Period(period)),
            };
            if let BacktestWindow::Period(p) = &window
                && period_to_days(p).is_none()
            {
                anyhow::bail!("Unsupported period '{}'", p);
            }

            let strategy = run_file.strategy.clone().unwrap_or(strategy);
            let ticker = run_file.ticker.clone().unwrap_or(ticker);
            let mut request = OptimizationRequest::backtest(&strategy, &ticker, window);
            request.command = run_file.command.clone().unwrap_or(command);
            request.seeds = run_file.seeds.clone();
            request.generations = generations.unwrap_or(settings.generations);
            request.population_size = population.unwrap_or(settings.population_size);
            request.num_parents = settings.num_parents;
            request.mutation_rate = settings.mutation_rate;

            let outcome = ctx.orchestrator().run(request).await;
            println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
            if !outcome.is_success() {
                anyhow::bail!("Optimization produced no successful evaluation");
            }
        }
        Commands::Regime { ticker } => {
            let detection = ctx.regime_detector().detect(&ticker.to_uppercase()).await;
            println!("{}", serde_json::to_string_pretty(&detection.to_json())?);
        }
        Commands::Autonomous { periodic } => {
            let autonomous = ctx.autonomous_loop();
            if periodic {
                let interval =
                    Duration::from_secs_f64(ctx.config.autonomous.interval_hours * 3600.0);
                tokio::select! {
                    _ = autonomous.run_periodic(interval) => {}
                    _ = tokio::signal::ctrl_c() => info!("Autonomous: interrupted"),
                }
            } else {
                match autonomous.run_cycle().await {
                    Some(config) => println!("{}", serde_json::to_string_pretty(&config)?),
                    None => warn!("Autonomous: cycle finished without a new live config"),
                }
            }
        }
        Commands::Analyzer { action } => analyzer_command(ctx, action).await?,
        Commands::Serve { autonomous } => serve(ctx, autonomous).await,
        Commands::History { command, limit } => {
            let entries = match &command {
                Some(name) => ctx.knowledge_base.by_command(name, limit).await?,
                None => ctx.knowledge_base.recent(limit).await?,
            };
            for entry in &entries {
                println!(
                    "{} {:<16} {:<5} {:>7}ms {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.command,
                    if entry.success { "ok" } else { "FAIL" },
                    entry.duration_ms,
                    entry.output_summary
                );
            }
            println!();
            for stats in ctx.knowledge_base.command_stats().await? {
                println!(
                    "{:<16} {:>6} calls  {:>5.1}% ok  {:>8.1}ms avg",
                    stats.command,
                    stats.invocations,
                    stats.success_rate() * 100.0,
                    stats.mean_duration_ms
                );
            }
            let totals = ctx.knowledge_base.stats().await?;
            println!(
                "\n{} logged executions, {} convergence results",
                totals.command_log_entries, totals.convergence_results
            );
        }
        Commands::ImportConvergence { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .context(format!("Failed to read {}", file.display()))?;
            let results: Vec<ConvergenceResult> = serde_json::from_str(&content)
                .context(format!("Failed to parse convergence results in {}", file.display()))?;
            let imported = ctx.knowledge_base.import_convergence(&results).await?;
            println!("Imported {} convergence results", imported);
        }
    }
    Ok(())
}

fn outcome_json(
    outcome: &adaptive_tuner::application::optimization::OptimizationOutcome,
) -> serde_json::Value {
    serde_json::json!({
        "best_params": outcome.best_params,
        "best_fitness": outcome.best_fitness,
        "best_metrics": outcome.best_metrics,
        "best_per_generation": outcome.best_per_generation,
        "evaluations": outcome.evaluations,
    })
}

async fn analyzer_command(ctx: &AppContext, action: AnalyzerAction) -> Result<()> {
    let default_interval = ctx.config.analyzer.default_interval_hours;
    let state = match action {
        AnalyzerAction::Activate => {
            ctx.analyzer_state
                .update(|s| {
                    if s.last_cycle_at.is_none() && !s.active {
                        s.interval_hours = default_interval;
                    }
                    s.active = true;
                })
                .await?
        }
        AnalyzerAction::Deactivate => ctx.analyzer_state.update(|s| s.active = false).await?,
        AnalyzerAction::Interval { hours } => {
            if !AnalyzerState::is_valid_interval(hours) {
                anyhow::bail!(
                    "Interval must be between 0 and {} hours, got {}",
                    MAX_INTERVAL_HOURS,
                    hours
                );
            }
            ctx.analyzer_state.update(|s| s.interval_hours = hours).await?
        }
        AnalyzerAction::Status => ctx.analyzer_state.load().await,
    };
    println!("{}", serde_json::to_string_pretty(&state)?);
    if let Some(report) = ctx.correlation_report.read().await {
        println!(
            "Latest report {}: {} tickers, {} strong pairs",
            report.generated_at,
            report.tickers.len(),
            report.strong_pairs.len()
        );
    }
    Ok(())
}

async fn serve(ctx: &AppContext, with_autonomous: bool) {
    info!("Serve: running. Press Ctrl+C to shutdown.");
    let poll = Duration::from_secs(ctx.config.analyzer.poll_secs.max(1));
    let supervisor = async {
        let mut ticker = tokio::time::interval(poll);
        loop {
            ticker.tick().await;
            ctx.reconcile_analyzer().await;
        }
    };

    let autonomous = ctx.autonomous_loop();
    let interval = Duration::from_secs_f64(ctx.config.autonomous.interval_hours * 3600.0);

    tokio::select! {
        _ = supervisor => {}
        _ = autonomous.run_periodic(interval), if with_autonomous => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Serve: unable to listen for shutdown signal: {}", e);
            }
            info!("Serve: shutting down");
        }
    }
}
