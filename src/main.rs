use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use futures::stream::{self, StreamExt};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use stratloop::config::Config;
use stratloop::data::{AlphaVantageSupplier, DataLoader, PriceSupplier, SeriesCache};
use stratloop::eval::summarize_by_mode;
use stratloop::generator::{Generator, GeneratorConfig};
use stratloop::llm::{OpenAiClient, OpenAiConfig};
use stratloop::orchestrator::{Orchestrator, Report, RunMode, RunStatus};
use stratloop::repair::Fixer;
use stratloop::runner::{PythonExecutor, Runner};
use stratloop::storage::{ReportStore, save_as_completed};
use stratloop::task::{SpecGuard, TaskCatalog, TaskRequest};
use stratloop::tools::{ToolRegistry, ToolResolver};
use stratloop::validation::{CommandVerifier, CompositeVerifier, ImportVerifier, ResultVerifier};

type LiveOrchestrator = Orchestrator<OpenAiClient, CompositeVerifier, PythonExecutor>;

fn setup_logging(config: &Config) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stratloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("stratloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none()
        && let Some(level) = config.log_level.as_deref()
    {
        builder.parse_filters(level);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn load_requests(tasks: &[String], prompt: Option<&str>, prompt_file: Option<&PathBuf>) -> Result<Vec<TaskRequest>> {
    let mut requests: Vec<TaskRequest> = tasks.iter().map(TaskRequest::shortcut).collect();

    if let Some(text) = prompt {
        requests.push(TaskRequest::from_text(text).context("Failed to parse --prompt")?);
    }
    if let Some(path) = prompt_file {
        let text = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
        requests.push(TaskRequest::from_text(&text).context("Failed to parse --prompt-file")?);
    }

    if requests.is_empty() {
        return Err(eyre!("Nothing to run: pass --task, --prompt or --prompt-file"));
    }
    Ok(requests)
}

fn build_orchestrators(config: &Config, modes: &[RunMode], budget: u32) -> Result<Vec<Arc<LiveOrchestrator>>> {
    let catalog = Arc::new(TaskCatalog::builtin().context("Failed to load task catalog")?);
    let registry = Arc::new(ToolRegistry::builtin(&config.executor.toolkit_root).context("Failed to load tool registry")?);

    let llm = Arc::new(
        OpenAiClient::from_env(&config.llm.api_key_env, OpenAiConfig::from(&config.llm))
            .context("Failed to create LLM client")?,
    );
    let fetch_timeout = Duration::from_millis(config.data.fetch_timeout_ms);
    let supplier: Arc<dyn PriceSupplier> = Arc::new(
        AlphaVantageSupplier::from_env(&config.data.api_key_env, fetch_timeout)
            .context("Failed to create price supplier")?,
    );
    let verifier = Arc::new(
        CompositeVerifier::new()
            .with_verifier(ImportVerifier::from_config(&config.static_check))
            .with_verifier(CommandVerifier::from_config(&config.static_check)),
    );
    let executor = Arc::new(PythonExecutor::new(&config.executor));

    let mut orchestrators = Vec::with_capacity(modes.len());
    for mode in modes {
        // Each mode keeps its own cache namespace
        let namespace = format!("{}-{}", config.data.namespace, mode);
        let loader = Arc::new(DataLoader::new(
            SeriesCache::new(&config.data.cache_dir, &namespace),
            supplier.clone(),
            fetch_timeout,
        ));

        let orchestrator = Orchestrator::new(
            SpecGuard::new(catalog.clone()),
            ToolResolver::new(registry.clone()),
            Generator::new(llm.clone(), GeneratorConfig::from(&config.llm)),
            verifier.clone(),
            Runner::new(executor.clone(), loader),
        )
        .with_result_verifier(ResultVerifier::new(config.verifier.clone()))
        .with_fixer(Fixer::new(config.orchestrator.max_hint_chars))
        .with_mode(*mode, budget);

        orchestrators.push(Arc::new(orchestrator));
    }
    Ok(orchestrators)
}

fn print_report(report: &Report, dir: Option<&Path>) {
    let status = match report.status {
        RunStatus::Accepted => report.status.as_str().green().bold(),
        RunStatus::Exhausted => report.status.as_str().yellow().bold(),
        RunStatus::Aborted => report.status.as_str().red().bold(),
    };
    println!(
        "{:<10} {:<12} {:<24} attempts {}/{}",
        status,
        report.mode.as_str().cyan(),
        report.task_id.as_deref().unwrap_or("-"),
        report.attempts.len(),
        report.max_attempts
    );
    if let Some(metrics) = &report.final_metrics
        && report.is_accepted()
    {
        println!(
            "           return {:.4}  sharpe {:.3}  drawdown {:.4}  turnover {:.3}",
            metrics.total_return, metrics.sharpe, metrics.max_drawdown, metrics.turnover
        );
    }
    if let Some(failure) = &report.blocking_failure {
        println!("           {}", failure.to_string().lines().next().unwrap_or_default().dimmed());
    }
    if let Some(dir) = dir {
        println!("           {}", dir.display().to_string().dimmed());
    }
}

async fn handle_run_command(
    config: &Config,
    requests: Vec<TaskRequest>,
    modes: Vec<RunMode>,
    max_attempts: Option<u32>,
    jobs: usize,
) -> Result<()> {
    let budget = max_attempts.unwrap_or(config.orchestrator.max_attempts);
    let orchestrators = build_orchestrators(config, &modes, budget)?;
    let store = ReportStore::new(&config.storage.reports_dir).context("Failed to open reports directory")?;

    let mut work = Vec::new();
    for orchestrator in &orchestrators {
        for request in &requests {
            work.push((orchestrator.clone(), request.clone()));
        }
    }
    info!("Running {} job(s) with up to {} in flight", work.len(), jobs.max(1));
    println!("{} {} run(s), {} at a time", "Starting".cyan(), work.len(), jobs.max(1));

    let reports = stream::iter(work)
        .map(|(orchestrator, request)| async move { orchestrator.execute(&request).await })
        .buffer_unordered(jobs.max(1));

    let tally = save_as_completed(reports, &store, |report, dir| {
        if dir.is_none() {
            eprintln!("{} report {} was not saved", "Error:".red().bold(), report.run_id);
        }
        print_report(report, dir);
    })
    .await;

    println!("{} {}/{} accepted", "Done:".bold(), tally.accepted, tally.total);
    if tally.saved < tally.total {
        println!("{} {} report(s) could not be saved", "Warning:".yellow(), tally.total - tally.saved);
    }
    Ok(())
}

fn handle_tasks_command() -> Result<()> {
    let catalog = TaskCatalog::builtin().context("Failed to load task catalog")?;
    let bounds = catalog.bounds();
    println!("{} ({} to {})", "Tasks".bold(), bounds.start, bounds.end);
    for task in catalog.tasks() {
        println!(
            "  {:<24} {:<7} {}",
            task.task_id.green(),
            task.frequency.as_str(),
            task.universe.join(",").dimmed()
        );
        if !task.description.is_empty() {
            println!("  {:<24} {}", "", task.description);
        }
    }
    Ok(())
}

fn handle_tools_command(config: &Config) -> Result<()> {
    let registry = ToolRegistry::builtin(&config.executor.toolkit_root).context("Failed to load tool registry")?;
    println!("{}", "Tools".bold());
    for name in registry.list() {
        if let Some(tool) = registry.get(name) {
            println!(
                "  {:<18} {}.{}  {}",
                tool.name.green(),
                tool.module,
                tool.symbol,
                tool.description.dimmed()
            );
        }
    }
    Ok(())
}

fn handle_compare_command(config: &Config, dir: Option<&PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or(&config.storage.reports_dir);
    let store = ReportStore::new(dir).context("Failed to open reports directory")?;
    let reports = store.load_all().context("Failed to load reports")?;
    if reports.is_empty() {
        println!("{} {}", "No reports under".yellow(), dir.display());
        return Ok(());
    }

    println!(
        "{:<12} {:>5} {:>9} {:>8} {:>12} {:>9} {:>7}",
        "mode".bold(),
        "runs",
        "success",
        "errors",
        "sharpe var",
        "attempts",
        "tools"
    );
    for (mode, summary) in summarize_by_mode(&reports) {
        println!(
            "{:<12} {:>5} {:>8.1}% {:>7.1}% {:>12.4} {:>9.2} {:>7.2}",
            mode.cyan(),
            summary.runs,
            summary.success_rate * 100.0,
            summary.error_rate * 100.0,
            summary.sharpe_variance,
            summary.avg_attempts,
            summary.avg_tools
        );
    }
    Ok(())
}

async fn run_application(cli: Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command {
        Commands::Run {
            tasks,
            prompt,
            prompt_file,
            modes,
            max_attempts,
            jobs,
        } => {
            let requests = load_requests(&tasks, prompt.as_deref(), prompt_file.as_ref())?;
            let modes: Vec<RunMode> = if modes.is_empty() {
                vec![RunMode::Agentic]
            } else {
                modes.into_iter().map(RunMode::from).collect()
            };
            handle_run_command(config, requests, modes, max_attempts, jobs).await
        }
        Commands::Tasks => handle_tasks_command(),
        Commands::Tools => handle_tools_command(config),
        Commands::Compare { dir } => handle_compare_command(config, dir.as_ref()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&config).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(cli, &config).await.context("Application failed")?;

    Ok(())
}
