mod config;
mod mock_api;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use config::{ConfigLoader, FileConfig, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use warroom_agent::{build_pipeline, ProcurementRequest, Toolbox};
use warroom_builtins::{
    write_demo_documents, ClauseIndexOracle, Collaborators, FileStore, HttpReportSink,
    MarketClient, ReportPublisher, SqliteStore,
};
use warroom_core::EventContent;
use warroom_orchestrator::{BranchMonitor, Driver, MergeEngine, MergeItem, RunStatus};
use warroom_security::AuditLog;

#[derive(Parser)]
#[command(name = "warroom", about = "Incident Command War Room: GPU shortage response")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "warroom.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crisis pipeline once
    Run {
        /// Step budget (overrides config and MAX_STEPS)
        #[arg(long)]
        max_steps: Option<usize>,
        /// GPUs requested
        #[arg(long, default_value_t = 1000)]
        quantity: u32,
        /// Chip model
        #[arg(long, default_value = "H100")]
        chip: String,
    },
    /// Seed the inventory database and contract documents
    Setup,
    /// Serve the mock market and report API
    ServeMock {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let file = FileConfig::load(&cli.config)?;
    let mut settings = Settings::resolve(&file, &ConfigLoader::from_env())?;

    match cli.command {
        Commands::Run {
            max_steps,
            quantity,
            chip,
        } => {
            if let Some(max_steps) = max_steps {
                settings.driver.max_steps = max_steps;
            }
            run(&settings, &chip, quantity).await
        }
        Commands::Setup => setup(&settings).await,
        Commands::ServeMock { port } => serve_mock(port.unwrap_or(settings.mock_port)).await,
    }
}

async fn setup(settings: &Settings) -> anyhow::Result<()> {
    let store = SqliteStore::open(&settings.database_path(), &settings.dataset)?;
    store.seed_demo()?;
    info!(
        path = %settings.database_path().display(),
        dataset = %settings.dataset,
        "Inventory database seeded"
    );

    let written = write_demo_documents(&settings.docs_dir()).await?;
    info!(
        count = written.len(),
        dir = %settings.docs_dir().display(),
        "Contract documents written"
    );
    println!(
        "Assets ready under {} ({} documents, dataset {})",
        settings.data_dir.display(),
        written.len(),
        settings.dataset
    );
    Ok(())
}

async fn serve_mock(port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let app = mock_api::router(mock_api::MockState::new(format!("http://localhost:{port}")));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Mock vendor API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn collaborators(settings: &Settings) -> anyhow::Result<Collaborators> {
    let database_path = settings.database_path();
    if !database_path.exists() {
        anyhow::bail!(
            "Inventory database '{}' not found; run `warroom setup` first",
            database_path.display()
        );
    }

    let mut publisher = ReportPublisher::new(settings.drive_dir())?;
    match &settings.report_sink_url {
        Some(url) => {
            info!(url = %url, "Remote report sink enabled");
            publisher = publisher.with_sink(Arc::new(HttpReportSink::new(url)?));
        }
        None => info!("No report sink configured, reports stay local"),
    }

    Ok(Collaborators {
        files: Arc::new(FileStore::new(settings.workspace_dir())?),
        database: Arc::new(SqliteStore::open(&database_path, &settings.dataset)?),
        contracts: Arc::new(ClauseIndexOracle::new(settings.docs_dir())?),
        market: Arc::new(MarketClient::new(&settings.api_base_url)?),
        reports: Arc::new(publisher),
    })
}

async fn run(settings: &Settings, chip: &str, quantity: u32) -> anyhow::Result<()> {
    let collaborators = collaborators(settings)?;
    let audit = Arc::new(AuditLog::new(settings.audit_dir()));
    let toolbox = Arc::new(Toolbox::new(&collaborators).with_audit(audit.clone()));

    let request = ProcurementRequest::new(chip, quantity)
        .with_tables(&settings.table_catalog, &settings.table_inventory);
    info!(
        project = %settings.project_id,
        region = %settings.region,
        model = %settings.model_name,
        market = %settings.api_base_url,
        skills = toolbox.skills().skill_count(),
        "Incident command started"
    );

    let monitor = Arc::new(BranchMonitor::new());
    let engine = MergeEngine::new(build_pipeline(toolbox.clone(), &request))?
        .with_monitor(monitor.clone());
    let driver = Driver::new(settings.driver.clone())?;

    let report = driver
        .run(engine, |step, item| match item {
            MergeItem::Event(event) => {
                let line = match event.content() {
                    EventContent::Text { text } => text.lines().next().unwrap_or_default().to_string(),
                    EventContent::ToolCall { call } => format!("-> {}({})", call.name, call.arguments),
                    EventContent::ToolResult { result } if result.is_error => {
                        format!("<- error: {}", result.content)
                    }
                    EventContent::ToolResult { .. } => "<- ok".to_string(),
                    EventContent::StateDelta { key, .. } => format!("state: {key}"),
                };
                println!("[{step:>3}] {}: {line}", event.author());
            }
            MergeItem::Failed { branch, error } => {
                println!("[{step:>3}] {branch} FAILED: {error}");
            }
        })
        .await;

    info!(
        status = ?report.status,
        steps = report.steps,
        elapsed_ms = report.elapsed_ms,
        finished = report.cancelled.finished,
        aborted = report.cancelled.aborted,
        "Incident command ended"
    );
    info!(branches = %monitor.to_json().await, "Branch states");

    if let Some(text) = report
        .final_event
        .as_ref()
        .and_then(|event| event.content().as_text())
    {
        println!("\n{text}");
    }

    drop(toolbox);
    drop(collaborators);
    match Arc::try_unwrap(audit) {
        Ok(audit) => audit.close().await,
        Err(_) => warn!("Audit log still shared, entries may be lost"),
    }

    match report.status {
        RunStatus::PartialFailure { failed } => {
            for failure in &report.failures {
                error!(branch = %failure.branch, error = %failure.error, "Branch failed");
            }
            anyhow::bail!("{} branch(es) failed", failed.len())
        }
        RunStatus::StepLimitExceeded { max_steps } => {
            println!("Stopped after the step limit of {max_steps}.");
            Ok(())
        }
        RunStatus::Completed | RunStatus::FinalResponse => Ok(()),
    }
}
