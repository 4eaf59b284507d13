//! proofmint daemon: entry point for running the issuance engine.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use proofmint_compliance::HttpComplianceAuthority;
use proofmint_engine::{
    EngineConfig, EngineDeps, EngineMetrics, EngineOptions, IssuanceOrchestrator,
    MaintenanceWorker, ShutdownController,
};
use proofmint_rpc::RpcServer;
use proofmint_screening::HttpSignalSource;
use proofmint_settlement::HttpSettlementRail;
use proofmint_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment, Migrator};
use proofmint_types::SystemClock;
use proofmint_utils::{format_duration, format_millis, init_logging, LogFormat};
use proofmint_verification::HttpProofGrader;
use tokio::task::JoinHandle;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "proofmint-daemon", about = "Proof-of-knowledge token issuance daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "PROOFMINT_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for LMDB storage.
    #[arg(long, env = "PROOFMINT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port.
    #[arg(long, env = "PROOFMINT_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PROOFMINT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "PROOFMINT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable the Prometheus metrics endpoint.
    #[arg(long, env = "PROOFMINT_ENABLE_METRICS")]
    metrics: bool,

    /// Compliance authority base URL.
    #[arg(long, env = "PROOFMINT_COMPLIANCE_URL")]
    compliance_url: Option<String>,

    /// Settlement rail base URL.
    #[arg(long, env = "PROOFMINT_SETTLEMENT_URL")]
    settlement_url: Option<String>,

    /// Risk-signal service base URL.
    #[arg(long, env = "PROOFMINT_SIGNAL_URL")]
    signal_url: Option<String>,

    /// Grading service base URL for code and essay questions.
    #[arg(long, env = "PROOFMINT_GRADER_URL")]
    grader_url: Option<String>,

    /// Answer proof submissions once the ledger commits, without waiting
    /// for settlement.
    #[arg(long, env = "PROOFMINT_NO_AWAIT_SETTLEMENT")]
    no_await_settlement: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the engine, the HTTP API and the background workers.
    Run,
    /// Print the resolved configuration as TOML and exit.
    Config,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    merge_cli(&mut config, cli);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn merge_cli(config: &mut EngineConfig, cli: &Cli) {
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(port) = cli.rpc_port {
        config.rpc_port = port;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(url) = &cli.compliance_url {
        config.compliance_url = url.clone();
    }
    if let Some(url) = &cli.settlement_url {
        config.settlement_url = url.clone();
    }
    if cli.signal_url.is_some() {
        config.signal_url = cli.signal_url.clone();
    }
    if cli.grader_url.is_some() {
        config.grader_url = cli.grader_url.clone();
    }
    config.enable_metrics |= cli.metrics;
    if cli.no_await_settlement {
        config.await_settlement = false;
    }
}

fn open_engine(config: &EngineConfig) -> anyhow::Result<Arc<IssuanceOrchestrator>> {
    check_data_dir(&config.data_dir).context("data directory check failed")?;
    let env = LmdbEnvironment::open_default(&config.data_dir)
        .with_context(|| format!("failed to open store at {}", config.data_dir.display()))?;
    Migrator::run(&env).context("schema migration failed")?;

    let report = check_integrity(env.env()).context("integrity check failed")?;
    if !report.is_healthy() {
        anyhow::bail!("store integrity check failed: {}", report.errors.join("; "));
    }
    tracing::info!(
        databases = report.databases_checked,
        entries = report.total_entries,
        "store opened"
    );

    let policy = &config.policy;
    let compliance = Arc::new(HttpComplianceAuthority::new(
        &config.compliance_url,
        Duration::from_millis(policy.compliance_timeout_ms),
    ));
    let rail = Arc::new(HttpSettlementRail::new(
        &config.settlement_url,
        config.settlement_timeout(),
    ));
    let mut deps = EngineDeps {
        supply_store: Arc::new(env.supply_store()),
        audit_store: Arc::new(env.audit_store()),
        request_store: Arc::new(env.request_store()),
        reconciliation_store: Arc::new(env.reconciliation_store()),
        compliance,
        rail,
        signal: None,
        grader: None,
        clock: Arc::new(SystemClock),
    };
    if let Some(url) = &config.signal_url {
        deps = deps.with_signal(Arc::new(HttpSignalSource::new(
            url,
            Duration::from_millis(policy.screening.signal_timeout_ms),
        )));
    }
    match &config.grader_url {
        Some(url) => {
            deps = deps.with_grader(Arc::new(HttpProofGrader::new(
                url,
                Duration::from_millis(policy.grading_timeout_ms),
            )));
        }
        None => tracing::warn!("no grader configured, delegated answers will be scored as incorrect"),
    }

    let options = EngineOptions {
        await_settlement: config.await_settlement,
        metrics: config.enable_metrics.then(|| Arc::new(EngineMetrics::new())),
    };
    Ok(IssuanceOrchestrator::new(config.policy.clone(), deps, options)?)
}

async fn run(config: EngineConfig) -> anyhow::Result<()> {
    tracing::info!(
        data_dir = %config.data_dir.display(),
        rpc_port = config.rpc_port,
        metrics = config.enable_metrics,
        await_settlement = config.await_settlement,
        "proofmint engine starting"
    );
    tracing::info!(
        settlement_timeout = %format_millis(config.settlement_timeout_ms),
        compliance_timeout = %format_millis(config.policy.compliance_timeout_ms),
        grading_timeout = %format_millis(config.policy.grading_timeout_ms),
        reconciliation_every = %format_duration(config.reconciliation_interval_secs),
        maintenance_every = %format_duration(config.maintenance_interval_secs),
        "collaborator deadlines and worker intervals"
    );

    let engine = open_engine(&config)?;
    let recovered = engine.recover().context("startup recovery failed")?;
    if !recovered.is_empty() {
        tracing::warn!(
            reaudited = recovered.reaudited,
            reconciliation = recovered.queued_for_reconciliation,
            failed = recovered.failed,
            unresolved = recovered.unresolved,
            "recovered interrupted requests"
        );
    }

    let shutdown = Arc::new(ShutdownController::new());
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.rpc_port));
    let server = RpcServer::new(addr, engine.clone());
    let server_shutdown = shutdown.clone();
    let rpc_rx = shutdown.subscribe();
    handles.push(tokio::spawn(async move {
        if let Err(e) = server.start(rpc_rx).await {
            tracing::error!(error = %e, "RPC server error");
            server_shutdown.shutdown();
        }
    }));

    let reconciliation = engine.reconciliation_worker(config.reconciliation_interval());
    handles.push(tokio::spawn(reconciliation.run(shutdown.subscribe())));

    let maintenance = MaintenanceWorker::new(engine.clone(), config.maintenance_interval());
    handles.push(tokio::spawn(maintenance.run(shutdown.subscribe())));

    let mut stopped = shutdown.subscribe();
    tokio::select! {
        _ = shutdown.wait_for_signal() => {}
        _ = stopped.recv() => {}
    }

    tracing::info!("shutdown signal received, stopping tasks");
    for handle in handles {
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
            tracing::warn!("task did not stop within {:?}", SHUTDOWN_TIMEOUT);
        }
    }
    tracing::info!("proofmint daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Run => {
            init_logging(config.log_format, &config.log_level)?;
            run(config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "proofmint-daemon",
            "--rpc-port",
            "9000",
            "--log-format",
            "json",
            "--metrics",
            "--signal-url",
            "http://risk.local",
            "--grader-url",
            "http://grader.local",
            "--no-await-settlement",
            "run",
        ])
        .unwrap();
        let mut config = EngineConfig::default();
        merge_cli(&mut config, &cli);
        assert_eq!(config.rpc_port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.enable_metrics);
        assert!(!config.await_settlement);
        assert_eq!(config.signal_url.as_deref(), Some("http://risk.local"));
        assert_eq!(config.grader_url.as_deref(), Some("http://grader.local"));
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let cli = Cli::try_parse_from(["proofmint-daemon", "config"]).unwrap();
        let mut config = EngineConfig::from_toml_str(
            "rpc_port = 8100\nenable_metrics = true\ngrader_url = \"http://grader.local\"",
        )
        .unwrap();
        merge_cli(&mut config, &cli);
        assert_eq!(config.rpc_port, 8100);
        assert_eq!(config.grader_url.as_deref(), Some("http://grader.local"));
        assert!(config.enable_metrics);
        assert!(config.await_settlement);
    }
}
