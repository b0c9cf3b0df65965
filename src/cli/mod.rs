//! CLI argument parsing and command handling

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tle_backend::LocalBackend;
use tle_core::{
    BackendConfig, ConfigError, ConnectionConfig, ConsistencyMode, DriverBuilder,
    ExperimentConfig, ExperimentKind, OrchestrationClient, Pacing,
};
use tle_report::{p90_line, summary_table, JsonExporter};
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// tle - latency and consistency experiments for durable-execution backends
#[derive(Parser, Debug)]
#[command(name = "tle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Experiment to run (see --list)
    #[arg(short, long, required_unless_present = "list")]
    pub experiment: Option<String>,

    /// Number of iterations
    #[arg(short = 'n', long, default_value_t = 1)]
    pub iterations: usize,

    /// Iterations per shared instance before it is replaced
    #[arg(long, default_value_t = tle_core::config::DEFAULT_RESTART_CADENCE)]
    pub restart_cadence: usize,

    /// Delay between iterations: "D(ms)", "N(mean,std)" or "U(min,max)"
    #[arg(long, default_value = "D(100)")]
    pub pacing: String,

    /// Abort on the first query that misses a concurrent signal
    #[arg(long)]
    pub strict: bool,

    /// Record the workflow-task count of the current run each iteration
    #[arg(long = "count-wfts")]
    pub count_wfts: bool,

    /// Polls above which a convergence is recorded as slow
    #[arg(long, default_value_t = tle_core::config::DEFAULT_POLL_ANOMALY_THRESHOLD)]
    pub poll_anomaly_threshold: u32,

    /// Simulated per-call latency of the in-process service
    #[arg(long)]
    pub rpc_latency: Option<String>,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the available experiments and exit
    #[arg(long)]
    pub list: bool,

    /// Orchestration service address (host:port)
    #[arg(long, env = "TLE_ADDRESS")]
    pub address: Option<String>,

    /// Orchestration service namespace
    #[arg(long, env = "TLE_NAMESPACE")]
    pub namespace: Option<String>,

    /// TLS client certificate
    #[arg(long, env = "TLE_CLIENT_CERT")]
    pub client_cert: Option<PathBuf>,

    /// TLS client key
    #[arg(long, env = "TLE_CLIENT_KEY")]
    pub client_key: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Install the stderr tracing subscriber
    ///
    /// `RUST_LOG` wins over `--verbose` when set.
    pub fn init_logging(&self) {
        let default = if self.verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr);
        match self.log_format {
            LogFormat::Text => builder.init(),
            LogFormat::Json => builder.json().init(),
        }
    }

    /// Run the selected experiment and emit its report
    pub async fn run(&self) -> Result<()> {
        if self.list {
            return self.print_list();
        }

        // Configuration errors surface before any call reaches the service
        let kind = self.experiment_kind()?;
        self.connection()?;
        let config = self.experiment_config()?;
        let backend = LocalBackend::new(self.backend_config()?)
            .context("invalid backend configuration")?;

        let client: Arc<dyn OrchestrationClient> = Arc::new(
            backend
                .client()
                .context("failed to create orchestration client")?,
        );
        let worker = Box::new(backend.worker(config.task_queue.clone()));

        let driver = DriverBuilder::new()
            .experiment(kind)
            .config(config)
            .client(client)
            .worker(worker)
            .build()
            .context("invalid experiment configuration")?;

        eprintln!("Running experiment {kind}");
        let outcome = driver
            .run()
            .await
            .with_context(|| format!("experiment {kind} failed"))?;

        eprintln!("{}", p90_line(&outcome.summary));
        if self.verbose {
            eprint!("{}", summary_table(&outcome.summary));
        }

        JsonExporter::write(&outcome.report, io::stdout().lock())
            .context("failed to write report to stdout")?;
        if let Some(path) = &self.output {
            JsonExporter::export(&outcome.report, path)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            tracing::info!(path = %path.display(), "report written");
        }

        Ok(())
    }

    fn print_list(&self) -> Result<()> {
        let mut out = io::stdout().lock();
        for kind in ExperimentKind::ALL {
            writeln!(out, "{:<18}{}", kind.name(), kind.description())?;
        }
        Ok(())
    }

    fn experiment_kind(&self) -> Result<ExperimentKind> {
        let name = self
            .experiment
            .as_deref()
            .context("--experiment is required")?;
        Ok(name.parse::<ExperimentKind>()?)
    }

    fn connection(&self) -> Result<()> {
        let connection = ConnectionConfig {
            address: self.address.clone(),
            namespace: self.namespace.clone(),
            client_cert: self.client_cert.clone(),
            client_key: self.client_key.clone(),
        };
        match connection
            .resolve()
            .context("invalid connection settings")?
        {
            None => Ok(()),
            Some(endpoint) => Err(ConfigError::RemoteUnsupported(endpoint.address).into()),
        }
    }

    fn experiment_config(&self) -> Result<ExperimentConfig> {
        let pacing: Pacing = self
            .pacing
            .parse()
            .with_context(|| format!("failed to parse pacing: {}", self.pacing))?;
        let consistency = if self.strict {
            ConsistencyMode::Strict
        } else {
            ConsistencyMode::Observational
        };

        Ok(ExperimentConfig::new(self.iterations)
            .with_restart_cadence(self.restart_cadence)
            .with_pacing(pacing)
            .with_consistency(consistency)
            .with_poll_anomaly_threshold(self.poll_anomaly_threshold)
            .with_count_workflow_tasks(self.count_wfts)
            .with_progress(!self.no_progress))
    }

    fn backend_config(&self) -> Result<BackendConfig> {
        let mut config = BackendConfig::default();
        if let Some(latency) = &self.rpc_latency {
            let pacing: Pacing = latency
                .parse()
                .with_context(|| format!("failed to parse rpc latency: {latency}"))?;
            config = config.with_rpc_latency(pacing);
        }
        Ok(config)
    }
}
