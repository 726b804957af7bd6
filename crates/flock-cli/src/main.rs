use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use flock_election::{
    CoordinationService, ElectionConfig, ElectionCoordinator, MemoryCoordination, Result, Role,
    ShutdownHandle,
};

#[derive(Parser, Debug)]
#[command(name = "flock")]
#[command(version)]
#[command(about = "Single-round leader election over a coordination service")]
struct Cli {
    /// Coordination service address (host:port)
    #[arg(long)]
    address: Option<String>,

    /// Election namespace path
    #[arg(long)]
    namespace: Option<String>,

    /// Session timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Candidacy node name prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Candidate name; a unique one is generated when omitted
    #[arg(long)]
    name: Option<String>,

    /// Read configuration from a TOML file before applying flag overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of concurrent candidates to run against the in-process service
    #[arg(long, default_value_t = 1)]
    candidates: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let failures = run_candidates(cli.candidates, config).await;
    if failures > 0 {
        process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(cli: &Cli) -> Result<ElectionConfig> {
    let mut config = match &cli.config {
        Some(path) => ElectionConfig::from_file(path)?,
        None => ElectionConfig::default(),
    };

    if let Some(address) = &cli.address {
        config.address = address.clone();
    }
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.session_timeout = Duration::from_millis(timeout_ms);
    }
    if let Some(prefix) = &cli.prefix {
        config.candidate_prefix = prefix.clone();
    }
    if let Some(name) = &cli.name {
        config.candidate_name = name.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Run `count` candidates through complete election runs and report each
/// outcome. Returns the number of failed runs.
async fn run_candidates(count: usize, config: ElectionConfig) -> usize {
    let service: Arc<dyn CoordinationService> = Arc::new(MemoryCoordination::new());

    let mut shutdowns: Vec<ShutdownHandle> = Vec::new();
    let mut runners = Vec::new();
    for index in 0..count {
        let mut candidate_config = config.clone();
        if count > 1 {
            candidate_config.candidate_name = format!("{}-{}", config.candidate_name, index);
        }
        let name = candidate_config.candidate_name.clone();

        let mut coordinator = ElectionCoordinator::new(service.clone(), candidate_config);
        shutdowns.push(coordinator.shutdown_handle());
        runners.push(tokio::spawn(
            async move { (name, coordinator.run().await) },
        ));
    }

    let (done_tx, mut done_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let mut outcomes = Vec::new();
        for runner in runners {
            outcomes.push(runner.await);
        }
        let _ = done_tx.send(outcomes);
    });

    let outcomes = tokio::select! {
        outcomes = &mut done_rx => outcomes.unwrap_or_default(),
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    tracing::info!("Interrupt received, shutting down candidates");
                    for shutdown in &shutdowns {
                        shutdown.shutdown();
                    }
                }
                Err(e) => tracing::warn!("Cannot listen for interrupts: {}", e),
            }
            done_rx.await.unwrap_or_default()
        }
    };

    let mut failures = 0;
    for outcome in outcomes {
        match outcome {
            Ok((name, Ok(Role::Leader))) => println!("{}: leader", name),
            Ok((name, Ok(Role::Follower { leader }))) => {
                println!("{}: follower of {}", name, leader)
            }
            Ok((name, Err(e))) => {
                failures += 1;
                eprintln!("{}: election failed: {}", name, e);
            }
            Err(e) => {
                failures += 1;
                eprintln!("candidate task failed: {}", e);
            }
        }
    }

    failures
}
