use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use admission_sim::config::AppConfig;
use admission_sim::engine::Engine;
use admission_sim::ratelimit::Algorithm;

/// Run a synthetic traffic simulation against a rate limiter.
#[derive(Debug, Parser)]
#[command(name = "admission-sim", version, about)]
struct Args {
    /// YAML/TOML/JSON config file (ADMISSION_* env vars override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// token-bucket, sliding-window or fixed-window
    #[arg(long)]
    algorithm: Option<Algorithm>,

    /// Window limit and token refill rate
    #[arg(long)]
    rps: Option<u32>,

    /// Token bucket capacity
    #[arg(long)]
    burst: Option<u32>,

    /// Window length in milliseconds
    #[arg(long)]
    window_ms: Option<u64>,

    /// Synthetic requests per second
    #[arg(long)]
    request_rate: Option<f64>,

    /// Jitter inter-arrival delays
    #[arg(long)]
    bursty: bool,

    /// Number of synthetic clients
    #[arg(long)]
    clients: Option<u32>,

    /// Seconds to run, 0 runs until interrupted
    #[arg(long)]
    duration: Option<u64>,

    /// How often to log analytics
    #[arg(long, default_value_t = 1000)]
    report_interval_ms: u64,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(algorithm) = self.algorithm {
            config.limiter.algorithm = algorithm;
        }
        if let Some(rps) = self.rps {
            config.limiter.requests_per_second = rps;
        }
        if let Some(burst) = self.burst {
            config.limiter.burst_capacity = burst;
        }
        if let Some(window_ms) = self.window_ms {
            config.limiter.window_size_ms = window_ms;
        }
        if let Some(rate) = self.request_rate {
            config.simulation.request_rate = rate;
        }
        if self.bursty {
            config.simulation.burst_pattern = true;
        }
        if let Some(clients) = self.clients {
            config.simulation.client_count = clients;
        }
        if let Some(duration) = self.duration {
            config.simulation.duration = duration;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("admission_sim=info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    info!("Starting Admission Sim");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    info!(
        algorithm = %config.limiter.algorithm,
        request_rate = config.simulation.request_rate,
        duration = config.simulation.duration,
        "Configuration loaded"
    );

    let engine = Engine::new(config)?;
    engine.start_simulation()?;

    let report_every = Duration::from_millis(args.report_interval_ms.max(1));
    tokio::select! {
        _ = report_until_stopped(&engine, report_every) => {}
        _ = shutdown_signal() => {
            engine.stop_simulation();
        }
    }

    let snapshot = engine.snapshot();
    engine.shutdown();

    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    info!("Admission Sim stopped");
    Ok(())
}

/// Log analytics periodically until the simulation stops on its own.
async fn report_until_stopped(engine: &Engine, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let analytics = engine.analytics();
        let state = engine.state();
        info!(
            total = analytics.total_requests,
            allowed = analytics.allowed_requests,
            blocked = analytics.blocked_requests,
            current_rps = round1(analytics.current_rps),
            average_rps = round1(analytics.average_rps),
            success_rate = round1(analytics.success_rate),
            tokens = state.tokens_remaining(),
            "Analytics"
        );

        if !engine.is_running() {
            break;
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping simulation");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping simulation");
        }
    }
}
