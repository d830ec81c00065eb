//! sluice CLI — drive the relay against a simulated downstream.

use clap::{Parser, Subcommand};
use sluice::config::Config;
use sluice::dedup::DedupStore;
use sluice::downstream::SimulatedDownstream;
use sluice::model::{RelayOutcome, RelayRequest};
use sluice::queue::AdmissionQueue;
use sluice::relay::Relay;
use sluice::telemetry::{TelemetryConfig, init_telemetry};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sluice", about = "Resilient relay in front of an unreliable downstream")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Relay a batch of simulated requests and report outcomes
    Run {
        /// Number of requests to relay
        #[arg(long, default_value_t = 100)]
        requests: usize,
        /// Probability that a single downstream call fails
        #[arg(long, default_value_t = 0.3)]
        failure_rate: f64,
        /// Give every Nth request the same correlation key as its
        /// predecessor, to exercise deduplication (0 = no duplicates)
        #[arg(long, default_value_t = 0)]
        duplicate_every: usize,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            requests,
            failure_rate,
            duplicate_every,
        } => cmd_run(requests, failure_rate, duplicate_every).await,
        Command::Config => cmd_config(),
    }
}

async fn cmd_run(requests: usize, failure_rate: f64, duplicate_every: usize) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "sluice".to_string(),
    })?;

    let queue = Arc::new(AdmissionQueue::new(config.queue_capacity)?);
    let dedup = Arc::new(DedupStore::new(config.dedup_ttl()));
    let sweeper = dedup.spawn_sweeper(config.sweep_interval());
    let downstream = Arc::new(SimulatedDownstream::flaky(failure_rate));

    let relay = Arc::new(Relay::new(
        queue,
        Arc::clone(&dedup),
        config.retry_policy(),
        Arc::clone(&downstream) as Arc<dyn sluice::downstream::Downstream>,
    ));

    let mut handles = Vec::with_capacity(requests);
    for i in 0..requests {
        let relay = Arc::clone(&relay);
        let mut request = RelayRequest::new(serde_json::json!({ "seq": i }));
        if duplicate_every > 0 {
            // Pair every Nth request with its predecessor's key
            let group = if i % duplicate_every == 0 && i > 0 { i - 1 } else { i };
            request = request.correlation_key(format!("req-{group}"));
        }
        handles.push(tokio::spawn(async move { relay.handle(request).await }));
    }

    let mut success = 0usize;
    let mut duplicate = 0usize;
    let mut capacity = 0usize;
    let mut exhausted = 0usize;
    let mut internal = 0usize;
    let mut total_attempts = 0u64;

    for handle in handles {
        match handle.await? {
            RelayOutcome::Success { attempts, .. } => {
                success += 1;
                total_attempts += attempts as u64;
            }
            RelayOutcome::DuplicateInProgress => duplicate += 1,
            RelayOutcome::CapacityExceeded => capacity += 1,
            RelayOutcome::DownstreamExhausted { attempts, .. } => {
                exhausted += 1;
                total_attempts += attempts as u64;
            }
            RelayOutcome::InternalError { .. } => internal += 1,
        }
    }

    dedup.shutdown();
    sweeper.await.ok();

    println!("{requests} request(s) relayed, {} downstream call(s)", downstream.calls());
    println!("{:<24}{}", "success:", success);
    println!("{:<24}{}", "duplicate in progress:", duplicate);
    println!("{:<24}{}", "capacity exceeded:", capacity);
    println!("{:<24}{}", "downstream exhausted:", exhausted);
    println!("{:<24}{}", "internal error:", internal);
    if success + exhausted > 0 {
        println!(
            "{:<24}{:.2}",
            "mean attempts:",
            total_attempts as f64 / (success + exhausted) as f64
        );
    }

    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    println!("Queue capacity:      {}", config.queue_capacity);
    println!("Max retries:         {}", config.max_retries);
    println!("Initial delay:       {}ms", config.initial_delay_ms);
    println!("Max delay:           {}ms", config.max_delay_ms);
    println!("Per-attempt timeout: {}ms", config.per_attempt_timeout_ms);
    println!("Dedup TTL:           {}s", config.dedup_ttl_secs);
    println!("Sweep interval:      {}s", config.sweep_interval_secs);
    println!(
        "OTLP endpoint:       {}",
        config.otel_endpoint.as_deref().unwrap_or("-")
    );
    println!("Log level:           {}", config.log_level);

    Ok(())
}
