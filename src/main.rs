//! Daily blog generation worker. Binary entrypoint.
//! Designed to run once per day via cron/systemd timer: one generation cycle,
//! a summary on stdout, an optional email digest, then exit.
//!
//! Exit code 0 for published/draft/skipped outcomes, 1 for failed runs and
//! fatal errors.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shopfloor_ralph::catalog::http::SupabaseCatalog;
use shopfloor_ralph::llm::AnthropicClient;
use shopfloor_ralph::notify::email::EmailSender;
use shopfloor_ralph::notify::RunDigest;
use shopfloor_ralph::quality::HeuristicScorer;
use shopfloor_ralph::store::http::SupabaseStore;
use shopfloor_ralph::{Collaborators, RalphConfig, RalphLoop};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shopfloor_ralph=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let config = match RalphConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return 1;
        }
    };

    let collaborators = match build_collaborators() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return 1;
        }
    };

    println!("Starting blog generation...");
    println!("  Quality threshold: {}", config.quality_threshold);
    println!("  Timeout: {} minutes", config.timeout_minutes);
    println!("  Cost limit: {} cents", config.cost_limit_cents);
    println!();

    let ralph = match RalphLoop::new(config, collaborators) {
        Ok(ralph) => ralph,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return 1;
        }
    };

    let result = match ralph.run().await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return 1;
        }
    };

    println!();
    println!("{}", "=".repeat(50));
    println!("Run Complete");
    println!("{}", "=".repeat(50));
    println!("Status:      {}", result.status.as_str());
    println!("Quality:     {:.2}", result.final_quality_score);
    println!("Iterations:  {}", result.iteration_count);
    println!("Cost:        {} cents", result.total_cost_cents);
    println!("Post ID:     {}", result.post_id);
    println!("{}", "=".repeat(50));

    notify_best_effort(&result).await;

    if result.status.is_success() {
        0
    } else {
        1
    }
}

fn build_collaborators() -> anyhow::Result<Collaborators> {
    let llm = AnthropicClient::from_env()?;
    let store = SupabaseStore::from_env()?;
    let catalog = SupabaseCatalog::from_env()?;
    Ok(Collaborators {
        catalog: Arc::new(catalog),
        store: Arc::new(store),
        llm: Arc::new(llm),
        scorer: Arc::new(HeuristicScorer),
    })
}

/// The digest is nice-to-have; a broken mailer never changes the exit code.
async fn notify_best_effort(result: &shopfloor_ralph::RunResult) {
    match EmailSender::maybe_from_env() {
        Ok(Some(sender)) => {
            let digest = RunDigest::from_result(result);
            if let Err(e) = sender.send_digest(&digest).await {
                tracing::warn!(error = %e, "run digest email failed");
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "email notification misconfigured");
        }
    }
}
