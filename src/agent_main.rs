//! # Minder Agent — one scheduled batch per invocation
//!
//! Designed to be fired by an external cron (e.g. a CI workflow on a
//! one-minute schedule): load the catalog, run whatever is due,
//! persist state, send the summary card, exit.
//!
//! Usage:
//!   minder-agent                         # run one batch
//!   minder-agent --dry-run               # exercise handlers, no save/notify
//!   minder-agent --state-file /tmp/s.json
//!
//! Exit code: 0 iff no task failed and the summary card (when a
//! webhook is configured) was delivered; 1 otherwise.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use minder_core::{AgentConfig, AgentError};
use minder_handlers::register_builtins;
use minder_providers::{validate_provider_id, EnvProviderFactory};
use minder_scheduler::{open_store, run_once, HandlerRegistry, WebhookNotifier};

#[derive(Parser)]
#[command(
    name = "minder-agent",
    version,
    about = "⏰ Minder — cron-driven content & monitoring agent"
)]
struct Cli {
    /// Path to the task catalog (overrides TASKS_FILE)
    #[arg(long)]
    tasks_file: Option<String>,

    /// Path to the state document (overrides STATE_FILE)
    #[arg(long)]
    state_file: Option<String>,

    /// Run handlers but skip state save and webhook dispatch
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "minder_agent=debug,minder_scheduler=debug,minder_handlers=debug,minder_providers=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = AgentConfig::from_env();
    if let Some(tasks_file) = &cli.tasks_file {
        config.tasks_file = expand_path(tasks_file);
    }
    if let Some(state_file) = &cli.state_file {
        config.state_file = expand_path(state_file);
    }
    config.dry_run = config.dry_run || cli.dry_run;

    tracing::info!("⏰ minder-agent v{} starting", env!("CARGO_PKG_VERSION"));
    if config.webhook_url.is_empty() {
        tracing::warn!("⚠️ WEBHOOK_URL not set, notifications will be skipped");
    }
    if let Err(e) = validate_provider_id(&config.llm_provider) {
        tracing::error!("💥 fatal: {}", AgentError::from(e));
        std::process::exit(1);
    }

    let store = open_store(&config);
    let notifier = WebhookNotifier::from_config(&config);
    let factory = Arc::new(EnvProviderFactory::new(&config));
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry, &config, factory);
    tracing::info!("🧩 {} handlers registered", registry.len());

    match run_once(store.as_ref(), Arc::new(registry), &notifier, &config).await {
        Ok((report, notifier_ok)) => {
            // Skipped outcomes never fail the run; an undelivered
            // summary card does, but only when a webhook is set.
            let exit = if report.any_failed() || !notifier_ok { 1 } else { 0 };
            std::process::exit(exit);
        }
        Err(e) => {
            tracing::error!("💥 fatal: {e}");
            std::process::exit(1);
        }
    }
}
