//! SiteWatch - website availability monitor.
//!
//! Each invocation checks the configured websites once, emails alerts on
//! health changes, sends a daily digest and saves the status for the next
//! run. Schedule it externally, e.g. from cron every minute.

mod config;
mod notify;
mod probe;
mod scheduler;
mod status;
mod template;

#[cfg(test)]
mod test_support;

use config::{load_system_config, load_targets, AppConfig};
use notify::{Mailer, SmtpMailer, UnavailableMailer};
use scheduler::{RunContext, Runner};
use status::StatusStore;

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sitewatch")]
#[command(about = "Check websites once, alert on changes and mail a daily digest")]
#[command(version)]
struct Args {
    /// Write example configuration files and exit
    #[arg(long)]
    create_template_configs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    let args = Args::parse();
    let cfg = AppConfig::load();

    if args.create_template_configs {
        template::write_templates(&cfg.system_path, &cfg.targets_path)?;
        return Ok(());
    }

    // Load configuration; without it nothing is checked
    let loaded = load_system_config(&cfg.system_path)
        .and_then(|system| Ok((system, load_targets(&cfg.targets_path)?)));
    let (system, targets) = match loaded {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("{}", e);
            if let Err(te) = template::write_templates(&cfg.system_path, &cfg.targets_path) {
                tracing::error!("Can't write configuration templates: {}", te);
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        "Loaded {} targets from {}",
        targets.len(),
        cfg.targets_path.display()
    );
    tracing::info!("Using status file {}", cfg.status_path.display());

    let store = StatusStore::load(&cfg.status_path);
    if store.is_empty() {
        tracing::info!("Starting with empty status");
    }

    // Without a transport the checks still run; every send is logged as failed
    let mailer: Arc<dyn Mailer> = match SmtpMailer::new(&system) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            tracing::error!("Can't set up SMTP transport, emails will not be sent: {}", e);
            Arc::new(UnavailableMailer::new(e.to_string()))
        }
    };

    let ctx = RunContext {
        system,
        targets,
        store,
        mailer,
        status_path: cfg.status_path.clone(),
        retention: cfg.retention,
        clock: Arc::new(chrono::Utc::now),
    };

    let summary = Runner::new(ctx).run().await;
    if let Some(sent) = summary.digest_emails {
        tracing::info!("Daily digest: {} emails sent", sent);
    }
    if summary.failed_tasks > 0 {
        tracing::warn!("{} check tasks failed", summary.failed_tasks);
    }
    if !summary.persisted {
        tracing::warn!("Status was not saved, next run starts from the previous file");
    }

    Ok(())
}
