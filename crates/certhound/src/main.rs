mod signal;

use certhound_config::constants;
use certhound_dns::{DnsProvider, QcloudProvider};
use certhound_issuance::{IssuanceApi, IssuanceClient};
use certhound_notify::{LogNotifier, Notify, WebhookNotifier};
use certhound_renewal::{RenewalConfig, RenewalOrchestrator, run_scheduler, scheduler_channel};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config_path = std::env::var("CERTHOUND_CONFIG")
        .unwrap_or_else(|_| constants::DEFAULT_CONFIG_PATH.into());
    let config = certhound_config::load_config(Path::new(&config_path)).await?;
    info!(
        "loaded configuration from {config_path} ({} domain(s))",
        config.domains.len()
    );

    let issuance: Arc<dyn IssuanceApi> = Arc::new(IssuanceClient::new(&config.issuance)?);

    let dns: Option<Arc<dyn DnsProvider>> = match &config.qcloud {
        Some(qcloud) => Some(Arc::new(QcloudProvider::new(
            qcloud.secret_id.clone(),
            qcloud.secret_key.clone(),
        )?)),
        None => {
            info!("no DNS provider credentials configured; DNS-01 verification is unavailable");
            None
        }
    };

    let notifier: Arc<dyn Notify> = match &config.notify {
        Some(notify) => Arc::new(WebhookNotifier::new(notify)?),
        None => {
            info!("no notification webhook configured; falling back to log-only notifications");
            Arc::new(LogNotifier)
        }
    };

    // Operator visibility only; a failure here must not block startup.
    match issuance.account_info().await {
        Ok(account) => info!(
            "issuance account: type {}, email {}, {} application(s) so far",
            account.user_type, account.email, account.num_apply
        ),
        Err(e) => warn!("failed to fetch issuance account info: {e}"),
    }

    let (scheduler, recheck_rx) = scheduler_channel();
    let orchestrator = RenewalOrchestrator::new(
        RenewalConfig {
            issuance,
            dns,
            notifier,
            domains: config.domains.into_values().collect(),
            nginx: config.nginx,
        },
        scheduler,
    );

    let scheduler_handle = tokio::spawn(run_scheduler(orchestrator, recheck_rx));

    tokio::select! {
        _ = signal::shutdown_signal() => {
            info!("shutdown signal received");
        }
        _ = scheduler_handle => {
            error!("renewal scheduler exited unexpectedly");
        }
    }

    info!("certhound shutdown complete");

    Ok(())
}
