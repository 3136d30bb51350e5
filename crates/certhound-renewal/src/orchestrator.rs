use crate::resolver::{ChallengeResolver, Resolution};
use crate::scheduler::SchedulerHandle;
use certhound_config::constants;
use certhound_config::{DomainPolicy, NginxConfig};
use certhound_dns::DnsProvider;
use certhound_issuance::{IssuanceApi, OrderDetail, OrderStatus, OrderSummary, RenewOutcome};
use certhound_notify::{Notify, Severity};
use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why a pass is running. Only a re-check pass may complete the
/// download-and-deploy leg: the initial verification submission never
/// flips an order to complete immediately, so deployment is gated on
/// the follow-up visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Daily,
    RecheckAfterVerification,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trigger::Startup => "startup",
            Trigger::Daily => "daily",
            Trigger::RecheckAfterVerification => "re-check-after-verification",
        };
        write!(f, "{label}")
    }
}

/// Per-domain verdict, interpreted once at the top of the pass loop.
/// Stopping serializes in-flight verifications: DNS propagation and web
/// server reloads touch shared state, so one domain at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainOutcome {
    Continue,
    StopPassAndReschedule(Duration),
}

/// Where a domain's certificate sits this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DomainState {
    /// Issued, outside the renewal window, and this is the follow-up
    /// visit after a verification: ready to download and deploy.
    CompleteAwaitingRecheck,
    /// The provider is still checking a submitted proof.
    Verifying,
    /// The provider is waiting for an ownership proof.
    PendingVerification,
    /// Inside the renewal window with nothing left to verify.
    RenewalDue,
    /// Nothing to do.
    Current,
}

pub struct RenewalConfig {
    pub issuance: Arc<dyn IssuanceApi>,
    pub dns: Option<Arc<dyn DnsProvider>>,
    pub notifier: Arc<dyn Notify>,
    pub domains: Vec<DomainPolicy>,
    pub nginx: NginxConfig,
}

pub struct RenewalOrchestrator {
    issuance: Arc<dyn IssuanceApi>,
    resolver: ChallengeResolver,
    notifier: Arc<dyn Notify>,
    domains: Vec<DomainPolicy>,
    scheduler: SchedulerHandle,
}

impl RenewalOrchestrator {
    pub fn new(config: RenewalConfig, scheduler: SchedulerHandle) -> Self {
        let resolver =
            ChallengeResolver::new(config.issuance.clone(), config.dns, config.nginx);

        Self {
            issuance: config.issuance,
            resolver,
            notifier: config.notifier,
            domains: config.domains,
            scheduler,
        }
    }

    /// One full orchestration pass over all configured domains. All
    /// outcomes are observable through notifications, deployed files,
    /// and re-scheduled follow-up passes.
    pub async fn run_pass(&self, trigger: Trigger) {
        info!("starting renewal pass ({trigger})");

        let orders = match self.issuance.order_list().await {
            Ok(orders) => orders,
            Err(e) => {
                error!("failed to list certificate orders: {e}");
                self.notifier
                    .notify(
                        &format!("certificate order listing failed, will re-check shortly: {e}"),
                        Severity::Error,
                    )
                    .await;
                self.scheduler.request_recheck(constants::RECHECK_DELAY).await;
                return;
            }
        };

        let by_domain: HashMap<&str, &OrderSummary> = orders
            .iter()
            .filter_map(|order| order.canonical_domain().map(|domain| (domain, order)))
            .collect();

        for policy in &self.domains {
            match self.process_domain(trigger, policy, &by_domain).await {
                DomainOutcome::Continue => {}
                DomainOutcome::StopPassAndReschedule(delay) => {
                    self.scheduler.request_recheck(delay).await;
                    info!(
                        "pass stopped while domain {} verification settles; re-check in {:?}",
                        policy.domain, delay
                    );
                    return;
                }
            }
        }

        info!("renewal pass complete ({trigger})");
    }

    async fn process_domain(
        &self,
        trigger: Trigger,
        policy: &DomainPolicy,
        orders: &HashMap<&str, &OrderSummary>,
    ) -> DomainOutcome {
        let Some(summary) = orders.get(policy.domain.as_str()) else {
            warn!(
                "domain {} has no matching order at the issuance provider",
                policy.domain
            );
            self.notifier
                .notify(
                    &format!(
                        "domain {}: no matching certificate order at the issuance provider; check the domain configuration",
                        policy.domain
                    ),
                    Severity::Warning,
                )
                .await;
            return DomainOutcome::Continue;
        };

        let detail = match self.issuance.details(&summary.id).await {
            Ok(detail) => detail,
            Err(e) => {
                error!("domain {}: failed to fetch order details: {e}", policy.domain);
                self.notifier
                    .notify(
                        &format!(
                            "domain {}: failed to fetch certificate details, will re-check shortly",
                            policy.domain
                        ),
                        Severity::Error,
                    )
                    .await;
                self.scheduler.request_recheck(constants::RECHECK_DELAY).await;
                return DomainOutcome::Continue;
            }
        };

        let Some(expires_at) = detail.expires_at() else {
            error!(
                "domain {}: order {} reports an unreadable deadline {:?}",
                policy.domain, detail.id, detail.time_end
            );
            self.notifier
                .notify(
                    &format!(
                        "domain {}: certificate order reports an unreadable deadline, will re-check shortly",
                        policy.domain
                    ),
                    Severity::Error,
                )
                .await;
            self.scheduler.request_recheck(constants::RECHECK_DELAY).await;
            return DomainOutcome::Continue;
        };

        let days_remaining = days_until(expires_at, Local::now().naive_local());
        info!(
            "domain {}: {} day(s) until expiry/deadline, status {}",
            policy.domain, days_remaining, detail.status
        );

        match classify(trigger, policy, &detail, days_remaining) {
            DomainState::Current => DomainOutcome::Continue,
            DomainState::CompleteAwaitingRecheck => {
                self.download_and_deploy(policy, &detail).await;
                DomainOutcome::Continue
            }
            DomainState::Verifying => {
                info!(
                    "domain {}: ownership proof is still being verified, re-checking shortly",
                    policy.domain
                );
                DomainOutcome::StopPassAndReschedule(constants::RECHECK_DELAY)
            }
            DomainState::PendingVerification => {
                self.resolve_challenges(policy, &detail, days_remaining).await
            }
            DomainState::RenewalDue => {
                self.request_renewal(policy, &detail, days_remaining).await
            }
        }
    }

    async fn resolve_challenges(
        &self,
        policy: &DomainPolicy,
        detail: &OrderDetail,
        days_remaining: i64,
    ) -> DomainOutcome {
        for challenge in &detail.verify_data {
            match self.resolver.resolve(policy, challenge, &detail.id).await {
                Resolution::Submitted(method) => {
                    info!(
                        "domain {}: {method} ownership verification submitted",
                        policy.domain
                    );
                    self.notifier
                        .notify(
                            &format!(
                                "domain {}: {method} ownership verification started",
                                policy.domain
                            ),
                            Severity::Success,
                        )
                        .await;
                    return DomainOutcome::StopPassAndReschedule(constants::RECHECK_DELAY);
                }
                Resolution::Failed(reason) => {
                    error!("ownership verification failed: {reason}");
                    self.notifier
                        .notify(
                            &format!("ownership verification failed: {reason}"),
                            Severity::Error,
                        )
                        .await;
                    // The re-check is the retry; nothing else will fire.
                    return DomainOutcome::StopPassAndReschedule(constants::RECHECK_DELAY);
                }
                Resolution::Unsupported(count) => {
                    warn!(
                        "domain {}: challenge {} offers {count} method(s), skipping it",
                        policy.domain, challenge.id
                    );
                }
            }
        }

        self.notifier
            .notify(
                &format!(
                    "domain {}: no ownership proof could be carried out automatically, manual application may be required",
                    policy.domain
                ),
                Severity::Error,
            )
            .await;
        warn!(
            "domain {}: no actionable challenge, falling back to a renewal request",
            policy.domain
        );

        self.request_renewal(policy, detail, days_remaining).await
    }

    async fn request_renewal(
        &self,
        policy: &DomainPolicy,
        detail: &OrderDetail,
        days_remaining: i64,
    ) -> DomainOutcome {
        match self.issuance.renew(&detail.id).await {
            Ok(RenewOutcome::Renewed(_)) => {
                info!("domain {}: renewal order placed", policy.domain);
                self.notifier
                    .notify(
                        &format!(
                            "domain {}: certificate expires in {days_remaining} day(s), renewal requested",
                            policy.domain
                        ),
                        Severity::Warning,
                    )
                    .await;
                DomainOutcome::StopPassAndReschedule(constants::RECHECK_DELAY)
            }
            Ok(RenewOutcome::Refused(message)) => {
                error!("domain {}: renewal refused: {message}", policy.domain);
                self.notifier
                    .notify(
                        &format!(
                            "domain {}: certificate renewal failed, apply manually: {message}",
                            policy.domain
                        ),
                        Severity::Error,
                    )
                    .await;
                DomainOutcome::Continue
            }
            Err(e) => {
                error!("domain {}: renewal request failed: {e}", policy.domain);
                self.notifier
                    .notify(
                        &format!(
                            "domain {}: certificate renewal failed, apply manually: {e}",
                            policy.domain
                        ),
                        Severity::Error,
                    )
                    .await;
                DomainOutcome::Continue
            }
        }
    }

    async fn download_and_deploy(&self, policy: &DomainPolicy, detail: &OrderDetail) {
        info!(
            "domain {}: ownership verification passed, downloading certificate",
            policy.domain
        );
        self.notifier
            .notify(
                &format!(
                    "domain {}: ownership verification passed, downloading and deploying the certificate",
                    policy.domain
                ),
                Severity::Success,
            )
            .await;

        let zip_path = match self.issuance.download(&detail.id, None).await {
            Ok(path) => path,
            Err(e) => {
                error!("domain {}: certificate download failed: {e}", policy.domain);
                self.notifier
                    .notify(
                        &format!("domain {}: certificate download failed: {e}", policy.domain),
                        Severity::Error,
                    )
                    .await;
                return;
            }
        };

        match self.issuance.deploy(&zip_path, policy).await {
            Ok(()) => {
                info!("domain {}: certificate deployed", policy.domain);
                self.notifier
                    .notify(
                        &format!(
                            "domain {}: certificate deployed to {}, verify the site is serving it",
                            policy.domain,
                            policy.ssl_deployment_path.display()
                        ),
                        Severity::Success,
                    )
                    .await;
            }
            Err(e) => {
                error!("domain {}: certificate deployment failed: {e}", policy.domain);
                self.notifier
                    .notify(
                        &format!(
                            "domain {}: certificate deployment failed: {e}",
                            policy.domain
                        ),
                        Severity::Error,
                    )
                    .await;
            }
        }
    }
}

fn classify(
    trigger: Trigger,
    policy: &DomainPolicy,
    detail: &OrderDetail,
    days_remaining: i64,
) -> DomainState {
    let lead = policy.apply_for_days_in_advance;

    if detail.status == OrderStatus::Complete
        && days_remaining > lead
        && trigger == Trigger::RecheckAfterVerification
    {
        return DomainState::CompleteAwaitingRecheck;
    }

    if days_remaining <= lead {
        return match detail.status {
            OrderStatus::Verifying => DomainState::Verifying,
            OrderStatus::PendingVerification => DomainState::PendingVerification,
            _ => DomainState::RenewalDue,
        };
    }

    DomainState::Current
}

/// Whole days until the deadline, floored (one hour past due is day -1,
/// matching the renewal-window comparisons on negative values).
fn days_until(deadline: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (deadline - now).num_seconds().div_euclid(86_400)
}
