use crate::nginx;
use certhound_config::{DomainPolicy, NginxConfig, SecondVerificationMethod};
use certhound_dns::DnsProvider;
use certhound_issuance::{DNS_METHOD, HTTP_METHOD, IssuanceApi, MethodDetail, VerificationChallenge};
use std::sync::Arc;
use tracing::info;

const ACME_RECORD_NAME: &str = "_acme-challenge";

/// Outcome of attempting one ownership-proof challenge.
#[derive(Debug)]
pub enum Resolution {
    /// The proof is in place and the verification request was accepted.
    Submitted(&'static str),
    /// A side effect or the submission itself failed; the reason is
    /// operator-facing.
    Failed(String),
    /// The challenge offered an unexpected number of methods.
    Unsupported(usize),
}

/// Chooses DNS-01 or HTTP-01 for a pending challenge per the domain's
/// policy, performs the side effect, and submits the verification.
pub struct ChallengeResolver {
    issuance: Arc<dyn IssuanceApi>,
    dns: Option<Arc<dyn DnsProvider>>,
    nginx: NginxConfig,
}

impl ChallengeResolver {
    pub fn new(
        issuance: Arc<dyn IssuanceApi>,
        dns: Option<Arc<dyn DnsProvider>>,
        nginx: NginxConfig,
    ) -> Self {
        Self {
            issuance,
            dns,
            nginx,
        }
    }

    pub async fn resolve(
        &self,
        policy: &DomainPolicy,
        challenge: &VerificationChallenge,
        order_id: &str,
    ) -> Resolution {
        match challenge.check.len() {
            // A single offered method is always DNS-01 (wildcard orders).
            1 => match challenge.check.get(DNS_METHOD) {
                Some(detail) => self.resolve_dns(policy, challenge, detail, order_id).await,
                None => Resolution::Failed(format!(
                    "domain {}: single-method challenge does not offer {DNS_METHOD}",
                    policy.domain
                )),
            },
            2 => match policy.second_verification_method {
                Some(SecondVerificationMethod::Dns) => match challenge.check.get(DNS_METHOD) {
                    Some(detail) => self.resolve_dns(policy, challenge, detail, order_id).await,
                    None => Resolution::Failed(format!(
                        "domain {}: challenge does not offer {DNS_METHOD}",
                        policy.domain
                    )),
                },
                Some(SecondVerificationMethod::Http) => match challenge.check.get(HTTP_METHOD) {
                    Some(detail) => self.resolve_http(policy, challenge, detail, order_id).await,
                    None => Resolution::Failed(format!(
                        "domain {}: challenge does not offer {HTTP_METHOD}",
                        policy.domain
                    )),
                },
                None => Resolution::Failed(format!(
                    "domain {}: second verification method is not configured",
                    policy.domain
                )),
            },
            count => Resolution::Unsupported(count),
        }
    }

    async fn resolve_dns(
        &self,
        policy: &DomainPolicy,
        challenge: &VerificationChallenge,
        detail: &MethodDetail,
        order_id: &str,
    ) -> Resolution {
        if policy.dns_provider.is_none() {
            return Resolution::Failed(format!(
                "domain {}: no DNS provider configured",
                policy.domain
            ));
        }

        let Some(dns) = &self.dns else {
            return Resolution::Failed(format!(
                "domain {}: DNS provider credentials are not configured",
                policy.domain
            ));
        };

        let Some(txt) = detail.txt.as_deref() else {
            return Resolution::Failed(format!(
                "domain {}: challenge is missing the TXT value",
                policy.domain
            ));
        };

        info!(
            "domain {}: pointing {ACME_RECORD_NAME} at the challenge value",
            policy.domain
        );

        let record = match dns.lookup_record(&policy.domain, ACME_RECORD_NAME).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Resolution::Failed(format!(
                    "domain {}: no {ACME_RECORD_NAME} record exists to update",
                    policy.domain
                ));
            }
            Err(e) => {
                return Resolution::Failed(format!(
                    "domain {}: DNS record lookup failed: {e}",
                    policy.domain
                ));
            }
        };

        if let Err(e) = dns.update_record(&policy.domain, &record, txt).await {
            return Resolution::Failed(format!(
                "domain {}: DNS record update failed: {e}",
                policy.domain
            ));
        }

        self.submit(order_id, challenge, detail).await
    }

    async fn resolve_http(
        &self,
        policy: &DomainPolicy,
        challenge: &VerificationChallenge,
        detail: &MethodDetail,
        order_id: &str,
    ) -> Resolution {
        let (Some(filename), Some(content)) =
            (detail.filename.as_deref(), detail.content.as_deref())
        else {
            return Resolution::Failed(format!(
                "domain {}: challenge is missing the {HTTP_METHOD} token",
                policy.domain
            ));
        };

        // Validate and compute the rewrite before the server is touched,
        // so a bad config fails with the server still running.
        let patch = match nginx::plan_patch(&self.nginx, filename, content).await {
            Ok(patch) => patch,
            Err(e) => {
                return Resolution::Failed(format!(
                    "domain {}: web server config patch failed: {e}",
                    policy.domain
                ));
            }
        };

        info!(
            "domain {}: stopping the web server for {HTTP_METHOD} verification",
            policy.domain
        );
        if let Err(e) = run_command(&self.nginx.stop_command).await {
            return Resolution::Failed(format!(
                "domain {}: failed to stop the web server: {e}",
                policy.domain
            ));
        }

        if let Err(e) = nginx::write_patch(&patch).await {
            return Resolution::Failed(format!(
                "domain {}: failed to write the patched config: {e}",
                policy.domain
            ));
        }

        info!("domain {}: restarting the web server", policy.domain);
        if let Err(e) = run_command(&self.nginx.start_command).await {
            return Resolution::Failed(format!(
                "domain {}: failed to start the web server: {e}",
                policy.domain
            ));
        }

        self.submit(order_id, challenge, detail).await
    }

    async fn submit(
        &self,
        order_id: &str,
        challenge: &VerificationChallenge,
        detail: &MethodDetail,
    ) -> Resolution {
        let set = format!("{}:{}", challenge.id, detail.method);

        match self.issuance.verify(order_id, &set).await {
            Ok(true) => Resolution::Submitted(if detail.method == HTTP_METHOD {
                HTTP_METHOD
            } else {
                DNS_METHOD
            }),
            Ok(false) => Resolution::Failed(format!(
                "issuance provider rejected the {} verification submission",
                detail.method
            )),
            Err(e) => Resolution::Failed(format!("verification submission failed: {e}")),
        }
    }
}

async fn run_command(command: &str) -> anyhow::Result<()> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        anyhow::bail!("empty command");
    };

    let output = tokio::process::Command::new(program)
        .args(parts)
        .output()
        .await?;

    if !output.status.success() {
        anyhow::bail!("`{command}` exited with {}", output.status);
    }
    Ok(())
}
