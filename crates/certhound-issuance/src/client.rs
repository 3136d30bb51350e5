use crate::deploy;
use crate::limiter::RequestLimiter;
use crate::types::{
    AccountInfo, ApiEnvelope, OrderDetail, OrderListPage, OrderSummary, RenewOutcome,
};
use crate::{Error, Result};
use async_trait::async_trait;
use certhound_config::constants;
use certhound_config::{DomainPolicy, IssuanceConfig};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const ACCOUNT_INFO_PATH: &str = "/letsencrypt/api/account/info";
const ORDER_LIST_PATH: &str = "/letsencrypt/api/order/list";
const ORDER_APPLY_PATH: &str = "/letsencrypt/api/order/apply";
const ORDER_RENEW_PATH: &str = "/letsencrypt/api/order/renew";
const ORDER_DETAIL_PATH: &str = "/letsencrypt/api/order/detail";
const ORDER_VERIFY_PATH: &str = "/letsencrypt/api/order/verify";
const ORDER_DOWNLOAD_PATH: &str = "/letsencrypt/api/order/down";

const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// The provider acknowledges a verification submission with this exact
/// value; anything else means the submission was not accepted.
const VERIFY_ACCEPTED: &str = "提交成功,验证中";

/// Request/response surface of the certificate-issuance provider, plus
/// local deployment of a downloaded archive.
#[async_trait]
pub trait IssuanceApi: Send + Sync {
    async fn account_info(&self) -> Result<AccountInfo>;

    async fn order_list(&self) -> Result<Vec<OrderSummary>>;

    async fn apply(&self, domains: &str, algorithm: &str, quick: bool, ca: &str)
        -> Result<String>;

    async fn renew(&self, order_id: &str) -> Result<RenewOutcome>;

    async fn details(&self, order_id: &str) -> Result<OrderDetail>;

    async fn verify(&self, order_id: &str, set: &str) -> Result<bool>;

    async fn download(&self, order_id: &str, archive_type: Option<&str>) -> Result<PathBuf>;

    async fn deploy(&self, zip_path: &Path, policy: &DomainPolicy) -> Result<()>;
}

pub struct IssuanceClient {
    client: reqwest::Client,
    api_host: String,
    auth_header: String,
    limiter: RequestLimiter,
    temp_dir: PathBuf,
}

impl IssuanceClient {
    pub fn new(config: &IssuanceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(constants::ISSUANCE_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_host: config.api_host.trim_end_matches('/').to_string(),
            auth_header: format!("Bearer {}:{}", config.token, config.user_name),
            limiter: RequestLimiter::new(&config.user_name, config.user_type),
            temp_dir: config.temp_dir.clone(),
        })
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiEnvelope<T>> {
        self.limiter.acquire().await?;

        let response = self
            .client
            .get(format!("{}{}", self.api_host, path))
            .header("Authorization", &self.auth_header)
            .query(params)
            .send()
            .await?;

        let body = response.text().await?;
        let envelope = serde_json::from_str(&body)?;
        Ok(envelope)
    }
}

#[async_trait]
impl IssuanceApi for IssuanceClient {
    async fn account_info(&self) -> Result<AccountInfo> {
        let envelope: ApiEnvelope<AccountInfo> =
            self.get_envelope(ACCOUNT_INFO_PATH, &[]).await?;
        envelope.into_value()
    }

    async fn order_list(&self) -> Result<Vec<OrderSummary>> {
        let mut page: u64 = 1;
        let mut total: u64 = 1;
        let mut page_size: u64 = 10;
        let mut orders = Vec::new();

        // Page count and total come from the provider and may change
        // between pages; re-read them every iteration.
        while page <= total.div_ceil(page_size.max(1)) {
            let envelope: Result<ApiEnvelope<OrderListPage>> = self
                .get_envelope(ORDER_LIST_PATH, &[("page", &page.to_string())])
                .await;

            match envelope {
                Ok(envelope) if envelope.is_ok() => {
                    let Some(listing) = envelope.v else { break };
                    total = listing.all;
                    page_size = listing.pnum.max(1);
                    orders.extend(listing.list);
                    page += 1;
                }
                Ok(envelope) => {
                    warn!(
                        "order list page {page} refused (code {}): {}",
                        envelope.c, envelope.m
                    );
                    break;
                }
                Err(e) => {
                    warn!("order list page {page} failed: {e}");
                    break;
                }
            }
        }

        debug!("fetched {} order(s) from the provider", orders.len());
        Ok(orders)
    }

    async fn apply(
        &self,
        domains: &str,
        algorithm: &str,
        quick: bool,
        ca: &str,
    ) -> Result<String> {
        let quick = if quick { "yes" } else { "no" };
        let envelope: ApiEnvelope<String> = self
            .get_envelope(
                ORDER_APPLY_PATH,
                &[
                    ("domain", domains),
                    ("algorithm", algorithm),
                    ("quick", quick),
                    ("ca", ca),
                ],
            )
            .await?;
        envelope.into_value()
    }

    async fn renew(&self, order_id: &str) -> Result<RenewOutcome> {
        let envelope: ApiEnvelope<String> = self
            .get_envelope(ORDER_RENEW_PATH, &[("id", order_id)])
            .await?;

        if envelope.is_ok() {
            Ok(RenewOutcome::Renewed(envelope.v.unwrap_or_default()))
        } else {
            Ok(RenewOutcome::Refused(envelope.m))
        }
    }

    async fn details(&self, order_id: &str) -> Result<OrderDetail> {
        let envelope: ApiEnvelope<OrderDetail> = self
            .get_envelope(ORDER_DETAIL_PATH, &[("id", order_id)])
            .await?;
        envelope.into_value()
    }

    async fn verify(&self, order_id: &str, set: &str) -> Result<bool> {
        let envelope: ApiEnvelope<String> = self
            .get_envelope(ORDER_VERIFY_PATH, &[("id", order_id), ("set", set)])
            .await?;

        Ok(envelope.is_ok() && envelope.v.as_deref() == Some(VERIFY_ACCEPTED))
    }

    async fn download(&self, order_id: &str, archive_type: Option<&str>) -> Result<PathBuf> {
        self.limiter.acquire().await?;

        let mut params = vec![("id", order_id)];
        if let Some(archive_type) = archive_type {
            params.push(("type", archive_type));
        }

        let response = self
            .client
            .get(format!("{}{}", self.api_host, ORDER_DOWNLOAD_PATH))
            .header("Authorization", &self.auth_header)
            .query(&params)
            .send()
            .await?;

        let content_type = response
            .headers()
            .get("Content-Type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.starts_with(ARCHIVE_CONTENT_TYPE) {
            return Err(Error::NotAnArchive {
                order_id: order_id.to_string(),
                content_type,
            });
        }

        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|source| Error::Io {
                path: self.temp_dir.clone(),
                source,
            })?;

        let path = self.temp_dir.join(format!("{order_id}.zip"));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;

        info!("downloaded certificate archive to {}", path.display());
        Ok(path)
    }

    async fn deploy(&self, zip_path: &Path, policy: &DomainPolicy) -> Result<()> {
        deploy::deploy_archive(zip_path, &policy.ssl_deployment_path).await
    }
}
