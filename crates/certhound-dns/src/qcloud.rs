use crate::provider::{DnsProvider, DnsRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "dnspod";
const HOST: &str = "dnspod.tencentcloudapi.com";
const ENDPOINT: &str = "https://dnspod.tencentcloudapi.com";
const REGION: &str = "ap-guangzhou";
const API_VERSION: &str = "2021-03-23";
const ALGORITHM: &str = "TC3-HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host;x-tc-action";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(7);

/// Tencent Cloud DNSPod client. Every request is signed with the
/// TC3-HMAC-SHA256 scheme: canonical request -> string to sign ->
/// date/service-derived signing key -> authorization header.
pub struct QcloudProvider {
    secret_id: String,
    secret_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct DescribeRecordListRequest<'a> {
    #[serde(rename = "Domain")]
    domain: &'a str,
}

#[derive(Debug, Serialize)]
struct ModifyRecordRequest<'a> {
    #[serde(rename = "Domain")]
    domain: &'a str,
    #[serde(rename = "RecordType")]
    record_type: &'a str,
    #[serde(rename = "RecordLine")]
    record_line: &'a str,
    #[serde(rename = "Value")]
    value: &'a str,
    #[serde(rename = "RecordId")]
    record_id: u64,
    #[serde(rename = "TTL")]
    ttl: u32,
    #[serde(rename = "SubDomain")]
    sub_domain: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(rename = "Response")]
    response: ResponseBody<T>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody<T> {
    #[serde(rename = "Error")]
    error: Option<ApiError>,
    #[serde(flatten)]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RecordListBody {
    #[serde(rename = "RecordList", default)]
    record_list: Vec<RecordItem>,
}

#[derive(Debug, Deserialize)]
struct RecordItem {
    #[serde(rename = "RecordId")]
    record_id: u64,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(rename = "Line")]
    line: String,
    #[serde(rename = "TTL", default = "default_ttl")]
    ttl: u32,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ModifyRecordBody {}

fn default_ttl() -> u32 {
    600
}

impl From<RecordItem> for DnsRecord {
    fn from(item: RecordItem) -> Self {
        DnsRecord {
            record_id: item.record_id,
            name: item.name,
            record_type: item.record_type,
            line: item.line,
            ttl: item.ttl,
            value: item.value,
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_request(action: &str, payload: &str) -> String {
    let hashed_payload = sha256_hex(payload.as_bytes());
    let canonical_headers = format!(
        "content-type:application/json\nhost:{HOST}\nx-tc-action:{}\n",
        action.to_lowercase()
    );
    format!("POST\n/\n\n{canonical_headers}\n{SIGNED_HEADERS}\n{hashed_payload}")
}

fn string_to_sign(timestamp: i64, date: &str, canonical: &str) -> String {
    let credential_scope = format!("{date}/{SERVICE}/tc3_request");
    format!(
        "{ALGORITHM}\n{timestamp}\n{credential_scope}\n{}",
        sha256_hex(canonical.as_bytes())
    )
}

impl QcloudProvider {
    pub fn new(secret_id: String, secret_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            secret_id,
            secret_key,
            client,
        })
    }

    fn authorization(&self, date: &str, signature: &str) -> String {
        format!(
            "{ALGORITHM} Credential={}/{date}/{SERVICE}/tc3_request, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.secret_id
        )
    }

    fn sign(&self, action: &str, payload: &str, timestamp: i64, date: &str) -> Result<String> {
        let secret_date = hmac_sha256(format!("TC3{}", self.secret_key).as_bytes(), date.as_bytes())?;
        let secret_service = hmac_sha256(&secret_date, SERVICE.as_bytes())?;
        let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;

        let to_sign = string_to_sign(timestamp, date, &canonical_request(action, payload));
        let signature = hmac_sha256(&secret_signing, to_sign.as_bytes())?;
        Ok(hex::encode(signature))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &impl Serialize,
    ) -> Result<T> {
        let payload = serde_json::to_string(params)?;
        let now = Utc::now();
        let timestamp = now.timestamp();
        let date = now.format("%Y-%m-%d").to_string();

        let signature = self.sign(action, &payload, timestamp, &date)?;
        debug!("signed {action} request for {date}");

        let response = self
            .client
            .post(ENDPOINT)
            .header("Authorization", self.authorization(&date, &signature))
            .header("Content-Type", "application/json")
            .header("Host", HOST)
            .header("X-TC-Action", action)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Version", API_VERSION)
            .header("X-TC-Region", REGION)
            .body(payload)
            .send()
            .await?;

        let body: ApiResponse<T> = response.json().await?;

        if let Some(error) = body.response.error {
            return Err(Error::Api {
                code: error.code,
                message: error.message,
            });
        }

        body.response.data.ok_or_else(|| {
            Error::Other(anyhow::anyhow!("{action} response carried no data"))
        })
    }
}

#[async_trait]
impl DnsProvider for QcloudProvider {
    async fn lookup_record(&self, domain: &str, name: &str) -> Result<Option<DnsRecord>> {
        let body: RecordListBody = self
            .request("DescribeRecordList", &DescribeRecordListRequest { domain })
            .await?;

        Ok(body
            .record_list
            .into_iter()
            .find(|record| record.name == name)
            .map(DnsRecord::from))
    }

    async fn update_record(&self, domain: &str, record: &DnsRecord, value: &str) -> Result<()> {
        let _: ModifyRecordBody = self
            .request(
                "ModifyRecord",
                &ModifyRecordRequest {
                    domain,
                    record_type: &record.record_type,
                    record_line: &record.line,
                    value,
                    record_id: record.record_id,
                    ttl: record.ttl,
                    sub_domain: &record.name,
                },
            )
            .await?;

        info!(
            "updated {} record for {} from {:?} to {:?}",
            record.name, domain, record.value, value
        );
        Ok(())
    }
}
