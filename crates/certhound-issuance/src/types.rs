use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;

pub const DNS_METHOD: &str = "dns-01";
pub const HTTP_METHOD: &str = "http-01";

const ENVELOPE_OK_CODE: i64 = 20;
const ENVELOPE_OK_MESSAGE: &str = "ok";

const TIME_END_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Every provider endpoint wraps its value in `{"c": code, "m": message,
/// "v": value}`; code 20 with message "ok" is the only success shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub c: i64,
    pub m: String,
    #[serde(default)]
    pub v: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_ok(&self) -> bool {
        self.c == ENVELOPE_OK_CODE && self.m == ENVELOPE_OK_MESSAGE
    }

    /// Unwraps the success value, turning provider refusals into typed errors.
    pub fn into_value(self) -> Result<T> {
        if !self.is_ok() {
            return Err(Error::Api {
                code: self.c,
                message: self.m,
            });
        }
        self.v.ok_or(Error::Api {
            code: ENVELOPE_OK_CODE,
            message: "response carried no value".to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub reg_time: String,
    #[serde(default)]
    pub svip_end: String,
    #[serde(default)]
    pub num_apply: i64,
    #[serde(default)]
    pub num_apply_success: i64,
    #[serde(default)]
    pub num_coin: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderSummary {
    #[serde(deserialize_with = "stringly")]
    pub id: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub time_add: String,
    #[serde(default)]
    pub time_end: String,
}

impl OrderSummary {
    /// Canonical match key: the first listed domain with a leading
    /// wildcard marker stripped.
    pub fn canonical_domain(&self) -> Option<&str> {
        self.domains
            .first()
            .map(|domain| domain.strip_prefix("*.").unwrap_or(domain))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderListPage {
    #[serde(default = "default_total")]
    pub all: u64,
    #[serde(default = "default_page_size")]
    pub pnum: u64,
    #[serde(default)]
    pub list: Vec<OrderSummary>,
}

fn default_total() -> u64 {
    1
}

fn default_page_size() -> u64 {
    10
}

/// Provider-defined status strings, matched by exact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "完成")]
    Complete,
    #[serde(rename = "验证中")]
    Verifying,
    #[serde(rename = "待验证")]
    PendingVerification,
    #[serde(other)]
    Other,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Complete => "complete",
            OrderStatus::Verifying => "verifying",
            OrderStatus::PendingVerification => "pending-verification",
            OrderStatus::Other => "other",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderDetail {
    #[serde(deserialize_with = "stringly")]
    pub id: String,
    #[serde(default)]
    pub domains: Vec<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub time_end: String,
    #[serde(default)]
    pub verify_data: Vec<VerificationChallenge>,
}

impl OrderDetail {
    /// Expiry (or verification deadline) as the provider reports it.
    pub fn expires_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.time_end, TIME_END_FORMAT).ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationChallenge {
    #[serde(deserialize_with = "stringly")]
    pub id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub check: BTreeMap<String, MethodDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodDetail {
    #[serde(rename = "type")]
    pub method: String,
    #[serde(default)]
    pub dns: Option<String>,
    #[serde(default)]
    pub txt: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    Renewed(String),
    Refused(String),
}

/// The provider is loose about id fields (strings in some responses,
/// integers in others); normalize both to a string.
fn stringly<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(value) => value,
        StringOrNumber::Number(value) => value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let envelope: ApiEnvelope<String> =
            serde_json::from_str(r#"{"c": 20, "m": "ok", "v": "cert-1"}"#).unwrap();
        assert!(envelope.is_ok());
        assert_eq!(envelope.into_value().unwrap(), "cert-1");
    }

    #[test]
    fn test_envelope_refusal_is_typed_error() {
        let envelope: ApiEnvelope<String> =
            serde_json::from_str(r#"{"c": 50, "m": "token invalid"}"#).unwrap();
        assert!(!envelope.is_ok());

        match envelope.into_value() {
            Err(Error::Api { code, message }) => {
                assert_eq!(code, 50);
                assert_eq!(message, "token invalid");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_malformed_body_is_decode_error() {
        let result: std::result::Result<ApiEnvelope<String>, _> =
            serde_json::from_str(r#"{"code": 20}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_order_status_exact_values() {
        let complete: OrderStatus = serde_json::from_str(r#""完成""#).unwrap();
        assert_eq!(complete, OrderStatus::Complete);

        let verifying: OrderStatus = serde_json::from_str(r#""验证中""#).unwrap();
        assert_eq!(verifying, OrderStatus::Verifying);

        let pending: OrderStatus = serde_json::from_str(r#""待验证""#).unwrap();
        assert_eq!(pending, OrderStatus::PendingVerification);

        let unknown: OrderStatus = serde_json::from_str(r#""已吊销""#).unwrap();
        assert_eq!(unknown, OrderStatus::Other);
    }

    #[test]
    fn test_canonical_domain_strips_wildcard() {
        let summary: OrderSummary = serde_json::from_str(
            r#"{"id": "1", "domains": ["*.example.com", "example.com"]}"#,
        )
        .unwrap();
        assert_eq!(summary.canonical_domain(), Some("example.com"));

        let bare: OrderSummary =
            serde_json::from_str(r#"{"id": "2", "domains": ["plain.org"]}"#).unwrap();
        assert_eq!(bare.canonical_domain(), Some("plain.org"));

        let empty: OrderSummary = serde_json::from_str(r#"{"id": "3"}"#).unwrap();
        assert_eq!(empty.canonical_domain(), None);
    }

    #[test]
    fn test_order_detail_parses_challenges() {
        let json = r#"{
            "id": 42,
            "domains": ["example.com"],
            "status": "待验证",
            "time_end": "2026-09-01 12:00:00",
            "verify_data": [
                {
                    "id": 123,
                    "domain": "example.com",
                    "check": {
                        "dns-01": {"type": "dns-01", "dns": "_acme-challenge.example.com", "txt": "abc"},
                        "http-01": {"type": "http-01", "url": "http://example.com/.well-known/acme-challenge/tok", "filename": "tok", "content": "body"}
                    }
                }
            ]
        }"#;

        let detail: OrderDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.id, "42");
        assert_eq!(detail.status, OrderStatus::PendingVerification);
        assert!(detail.expires_at().is_some());

        let challenge = &detail.verify_data[0];
        assert_eq!(challenge.id, "123");
        assert_eq!(challenge.check.len(), 2);
        assert_eq!(
            challenge.check.get(DNS_METHOD).unwrap().txt.as_deref(),
            Some("abc")
        );
        assert_eq!(
            challenge.check.get(HTTP_METHOD).unwrap().filename.as_deref(),
            Some("tok")
        );
    }

    #[test]
    fn test_unparseable_deadline_is_none() {
        let detail: OrderDetail = serde_json::from_str(
            r#"{"id": "1", "status": "完成", "time_end": "soon"}"#,
        )
        .unwrap();
        assert!(detail.expires_at().is_none());
    }
}
