use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct CerthoundConfig {
    pub issuance: IssuanceConfig,

    #[serde(default)]
    pub qcloud: Option<QcloudConfig>,

    #[serde(default)]
    pub notify: Option<NotifyConfig>,

    #[serde(default)]
    pub nginx: NginxConfig,

    #[serde(default)]
    pub domains: BTreeMap<String, DomainPolicy>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IssuanceConfig {
    pub api_host: String,
    pub token: String,
    pub user_name: String,

    #[serde(default)]
    pub user_type: AccountTier,

    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    #[default]
    Normal,
    Vip,
    Svip,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QcloudConfig {
    pub secret_id: String,
    pub secret_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    pub webhook_host: String,
    pub token: String,
    pub sender_id: String,

    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NginxConfig {
    #[serde(default = "default_nginx_config_path")]
    pub config_path: PathBuf,

    #[serde(default = "default_challenge_path_pattern")]
    pub challenge_path_pattern: String,

    #[serde(default = "default_challenge_body_pattern")]
    pub challenge_body_pattern: String,

    #[serde(default = "default_stop_command")]
    pub stop_command: String,

    #[serde(default = "default_start_command")]
    pub start_command: String,
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            config_path: default_nginx_config_path(),
            challenge_path_pattern: default_challenge_path_pattern(),
            challenge_body_pattern: default_challenge_body_pattern(),
            stop_command: default_stop_command(),
            start_command: default_start_command(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DomainPolicy {
    pub domain: String,
    pub ssl_deployment_path: PathBuf,

    #[serde(default = "default_apply_lead_days")]
    pub apply_for_days_in_advance: i64,

    #[serde(default)]
    pub dns_provider: Option<DnsProviderKind>,

    #[serde(default)]
    pub second_verification_method: Option<SecondVerificationMethod>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DnsProviderKind {
    Qcloud,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecondVerificationMethod {
    Dns,
    Http,
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from(crate::constants::DEFAULT_TEMP_DIR)
}

fn default_nginx_config_path() -> PathBuf {
    PathBuf::from("/etc/nginx/conf.d/acme.conf")
}

fn default_challenge_path_pattern() -> String {
    r"/\.well-known/acme-challenge/([A-Za-z0-9_-]+)".to_string()
}

fn default_challenge_body_pattern() -> String {
    r#"return 200 "(.*?)""#.to_string()
}

fn default_stop_command() -> String {
    "systemctl stop nginx".to_string()
}

fn default_start_command() -> String {
    "systemctl start nginx".to_string()
}

fn default_apply_lead_days() -> i64 {
    3
}

pub async fn load_config(path: &Path) -> Result<CerthoundConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml_str = r#"
[issuance]
api_host = "https://issuance.example"
token = "tok"
user_name = "alice"
"#;
        let config: CerthoundConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.issuance.user_name, "alice");
        assert_eq!(config.issuance.user_type, AccountTier::Normal);
        assert!(config.qcloud.is_none());
        assert!(config.notify.is_none());
        assert!(config.domains.is_empty());
        assert_eq!(config.nginx.stop_command, "systemctl stop nginx");
    }

    #[test]
    fn test_parse_domain_policy() {
        let toml_str = r#"
[issuance]
api_host = "https://issuance.example"
token = "tok"
user_name = "alice"
user_type = "svip"

[domains.example]
domain = "example.com"
ssl_deployment_path = "/etc/ssl/example.com"
apply_for_days_in_advance = 7
dns_provider = "qcloud"
second_verification_method = "dns"

[domains.other]
domain = "other.org"
ssl_deployment_path = "/etc/ssl/other.org"
"#;
        let config: CerthoundConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.issuance.user_type, AccountTier::Svip);
        assert_eq!(config.domains.len(), 2);

        let example = config.domains.get("example").unwrap();
        assert_eq!(example.domain, "example.com");
        assert_eq!(example.apply_for_days_in_advance, 7);
        assert_eq!(example.dns_provider, Some(DnsProviderKind::Qcloud));
        assert_eq!(
            example.second_verification_method,
            Some(SecondVerificationMethod::Dns)
        );

        let other = config.domains.get("other").unwrap();
        assert_eq!(other.apply_for_days_in_advance, 3);
        assert!(other.dns_provider.is_none());
        assert!(other.second_verification_method.is_none());
    }

    #[test]
    fn test_parse_nginx_overrides() {
        let toml_str = r#"
[issuance]
api_host = "https://issuance.example"
token = "tok"
user_name = "alice"

[nginx]
config_path = "/srv/nginx/acme.conf"
stop_command = "service nginx stop"
start_command = "service nginx start"
"#;
        let config: CerthoundConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.nginx.config_path,
            PathBuf::from("/srv/nginx/acme.conf")
        );
        assert_eq!(config.nginx.stop_command, "service nginx stop");
        assert!(
            config
                .nginx
                .challenge_path_pattern
                .contains("acme-challenge")
        );
    }

    #[test]
    fn test_invalid_dns_provider_rejected() {
        let toml_str = r#"
[issuance]
api_host = "https://issuance.example"
token = "tok"
user_name = "alice"

[domains.example]
domain = "example.com"
ssl_deployment_path = "/etc/ssl/example.com"
dns_provider = "route53"
"#;
        assert!(toml::from_str::<CerthoundConfig>(toml_str).is_err());
    }
}
