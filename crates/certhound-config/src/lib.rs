mod config;
pub mod constants;

pub use config::{
    AccountTier, CerthoundConfig, ConfigError, DnsProviderKind, DomainPolicy, IssuanceConfig,
    NginxConfig, NotifyConfig, QcloudConfig, SecondVerificationMethod, load_config,
};
