#![allow(dead_code)]

use async_trait::async_trait;
use certhound_config::{DnsProviderKind, DomainPolicy, NginxConfig, SecondVerificationMethod};
use certhound_dns::{DnsProvider, DnsRecord};
use certhound_issuance::{
    AccountInfo, IssuanceApi, OrderDetail, OrderSummary, RenewOutcome,
};
use certhound_notify::{Notify, Severity};
use certhound_renewal::{RecheckRequest, RenewalConfig, RenewalOrchestrator, scheduler_channel};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceCall {
    OrderList,
    Details(String),
    Renew(String),
    Verify(String, String),
    Download(String),
    Deploy(String),
}

#[derive(Default)]
pub struct FakeIssuance {
    pub orders: Vec<OrderSummary>,
    pub detail: Option<OrderDetail>,
    pub verify_accepted: bool,
    pub renew: Option<RenewOutcome>,
    pub calls: Mutex<Vec<IssuanceCall>>,
}

impl FakeIssuance {
    pub fn record(&self, call: IssuanceCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<IssuanceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, IssuanceCall::Verify(..)))
            .count()
    }
}

#[async_trait]
impl IssuanceApi for FakeIssuance {
    async fn account_info(&self) -> certhound_issuance::Result<AccountInfo> {
        Ok(AccountInfo {
            user_type: "normal".to_string(),
            email: String::new(),
            reg_time: String::new(),
            svip_end: String::new(),
            num_apply: 0,
            num_apply_success: 0,
            num_coin: 0,
        })
    }

    async fn order_list(&self) -> certhound_issuance::Result<Vec<OrderSummary>> {
        self.record(IssuanceCall::OrderList);
        Ok(self.orders.clone())
    }

    async fn apply(
        &self,
        _domains: &str,
        _algorithm: &str,
        _quick: bool,
        _ca: &str,
    ) -> certhound_issuance::Result<String> {
        Ok("applied-order".to_string())
    }

    async fn renew(&self, order_id: &str) -> certhound_issuance::Result<RenewOutcome> {
        self.record(IssuanceCall::Renew(order_id.to_string()));
        self.renew.clone().ok_or(certhound_issuance::Error::Api {
            code: 50,
            message: "renew unavailable".to_string(),
        })
    }

    async fn details(&self, order_id: &str) -> certhound_issuance::Result<OrderDetail> {
        self.record(IssuanceCall::Details(order_id.to_string()));
        self.detail.clone().ok_or(certhound_issuance::Error::Api {
            code: 50,
            message: "no such order".to_string(),
        })
    }

    async fn verify(&self, order_id: &str, set: &str) -> certhound_issuance::Result<bool> {
        self.record(IssuanceCall::Verify(order_id.to_string(), set.to_string()));
        Ok(self.verify_accepted)
    }

    async fn download(
        &self,
        order_id: &str,
        _archive_type: Option<&str>,
    ) -> certhound_issuance::Result<PathBuf> {
        self.record(IssuanceCall::Download(order_id.to_string()));
        Ok(PathBuf::from(format!("/tmp/{order_id}.zip")))
    }

    async fn deploy(
        &self,
        _zip_path: &Path,
        policy: &DomainPolicy,
    ) -> certhound_issuance::Result<()> {
        self.record(IssuanceCall::Deploy(policy.domain.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDns {
    pub record: Option<DnsRecord>,
    pub update_ok: bool,
    pub lookups: Mutex<Vec<(String, String)>>,
    pub updates: Mutex<Vec<(String, String)>>,
}

impl FakeDns {
    pub fn with_record(value: &str) -> Self {
        Self {
            record: Some(DnsRecord {
                record_id: 7,
                name: "_acme-challenge".to_string(),
                record_type: "TXT".to_string(),
                line: "默认".to_string(),
                ttl: 600,
                value: value.to_string(),
            }),
            update_ok: true,
            ..Self::default()
        }
    }

    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl DnsProvider for FakeDns {
    async fn lookup_record(
        &self,
        domain: &str,
        name: &str,
    ) -> certhound_dns::Result<Option<DnsRecord>> {
        self.lookups
            .lock()
            .unwrap()
            .push((domain.to_string(), name.to_string()));
        Ok(self.record.clone())
    }

    async fn update_record(
        &self,
        domain: &str,
        _record: &DnsRecord,
        value: &str,
    ) -> certhound_dns::Result<()> {
        if !self.update_ok {
            return Err(certhound_dns::Error::Api {
                code: "InvalidParameter".to_string(),
                message: "record rejected".to_string(),
            });
        }
        self.updates
            .lock()
            .unwrap()
            .push((domain.to_string(), value.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub messages: Mutex<Vec<(String, Severity)>>,
}

impl FakeNotifier {
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notify for FakeNotifier {
    async fn notify(&self, message: &str, severity: Severity) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }
}

pub fn policy(domain: &str) -> DomainPolicy {
    DomainPolicy {
        domain: domain.to_string(),
        ssl_deployment_path: PathBuf::from("/tmp/ssl").join(domain),
        apply_for_days_in_advance: 3,
        dns_provider: Some(DnsProviderKind::Qcloud),
        second_verification_method: None,
    }
}

pub fn http_policy(domain: &str) -> DomainPolicy {
    DomainPolicy {
        second_verification_method: Some(SecondVerificationMethod::Http),
        ..policy(domain)
    }
}

pub fn summary(order_id: &str, domain: &str) -> OrderSummary {
    OrderSummary {
        id: order_id.to_string(),
        domains: vec![domain.to_string()],
        status: String::new(),
        time_add: String::new(),
        time_end: String::new(),
    }
}

/// Provider-format timestamp a given number of days from now.
pub fn deadline_in_days(days: i64) -> String {
    (Local::now().naive_local() + chrono::Duration::days(days))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub struct Harness {
    pub issuance: Arc<FakeIssuance>,
    pub dns: Arc<FakeDns>,
    pub notifier: Arc<FakeNotifier>,
    pub orchestrator: RenewalOrchestrator,
    pub recheck_rx: mpsc::Receiver<RecheckRequest>,
}

impl Harness {
    pub fn new(
        issuance: FakeIssuance,
        dns: FakeDns,
        domains: Vec<DomainPolicy>,
        nginx: NginxConfig,
    ) -> Self {
        let issuance = Arc::new(issuance);
        let dns = Arc::new(dns);
        let notifier = Arc::new(FakeNotifier::default());
        let (handle, recheck_rx) = scheduler_channel();

        let orchestrator = RenewalOrchestrator::new(
            RenewalConfig {
                issuance: issuance.clone(),
                dns: Some(dns.clone()),
                notifier: notifier.clone(),
                domains,
                nginx,
            },
            handle,
        );

        Self {
            issuance,
            dns,
            notifier,
            orchestrator,
            recheck_rx,
        }
    }

    pub fn scheduled_recheck(&mut self) -> Option<RecheckRequest> {
        self.recheck_rx.try_recv().ok()
    }
}
