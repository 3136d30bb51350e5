use crate::Result;
use async_trait::async_trait;

/// Record-mutation surface the challenge resolver needs: find the
/// ownership-proof record, then point it at a new value.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn lookup_record(&self, domain: &str, name: &str) -> Result<Option<DnsRecord>>;

    async fn update_record(&self, domain: &str, record: &DnsRecord, value: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DnsRecord {
    pub record_id: u64,
    pub name: String,
    pub record_type: String,
    pub line: String,
    pub ttl: u32,
    pub value: String,
}
