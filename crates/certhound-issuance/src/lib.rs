mod client;
mod deploy;
mod error;
mod limiter;
mod types;

pub use client::{IssuanceApi, IssuanceClient};
pub use error::{Error, Result};
pub use limiter::RequestLimiter;
pub use types::{
    AccountInfo, ApiEnvelope, DNS_METHOD, HTTP_METHOD, MethodDetail, OrderDetail, OrderListPage,
    OrderStatus, OrderSummary, RenewOutcome, VerificationChallenge,
};
