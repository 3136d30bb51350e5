use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("issuance API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("issuance API refused the request (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("failed to decode issuance API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("order {order_id} download returned {content_type:?}, not a certificate archive")]
    NotAnArchive {
        order_id: String,
        content_type: String,
    },

    #[error("daily request quota of {limit} exhausted for {user}")]
    DailyQuotaExceeded { user: String, limit: u32 },

    #[error("certificate archive extraction failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
