use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("DNS API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("DNS API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("failed to encode DNS API request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid signing key: {0}")]
    Signing(#[from] hmac::digest::InvalidLength),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
