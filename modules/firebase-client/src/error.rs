use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirebaseError>;

#[derive(Debug, Error)]
pub enum FirebaseError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Response for {0} carried no ETag header")]
    MissingEtag(String),
}

impl From<reqwest::Error> for FirebaseError {
    fn from(err: reqwest::Error) -> Self {
        FirebaseError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FirebaseError {
    fn from(err: serde_json::Error) -> Self {
        FirebaseError::Parse(err.to_string())
    }
}
