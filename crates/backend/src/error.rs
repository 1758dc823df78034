use url::Url;

/// Failures talking to the order backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Invalid JSON in {action} response: {source}")]
    MalformedBody {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Order rejected by backend (400): {body}")]
    Rejected { body: String },
    #[error("{action} failed with status: {status}, body: {body}")]
    UnexpectedStatus {
        action: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Base URL cannot carry path segments: {0}")]
    InvalidBaseUrl(Url),
    #[error("Backend unavailable: {message}")]
    Unavailable { message: String },
}
