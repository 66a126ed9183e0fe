use ecgview_lib::api::ErrorBody;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("server returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(#[from] io::Error),
    #[error("unexpected response body: {0}")]
    InvalidBody(serde_json::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("server rejected request: {0}")]
    Rejected(String),
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&body)
                    .ok()
                    .and_then(|b| b.describe())
                    .unwrap_or_else(|| body.trim().to_string());
                ApiError::Status { status, message }
            }
            ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
        }
    }
}
