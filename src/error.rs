use thiserror::Error;

/// Failures talking to the daybal API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (DNS, refused, timeout...).
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with `{error: true, detail}` or a non-2xx status.
    #[error("{}", crate::formatter::format_api_error(.status.clone(), .detail))]
    Api { status: Option<u16>, detail: String },

    #[error("Unexpected response from server: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No {} received", missing_field_label(.0))]
    MissingField(&'static str),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Text suitable for a one-line status message.
    pub fn detail(&self) -> String {
        match self {
            ClientError::Api { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

fn missing_field_label(field: &str) -> &str {
    match field {
        "auth_url" => "auth URL",
        other => other,
    }
}

/// Failures reading or writing the persisted account identifier.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session store lock poisoned")]
    Poisoned,
}
