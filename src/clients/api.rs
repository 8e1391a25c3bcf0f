use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ClientError;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Body of `GET /comparison-data`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComparisonData {
    pub current_balance: f64,
    pub currency: String,
    #[serde(default)]
    pub median_12m: Option<f64>,
    #[serde(default)]
    pub average_24m: Option<f64>,
    #[serde(default)]
    pub historical_data_available: bool,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub day_of_month: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub bank_connected: bool,
    #[serde(default)]
    pub account_uid: Option<String>,
    #[serde(default)]
    pub has_accounts: Option<bool>,
}

/// Main dashboard `/callback` contract.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CallbackResponse {
    #[serde(default)]
    pub account_uids: Vec<String>,
}

/// `/callback` as the debug front-end reads it. Versioned independently
/// of [`CallbackResponse`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DebugCallbackResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub accounts: Vec<DebugAccount>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DebugAccount {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
}

impl DebugAccount {
    pub fn id(&self) -> Option<&str> {
        self.account_id.as_deref().or(self.uid.as_deref())
    }
}

/// Outcome of `POST /verify-pin`. Rejections are outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PinVerification {
    Verified { session_token: Option<String> },
    Locked { remaining_seconds: u32, detail: String },
    Rejected { detail: String, attempts_left: Option<u32> },
}

#[derive(Debug, Default, Deserialize)]
struct VerifyPinBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    remaining_seconds: Option<u32>,
    #[serde(default)]
    attempts_left: Option<u32>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    session_token: Option<String>,
}

impl From<VerifyPinBody> for PinVerification {
    fn from(body: VerifyPinBody) -> Self {
        if body.success {
            return PinVerification::Verified {
                session_token: body.session_token,
            };
        }

        let detail = body.detail.unwrap_or_else(|| "Incorrect PIN".to_string());
        if body.locked {
            PinVerification::Locked {
                remaining_seconds: body.remaining_seconds.unwrap_or(0),
                detail,
            }
        } else {
            PinVerification::Rejected {
                detail,
                attempts_left: body.attempts_left,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartAuthBody {
    #[serde(default)]
    auth_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyPinRequest<'a> {
    pin: &'a str,
}

/// The HTTP surface the screens depend on.
#[async_trait]
pub trait DaybalApi: Send + Sync {
    async fn health(&self) -> Result<Value>;
    async fn start_auth(&self) -> Result<String>;
    async fn exchange_code(&self, code: &str) -> Result<CallbackResponse>;
    async fn verify_pin(&self, pin: &str) -> Result<PinVerification>;
    async fn session_status(&self) -> Result<SessionStatus>;
    async fn comparison_data(&self, account_uid: Option<&str>) -> Result<ComparisonData>;
}

/// Raw endpoints used by `daybal debug`. `/callback` is read with its debug
/// contract here.
#[async_trait]
pub trait DebugApi: Send + Sync {
    async fn health(&self) -> Result<Value>;
    async fn start_auth_raw(&self) -> Result<Value>;
    async fn exchange_code_debug(&self, code: &str) -> Result<DebugCallbackResponse>;
    async fn session_status_raw(&self) -> Result<Value>;
    async fn accounts(&self) -> Result<Value>;
    /// Raw provider balance object for one account.
    async fn balance(&self, account_id: &str) -> Result<Value>;
}

pub struct HttpApiClient {
    client: Client,
    config: Config,
}

impl HttpApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.get_url(self.config.endpoint(path), query).await
    }

    async fn get_url<T: DeserializeOwned>(&self, url: String, query: &[(&str, &str)]) -> Result<T> {
        debug!(%url, "GET");

        let response = self.client.get(&url).query(query).send().await.map_err(|e| {
            warn!(%url, error = %e, "request failed");
            e
        })?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        decode_response(status, &body).inspect_err(|e| warn!(%url, status, error = %e, "API error"))
    }
}

#[async_trait]
impl DaybalApi for HttpApiClient {
    async fn health(&self) -> Result<Value> {
        self.get("health", &[]).await
    }

    async fn start_auth(&self) -> Result<String> {
        let body: StartAuthBody = self.get("start-auth", &[]).await?;
        body.auth_url
            .filter(|url| !url.is_empty())
            .ok_or(ClientError::MissingField("auth_url"))
    }

    async fn exchange_code(&self, code: &str) -> Result<CallbackResponse> {
        self.get("callback", &[("code", code)]).await
    }

    async fn verify_pin(&self, pin: &str) -> Result<PinVerification> {
        let url = self.config.endpoint("verify-pin");
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .json(&VerifyPinRequest { pin })
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "request failed");
                e
            })?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        decode_pin_verification(status, &body).inspect_err(|e| warn!(%url, status, error = %e, "API error"))
    }

    async fn session_status(&self) -> Result<SessionStatus> {
        self.get("session-status", &[]).await
    }

    async fn comparison_data(&self, account_uid: Option<&str>) -> Result<ComparisonData> {
        match account_uid {
            Some(uid) => self.get("comparison-data", &[("account_uid", uid)]).await,
            None => self.get("comparison-data", &[]).await,
        }
    }
}

#[async_trait]
impl DebugApi for HttpApiClient {
    async fn health(&self) -> Result<Value> {
        DaybalApi::health(self).await
    }

    async fn start_auth_raw(&self) -> Result<Value> {
        self.get("start-auth", &[]).await
    }

    async fn exchange_code_debug(&self, code: &str) -> Result<DebugCallbackResponse> {
        self.get("callback", &[("code", code)]).await
    }

    async fn session_status_raw(&self) -> Result<Value> {
        self.get("session-status", &[]).await
    }

    async fn accounts(&self) -> Result<Value> {
        self.get("accounts", &[]).await
    }

    async fn balance(&self, account_id: &str) -> Result<Value> {
        let url = segment_endpoint(&self.config, "balance", account_id)?;
        self.get_url(url, &[]).await
    }
}

/// `path` under the API base with `segment` appended as one escaped path
/// segment, so ids containing `/`, `?` or `#` stay inside it.
pub fn segment_endpoint(config: &Config, path: &str, segment: &str) -> Result<String> {
    let endpoint = config.endpoint(path);
    let mut url = Url::parse(&endpoint).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidUrl(endpoint.clone()))?
        .pop_if_empty()
        .push(segment);
    Ok(url.into())
}

/// Turn a status code and body into either the typed success shape or the
/// matching [`ClientError`].
pub fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) if is_success(status) => return Err(ClientError::Decode(e)),
        Err(_) => {
            return Err(ClientError::Api {
                status: Some(status),
                detail: body.trim().to_string(),
            });
        }
    };

    if value.get("error").and_then(Value::as_bool) == Some(true) {
        let status = value
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .or_else(|| (!is_success(status)).then_some(status));
        return Err(ClientError::Api {
            status,
            detail: detail_of(&value),
        });
    }

    if !is_success(status) {
        return Err(ClientError::Api {
            status: Some(status),
            detail: detail_of(&value),
        });
    }

    Ok(serde_json::from_value(value)?)
}

/// `/verify-pin` reports rejections with `error: true`, so it cannot go
/// through [`decode_response`].
pub fn decode_pin_verification(status: u16, body: &str) -> Result<PinVerification> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        if is_success(status) {
            ClientError::Decode(e)
        } else {
            ClientError::Api {
                status: Some(status),
                detail: body.trim().to_string(),
            }
        }
    })?;

    if !is_success(status) {
        return Err(ClientError::Api {
            status: Some(status),
            detail: detail_of(&value),
        });
    }

    let body: VerifyPinBody = serde_json::from_value(value)?;
    Ok(body.into())
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn detail_of(value: &Value) -> String {
    match value.get("detail") {
        Some(Value::String(detail)) => detail.clone(),
        Some(other) => other.to_string(),
        None => value.to_string(),
    }
}
