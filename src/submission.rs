//! Submission pipeline shared by every create/edit form.
//!
//! One user submit runs: loading indicator on, build the multipart payload,
//! attach the optional asset, read the access token, send with bearer auth,
//! classify the outcome, loading indicator off. When the backend cannot be
//! reached the whole sequence runs once more before the failure surfaces.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::capabilities::{
    AssetError, AssetReference, AssetSource, Capabilities, HttpClient, HttpError, HttpMethod,
    HttpRequest, LoadingIndicator, TokenStore,
};
use crate::config::ClientConfig;
use crate::multipart::MultipartPayload;
use crate::validation::FormValues;
use crate::{ApiErrorResponse, AppError, ErrorKind};

/// Upper bound on automatic retries for one user submit.
pub const MAX_RETRIES_PER_SUBMIT: u32 = 1;

// ============================================================================
// Retry policy
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single()
    }
}

impl RetryPolicy {
    pub const fn single() -> Self {
        Self { max_retries: 1 }
    }

    pub const fn none() -> Self {
        Self { max_retries: 0 }
    }

    /// `retries_done` counts retries already issued for this submit.
    pub fn should_retry(&self, error: &SubmissionError, retries_done: u32) -> bool {
        retries_done < self.max_retries.min(MAX_RETRIES_PER_SUBMIT)
            && error.is_network_unreachable()
    }
}

// ============================================================================
// Request description and outcome
// ============================================================================

/// Multipart part carrying the picked image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPart {
    pub field_name: String,
    pub display_name: String,
}

impl AssetPart {
    pub fn new(field_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            display_name: display_name.into(),
        }
    }
}

/// Where and how a form is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTarget {
    pub method: HttpMethod,
    pub path: String,
    pub asset_part: Option<AssetPart>,
    pub duplicate_message: String,
}

impl SubmissionTarget {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            asset_part: None,
            duplicate_message: "This record already exists".into(),
        }
    }

    #[must_use]
    pub fn with_asset_part(mut self, part: AssetPart) -> Self {
        self.asset_part = Some(part);
        self
    }

    #[must_use]
    pub fn with_duplicate_message(mut self, message: impl Into<String>) -> Self {
        self.duplicate_message = message.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("backend unreachable: {message}")]
    NetworkUnreachable { message: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("duplicate entry: {message}")]
    DuplicateEntry { message: String },

    #[error("server error: HTTP {status}")]
    ServerError { status: u16, code: Option<String> },

    #[error("access token unavailable")]
    AuthMissing,

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("a submission is already in flight")]
    InFlight,
}

impl SubmissionError {
    pub fn is_network_unreachable(&self) -> bool {
        matches!(self, SubmissionError::NetworkUnreachable { .. })
    }

    fn from_transport(error: HttpError) -> Self {
        let message = error.to_string();
        if error.is_network_unreachable() {
            return SubmissionError::NetworkUnreachable { message };
        }
        match error {
            HttpError::Timeout { timeout_ms, .. } => SubmissionError::Timeout { timeout_ms },
            HttpError::InvalidUrl { .. }
            | HttpError::PrivateNetworkBlocked { .. }
            | HttpError::InvalidHeader { .. }
            | HttpError::TooManyHeaders { .. }
            | HttpError::BodyTooLarge { .. }
            | HttpError::InvalidRequest { .. }
            | HttpError::SerializationError { .. } => {
                SubmissionError::InvalidRequest { reason: message }
            }
            HttpError::DnsError { .. }
            | HttpError::ConnectionError { .. }
            | HttpError::InvalidResponse { .. } => SubmissionError::Transport { message },
        }
    }
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        let message = err.to_string();
        match err {
            SubmissionError::NetworkUnreachable { .. } | SubmissionError::Transport { .. } => {
                AppError::new(ErrorKind::Network, message)
            }
            SubmissionError::Timeout { .. } => AppError::new(ErrorKind::Timeout, message),
            SubmissionError::DuplicateEntry { message } => {
                AppError::new(ErrorKind::DuplicateEntry, message)
            }
            SubmissionError::ServerError { status, code } => {
                let err = AppError::new(ErrorKind::Server, message)
                    .with_context("http_status", status.to_string());
                match code {
                    Some(code) => err.with_context("server_code", code),
                    None => err,
                }
            }
            SubmissionError::AuthMissing => AppError::new(ErrorKind::AuthMissing, message),
            SubmissionError::InvalidRequest { .. } => AppError::new(ErrorKind::Internal, message),
            SubmissionError::Asset(AssetError::TooLarge { .. }) => {
                AppError::new(ErrorKind::AssetTooLarge, message)
            }
            SubmissionError::Asset(AssetError::UnsupportedFormat) => {
                AppError::new(ErrorKind::AssetFormatUnsupported, message)
            }
            SubmissionError::Asset(_) => AppError::new(ErrorKind::Asset, message),
            SubmissionError::InFlight => AppError::new(ErrorKind::InvalidState, message),
        }
    }
}

pub type SubmissionResult = Result<ServerResponse, SubmissionError>;

// ============================================================================
// Pipeline
// ============================================================================

/// Marks the pipeline busy and keeps the loading indicator up for as long
/// as it lives.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    loading: &'a dyn LoadingIndicator,
}

impl<'a> InFlightGuard<'a> {
    fn enter(flag: &'a AtomicBool, loading: &'a dyn LoadingIndicator) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        loading.show();
        Some(Self { flag, loading })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.loading.hide();
        self.flag.store(false, Ordering::Release);
    }
}

pub struct SubmissionPipeline {
    http: Arc<dyn HttpClient>,
    tokens: TokenStore,
    assets: Arc<dyn AssetSource>,
    loading: Arc<dyn LoadingIndicator>,
    config: ClientConfig,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("config", &self.config)
            .field("in_flight", &self.is_in_flight())
            .finish_non_exhaustive()
    }
}

impl SubmissionPipeline {
    pub fn new(caps: &Capabilities, config: ClientConfig) -> Self {
        Self {
            http: caps.http.clone(),
            tokens: caps.tokens.clone(),
            assets: caps.assets.clone(),
            loading: caps.loading.clone(),
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    /// Sends `values` (and the optional asset) to `target`.
    ///
    /// A second call while one is running fails with
    /// [`SubmissionError::InFlight`] without touching the network or the
    /// loading indicator.
    #[instrument(skip(self, values, asset), fields(
        method = %target.method,
        path = %target.path,
        fields = values.len(),
        has_asset = asset.is_some(),
    ))]
    pub async fn submit(
        &self,
        target: &SubmissionTarget,
        values: &FormValues,
        asset: Option<&AssetReference>,
    ) -> SubmissionResult {
        let Some(_guard) = InFlightGuard::enter(&self.in_flight, self.loading.as_ref()) else {
            warn!("submission rejected: another one is in flight");
            return Err(SubmissionError::InFlight);
        };

        let policy = self.config.retry;
        let mut retries = 0;
        loop {
            match self.attempt(target, values, asset).await {
                Ok(response) => {
                    info!(status = response.status, retries, "submission succeeded");
                    return Ok(response);
                }
                Err(err) if policy.should_retry(&err, retries) => {
                    retries += 1;
                    warn!(error = %err, retries, "backend unreachable, retrying submission");
                }
                Err(err) => {
                    error!(error = %err, retries, "submission failed");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        target: &SubmissionTarget,
        values: &FormValues,
        asset: Option<&AssetReference>,
    ) -> SubmissionResult {
        let payload = self.build_payload(target, values, asset).await?;

        let token = self.tokens.retrieve().await.map_err(|e| {
            warn!(error = %e, "access token unavailable");
            SubmissionError::AuthMissing
        })?;

        let url = self
            .config
            .endpoint(&target.path)
            .map_err(SubmissionError::from_transport)?;

        let request = HttpRequest::new(target.method, url)
            .with_header("Accept", "application/json")
            .and_then(|r| r.with_bearer(token.expose_secret()))
            .and_then(|r| r.with_timeout(Duration::from_millis(self.config.timeout_ms)))
            .and_then(|r| r.with_multipart(payload))
            .map_err(SubmissionError::from_transport)?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(SubmissionError::from_transport)?;

        if response.is_success() {
            return Ok(ServerResponse {
                status: response.status(),
                body: response.json_or_null(),
            });
        }

        let api_error = ApiErrorResponse::parse(response.body());
        if api_error.as_ref().is_some_and(ApiErrorResponse::is_duplicate_entry) {
            return Err(SubmissionError::DuplicateEntry {
                message: target.duplicate_message.clone(),
            });
        }

        Err(SubmissionError::ServerError {
            status: response.status(),
            code: api_error.and_then(|e| e.code),
        })
    }

    async fn build_payload(
        &self,
        target: &SubmissionTarget,
        values: &FormValues,
        asset: Option<&AssetReference>,
    ) -> Result<MultipartPayload, SubmissionError> {
        let mut payload = MultipartPayload::new();

        if let (Some(part), Some(asset)) = (&target.asset_part, asset) {
            let loaded = self.assets.load(asset).await?;
            payload.push_binary(
                part.field_name.clone(),
                loaded.bytes,
                part.display_name.clone(),
                loaded.mime_type,
            );
        } else if asset.is_some() {
            warn!("form has no asset part, dropping attached asset");
        }

        for (name, value) in values.iter() {
            payload.push_text(name, &value.to_payload_text());
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::http::ContentType;
    use crate::capabilities::testing::{mock_capabilities, ScriptedHttpClient, TestCapabilities};
    use crate::validation::{FieldValue, PickerSelection};
    use serde_json::json;

    fn employee_target() -> SubmissionTarget {
        SubmissionTarget::new(HttpMethod::Post, "/users/employee")
            .with_asset_part(AssetPart::new("avatar", "emp-avatar"))
            .with_duplicate_message("Duplicate user name")
    }

    fn employee_values() -> FormValues {
        FormValues::new()
            .with_text("user_name", " lan.nguyen ")
            .with_text("password", "Secret123")
            .with_text("phone_num", "")
            .with_text("address", "   ")
            .with("gender", FieldValue::Choice(PickerSelection::new("1", 0)))
    }

    async fn setup(http: ScriptedHttpClient, with_token: bool) -> (TestCapabilities, SubmissionPipeline) {
        let test = mock_capabilities(http, with_token).await;
        let pipeline = SubmissionPipeline::new(&test.caps, ClientConfig::default());
        (test, pipeline)
    }

    #[tokio::test]
    async fn test_success_sends_one_authorized_multipart_request() {
        let http = ScriptedHttpClient::new();
        http.push_json(201, json!({"user_id": 7}));
        let (test, pipeline) = setup(http, true).await;

        let result = pipeline
            .submit(&employee_target(), &employee_values(), None)
            .await
            .unwrap();
        assert_eq!(result.status, 201);
        assert_eq!(result.body["user_id"], 7);

        let requests = test.http.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method(), HttpMethod::Post);
        assert_eq!(request.url().as_str(), "http://10.0.2.2:5000/users/employee");
        assert_eq!(request.headers().get("Authorization"), Some("Bearer test-token"));
        assert_eq!(request.headers().get("Accept"), Some("application/json"));
        assert_eq!(request.content_type(), Some(ContentType::Multipart));

        let payload = request.body().multipart().unwrap();
        assert_eq!(payload.text_value("user_name"), Some("lan.nguyen"));
        assert_eq!(payload.text_value("gender"), Some("1"));
        assert!(!payload.contains("phone_num"));
        assert!(!payload.contains("address"));
        assert!(!payload.contains("avatar"));

        assert_eq!(test.loading.shows(), 1);
        assert_eq!(test.loading.hides(), 1);
        assert!(!pipeline.is_in_flight());
    }

    #[tokio::test]
    async fn test_asset_is_attached_with_fixed_display_name() {
        let (test, pipeline) = setup(ScriptedHttpClient::new(), true).await;
        let asset = AssetReference::new("file:///tmp/a.jpg").with_mime_type("image/jpeg");

        pipeline
            .submit(&employee_target(), &employee_values(), Some(&asset))
            .await
            .unwrap();

        let requests = test.http.requests();
        let payload = requests[0].body().multipart().unwrap();
        let (_, file_name, mime) = payload.binary("avatar").unwrap();
        assert_eq!(file_name, "emp-avatar");
        assert_eq!(mime, "image/jpeg");
    }

    #[tokio::test]
    async fn test_network_unreachable_then_success_retries_once() {
        let http = ScriptedHttpClient::new();
        http.push_unreachable().push_json(200, json!({"ok": true}));
        let (test, pipeline) = setup(http, true).await;

        let result = pipeline
            .submit(&employee_target(), &employee_values(), None)
            .await;
        assert!(result.is_ok());
        assert_eq!(test.http.request_count(), 2);
        assert_eq!(test.loading.shows(), 1);
        assert_eq!(test.loading.hides(), 1);
    }

    #[tokio::test]
    async fn test_network_unreachable_twice_surfaces_failure() {
        let http = ScriptedHttpClient::new();
        http.push_unreachable().push_unreachable().push_unreachable();
        let (test, pipeline) = setup(http, true).await;

        let result = pipeline
            .submit(&employee_target(), &employee_values(), None)
            .await;
        assert!(matches!(
            result,
            Err(SubmissionError::NetworkUnreachable { .. })
        ));
        assert_eq!(test.http.request_count(), 2);
        assert_eq!(test.loading.shows(), 1);
        assert_eq!(test.loading.hides(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_entry_is_not_retried() {
        let http = ScriptedHttpClient::new();
        http.push_json(500, json!({"code": "ER_DUP_ENTRY", "errno": 1062}));
        let (test, pipeline) = setup(http, true).await;

        let result = pipeline
            .submit(&employee_target(), &employee_values(), None)
            .await;
        assert_eq!(
            result,
            Err(SubmissionError::DuplicateEntry {
                message: "Duplicate user name".into()
            })
        );
        assert_eq!(test.http.request_count(), 1);
    }

    #[tokio::test]
    async fn test_other_server_errors_are_generic() {
        let http = ScriptedHttpClient::new();
        http.push_json(500, json!({"code": "ER_BAD_NULL_ERROR"}));
        let (test, pipeline) = setup(http, true).await;

        let result = pipeline
            .submit(&employee_target(), &employee_values(), None)
            .await;
        assert_eq!(
            result,
            Err(SubmissionError::ServerError {
                status: 500,
                code: Some("ER_BAD_NULL_ERROR".into())
            })
        );
        assert_eq!(test.http.request_count(), 1);

        let app_error = AppError::from(result.unwrap_err());
        assert_eq!(app_error.kind, ErrorKind::Server);
    }

    #[tokio::test]
    async fn test_timeout_is_not_treated_as_unreachable() {
        let http = ScriptedHttpClient::new();
        http.push(Err(HttpError::Timeout {
            timeout_ms: 30_000,
            request_id: "r".into(),
        }));
        let (test, pipeline) = setup(http, true).await;

        let result = pipeline
            .submit(&employee_target(), &employee_values(), None)
            .await;
        assert_eq!(result, Err(SubmissionError::Timeout { timeout_ms: 30_000 }));
        assert_eq!(test.http.request_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let (test, pipeline) = setup(ScriptedHttpClient::new(), false).await;

        let result = pipeline
            .submit(&employee_target(), &employee_values(), None)
            .await;
        assert_eq!(result, Err(SubmissionError::AuthMissing));
        assert_eq!(test.http.request_count(), 0);
        assert_eq!(test.loading.shows(), 1);
        assert_eq!(test.loading.hides(), 1);
    }

    #[tokio::test]
    async fn test_retry_policy_none_disables_retry() {
        let http = ScriptedHttpClient::new();
        http.push_unreachable().push_json(200, json!({}));
        let test = mock_capabilities(http, true).await;
        let config = ClientConfig {
            retry: RetryPolicy::none(),
            ..ClientConfig::default()
        };
        let pipeline = SubmissionPipeline::new(&test.caps, config);

        let result = pipeline
            .submit(&employee_target(), &employee_values(), None)
            .await;
        assert!(matches!(
            result,
            Err(SubmissionError::NetworkUnreachable { .. })
        ));
        assert_eq!(test.http.request_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let http = ScriptedHttpClient::gated(gate.clone());
        let (test, pipeline) = setup(http, true).await;
        let target = employee_target();
        let values = employee_values();

        let first = pipeline.submit(&target, &values, None);
        let second = async {
            tokio::task::yield_now().await;
            let result = pipeline.submit(&target, &values, None).await;
            gate.add_permits(1);
            result
        };

        let (first, second) = tokio::join!(first, second);
        assert!(first.is_ok());
        assert_eq!(second, Err(SubmissionError::InFlight));
        assert_eq!(test.http.request_count(), 1);
        assert_eq!(test.loading.shows(), 1);
        assert_eq!(test.loading.hides(), 1);
    }

    #[test]
    fn test_retry_policy_is_capped_at_one() {
        let unreachable = SubmissionError::NetworkUnreachable {
            message: "down".into(),
        };
        let generous = RetryPolicy { max_retries: 5 };
        assert!(generous.should_retry(&unreachable, 0));
        assert!(!generous.should_retry(&unreachable, 1));
        assert!(!RetryPolicy::single().should_retry(&SubmissionError::AuthMissing, 0));
    }
}
