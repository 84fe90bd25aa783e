// lib.rs - Shared core for the library management mobile client

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;
pub mod multipart;
pub mod resources;
pub mod screens;
pub mod submission;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::Capabilities;
pub use config::ClientConfig;
pub use event::Event;
pub use model::{Model, ViewModel};
pub use submission::{RetryPolicy, SubmissionError, SubmissionPipeline, SubmissionResult};

pub const DEFAULT_BASE_URL: &str = "http://10.0.2.2:5000";
pub const ACCESS_TOKEN_KEY: &str = "ACCESS_TOKEN";
pub const DUPLICATE_ENTRY_CODE: &str = "ER_DUP_ENTRY";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const MAX_ASSET_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    AuthMissing,
    Validation,
    DuplicateEntry,
    Server,
    NotFound,
    Storage,
    Serialization,
    Asset,
    AssetTooLarge,
    AssetFormatUnsupported,
    Configuration,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::AuthMissing => "AUTH_MISSING",
            Self::Validation => "VALIDATION_ERROR",
            Self::DuplicateEntry => "DUPLICATE_ENTRY",
            Self::Server => "SERVER_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Asset => "ASSET_ERROR",
            Self::AssetTooLarge => "ASSET_TOO_LARGE",
            Self::AssetFormatUnsupported => "ASSET_FORMAT_UNSUPPORTED",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Storage => ErrorSeverity::Transient,

            Self::Serialization | Self::Configuration | Self::Internal | Self::InvalidState => {
                ErrorSeverity::Fatal
            }

            Self::AuthMissing
            | Self::Validation
            | Self::DuplicateEntry
            | Self::Server
            | Self::NotFound
            | Self::Asset
            | Self::AssetTooLarge
            | Self::AssetFormatUnsupported
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Storage)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    /// Text shown in the result modal.
    ///
    /// `AuthMissing` shares the generic failure text.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Validation | ErrorKind::DuplicateEntry => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Storage => "Unable to read local data. Please try again.".into(),
            ErrorKind::Asset => "Unable to read the selected image. Please pick another one.".into(),
            ErrorKind::AssetTooLarge => format!(
                "The image is too large. Please use an image smaller than {} MB.",
                MAX_ASSET_BYTES / 1_000_000
            ),
            ErrorKind::AssetFormatUnsupported => {
                "This image format is not supported. Please use JPEG, PNG, or WebP.".into()
            }
            ErrorKind::AuthMissing
            | ErrorKind::Server
            | ErrorKind::Serialization
            | ErrorKind::Configuration
            | ErrorKind::InvalidState
            | ErrorKind::Internal
            | ErrorKind::Unknown => "Something went wrong. Please try again.".into(),
        }
    }

    /// Classify a non-2xx backend response.
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let parsed = body.and_then(ApiErrorResponse::parse);

        if parsed
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .is_some_and(|code| code == DUPLICATE_ENTRY_CODE)
        {
            return Self::new(ErrorKind::DuplicateEntry, "This record already exists")
                .with_context("http_status", status.to_string());
        }

        let kind = match status {
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            _ => ErrorKind::Server,
        };

        let message = parsed
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::new(kind, message).with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// Error body returned by the backend, e.g. `{"code": "ER_DUP_ENTRY"}`.
///
/// Only string `code` and `message` fields are read; anything else in the
/// object is ignored whatever its type.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ApiErrorResponse {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl ApiErrorResponse {
    /// `None` unless the body is a JSON object.
    #[must_use]
    pub fn parse(body: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        let object = value.as_object()?;
        let text = |key: &str| {
            object
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };
        Some(Self {
            code: text("code"),
            message: text("message"),
        })
    }

    #[must_use]
    pub fn is_duplicate_entry(&self) -> bool {
        self.code.as_deref() == Some(DUPLICATE_ENTRY_CODE)
    }
}

impl From<capabilities::HttpError> for AppError {
    fn from(err: capabilities::HttpError) -> Self {
        use capabilities::HttpError;
        let kind = match &err {
            HttpError::Timeout { .. } => ErrorKind::Timeout,
            e if e.is_network_unreachable() => ErrorKind::Network,
            HttpError::InvalidResponse { .. } => ErrorKind::Server,
            HttpError::SerializationError { .. } => ErrorKind::Serialization,
            _ => ErrorKind::Internal,
        };
        let request_id = err.request_id().map(str::to_string);
        let app = Self::new(kind, err.to_string());
        match request_id {
            Some(id) => app.with_context("request_id", id),
            None => app,
        }
    }
}

impl From<capabilities::KvError> for AppError {
    fn from(err: capabilities::KvError) -> Self {
        use capabilities::KvError;
        let kind = match &err {
            KvError::NotFound { .. } => ErrorKind::NotFound,
            KvError::Serialization { .. } => ErrorKind::Serialization,
            KvError::InvalidKey { .. } | KvError::ValueTooLarge { .. } => ErrorKind::Internal,
            KvError::Storage { .. } => ErrorKind::Storage,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<capabilities::AssetError> for AppError {
    fn from(err: capabilities::AssetError) -> Self {
        use capabilities::AssetError;
        let kind = match &err {
            AssetError::TooLarge { .. } => ErrorKind::AssetTooLarge,
            AssetError::UnsupportedFormat => ErrorKind::AssetFormatUnsupported,
            _ => ErrorKind::Asset,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::new(ErrorKind::Configuration, err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes_are_stable() {
        assert_eq!(ErrorKind::DuplicateEntry.code(), "DUPLICATE_ENTRY");
        assert_eq!(ErrorKind::AuthMissing.code(), "AUTH_MISSING");
        assert_eq!(ErrorKind::Network.code(), "NETWORK_ERROR");
    }

    #[test]
    fn test_only_transport_and_storage_kinds_are_retryable() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::DuplicateEntry.is_retryable());
        assert!(!ErrorKind::Server.is_retryable());
        assert!(!ErrorKind::AuthMissing.is_retryable());
    }

    #[test]
    fn test_fatal_severity_blocks_retry() {
        let err = AppError::new(ErrorKind::Network, "down").with_severity(ErrorSeverity::Fatal);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_duplicate_code_maps_to_duplicate_entry() {
        let body = br#"{"code":"ER_DUP_ENTRY","message":"Duplicate entry 'alice'"}"#;
        let err = AppError::from_http_status(500, Some(body));
        assert_eq!(err.kind, ErrorKind::DuplicateEntry);
        assert_eq!(err.context.get("http_status").map(String::as_str), Some("500"));
    }

    #[test]
    fn test_other_server_errors_are_generic() {
        let body = br#"{"code":"ER_BAD_FIELD_ERROR"}"#;
        let err = AppError::from_http_status(500, Some(body));
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "HTTP error: 500");

        let err = AppError::from_http_status(404, None);
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_auth_missing_shares_generic_message() {
        let auth = AppError::new(ErrorKind::AuthMissing, "no token");
        let server = AppError::new(ErrorKind::Server, "boom");
        assert_eq!(auth.user_facing_message(), server.user_facing_message());
    }

    #[test]
    fn test_duplicate_entry_uses_its_own_message() {
        let err = AppError::new(ErrorKind::DuplicateEntry, "Duplicate user name");
        assert_eq!(err.user_facing_message(), "Duplicate user name");
    }

    #[test]
    fn test_display_includes_internal_message() {
        let err = AppError::new(ErrorKind::Server, "boom").with_internal("stack");
        assert_eq!(err.to_string(), "[SERVER_ERROR] boom (internal: stack)");
    }

    #[test]
    fn test_capability_errors_convert() {
        let err: AppError = capabilities::HttpError::ConnectionError {
            host: "10.0.2.2".into(),
            message: "refused".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.is_retryable());

        let err: AppError = capabilities::HttpError::Timeout {
            timeout_ms: 10,
            request_id: "req-9".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.context.get("request_id").map(String::as_str), Some("req-9"));

        let err: AppError = capabilities::AssetError::UnsupportedFormat.into();
        assert_eq!(err.kind, ErrorKind::AssetFormatUnsupported);

        let err: AppError = capabilities::KvError::NotFound { key: "k".into() }.into();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_api_error_response_parses_partial_bodies() {
        let parsed = ApiErrorResponse::parse(br#"{"code":"ER_DUP_ENTRY"}"#).unwrap();
        assert!(parsed.is_duplicate_entry());
        assert!(ApiErrorResponse::parse(b"not json").is_none());
        let empty = ApiErrorResponse::parse(b"{}").unwrap();
        assert!(!empty.is_duplicate_entry());
        assert!(ApiErrorResponse::parse(b"[]").is_none());
    }

    #[test]
    fn test_duplicate_code_survives_structured_fields() {
        let body = br#"{"code":"ER_DUP_ENTRY","errno":1062,"message":{"sql":"INSERT INTO users"}}"#;
        let parsed = ApiErrorResponse::parse(body).unwrap();
        assert!(parsed.is_duplicate_entry());
        assert_eq!(parsed.message, None);

        let err = AppError::from_http_status(500, Some(body));
        assert_eq!(err.kind, ErrorKind::DuplicateEntry);

        let numeric = ApiErrorResponse::parse(br#"{"code":1062,"message":"dup"}"#).unwrap();
        assert_eq!(numeric.code, None);
        assert_eq!(numeric.message.as_deref(), Some("dup"));
    }
}
