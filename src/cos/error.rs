//! Error types for COS operations
//!
//! Errors fall into four groups:
//!
//! - transport failures (DNS, connect, read/write, timeouts) carried by
//!   [`CosError::Transport`]
//! - service errors, i.e. non-2xx responses decoded into [`ServiceError`]
//! - local failures (bad endpoint, XML encoding, missing ETag, bad arguments)
//! - [`CosError::AttemptsExhausted`] when a retry loop ends without any result
//!
//! [`CosError::is_retryable`] decides which of these an attempt loop may retry.

use super::credentials::CredentialsError;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Service error codes that are worth another attempt
pub const RETRYABLE_CODES: [&str; 4] = ["InternalError", "NoSuchUpload", "NoSuchBucket", "PathConflict"];

/// Client errors
#[derive(Error, Debug)]
pub enum CosError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{method} request failed: {source}")]
    Transport {
        method: Method,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("XML decode error: {0}")]
    XmlDecode(#[from] quick_xml::de::DeError),

    #[error("XML encode error: {0}")]
    XmlEncode(#[from] quick_xml::se::SeError),

    #[error("bad COS endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("bad COS request URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("part upload succeeded with no ETag")]
    MissingETag,

    #[error("listing truncated without advancing its marker {marker:?}")]
    StalledListing { marker: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("no attempt left to run the request")]
    AttemptsExhausted,
}

impl CosError {
    /// Wrap a transport error together with the verb it happened on
    pub(crate) fn transport(method: &Method, source: reqwest::Error) -> Self {
        CosError::Transport {
            method: method.clone(),
            source,
        }
    }

    /// Whether an attempt loop should try again after this error.
    ///
    /// Timeouts are retried for every verb. Other transport failures are only
    /// retried for GET, PUT, DELETE and HEAD since POST is not idempotent.
    /// Service errors are retried for [`RETRYABLE_CODES`] only. Local I/O
    /// failures, such as a short caller reader, are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            CosError::Service(err) => err.is_retryable(),
            CosError::Transport { method, source } => transport_retryable(method, source),
            _ => false,
        }
    }

    /// Whether this is a service error carrying `code`
    pub fn has_code(&self, code: &str) -> bool {
        matches!(self, CosError::Service(err) if err.code == code)
    }

    /// Whether the service reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            CosError::Service(err) => {
                err.status_code == StatusCode::NOT_FOUND.as_u16() || err.code == "NoSuchKey"
            }
            _ => false,
        }
    }

    /// The decoded service error, if this is one
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            CosError::Service(err) => Some(err),
            _ => None,
        }
    }
}

/// Error returned by the service in a non-2xx response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ServiceError {
    /// HTTP status code (200, 403, ...)
    #[serde(skip)]
    pub status_code: u16,
    /// Service error code ("NoSuchKey", "InternalError", ...)
    pub code: String,
    /// Human readable message, the HTTP status line when the body has none
    pub message: String,
    pub resource: String,
    pub request_id: String,
    pub trace_id: String,
}

impl ServiceError {
    /// Build from a response status and its (possibly empty) XML body
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let mut err = std::str::from_utf8(body)
            .ok()
            .filter(|text| !text.trim().is_empty())
            .and_then(|text| quick_xml::de::from_str::<ServiceError>(text).ok())
            .unwrap_or_default();
        err.status_code = status.as_u16();
        if err.message.is_empty() {
            err.message = status_line(status);
        }
        err
    }

    pub fn is_retryable(&self) -> bool {
        RETRYABLE_CODES.contains(&self.code.as_str())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "qcloud API Error: RequestId: {} Status Code: {} Code: {} Message: {}",
            self.request_id, self.status_code, self.code, self.message
        )
    }
}

impl StdError for ServiceError {}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

pub(crate) fn is_idempotent(method: &Method) -> bool {
    *method == Method::GET || *method == Method::PUT || *method == Method::DELETE || *method == Method::HEAD
}

fn transport_retryable(method: &Method, err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return true;
    }
    if !is_idempotent(method) {
        return false;
    }
    if err.is_connect() || err.is_body() || err.is_request() || err.is_decode() {
        return true;
    }
    source_io_kind(err).is_some_and(io_retryable)
}

fn io_retryable(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

fn source_io_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current = err.source();
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = cause.source();
    }
    None
}
