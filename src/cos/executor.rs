//! Request executor
//!
//! Turns a [`SignedRequest`] into an HTTP exchange, maps non-success statuses
//! to [`ServiceError`] and drives the attempt loop for retried operations.

use super::client::Client;
use super::error::{CosError, ServiceError};
use super::request::{PendingRequest, SignMode, SignedRequest};
use crate::metrics;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Instant;

/// Statuses treated as success. Everything else is decoded as a [`ServiceError`].
pub fn is_success(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 204 | 206)
}

/// A completed response with its body read in full
#[derive(Debug, Clone)]
pub struct CosResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CosResponse {
    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Content-Length` of the response, if the server sent one
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Decode the XML body
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CosError> {
        Ok(quick_xml::de::from_reader(self.body.as_ref())?)
    }
}

/// Send one signed request. Non-success statuses become [`CosError::Service`].
pub(crate) async fn execute(client: &Client, request: SignedRequest) -> Result<Response, CosError> {
    let url = request.wire_url()?;
    let method = request.method.clone();
    let started = Instant::now();

    let mut builder = client.http().request(method.clone(), url.clone());
    for (name, values) in request.headers.iter() {
        // Length comes from the body
        if name == "content-length" {
            continue;
        }
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    if let Some(timeout) = request.timeout {
        builder = builder.timeout(timeout);
    }
    match request.payload {
        Some(payload) => builder = builder.body(payload),
        None if method == Method::POST || method == Method::PUT => {
            builder = builder.body(Bytes::new())
        }
        None => {}
    }

    if client.is_debug() {
        tracing::debug!(method = %method, url = %url, headers = ?request.headers, "Sending COS request");
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            metrics::record_request(method.as_str(), "transport_error", started.elapsed().as_secs_f64());
            return Err(CosError::transport(&method, e));
        }
    };

    let status = response.status();
    if client.is_debug() {
        tracing::debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            content_type = ?response.headers().get("content-type"),
            "COS response"
        );
    }

    if !is_success(status) {
        let body = response
            .bytes()
            .await
            .map_err(|e| CosError::transport(&method, e))?;
        if client.is_debug() {
            tracing::debug!(body = %String::from_utf8_lossy(&body), "COS error body");
        }
        metrics::record_request(method.as_str(), "service_error", started.elapsed().as_secs_f64());
        return Err(ServiceError::from_response(status, &body).into());
    }

    metrics::record_request(method.as_str(), "success", started.elapsed().as_secs_f64());
    Ok(response)
}

/// Send one signed request and read the whole body
pub(crate) async fn run(client: &Client, request: SignedRequest) -> Result<CosResponse, CosError> {
    let method = request.method.clone();
    let response = execute(client, request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| CosError::transport(&method, e))?;
    Ok(CosResponse {
        status,
        headers,
        body,
    })
}

/// Prepare and run a request exactly once
pub(crate) async fn query(client: &Client, request: &mut PendingRequest) -> Result<CosResponse, CosError> {
    let signed = request.prepare(client, SignMode::Header)?;
    run(client, signed).await
}

/// Run `exec` inside the client's attempt loop.
///
/// Each attempt signs a fresh copy of `request`. A retryable error is
/// swallowed while another attempt is left; the last error is returned
/// once the loop is over.
pub(crate) async fn retrying<T, F, Fut>(
    client: &Client,
    request: &mut PendingRequest,
    operation: &'static str,
    mut exec: F,
) -> Result<T, CosError>
where
    F: FnMut(SignedRequest) -> Fut,
    Fut: Future<Output = Result<T, CosError>>,
{
    let mut attempt = client.attempt_strategy().start();
    let mut last_error = None;

    while attempt.next().await {
        let signed = request.prepare(client, SignMode::Header)?;
        match exec(signed).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt.has_next() => {
                tracing::warn!(
                    operation,
                    attempt = attempt.count(),
                    error = %e,
                    "COS request failed, retrying"
                );
                metrics::record_retry(operation);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(CosError::AttemptsExhausted))
}

/// [`query`] inside the attempt loop
pub(crate) async fn query_retrying(
    client: &Client,
    request: &mut PendingRequest,
    operation: &'static str,
) -> Result<CosResponse, CosError> {
    retrying(client, request, operation, move |signed| run(client, signed)).await
}
