//! Pending requests
//!
//! A [`PendingRequest`] describes one logical operation. Its header and query
//! maps are never touched by signing: [`PendingRequest::prepare`] deep-copies
//! them into a fresh [`SignedRequest`] on every call, so a retried attempt
//! always starts from the caller's original values.

use super::client::Client;
use super::error::CosError;
use super::signer::{self, SignTime, SignatureParts};
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, Url};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default validity of a request signature, in seconds
pub const DEFAULT_SIGN_EXPIRE_SECS: i64 = 86400;

/// Query parameters that are sent as bare flags (`?uploads`, not `?uploads=`)
pub const FLAG_PARAMS: [&str; 2] = ["uploads", "delete"];

/// Characters escaped in query keys and values: everything but `A-Za-z0-9-_.~`
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Characters escaped in object paths. Sub-delimiters and `/` stay literal,
/// `?` is escaped.
const PATH_ESCAPE: &AsciiSet = &QUERY_ESCAPE
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// Escape a query component the way HTML forms do: spaces become `+`
pub fn query_escape(s: &str) -> String {
    s.split(' ')
        .map(|part| utf8_percent_encode(part, QUERY_ESCAPE).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Escape an object path, keeping `/` separators
pub fn path_escape(path: &str) -> String {
    utf8_percent_encode(path, PATH_ESCAPE).to_string()
}

/// Whether `path` has a `.` or `..` segment.
///
/// The URL parser behind the transport resolves those segments, in literal
/// or `%2E` form, so the request would reach a different path than the one
/// signed.
pub fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "." || segment == "..")
}

/// Escape a path for the wire.
///
/// Some calls (bucket ACL and friends) need the first character after the
/// bucket root to be a literal `?`; that one is restored after escaping.
/// `+` is sent as `%2B` so the service does not read it as a space.
pub fn partially_escaped_path(path: &str) -> String {
    let escaped = path_escape(path);
    let mut segments: Vec<String> = escaped.split('/').map(str::to_owned).collect();
    if let Some(first) = segments.get_mut(1) {
        if let Some(rest) = first.strip_prefix("%3F") {
            *first = format!("?{}", rest);
        }
    }
    segments.join("/").replace('+', "%2B")
}

/// Ordered multi-valued string map used for query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, Vec<String>>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of `key`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Append a value to `key`
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// First value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Wire encoding, sorted by key. Flag parameters render bare.
    pub fn encode(&self) -> String {
        let mut pairs = Vec::new();
        for (key, values) in &self.0 {
            let escaped_key = query_escape(key);
            for value in values {
                if value.is_empty() && FLAG_PARAMS.contains(&key.as_str()) {
                    pairs.push(escaped_key.clone());
                } else {
                    pairs.push(format!("{}={}", escaped_key, query_escape(value)));
                }
            }
        }
        pairs.join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.add(key, value);
        }
        params
    }
}

/// Case-insensitive multi-valued header map. Names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(lower-cased name, values)` in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Copy every header of `other` into `self`, replacing existing values
    pub fn extend_from(&mut self, other: &Headers) {
        for (name, values) in other.iter() {
            self.0.insert(name.clone(), values.clone());
        }
    }
}

impl<'a, V: Into<String>> FromIterator<(&'a str, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

/// How the signature travels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    /// Normal API call: signature in the query and mirrored in `Authorization`
    Header,
    /// Pre-signed URL: signature material in the query only
    Query,
}

/// One operation waiting to be sent
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub bucket: String,
    pub path: String,
    pub params: Params,
    pub headers: Headers,
    pub payload: Option<Bytes>,
    /// Per-call timeout; `None` leaves the call bounded by the client only
    pub timeout: Option<Duration>,
    /// Instant the signature stops being valid
    pub expire: DateTime<Utc>,
    base_url: String,
    prepared: bool,
}

/// A request after signing, ready to be executed
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    pub base_url: String,
    pub path: String,
    pub params: Params,
    pub headers: Headers,
    pub payload: Option<Bytes>,
    pub timeout: Option<Duration>,
    pub signature: SignatureParts,
}

impl PendingRequest {
    /// New request with the default signature expiry
    pub fn new(method: Method, bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            bucket: bucket.into(),
            path: path.into(),
            params: Params::new(),
            headers: Headers::new(),
            payload: None,
            timeout: None,
            expire: Utc::now() + ChronoDuration::seconds(DEFAULT_SIGN_EXPIRE_SECS),
            base_url: String::new(),
            prepared: false,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_expire(mut self, expire: DateTime<Utc>) -> Self {
        self.expire = expire;
        self
    }

    /// Base URL resolved on first preparation
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve defaults once, then sign a fresh copy of headers and params.
    ///
    /// The payload is shared with the returned request (a cheap `Bytes` clone).
    pub fn prepare(&mut self, client: &Client, mode: SignMode) -> Result<SignedRequest, CosError> {
        let sign_time = SignTime::new(Utc::now().timestamp(), self.expire.timestamp());
        self.prepare_at(client, mode, sign_time)
    }

    pub(crate) fn prepare_at(
        &mut self,
        client: &Client,
        mode: SignMode,
        sign_time: SignTime,
    ) -> Result<SignedRequest, CosError> {
        if has_dot_segment(&self.path) {
            return Err(CosError::InvalidArgument(format!(
                "object path {:?} has a dot segment and cannot be addressed",
                self.path
            )));
        }
        if !self.prepared {
            self.prepared = true;
            if !self.path.starts_with('/') {
                self.path.insert(0, '/');
            }
            self.base_url = client.endpoint(&self.bucket);
        }

        let mut params = self.params.clone();
        let mut headers = self.headers.clone();
        if mode == SignMode::Header {
            headers.set("Host", client.host(&self.bucket));
        }

        let credentials = client.credentials();
        let signature = signer::sign(
            &self.method,
            &path_escape(&self.path),
            &params,
            &headers,
            credentials.secret_key(),
            sign_time,
        );
        if client.is_debug() {
            tracing::debug!(
                format_string = %signature.format_string,
                string_to_sign = %signature.string_to_sign,
                "Signed request"
            );
        }

        signature.apply_to(credentials.secret_id(), &mut params);
        if mode == SignMode::Header {
            headers.set(
                "Authorization",
                signature.authorization(credentials.secret_id()),
            );
        }

        Ok(SignedRequest {
            method: self.method.clone(),
            base_url: self.base_url.clone(),
            path: self.path.clone(),
            params,
            headers,
            payload: self.payload.clone(),
            timeout: self.timeout,
            signature,
        })
    }
}

impl SignedRequest {
    /// URL handed to the transport. The path is partially escaped.
    pub fn wire_url(&self) -> Result<Url, CosError> {
        self.build_url(&partially_escaped_path(&self.path))
    }

    /// URL for sharing (pre-signed URLs)
    pub fn share_url(&self) -> Result<Url, CosError> {
        self.build_url(&path_escape(&self.path))
    }

    fn build_url(&self, escaped_path: &str) -> Result<Url, CosError> {
        let mut raw = format!("{}{}", self.base_url.trim_end_matches('/'), escaped_path);
        let query = self.params.encode();
        if !query.is_empty() {
            raw.push(if escaped_path.contains('?') { '&' } else { '?' });
            raw.push_str(&query);
        }
        Url::parse(&raw).map_err(|e| CosError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }
}
