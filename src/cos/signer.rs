//! COS request signing (HMAC-SHA1, query-string signature)
//!
//! The signing sequence is:
//!
//! 1. `SignKey = hex(HMAC-SHA1(secret_key, "<start>;<end>"))`
//! 2. `FormatString = method \n uri \n canonical-query \n canonical-headers \n`
//! 3. `StringToSign = "sha1" \n "<start>;<end>" \n hex(SHA1(FormatString)) \n`
//! 4. `Signature = hex(HMAC-SHA1(SignKey, StringToSign))`
//!
//! The results travel as seven `q-*` query parameters. Everything here is
//! pure: the same inputs and sign-time window always give the same signature.

use super::request::{query_escape, Headers, Params};
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

/// Signature algorithm tag
pub const SIGN_ALGORITHM: &str = "sha1";

pub const Q_SIGN_ALGORITHM: &str = "q-sign-algorithm";
pub const Q_AK: &str = "q-ak";
pub const Q_SIGN_TIME: &str = "q-sign-time";
pub const Q_KEY_TIME: &str = "q-key-time";
pub const Q_HEADER_LIST: &str = "q-header-list";
pub const Q_URL_PARAM_LIST: &str = "q-url-param-list";
pub const Q_SIGNATURE: &str = "q-signature";

/// Validity window of a signature, as unix seconds. Also used as the key time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignTime {
    pub start: i64,
    pub end: i64,
}

impl SignTime {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for SignTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.start, self.end)
    }
}

/// Every intermediate value of one signing pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureParts {
    pub sign_time: String,
    pub key_time: String,
    pub sign_key: String,
    pub format_string: String,
    pub string_to_sign: String,
    pub signature: String,
    pub header_list: String,
    pub url_param_list: String,
}

impl SignatureParts {
    /// The seven signed parameters, in wire order
    pub fn query_pairs<'a>(&'a self, secret_id: &'a str) -> [(&'static str, &'a str); 7] {
        [
            (Q_SIGN_ALGORITHM, SIGN_ALGORITHM),
            (Q_AK, secret_id),
            (Q_SIGN_TIME, &self.sign_time),
            (Q_KEY_TIME, &self.key_time),
            (Q_HEADER_LIST, &self.header_list),
            (Q_URL_PARAM_LIST, &self.url_param_list),
            (Q_SIGNATURE, &self.signature),
        ]
    }

    /// Attach the signed parameters to a query
    pub fn apply_to(&self, secret_id: &str, params: &mut Params) {
        for (key, value) in self.query_pairs(secret_id) {
            params.set(key, value);
        }
    }

    /// `Authorization` header value carrying the same material
    pub fn authorization(&self, secret_id: &str) -> String {
        self.query_pairs(secret_id)
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Sign a request.
///
/// `uri` must already be path-escaped. `headers` are the headers that take
/// part in the signature (including `Host` for header-mode signing) and
/// `params` the query before any `q-*` parameter is added.
pub fn sign(
    method: &Method,
    uri: &str,
    params: &Params,
    headers: &Headers,
    secret_key: &str,
    sign_time: SignTime,
) -> SignatureParts {
    let sign_time = sign_time.to_string();
    let key_time = sign_time.clone();
    let sign_key = hmac_sha1_hex(secret_key.as_bytes(), &key_time);

    let uri = if uri.is_empty() { "/" } else { uri };
    let format_string = format!(
        "{}\n{}\n{}\n{}\n",
        method.as_str().to_lowercase(),
        uri,
        canonical_query(params),
        canonical_headers(headers)
    );

    let string_to_sign = format!(
        "{}\n{}\n{}\n",
        SIGN_ALGORITHM,
        sign_time,
        sha1_hex(format_string.as_bytes())
    );
    let signature = hmac_sha1_hex(sign_key.as_bytes(), &string_to_sign);

    SignatureParts {
        sign_time,
        key_time,
        sign_key,
        format_string,
        string_to_sign,
        signature,
        header_list: header_list(headers),
        url_param_list: url_param_list(params),
    }
}

/// Canonical query: lower-cased escaped keys in order, escaped values, `%20` for spaces
pub fn canonical_query(params: &Params) -> String {
    let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, values) in params.iter() {
        let key = query_escape(&key.to_lowercase()).to_lowercase();
        let pairs = entries.entry(key.clone()).or_default();
        for value in values {
            pairs.push(format!("{}={}", key, query_escape(value)));
        }
    }

    entries
        .into_values()
        .map(|pairs| pairs.join("&"))
        .collect::<Vec<_>>()
        .join("&")
        .replace('+', "%20")
}

/// Canonical headers: form-encoded `name=value` pairs sorted by name
pub fn canonical_headers(headers: &Headers) -> String {
    let mut pairs = Vec::new();
    for (name, values) in headers.iter() {
        let name = query_escape(name);
        for value in values {
            pairs.push(format!("{}={}", name, query_escape(value)));
        }
    }
    pairs.join("&")
}

/// `q-header-list`: sorted lower-cased header names
pub fn header_list(headers: &Headers) -> String {
    headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

/// `q-url-param-list`: sorted lower-cased parameter names
pub fn url_param_list(params: &Params) -> String {
    let mut keys: Vec<String> = params.iter().map(|(key, _)| key.to_lowercase()).collect();
    keys.sort();
    keys.join(";")
}

/// Hex-encoded HMAC-SHA1
pub fn hmac_sha1_hex(key: &[u8], message: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Hex-encoded SHA1
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}
