//! Upload module
//!
//! Single-request object writes ([`put_object`]) and multipart sessions
//! ([`multipart`]), plus the header options they share.

use crate::cos::Headers;
use std::collections::BTreeMap;
use std::fmt;

pub mod multipart;
pub mod put_object;

/// Content type used when the caller has none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Canned access control applied to a new object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Acl {
    /// Send no ACL header; the object inherits the bucket ACL
    #[default]
    Inherit,
    Private,
    PublicRead,
}

impl Acl {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Acl::Inherit => None,
            Acl::Private => Some("private"),
            Acl::PublicRead => Some("public-read"),
        }
    }

    pub(crate) fn add_headers(&self, headers: &mut Headers) {
        if let Some(acl) = self.as_str() {
            headers.set("x-cos-acl", acl);
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("inherit"))
    }
}

/// Optional headers for object writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// User metadata, sent as `x-cos-meta-<key>`
    pub meta: BTreeMap<String, Vec<String>>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
    /// Hex SHA1 of the content, checked by the service
    pub content_sha1: Option<String>,
    pub content_disposition: Option<String>,
}

impl Options {
    pub(crate) fn add_headers(&self, headers: &mut Headers) {
        if let Some(value) = non_empty(&self.content_encoding) {
            headers.set("Content-Encoding", value);
        }
        if let Some(value) = non_empty(&self.cache_control) {
            headers.set("Cache-Control", value);
        }
        if let Some(value) = non_empty(&self.content_sha1) {
            headers.set("x-cos-content-sha1", value);
        }
        if let Some(value) = non_empty(&self.content_disposition) {
            headers.set("Content-Disposition", value);
        }
        for (key, values) in &self.meta {
            for value in values {
                headers.add(&format!("x-cos-meta-{}", key), value.as_str());
            }
        }
    }
}

/// Optional headers for server-side copies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Passed through as-is, replacing same-named headers
    pub headers: Headers,
    /// `x-cos-copy-source-range`, e.g. `bytes=0-1048575`
    pub copy_source_range: Option<String>,
    /// `x-cos-metadata-directive`: `Copy` or `Replaced`
    pub metadata_directive: Option<String>,
}

impl CopyOptions {
    pub(crate) fn add_headers(&self, headers: &mut Headers) {
        if let Some(value) = non_empty(&self.metadata_directive) {
            headers.set("x-cos-metadata-directive", value);
        }
        if let Some(value) = non_empty(&self.copy_source_range) {
            headers.set("x-cos-copy-source-range", value);
        }
        headers.extend_from(&self.headers);
    }
}

/// `content_type`, or [`DEFAULT_CONTENT_TYPE`] when empty
pub(crate) fn content_type_or_default(content_type: &str) -> &str {
    if content_type.is_empty() {
        DEFAULT_CONTENT_TYPE
    } else {
        content_type
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
