//! Object operations on a bucket: read, list, delete and pre-signed URLs
//!
//! # Example
//!
//! ```no_run
//! use cos_client::cos::{Client, Region};
//!
//! # async fn example() -> Result<(), cos_client::cos::CosError> {
//! let client = Client::new(Region::GUANGZHOU, "1250000000", "id", "key", true, false)?;
//! let bucket = client.bucket("charts");
//!
//! let index = bucket.get("index.yaml").await?;
//! let page = bucket.list("stable/", "/", "", 100).await?;
//! for key in &page.contents {
//!     println!("{} ({} bytes)", key.key, key.size);
//! }
//! # let _ = index;
//! # Ok(())
//! # }
//! ```

use super::client::Bucket;
use super::error::CosError;
use super::executor::{self, CosResponse};
use super::request::{Headers, Params, PendingRequest, SignMode};
use super::types::{Delete, ListResp, XML_HEADER};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use reqwest::header::HeaderMap;
use reqwest::{Method, Response, StatusCode};

/// Most objects a single batch delete may name
pub const MAX_DELETE_OBJECTS: usize = 1000;

/// Streaming object body. Dropping it closes the connection.
#[derive(Debug)]
pub struct ObjectReader {
    response: Response,
}

impl ObjectReader {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Next chunk of the body, `None` at the end
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, CosError> {
        self.response
            .chunk()
            .await
            .map_err(|e| CosError::transport(&Method::GET, e))
    }

    /// Read the rest of the body
    pub async fn bytes(self) -> Result<Bytes, CosError> {
        self.response
            .bytes()
            .await
            .map_err(|e| CosError::transport(&Method::GET, e))
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

impl Bucket {
    /// HEAD an object. The returned response has an empty body.
    #[tracing::instrument(
        name = "cos.head",
        skip(self, headers),
        fields(cos.bucket = %self.name(), cos.key = %path),
        err
    )]
    pub async fn head(&self, path: &str, headers: Option<Headers>) -> Result<CosResponse, CosError> {
        let mut req = PendingRequest::new(Method::HEAD, self.name(), path)
            .with_headers(headers.unwrap_or_default());
        executor::query_retrying(self.client(), &mut req, "cos.head").await
    }

    /// Fetch a whole object into memory
    #[tracing::instrument(
        name = "cos.get",
        skip(self),
        fields(cos.bucket = %self.name(), cos.key = %path, cos.bytes = tracing::field::Empty),
        err
    )]
    pub async fn get(&self, path: &str) -> Result<Bytes, CosError> {
        let mut req = PendingRequest::new(Method::GET, self.name(), path);
        let response = executor::query_retrying(self.client(), &mut req, "cos.get").await?;
        tracing::Span::current().record("cos.bytes", response.body.len());
        Ok(response.body)
    }

    /// Open an object for streaming reads
    pub async fn get_reader(&self, path: &str) -> Result<ObjectReader, CosError> {
        let response = self.get_response(path).await?;
        Ok(ObjectReader { response })
    }

    /// Fetch an object, returning the open HTTP response
    pub async fn get_response(&self, path: &str) -> Result<Response, CosError> {
        self.get_response_with_headers(path, Headers::new()).await
    }

    /// Fetch an object with extra request headers (`Range`, conditionals, ...)
    #[tracing::instrument(
        name = "cos.get_response",
        skip(self, headers),
        fields(cos.bucket = %self.name(), cos.key = %path, http.status_code = tracing::field::Empty),
        err
    )]
    pub async fn get_response_with_headers(
        &self,
        path: &str,
        headers: Headers,
    ) -> Result<Response, CosError> {
        let client = self.client();
        let mut req = PendingRequest::new(Method::GET, self.name(), path).with_headers(headers);
        let response = executor::retrying(client, &mut req, "cos.get_response", move |signed| {
            executor::execute(client, signed)
        })
        .await?;
        tracing::Span::current().record("http.status_code", response.status().as_u16());
        Ok(response)
    }

    /// Delete one object
    #[tracing::instrument(
        name = "cos.del",
        skip(self),
        fields(cos.bucket = %self.name(), cos.key = %path),
        err
    )]
    pub async fn del(&self, path: &str) -> Result<(), CosError> {
        let mut req = PendingRequest::new(Method::DELETE, self.name(), path);
        executor::query(self.client(), &mut req).await?;
        Ok(())
    }

    /// Delete up to [`MAX_DELETE_OBJECTS`] objects in one request
    #[tracing::instrument(
        name = "cos.del_multi",
        skip(self, objects),
        fields(cos.bucket = %self.name(), cos.objects = objects.objects.len()),
        err
    )]
    pub async fn del_multi(&self, objects: &Delete) -> Result<(), CosError> {
        if objects.objects.len() > MAX_DELETE_OBJECTS {
            return Err(CosError::InvalidArgument(format!(
                "batch delete names {} objects, at most {} allowed",
                objects.objects.len(),
                MAX_DELETE_OBJECTS
            )));
        }

        let doc = quick_xml::se::to_string(objects)?;
        let body = Bytes::from(format!("{}{}", XML_HEADER, doc));
        let digest = Md5::digest(&body);

        let mut headers = Headers::new();
        headers.set("Content-Length", body.len().to_string());
        headers.set("Content-MD5", STANDARD.encode(digest));
        headers.set("Content-Type", "text/xml");

        let mut params = Params::new();
        params.set("delete", "");

        let mut req = PendingRequest::new(Method::POST, self.name(), "/")
            .with_params(params)
            .with_headers(headers)
            .with_payload(body);
        executor::query(self.client(), &mut req).await?;
        tracing::info!(count = objects.objects.len(), "Batch delete completed");
        Ok(())
    }

    /// Create the bucket (PUT on `path`, usually `/`)
    #[tracing::instrument(
        name = "cos.add_bucket",
        skip(self),
        fields(cos.bucket = %self.name()),
        err
    )]
    pub async fn add_bucket(&self, path: &str) -> Result<(), CosError> {
        let mut req = PendingRequest::new(Method::PUT, self.name(), path);
        executor::query(self.client(), &mut req).await?;
        Ok(())
    }

    /// List keys under `prefix`, one page of at most `max` keys (0 for the
    /// service default). Continue with `next_marker` while `is_truncated`.
    #[tracing::instrument(
        name = "cos.list",
        skip(self),
        fields(cos.bucket = %self.name(), cos.keys = tracing::field::Empty),
        err
    )]
    pub async fn list(
        &self,
        prefix: &str,
        delim: &str,
        marker: &str,
        max: u32,
    ) -> Result<ListResp, CosError> {
        let mut params = Params::new();
        params.set("prefix", prefix);
        params.set("delimiter", delim);
        params.set("marker", marker);
        if max != 0 {
            params.set("max-keys", max.to_string());
        }

        let mut req = PendingRequest::new(Method::GET, self.name(), "/").with_params(params);
        let response = executor::query_retrying(self.client(), &mut req, "cos.list").await?;
        let mut result: ListResp = response.decode()?;

        if result.is_truncated && result.next_marker.is_empty() {
            if let Some(last) = result.contents.last() {
                result.next_marker = last.key.clone();
            }
        }
        tracing::Span::current().record("cos.keys", result.contents.len());
        Ok(result)
    }

    /// Pre-signed GET URL valid until `expires`
    pub fn signed_url(&self, path: &str, expires: DateTime<Utc>) -> Result<String, CosError> {
        self.signed_url_with_args(path, expires, None, None)
    }

    /// Pre-signed GET URL with extra query parameters and signed headers
    pub fn signed_url_with_args(
        &self,
        path: &str,
        expires: DateTime<Utc>,
        params: Option<Params>,
        headers: Option<Headers>,
    ) -> Result<String, CosError> {
        self.signed_url_with_method(Method::GET, path, expires, params, headers)
    }

    /// Pre-signed URL for any verb. No request is sent.
    pub fn signed_url_with_method(
        &self,
        method: Method,
        path: &str,
        expires: DateTime<Utc>,
        params: Option<Params>,
        headers: Option<Headers>,
    ) -> Result<String, CosError> {
        let mut req = PendingRequest::new(method, self.name(), path)
            .with_params(params.unwrap_or_default())
            .with_headers(headers.unwrap_or_default())
            .with_expire(expires);
        let signed = req.prepare(self.client(), SignMode::Query)?;
        Ok(signed.share_url()?.to_string())
    }
}
