//! Single-request object writes
//!
//! Put and PutReader send the whole object in one PUT and are never retried,
//! since a streamed body may already be partly consumed. PutCopy asks the
//! service to copy an existing object.
//!
//! # Example
//!
//! ```no_run
//! use cos_client::cos::{Client, Region};
//! use cos_client::upload::{Acl, Options};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), cos_client::cos::CosError> {
//! let client = Client::new(Region::GUANGZHOU, "1250000000", "id", "key", true, false)?;
//! let bucket = client.bucket("charts");
//!
//! let body = Bytes::from("apiVersion: v1\nentries: {}\n");
//! bucket
//!     .put("index.yaml", body, "text/yaml", Acl::Inherit, &Options::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use super::{content_type_or_default, Acl, CopyOptions, Options};
use crate::cos::executor;
use crate::cos::{Bucket, CopyObjectResult, CosError, Headers, PendingRequest};
use bytes::Bytes;
use reqwest::Method;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Timeout applied to server-side copies
pub const COPY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

impl Bucket {
    /// Upload `data` as the object at `path`
    pub async fn put(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        acl: Acl,
        options: &Options,
    ) -> Result<(), CosError> {
        let length = data.len() as u64;
        self.put_bytes(path, data, length, content_type, acl, options)
            .await
    }

    /// Upload exactly `length` bytes read from `reader`.
    ///
    /// The body is read fully into memory before the request goes out, so
    /// large objects belong in a multipart upload. A reader that ends early
    /// fails with a non-retryable `UnexpectedEof` I/O error and nothing is
    /// sent.
    pub async fn put_reader<R>(
        &self,
        path: &str,
        reader: R,
        length: u64,
        content_type: &str,
        acl: Acl,
        options: &Options,
    ) -> Result<(), CosError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = Vec::with_capacity(length.min(64 * 1024 * 1024) as usize);
        reader.take(length).read_to_end(&mut buf).await?;
        if (buf.len() as u64) < length {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("reader ended after {} of {} bytes", buf.len(), length),
            )
            .into());
        }
        self.put_bytes(path, Bytes::from(buf), length, content_type, acl, options)
            .await
    }

    #[tracing::instrument(
        name = "cos.put",
        skip(self, data, options),
        fields(
            cos.bucket = %self.name(),
            cos.key = %path,
            http.content_type = %content_type,
            upload.bytes = length,
            cos.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_bytes(
        &self,
        path: &str,
        data: Bytes,
        length: u64,
        content_type: &str,
        acl: Acl,
        options: &Options,
    ) -> Result<(), CosError> {
        let start_time = Instant::now();

        let mut headers = Headers::new();
        headers.set("Content-Length", length.to_string());
        headers.set("Content-Type", content_type_or_default(content_type));
        acl.add_headers(&mut headers);
        options.add_headers(&mut headers);

        let mut req = PendingRequest::new(Method::PUT, self.name(), path)
            .with_headers(headers)
            .with_payload(data);
        let response = executor::query(self.client(), &mut req).await?;

        let etag = response.header("etag").unwrap_or_default();
        tracing::Span::current().record("cos.etag", etag);
        tracing::info!(
            etag = %etag,
            bytes_written = length,
            duration_ms = start_time.elapsed().as_millis(),
            "PutObject completed"
        );
        Ok(())
    }

    /// Copy `source` (`/<bucket>/<key>`) to `path` on the service side
    #[tracing::instrument(
        name = "cos.put_copy",
        skip(self, options),
        fields(cos.bucket = %self.name(), cos.key = %path, cos.copy_source = %source),
        err
    )]
    pub async fn put_copy(
        &self,
        path: &str,
        acl: Acl,
        options: &CopyOptions,
        source: &str,
    ) -> Result<CopyObjectResult, CosError> {
        let mut headers = Headers::new();
        headers.set("x-cos-copy-source", source);
        acl.add_headers(&mut headers);
        options.add_headers(&mut headers);

        let mut req = PendingRequest::new(Method::PUT, self.name(), path)
            .with_headers(headers)
            .with_timeout(COPY_TIMEOUT);
        let response = executor::query(self.client(), &mut req).await?;
        let result: CopyObjectResult = response.decode()?;

        tracing::info!(etag = %result.etag, "PutCopy completed");
        Ok(result)
    }
}
