//! Multipart uploads
//!
//! A session goes from initiated (upload id assigned) through any number of
//! part uploads to either completed or aborted. Part uploads are independent
//! of each other; re-sending a part number replaces that part. Parts are
//! sorted by number when the session is completed.
//!
//! # Example
//!
//! ```no_run
//! use cos_client::cos::{Client, Region};
//! use cos_client::upload::{Acl, Options};
//! use std::io::Cursor;
//!
//! # async fn example() -> Result<(), cos_client::cos::CosError> {
//! let client = Client::new(Region::GUANGZHOU, "1250000000", "id", "key", true, false)?;
//! let bucket = client.bucket("charts");
//!
//! let multi = bucket
//!     .init_multi("big.tgz", "application/gzip", Acl::Inherit, &Options::default())
//!     .await?;
//! let first = multi.put_part(1, Cursor::new(vec![0u8; 5 * 1024 * 1024])).await?;
//! let second = multi.put_part(2, Cursor::new(vec![1u8; 1024])).await?;
//! multi.complete(&[second, first]).await?;
//! # Ok(())
//! # }
//! ```

use super::{content_type_or_default, Acl, CopyOptions, Options};
use crate::cos::executor;
use crate::cos::types::{CompleteUpload, InitiateResult, ListMultiResp, ListPartsResp};
use crate::cos::{Bucket, CopyObjectResult, CosError, Headers, Params, Part, PendingRequest};
use crate::metrics;
use bytes::Bytes;
use reqwest::Method;
use sha1::{Digest, Sha1};
use std::io::SeekFrom;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Largest page the service returns for part listings
pub const LIST_PARTS_MAX: u32 = 1000;

/// An unfinished multipart upload
#[derive(Debug, Clone)]
pub struct Multi {
    bucket: Bucket,
    key: String,
    upload_id: String,
}

impl Multi {
    /// Handle for an upload id obtained elsewhere
    pub fn new(bucket: Bucket, key: impl Into<String>, upload_id: impl Into<String>) -> Self {
        Self {
            bucket,
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    fn part_params(&self, n: u32) -> Params {
        let mut params = Params::new();
        params.set("uploadId", self.upload_id.as_str());
        params.set("partNumber", n.to_string());
        params
    }

    /// Upload part `n` from `reader`, read from its start.
    ///
    /// Every part but the last must be at least 5 MiB.
    pub async fn put_part<R>(&self, n: u32, reader: R) -> Result<Part, CosError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        self.send_part(n, reader, None).await
    }

    /// [`Multi::put_part`] bounded by `timeout` per attempt
    pub async fn put_part_with_timeout<R>(
        &self,
        n: u32,
        reader: R,
        timeout: Duration,
    ) -> Result<Part, CosError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        self.send_part(n, reader, Some(timeout)).await
    }

    #[tracing::instrument(
        name = "cos.multipart.put_part",
        skip(self, reader),
        fields(
            cos.bucket = %self.bucket.name(),
            cos.key = %self.key,
            upload_id = %self.upload_id,
            part_number = n,
            upload.bytes = tracing::field::Empty
        ),
        err
    )]
    async fn send_part<R>(
        &self,
        n: u32,
        reader: R,
        timeout: Option<Duration>,
    ) -> Result<Part, CosError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let (body, sha1_hex) = part_info(reader).await?;
        let size = body.len() as u64;
        tracing::Span::current().record("upload.bytes", size);

        let mut headers = Headers::new();
        headers.set("Content-Length", size.to_string());
        headers.set("x-cos-content-sha1", sha1_hex);

        let mut req = PendingRequest::new(Method::PUT, self.bucket.name(), self.key.as_str())
            .with_params(self.part_params(n))
            .with_headers(headers)
            .with_payload(body);
        if let Some(timeout) = timeout {
            req = req.with_timeout(timeout);
        }

        let response =
            executor::query_retrying(self.bucket.client(), &mut req, "cos.multipart.put_part")
                .await?;
        let etag = response
            .header("etag")
            .filter(|etag| !etag.is_empty())
            .ok_or(CosError::MissingETag)?;

        metrics::record_part_bytes(self.bucket.name(), size);
        tracing::info!(etag = %etag, "Part uploaded");
        Ok(Part::new(n, etag, size as i64))
    }

    /// Copy `source` (`/<bucket>/<key>`) into part `n`. The source length
    /// is looked up with a HEAD request.
    pub async fn put_part_copy(
        &self,
        n: u32,
        options: &CopyOptions,
        source: &str,
    ) -> Result<(CopyObjectResult, Part), CosError> {
        self.put_part_copy_with_content_length(n, options, source, None)
            .await
    }

    /// Copy `source` into part `n`, recording `content_length` as the part
    /// size. `None` looks the length up with a HEAD on the source.
    #[tracing::instrument(
        name = "cos.multipart.put_part_copy",
        skip(self, options),
        fields(
            cos.bucket = %self.bucket.name(),
            cos.key = %self.key,
            upload_id = %self.upload_id,
            part_number = n,
            cos.copy_source = %source
        ),
        err
    )]
    pub async fn put_part_copy_with_content_length(
        &self,
        n: u32,
        options: &CopyOptions,
        source: &str,
        content_length: Option<u64>,
    ) -> Result<(CopyObjectResult, Part), CosError> {
        let size = match content_length {
            Some(length) => length as i64,
            None => self.source_length(source).await?,
        };

        let mut headers = Headers::new();
        headers.set("x-cos-copy-source", source);
        options.add_headers(&mut headers);

        let mut req = PendingRequest::new(Method::PUT, self.bucket.name(), self.key.as_str())
            .with_params(self.part_params(n))
            .with_headers(headers);
        let response = executor::query_retrying(
            self.bucket.client(),
            &mut req,
            "cos.multipart.put_part_copy",
        )
        .await?;

        let result: CopyObjectResult = response.decode()?;
        if result.etag.is_empty() {
            return Err(CosError::MissingETag);
        }
        let part = Part::new(n, result.etag.clone(), size);
        Ok((result, part))
    }

    /// Length of a copy source, -1 when the service does not report one
    async fn source_length(&self, source: &str) -> Result<i64, CosError> {
        let (bucket, key) = split_copy_source(source)?;
        let head = self.bucket.client().bucket(bucket).head(key, None).await?;
        Ok(head.content_length().map(|l| l as i64).unwrap_or(-1))
    }

    /// Parts uploaded so far, sorted by part number
    pub async fn list_parts(&self) -> Result<Vec<Part>, CosError> {
        self.list_parts_full(0, LIST_PARTS_MAX).await
    }

    /// Parts with a number above `part_number_marker`, fetched in pages of
    /// at most `max_parts` (capped at [`LIST_PARTS_MAX`]) until the listing
    /// is exhausted. The result is sorted by part number.
    #[tracing::instrument(
        name = "cos.multipart.list_parts",
        skip(self),
        fields(cos.bucket = %self.bucket.name(), cos.key = %self.key, upload_id = %self.upload_id),
        err
    )]
    pub async fn list_parts_full(
        &self,
        part_number_marker: u32,
        max_parts: u32,
    ) -> Result<Vec<Part>, CosError> {
        let mut params = Params::new();
        params.set("uploadId", self.upload_id.as_str());
        params.set("max-parts", max_parts.min(LIST_PARTS_MAX).to_string());
        params.set("part-number-marker", part_number_marker.to_string());

        let mut parts = Vec::new();
        loop {
            // Every page gets a fresh attempt budget
            let mut req = PendingRequest::new(Method::GET, self.bucket.name(), self.key.as_str())
                .with_params(params.clone());
            let response = executor::query_retrying(
                self.bucket.client(),
                &mut req,
                "cos.multipart.list_parts",
            )
            .await?;
            let page: ListPartsResp = response.decode()?;
            parts.extend(page.part);

            if !page.is_truncated {
                break;
            }
            let next = page.next_part_number_marker;
            if next.is_empty() || params.get("part-number-marker") == Some(next.as_str()) {
                return Err(CosError::StalledListing { marker: next });
            }
            params.set("part-number-marker", next);
        }

        parts.sort_by_key(|p| p.n);
        Ok(parts)
    }

    /// Assemble `parts` into the final object. The service may take
    /// several minutes to answer.
    #[tracing::instrument(
        name = "cos.multipart.complete",
        skip(self, parts),
        fields(
            cos.bucket = %self.bucket.name(),
            cos.key = %self.key,
            upload_id = %self.upload_id,
            parts = parts.len()
        ),
        err
    )]
    pub async fn complete(&self, parts: &[Part]) -> Result<(), CosError> {
        if parts.is_empty() {
            return Err(CosError::InvalidArgument(
                "multipart completion needs at least one part".into(),
            ));
        }

        let doc = quick_xml::se::to_string(&CompleteUpload::from_parts(parts))?;
        let body = Bytes::from(doc);
        if self.bucket.client().is_debug() {
            tracing::debug!(body = %String::from_utf8_lossy(&body), "Completion document");
        }

        let mut params = Params::new();
        params.set("uploadId", self.upload_id.as_str());
        let mut headers = Headers::new();
        headers.set("Content-Length", body.len().to_string());

        let mut req = PendingRequest::new(Method::POST, self.bucket.name(), self.key.as_str())
            .with_params(params)
            .with_headers(headers)
            .with_payload(body);

        match executor::query_retrying(self.bucket.client(), &mut req, "cos.multipart.complete")
            .await
        {
            Ok(_) => {
                metrics::record_multipart(self.bucket.name(), "completed");
                tracing::info!("Multipart upload completed");
                Ok(())
            }
            Err(e) => {
                metrics::record_multipart(self.bucket.name(), "failed");
                Err(e)
            }
        }
    }

    /// Delete the unfinished upload and its parts.
    ///
    /// Part uploads still in flight may survive an abort; call it again
    /// once they have settled to free all storage.
    #[tracing::instrument(
        name = "cos.multipart.abort",
        skip(self),
        fields(cos.bucket = %self.bucket.name(), cos.key = %self.key, upload_id = %self.upload_id),
        err
    )]
    pub async fn abort(&self) -> Result<(), CosError> {
        let mut params = Params::new();
        params.set("uploadId", self.upload_id.as_str());

        let mut req = PendingRequest::new(Method::DELETE, self.bucket.name(), self.key.as_str())
            .with_params(params);
        executor::query_retrying(self.bucket.client(), &mut req, "cos.multipart.abort").await?;

        metrics::record_multipart(self.bucket.name(), "aborted");
        tracing::info!("Multipart upload aborted");
        Ok(())
    }
}

impl Bucket {
    /// In-progress uploads under `prefix`, with the common prefixes found
    /// when `delim` is set. Pages are followed until the listing ends.
    #[tracing::instrument(
        name = "cos.multipart.list",
        skip(self),
        fields(cos.bucket = %self.name()),
        err
    )]
    pub async fn list_multi(
        &self,
        prefix: &str,
        delim: &str,
    ) -> Result<(Vec<Multi>, Vec<String>), CosError> {
        let mut params = Params::new();
        params.set("uploads", "");
        params.set("prefix", prefix);
        params.set("delimiter", delim);

        let mut multis = Vec::new();
        let mut prefixes = Vec::new();
        loop {
            // Every page gets a fresh attempt budget
            let mut req = PendingRequest::new(Method::GET, self.name(), "/").with_params(params.clone());
            let response =
                executor::query_retrying(self.client(), &mut req, "cos.multipart.list").await?;
            let page: ListMultiResp = response.decode()?;

            multis.extend(
                page.upload
                    .into_iter()
                    .map(|upload| Multi::new(self.clone(), upload.key, upload.upload_id)),
            );
            prefixes.extend(page.common_prefixes.into_iter().map(|p| p.prefix));

            if !page.is_truncated {
                break;
            }
            let unchanged = params.get("key-marker") == Some(page.next_key_marker.as_str())
                && params.get("upload-id-marker") == Some(page.next_upload_id_marker.as_str());
            if page.next_key_marker.is_empty() || unchanged {
                return Err(CosError::StalledListing {
                    marker: page.next_key_marker,
                });
            }
            params.set("key-marker", page.next_key_marker);
            params.set("upload-id-marker", page.next_upload_id_marker);
        }

        Ok((multis, prefixes))
    }

    /// Resume the in-progress upload for `key`, or start a new one
    pub async fn multi(
        &self,
        key: &str,
        content_type: &str,
        acl: Acl,
        options: &Options,
    ) -> Result<Multi, CosError> {
        let existing = match self.list_multi(key, "").await {
            Ok((multis, _)) => multis,
            Err(e) if e.has_code("NoSuchUpload") => Vec::new(),
            Err(e) => return Err(e),
        };
        if let Some(multi) = existing.into_iter().find(|m| m.key == key) {
            tracing::debug!(upload_id = %multi.upload_id, "Resuming multipart upload");
            return Ok(multi);
        }
        self.init_multi(key, content_type, acl, options).await
    }

    /// Start a new multipart upload for `key`
    #[tracing::instrument(
        name = "cos.multipart.init",
        skip(self, options),
        fields(cos.bucket = %self.name(), cos.key = %key, upload_id = tracing::field::Empty),
        err
    )]
    pub async fn init_multi(
        &self,
        key: &str,
        content_type: &str,
        acl: Acl,
        options: &Options,
    ) -> Result<Multi, CosError> {
        let mut headers = Headers::new();
        headers.set("Content-Length", "0");
        headers.set("Content-Type", content_type_or_default(content_type));
        acl.add_headers(&mut headers);
        options.add_headers(&mut headers);

        let mut params = Params::new();
        params.set("uploads", "");

        let mut req = PendingRequest::new(Method::POST, self.name(), key)
            .with_params(params)
            .with_headers(headers);
        let response =
            executor::query_retrying(self.client(), &mut req, "cos.multipart.init").await?;
        let result: InitiateResult = response.decode()?;
        if result.upload_id.is_empty() {
            return Err(
                <quick_xml::de::DeError as serde::de::Error>::missing_field("UploadId").into(),
            );
        }

        tracing::Span::current().record("upload_id", result.upload_id.as_str());
        tracing::info!(upload_id = %result.upload_id, "Created multipart upload");
        Ok(Multi::new(self.clone(), key, result.upload_id))
    }
}

/// Read a part from its start, returning the body and its hex SHA1
async fn part_info<R>(mut reader: R) -> Result<(Bytes, String), CosError>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    reader.seek(SeekFrom::Start(0)).await?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    let sha1_hex = hex::encode(Sha1::digest(&buf));
    Ok((Bytes::from(buf), sha1_hex))
}

/// Split `/<bucket>/<key...>` into bucket and key
fn split_copy_source(source: &str) -> Result<(&str, &str), CosError> {
    let mut pieces = source.splitn(3, '/');
    let _root = pieces.next();
    match (pieces.next(), pieces.next()) {
        (Some(bucket), Some(key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(CosError::InvalidArgument(format!(
            "copy source {:?} is not of the form /<bucket>/<key>",
            source
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_split_copy_source() {
        assert_eq!(
            split_copy_source("/charts-1250000000/stable/nginx.tgz").unwrap(),
            ("charts-1250000000", "stable/nginx.tgz")
        );
        assert!(split_copy_source("/charts").is_err());
        assert!(split_copy_source("//key").is_err());
    }

    #[tokio::test]
    async fn test_part_info_rewinds() {
        let mut cursor = Cursor::new(b"hello world".to_vec());
        cursor.set_position(6);
        let (body, sha1_hex) = part_info(cursor).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"hello world"));
        assert_eq!(sha1_hex, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }
}
