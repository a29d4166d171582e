//! XML documents exchanged with the service

use serde::{Deserialize, Serialize};

/// XML declaration prepended to request bodies
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Result of a bucket listing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ListResp {
    pub name: String,
    pub prefix: String,
    pub marker: String,
    pub max_keys: u32,
    /// More keys are available past this page
    pub is_truncated: bool,
    pub contents: Vec<Key>,
    pub common_prefixes: Vec<CommonPrefix>,
    /// Marker for the next page. Filled from the last key when the service
    /// truncates without sending one.
    pub next_marker: String,
}

impl ListResp {
    /// Common prefixes as plain strings
    pub fn prefixes(&self) -> Vec<&str> {
        self.common_prefixes.iter().map(|p| p.prefix.as_str()).collect()
    }
}

/// An object in a listing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Key {
    pub key: String,
    pub last_modified: String,
    pub size: i64,
    /// Hex MD5 of the content, in double quotes
    #[serde(rename = "ETag")]
    pub etag: String,
    pub owner: Owner,
    pub storage_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CommonPrefix {
    pub prefix: String,
}

/// One page of in-progress multipart uploads
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct ListMultiResp {
    pub next_key_marker: String,
    pub next_upload_id_marker: String,
    pub is_truncated: bool,
    pub upload: Vec<UploadEntry>,
    pub common_prefixes: Vec<CommonPrefix>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct UploadEntry {
    pub key: String,
    pub upload_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct InitiateResult {
    pub upload_id: String,
}

/// Output of a server-side copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CopyObjectResult {
    #[serde(rename = "ETag")]
    pub etag: String,
    pub last_modified: String,
}

/// An uploaded part of a multipart session
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Part {
    #[serde(rename = "PartNumber")]
    pub n: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "Size")]
    pub size: i64,
}

impl Part {
    pub fn new(n: u32, etag: impl Into<String>, size: i64) -> Self {
        Self {
            n,
            etag: etag.into(),
            size,
        }
    }
}

/// One page of uploaded parts
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct ListPartsResp {
    pub next_part_number_marker: String,
    pub is_truncated: bool,
    pub part: Vec<Part>,
}

/// Body of a multipart completion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename = "CompleteMultipartUpload")]
pub(crate) struct CompleteUpload {
    #[serde(rename = "Part")]
    pub parts: Vec<CompletePart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CompletePart {
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

impl CompleteUpload {
    /// Completion document with parts in ascending part-number order
    pub fn from_parts(parts: &[Part]) -> Self {
        let mut parts: Vec<CompletePart> = parts
            .iter()
            .map(|p| CompletePart {
                part_number: p.n,
                etag: p.etag.clone(),
            })
            .collect();
        parts.sort_by_key(|p| p.part_number);
        Self { parts }
    }
}

/// Batch delete request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Delete {
    /// Ask the service to only report failures
    #[serde(rename = "Quiet", skip_serializing_if = "is_false")]
    pub quiet: bool,
    #[serde(rename = "Object")]
    pub objects: Vec<Object>,
}

impl Delete {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            quiet: false,
            objects: keys.into_iter().map(Object::new).collect(),
        }
    }
}

/// Object named in a batch delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Object {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "VersionId", skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

impl Object {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
