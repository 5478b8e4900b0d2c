//! Shared request and response types.

use std::io::Read;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

pub use crate::mapper::ObjectMetadata;

/// Fully resolved presigned request.
#[derive(Clone, Debug)]
pub struct PresignedRequest {
    /// HTTP method to use.
    pub method: Method,
    /// Fully signed request URL.
    pub url: Url,
    /// Headers that must accompany the request.
    pub headers: HeaderMap,
}

/// Object content reader.
pub struct ObjectBody {
    inner: Box<dyn Read>,
}

impl ObjectBody {
    pub(crate) fn new<R>(reader: R) -> Self
    where
        R: Read + 'static,
    {
        Self {
            inner: Box::new(reader),
        }
    }
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("inner", &"<reader>")
            .finish()
    }
}

impl Read for ObjectBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Output from a GET object request.
#[derive(Debug)]
pub struct GetObjectOutput {
    /// Response body reader.
    pub body: ObjectBody,
    /// Metadata mapped from the response headers.
    pub metadata: ObjectMetadata,
}

impl GetObjectOutput {
    /// Reads the full response body into memory.
    pub fn bytes(mut self) -> Result<Bytes> {
        let mut out = Vec::new();
        self.body
            .read_to_end(&mut out)
            .map_err(|e| Error::transport("failed to read response body", Some(Box::new(e))))?;
        Ok(Bytes::from(out))
    }

    /// Streams the response body into the provided writer.
    pub fn write_to<W>(mut self, writer: &mut W) -> Result<u64>
    where
        W: std::io::Write,
    {
        let bytes_copied = std::io::copy(&mut self.body, writer)
            .map_err(|e| Error::transport("failed to write response body", Some(Box::new(e))))?;
        Ok(bytes_copied)
    }
}

/// Output from a HEAD object request.
#[derive(Clone, Debug)]
pub struct HeadObjectOutput {
    pub metadata: ObjectMetadata,
}

/// Output from a PUT object request.
#[derive(Clone, Debug)]
pub struct PutObjectOutput {
    /// Entity tag, if provided.
    pub etag: Option<String>,
    /// Version id, if the bucket is versioned.
    pub version_id: Option<String>,
}

/// Output from a DELETE object request.
#[derive(Clone, Debug)]
pub struct DeleteObjectOutput {
    pub version_id: Option<String>,
    /// Whether the delete created (or removed) a delete marker.
    pub delete_marker: bool,
}

/// Output from a copy object request.
#[derive(Clone, Debug)]
pub struct CopyObjectOutput {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Object or bucket owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Owner {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

/// Object entry from a plain listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    pub key: String,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub size: u64,
    pub storage_class: Option<String>,
    pub owner: Option<Owner>,
}

/// Stored version of an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: String,
    pub is_latest: bool,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub size: u64,
    pub storage_class: Option<String>,
    pub owner: Option<Owner>,
}

/// Delete marker left by removing an object from a versioned bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteMarker {
    pub key: String,
    pub version_id: String,
    pub is_latest: bool,
    pub last_modified: Option<String>,
    pub owner: Option<Owner>,
}

/// Entry from a version-aware listing, in service order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionEntry {
    Version(ObjectVersion),
    DeleteMarker(DeleteMarker),
}

impl VersionEntry {
    pub fn key(&self) -> &str {
        match self {
            Self::Version(v) => &v.key,
            Self::DeleteMarker(m) => &m.key,
        }
    }

    pub fn version_id(&self) -> &str {
        match self {
            Self::Version(v) => &v.version_id,
            Self::DeleteMarker(m) => &m.version_id,
        }
    }

    pub fn is_delete_marker(&self) -> bool {
        matches!(self, Self::DeleteMarker(_))
    }
}

/// Position to resume a listing from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListCursor {
    /// `marker` for plain listings, `key-marker` for version listings.
    pub marker: String,
    /// `version-id-marker`; only used by version listings.
    pub version_id_marker: Option<String>,
}

impl ListCursor {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            version_id_marker: None,
        }
    }

    pub fn with_version_id_marker(mut self, version_id: impl Into<String>) -> Self {
        self.version_id_marker = Some(version_id.into());
        self
    }
}

/// One page of listing results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListPage<T> {
    pub entries: Vec<T>,
    pub common_prefixes: Vec<String>,
    pub truncated: bool,
    /// Cursor for the following page; `None` on the last page.
    pub next_cursor: Option<ListCursor>,
}

/// Listing outcome: a merged set, or one page with its resume cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingResult<T> {
    pub entries: Vec<T>,
    pub common_prefixes: Vec<String>,
    /// Always `None` for merged listings.
    pub cursor: Option<ListCursor>,
}

impl<T> ListingResult<T> {
    pub(crate) fn from_page(page: ListPage<T>) -> Self {
        Self {
            entries: page.entries,
            common_prefixes: page.common_prefixes,
            cursor: page.next_cursor,
        }
    }
}

/// Bucket entry from the account bucket listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
    pub creation_date: Option<String>,
}

/// Output from listing buckets.
#[derive(Clone, Debug)]
pub struct ListBucketsOutput {
    pub owner: Option<Owner>,
    pub buckets: Vec<Bucket>,
}

/// Result of probing a bucket name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketStatus {
    /// Exists and is accessible with the current credentials.
    Mine,
    /// Exists but belongs to someone else.
    Claimed,
    DoesNotExist,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersioningStatus {
    Enabled,
    Suspended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MfaDeleteStatus {
    Enabled,
    Disabled,
}

/// Bucket versioning state. Both fields are `None` for a bucket that was never versioned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BucketVersioning {
    pub status: Option<VersioningStatus>,
    pub mfa_delete: Option<MfaDeleteStatus>,
}

/// Who pays for requests against a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payer {
    BucketOwner,
    Requester,
}

/// Canned access policy sent as `x-amz-acl`.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl CannedAcl {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
            Self::BucketOwnerRead => "bucket-owner-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

/// Whether a copy keeps the source metadata or replaces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataDirective {
    Copy,
    Replace,
}

impl MetadataDirective {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "COPY",
            Self::Replace => "REPLACE",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlError {
    #[serde(rename = "Code")]
    pub(crate) code: Option<String>,
    #[serde(rename = "Message")]
    pub(crate) message: Option<String>,
    #[serde(rename = "RequestId")]
    pub(crate) request_id: Option<String>,
    #[serde(rename = "HostId")]
    pub(crate) host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlOwner {
    #[serde(rename = "ID")]
    pub(crate) id: Option<String>,
    #[serde(rename = "DisplayName")]
    pub(crate) display_name: Option<String>,
}

impl From<XmlOwner> for Owner {
    fn from(value: XmlOwner) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlListBucketResult {
    #[serde(rename = "IsTruncated")]
    pub(crate) is_truncated: Option<bool>,
    #[serde(rename = "NextMarker")]
    pub(crate) next_marker: Option<String>,
    #[serde(rename = "Contents", default)]
    pub(crate) contents: Vec<XmlObject>,
    #[serde(rename = "CommonPrefixes", default)]
    pub(crate) common_prefixes: Vec<XmlCommonPrefixes>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlObject {
    #[serde(rename = "Key")]
    pub(crate) key: String,
    #[serde(rename = "LastModified")]
    pub(crate) last_modified: Option<String>,
    #[serde(rename = "ETag")]
    pub(crate) etag: Option<String>,
    #[serde(rename = "Size")]
    pub(crate) size: Option<u64>,
    #[serde(rename = "StorageClass")]
    pub(crate) storage_class: Option<String>,
    #[serde(rename = "Owner")]
    pub(crate) owner: Option<XmlOwner>,
}

impl From<XmlObject> for Object {
    fn from(value: XmlObject) -> Self {
        Self {
            key: value.key,
            last_modified: value.last_modified,
            etag: value.etag,
            size: value.size.unwrap_or(0),
            storage_class: value.storage_class,
            owner: value.owner.map(Owner::from),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlCommonPrefixes {
    #[serde(rename = "Prefix")]
    pub(crate) prefix: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlListAllMyBucketsResult {
    #[serde(rename = "Owner")]
    pub(crate) owner: Option<XmlOwner>,
    #[serde(rename = "Buckets", default)]
    pub(crate) buckets: XmlBuckets,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct XmlBuckets {
    #[serde(rename = "Bucket", default)]
    pub(crate) bucket: Vec<XmlBucket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlBucket {
    #[serde(rename = "Name")]
    pub(crate) name: String,
    #[serde(rename = "CreationDate")]
    pub(crate) creation_date: Option<String>,
}

impl From<XmlListAllMyBucketsResult> for ListBucketsOutput {
    fn from(value: XmlListAllMyBucketsResult) -> Self {
        Self {
            owner: value.owner.map(Owner::from),
            buckets: value
                .buckets
                .bucket
                .into_iter()
                .map(|b| Bucket {
                    name: b.name,
                    creation_date: b.creation_date,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlVersioningConfiguration {
    #[serde(rename = "Status")]
    pub(crate) status: Option<String>,
    #[serde(rename = "MfaDelete")]
    pub(crate) mfa_delete: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlRequestPaymentConfiguration {
    #[serde(rename = "Payer")]
    pub(crate) payer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlCopyObjectResult {
    #[serde(rename = "ETag")]
    pub(crate) etag: Option<String>,
    #[serde(rename = "LastModified")]
    pub(crate) last_modified: Option<String>,
}
