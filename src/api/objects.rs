//! Object operations.

use std::{path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, header};

use super::listing::{self, DEFAULT_PARTITION_WORKERS, ListPager, ListParams, Lister};

use crate::{
    auth::Mfa,
    cancel::CancellationToken,
    client::Client,
    error::{Error, Result},
    mapper::{self, ObjectMetadata},
    request::{OutboundRequest, QueryParams},
    transport::RequestBody,
    types::{
        CannedAcl, CopyObjectOutput, DeleteObjectOutput, GetObjectOutput, HeadObjectOutput,
        ListCursor, ListingResult, MetadataDirective, Object, ObjectBody, PresignedRequest,
        PutObjectOutput, VersionEntry,
    },
    util::{
        self,
        headers::{
            AMZ_ACL, AMZ_COPY_SOURCE, AMZ_DELETE_MARKER, AMZ_METADATA_DIRECTIVE,
            AMZ_STORAGE_CLASS, AMZ_VERSION_ID,
        },
        progress::{ProgressReader, ProgressWatcher},
    },
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(900);

/// Object operations service.
#[derive(Clone, Debug)]
pub struct ObjectsService {
    client: Client,
}

impl ObjectsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Starts a request to GET an object.
    pub fn get(&self, bucket: impl Into<String>, key: impl Into<String>) -> GetObjectRequest {
        GetObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            range: None,
            if_match: None,
            if_none_match: None,
            if_modified_since: None,
            if_unmodified_since: None,
            version_id: None,
            progress: None,
            cancel: None,
        }
    }

    /// Starts a request to HEAD an object.
    pub fn head(&self, bucket: impl Into<String>, key: impl Into<String>) -> HeadObjectRequest {
        HeadObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            version_id: None,
            cancel: None,
        }
    }

    /// Starts a request to PUT an object.
    pub fn put(&self, bucket: impl Into<String>, key: impl Into<String>) -> PutObjectRequest {
        PutObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            cache_control: None,
            content_disposition: None,
            content_encoding: None,
            content_md5: None,
            storage_class: None,
            acl: None,
            metadata: Vec::new(),
            body: RequestBody::empty(),
            body_path: None,
            progress: None,
            verify_integrity: true,
            cancel: None,
        }
    }

    /// Starts a request to DELETE an object.
    pub fn delete(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> DeleteObjectRequest {
        DeleteObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            version_id: None,
            mfa: None,
            cancel: None,
        }
    }

    /// Starts a server-side copy.
    pub fn copy(
        &self,
        source_bucket: impl Into<String>,
        source_key: impl Into<String>,
        destination_bucket: impl Into<String>,
        destination_key: impl Into<String>,
    ) -> CopyObjectRequest {
        CopyObjectRequest {
            client: self.client.clone(),
            source_bucket: source_bucket.into(),
            source_key: source_key.into(),
            source_version_id: None,
            destination_bucket: destination_bucket.into(),
            destination_key: destination_key.into(),
            metadata_directive: None,
            metadata: Vec::new(),
            content_type: None,
            storage_class: None,
            acl: None,
            cancel: None,
        }
    }

    /// Lists the objects of a bucket. Merges all pages unless told otherwise.
    pub fn list(&self, bucket: impl Into<String>) -> ListObjectsRequest {
        ListRequest::new(self.client.clone(), bucket.into(), ListObjectsRequest::lister)
    }

    /// Lists every version and delete marker of a bucket.
    pub fn list_versions(&self, bucket: impl Into<String>) -> ListVersionsRequest {
        ListRequest::new(self.client.clone(), bucket.into(), ListVersionsRequest::lister)
    }

    /// Lists a bucket in parallel, one prefix branch per worker.
    pub fn list_partitioned(&self, bucket: impl Into<String>) -> PartitionedListRequest {
        PartitionedListRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            prefix: None,
            delimiter: None,
            depth: 1,
            workers: DEFAULT_PARTITION_WORKERS,
            page_size: None,
            cancel: None,
        }
    }

    /// Builds a query-authenticated URL for `method`.
    pub fn presign(
        &self,
        method: Method,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> PresignObjectRequest {
        PresignObjectRequest {
            client: self.client.clone(),
            method,
            bucket: bucket.into(),
            key: key.into(),
            expires_in: DEFAULT_PRESIGN_EXPIRY,
            query: QueryParams::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn presign_get(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> PresignObjectRequest {
        self.presign(Method::GET, bucket, key)
    }

    pub fn presign_put(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> PresignObjectRequest {
        self.presign(Method::PUT, bucket, key)
    }

    pub fn presign_head(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> PresignObjectRequest {
        self.presign(Method::HEAD, bucket, key)
    }

    pub fn presign_delete(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> PresignObjectRequest {
        self.presign(Method::DELETE, bucket, key)
    }
}

/// Request builder for GET object.
pub struct GetObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    range: Option<String>,
    if_match: Option<String>,
    if_none_match: Option<String>,
    if_modified_since: Option<String>,
    if_unmodified_since: Option<String>,
    version_id: Option<String>,
    progress: Option<Arc<dyn ProgressWatcher>>,
    cancel: Option<CancellationToken>,
}

impl GetObjectRequest {
    /// Sets a byte range (inclusive).
    pub fn range_bytes(mut self, start: u64, end_inclusive: u64) -> Self {
        self.range = Some(format!("bytes={start}-{end_inclusive}"));
        self
    }

    /// Sets an open-ended byte range starting at `start`.
    pub fn range_from(mut self, start: u64) -> Self {
        self.range = Some(format!("bytes={start}-"));
        self
    }

    /// Sets the `If-Match` header.
    pub fn if_match(mut self, value: impl Into<String>) -> Self {
        self.if_match = Some(value.into());
        self
    }

    /// Sets the `If-None-Match` header.
    pub fn if_none_match(mut self, value: impl Into<String>) -> Self {
        self.if_none_match = Some(value.into());
        self
    }

    /// Sets the `If-Modified-Since` header.
    pub fn if_modified_since(mut self, value: impl Into<String>) -> Self {
        self.if_modified_since = Some(value.into());
        self
    }

    /// Sets the `If-Unmodified-Since` header.
    pub fn if_unmodified_since(mut self, value: impl Into<String>) -> Self {
        self.if_unmodified_since = Some(value.into());
        self
    }

    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Reports downloaded bytes to `watcher` as the body is read.
    pub fn progress(mut self, watcher: Arc<dyn ProgressWatcher>) -> Self {
        self.progress = Some(watcher);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sends the request. The body stays open until the output is read or dropped.
    pub fn send(self) -> Result<GetObjectOutput> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (header::RANGE, &self.range),
            (header::IF_MATCH, &self.if_match),
            (header::IF_NONE_MATCH, &self.if_none_match),
            (header::IF_MODIFIED_SINCE, &self.if_modified_since),
            (header::IF_UNMODIFIED_SINCE, &self.if_unmodified_since),
        ] {
            if let Some(value) = value {
                util::headers::insert_header(&mut headers, name.as_str(), value)?;
            }
        }

        let mut query = QueryParams::new();
        query.push_opt("versionId", self.version_id);
        let request = OutboundRequest::build(
            self.client.config(),
            Method::GET,
            &self.bucket,
            Some(&self.key),
            &query,
            headers,
            &[],
        )?
        .with_cancel(self.cancel);

        let accepted = if self.range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };
        let resp = self.client.execute(request, &[accepted])?;

        let metadata = ObjectMetadata::from_headers(&resp.headers);
        let body = match self.progress {
            Some(watcher) => ObjectBody::new(ProgressReader::new(resp.body, watcher)),
            None => ObjectBody::new(resp.body),
        };
        Ok(GetObjectOutput { body, metadata })
    }
}

/// Request builder for HEAD object.
pub struct HeadObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    version_id: Option<String>,
    cancel: Option<CancellationToken>,
}

impl HeadObjectRequest {
    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn send(self) -> Result<HeadObjectOutput> {
        let mut query = QueryParams::new();
        query.push_opt("versionId", self.version_id);
        let request = OutboundRequest::build(
            self.client.config(),
            Method::HEAD,
            &self.bucket,
            Some(&self.key),
            &query,
            HeaderMap::new(),
            &[],
        )?
        .with_cancel(self.cancel);

        let resp = self.client.execute(request, &[StatusCode::OK])?;
        Ok(HeadObjectOutput {
            metadata: ObjectMetadata::from_headers(&resp.headers),
        })
    }
}

/// Request builder for PUT object.
pub struct PutObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    cache_control: Option<String>,
    content_disposition: Option<String>,
    content_encoding: Option<String>,
    content_md5: Option<String>,
    storage_class: Option<String>,
    acl: Option<CannedAcl>,
    metadata: Vec<(String, String)>,
    body: RequestBody,
    body_path: Option<PathBuf>,
    progress: Option<Arc<dyn ProgressWatcher>>,
    verify_integrity: bool,
    cancel: Option<CancellationToken>,
}

impl PutObjectRequest {
    /// Sets the `Content-Type` header. Defaults to `application/octet-stream`.
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn content_disposition(mut self, value: impl Into<String>) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    pub fn content_encoding(mut self, value: impl Into<String>) -> Self {
        self.content_encoding = Some(value.into());
        self
    }

    /// Sends a caller-computed `Content-MD5`; the service then checks the
    /// body itself and the local ETag comparison is skipped.
    pub fn content_md5(mut self, value: impl Into<String>) -> Self {
        self.content_md5 = Some(value.into());
        self
    }

    pub fn storage_class(mut self, value: impl Into<String>) -> Self {
        self.storage_class = Some(value.into());
        self
    }

    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Adds a user metadata entry, sent as `x-amz-meta-<name>`.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self.body_path = None;
        self
    }

    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::from_bytes(body);
        self.body_path = None;
        self
    }

    /// Uploads the file at `path`, reopened on every attempt.
    pub fn body_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.body_path = Some(path.into());
        self
    }

    /// Reports uploaded bytes to `watcher`, rewinding on retries.
    pub fn progress(mut self, watcher: Arc<dyn ProgressWatcher>) -> Self {
        self.progress = Some(watcher);
        self
    }

    /// Compares the returned ETag with the local MD5 of the body. On by default.
    pub fn verify_integrity(mut self, enabled: bool) -> Self {
        self.verify_integrity = enabled;
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn send(self) -> Result<PutObjectOutput> {
        let mut body = match self.body_path {
            Some(path) => RequestBody::from_path(path)?,
            None => self.body,
        };
        if let Some(watcher) = self.progress {
            body = body.with_progress(watcher);
        }

        let mut headers = HeaderMap::new();
        util::headers::insert_header(
            &mut headers,
            header::CONTENT_TYPE.as_str(),
            self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
        )?;
        for (name, value) in [
            (header::CACHE_CONTROL.as_str(), &self.cache_control),
            (header::CONTENT_DISPOSITION.as_str(), &self.content_disposition),
            (header::CONTENT_ENCODING.as_str(), &self.content_encoding),
            ("content-md5", &self.content_md5),
        ] {
            if let Some(value) = value {
                util::headers::insert_header(&mut headers, name, value)?;
            }
        }
        let storage_class = self
            .storage_class
            .as_deref()
            .or(self.client.config().default_storage_class.as_deref());
        if let Some(class) = storage_class {
            util::headers::insert_header(&mut headers, AMZ_STORAGE_CLASS, class)?;
        }
        if let Some(acl) = self.acl {
            util::headers::insert_header(&mut headers, AMZ_ACL, acl.as_str())?;
        }

        let digest = (self.verify_integrity && self.content_md5.is_none())
            .then(|| body.track_md5());

        let request = OutboundRequest::build(
            self.client.config(),
            Method::PUT,
            &self.bucket,
            Some(&self.key),
            &QueryParams::new(),
            headers,
            &self.metadata,
        )?
        .with_body(body)
        .with_cancel(self.cancel);

        let resp = self.client.execute(request, &[StatusCode::OK])?;
        let etag = util::headers::header_string(&resp.headers, header::ETAG);

        if let (Some(digest), Some(service)) = (digest, etag.as_deref()) {
            check_etag(&self.key, &digest.hex(), service)?;
        }

        Ok(PutObjectOutput {
            etag,
            version_id: util::headers::header_string(&resp.headers, AMZ_VERSION_ID),
        })
    }
}

/// Fails when a single-part ETag disagrees with the local MD5.
fn check_etag(key: &str, local: &str, service: &str) -> Result<()> {
    let service = util::headers::strip_etag_quotes(service);
    if service.contains('-') || service.eq_ignore_ascii_case(local) {
        return Ok(());
    }
    Err(Error::Integrity {
        key: key.to_string(),
        local_hash: local.to_string(),
        service_hash: service.to_string(),
    })
}

/// Request builder for DELETE object.
pub struct DeleteObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    version_id: Option<String>,
    mfa: Option<Mfa>,
    cancel: Option<CancellationToken>,
}

impl DeleteObjectRequest {
    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Required when the bucket has MFA delete enabled.
    pub fn mfa(mut self, mfa: Mfa) -> Self {
        self.mfa = Some(mfa);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn send(self) -> Result<DeleteObjectOutput> {
        let mut query = QueryParams::new();
        query.push_opt("versionId", self.version_id);
        let request = OutboundRequest::build(
            self.client.config(),
            Method::DELETE,
            &self.bucket,
            Some(&self.key),
            &query,
            HeaderMap::new(),
            &[],
        )?
        .with_mfa(self.mfa.as_ref())?
        .with_cancel(self.cancel);

        let resp = self
            .client
            .execute(request, &[StatusCode::NO_CONTENT, StatusCode::OK])?;

        Ok(DeleteObjectOutput {
            version_id: util::headers::header_string(&resp.headers, AMZ_VERSION_ID),
            delete_marker: util::headers::header_string(&resp.headers, AMZ_DELETE_MARKER)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        })
    }
}

/// Request builder for a server-side copy.
pub struct CopyObjectRequest {
    client: Client,
    source_bucket: String,
    source_key: String,
    source_version_id: Option<String>,
    destination_bucket: String,
    destination_key: String,
    metadata_directive: Option<MetadataDirective>,
    metadata: Vec<(String, String)>,
    content_type: Option<String>,
    storage_class: Option<String>,
    acl: Option<CannedAcl>,
    cancel: Option<CancellationToken>,
}

impl CopyObjectRequest {
    pub fn source_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.source_version_id = Some(version_id.into());
        self
    }

    pub fn metadata_directive(mut self, directive: MetadataDirective) -> Self {
        self.metadata_directive = Some(directive);
        self
    }

    /// Switches the directive to `REPLACE`.
    pub fn replace_metadata(mut self) -> Self {
        self.metadata_directive = Some(MetadataDirective::Replace);
        self
    }

    /// Adds a replacement metadata entry; implies `REPLACE`.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata_directive = Some(MetadataDirective::Replace);
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn storage_class(mut self, value: impl Into<String>) -> Self {
        self.storage_class = Some(value.into());
        self
    }

    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn send(self) -> Result<CopyObjectOutput> {
        if self.source_bucket.trim().is_empty() {
            return Err(Error::invalid_config("copy source bucket must not be empty"));
        }

        let mut headers = HeaderMap::new();
        let source = util::headers::copy_source_header_value(
            &self.source_bucket,
            &self.source_key,
            self.source_version_id.as_deref(),
        );
        util::headers::insert_header(&mut headers, AMZ_COPY_SOURCE, &source)?;
        if let Some(directive) = self.metadata_directive {
            util::headers::insert_header(&mut headers, AMZ_METADATA_DIRECTIVE, directive.as_str())?;
        }
        if let Some(value) = &self.content_type {
            util::headers::insert_header(&mut headers, header::CONTENT_TYPE.as_str(), value)?;
        }
        if let Some(class) = &self.storage_class {
            util::headers::insert_header(&mut headers, AMZ_STORAGE_CLASS, class)?;
        }
        if let Some(acl) = self.acl {
            util::headers::insert_header(&mut headers, AMZ_ACL, acl.as_str())?;
        }

        let request = OutboundRequest::build(
            self.client.config(),
            Method::PUT,
            &self.destination_bucket,
            Some(&self.destination_key),
            &QueryParams::new(),
            headers,
            &self.metadata,
        )?
        .with_cancel(self.cancel);

        let mut resp = self.client.execute(request, &[StatusCode::OK])?;
        let body = resp.read_string()?;

        // A copy can fail after the 200 status line was sent.
        if let Some(parsed) = util::xml::parse_error_xml(&body).filter(|e| e.code.is_some()) {
            return Err(mapper::response_error(
                resp.status,
                None,
                &resp.headers,
                &body,
                Some(parsed),
            ));
        }
        util::xml::parse_copy_object(&body)
    }
}

/// Shared builder for plain and version listings.
pub struct ListRequest<T> {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    delimiter: Option<String>,
    page_size: Option<u32>,
    cursor: Option<ListCursor>,
    merge_all: bool,
    cancel: Option<CancellationToken>,
    lister: fn(Client, ListParams) -> Lister<T>,
}

/// Listing of current objects.
pub type ListObjectsRequest = ListRequest<Object>;

/// Listing of object versions and delete markers.
pub type ListVersionsRequest = ListRequest<VersionEntry>;

impl ListRequest<Object> {
    fn lister(client: Client, params: ListParams) -> Lister<Object> {
        Lister::plain(client, params)
    }
}

impl ListRequest<VersionEntry> {
    fn lister(client: Client, params: ListParams) -> Lister<VersionEntry> {
        Lister::versions(client, params)
    }
}

impl<T> ListRequest<T> {
    fn new(client: Client, bucket: String, lister: fn(Client, ListParams) -> Lister<T>) -> Self {
        Self {
            client,
            bucket,
            prefix: None,
            delimiter: None,
            page_size: None,
            cursor: None,
            merge_all: true,
            cancel: None,
            lister,
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Groups keys sharing a prefix up to `delimiter` into common prefixes.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Maximum entries per page (`max-keys`).
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Resumes from a cursor returned by an earlier listing.
    pub fn cursor(mut self, cursor: ListCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// When false, `send` returns a single page and its resume cursor.
    pub fn merge_all(mut self, enabled: bool) -> Self {
        self.merge_all = enabled;
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn split(self) -> (Lister<T>, Option<ListCursor>, bool) {
        let params = ListParams {
            bucket: self.bucket,
            prefix: self.prefix,
            delimiter: self.delimiter,
            page_size: self.page_size,
            cancel: self.cancel,
        };
        ((self.lister)(self.client, params), self.cursor, self.merge_all)
    }

    pub fn send(self) -> Result<ListingResult<T>> {
        let (lister, cursor, merge_all) = self.split();
        lister.collect(cursor, merge_all)
    }

    /// Returns an iterator that fetches one page per call.
    pub fn pages(self) -> ListPager<T> {
        let (lister, cursor, _) = self.split();
        lister.pages(cursor)
    }
}

/// Request builder for a partitioned listing.
pub struct PartitionedListRequest {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    delimiter: Option<String>,
    depth: u32,
    workers: usize,
    page_size: Option<u32>,
    cancel: Option<CancellationToken>,
}

impl PartitionedListRequest {
    /// Root prefix the partitioning starts from.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Delimiter used to discover partitions. Defaults to `/`.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Number of prefix levels expanded before listing flat. Defaults to 1.
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Worker threads per level. Defaults to 10.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Lists every object under the root prefix, sorted by key.
    pub fn send(self) -> Result<ListingResult<Object>> {
        let params = ListParams {
            bucket: self.bucket,
            prefix: self.prefix,
            delimiter: self.delimiter,
            page_size: self.page_size,
            cancel: self.cancel,
        };
        listing::list_partitioned(&self.client, params, self.depth, self.workers)
    }
}

/// Builder for a query-authenticated URL.
pub struct PresignObjectRequest {
    client: Client,
    method: Method,
    bucket: String,
    key: String,
    expires_in: Duration,
    query: QueryParams,
    headers: HeaderMap,
}

impl PresignObjectRequest {
    /// Validity window. Defaults to 15 minutes.
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expires_in = duration;
        self
    }

    /// Adds a query parameter. Only sub-resources take part in the signature.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(key, value);
        self
    }

    /// Signs a header the eventual request must carry, such as `content-type`.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        util::headers::insert_header(&mut self.headers, name.as_ref(), value.as_ref())?;
        Ok(self)
    }

    pub fn build(self) -> Result<PresignedRequest> {
        self.client.presign(
            self.method,
            &self.bucket,
            &self.key,
            self.expires_in,
            &self.query,
            self.headers,
        )
    }
}
