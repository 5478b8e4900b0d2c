//! Bucket operations.

use http::{HeaderMap, Method, StatusCode};

use crate::{
    auth::Mfa,
    client::Client,
    error::{Error, Result},
    request::{OutboundRequest, QueryParams},
    transport::RequestBody,
    types::{
        BucketStatus, BucketVersioning, CannedAcl, ListBucketsOutput, MfaDeleteStatus, Payer,
        VersioningStatus,
    },
    util::{self, headers::AMZ_ACL},
};

/// Bucket operations service.
#[derive(Clone, Debug)]
pub struct BucketsService {
    client: Client,
}

impl BucketsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Lists the buckets owned by the caller.
    pub fn list(&self) -> ListBucketsRequest {
        ListBucketsRequest {
            client: self.client.clone(),
        }
    }

    pub fn create(&self, bucket: impl Into<String>) -> CreateBucketRequest {
        CreateBucketRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            location: None,
            acl: None,
        }
    }

    pub fn delete(&self, bucket: impl Into<String>) -> DeleteBucketRequest {
        DeleteBucketRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }

    /// Probes whether a bucket name is ours, someone else's, or free.
    pub fn status(&self, bucket: impl Into<String>) -> BucketStatusRequest {
        BucketStatusRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }

    /// True when the bucket exists and is accessible with the current credentials.
    pub fn is_accessible(&self, bucket: impl Into<String>) -> Result<bool> {
        Ok(self.status(bucket).send()? == BucketStatus::Mine)
    }

    pub fn location(&self, bucket: impl Into<String>) -> GetBucketLocationRequest {
        GetBucketLocationRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }

    pub fn versioning(&self, bucket: impl Into<String>) -> GetBucketVersioningRequest {
        GetBucketVersioningRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }

    pub fn set_versioning(
        &self,
        bucket: impl Into<String>,
        status: VersioningStatus,
    ) -> PutBucketVersioningRequest {
        PutBucketVersioningRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            status,
            mfa_delete: None,
            mfa: None,
        }
    }

    pub fn request_payment(&self, bucket: impl Into<String>) -> GetRequestPaymentRequest {
        GetRequestPaymentRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }

    pub fn set_request_payment(
        &self,
        bucket: impl Into<String>,
        payer: Payer,
    ) -> PutRequestPaymentRequest {
        PutRequestPaymentRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            payer,
        }
    }
}

/// Reads a sub-resource document of a bucket.
fn get_config(client: &Client, bucket: &str, sub_resource: &str) -> Result<String> {
    let mut query = QueryParams::new();
    query.flag(sub_resource);
    let request = OutboundRequest::build(
        client.config(),
        Method::GET,
        bucket,
        None,
        &query,
        HeaderMap::new(),
        &[],
    )?;
    client.execute(request, &[StatusCode::OK])?.read_string()
}

/// Replaces a sub-resource document of a bucket.
fn put_config(client: &Client, request: OutboundRequest) -> Result<()> {
    client.execute(request, &[StatusCode::OK])?;
    Ok(())
}

fn xml_request(
    client: &Client,
    bucket: &str,
    sub_resource: &str,
    body: bytes::Bytes,
) -> Result<OutboundRequest> {
    let mut query = QueryParams::new();
    query.flag(sub_resource);
    let mut headers = HeaderMap::new();
    util::headers::insert_header(
        &mut headers,
        http::header::CONTENT_TYPE.as_str(),
        "application/xml",
    )?;
    Ok(OutboundRequest::build(
        client.config(),
        Method::PUT,
        bucket,
        None,
        &query,
        headers,
        &[],
    )?
    .with_body(RequestBody::from_bytes(body)))
}

/// Request builder for listing buckets.
pub struct ListBucketsRequest {
    client: Client,
}

impl ListBucketsRequest {
    pub fn send(self) -> Result<ListBucketsOutput> {
        let request = OutboundRequest::service(
            self.client.config(),
            Method::GET,
            &QueryParams::new(),
            HeaderMap::new(),
        )?;
        let body = self.client.execute(request, &[StatusCode::OK])?.read_string()?;
        util::xml::parse_list_buckets(&body)
    }
}

/// Request builder for creating a bucket.
pub struct CreateBucketRequest {
    client: Client,
    bucket: String,
    location: Option<String>,
    acl: Option<CannedAcl>,
}

impl CreateBucketRequest {
    /// Location constraint sent in the request body, e.g. `EU`.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    pub fn send(self) -> Result<()> {
        let mut headers = HeaderMap::new();
        if let Some(acl) = self.acl {
            util::headers::insert_header(&mut headers, AMZ_ACL, acl.as_str())?;
        }

        let body = match self.location.as_deref().filter(|l| !l.is_empty()) {
            Some(location) => {
                util::headers::insert_header(
                    &mut headers,
                    http::header::CONTENT_TYPE.as_str(),
                    "application/xml",
                )?;
                RequestBody::from_bytes(util::xml::encode_create_bucket_configuration(location)?)
            }
            None => RequestBody::empty(),
        };

        let request = OutboundRequest::build(
            self.client.config(),
            Method::PUT,
            &self.bucket,
            None,
            &QueryParams::new(),
            headers,
            &[],
        )?
        .with_body(body);

        put_config(&self.client, request)
    }
}

/// Request builder for deleting an empty bucket.
pub struct DeleteBucketRequest {
    client: Client,
    bucket: String,
}

impl DeleteBucketRequest {
    pub fn send(self) -> Result<()> {
        let request = OutboundRequest::build(
            self.client.config(),
            Method::DELETE,
            &self.bucket,
            None,
            &QueryParams::new(),
            HeaderMap::new(),
            &[],
        )?;
        self.client
            .execute(request, &[StatusCode::NO_CONTENT, StatusCode::OK])?;
        Ok(())
    }
}

/// Request builder for probing a bucket name.
pub struct BucketStatusRequest {
    client: Client,
    bucket: String,
}

impl BucketStatusRequest {
    pub fn send(self) -> Result<BucketStatus> {
        let mut query = QueryParams::new();
        query.push("max-keys", "0");
        let request = OutboundRequest::build(
            self.client.config(),
            Method::HEAD,
            &self.bucket,
            None,
            &query,
            HeaderMap::new(),
            &[],
        )?;

        match self.client.execute(request, &[StatusCode::OK]) {
            Ok(_) => Ok(BucketStatus::Mine),
            Err(err) => classify_status(err),
        }
    }
}

fn classify_status(err: Error) -> Result<BucketStatus> {
    match err.status() {
        Some(StatusCode::FORBIDDEN) => Ok(BucketStatus::Claimed),
        Some(StatusCode::NOT_FOUND) => Ok(BucketStatus::DoesNotExist),
        _ => Err(err),
    }
}

/// Request builder for reading a bucket's location constraint.
pub struct GetBucketLocationRequest {
    client: Client,
    bucket: String,
}

impl GetBucketLocationRequest {
    /// Returns `None` for the default location.
    pub fn send(self) -> Result<Option<String>> {
        let body = get_config(&self.client, &self.bucket, "location")?;
        util::xml::parse_location(&body)
    }
}

/// Request builder for reading bucket versioning.
pub struct GetBucketVersioningRequest {
    client: Client,
    bucket: String,
}

impl GetBucketVersioningRequest {
    pub fn send(self) -> Result<BucketVersioning> {
        let body = get_config(&self.client, &self.bucket, "versioning")?;
        util::xml::parse_versioning(&body)
    }
}

/// Request builder for changing bucket versioning.
pub struct PutBucketVersioningRequest {
    client: Client,
    bucket: String,
    status: VersioningStatus,
    mfa_delete: Option<MfaDeleteStatus>,
    mfa: Option<Mfa>,
}

impl PutBucketVersioningRequest {
    /// Changing MFA delete also requires [`mfa`](Self::mfa).
    pub fn mfa_delete(mut self, status: MfaDeleteStatus) -> Self {
        self.mfa_delete = Some(status);
        self
    }

    pub fn mfa(mut self, mfa: Mfa) -> Self {
        self.mfa = Some(mfa);
        self
    }

    pub fn send(self) -> Result<()> {
        if self.mfa_delete.is_some() && self.mfa.is_none() {
            return Err(Error::invalid_config(
                "changing MFA delete requires an MFA token",
            ));
        }
        let configuration = BucketVersioning {
            status: Some(self.status),
            mfa_delete: self.mfa_delete,
        };
        let body = util::xml::encode_versioning(&configuration)?;
        let request = xml_request(&self.client, &self.bucket, "versioning", body)?
            .with_mfa(self.mfa.as_ref())?;
        put_config(&self.client, request)
    }
}

/// Request builder for reading who pays for requests.
pub struct GetRequestPaymentRequest {
    client: Client,
    bucket: String,
}

impl GetRequestPaymentRequest {
    pub fn send(self) -> Result<Payer> {
        let body = get_config(&self.client, &self.bucket, "requestPayment")?;
        util::xml::parse_request_payment(&body)
    }
}

/// Request builder for changing who pays for requests.
pub struct PutRequestPaymentRequest {
    client: Client,
    bucket: String,
    payer: Payer,
}

impl PutRequestPaymentRequest {
    pub fn send(self) -> Result<()> {
        let body = util::xml::encode_request_payment(self.payer)?;
        let request = xml_request(&self.client, &self.bucket, "requestPayment", body)?;
        put_config(&self.client, request)
    }
}
