//! Logical operations turned into fully addressed, signable requests.

use http::{HeaderMap, HeaderValue, Method, header};
use url::Url;

use crate::{
    auth::{Auth, Mfa},
    cancel::CancellationToken,
    client::ClientConfig,
    error::{Error, RequestContext, Result},
    transport::RequestBody,
    util::{
        self,
        headers::{AMZ_MFA, AMZ_REQUEST_PAYER, AMZ_SECURITY_TOKEN},
        url::Target,
    },
};

/// Ordered query parameters; a `None` value renders as a bare key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct QueryParams(Vec<(String, Option<String>)>);

impl QueryParams {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), Some(value.into())));
        self
    }

    pub(crate) fn push_opt(&mut self, key: impl Into<String>, value: Option<String>) -> &mut Self {
        if let Some(value) = value {
            self.0.push((key.into(), Some(value)));
        }
        self
    }

    /// Adds a value-less parameter such as `acl` or `versions`.
    pub(crate) fn flag(&mut self, key: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), None));
        self
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub(crate) fn wire(&self) -> String {
        util::encode::wire_query_string(self.iter())
    }
}

/// A request ready to be executed, re-signed on each attempt.
#[derive(Debug)]
pub(crate) struct OutboundRequest {
    pub(crate) method: Method,
    pub(crate) bucket: Option<String>,
    pub(crate) key: Option<String>,
    pub(crate) url: Url,
    /// Canonical resource: bucket-qualified path plus signed sub-resources.
    pub(crate) resource: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: RequestBody,
    pub(crate) cancel: Option<CancellationToken>,
}

impl OutboundRequest {
    /// Builds a bucket-scoped request. Fails before any network activity
    /// when the bucket is empty or the metadata is not representable.
    pub(crate) fn build(
        config: &ClientConfig,
        method: Method,
        bucket: &str,
        key: Option<&str>,
        query: &QueryParams,
        headers: HeaderMap,
        metadata: &[(String, String)],
    ) -> Result<Self> {
        if bucket.trim().is_empty() {
            return Err(Error::invalid_config("bucket name must not be empty"));
        }
        Self::assemble(config, method, Some(bucket), key, query, headers, metadata)
    }

    /// Builds a request against the service root, as used by the bucket listing.
    pub(crate) fn service(
        config: &ClientConfig,
        method: Method,
        query: &QueryParams,
        headers: HeaderMap,
    ) -> Result<Self> {
        Self::assemble(config, method, None, None, query, headers, &[])
    }

    fn assemble(
        config: &ClientConfig,
        method: Method,
        bucket: Option<&str>,
        key: Option<&str>,
        query: &QueryParams,
        mut headers: HeaderMap,
        metadata: &[(String, String)],
    ) -> Result<Self> {
        util::metadata::apply_metadata(&mut headers, metadata)?;

        let resolved = util::url::resolve_url(
            &config.endpoint,
            &config.virtual_path,
            Target { bucket, key },
            &query.wire(),
            config.addressing,
        )?;
        let resource = util::signing::canonical_resource(&resolved.resource, query.iter());

        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(""));
        }
        if config.requester_pays {
            headers.insert(AMZ_REQUEST_PAYER, HeaderValue::from_static("requester"));
        }
        if let Some(tokens) = config.devpay.as_ref() {
            util::headers::insert_header(&mut headers, AMZ_SECURITY_TOKEN, &tokens.header_value())?;
        }

        Ok(Self {
            method,
            bucket: bucket.map(str::to_string),
            key: key.map(str::to_string),
            url: resolved.url,
            resource,
            headers,
            body: RequestBody::empty(),
            cancel: None,
        })
    }

    pub(crate) fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub(crate) fn with_cancel(mut self, cancel: Option<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn with_mfa(mut self, mfa: Option<&Mfa>) -> Result<Self> {
        if let Some(mfa) = mfa {
            util::headers::insert_header(&mut self.headers, AMZ_MFA, &mfa.header_value())?;
        }
        Ok(self)
    }

    /// Sets the Date header to the corrected current time.
    pub(crate) fn refresh_date(&mut self, clock_offset_millis: i64) -> Result<()> {
        let date = util::time::http_date(util::time::now_with_offset(clock_offset_millis))?;
        let value = HeaderValue::from_str(&date)
            .map_err(|_| Error::signing("request date is not a valid header"))?;
        self.headers.insert(header::DATE, value);
        Ok(())
    }

    /// Adds a Date header when none was set.
    pub(crate) fn ensure_date(&mut self, clock_offset_millis: i64) -> Result<()> {
        if self.headers.contains_key(header::DATE) {
            return Ok(());
        }
        self.refresh_date(clock_offset_millis)
    }

    /// Replaces the Authorization header for the current URL and Date.
    pub(crate) fn authorize(&mut self, auth: &Auth) -> Result<()> {
        match auth.credentials() {
            Some(creds) => util::signing::authorize(
                creds,
                &self.method,
                &self.resource,
                &mut self.headers,
            ),
            None => {
                self.headers.remove(header::AUTHORIZATION);
                Ok(())
            }
        }
    }

    /// Points the request at a redirect target and re-derives the signed
    /// resource from its host and path.
    pub(crate) fn redirect_to(&mut self, location: &str) -> Result<()> {
        let mut target = self.url.join(location).map_err(|e| {
            Error::decode(format!("invalid redirect location {location:?}"), Some(Box::new(e)))
        })?;
        if target.query().is_none() && self.url.query().is_some() {
            target.set_query(self.url.query());
        }

        let virtual_host = match (self.bucket.as_deref(), target.host_str()) {
            (Some(bucket), Some(host)) => host
                .strip_prefix(bucket)
                .is_some_and(|rest| rest.starts_with('.')),
            _ => false,
        };
        let path = match self.bucket.as_deref() {
            Some(bucket) if virtual_host => format!("/{bucket}{}", target.path()),
            _ => target.path().to_string(),
        };
        let query: Vec<(String, Option<String>)> = target
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), Some(v.into_owned()).filter(|v| !v.is_empty())))
            .collect();
        self.resource = util::signing::canonical_resource(
            &path,
            query.iter().map(|(k, v)| (k.as_str(), v.as_deref())),
        );
        self.url = target;
        Ok(())
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    pub(crate) fn context(&self, response_headers: Option<&HeaderMap>) -> RequestContext {
        RequestContext {
            method: self.method.to_string(),
            path: self.url.path().to_string(),
            host: self.url.host_str().map(str::to_string),
            response_date: response_headers
                .and_then(|h| util::headers::header_string(h, header::DATE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{AddressingStyle, Credentials, DevPayTokens},
        client::ClientConfig,
    };

    fn config() -> ClientConfig {
        ClientConfig {
            endpoint: Url::parse("https://s3.example.com").unwrap(),
            virtual_path: String::new(),
            auth: Auth::Static(Credentials::new("AKIDEXAMPLE", "secret").unwrap()),
            addressing: AddressingStyle::VirtualHosted,
            requester_pays: false,
            devpay: None,
            default_storage_class: None,
        }
    }

    fn query(pairs: &[(&str, Option<&str>)]) -> QueryParams {
        let mut params = QueryParams::new();
        for (k, v) in pairs {
            match v {
                Some(v) => params.push(*k, *v),
                None => params.flag(*k),
            };
        }
        params
    }

    #[test]
    fn empty_bucket_is_rejected() {
        let err = OutboundRequest::build(
            &config(),
            Method::GET,
            "",
            Some("k"),
            &QueryParams::new(),
            HeaderMap::new(),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn query_keeps_order_and_resource_keeps_sub_resources() {
        let req = OutboundRequest::build(
            &config(),
            Method::GET,
            "bucket",
            None,
            &query(&[
                ("versions", None),
                ("prefix", Some("a b")),
                ("acl", Some("")),
                ("max-keys", Some("10")),
            ]),
            HeaderMap::new(),
            &[],
        )
        .unwrap();

        assert_eq!(req.url.query(), Some("versions&prefix=a%20b&acl&max-keys=10"));
        assert_eq!(req.resource, "/bucket/?acl&versions");
        assert_eq!(req.headers.get(header::CONTENT_TYPE).unwrap(), "");
    }

    #[test]
    fn applies_cross_cutting_headers() {
        let mut cfg = config();
        cfg.requester_pays = true;
        cfg.devpay = Some(DevPayTokens::new("user", Some("product".to_string())));

        let req = OutboundRequest::build(
            &cfg,
            Method::DELETE,
            "bucket",
            Some("key"),
            &QueryParams::new(),
            HeaderMap::new(),
            &[],
        )
        .unwrap()
        .with_mfa(Some(&Mfa::new("serial", "123456")))
        .unwrap();

        assert_eq!(req.headers.get(AMZ_REQUEST_PAYER).unwrap(), "requester");
        assert_eq!(req.headers.get(AMZ_SECURITY_TOKEN).unwrap(), "user,product");
        assert_eq!(req.headers.get(AMZ_MFA).unwrap(), "serial 123456");
    }

    #[test]
    fn authorize_replaces_previous_signature() {
        let mut req = OutboundRequest::build(
            &config(),
            Method::GET,
            "bucket",
            Some("key"),
            &QueryParams::new(),
            HeaderMap::new(),
            &[],
        )
        .unwrap();
        req.refresh_date(0).unwrap();
        req.authorize(&config().auth).unwrap();
        req.authorize(&config().auth).unwrap();
        assert_eq!(req.headers.get_all(header::AUTHORIZATION).iter().count(), 1);
        assert_eq!(req.headers.get_all(header::DATE).iter().count(), 1);

        req.authorize(&Auth::Anonymous).unwrap();
        assert!(req.headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn redirect_keeps_query_and_rederives_resource() {
        let mut req = OutboundRequest::build(
            &config(),
            Method::GET,
            "bucket",
            Some("key"),
            &query(&[("acl", None)]),
            HeaderMap::new(),
            &[],
        )
        .unwrap();
        req.redirect_to("https://bucket.s3-eu.example.com/key").unwrap();
        assert_eq!(req.url.as_str(), "https://bucket.s3-eu.example.com/key?acl");
        assert_eq!(req.resource, "/bucket/key?acl");

        req.redirect_to("https://s3-eu.example.com/bucket/moved-key").unwrap();
        assert_eq!(req.url.as_str(), "https://s3-eu.example.com/bucket/moved-key?acl");
        assert_eq!(req.resource, "/bucket/moved-key?acl");
    }

    #[test]
    fn redirect_to_virtual_host_qualifies_the_path_with_the_bucket() {
        let mut req = OutboundRequest::build(
            &config(),
            Method::PUT,
            "bucket",
            Some("a/b"),
            &QueryParams::new(),
            HeaderMap::new(),
            &[],
        )
        .unwrap();
        req.redirect_to("https://bucket.s3-us-west.example.com/a/b%20c?versionId=v1")
            .unwrap();
        assert_eq!(req.resource, "/bucket/a/b%20c");
    }
}
