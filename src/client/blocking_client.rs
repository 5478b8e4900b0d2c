use std::{sync::Arc, time::Duration};

use http::{HeaderMap, Method, StatusCode, header};
use url::Url;

use crate::{
    api,
    auth::{AddressingStyle, Auth, DevPayTokens},
    client::{
        clock::{ClockOffset, ServiceTimeAuthority, TimeAuthority},
        executor::{self, Response, RetryConfig},
    },
    error::{Error, Result},
    request::{OutboundRequest, QueryParams},
    transport::{HttpTransport, blocking_transport::UreqTransport},
    types::PresignedRequest,
    util,
};

/// S3 REST client. Cheap to clone; clones share the connection pool and clock offset.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

pub struct ClientBuilder {
    endpoint: Url,
    virtual_path: String,
    auth: Auth,
    addressing: AddressingStyle,
    retry: RetryConfig,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    requester_pays: bool,
    devpay: Option<DevPayTokens>,
    default_storage_class: Option<String>,
    transport: Option<Arc<dyn HttpTransport>>,
    time_authority: Option<Arc<dyn TimeAuthority>>,
}

/// Settings that shape every outbound request.
#[derive(Clone, Debug)]
pub(crate) struct ClientConfig {
    pub(crate) endpoint: Url,
    /// Path prefix under the endpoint, without trailing slash; empty for none.
    pub(crate) virtual_path: String,
    pub(crate) auth: Auth,
    pub(crate) addressing: AddressingStyle,
    pub(crate) requester_pays: bool,
    pub(crate) devpay: Option<DevPayTokens>,
    pub(crate) default_storage_class: Option<String>,
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) time_authority: Arc<dyn TimeAuthority>,
    pub(crate) clock: ClockOffset,
    pub(crate) retry: RetryConfig,
}

impl Client {
    pub fn builder(endpoint: impl AsRef<str>) -> Result<ClientBuilder> {
        ClientBuilder::new(endpoint.as_ref())
    }

    pub fn objects(&self) -> api::ObjectsService {
        api::ObjectsService::new(self.clone())
    }

    pub fn buckets(&self) -> api::BucketsService {
        api::BucketsService::new(self.clone())
    }

    /// Current correction applied to request dates, in milliseconds.
    pub fn clock_offset_millis(&self) -> i64 {
        self.inner.clock.get()
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn execute(
        &self,
        request: OutboundRequest,
        accepted: &[StatusCode],
    ) -> Result<Response> {
        executor::execute(&self.inner, request, accepted)
    }

    pub(crate) fn presign(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        expires_in: Duration,
        query: &QueryParams,
        headers: HeaderMap,
    ) -> Result<PresignedRequest> {
        let creds = self
            .inner
            .config
            .auth
            .credentials()
            .ok_or_else(|| Error::invalid_config("presign requires credentials"))?;

        let request = OutboundRequest::build(
            &self.inner.config,
            method,
            bucket,
            Some(key),
            query,
            headers,
            &[],
        )?;

        let expires_in = i64::try_from(expires_in.as_secs())
            .map_err(|_| Error::invalid_config("presign expiry is too large"))?;
        let expires = util::time::now_with_offset(self.inner.clock.get()).unix_timestamp()
            + expires_in;

        let params = util::signing::presign_params(
            creds,
            &request.method,
            &request.resource,
            &request.headers,
            expires,
        )?;

        let mut url = request.url;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &params {
                pairs.append_pair(k, v);
            }
        }

        let mut headers = request.headers;
        if headers
            .get(header::CONTENT_TYPE)
            .is_some_and(|v| v.is_empty())
        {
            headers.remove(header::CONTENT_TYPE);
        }

        Ok(PresignedRequest {
            method: request.method,
            url,
            headers,
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("retry", &self.inner.retry)
            .field("clock_offset_ms", &self.inner.clock.get())
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|_| Error::invalid_config("endpoint must be a valid absolute URL"))?;

        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(Error::invalid_config(
                "endpoint scheme must be http or https",
            ));
        }
        if endpoint.host_str().is_none() {
            return Err(Error::invalid_config("endpoint must include host"));
        }
        if endpoint.query().is_some() || endpoint.fragment().is_some() {
            return Err(Error::invalid_config(
                "endpoint must not include query or fragment",
            ));
        }

        let virtual_path = normalize_virtual_path(endpoint.path());
        let mut endpoint = endpoint;
        endpoint.set_path("/");

        Ok(Self {
            endpoint,
            virtual_path,
            auth: Auth::Anonymous,
            addressing: AddressingStyle::Auto,
            retry: RetryConfig::default(),
            timeout: None,
            user_agent: None,
            requester_pays: false,
            devpay: None,
            default_storage_class: None,
            transport: None,
            time_authority: None,
        })
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn addressing_style(mut self, style: AddressingStyle) -> Self {
        self.addressing = style;
        self
    }

    /// Path prefix prepended to every request path, e.g. `/services/Walrus`.
    pub fn virtual_path(mut self, path: impl AsRef<str>) -> Self {
        self.virtual_path = normalize_virtual_path(path.as_ref());
        self
    }

    /// Overall timeout per HTTP attempt. Ignored with a custom transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn base_retry_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.retry.max_delay = delay;
        self
    }

    pub fn request_timeout_retries(mut self, retries: u32) -> Self {
        self.retry.request_timeout_retries = retries;
        self
    }

    pub fn clock_skew_retries(mut self, retries: u32) -> Self {
        self.retry.clock_skew_retries = retries;
        self
    }

    /// Sends `x-amz-request-payer: requester` with every request.
    pub fn requester_pays(mut self, enabled: bool) -> Self {
        self.requester_pays = enabled;
        self
    }

    pub fn devpay_tokens(mut self, tokens: DevPayTokens) -> Self {
        self.devpay = Some(tokens);
        self
    }

    /// Storage class for uploads that do not set one.
    pub fn default_storage_class(mut self, class: impl Into<String>) -> Self {
        self.default_storage_class = Some(class.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn time_authority(mut self, authority: Arc<dyn TimeAuthority>) -> Self {
        self.time_authority = Some(authority);
        self
    }

    pub fn build(self) -> Result<Client> {
        if self.retry.max_delay < self.retry.base_delay {
            return Err(Error::invalid_config(
                "max retry delay must not be shorter than the base delay",
            ));
        }

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(UreqTransport::new(self.timeout, self.user_agent)) as Arc<dyn HttpTransport>
        });

        let time_authority = match self.time_authority {
            Some(authority) => authority,
            None => {
                let mut probe = self.endpoint.clone();
                probe.set_path(&format!("{}/", self.virtual_path));
                Arc::new(ServiceTimeAuthority::new(transport.clone(), probe))
            }
        };

        Ok(Client {
            inner: Arc::new(Inner {
                config: ClientConfig {
                    endpoint: self.endpoint,
                    virtual_path: self.virtual_path,
                    auth: self.auth,
                    addressing: self.addressing,
                    requester_pays: self.requester_pays,
                    devpay: self.devpay,
                    default_storage_class: self.default_storage_class,
                },
                transport,
                time_authority,
                clock: ClockOffset::default(),
                retry: self.retry,
            }),
        })
    }
}

fn normalize_virtual_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
