//! Drives one logical request to a definitive outcome.
//!
//! Each pass re-signs the request, sends it and classifies the response:
//! temporary redirects are followed (bounded), 500/503 are retried with
//! backoff, `RequestTimeout` error documents are retried a bounded number of
//! times, and `RequestTimeTooSkewed` triggers a clock correction before the
//! retry. Anything else not accepted by the caller is terminal.

use std::time::Duration;

#[cfg(feature = "metrics")]
use std::time::Instant;

use http::{HeaderMap, Method, StatusCode, header};

use crate::{
    client::Inner,
    error::{Error, Result, is_transient_status},
    mapper::response_error,
    request::OutboundRequest,
    transport::{ResponseBody, TransportRequest},
    types::XmlError,
    util::{self, headers::service_identifiers},
};

/// Redirects followed before the request is abandoned.
pub(crate) const MAX_REDIRECTS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RetryConfig {
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) request_timeout_retries: u32,
    pub(crate) clock_skew_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(20),
            request_timeout_retries: 5,
            clock_skew_retries: 3,
        }
    }
}

pub(crate) fn backoff_delay(config: RetryConfig, attempt: u32) -> Duration {
    let attempt = attempt.saturating_sub(1);
    let factor = 1u32 << attempt.min(16);
    let millis = config
        .base_delay
        .as_millis()
        .saturating_mul(u128::from(factor));
    let capped = millis.min(config.max_delay.as_millis());

    let jitter = jitter_millis(capped);
    Duration::from_millis(jitter as u64)
}

/// Uniform-ish value in the upper half of `[0, max_millis]`.
fn jitter_millis(max_millis: u128) -> u128 {
    if max_millis <= 1 {
        return max_millis;
    }

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u128)
        .unwrap_or(0);

    let half = max_millis / 2;
    half + nanos % (max_millis - half + 1)
}

/// Outcome of one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Disposition {
    Success,
    Redirect,
    Transient,
    RequestTimeout,
    ClockSkew,
    Failure,
}

pub(crate) fn classify(
    status: StatusCode,
    accepted: &[StatusCode],
    parsed: Option<&XmlError>,
) -> Disposition {
    if status == StatusCode::TEMPORARY_REDIRECT {
        return Disposition::Redirect;
    }
    if is_transient_status(status) {
        return Disposition::Transient;
    }
    if accepted.contains(&status) {
        return Disposition::Success;
    }
    match parsed.and_then(|p| p.code.as_deref()) {
        Some("RequestTimeout") => Disposition::RequestTimeout,
        Some("RequestTimeTooSkewed") => Disposition::ClockSkew,
        _ => Disposition::Failure,
    }
}

/// Whether the body has to be read to classify the response.
fn needs_error_body(status: StatusCode, accepted: &[StatusCode]) -> bool {
    status != StatusCode::TEMPORARY_REDIRECT
        && !is_transient_status(status)
        && !accepted.contains(&status)
}

/// Successful response whose body is still open.
#[derive(Debug)]
pub(crate) struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: ResponseBody,
}

impl Response {
    pub(crate) fn read_string(&mut self) -> Result<String> {
        let bytes = self
            .body
            .read_to_vec()
            .map_err(|e| Error::transport("failed to read response body", Some(Box::new(e))))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn releases_immediately(method: &Method, status: StatusCode, headers: &HeaderMap) -> bool {
    method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || util::headers::header_u64(headers, header::CONTENT_LENGTH) == Some(0)
}

pub(crate) fn execute(
    inner: &Inner,
    mut request: OutboundRequest,
    accepted: &[StatusCode],
) -> Result<Response> {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!(
        "s3.request",
        method = %request.method,
        bucket = request.bucket.as_deref().unwrap_or(""),
        key = request.key.as_deref().unwrap_or(""),
        host = request.url.host_str().unwrap_or(""),
    )
    .entered();

    let retry = inner.retry;
    let mut attempt = 0u32;
    let mut redirects = 0u32;
    let mut transient = 0u32;
    let mut timeouts = 0u32;
    let mut skews = 0u32;
    let mut redirected = false;

    loop {
        attempt += 1;
        request.check_cancelled()?;

        if attempt == 1 {
            request.ensure_date(inner.clock.get())?;
        } else if !redirected {
            request.refresh_date(inner.clock.get())?;
        }
        redirected = false;
        request.authorize(&inner.config.auth)?;
        let body = request.body.for_attempt()?;

        #[cfg(feature = "tracing")]
        let _attempt_span = tracing::debug_span!(
            "s3.http",
            attempt,
            url = %request.url,
        )
        .entered();
        #[cfg(feature = "metrics")]
        metrics::counter!("s3_http_attempts_total", "method" => method_label(&request.method))
            .increment(1);
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let sent = inner.transport.send(TransportRequest {
            method: &request.method,
            url: &request.url,
            headers: &request.headers,
            body,
        });

        #[cfg(feature = "metrics")]
        metrics::histogram!(
            "s3_http_request_duration_seconds",
            "method" => method_label(&request.method),
        )
        .record(start.elapsed().as_secs_f64());

        let mut resp = match sent {
            Ok(resp) => resp,
            Err(err) => {
                record_error(err.kind().as_str());
                return Err(err.enrich(request.context(None), None, None));
            }
        };
        let status = resp.status;

        let error_body = if needs_error_body(status, accepted) {
            let bytes = resp.body.read_to_vec();
            let text = match bytes {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    record_error("transport");
                    let (request_id, host_id) = service_identifiers(&resp.headers);
                    return Err(
                        Error::transport("failed to read error response body", Some(Box::new(e)))
                            .enrich(request.context(Some(&resp.headers)), request_id, host_id),
                    );
                }
            };
            let parsed = util::xml::parse_error_xml(&text);
            Some((text, parsed))
        } else {
            None
        };
        let parsed = error_body.as_ref().and_then(|(_, p)| p.as_ref());

        match classify(status, accepted, parsed) {
            Disposition::Success => {
                if releases_immediately(&request.method, status, &resp.headers) {
                    resp.body.release();
                    #[cfg(feature = "tracing")]
                    tracing::debug!(status = %status, "released empty response");
                }
                return Ok(Response {
                    status,
                    headers: resp.headers,
                    body: resp.body,
                });
            }
            Disposition::Redirect => {
                resp.body.release();
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    #[cfg(feature = "tracing")]
                    tracing::error!(redirects, "redirect limit exceeded");
                    record_error("configuration");
                    return Err(Error::invalid_config(format!(
                        "exceeded {MAX_REDIRECTS} redirects for {} {}",
                        request.method,
                        request.url.path()
                    )));
                }
                let location = util::headers::header_string(&resp.headers, header::LOCATION)
                    .ok_or_else(|| {
                        Error::decode("temporary redirect without Location header", None)
                            .enrich(request.context(Some(&resp.headers)), None, None)
                    })?;
                #[cfg(feature = "tracing")]
                tracing::debug!(%location, redirects, "following temporary redirect");
                record_retry("redirect");
                request.redirect_to(&location)?;
                redirected = true;
            }
            Disposition::Transient => {
                resp.body.release();
                transient += 1;
                let delay = backoff_delay(retry, transient);
                #[cfg(feature = "tracing")]
                tracing::debug!(status = %status, retries = transient, ?delay, "retrying after service overload");
                record_retry("transient");
                std::thread::sleep(delay);
            }
            Disposition::RequestTimeout => {
                timeouts += 1;
                if timeouts > retry.request_timeout_retries {
                    #[cfg(feature = "tracing")]
                    tracing::error!(timeouts, "request timeout retries exhausted");
                    return Err(terminal(
                        &request,
                        status,
                        resp.reason.as_deref(),
                        &resp.headers,
                        error_body,
                    ));
                }
                #[cfg(feature = "tracing")]
                tracing::warn!(retries = timeouts, "service timed out waiting for the request; retrying");
                record_retry("request_timeout");
            }
            Disposition::ClockSkew => {
                skews += 1;
                if skews > retry.clock_skew_retries {
                    #[cfg(feature = "tracing")]
                    tracing::error!(skews, "clock skew retries exhausted");
                    return Err(terminal(
                        &request,
                        status,
                        resp.reason.as_deref(),
                        &resp.headers,
                        error_body,
                    ));
                }
                let offset = inner
                    .time_authority
                    .offset_millis()
                    .map_err(|e| e.enrich(request.context(Some(&resp.headers)), None, None))?;
                inner.clock.set(offset);
                #[cfg(feature = "tracing")]
                tracing::warn!(offset_ms = offset, "adjusted clock offset after skew error");
                record_retry("clock_skew");
            }
            Disposition::Failure => {
                #[cfg(feature = "tracing")]
                tracing::warn!(status = %status, code = ?parsed.and_then(|p| p.code.as_deref()), "service rejected request");
                return Err(terminal(
                    &request,
                    status,
                    resp.reason.as_deref(),
                    &resp.headers,
                    error_body,
                ));
            }
        }
    }
}

fn terminal(
    request: &OutboundRequest,
    status: StatusCode,
    reason: Option<&str>,
    headers: &HeaderMap,
    error_body: Option<(String, Option<XmlError>)>,
) -> Error {
    let (text, parsed) = error_body.unwrap_or_default();
    let err = response_error(status, reason, headers, &text, parsed);
    record_error(err.kind().as_str());
    err.enrich(request.context(Some(headers)), None, None)
}

#[cfg(feature = "metrics")]
fn record_retry(reason: &'static str) {
    metrics::counter!("s3_http_retries_total", "reason" => reason).increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_retry(_reason: &'static str) {}

#[cfg(feature = "metrics")]
fn record_error(kind: &'static str) {
    metrics::counter!("s3_http_errors_total", "kind" => kind).increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_error(_kind: &'static str) {}

#[cfg(feature = "metrics")]
fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "PUT" => "PUT",
        "HEAD" => "HEAD",
        "DELETE" => "DELETE",
        _ => "OTHER",
    }
}
