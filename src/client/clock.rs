use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use http::{HeaderMap, Method, header};
use time::OffsetDateTime;
use url::Url;

use crate::{
    error::{Error, Result},
    transport::{HttpTransport, TransportBody, TransportRequest},
    util::{headers::header_string, time::parse_http_date},
};

/// Source of the service's notion of the current time.
pub trait TimeAuthority: Send + Sync {
    /// Milliseconds to add to local time to match the service clock.
    fn offset_millis(&self) -> Result<i64>;
}

/// Asks the service itself: sends an unsigned HEAD to the endpoint root and
/// compares the response `Date` with local time.
pub struct ServiceTimeAuthority {
    transport: Arc<dyn HttpTransport>,
    url: Url,
}

impl ServiceTimeAuthority {
    pub fn new(transport: Arc<dyn HttpTransport>, url: Url) -> Self {
        Self { transport, url }
    }
}

impl TimeAuthority for ServiceTimeAuthority {
    fn offset_millis(&self) -> Result<i64> {
        let headers = HeaderMap::new();
        let mut resp = self.transport.send(TransportRequest {
            method: &Method::HEAD,
            url: &self.url,
            headers: &headers,
            body: TransportBody::Empty,
        })?;
        resp.body.release();

        let date = header_string(&resp.headers, header::DATE)
            .ok_or_else(|| Error::decode("time probe response carries no Date header", None))?;
        let server = parse_http_date(&date)
            .ok_or_else(|| Error::decode(format!("unparseable Date header: {date}"), None))?;

        Ok(offset_between(server, OffsetDateTime::now_utc()))
    }
}

impl std::fmt::Debug for ServiceTimeAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTimeAuthority")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

fn offset_between(server: OffsetDateTime, local: OffsetDateTime) -> i64 {
    let millis = (server - local).whole_milliseconds();
    i64::try_from(millis).unwrap_or(if millis < 0 { i64::MIN } else { i64::MAX })
}

/// Signed millisecond correction applied to request dates.
#[derive(Debug, Default)]
pub(crate) struct ClockOffset(AtomicI64);

impl ClockOffset {
    pub(crate) fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::Relaxed);
    }
}
