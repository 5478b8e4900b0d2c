use std::time::Duration;

use http::HeaderMap;

use crate::{
    error::{Error, Result},
    transport::{HttpTransport, ResponseBody, TransportBody, TransportRequest, TransportResponse},
};

/// [`HttpTransport`] backed by a `ureq` agent.
///
/// Redirects are not followed and error statuses are returned as responses.
pub struct UreqTransport {
    agent: ureq::Agent,
    timeout: Option<Duration>,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>, user_agent: Option<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            timeout,
            user_agent: user_agent.unwrap_or_else(default_user_agent),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: TransportRequest<'_>) -> Result<TransportResponse> {
        let url = request.url.as_str();
        let headers = request.headers;

        let result = match request.method.as_str() {
            "GET" => {
                ensure_empty_body(&request.body)?;
                apply_headers(self.agent.get(url), headers, &self.user_agent, self.timeout).call()
            }
            "HEAD" => {
                ensure_empty_body(&request.body)?;
                apply_headers(self.agent.head(url), headers, &self.user_agent, self.timeout).call()
            }
            "DELETE" => {
                ensure_empty_body(&request.body)?;
                apply_headers(self.agent.delete(url), headers, &self.user_agent, self.timeout)
                    .call()
            }
            "PUT" => {
                let req =
                    apply_headers(self.agent.put(url), headers, &self.user_agent, self.timeout);
                match request.body {
                    TransportBody::Empty => req.send_empty(),
                    TransportBody::Bytes(b) => req.send(b.as_ref()),
                    TransportBody::Stream {
                        mut reader,
                        content_length,
                    } => {
                        let req = match content_length {
                            Some(len) if !headers.contains_key(http::header::CONTENT_LENGTH) => {
                                req.header(http::header::CONTENT_LENGTH, len.to_string())
                            }
                            _ => req,
                        };
                        req.send(ureq::SendBody::from_reader(&mut *reader))
                    }
                }
            }
            _ => return Err(Error::invalid_config("unsupported HTTP method")),
        };

        let resp = result.map_err(|err| {
            Error::transport(
                format!("request failed: {} {url}", request.method),
                Some(Box::new(err)),
            )
        })?;

        let (parts, body) = resp.into_parts();
        Ok(TransportResponse {
            status: parts.status,
            reason: None,
            headers: parts.headers,
            body: ResponseBody::new(body.into_reader()),
        })
    }
}

fn ensure_empty_body(body: &TransportBody) -> Result<()> {
    match body {
        TransportBody::Empty => Ok(()),
        _ => Err(Error::invalid_config(
            "this operation does not accept a request body",
        )),
    }
}

fn apply_headers<B>(
    mut req: ureq::RequestBuilder<B>,
    headers: &HeaderMap,
    user_agent: &str,
    timeout: Option<Duration>,
) -> ureq::RequestBuilder<B> {
    req = req.header(http::header::USER_AGENT, user_agent);
    for (name, value) in headers.iter() {
        req = req.header(name.clone(), value.clone());
    }

    if let Some(timeout) = timeout {
        req = req.config().timeout_global(Some(timeout)).build();
    }

    req
}

pub(crate) fn default_user_agent() -> String {
    format!("s3-rest/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use std::{
        io::{ErrorKind, Read, Write},
        net::TcpListener,
        sync::mpsc,
        time::Instant,
    };

    use bytes::Bytes;
    use http::{Method, StatusCode};
    use url::Url;

    use super::*;

    /// Accepts one connection, captures the request and writes `response`.
    fn serve_once(response: &'static [u8]) -> (Url, mpsc::Receiver<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = stream.set_nonblocking(false);
                        let _ = stream.set_read_timeout(Some(Duration::from_millis(500)));
                        let mut request = Vec::new();
                        let mut buf = [0u8; 1024];
                        loop {
                            match stream.read(&mut buf) {
                                Ok(0) => break,
                                Ok(n) => {
                                    request.extend_from_slice(&buf[..n]);
                                    if request_complete(&request) || request.len() > 64 * 1024 {
                                        break;
                                    }
                                }
                                Err(err)
                                    if matches!(
                                        err.kind(),
                                        ErrorKind::WouldBlock | ErrorKind::TimedOut
                                    ) =>
                                {
                                    break;
                                }
                                Err(_) => break,
                            }
                        }
                        let _ = stream.write_all(response);
                        let _ = stream.flush();
                        let _ = tx.send(request);
                        break;
                    }
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {
                        if Instant::now() >= deadline {
                            break;
                        }
                        std::thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        (Url::parse(&format!("http://{addr}/bucket/key")).unwrap(), rx)
    }

    fn request_complete(request: &[u8]) -> bool {
        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= end + 4 + length
    }

    fn transport() -> UreqTransport {
        UreqTransport::new(Some(Duration::from_secs(5)), None)
    }

    #[test]
    fn returns_response_for_http_error_status() {
        let (url, _rx) = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let headers = HeaderMap::new();
        let resp = transport()
            .send(TransportRequest {
                method: &Method::GET,
                url: &url,
                headers: &headers,
                body: TransportBody::Empty,
            })
            .unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn does_not_follow_redirects() {
        let (url, _rx) = serve_once(
            b"HTTP/1.1 307 Temporary Redirect\r\nLocation: http://127.0.0.1:1/elsewhere\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let headers = HeaderMap::new();
        let resp = transport()
            .send(TransportRequest {
                method: &Method::GET,
                url: &url,
                headers: &headers,
                body: TransportBody::Empty,
            })
            .unwrap();
        assert_eq!(resp.status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            resp.headers.get(http::header::LOCATION).unwrap(),
            "http://127.0.0.1:1/elsewhere"
        );
    }

    #[test]
    fn streams_put_body_with_declared_length() {
        let (url, rx) = serve_once(
            b"HTTP/1.1 200 OK\r\nETag: \"x\"\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-meta-color", "blue".parse().unwrap());
        let resp = transport()
            .send(TransportRequest {
                method: &Method::PUT,
                url: &url,
                headers: &headers,
                body: TransportBody::Stream {
                    reader: Box::new(&b"hello world"[..]),
                    content_length: Some(11),
                },
            })
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);

        let captured = String::from_utf8(rx.recv_timeout(Duration::from_secs(5)).unwrap()).unwrap();
        let lower = captured.to_ascii_lowercase();
        assert!(captured.starts_with("PUT /bucket/key HTTP/1.1"));
        assert!(lower.contains("content-length: 11"));
        assert!(lower.contains("x-amz-meta-color: blue"));
        assert!(lower.contains("user-agent: s3-rest/"));
        assert!(captured.ends_with("hello world"));
    }

    #[test]
    fn sends_non_ascii_metadata_values_unchanged() {
        let (url, rx) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let mut headers = HeaderMap::new();
        crate::util::metadata::apply_metadata(
            &mut headers,
            &[("note".to_string(), "café".to_string())],
        )
        .unwrap();
        transport()
            .send(TransportRequest {
                method: &Method::PUT,
                url: &url,
                headers: &headers,
                body: TransportBody::Bytes(Bytes::from_static(b"x")),
            })
            .unwrap();

        let captured = rx
            .recv_timeout(Duration::from_secs(5))
            .unwrap()
            .to_ascii_lowercase();
        let expected = "x-amz-meta-note: café".as_bytes();
        assert!(captured.windows(expected.len()).any(|w| w == expected));
    }

    #[test]
    fn rejects_body_on_get() {
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        let headers = HeaderMap::new();
        let err = transport()
            .send(TransportRequest {
                method: &Method::GET,
                url: &url,
                headers: &headers,
                body: TransportBody::Bytes(Bytes::from_static(b"x")),
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }
}
