//! HTTP transport boundary and request/response bodies.

use std::{
    fmt,
    io::{self, Cursor, Read},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::{
    error::{Error, Result},
    util::{
        md5::{Md5Reader, Md5Tracker},
        progress::{ProgressReader, ProgressWatcher},
    },
};

pub(crate) mod blocking_transport;

pub use blocking_transport::UreqTransport;

/// Streaming request payload.
pub type BodyReader = Box<dyn Read + Send>;

/// Payload for a single attempt.
pub enum TransportBody {
    Empty,
    Bytes(Bytes),
    Stream {
        reader: BodyReader,
        content_length: Option<u64>,
    },
}

impl fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream { content_length, .. } => f
                .debug_struct("Stream")
                .field("content_length", content_length)
                .finish_non_exhaustive(),
        }
    }
}

/// One fully signed attempt handed to an [`HttpTransport`].
#[derive(Debug)]
pub struct TransportRequest<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    pub headers: &'a HeaderMap,
    pub body: TransportBody,
}

/// Status, headers and the still-open body of a response.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    /// Reason phrase from the status line, when the transport exposes it.
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

/// Sends a single HTTP exchange.
///
/// Implementations must return non-2xx responses as `Ok` and must not follow
/// redirects; both are handled by the client. Dropping the returned body
/// releases the underlying connection.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: TransportRequest<'_>) -> Result<TransportResponse>;
}

/// Open response body. The connection is released when the reader is dropped.
pub struct ResponseBody {
    reader: Option<Box<dyn Read>>,
}

impl ResponseBody {
    pub fn new<R>(reader: R) -> Self
    where
        R: Read + 'static,
    {
        Self {
            reader: Some(Box::new(reader)),
        }
    }

    pub fn empty() -> Self {
        Self { reader: None }
    }

    /// Drops the reader. Calling this again has no effect.
    pub fn release(&mut self) {
        self.reader = None;
    }

    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    /// Reads the remaining bytes and releases the reader, also on failure.
    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let result = match self.reader.as_mut() {
            Some(r) => r.read_to_end(&mut out).map(|_| ()),
            None => Ok(()),
        };
        self.release();
        result.map(|()| out)
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(r) => r.read(buf),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("released", &self.is_released())
            .finish()
    }
}

type Opener = Arc<dyn Fn() -> io::Result<BodyReader> + Send + Sync>;

enum Source {
    Empty,
    Bytes(Bytes),
    Reopen {
        open: Opener,
        content_length: Option<u64>,
    },
    Stream {
        reader: Option<BodyReader>,
        content_length: Option<u64>,
    },
}

struct Progress {
    watcher: Arc<dyn ProgressWatcher>,
    sent: Arc<AtomicI64>,
}

/// Request payload.
///
/// Empty, buffered and re-openable bodies can be sent any number of times.
/// A one-shot stream is sent at most once: an attempt that would need to
/// resend it fails with a configuration error instead.
pub struct RequestBody {
    source: Source,
    progress: Option<Progress>,
    digest: Option<Md5Tracker>,
}

impl RequestBody {
    pub fn empty() -> Self {
        Self::from_source(Source::Empty)
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::from_source(Source::Bytes(bytes.into()))
    }

    /// Body produced by calling `open` once per attempt.
    pub fn reopenable<F>(content_length: Option<u64>, open: F) -> Self
    where
        F: Fn() -> io::Result<BodyReader> + Send + Sync + 'static,
    {
        Self::from_source(Source::Reopen {
            open: Arc::new(open),
            content_length,
        })
    }

    /// File body, reopened for each attempt.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let len = std::fs::metadata(&path)
            .map_err(|e| {
                Error::invalid_config(format!("cannot read upload file {}: {e}", path.display()))
            })?
            .len();
        Ok(Self::reopenable(Some(len), move || {
            std::fs::File::open(&path).map(|f| Box::new(f) as BodyReader)
        }))
    }

    pub fn one_shot<R>(reader: R, content_length: Option<u64>) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::from_source(Source::Stream {
            reader: Some(Box::new(reader)),
            content_length,
        })
    }

    fn from_source(source: Source) -> Self {
        Self {
            source,
            progress: None,
            digest: None,
        }
    }

    /// Reports bytes read by the transport to `watcher`.
    pub fn with_progress(mut self, watcher: Arc<dyn ProgressWatcher>) -> Self {
        self.progress = Some(Progress {
            watcher,
            sent: Arc::new(AtomicI64::new(0)),
        });
        self
    }

    pub fn is_repeatable(&self) -> bool {
        !matches!(self.source, Source::Stream { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.source, Source::Empty)
    }

    pub fn content_length(&self) -> Option<u64> {
        match &self.source {
            Source::Empty => Some(0),
            Source::Bytes(b) => Some(b.len() as u64),
            Source::Reopen { content_length, .. } | Source::Stream { content_length, .. } => {
                *content_length
            }
        }
    }

    /// Hashes the payload as it is handed to the transport. The digest is
    /// restarted on every attempt, so after the last one it covers exactly
    /// the bytes that were sent.
    pub(crate) fn track_md5(&mut self) -> Md5Tracker {
        self.digest.get_or_insert_with(Md5Tracker::default).clone()
    }

    /// Produces the payload for the next attempt.
    pub(crate) fn for_attempt(&mut self) -> Result<TransportBody> {
        if let Some(progress) = &self.progress {
            let rewound = progress.sent.swap(0, Ordering::Relaxed);
            if rewound > 0 {
                progress.watcher.bytes_transferred(-rewound);
            }
        }
        if let Some(digest) = &self.digest {
            digest.reset();
        }

        let (reader, content_length): (BodyReader, Option<u64>) = match &mut self.source {
            Source::Empty => return Ok(TransportBody::Empty),
            Source::Bytes(b) if self.progress.is_none() => {
                if let Some(digest) = &self.digest {
                    digest.update(b);
                }
                return Ok(TransportBody::Bytes(b.clone()));
            }
            Source::Bytes(b) => (Box::new(Cursor::new(b.clone())), Some(b.len() as u64)),
            Source::Reopen {
                open,
                content_length,
            } => {
                let reader = open().map_err(|e| {
                    Error::transport("failed to open request body", Some(Box::new(e)))
                })?;
                (reader, *content_length)
            }
            Source::Stream {
                reader,
                content_length,
            } => {
                let reader = reader.take().ok_or_else(|| {
                    Error::invalid_config("one-shot request body cannot be resent on retry")
                })?;
                (reader, *content_length)
            }
        };

        let reader = match &self.progress {
            Some(progress) => Box::new(
                ProgressReader::new(reader, progress.watcher.clone())
                    .tracking(progress.sent.clone()),
            ) as BodyReader,
            None => reader,
        };
        let reader = match &self.digest {
            Some(digest) => Box::new(Md5Reader::new(reader, digest.clone())) as BodyReader,
            None => reader,
        };

        Ok(TransportBody::Stream {
            reader,
            content_length,
        })
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for RequestBody {
    fn from(value: Bytes) -> Self {
        Self::from_bytes(value)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        Self::from_bytes(value)
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.source {
            Source::Empty => "empty",
            Source::Bytes(_) => "bytes",
            Source::Reopen { .. } => "reopenable",
            Source::Stream { .. } => "one-shot",
        };
        f.debug_struct("RequestBody")
            .field("kind", &kind)
            .field("content_length", &self.content_length())
            .field("progress", &self.progress.is_some())
            .field("md5", &self.digest.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::util::progress::ByteCounter;

    fn drain(body: TransportBody) -> Vec<u8> {
        match body {
            TransportBody::Empty => Vec::new(),
            TransportBody::Bytes(b) => b.to_vec(),
            TransportBody::Stream { mut reader, .. } => {
                let mut out = Vec::new();
                reader.read_to_end(&mut out).unwrap();
                out
            }
        }
    }

    #[test]
    fn one_shot_body_fails_fast_on_second_attempt() {
        let mut body = RequestBody::one_shot(&b"payload"[..], Some(7));
        assert!(!body.is_repeatable());
        assert_eq!(drain(body.for_attempt().unwrap()), b"payload");

        let err = body.for_attempt().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn reopenable_body_opens_once_per_attempt() {
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = opens.clone();
        let mut body = RequestBody::reopenable(Some(3), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Cursor::new(b"abc".to_vec())) as BodyReader)
        });

        assert_eq!(drain(body.for_attempt().unwrap()), b"abc");
        assert_eq!(drain(body.for_attempt().unwrap()), b"abc");
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tracked_digest_restarts_on_every_attempt() {
        let mut body = RequestBody::reopenable(Some(3), || {
            Ok(Box::new(Cursor::new(b"abc".to_vec())) as BodyReader)
        });
        let digest = body.track_md5();

        assert_eq!(drain(body.for_attempt().unwrap()), b"abc");
        assert_eq!(drain(body.for_attempt().unwrap()), b"abc");
        assert_eq!(digest.hex(), "900150983cd24fb0d6963f7d28e17f72");

        let mut one_shot = RequestBody::one_shot(&b"abc"[..], Some(3));
        let digest = one_shot.track_md5();
        assert_eq!(drain(one_shot.for_attempt().unwrap()), b"abc");
        assert_eq!(digest.hex(), "900150983cd24fb0d6963f7d28e17f72");

        let mut buffered = RequestBody::from_bytes(&b"abc"[..]);
        let digest = buffered.track_md5();
        drain(buffered.for_attempt().unwrap());
        drain(buffered.for_attempt().unwrap());
        assert_eq!(digest.hex(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn progress_rewinds_on_retry() {
        let counter = Arc::new(ByteCounter::new());
        let mut body = RequestBody::from_bytes(vec![0u8; 4096]).with_progress(counter.clone());

        assert_eq!(drain(body.for_attempt().unwrap()).len(), 4096);
        assert_eq!(counter.total(), 4096);

        assert_eq!(drain(body.for_attempt().unwrap()).len(), 4096);
        assert_eq!(counter.total(), 4096);
    }

    #[test]
    fn response_body_release_is_idempotent() {
        let mut body = ResponseBody::new(Cursor::new(b"<Error/>".to_vec()));
        assert!(!body.is_released());
        assert_eq!(body.read_to_vec().unwrap(), b"<Error/>");
        assert!(body.is_released());
        body.release();
        assert!(body.is_released());
        assert_eq!(body.read_to_vec().unwrap(), Vec::<u8>::new());
    }
}
