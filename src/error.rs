use std::{error::Error as StdError, fmt};

use http::StatusCode;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Closed classification of every failure the client can surface.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing bucket, invalid parameters, redirect limit exceeded.
    Configuration,
    /// Service overload (500/503).
    TransientService,
    /// The service gave up waiting for the request body.
    RequestTimeout,
    /// The request timestamp was outside the accepted window.
    ClockSkew,
    /// Any other service error, or a non-XML HTTP failure.
    Protocol,
    /// Connection or mid-stream I/O failure.
    Transport,
    /// Uploaded content hash does not match the service-reported hash.
    Integrity,
    /// The caller cancelled the operation.
    Cancelled,
}

impl ErrorKind {
    /// Maps a service error code (and its status) onto the taxonomy.
    pub fn from_code(status: StatusCode, code: Option<&str>) -> Self {
        match code {
            Some("RequestTimeout") => Self::RequestTimeout,
            Some("RequestTimeTooSkewed") => Self::ClockSkew,
            _ if is_transient_status(status) => Self::TransientService,
            _ => Self::Protocol,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::TransientService => "transient_service",
            Self::RequestTimeout => "request_timeout",
            Self::ClockSkew => "clock_skew",
            Self::Protocol => "protocol",
            Self::Transport => "transport",
            Self::Integrity => "integrity",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::INTERNAL_SERVER_ERROR || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Request and response details attached to failures for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Request method.
    pub method: String,
    /// Request path, without query.
    pub path: String,
    /// Host the request was sent to.
    pub host: Option<String>,
    /// Date header of the response, if one was received.
    pub response_date: Option<String>,
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(host) = self.host.as_deref() {
            write!(f, " host={host}")?;
        }
        if let Some(date) = self.response_date.as_deref() {
            write!(f, " date={date}")?;
        }
        Ok(())
    }
}

/// Error type for request building, transport, and API responses.
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration or parameters.
    InvalidConfig { message: String },

    /// Request signing failed.
    Signing { message: String },

    /// Service returned an error response.
    Api {
        kind: ErrorKind,
        status: StatusCode,
        reason: Option<String>,
        code: Option<String>,
        message: Option<String>,
        request_id: Option<String>,
        host_id: Option<String>,
        body_snippet: Option<String>,
        context: Option<Box<RequestContext>>,
    },

    /// Transport-level failure (HTTP client, IO, TLS).
    Transport {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
        request_id: Option<String>,
        host_id: Option<String>,
        context: Option<Box<RequestContext>>,
    },

    /// Response decode or parse failure.
    Decode {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },

    /// Content hash mismatch detected after an upload completed.
    Integrity {
        key: String,
        local_hash: String,
        service_hash: String,
    },

    /// The operation was cancelled by the caller.
    Cancelled,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { message } => f
                .debug_struct("InvalidConfig")
                .field("message", message)
                .finish(),
            Self::Signing { message } => {
                f.debug_struct("Signing").field("message", message).finish()
            }
            Self::Api {
                kind,
                status,
                reason,
                code,
                message,
                request_id,
                host_id,
                body_snippet,
                context,
            } => f
                .debug_struct("Api")
                .field("kind", kind)
                .field("status", status)
                .field("reason", reason)
                .field("code", code)
                .field("message", message)
                .field("request_id", request_id)
                .field("host_id", host_id)
                .field("body_snippet", body_snippet)
                .field("context", context)
                .finish(),
            Self::Transport {
                message,
                source,
                request_id,
                host_id,
                context,
            } => f
                .debug_struct("Transport")
                .field("message", message)
                .field("source", source)
                .field("request_id", request_id)
                .field("host_id", host_id)
                .field("context", context)
                .finish(),
            Self::Decode { message, source } => f
                .debug_struct("Decode")
                .field("message", message)
                .field("source", source)
                .finish(),
            Self::Integrity {
                key,
                local_hash,
                service_hash,
            } => f
                .debug_struct("Integrity")
                .field("key", key)
                .field("local_hash", local_hash)
                .field("service_hash", service_hash)
                .finish(),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

impl Error {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a signing error.
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a transport error with optional source.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source,
            request_id: None,
            host_id: None,
            context: None,
        }
    }

    /// Creates a decode error with optional source.
    pub fn decode(
        message: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::Decode {
            message: message.into(),
            source,
        }
    }

    /// Returns the taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig { .. } | Self::Signing { .. } => ErrorKind::Configuration,
            Self::Api { kind, .. } => *kind,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Decode { .. } => ErrorKind::Protocol,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns an HTTP status when available.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::InvalidConfig { .. }
            | Self::Signing { .. }
            | Self::Transport { .. }
            | Self::Decode { .. }
            | Self::Integrity { .. }
            | Self::Cancelled => None,
        }
    }

    /// Returns the service error code, if one was parsed.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns the request id if reported by the service.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Api { request_id, .. } | Self::Transport { request_id, .. } => {
                request_id.as_deref()
            }
            _ => None,
        }
    }

    /// Returns the host id if reported by the service.
    pub fn host_id(&self) -> Option<&str> {
        match self {
            Self::Api { host_id, .. } | Self::Transport { host_id, .. } => host_id.as_deref(),
            _ => None,
        }
    }

    /// Returns the request context recorded when the failure happened.
    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            Self::Api { context, .. } | Self::Transport { context, .. } => context.as_deref(),
            _ => None,
        }
    }

    /// Returns true if the error is safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientService
                | ErrorKind::RequestTimeout
                | ErrorKind::ClockSkew
                | ErrorKind::Transport
        )
    }

    /// Fills in request context and service identifiers that are not already set.
    pub(crate) fn enrich(
        mut self,
        ctx: RequestContext,
        resp_request_id: Option<String>,
        resp_host_id: Option<String>,
    ) -> Self {
        match &mut self {
            Self::Api {
                request_id,
                host_id,
                context,
                ..
            }
            | Self::Transport {
                request_id,
                host_id,
                context,
                ..
            } => {
                if context.is_none() {
                    *context = Some(Box::new(ctx));
                }
                if request_id.is_none() {
                    *request_id = resp_request_id;
                }
                if host_id.is_none() {
                    *host_id = resp_host_id;
                }
            }
            _ => {}
        }
        self
    }
}

fn format_optional_field(label: &str, value: &Option<String>) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => format!(" {label}={v}"),
        _ => String::new(),
    }
}

fn format_optional_message(value: &Option<String>) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => format!(" ({v})"),
        _ => String::new(),
    }
}

fn format_context(value: &Option<Box<RequestContext>>) -> String {
    match value.as_deref() {
        Some(ctx) => format!(" [{ctx}]"),
        None => String::new(),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { message } => write!(f, "invalid config: {message}"),
            Self::Signing { message } => write!(f, "signing error: {message}"),
            Self::Api {
                kind,
                status,
                reason,
                code,
                message,
                request_id,
                context,
                ..
            } => {
                let reason = reason.as_deref().map(|r| format!(" {r}")).unwrap_or_default();
                let code = format_optional_field("code", code);
                let request_id = format_optional_field("request_id", request_id);
                let msg = format_optional_message(message);
                let ctx = format_context(context);
                write!(
                    f,
                    "api error ({kind}): {}{reason}{code}{request_id}{msg}{ctx}",
                    status.as_u16()
                )
            }
            Self::Transport {
                message, context, ..
            } => write!(f, "transport error: {message}{}", format_context(context)),
            Self::Decode { message, .. } => write!(f, "decode error: {message}"),
            Self::Integrity {
                key,
                local_hash,
                service_hash,
            } => write!(
                f,
                "integrity error: {key} has local hash {local_hash} but service reported {service_hash}"
            ),
            Self::Cancelled => f.write_str("operation cancelled"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport { source, .. } | Self::Decode { source, .. } => {
                source.as_deref().map(|e| e as &(dyn StdError + 'static))
            }
            _ => None,
        }
    }
}
