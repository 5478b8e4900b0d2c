//! Response headers and error documents to typed values.

use std::collections::BTreeMap;

use http::{HeaderMap, StatusCode, header};

use crate::{
    error::{Error, ErrorKind},
    types::XmlError,
    util::headers::{
        AMZ_DELETE_MARKER, AMZ_META_PREFIX, AMZ_STORAGE_CLASS, AMZ_VERSION_ID, header_string,
        header_u64, service_identifiers, strip_etag_quotes,
    },
};

const BODY_SNIPPET_LIMIT: usize = 4096;

/// Object metadata mapped from response headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    /// Entity tag as sent by the service, quotes included.
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub version_id: Option<String>,
    pub storage_class: Option<String>,
    pub delete_marker: bool,
    /// User metadata keyed by the lower-cased name without the `x-amz-meta-` prefix.
    pub user: BTreeMap<String, String>,
    /// Every other header, lower-cased; repeated values are joined with `,`.
    pub raw: BTreeMap<String, String>,
}

impl ObjectMetadata {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut user = BTreeMap::new();
        let mut raw: BTreeMap<String, String> = BTreeMap::new();

        for (name, value) in headers.iter() {
            let value = String::from_utf8_lossy(value.as_bytes());
            let value = value.as_ref();
            let name = name.as_str();
            if let Some(key) = name.strip_prefix(AMZ_META_PREFIX) {
                user.insert(key.to_string(), value.trim().to_string());
                continue;
            }
            if is_mapped(name) {
                continue;
            }
            raw.entry(name.to_string())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        Self {
            content_type: header_string(headers, header::CONTENT_TYPE),
            content_length: header_u64(headers, header::CONTENT_LENGTH),
            content_encoding: header_string(headers, header::CONTENT_ENCODING),
            content_disposition: header_string(headers, header::CONTENT_DISPOSITION),
            cache_control: header_string(headers, header::CACHE_CONTROL),
            etag: header_string(headers, header::ETAG),
            last_modified: header_string(headers, header::LAST_MODIFIED),
            version_id: header_string(headers, AMZ_VERSION_ID),
            storage_class: header_string(headers, AMZ_STORAGE_CLASS),
            delete_marker: header_string(headers, AMZ_DELETE_MARKER)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            user,
            raw,
        }
    }

    /// ETag without surrounding quotes.
    pub fn etag_unquoted(&self) -> Option<&str> {
        self.etag.as_deref().map(strip_etag_quotes)
    }

    /// Looks up user metadata, ignoring case.
    pub fn user_metadata(&self, key: &str) -> Option<&str> {
        self.user
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }
}

fn is_mapped(name: &str) -> bool {
    matches!(
        name,
        "content-type"
            | "content-length"
            | "content-encoding"
            | "content-disposition"
            | "cache-control"
            | "etag"
            | "last-modified"
    ) || name == AMZ_VERSION_ID
        || name == AMZ_STORAGE_CLASS
        || name == AMZ_DELETE_MARKER
}

/// Builds the terminal error for a rejected response.
///
/// Identifiers from the error document win over the response headers.
pub(crate) fn response_error(
    status: StatusCode,
    reason: Option<&str>,
    headers: &HeaderMap,
    body: &str,
    parsed: Option<XmlError>,
) -> Error {
    let (header_request_id, header_host_id) = service_identifiers(headers);
    let snippet = truncate_snippet(body, BODY_SNIPPET_LIMIT);
    let body_snippet = (!snippet.is_empty()).then_some(snippet);
    let reason = reason
        .filter(|r| !r.is_empty())
        .or(status.canonical_reason())
        .map(str::to_string);

    match parsed {
        Some(parsed) => Error::Api {
            kind: ErrorKind::from_code(status, parsed.code.as_deref()),
            status,
            reason,
            code: parsed.code,
            message: parsed.message,
            request_id: parsed.request_id.or(header_request_id),
            host_id: parsed.host_id.or(header_host_id),
            body_snippet,
            context: None,
        },
        None => Error::Api {
            kind: ErrorKind::from_code(status, None),
            status,
            reason,
            code: None,
            message: None,
            request_id: header_request_id,
            host_id: header_host_id,
            body_snippet,
            context: None,
        },
    }
}

fn truncate_snippet(body: &str, limit: usize) -> String {
    let body = body.trim();
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
