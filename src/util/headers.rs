use http::{
    HeaderMap, HeaderValue,
    header::{AsHeaderName, HeaderName},
};

use crate::error::{Error, Result};

pub(crate) const AMZ_PREFIX: &str = "x-amz-";
pub(crate) const AMZ_META_PREFIX: &str = "x-amz-meta-";
pub(crate) const AMZ_DATE: &str = "x-amz-date";
pub(crate) const AMZ_REQUEST_ID: &str = "x-amz-request-id";
pub(crate) const AMZ_ID_2: &str = "x-amz-id-2";
pub(crate) const AMZ_REQUEST_PAYER: &str = "x-amz-request-payer";
pub(crate) const AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";
pub(crate) const AMZ_MFA: &str = "x-amz-mfa";
pub(crate) const AMZ_STORAGE_CLASS: &str = "x-amz-storage-class";
pub(crate) const AMZ_ACL: &str = "x-amz-acl";
pub(crate) const AMZ_COPY_SOURCE: &str = "x-amz-copy-source";
pub(crate) const AMZ_METADATA_DIRECTIVE: &str = "x-amz-metadata-directive";
pub(crate) const AMZ_VERSION_ID: &str = "x-amz-version-id";
pub(crate) const AMZ_DELETE_MARKER: &str = "x-amz-delete-marker";

pub(crate) fn header_string<N>(headers: &HeaderMap, name: N) -> Option<String>
where
    N: AsHeaderName,
{
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

pub(crate) fn header_u64<N>(headers: &HeaderMap, name: N) -> Option<u64>
where
    N: AsHeaderName,
{
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Sets `name` to `value`, reporting an invalid value as a configuration error.
pub(crate) fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::invalid_config(format!("invalid header name: {name}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| Error::invalid_config(format!("invalid value for {name} header")))?;
    headers.insert(name, value);
    Ok(())
}

/// Returns the `x-amz-request-id` / `x-amz-id-2` pair carried by a response.
pub(crate) fn service_identifiers(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    (
        header_string(headers, AMZ_REQUEST_ID),
        header_string(headers, AMZ_ID_2),
    )
}

pub(crate) fn strip_etag_quotes(etag: &str) -> &str {
    let etag = etag.trim();
    etag.strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(etag)
}

pub(crate) fn copy_source_header_value(
    bucket: &str,
    key: &str,
    version_id: Option<&str>,
) -> String {
    let bucket_enc = crate::util::encode::encode_component(bucket);
    let key_enc = crate::util::encode::encode_path(key);

    match version_id {
        Some(v) => {
            let version_enc = crate::util::encode::encode_component(v);
            format!("/{bucket_enc}/{key_enc}?versionId={version_enc}")
        }
        None => format!("/{bucket_enc}/{key_enc}"),
    }
}
