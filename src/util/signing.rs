//! Request signing for the S3 REST protocol (HMAC-SHA1 over a canonical string).
//!
//! The canonical string is
//!
//! ```text
//! METHOD \n Content-MD5 \n Content-Type \n Date \n
//! x-amz-name:value \n ...   (lowercased, sorted, duplicates comma-joined)
//! /bucket/key[?sub-resource...]
//! ```
//!
//! When an `x-amz-date` header is present the Date line is left empty and
//! the header is signed through the `x-amz-*` block instead. Presigned URLs
//! put the expiry (epoch seconds) on the Date line.

use std::collections::BTreeMap;

use base64::Engine as _;
use hmac::{Hmac, Mac};
use http::{HeaderMap, HeaderValue, Method};
use sha1::Sha1;

use crate::{
    auth::Credentials,
    error::{Error, Result},
    util::headers::{AMZ_DATE, AMZ_PREFIX},
};

type HmacSha1 = Hmac<Sha1>;

/// Query parameters that take part in the canonical resource.
pub const SUB_RESOURCES: [&str; 7] = [
    "acl",
    "location",
    "logging",
    "requestPayment",
    "torrent",
    "versioning",
    "versions",
];

/// Appends the signed sub-resources found in `query` to a bucket-qualified path.
pub fn canonical_resource<'a, I>(path: &str, query: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut sub: Vec<(&str, Option<&str>)> = query
        .into_iter()
        .filter(|(k, _)| SUB_RESOURCES.contains(k))
        .collect();
    sub.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::with_capacity(path.len() + 16);
    out.push_str(path);
    for (idx, (k, v)) in sub.into_iter().enumerate() {
        out.push(if idx == 0 { '?' } else { '&' });
        out.push_str(k);
        if let Some(v) = v.filter(|v| !v.is_empty()) {
            out.push('=');
            out.push_str(v);
        }
    }
    out
}

/// Builds the string to sign for a header-authenticated request.
pub fn canonical_string(method: &Method, resource: &str, headers: &HeaderMap) -> String {
    build_canonical_string(method, resource, headers, None)
}

fn build_canonical_string(
    method: &Method,
    resource: &str,
    headers: &HeaderMap,
    expires: Option<i64>,
) -> String {
    let mut content_md5 = String::new();
    let mut content_type = String::new();
    let mut date = String::new();
    let mut amz: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).trim().to_string();
        match name.as_str() {
            "content-md5" if content_md5.is_empty() => content_md5 = value,
            "content-type" if content_type.is_empty() => content_type = value,
            "date" if date.is_empty() => date = value,
            n if n.starts_with(AMZ_PREFIX) => amz.entry(n).or_default().push(value),
            _ => {}
        }
    }

    if amz.contains_key(AMZ_DATE) {
        date.clear();
    }
    if let Some(expires) = expires {
        date = expires.to_string();
    }

    let mut out = String::with_capacity(128 + resource.len());
    out.push_str(method.as_str());
    out.push('\n');
    out.push_str(&content_md5);
    out.push('\n');
    out.push_str(&content_type);
    out.push('\n');
    out.push_str(&date);
    out.push('\n');
    for (name, values) in &amz {
        out.push_str(name);
        out.push(':');
        out.push_str(&values.join(","));
        out.push('\n');
    }
    out.push_str(resource);
    out
}

/// Base64 HMAC-SHA1 of `canonical` keyed by `secret_key`.
pub fn sign(secret_key: &str, canonical: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .map_err(|_| Error::signing("invalid HMAC key"))?;
    mac.update(canonical.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn authorization_value(access_key_id: &str, signature: &str) -> String {
    format!("AWS {access_key_id}:{signature}")
}

/// Signs `headers` in place, replacing any previous Authorization header.
pub(crate) fn authorize(
    creds: &Credentials,
    method: &Method,
    resource: &str,
    headers: &mut HeaderMap,
) -> Result<()> {
    let canonical = canonical_string(method, resource, headers);
    #[cfg(feature = "tracing")]
    tracing::trace!(
        canonical = %canonical.replace('\n', "|"),
        access_key = %creds.access_key_id,
        "signing request"
    );

    let signature = sign(&creds.secret_access_key, &canonical)?;
    let value = HeaderValue::from_str(&authorization_value(&creds.access_key_id, &signature))
        .map_err(|_| Error::signing("authorization value is not a valid header"))?;
    headers.insert(http::header::AUTHORIZATION, value);
    Ok(())
}

/// Query-string authentication parameters for a presigned URL.
pub(crate) fn presign_params(
    creds: &Credentials,
    method: &Method,
    resource: &str,
    headers: &HeaderMap,
    expires_epoch: i64,
) -> Result<[(&'static str, String); 3]> {
    let canonical = build_canonical_string(method, resource, headers, Some(expires_epoch));
    let signature = sign(&creds.secret_access_key, &canonical)?;
    Ok([
        ("AWSAccessKeyId", creds.access_key_id.clone()),
        ("Expires", expires_epoch.to_string()),
        ("Signature", signature),
    ])
}
