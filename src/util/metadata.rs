use std::collections::HashMap;

use http::{HeaderMap, HeaderValue, header::HeaderName};

use crate::{
    error::{Error, Result},
    util::headers::AMZ_META_PREFIX,
};

/// Projects user metadata onto `x-amz-meta-*` headers.
///
/// Keys must be pure ASCII and values must not contain CR or LF. Keys that
/// differ only in case are accepted when they carry the same value and
/// rejected otherwise. Nothing is written to `headers` unless every entry
/// validates.
pub(crate) fn apply_metadata(headers: &mut HeaderMap, metadata: &[(String, String)]) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(metadata.len());
    let mut projected = Vec::with_capacity(metadata.len());

    for (key, value) in metadata {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::invalid_config("metadata key must not be empty"));
        }
        if !key.is_ascii() {
            return Err(Error::invalid_config(format!(
                "metadata key {key:?} is not representable in ASCII"
            )));
        }
        if value.contains(['\r', '\n']) {
            return Err(Error::invalid_config(format!(
                "metadata value for {key:?} contains a line break"
            )));
        }

        let lower = key.to_ascii_lowercase();
        if let Some(existing) = seen.get(&lower) {
            if *existing != value.as_str() {
                return Err(Error::invalid_config(format!(
                    "metadata key {key:?} collides with a differently-cased key holding another value"
                )));
            }
            continue;
        }

        let name = HeaderName::from_bytes(format!("{AMZ_META_PREFIX}{lower}").as_bytes())
            .map_err(|_| Error::invalid_config(format!("invalid metadata key {key:?}")))?;
        let header_value = HeaderValue::from_bytes(value.trim().as_bytes())
            .map_err(|_| Error::invalid_config(format!("invalid metadata value for {key:?}")))?;
        seen.insert(lower, value.as_str());
        projected.push((name, header_value));
    }

    for (name, value) in projected {
        headers.insert(name, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn projects_lowercased_prefixed_headers() {
        let mut headers = HeaderMap::new();
        apply_metadata(&mut headers, &meta(&[("Owner", "ops"), ("build-id", "42")])).unwrap();
        assert_eq!(headers.get("x-amz-meta-owner").unwrap(), "ops");
        assert_eq!(headers.get("x-amz-meta-build-id").unwrap(), "42");
    }

    #[test]
    fn rejects_non_ascii_key() {
        let mut headers = HeaderMap::new();
        let err = apply_metadata(&mut headers, &meta(&[("café", "x")])).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(headers.is_empty());
    }

    #[test]
    fn rejects_line_breaks_in_value() {
        let mut headers = HeaderMap::new();
        assert!(apply_metadata(&mut headers, &meta(&[("k", "a\r\nb")])).is_err());
        assert!(apply_metadata(&mut headers, &meta(&[("k", "a\nb")])).is_err());
    }

    #[test]
    fn case_collisions_depend_on_value() {
        let mut headers = HeaderMap::new();
        assert!(
            apply_metadata(&mut headers, &meta(&[("Color", "red"), ("color", "blue")])).is_err()
        );
        assert!(headers.is_empty());

        apply_metadata(&mut headers, &meta(&[("Color", "red"), ("color", "red")])).unwrap();
        assert_eq!(headers.get_all("x-amz-meta-color").iter().count(), 1);
    }

    #[test]
    fn rejects_keys_that_are_not_header_tokens() {
        let mut headers = HeaderMap::new();
        assert!(apply_metadata(&mut headers, &meta(&[("a b", "x")])).is_err());
        assert!(apply_metadata(&mut headers, &meta(&[(" ", "x")])).is_err());
    }
}
