use std::net::IpAddr;

use url::Url;

use crate::{auth::AddressingStyle, error::Error};

pub(crate) struct ResolvedUrl {
    pub(crate) url: Url,
    /// Bucket-qualified path used by the signer, without sub-resources.
    pub(crate) resource: String,
}

/// Target of a request: the endpoint root, or a bucket with an optional key.
pub(crate) struct Target<'a> {
    pub(crate) bucket: Option<&'a str>,
    pub(crate) key: Option<&'a str>,
}

pub(crate) fn resolve_url(
    endpoint: &Url,
    virtual_path: &str,
    target: Target<'_>,
    query: &str,
    addressing: AddressingStyle,
) -> Result<ResolvedUrl, Error> {
    let mut url = endpoint.clone();
    url.set_fragment(None);
    if query.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(query));
    }

    let Some(bucket) = target.bucket else {
        let path = format!("{virtual_path}/");
        url.set_path(&path);
        return Ok(ResolvedUrl {
            url,
            resource: "/".to_string(),
        });
    };

    let host = endpoint
        .host_str()
        .ok_or_else(|| Error::invalid_config("endpoint must include host"))?;

    let key_path = match target.key {
        Some(key) if !key.is_empty() => {
            format!("/{}", crate::util::encode::encode_path(key))
        }
        _ => String::new(),
    };

    match resolve_addressing_style(endpoint, host, bucket, addressing) {
        AddressingStyle::VirtualHosted => {
            let path = if key_path.is_empty() {
                format!("{virtual_path}/")
            } else {
                format!("{virtual_path}{key_path}")
            };
            url.set_path(&path);
            url.set_host(Some(&format!("{bucket}.{host}")))
                .map_err(|_| Error::invalid_config("invalid endpoint host"))?;
            Ok(ResolvedUrl {
                url,
                resource: format!("/{bucket}{path}"),
            })
        }
        _ => {
            let bucket_enc = crate::util::encode::encode_component(bucket);
            let path = format!("{virtual_path}/{bucket_enc}{key_path}");
            url.set_path(&path);
            Ok(ResolvedUrl {
                url,
                resource: path,
            })
        }
    }
}

fn resolve_addressing_style(
    endpoint: &Url,
    host: &str,
    bucket: &str,
    addressing: AddressingStyle,
) -> AddressingStyle {
    if !is_dns_compatible_bucket(bucket) {
        return AddressingStyle::Path;
    }

    match addressing {
        AddressingStyle::Path | AddressingStyle::VirtualHosted => addressing,
        AddressingStyle::Auto => {
            if host == "localhost" || host.parse::<IpAddr>().is_ok() {
                return AddressingStyle::Path;
            }
            if endpoint.scheme() == "https" && bucket.contains('.') {
                return AddressingStyle::Path;
            }
            AddressingStyle::VirtualHosted
        }
    }
}

/// Whether `bucket` can be used as a host name label.
pub(crate) fn is_dns_compatible_bucket(bucket: &str) -> bool {
    let bytes = bucket.as_bytes();
    if !(3..=63).contains(&bytes.len()) {
        return false;
    }

    let is_allowed = |b: u8| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.');
    if !bytes.iter().all(|&b| is_allowed(b)) {
        return false;
    }

    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return false;
    }

    if bucket.contains("..") || bucket.contains(".-") || bucket.contains("-.") {
        return false;
    }

    bucket.parse::<IpAddr>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(
        endpoint: &str,
        virtual_path: &str,
        bucket: Option<&str>,
        key: Option<&str>,
        query: &str,
        style: AddressingStyle,
    ) -> ResolvedUrl {
        let endpoint = Url::parse(endpoint).unwrap();
        resolve_url(
            &endpoint,
            virtual_path,
            Target { bucket, key },
            query,
            style,
        )
        .unwrap()
    }

    #[test]
    fn resolves_path_style_url_and_does_not_double_encode() {
        let resolved = resolve(
            "https://example.com",
            "",
            Some("my-bucket"),
            Some("a+b"),
            "",
            AddressingStyle::Path,
        );

        assert_eq!(resolved.resource, "/my-bucket/a%2Bb");
        assert_eq!(resolved.url.as_str(), "https://example.com/my-bucket/a%2Bb");
    }

    #[test]
    fn virtual_hosted_resource_stays_bucket_qualified() {
        let resolved = resolve(
            "https://s3.example.com",
            "",
            Some("mybucket"),
            Some("photos/puppy.jpg"),
            "acl",
            AddressingStyle::VirtualHosted,
        );

        assert_eq!(
            resolved.url.as_str(),
            "https://mybucket.s3.example.com/photos/puppy.jpg?acl"
        );
        assert_eq!(resolved.resource, "/mybucket/photos/puppy.jpg");

        let root = resolve(
            "https://s3.example.com",
            "",
            Some("mybucket"),
            None,
            "",
            AddressingStyle::VirtualHosted,
        );
        assert_eq!(root.resource, "/mybucket/");
    }

    #[test]
    fn non_dns_bucket_falls_back_to_path_style() {
        let resolved = resolve(
            "https://s3.example.com",
            "",
            Some("My_Bucket"),
            Some("k"),
            "",
            AddressingStyle::VirtualHosted,
        );
        assert_eq!(resolved.url.host_str(), Some("s3.example.com"));
        assert_eq!(resolved.resource, "/My_Bucket/k");
    }

    #[test]
    fn auto_prefers_path_style_for_dotted_bucket_on_https_and_ip_hosts() {
        let dotted = resolve(
            "https://s3.example.com",
            "",
            Some("bucket.with.dots"),
            Some("key"),
            "",
            AddressingStyle::Auto,
        );
        assert_eq!(dotted.url.host_str(), Some("s3.example.com"));
        assert_eq!(dotted.resource, "/bucket.with.dots/key");

        let ip = resolve(
            "http://127.0.0.1:9000",
            "",
            Some("bucket"),
            Some("key"),
            "",
            AddressingStyle::Auto,
        );
        assert_eq!(ip.url.as_str(), "http://127.0.0.1:9000/bucket/key");
    }

    #[test]
    fn virtual_path_prefixes_every_request() {
        let resolved = resolve(
            "http://storage.internal:8773",
            "/services/Walrus",
            Some("bucket"),
            Some("a/b"),
            "",
            AddressingStyle::Path,
        );
        assert_eq!(
            resolved.url.as_str(),
            "http://storage.internal:8773/services/Walrus/bucket/a/b"
        );
        assert_eq!(resolved.resource, "/services/Walrus/bucket/a/b");

        let root = resolve(
            "http://storage.internal:8773",
            "/services/Walrus",
            None,
            None,
            "",
            AddressingStyle::Path,
        );
        assert_eq!(root.url.path(), "/services/Walrus/");
        assert_eq!(root.resource, "/");
    }

    #[test]
    fn dns_compatibility_rules() {
        assert!(is_dns_compatible_bucket("my-bucket.logs"));
        assert!(!is_dns_compatible_bucket("ab"));
        assert!(!is_dns_compatible_bucket("Upper"));
        assert!(!is_dns_compatible_bucket("-lead"));
        assert!(!is_dns_compatible_bucket("a..b"));
        assert!(!is_dns_compatible_bucket("a.-b"));
        assert!(!is_dns_compatible_bucket("192.168.1.1"));
    }
}
