use bytes::Bytes;
use quick_xml::events::Event;

use crate::{error::Error, types};

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Parses an S3 error document. Returns `None` for empty or non-XML bodies.
pub(crate) fn parse_error_xml(body: &str) -> Option<types::XmlError> {
    let trimmed = body.trim_start();
    if trimmed.is_empty() || !trimmed.starts_with('<') {
        return None;
    }

    quick_xml::de::from_str::<types::XmlError>(trimmed).ok()
}

pub(crate) fn parse_list_bucket(body: &str) -> Result<types::ListPage<types::Object>, Error> {
    let parsed = quick_xml::de::from_str::<types::XmlListBucketResult>(body).map_err(|e| {
        Error::decode(
            "failed to parse ListBucketResult XML response",
            Some(Box::new(e)),
        )
    })?;

    let truncated = parsed.is_truncated.unwrap_or(false);
    let entries: Vec<types::Object> =
        parsed.contents.into_iter().map(types::Object::from).collect();
    let common_prefixes: Vec<String> = parsed
        .common_prefixes
        .into_iter()
        .map(|p| p.prefix)
        .collect();

    let next_cursor = if truncated {
        let marker = parsed
            .next_marker
            .filter(|m| !m.is_empty())
            .or_else(|| {
                let last_key = entries.last().map(|o| o.key.as_str());
                let last_prefix = common_prefixes.last().map(String::as_str);
                last_key.max(last_prefix).map(str::to_string)
            })
            .ok_or_else(|| Error::decode("truncated listing page carries no marker", None))?;
        Some(types::ListCursor::new(marker))
    } else {
        None
    };

    Ok(types::ListPage {
        entries,
        common_prefixes,
        truncated,
        next_cursor,
    })
}

#[derive(Default)]
struct EntryBuilder {
    delete_marker: bool,
    key: String,
    version_id: String,
    is_latest: bool,
    last_modified: Option<String>,
    etag: Option<String>,
    size: u64,
    storage_class: Option<String>,
    owner_id: Option<String>,
    owner_name: Option<String>,
    has_owner: bool,
}

impl EntryBuilder {
    fn build(self) -> types::VersionEntry {
        let owner = self.has_owner.then_some(types::Owner {
            id: self.owner_id,
            display_name: self.owner_name,
        });
        if self.delete_marker {
            types::VersionEntry::DeleteMarker(types::DeleteMarker {
                key: self.key,
                version_id: self.version_id,
                is_latest: self.is_latest,
                last_modified: self.last_modified,
                owner,
            })
        } else {
            types::VersionEntry::Version(types::ObjectVersion {
                key: self.key,
                version_id: self.version_id,
                is_latest: self.is_latest,
                last_modified: self.last_modified,
                etag: self.etag,
                size: self.size,
                storage_class: self.storage_class,
                owner,
            })
        }
    }
}

#[derive(Default)]
struct VersionsDocument {
    truncated: bool,
    next_key_marker: Option<String>,
    next_version_id_marker: Option<String>,
    entries: Vec<types::VersionEntry>,
    common_prefixes: Vec<String>,
}

/// Parses `ListVersionsResult`, keeping versions and delete markers in document order.
pub(crate) fn parse_list_versions(
    body: &str,
) -> Result<types::ListPage<types::VersionEntry>, Error> {
    let decode_err = |e: quick_xml::Error| {
        Error::decode(
            "failed to parse ListVersionsResult XML response",
            Some(Box::new(e)),
        )
    };

    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut doc = VersionsDocument::default();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<EntryBuilder> = None;

    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if stack.is_empty() && name != "ListVersionsResult" {
                    return Err(Error::decode(
                        format!("unexpected root element <{name}> in version listing"),
                        None,
                    ));
                }
                if stack.len() == 1 && (name == "Version" || name == "DeleteMarker") {
                    current = Some(EntryBuilder {
                        delete_marker: name == "DeleteMarker",
                        ..EntryBuilder::default()
                    });
                }
                if stack.len() == 2 && name == "Owner" {
                    if let Some(entry) = current.as_mut() {
                        entry.has_owner = true;
                    }
                }
                stack.push(name);
            }
            Event::End(_) => {
                let closed = stack.pop();
                if stack.len() == 1
                    && matches!(closed.as_deref(), Some("Version" | "DeleteMarker"))
                    && let Some(entry) = current.take()
                {
                    doc.entries.push(entry.build());
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(decode_err)?.into_owned();
                apply_version_text(&mut doc, current.as_mut(), &stack, text)?;
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                apply_version_text(&mut doc, current.as_mut(), &stack, text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let next_cursor = if doc.truncated {
        let fallback = doc.entries.last();
        let marker = doc
            .next_key_marker
            .filter(|m| !m.is_empty())
            .or_else(|| fallback.map(|e| e.key().to_string()))
            .or_else(|| doc.common_prefixes.last().cloned())
            .ok_or_else(|| Error::decode("truncated version listing carries no marker", None))?;
        let version_id_marker = doc
            .next_version_id_marker
            .filter(|m| !m.is_empty())
            .or_else(|| fallback.map(|e| e.version_id().to_string()));
        Some(types::ListCursor {
            marker,
            version_id_marker,
        })
    } else {
        None
    };

    Ok(types::ListPage {
        entries: doc.entries,
        common_prefixes: doc.common_prefixes,
        truncated: doc.truncated,
        next_cursor,
    })
}

fn apply_version_text(
    doc: &mut VersionsDocument,
    entry: Option<&mut EntryBuilder>,
    stack: &[String],
    text: String,
) -> Result<(), Error> {
    let path: Vec<&str> = stack.iter().map(String::as_str).collect();
    match (path.as_slice(), entry) {
        ([_, "IsTruncated"], _) => doc.truncated = text == "true",
        ([_, "NextKeyMarker"], _) => doc.next_key_marker = Some(text),
        ([_, "NextVersionIdMarker"], _) => doc.next_version_id_marker = Some(text),
        ([_, "CommonPrefixes", "Prefix"], _) => doc.common_prefixes.push(text),
        ([_, "Version" | "DeleteMarker", field], Some(entry)) => match *field {
            "Key" => entry.key = text,
            "VersionId" => entry.version_id = text,
            "IsLatest" => entry.is_latest = text == "true",
            "LastModified" => entry.last_modified = Some(text),
            "ETag" => entry.etag = Some(text),
            "StorageClass" => entry.storage_class = Some(text),
            "Size" => {
                entry.size = text.parse().map_err(|e| {
                    Error::decode("invalid Size in version listing", Some(Box::new(e)))
                })?;
            }
            _ => {}
        },
        ([_, "Version" | "DeleteMarker", "Owner", field], Some(entry)) => match *field {
            "ID" => entry.owner_id = Some(text),
            "DisplayName" => entry.owner_name = Some(text),
            _ => {}
        },
        _ => {}
    }
    Ok(())
}

pub(crate) fn parse_list_buckets(body: &str) -> Result<types::ListBucketsOutput, Error> {
    let parsed =
        quick_xml::de::from_str::<types::XmlListAllMyBucketsResult>(body).map_err(|e| {
            Error::decode(
                "failed to parse ListAllMyBucketsResult XML response",
                Some(Box::new(e)),
            )
        })?;
    Ok(types::ListBucketsOutput::from(parsed))
}

/// Returns the location constraint, or `None` for the default region.
pub(crate) fn parse_location(body: &str) -> Result<Option<String>, Error> {
    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut location = None;
    loop {
        let event = reader.read_event().map_err(|e| {
            Error::decode(
                "failed to parse LocationConstraint XML response",
                Some(Box::new(e)),
            )
        })?;
        match event {
            Event::Start(e) => {
                if depth == 0 && e.local_name().as_ref() != b"LocationConstraint" {
                    return Err(Error::decode("unexpected location response document", None));
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(t) if depth == 1 => {
                let text = t.unescape().map_err(|e| {
                    Error::decode("invalid LocationConstraint text", Some(Box::new(e)))
                })?;
                location = Some(text.into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(location.filter(|l| !l.is_empty()))
}

pub(crate) fn parse_versioning(body: &str) -> Result<types::BucketVersioning, Error> {
    let parsed =
        quick_xml::de::from_str::<types::XmlVersioningConfiguration>(body).map_err(|e| {
            Error::decode(
                "failed to parse VersioningConfiguration XML response",
                Some(Box::new(e)),
            )
        })?;

    Ok(types::BucketVersioning {
        status: parsed.status.as_deref().and_then(parse_versioning_status),
        mfa_delete: parsed.mfa_delete.as_deref().and_then(parse_mfa_delete),
    })
}

pub(crate) fn parse_request_payment(body: &str) -> Result<types::Payer, Error> {
    let parsed = quick_xml::de::from_str::<types::XmlRequestPaymentConfiguration>(body)
        .map_err(|e| {
            Error::decode(
                "failed to parse RequestPaymentConfiguration XML response",
                Some(Box::new(e)),
            )
        })?;

    match parsed.payer.trim() {
        "Requester" => Ok(types::Payer::Requester),
        "BucketOwner" => Ok(types::Payer::BucketOwner),
        other => Err(Error::decode(format!("unknown payer {other:?}"), None)),
    }
}

pub(crate) fn parse_copy_object(body: &str) -> Result<types::CopyObjectOutput, Error> {
    let parsed = quick_xml::de::from_str::<types::XmlCopyObjectResult>(body).map_err(|e| {
        Error::decode(
            "failed to parse CopyObjectResult XML response",
            Some(Box::new(e)),
        )
    })?;
    Ok(types::CopyObjectOutput {
        etag: parsed.etag,
        last_modified: parsed.last_modified,
    })
}

pub(crate) fn encode_create_bucket_configuration(location: &str) -> Result<Bytes, Error> {
    if location.trim().is_empty() {
        return Err(Error::invalid_config(
            "create bucket location constraint must not be empty",
        ));
    }

    #[derive(serde::Serialize)]
    #[serde(rename = "CreateBucketConfiguration")]
    struct XmlCreateBucketConfiguration<'a> {
        #[serde(rename = "@xmlns")]
        xmlns: &'static str,
        #[serde(rename = "LocationConstraint")]
        location_constraint: &'a str,
    }

    let xml = quick_xml::se::to_string(&XmlCreateBucketConfiguration {
        xmlns: S3_XMLNS,
        location_constraint: location,
    })
    .map_err(|e| {
        Error::decode(
            "failed to encode CreateBucketConfiguration XML",
            Some(Box::new(e)),
        )
    })?;
    Ok(Bytes::from(xml))
}

pub(crate) fn encode_versioning(configuration: &types::BucketVersioning) -> Result<Bytes, Error> {
    if configuration.status.is_none() {
        return Err(Error::invalid_config(
            "bucket versioning configuration must include status",
        ));
    }

    #[derive(serde::Serialize)]
    #[serde(rename = "VersioningConfiguration")]
    struct XmlOut {
        #[serde(rename = "@xmlns")]
        xmlns: &'static str,
        #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
        status: Option<&'static str>,
        #[serde(rename = "MfaDelete", skip_serializing_if = "Option::is_none")]
        mfa_delete: Option<&'static str>,
    }

    let xml = quick_xml::se::to_string(&XmlOut {
        xmlns: S3_XMLNS,
        status: configuration.status.map(versioning_status_str),
        mfa_delete: configuration.mfa_delete.map(mfa_delete_str),
    })
    .map_err(|e| {
        Error::decode(
            "failed to encode VersioningConfiguration XML",
            Some(Box::new(e)),
        )
    })?;
    Ok(Bytes::from(xml))
}

pub(crate) fn encode_request_payment(payer: types::Payer) -> Result<Bytes, Error> {
    #[derive(serde::Serialize)]
    #[serde(rename = "RequestPaymentConfiguration")]
    struct XmlOut {
        #[serde(rename = "@xmlns")]
        xmlns: &'static str,
        #[serde(rename = "Payer")]
        payer: &'static str,
    }

    let xml = quick_xml::se::to_string(&XmlOut {
        xmlns: S3_XMLNS,
        payer: match payer {
            types::Payer::Requester => "Requester",
            types::Payer::BucketOwner => "BucketOwner",
        },
    })
    .map_err(|e| {
        Error::decode(
            "failed to encode RequestPaymentConfiguration XML",
            Some(Box::new(e)),
        )
    })?;
    Ok(Bytes::from(xml))
}

fn parse_versioning_status(value: &str) -> Option<types::VersioningStatus> {
    match value {
        "Enabled" => Some(types::VersioningStatus::Enabled),
        "Suspended" => Some(types::VersioningStatus::Suspended),
        _ => None,
    }
}

fn versioning_status_str(value: types::VersioningStatus) -> &'static str {
    match value {
        types::VersioningStatus::Enabled => "Enabled",
        types::VersioningStatus::Suspended => "Suspended",
    }
}

fn parse_mfa_delete(value: &str) -> Option<types::MfaDeleteStatus> {
    match value {
        "Enabled" => Some(types::MfaDeleteStatus::Enabled),
        "Disabled" => Some(types::MfaDeleteStatus::Disabled),
        _ => None,
    }
}

fn mfa_delete_str(value: types::MfaDeleteStatus) -> &'static str {
    match value {
        types::MfaDeleteStatus::Enabled => "Enabled",
        types::MfaDeleteStatus::Disabled => "Disabled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_document() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>NoSuchKey</Code>
  <Message>The specified key does not exist.</Message>
  <RequestId>4442587FB7D0A2F9</RequestId>
  <HostId>host-1</HostId>
</Error>"#;
        let parsed = parse_error_xml(body).unwrap();
        assert_eq!(parsed.code.as_deref(), Some("NoSuchKey"));
        assert_eq!(parsed.request_id.as_deref(), Some("4442587FB7D0A2F9"));
        assert_eq!(parsed.host_id.as_deref(), Some("host-1"));

        assert!(parse_error_xml("").is_none());
        assert!(parse_error_xml("Service Unavailable").is_none());
    }

    #[test]
    fn plain_listing_uses_next_marker_when_present() {
        let xml = r#"
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket</Name>
  <Prefix></Prefix>
  <Marker></Marker>
  <NextMarker>photos/b</NextMarker>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <Contents>
    <Key>a.txt</Key>
    <LastModified>2009-10-12T17:50:30.000Z</LastModified>
    <ETag>"fba9dede5f27731c9771645a39863328"</ETag>
    <Size>434234</Size>
    <StorageClass>STANDARD</StorageClass>
    <Owner><ID>owner-id</ID><DisplayName>mtd</DisplayName></Owner>
  </Contents>
</ListBucketResult>"#;
        let page = parse_list_bucket(xml).unwrap();
        assert!(page.truncated);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].size, 434234);
        assert_eq!(
            page.entries[0].owner.as_ref().unwrap().display_name.as_deref(),
            Some("mtd")
        );
        assert_eq!(page.next_cursor, Some(types::ListCursor::new("photos/b")));
    }

    #[test]
    fn plain_listing_falls_back_to_greatest_of_key_and_prefix() {
        let xml = r#"
<ListBucketResult>
  <IsTruncated>true</IsTruncated>
  <Contents><Key>a.txt</Key><Size>1</Size></Contents>
  <CommonPrefixes><Prefix>photos/</Prefix></CommonPrefixes>
</ListBucketResult>"#;
        let page = parse_list_bucket(xml).unwrap();
        assert_eq!(page.common_prefixes, vec!["photos/".to_string()]);
        assert_eq!(page.next_cursor.unwrap().marker, "photos/");

        let last = r#"<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>"#;
        let page = parse_list_bucket(last).unwrap();
        assert!(page.entries.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn version_listing_keeps_document_order() {
        let xml = r#"
<ListVersionsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket</Name>
  <KeyMarker></KeyMarker>
  <VersionIdMarker></VersionIdMarker>
  <NextKeyMarker>b.txt</NextKeyMarker>
  <NextVersionIdMarker>v3</NextVersionIdMarker>
  <IsTruncated>true</IsTruncated>
  <Version>
    <Key>a.txt</Key>
    <VersionId>v1</VersionId>
    <IsLatest>true</IsLatest>
    <Size>10</Size>
    <Owner><ID>o</ID></Owner>
  </Version>
  <DeleteMarker>
    <Key>b.txt</Key>
    <VersionId>v2</VersionId>
    <IsLatest>true</IsLatest>
  </DeleteMarker>
  <Version>
    <Key>b.txt</Key>
    <VersionId>v3</VersionId>
    <IsLatest>false</IsLatest>
    <ETag>&quot;abc&quot;</ETag>
    <Size>20</Size>
  </Version>
</ListVersionsResult>"#;
        let page = parse_list_versions(xml).unwrap();
        let ids: Vec<&str> = page.entries.iter().map(|e| e.version_id()).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);
        assert!(page.entries[1].is_delete_marker());
        match &page.entries[2] {
            types::VersionEntry::Version(v) => {
                assert_eq!(v.etag.as_deref(), Some("\"abc\""));
                assert_eq!(v.size, 20);
                assert!(!v.is_latest);
            }
            other => panic!("expected version, got {other:?}"),
        }
        let cursor = page.next_cursor.unwrap();
        assert_eq!(cursor.marker, "b.txt");
        assert_eq!(cursor.version_id_marker.as_deref(), Some("v3"));
    }

    #[test]
    fn parses_bucket_documents() {
        let buckets = parse_list_buckets(
            r#"<ListAllMyBucketsResult>
  <Owner><ID>owner-id</ID><DisplayName>owner</DisplayName></Owner>
  <Buckets><Bucket><Name>bucket-a</Name><CreationDate>2020-01-01T00:00:00.000Z</CreationDate></Bucket></Buckets>
</ListAllMyBucketsResult>"#,
        )
        .unwrap();
        assert_eq!(buckets.owner.unwrap().id.as_deref(), Some("owner-id"));
        assert_eq!(buckets.buckets[0].name, "bucket-a");

        assert_eq!(
            parse_location(r#"<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/">EU</LocationConstraint>"#)
                .unwrap()
                .as_deref(),
            Some("EU")
        );
        assert_eq!(
            parse_location(r#"<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/"/>"#).unwrap(),
            None
        );

        let versioning = parse_versioning(
            "<VersioningConfiguration><Status>Suspended</Status><MfaDelete>Enabled</MfaDelete></VersioningConfiguration>",
        )
        .unwrap();
        assert_eq!(versioning.status, Some(types::VersioningStatus::Suspended));
        assert_eq!(versioning.mfa_delete, Some(types::MfaDeleteStatus::Enabled));

        assert_eq!(
            parse_request_payment(
                "<RequestPaymentConfiguration><Payer>Requester</Payer></RequestPaymentConfiguration>"
            )
            .unwrap(),
            types::Payer::Requester
        );
    }

    #[test]
    fn encodes_bucket_configurations() {
        let xml = encode_create_bucket_configuration("EU").unwrap();
        let xml = String::from_utf8_lossy(&xml).to_string();
        assert!(xml.starts_with("<CreateBucketConfiguration"));
        assert!(xml.contains("<LocationConstraint>EU</LocationConstraint>"));

        let xml = encode_versioning(&types::BucketVersioning {
            status: Some(types::VersioningStatus::Enabled),
            mfa_delete: None,
        })
        .unwrap();
        let xml = String::from_utf8_lossy(&xml).to_string();
        assert!(xml.contains("<Status>Enabled</Status>"));
        assert!(!xml.contains("MfaDelete"));

        let xml = encode_request_payment(types::Payer::BucketOwner).unwrap();
        assert!(String::from_utf8_lossy(&xml).contains("<Payer>BucketOwner</Payer>"));

        assert!(encode_versioning(&types::BucketVersioning::default()).is_err());
    }
}
