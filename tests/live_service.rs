#![allow(clippy::result_large_err)]

//! Runs against a real endpoint when `S3_TEST_ENDPOINT`, `AWS_ACCESS_KEY_ID`
//! and `AWS_SECRET_ACCESS_KEY` are set; otherwise every test is a no-op.

mod common;

use bytes::Bytes;
use http::StatusCode;

use s3_rest::{AddressingStyle, Client, Error, types::BucketStatus};

use common::{TestConfig, load_config, unique_bucket};

fn build_client(cfg: &TestConfig) -> Result<Client, Error> {
    Client::builder(&cfg.endpoint)?
        .auth(cfg.auth.clone())
        .addressing_style(AddressingStyle::Auto)
        .build()
}

#[test]
fn live_put_get_list_delete_roundtrip() -> Result<(), Error> {
    let Some(cfg) = load_config()? else {
        return Ok(());
    };

    let client = build_client(&cfg)?;
    let bucket = unique_bucket("s3-rest-it-");

    assert_eq!(
        client.buckets().status(&bucket).send()?,
        BucketStatus::DoesNotExist
    );
    client.buckets().create(&bucket).send()?;
    assert!(client.buckets().is_accessible(&bucket)?);

    let key = "hello.txt";
    let body = Bytes::from_static(b"hello");
    client
        .objects()
        .put(&bucket, key)
        .content_type("text/plain")
        .metadata("purpose", "integration")
        .body_bytes(body.clone())
        .send()?;

    let head = client.objects().head(&bucket, key).send()?;
    assert_eq!(head.metadata.content_length, Some(5));
    assert_eq!(head.metadata.user_metadata("purpose"), Some("integration"));

    let range = client
        .objects()
        .get(&bucket, key)
        .range_bytes(0, 3)
        .send()?
        .bytes()?;
    assert_eq!(range, Bytes::from_static(b"hell"));

    let copied = "copied.txt";
    client.objects().copy(&bucket, key, &bucket, copied).send()?;
    let got = client.objects().get(&bucket, copied).send()?.bytes()?;
    assert_eq!(got, body);

    for k in ["a/1.txt", "a/2.txt", "a/3.txt", "b/1.txt", "root.txt"] {
        client
            .objects()
            .put(&bucket, k)
            .body_bytes(Bytes::from_static(b"x"))
            .send()?;
    }

    let mut keys = Vec::new();
    for page in client.objects().list(&bucket).prefix("a/").page_size(2).pages() {
        keys.extend(page?.entries.into_iter().map(|o| o.key));
    }
    assert_eq!(keys, vec!["a/1.txt", "a/2.txt", "a/3.txt"]);

    let out = client.objects().list(&bucket).delimiter("/").send()?;
    assert!(out.common_prefixes.iter().any(|p| p == "a/"));
    assert!(out.common_prefixes.iter().any(|p| p == "b/"));
    assert!(out.entries.iter().any(|o| o.key == "root.txt"));

    let all = client.objects().list_partitioned(&bucket).workers(3).send()?;
    assert_eq!(all.entries.len(), 7);

    match client.objects().get(&bucket, "does-not-exist").send() {
        Ok(_) => panic!("expected not found error"),
        Err(Error::Api { status, .. }) => assert_eq!(status, StatusCode::NOT_FOUND),
        Err(other) => panic!("expected api error, got {other:?}"),
    }

    let presigned = client.objects().presign_get(&bucket, key).build()?;
    let resp = ureq::agent()
        .get(presigned.url.as_str())
        .call()
        .map_err(|e| Error::transport("presigned request failed", Some(Box::new(e))))?;
    assert!(resp.status().is_success());

    for o in all.entries {
        client.objects().delete(&bucket, o.key).send()?;
    }
    client.buckets().delete(&bucket).send()?;
    Ok(())
}
