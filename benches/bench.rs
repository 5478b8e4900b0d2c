use std::{hint::black_box, time::Duration};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::{HeaderMap, HeaderValue, Method};

fn client(addressing: s3_rest::AddressingStyle) -> s3_rest::Client {
    let creds = s3_rest::Credentials::new("AKIDEXAMPLE", "SECRETKEYEXAMPLE")
        .expect("static credentials must be valid");

    s3_rest::Client::builder("https://s3.example.com")
        .expect("endpoint must be valid")
        .auth(s3_rest::Auth::Static(creds))
        .addressing_style(addressing)
        .build()
        .expect("client must build")
}

fn signed_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("date", HeaderValue::from_static("Tue, 27 Mar 2007 19:36:42 +0000"));
    headers.insert("content-type", HeaderValue::from_static("image/jpeg"));
    headers.insert("x-amz-meta-reviewedby", HeaderValue::from_static("joe@example.com"));
    headers.insert("x-amz-meta-filechecksum", HeaderValue::from_static("0x02661779"));
    headers.insert("x-amz-acl", HeaderValue::from_static("public-read"));
    headers
}

fn bench_signing(c: &mut Criterion) {
    let mut group = c.benchmark_group("signing");
    group.measurement_time(Duration::from_secs(3));

    let headers = signed_headers();
    let query = [("acl", None), ("prefix", Some("photos/")), ("versions", None)];

    group.bench_function("canonical_resource", |b| {
        b.iter(|| {
            let resource =
                s3_rest::signing::canonical_resource(black_box("/johnsmith/photos/"), query);
            black_box(resource);
        });
    });

    group.bench_function("canonical_string", |b| {
        b.iter(|| {
            let canonical = s3_rest::signing::canonical_string(
                &Method::PUT,
                black_box("/johnsmith/photos/puppy.jpg"),
                black_box(&headers),
            );
            black_box(canonical);
        });
    });

    let canonical =
        s3_rest::signing::canonical_string(&Method::PUT, "/johnsmith/photos/puppy.jpg", &headers);
    group.bench_function("sign", |b| {
        b.iter(|| {
            let sig = s3_rest::signing::sign(
                black_box("wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY"),
                black_box(&canonical),
            )
            .expect("signing must succeed");
            black_box(sig);
        });
    });

    group.finish();
}

fn bench_presign(c: &mut Criterion) {
    let client_path = client(s3_rest::AddressingStyle::Path);
    let client_virtual = client(s3_rest::AddressingStyle::VirtualHosted);
    let bucket = "my-bucket";

    let mut group = c.benchmark_group("presign");
    group.measurement_time(Duration::from_secs(3));

    for (label, client) in [("path", &client_path), ("virtual", &client_virtual)] {
        let key = "a/b/c/object.txt";
        group.bench_function(BenchmarkId::new("get_minimal", label), |b| {
            b.iter(|| {
                let req = client
                    .objects()
                    .presign_get(black_box(bucket), black_box(key))
                    .build()
                    .expect("presign must succeed");
                black_box(req);
            });
        });

        group.bench_function(BenchmarkId::new("put_with_headers", label), |b| {
            b.iter(|| {
                let req = client
                    .objects()
                    .presign_put(black_box(bucket), black_box(key))
                    .expires_in(Duration::from_secs(60))
                    .header("content-type", "application/octet-stream")
                    .expect("header must be valid")
                    .query_param("x-id", "PutObject")
                    .build()
                    .expect("presign must succeed");
                black_box(req);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_signing, bench_presign);
criterion_main!(benches);
