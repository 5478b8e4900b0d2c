//! Blocking client core for S3-style REST object storage.
//!
//! Requests are signed with the legacy HMAC-SHA1 scheme, retried on
//! redirects, overload, request timeouts and clock skew, and listings are
//! paged, merged, or fanned out over worker threads.
//!
//! ## Quick start
//!
//! ```no_run
//! # fn demo() -> Result<(), s3_rest::Error> {
//! use s3_rest::{Auth, Client, Credentials};
//!
//! let client = Client::builder("https://s3.example.com")?
//!     .auth(Auth::Static(Credentials::new("AKID", "SECRET")?))
//!     .build()?;
//!
//! client
//!     .objects()
//!     .put("my-bucket", "notes/hello.txt")
//!     .content_type("text/plain")
//!     .body_bytes("hello")
//!     .send()?;
//!
//! let listing = client.objects().list("my-bucket").prefix("notes/").send()?;
//! for object in &listing.entries {
//!     println!("{} {}", object.key, object.size);
//! }
//!
//! let bytes = client.objects().get("my-bucket", "notes/hello.txt").send()?.bytes()?;
//! assert_eq!(&bytes[..], b"hello");
//! # Ok(())
//! # }
//! ```

#[cfg(all(
    feature = "rustls",
    feature = "native-tls",
    not(feature = "allow-both-tls")
))]
compile_error!("Enable only one of: rustls, native-tls.");

/// Service entry points and request builders.
pub mod api;
/// Shared request/response types.
pub mod types;

mod auth;
mod cancel;
mod client;
mod error;
mod mapper;
mod request;
mod transport;
mod util;

pub use auth::{AddressingStyle, Auth, Credentials, DevPayTokens, Mfa};
pub use cancel::CancellationToken;
pub use client::{Client, ClientBuilder, ServiceTimeAuthority, TimeAuthority};
pub use error::{Error, ErrorKind, RequestContext, Result};
pub use transport::{
    BodyReader, HttpTransport, RequestBody, ResponseBody, TransportBody, TransportRequest,
    TransportResponse, UreqTransport,
};
pub use util::progress::{ByteCounter, ProgressReader, ProgressWatcher};
pub use util::signing;
