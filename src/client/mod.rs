mod blocking_client;
mod clock;
pub(crate) mod executor;

pub use blocking_client::{Client, ClientBuilder};
pub use clock::{ServiceTimeAuthority, TimeAuthority};

pub(crate) use blocking_client::{ClientConfig, Inner};
