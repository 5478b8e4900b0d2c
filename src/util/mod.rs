pub(crate) mod encode;
pub(crate) mod headers;
pub(crate) mod md5;
pub(crate) mod metadata;
pub mod progress;
pub mod signing;
pub(crate) mod time;
pub(crate) mod url;
pub(crate) mod xml;
