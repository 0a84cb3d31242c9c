//! Remote source module
//!
//! The fetch seam between pull strategies and the wire. Strategies talk to
//! a `RemoteSource` through `FetchOptions`; the only production
//! implementation is `HttpSource`, which handles URL building, credential
//! application, rate limiting, status classification, and record
//! extraction.

mod http;
mod rate_limit;
mod types;

pub use http::{HttpSource, HttpSourceConfig, HttpSourceConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use types::{FetchOptions, RemoteSource};
