//! Core components for signing HTTP requests.
//!
//! This crate holds the service-agnostic pieces shared by request signers:
//!
//! - [`SigningRequest`]: a mutable view over `http::request::Parts` that keeps
//!   multi-valued headers and repeated query parameters intact.
//! - [`ContentStreamProvider`] and [`AsyncContentStreamProvider`]: payload
//!   factories that can be read more than once, so a body can be checksummed
//!   and then sent (or re-sent on retry).
//! - [`Error`] and [`ErrorKind`]: the error type returned by every signer.
//!
//! ## Example
//!
//! ```
//! use sigv4_core::SigningRequest;
//!
//! # fn main() -> sigv4_core::Result<()> {
//! let (mut parts, _) = http::Request::builder()
//!     .method("GET")
//!     .uri("https://examplebucket.s3.amazonaws.com/test.txt?list-type=2")
//!     .body(())?
//!     .into_parts();
//!
//! let mut req = SigningRequest::build(&parts)?;
//! req.header_put("x-amz-date", "20130524T000000Z")?;
//! req.apply(&mut parts)?;
//!
//! assert_eq!(parts.headers["x-amz-date"], "20130524T000000Z");
//! # Ok(())
//! # }
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: Cryptographic hashing utilities
//! - [`time`]: Time formatting utilities
//! - [`utils`]: Redaction of secrets in debug output

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod body;
pub use body::read_to_vec;
pub use body::AsyncContentStreamProvider;
pub use body::ChunkedBytes;
pub use body::ContentStreamProvider;
pub use body::PayloadReader;
pub use body::PayloadStream;

mod error;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;

mod request;
pub use request::SigningRequest;
