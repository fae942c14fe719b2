//! AWS SigV4 request signing.
//!
//! Signs `http::request::Parts` in place and returns the payload the
//! transport must send, which is re-framed as aws-chunked when chunk
//! encoding is enabled.
//!
//! ```
//! use std::sync::Arc;
//!
//! use sigv4_aws_v4::{Credential, RequestSigner, SignRequest, SigningProperties};
//!
//! # fn main() -> sigv4_core::Result<()> {
//! let props = SigningProperties::builder()
//!     .credential(Credential::new("access_key_id", "secret_access_key"))
//!     .region("us-east-1")
//!     .service("s3")
//!     .build()?;
//!
//! let (mut parts, body) = http::Request::put("https://example-bucket.s3.amazonaws.com/hello.txt")
//!     .body(bytes::Bytes::from_static(b"Hello, World!"))?
//!     .into_parts();
//!
//! let signed = RequestSigner::new().sign(&mut parts, Some(Arc::new(body)), &props)?;
//! assert!(parts.headers.contains_key("authorization"));
//! assert!(signed.context.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod constants;

mod capability;
pub use capability::AsyncPayload;
pub use capability::CapabilityRegistry;
pub use capability::EventStreamSigner;
pub use capability::Payload;
pub use capability::SignRequest;
pub use capability::Signed;

mod canonical_request;
pub use canonical_request::CanonicalOptions;
pub use canonical_request::CanonicalRequest;

mod checksum;
pub use checksum::ChecksumAlgorithm;
pub use checksum::ChecksumHasher;
pub use checksum::ChecksumStore;

mod checksummer;
pub use checksummer::ChecksumFormat;
pub use checksummer::ChecksumOption;
pub use checksummer::ChecksumSource;
pub use checksummer::Checksummer;
pub use checksummer::PayloadFraming;

mod chunked;
pub use chunked::ChunkedPayload;

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod properties;
pub use properties::AuthLocation;
pub use properties::SigningClock;
pub use properties::SigningProperties;
pub use properties::SigningPropertiesBuilder;

mod rolling_signer;
pub use rolling_signer::RollingSigner;

mod scope;
pub use scope::CredentialScope;

mod sign_request;
pub use sign_request::RequestSigner;
pub use sign_request::V4Context;

mod signing_key;
pub use signing_key::derive_signing_key;
pub use signing_key::SigningKey;
pub use signing_key::SigningKeyCache;
pub use signing_key::DEFAULT_SIGNING_KEY_CACHE_SIZE;
