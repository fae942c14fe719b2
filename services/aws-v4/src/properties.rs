use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sigv4_core::time::{now, DateTime};
use sigv4_core::{Error, Result};

use crate::constants::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, PRESIGN_MAX_EXPIRATION_SECS};
use crate::{ChecksumAlgorithm, ChecksumStore, Credential, CredentialScope};

/// Where the signature is placed on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthLocation {
    /// `Authorization` header.
    #[default]
    Header,
    /// `X-Amz-*` query parameters.
    QueryString,
}

impl FromStr for AuthLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "query" | "query_string" | "querystring" => Ok(Self::QueryString),
            _ => Err(Error::config_invalid(format!(
                "unknown auth location: {s}, expected header or query_string"
            ))),
        }
    }
}

impl fmt::Display for AuthLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::QueryString => f.write_str("query_string"),
        }
    }
}

/// Source of the signing instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningClock {
    /// Current system time.
    #[default]
    System,
    /// A fixed instant, mostly useful in tests.
    Fixed(DateTime),
}

impl SigningClock {
    /// Sample the clock.
    pub fn now(&self) -> DateTime {
        match self {
            Self::System => now(),
            Self::Fixed(t) => *t,
        }
    }
}

/// Everything needed to sign one request.
///
/// Built by [`SigningProperties::builder`], which validates eagerly so that
/// signing itself never fails on configuration.
#[derive(Debug, Clone)]
pub struct SigningProperties {
    credential: Credential,
    region: String,
    service: String,
    clock: SigningClock,
    double_url_encode: bool,
    normalize_path: bool,
    checksum_algorithm: Option<ChecksumAlgorithm>,
    checksum_store: Option<ChecksumStore>,
    expiration: Option<Duration>,
    auth_location: AuthLocation,
    payload_signing: bool,
    chunk_encoding: bool,
    chunk_size: usize,
    event_streaming: bool,
    region_set: Option<Vec<String>>,
}

impl SigningProperties {
    /// Start building signing properties.
    pub fn builder() -> SigningPropertiesBuilder {
        SigningPropertiesBuilder::default()
    }

    /// Credential used to sign.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Signing region.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Signing service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Signing clock.
    pub fn clock(&self) -> SigningClock {
        self.clock
    }

    /// Whether the path is percent-encoded a second time.
    pub fn double_url_encode(&self) -> bool {
        self.double_url_encode
    }

    /// Whether `.` and `..` path segments are resolved.
    pub fn normalize_path(&self) -> bool {
        self.normalize_path
    }

    /// Flexible checksum algorithm, if any.
    pub fn checksum_algorithm(&self) -> Option<ChecksumAlgorithm> {
        self.checksum_algorithm
    }

    /// Store for checksums computed by earlier attempts.
    pub fn checksum_store(&self) -> Option<&ChecksumStore> {
        self.checksum_store.as_ref()
    }

    /// Presign expiration.
    pub fn expiration(&self) -> Option<Duration> {
        self.expiration
    }

    /// Where the signature goes.
    pub fn auth_location(&self) -> AuthLocation {
        self.auth_location
    }

    /// Whether the payload hash is signed.
    pub fn payload_signing(&self) -> bool {
        self.payload_signing
    }

    /// Whether the payload is sent with aws-chunked framing.
    pub fn chunk_encoding(&self) -> bool {
        self.chunk_encoding
    }

    /// Size of a single chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether the payload is an event stream.
    pub fn event_streaming(&self) -> bool {
        self.event_streaming
    }

    /// SigV4A region set. Requests carrying one are signed by the registered
    /// SigV4A capability.
    pub fn region_set(&self) -> Option<&[String]> {
        self.region_set.as_deref()
    }

    /// Sample the clock and build the scope for one sign operation.
    pub fn credential_scope(&self) -> CredentialScope {
        CredentialScope::new(&self.region, &self.service, self.clock.now())
    }
}

/// Builder for [`SigningProperties`].
#[derive(Debug, Clone, Default)]
pub struct SigningPropertiesBuilder {
    credential: Option<Credential>,
    region: Option<String>,
    service: Option<String>,
    clock: SigningClock,
    double_url_encode: Option<bool>,
    normalize_path: Option<bool>,
    checksum_algorithm: Option<ChecksumAlgorithm>,
    checksum_store: Option<ChecksumStore>,
    expiration: Option<Duration>,
    auth_location: Option<AuthLocation>,
    payload_signing: Option<bool>,
    chunk_encoding: bool,
    chunk_size: Option<usize>,
    event_streaming: bool,
    region_set: Option<Vec<String>>,
}

impl SigningPropertiesBuilder {
    /// Set the credential. Required.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the region. Required.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the service signing name. Required.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the clock, [`SigningClock::System`] by default.
    pub fn clock(mut self, clock: SigningClock) -> Self {
        self.clock = clock;
        self
    }

    /// Defaults to `true`, or `false` for `s3`.
    pub fn double_url_encode(mut self, v: bool) -> Self {
        self.double_url_encode = Some(v);
        self
    }

    /// Defaults to `true`, or `false` for `s3`.
    pub fn normalize_path(mut self, v: bool) -> Self {
        self.normalize_path = Some(v);
        self
    }

    /// Add a flexible checksum computed with the given algorithm.
    pub fn checksum_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum_algorithm = Some(algorithm);
        self
    }

    /// Share computed checksums with later attempts of the same request.
    pub fn checksum_store(mut self, store: ChecksumStore) -> Self {
        self.checksum_store = Some(store);
        self
    }

    /// Presign the request for the given duration.
    ///
    /// Implies [`AuthLocation::QueryString`] unless the location is set.
    pub fn expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Set where the signature is placed.
    pub fn auth_location(mut self, location: AuthLocation) -> Self {
        self.auth_location = Some(location);
        self
    }

    /// Enabled by default.
    pub fn payload_signing(mut self, v: bool) -> Self {
        self.payload_signing = Some(v);
        self
    }

    /// Disabled by default.
    pub fn chunk_encoding(mut self, v: bool) -> Self {
        self.chunk_encoding = v;
        self
    }

    /// Defaults to 128 KiB.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Disabled by default.
    pub fn event_streaming(mut self, v: bool) -> Self {
        self.event_streaming = v;
        self
    }

    /// Sign with SigV4A for the given regions, such as `["*"]`.
    pub fn region_set<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.region_set = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    /// Validate and build the properties.
    pub fn build(self) -> Result<SigningProperties> {
        let credential = self
            .credential
            .ok_or_else(|| Error::config_invalid("credential is required for signing"))?;
        let region = self
            .region
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config_invalid("region is required for signing"))?;
        let service = self
            .service
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config_invalid("service is required for signing"))?;

        if let Some(expiration) = self.expiration {
            if expiration.is_zero() {
                return Err(Error::config_invalid("expiration must be greater than zero"));
            }
            if expiration.subsec_nanos() != 0 {
                return Err(Error::config_invalid(format!(
                    "expiration must be a whole number of seconds, got {expiration:?}"
                )));
            }
            if expiration > Duration::from_secs(PRESIGN_MAX_EXPIRATION_SECS) {
                return Err(Error::expiration_exceeded(format!(
                    "expiration {}s exceeds the maximum of {PRESIGN_MAX_EXPIRATION_SECS}s",
                    expiration.as_secs()
                )));
            }
        }

        let auth_location = match (self.auth_location, self.expiration) {
            (Some(AuthLocation::Header), Some(_)) => {
                return Err(Error::unsupported(
                    "expiration requires query_string auth location",
                ))
            }
            (Some(v), _) => v,
            (None, Some(_)) => AuthLocation::QueryString,
            (None, None) => AuthLocation::Header,
        };

        if auth_location == AuthLocation::QueryString && self.chunk_encoding {
            return Err(Error::unsupported(
                "chunk encoding is not supported with query_string auth location",
            ));
        }
        if auth_location == AuthLocation::QueryString && self.event_streaming {
            return Err(Error::unsupported(
                "event streaming is not supported with query_string auth location",
            ));
        }

        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(Error::config_invalid("chunk size must be at least 1"));
        }
        if chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::config_invalid(format!(
                "chunk size {chunk_size} exceeds the maximum of {MAX_CHUNK_SIZE}"
            )));
        }

        let region_set = match self.region_set {
            Some(regions) => {
                let regions: Vec<String> = regions
                    .into_iter()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if regions.is_empty() {
                    return Err(Error::config_invalid("region set must not be empty"));
                }
                Some(regions)
            }
            None => None,
        };

        let is_s3 = service == "s3";
        Ok(SigningProperties {
            credential,
            region,
            double_url_encode: self.double_url_encode.unwrap_or(!is_s3),
            normalize_path: self.normalize_path.unwrap_or(!is_s3),
            service,
            clock: self.clock,
            checksum_algorithm: self.checksum_algorithm,
            checksum_store: self.checksum_store,
            expiration: self.expiration,
            auth_location,
            payload_signing: self.payload_signing.unwrap_or(true),
            chunk_encoding: self.chunk_encoding,
            chunk_size,
            event_streaming: self.event_streaming,
            region_set,
        })
    }
}
