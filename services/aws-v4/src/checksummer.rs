//! Content checksums written into the request before it is signed.

use std::io::Read;

use futures::TryStreamExt;
use log::debug;
use sigv4_core::hash::base64_encode;
use sigv4_core::{
    AsyncContentStreamProvider, ContentStreamProvider, Error, Result, SigningRequest,
};

use crate::constants::{
    STREAMING_AWS4_HMAC_SHA256_EVENTS, STREAMING_AWS4_HMAC_SHA256_PAYLOAD,
    STREAMING_AWS4_HMAC_SHA256_PAYLOAD_TRAILER, STREAMING_UNSIGNED_PAYLOAD_TRAILER,
    UNSIGNED_PAYLOAD, X_AMZ_CHECKSUM_PREFIX, X_AMZ_CONTENT_SHA_256, X_AMZ_TRAILER,
};
use crate::{AuthLocation, ChecksumAlgorithm, ChecksumHasher, ChecksumStore, SigningProperties};

/// How a checksum value is rendered into its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumFormat {
    /// Lower-case hex, used by the content hash.
    Hex,
    /// Standard base64, used by flexible checksums.
    Base64,
}

/// Where a checksum value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumSource {
    /// Digest the payload.
    Compute(ChecksumAlgorithm),
    /// A fixed value such as `UNSIGNED-PAYLOAD`.
    Constant(String),
}

/// One header written by a [`Checksummer::Flexible`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumOption {
    /// Header to write.
    pub header: String,
    /// Value source.
    pub source: ChecksumSource,
    /// Value format.
    pub format: ChecksumFormat,
}

impl ChecksumOption {
    /// Create a new option.
    pub fn new(header: impl Into<String>, source: ChecksumSource, format: ChecksumFormat) -> Self {
        Self {
            header: header.into(),
            source,
            format,
        }
    }
}

/// Computes the content hash of a payload and writes it, together with any
/// flexible checksum, into the request headers.
///
/// Every variant reads the payload at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksummer {
    /// Hex sha256 into `x-amz-content-sha256`.
    Default,
    /// Several checksums computed in one pass. The first option is the
    /// content hash.
    Flexible(Vec<ChecksumOption>),
    /// A known value that needs no payload read.
    Precomputed {
        /// Content hash.
        value: String,
        /// Header to write it into, if any.
        header: Option<String>,
    },
}

/// How the payload is sent after signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFraming {
    /// Sent as is.
    Plain,
    /// Re-framed as aws-chunked.
    Chunked {
        /// Sign every chunk.
        signed: bool,
        /// Flexible checksum sent as a trailer.
        checksum: Option<ChecksumAlgorithm>,
    },
    /// Re-framed by the event stream signer.
    EventStream,
}

impl Checksummer {
    /// A flexible checksummer writing `content_hash` as the content hash and
    /// `algorithm` as a base64 `x-amz-checksum-*` header.
    pub fn flexible(content_hash: ChecksumSource, algorithm: ChecksumAlgorithm) -> Self {
        Self::Flexible(vec![
            ChecksumOption::new(X_AMZ_CONTENT_SHA_256, content_hash, ChecksumFormat::Hex),
            ChecksumOption::new(
                algorithm.header_name(),
                ChecksumSource::Compute(algorithm),
                ChecksumFormat::Base64,
            ),
        ])
    }

    /// A precomputed value written into `x-amz-content-sha256`.
    pub fn precomputed(value: impl Into<String>) -> Self {
        Self::Precomputed {
            value: value.into(),
            header: Some(X_AMZ_CONTENT_SHA_256.to_string()),
        }
    }

    /// Pick the checksummer and payload framing for a request.
    pub fn select(
        props: &SigningProperties,
        req: &SigningRequest,
    ) -> Result<(Checksummer, PayloadFraming)> {
        if props.auth_location() == AuthLocation::QueryString {
            return Ok((
                Checksummer::Precomputed {
                    value: UNSIGNED_PAYLOAD.to_string(),
                    header: None,
                },
                PayloadFraming::Plain,
            ));
        }

        let payload_signing = !props.credential().is_anonymous() && props.payload_signing();
        let flexible = props
            .checksum_algorithm()
            .filter(|_| !req.header_has_prefix(X_AMZ_CHECKSUM_PREFIX));
        let has_trailer = req.headers.contains_key(X_AMZ_TRAILER);
        let chunked = props.chunk_encoding();

        if props.event_streaming() {
            if !payload_signing {
                return Err(Error::unsupported(
                    "event streaming requires payload signing",
                ));
            }
            return Ok((
                Checksummer::precomputed(STREAMING_AWS4_HMAC_SHA256_EVENTS),
                PayloadFraming::EventStream,
            ));
        }

        let selected = match (payload_signing, chunked, flexible) {
            (true, true, checksum) if checksum.is_some() || has_trailer => (
                Checksummer::precomputed(STREAMING_AWS4_HMAC_SHA256_PAYLOAD_TRAILER),
                PayloadFraming::Chunked {
                    signed: true,
                    checksum,
                },
            ),
            (true, true, _) => (
                Checksummer::precomputed(STREAMING_AWS4_HMAC_SHA256_PAYLOAD),
                PayloadFraming::Chunked {
                    signed: true,
                    checksum: None,
                },
            ),
            (true, false, Some(algorithm)) => (
                Checksummer::flexible(
                    ChecksumSource::Compute(ChecksumAlgorithm::Sha256),
                    algorithm,
                ),
                PayloadFraming::Plain,
            ),
            (true, false, None) => (Checksummer::Default, PayloadFraming::Plain),
            (false, true, checksum) if checksum.is_some() || has_trailer => (
                Checksummer::precomputed(STREAMING_UNSIGNED_PAYLOAD_TRAILER),
                PayloadFraming::Chunked {
                    signed: false,
                    checksum,
                },
            ),
            (false, _, Some(algorithm)) => (
                Checksummer::flexible(
                    ChecksumSource::Constant(UNSIGNED_PAYLOAD.to_string()),
                    algorithm,
                ),
                PayloadFraming::Plain,
            ),
            (false, _, None) => (
                Checksummer::precomputed(UNSIGNED_PAYLOAD),
                PayloadFraming::Plain,
            ),
        };
        debug!("selected checksummer: {:?}, framing: {:?}", selected.0, selected.1);
        Ok(selected)
    }

    /// Compute checksums over a blocking payload, write them into `req` and
    /// return the content hash.
    pub fn checksum(
        &self,
        payload: Option<&dyn ContentStreamProvider>,
        req: &mut SigningRequest,
        store: Option<&ChecksumStore>,
    ) -> Result<String> {
        let mut digests = Digests::new(self, store);
        if digests.needs_payload() {
            if let Some(payload) = payload {
                let mut reader = payload.new_stream().map_err(|e| {
                    Error::payload_read("failed to open payload for checksum").with_source(e)
                })?;
                let mut buf = vec![0; 64 * 1024];
                loop {
                    let n = match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            return Err(Error::payload_read("failed to read payload for checksum")
                                .with_source(e))
                        }
                    };
                    digests.update(&buf[..n]);
                }
            }
        }
        digests.finish(self, req, store)
    }

    /// Compute checksums over an async payload, write them into `req` and
    /// return the content hash.
    pub async fn checksum_async(
        &self,
        payload: Option<&dyn AsyncContentStreamProvider>,
        req: &mut SigningRequest,
        store: Option<&ChecksumStore>,
    ) -> Result<String> {
        let mut digests = Digests::new(self, store);
        if digests.needs_payload() {
            if let Some(payload) = payload {
                let mut stream = payload.new_stream();
                while let Some(bs) = stream.try_next().await.map_err(|e| {
                    Error::payload_read("failed to read payload for checksum").with_source(e)
                })? {
                    digests.update(&bs);
                }
            }
        }
        digests.finish(self, req, store)
    }
}

/// Running hashers of a checksummer, one slot per written header.
struct Digests {
    hashers: Vec<Option<ChecksumHasher>>,
}

impl Digests {
    fn new(checksummer: &Checksummer, store: Option<&ChecksumStore>) -> Self {
        let hashers = match checksummer {
            Checksummer::Default => vec![Some(ChecksumAlgorithm::Sha256.hasher())],
            Checksummer::Flexible(options) => options
                .iter()
                .map(|option| match &option.source {
                    ChecksumSource::Compute(algorithm)
                        if store.and_then(|s| s.get(*algorithm)).is_none() =>
                    {
                        Some(algorithm.hasher())
                    }
                    _ => None,
                })
                .collect(),
            Checksummer::Precomputed { .. } => Vec::new(),
        };
        Self { hashers }
    }

    fn needs_payload(&self) -> bool {
        self.hashers.iter().any(Option::is_some)
    }

    fn update(&mut self, content: &[u8]) {
        for hasher in self.hashers.iter_mut().flatten() {
            hasher.update(content);
        }
    }

    fn finish(
        self,
        checksummer: &Checksummer,
        req: &mut SigningRequest,
        store: Option<&ChecksumStore>,
    ) -> Result<String> {
        let mut hashers = self.hashers.into_iter();
        match checksummer {
            Checksummer::Default => {
                let value = hashers
                    .next()
                    .flatten()
                    .map(|h| hex::encode(h.finalize()))
                    .ok_or_else(|| Error::unexpected("content hash was not computed"))?;
                req.header_put(X_AMZ_CONTENT_SHA_256, &value)?;
                Ok(value)
            }
            Checksummer::Flexible(options) => {
                let mut content_hash = None;
                for (option, hasher) in options.iter().zip(hashers) {
                    let value = match (&option.source, hasher) {
                        (ChecksumSource::Constant(v), _) => v.clone(),
                        (ChecksumSource::Compute(algorithm), hasher) => {
                            let raw = match hasher {
                                Some(hasher) => {
                                    let raw = hasher.finalize();
                                    if let Some(store) = store {
                                        store.put(*algorithm, raw.clone());
                                    }
                                    raw
                                }
                                None => store
                                    .and_then(|s| s.get(*algorithm))
                                    .ok_or_else(|| {
                                        Error::unexpected(format!(
                                            "checksum {algorithm} was not computed"
                                        ))
                                    })?,
                            };
                            match option.format {
                                ChecksumFormat::Hex => hex::encode(raw),
                                ChecksumFormat::Base64 => base64_encode(&raw),
                            }
                        }
                    };
                    req.header_put(&option.header, &value)?;
                    content_hash.get_or_insert(value);
                }
                content_hash.ok_or_else(|| Error::unexpected("flexible checksummer has no options"))
            }
            Checksummer::Precomputed { value, header } => {
                if let Some(header) = header {
                    req.header_put(header, value)?;
                }
                Ok(value.clone())
            }
        }
    }
}
