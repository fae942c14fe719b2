use std::fmt::Write;
use std::sync::Arc;

use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, HOST};
use http::request::Parts;
use log::debug;
use sigv4_core::hash::hex_sha256;
use sigv4_core::{Error, Result, SigningRequest};

use crate::capability::{AsyncPayload, Payload, Signed};
use crate::constants::{
    AWS4_HMAC_SHA256, AWS_CHUNKED, X_AMZ_ALGORITHM_QUERY, X_AMZ_CREDENTIAL_QUERY, X_AMZ_DATE,
    X_AMZ_DATE_QUERY, X_AMZ_DECODED_CONTENT_LENGTH, X_AMZ_EXPIRES_QUERY, X_AMZ_SECURITY_TOKEN,
    X_AMZ_SECURITY_TOKEN_QUERY, X_AMZ_SIGNATURE_QUERY, X_AMZ_SIGNED_HEADERS_QUERY, X_AMZ_TRAILER,
};
use crate::{
    AuthLocation, CanonicalOptions, CanonicalRequest, CapabilityRegistry, Checksummer,
    ChunkedPayload, CredentialScope, PayloadFraming, RollingSigner, SignRequest, SigningKey,
    SigningKeyCache, SigningProperties, derive_signing_key,
};

/// Signing material produced by one sign operation.
#[derive(Debug, Clone)]
pub struct V4Context {
    content_hash: String,
    canonical_request: String,
    string_to_sign: String,
    signing_key: SigningKey,
    signature: String,
    scope: CredentialScope,
}

impl V4Context {
    /// Content hash used in the canonical request.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// The canonical request that was signed.
    pub fn canonical_request(&self) -> &str {
        &self.canonical_request
    }

    /// The string to sign.
    pub fn string_to_sign(&self) -> &str {
        &self.string_to_sign
    }

    /// Derived signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Hex encoded request signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Credential scope of this signature.
    pub fn scope(&self) -> &CredentialScope {
        &self.scope
    }

    /// A rolling signer seeded with the request signature.
    pub fn rolling_signer(&self) -> RollingSigner {
        RollingSigner::new(self.signing_key.clone(), self.signature.clone())
    }
}

/// RequestSigner that implements AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
/// - [Signature Calculations for the Authorization Header: Transferring Payload in Multiple Chunks](https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-streaming.html)
#[derive(Debug, Clone, Default)]
pub struct RequestSigner {
    key_cache: Option<Arc<SigningKeyCache>>,
    capabilities: CapabilityRegistry,
}

impl RequestSigner {
    /// Create a new signer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse derived signing keys across requests.
    pub fn with_key_cache(mut self, cache: Arc<SigningKeyCache>) -> Self {
        self.key_cache = Some(cache);
        self
    }

    /// Set optional capabilities such as the event stream signer.
    pub fn with_capabilities(mut self, capabilities: CapabilityRegistry) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Registered optional capabilities.
    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    fn signing_key(&self, secret_access_key: &str, scope: &CredentialScope) -> SigningKey {
        match &self.key_cache {
            Some(cache) => cache.get_or_derive(secret_access_key, scope),
            None => derive_signing_key(secret_access_key, scope),
        }
    }

    /// Add date, token and host, build the canonical request, sign it and
    /// write the signature into the request.
    ///
    /// Everything the signature covers must be in `req` before this is called.
    fn sign_prepared(
        &self,
        req: &mut SigningRequest,
        props: &SigningProperties,
        scope: CredentialScope,
        content_hash: String,
    ) -> Result<V4Context> {
        let cred = props.credential();

        if req.headers.get(HOST).is_none() {
            let authority = req.authority.to_string();
            req.header_put(HOST, authority)?;
        }

        match props.auth_location() {
            AuthLocation::Header => {
                req.header_put(X_AMZ_DATE, scope.datetime())?;
                if let Some(token) = &cred.session_token {
                    req.header_put_sensitive(X_AMZ_SECURITY_TOKEN, token)?;
                }
            }
            AuthLocation::QueryString => {
                let signed_headers = CanonicalRequest::new(req, "", CanonicalOptions::default())
                    .signed_headers()?
                    .to_string();

                req.query_put(X_AMZ_ALGORITHM_QUERY, AWS4_HMAC_SHA256);
                req.query_put(X_AMZ_CREDENTIAL_QUERY, scope.scope_with_credential(cred));
                req.query_put(X_AMZ_DATE_QUERY, scope.datetime());
                if let Some(expiration) = props.expiration() {
                    req.query_put(X_AMZ_EXPIRES_QUERY, expiration.as_secs().to_string());
                }
                req.query_put(X_AMZ_SIGNED_HEADERS_QUERY, signed_headers);
                if let Some(token) = &cred.session_token {
                    req.query_put(X_AMZ_SECURITY_TOKEN_QUERY, token.as_str());
                }
            }
        }

        let creq = CanonicalRequest::new(
            req,
            content_hash,
            CanonicalOptions {
                double_url_encode: props.double_url_encode(),
                normalize_path: props.normalize_path(),
            },
        );
        let canonical_request = creq.canonical_request()?.to_string();
        let signed_headers = creq.signed_headers()?.to_string();
        let content_hash = creq.content_hash().to_string();
        debug!("calculated canonical request: {canonical_request}");

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope_str = scope.scope();
        debug!("calculated scope: {scope_str}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = {
            let mut f = String::new();
            writeln!(f, "{AWS4_HMAC_SHA256}")?;
            writeln!(f, "{}", scope.datetime())?;
            writeln!(f, "{scope_str}")?;
            write!(f, "{}", hex_sha256(canonical_request.as_bytes()))?;
            f
        };
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key = self.signing_key(&cred.secret_access_key, &scope);
        let signature = signing_key.sign(string_to_sign.as_bytes());

        match props.auth_location() {
            AuthLocation::Header => {
                req.header_put_sensitive(
                    http::header::AUTHORIZATION,
                    format!(
                        "{AWS4_HMAC_SHA256} Credential={}, SignedHeaders={signed_headers}, Signature={signature}",
                        scope.scope_with_credential(cred)
                    ),
                )?;
            }
            AuthLocation::QueryString => {
                req.query_push(X_AMZ_SIGNATURE_QUERY, signature.as_str());
            }
        }

        Ok(V4Context {
            content_hash,
            canonical_request,
            string_to_sign,
            signing_key,
            signature,
            scope,
        })
    }
}

/// Headers and trailers of an aws-chunked payload, prepared before signing.
struct ChunkedPlan {
    payload: ChunkedPayload,
    signed: bool,
}

/// Add the aws-chunked headers to `req`, moving declared trailers out of the
/// headers, and return the framing to apply once the seed signature is
/// known.
fn prepare_chunked(
    req: &mut SigningRequest,
    props: &SigningProperties,
    payload: Option<&Payload>,
    signed: bool,
    checksum: Option<crate::ChecksumAlgorithm>,
) -> Result<ChunkedPlan> {
    let payload: Payload = match payload {
        Some(v) => v.clone(),
        None => Arc::new(bytes::Bytes::new()),
    };

    let decoded_length = match req.header_get(CONTENT_LENGTH) {
        Some(v) => v.parse::<u64>().map_err(|e| {
            Error::request_invalid(format!("invalid content-length: {v}")).with_source(e)
        })?,
        None => {
            return Err(Error::request_invalid(
                "content-length must be set to sign an aws-chunked payload",
            ))
        }
    };

    let mut chunked = ChunkedPayload::new(payload, props.chunk_size());

    let mut declared: Vec<String> = Vec::new();
    for value in req.header_values(X_AMZ_TRAILER)? {
        declared.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        );
    }

    let mut announced = Vec::new();
    for name in declared {
        let values = req.header_remove(&name)?;
        if values.is_empty() {
            return Err(Error::request_invalid(format!(
                "trailer {name} is declared in {X_AMZ_TRAILER} but missing from the request"
            )));
        }
        chunked = chunked.with_trailer(&name, values.join(","));
        announced.push(name);
    }
    if let Some(algorithm) = checksum {
        chunked = chunked.with_checksum_trailer(algorithm, props.checksum_store().cloned());
        announced.push(algorithm.header_name());
    }
    if !announced.is_empty() {
        req.header_put(X_AMZ_TRAILER, announced.join(","))?;
    }

    let content_encoding = match req.header_get(CONTENT_ENCODING) {
        Some(v) if !v.is_empty() => format!("{AWS_CHUNKED},{v}"),
        _ => AWS_CHUNKED.to_string(),
    };
    req.header_put(CONTENT_ENCODING, content_encoding)?;
    req.header_put(X_AMZ_DECODED_CONTENT_LENGTH, decoded_length.to_string())?;
    req.header_put(
        CONTENT_LENGTH,
        chunked.framed_length(decoded_length, signed).to_string(),
    )?;

    Ok(ChunkedPlan {
        payload: chunked,
        signed,
    })
}

#[async_trait::async_trait]
impl SignRequest for RequestSigner {
    fn sign(
        &self,
        parts: &mut Parts,
        payload: Option<Payload>,
        props: &SigningProperties,
    ) -> Result<Signed<Payload>> {
        if props.credential().is_anonymous() {
            return Ok(Signed {
                payload,
                context: None,
            });
        }
        if props.region_set().is_some() {
            return self.capabilities.sigv4a()?.sign(parts, payload, props);
        }

        let mut req = SigningRequest::build(parts)?;
        let scope = props.credential_scope();

        let (checksummer, framing) = Checksummer::select(props, &req)?;
        let chunked = match framing {
            PayloadFraming::Plain => None,
            PayloadFraming::Chunked { signed, checksum } => Some(prepare_chunked(
                &mut req,
                props,
                payload.as_ref(),
                signed,
                checksum,
            )?),
            PayloadFraming::EventStream => {
                return Err(Error::unsupported(
                    "event stream payloads can only be signed with sign_async",
                ))
            }
        };

        let content_hash =
            checksummer.checksum(payload.as_deref(), &mut req, props.checksum_store())?;
        let ctx = self.sign_prepared(&mut req, props, scope, content_hash)?;
        req.apply(parts)?;

        let payload = match chunked {
            None => payload,
            Some(ChunkedPlan { payload, signed }) => {
                let payload = if signed {
                    payload.with_signer(ctx.rolling_signer(), ctx.scope().clone())
                } else {
                    payload
                };
                Some(Arc::new(payload) as Payload)
            }
        };

        Ok(Signed {
            payload,
            context: Some(ctx),
        })
    }

    async fn sign_async(
        &self,
        parts: &mut Parts,
        payload: Option<AsyncPayload>,
        props: &SigningProperties,
    ) -> Result<Signed<AsyncPayload>> {
        if props.credential().is_anonymous() {
            return Ok(Signed {
                payload,
                context: None,
            });
        }
        if props.region_set().is_some() {
            let signer = self.capabilities.sigv4a()?;
            return signer.sign_async(parts, payload, props).await;
        }

        let mut req = SigningRequest::build(parts)?;
        let scope = props.credential_scope();

        let (checksummer, framing) = Checksummer::select(props, &req)?;
        let event_stream = match framing {
            PayloadFraming::Plain => None,
            PayloadFraming::Chunked { .. } => {
                return Err(Error::unsupported(
                    "aws-chunked payloads can only be signed with sign",
                ))
            }
            PayloadFraming::EventStream => Some(self.capabilities.event_stream()?),
        };

        let content_hash = checksummer
            .checksum_async(payload.as_deref(), &mut req, props.checksum_store())
            .await?;
        let ctx = self.sign_prepared(&mut req, props, scope, content_hash)?;
        req.apply(parts)?;

        let payload = match (event_stream, payload) {
            (Some(signer), Some(payload)) => Some(signer.sign_event_stream(
                payload,
                ctx.rolling_signer(),
                ctx.scope().clone(),
            )),
            (_, payload) => payload,
        };

        Ok(Signed {
            payload,
            context: Some(ctx),
        })
    }
}
