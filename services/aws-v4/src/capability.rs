use std::fmt::Debug;
use std::sync::Arc;

use http::request::Parts;
use sigv4_core::{AsyncContentStreamProvider, ContentStreamProvider, Error, Result};

use crate::{CredentialScope, RollingSigner, SigningProperties, V4Context};

/// A payload that can be opened as a blocking reader many times.
pub type Payload = Arc<dyn ContentStreamProvider>;

/// A payload that can be opened as an async stream many times.
pub type AsyncPayload = Arc<dyn AsyncContentStreamProvider>;

/// The outcome of signing a request.
///
/// The request itself is signed in place. The payload is the one the
/// transport must send, which may be a re-framed version of the input.
#[derive(Debug)]
pub struct Signed<P> {
    /// Payload to send.
    pub payload: Option<P>,
    /// Signing material, `None` when signing was skipped for anonymous
    /// credentials.
    pub context: Option<V4Context>,
}

/// SignRequest is the trait every request signer implements.
///
/// Optional signers (such as SigV4A) plug in through the same contract via
/// [`CapabilityRegistry`].
#[async_trait::async_trait]
pub trait SignRequest: Debug + Send + Sync + 'static {
    /// Sign a request whose payload is read synchronously.
    fn sign(
        &self,
        req: &mut Parts,
        payload: Option<Payload>,
        props: &SigningProperties,
    ) -> Result<Signed<Payload>>;

    /// Sign a request whose payload is an async stream.
    async fn sign_async(
        &self,
        req: &mut Parts,
        payload: Option<AsyncPayload>,
        props: &SigningProperties,
    ) -> Result<Signed<AsyncPayload>>;
}

/// Re-frames an event stream payload into signed event messages.
pub trait EventStreamSigner: Debug + Send + Sync + 'static {
    /// Wrap `payload`. Every message signature chains from `signer`.
    fn sign_event_stream(
        &self,
        payload: AsyncPayload,
        signer: RollingSigner,
        scope: CredentialScope,
    ) -> AsyncPayload;
}

/// Optional signing capabilities registered at startup.
///
/// Looking up a capability that was never registered is an
/// [`ErrorKind::Unsupported`](sigv4_core::ErrorKind::Unsupported) error.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    sigv4a: Option<Arc<dyn SignRequest>>,
    event_stream: Option<Arc<dyn EventStreamSigner>>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the SigV4A signer.
    pub fn register_sigv4a(mut self, signer: Arc<dyn SignRequest>) -> Self {
        self.sigv4a = Some(signer);
        self
    }

    /// Register the event stream signer.
    pub fn register_event_stream(mut self, signer: Arc<dyn EventStreamSigner>) -> Self {
        self.event_stream = Some(signer);
        self
    }

    /// The SigV4A signer, used for requests whose properties carry a
    /// region set.
    pub fn sigv4a(&self) -> Result<Arc<dyn SignRequest>> {
        self.sigv4a.clone().ok_or_else(|| {
            Error::unsupported(
                "SigV4A signing is not available, register a signer with CapabilityRegistry::register_sigv4a",
            )
        })
    }

    /// The event stream signer.
    pub fn event_stream(&self) -> Result<Arc<dyn EventStreamSigner>> {
        self.event_stream.clone().ok_or_else(|| {
            Error::unsupported(
                "event stream signing is not available, register a signer with CapabilityRegistry::register_event_stream",
            )
        })
    }
}
