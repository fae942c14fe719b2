use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use sigv4_core::hash::{hex_hmac_sha256, hmac_sha256};
use sigv4_core::time::days_since_epoch;

use crate::constants::AWS4_REQUEST;
use crate::CredentialScope;

/// Default capacity of [`SigningKeyCache`].
pub const DEFAULT_SIGNING_KEY_CACHE_SIZE: usize = 300;

/// A derived SigV4 signing key.
///
/// The bytes are immutable and shared, cloning never copies them.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Arc<[u8]>);

impl SigningKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex encoded HMAC-SHA256 of `content` under this key.
    pub fn sign(&self, content: &[u8]) -> String {
        hex_hmac_sha256(&self.0, content)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(***)")
    }
}

/// Derive the signing key for `scope`:
///
/// ```text
/// HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
/// ```
pub fn derive_signing_key(secret_access_key: &str, scope: &CredentialScope) -> SigningKey {
    let secret = format!("AWS4{secret_access_key}");
    let sign_date = hmac_sha256(secret.as_bytes(), scope.date().as_bytes());
    let sign_region = hmac_sha256(&sign_date, scope.region().as_bytes());
    let sign_service = hmac_sha256(&sign_region, scope.service().as_bytes());
    let sign_request = hmac_sha256(&sign_service, AWS4_REQUEST.as_bytes());

    SigningKey::from_bytes(sign_request)
}

/// Bounded FIFO cache of derived signing keys.
///
/// Entries are keyed by secret, region and service, and are only reused on
/// the day they were derived for.
pub struct SigningKeyCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    keys: HashMap<String, (i64, SigningKey)>,
    order: VecDeque<String>,
}

impl Default for SigningKeyCache {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNING_KEY_CACHE_SIZE)
    }
}

impl fmt::Debug for SigningKeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl SigningKeyCache {
    /// Create a cache holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::default(),
        }
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys
            .len()
    }

    /// Is this cache empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the key for `scope`, deriving and caching it on a miss.
    pub fn get_or_derive(&self, secret_access_key: &str, scope: &CredentialScope) -> SigningKey {
        let cache_key = format!("{secret_access_key}-{}-{}", scope.region(), scope.service());
        let day = days_since_epoch(scope.instant());

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_day, key)) = inner.keys.get(&cache_key) {
            if *cached_day == day {
                return key.clone();
            }
        }

        debug!(
            "signing key cache miss for {}/{}",
            scope.region(),
            scope.service()
        );
        let key = derive_signing_key(secret_access_key, scope);
        if inner
            .keys
            .insert(cache_key.clone(), (day, key.clone()))
            .is_none()
        {
            inner.order.push_back(cache_key);
            while inner.order.len() > self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.keys.remove(&oldest);
                }
            }
        }
        key
    }
}
