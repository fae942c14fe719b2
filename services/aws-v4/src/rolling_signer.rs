use crate::SigningKey;

/// Signs a sequence of payloads where every signature covers the one before
/// it.
///
/// The signer is seeded with the signature of the request itself. Each call
/// to [`RollingSigner::sign`] hands the previous signature to the string to
/// sign template and then remembers the new signature. Call
/// [`RollingSigner::reset`] before signing the same payload again.
#[derive(Debug, Clone)]
pub struct RollingSigner {
    signing_key: SigningKey,
    seed_signature: String,
    previous_signature: String,
}

impl RollingSigner {
    /// Create a new signer seeded with `seed_signature`.
    pub fn new(signing_key: SigningKey, seed_signature: impl Into<String>) -> Self {
        let seed_signature = seed_signature.into();
        Self {
            signing_key,
            previous_signature: seed_signature.clone(),
            seed_signature,
        }
    }

    /// Build a string to sign from the previous signature, sign it and
    /// return the hex signature.
    pub fn sign(&mut self, string_to_sign: impl FnOnce(&str) -> String) -> String {
        let string_to_sign = string_to_sign(&self.previous_signature);
        let signature = self.signing_key.sign(string_to_sign.as_bytes());
        self.previous_signature.clone_from(&signature);
        signature
    }

    /// The signature produced by the last call to `sign`, or the seed.
    pub fn previous_signature(&self) -> &str {
        &self.previous_signature
    }

    /// Restart the chain from the seed signature.
    pub fn reset(&mut self) {
        self.previous_signature.clone_from(&self.seed_signature);
    }
}
