//! Ephemeral manifest signing using Ed25519.
//!
//! Schema-1 manifests are published as signed envelopes. Each publish call
//! generates a fresh [`EphemeralKey`] which signs the manifest payload and is
//! then discarded; keys are never persisted or reused across calls.
//!
//! The signature block follows the JWS convention: a base64 protected header
//! carrying the signing time and payload length, signed together with the
//! payload itself.
//!
//! # Example
//!
//! ```rust
//! use stratum_core::signing::{EphemeralKey, ManifestSignature};
//!
//! let key = EphemeralKey::generate();
//! let signature = ManifestSignature::sign(&key, b"{\"schemaVersion\":1}").unwrap();
//!
//! assert!(signature.verify(b"{\"schemaVersion\":1}").is_ok());
//! assert!(signature.verify(b"tampered").is_err());
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Errors that can occur while building or checking a manifest signature.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// Failed to serialize the protected header.
    #[error("failed to encode signature header: {0}")]
    Header(#[from] serde_json::Error),

    /// The signature or key material could not be decoded.
    #[error("failed to decode signature material: {0}")]
    Decode(String),

    /// The signature does not match the payload.
    #[error("invalid signature")]
    InvalidSignature,
}

/// A single-use Ed25519 signing key.
///
/// Generated fresh for every publish operation and dropped afterwards.
#[derive(Debug)]
pub struct EphemeralKey {
    signing_key: SigningKey,
}

impl EphemeralKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Signs a message, returning the raw 64-byte signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Returns the verifying (public) key as base64.
    #[must_use]
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.signing_key.verifying_key().to_bytes())
    }
}

/// Protected header included in every signature.
#[derive(Debug, Serialize, Deserialize)]
struct ProtectedHeader {
    /// RFC 3339 signing time.
    time: String,

    /// Length of the signed payload in bytes.
    #[serde(rename = "formatLength")]
    format_length: usize,
}

/// A JWS-style signature block attached to a signed manifest envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestSignature {
    /// Base64-encoded public key of the ephemeral signer.
    #[serde(rename = "keyid")]
    pub key_id: String,

    /// Signature algorithm (always "ed25519").
    pub algorithm: String,

    /// Base64-encoded protected header.
    pub protected: String,

    /// Base64-encoded signature over `protected || '.' || payload`.
    pub signature: String,
}

impl ManifestSignature {
    /// Signs a manifest payload with the given key.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Header`] if the protected header cannot be
    /// serialized.
    pub fn sign(key: &EphemeralKey, payload: &[u8]) -> Result<Self, SigningError> {
        let header = ProtectedHeader {
            time: chrono::Utc::now().to_rfc3339(),
            format_length: payload.len(),
        };
        let protected = BASE64.encode(serde_json::to_vec(&header)?);

        let signature = key.sign(&Self::message(&protected, payload));

        Ok(Self {
            key_id: key.public_key_base64(),
            algorithm: "ed25519".to_string(),
            protected,
            signature: BASE64.encode(signature),
        })
    }

    /// Verifies this signature against a payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or signature cannot be decoded, or if the
    /// signature does not match.
    pub fn verify(&self, payload: &[u8]) -> Result<(), SigningError> {
        let key_bytes: [u8; 32] = BASE64
            .decode(&self.key_id)
            .map_err(|e| SigningError::Decode(e.to_string()))?
            .try_into()
            .map_err(|_| SigningError::Decode("public key must be 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| SigningError::Decode(e.to_string()))?;

        let sig_bytes: [u8; 64] = BASE64
            .decode(&self.signature)
            .map_err(|e| SigningError::Decode(e.to_string()))?
            .try_into()
            .map_err(|_| SigningError::Decode("signature must be 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        key.verify(&Self::message(&self.protected, payload), &signature)
            .map_err(|_| SigningError::InvalidSignature)
    }

    fn message(protected: &str, payload: &[u8]) -> Vec<u8> {
        let mut message = Vec::with_capacity(protected.len() + 1 + payload.len());
        message.extend_from_slice(protected.as_bytes());
        message.push(b'.');
        message.extend_from_slice(payload);
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = EphemeralKey::generate();
        let signature = ManifestSignature::sign(&key, b"payload").unwrap();

        assert_eq!(signature.algorithm, "ed25519");
        assert!(signature.verify(b"payload").is_ok());
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let key = EphemeralKey::generate();
        let signature = ManifestSignature::sign(&key, b"payload").unwrap();

        assert!(matches!(
            signature.verify(b"other payload"),
            Err(SigningError::InvalidSignature)
        ));
    }

    #[test]
    fn test_each_key_is_fresh() {
        let a = EphemeralKey::generate();
        let b = EphemeralKey::generate();
        assert_ne!(a.public_key_base64(), b.public_key_base64());
    }

    #[test]
    fn test_protected_header_contents() {
        let key = EphemeralKey::generate();
        let signature = ManifestSignature::sign(&key, b"0123456789").unwrap();

        let header_bytes = BASE64.decode(&signature.protected).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header_bytes).unwrap();
        assert_eq!(header["formatLength"], 10);
        assert!(header["time"].as_str().is_some());
    }

    #[test]
    fn test_signature_block_serialization() {
        let key = EphemeralKey::generate();
        let signature = ManifestSignature::sign(&key, b"payload").unwrap();

        let json = serde_json::to_string(&signature).unwrap();
        assert!(json.contains("\"keyid\""));
        let back: ManifestSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signature);
        assert!(back.verify(b"payload").is_ok());
    }
}
