//! The injected JWT-signing capability (C2). See spec.md §4.2 and §9
//! ("the core receives a ready sign(payload) → JWT capability").
//!
//! The engine and API client depend only on the `Signer` trait; they never
//! construct a signer themselves. `JwtSigner` is the one concrete
//! implementation, backed by the client's RSA private key
//! (`privateKey.pem`), analogous to how `credentials.rs` owns the
//! signing-key path the rest of the app never touches directly.

use crate::error::ApiError;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;

pub trait Signer: Send + Sync {
    /// Signs `payload` and returns the resulting JWT.
    fn sign(&self, payload: &serde_json::Value) -> Result<String, ApiError>;
}

/// RSA-backed JWT signer loaded from a PEM-encoded private key.
pub struct JwtSigner {
    key: EncodingKey,
}

impl JwtSigner {
    pub fn from_pem(pem_bytes: &[u8]) -> Result<Self, ApiError> {
        let key = EncodingKey::from_rsa_pem(pem_bytes)
            .map_err(|e| ApiError::NoNetwork(format!("invalid private key: {e}")))?;
        Ok(JwtSigner { key })
    }
}

impl Signer for JwtSigner {
    fn sign(&self, payload: &serde_json::Value) -> Result<String, ApiError> {
        #[derive(Serialize)]
        struct Claims {
            #[serde(flatten)]
            payload: serde_json::Value,
        }
        let claims = Claims {
            payload: payload.clone(),
        };
        encode(&Header::new(jsonwebtoken::Algorithm::RS256), &claims, &self.key)
            .map_err(|e| ApiError::NoNetwork(format!("failed to sign request: {e}")))
    }
}

/// Shared handle to whichever signer the host wired up.
pub type SharedSigner = Arc<dyn Signer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_pem() {
        let err = JwtSigner::from_pem(b"not a pem").unwrap_err();
        assert!(matches!(err, ApiError::NoNetwork(_)));
    }
}
