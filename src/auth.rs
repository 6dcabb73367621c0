//! Keyed-hash verification of inbound run-task requests.
//!
//! The run platform signs the raw request body with HMAC-SHA512 and
//! sends the hex digest in `X-Tfc-Task-Signature`. Verification is
//! symmetric: it happens exactly when both sides hold a key, and a
//! one-sided key (either side) rejects the request.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::errors::AppError;

type HmacSha512 = Hmac<Sha512>;

/// Decides accept/reject for the intake endpoint. Holds no other state
/// and never touches the token store.
#[derive(Clone)]
pub struct RequestAuthenticator {
    secret: Option<String>,
}

impl RequestAuthenticator {
    /// An empty key counts as "not configured", matching the env-var
    /// convention where `HMAC_KEY=""` disables verification.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Verify `signature` (hex HMAC-SHA512) against the exact raw body.
    ///
    /// Four cases:
    /// 1. key + signature  → compare digests (constant time)
    /// 2. no key, no signature → accept, verification disabled
    /// 3. signature without a local key → reject
    /// 4. local key without a signature → reject
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), AppError> {
        let signature = signature.map(str::trim).filter(|s| !s.is_empty());

        match (&self.secret, signature) {
            (Some(key), Some(provided)) => {
                // Malformed hex can never match any digest.
                let provided_bytes = hex::decode(provided)
                    .map_err(|_| AppError::AuthFailed("Invalid HMAC signature"))?;

                let mut mac = HmacSha512::new_from_slice(key.as_bytes())
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("bad HMAC key: {}", e)))?;
                mac.update(body);
                mac.verify_slice(&provided_bytes)
                    .map_err(|_| AppError::AuthFailed("Invalid HMAC signature"))?;

                tracing::debug!("Valid HMAC signature");
                Ok(())
            }
            (None, None) => Ok(()),
            (None, Some(_)) => Err(AppError::AuthFailed(
                "An HMAC signature was provided, but no local key is configured",
            )),
            (Some(_), None) => Err(AppError::AuthFailed(
                "No HMAC signature was provided, but a local key is configured",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(key: &str, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(key.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn both_sides_keyed_and_matching_accepts() {
        let auth = RequestAuthenticator::new(Some("k".into()));
        let body = br#"{"run_id":"run-1"}"#;
        assert!(auth.verify(body, Some(&sign("k", body))).is_ok());
    }

    #[test]
    fn mismatched_digest_rejects() {
        let auth = RequestAuthenticator::new(Some("k".into()));
        let body = b"payload";
        let sig = sign("other-key", body);
        assert!(matches!(
            auth.verify(body, Some(&sig)),
            Err(AppError::AuthFailed(_))
        ));
    }

    #[test]
    fn digest_of_different_body_rejects() {
        let auth = RequestAuthenticator::new(Some("k".into()));
        let sig = sign("k", b"original body");
        assert!(auth.verify(b"tampered body", Some(&sig)).is_err());
    }

    #[test]
    fn neither_side_keyed_accepts() {
        let auth = RequestAuthenticator::new(None);
        assert!(auth.verify(b"anything", None).is_ok());
    }

    #[test]
    fn empty_key_counts_as_unconfigured() {
        let auth = RequestAuthenticator::new(Some(String::new()));
        assert!(auth.verify(b"anything", None).is_ok());
    }

    #[test]
    fn signature_without_local_key_rejects() {
        let auth = RequestAuthenticator::new(None);
        assert!(matches!(
            auth.verify(b"body", Some("deadbeef")),
            Err(AppError::AuthFailed(_))
        ));
    }

    #[test]
    fn local_key_without_signature_rejects() {
        let auth = RequestAuthenticator::new(Some("k".into()));
        assert!(matches!(
            auth.verify(b"body", None),
            Err(AppError::AuthFailed(_))
        ));
    }

    #[test]
    fn malformed_hex_rejects() {
        let auth = RequestAuthenticator::new(Some("k".into()));
        assert!(auth.verify(b"body", Some("not-hex!")).is_err());
    }

    #[test]
    fn surrounding_whitespace_in_header_is_trimmed() {
        let auth = RequestAuthenticator::new(Some("k".into()));
        let body = b"body";
        let sig = format!("  {}  ", sign("k", body));
        assert!(auth.verify(body, Some(&sig)).is_ok());
    }
}
