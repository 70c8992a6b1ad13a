//! # Security context shared by every task.
//!
//! [`SecurityContext`] bundles the three credentials used to authenticate
//! outbound calls. It is built once at startup, wrapped in an `Arc`, and only
//! ever read afterwards.
//!
//! [`PayloadSigner`] is derived from the client secret (a base64 encoded PEM
//! RSA private key) and signs request bodies with RSA PKCS#1 v1.5 / SHA-256.
//!
//! ```text
//! Credentials ──► SecurityContext::build() ──► Arc<SecurityContext>
//!                                                   │
//!                                 ┌─────────────────┼─────────────────┐
//!                                 ▼                 ▼                 ▼
//!                           VitalsMonitor    JournaldMonitor    ShellExecutor
//!                           (signer() at construction, headers per request)
//! ```

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::Sha256;

use crate::config::Credentials;
use crate::error::SecurityError;

/// Immutable credential bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurityContext {
    access_token: String,
    client_id: String,
    client_secret: String,
}

impl SecurityContext {
    /// Validates and stores the credentials.
    ///
    /// Fails with [`SecurityError::MissingCredential`] naming the first empty
    /// field (checked in the order `access_token`, `client_id`, `client_secret`).
    ///
    /// ```
    /// use iq_agent::{SecurityContext, SecurityError};
    ///
    /// let err = SecurityContext::build("token", "", "secret").unwrap_err();
    /// assert!(matches!(err, SecurityError::MissingCredential { field: "client_id" }));
    ///
    /// let ctx = SecurityContext::build("token", "agent-1", "secret").unwrap();
    /// assert_eq!(ctx.client_id(), "agent-1");
    /// ```
    pub fn build(
        access_token: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, SecurityError> {
        let ctx = Self {
            access_token: access_token.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        };
        for (field, value) in [
            ("access_token", &ctx.access_token),
            ("client_id", &ctx.client_id),
            ("client_secret", &ctx.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(SecurityError::MissingCredential { field });
            }
        }
        Ok(ctx)
    }

    /// Builds the context from credentials read out of the configuration.
    pub fn from_credentials(creds: Credentials) -> Result<Self, SecurityError> {
        Self::build(creds.access_token, creds.client_id, creds.client_secret)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Decodes the client secret into a request signer.
    pub fn signer(&self) -> Result<PayloadSigner, SecurityError> {
        PayloadSigner::from_secret(&self.client_secret)
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Signs request payloads with the agent's private key.
#[derive(Clone)]
pub struct PayloadSigner {
    key: SigningKey<Sha256>,
}

impl PayloadSigner {
    /// Parses a base64 encoded PEM key (PKCS#8 or PKCS#1).
    pub fn from_secret(secret: &str) -> Result<Self, SecurityError> {
        let pem_bytes = STANDARD
            .decode(secret.trim())
            .map_err(|e| invalid(format!("not base64: {e}")))?;
        let pem = String::from_utf8(pem_bytes).map_err(|_| invalid("decoded secret is not text"))?;
        Self::from_pem(&pem)
    }

    /// Parses a PEM key (PKCS#8 `PRIVATE KEY` or PKCS#1 `RSA PRIVATE KEY`).
    pub fn from_pem(pem: &str) -> Result<Self, SecurityError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| invalid(format!("not an RSA private key: {e}")))?;
        Ok(Self {
            key: SigningKey::<Sha256>::new(key),
        })
    }

    /// Returns the base64 encoded signature of `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        let signature = self.key.sign(payload);
        STANDARD.encode(signature.to_bytes())
    }
}

impl fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PayloadSigner(<redacted>)")
    }
}

fn invalid(reason: impl Into<String>) -> SecurityError {
    SecurityError::InvalidSecret {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    const TEST_KEY_PEM: &str = include_str!("../tests/fixtures/client_key.pem");

    #[test]
    fn each_empty_field_is_named() {
        let cases = [
            (("", "id", "sec"), "access_token"),
            (("tok", " ", "sec"), "client_id"),
            (("tok", "id", ""), "client_secret"),
        ];
        for ((token, id, secret), expected) in cases {
            let err = SecurityContext::build(token, id, secret).unwrap_err();
            match err {
                SecurityError::MissingCredential { field } => assert_eq!(field, expected),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn debug_redacts_secrets() {
        let ctx = SecurityContext::build("tok-123", "agent", "sec-456").unwrap();
        let dbg = format!("{ctx:?}");
        assert!(dbg.contains("agent"));
        assert!(!dbg.contains("tok-123"));
        assert!(!dbg.contains("sec-456"));
    }

    #[test]
    fn signer_rejects_garbage_secret() {
        let ctx = SecurityContext::build("tok", "id", "not base64 !!").unwrap();
        assert!(matches!(ctx.signer(), Err(SecurityError::InvalidSecret { .. })));

        let ctx = SecurityContext::build("tok", "id", STANDARD.encode("hello")).unwrap();
        assert!(matches!(ctx.signer(), Err(SecurityError::InvalidSecret { .. })));
    }

    #[test]
    fn signatures_verify_against_public_key() {
        let ctx = SecurityContext::build("tok", "id", STANDARD.encode(TEST_KEY_PEM)).unwrap();
        let signer = ctx.signer().unwrap();
        let payload = br#"{"vitals":"{}"}"#;

        let encoded = signer.sign(payload);
        assert_eq!(encoded, signer.sign(payload), "pkcs1v15 signatures are deterministic");

        let private = RsaPrivateKey::from_pkcs8_pem(TEST_KEY_PEM).unwrap();
        let verifier = VerifyingKey::<Sha256>::new(private.to_public_key());
        let raw = STANDARD.decode(encoded).unwrap();
        let signature = Signature::try_from(raw.as_slice()).unwrap();
        assert!(verifier.verify(payload, &signature).is_ok());
        assert!(verifier.verify(b"tampered", &signature).is_err());
    }
}
