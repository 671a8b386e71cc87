use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64-encoded HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-lumera-hmac-sha256";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is not valid base64")]
    InvalidEncoding,
    #[error("signature does not match")]
    Mismatch,
}

/// Verify a webhook signature over the raw body.
///
/// The digest is computed over the body bytes exactly as received; any
/// re-serialization before verification would change them. Comparison is
/// constant-time via the MAC verify primitive.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    provided_base64: &str,
) -> Result<(), SignatureError> {
    let provided = BASE64_STANDARD
        .decode(provided_base64.trim())
        .map_err(|_| SignatureError::InvalidEncoding)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

/// Compute the base64 signature for a body. Used by tests and by outbound
/// webhook tooling.
pub fn sign_body(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(body);
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"relay-shared-secret";

    #[test]
    fn accepts_a_correctly_signed_body() {
        let body = br#"{"shop":"store.example.com"}"#;
        let signature = sign_body(SECRET, body);
        assert_eq!(verify_signature(SECRET, body, &signature), Ok(()));
    }

    #[test]
    fn rejects_a_tampered_body() {
        let signature = sign_body(SECRET, b"original body");
        assert_eq!(
            verify_signature(SECRET, b"tampered body", &signature),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_a_signature_under_the_wrong_secret() {
        let body = b"payload";
        let signature = sign_body(b"some other secret", body);
        assert_eq!(
            verify_signature(SECRET, body, &signature),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_non_base64_signatures() {
        assert_eq!(
            verify_signature(SECRET, b"payload", "%%% not base64 %%%"),
            Err(SignatureError::InvalidEncoding)
        );
    }

    #[test]
    fn tolerates_whitespace_around_the_header_value() {
        let body = b"payload";
        let signature = format!("  {}  ", sign_body(SECRET, body));
        assert_eq!(verify_signature(SECRET, body, &signature), Ok(()));
    }
}
