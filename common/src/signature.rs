use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of checking a notification body against the hub signature headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Secret configured, `X-Hub-Signature-256` present and matching
    Valid,
    /// Secret configured but the signature is absent with only a legacy SHA1
    /// header, malformed, or does not match the body
    Invalid,
    /// No secret configured or no signature sent, nothing to verify
    NotSigned,
}

/// Verifies an HMAC-SHA256 hub signature over the raw body bytes.
///
/// The expected header value is `sha256=<lowercase hex digest>`. A legacy
/// SHA1 `X-Hub-Signature` on its own cannot be verified and fails closed.
pub fn verify(
    secret: Option<&str>,
    signature_256: Option<&str>,
    legacy_signature: Option<&str>,
    body: &[u8],
) -> SignatureCheck {
    let Some(secret) = secret else {
        return SignatureCheck::NotSigned;
    };

    let Some(provided) = signature_256 else {
        if legacy_signature.is_some() {
            return SignatureCheck::Invalid;
        }
        return SignatureCheck::NotSigned;
    };

    let Some(provided) = provided.strip_prefix("sha256=") else {
        return SignatureCheck::Invalid;
    };
    let Ok(provided) = hex::decode(provided) else {
        return SignatureCheck::Invalid;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return SignatureCheck::Invalid;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.ct_eq(&provided).into() {
        SignatureCheck::Valid
    } else {
        SignatureCheck::Invalid
    }
}
