//! Webhook signature verification.
//!
//! The platform signs every webhook POST body with HMAC-SHA1 keyed by the
//! app secret and sends the digest in the `x-hub-signature` header as
//! `sha1=<hex>`. Verification must run over the exact bytes as received,
//! before any JSON parsing.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

#[derive(Debug, Error)]
pub enum SignatureError {
    /// No `x-hub-signature` header on the request. Unsigned requests are
    /// rejected, not merely logged.
    #[error("missing {SIGNATURE_HEADER} header")]
    MissingHeader,
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify `raw_body` against a `sha1=<hex>` header value. `header` is None
/// when the request carried no signature header at all.
pub fn verify(
    app_secret: &str,
    raw_body: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let hex_sig = header
        .strip_prefix("sha1=")
        .ok_or_else(|| SignatureError::MalformedHeader("expected sha1= prefix".to_string()))?;
    let provided = hex::decode(hex_sig)
        .map_err(|e| SignatureError::MalformedHeader(format!("invalid hex digest: {e}")))?;

    let mut mac = HmacSha1::new_from_slice(app_secret.as_bytes())
        .map_err(|e| SignatureError::MalformedHeader(format!("hmac key error: {e}")))?;
    mac.update(raw_body);
    let computed = mac.finalize().into_bytes();

    if computed.len() != provided.len() {
        return Err(SignatureError::Mismatch);
    }
    if !bool::from(computed.ct_eq(&provided)) {
        return Err(SignatureError::Mismatch);
    }
    Ok(())
}

/// Hex HMAC-SHA1 digest of `body` keyed by `app_secret`, as the platform
/// would send it. Used by tests to sign payloads.
pub fn sign(app_secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha1::new_from_slice(app_secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
}
