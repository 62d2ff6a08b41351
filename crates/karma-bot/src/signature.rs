//! Slack request signing: `v0=` + hex HMAC-SHA256 of `v0:{timestamp}:{body}` keyed by the
//! app's signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Requests older (or newer) than this are rejected as replays.
pub const MAX_SKEW_SECS: u64 = 5 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("malformed request timestamp")]
    BadTimestamp,
    #[error("request timestamp outside the 5 minute window")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
    #[error("signing secret rejected by HMAC")]
    BadSecret,
}

/// Check a delivery against the signing secret at wall-clock second `now`.
pub fn verify(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let timestamp = timestamp.ok_or(SignatureError::MissingHeader("X-Slack-Request-Timestamp"))?;
    let signature = signature.ok_or(SignatureError::MissingHeader("X-Slack-Signature"))?;
    let timestamp = timestamp.trim();
    let ts: i64 = timestamp.parse().map_err(|_| SignatureError::BadTimestamp)?;
    let skew = now
        .checked_sub(ts)
        .map(i64::unsigned_abs)
        .ok_or(SignatureError::Stale)?;
    if skew > MAX_SKEW_SECS {
        return Err(SignatureError::Stale);
    }

    let digest = signature
        .trim()
        .strip_prefix("v0=")
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or(SignatureError::Mismatch)?;
    keyed_mac(secret, timestamp, body)?
        .verify_slice(&digest)
        .map_err(|_| SignatureError::Mismatch)
}

/// The `X-Slack-Signature` value for a body sent at `timestamp`.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mac = keyed_mac(secret, timestamp, body)?;
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

fn keyed_mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::BadSecret)?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}
