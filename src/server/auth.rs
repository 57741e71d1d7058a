use hmac::{ Hmac, Mac };
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Signed timestamps older or newer than this are refused.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing ts/sig")]
    MissingCredentials,
    #[error("timestamp out of range")]
    TimestampOutOfRange,
    #[error("bad signature")]
    BadSignature,
}

fn timestamp_mac(secret: &str, ts: i64) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(
        |_| AuthError::BadSignature
    )?;
    mac.update(ts.to_string().as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of the decimal timestamp, keyed by the shared secret.
pub fn sign(secret: &str, ts: i64) -> Result<String, AuthError> {
    Ok(hex::encode(timestamp_mac(secret, ts)?.finalize().into_bytes()))
}

/// Checks a WebSocket handshake. With no secret configured every client is
/// let in. Otherwise the client either presents the secret in `X-API-Key`
/// or signs a recent timestamp (`ts` + `sig` query parameters).
pub fn verify_handshake(
    secret: Option<&str>,
    api_key_header: Option<&str>,
    query: Option<&str>,
    now: i64
) -> Result<(), AuthError> {
    let secret = match secret {
        Some(k) if !k.is_empty() => k,
        _ => {
            return Ok(());
        }
    };

    if api_key_header == Some(secret) {
        return Ok(());
    }

    let params: HashMap<String, String> = form_urlencoded
        ::parse(query.unwrap_or("").as_bytes())
        .into_owned()
        .collect();
    let ts = params.get("ts").or_else(|| params.get("X-Api-Ts"));
    let sig = params.get("sig").or_else(|| params.get("X-Api-Sign"));

    let (ts, sig) = match (ts, sig) {
        (Some(ts), Some(sig)) => (ts, sig),
        _ => {
            return Err(AuthError::MissingCredentials);
        }
    };

    let ts: i64 = ts.parse().map_err(|_| AuthError::TimestampOutOfRange)?;
    if (now - ts).abs() > MAX_CLOCK_SKEW_SECS {
        return Err(AuthError::TimestampOutOfRange);
    }

    let provided = hex::decode(sig).map_err(|_| AuthError::BadSignature)?;
    timestamp_mac(secret, ts)?.verify_slice(&provided).map_err(|_| AuthError::BadSignature)
}
