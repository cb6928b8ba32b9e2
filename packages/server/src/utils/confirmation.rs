//! Confirmation codes for passwordless signup.
//!
//! A code is never stored. It is an HMAC-SHA256 over the user's identity, a
//! fingerprint of their mutable state, a purpose tag, and an issuance
//! timestamp, prefixed with that timestamp in base36:
//!
//! ```text
//! <timestamp_b36>-<hex(hmac_sha256(secret, purpose:id:timestamp:fingerprint))>
//! ```
//!
//! Verification recomputes the MAC against the user's *current* row, so any
//! update to the row invalidates every previously issued code. The embedded
//! timestamp bounds the code's lifetime.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::entity::user;

type HmacSha256 = Hmac<Sha256>;

const PURPOSE: &str = "signup-confirmation";

/// Hash of the full user row. Field order is the struct definition, which
/// keeps the fingerprint stable across releases that don't touch the entity.
fn state_fingerprint(user: &user::Model) -> String {
    let serialized = serde_json::to_vec(user).expect("user model serializes");
    hex::encode(Sha256::digest(&serialized))
}

fn compute_mac(user: &user::Model, secret: &str, timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(PURPOSE.as_bytes());
    mac.update(b":");
    mac.update(user.id.to_string().as_bytes());
    mac.update(b":");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b":");
    mac.update(state_fingerprint(user).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn to_base36(mut value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value <= 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

/// Derive the confirmation code currently valid for a user.
pub fn issue(user: &user::Model, secret: &str, now: DateTime<Utc>) -> String {
    let timestamp = now.timestamp();
    format!("{}-{}", to_base36(timestamp), compute_mac(user, secret, timestamp))
}

/// Check a submitted code against the user's current state.
pub fn verify(
    user: &user::Model,
    code: &str,
    secret: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> bool {
    let Some((timestamp_b36, mac_hex)) = code.split_once('-') else {
        return false;
    };
    let Ok(timestamp) = i64::from_str_radix(timestamp_b36, 36) else {
        return false;
    };

    let age = now.timestamp() - timestamp;
    if age < 0 || age > ttl.num_seconds() {
        return false;
    }

    let Ok(submitted) = hex::decode(mac_hex) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(PURPOSE.as_bytes());
    mac.update(b":");
    mac.update(user.id.to_string().as_bytes());
    mac.update(b":");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b":");
    mac.update(state_fingerprint(user).as_bytes());
    mac.verify_slice(&submitted).is_ok()
}
