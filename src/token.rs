use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};

pub const TOKEN_BYTES: usize = 32;
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// How long a verification link stays valid.
pub fn token_ttl() -> Duration {
    Duration::hours(24)
}

/// 256-bit token from the OS CSPRNG, hex-encoded.
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

pub fn is_expired(expires_at: DateTime<Utc>) -> bool {
    is_expired_at(expires_at, Utc::now())
}

pub fn is_expired_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at < now
}

fn hex_encode(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(LUT[(b >> 4) as usize] as char);
        out.push(LUT[(b & 0x0f) as usize] as char);
    }
    out
}
