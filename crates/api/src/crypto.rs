//! Cryptographic helpers for authentication and tracking tokens.
//!
//! - PBKDF2-SHA256 password hashing (600k iterations)
//! - HMAC-SHA256 JWT access tokens carrying the user's role
//! - SHA-256 digests for refresh tokens stored at rest

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::{Role, ServiceError};

const PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

// ── Password hashing ────────────────────────────────────────────────────────

/// Hash a password with PBKDF2-SHA256. Returns `(hash_hex, salt_hex)`.
pub fn hash_password(password: &str) -> Result<(String, String), ServiceError> {
    let salt = random_bytes::<SALT_LEN>()?;
    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);
    Ok((hex::encode(hash), hex::encode(salt)))
}

/// Verify a password against a stored hash and salt (both hex-encoded).
pub fn verify_password(password: &str, hash_hex: &str, salt_hex: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);
    constant_time_eq(&hash, &expected)
}

// ── JWT (HMAC-SHA256) ───────────────────────────────────────────────────────

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Access token lifetime: 1 hour.
pub const JWT_EXPIRY_SECS: u64 = 3600;

/// Refresh token lifetime: 7 days.
pub const REFRESH_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// Verified access-token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: String,
    pub role: Role,
}

/// Sign an access token for `user_id` with `role`.
pub fn sign_jwt(user_id: &str, role: Role, secret: &str, now_unix: u64) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(JWT_HEADER.as_bytes());
    let payload = serde_json::json!({
        "sub": user_id,
        "role": role.as_str(),
        "iat": now_unix,
        "exp": now_unix + JWT_EXPIRY_SECS,
    });
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());

    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig_b64 = URL_SAFE_NO_PAD.encode(hmac_sha256(secret.as_bytes(), signing_input.as_bytes()));
    format!("{signing_input}.{sig_b64}")
}

/// Verify an access token and return its claims.
pub fn verify_jwt(token: &str, secret: &str, now_unix: u64) -> Result<Claims, ServiceError> {
    let unauthorized = |msg: &str| ServiceError::Unauthorized(msg.to_string());

    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(unauthorized("invalid JWT format"));
    };

    let expected = hmac_sha256(secret.as_bytes(), format!("{header}.{payload}").as_bytes());
    let actual = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| unauthorized("invalid JWT signature encoding"))?;
    if !constant_time_eq(&expected, &actual) {
        return Err(unauthorized("invalid JWT signature"));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| unauthorized("invalid JWT payload encoding"))?;
    let payload: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| unauthorized("invalid JWT payload"))?;

    let exp = payload["exp"]
        .as_u64()
        .ok_or_else(|| unauthorized("missing exp claim"))?;
    if now_unix > exp {
        return Err(unauthorized("JWT expired"));
    }

    let user_id = payload["sub"]
        .as_str()
        .ok_or_else(|| unauthorized("missing sub claim"))?
        .to_string();
    let role = payload["role"]
        .as_str()
        .and_then(Role::parse)
        .ok_or_else(|| unauthorized("missing role claim"))?;

    Ok(Claims { user_id, role })
}

// ── Tokens ──────────────────────────────────────────────────────────────────

/// Generate a secure random token (refresh and activation tokens). Hex-encoded.
pub fn generate_token() -> Result<String, ServiceError> {
    Ok(hex::encode(random_bytes::<32>()?))
}

/// Hash a token with SHA-256 for storage. Hex-encoded.
pub fn hash_token(token: &str) -> String {
    use sha2::Digest;
    hex::encode(Sha256::digest(token.as_bytes()))
}

// ── Internal ────────────────────────────────────────────────────────────────

fn random_bytes<const N: usize>() -> Result<[u8; N], ServiceError> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(bytes)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
