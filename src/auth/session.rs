use rand::Rng;

use super::SecretHasher;
use crate::error::{Error, Result};

const TOKEN_PREFIX: &str = "storerate";
const LOOKUP_LENGTH: usize = 8;
const SECRET_LENGTH: usize = 24;
const SECRET_BYTES: usize = 12;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "storerate_session";

/// A freshly minted session token. `raw` is handed to the client once;
/// only `lookup` and `hash` are persisted.
pub struct IssuedToken {
    pub raw: String,
    pub lookup: String,
    pub hash: String,
}

/// Generates a new token with the format: storerate_<lookup>_<secret>
pub fn generate_token(hasher: &SecretHasher) -> Result<IssuedToken> {
    let lookup = generate_lookup();
    let secret = generate_secret();
    let raw = build_token(&lookup, &secret);
    let hash = hasher.hash(&raw)?;
    Ok(IssuedToken { raw, lookup, hash })
}

/// Generates the lookup portion of the token (first 8 chars of a UUID)
fn generate_lookup() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    uuid.chars().take(LOOKUP_LENGTH).collect()
}

/// Generates a cryptographically secure random hex string for the secret
fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

fn build_token(lookup: &str, secret: &str) -> String {
    format!("{TOKEN_PREFIX}_{lookup}_{secret}")
}

/// Parses a token string into its components (lookup, secret)
pub fn parse_token(token: &str) -> Result<(String, String)> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidSessionFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidSessionFormat)?;

    if lookup.len() != LOOKUP_LENGTH
        || secret.len() != SECRET_LENGTH
        || !lookup.chars().all(|c| c.is_ascii_hexdigit())
        || !secret.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(Error::InvalidSessionFormat);
    }

    Ok((lookup.to_string(), secret.to_string()))
}

/// Builds the `Set-Cookie` value for a session token.
#[must_use]
pub fn session_cookie(raw_token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={raw_token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Builds a `Set-Cookie` value that clears the session cookie.
#[must_use]
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Finds the session token in a `Cookie` header value.
#[must_use]
pub fn token_from_cookie_header(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
