use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_code_verifier() -> String {
    random_alphanumeric(128)
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque value round-tripped through the authorize redirect.
pub fn generate_state() -> String {
    random_alphanumeric(32)
}

/// Spotify ids are base62; anything else never reaches an upstream path.
pub fn validate_playlist_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(AppError::BadRequest("playlist id must not be empty".into()));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest(format!("invalid playlist id: {}", id)));
    }
    Ok(())
}

/// Year from a Spotify release date (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`).
pub fn release_year(release_date: &str) -> Option<i32> {
    let year = release_date.get(..4)?;
    if !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    year.parse().ok()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
