//! Short uppercase ticker tokens for proposals.

use crate::classifier::first_match;
use sha2::{Digest, Sha256};

pub const MIN_LEN: usize = 3;
pub const MAX_LEN: usize = 6;
const HASHED_LEN: usize = 5;

/// Derive a 3 to 6 letter uppercase ticker for `text`.
///
/// Tries, in order: the letters of the first matched topic keyword (padded
/// from the category name when too short), the initials of the input's
/// words, and finally letters hashed from `seed` and `text`. The last step
/// always succeeds, so any input yields a well-formed ticker.
pub fn derive_ticker(text: &str, seed: &str) -> String {
    from_keyword(text)
        .or_else(|| from_initials(text))
        .unwrap_or_else(|| from_hash(text, seed))
}

fn letters(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn from_keyword(text: &str) -> Option<String> {
    let (category, keyword) = first_match(text)?;
    let mut token = letters(keyword);
    if token.len() < MIN_LEN {
        for c in letters(category.as_str()).chars() {
            if token.len() >= MIN_LEN {
                break;
            }
            if !token.ends_with(c) {
                token.push(c);
            }
        }
    }
    token.truncate(MAX_LEN);
    (token.len() >= MIN_LEN).then_some(token)
}

fn from_initials(text: &str) -> Option<String> {
    let token: String = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter_map(|w| w.chars().next())
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_LEN)
        .collect();
    (token.len() >= MIN_LEN).then_some(token)
}

fn from_hash(text: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(HASHED_LEN)
        .map(|b| char::from(b'A' + b % 26))
        .collect()
}

/// True when `token` is 3 to 6 uppercase ASCII letters.
pub fn is_valid_ticker(token: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&token.len()) && token.chars().all(|c| c.is_ascii_uppercase())
}
