//! Row id rules and id derivation.
//!
//! - [`is_valid_id`]: the id grammar shared by every row
//! - [`next_variant_id`]: deterministic `-N` suffixes for duplicated rows
//! - [`IdGenerator`]: hash-based ids (SHA256 + base36) for rows added without
//!   an explicit id and for bookmarks
//!
//! # Example
//!
//! ```
//! use topdown_core::id_generation::{next_variant_id, IdGenerator};
//!
//! assert_eq!(next_variant_id("foo", ["foo"]), "foo-2");
//!
//! let mut generator = IdGenerator::new("td", 4);
//! let id = generator.generate("API key").unwrap();
//! assert!(id.starts_with("td-"));
//! ```

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum length of a row id.
pub const MAX_ID_LENGTH: usize = 64;

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;
const MAX_HASH_LENGTH: usize = 12;

/// Errors that can occur during ID generation
#[derive(Debug, Error)]
pub enum IdGenerationError {
    /// Unable to generate a unique ID after exhausting all nonces and length increases
    #[error("Unable to generate unique ID after {attempts} attempts")]
    CollisionExhausted {
        /// Number of nonces tried
        attempts: u32,
    },

    /// Invalid length parameter
    #[error("Length must be between 1 and {MAX_HASH_LENGTH}")]
    InvalidLength,
}

/// Whether `id` is a structurally valid row id.
///
/// An id is 1 to [`MAX_ID_LENGTH`] characters: a letter or `_`, followed
/// by letters, digits, `_`, `.` or `-`. Uniqueness is checked by the store.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_ID_LENGTH {
        return false;
    }

    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Split `id` into `(base, Some(n))` when it ends in `-<digits>`.
fn split_variant_suffix(id: &str) -> (&str, Option<u64>) {
    if let Some((base, digits)) = id.rsplit_once('-') {
        if !base.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return (base, digits.parse().ok());
        }
    }
    (id, None)
}

/// Derive a fresh variant id for a duplicate of `from_id`.
///
/// A trailing `-<digits>` is stripped from `from_id` to get the base. The
/// result is `base-(max + 1)` over existing `base-<digits>` ids, `base-2`
/// when only the bare base exists, and `base-1` otherwise.
///
/// When that would exceed [`MAX_ID_LENGTH`], the base is shortened until
/// `base-n` fits, and `n` counts up past any id already taken.
pub fn next_variant_id<I, S>(from_id: &str, existing_ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let existing: Vec<S> = existing_ids.into_iter().collect();
    let (base, _) = split_variant_suffix(from_id);

    let mut max_suffix: Option<u64> = None;
    let mut base_exists = false;
    for existing in &existing {
        let existing = existing.as_ref();
        if existing == base {
            base_exists = true;
            continue;
        }
        if let (candidate_base, Some(n)) = split_variant_suffix(existing) {
            if candidate_base == base {
                max_suffix = Some(max_suffix.map_or(n, |m| m.max(n)));
            }
        }
    }

    let suffix = match (max_suffix, base_exists) {
        (Some(max), _) => max.saturating_add(1),
        (None, true) => 2,
        (None, false) => 1,
    };
    let candidate = format!("{base}-{suffix}");
    if candidate.len() <= MAX_ID_LENGTH {
        return candidate;
    }

    let taken: HashSet<&str> = existing.iter().map(|s| s.as_ref()).collect();
    let mut n = suffix;
    loop {
        let digits = n.to_string();
        let keep = MAX_ID_LENGTH.saturating_sub(digits.len() + 1);
        let short = base.char_indices().nth(keep).map_or(base, |(i, _)| &base[..i]);
        let id = format!("{short}-{digits}");
        if !taken.contains(id.as_str()) {
            return id;
        }
        n = n.saturating_add(1);
    }
}

/// Hash-based ID generator with collision detection
///
/// Generated ids have the form `{prefix}-{hash}` where the hash is base36
/// and collision-checked against every registered id.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    length: usize,
    existing_ids: HashSet<String>,
}

impl IdGenerator {
    /// Create a generator producing `{prefix}-{hash}` with a hash of `length` chars.
    pub fn new(prefix: impl Into<String>, length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            length,
            existing_ids: HashSet::new(),
        }
    }

    /// Register an existing ID to prevent collisions
    pub fn register_id(&mut self, id: impl Into<String>) {
        self.existing_ids.insert(id.into());
    }

    /// Generate a new unique ID from a content seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured length is invalid or every nonce
    /// collides even after lengthening the hash by one character.
    pub fn generate(&mut self, seed: &str) -> Result<String, IdGenerationError> {
        for nonce in 0..MAX_NONCE {
            let id = self.generate_hash_id(seed, nonce, self.length)?;

            if !self.existing_ids.contains(&id) {
                if nonce > 0 {
                    debug!(nonce, length = self.length, "Generated unique ID after collision retries");
                }
                self.existing_ids.insert(id.clone());
                return Ok(id);
            }
        }

        if self.length < MAX_HASH_LENGTH {
            warn!(
                length = self.length,
                max_nonce = MAX_NONCE,
                "All nonces exhausted, increasing ID length"
            );
            for nonce in 0..MAX_NONCE {
                let longer_id = self.generate_hash_id(seed, nonce, self.length + 1)?;
                if self.existing_ids.insert(longer_id.clone()) {
                    return Ok(longer_id);
                }
            }
        }

        Err(IdGenerationError::CollisionExhausted {
            attempts: MAX_NONCE,
        })
    }

    fn generate_hash_id(
        &self,
        seed: &str,
        nonce: u32,
        length: usize,
    ) -> Result<String, IdGenerationError> {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let content = format!("{}|{}|{}", seed, timestamp, nonce);

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let hash_bytes = hasher.finalize();

        let hash_str = encode_base36(&hash_bytes[..8], length)?;
        Ok(format!("{}-{}", self.prefix, hash_str))
    }
}

/// Encode up to eight bytes as a fixed-length base36 string.
///
/// Wrapping arithmetic keeps the conversion total; the output is only an
/// identifier, not a faithful encoding.
fn encode_base36(bytes: &[u8], length: usize) -> Result<String, IdGenerationError> {
    if length == 0 || length > MAX_HASH_LENGTH {
        return Err(IdGenerationError::InvalidLength);
    }

    let mut num: u64 = 0;
    for &byte in bytes {
        num = num.wrapping_shl(8).wrapping_add(u64::from(byte));
    }

    let mut result = Vec::with_capacity(length);
    let mut n = num;
    while result.len() < length {
        let remainder = usize::try_from(n % 36).unwrap_or_default();
        result.push(char::from(BASE36_CHARS[remainder]));
        n /= 36;
    }

    result.reverse();
    Ok(result.into_iter().collect())
}
