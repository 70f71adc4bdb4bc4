//! core::ids
//!
//! Issue identifier generation.
//!
//! # Formats
//!
//! Every generated identifier is `<prefix><suffix>` where the suffix is
//! 3 to 8 base-36 characters (`[0-9a-z]`):
//!
//! - [`random_id`] - uniform random integer from the OS CSPRNG
//! - [`hash_id`] - SHA-256 of the issue content, deterministic for imports
//!
//! [`adaptive_length`] picks the shortest suffix length that keeps the
//! birthday-bound collision probability under 25% for a given store size.
//!
//! Hierarchical child ids (`bd-a3f8.1`) live in [`crate::core::hierarchy`].
//!
//! # Example
//!
//! ```
//! use rigwork::core::ids::{adaptive_length, random_id};
//!
//! let length = adaptive_length(500);
//! let id = random_id("bd-", length).unwrap();
//! assert!(id.starts_with("bd-"));
//! assert_eq!(id.len(), 3 + length);
//! ```

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::TryRngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Shortest allowed suffix.
pub const MIN_ID_LENGTH: usize = 3;

/// Longest allowed suffix.
pub const MAX_ID_LENGTH: usize = 8;

/// Collision probability [`adaptive_length`] stays under.
pub const DEFAULT_MAX_COLLISION_PROBABILITY: f64 = 0.25;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Errors from identifier generation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// Suffix length outside [3, 8].
    #[error("invalid id length {length}: must be between {MIN_ID_LENGTH} and {MAX_ID_LENGTH}")]
    InvalidLength { length: usize },

    /// The OS random source failed.
    #[error("random source failed: {0}")]
    RandomSource(String),

    /// Creating a child under `parent` would exceed the depth limit.
    #[error("maximum hierarchy depth {max_depth} exceeded: '{parent}' is already at depth {depth}")]
    MaxDepthExceeded {
        parent: String,
        depth: usize,
        max_depth: usize,
    },
}

fn check_length(length: usize) -> Result<(), IdError> {
    if (MIN_ID_LENGTH..=MAX_ID_LENGTH).contains(&length) {
        Ok(())
    } else {
        Err(IdError::InvalidLength { length })
    }
}

/// Generate a random identifier.
///
/// Draws a uniform integer in `[0, 36^length)` from the OS random source,
/// using rejection sampling so no suffix is more likely than another.
///
/// # Errors
///
/// - [`IdError::InvalidLength`] if `length` is outside [3, 8]
/// - [`IdError::RandomSource`] if the OS random source fails
pub fn random_id(prefix: &str, length: usize) -> Result<String, IdError> {
    check_length(length)?;

    let range = 36u64.pow(length as u32);
    // Largest multiple of `range` representable; draws at or above it are
    // rejected.
    let zone = u64::MAX - (u64::MAX % range);

    let mut rng = OsRng;
    let value = loop {
        let draw = rng
            .try_next_u64()
            .map_err(|e| IdError::RandomSource(e.to_string()))?;
        if draw < zone {
            break draw % range;
        }
    };

    Ok(format!("{}{}", prefix, encode_base36(value, length)))
}

/// Birthday-paradox estimate of at least one collision among `count` ids
/// with `length` base-36 characters.
pub fn collision_probability(count: usize, length: usize) -> f64 {
    let space = 36f64.powi(length as i32);
    let n = count as f64;
    1.0 - (-(n * n) / (2.0 * space)).exp()
}

/// Minimum suffix length keeping collision probability under 25%.
///
/// Saturates at [`MAX_ID_LENGTH`].
///
/// # Example
///
/// ```
/// use rigwork::core::ids::adaptive_length;
///
/// assert_eq!(adaptive_length(0), 3);
/// assert_eq!(adaptive_length(6000), 6);
/// ```
pub fn adaptive_length(existing_count: usize) -> usize {
    adaptive_length_with(
        existing_count,
        DEFAULT_MAX_COLLISION_PROBABILITY,
        MIN_ID_LENGTH,
    )
}

/// [`adaptive_length`] with an explicit probability threshold and floor.
///
/// `min_length` is clamped into [3, 8].
pub fn adaptive_length_with(existing_count: usize, max_probability: f64, min_length: usize) -> usize {
    let floor = min_length.clamp(MIN_ID_LENGTH, MAX_ID_LENGTH);
    (floor..=MAX_ID_LENGTH)
        .find(|&length| collision_probability(existing_count, length) < max_probability)
        .unwrap_or(MAX_ID_LENGTH)
}

/// Generate a content-derived identifier.
///
/// The same inputs always produce the same id, which keeps imports
/// reproducible. Changing `nonce` is how callers step past a collision.
///
/// # Errors
///
/// Returns [`IdError::InvalidLength`] if `length` is outside [3, 8].
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use rigwork::core::ids::hash_id;
///
/// let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
///     + chrono::Duration::milliseconds(6);
/// let id = hash_id("bd-", "Fix login", "Details", "jira-import", ts, 0, 4).unwrap();
/// assert_eq!(id, "bd-8d8e");
/// ```
pub fn hash_id(
    prefix: &str,
    title: &str,
    description: &str,
    creator: &str,
    timestamp: DateTime<Utc>,
    nonce: u32,
    length: usize,
) -> Result<String, IdError> {
    check_length(length)?;

    let nanos =
        i128::from(timestamp.timestamp()) * 1_000_000_000 + i128::from(timestamp.timestamp_subsec_nanos());
    let content = format!("{title}|{description}|{creator}|{nanos}|{nonce}");
    let digest = Sha256::digest(content.as_bytes());

    let num_bytes = match length {
        3 => 2,
        4 => 3,
        5 | 6 => 4,
        _ => 5,
    };
    let value = digest[..num_bytes]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

    Ok(format!("{}{}", prefix, encode_base36(value, length)))
}

/// Encode `value` in base 36, left-padded with `0` to `length`.
///
/// Longer encodings keep their least significant `length` digits.
fn encode_base36(mut value: u64, length: usize) -> String {
    let mut digits = Vec::with_capacity(length.max(13));
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    while digits.len() < length {
        digits.push(b'0');
    }
    digits.truncate(length);
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}
