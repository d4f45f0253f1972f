//! Cache key construction.

use crate::model::Model;
use std::fmt::Display;

/// Delimiter placed between key tokens.
pub const CACHE_KEY_DELIMITER: &str = ":";

/// Builds cache keys from ordered tokens.
///
/// Keys are never escaped: a token that itself contains [`CACHE_KEY_DELIMITER`]
/// can produce the same key as a different token sequence.
///
/// # Example
///
/// ```
/// use cache_store::key::CacheKeyBuilder;
///
/// assert_eq!(CacheKeyBuilder::join(["user", "42"]), "user:42");
/// ```
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Join tokens with the key delimiter.
    pub fn join<I>(tokens: I) -> String
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let mut key = String::new();
        for (i, token) in tokens.into_iter().enumerate() {
            if i > 0 {
                key.push_str(CACHE_KEY_DELIMITER);
            }
            key.push_str(&token.to_string());
        }
        key
    }

    /// Key for a single record: `"{model.name}:{pk}"`.
    pub fn pk_key(model: &Model, pk: impl Display) -> String {
        Self::join([model.name().to_string(), pk.to_string()])
    }
}
