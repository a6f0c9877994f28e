//! User-facing input boundary.
//!
//! Queries are checked here before anything else runs: blank input is
//! rejected and so is anything over the word ceiling. Accepted queries are
//! passed through unmodified.

use thiserror::Error;

/// Soft ceiling on query length, in whitespace-separated words.
pub const DEFAULT_MAX_QUERY_WORDS: usize = 60_000;

/// Reasons a query is rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Please enter a query before submitting")]
    Empty,

    #[error(
        "Your query contains {words} words, which exceeds the limit of {limit} words. \
         Please reduce the length and try again."
    )]
    TooLong { words: usize, limit: usize },
}

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Accept `query` if it is non-blank and within `max_words`.
///
/// # Returns
/// The query itself, unmodified
///
/// # Errors
/// `InputError::Empty` for blank input, `InputError::TooLong` with the actual
/// count and the limit otherwise
pub fn validate_query(query: &str, max_words: usize) -> Result<&str, InputError> {
    let words = word_count(query);
    if words == 0 {
        return Err(InputError::Empty);
    }
    if words > max_words {
        return Err(InputError::TooLong {
            words,
            limit: max_words,
        });
    }
    Ok(query)
}
