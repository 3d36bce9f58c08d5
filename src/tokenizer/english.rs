//! English stopwords and plural stemming.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Words never indexed and removed from queries.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

static STOP_WORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOP_WORDS.iter().copied().collect());

/// Case-insensitive stopword check.
#[must_use]
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORD_SET.contains(word.to_lowercase().as_str())
}

/// Strip a plural suffix.
///
/// `flies` becomes `fly`, `cats` becomes `cat`; words ending in `us`, `ss`,
/// `aes`, `ees`, `oes` or `ies` after a vowel are left alone.
#[must_use]
pub fn stem(word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();

    if n < 3 || chars[n - 1] != 's' {
        return word.to_string();
    }

    match chars[n - 2] {
        'u' | 's' => return word.to_string(),
        'e' => {
            if n > 3 && chars[n - 3] == 'i' && chars[n - 4] != 'a' && chars[n - 4] != 'e' {
                let mut stemmed: String = chars[..n - 3].iter().collect();
                stemmed.push('y');
                return stemmed;
            }
            if matches!(chars[n - 3], 'i' | 'a' | 'o' | 'e') {
                return word.to_string();
            }
        }
        _ => {}
    }

    chars[..n - 1].iter().collect()
}
