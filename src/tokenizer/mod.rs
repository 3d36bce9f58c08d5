//! Text tokenization.
//!
//! This module provides:
//! - A word tokenizer splitting text into alphanumeric runs
//! - Filtering and transforming decorators over any tokenizer
//! - The standard English pipeline used for documents

mod decorators;
pub mod english;
mod word;

use std::io::{self, BufRead};

pub use decorators::{FilteringTokenizer, TransformingTokenizer};
pub use word::WordTokenizer;

/// Lazy, single-pass stream of tokens read from one reader.
///
/// An I/O error is yielded once and terminates the stream.
pub type TokenStream<'a> = Box<dyn Iterator<Item = io::Result<Token>> + 'a>;

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A run of letters and digits.
    Word,
}

/// A single token produced by a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    payload: String,
    kind: TokenKind,
}

impl Token {
    /// Create a token.
    #[must_use]
    pub fn new(payload: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            payload: payload.into(),
            kind,
        }
    }

    /// Create a word token.
    #[must_use]
    pub fn word(payload: impl Into<String>) -> Self {
        Self::new(payload, TokenKind::Word)
    }

    /// Token text.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Token kind.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Consume the token, returning its text.
    #[must_use]
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// Build a token of the same kind with a rewritten payload.
    #[must_use]
    pub fn map_payload(self, f: impl FnOnce(&str) -> String) -> Self {
        Self {
            payload: f(&self.payload),
            kind: self.kind,
        }
    }
}

/// Turns a character stream into tokens.
pub trait Tokenizer: Send + Sync {
    /// Tokenize everything the reader yields.
    fn tokenize<'a>(&'a self, reader: Box<dyn BufRead + 'a>) -> TokenStream<'a>;
}

impl<T: Tokenizer + ?Sized> Tokenizer for Box<T> {
    fn tokenize<'a>(&'a self, reader: Box<dyn BufRead + 'a>) -> TokenStream<'a> {
        (**self).tokenize(reader)
    }
}

/// Build the document pipeline: words, then stemming, then stopword removal.
#[must_use]
pub fn standard_tokenizer(max_token_length: usize) -> impl Tokenizer {
    FilteringTokenizer::new(
        TransformingTokenizer::new(WordTokenizer::new(max_token_length), |token: Token| {
            token.map_payload(english::stem)
        }),
        |token: &Token| english::is_stop_word(token.payload()),
    )
}

/// Collect the payloads of every token in `text`.
///
/// # Errors
///
/// Returns the first I/O error raised by the underlying reader.
pub fn collect_terms<T: Tokenizer + ?Sized>(
    tokenizer: &T,
    reader: impl BufRead,
) -> io::Result<Vec<String>> {
    tokenizer
        .tokenize(Box::new(reader))
        .map(|token| token.map(Token::into_payload))
        .collect()
}
