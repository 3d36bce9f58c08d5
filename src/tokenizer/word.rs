//! Base tokenizer producing alphanumeric words.

use std::io::{self, BufRead};

use super::{Token, TokenStream, Tokenizer};

/// Splits text on every non-alphanumeric character.
///
/// Runs longer than `max_length` characters are dropped whole.
#[derive(Debug, Clone, Copy)]
pub struct WordTokenizer {
    max_length: usize,
}

impl WordTokenizer {
    /// Create a tokenizer keeping words up to `max_length` characters.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Longest word kept.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize<'a>(&'a self, reader: Box<dyn BufRead + 'a>) -> TokenStream<'a> {
        Box::new(Words {
            reader,
            line: String::new(),
            buffer: Vec::new(),
            pos: 0,
            max_length: self.max_length,
            exhausted: false,
        })
    }
}

/// Line-buffered word iterator; a line break always ends a word.
///
/// Bytes that are not valid UTF-8 decode to U+FFFD, which splits words.
struct Words<'a> {
    reader: Box<dyn BufRead + 'a>,
    line: String,
    buffer: Vec<u8>,
    pos: usize,
    max_length: usize,
    exhausted: bool,
}

impl Words<'_> {
    fn next_in_line(&mut self) -> Option<Token> {
        while self.pos < self.line.len() {
            let rest = &self.line[self.pos..];
            let Some(start) = rest.find(char::is_alphanumeric) else {
                self.pos = self.line.len();
                return None;
            };

            let run = &rest[start..];
            let end = run
                .find(|c: char| !c.is_alphanumeric())
                .unwrap_or(run.len());
            let word = &run[..end];
            self.pos += start + end;

            if word.chars().count() <= self.max_length {
                return Some(Token::word(word));
            }
        }
        None
    }
}

impl Iterator for Words<'_> {
    type Item = io::Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.next_in_line() {
                return Some(Ok(token));
            }
            if self.exhausted {
                return None;
            }

            self.line.clear();
            self.buffer.clear();
            self.pos = 0;
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => {
                    self.exhausted = true;
                    return None;
                }
                Ok(_) => self.line.push_str(&String::from_utf8_lossy(&self.buffer)),
                Err(e) => {
                    self.exhausted = true;
                    self.line.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::collect_terms;

    const MAX: usize = 12;

    fn words(input: &str) -> Vec<String> {
        collect_terms(&WordTokenizer::new(MAX), input.as_bytes()).unwrap()
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(words("").is_empty());
        assert!(words(" ").is_empty());
        assert!(words("\n\n").is_empty());
    }

    #[test]
    fn test_single_word_with_surrounding_whitespace() {
        for input in ["Hello", " Hello", "Hello ", " Hello "] {
            assert_eq!(words(input), vec!["Hello"], "input {input:?}");
        }
    }

    #[test]
    fn test_digits_are_words() {
        assert_eq!(words("42"), vec!["42"]);
    }

    #[test]
    fn test_two_words() {
        assert_eq!(words("Hello World"), vec!["Hello", "World"]);
    }

    #[test]
    fn test_punctuation_splits_words() {
        assert_eq!(
            words("fn main() { x.y_z }"),
            vec!["fn", "main", "x", "y", "z"]
        );
    }

    #[test]
    fn test_line_break_ends_word() {
        assert_eq!(words("foo\nbar\r\nbaz"), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_word_at_max_length_is_kept() {
        let word = "x".repeat(MAX);
        assert_eq!(words(&word), vec![word.clone()]);
    }

    #[test]
    fn test_overlong_word_is_dropped_not_truncated() {
        let word = "x".repeat(MAX + 1);
        assert!(words(&word).is_empty());
        assert_eq!(words(&format!("a {word} b")), vec!["a", "b"]);
    }

    #[test]
    fn test_length_counts_characters() {
        // 12 two-byte characters fit
        let word = "é".repeat(MAX);
        assert_eq!(words(&word), vec![word.clone()]);
    }

    #[test]
    fn test_invalid_utf8_splits_words() {
        let bytes: &[u8] = b"caf\xe9 dracula\n\xff\xfeok";
        let terms = collect_terms(&WordTokenizer::new(MAX), bytes).unwrap();
        assert_eq!(terms, vec!["caf", "dracula", "ok"]);
    }

    struct FailingReader;

    impl io::Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
        }
    }

    #[test]
    fn test_read_error_ends_stream() {
        let tokenizer = WordTokenizer::new(MAX);
        let mut stream = tokenizer.tokenize(Box::new(io::BufReader::new(FailingReader)));

        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }
}
