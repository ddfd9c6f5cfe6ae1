//! N-gram token splitter.
//!
//! Emits every contiguous N-codepoint window of `text` whose codepoints are
//! all drawn from the allowed class {CJK U+4E00..=U+9FA5, A-Z, a-z, 0-9}.
//! Any other character resets the window. `position` is the codepoint
//! offset of the window's first character in the original string.

/// Whether `c` belongs to the character class the indexer tokenizes over.
pub fn is_allowed(c: char) -> bool {
    ('\u{4E00}'..='\u{9FA5}').contains(&c)
        || c.is_ascii_uppercase()
        || c.is_ascii_lowercase()
        || c.is_ascii_digit()
}

/// A restartable, lazy sequence of `(token, position)` pairs.
pub struct NGramTokens {
    chars: Vec<char>,
    n: usize,
    left: usize,
    i: usize,
}

impl NGramTokens {
    pub fn new(text: &str, n: usize) -> Self {
        NGramTokens {
            chars: text.chars().collect(),
            n,
            left: 0,
            i: 0,
        }
    }
}

impl Iterator for NGramTokens {
    type Item = (String, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.n == 0 {
            return None;
        }
        while self.i < self.chars.len() {
            let ch = self.chars[self.i];
            if !is_allowed(ch) {
                self.left = self.i + 1;
                self.i += 1;
                continue;
            }
            if self.i - self.left + 1 == self.n {
                let token: String = self.chars[self.left..=self.i].iter().collect();
                let pos = self.left;
                self.left += 1;
                self.i += 1;
                return Some((token, pos));
            }
            self.i += 1;
        }
        None
    }
}

/// Collects the full n-gram sequence. Convenience wrapper over
/// [`NGramTokens`] for callers that don't need streaming.
pub fn split_ngrams(text: &str, n: usize) -> Vec<(String, usize)> {
    NGramTokens::new(text, n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_token_has_length_n_and_allowed_chars() {
        let text = "hello,你好，world.世界。";
        for (token, _) in split_ngrams(text, 2) {
            assert_eq!(token.chars().count(), 2);
            assert!(token.chars().all(is_allowed));
        }
    }

    #[test]
    fn mixed_cjk_and_latin_text_splits_on_punctuation() {
        let text = "hello,你好，world.世界。";
        let got = split_ngrams(text, 2);
        let expected = vec![
            ("he".to_string(), 0),
            ("el".to_string(), 1),
            ("ll".to_string(), 2),
            ("lo".to_string(), 3),
            ("你好".to_string(), 6),
            ("wo".to_string(), 10),
            ("or".to_string(), 11),
            ("rl".to_string(), 12),
            ("ld".to_string(), 13),
            ("世界".to_string(), 16),
        ];
        assert_eq!(got, expected);
    }

    #[test]
    fn emitted_tokens_equal_every_valid_window() {
        let text = "ab1cd--ef2";
        let n = 3;
        let got = split_ngrams(text, n);
        let chars: Vec<char> = text.chars().collect();
        let mut expected = Vec::new();
        let mut left = 0usize;
        for i in 0..chars.len() {
            if !is_allowed(chars[i]) {
                left = i + 1;
                continue;
            }
            if i - left + 1 == n {
                expected.push((chars[left..=i].iter().collect::<String>(), left));
                left += 1;
            }
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn is_restartable_after_partial_consumption() {
        let mut it = NGramTokens::new("hello", 2);
        let first = it.next();
        let rest: Vec<_> = it.collect();
        assert_eq!(first, Some(("he".to_string(), 0)));
        assert_eq!(
            rest,
            vec![
                ("el".to_string(), 1),
                ("ll".to_string(), 2),
                ("lo".to_string(), 3),
            ]
        );
    }
}
