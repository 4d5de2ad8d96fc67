//! Small lexical helpers shared by the selector, analyzer and personality engine.

/// Greeting vocabulary, matched as whole words or phrases.
pub const GREETING_WORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "hiya",
    "howdy",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
    "nice to meet",
];

/// Case-insensitive whole-word (or whole-phrase) containment.
///
/// `needle` must already be lowercase. A match must not be flanked by
/// alphanumeric characters, so `"hi"` does not match `"this"`.
pub fn contains_word(haystack_lower: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = haystack_lower[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = haystack_lower[..begin]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack_lower[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = begin + needle.chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Whether any entry of `vocabulary` occurs as a whole word in `text_lower`.
pub fn contains_any_word(text_lower: &str, vocabulary: &[&str]) -> bool {
    vocabulary.iter().any(|w| contains_word(text_lower, w))
}

/// Number of vocabulary entries present as whole words.
pub fn count_words(text_lower: &str, vocabulary: &[&str]) -> usize {
    vocabulary
        .iter()
        .filter(|w| contains_word(text_lower, w))
        .count()
}

/// Whether the message reads as a greeting.
///
/// Greeting words match whole words only, so "this" never counts as "hi".
pub fn is_greeting(message: &str) -> bool {
    contains_any_word(&message.to_lowercase(), GREETING_WORDS)
}

/// Uppercase the first character.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => {
            let mut result = c.to_uppercase().to_string();
            result.push_str(chars.as_str());
            result
        }
        None => String::new(),
    }
}

/// Lowercase the first character unless it starts the pronoun "I" or an acronym.
pub fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let second = chars.clone().next();
    let is_pronoun_i = first == 'I' && second.is_none_or(|c| !c.is_alphanumeric());
    let is_acronym = second.is_some_and(char::is_uppercase);
    if is_pronoun_i || is_acronym {
        return s.to_owned();
    }
    let mut result = first.to_lowercase().to_string();
    result.push_str(chars.as_str());
    result
}

/// Prefix `phrase` to `text`.
///
/// A phrase ending in sentence punctuation stands alone (`"Got it. We..."`);
/// otherwise it is comma-joined and the text's first letter is lowercased
/// (`"Well, we..."`).
pub fn prepend_phrase(phrase: &str, text: &str) -> String {
    let phrase = phrase.trim();
    let text = text.trim_start();
    if phrase.is_empty() {
        return text.to_owned();
    }
    if text.is_empty() {
        return capitalize_first(phrase);
    }
    if phrase.ends_with(['.', '!', '?']) {
        format!("{} {}", capitalize_first(phrase), text)
    } else {
        let phrase = phrase.trim_end_matches(',');
        format!("{}, {}", capitalize_first(phrase), lowercase_first(text))
    }
}

/// Byte offset just past the first sentence terminator that is followed by
/// more text, e.g. the index of `" "` in `"One. Two."`.
pub fn first_sentence_boundary(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && let Some(&(_, next)) = chars.peek()
            && next.is_whitespace()
        {
            let boundary = idx + c.len_utf8();
            if !text[boundary..].trim().is_empty() {
                return Some(boundary);
            }
        }
    }
    None
}

/// Count sentences by terminal punctuation; text without any counts as one.
pub fn sentence_count(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let count = trimmed
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    count.max(1)
}

/// Strip leading and trailing non-alphanumeric characters from a token.
pub fn word_core(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
        .trim_matches(|c: char| c == '\'' || c == '-')
}
