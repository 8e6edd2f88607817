//! Sentence splitting for text handed to the engines.
//!
//! Each sentence becomes one synthesis call and ends with a sentence
//! boundary, which is what cuts the audio into clips.

/// Words ending in '.' that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "Dr.", "Mr.", "Mrs.", "Ms.", "Prof.", "St.", "etc.", "vs.", "e.g.", "i.e.", "a.m.", "p.m.",
    "Inc.", "Ltd.", "Corp.",
];

/// Split text into trimmed sentences at '.', '!' and '?'.
///
/// A terminator only ends a sentence when followed by whitespace or the end
/// of input, so decimals ("3.14") and dotted words stay intact. Runs such as
/// "?!" or "..." stay attached to their sentence. Text without a terminator
/// is returned as a single sentence; blank input yields nothing.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    let mut i = 0;
    while i < chars.len() {
        current.push(chars[i]);

        if is_terminator(chars[i]) {
            while i + 1 < chars.len() && is_terminator(chars[i + 1]) {
                i += 1;
                current.push(chars[i]);
            }

            let at_break = i + 1 == chars.len() || chars[i + 1].is_whitespace();
            if at_break && !ends_with_abbreviation(&current) {
                push_trimmed(&mut sentences, &current);
                current.clear();
            }
        }

        i += 1;
    }

    push_trimmed(&mut sentences, &current);
    sentences
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn ends_with_abbreviation(s: &str) -> bool {
    s.split_whitespace()
        .last()
        .is_some_and(|word| ABBREVIATIONS.contains(&word))
}

fn push_trimmed(sentences: &mut Vec<String>, s: &str) {
    let trimmed = s.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}
