//! Readability scoring
//!
//! Flesch-Kincaid grade level with a vowel-group syllable estimate. The
//! estimate is rough for individual words but stable over page-length text.

/// Returns the Flesch-Kincaid grade level of `text`, or 0.0 for empty text
pub fn flesch_kincaid_grade(text: &str) -> f64 {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphabetic()))
        .collect();

    if words.is_empty() {
        return 0.0;
    }

    let sentences = count_sentences(text).max(1) as f64;
    let word_count = words.len() as f64;
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let grade = 0.39 * (word_count / sentences) + 11.8 * (syllables as f64 / word_count) - 15.59;
    (grade.max(0.0) * 10.0).round() / 10.0
}

fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| s.chars().any(|c| c.is_alphabetic()))
        .count()
}

/// Estimates syllables by counting vowel groups, ignoring a silent trailing `e`
pub fn count_syllables(word: &str) -> usize {
    let word: String = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();

    if word.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut groups = 0;
    let mut previous_vowel = false;
    for c in word.chars() {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            groups += 1;
        }
        previous_vowel = vowel;
    }

    if word.ends_with('e') && !word.ends_with("le") && groups > 1 {
        groups -= 1;
    }

    groups.max(1)
}
