//! Text analysis helpers
//!
//! Word counting, keyword extraction, similarity scoring, contact-detail
//! extraction and readability estimates used by the content-oriented checks.

use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-z]{3,}\b").expect("valid word regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

static PHONE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\+\d{1,3}\s*\d{3}[-.]?\d{3}[-.]?\d{4}",
        r"\(\d{3}\)\s*\d{3}[-.]?\d{4}",
        r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid phone regex"))
    .collect()
});

static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid sentence regex"));

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old", "see", "two",
    "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too", "use", "with", "this",
    "that", "from", "your", "have", "will", "they", "their", "what", "when", "which", "were",
    "been", "more", "about", "into", "than", "them", "then", "there", "these", "also", "any",
];

/// Aggregate statistics over a block of text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStats {
    pub character_count: usize,
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_word_length: f64,
    pub avg_sentence_length: f64,
}

/// Counts whitespace-separated words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Returns the `top_n` most frequent non-stop-word keywords
///
/// Words are lowercased and must be at least three letters long. Ties are
/// broken alphabetically so the output is deterministic.
pub fn extract_keywords(text: &str, top_n: usize) -> Vec<String> {
    keyword_frequencies(text)
        .into_iter()
        .take(top_n)
        .map(|(word, _)| word)
        .collect()
}

/// Keyword counts ordered by descending frequency, then alphabetically
pub fn keyword_frequencies(text: &str) -> Vec<(String, usize)> {
    let lowered = text.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for m in WORD_RE.find_iter(&lowered) {
        let word = m.as_str();
        if !STOP_WORDS.contains(&word) {
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(w, c)| (w.to_string(), c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Percentage of words taken up by occurrences of `keyword`
pub fn calculate_keyword_density(text: &str, keyword: &str) -> f64 {
    let word_count = count_words(text);
    if word_count == 0 || keyword.is_empty() {
        return 0.0;
    }

    let occurrences = text.to_lowercase().matches(&keyword.to_lowercase()).count();
    occurrences as f64 / word_count as f64 * 100.0
}

/// Truncates to at most `max_length` characters, appending `suffix` if cut
pub fn truncate_text(text: &str, max_length: usize, suffix: &str) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let keep = max_length.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

/// Collapses runs of whitespace into single spaces and trims
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Finds email addresses in text
pub fn extract_emails(text: &str) -> Vec<String> {
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Finds phone numbers in common North American and international formats
///
/// Overlapping matches from the less specific patterns are skipped.
pub fn extract_phone_numbers(text: &str) -> Vec<String> {
    let mut taken: Vec<(usize, usize)> = Vec::new();
    let mut found: Vec<(usize, String)> = Vec::new();

    for re in PHONE_RES.iter() {
        for m in re.find_iter(text) {
            let overlaps = taken
                .iter()
                .any(|&(start, end)| m.start() < end && start < m.end());
            if !overlaps {
                taken.push((m.start(), m.end()));
                found.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, s)| s).collect()
}

/// Strips everything but digits so phone formats can be compared
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Word-set Jaccard similarity between two texts, in `[0, 1]`
pub fn calculate_text_similarity(text1: &str, text2: &str) -> f64 {
    let words1 = word_set(text1);
    let words2 = word_set(text2);
    jaccard(&words1, &words2)
}

/// Lowercased set of whitespace-separated words
pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

/// Jaccard index of two precomputed word sets
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Character, word and sentence statistics
pub fn get_text_stats(text: &str) -> TextStats {
    let words: Vec<&str> = text.split_whitespace().collect();
    let sentence_count = SENTENCE_RE
        .split(text)
        .filter(|s| !s.trim().is_empty())
        .count();

    let avg_word_length = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64
    };
    let avg_sentence_length = if sentence_count == 0 {
        0.0
    } else {
        words.len() as f64 / sentence_count as f64
    };

    TextStats {
        character_count: text.chars().count(),
        word_count: words.len(),
        sentence_count,
        avg_word_length,
        avg_sentence_length,
    }
}

/// Flesch reading ease (higher is easier; 60-70 is plain English)
///
/// Returns `None` for text without words or sentences.
pub fn flesch_reading_ease(text: &str) -> Option<f64> {
    let stats = get_text_stats(text);
    if stats.word_count == 0 || stats.sentence_count == 0 {
        return None;
    }

    let syllables: usize = text.split_whitespace().map(estimate_syllables).sum();
    let words = stats.word_count as f64;
    let score = 206.835
        - 1.015 * (words / stats.sentence_count as f64)
        - 84.6 * (syllables as f64 / words);
    Some(score)
}

/// Vowel-group heuristic; every word has at least one syllable
fn estimate_syllables(word: &str) -> usize {
    let word: String = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(|c| c.to_lowercase())
        .collect();
    if word.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut previous_vowel = false;
    for c in word.chars() {
        let vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }
    if word.ends_with('e') && count > 1 {
        count -= 1;
    }
    count.max(1)
}
