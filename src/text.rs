use std::collections::HashSet;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s\-_]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref STOP_WORDS: HashSet<&'static str> = [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
        "did", "will", "would", "could", "should", "may", "might", "can", "this", "that", "these",
        "those", "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
        "my", "your", "his", "its", "our", "their",
    ]
    .into_iter()
    .collect();
}

const ASCII_PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Canonical text form used for matching and embeddings: lowercased, all
/// characters except alphanumerics, whitespace, hyphen and underscore
/// replaced by spaces, whitespace runs collapsed, ends trimmed.
/// Idempotent under repeated application.
pub fn preprocess(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let lowered = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, " ");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    collapsed.trim().to_string()
}

/// Comparison form: lowercased with ASCII punctuation removed outright
/// (no replacement space) and whitespace collapsed.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .filter(|c| !ASCII_PUNCTUATION.contains(*c))
        .collect();
    let collapsed = WHITESPACE.replace_all(&cleaned, " ");
    collapsed.trim().to_string()
}

/// Title-cases like Python's `str.title`: a letter starts a new word after
/// any non-alphabetic character, including digits, hyphens and underscores.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

pub fn tokenize(text: &str) -> Vec<String> {
    preprocess(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Extracts up to `max_keywords` key terms, most frequent first. Stop words
/// and words of two characters or fewer are ignored; frequency ties keep
/// first-occurrence order.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let processed = preprocess(text);
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for word in processed.split_whitespace() {
        if STOP_WORDS.contains(word) || word.chars().count() <= 2 {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(max_keywords)
        .map(|(word, _)| word.to_string())
        .collect()
}
