//! Deterministic cleanup of model-generated translations.
//!
//! Chat models sometimes wrap answers in markdown fences, quote single
//! strings, or break a short run across lines. A translated run is drawn as
//! one positioned line of text, so these artefacts would land on the page.
//! Each rule below is a pure `&str → String` pass.
//!
//! ## Rule Order
//!
//! Fences are stripped before quotes so a fenced, quoted answer loses both;
//! whitespace is collapsed last so earlier rules see the raw line structure.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean one translated string.
///
/// 1. Strip outer markdown fences
/// 2. Strip one pair of matching outer quotes
/// 3. Remove invisible characters (ZWSP, BOM, soft hyphen, word joiner)
/// 4. Collapse line breaks and whitespace runs to a single space, then trim
///
/// ZWJ/ZWNJ are kept: they select conjunct forms in Indic scripts.
pub fn clean_translation(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = strip_outer_quotes(&s);
    let s = remove_invisible_chars(&s);
    collapse_whitespace(&s)
}

/// Locate the JSON array inside a model reply, ignoring fences and any
/// prose around it.
pub fn extract_json_array(input: &str) -> Option<String> {
    let s = strip_code_fences(input);
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    (start < end).then(|| s[start..=end].to_string())
}

// ── Rule 1: Strip outer fences ───────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 2: Strip outer quotes ───────────────────────────────────────────────

const QUOTE_PAIRS: [(char, char); 4] = [('"', '"'), ('\'', '\''), ('“', '”'), ('«', '»')];

fn strip_outer_quotes(input: &str) -> String {
    let t = input.trim();
    for (open, close) in QUOTE_PAIRS {
        if t.chars().count() >= 2 && t.starts_with(open) && t.ends_with(close) {
            let inner = &t[open.len_utf8()..t.len() - close.len_utf8()];
            if !inner.contains(open) && !inner.contains(close) {
                return inner.to_string();
            }
        }
    }
    t.to_string()
}

// ── Rule 3: Remove invisible characters ──────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'], "")
}

// ── Rule 4: Collapse whitespace ──────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}
