//! Prompts for the LLM-backed translator.
//!
//! Kept in one place so prompt regressions can be caught by unit tests
//! without calling a model.

/// System prompt for translating a batch of positioned PDF text runs.
///
/// The runs are short, often mid-sentence fragments cut at layout
/// boundaries; the model must translate each one in place without merging,
/// splitting or reordering.
pub const TRANSLATION_SYSTEM_PROMPT: &str = r#"You are a professional translator working on text extracted from a PDF page.

You receive a JSON array of strings. Each string is one run of text as it appears on the page; runs may be single words, fragments of a sentence, numbers, or labels.

Rules:
1. Translate every string from the source language to the target language.
2. Return EXACTLY one output string per input string, in the same order.
3. Never merge, split, drop, or reorder strings.
4. Keep numbers, URLs, e-mail addresses, and codes unchanged.
5. If a string cannot or should not be translated, return it unchanged.
6. Do not add explanations, notes, or transliterations.

Output ONLY a JSON array of strings. No markdown fences, no commentary."#;

/// Build the user message for one batch.
///
/// `items_json` must already be a serialised JSON array of strings.
pub fn translation_user_prompt(source: &str, target: &str, count: usize, items_json: &str) -> String {
    format!(
        "Source language: {source}\nTarget language: {target}\n\
         Translate these {count} strings and answer with a JSON array of exactly {count} strings:\n\n{items_json}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_demands_json_array() {
        assert!(TRANSLATION_SYSTEM_PROMPT.contains("JSON array"));
        assert!(TRANSLATION_SYSTEM_PROMPT.contains("same order"));
    }

    #[test]
    fn user_prompt_carries_languages_and_count() {
        let p = translation_user_prompt("mr", "hi", 2, r#"["a","b"]"#);
        assert!(p.contains("Source language: mr"));
        assert!(p.contains("Target language: hi"));
        assert!(p.contains("exactly 2 strings"));
        assert!(p.ends_with(r#"["a","b"]"#));
    }
}
