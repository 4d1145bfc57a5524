//! Small text helpers shared by the prompt builders and response parsers.

/// Remove markdown code-fence markers (```` ```json ```` / ```` ``` ````) and
/// surrounding whitespace from an LLM reply so it can be parsed as JSON.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse an LLM reply as strict JSON after stripping code fences.
pub fn parse_json_reply<T: serde::de::DeserializeOwned>(raw: &str) -> serde_json::Result<T> {
    serde_json::from_str(&strip_code_fences(raw))
}

/// Trim `text` to at most `max_chars` characters, never splitting a UTF-8
/// code point. Leading/trailing whitespace is dropped first.
pub fn trim_to_chars(text: &str, max_chars: usize) -> &str {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Render items as a markdown bullet list, one `- item` per line.
pub fn bullet_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join bullet lines until adding another would exceed `max_chars`.
///
/// Used to keep the report prompt bounded no matter how many learnings a
/// deep run accumulates.
pub fn bullet_list_within(items: &[String], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for item in items {
        let line = format!("- {}", item);
        let line_chars = line.chars().count();
        let extra = if out.is_empty() { line_chars } else { line_chars + 1 };
        if used + extra > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&line);
        used += extra;
    }
    out
}
