//! Plain-text extraction from rich content documents.
//!
//! Publications store their body as a JSON node tree (`{type, text?, content?, attrs?}`,
//! the shape produced by ProseMirror-style editors). Search, excerpts, calendar
//! descriptions and chat notifications all need the same text without markup.

use serde_json::Value;

const BLOCK_NODES: &[&str] = &[
    "paragraph",
    "heading",
    "blockquote",
    "listItem",
    "codeBlock",
    "horizontalRule",
    "bulletList",
    "orderedList",
    "tableRow",
];

pub fn extract_plain_text(document: &Value) -> String {
    let mut out = String::new();
    match document {
        Value::String(text) => out.push_str(text),
        Value::Object(_) => walk(document, &mut out),
        Value::Array(nodes) => nodes.iter().for_each(|node| walk(node, &mut out)),
        _ => {}
    }
    normalise_lines(&out)
}

fn walk(node: &Value, out: &mut String) {
    let Some(object) = node.as_object() else {
        return;
    };
    let node_type = object.get("type").and_then(Value::as_str).unwrap_or_default();

    match node_type {
        "text" => {
            if let Some(text) = object.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
            return;
        }
        "hardBreak" => {
            out.push('\n');
            return;
        }
        _ => {}
    }

    let is_block = BLOCK_NODES.contains(&node_type);
    if is_block && !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if let Some(children) = object.get("content").and_then(Value::as_array) {
        for child in children {
            walk(child, out);
        }
    }
    if is_block && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Trims every line, collapses runs of blank lines into one and trims the result.
fn normalise_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && lines.last().map_or(true, |prev| prev.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Whitespace-normalised prefix of at most `max_chars` characters, cut on a word
/// boundary and suffixed with `…` when anything was dropped.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let joined = words.join(" ");
    if joined.chars().count() <= max_chars {
        return joined;
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut out = String::new();
    for word in words {
        let extra = usize::from(!out.is_empty()) + word.chars().count();
        if out.chars().count() + extra + 1 > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        // A single word longer than the limit.
        out = joined.chars().take(max_chars.saturating_sub(1)).collect();
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 2}, "content": [
                    {"type": "text", "text": "Water outage"}
                ]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "On Monday "},
                    {"type": "text", "marks": [{"type": "bold"}], "text": "hot water"},
                    {"type": "text", "text": " is off."},
                    {"type": "hardBreak"},
                    {"type": "text", "text": "Sorry."}
                ]},
                {"type": "paragraph"},
                {"type": "bulletList", "content": [
                    {"type": "listItem", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "Building 1"}]}
                    ]},
                    {"type": "listItem", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "Building 2"}]}
                    ]}
                ]}
            ]
        })
    }

    #[test]
    fn extracts_blocks_on_separate_lines() {
        assert_eq!(
            extract_plain_text(&doc()),
            "Water outage\nOn Monday hot water is off.\nSorry.\nBuilding 1\nBuilding 2"
        );
    }

    #[test]
    fn handles_degenerate_input() {
        assert_eq!(extract_plain_text(&json!(null)), "");
        assert_eq!(extract_plain_text(&json!(42)), "");
        assert_eq!(extract_plain_text(&json!("  plain  ")), "plain");
        assert_eq!(extract_plain_text(&json!({"type": "doc"})), "");
    }

    #[test]
    fn unknown_nodes_are_traversed() {
        let value = json!({"type": "callout", "content": [{"type": "text", "text": "hi"}]});
        assert_eq!(extract_plain_text(&value), "hi");
    }

    #[test]
    fn excerpt_cuts_on_words() {
        assert_eq!(excerpt("short  text", 20), "short text");
        assert_eq!(excerpt("one two three four", 10), "one two…");
        assert!(excerpt("one two three four", 10).chars().count() <= 10);
        assert_eq!(excerpt("Supercalifragilistic", 6), "Super…");
    }

    #[test]
    fn excerpt_respects_tiny_limits() {
        assert_eq!(excerpt("anything at all", 0), "");
        assert_eq!(excerpt("", 0), "");
        assert_eq!(excerpt("anything", 1), "…");
    }
}
