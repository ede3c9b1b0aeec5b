//! Text helpers shared by prompts and parsers.

/// Numbered objective list: `1. first\n2. second`.
pub fn format_objectives(objectives: &[String]) -> String {
    objectives
        .iter()
        .enumerate()
        .map(|(i, o)| format!("{}. {}", i + 1, o))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bulleted, numbered revision list: `- 1. fix intro`.
pub fn format_revisions(revisions: &[String]) -> String {
    revisions
        .iter()
        .enumerate()
        .map(|(i, r)| format!("- {}. {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate to `max_chars` characters (not bytes), appending "..." when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}

/// Remove `<think>…</think>` reasoning blocks. An unterminated block
/// swallows the rest of the text; a lone closing tag drops everything before it.
pub fn strip_think(s: &str) -> String {
    let mut text = match s.find("</think>") {
        Some(end) if !s[..end].contains("<think>") => s[end + "</think>".len()..].to_string(),
        _ => s.to_string(),
    };
    while let Some(start) = text.find("<think>") {
        match text[start..].find("</think>") {
            Some(rel_end) => {
                let end = start + rel_end + "</think>".len();
                text.replace_range(start..end, "");
            }
            None => text.truncate(start),
        }
    }
    text
}

/// The slice between the first `{` and the last `}`, if both exist in order.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

/// Escape text for embedding in HTML.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objectives_and_revisions_numbered() {
        let items = vec!["a".to_string(), "b".to_string()];
        assert_eq!(format_objectives(&items), "1. a\n2. b");
        assert_eq!(format_revisions(&items), "- 1. a\n- 2. b");
        assert_eq!(format_objectives(&[]), "");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exact", 5), "exact");
        assert_eq!(truncate("日本語テキスト", 3), "日本語...");
    }

    #[test]
    fn think_blocks_removed() {
        assert_eq!(strip_think("<think>hmm</think>PROBLEM: x"), "PROBLEM: x");
        assert_eq!(strip_think("a<think>1</think>b<think>2</think>c"), "abc");
        assert_eq!(strip_think("keep<think>never closed"), "keep");
        assert_eq!(strip_think("reasoning...</think>\nanswer"), "\nanswer");
        assert_eq!(strip_think("plain"), "plain");
    }

    #[test]
    fn json_object_extracted_from_chatter() {
        assert_eq!(
            extract_json_object("Sure! {\"a\": {\"b\": 1}} hope that helps"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(extract_json_object("no json"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn html_escaped() {
        assert_eq!(escape_html("<b>&\"x'</b>"), "&lt;b&gt;&amp;&quot;x&#39;&lt;/b&gt;");
    }
}
