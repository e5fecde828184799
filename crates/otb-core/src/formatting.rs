//! Text helpers for outbound Telegram messages.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Split a plain-text message into chunks of at most `limit` bytes.
///
/// Telegram rejects messages above its length cap, so long model replies
/// are sent as sequential parts. Splits always land on UTF-8 character
/// boundaries; text at or under the limit comes back as a single chunk.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (head, tail) = split_utf8_prefix(rest, limit);
        out.push(head.to_string());
        rest = tail;
    }
    out
}

fn split_utf8_prefix(s: &str, max_bytes: usize) -> (&str, &str) {
    if s.len() <= max_bytes {
        return (s, "");
    }
    let mut idx = 0usize;
    for (i, _) in s.char_indices() {
        if i > max_bytes {
            break;
        }
        idx = i;
    }
    if idx == 0 {
        // Shouldn't happen (valid UTF-8), but avoid infinite loops.
        let next = s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(1);
        return (&s[..next], &s[next..]);
    }
    (&s[..idx], &s[idx..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(split_message("hello", 4000), vec!["hello".to_string()]);
    }

    #[test]
    fn text_at_the_limit_is_not_split() {
        let text = "a".repeat(10);
        assert_eq!(split_message(&text, 10), vec![text.clone()]);
    }

    #[test]
    fn long_text_splits_and_reassembles() {
        let text = "x".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn splits_respect_multibyte_boundaries() {
        // Each of these is 3 bytes in UTF-8; a 7-byte limit cannot hold 3.
        let text = "ありがとうございます";
        let chunks = split_message(text, 7);
        assert!(chunks.iter().all(|c| c.len() <= 7));
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert_eq!(chunks.concat(), text);
    }
}
