/// Appended when a reply had to be cut to fit the transport.
pub const TRUNCATION_MARKER: &str = "\n\n… (truncated)";

/// Cut `text` to at most `limit` UTF-16 code units, marker included.
///
/// Telegram measures message length in UTF-16 units, so astral-plane
/// characters (emoji, math letters) count twice. Never splits a `char`.
pub fn truncate_for_transport(text: &str, limit: usize) -> String {
    if utf16_len(text) <= limit {
        return text.to_string();
    }

    let marker_len = utf16_len(TRUNCATION_MARKER);
    if limit <= marker_len {
        return take_utf16(text, limit);
    }

    let mut out = take_utf16(text, limit - marker_len);
    out.push_str(TRUNCATION_MARKER);
    out
}

pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

fn take_utf16(s: &str, budget: usize) -> String {
    let mut used = 0;
    s.chars()
        .take_while(|c| {
            used += c.len_utf16();
            used <= budget
        })
        .collect()
}

/// First `max` characters of `s`, with `...` when cut. For log lines and error snippets.
pub fn snippet(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    format!("{}...", s.chars().take(max).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_for_transport("4", 4000), "4");
        let exact = "x".repeat(4000);
        assert_eq!(truncate_for_transport(&exact, 4000), exact);
    }

    #[test]
    fn long_text_is_cut_with_marker() {
        let long = "a".repeat(5000);
        let out = truncate_for_transport(&long, 4000);
        assert!(out.chars().count() <= 4000);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(out.starts_with("aaaa"));
    }

    #[test]
    fn multibyte_text_counts_chars() {
        let long = "é".repeat(5000);
        let out = truncate_for_transport(&long, 4000);
        assert_eq!(out.chars().count(), 4000);
    }

    #[test]
    fn astral_chars_count_as_two_units() {
        let long = "😀".repeat(3000);
        let out = truncate_for_transport(&long, 4000);
        assert!(utf16_len(&out) <= 4000, "{}", utf16_len(&out));
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(out.trim_end_matches(TRUNCATION_MARKER).chars().all(|c| c == '😀'));

        // 1999 emoji = 3998 units: fits without cutting.
        let fits = "😀".repeat(1999);
        assert_eq!(truncate_for_transport(&fits, 4000), fits);
    }

    #[test]
    fn tiny_limit_skips_marker() {
        assert_eq!(truncate_for_transport("abcdef", 3), "abc");
    }

    #[test]
    fn snippet_marks_cut() {
        assert_eq!(snippet("hello", 10), "hello");
        assert_eq!(snippet("hello world", 5), "hello...");
    }
}
