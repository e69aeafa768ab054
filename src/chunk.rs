//! Token-budget truncation and positional chunking.
//!
//! Lengths are counted in characters (Unicode scalar values), never bytes, so
//! a slice boundary can not split a code point.

/// Coarse token-to-character ratio.
pub const CHARS_PER_TOKEN: usize = 4;
pub const DEFAULT_CHUNK_CHARS: usize = 4000;

/// First `max_tokens * 4` characters of `text`.
pub fn truncate_to_tokens(text: &str, max_tokens: u32) -> &str {
    let max_chars = (max_tokens as usize).saturating_mul(CHARS_PER_TOKEN);
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Split `text` for submission. Disabled mode yields the text as one chunk;
/// enabled mode yields consecutive `size`-character slices.
pub fn chunk(text: &str, chunked: bool, size: usize) -> Vec<&str> {
    if !chunked {
        return vec![text];
    }
    let size = if size == 0 { DEFAULT_CHUNK_CHARS } else { size };

    let mut out = Vec::new();
    let mut start = 0usize;
    let mut count = 0usize;
    for (idx, _) in text.char_indices() {
        if count == size {
            out.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        out.push(&text[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_mode_is_identity() {
        assert_eq!(chunk("abc", false, 1), vec!["abc"]);
        assert_eq!(chunk("", false, 5), vec![""]);
    }

    #[test]
    fn enabled_mode_slices_and_reassembles() {
        let text: String = ('a'..='z').cycle().take(103).collect();
        for n in [1usize, 7, 10, 103, 500] {
            let parts = chunk(&text, true, n);
            assert_eq!(parts.len(), text.chars().count().div_ceil(n), "n={n}");
            assert!(parts.iter().all(|p| p.chars().count() <= n));
            assert_eq!(parts.concat(), text);
        }
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "žluťoučký kůň";
        let parts = chunk(text, true, 4);
        assert_eq!(parts, vec!["žluť", "oučk", "ý ků", "ň"]);
    }

    #[test]
    fn ten_tokens_is_forty_chars() {
        let text = "x".repeat(100);
        let t = truncate_to_tokens(&text, 10);
        assert_eq!(t.len(), 40);
        assert_eq!(chunk(t, false, 4000), vec![t]);
        assert_eq!(truncate_to_tokens("short", 10), "short");
    }
}
