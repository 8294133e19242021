use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]*`").unwrap());
static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@([a-zA-Z0-9]+)>").unwrap());
static EMOJI: Lazy<Regex> = Lazy::new(|| Regex::new(r":([a-z0-9_\-+']+):").unwrap());

/// Syntactic token candidates found in one message. Emoji names still
/// need the validity check; mentions still need resolving to users.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Mentioned handles, first-appearance order, duplicates removed.
    pub mentions: Vec<String>,
    /// Emoji names in order, duplicates kept (they coalesce into counts
    /// later).
    pub emoji: Vec<String>,
}

/// Pull mention and emoji tokens out of raw message text. Inline-code
/// spans are cut out first so pasted literals like `` `:shrug:` `` never
/// count as tokens. Replacing a span with a space keeps the surrounding
/// text from fusing into an accidental token.
pub fn extract(text: &str) -> Extracted {
    let stripped = CODE_SPAN.replace_all(text, " ");

    let mut mentions = Vec::new();
    let mut seen = HashSet::new();
    for cap in MENTION.captures_iter(&stripped) {
        let handle = cap[1].to_string();
        if seen.insert(handle.clone()) {
            mentions.push(handle);
        }
    }

    let emoji = EMOJI
        .captures_iter(&stripped)
        .map(|cap| cap[1].to_string())
        .collect();

    Extracted { mentions, emoji }
}

/// First-occurrence dedup, used where a token list becomes a filter set.
pub fn unique(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_dedup_preserves_first_occurrence() {
        let out = extract("<@U2> thanks <@U1> and <@U2> again :tada:");
        assert_eq!(out.mentions, vec!["U2", "U1"]);
    }

    #[test]
    fn emoji_duplicates_kept_in_order() {
        let out = extract("<@U1> :star: :heart: :star:");
        assert_eq!(out.emoji, vec!["star", "heart", "star"]);
    }

    #[test]
    fn code_spans_hide_both_token_kinds() {
        let out = extract("try `<@U1> :fire:` yourself");
        assert_eq!(out, Extracted::default());
    }

    #[test]
    fn code_span_does_not_fuse_neighbors() {
        // Removing the span must not splice ":sta" and "r:" into a token
        let out = extract(":sta`x`r:");
        assert!(out.emoji.is_empty());
    }

    #[test]
    fn tokens_outside_code_spans_still_match() {
        let out = extract("`:shrug:` <@U1> :+1: for the `fix`");
        assert_eq!(out.mentions, vec!["U1"]);
        assert_eq!(out.emoji, vec!["+1"]);
    }

    #[test]
    fn plain_text_extracts_nothing() {
        let out = extract("no tokens here, just words: plain ones");
        assert_eq!(out, Extracted::default());
    }

    #[test]
    fn unique_keeps_first_occurrence() {
        let out = unique(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(out, vec!["b", "a"]);
    }
}
