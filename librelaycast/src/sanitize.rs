//! Mastodon HTML to Telegram HTML conversion
//!
//! Mastodon delivers post bodies as an HTML fragment. Telegram's HTML parse
//! mode accepts only a handful of tags and rejects the message outright when it
//! meets anything else, so every body goes through [`sanitize`] first:
//!
//! - `<p>` boundaries become a blank line, `<br>` a single newline
//! - `<strong>`/`<b>` and `<em>`/`<i>` become `<b>` and `<i>`
//! - `<script>` and `<style>` elements are dropped with their content
//! - every other tag is removed but its text is kept
//! - `<b>`/`<i>` tags without a properly nested partner are removed
//! - runs of three or more newlines collapse to two, and the result is trimmed
//!
//! The output only ever contains the canonical `<b>`, `</b>`, `<i>` and `</i>`
//! tags, so sanitizing it again returns it unchanged.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::types::SourcePost;

static DROPPED_ELEMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"),
        Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex"),
    ]
});

static PARAGRAPH_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p\b[^>]*>").expect("valid regex"));
static PARAGRAPH_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</p\s*>").expect("valid regex"));
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\b[^>]*>").expect("valid regex"));

static BOLD_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:strong|b)\b[^>]*>").expect("valid regex"));
static BOLD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:strong|b)\s*>").expect("valid regex"));
static ITALIC_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:em|i)\b[^>]*>").expect("valid regex"));
static ITALIC_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:em|i)\s*>").expect("valid regex"));

// Only things that look like a tag: `<` followed by a name, `/`, `!` or `?`.
// A bare `<` in running text is left alone.
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z!?][^>]*>").expect("valid regex"));

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid regex"));

static CANONICAL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([bi])>").expect("valid regex"));

const KEPT_TAGS: [&str; 4] = ["<b>", "</b>", "<i>", "</i>"];

/// Convert a Mastodon HTML fragment into text safe for Telegram's HTML mode
///
/// Never fails: unbalanced or unknown markup is stripped.
///
/// # Examples
///
/// ```
/// use librelaycast::sanitize::sanitize;
///
/// assert_eq!(sanitize("<p>Hello</p><p>World</p>"), "Hello\n\nWorld");
/// assert_eq!(sanitize("<strong>x</strong>"), "<b>x</b>");
/// ```
pub fn sanitize(markup: &str) -> String {
    if markup.is_empty() {
        return String::new();
    }

    let mut content = markup.to_string();

    for element in DROPPED_ELEMENTS.iter() {
        content = element.replace_all(&content, "").into_owned();
    }

    content = PARAGRAPH_OPEN.replace_all(&content, "").into_owned();
    content = PARAGRAPH_CLOSE.replace_all(&content, "\n\n").into_owned();
    content = LINE_BREAK.replace_all(&content, "\n").into_owned();

    content = BOLD_OPEN.replace_all(&content, "<b>").into_owned();
    content = BOLD_CLOSE.replace_all(&content, "</b>").into_owned();
    content = ITALIC_OPEN.replace_all(&content, "<i>").into_owned();
    content = ITALIC_CLOSE.replace_all(&content, "</i>").into_owned();

    content = ANY_TAG
        .replace_all(&content, |caps: &Captures| {
            let tag = &caps[0];
            if KEPT_TAGS.contains(&tag) {
                tag.to_string()
            } else {
                String::new()
            }
        })
        .into_owned();

    content = drop_unpaired_tags(&content);

    content = EXCESS_NEWLINES.replace_all(&content, "\n\n").into_owned();

    content.trim().to_string()
}

/// Remove `<b>`/`<i>` tags that are not closed in proper nesting order
///
/// A closing tag is kept only when it closes the innermost open tag; opening
/// tags left without a partner are removed along with it.
fn drop_unpaired_tags(content: &str) -> String {
    let tags: Vec<_> = CANONICAL_TAG.captures_iter(content).collect();
    let mut keep = vec![false; tags.len()];
    let mut open: Vec<(usize, &str)> = Vec::new();

    for (index, caps) in tags.iter().enumerate() {
        let name = caps.get(2).map_or("", |m| m.as_str());
        if caps[1].is_empty() {
            open.push((index, name));
        } else if open.last().is_some_and(|&(_, top)| top == name) {
            if let Some((opened, _)) = open.pop() {
                keep[opened] = true;
                keep[index] = true;
            }
        }
    }

    let mut result = String::with_capacity(content.len());
    let mut last = 0;
    for (caps, kept) in tags.iter().zip(keep) {
        let Some(tag) = caps.get(0) else { continue };
        result.push_str(&content[last..tag.start()]);
        if kept {
            result.push_str(tag.as_str());
        }
        last = tag.end();
    }
    result.push_str(&content[last..]);
    result
}

/// Escape text for interpolation into Telegram HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Build the Telegram message for a post
///
/// A bold header naming the author, the sanitized body, and a link back to
/// the original post, separated by blank lines.
pub fn compose_message(post: &SourcePost) -> String {
    format!(
        "<b>New Post from {}</b>\n\n{}\n\n<a href=\"{}\">View on Mastodon</a>",
        escape_html(&post.author_display_name),
        sanitize(&post.content),
        escape_html(&post.url),
    )
}
