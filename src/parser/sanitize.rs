//! Text sanitization for archived post titles and bodies
//!
//! Post markup is reduced to plain text: line breaks become newlines, every
//! other tag is dropped, and the entities imageboards emit in post bodies are
//! decoded.

use regex::Regex;
use std::sync::LazyLock;

static BREAK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("Invalid regex pattern"));

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid regex pattern"));

/// Sanitize a post title or body
///
/// # Examples
///
/// ```
/// use chandere::parser::sanitize::sanitize_post_text;
///
/// let body = r##"<a href="#p1" class="quotelink">&gt;&gt;1</a><br>it&#039;s &quot;fine&quot;"##;
/// assert_eq!(sanitize_post_text(body), "&gt;&gt;1\nit's \"fine\"");
/// ```
pub fn sanitize_post_text(text: &str) -> String {
    let text = BREAK_REGEX.replace_all(text, "\n");
    let text = strip_tags(&text);
    decode_entities(&text)
}

/// Remove every HTML tag
///
/// # Examples
///
/// ```
/// use chandere::parser::sanitize::strip_tags;
///
/// assert_eq!(strip_tags("<span class=\"quote\">text</span>"), "text");
/// ```
pub fn strip_tags(text: &str) -> String {
    TAG_REGEX.replace_all(text, "").into_owned()
}

/// Decode `&#039;`, `&quot;` and `&amp;`
///
/// `&amp;` is decoded last so that `&amp;quot;` yields `&quot;`.
pub fn decode_entities(text: &str) -> String {
    text.replace("&#039;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
