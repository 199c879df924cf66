use regex::Regex;
use std::sync::LazyLock;

static IMG_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+?)["'][^>]*>"#).unwrap());
static INLINE_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)data:image/[^;]+;base64,[^"'<>]+"#).unwrap());

/// Collect image references from a free-form HTML fragment.
///
/// Returns every `<img src>` value in document order. Only when there is no
/// `<img>` tag at all does it fall back to bare `data:image/...;base64,...`
/// payloads in the text. Duplicates are kept.
pub fn extract_references(markup: &str) -> Vec<String> {
    let references: Vec<String> = IMG_SRC_RE
        .captures_iter(markup)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    if !references.is_empty() {
        return references;
    }

    // The payload runs to the next quote or bracket; line breaks inside it
    // are kept so the resolver sees the whole value.
    INLINE_IMAGE_RE
        .find_iter(markup)
        .map(|m| m.as_str().trim_end().to_string())
        .collect()
}
