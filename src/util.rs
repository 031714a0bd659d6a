use std::{any::Any, sync::LazyLock};

use regex::Regex;

/// Source location of a command, attached to its `custom_data` by `#[inject_span]`.
pub struct Spanned {
    pub name: &'static str,
    pub file: &'static str,
    pub line: u32,
    #[allow(dead_code)]
    pub inner: Box<dyn Any + Send + Sync>,
}

static ITEM_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,]").expect("separator pattern is valid"));

/// Splits a comma or semicolon separated list, dropping blank entries.
pub fn split_items(raw: &str) -> Vec<String> {
    ITEM_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `max` characters of `text`, for quoting response bodies in logs.
pub fn excerpt(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn is_web_url(url: &str) -> bool {
    reqwest::Url::parse(url).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_commas_and_semicolons() {
        assert_eq!(
            split_items(" Pizza, Tacos;Sushi ,, ; Pad Thai "),
            vec!["Pizza", "Tacos", "Sushi", "Pad Thai"]
        );
        assert!(split_items(" ;, ").is_empty());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("short", 200), "short");
    }

    #[test]
    fn only_web_urls_are_accepted() {
        assert!(is_web_url("https://example.com/a.png"));
        assert!(is_web_url("http://example.com"));
        assert!(!is_web_url("ftp://example.com/a.png"));
        assert!(!is_web_url("a.png"));
    }
}
