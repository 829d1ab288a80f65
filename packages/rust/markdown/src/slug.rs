//! URL slugs for posts.

/// Generate a URL-safe slug from `text`, keeping at most `max_words` words.
pub fn slugify(text: &str, max_words: usize) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .take(max_words)
        .collect::<Vec<_>>()
        .join("-")
}
