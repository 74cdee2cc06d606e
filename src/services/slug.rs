//! Slug generation
//!
//! Slugs are lowercase ASCII words joined by hyphens. Accented letters are
//! folded to their base letter (NFKD, combining marks dropped); anything
//! else outside letters, digits, underscores, hyphens and whitespace is
//! removed before whitespace runs collapse into a single hyphen.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Slug used when a title yields no usable characters
pub const FALLBACK_SLUG: &str = "entry";

/// Width of the `slug` column
pub const MAX_SLUG_LENGTH: usize = 255;

/// Turn free text into a URL slug of at most `MAX_SLUG_LENGTH` characters.
///
/// `"Hello World!"` becomes `"hello-world"` and `"Café"` becomes `"cafe"`.
/// Characters without an ASCII decomposition are removed, so the result
/// may be empty.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.nfkd().filter(char::is_ascii).collect();
    let lowered = ascii.to_lowercase();
    let cleaned = INVALID_CHARS.replace_all(&lowered, "");
    let joined = SEPARATORS.replace_all(cleaned.trim(), "-");
    truncate(&joined, MAX_SLUG_LENGTH)
}

/// `base`, or `base-2`, `base-3`… for the `attempt`-th candidate (1-based).
///
/// The base is shortened when the suffix would push it past the column.
pub fn numbered_slug(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return truncate(base, MAX_SLUG_LENGTH);
    }
    let suffix = format!("-{}", attempt);
    format!("{}{}", truncate(base, MAX_SLUG_LENGTH - suffix.len()), suffix)
}

// Slugs are ASCII here, so byte and character counts agree
fn truncate(slug: &str, max: usize) -> String {
    let cut = &slug[..slug.len().min(max)];
    cut.trim_matches(|c| c == '-' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slugify_simple() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Hello   World  "), "hello-world");
    }

    #[test]
    fn test_slugify_punctuation() {
        assert_eq!(slugify("What's new, in 2024?"), "whats-new-in-2024");
        assert_eq!(slugify("one - two -- three"), "one-two-three");
        assert_eq!(slugify("snake_case_title"), "snake_case_title");
        assert_eq!(slugify("_edges_"), "edges");
    }

    #[test]
    fn test_slugify_folds_accents() {
        assert_eq!(slugify("Café au lait"), "cafe-au-lait");
        assert_eq!(slugify("Über Straße"), "uber-strae");
        assert_eq!(slugify("Crème brûlée à la Noël"), "creme-brulee-a-la-noel");
        assert_eq!(slugify("ﬁne ½"), "fine-12");
    }

    #[test]
    fn test_slugify_drops_unfoldable() {
        assert_eq!(slugify("日本語"), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_truncates() {
        let slug = slugify(&"a".repeat(300));
        assert_eq!(slug.len(), MAX_SLUG_LENGTH);

        // No dangling separator at the cut
        let title = format!("{} tail", "b".repeat(MAX_SLUG_LENGTH - 1));
        assert_eq!(slugify(&title), "b".repeat(MAX_SLUG_LENGTH - 1));
    }

    #[test]
    fn test_numbered_slug() {
        assert_eq!(numbered_slug("hello", 1), "hello");
        assert_eq!(numbered_slug("hello", 2), "hello-2");
        assert_eq!(numbered_slug("hello", 10), "hello-10");
    }

    #[test]
    fn test_numbered_slug_fits_column() {
        let base = "c".repeat(MAX_SLUG_LENGTH);
        let second = numbered_slug(&base, 2);
        assert_eq!(second.len(), MAX_SLUG_LENGTH);
        assert!(second.ends_with("c-2"));

        let tenth = numbered_slug(&base, 10);
        assert_eq!(tenth.len(), MAX_SLUG_LENGTH);
        assert!(tenth.ends_with("c-10"));
    }

    proptest! {
        #[test]
        fn slugs_are_url_safe(title in ".{0,64}") {
            let slug = slugify(&title);
            prop_assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.len() <= MAX_SLUG_LENGTH);
        }
    }
}
