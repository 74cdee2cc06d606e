//! Entry body rendering
//!
//! Entry content is stored as typed by the editor. On display it is either
//! passed through as HTML (blank lines become paragraphs, single newlines
//! become `<br>`) or rendered from Markdown with pulldown-cmark.
//!
//! ```
//! use zinnia::config::MarkupLanguage;
//! use zinnia::services::markup::MarkupRenderer;
//!
//! let renderer = MarkupRenderer::new(MarkupLanguage::Markdown);
//! assert!(renderer.render("**bold**").contains("<strong>bold</strong>"));
//! ```

use crate::config::MarkupLanguage;
use pulldown_cmark::{html, Options, Parser};

/// Renders entry bodies in the configured markup language
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupRenderer {
    language: MarkupLanguage,
}

impl MarkupRenderer {
    pub fn new(language: MarkupLanguage) -> Self {
        Self { language }
    }

    pub fn language(&self) -> MarkupLanguage {
        self.language
    }

    /// Render stored content to HTML
    pub fn render(&self, content: &str) -> String {
        match self.language {
            MarkupLanguage::Html => linebreaks(content),
            MarkupLanguage::Markdown => render_markdown(content),
        }
    }
}

fn render_markdown(content: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);

    let parser = Parser::new_ext(content, options);
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

/// Wrap blank-line separated blocks in `<p>` and turn the remaining
/// newlines into `<br>`. Content that already contains a `<p` tag is
/// returned unchanged.
pub fn linebreaks(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let trimmed = normalized.trim();
    if trimmed.is_empty() || trimmed.contains("<p") {
        return trimmed.to_string();
    }

    trimmed
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| format!("<p>{}</p>", block.replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_linebreaks() {
        let renderer = MarkupRenderer::new(MarkupLanguage::Html);
        assert_eq!(
            renderer.render("First line\nsecond line\n\nNext paragraph"),
            "<p>First line<br>second line</p>\n\n<p>Next paragraph</p>"
        );
    }

    #[test]
    fn test_html_with_paragraphs_passes_through() {
        let body = "<p>Already <em>formatted</em></p>";
        assert_eq!(linebreaks(body), body);
        assert_eq!(linebreaks("   "), "");
    }

    #[test]
    fn test_markdown() {
        let renderer = MarkupRenderer::new(MarkupLanguage::Markdown);
        let html = renderer.render("# Title\n\nSome *text* here.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn test_default_is_html() {
        assert_eq!(MarkupRenderer::default().language(), MarkupLanguage::Html);
    }
}
