//! Template engine
//!
//! Tera rendering for the weblog views. Default templates are compiled into
//! the binary; any `*.html` file in the configured override directory
//! replaces the built-in template of the same name.

use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};
use thiserror::Error;
use tracing::{debug, warn};

/// Built-in templates, base layout first
const DEFAULT_TEMPLATES: [(&str, &str); 5] = [
    ("base.html", include_str!("defaults/base.html")),
    ("entry_edit.html", include_str!("defaults/entry_edit.html")),
    ("entry_detail.html", include_str!("defaults/entry_detail.html")),
    ("entry_archive.html", include_str!("defaults/entry_archive.html")),
    ("error.html", include_str!("defaults/error.html")),
];

/// Template errors
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A template failed to parse or render
    #[error("Template error: {0}")]
    Render(String),

    /// The override directory could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tera wrapper holding the weblog templates
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Engine with only the built-in templates
    pub fn new() -> Result<Self, TemplateError> {
        Self::with_overrides(None)
    }

    /// Engine with built-in templates, replaced by files from `dir` when given
    pub fn with_overrides(dir: Option<&Path>) -> Result<Self, TemplateError> {
        let mut templates: Vec<(String, String)> = DEFAULT_TEMPLATES
            .iter()
            .map(|(name, source)| (name.to_string(), source.to_string()))
            .collect();

        if let Some(dir) = dir {
            if dir.is_dir() {
                for (name, source) in read_overrides(dir)? {
                    debug!(template = %name, "Using template override");
                    match templates.iter_mut().find(|(existing, _)| *existing == name) {
                        Some(slot) => slot.1 = source,
                        None => templates.push((name, source)),
                    }
                }
            } else {
                warn!(path = %dir.display(), "Template override directory not found, using built-in templates");
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| TemplateError::Render(error_chain("Failed to load templates", &e)))?;

        Ok(Self { tera })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, TemplateError> {
        self.tera
            .render(template, context)
            .map_err(|e| TemplateError::Render(error_chain(&format!("Failed to render '{}'", template), &e)))
    }

    /// Render, falling back to a plain page when the template itself fails
    pub fn render_or_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                warn!("{}", e);
                simple_error_page(template, &e.to_string())
            }
        }
    }

    /// Names of all loaded templates
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(String::from).collect();
        names.sort();
        names
    }
}

fn read_overrides(dir: &Path) -> Result<Vec<(String, String)>, TemplateError> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "html") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                found.push((name.to_string(), fs::read_to_string(&path)?));
            }
        }
    }
    Ok(found)
}

fn error_chain(prefix: &str, error: &tera::Error) -> String {
    let mut message = format!("{}: {}", prefix, error);
    let mut source = error.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Last-resort page used when a template cannot be rendered
fn simple_error_page(template: &str, error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Template Error</title></head>
<body>
    <h1>Template Error</h1>
    <p>Failed to render template: <code>{}</code></p>
    <pre>{}</pre>
</body>
</html>"#,
        tera::escape_html(template),
        tera::escape_html(error)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::EntryEditForm;
    use crate::models::Site;

    fn base_context() -> TeraContext {
        let mut context = TeraContext::new();
        context.insert("site_name", "example.com");
        context.insert("weblog_url", "/weblog");
        context.insert("current_user", &Option::<String>::None);
        context
    }

    #[test]
    fn test_builtin_templates_load() {
        let engine = TemplateEngine::new().unwrap();
        assert_eq!(
            engine.template_names(),
            vec![
                "base.html",
                "entry_archive.html",
                "entry_detail.html",
                "entry_edit.html",
                "error.html"
            ]
        );
    }

    #[test]
    fn test_render_error_page_escapes() {
        let engine = TemplateEngine::new().unwrap();
        let mut context = base_context();
        context.insert("status", &404);
        context.insert("title", "Not Found");
        context.insert("message", "<b>gone</b>");

        let html = engine.render("error.html", &context).unwrap();
        assert!(html.contains("404 Not Found"));
        assert!(html.contains("&lt;b&gt;gone&lt;&#x2F;b&gt;"));
    }

    #[test]
    fn test_render_entry_form_with_errors() {
        let engine = TemplateEngine::new().unwrap();
        let sites = vec![Site {
            id: 1,
            domain: "example.com".to_string(),
            name: "example.com".to_string(),
        }];
        let mut form = EntryEditForm::initial(1);
        form.add_error("title", "This field is required.");

        let mut context = base_context();
        context.insert("form", &form.view("/weblog/entry/new/", &sites));
        let html = engine.render("entry_edit.html", &context).unwrap();

        assert!(html.contains(r#"action="/weblog/entry/new/""#));
        assert!(html.contains("This field is required."));
        assert!(html.contains(r#"<option value="draft" selected>"#));
        assert!(html.contains(r#"name="save""#));
    }

    #[test]
    fn test_overrides_replace_builtins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("error.html"),
            "custom {{ status }}",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let engine = TemplateEngine::with_overrides(Some(dir.path())).unwrap();
        let mut context = base_context();
        context.insert("status", &403);
        assert_eq!(engine.render("error.html", &context).unwrap(), "custom 403");
        assert!(!engine.template_names().contains(&"notes.txt".to_string()));
    }

    #[test]
    fn test_missing_template_falls_back() {
        let engine = TemplateEngine::new().unwrap();
        assert!(engine.render("nope.html", &base_context()).is_err());
        let html = engine.render_or_fallback("nope.html", &base_context());
        assert!(html.contains("Template Error"));
    }

    #[test]
    fn test_missing_override_dir_uses_builtins() {
        let engine = TemplateEngine::with_overrides(Some(Path::new("/definitely/not/here"))).unwrap();
        assert_eq!(engine.template_names().len(), DEFAULT_TEMPLATES.len());
    }
}
