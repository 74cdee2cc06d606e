//! Entry edit form
//!
//! Binds submitted entry fields, validates them and produces either cleaned
//! data or per-field error messages. A form with errors is re-rendered, it
//! never turns into an error response.

use crate::models::{CreateEntryInput, Entry, EntryStatus, Site, UpdateEntryInput, TITLE_MAX_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw form submission, as posted by `entry_edit.html`
///
/// `sites` repeats once per selected site, so this is extracted with
/// `axum_extra::extract::Form`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryFormData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lead: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: String,
    /// Present (usually `"on"`) when the checkbox is ticked
    #[serde(default)]
    pub comment_enabled: Option<String>,
    #[serde(default)]
    pub sites: Vec<String>,
    /// Submit button that asks for a redirect to the saved entry
    #[serde(default)]
    pub save: Option<String>,
    /// Submit button that keeps the editor open
    #[serde(default)]
    pub save_continue: Option<String>,
}

/// Validated form content
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedEntry {
    pub title: String,
    pub lead: String,
    pub excerpt: String,
    pub content: String,
    pub status: EntryStatus,
    pub comment_enabled: bool,
    pub sites: Vec<i64>,
}

impl CleanedEntry {
    /// Creation input crediting `author_id`; the slug is derived on save
    pub fn into_create_input(self, author_id: i64) -> CreateEntryInput {
        CreateEntryInput {
            title: self.title,
            slug: String::new(),
            lead: self.lead,
            excerpt: self.excerpt,
            content: self.content,
            status: self.status,
            comment_enabled: self.comment_enabled,
            sites: self.sites,
            author_ids: vec![author_id],
        }
    }

    /// Full update of every editable field
    pub fn into_update_input(self) -> UpdateEntryInput {
        UpdateEntryInput {
            title: Some(self.title),
            lead: Some(self.lead),
            excerpt: Some(self.excerpt),
            content: Some(self.content),
            status: Some(self.status),
            comment_enabled: Some(self.comment_enabled),
            sites: Some(self.sites),
        }
    }
}

/// Field name → messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Entry create/update form
#[derive(Debug, Clone, Default)]
pub struct EntryEditForm {
    values: EntryFormData,
    errors: FieldErrors,
}

impl EntryEditForm {
    /// Unbound form with the creation defaults
    pub fn initial(default_site_id: i64) -> Self {
        Self {
            values: EntryFormData {
                status: EntryStatus::Draft.as_str().to_string(),
                sites: vec![default_site_id.to_string()],
                ..Default::default()
            },
            errors: FieldErrors::new(),
        }
    }

    /// Form showing the current state of an entry
    pub fn for_entry(entry: &Entry) -> Self {
        Self {
            values: EntryFormData {
                title: entry.title.clone(),
                lead: entry.lead.clone(),
                excerpt: entry.excerpt.clone(),
                content: entry.content.clone(),
                status: entry.status.as_str().to_string(),
                comment_enabled: entry.comment_enabled.then(|| "on".to_string()),
                sites: entry.sites.iter().map(i64::to_string).collect(),
                save: None,
                save_continue: None,
            },
            errors: FieldErrors::new(),
        }
    }

    /// Form bound to submitted data
    pub fn bind(values: EntryFormData) -> Self {
        Self {
            values,
            errors: FieldErrors::new(),
        }
    }

    /// Validate against the known site ids.
    ///
    /// Returns the cleaned data, or `None` after recording field errors.
    pub fn clean(&mut self, known_sites: &[i64]) -> Option<CleanedEntry> {
        self.errors.clear();

        let title = self.values.title.trim().to_string();
        let title_length = title.chars().count();
        if title.is_empty() {
            self.add_error("title", "This field is required.");
        } else if title_length > TITLE_MAX_LENGTH {
            let message = format!(
                "Ensure this value has at most {} characters (it has {}).",
                TITLE_MAX_LENGTH, title_length
            );
            self.add_error("title", message);
        }

        let status = if self.values.status.trim().is_empty() {
            self.add_error("status", "This field is required.");
            None
        } else {
            match self.values.status.parse::<EntryStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    let message = format!(
                        "Select a valid choice. {} is not one of the available choices.",
                        self.values.status
                    );
                    self.add_error("status", message);
                    None
                }
            }
        };

        let raw_sites: Vec<String> = self
            .values
            .sites
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if raw_sites.is_empty() {
            self.add_error("sites", "This field is required.");
        }
        let mut sites = Vec::new();
        for raw in &raw_sites {
            match raw.parse::<i64>() {
                Ok(id) if known_sites.contains(&id) => {
                    if !sites.contains(&id) {
                        sites.push(id);
                    }
                }
                _ => {
                    let message = format!(
                        "Select a valid choice. {} is not one of the available choices.",
                        raw
                    );
                    self.add_error("sites", message);
                }
            }
        }

        if !self.errors.is_empty() {
            return None;
        }
        Some(CleanedEntry {
            title,
            lead: self.values.lead.clone(),
            excerpt: self.values.excerpt.clone(),
            content: self.values.content.clone(),
            status: status?,
            comment_enabled: self.comment_enabled(),
            sites,
        })
    }

    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn values(&self) -> &EntryFormData {
        &self.values
    }

    /// Whether the `save` button was used (as opposed to "save and continue")
    pub fn wants_redirect(&self) -> bool {
        self.values.save.as_deref().is_some_and(|v| !v.is_empty())
    }

    fn comment_enabled(&self) -> bool {
        matches!(
            self.values.comment_enabled.as_deref().map(str::trim),
            Some("on") | Some("true") | Some("1") | Some("yes")
        )
    }

    /// Template view of the form
    pub fn view(&self, action: &str, sites: &[Site]) -> FormView {
        FormView {
            action: action.to_string(),
            title: self.values.title.clone(),
            lead: self.values.lead.clone(),
            excerpt: self.values.excerpt.clone(),
            content: self.values.content.clone(),
            comment_enabled: self.comment_enabled(),
            status_choices: EntryStatus::ALL
                .iter()
                .map(|status| Choice {
                    value: status.as_str().to_string(),
                    label: status.label().to_string(),
                    selected: self.values.status == status.as_str(),
                })
                .collect(),
            site_choices: sites
                .iter()
                .map(|site| Choice {
                    value: site.id.to_string(),
                    label: site.name.clone(),
                    selected: self.values.sites.iter().any(|s| s.trim() == site.id.to_string()),
                })
                .collect(),
            errors: self.errors.clone(),
        }
    }
}

/// Serializable form state for templates
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub action: String,
    pub title: String,
    pub lead: String,
    pub excerpt: String,
    pub content: String,
    pub comment_enabled: bool,
    pub status_choices: Vec<Choice>,
    pub site_choices: Vec<Choice>,
    pub errors: FieldErrors,
}

/// One `<option>` or checkbox
#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}
