//! HTML form binding and validation

pub mod entry;

pub use entry::{CleanedEntry, EntryEditForm, EntryFormData, FieldErrors, FormView};
