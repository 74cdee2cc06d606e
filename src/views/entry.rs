//! Entry create/update views and the id redirect

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use tracing::info;

use super::{base_context, render, visible_entry, Urls, ViewError};
use crate::api::middleware::{AppState, CurrentPrincipal};
use crate::forms::{EntryEditForm, EntryFormData};
use crate::models::{Entry, Principal};
use crate::services::EntryServiceError;

/// Render `entry_edit.html` for a form, optionally tied to a saved entry
async fn render_form(
    state: &AppState,
    principal: &Principal,
    form: &EntryEditForm,
    action: &str,
    entry: Option<&Entry>,
) -> Result<Response, ViewError> {
    let sites = state.site_repo.list().await?;
    let urls = Urls::new(state.weblog_prefix());

    let mut context = base_context(state, principal).await;
    context.insert("form", &form.view(action, &sites));
    if let Some(entry) = entry {
        context.insert("entry", entry);
        context.insert("entry_url", &urls.entry_detail(entry));
    }
    Ok(render(state, "entry_edit.html", &context)?.into_response())
}

async fn known_site_ids(state: &AppState) -> Result<Vec<i64>, ViewError> {
    Ok(state.site_repo.list().await?.into_iter().map(|s| s.id).collect())
}

/// After a successful save: follow `save` to the entry, otherwise keep editing it
async fn after_save(
    state: &AppState,
    principal: &Principal,
    submitted: &EntryEditForm,
    entry: &Entry,
) -> Result<Response, ViewError> {
    let urls = Urls::new(state.weblog_prefix());
    if submitted.wants_redirect() {
        return Ok(Redirect::to(&urls.entry_detail(entry)).into_response());
    }
    let form = EntryEditForm::for_entry(entry);
    render_form(state, principal, &form, &urls.entry_update(entry.id), Some(entry)).await
}

/// Move service-level rejections of a valid-looking form onto its fields
fn field_error(form: &mut EntryEditForm, error: EntryServiceError) -> Result<(), ViewError> {
    match error {
        EntryServiceError::UnknownSite(id) => {
            form.add_error(
                "sites",
                format!("Select a valid choice. {} is not one of the available choices.", id),
            );
            Ok(())
        }
        EntryServiceError::ValidationError(msg) => {
            form.add_error("title", msg);
            Ok(())
        }
        other => Err(other.into()),
    }
}

/// GET {prefix}/entry/new/
pub async fn create_form(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Response, ViewError> {
    if !state.permissions.can_create_entry(&principal) {
        return Err(ViewError::forbidden());
    }
    let form = EntryEditForm::initial(state.site_id());
    let action = Urls::new(state.weblog_prefix()).entry_create();
    render_form(&state, &principal, &form, &action, None).await
}

/// POST {prefix}/entry/new/
pub async fn create_entry(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Form(data): Form<EntryFormData>,
) -> Result<Response, ViewError> {
    if !state.permissions.can_create_entry(&principal) {
        return Err(ViewError::forbidden());
    }
    // Entries are credited to the creating user, so a session is needed
    // even if the handler lets anonymous visitors through.
    let author_id = principal
        .id()
        .ok_or_else(|| ViewError::Forbidden("Log in to write entries.".to_string()))?;

    let action = Urls::new(state.weblog_prefix()).entry_create();
    let known_sites = known_site_ids(&state).await?;
    let mut form = EntryEditForm::bind(data);
    let Some(cleaned) = form.clean(&known_sites) else {
        return render_form(&state, &principal, &form, &action, None).await;
    };

    let entry = match state.entry_service.create(cleaned.into_create_input(author_id)).await {
        Ok(entry) => entry,
        Err(e) => {
            field_error(&mut form, e)?;
            return render_form(&state, &principal, &form, &action, None).await;
        }
    };
    info!(entry_id = entry.id, by = %principal.username(), "Entry created from form");

    after_save(&state, &principal, &form, &entry).await
}

async fn editable_entry(state: &AppState, principal: &Principal, id: i64) -> Result<Entry, ViewError> {
    let entry = state.entry_service.get_by_id(id).await?.ok_or(ViewError::NotFound)?;
    if !state.permissions.can_change_entry(principal, &entry) {
        return Err(ViewError::forbidden());
    }
    Ok(entry)
}

/// GET {prefix}/entry/{id}/update/
pub async fn update_form(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Response, ViewError> {
    let entry = editable_entry(&state, &principal, id).await?;
    let form = EntryEditForm::for_entry(&entry);
    let action = Urls::new(state.weblog_prefix()).entry_update(id);
    render_form(&state, &principal, &form, &action, Some(&entry)).await
}

/// POST {prefix}/entry/{id}/update/
pub async fn update_entry(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
    Form(data): Form<EntryFormData>,
) -> Result<Response, ViewError> {
    let entry = editable_entry(&state, &principal, id).await?;
    let action = Urls::new(state.weblog_prefix()).entry_update(id);

    let known_sites = known_site_ids(&state).await?;
    let mut form = EntryEditForm::bind(data);
    let Some(cleaned) = form.clean(&known_sites) else {
        return render_form(&state, &principal, &form, &action, Some(&entry)).await;
    };

    if cleaned.status != entry.status && !state.permissions.can_change_status(&principal, &entry) {
        form.add_error("status", "You are not allowed to change the status of this entry.");
        return render_form(&state, &principal, &form, &action, Some(&entry)).await;
    }

    let updated = match state
        .entry_service
        .update(id, cleaned.into_update_input(), principal.id())
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            field_error(&mut form, e)?;
            return render_form(&state, &principal, &form, &action, Some(&entry)).await;
        }
    };
    info!(entry_id = id, by = %principal.username(), "Entry updated from form");

    after_save(&state, &principal, &form, &updated).await
}

/// GET {prefix}/entry/{id}/
pub async fn entry_redirect(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Redirect, ViewError> {
    let entry = visible_entry(&state, &principal, id).await?;
    Ok(Redirect::permanent(&Urls::new(state.weblog_prefix()).entry_detail(&entry)))
}
