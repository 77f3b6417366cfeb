//! Spreadsheet import: upload, preview, confirm, template download.

use axum::extract::{Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Redirect, Response};
use tracing::info;

use super::documents::read_upload;
use super::session::deny;
use super::{flash_outcome, render, AppState, CurrentUser};
use crate::auth::Flash;
use crate::dates;
use crate::error::{Error, Result};
use crate::import::xlsx::{self, TEMPLATE_FILE_NAME, XLSX_CONTENT_TYPE};
use crate::import::{validate_sheet, ImportPlan, SheetOutcome};

const IMPORT_PAGE: &str = "/assets/import";

fn back_with(state: &AppState, current: &CurrentUser, flash: Flash) -> Result<Response> {
    state.flash(&current.token, flash)?;
    Ok(Redirect::to(IMPORT_PAGE).into_response())
}

/// Why a checked plan cannot be confirmed, if it cannot.
fn blocking_notice(plan: &ImportPlan) -> Option<Flash> {
    if plan.valid.is_empty() {
        Some(Flash::danger(
            "All rows are invalid. Please fix errors and re-upload the file.",
        ))
    } else if !plan.invalid.is_empty() {
        Some(Flash::danger(format!(
            "{} row(s) have errors. Nothing is imported until every row is valid.",
            plan.invalid.len()
        )))
    } else {
        None
    }
}

pub(crate) async fn page(State(state): State<AppState>, current: CurrentUser) -> Result<Response> {
    let flashes = state.with_db(|db| db.take_flashes(&current.token))?;
    Ok(render::import_page(&current.user, &flashes).into_response())
}

pub(crate) async fn upload(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> Result<Response> {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) if e.is_user_facing() => return back_with(&state, &current, Flash::danger(e.to_string())),
        Err(e) => return Err(e),
    };
    if upload.bytes.is_empty() || !xlsx::is_xlsx_name(&upload.file_name) {
        return back_with(
            &state,
            &current,
            Flash::danger("Please upload a valid .xlsx Excel file"),
        );
    }

    let bytes = upload.bytes;
    let sheet = tokio::task::spawn_blocking(move || xlsx::read_sheet(&bytes))
        .await
        .map_err(|e| Error::internal(format!("spreadsheet reader panicked: {e}")))?;
    let sheet = match sheet {
        Ok(sheet) => sheet,
        Err(e) if e.is_user_facing() => return back_with(&state, &current, Flash::danger(e.to_string())),
        Err(e) => return Err(e),
    };

    let existing = state.with_db(|db| {
        db.take_pending_import(&current.token)?;
        db.existing_codes()
    })?;
    let outcome = match validate_sheet(&sheet, &existing, state.code_re(), dates::today()) {
        Ok(outcome) => outcome,
        Err(e) if e.is_user_facing() => return back_with(&state, &current, Flash::danger(e.to_string())),
        Err(e) => return Err(e),
    };

    let plan = match outcome {
        SheetOutcome::Checked(plan) => plan,
        empty => {
            let message = empty.empty_message().unwrap_or("Nothing to import.");
            return back_with(&state, &current, Flash::warning(message));
        }
    };

    let notice = blocking_notice(&plan);
    if notice.is_none() {
        state.with_db(|db| db.set_pending_import(&current.token, &plan.valid))?;
    }

    info!(
        "Import preview for {}: {} valid, {} invalid",
        current.user.username,
        plan.valid.len(),
        plan.invalid.len()
    );
    let flashes: Vec<Flash> = notice.into_iter().collect();
    Ok(render::import_preview(&current.user, &flashes, &plan).into_response())
}

pub(crate) async fn confirm(State(state): State<AppState>, current: CurrentUser) -> Result<Response> {
    if current.ensure_admin().is_err() {
        return deny(&state, &current);
    }

    let Some(rows) = state.with_db(|db| db.take_pending_import(&current.token))? else {
        return back_with(
            &state,
            &current,
            Flash::warning("No pending import. Please upload a file first."),
        );
    };

    let outcome = state.with_db(|db| db.apply_import(&rows, current.name(), dates::today()));
    let to = if outcome.is_ok() { "/assets" } else { IMPORT_PAGE };
    flash_outcome(
        &state,
        &current.token,
        outcome,
        |summary| {
            format!(
                "Imported: {} created, {} updated",
                summary.created, summary.updated
            )
        },
        to,
    )
}

pub(crate) async fn template(_current: CurrentUser) -> Result<Response> {
    let bytes = xlsx::template_bytes()?;
    Ok((
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{TEMPLATE_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
