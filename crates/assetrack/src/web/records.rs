//! Form posts that add records to an asset: scrap, AMC, calibration, event.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Form;

use super::session::deny;
use super::{flash_outcome, AppState, CurrentUser};
use crate::amc::AmcForm;
use crate::asset::ScrapForm;
use crate::calibration::CalibrationForm;
use crate::dates;
use crate::error::Result;
use crate::event::EventForm;

pub(crate) async fn scrap(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ScrapForm>,
) -> Result<Response> {
    if current.ensure_admin().is_err() {
        return deny(&state, &current);
    }
    let outcome = form.validate(dates::today()).and_then(|(date, reason)| {
        state.with_db(|db| db.scrap_asset(id, date, &reason, current.name()))
    });
    flash_outcome(
        &state,
        &current.token,
        outcome,
        |asset| format!("Asset {} scrapped", asset.asset_code),
        &format!("/assets/{id}"),
    )
}

pub(crate) async fn add_amc(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<AmcForm>,
) -> Result<Response> {
    let outcome = form.validate().and_then(|amc| {
        state.with_db(|db| db.add_amc(id, &amc, current.name(), dates::today()))
    });
    flash_outcome(
        &state,
        &current.token,
        outcome,
        |amc| format!("AMC added ({})", amc.period()),
        &format!("/assets/{id}"),
    )
}

pub(crate) async fn add_calibration(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<CalibrationForm>,
) -> Result<Response> {
    let outcome = form
        .validate(dates::today())
        .and_then(|cal| state.with_db(|db| db.record_calibration(id, &cal, current.name())));
    flash_outcome(
        &state,
        &current.token,
        outcome,
        |cal| {
            format!(
                "Calibration recorded, next due {}",
                dates::format_indian(Some(cal.next_due_on))
            )
        },
        &format!("/assets/{id}"),
    )
}

pub(crate) async fn add_event(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<EventForm>,
) -> Result<Response> {
    let outcome = form
        .validate(dates::today(), current.name())
        .and_then(|event| state.with_db(|db| db.add_manual_event(id, &event)));
    flash_outcome(
        &state,
        &current.token,
        outcome,
        |event| format!("{} logged", event.kind.label()),
        &format!("/assets/{id}"),
    )
}
