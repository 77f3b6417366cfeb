//! Asset master, add/edit forms and the detail page.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;

use super::render::{self, AssetDetail, AssetListPage};
use super::{AppState, CurrentUser};
use crate::amc::asset_amc_status;
use crate::asset::{AssetFilter, AssetForm};
use crate::auth::Flash;
use crate::calibration::asset_calibration_status;
use crate::dates;
use crate::error::Result;

pub(crate) async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<AssetFilter>,
) -> Result<Response> {
    let today = dates::today();
    let status = &state.config().status;
    let (rows, plants, departments, flashes) = state.with_db(|db| {
        Ok((
            db.list_asset_overview(&filter, today, status)?,
            db.plants()?,
            db.departments()?,
            db.take_flashes(&current.token)?,
        ))
    })?;

    let page = AssetListPage {
        rows: &rows,
        filter: &filter,
        plants: &plants,
        departments: &departments,
    };
    Ok(render::asset_list(&current.user, &flashes, &page).into_response())
}

pub(crate) async fn add_page(State(state): State<AppState>, current: CurrentUser) -> Result<Response> {
    let flashes = state.with_db(|db| db.take_flashes(&current.token))?;
    Ok(render::asset_form(
        &current.user,
        &flashes,
        "Add Asset",
        "/assets/add",
        &AssetForm::default(),
        None,
    )
    .into_response())
}

pub(crate) async fn add(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<AssetForm>,
) -> Result<Response> {
    let today = dates::today();
    let created = form
        .validate(state.code_re(), today)
        .and_then(|draft| state.with_db(|db| db.create_asset(&draft, current.name(), today)));

    match created {
        Ok(asset) => {
            state.flash(
                &current.token,
                Flash::success(format!("Asset {} added", asset.asset_code)),
            )?;
            Ok(Redirect::to(&format!("/assets/{}", asset.id)).into_response())
        }
        Err(e) if e.is_user_facing() => Ok(render::asset_form(
            &current.user,
            &[],
            "Add Asset",
            "/assets/add",
            &form,
            Some(&e.to_string()),
        )
        .into_response()),
        Err(e) => Err(e),
    }
}

pub(crate) async fn edit_page(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response> {
    let asset = state.with_db(|db| db.require_asset(id))?;
    if let Err(e) = asset.ensure_active("editing") {
        state.flash(&current.token, Flash::danger(e.to_string()))?;
        return Ok(Redirect::to(&format!("/assets/{id}")).into_response());
    }

    let flashes = state.with_db(|db| db.take_flashes(&current.token))?;
    Ok(render::asset_form(
        &current.user,
        &flashes,
        &format!("Edit {}", asset.asset_code),
        &format!("/assets/edit/{id}"),
        &AssetForm::from_asset(&asset),
        None,
    )
    .into_response())
}

pub(crate) async fn edit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<AssetForm>,
) -> Result<Response> {
    let today = dates::today();
    let asset = state.with_db(|db| db.require_asset(id))?;
    if let Err(e) = asset.ensure_active("editing") {
        state.flash(&current.token, Flash::danger(e.to_string()))?;
        return Ok(Redirect::to(&format!("/assets/{id}")).into_response());
    }

    let updated = form
        .validate(state.code_re(), today)
        .and_then(|draft| state.with_db(|db| db.update_asset(id, &draft, current.name(), today)));

    match updated {
        Ok(asset) => {
            state.flash(
                &current.token,
                Flash::success(format!("Asset {} updated", asset.asset_code)),
            )?;
            Ok(Redirect::to(&format!("/assets/{id}")).into_response())
        }
        Err(e) if e.is_user_facing() => Ok(render::asset_form(
            &current.user,
            &[],
            &format!("Edit {}", asset.asset_code),
            &format!("/assets/edit/{id}"),
            &form,
            Some(&e.to_string()),
        )
        .into_response()),
        Err(e) => Err(e),
    }
}

pub(crate) async fn detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response> {
    let today = dates::today();
    let status = &state.config().status;
    let (detail, flashes) = state.with_db(|db| {
        let asset = db.require_asset(id)?;
        let amcs = db.list_amcs(id)?;
        let calibrations = db.list_calibrations(id)?;
        let detail = AssetDetail {
            amc_status: asset_amc_status(&amcs, today, status.amc_warning_days),
            calibration_status: asset_calibration_status(
                calibrations.first(),
                today,
                status.calibration_warning_days,
            ),
            asset,
            amcs,
            calibrations,
            events: db.list_events(id)?,
            documents: db.list_documents(id)?,
        };
        Ok((detail, db.take_flashes(&current.token)?))
    })?;

    Ok(render::asset_detail(&current.user, &flashes, &detail, today, status).into_response())
}
