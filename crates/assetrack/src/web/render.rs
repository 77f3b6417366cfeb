//! Server-side HTML rendering.
//!
//! Pages are assembled with `format!`; every piece of user or database text
//! goes through [`escape`] first.

use std::fmt::Write as _;

use axum::http::StatusCode;
use axum::response::Html;
use chrono::NaiveDate;

use crate::amc::{Amc, AmcStatus};
use crate::asset::{Asset, AssetFilter, AssetForm, AssetStatus};
use crate::auth::{Flash, User};
use crate::calibration::{Calibration, CalibrationResult, CalibrationStatus};
use crate::dates::{form_value, format_indian};
use crate::document::{Document, DocumentKind};
use crate::event::{Event, EventKind};
use crate::import::{ImportPlan, RowAction};
use crate::storage::AssetOverview;

const STYLE: &str = "
body { font-family: sans-serif; margin: 0; color: #222; }
nav { background: #1f3a5f; color: #fff; padding: .6em 1em; display: flex; gap: 1em; }
nav a { color: #fff; }
nav .who { margin-left: auto; }
main { padding: 1em 2em; }
table { border-collapse: collapse; width: 100%; margin-bottom: 1.5em; }
th, td { border: 1px solid #ccc; padding: .35em .5em; text-align: left; }
th { background: #f0f3f7; }
.flash { padding: .6em 1em; margin-bottom: .6em; border-radius: 4px; }
.flash-success { background: #d4edda; }
.flash-info { background: #d1ecf1; }
.flash-warning { background: #fff3cd; }
.flash-danger { background: #f8d7da; }
.badge { padding: .1em .5em; border-radius: 3px; font-size: .9em; }
.badge-success { background: #d4edda; }
.badge-warning { background: #fff3cd; }
.badge-danger { background: #f8d7da; }
.badge-muted { background: #e2e3e5; }
form.inline { display: inline; }
fieldset { margin-bottom: 1.5em; }
label { display: block; margin: .3em 0; }
";

/// Escape text for HTML element content and attribute values.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn opt(text: Option<&str>) -> String {
    text.map_or_else(|| "-".to_string(), escape)
}

fn layout(title: &str, user: Option<&User>, flashes: &[Flash], body: &str) -> Html<String> {
    let nav = user.map_or_else(String::new, |user| {
        format!(
            r#"<nav><a href="/assets">Assets</a><a href="/assets/add">Add Asset</a><a href="/assets/import">Import</a><span class="who">{} ({}) <a href="/logout">Logout</a></span></nav>"#,
            escape(&user.username),
            user.role
        )
    });

    let mut messages = String::new();
    for flash in flashes {
        let _ = write!(
            messages,
            r#"<div class="flash flash-{}">{}</div>"#,
            flash.level.as_str(),
            escape(&flash.message)
        );
    }

    Html(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{} - Asset Tracker</title><style>{STYLE}</style></head>\
         <body>{nav}<main>{messages}<h1>{}</h1>{body}</main></body></html>",
        escape(title),
        escape(title)
    ))
}

fn badge(text: &str, class: &str) -> String {
    format!(r#"<span class="badge badge-{class}">{}</span>"#, escape(text))
}

fn amc_badge(status: Option<AmcStatus>) -> String {
    match status {
        Some(s @ AmcStatus::Active) => badge(&s.to_string(), "success"),
        Some(s @ AmcStatus::ExpiringSoon) => badge(&s.to_string(), "warning"),
        Some(s @ AmcStatus::Expired) => badge(&s.to_string(), "danger"),
        None => badge("No AMC", "muted"),
    }
}

fn calibration_badge(status: Option<CalibrationStatus>) -> String {
    match status {
        Some(s @ CalibrationStatus::Valid) => badge(&s.to_string(), "success"),
        Some(s @ CalibrationStatus::DueSoon) => badge(&s.to_string(), "warning"),
        Some(s @ CalibrationStatus::Overdue) => badge(&s.to_string(), "danger"),
        None => badge("Not Calibrated", "muted"),
    }
}

fn status_badge(status: AssetStatus) -> String {
    match status {
        AssetStatus::Active => badge("Active", "success"),
        AssetStatus::Scrapped => badge("Scrapped", "muted"),
    }
}

fn select(name: &str, options: &[String], selected: Option<&str>, blank: &str) -> String {
    let mut html = format!(r#"<select name="{name}"><option value="">{}</option>"#, escape(blank));
    for option in options {
        let chosen = if Some(option.as_str()) == selected {
            " selected"
        } else {
            ""
        };
        let value = escape(option);
        let _ = write!(html, r#"<option value="{value}"{chosen}>{value}</option>"#);
    }
    html.push_str("</select>");
    html
}

/// Login form.
pub(crate) fn login_page(error: Option<&str>, flashes: &[Flash]) -> Html<String> {
    let error = error.map_or_else(String::new, |e| {
        format!(r#"<div class="flash flash-danger">{}</div>"#, escape(e))
    });
    let body = format!(
        r#"{error}<form method="post" action="/login">
<label>Username <input name="username" autofocus required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Login</button></form>"#
    );
    layout("Login", None, flashes, &body)
}

/// Data for the asset master page.
#[derive(Debug)]
pub(crate) struct AssetListPage<'a> {
    pub rows: &'a [AssetOverview],
    pub filter: &'a AssetFilter,
    pub plants: &'a [String],
    pub departments: &'a [String],
}

/// Asset master with filters.
pub(crate) fn asset_list(user: &User, flashes: &[Flash], page: &AssetListPage<'_>) -> Html<String> {
    let statuses = [AssetStatus::Active.to_string(), AssetStatus::Scrapped.to_string()];
    let mut body = format!(
        r#"<form method="get" action="/assets">
<input name="search" placeholder="Code, name or serial" value="{}">
{} {} {}
<button type="submit">Filter</button> <a href="/assets">Clear</a></form>
<p>{} asset(s)</p>
<table><tr><th>Code</th><th>Name</th><th>Serial No</th><th>Plant</th><th>Department</th><th>Location</th><th>Status</th><th>AMC</th><th>Calibration</th></tr>"#,
        escape(page.filter.search_term().unwrap_or_default()),
        select("plant", page.plants, page.filter.plant(), "All plants"),
        select("department", page.departments, page.filter.department(), "All departments"),
        select(
            "status",
            &statuses,
            page.filter.status.as_deref().map(str::trim),
            "Any status"
        ),
        page.rows.len(),
    );

    for row in page.rows {
        let a = &row.asset;
        let _ = write!(
            body,
            r#"<tr><td><a href="/assets/{}">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
            a.id,
            escape(&a.asset_code),
            escape(&a.asset_name),
            opt(a.serial_no.as_deref()),
            opt(a.plant.as_deref()),
            opt(a.department.as_deref()),
            opt(a.location.as_deref()),
            status_badge(a.status),
            amc_badge(row.amc_status),
            calibration_badge(row.calibration_status),
        );
    }
    body.push_str("</table>");
    layout("Asset Master", Some(user), flashes, &body)
}

/// Add or edit form.
pub(crate) fn asset_form(
    user: &User,
    flashes: &[Flash],
    title: &str,
    action: &str,
    form: &AssetForm,
    error: Option<&str>,
) -> Html<String> {
    let error = error.map_or_else(String::new, |e| {
        format!(r#"<div class="flash flash-danger">{}</div>"#, escape(e))
    });
    let field = |label: &str, name: &str, value: &str, kind: &str| {
        format!(
            r#"<label>{label} <input name="{name}" type="{kind}" value="{}"></label>"#,
            escape(value)
        )
    };
    let body = format!(
        r#"{error}<form method="post" action="{}">{}{}{}{}{}{}{}<button type="submit">Save</button> <a href="/assets">Cancel</a></form>"#,
        escape(action),
        field("Asset Code *", "asset_code", &form.asset_code, "text"),
        field("Asset Name *", "asset_name", &form.asset_name, "text"),
        field("Serial No", "serial_no", &form.serial_no, "text"),
        field("Plant", "plant", &form.plant, "text"),
        field("Department", "department", &form.department, "text"),
        field("Location", "location", &form.location, "text"),
        field("Purchase Date", "purchase_date", &form.purchase_date, "date"),
    );
    layout(title, Some(user), flashes, &body)
}

/// Everything shown on the asset detail page.
#[derive(Debug)]
pub(crate) struct AssetDetail {
    pub asset: Asset,
    pub amc_status: Option<AmcStatus>,
    pub calibration_status: Option<CalibrationStatus>,
    pub amcs: Vec<Amc>,
    pub calibrations: Vec<Calibration>,
    pub events: Vec<Event>,
    pub documents: Vec<Document>,
}

fn summary_section(detail: &AssetDetail) -> String {
    let a = &detail.asset;
    let scrap = if a.is_scrapped() {
        format!(
            "<tr><th>Scrapped On</th><td>{}</td></tr><tr><th>Scrap Reason</th><td>{}</td></tr>",
            format_indian(a.scrapped_on),
            opt(a.scrap_reason.as_deref())
        )
    } else {
        String::new()
    };
    format!(
        r#"<table>
<tr><th>Asset Name</th><td>{}</td></tr>
<tr><th>Serial No</th><td>{}</td></tr>
<tr><th>Plant</th><td>{}</td></tr>
<tr><th>Department</th><td>{}</td></tr>
<tr><th>Location</th><td>{}</td></tr>
<tr><th>Purchase Date</th><td>{}</td></tr>
<tr><th>Status</th><td>{}</td></tr>
<tr><th>AMC</th><td>{}</td></tr>
<tr><th>Calibration</th><td>{}</td></tr>{scrap}
</table>"#,
        escape(&a.asset_name),
        opt(a.serial_no.as_deref()),
        opt(a.plant.as_deref()),
        opt(a.department.as_deref()),
        opt(a.location.as_deref()),
        format_indian(a.purchase_date),
        status_badge(a.status),
        amc_badge(detail.amc_status),
        calibration_badge(detail.calibration_status),
    )
}

fn amc_section(detail: &AssetDetail, today: NaiveDate, warning_days: u32, locked: bool) -> String {
    let mut html = String::from(
        "<h2>AMC Contracts</h2><table><tr><th>Vendor</th><th>Contract No</th><th>Period</th><th>Cost</th><th>Status</th><th>Notes</th></tr>",
    );
    for amc in &detail.amcs {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&amc.vendor),
            opt(amc.contract_no.as_deref()),
            amc.period(),
            amc.cost.map_or_else(|| "-".to_string(), |c| format!("{c:.2}")),
            amc_badge(Some(amc.status(today, warning_days))),
            opt(amc.notes.as_deref()),
        );
    }
    html.push_str("</table>");
    if !locked {
        let _ = write!(
            html,
            r#"<fieldset><legend>Add AMC</legend><form method="post" action="/assets/{}/amc">
<label>Vendor * <input name="vendor" required></label>
<label>Contract No <input name="contract_no"></label>
<label>Start Date * <input name="start_date" type="date" required></label>
<label>End Date * <input name="end_date" type="date" required></label>
<label>Cost <input name="cost"></label>
<label>Notes <input name="notes"></label>
<button type="submit">Add AMC</button></form></fieldset>"#,
            detail.asset.id
        );
    }
    html
}

fn calibration_section(
    detail: &AssetDetail,
    today: NaiveDate,
    warning_days: u32,
    locked: bool,
) -> String {
    let mut html = String::from(
        "<h2>Calibration History</h2><table><tr><th>Calibrated On</th><th>Next Due</th><th>Agency</th><th>Certificate No</th><th>Result</th><th>Status</th><th>Remarks</th></tr>",
    );
    for cal in &detail.calibrations {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            format_indian(Some(cal.calibrated_on)),
            format_indian(Some(cal.next_due_on)),
            opt(cal.agency.as_deref()),
            opt(cal.certificate_no.as_deref()),
            cal.result,
            calibration_badge(Some(cal.status(today, warning_days))),
            opt(cal.remarks.as_deref()),
        );
    }
    html.push_str("</table>");
    if !locked {
        let results: String = [
            CalibrationResult::Pass,
            CalibrationResult::Fail,
            CalibrationResult::Adjusted,
        ]
        .iter()
        .map(|r| format!(r#"<option value="{r}">{r}</option>"#))
        .collect();
        let _ = write!(
            html,
            r#"<fieldset><legend>Record Calibration</legend><form method="post" action="/assets/{}/calibrations">
<label>Calibration Date * <input name="calibrated_on" type="date" value="{}" required></label>
<label>Next Due Date * <input name="next_due_on" type="date" required></label>
<label>Agency <input name="agency"></label>
<label>Certificate No <input name="certificate_no"></label>
<label>Result <select name="result">{results}</select></label>
<label>Remarks <input name="remarks"></label>
<button type="submit">Record</button></form></fieldset>"#,
            detail.asset.id,
            form_value(Some(today)),
        );
    }
    html
}

fn event_section(detail: &AssetDetail, locked: bool) -> String {
    let mut html = String::from(
        "<h2>Events</h2><table><tr><th>Date</th><th>Type</th><th>Description</th><th>By</th></tr>",
    );
    for event in &detail.events {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            format_indian(Some(event.event_date)),
            event.kind.label(),
            escape(&event.description),
            opt(event.recorded_by.as_deref()),
        );
    }
    html.push_str("</table>");
    if !locked {
        let kinds: String = EventKind::MANUAL
            .iter()
            .map(|k| format!(r#"<option value="{}">{}</option>"#, k.as_str(), k.label()))
            .collect();
        let _ = write!(
            html,
            r#"<fieldset><legend>Log Event</legend><form method="post" action="/assets/{}/events">
<label>Type <select name="kind">{kinds}</select></label>
<label>Date <input name="event_date" type="date"></label>
<label>Description * <input name="description" required></label>
<button type="submit">Log Event</button></form></fieldset>"#,
            detail.asset.id
        );
    }
    html
}

fn document_section(detail: &AssetDetail, locked: bool) -> String {
    let mut html = String::from(
        "<h2>Documents</h2><table><tr><th>Type</th><th>File</th><th>Original Name</th><th>Size</th><th>Uploaded</th></tr>",
    );
    for doc in &detail.documents {
        let _ = write!(
            html,
            r#"<tr><td>{}</td><td><a href="/documents/{}/download">{}</a></td><td>{}</td><td>{} KB</td><td>{} by {}</td></tr>"#,
            doc.kind.label(),
            doc.id,
            escape(&doc.stored_name),
            escape(&doc.original_name),
            doc.size_bytes.div_ceil(1024),
            format_indian(Some(doc.uploaded_at.date_naive())),
            opt(doc.uploaded_by.as_deref()),
        );
    }
    html.push_str("</table>");
    if !locked {
        let kinds: String = DocumentKind::ALL
            .iter()
            .map(|k| format!(r#"<option value="{}">{}</option>"#, k.as_str(), k.label()))
            .collect();
        let _ = write!(
            html,
            r#"<fieldset><legend>Upload PDF</legend><form method="post" action="/assets/{}/documents" enctype="multipart/form-data">
<label>Type <select name="kind">{kinds}</select></label>
<label>File <input name="file" type="file" accept="application/pdf,.pdf" required></label>
<button type="submit">Upload</button></form></fieldset>"#,
            detail.asset.id
        );
    }
    html
}

fn scrap_section(detail: &AssetDetail, user: &User, today: NaiveDate) -> String {
    if detail.asset.is_scrapped() || !user.role.is_admin() {
        return String::new();
    }
    format!(
        r#"<fieldset><legend>Scrap Asset</legend><p>Scrapping locks the asset permanently.</p>
<form method="post" action="/assets/{}/scrap">
<label>Scrap Date <input name="scrapped_on" type="date" value="{}"></label>
<label>Reason * <input name="reason" required></label>
<button type="submit">Scrap</button></form></fieldset>"#,
        detail.asset.id,
        form_value(Some(today)),
    )
}

/// Asset detail page with history and action forms.
pub(crate) fn asset_detail(
    user: &User,
    flashes: &[Flash],
    detail: &AssetDetail,
    today: NaiveDate,
    status: &crate::config::StatusConfig,
) -> Html<String> {
    let locked = detail.asset.is_scrapped();
    let edit = if locked {
        "<p><strong>This asset is scrapped. Its records are read-only.</strong></p>".to_string()
    } else {
        format!(r#"<p><a href="/assets/edit/{}">Edit asset</a></p>"#, detail.asset.id)
    };
    let body = format!(
        "{edit}{}{}{}{}{}{}",
        summary_section(detail),
        amc_section(detail, today, status.amc_warning_days, locked),
        calibration_section(detail, today, status.calibration_warning_days, locked),
        event_section(detail, locked),
        document_section(detail, locked),
        scrap_section(detail, user, today),
    );
    layout(&detail.asset.asset_code, Some(user), flashes, &body)
}

fn import_form() -> &'static str {
    r#"<form method="post" action="/assets/import" enctype="multipart/form-data">
<label>Excel file (.xlsx) <input name="file" type="file" accept=".xlsx" required></label>
<button type="submit">Preview</button></form>
<p><a href="/assets/import/template">Download template</a></p>"#
}

/// Import upload page.
pub(crate) fn import_page(user: &User, flashes: &[Flash]) -> Html<String> {
    layout("Import Assets", Some(user), flashes, import_form())
}

/// Preview of a checked sheet.
pub(crate) fn import_preview(
    user: &User,
    flashes: &[Flash],
    plan: &ImportPlan,
) -> Html<String> {
    let mut body = String::new();
    let _ = write!(
        body,
        "<p>{} valid row(s): {} new, {} update(s). {} invalid row(s).</p>",
        plan.valid.len(),
        plan.creates(),
        plan.updates(),
        plan.invalid.len()
    );

    if !plan.invalid.is_empty() {
        body.push_str(
            "<h2>Invalid Rows</h2><table><tr><th>Row</th><th>Asset Code</th><th>Asset Name</th><th>Errors</th></tr>",
        );
        for row in &plan.invalid {
            let _ = write!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                row.row_no,
                escape(&row.asset_code),
                escape(&row.asset_name),
                escape(&row.errors.join("; "))
            );
        }
        body.push_str("</table>");
    }

    if !plan.valid.is_empty() {
        body.push_str(
            "<h2>Valid Rows</h2><table><tr><th>Row</th><th>Action</th><th>Asset Code</th><th>Asset Name</th><th>Plant</th><th>Department</th><th>Purchase Date</th></tr>",
        );
        for row in &plan.valid {
            let action = match row.action {
                RowAction::Create => "Create",
                RowAction::Update { .. } => "Update",
            };
            let d = &row.draft;
            let _ = write!(
                body,
                "<tr><td>{}</td><td>{action}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                row.row_no,
                escape(&d.asset_code),
                escape(&d.asset_name),
                opt(d.plant.as_deref()),
                opt(d.department.as_deref()),
                format_indian(d.purchase_date),
            );
        }
        body.push_str("</table>");
    }

    if plan.is_applicable() && !user.role.is_admin() {
        body.push_str("<p>Only a developer account can confirm an import.</p>");
    } else if plan.is_applicable() {
        body.push_str(
            r#"<form method="post" action="/assets/import/confirm"><button type="submit">Confirm Import</button></form>"#,
        );
    } else {
        body.push_str("<p>Fix the invalid rows and upload the file again.</p>");
        body.push_str(import_form());
    }
    layout("Import Preview", Some(user), flashes, &body)
}

/// Standalone error page.
pub(crate) fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let body = format!(
        r#"<p>{}</p><p><a href="/assets">Back to assets</a></p>"#,
        escape(message)
    );
    layout(
        status.canonical_reason().unwrap_or("Error"),
        None,
        &[],
        &body,
    )
}
