//! Bulk asset import from spreadsheets.
//!
//! Import happens in two steps. [`validate_sheet`] checks every row and
//! reconciles it against existing assets by asset code, producing an
//! [`ImportPlan`] that says which rows create and which rows update. Once
//! the operator confirms, the plan's rows are applied in a single database
//! transaction (see `Storage::apply_import`), so one failing row rolls back
//! the whole batch.

pub mod xlsx;

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::asset::{check_identity, check_purchase_date, optional_text, AssetDraft};
use crate::dates;
use crate::error::{Error, Result};

/// Header text of the purchase date column.
pub const PURCHASE_DATE_HEADER: &str = "Purchase Date (DD/MM/YYYY)";

/// Template columns, in order.
pub const TEMPLATE_COLUMNS: [&str; 7] = [
    "Asset Code",
    "Asset Name",
    "Serial No",
    "Plant",
    "Department",
    "Location",
    PURCHASE_DATE_HEADER,
];

/// Message for rows with an unparseable purchase date.
pub const INVALID_DATE_MESSAGE: &str = "Invalid Purchase Date (DD/MM/YYYY or DD-MM-YYYY)";

static EMPTY_CELL: Cell = Cell::Empty;

/// A single spreadsheet cell, reduced to what the importer cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Blank cell.
    Empty,
    /// Text cell.
    Text(String),
    /// Numeric cell (codes like `1001` are often typed as numbers).
    Number(f64),
    /// A cell the spreadsheet already parsed as a date.
    Date(NaiveDate),
}

impl Cell {
    /// Whether the cell holds nothing but whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Date(_) => false,
        }
    }

    /// Trimmed text of the cell; integral numbers lose their `.0`.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Date(d) => dates::format_indian(Some(*d)),
        }
    }
}

/// A header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    /// Header cells of the first row.
    pub headers: Vec<String>,
    /// Data rows below the header.
    pub rows: Vec<Vec<Cell>>,
}

/// What confirming a row will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RowAction {
    /// Insert a new asset.
    Create,
    /// Overwrite the fields of an existing asset.
    Update {
        /// Id of the asset matched by code.
        asset_id: i64,
    },
}

/// A row that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    /// Spreadsheet row number (header is row 1).
    pub row_no: usize,
    /// Validated asset fields.
    pub draft: AssetDraft,
    /// Create or update.
    pub action: RowAction,
}

/// A row that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// Spreadsheet row number (header is row 1).
    pub row_no: usize,
    /// Code as written in the sheet.
    pub asset_code: String,
    /// Name as written in the sheet.
    pub asset_name: String,
    /// Every problem found in the row.
    pub errors: Vec<String>,
}

/// Validation result for a whole sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPlan {
    /// Rows ready to apply.
    pub valid: Vec<ImportRow>,
    /// Rows with errors.
    pub invalid: Vec<RejectedRow>,
}

impl ImportPlan {
    /// Only a plan without rejected rows may be applied.
    #[must_use]
    pub fn is_applicable(&self) -> bool {
        self.invalid.is_empty() && !self.valid.is_empty()
    }

    /// Number of rows that will create assets.
    #[must_use]
    pub fn creates(&self) -> usize {
        self.valid
            .iter()
            .filter(|r| r.action == RowAction::Create)
            .count()
    }

    /// Number of rows that will update assets.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.valid.len() - self.creates()
    }
}

/// Counts returned after a plan has been applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Assets inserted.
    pub created: usize,
    /// Assets overwritten.
    pub updated: usize,
}

/// How an asset code already in the register affects an import row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingAsset {
    /// Id of the asset with this code.
    pub id: i64,
    /// Whether that asset is scrapped.
    pub scrapped: bool,
}

/// Outcome of checking a sheet that has the right shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetOutcome {
    /// At least one row was checked.
    Checked(ImportPlan),
    /// The sheet has a header row and nothing below it.
    NoDataRows,
    /// The sheet had data rows but all of them were blank.
    AllRowsEmpty,
}

impl SheetOutcome {
    /// Warning shown when there is nothing to preview.
    #[must_use]
    pub fn empty_message(&self) -> Option<&'static str> {
        match self {
            Self::Checked(_) => None,
            Self::NoDataRows => Some(
                "Excel file contains no data rows. Please add asset data below the header.",
            ),
            Self::AllRowsEmpty => Some(
                "All rows in the file are empty. Please enter asset details and try again.",
            ),
        }
    }
}

/// Check a parsed sheet against the register.
///
/// `existing` maps asset codes to their current records.
///
/// # Errors
///
/// Returns [`Error::Spreadsheet`] when the sheet lacks template columns.
/// Row-level problems never fail the call; they end up in
/// [`ImportPlan::invalid`].
pub fn validate_sheet(
    sheet: &Sheet,
    existing: &HashMap<String, ExistingAsset>,
    code_re: &Regex,
    today: NaiveDate,
) -> Result<SheetOutcome> {
    if sheet.rows.is_empty() {
        return Ok(SheetOutcome::NoDataRows);
    }

    let positions: HashMap<&str, usize> = sheet
        .headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim(), i))
        .collect();
    let missing: Vec<&str> = TEMPLATE_COLUMNS
        .iter()
        .copied()
        .filter(|c| !positions.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Spreadsheet(format!(
            "Missing columns: {}",
            missing.join(", ")
        )));
    }
    let column: [usize; 7] = TEMPLATE_COLUMNS.map(|c| positions[c]);

    let mut plan = ImportPlan::default();
    let mut seen = HashSet::new();

    for (idx, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(Cell::is_blank) {
            continue;
        }
        let cell = |col: usize| row.get(column[col]).unwrap_or(&EMPTY_CELL);
        let row_no = idx + 2;

        let asset_code = cell(0).text();
        let asset_name = cell(1).text();
        let mut errors = check_identity(&asset_code, &asset_name, code_re);

        let mut action = RowAction::Create;
        if !asset_code.is_empty() {
            if !seen.insert(asset_code.clone()) {
                errors.push("Duplicate Asset Code in file".to_string());
            }
            match existing.get(&asset_code) {
                Some(found) if found.scrapped => errors.push("Asset is scrapped".to_string()),
                Some(found) => action = RowAction::Update { asset_id: found.id },
                None => {}
            }
        }

        let purchase_date = match cell(6) {
            Cell::Empty => None,
            Cell::Date(d) => Some(*d),
            other if other.is_blank() => None,
            other => {
                let parsed = dates::parse_indian_date(&other.text());
                if parsed.is_none() {
                    errors.push(INVALID_DATE_MESSAGE.to_string());
                }
                parsed
            }
        };
        errors.extend(check_purchase_date(purchase_date, today));

        if errors.is_empty() {
            plan.valid.push(ImportRow {
                row_no,
                draft: AssetDraft {
                    asset_code,
                    asset_name,
                    serial_no: optional_text(&cell(2).text()),
                    plant: optional_text(&cell(3).text()),
                    department: optional_text(&cell(4).text()),
                    location: optional_text(&cell(5).text()),
                    purchase_date,
                },
                action,
            });
        } else {
            plan.invalid.push(RejectedRow {
                row_no,
                asset_code,
                asset_name,
                errors,
            });
        }
    }

    if plan.valid.is_empty() && plan.invalid.is_empty() {
        return Ok(SheetOutcome::AllRowsEmpty);
    }
    Ok(SheetOutcome::Checked(plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CODE_PATTERN;

    fn code_re() -> Regex {
        Regex::new(DEFAULT_CODE_PATTERN).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn text(s: &str) -> Cell {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    fn sheet(rows: &[[&str; 7]]) -> Sheet {
        Sheet {
            headers: TEMPLATE_COLUMNS.iter().map(|h| (*h).to_string()).collect(),
            rows: rows.iter().map(|r| r.iter().map(|c| text(c)).collect()).collect(),
        }
    }

    fn checked(outcome: SheetOutcome) -> ImportPlan {
        match outcome {
            SheetOutcome::Checked(plan) => plan,
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_rows_create() {
        let s = sheet(&[
            ["A001", "Hydraulic Press", "HP-8891", "Plant-1", "Production", "Line-3", "17/01/2026"],
            ["A002", "Lathe", "", "", "", "", ""],
        ]);
        let plan = checked(validate_sheet(&s, &HashMap::new(), &code_re(), today()).unwrap());

        assert!(plan.invalid.is_empty());
        assert_eq!(plan.valid.len(), 2);
        assert_eq!(plan.valid[0].row_no, 2);
        assert_eq!(plan.valid[0].action, RowAction::Create);
        assert_eq!(
            plan.valid[0].draft.purchase_date,
            NaiveDate::from_ymd_opt(2026, 1, 17)
        );
        assert_eq!(plan.valid[1].draft.serial_no, None);
        assert!(plan.is_applicable());
        assert_eq!(plan.creates(), 2);
    }

    #[test]
    fn test_existing_code_becomes_update() {
        let mut existing = HashMap::new();
        existing.insert("A001".to_string(), ExistingAsset { id: 9, scrapped: false });
        existing.insert("A002".to_string(), ExistingAsset { id: 10, scrapped: true });

        let s = sheet(&[
            ["A001", "Press", "", "", "", "", ""],
            ["A002", "Old Lathe", "", "", "", "", ""],
        ]);
        let plan = checked(validate_sheet(&s, &existing, &code_re(), today()).unwrap());

        assert_eq!(plan.valid.len(), 1);
        assert_eq!(plan.valid[0].action, RowAction::Update { asset_id: 9 });
        assert_eq!(plan.updates(), 1);
        assert_eq!(plan.invalid[0].errors, vec!["Asset is scrapped".to_string()]);
        assert!(!plan.is_applicable());
    }

    #[test]
    fn test_row_errors() {
        let s = sheet(&[
            ["", "No code", "", "", "", "", ""],
            ["A003", "", "", "", "", "", "2026-01-17"],
            ["A004", "Drill", "", "", "", "", "01/04/2026"],
            ["A004", "Drill again", "", "", "", "", ""],
        ]);
        let plan = checked(validate_sheet(&s, &HashMap::new(), &code_re(), today()).unwrap());

        assert_eq!(plan.valid.len(), 0);
        assert_eq!(plan.invalid.len(), 4);
        assert_eq!(plan.invalid[0].errors, vec!["Missing Asset Code".to_string()]);
        assert!(plan.invalid[1].errors.contains(&"Missing Asset Name".to_string()));
        assert!(plan.invalid[1].errors.contains(&INVALID_DATE_MESSAGE.to_string()));
        assert_eq!(
            plan.invalid[2].errors,
            vec!["Purchase Date cannot be in the future".to_string()]
        );
        assert_eq!(
            plan.invalid[3].errors,
            vec!["Duplicate Asset Code in file".to_string()]
        );
        assert_eq!(plan.invalid[3].row_no, 5);
    }

    #[test]
    fn test_blank_rows_skipped_and_numbered() {
        let s = sheet(&[
            ["", "", "", "", "", "", ""],
            ["A005", "Crane", "", "", "", "", "05-11-2024"],
        ]);
        let plan = checked(validate_sheet(&s, &HashMap::new(), &code_re(), today()).unwrap());
        assert_eq!(plan.valid.len(), 1);
        assert_eq!(plan.valid[0].row_no, 3);
        assert_eq!(
            plan.valid[0].draft.purchase_date,
            NaiveDate::from_ymd_opt(2024, 11, 5)
        );
    }

    #[test]
    fn test_all_rows_empty() {
        let s = sheet(&[["", "", "", "", "", "", ""], ["  ", "", "", "", "", "", ""]]);
        let outcome = validate_sheet(&s, &HashMap::new(), &code_re(), today()).unwrap();
        assert_eq!(outcome, SheetOutcome::AllRowsEmpty);
    }

    #[test]
    fn test_no_data_rows() {
        let s = sheet(&[]);
        let outcome = validate_sheet(&s, &HashMap::new(), &code_re(), today()).unwrap();
        assert_eq!(outcome, SheetOutcome::NoDataRows);
        assert!(outcome.empty_message().unwrap().contains("no data rows"));
    }

    #[test]
    fn test_missing_columns_in_template_order() {
        let s = Sheet {
            headers: vec!["Asset Name".to_string(), "Asset Code".to_string()],
            rows: vec![vec![text("Press"), text("A001")]],
        };
        let err = validate_sheet(&s, &HashMap::new(), &code_re(), today()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing columns: Serial No, Plant, Department, Location, Purchase Date (DD/MM/YYYY)"
        );
    }

    #[test]
    fn test_columns_matched_by_header_not_position() {
        let mut headers: Vec<String> = TEMPLATE_COLUMNS.iter().map(|h| format!(" {h} ")).collect();
        headers.reverse();
        let s = Sheet {
            headers,
            rows: vec![vec![
                Cell::Date(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()),
                text("Bay 2"),
                text("Maintenance"),
                text("Plant-2"),
                Cell::Number(778_812.0),
                text("Compressor"),
                Cell::Number(1001.0),
            ]],
        };
        let plan = checked(validate_sheet(&s, &HashMap::new(), &code_re(), today()).unwrap());
        let draft = &plan.valid[0].draft;
        assert_eq!(draft.asset_code, "1001");
        assert_eq!(draft.serial_no.as_deref(), Some("778812"));
        assert_eq!(draft.location.as_deref(), Some("Bay 2"));
        assert_eq!(draft.purchase_date, NaiveDate::from_ymd_opt(2025, 5, 1));
    }

    #[test]
    fn test_plan_survives_json() {
        let s = sheet(&[["A001", "Press", "", "", "", "", ""]]);
        let plan = checked(validate_sheet(&s, &HashMap::new(), &code_re(), today()).unwrap());
        let json = serde_json::to_string(&plan.valid).unwrap();
        let back: Vec<ImportRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan.valid);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(Cell::Number(42.0).text(), "42");
        assert_eq!(Cell::Number(4.5).text(), "4.5");
        assert_eq!(Cell::Text("  x ".to_string()).text(), "x");
        assert!(Cell::Text("   ".to_string()).is_blank());
        assert!(!Cell::Number(0.0).is_blank());
    }
}
