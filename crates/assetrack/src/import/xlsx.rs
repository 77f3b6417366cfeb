//! Reading import workbooks and producing the blank template.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};

use super::{Cell, Sheet, TEMPLATE_COLUMNS};
use crate::error::{Error, Result};

/// File name offered for the template download.
pub const TEMPLATE_FILE_NAME: &str = "ACM_Asset_Import_Template.xlsx";

/// MIME type of `.xlsx` files.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const TEMPLATE_SHEET_NAME: &str = "Asset Import Template";
const TEMPLATE_COLUMN_WIDTH: f64 = 22.0;
const EXAMPLE_ROW: [&str; 7] = [
    "A001",
    "Hydraulic Press",
    "HP-8891",
    "Plant-1",
    "Production",
    "Line-3",
    "17/01/2026",
];

/// Whether an uploaded file name looks like an `.xlsx` workbook.
#[must_use]
pub fn is_xlsx_name(name: &str) -> bool {
    name.trim().to_ascii_lowercase().ends_with(".xlsx")
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        #[allow(clippy::cast_precision_loss)]
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or_else(|| Cell::Number(dt.as_f64()), |d| Cell::Date(d.date())),
        Data::DateTimeIso(s) => chrono::NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d")
            .map_or_else(|_| Cell::Text(s.clone()), Cell::Date),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Parse the first worksheet of an `.xlsx` file.
///
/// The first non-empty row is taken as the header row.
///
/// # Errors
///
/// Returns [`Error::Spreadsheet`] if the bytes are not a readable workbook
/// or the workbook has no worksheet.
pub fn read_sheet(bytes: &[u8]) -> Result<Sheet> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Spreadsheet("Workbook contains no worksheets.".to_string()))??;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|row| row.iter().map(|c| to_cell(c).text()).collect())
        .unwrap_or_default();
    let rows = rows.map(|row| row.iter().map(to_cell).collect()).collect();

    Ok(Sheet { headers, rows })
}

/// Build the import template workbook.
///
/// # Errors
///
/// Returns an error if the workbook cannot be serialized.
pub fn template_bytes() -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(TEMPLATE_SHEET_NAME)?;

    for (col, header) in (0u16..).zip(TEMPLATE_COLUMNS) {
        sheet.write_string_with_format(0, col, header, &bold)?;
        sheet.set_column_width(col, TEMPLATE_COLUMN_WIDTH)?;
    }
    for (col, value) in (0u16..).zip(EXAMPLE_ROW) {
        sheet.write_string(1, col, value)?;
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use regex::Regex;

    use super::*;
    use crate::config::DEFAULT_CODE_PATTERN;
    use crate::import::{validate_sheet, RowAction, SheetOutcome};

    #[test]
    fn test_is_xlsx_name() {
        assert!(is_xlsx_name("assets.xlsx"));
        assert!(is_xlsx_name("ASSETS.XLSX "));
        assert!(!is_xlsx_name("assets.xls"));
        assert!(!is_xlsx_name("assets.csv"));
    }

    #[test]
    fn test_template_reads_back() {
        let bytes = template_bytes().unwrap();
        let sheet = read_sheet(&bytes).unwrap();

        assert_eq!(sheet.headers, TEMPLATE_COLUMNS.map(String::from).to_vec());
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][0], Cell::Text("A001".to_string()));
    }

    #[test]
    fn test_template_example_row_is_importable() {
        let sheet = read_sheet(&template_bytes().unwrap()).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let re = Regex::new(DEFAULT_CODE_PATTERN).unwrap();

        let SheetOutcome::Checked(plan) = validate_sheet(&sheet, &HashMap::new(), &re, today).unwrap()
        else {
            panic!("expected checked rows");
        };
        assert!(plan.is_applicable());
        assert_eq!(plan.valid[0].action, RowAction::Create);
        assert_eq!(plan.valid[0].draft.asset_name, "Hydraulic Press");
    }

    #[test]
    fn test_read_sheet_rejects_garbage() {
        let err = read_sheet(b"definitely not a zip archive").unwrap_err();
        assert!(err.to_string().contains("Unable to read Excel file"));
    }

    #[test]
    fn test_to_cell_conversions() {
        assert_eq!(to_cell(&Data::Empty), Cell::Empty);
        assert_eq!(to_cell(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(
            to_cell(&Data::DateTimeIso("2025-05-01T00:00:00".to_string())),
            Cell::Date(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap())
        );
    }
}
