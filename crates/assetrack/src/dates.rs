//! Date parsing and display helpers.
//!
//! The plant works with Indian day-first dates (`DD/MM/YYYY`), while HTML date
//! inputs submit ISO `YYYY-MM-DD`. Both are funnelled through here.

use chrono::{Local, NaiveDate};

use crate::error::{Error, Result};

/// Day-first formats accepted from spreadsheets and free text.
const INDIAN_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y"];

/// Format used by HTML `<input type="date">`.
const FORM_FORMAT: &str = "%Y-%m-%d";

/// Today's date in the server's local time zone.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Render a date as `DD/MM/YYYY`, or `-` when absent.
#[must_use]
pub fn format_indian(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.format("%d/%m/%Y").to_string())
}

/// Parse `DD/MM/YYYY` or `DD-MM-YYYY`.
#[must_use]
pub fn parse_indian_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    INDIAN_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Parse an optional form date (`YYYY-MM-DD`). Blank input means "no date".
///
/// # Errors
///
/// Returns a validation error naming `field` if the text is not a valid date.
pub fn parse_form_date(field: &str, text: Option<&str>) -> Result<Option<NaiveDate>> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, FORM_FORMAT)
            .map(Some)
            .map_err(|_| Error::validation(format!("Invalid {field}: {value}"))),
    }
}

/// Parse a form date that must be present.
///
/// # Errors
///
/// Returns a validation error if the field is blank or malformed.
pub fn require_form_date(field: &str, text: Option<&str>) -> Result<NaiveDate> {
    parse_form_date(field, text)?.ok_or_else(|| Error::validation(format!("{field} is required")))
}

/// Value for an HTML date input (`YYYY-MM-DD`), empty when absent.
#[must_use]
pub fn form_value(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(FORM_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_format_indian() {
        assert_eq!(format_indian(Some(d(2026, 1, 17))), "17/01/2026");
        assert_eq!(format_indian(None), "-");
    }

    #[test]
    fn test_parse_indian_slash_and_dash() {
        assert_eq!(parse_indian_date("17/01/2026"), Some(d(2026, 1, 17)));
        assert_eq!(parse_indian_date("17-01-2026"), Some(d(2026, 1, 17)));
        assert_eq!(parse_indian_date("  05/11/2024 "), Some(d(2024, 11, 5)));
    }

    #[test]
    fn test_parse_indian_rejects_other_formats() {
        assert_eq!(parse_indian_date("2026-01-17"), None);
        assert_eq!(parse_indian_date("31/02/2026"), None);
        assert_eq!(parse_indian_date("01/13/2026"), None);
        assert_eq!(parse_indian_date(""), None);
        assert_eq!(parse_indian_date("yesterday"), None);
    }

    #[test]
    fn test_parse_form_date() {
        assert_eq!(
            parse_form_date("Purchase Date", Some("2025-03-09")).unwrap(),
            Some(d(2025, 3, 9))
        );
        assert_eq!(parse_form_date("Purchase Date", Some("")).unwrap(), None);
        assert_eq!(parse_form_date("Purchase Date", None).unwrap(), None);

        let err = parse_form_date("Purchase Date", Some("09/03/2025")).unwrap_err();
        assert!(err.to_string().contains("Invalid Purchase Date"));
    }

    #[test]
    fn test_require_form_date() {
        let err = require_form_date("Start Date", Some(" ")).unwrap_err();
        assert_eq!(err.to_string(), "Start Date is required");
        assert_eq!(
            require_form_date("Start Date", Some("2026-04-01")).unwrap(),
            d(2026, 4, 1)
        );
    }

    #[test]
    fn test_form_value() {
        assert_eq!(form_value(Some(d(2026, 4, 1))), "2026-04-01");
        assert_eq!(form_value(None), "");
    }
}
