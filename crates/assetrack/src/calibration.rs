//! Calibration history and due-date status.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::optional_text;
use crate::dates;
use crate::error::{Error, Result};

/// Outcome recorded on the calibration certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalibrationResult {
    /// Within tolerance as found.
    Pass,
    /// Out of tolerance.
    Fail,
    /// Brought back into tolerance by the agency.
    Adjusted,
}

impl std::fmt::Display for CalibrationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "Pass"),
            Self::Fail => write!(f, "Fail"),
            Self::Adjusted => write!(f, "Adjusted"),
        }
    }
}

impl FromStr for CalibrationResult {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Pass" => Ok(Self::Pass),
            "Fail" => Ok(Self::Fail),
            "Adjusted" => Ok(Self::Adjusted),
            other => Err(Error::validation(format!(
                "unknown calibration result: {other}"
            ))),
        }
    }
}

/// Whether an asset's calibration is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CalibrationStatus {
    /// Next due date is outside the warning window.
    Valid,
    /// Next due date is within the warning window.
    DueSoon,
    /// Next due date has passed.
    Overdue,
}

impl CalibrationStatus {
    /// All labels in display order.
    pub const ALL: [Self; 3] = [Self::Valid, Self::DueSoon, Self::Overdue];
}

impl std::fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "Valid"),
            Self::DueSoon => write!(f, "Due Soon"),
            Self::Overdue => write!(f, "Overdue"),
        }
    }
}

/// One calibration performed on an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calibration {
    /// Row id.
    pub id: i64,
    /// Asset the record belongs to.
    pub asset_id: i64,
    /// Day the calibration was done.
    pub calibrated_on: NaiveDate,
    /// Day the next calibration is due.
    pub next_due_on: NaiveDate,
    /// Calibrating agency.
    pub agency: Option<String>,
    /// Certificate reference.
    pub certificate_no: Option<String>,
    /// Pass or fail.
    pub result: CalibrationResult,
    /// Free text.
    pub remarks: Option<String>,
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
}

impl Calibration {
    /// Status implied by this record's next due date.
    #[must_use]
    pub fn status(&self, today: NaiveDate, warning_days: u32) -> CalibrationStatus {
        if self.next_due_on < today {
            CalibrationStatus::Overdue
        } else if (self.next_due_on - today).num_days() <= i64::from(warning_days) {
            CalibrationStatus::DueSoon
        } else {
            CalibrationStatus::Valid
        }
    }
}

/// Asset-level status from the most recent calibration, if any.
#[must_use]
pub fn asset_calibration_status(
    latest: Option<&Calibration>,
    today: NaiveDate,
    warning_days: u32,
) -> Option<CalibrationStatus> {
    latest.map(|c| c.status(today, warning_days))
}

/// Raw calibration fields from the asset detail page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CalibrationForm {
    /// `YYYY-MM-DD` from a date input.
    pub calibrated_on: String,
    /// `YYYY-MM-DD` from a date input.
    pub next_due_on: String,
    /// Calibrating agency.
    pub agency: String,
    /// Certificate reference.
    pub certificate_no: String,
    /// `pass` or `fail`.
    pub result: String,
    /// Free text.
    pub remarks: String,
}

/// A validated calibration, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalibration {
    /// Day the calibration was done.
    pub calibrated_on: NaiveDate,
    /// Day the next calibration is due, after `calibrated_on`.
    pub next_due_on: NaiveDate,
    /// Calibrating agency.
    pub agency: Option<String>,
    /// Certificate reference.
    pub certificate_no: Option<String>,
    /// Pass or fail.
    pub result: CalibrationResult,
    /// Free text.
    pub remarks: Option<String>,
}

impl CalibrationForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error for missing dates, a future calibration
    /// date, a due date not after the calibration date, or an unknown result.
    pub fn validate(&self, today: NaiveDate) -> Result<NewCalibration> {
        let calibrated_on = dates::require_form_date("Calibration Date", Some(&self.calibrated_on))?;
        let next_due_on = dates::require_form_date("Next Due Date", Some(&self.next_due_on))?;

        if calibrated_on > today {
            return Err(Error::validation("Calibration Date cannot be in the future"));
        }
        if next_due_on <= calibrated_on {
            return Err(Error::validation(
                "Next Due Date must be after the Calibration Date",
            ));
        }

        Ok(NewCalibration {
            calibrated_on,
            next_due_on,
            agency: optional_text(&self.agency),
            certificate_no: optional_text(&self.certificate_no),
            result: self.result.parse()?,
            remarks: optional_text(&self.remarks),
        })
    }
}
