//! Annual maintenance contracts and their status labels.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::optional_text;
use crate::dates;
use crate::error::{Error, Result};

/// Where a contract stands relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AmcStatus {
    /// In force, or starting later, with more than the warning window left.
    Active,
    /// Ends within the warning window.
    ExpiringSoon,
    /// Ended before today.
    Expired,
}

impl AmcStatus {
    /// All labels in display order.
    pub const ALL: [Self; 3] = [Self::Active, Self::ExpiringSoon, Self::Expired];
}

impl std::fmt::Display for AmcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::ExpiringSoon => write!(f, "Expiring Soon"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

/// A maintenance contract attached to an asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Amc {
    /// Database id.
    pub id: i64,
    /// Owning asset.
    pub asset_id: i64,
    /// Service provider.
    pub vendor: String,
    /// Vendor's contract reference.
    pub contract_no: Option<String>,
    /// First covered day.
    pub start_date: NaiveDate,
    /// Last covered day.
    pub end_date: NaiveDate,
    /// Contract value.
    pub cost: Option<f64>,
    /// Free text.
    pub notes: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

impl Amc {
    /// Status of this contract on `today`.
    #[must_use]
    pub fn status(&self, today: NaiveDate, warning_days: u32) -> AmcStatus {
        status_for_end(self.end_date, today, warning_days)
    }

    /// Whether `date` falls inside the contract period.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Whether the period `[start, end]` shares at least one day with this contract.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end_date && self.start_date <= end
    }

    /// `DD/MM/YYYY - DD/MM/YYYY`.
    #[must_use]
    pub fn period(&self) -> String {
        format!(
            "{} - {}",
            dates::format_indian(Some(self.start_date)),
            dates::format_indian(Some(self.end_date))
        )
    }
}

fn status_for_end(end: NaiveDate, today: NaiveDate, warning_days: u32) -> AmcStatus {
    if end < today {
        AmcStatus::Expired
    } else if (end - today).num_days() <= i64::from(warning_days) {
        AmcStatus::ExpiringSoon
    } else {
        AmcStatus::Active
    }
}

/// Asset-level AMC status.
///
/// Uses the contract covering `today`; without one, the contract that ended
/// or ends last. `None` when there are no contracts.
#[must_use]
pub fn asset_amc_status(amcs: &[Amc], today: NaiveDate, warning_days: u32) -> Option<AmcStatus> {
    amcs.iter()
        .find(|amc| amc.covers(today))
        .or_else(|| amcs.iter().max_by_key(|amc| amc.end_date))
        .map(|amc| amc.status(today, warning_days))
}

/// First existing contract whose period overlaps `[start, end]`.
#[must_use]
pub fn find_overlap(existing: &[Amc], start: NaiveDate, end: NaiveDate) -> Option<&Amc> {
    existing.iter().find(|amc| amc.overlaps(start, end))
}

/// Raw AMC fields from the asset detail page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AmcForm {
    /// Service provider.
    pub vendor: String,
    /// Contract reference.
    pub contract_no: String,
    /// `YYYY-MM-DD` from a date input.
    pub start_date: String,
    /// `YYYY-MM-DD` from a date input.
    pub end_date: String,
    /// Decimal amount, or empty.
    pub cost: String,
    /// Free text.
    pub notes: String,
}

/// A validated contract, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAmc {
    /// Service provider.
    pub vendor: String,
    /// Contract reference.
    pub contract_no: Option<String>,
    /// First covered day.
    pub start_date: NaiveDate,
    /// Last covered day, inclusive.
    pub end_date: NaiveDate,
    /// Contract value.
    pub cost: Option<f64>,
    /// Free text.
    pub notes: Option<String>,
}

impl AmcForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing vendor, missing or reversed
    /// dates, or a cost that is not a non-negative number.
    pub fn validate(&self) -> Result<NewAmc> {
        let vendor = self.vendor.trim();
        if vendor.is_empty() {
            return Err(Error::validation("Vendor is required"));
        }
        let start_date = dates::require_form_date("Start Date", Some(&self.start_date))?;
        let end_date = dates::require_form_date("End Date", Some(&self.end_date))?;
        if end_date < start_date {
            return Err(Error::validation("End Date cannot be before Start Date"));
        }

        let cost = match optional_text(&self.cost) {
            None => None,
            Some(text) => match text.replace(',', "").parse::<f64>() {
                Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
                _ => return Err(Error::validation(format!("Invalid Cost: {text}"))),
            },
        };

        Ok(NewAmc {
            vendor: vendor.to_string(),
            contract_no: optional_text(&self.contract_no),
            start_date,
            end_date,
            cost,
            notes: optional_text(&self.notes),
        })
    }
}
