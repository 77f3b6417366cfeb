//! Asset records and the validation applied to asset input.
//!
//! An asset is identified internally by its numeric id; the asset code is the
//! editable business key that operators and spreadsheets refer to.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::error::{Error, Result};

/// Lifecycle state of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetStatus {
    /// In service.
    Active,
    /// Permanently retired. Scrapping cannot be undone.
    Scrapped,
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Scrapped => write!(f, "Scrapped"),
        }
    }
}

impl FromStr for AssetStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Active" => Ok(Self::Active),
            "Scrapped" => Ok(Self::Scrapped),
            other => Err(Error::validation(format!("unknown asset status: {other}"))),
        }
    }
}

/// A tracked piece of plant equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    /// System id.
    pub id: i64,
    /// Unique business code.
    pub asset_code: String,
    /// Descriptive name.
    pub asset_name: String,
    /// Manufacturer serial number.
    pub serial_no: Option<String>,
    /// Plant the asset belongs to.
    pub plant: Option<String>,
    /// Owning department.
    pub department: Option<String>,
    /// Physical location within the plant.
    pub location: Option<String>,
    /// Date of purchase.
    pub purchase_date: Option<NaiveDate>,
    /// Lifecycle state.
    pub status: AssetStatus,
    /// When the asset was scrapped.
    pub scrapped_on: Option<NaiveDate>,
    /// Why the asset was scrapped.
    pub scrap_reason: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// Whether the asset has been scrapped.
    #[must_use]
    pub fn is_scrapped(&self) -> bool {
        self.status == AssetStatus::Scrapped
    }

    /// Fail with [`Error::AssetScrapped`] if the asset is scrapped.
    ///
    /// # Errors
    ///
    /// Returns an error naming `operation` when the asset is locked.
    pub fn ensure_active(&self, operation: &'static str) -> Result<()> {
        if self.is_scrapped() {
            return Err(Error::scrapped(&self.asset_code, operation));
        }
        Ok(())
    }
}

/// Raw asset fields as submitted by the add/edit forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssetForm {
    /// Unique code, the key for imports.
    pub asset_code: String,
    /// Display name.
    pub asset_name: String,
    /// Manufacturer serial number.
    pub serial_no: String,
    /// Plant the asset belongs to.
    pub plant: String,
    /// Owning department.
    pub department: String,
    /// Where the asset sits within the plant.
    pub location: String,
    /// `YYYY-MM-DD` from a date input, or empty.
    pub purchase_date: String,
}

/// Validated asset fields, ready to insert or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDraft {
    /// Unique code, trimmed.
    pub asset_code: String,
    /// Display name, never blank.
    pub asset_name: String,
    /// Manufacturer serial number.
    pub serial_no: Option<String>,
    /// Plant the asset belongs to.
    pub plant: Option<String>,
    /// Owning department.
    pub department: Option<String>,
    /// Where the asset sits within the plant.
    pub location: Option<String>,
    /// Date of purchase; never in the future.
    pub purchase_date: Option<NaiveDate>,
}

/// Trim a field, mapping blank input to `None`.
#[must_use]
pub fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Check a code and name pair, collecting every problem found.
pub(crate) fn check_identity(code: &str, name: &str, code_re: &Regex) -> Vec<String> {
    let mut errors = Vec::new();
    if code.is_empty() {
        errors.push("Missing Asset Code".to_string());
    } else if !code_re.is_match(code) {
        errors.push(format!("Invalid Asset Code: {code}"));
    }
    if name.is_empty() {
        errors.push("Missing Asset Name".to_string());
    }
    errors
}

/// Reject purchase dates after `today`.
pub(crate) fn check_purchase_date(date: Option<NaiveDate>, today: NaiveDate) -> Option<String> {
    date.filter(|d| *d > today)
        .map(|_| "Purchase Date cannot be in the future".to_string())
}

impl AssetForm {
    /// Validate the form into an [`AssetDraft`].
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every problem found.
    pub fn validate(&self, code_re: &Regex, today: NaiveDate) -> Result<AssetDraft> {
        let asset_code = self.asset_code.trim().to_string();
        let asset_name = self.asset_name.trim().to_string();
        let mut errors = check_identity(&asset_code, &asset_name, code_re);

        let purchase_date = match dates::parse_form_date("Purchase Date", Some(&self.purchase_date))
        {
            Ok(date) => date,
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };
        errors.extend(check_purchase_date(purchase_date, today));

        if !errors.is_empty() {
            return Err(Error::validation(errors.join("; ")));
        }

        Ok(AssetDraft {
            asset_code,
            asset_name,
            serial_no: optional_text(&self.serial_no),
            plant: optional_text(&self.plant),
            department: optional_text(&self.department),
            location: optional_text(&self.location),
            purchase_date,
        })
    }

    /// Prefill a form from an existing asset.
    #[must_use]
    pub fn from_asset(asset: &Asset) -> Self {
        Self {
            asset_code: asset.asset_code.clone(),
            asset_name: asset.asset_name.clone(),
            serial_no: asset.serial_no.clone().unwrap_or_default(),
            plant: asset.plant.clone().unwrap_or_default(),
            department: asset.department.clone().unwrap_or_default(),
            location: asset.location.clone().unwrap_or_default(),
            purchase_date: dates::form_value(asset.purchase_date),
        }
    }
}

/// Filters for the asset master list. Blank values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssetFilter {
    /// Case-insensitive substring of code, name or serial number.
    pub search: Option<String>,
    /// Exact plant.
    pub plant: Option<String>,
    /// Exact department.
    pub department: Option<String>,
    /// `Active` or `Scrapped`.
    pub status: Option<String>,
}

impl AssetFilter {
    /// The non-blank search term.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }

    /// The non-blank plant filter.
    #[must_use]
    pub fn plant(&self) -> Option<&str> {
        non_blank(self.plant.as_deref())
    }

    /// The non-blank department filter.
    #[must_use]
    pub fn department(&self) -> Option<&str> {
        non_blank(self.department.as_deref())
    }

    /// The status filter, if it names a known status.
    #[must_use]
    pub fn status(&self) -> Option<AssetStatus> {
        non_blank(self.status.as_deref()).and_then(|s| s.parse().ok())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Scrap request from the asset detail page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScrapForm {
    /// Why the asset is being retired.
    pub reason: String,
    /// `YYYY-MM-DD`; blank means today.
    pub scrapped_on: String,
}

impl ScrapForm {
    /// Validate into a `(date, reason)` pair.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank reason or a bad/future date.
    pub fn validate(&self, today: NaiveDate) -> Result<(NaiveDate, String)> {
        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(Error::validation("Scrap reason is required"));
        }
        let date = dates::parse_form_date("Scrap Date", Some(&self.scrapped_on))?.unwrap_or(today);
        if date > today {
            return Err(Error::validation("Scrap Date cannot be in the future"));
        }
        Ok((date, reason.to_string()))
    }
}
