//! The per-asset event log.
//!
//! Events are append-only: once written they are never updated or deleted.
//! The database schema backs this with triggers.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::error::{Error, Result};

/// What happened to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Asset registered through the form.
    AssetCreated,
    /// Asset details edited.
    AssetUpdated,
    /// Asset retired.
    AssetScrapped,
    /// Maintenance contract added.
    AmcAdded,
    /// Calibration recorded.
    CalibrationRecorded,
    /// PDF attached.
    DocumentUploaded,
    /// Asset created or updated by a spreadsheet import.
    AssetImported,
    /// Machine broke down.
    Breakdown,
    /// Repair carried out.
    Repair,
    /// Asset moved.
    Relocation,
    /// Free-form remark.
    Note,
}

impl EventKind {
    /// Kinds an operator may log by hand.
    pub const MANUAL: [Self; 4] = [Self::Breakdown, Self::Repair, Self::Relocation, Self::Note];

    /// Whether an operator may log this kind by hand.
    #[must_use]
    pub fn is_manual(self) -> bool {
        Self::MANUAL.contains(&self)
    }

    /// Stable identifier stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssetCreated => "asset_created",
            Self::AssetUpdated => "asset_updated",
            Self::AssetScrapped => "asset_scrapped",
            Self::AmcAdded => "amc_added",
            Self::CalibrationRecorded => "calibration_recorded",
            Self::DocumentUploaded => "document_uploaded",
            Self::AssetImported => "asset_imported",
            Self::Breakdown => "breakdown",
            Self::Repair => "repair",
            Self::Relocation => "relocation",
            Self::Note => "note",
        }
    }

    /// Human label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AssetCreated => "Asset Created",
            Self::AssetUpdated => "Asset Updated",
            Self::AssetScrapped => "Asset Scrapped",
            Self::AmcAdded => "AMC Added",
            Self::CalibrationRecorded => "Calibration Recorded",
            Self::DocumentUploaded => "Document Uploaded",
            Self::AssetImported => "Imported",
            Self::Breakdown => "Breakdown",
            Self::Repair => "Repair",
            Self::Relocation => "Relocation",
            Self::Note => "Note",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        const ALL: [EventKind; 11] = [
            EventKind::AssetCreated,
            EventKind::AssetUpdated,
            EventKind::AssetScrapped,
            EventKind::AmcAdded,
            EventKind::CalibrationRecorded,
            EventKind::DocumentUploaded,
            EventKind::AssetImported,
            EventKind::Breakdown,
            EventKind::Repair,
            EventKind::Relocation,
            EventKind::Note,
        ];
        ALL.into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown event kind: {s}")))
    }
}

/// A stored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Row id.
    pub id: i64,
    /// Asset the event belongs to.
    pub asset_id: i64,
    /// What happened.
    pub kind: EventKind,
    /// Day the event happened (may differ from when it was logged).
    pub event_date: NaiveDate,
    /// Human-readable detail.
    pub description: String,
    /// Username of whoever logged it; `None` for CLI and system actions.
    pub recorded_by: Option<String>,
    /// When the event was stored.
    pub created_at: DateTime<Utc>,
}

/// An event about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// What happened.
    pub kind: EventKind,
    /// Day the event happened.
    pub event_date: NaiveDate,
    /// Human-readable detail.
    pub description: String,
    /// Username of whoever logged it.
    pub recorded_by: Option<String>,
}

impl NewEvent {
    /// Event dated `date` with the given description.
    #[must_use]
    pub fn new(
        kind: EventKind,
        event_date: NaiveDate,
        description: impl Into<String>,
        recorded_by: Option<&str>,
    ) -> Self {
        Self {
            kind,
            event_date,
            description: description.into(),
            recorded_by: recorded_by.map(str::to_string),
        }
    }
}

/// Manual event form from the asset detail page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventForm {
    /// One of the manual event kinds.
    pub kind: String,
    /// `YYYY-MM-DD`, or empty for today.
    pub event_date: String,
    /// What happened.
    pub description: String,
}

impl EventForm {
    /// Validate into a [`NewEvent`] attributed to `recorded_by`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for system-only kinds, blank descriptions
    /// and future dates.
    pub fn validate(&self, today: NaiveDate, recorded_by: Option<&str>) -> Result<NewEvent> {
        let kind: EventKind = self.kind.trim().parse()?;
        if !kind.is_manual() {
            return Err(Error::validation(format!(
                "{} events are recorded automatically",
                kind.label()
            )));
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(Error::validation("Description is required"));
        }
        let event_date = dates::parse_form_date("Event Date", Some(&self.event_date))?.unwrap_or(today);
        if event_date > today {
            return Err(Error::validation("Event Date cannot be in the future"));
        }
        Ok(NewEvent::new(kind, event_date, description, recorded_by))
    }
}
