//! Storage layer for assetrack.
//!
//! This module provides `SQLite`-based persistent storage for the asset
//! register and everything hanging off it: maintenance contracts,
//! calibrations, the event log, document metadata, users and sessions.
//!
//! Every write that changes an asset appends to the event log inside the
//! same transaction.

mod assets;
mod documents;
mod events;
mod import;
mod maintenance;
pub mod migrations;
pub mod schema;
mod users;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::amc::{asset_amc_status, AmcStatus};
use crate::asset::{Asset, AssetFilter, AssetStatus};
use crate::calibration::{asset_calibration_status, CalibrationStatus};
use crate::config::StatusConfig;
use crate::error::{Error, Result};

/// Storage engine for the asset register.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Assets matching `filter` together with their derived statuses.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_asset_overview(
        &self,
        filter: &AssetFilter,
        today: NaiveDate,
        status: &StatusConfig,
    ) -> Result<Vec<AssetOverview>> {
        let assets = self.list_assets(filter)?;
        let mut amcs = self.amcs_by_asset()?;
        let latest = self.latest_calibrations()?;

        Ok(assets
            .into_iter()
            .map(|asset| {
                let contracts = amcs.remove(&asset.id).unwrap_or_default();
                let amc_status = asset_amc_status(&contracts, today, status.amc_warning_days);
                let calibration_status = asset_calibration_status(
                    latest.get(&asset.id),
                    today,
                    status.calibration_warning_days,
                );
                AssetOverview {
                    asset,
                    amc_status,
                    calibration_status,
                }
            })
            .collect())
    }

    /// Get database statistics.
    ///
    /// AMC and calibration totals cover active assets only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self, today: NaiveDate, status: &StatusConfig) -> Result<StorageStats> {
        let overview = self.list_asset_overview(&AssetFilter::default(), today, status)?;

        let mut amc_counts: HashMap<AmcStatus, usize> = HashMap::new();
        let mut calibration_counts: HashMap<CalibrationStatus, usize> = HashMap::new();
        let mut stats = StorageStats::default();

        for row in &overview {
            if row.asset.status == AssetStatus::Scrapped {
                stats.scrapped_assets += 1;
                continue;
            }
            stats.active_assets += 1;
            match row.amc_status {
                Some(s) => *amc_counts.entry(s).or_default() += 1,
                None => stats.without_amc += 1,
            }
            match row.calibration_status {
                Some(s) => *calibration_counts.entry(s).or_default() += 1,
                None => stats.without_calibration += 1,
            }
        }

        stats.total_assets = overview.len();
        stats.amc = AmcStatus::ALL
            .into_iter()
            .map(|s| (s.to_string(), amc_counts.get(&s).copied().unwrap_or(0)))
            .collect();
        stats.calibration = CalibrationStatus::ALL
            .into_iter()
            .map(|s| (s.to_string(), calibration_counts.get(&s).copied().unwrap_or(0)))
            .collect();
        stats.documents = self.count_rows("documents")?;
        stats.events = self.count_rows("events")?;
        stats.users = self.count_rows("users")?;
        stats.db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(stats)
    }

    fn count_rows(&self, table: &'static str) -> Result<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }
}

/// An asset row on the master list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetOverview {
    /// The asset record.
    pub asset: Asset,
    /// `None` when the asset has no contracts.
    pub amc_status: Option<AmcStatus>,
    /// `None` when the asset was never calibrated.
    pub calibration_status: Option<CalibrationStatus>,
}

/// Statistics about the register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// All assets.
    pub total_assets: usize,
    /// Assets not scrapped.
    pub active_assets: usize,
    /// Scrapped assets.
    pub scrapped_assets: usize,
    /// Active assets per AMC status label, in display order.
    pub amc: Vec<(String, usize)>,
    /// Active assets without any contract.
    pub without_amc: usize,
    /// Active assets per calibration status label, in display order.
    pub calibration: Vec<(String, usize)>,
    /// Active assets never calibrated.
    pub without_calibration: usize,
    /// Stored documents.
    pub documents: i64,
    /// Logged events.
    pub events: i64,
    /// Accounts.
    pub users: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Read a text column through its `FromStr` impl.
pub(crate) fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
