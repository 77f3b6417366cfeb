//! Asset register queries and writes.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use super::events::insert_event;
use super::{parse_column, Storage};
use crate::asset::{Asset, AssetDraft, AssetFilter, AssetStatus};
use crate::error::{Error, Result};
use crate::event::{EventKind, NewEvent};
use crate::import::ExistingAsset;

pub(super) const ASSET_COLUMNS: &str = "id, asset_code, asset_name, serial_no, plant, department, \
     location, purchase_date, status, scrapped_on, scrap_reason, created_at, updated_at";

pub(super) fn row_to_asset(row: &rusqlite::Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        asset_code: row.get(1)?,
        asset_name: row.get(2)?,
        serial_no: row.get(3)?,
        plant: row.get(4)?,
        department: row.get(5)?,
        location: row.get(6)?,
        purchase_date: row.get(7)?,
        status: parse_column(row, 8)?,
        scrapped_on: row.get(9)?,
        scrap_reason: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Load an asset or fail with `NotFound`.
pub(super) fn load_asset(conn: &Connection, id: i64) -> Result<Asset> {
    conn.query_row(
        &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?1"),
        [id],
        row_to_asset,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("asset", id))
}

/// Id of the asset holding `code`, if any.
pub(super) fn code_owner(conn: &Connection, code: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM assets WHERE asset_code = ?1",
            [code],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub(super) fn insert_asset_row(conn: &Connection, draft: &AssetDraft) -> Result<i64> {
    let now = Utc::now();
    conn.execute(
        r"
        INSERT INTO assets (asset_code, asset_name, serial_no, plant, department, location,
                            purchase_date, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        ",
        params![
            draft.asset_code,
            draft.asset_name,
            draft.serial_no,
            draft.plant,
            draft.department,
            draft.location,
            draft.purchase_date,
            AssetStatus::Active.to_string(),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn update_asset_row(conn: &Connection, id: i64, draft: &AssetDraft) -> Result<()> {
    conn.execute(
        r"
        UPDATE assets
        SET asset_code = ?2, asset_name = ?3, serial_no = ?4, plant = ?5, department = ?6,
            location = ?7, purchase_date = ?8, updated_at = ?9
        WHERE id = ?1
        ",
        params![
            id,
            draft.asset_code,
            draft.asset_name,
            draft.serial_no,
            draft.plant,
            draft.department,
            draft.location,
            draft.purchase_date,
            Utc::now(),
        ],
    )?;
    Ok(())
}

/// Names of the fields `draft` would change on `asset`.
pub(super) fn changed_fields(asset: &Asset, draft: &AssetDraft) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if asset.asset_code != draft.asset_code {
        changed.push("Asset Code");
    }
    if asset.asset_name != draft.asset_name {
        changed.push("Asset Name");
    }
    if asset.serial_no != draft.serial_no {
        changed.push("Serial No");
    }
    if asset.plant != draft.plant {
        changed.push("Plant");
    }
    if asset.department != draft.department {
        changed.push("Department");
    }
    if asset.location != draft.location {
        changed.push("Location");
    }
    if asset.purchase_date != draft.purchase_date {
        changed.push("Purchase Date");
    }
    changed
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl Storage {
    /// Register a new asset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateAssetCode`] if the code is taken.
    pub fn create_asset(
        &self,
        draft: &AssetDraft,
        recorded_by: Option<&str>,
        today: NaiveDate,
    ) -> Result<Asset> {
        let tx = self.conn.unchecked_transaction()?;
        if code_owner(&tx, &draft.asset_code)?.is_some() {
            return Err(Error::DuplicateAssetCode(draft.asset_code.clone()));
        }

        let id = insert_asset_row(&tx, draft)?;
        insert_event(
            &tx,
            id,
            &NewEvent::new(
                EventKind::AssetCreated,
                today,
                format!("Registered {} ({})", draft.asset_code, draft.asset_name),
                recorded_by,
            ),
        )?;
        let asset = load_asset(&tx, id)?;
        tx.commit()?;

        info!("Created asset {} with id {}", asset.asset_code, id);
        Ok(asset)
    }

    /// Overwrite the descriptive fields of an asset. Status is untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `AssetScrapped`, or `DuplicateAssetCode` when the
    /// new code belongs to another asset.
    pub fn update_asset(
        &self,
        id: i64,
        draft: &AssetDraft,
        recorded_by: Option<&str>,
        today: NaiveDate,
    ) -> Result<Asset> {
        let tx = self.conn.unchecked_transaction()?;
        let current = load_asset(&tx, id)?;
        current.ensure_active("editing")?;

        if let Some(owner) = code_owner(&tx, &draft.asset_code)? {
            if owner != id {
                return Err(Error::DuplicateAssetCode(draft.asset_code.clone()));
            }
        }

        let changed = changed_fields(&current, draft);
        if changed.is_empty() {
            debug!("No changes for asset {}", current.asset_code);
            return Ok(current);
        }

        update_asset_row(&tx, id, draft)?;
        insert_event(
            &tx,
            id,
            &NewEvent::new(
                EventKind::AssetUpdated,
                today,
                format!("Updated {}", changed.join(", ")),
                recorded_by,
            ),
        )?;
        let asset = load_asset(&tx, id)?;
        tx.commit()?;

        info!("Updated asset {} ({})", asset.asset_code, changed.join(", "));
        Ok(asset)
    }

    /// Retire an asset. This cannot be undone.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, a validation error for a blank reason, or
    /// `AssetScrapped` if it is already scrapped.
    pub fn scrap_asset(
        &self,
        id: i64,
        scrapped_on: NaiveDate,
        reason: &str,
        recorded_by: Option<&str>,
    ) -> Result<Asset> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::validation("Scrap reason is required"));
        }

        let tx = self.conn.unchecked_transaction()?;
        let current = load_asset(&tx, id)?;
        current.ensure_active("scrapping")?;

        tx.execute(
            r"
            UPDATE assets
            SET status = ?2, scrapped_on = ?3, scrap_reason = ?4, updated_at = ?5
            WHERE id = ?1
            ",
            params![
                id,
                AssetStatus::Scrapped.to_string(),
                scrapped_on,
                reason,
                Utc::now(),
            ],
        )?;
        insert_event(
            &tx,
            id,
            &NewEvent::new(
                EventKind::AssetScrapped,
                scrapped_on,
                format!("Scrapped: {reason}"),
                recorded_by,
            ),
        )?;
        let asset = load_asset(&tx, id)?;
        tx.commit()?;

        info!("Scrapped asset {}", asset.asset_code);
        Ok(asset)
    }

    /// Get an asset by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_asset(&self, id: i64) -> Result<Option<Asset>> {
        match load_asset(&self.conn, id) {
            Ok(asset) => Ok(Some(asset)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get an asset by id or fail with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or a database error.
    pub fn require_asset(&self, id: i64) -> Result<Asset> {
        load_asset(&self.conn, id)
    }

    /// Get an asset by its code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_by_code(&self, code: &str) -> Result<Option<Asset>> {
        let asset = self
            .conn
            .query_row(
                &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE asset_code = ?1"),
                [code.trim()],
                row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    /// Assets matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(term) = filter.search_term() {
            values.push(format!("%{}%", escape_like(term)));
            let n = values.len();
            clauses.push(format!(
                "(asset_code LIKE ?{n} ESCAPE '\\' OR asset_name LIKE ?{n} ESCAPE '\\' \
                 OR serial_no LIKE ?{n} ESCAPE '\\')"
            ));
        }
        if let Some(plant) = filter.plant() {
            values.push(plant.to_string());
            clauses.push(format!("plant = ?{}", values.len()));
        }
        if let Some(department) = filter.department() {
            values.push(department.to_string());
            clauses.push(format!("department = ?{}", values.len()));
        }
        if let Some(status) = filter.status() {
            values.push(status.to_string());
            clauses.push(format!("status = ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT {ASSET_COLUMNS} FROM assets {where_clause} ORDER BY id");
        debug!("Listing assets: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let assets = stmt
            .query_map(params_from_iter(values.iter()), row_to_asset)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(assets)
    }

    /// Distinct plants, for the filter drop-down.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn plants(&self) -> Result<Vec<String>> {
        self.distinct_values("plant")
    }

    /// Distinct departments, for the filter drop-down.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn departments(&self) -> Result<Vec<String>> {
        self.distinct_values("department")
    }

    fn distinct_values(&self, column: &'static str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM assets WHERE {column} IS NOT NULL ORDER BY {column}"
        ))?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(values)
    }

    /// Every asset code in the register, for import reconciliation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn existing_codes(&self) -> Result<HashMap<String, ExistingAsset>> {
        let mut stmt = self
            .conn
            .prepare("SELECT asset_code, id, status FROM assets")?;
        let rows = stmt
            .query_map([], |row| {
                let status: AssetStatus = parse_column(row, 2)?;
                Ok((
                    row.get::<_, String>(0)?,
                    ExistingAsset {
                        id: row.get(1)?,
                        scrapped: status == AssetStatus::Scrapped,
                    },
                ))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }
}
