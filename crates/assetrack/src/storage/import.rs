//! Applying a checked import batch.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::assets::{changed_fields, code_owner, insert_asset_row, load_asset, update_asset_row};
use super::events::insert_event;
use super::Storage;
use crate::error::{Error, Result};
use crate::event::{EventKind, NewEvent};
use crate::import::{ImportRow, ImportSummary, RowAction};

impl Storage {
    /// Apply every row in one transaction.
    ///
    /// The register may have changed since the rows were checked, so each
    /// row is re-checked; any failure rolls the whole batch back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Import`] naming the first failing row.
    pub fn apply_import(
        &self,
        rows: &[ImportRow],
        recorded_by: Option<&str>,
        today: NaiveDate,
    ) -> Result<ImportSummary> {
        if rows.is_empty() {
            return Err(Error::Import("no rows to import".to_string()));
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut summary = ImportSummary::default();

        for row in rows {
            let code = &row.draft.asset_code;
            let fail = |reason: String| Error::Import(format!("row {}: {reason}", row.row_no));

            let (asset_id, description) = match row.action {
                RowAction::Create => {
                    if code_owner(&tx, code)?.is_some() {
                        return Err(fail(format!("Asset Code {code} already exists")));
                    }
                    let id = insert_asset_row(&tx, &row.draft)?;
                    summary.created += 1;
                    (id, format!("Created from import (row {})", row.row_no))
                }
                RowAction::Update { asset_id } => {
                    let current = match load_asset(&tx, asset_id) {
                        Ok(asset) => asset,
                        Err(e) if e.is_not_found() => {
                            return Err(fail(format!("Asset Code {code} no longer exists")));
                        }
                        Err(e) => return Err(e),
                    };
                    if current.asset_code != *code {
                        return Err(fail(format!("Asset Code {code} changed since preview")));
                    }
                    if current.is_scrapped() {
                        return Err(fail(format!("Asset {code} is scrapped")));
                    }
                    let changed = changed_fields(&current, &row.draft);
                    update_asset_row(&tx, asset_id, &row.draft)?;
                    summary.updated += 1;
                    let detail = if changed.is_empty() {
                        "no changes".to_string()
                    } else {
                        changed.join(", ")
                    };
                    (
                        asset_id,
                        format!("Updated from import (row {}): {detail}", row.row_no),
                    )
                }
            };

            insert_event(
                &tx,
                asset_id,
                &NewEvent::new(EventKind::AssetImported, today, description, recorded_by),
            )
            .inspect_err(|e| warn!("Import row {} failed: {}", row.row_no, e))?;
        }

        tx.commit()?;
        info!(
            "Imported {} new and {} updated assets",
            summary.created, summary.updated
        );
        Ok(summary)
    }
}
