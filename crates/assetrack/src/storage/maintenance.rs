//! Maintenance contracts and calibration history.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use tracing::info;

use super::assets::load_asset;
use super::events::insert_event;
use super::{parse_column, Storage};
use crate::amc::{find_overlap, Amc, NewAmc};
use crate::calibration::{Calibration, NewCalibration};
use crate::dates::format_indian;
use crate::error::{Error, Result};
use crate::event::{EventKind, NewEvent};

const AMC_COLUMNS: &str =
    "id, asset_id, vendor, contract_no, start_date, end_date, cost, notes, created_at";

const CALIBRATION_COLUMNS: &str = "id, asset_id, calibrated_on, next_due_on, agency, \
     certificate_no, result, remarks, created_at";

fn row_to_amc(row: &rusqlite::Row<'_>) -> rusqlite::Result<Amc> {
    Ok(Amc {
        id: row.get(0)?,
        asset_id: row.get(1)?,
        vendor: row.get(2)?,
        contract_no: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        cost: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn row_to_calibration(row: &rusqlite::Row<'_>) -> rusqlite::Result<Calibration> {
    Ok(Calibration {
        id: row.get(0)?,
        asset_id: row.get(1)?,
        calibrated_on: row.get(2)?,
        next_due_on: row.get(3)?,
        agency: row.get(4)?,
        certificate_no: row.get(5)?,
        result: parse_column(row, 6)?,
        remarks: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn amcs_for(conn: &Connection, asset_id: i64) -> Result<Vec<Amc>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AMC_COLUMNS} FROM amcs WHERE asset_id = ?1 ORDER BY start_date DESC, id DESC"
    ))?;
    let amcs = stmt
        .query_map([asset_id], row_to_amc)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(amcs)
}

impl Storage {
    /// Attach a maintenance contract to an asset.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `AssetScrapped`, or [`Error::AmcOverlap`] when the
    /// period shares a day with an existing contract.
    pub fn add_amc(
        &self,
        asset_id: i64,
        amc: &NewAmc,
        recorded_by: Option<&str>,
        today: NaiveDate,
    ) -> Result<Amc> {
        let tx = self.conn.unchecked_transaction()?;
        let asset = load_asset(&tx, asset_id)?;
        asset.ensure_active("adding an AMC")?;

        let existing = amcs_for(&tx, asset_id)?;
        if let Some(clash) = find_overlap(&existing, amc.start_date, amc.end_date) {
            return Err(Error::AmcOverlap {
                existing_id: clash.id,
                existing_period: clash.period(),
            });
        }

        tx.execute(
            r"
            INSERT INTO amcs (asset_id, vendor, contract_no, start_date, end_date, cost, notes,
                              created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                asset_id,
                amc.vendor,
                amc.contract_no,
                amc.start_date,
                amc.end_date,
                amc.cost,
                amc.notes,
                Utc::now(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        insert_event(
            &tx,
            asset_id,
            &NewEvent::new(
                EventKind::AmcAdded,
                today,
                format!(
                    "AMC with {} from {} to {}",
                    amc.vendor,
                    format_indian(Some(amc.start_date)),
                    format_indian(Some(amc.end_date))
                ),
                recorded_by,
            ),
        )?;
        tx.commit()?;

        info!("Added AMC {} for asset {}", id, asset.asset_code);
        self.list_amcs(asset_id)?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::internal(format!("AMC {id} vanished after insert")))
    }

    /// Contracts of an asset, latest start first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_amcs(&self, asset_id: i64) -> Result<Vec<Amc>> {
        amcs_for(&self.conn, asset_id)
    }

    /// All contracts grouped by asset id.
    pub(super) fn amcs_by_asset(&self) -> Result<HashMap<i64, Vec<Amc>>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {AMC_COLUMNS} FROM amcs"))?;
        let mut grouped: HashMap<i64, Vec<Amc>> = HashMap::new();
        for amc in stmt.query_map([], row_to_amc)? {
            let amc = amc?;
            grouped.entry(amc.asset_id).or_default().push(amc);
        }
        Ok(grouped)
    }

    /// Append a calibration record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `AssetScrapped`.
    pub fn record_calibration(
        &self,
        asset_id: i64,
        calibration: &NewCalibration,
        recorded_by: Option<&str>,
    ) -> Result<Calibration> {
        let tx = self.conn.unchecked_transaction()?;
        let asset = load_asset(&tx, asset_id)?;
        asset.ensure_active("recording a calibration")?;

        tx.execute(
            r"
            INSERT INTO calibrations (asset_id, calibrated_on, next_due_on, agency,
                                      certificate_no, result, remarks, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                asset_id,
                calibration.calibrated_on,
                calibration.next_due_on,
                calibration.agency,
                calibration.certificate_no,
                calibration.result.to_string(),
                calibration.remarks,
                Utc::now(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        let mut description = format!(
            "Calibration {}, next due {}",
            calibration.result,
            format_indian(Some(calibration.next_due_on))
        );
        if let Some(agency) = &calibration.agency {
            description.push_str(&format!(" ({agency})"));
        }
        insert_event(
            &tx,
            asset_id,
            &NewEvent::new(
                EventKind::CalibrationRecorded,
                calibration.calibrated_on,
                description,
                recorded_by,
            ),
        )?;
        tx.commit()?;

        info!("Recorded calibration {} for asset {}", id, asset.asset_code);
        self.list_calibrations(asset_id)?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::internal(format!("calibration {id} vanished after insert")))
    }

    /// Calibration history of an asset, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_calibrations(&self, asset_id: i64) -> Result<Vec<Calibration>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CALIBRATION_COLUMNS} FROM calibrations WHERE asset_id = ?1 \
             ORDER BY calibrated_on DESC, id DESC"
        ))?;
        let calibrations = stmt
            .query_map([asset_id], row_to_calibration)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(calibrations)
    }

    /// Most recent calibration per asset.
    pub(super) fn latest_calibrations(&self) -> Result<HashMap<i64, Calibration>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CALIBRATION_COLUMNS} FROM calibrations \
             ORDER BY asset_id, calibrated_on DESC, id DESC"
        ))?;
        let mut latest = HashMap::new();
        for calibration in stmt.query_map([], row_to_calibration)? {
            let calibration = calibration?;
            latest.entry(calibration.asset_id).or_insert(calibration);
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::calibration::CalibrationResult;

    fn contract(start: NaiveDate, end: NaiveDate) -> NewAmc {
        NewAmc {
            vendor: "Acme Services".to_string(),
            contract_no: Some("C-1".to_string()),
            start_date: start,
            end_date: end,
            cost: Some(45_000.0),
            notes: None,
        }
    }

    fn calibration(on: NaiveDate, due: NaiveDate) -> NewCalibration {
        NewCalibration {
            calibrated_on: on,
            next_due_on: due,
            agency: Some("NABL Lab".to_string()),
            certificate_no: None,
            result: CalibrationResult::Pass,
            remarks: None,
        }
    }

    #[test]
    fn test_add_amc_and_list() {
        let storage = storage();
        let a = asset(&storage, "A001");

        let amc = storage
            .add_amc(a.id, &contract(d(2026, 1, 1), d(2026, 12, 31)), Some("ravi"), today())
            .unwrap();
        assert_eq!(amc.vendor, "Acme Services");
        assert_eq!(amc.cost, Some(45_000.0));

        assert_eq!(storage.list_amcs(a.id).unwrap(), vec![amc]);
        let events = storage.list_events(a.id).unwrap();
        assert!(events.iter().any(|e| e.kind == EventKind::AmcAdded
            && e.description.contains("01/01/2026")));
    }

    #[test]
    fn test_overlapping_amc_rejected() {
        let storage = storage();
        let a = asset(&storage, "A001");
        let first = storage
            .add_amc(a.id, &contract(d(2026, 1, 1), d(2026, 12, 31)), None, today())
            .unwrap();

        let err = storage
            .add_amc(a.id, &contract(d(2026, 6, 1), d(2027, 5, 31)), None, today())
            .unwrap_err();
        assert!(matches!(err, Error::AmcOverlap { existing_id, .. } if existing_id == first.id));

        storage
            .add_amc(a.id, &contract(d(2027, 1, 1), d(2027, 12, 31)), None, today())
            .unwrap();
        let listed = storage.list_amcs(a.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].start_date, d(2027, 1, 1));
    }

    #[test]
    fn test_overlap_is_per_asset() {
        let storage = storage();
        let a = asset(&storage, "A001");
        let b = asset(&storage, "A002");
        let period = contract(d(2026, 1, 1), d(2026, 12, 31));

        storage.add_amc(a.id, &period, None, today()).unwrap();
        storage.add_amc(b.id, &period, None, today()).unwrap();
        assert_eq!(storage.amcs_by_asset().unwrap().len(), 2);
    }

    #[test]
    fn test_amc_on_scrapped_asset() {
        let storage = storage();
        let a = asset(&storage, "A001");
        storage.scrap_asset(a.id, today(), "sold", None).unwrap();

        let err = storage
            .add_amc(a.id, &contract(d(2026, 1, 1), d(2026, 12, 31)), None, today())
            .unwrap_err();
        assert!(matches!(err, Error::AssetScrapped { .. }));
        assert!(storage.list_amcs(a.id).unwrap().is_empty());
    }

    #[test]
    fn test_calibration_history_and_latest() {
        let storage = storage();
        let a = asset(&storage, "A001");

        storage
            .record_calibration(a.id, &calibration(d(2025, 1, 10), d(2026, 1, 10)), None)
            .unwrap();
        let newer = storage
            .record_calibration(a.id, &calibration(d(2026, 1, 9), d(2027, 1, 9)), None)
            .unwrap();

        let history = storage.list_calibrations(a.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], newer);

        let latest = storage.latest_calibrations().unwrap();
        assert_eq!(latest[&a.id].id, newer.id);

        let events = storage.list_events(a.id).unwrap();
        let logged = events
            .iter()
            .filter(|e| e.kind == EventKind::CalibrationRecorded)
            .count();
        assert_eq!(logged, 2);
    }

    #[test]
    fn test_calibration_on_scrapped_asset() {
        let storage = storage();
        let a = asset(&storage, "A001");
        storage.scrap_asset(a.id, today(), "sold", None).unwrap();

        let err = storage
            .record_calibration(a.id, &calibration(d(2026, 1, 1), d(2027, 1, 1)), None)
            .unwrap_err();
        assert!(matches!(err, Error::AssetScrapped { .. }));
    }

    #[test]
    fn test_unknown_asset() {
        let storage = storage();
        let err = storage
            .record_calibration(9, &calibration(d(2026, 1, 1), d(2027, 1, 1)), None)
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
