//! Append-only event log.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{parse_column, Storage};
use crate::error::{Error, Result};
use crate::event::{Event, NewEvent};

const EVENT_COLUMNS: &str =
    "id, asset_id, kind, event_date, description, recorded_by, created_at";

/// Append an event on `conn`, which may be an open transaction.
pub(super) fn insert_event(conn: &Connection, asset_id: i64, event: &NewEvent) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO events (asset_id, kind, event_date, description, recorded_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            asset_id,
            event.kind.as_str(),
            event.event_date,
            event.description,
            event.recorded_by,
            Utc::now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        asset_id: row.get(1)?,
        kind: parse_column(row, 2)?,
        event_date: row.get(3)?,
        description: row.get(4)?,
        recorded_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Storage {
    /// Log a manual event (breakdown, repair, relocation or note).
    ///
    /// # Errors
    ///
    /// Returns a validation error for system-only kinds, `NotFound` for an
    /// unknown asset, or `AssetScrapped` if the asset is retired.
    pub fn add_manual_event(&self, asset_id: i64, event: &NewEvent) -> Result<Event> {
        if !event.kind.is_manual() {
            return Err(Error::validation(format!(
                "{} events are recorded automatically",
                event.kind.label()
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let asset = super::assets::load_asset(&tx, asset_id)?;
        asset.ensure_active("logging events")?;
        let id = insert_event(&tx, asset_id, event)?;
        tx.commit()?;

        info!(
            "Logged {} event {} for asset {}",
            event.kind, id, asset.asset_code
        );
        self.get_event(id)?
            .ok_or_else(|| Error::internal(format!("event {id} vanished after insert")))
    }

    /// Get an event by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_event(&self, id: i64) -> Result<Option<Event>> {
        let event = self
            .conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                [id],
                row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    /// Events of an asset, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_events(&self, asset_id: i64) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE asset_id = ?1 \
             ORDER BY event_date DESC, id DESC"
        ))?;
        let events = stmt
            .query_map([asset_id], row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::event::EventKind;

    use super::*;

    #[test]
    fn test_asset_creation_logs_event() {
        let storage = storage();
        let a = asset(&storage, "A001");

        let events = storage.list_events(a.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::AssetCreated);
        assert_eq!(events[0].recorded_by.as_deref(), Some("tester"));
    }

    #[test]
    fn test_manual_event_newest_first() {
        let storage = storage();
        let a = asset(&storage, "A001");

        storage
            .add_manual_event(
                a.id,
                &NewEvent::new(EventKind::Breakdown, d(2026, 2, 10), "Motor tripped", None),
            )
            .unwrap();
        let repair = storage
            .add_manual_event(
                a.id,
                &NewEvent::new(EventKind::Repair, d(2026, 2, 11), "Motor rewound", Some("ravi")),
            )
            .unwrap();

        assert_eq!(repair.kind, EventKind::Repair);
        let events = storage.list_events(a.id).unwrap();
        assert_eq!(events.len(), 3);
        // registration is dated today, after both manual events
        assert_eq!(events[0].kind, EventKind::AssetCreated);
        assert_eq!(events[1].id, repair.id);
        assert_eq!(events[2].kind, EventKind::Breakdown);
    }

    #[test]
    fn test_manual_event_rejects_system_kind() {
        let storage = storage();
        let a = asset(&storage, "A001");
        let err = storage
            .add_manual_event(
                a.id,
                &NewEvent::new(EventKind::AssetScrapped, today(), "nope", None),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_manual_event_on_scrapped_asset() {
        let storage = storage();
        let a = asset(&storage, "A001");
        storage.scrap_asset(a.id, today(), "obsolete", None).unwrap();

        let err = storage
            .add_manual_event(a.id, &NewEvent::new(EventKind::Note, today(), "late", None))
            .unwrap_err();
        assert!(matches!(err, Error::AssetScrapped { .. }));
    }

    #[test]
    fn test_events_cannot_be_changed() {
        let storage = storage();
        let a = asset(&storage, "A001");
        let id = storage.list_events(a.id).unwrap()[0].id;

        let update = storage
            .conn
            .execute("UPDATE events SET description = 'edited' WHERE id = ?1", [id]);
        assert!(update.unwrap_err().to_string().contains("immutable"));

        let delete = storage.conn.execute("DELETE FROM events WHERE id = ?1", [id]);
        assert!(delete.unwrap_err().to_string().contains("immutable"));

        assert_ne!(storage.get_event(id).unwrap().unwrap().description, "edited");
    }

    #[test]
    fn test_unknown_asset() {
        let storage = storage();
        let err = storage
            .add_manual_event(99, &NewEvent::new(EventKind::Note, today(), "x", None))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
