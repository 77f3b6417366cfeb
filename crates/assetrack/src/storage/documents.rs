//! Document metadata. File bytes live in a [`crate::document::BlobStore`].

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::assets::load_asset;
use super::events::insert_event;
use super::{parse_column, Storage};
use crate::asset::Asset;
use crate::document::{stored_name, Document, DocumentKind, NewDocument};
use crate::error::{Error, Result};
use crate::event::{EventKind, NewEvent};

const DOCUMENT_COLUMNS: &str = "id, asset_id, kind, original_name, stored_name, size_bytes, \
     content_hash, uploaded_by, uploaded_at";

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        asset_id: row.get(1)?,
        kind: parse_column(row, 2)?,
        original_name: row.get(3)?,
        stored_name: row.get(4)?,
        size_bytes: u64::try_from(row.get::<_, i64>(5)?).unwrap_or(0),
        content_hash: row.get(6)?,
        uploaded_by: row.get(7)?,
        uploaded_at: row.get(8)?,
    })
}

fn name_taken(conn: &Connection, asset_id: i64, name: &str) -> Result<bool> {
    let taken = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE asset_id = ?1 AND stored_name = ?2)",
        params![asset_id, name],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// Reject a name or content already recorded for the asset.
fn check_unique(conn: &Connection, asset_id: i64, name: &str, hash: &str) -> Result<()> {
    let same_content: Option<String> = conn
        .query_row(
            "SELECT stored_name FROM documents WHERE asset_id = ?1 AND content_hash = ?2",
            params![asset_id, hash],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(existing_name) = same_content {
        return Err(Error::DuplicateDocument { existing_name });
    }

    if name_taken(conn, asset_id, name)? {
        return Err(Error::DocumentExists {
            stored_name: name.to_string(),
        });
    }
    Ok(())
}

impl Storage {
    /// Check that an upload may proceed and compute its stored name.
    ///
    /// Called before any bytes are written.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `AssetScrapped`, `DuplicateDocument` or
    /// `DocumentExists`.
    pub fn prepare_upload(
        &self,
        asset_id: i64,
        kind: DocumentKind,
        original_name: &str,
        content_hash: &str,
    ) -> Result<(Asset, String)> {
        let asset = load_asset(&self.conn, asset_id)?;
        asset.ensure_active("uploading documents")?;
        let name = stored_name(&asset.asset_code, kind, original_name);
        check_unique(&self.conn, asset_id, &name, content_hash)?;
        Ok((asset, name))
    }

    /// Record a document whose bytes have been stored.
    ///
    /// The checks of [`Storage::prepare_upload`] are repeated inside the
    /// transaction.
    ///
    /// # Errors
    ///
    /// Same as [`Storage::prepare_upload`].
    pub fn record_document(
        &self,
        asset_id: i64,
        document: &NewDocument,
        today: NaiveDate,
    ) -> Result<Document> {
        let tx = self.conn.unchecked_transaction()?;
        let asset = load_asset(&tx, asset_id)?;
        asset.ensure_active("uploading documents")?;
        check_unique(&tx, asset_id, &document.stored_name, &document.content_hash)?;

        tx.execute(
            r"
            INSERT INTO documents (asset_id, kind, original_name, stored_name, size_bytes,
                                   content_hash, uploaded_by, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                asset_id,
                document.kind.as_str(),
                document.original_name,
                document.stored_name,
                i64::try_from(document.size_bytes).unwrap_or(i64::MAX),
                document.content_hash,
                document.uploaded_by,
                Utc::now(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        insert_event(
            &tx,
            asset_id,
            &NewEvent::new(
                EventKind::DocumentUploaded,
                today,
                format!("Uploaded {}: {}", document.kind.label(), document.stored_name),
                document.uploaded_by.as_deref(),
            ),
        )?;
        tx.commit()?;

        info!(
            "Recorded document {} for asset {}",
            document.stored_name, asset.asset_code
        );
        self.get_document(id)?
            .ok_or_else(|| Error::internal(format!("document {id} vanished after insert")))
    }

    /// Whether a document with this stored name is recorded for the asset.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn document_recorded(&self, asset_id: i64, stored_name: &str) -> Result<bool> {
        name_taken(&self.conn, asset_id, stored_name)
    }

    /// Get document metadata by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let document = self
            .conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                [id],
                row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    /// Documents of an asset, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_documents(&self, asset_id: i64) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE asset_id = ?1 \
             ORDER BY id DESC"
        ))?;
        let documents = stmt
            .query_map([asset_id], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }
}
