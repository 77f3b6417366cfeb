//! PDF upload and download.

use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use super::{flash_outcome, AppState, CurrentUser};
use crate::dates;
use crate::document::{content_hash, validate_pdf, Document, DocumentKind, NewDocument};
use crate::error::{Error, Result};

/// A file part pulled out of a multipart body.
#[derive(Debug, Default)]
pub(crate) struct Upload {
    pub kind: Option<String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Collect the `kind` and `file` fields of an upload form.
pub(crate) async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    let bad_body = |e: axum::extract::multipart::MultipartError| {
        Error::InvalidDocument(format!("could not read upload: {}", e.body_text()))
    };

    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "kind" => upload.kind = Some(field.text().await.map_err(bad_body)?),
            "file" => {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.bytes = field.bytes().await.map_err(bad_body)?.to_vec();
            }
            _ => {}
        }
    }
    Ok(upload)
}

/// Write a new file, clearing one left behind by an upload that never got
/// its database record.
async fn put_blob(state: &AppState, asset_id: i64, name: &str, bytes: &[u8]) -> Result<()> {
    match state.blobs().put_new(asset_id, name, bytes).await {
        Err(Error::DocumentExists { stored_name }) => {
            if state.with_db(|db| db.document_recorded(asset_id, name))? {
                return Err(Error::DocumentExists { stored_name });
            }
            warn!("Replacing unrecorded file {} for asset {}", name, asset_id);
            state.blobs().remove(asset_id, name).await?;
            state.blobs().put_new(asset_id, name, bytes).await
        }
        other => other,
    }
}

async fn store_document(
    state: &AppState,
    current: &CurrentUser,
    asset_id: i64,
    multipart: Multipart,
) -> Result<Document> {
    let upload = read_upload(multipart).await?;
    let kind: DocumentKind = upload
        .kind
        .as_deref()
        .unwrap_or(DocumentKind::Other.as_str())
        .parse()?;
    validate_pdf(&upload.file_name, &upload.bytes, state.config().max_upload_bytes())?;

    let hash = content_hash(&upload.bytes);
    let _uploading = state.lock_uploads().await;
    let (_, stored_name) =
        state.with_db(|db| db.prepare_upload(asset_id, kind, &upload.file_name, &hash))?;

    put_blob(state, asset_id, &stored_name, &upload.bytes).await?;

    let new = NewDocument {
        kind,
        original_name: upload.file_name.clone(),
        stored_name: stored_name.clone(),
        size_bytes: upload.bytes.len() as u64,
        content_hash: hash,
        uploaded_by: current.name().map(str::to_string),
    };
    match state.with_db(|db| db.record_document(asset_id, &new, dates::today())) {
        Ok(document) => Ok(document),
        Err(e) => {
            if let Err(cleanup) = state.blobs().remove(asset_id, &stored_name).await {
                warn!("Failed to remove orphaned file {}: {}", stored_name, cleanup);
            }
            Err(e)
        }
    }
}

pub(crate) async fn upload(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response> {
    let outcome = store_document(&state, &current, id, multipart).await;
    flash_outcome(
        &state,
        &current.token,
        outcome,
        |doc| format!("Uploaded {}", doc.stored_name),
        &format!("/assets/{id}"),
    )
}

pub(crate) async fn download(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response> {
    let document = state
        .with_db(|db| db.get_document(id))?
        .ok_or_else(|| Error::not_found("document", id))?;

    let bytes = match state
        .blobs()
        .read(document.asset_id, &document.stored_name)
        .await
    {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Document {} has no readable file: {}", document.stored_name, e);
            return Err(Error::not_found("document", id));
        }
    };

    info!("Serving {}", document.stored_name);
    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.stored_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
