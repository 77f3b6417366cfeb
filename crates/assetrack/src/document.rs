//! PDF documents attached to assets.
//!
//! Uploads are checked to be real PDFs, given a deterministic stored name
//! derived from the asset code and document kind, and written with
//! create-new semantics so an existing file is never replaced.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Characters outside this set are replaced in stored file names.
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex is valid")
});

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Longest stem kept from the uploaded file name.
const MAX_STEM_CHARS: usize = 80;

/// What a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DocumentKind {
    /// Purchase invoice.
    Invoice,
    /// Warranty card or letter.
    Warranty,
    /// AMC contract copy.
    AmcContract,
    /// Calibration certificate.
    CalibrationCertificate,
    /// Operating or service manual.
    Manual,
    /// Anything else.
    Other,
}

impl DocumentKind {
    /// All kinds in display order.
    pub const ALL: [Self; 6] = [
        Self::Invoice,
        Self::Warranty,
        Self::AmcContract,
        Self::CalibrationCertificate,
        Self::Manual,
        Self::Other,
    ];

    /// Stable identifier, also used in stored file names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Warranty => "warranty",
            Self::AmcContract => "amc_contract",
            Self::CalibrationCertificate => "calibration_certificate",
            Self::Manual => "manual",
            Self::Other => "other",
        }
    }

    /// Human label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::Warranty => "Warranty",
            Self::AmcContract => "AMC Contract",
            Self::CalibrationCertificate => "Calibration Certificate",
            Self::Manual => "Manual",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| Error::validation(format!("unknown document type: {s}")))
    }
}

/// Metadata of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Row id.
    pub id: i64,
    /// Asset the document is attached to.
    pub asset_id: i64,
    /// What the document is.
    pub kind: DocumentKind,
    /// File name as uploaded.
    pub original_name: String,
    /// File name on disk, unique per asset.
    pub stored_name: String,
    /// Size of the file in bytes.
    pub size_bytes: u64,
    /// BLAKE3 hex digest of the content.
    pub content_hash: String,
    /// Username of the uploader.
    pub uploaded_by: Option<String>,
    /// When the upload was recorded.
    pub uploaded_at: DateTime<Utc>,
}

/// A document about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    /// What the document is.
    pub kind: DocumentKind,
    /// File name as uploaded.
    pub original_name: String,
    /// File name on disk.
    pub stored_name: String,
    /// Size of the file in bytes.
    pub size_bytes: u64,
    /// BLAKE3 hex digest of the content.
    pub content_hash: String,
    /// Username of the uploader.
    pub uploaded_by: Option<String>,
}

/// Strip any client-side directory from an uploaded file name.
fn base_name(original_name: &str) -> &str {
    original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name)
        .trim()
}

/// Check that an upload is a non-empty PDF within the size limit.
///
/// # Errors
///
/// Returns [`Error::InvalidDocument`] describing the first problem found.
pub fn validate_pdf(original_name: &str, bytes: &[u8], max_bytes: usize) -> Result<()> {
    let name = base_name(original_name);
    if name.is_empty() {
        return Err(Error::InvalidDocument("no file selected".to_string()));
    }
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(Error::InvalidDocument(format!(
            "only PDF files are allowed ({name})"
        )));
    }
    if bytes.is_empty() {
        return Err(Error::InvalidDocument(format!("{name} is empty")));
    }
    if bytes.len() > max_bytes {
        return Err(Error::InvalidDocument(format!(
            "{name} exceeds the {} MB upload limit",
            max_bytes / (1024 * 1024)
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(Error::InvalidDocument(format!(
            "{name} is not a valid PDF file"
        )));
    }
    Ok(())
}

fn sanitize(text: &str) -> String {
    UNSAFE_CHARS
        .replace_all(text, "_")
        .trim_matches(|c| c == '_' || c == '.')
        .to_string()
}

/// Stored file name: `<ASSET_CODE>_<kind>_<stem>.pdf`.
#[must_use]
pub fn stored_name(asset_code: &str, kind: DocumentKind, original_name: &str) -> String {
    let name = base_name(original_name);
    let stem = if name.to_ascii_lowercase().ends_with(".pdf") {
        &name[..name.len() - 4]
    } else {
        name
    };

    let mut stem = sanitize(stem);
    if stem.is_empty() {
        stem = "document".to_string();
    }
    if stem.chars().count() > MAX_STEM_CHARS {
        stem = stem.chars().take(MAX_STEM_CHARS).collect();
    }

    format!("{}_{}_{stem}.pdf", sanitize(asset_code), kind.as_str())
}

/// BLAKE3 hex digest of a file's content.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Where document bytes live.
///
/// Files are grouped per asset id. Implementations must never replace an
/// existing file in [`BlobStore::put_new`].
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Store a new file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentExists`] if `name` is already taken for the
    /// asset, or an I/O error.
    async fn put_new(&self, asset_id: i64, name: &str, bytes: &[u8]) -> Result<()>;

    /// Read a stored file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable.
    async fn read(&self, asset_id: i64, name: &str) -> Result<Vec<u8>>;

    /// Remove a file. Used to undo a `put_new` whose database record could
    /// not be written, and to clear files left without a record.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    async fn remove(&self, asset_id: i64, name: &str) -> Result<()>;
}

/// Stores documents under `<root>/<asset_id>/<name>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, asset_id: i64, name: &str) -> PathBuf {
        self.root.join(asset_id.to_string()).join(name)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_new(&self, asset_id: i64, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(asset_id, name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::DocumentExists {
                    stored_name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let written = match file.write_all(bytes).await {
            Ok(()) => file.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove partial file {}: {}", path.display(), cleanup);
            }
            return Err(e.into());
        }
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn read(&self, asset_id: i64, name: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path_for(asset_id, name)).await?)
    }

    async fn remove(&self, asset_id: i64, name: &str) -> Result<()> {
        tokio::fs::remove_file(self.path_for(asset_id, name)).await?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    files: Mutex<HashMap<(i64, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(i64, String), Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| Error::internal("blob store lock poisoned"))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_new(&self, asset_id: i64, name: &str, bytes: &[u8]) -> Result<()> {
        let mut files = self.files()?;
        let key = (asset_id, name.to_string());
        if files.contains_key(&key) {
            return Err(Error::DocumentExists {
                stored_name: name.to_string(),
            });
        }
        files.insert(key, bytes.to_vec());
        Ok(())
    }

    async fn read(&self, asset_id: i64, name: &str) -> Result<Vec<u8>> {
        self.files()?
            .get(&(asset_id, name.to_string()))
            .cloned()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string()).into()
            })
    }

    async fn remove(&self, asset_id: i64, name: &str) -> Result<()> {
        self.files()?.remove(&(asset_id, name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

    #[test]
    fn test_kind_text() {
        assert_eq!(DocumentKind::AmcContract.as_str(), "amc_contract");
        assert_eq!(
            "calibration_certificate".parse::<DocumentKind>().unwrap(),
            DocumentKind::CalibrationCertificate
        );
        assert!("photo".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_validate_pdf_accepts_pdf() {
        assert!(validate_pdf("Invoice.PDF", PDF, 1024).is_ok());
    }

    #[test]
    fn test_validate_pdf_rejects_other_extensions() {
        let err = validate_pdf("photo.jpg", PDF, 1024).unwrap_err();
        assert!(err.to_string().contains("only PDF"));
        let err = validate_pdf("report.pdf.exe", PDF, 1024).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
    }

    #[test]
    fn test_validate_pdf_rejects_fake_content() {
        let err = validate_pdf("fake.pdf", b"MZ\x90\x00", 1024).unwrap_err();
        assert!(err.to_string().contains("not a valid PDF"));
    }

    #[test]
    fn test_validate_pdf_rejects_empty_and_oversized() {
        assert!(validate_pdf("empty.pdf", b"", 1024)
            .unwrap_err()
            .to_string()
            .contains("empty"));
        assert!(validate_pdf("big.pdf", PDF, 8)
            .unwrap_err()
            .to_string()
            .contains("upload limit"));
        assert!(validate_pdf("", PDF, 1024).is_err());
    }

    #[test]
    fn test_stored_name() {
        assert_eq!(
            stored_name("A001", DocumentKind::Invoice, "Tax Invoice #42.pdf"),
            "A001_invoice_Tax_Invoice_42.pdf"
        );
        assert_eq!(
            stored_name("PL1/CNC-07", DocumentKind::Manual, "C:\\fakepath\\Manual v2.PDF"),
            "PL1_CNC-07_manual_Manual_v2.pdf"
        );
        assert_eq!(
            stored_name("A001", DocumentKind::Other, "###.pdf"),
            "A001_other_document.pdf"
        );
        assert_eq!(
            stored_name("A001", DocumentKind::Other, "../../etc/passwd.pdf"),
            "A001_other_passwd.pdf"
        );
    }

    #[test]
    fn test_stored_name_truncates_long_stems() {
        let long = format!("{}.pdf", "x".repeat(300));
        let name = stored_name("A1", DocumentKind::Other, &long);
        assert_eq!(name.len(), "A1_other_".len() + MAX_STEM_CHARS + ".pdf".len());
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash(PDF), content_hash(PDF));
        assert_ne!(content_hash(PDF), content_hash(b"%PDF-other"));
    }

    #[tokio::test]
    async fn test_memory_store_refuses_overwrite() {
        let store = MemoryBlobStore::new();
        store.put_new(1, "a.pdf", PDF).await.unwrap();

        let err = store.put_new(1, "a.pdf", b"%PDF-new").await.unwrap_err();
        assert!(matches!(err, Error::DocumentExists { .. }));
        assert_eq!(store.read(1, "a.pdf").await.unwrap(), PDF);

        // Same name under another asset is a different file
        store.put_new(2, "a.pdf", PDF).await.unwrap();
        store.remove(1, "a.pdf").await.unwrap();
        assert!(store.read(1, "a.pdf").await.is_err());
        assert_eq!(store.read(2, "a.pdf").await.unwrap(), PDF);
    }

    #[tokio::test]
    async fn test_fs_store_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put_new(7, "A001_invoice_x.pdf", PDF).await.unwrap();
        assert!(dir.path().join("7").join("A001_invoice_x.pdf").exists());

        let err = store
            .put_new(7, "A001_invoice_x.pdf", b"%PDF-replacement")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentExists { .. }));
        assert_eq!(store.read(7, "A001_invoice_x.pdf").await.unwrap(), PDF);

        store.remove(7, "A001_invoice_x.pdf").await.unwrap();
        assert!(!dir.path().join("7").join("A001_invoice_x.pdf").exists());
    }

    #[tokio::test]
    async fn test_fs_store_read_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(matches!(store.read(1, "nope.pdf").await, Err(Error::Io(_))));
    }
}
