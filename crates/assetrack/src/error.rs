//! Error types for assetrack.
//!
//! This module defines all error types used throughout the assetrack crate,
//! providing detailed context for debugging and user-facing messages that the
//! web layer can flash back to the operator.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for assetrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Domain Rule Errors ===
    /// A record was looked up by id and not found.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// The id that was requested.
        id: i64,
    },

    /// User input failed validation.
    #[error("{0}")]
    Validation(String),

    /// Another asset already uses this code.
    #[error("Asset Code already exists: {0}")]
    DuplicateAssetCode(String),

    /// The asset is scrapped and the operation is locked.
    #[error("asset {asset_code} is scrapped; {operation} is not allowed")]
    AssetScrapped {
        /// Business code of the asset.
        asset_code: String,
        /// The operation that was refused.
        operation: &'static str,
    },

    /// A new maintenance contract overlaps an existing one.
    #[error("AMC period overlaps existing contract {existing_id} ({existing_period})")]
    AmcOverlap {
        /// Id of the contract already covering part of the period.
        existing_id: i64,
        /// Human readable period of the existing contract.
        existing_period: String,
    },

    // === Upload Errors ===
    /// The uploaded file is not an acceptable PDF.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A document with the same stored name already exists.
    #[error("a document named {stored_name} already exists for this asset")]
    DocumentExists {
        /// The computed file name that is taken.
        stored_name: String,
    },

    /// The same file content is already attached to the asset.
    #[error("this file is already attached to the asset as {existing_name}")]
    DuplicateDocument {
        /// Stored name of the existing copy.
        existing_name: String,
    },

    // === Import Errors ===
    /// A spreadsheet could not be read or written.
    #[error("{0}")]
    Spreadsheet(String),

    /// The import batch was rejected.
    #[error("Import failed: {0}")]
    Import(String),

    // === Auth Errors ===
    /// Login failed.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No valid session.
    #[error("login required")]
    Unauthenticated,

    /// The user's role does not permit the operation.
    #[error("Access denied")]
    Forbidden,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for assetrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<calamine::XlsxError> for Error {
    fn from(_: calamine::XlsxError) -> Self {
        Self::Spreadsheet("Unable to read Excel file. File may be corrupted.".to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Spreadsheet(format!("failed to write workbook: {err}"))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create a scrapped-asset lock error.
    #[must_use]
    pub fn scrapped(asset_code: impl Into<String>, operation: &'static str) -> Self {
        Self::AssetScrapped {
            asset_code: asset_code.into(),
            operation,
        }
    }

    /// Check if this error means a record was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is the result of operator input or a business
    /// rule, as opposed to an infrastructure failure.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::DuplicateAssetCode(_)
                | Self::AssetScrapped { .. }
                | Self::AmcOverlap { .. }
                | Self::InvalidDocument(_)
                | Self::DocumentExists { .. }
                | Self::DuplicateDocument { .. }
                | Self::Spreadsheet(_)
                | Self::Import(_)
                | Self::InvalidCredentials
                | Self::Forbidden
        )
    }
}
