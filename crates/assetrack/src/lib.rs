//! `assetrack` - A factory asset register
//!
//! This library provides asset records with their maintenance contracts (AMC),
//! calibration history, an append-only event log and PDF documents, plus bulk
//! import from Excel workbooks and the axum web application that serves it.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod amc;
pub mod asset;
pub mod auth;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod dates;
pub mod document;
pub mod error;
pub mod event;
pub mod import;
pub mod logging;
pub mod storage;
pub mod web;

pub use asset::{Asset, AssetStatus};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use storage::{Storage, StorageStats};
