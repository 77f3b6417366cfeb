//! Command-line interface for assetrack.
//!
//! This module provides the CLI structure and command handlers for the
//! `assetrack` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, ImportCommand, RoleArg, ServeCommand, StatusCommand, TemplateCommand,
    UserCommand,
};

/// assetrack - Factory asset register
///
/// Tracks plant assets with their AMC contracts, calibration history, event
/// log and PDF documents, and imports assets in bulk from Excel sheets.
#[derive(Debug, Parser)]
#[command(name = "assetrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the web application
    Serve(ServeCommand),

    /// Manage login accounts
    #[command(subcommand)]
    User(UserCommand),

    /// Import assets from an Excel workbook
    Import(ImportCommand),

    /// Write the blank import template
    Template(TemplateCommand),

    /// Show register totals and status counts
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}
