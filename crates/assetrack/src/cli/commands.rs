//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::auth::Role;

/// Web server arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// User account commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create a login account
    Add {
        /// Login name
        username: String,

        /// Access level
        #[arg(short, long, value_enum, default_value = "user")]
        role: RoleArg,

        /// Password (falls back to the ASSETRACK_PASSWORD environment variable)
        #[arg(short, long, env = "ASSETRACK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// List accounts
    List,

    /// Disable an account and end its sessions
    Disable {
        /// Login name
        username: String,
    },

    /// Re-enable a disabled account
    Enable {
        /// Login name
        username: String,
    },
}

/// Spreadsheet import arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Workbook to import (.xlsx)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Check the rows and print the plan without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Template download arguments.
#[derive(Debug, Args)]
pub struct TemplateCommand {
    /// Where to write the template workbook
    #[arg(value_name = "OUT", default_value = crate::import::xlsx::TEMPLATE_FILE_NAME)]
    pub out: PathBuf,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Role argument for new accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Administrator: import, scrap, manage users
    Developer,
    /// Regular plant user
    User,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Developer => Role::Developer,
            RoleArg::User => Role::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arg_conversion() {
        assert_eq!(Role::from(RoleArg::Developer), Role::Developer);
        assert_eq!(Role::from(RoleArg::User), Role::User);
    }

    #[test]
    fn test_role_arg_value_names() {
        let names: Vec<_> = RoleArg::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["developer", "user"]);
    }

    #[test]
    fn test_status_command_debug() {
        let cmd = StatusCommand { json: true };
        assert!(format!("{cmd:?}").contains("json: true"));
    }
}
