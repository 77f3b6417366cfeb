//! `assetrack` - CLI and web server for the factory asset register.
//!
//! This binary runs the web application and provides maintenance commands for
//! accounts, bulk imports and register status.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use assetrack::auth::{hash_password, Role};
use assetrack::cli::{Cli, Command, ConfigCommand, ImportCommand, UserCommand};
use assetrack::dates;
use assetrack::document::FsBlobStore;
use assetrack::import::{validate_sheet, xlsx, ImportPlan, SheetOutcome};
use assetrack::web::{self, AppState};
use assetrack::{init_logging, Config, Storage};

/// Recorded as the author of changes made from the command line.
const CLI_ACTOR: &str = "cli";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // `config validate` must not fail early on the file it is checking
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        return handle_validate(file.clone().or_else(|| cli.config.clone()));
    }

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Serve(cmd) => handle_serve(config, cmd.bind),
        Command::User(cmd) => handle_user(&config, cmd),
        Command::Import(cmd) => handle_import(&config, &cmd),
        Command::Template(cmd) => handle_template(&cmd.out),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("opening database {}", path.display()))
}

fn handle_serve(mut config: Config, bind: Option<String>) -> anyhow::Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
        config.validate()?;
    }

    let storage = open_storage(&config)?;
    if storage.count_users()? == 0 {
        warn!("No user accounts exist; create one with `assetrack user add`");
    }
    storage.purge_expired_sessions()?;

    let uploads = config.uploads_dir();
    info!("Database: {}", storage.path().display());
    info!("Uploads: {}", uploads.display());

    let bind = config.server.bind.clone();
    let state = AppState::new(storage, Arc::new(FsBlobStore::new(uploads)), config)?;

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(web::serve(state, &bind))?;
    Ok(())
}

fn handle_user(config: &Config, cmd: UserCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        UserCommand::Add {
            username,
            role,
            password,
        } => {
            let Some(password) = password.filter(|p| !p.is_empty()) else {
                bail!("a password is required: pass --password or set ASSETRACK_PASSWORD");
            };
            let role = Role::from(role);
            let user = storage.create_user(&username, &hash_password(&password), role)?;
            println!("Created {} account {}", user.role, user.username);
        }
        UserCommand::List => {
            let users = storage.list_users()?;
            if users.is_empty() {
                println!("No accounts.");
            }
            for user in users {
                println!(
                    "{:<20} {:<10} {:<9} {}",
                    user.username,
                    user.role.to_string(),
                    if user.is_active { "active" } else { "disabled" },
                    dates::format_indian(Some(user.created_at.date_naive()))
                );
            }
        }
        UserCommand::Disable { username } => {
            storage.set_user_active(&username, false)?;
            println!("Disabled {username}");
        }
        UserCommand::Enable { username } => {
            storage.set_user_active(&username, true)?;
            println!("Enabled {username}");
        }
    }
    Ok(())
}

/// Read and check a workbook against the register.
fn check_workbook(storage: &Storage, config: &Config, file: &Path) -> anyhow::Result<SheetOutcome> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !xlsx::is_xlsx_name(&name) {
        bail!("{} is not an .xlsx file", file.display());
    }
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let sheet = xlsx::read_sheet(&bytes)?;
    let existing = storage.existing_codes()?;
    Ok(validate_sheet(
        &sheet,
        &existing,
        &config.code_regex()?,
        dates::today(),
    )?)
}

fn print_plan(plan: &ImportPlan) {
    for row in &plan.invalid {
        println!(
            "row {:>4}  INVALID  {:<12} {}",
            row.row_no,
            row.asset_code,
            row.errors.join("; ")
        );
    }
    println!(
        "{} valid row(s): {} new, {} update(s); {} invalid row(s)",
        plan.valid.len(),
        plan.creates(),
        plan.updates(),
        plan.invalid.len()
    );
}

fn handle_import(config: &Config, cmd: &ImportCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let plan = match check_workbook(&storage, config, &cmd.file)? {
        SheetOutcome::Checked(plan) => plan,
        empty => {
            println!("{}", empty.empty_message().unwrap_or("Nothing to import."));
            return Ok(());
        }
    };

    print_plan(&plan);
    if !plan.is_applicable() {
        bail!("nothing imported: fix the invalid rows and try again");
    }
    if cmd.dry_run {
        println!("Dry run: no changes written.");
        return Ok(());
    }

    let summary = storage.apply_import(&plan.valid, Some(CLI_ACTOR), dates::today())?;
    println!(
        "Imported: {} created, {} updated",
        summary.created, summary.updated
    );
    Ok(())
}

fn handle_template(out: &Path) -> anyhow::Result<()> {
    let bytes = xlsx::template_bytes()?;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(out)
        .with_context(|| format!("creating {} (existing files are never replaced)", out.display()))?;
    file.write_all(&bytes)?;
    println!("Wrote {}", out.display());
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats(dates::today(), &config.status)?;

    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "uploads_dir": config.uploads_dir(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("assetrack status");
    println!("----------------");
    println!("Database:        {}", storage.path().display());
    println!("Uploads:         {}", config.uploads_dir().display());
    println!(
        "Assets:          {} ({} active, {} scrapped)",
        stats.total_assets, stats.active_assets, stats.scrapped_assets
    );
    println!();
    println!("AMC (active assets)");
    for (label, count) in &stats.amc {
        println!("  {label:<16} {count}");
    }
    println!("  {:<16} {}", "No AMC", stats.without_amc);
    println!();
    println!("Calibration (active assets)");
    for (label, count) in &stats.calibration {
        println!("  {label:<16} {count}");
    }
    println!("  {:<16} {}", "Not Calibrated", stats.without_calibration);
    println!();
    println!("Documents:       {}", stats.documents);
    println!("Events:          {}", stats.events);
    println!("Users:           {}", stats.users);
    println!("Database size:   {} KB", stats.db_size_bytes / 1024);
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    Config::load_from(Some(path)).context("configuration is invalid")?;
    println!("Configuration is valid.");
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind);
                println!("  Session TTL (h):    {}", config.server.session_ttl_hours);
                println!("  Cookie name:        {}", config.server.cookie_name);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Uploads]");
                println!("  Directory:          {}", config.uploads_dir().display());
                println!("  Max upload (MB):    {}", config.uploads.max_upload_mb);
                println!();
                println!("[Status]");
                println!("  AMC warning days:   {}", config.status.amc_warning_days);
                println!(
                    "  Calibration warning days: {}",
                    config.status.calibration_warning_days
                );
                println!();
                println!("[Assets]");
                println!("  Code pattern:       {}", config.assets.code_pattern);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file)?,
    }
    Ok(())
}
