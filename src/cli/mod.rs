//! Command-line interface for focus
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is defined in its own submodule.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use crate::actor;
use crate::config::Config;
use crate::error::Result;
use crate::model::parse_date;
use crate::notify::{ConfiguredNotifier, OutboxNotifier};
use crate::output::OutputOptions;
use crate::storage::{FileStore, Storage};
use crate::store::{Dataset, EntityStore};

mod goal;
mod init;
mod project;
mod share;
mod stats;
mod task;

/// focus - projects, tasks and goals under a six-project focus cap
#[derive(Parser, Debug)]
#[command(name = "focus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding focus.toml and the data directory (defaults to current directory)
    #[arg(long, global = true, env = "FOCUS_ROOT")]
    pub root: Option<PathBuf>,

    /// Acting user
    #[arg(long, global = true, env = "FOCUS_USER")]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a default focus.toml
    Init,

    /// Show the acting user and where it came from
    Whoami,

    /// Project management
    #[command(subcommand)]
    Project(project::ProjectCommands),

    /// Task management
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Goal management
    #[command(subcommand)]
    Goal(goal::GoalCommands),

    /// Sharing and collaborators
    #[command(subcommand)]
    Share(share::ShareCommands),

    /// Daily completion statistics
    #[command(subcommand)]
    Stats(stats::StatsCommands),
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub root: Option<PathBuf>,
    pub user: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl Globals {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    pub fn root_dir(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

/// Everything a command needs once the root is known.
pub(crate) struct Context {
    pub config: Config,
    pub store: FileStore,
    pub user: String,
    pub output: OutputOptions,
}

impl Context {
    pub fn load(globals: &Globals) -> Result<Self> {
        let root = globals.root_dir()?;
        let config = Config::load_from_root(&root)?;
        let storage = Storage::for_root(root, &config);
        let user = actor::resolve_user(&storage, &config, globals.user.as_deref())?;
        let store = FileStore::open(storage, config.storage.lock_timeout_ms)?;
        Ok(Self {
            config,
            store,
            user,
            output: globals.output(),
        })
    }

    pub fn notifier(&self) -> ConfiguredNotifier {
        if !self.config.notify.enabled {
            return ConfiguredNotifier::Disabled;
        }
        ConfiguredNotifier::Outbox(OutboxNotifier::new(
            self.store.storage().clone(),
            self.config.notify.outbox.clone(),
            self.config.storage.lock_timeout_ms,
        ))
    }

    /// Resolve an id (or unique prefix) against the current data.
    pub fn resolve(&self, resolve: impl FnOnce(&Dataset) -> Result<String>) -> Result<String> {
        let data = self.store.snapshot()?;
        resolve(&data)
    }
}

/// `--date` value, or today's local date.
pub(crate) fn date_or_today(input: Option<&str>) -> Result<NaiveDate> {
    match input {
        Some(raw) => parse_date(raw),
        None => Ok(Local::now().date_naive()),
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let globals = Globals {
            root: self.root,
            user: self.user,
            json: self.json,
            quiet: self.quiet,
        };
        match self.command {
            Commands::Init => init::run_init(&globals),
            Commands::Whoami => init::run_whoami(&globals),
            Commands::Project(cmd) => project::run(&globals, cmd),
            Commands::Task(cmd) => task::run(&globals, cmd),
            Commands::Goal(cmd) => goal::run(&globals, cmd),
            Commands::Share(cmd) => share::run(&globals, cmd),
            Commands::Stats(cmd) => stats::run(&globals, cmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["focus", "project", "list", "--json", "--user", "alice"])
            .expect("parse");
        assert!(cli.json);
        assert_eq!(cli.user.as_deref(), Some("alice"));
    }

    #[test]
    fn share_target_user_does_not_replace_acting_user() {
        let cli = Cli::try_parse_from([
            "focus", "--user", "mallory", "share", "remove", "prj-1", "bob",
        ])
        .expect("parse");
        assert_eq!(cli.user.as_deref(), Some("mallory"));
        match cli.command {
            Commands::Share(share::ShareCommands::Remove { member, .. }) => {
                assert_eq!(member, "bob")
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "focus", "share", "role", "prj-1", "ed", "viewer", "--user", "alice",
        ])
        .expect("parse");
        assert_eq!(cli.user.as_deref(), Some("alice"));
    }

    #[test]
    fn date_or_today_parses_iso_dates() {
        let date = date_or_today(Some("2024-06-03")).expect("date");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 3).expect("date"));
        assert!(date_or_today(Some("06/03/2024")).is_err());
    }
}
