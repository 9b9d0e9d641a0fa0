//! focus init and whoami command implementations

use std::path::PathBuf;

use serde::Serialize;

use crate::actor::{self, USER_ENV};
use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::storage::Storage;

use super::Globals;

#[derive(Serialize)]
struct InitReport {
    root: PathBuf,
    data_dir: PathBuf,
    created: InitCreated,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Serialize)]
struct InitCreated {
    config: bool,
    store: bool,
}

#[derive(Serialize)]
struct WhoamiReport {
    user: String,
    source: &'static str,
}

pub fn run_init(globals: &Globals) -> Result<()> {
    let root = globals.root_dir()?;
    std::fs::create_dir_all(&root)?;

    let config_path = root.join(CONFIG_FILE);
    let created_config = !config_path.exists();
    let config = if created_config {
        let config = Config::default();
        config.save(&config_path)?;
        config
    } else {
        Config::load(&config_path)?
    };

    let storage = Storage::for_root(root.clone(), &config);
    let created_store = storage.init()?;
    let user = match globals.user.as_deref() {
        Some(user) => Some(actor::persist_user(&storage, user)?),
        None => None,
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_store {
        created_items.push(format!("{}/", config.storage.dir));
    }

    let header = if created_items.is_empty() {
        "focus init: nothing to do".to_string()
    } else {
        "focus init: initialized".to_string()
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    match &user {
        Some(user) => human.push_summary("user", user.clone()),
        None => human.push_next_step("focus init --user <name>"),
    }
    human.push_next_step("focus project new <name>");

    let report = InitReport {
        root,
        data_dir: storage.data_dir().to_path_buf(),
        created: InitCreated {
            config: created_config,
            store: created_store,
        },
        user,
    };
    emit_success(globals.output(), "init", &report, Some(&human))
}

pub fn run_whoami(globals: &Globals) -> Result<()> {
    let root = globals.root_dir()?;
    let config = Config::load_from_root(&root)?;
    let storage = Storage::for_root(root, &config);
    let user = actor::resolve_user(&storage, &config, globals.user.as_deref())?;

    // clap folds FOCUS_USER into --user, so the two are told apart here.
    let env_user = std::env::var(USER_ENV).ok();
    let source = if globals.user.is_some() && env_user.as_deref() == globals.user.as_deref() {
        "env"
    } else if globals.user.is_some() {
        "flag"
    } else if storage.read_user()?.is_some() {
        "persisted"
    } else {
        "config"
    };

    let mut human = HumanOutput::new(format!("focus whoami: {user}"));
    human.push_summary("user", user.clone());
    human.push_summary("source", source);
    if source == "config" && user == Config::default().user.default {
        human.push_warning("user not set; using default");
        human.push_next_step("focus init --user <name>");
    }

    emit_success(
        globals.output(),
        "whoami",
        &WhoamiReport { user, source },
        Some(&human),
    )
}
