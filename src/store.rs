//! Entity storage seam.
//!
//! Services never hold state of their own: they are constructed with an
//! [`EntityStore`] and run every mutation through
//! [`EntityStore::with_transaction`]. A transaction sees a private copy of the
//! [`Dataset`]; the copy replaces the stored state only when the closure
//! returns `Ok`, so a failed call commits nothing.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{DailyCompletionRecord, Goal, Project, ShareInvitation, Task};

pub const STORE_SCHEMA_VERSION: &str = "focus.store.v1";

fn default_schema_version() -> String {
    STORE_SCHEMA_VERSION.to_string()
}

/// Storage backend for focus entities.
pub trait EntityStore {
    /// Read-only copy of the current state.
    fn snapshot(&self) -> Result<Dataset>;

    /// Run `f` against the current state and commit its changes atomically.
    ///
    /// Implementations must serialize transactions that touch the same data so
    /// that check-then-write sequences inside `f` cannot interleave.
    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Dataset) -> Result<T>;
}

impl<S: EntityStore + ?Sized> EntityStore for &S {
    fn snapshot(&self) -> Result<Dataset> {
        (**self).snapshot()
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Dataset) -> Result<T>,
    {
        (**self).with_transaction(f)
    }
}

/// Every persisted entity, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    projects: BTreeMap<String, Project>,
    #[serde(default)]
    tasks: BTreeMap<String, Task>,
    #[serde(default)]
    goals: BTreeMap<String, Goal>,
    #[serde(default)]
    invitations: BTreeMap<String, ShareInvitation>,
    #[serde(default)]
    completions: Vec<DailyCompletionRecord>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            projects: BTreeMap::new(),
            tasks: BTreeMap::new(),
            goals: BTreeMap::new(),
            invitations: BTreeMap::new(),
            completions: Vec::new(),
        }
    }
}

impl Dataset {
    // =========================================================================
    // Projects
    // =========================================================================

    pub fn project(&self, id: &str) -> Result<&Project> {
        self.projects
            .get(id)
            .ok_or_else(|| Error::not_found("project", id))
    }

    pub fn project_mut(&mut self, id: &str) -> Result<&mut Project> {
        self.projects
            .get_mut(id)
            .ok_or_else(|| Error::not_found("project", id))
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn projects_owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Project> {
        self.projects
            .values()
            .filter(move |project| project.owner == owner)
    }

    pub fn put_project(&mut self, project: Project) {
        self.projects.insert(project.id.clone(), project);
    }

    pub fn remove_project(&mut self, id: &str) -> Result<Project> {
        self.projects
            .remove(id)
            .ok_or_else(|| Error::not_found("project", id))
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn task(&self, id: &str) -> Result<&Task> {
        self.tasks.get(id).ok_or_else(|| Error::not_found("task", id))
    }

    pub fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| Error::not_found("task", id))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    pub fn tasks_in_project<'a>(&'a self, project_id: &'a str) -> impl Iterator<Item = &'a Task> {
        self.tasks
            .values()
            .filter(move |task| task.project_id == project_id)
    }

    pub fn tasks_linked_to<'a>(&'a self, goal_id: &'a str) -> impl Iterator<Item = &'a Task> {
        self.tasks
            .values()
            .filter(move |task| task.goal_id.as_deref() == Some(goal_id))
    }

    pub fn put_task(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn remove_task(&mut self, id: &str) -> Result<Task> {
        self.tasks.remove(id).ok_or_else(|| Error::not_found("task", id))
    }

    // =========================================================================
    // Goals
    // =========================================================================

    pub fn goal(&self, id: &str) -> Result<&Goal> {
        self.goals.get(id).ok_or_else(|| Error::not_found("goal", id))
    }

    pub fn goal_mut(&mut self, id: &str) -> Result<&mut Goal> {
        self.goals
            .get_mut(id)
            .ok_or_else(|| Error::not_found("goal", id))
    }

    pub fn goals_in_project<'a>(&'a self, project_id: &'a str) -> impl Iterator<Item = &'a Goal> {
        self.goals
            .values()
            .filter(move |goal| goal.project_id == project_id)
    }

    pub fn put_goal(&mut self, goal: Goal) {
        self.goals.insert(goal.id.clone(), goal);
    }

    pub fn remove_goal(&mut self, id: &str) -> Result<Goal> {
        self.goals.remove(id).ok_or_else(|| Error::not_found("goal", id))
    }

    // =========================================================================
    // Invitations
    // =========================================================================

    pub fn invitation(&self, id: &str) -> Result<&ShareInvitation> {
        self.invitations
            .get(id)
            .ok_or_else(|| Error::not_found("invitation", id))
    }

    pub fn invitation_mut(&mut self, id: &str) -> Result<&mut ShareInvitation> {
        self.invitations
            .get_mut(id)
            .ok_or_else(|| Error::not_found("invitation", id))
    }

    pub fn invitations(&self) -> impl Iterator<Item = &ShareInvitation> {
        self.invitations.values()
    }

    pub fn put_invitation(&mut self, invitation: ShareInvitation) {
        self.invitations.insert(invitation.id.clone(), invitation);
    }

    pub fn remove_invitations_for_project(&mut self, project_id: &str) -> usize {
        let before = self.invitations.len();
        self.invitations
            .retain(|_, invitation| invitation.project_id != project_id);
        before - self.invitations.len()
    }

    // =========================================================================
    // Daily completion records
    // =========================================================================

    pub fn completion(&self, user_id: &str, date: NaiveDate) -> Option<&DailyCompletionRecord> {
        self.completions
            .iter()
            .find(|record| record.user_id == user_id && record.date == date)
    }

    /// Completion records for a user, oldest first.
    pub fn completions_for(&self, user_id: &str) -> Vec<DailyCompletionRecord> {
        let mut records: Vec<DailyCompletionRecord> = self
            .completions
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.date);
        records
    }

    /// Insert or overwrite the record for `(user_id, date)`.
    pub fn upsert_completion(&mut self, record: DailyCompletionRecord) {
        match self
            .completions
            .iter_mut()
            .find(|existing| existing.user_id == record.user_id && existing.date == record.date)
        {
            Some(existing) => *existing = record,
            None => self.completions.push(record),
        }
    }

    // =========================================================================
    // Id resolution
    // =========================================================================

    pub fn resolve_project_id(&self, input: &str) -> Result<String> {
        resolve_id("project", self.projects.keys(), input)
    }

    pub fn resolve_task_id(&self, input: &str) -> Result<String> {
        resolve_id("task", self.tasks.keys(), input)
    }

    pub fn resolve_goal_id(&self, input: &str) -> Result<String> {
        resolve_id("goal", self.goals.keys(), input)
    }

    pub fn resolve_invitation_id(&self, input: &str) -> Result<String> {
        resolve_id("invitation", self.invitations.keys(), input)
    }
}

/// Match an id exactly, or by a unique case-insensitive prefix.
fn resolve_id<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a String>,
    input: &str,
) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{kind} id cannot be empty")));
    }
    let needle = trimmed.to_ascii_lowercase();
    let mut prefix = Vec::new();
    for id in ids {
        let normalized = id.to_ascii_lowercase();
        if normalized == needle {
            return Ok(id.clone());
        }
        if normalized.starts_with(&needle) {
            prefix.push(id.clone());
        }
    }

    if prefix.len() > 1 {
        return Err(Error::Validation(format!(
            "ambiguous {kind} id '{}': {}",
            trimmed,
            prefix.join(", ")
        )));
    }
    prefix
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(kind, trimmed))
}

/// In-process store; every transaction holds a single mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Dataset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            state: Mutex::new(dataset),
        }
    }
}

impl EntityStore for MemoryStore {
    fn snapshot(&self) -> Result<Dataset> {
        let guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone())
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Dataset) -> Result<T>,
    {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }
}
