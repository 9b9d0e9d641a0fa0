//! Task management.
//!
//! Every write goes through a store transaction after the caller's role on
//! the owning project has been checked. Links to goals are delegated to
//! [`crate::goal_link::set_link`] so the same-project rule has one home.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::collab::{authorize, role_of, Action};
use crate::error::{Error, Result};
use crate::goal::refresh_progress;
use crate::goal_link::set_link;
use crate::model::{
    new_id, normalize_description, require_name, AccessLevel, Priority, Task, TaskStatus,
    Weekday, TASK_ID_PREFIX,
};
use crate::store::EntityStore;

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub is_recurring: bool,
    pub recurring_days: BTreeSet<Weekday>,
    pub goal_id: Option<String>,
    pub selected: bool,
}

impl NewTask {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub name: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub clear_due_date: bool,
    pub is_recurring: Option<bool>,
    pub recurring_days: Option<BTreeSet<Weekday>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub goal_id: Option<String>,
    pub selected_only: bool,
}

fn check_recurrence(is_recurring: bool, days: &BTreeSet<Weekday>) -> Result<()> {
    if !is_recurring && !days.is_empty() {
        return Err(Error::Validation(
            "recurring days are only allowed on recurring tasks".to_string(),
        ));
    }
    Ok(())
}

pub struct TaskService<S> {
    store: S,
}

impl<S: EntityStore> TaskService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn create(&self, caller: &str, input: NewTask) -> Result<Task> {
        let name = require_name("task", &input.name)?;
        check_recurrence(input.is_recurring, &input.recurring_days)?;

        let task = self.store.with_transaction(|data| {
            authorize(data, &input.project_id, caller, Action::EditWork)?;
            let now = Utc::now();
            let task = Task {
                id: new_id(TASK_ID_PREFIX),
                project_id: input.project_id.clone(),
                name,
                description: normalize_description(input.description),
                status: TaskStatus::Todo,
                priority: input.priority,
                goal_id: None,
                is_selected_for_today: input.selected,
                is_recurring: input.is_recurring,
                recurring_days: input.recurring_days,
                last_completed_date: None,
                due_date: input.due_date,
                created_at: now,
                updated_at: now,
            };
            let id = task.id.clone();
            data.put_task(task.clone());
            match input.goal_id.as_deref() {
                Some(goal_id) => set_link(data, &id, Some(goal_id)),
                None => Ok(task),
            }
        })?;

        info!(user = caller, project = %task.project_id, task = %task.id, "task created");
        Ok(task)
    }

    pub fn edit(&self, caller: &str, task_id: &str, edit: TaskEdit) -> Result<Task> {
        let name = edit
            .name
            .as_deref()
            .map(|name| require_name("task", name))
            .transpose()?;

        let task = self.store.with_transaction(|data| {
            let project_id = data.task(task_id)?.project_id.clone();
            authorize(data, &project_id, caller, Action::EditWork)?;

            let task = data.task_mut(task_id)?;
            if let Some(name) = name {
                task.name = name;
            }
            if let Some(description) = edit.description {
                task.description = normalize_description(Some(description));
            }
            if let Some(priority) = edit.priority {
                task.priority = priority;
            }
            if edit.clear_due_date {
                task.due_date = None;
            } else if let Some(date) = edit.due_date {
                task.due_date = Some(date);
            }
            if let Some(recurring) = edit.is_recurring {
                task.is_recurring = recurring;
                if !recurring {
                    task.recurring_days.clear();
                }
            }
            if let Some(days) = edit.recurring_days {
                task.recurring_days = days;
            }
            check_recurrence(task.is_recurring, &task.recurring_days)?;
            task.updated_at = Utc::now();
            Ok(task.clone())
        })?;

        info!(user = caller, task = task_id, "task updated");
        Ok(task)
    }

    /// Move a task to `status`. Becoming done stamps `last_completed_date`
    /// with `today`.
    pub fn set_status(
        &self,
        caller: &str,
        task_id: &str,
        status: TaskStatus,
        today: NaiveDate,
    ) -> Result<Task> {
        let task = self.store.with_transaction(|data| {
            let project_id = data.task(task_id)?.project_id.clone();
            authorize(data, &project_id, caller, Action::EditWork)?;

            let task = data.task_mut(task_id)?;
            if task.status != status {
                if status == TaskStatus::Done {
                    task.last_completed_date = Some(today);
                }
                task.status = status;
                task.updated_at = Utc::now();
            }
            let task = task.clone();
            if let Some(goal_id) = task.goal_id.as_deref() {
                refresh_progress(data, goal_id);
            }
            Ok(task)
        })?;

        info!(user = caller, task = task_id, status = %status, "task status changed");
        Ok(task)
    }

    /// Pick or drop a task from today's selection.
    pub fn select(&self, caller: &str, task_id: &str, selected: bool) -> Result<Task> {
        let task = self.store.with_transaction(|data| {
            let project_id = data.task(task_id)?.project_id.clone();
            authorize(data, &project_id, caller, Action::EditWork)?;
            let task = data.task_mut(task_id)?;
            if task.is_selected_for_today != selected {
                task.is_selected_for_today = selected;
                task.updated_at = Utc::now();
            }
            Ok(task.clone())
        })?;

        info!(user = caller, task = task_id, selected, "task selection changed");
        Ok(task)
    }

    pub fn delete(&self, caller: &str, task_id: &str) -> Result<Task> {
        let task = self.store.with_transaction(|data| {
            let project_id = data.task(task_id)?.project_id.clone();
            authorize(data, &project_id, caller, Action::EditWork)?;
            let task = data.remove_task(task_id)?;
            if let Some(goal_id) = task.goal_id.as_deref() {
                refresh_progress(data, goal_id);
            }
            Ok(task)
        })?;

        info!(user = caller, task = task_id, "task deleted");
        Ok(task)
    }

    pub fn get(&self, caller: &str, task_id: &str) -> Result<Task> {
        let data = self.store.snapshot()?;
        let task = data.task(task_id)?;
        authorize(&data, &task.project_id, caller, Action::View)?;
        Ok(task.clone())
    }

    /// Tasks the caller can view, newest first within each project.
    ///
    /// With a project filter the caller must be able to view that project;
    /// without one, tasks of projects they cannot see are left out.
    pub fn list(&self, caller: &str, filter: &TaskFilter) -> Result<Vec<Task>> {
        let data = self.store.snapshot()?;
        if let Some(project_id) = filter.project_id.as_deref() {
            authorize(&data, project_id, caller, Action::View)?;
        }

        let mut tasks: Vec<Task> = data
            .tasks()
            .filter(|task| {
                filter
                    .project_id
                    .as_deref()
                    .map_or(true, |project_id| task.project_id == project_id)
            })
            .filter(|task| filter.status.map_or(true, |status| task.status == status))
            .filter(|task| {
                filter
                    .goal_id
                    .as_deref()
                    .map_or(true, |goal_id| task.goal_id.as_deref() == Some(goal_id))
            })
            .filter(|task| !filter.selected_only || task.is_selected_for_today)
            .filter(|task| {
                data.project(&task.project_id)
                    .map(|project| role_of(project, caller) >= AccessLevel::Viewer)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.project_id
                .cmp(&b.project_id)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(tasks)
    }
}
