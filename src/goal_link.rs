//! Task to goal linkage.
//!
//! A task points at no more than one goal, and only at a goal of its own
//! project. This module owns every write to `Task::goal_id`, including the
//! cascade that runs when a goal is deleted.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::collab::{authorize, Action};
use crate::error::{Error, Result};
use crate::goal::refresh_progress;
use crate::model::{Goal, Task};
use crate::store::{Dataset, EntityStore};

/// Point `task_id` at `goal_id` (or at nothing), refreshing the progress of
/// both the old and the new goal.
pub fn set_link(data: &mut Dataset, task_id: &str, goal_id: Option<&str>) -> Result<Task> {
    let task = data.task(task_id)?;
    let previous = task.goal_id.clone();

    if let Some(goal_id) = goal_id {
        let goal = data.goal(goal_id)?;
        if goal.project_id != task.project_id {
            debug!(task = task_id, goal = goal_id, "cross-project link refused");
            return Err(Error::Conflict(format!(
                "goal {goal_id} belongs to project {}, task {task_id} to {}",
                goal.project_id, task.project_id
            )));
        }
    }

    let task = data.task_mut(task_id)?;
    if task.goal_id.as_deref() != goal_id {
        task.goal_id = goal_id.map(str::to_string);
        task.updated_at = Utc::now();
    }
    let task = task.clone();

    if let Some(previous) = previous.as_deref() {
        refresh_progress(data, previous);
    }
    if let Some(goal_id) = goal_id {
        if previous.as_deref() != Some(goal_id) {
            refresh_progress(data, goal_id);
        }
    }
    Ok(task)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    OtherProject { project_id: String },
    LinkedElsewhere { goal_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub task_id: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of a bulk relink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelinkReport {
    pub goal_id: String,
    pub linked: Vec<String>,
    pub unlinked: Vec<String>,
    pub unchanged: Vec<String>,
    pub skipped: Vec<SkippedTask>,
    pub progress: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalDeletion {
    pub goal: Goal,
    pub unlinked_tasks: Vec<String>,
}

pub struct GoalLinkRegistry<S> {
    store: S,
}

impl<S: EntityStore> GoalLinkRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Replace the task's link; `None` unlinks.
    pub fn link_task_to_goal(
        &self,
        caller: &str,
        task_id: &str,
        goal_id: Option<&str>,
    ) -> Result<Task> {
        let task = self.store.with_transaction(|data| {
            let project_id = data.task(task_id)?.project_id.clone();
            authorize(data, &project_id, caller, Action::EditWork)?;
            set_link(data, task_id, goal_id)
        })?;

        info!(user = caller, task = task_id, goal = ?goal_id, "task link set");
        Ok(task)
    }

    /// Make the goal's linked set match `desired` as far as the rules allow.
    ///
    /// Tasks already linked to a different goal are left alone and reported,
    /// as are unknown and cross-project ids. Running the same call twice
    /// changes nothing the second time.
    pub fn relink_tasks_to_goal(
        &self,
        caller: &str,
        goal_id: &str,
        desired: &[String],
    ) -> Result<RelinkReport> {
        let desired: BTreeSet<&str> = desired.iter().map(|id| id.trim()).collect();

        let report = self.store.with_transaction(|data| {
            let project_id = data.goal(goal_id)?.project_id.clone();
            authorize(data, &project_id, caller, Action::EditWork)?;
            let now = Utc::now();
            let mut report = RelinkReport {
                goal_id: goal_id.to_string(),
                ..RelinkReport::default()
            };

            let to_unlink: Vec<String> = data
                .tasks_linked_to(goal_id)
                .filter(|task| !desired.contains(task.id.as_str()))
                .map(|task| task.id.clone())
                .collect();
            for id in to_unlink {
                let task = data.task_mut(&id)?;
                task.goal_id = None;
                task.updated_at = now;
                report.unlinked.push(id);
            }

            for &id in &desired {
                let Ok(task) = data.task(id) else {
                    report.skipped.push(SkippedTask {
                        task_id: id.to_string(),
                        reason: SkipReason::NotFound,
                    });
                    continue;
                };
                if task.project_id != project_id {
                    report.skipped.push(SkippedTask {
                        task_id: id.to_string(),
                        reason: SkipReason::OtherProject {
                            project_id: task.project_id.clone(),
                        },
                    });
                    continue;
                }
                match task.goal_id.as_deref() {
                    Some(current) if current == goal_id => report.unchanged.push(id.to_string()),
                    Some(other) => report.skipped.push(SkippedTask {
                        task_id: id.to_string(),
                        reason: SkipReason::LinkedElsewhere {
                            goal_id: other.to_string(),
                        },
                    }),
                    None => {
                        let task = data.task_mut(id)?;
                        task.goal_id = Some(goal_id.to_string());
                        task.updated_at = now;
                        report.linked.push(id.to_string());
                    }
                }
            }

            refresh_progress(data, goal_id);
            report.progress = data.goal(goal_id)?.progress;
            Ok(report)
        })?;

        info!(
            user = caller,
            goal = goal_id,
            linked = report.linked.len(),
            unlinked = report.unlinked.len(),
            skipped = report.skipped.len(),
            "goal relinked"
        );
        Ok(report)
    }

    /// Delete a goal and clear `goal_id` on every task that referenced it.
    pub fn delete_goal(&self, caller: &str, goal_id: &str) -> Result<GoalDeletion> {
        let deletion = self.store.with_transaction(|data| {
            let project_id = data.goal(goal_id)?.project_id.clone();
            authorize(data, &project_id, caller, Action::EditWork)?;
            let now = Utc::now();

            let linked: Vec<String> = data
                .tasks_linked_to(goal_id)
                .map(|task| task.id.clone())
                .collect();
            for id in &linked {
                let task = data.task_mut(id)?;
                task.goal_id = None;
                task.updated_at = now;
            }
            let goal = data.remove_goal(goal_id)?;
            Ok(GoalDeletion {
                goal,
                unlinked_tasks: linked,
            })
        })?;

        info!(
            user = caller,
            goal = goal_id,
            unlinked = deletion.unlinked_tasks.len(),
            "goal deleted"
        );
        Ok(deletion)
    }
}
