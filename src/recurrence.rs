//! Daily reset of recurring tasks.
//!
//! A finished recurring task goes back to `todo` on each day it recurs, at
//! most once per date. The decision is pure: callers pass the date.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::goal::refresh_progress;
use crate::model::{Task, TaskStatus, Weekday};
use crate::store::EntityStore;

/// Whether a task with `days` recurs on `date`. No days means weekdays.
pub fn recurs_on(days: &BTreeSet<Weekday>, date: NaiveDate) -> bool {
    let weekday = Weekday::from(date.weekday());
    if days.is_empty() {
        !weekday.is_weekend()
    } else {
        days.contains(&weekday)
    }
}

pub fn should_reset(task: &Task, as_of: NaiveDate) -> bool {
    task.is_recurring
        && task.status == TaskStatus::Done
        && task.last_completed_date != Some(as_of)
        && recurs_on(&task.recurring_days, as_of)
}

/// The task as it should look on `as_of`. Only `status` changes.
pub fn apply_daily_reset(task: &Task, as_of: NaiveDate) -> Task {
    let mut task = task.clone();
    if should_reset(&task, as_of) {
        task.status = TaskStatus::Todo;
    }
    task
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    pub as_of: NaiveDate,
    pub reset: Vec<String>,
}

pub struct RecurrenceScheduler<S> {
    store: S,
}

impl<S: EntityStore> RecurrenceScheduler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reset every due task in one transaction.
    pub fn reset_due_tasks(&self, as_of: NaiveDate) -> Result<ResetReport> {
        let report = self.store.with_transaction(|data| {
            let now = Utc::now();
            let mut reset = Vec::new();
            let mut goals = BTreeSet::new();
            for task in data.tasks_mut() {
                if !should_reset(task, as_of) {
                    continue;
                }
                *task = apply_daily_reset(task, as_of);
                task.updated_at = now;
                reset.push(task.id.clone());
                if let Some(goal_id) = &task.goal_id {
                    goals.insert(goal_id.clone());
                }
            }
            for goal_id in &goals {
                refresh_progress(data, goal_id);
            }
            Ok(ResetReport { as_of, reset })
        })?;

        info!(as_of = %as_of, reset = report.reset.len(), "recurring tasks reset");
        Ok(report)
    }
}
