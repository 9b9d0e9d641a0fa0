//! Goals and their derived progress.
//!
//! Deleting a goal lives in [`crate::goal_link`], next to the unlink cascade.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::collab::{authorize, Action};
use crate::error::Result;
use crate::model::{
    new_id, normalize_description, require_name, Goal, GoalStatus, TaskStatus, GOAL_ID_PREFIX,
};
use crate::store::{Dataset, EntityStore};

/// round(done linked / linked × 100); 0 with nothing linked.
pub fn compute_progress(data: &Dataset, goal_id: &str) -> u8 {
    let (linked, done) = data
        .tasks_linked_to(goal_id)
        .fold((0usize, 0usize), |(linked, done), task| {
            (linked + 1, done + usize::from(task.status == TaskStatus::Done))
        });
    if linked == 0 {
        return 0;
    }
    (done as f64 / linked as f64 * 100.0).round() as u8
}

/// Store the recomputed progress on the goal, if it still exists.
pub fn refresh_progress(data: &mut Dataset, goal_id: &str) {
    let progress = compute_progress(data, goal_id);
    if let Ok(goal) = data.goal_mut(goal_id) {
        if goal.progress != progress {
            goal.progress = progress;
            goal.updated_at = Utc::now();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewGoal {
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalEdit {
    pub name: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
    pub status: Option<GoalStatus>,
    pub target_date: Option<NaiveDate>,
    pub clear_target_date: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalSummary {
    #[serde(flatten)]
    pub goal: Goal,
    pub linked_tasks: Vec<String>,
}

pub struct GoalService<S> {
    store: S,
}

impl<S: EntityStore> GoalService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn create(&self, caller: &str, input: NewGoal) -> Result<Goal> {
        let name = require_name("goal", &input.name)?;
        let goal = self.store.with_transaction(|data| {
            authorize(data, &input.project_id, caller, Action::EditWork)?;
            let now = Utc::now();
            let goal = Goal {
                id: new_id(GOAL_ID_PREFIX),
                project_id: input.project_id.clone(),
                name,
                description: normalize_description(input.description),
                status: GoalStatus::Active,
                target_date: input.target_date,
                progress: 0,
                created_at: now,
                updated_at: now,
            };
            data.put_goal(goal.clone());
            Ok(goal)
        })?;

        info!(user = caller, project = %goal.project_id, goal = %goal.id, "goal created");
        Ok(goal)
    }

    pub fn edit(&self, caller: &str, goal_id: &str, edit: GoalEdit) -> Result<Goal> {
        let name = edit
            .name
            .as_deref()
            .map(|name| require_name("goal", name))
            .transpose()?;
        let goal = self.store.with_transaction(|data| {
            let project_id = data.goal(goal_id)?.project_id.clone();
            authorize(data, &project_id, caller, Action::EditWork)?;

            let goal = data.goal_mut(goal_id)?;
            if let Some(name) = name {
                goal.name = name;
            }
            if let Some(description) = edit.description {
                goal.description = normalize_description(Some(description));
            }
            if let Some(status) = edit.status {
                goal.status = status;
            }
            if edit.clear_target_date {
                goal.target_date = None;
            } else if let Some(date) = edit.target_date {
                goal.target_date = Some(date);
            }
            goal.updated_at = Utc::now();
            Ok(goal.clone())
        })?;

        info!(user = caller, goal = goal_id, "goal updated");
        Ok(goal)
    }

    pub fn get(&self, caller: &str, goal_id: &str) -> Result<GoalSummary> {
        let data = self.store.snapshot()?;
        let goal = data.goal(goal_id)?;
        authorize(&data, &goal.project_id, caller, Action::View)?;
        Ok(summarize(&data, goal))
    }

    /// Goals of a project ordered by creation.
    pub fn list(&self, caller: &str, project_id: &str) -> Result<Vec<GoalSummary>> {
        let data = self.store.snapshot()?;
        authorize(&data, project_id, caller, Action::View)?;
        let mut goals: Vec<GoalSummary> = data
            .goals_in_project(project_id)
            .map(|goal| summarize(&data, goal))
            .collect();
        goals.sort_by(|a, b| {
            a.goal
                .created_at
                .cmp(&b.goal.created_at)
                .then_with(|| a.goal.id.cmp(&b.goal.id))
        });
        Ok(goals)
    }
}

fn summarize(data: &Dataset, goal: &Goal) -> GoalSummary {
    GoalSummary {
        goal: goal.clone(),
        linked_tasks: data
            .tasks_linked_to(&goal.id)
            .map(|task| task.id.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::project::{NewProject, ProjectService};
    use crate::store::MemoryStore;
    use crate::task::{NewTask, TaskService};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).expect("date")
    }

    #[test]
    fn progress_tracks_done_linked_tasks() {
        let store = MemoryStore::new();
        let project = ProjectService::new(&store)
            .create("alice", NewProject::named("garden"))
            .expect("project");
        let goals = GoalService::new(&store);
        let goal = goals
            .create(
                "alice",
                NewGoal {
                    project_id: project.id.clone(),
                    name: "Harvest".to_string(),
                    ..NewGoal::default()
                },
            )
            .expect("goal");

        let tasks = TaskService::new(&store);
        let mut ids = Vec::new();
        for name in ["dig", "plant", "water"] {
            let task = tasks
                .create(
                    "alice",
                    NewTask {
                        goal_id: Some(goal.id.clone()),
                        ..NewTask::new(&project.id, name)
                    },
                )
                .expect("task");
            ids.push(task.id);
        }
        assert_eq!(goals.get("alice", &goal.id).expect("goal").goal.progress, 0);

        tasks
            .set_status("alice", &ids[0], TaskStatus::Done, today())
            .expect("done");
        let summary = goals.get("alice", &goal.id).expect("goal");
        assert_eq!(summary.goal.progress, 33);
        assert_eq!(summary.linked_tasks.len(), 3);

        tasks
            .set_status("alice", &ids[1], TaskStatus::Done, today())
            .expect("done");
        assert_eq!(goals.get("alice", &goal.id).expect("goal").goal.progress, 67);
    }

    #[test]
    fn viewers_cannot_create_goals() {
        let store = MemoryStore::new();
        let project = ProjectService::new(&store)
            .create("alice", NewProject::named("garden"))
            .expect("project");
        let err = GoalService::new(&store)
            .create(
                "mallory",
                NewGoal {
                    project_id: project.id,
                    name: "Steal".to_string(),
                    ..NewGoal::default()
                },
            )
            .expect_err("no access");
        assert!(matches!(err, Error::Authorization { .. }));
    }

    #[test]
    fn edit_updates_fields_and_rejects_blank_name() {
        let store = MemoryStore::new();
        let project = ProjectService::new(&store)
            .create("alice", NewProject::named("garden"))
            .expect("project");
        let goals = GoalService::new(&store);
        let goal = goals
            .create(
                "alice",
                NewGoal {
                    project_id: project.id,
                    name: "Harvest".to_string(),
                    target_date: Some(today()),
                    ..NewGoal::default()
                },
            )
            .expect("goal");

        let edited = goals
            .edit(
                "alice",
                &goal.id,
                GoalEdit {
                    status: Some(GoalStatus::Completed),
                    clear_target_date: true,
                    ..GoalEdit::default()
                },
            )
            .expect("edit");
        assert_eq!(edited.status, GoalStatus::Completed);
        assert_eq!(edited.target_date, None);

        assert!(matches!(
            goals.edit(
                "alice",
                &goal.id,
                GoalEdit {
                    name: Some("  ".to_string()),
                    ..GoalEdit::default()
                }
            ),
            Err(Error::Validation(_))
        ));
    }
}
