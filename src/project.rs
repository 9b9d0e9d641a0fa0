//! Project management.
//!
//! Projects own their tasks, goals, collaborator rows and invitations;
//! deleting a project removes all of them in the same transaction.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::collab::{authorize, role_of, Action};
use crate::error::{Error, Result};
use crate::model::{
    new_id, normalize_description, require_name, AccessLevel, Project, PROJECT_ID_PREFIX,
};
use crate::sacred::{ensure_slot_available, unarchive_within_cap};
use crate::store::{Dataset, EntityStore};

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub sacred: bool,
}

impl NewProject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectEdit {
    pub name: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
    /// Replaces the whole tag set.
    pub tags: Option<Vec<String>>,
}

/// A project together with the caller's access to it.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub access: AccessLevel,
    pub task_count: usize,
    pub goal_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnarchiveOutcome {
    pub project: Project,
    /// The project came back without its sacred flag because the cap was full.
    pub sacred_cleared: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDeletion {
    pub project: Project,
    pub tasks_removed: usize,
    pub goals_removed: usize,
    pub invitations_removed: usize,
}

fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn summarize(data: &Dataset, project: &Project, user: &str) -> ProjectSummary {
    ProjectSummary {
        project: project.clone(),
        access: role_of(project, user),
        task_count: data.tasks_in_project(&project.id).count(),
        goal_count: data.goals_in_project(&project.id).count(),
    }
}

pub struct ProjectService<S> {
    store: S,
}

impl<S: EntityStore> ProjectService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn create(&self, owner: &str, input: NewProject) -> Result<Project> {
        let name = require_name("project", &input.name)?;
        let project = self.store.with_transaction(|data| {
            let now = Utc::now();
            let sort_order = data
                .projects_owned_by(owner)
                .map(|project| project.sort_order + 1)
                .max()
                .unwrap_or(0);
            let project = Project {
                id: new_id(PROJECT_ID_PREFIX),
                owner: owner.to_string(),
                name,
                description: normalize_description(input.description),
                tags: normalize_tags(&input.tags),
                is_archived: false,
                is_sacred: input.sacred,
                sort_order,
                collaborators: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            if project.is_sacred {
                ensure_slot_available(data, owner, &project.id)?;
            }
            data.put_project(project.clone());
            Ok(project)
        })?;

        info!(user = owner, project = %project.id, sacred = project.is_sacred, "project created");
        Ok(project)
    }

    pub fn edit(&self, caller: &str, project_id: &str, edit: ProjectEdit) -> Result<Project> {
        let name = edit
            .name
            .as_deref()
            .map(|name| require_name("project", name))
            .transpose()?;
        let project = self.store.with_transaction(|data| {
            authorize(data, project_id, caller, Action::EditProject)?;
            let project = data.project_mut(project_id)?;
            if let Some(name) = name {
                project.name = name;
            }
            if let Some(description) = edit.description {
                project.description = normalize_description(Some(description));
            }
            if let Some(tags) = &edit.tags {
                project.tags = normalize_tags(tags);
            }
            project.updated_at = Utc::now();
            Ok(project.clone())
        })?;

        info!(user = caller, project = project_id, "project updated");
        Ok(project)
    }

    /// Archive a project. Its sacred flag is kept but stops counting.
    pub fn archive(&self, caller: &str, project_id: &str) -> Result<Project> {
        let project = self.store.with_transaction(|data| {
            authorize(data, project_id, caller, Action::EditProject)?;
            let project = data.project_mut(project_id)?;
            if !project.is_archived {
                project.is_archived = true;
                project.updated_at = Utc::now();
            }
            Ok(project.clone())
        })?;

        info!(user = caller, project = project_id, "project archived");
        Ok(project)
    }

    pub fn unarchive(&self, caller: &str, project_id: &str) -> Result<UnarchiveOutcome> {
        let outcome = self.store.with_transaction(|data| {
            authorize(data, project_id, caller, Action::EditProject)?;
            let sacred_cleared = if data.project(project_id)?.is_archived {
                unarchive_within_cap(data, project_id)?
            } else {
                false
            };
            Ok(UnarchiveOutcome {
                project: data.project(project_id)?.clone(),
                sacred_cleared,
            })
        })?;

        info!(
            user = caller,
            project = project_id,
            sacred_cleared = outcome.sacred_cleared,
            "project unarchived"
        );
        Ok(outcome)
    }

    /// Delete a project and everything it owns. Owner only.
    pub fn delete(&self, caller: &str, project_id: &str) -> Result<ProjectDeletion> {
        let deletion = self.store.with_transaction(|data| {
            if data.project(project_id)?.owner != caller {
                return Err(Error::Authorization {
                    user: caller.to_string(),
                    action: "delete the project".to_string(),
                    project: project_id.to_string(),
                });
            }

            let task_ids: Vec<String> = data
                .tasks_in_project(project_id)
                .map(|task| task.id.clone())
                .collect();
            for id in &task_ids {
                data.remove_task(id)?;
            }
            let goal_ids: Vec<String> = data
                .goals_in_project(project_id)
                .map(|goal| goal.id.clone())
                .collect();
            for id in &goal_ids {
                data.remove_goal(id)?;
            }
            let invitations_removed = data.remove_invitations_for_project(project_id);
            let project = data.remove_project(project_id)?;

            Ok(ProjectDeletion {
                project,
                tasks_removed: task_ids.len(),
                goals_removed: goal_ids.len(),
                invitations_removed,
            })
        })?;

        info!(
            user = caller,
            project = project_id,
            tasks = deletion.tasks_removed,
            goals = deletion.goals_removed,
            "project deleted"
        );
        Ok(deletion)
    }

    /// Put the listed projects first, in the given order; the owner's other
    /// projects follow in their previous order.
    pub fn reorder(&self, owner: &str, ordered: &[String]) -> Result<Vec<Project>> {
        let projects = self.store.with_transaction(|data| {
            let mut seen = BTreeSet::new();
            for id in ordered {
                let project = data.project(id)?;
                if project.owner != owner {
                    return Err(Error::Authorization {
                        user: owner.to_string(),
                        action: "reorder another user's project".to_string(),
                        project: id.clone(),
                    });
                }
                if !seen.insert(id.as_str()) {
                    return Err(Error::Validation(format!(
                        "project {id} listed more than once"
                    )));
                }
            }

            let mut rest: Vec<&Project> = data
                .projects_owned_by(owner)
                .filter(|project| !seen.contains(project.id.as_str()))
                .collect();
            rest.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
            let order: Vec<String> = ordered
                .iter()
                .cloned()
                .chain(rest.into_iter().map(|project| project.id.clone()))
                .collect();

            let now = Utc::now();
            let mut projects = Vec::with_capacity(order.len());
            for (position, id) in order.iter().enumerate() {
                let project = data.project_mut(id)?;
                let position = position as i64;
                if project.sort_order != position {
                    project.sort_order = position;
                    project.updated_at = now;
                }
                projects.push(project.clone());
            }
            Ok(projects)
        })?;

        info!(user = owner, count = projects.len(), "projects reordered");
        Ok(projects)
    }

    pub fn get(&self, caller: &str, project_id: &str) -> Result<ProjectSummary> {
        let data = self.store.snapshot()?;
        let project = authorize(&data, project_id, caller, Action::View)?;
        Ok(summarize(&data, project, caller))
    }

    /// Projects `user` owns or collaborates on: sacred first, then
    /// `sort_order`, then name.
    pub fn list(&self, user: &str, include_archived: bool) -> Result<Vec<ProjectSummary>> {
        let data = self.store.snapshot()?;
        let mut projects: Vec<ProjectSummary> = data
            .projects()
            .filter(|project| include_archived || !project.is_archived)
            .filter(|project| role_of(project, user) > AccessLevel::None)
            .map(|project| summarize(&data, project, user))
            .collect();
        projects.sort_by(|a, b| {
            b.project
                .occupies_sacred_slot()
                .cmp(&a.project.occupies_sacred_slot())
                .then_with(|| a.project.sort_order.cmp(&b.project.sort_order))
                .then_with(|| a.project.name.cmp(&b.project.name))
                .then_with(|| a.project.id.cmp(&b.project.id))
        });
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::collab::CollaborationEngine;
    use crate::model::Role;
    use crate::notify::NoopNotifier;
    use crate::store::MemoryStore;
    use crate::task::{NewTask, TaskService};

    fn share(store: &MemoryStore, project_id: &str, user: &str, role: Role) {
        let engine = CollaborationEngine::new(store, NoopNotifier);
        let invitation = engine
            .create_invitation("alice", project_id, &format!("{user}@example.com"), role, None)
            .expect("invite");
        engine.accept(&invitation.id, user).expect("accept");
    }

    #[test]
    fn create_trims_name_and_dedupes_tags() {
        let store = MemoryStore::new();
        let project = ProjectService::new(&store)
            .create(
                "alice",
                NewProject {
                    name: "  Garden ".to_string(),
                    tags: vec![" home".to_string(), "home".to_string(), " ".to_string()],
                    ..NewProject::default()
                },
            )
            .expect("create");
        assert_eq!(project.name, "Garden");
        assert_eq!(project.tags.len(), 1);
        assert!(matches!(
            ProjectService::new(&store).create("alice", NewProject::named("   ")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn creating_sacred_respects_the_cap() {
        let store = MemoryStore::new();
        let projects = ProjectService::new(&store);
        for n in 0..6 {
            projects
                .create(
                    "alice",
                    NewProject {
                        sacred: true,
                        ..NewProject::named(format!("p{n}"))
                    },
                )
                .expect("within cap");
        }
        assert!(matches!(
            projects.create(
                "alice",
                NewProject {
                    sacred: true,
                    ..NewProject::named("p6")
                }
            ),
            Err(Error::CapacityExceeded { .. })
        ));
        assert_eq!(projects.list("alice", true).expect("list").len(), 6);
    }

    #[test]
    fn edit_requires_admin() {
        let store = MemoryStore::new();
        let projects = ProjectService::new(&store);
        let project = projects.create("alice", NewProject::named("garden")).expect("create");
        share(&store, &project.id, "bob", Role::Editor);
        share(&store, &project.id, "carol", Role::Admin);

        let rename = || ProjectEdit {
            name: Some("allotment".to_string()),
            ..ProjectEdit::default()
        };
        assert!(matches!(
            projects.edit("bob", &project.id, rename()),
            Err(Error::Authorization { .. })
        ));
        let edited = projects.edit("carol", &project.id, rename()).expect("admin edit");
        assert_eq!(edited.name, "allotment");
    }

    #[test]
    fn delete_is_owner_only_and_cascades() {
        let store = MemoryStore::new();
        let projects = ProjectService::new(&store);
        let project = projects.create("alice", NewProject::named("garden")).expect("create");
        share(&store, &project.id, "carol", Role::Admin);
        TaskService::new(&store)
            .create("alice", NewTask::new(&project.id, "dig"))
            .expect("task");

        assert!(matches!(
            projects.delete("carol", &project.id),
            Err(Error::Authorization { .. })
        ));
        let deletion = projects.delete("alice", &project.id).expect("delete");
        assert_eq!(deletion.tasks_removed, 1);
        assert_eq!(deletion.invitations_removed, 1);

        let snapshot = store.snapshot().expect("snapshot");
        assert_eq!(snapshot.tasks().count(), 0);
        assert_eq!(snapshot.invitations().count(), 0);
    }

    #[test]
    fn list_orders_sacred_first_and_hides_archived() {
        let store = MemoryStore::new();
        let projects = ProjectService::new(&store);
        let a = projects.create("alice", NewProject::named("a")).expect("a");
        let b = projects.create("alice", NewProject::named("b")).expect("b");
        let c = projects
            .create(
                "alice",
                NewProject {
                    sacred: true,
                    ..NewProject::named("c")
                },
            )
            .expect("c");
        projects.archive("alice", &a.id).expect("archive");

        let listed: Vec<String> = projects
            .list("alice", false)
            .expect("list")
            .into_iter()
            .map(|summary| summary.project.id)
            .collect();
        assert_eq!(listed, vec![c.id.clone(), b.id.clone()]);
        assert_eq!(projects.list("alice", true).expect("list").len(), 3);
        assert!(projects.list("bob", true).expect("list").is_empty());
    }

    #[test]
    fn reorder_assigns_positions() {
        let store = MemoryStore::new();
        let projects = ProjectService::new(&store);
        let a = projects.create("alice", NewProject::named("a")).expect("a");
        let b = projects.create("alice", NewProject::named("b")).expect("b");
        let c = projects.create("alice", NewProject::named("c")).expect("c");

        let ordered = projects
            .reorder("alice", &[c.id.clone(), a.id.clone()])
            .expect("reorder");
        let ids: Vec<&str> = ordered.iter().map(|project| project.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), a.id.as_str(), b.id.as_str()]);
        assert_eq!(ordered[0].sort_order, 0);
        assert_eq!(ordered[2].sort_order, 2);

        let bob = projects.create("bob", NewProject::named("x")).expect("x");
        assert!(matches!(
            projects.reorder("alice", &[bob.id]),
            Err(Error::Authorization { .. })
        ));
    }

    #[test]
    fn viewers_can_see_but_strangers_cannot() {
        let store = MemoryStore::new();
        let projects = ProjectService::new(&store);
        let project = projects.create("alice", NewProject::named("garden")).expect("create");
        share(&store, &project.id, "vera", Role::Viewer);

        let summary = projects.get("vera", &project.id).expect("viewer");
        assert_eq!(summary.access, AccessLevel::Viewer);
        assert!(matches!(
            projects.get("mallory", &project.id),
            Err(Error::Authorization { .. })
        ));
    }
}
