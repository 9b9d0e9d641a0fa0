//! focus project command implementations.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::project::{NewProject, ProjectEdit, ProjectService, ProjectSummary};
use crate::sacred::{CardinalityGuard, SACRED_LIMIT};

use super::{Context, Globals};

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project owned by the acting user
    New(NewArgs),

    /// List projects you own or collaborate on
    List {
        /// Include archived projects
        #[arg(long)]
        all: bool,
    },

    /// Show one project
    Show {
        /// Project id or unique prefix
        id: String,
    },

    /// Edit name, description or tags
    Edit(EditArgs),

    /// Archive a project (its sacred flag stops counting)
    Archive {
        id: String,
    },

    /// Bring an archived project back
    Unarchive {
        id: String,
    },

    /// Mark or unmark a project as sacred
    Sacred {
        id: String,

        /// Remove the sacred flag instead of setting it
        #[arg(long)]
        off: bool,
    },

    /// Delete a project with its tasks, goals and invitations
    Delete {
        id: String,
    },

    /// Put the given projects first, in this order
    Reorder {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Project name
    pub name: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Create the project as sacred
    #[arg(long)]
    pub sacred: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    /// New description (empty string clears it)
    #[arg(short, long)]
    pub description: Option<String>,

    /// Replace tags (repeatable)
    #[arg(long = "tag", conflicts_with = "clear_tags")]
    pub tags: Vec<String>,

    /// Remove every tag
    #[arg(long)]
    pub clear_tags: bool,
}

#[derive(Serialize)]
struct ProjectListOutput {
    total: usize,
    sacred_slots_used: usize,
    sacred_limit: usize,
    projects: Vec<ProjectSummary>,
}

pub fn run(globals: &Globals, command: ProjectCommands) -> Result<()> {
    let ctx = Context::load(globals)?;
    let service = ProjectService::new(&ctx.store);

    match command {
        ProjectCommands::New(args) => {
            let project = service.create(
                &ctx.user,
                NewProject {
                    name: args.name,
                    description: args.description,
                    tags: args.tags,
                    sacred: args.sacred,
                },
            )?;
            let mut human = HumanOutput::new("focus project new: created");
            human.push_summary("id", project.id.clone());
            human.push_summary("name", project.name.clone());
            if project.is_sacred {
                human.push_summary("sacred", "yes");
            }
            human.push_next_step(format!("focus task new {} <name>", project.id));
            emit_success(ctx.output, "project new", &project, Some(&human))
        }
        ProjectCommands::List { all } => {
            let projects = service.list(&ctx.user, all)?;
            let sacred_slots_used = CardinalityGuard::new(&ctx.store).slots_used(&ctx.user)?;
            let mut human = HumanOutput::new(format!("focus project list: {} project(s)", projects.len()));
            human.push_summary("sacred", format!("{sacred_slots_used}/{SACRED_LIMIT}"));
            for summary in &projects {
                human.push_detail(describe(summary));
            }
            let output = ProjectListOutput {
                total: projects.len(),
                sacred_slots_used,
                sacred_limit: SACRED_LIMIT,
                projects,
            };
            emit_success(ctx.output, "project list", &output, Some(&human))
        }
        ProjectCommands::Show { id } => {
            let id = ctx.resolve(|data| data.resolve_project_id(&id))?;
            let summary = service.get(&ctx.user, &id)?;
            let project = &summary.project;
            let mut human = HumanOutput::new(format!("focus project show: {}", project.name));
            human.push_summary("id", project.id.clone());
            human.push_summary("owner", project.owner.clone());
            human.push_summary("access", summary.access.to_string());
            if let Some(description) = &project.description {
                human.push_summary("description", description.clone());
            }
            if !project.tags.is_empty() {
                let tags: Vec<&str> = project.tags.iter().map(String::as_str).collect();
                human.push_summary("tags", tags.join(", "));
            }
            human.push_summary("sacred", yes_no(project.is_sacred));
            human.push_summary("archived", yes_no(project.is_archived));
            human.push_summary("tasks", summary.task_count.to_string());
            human.push_summary("goals", summary.goal_count.to_string());
            for collaborator in &project.collaborators {
                human.push_detail(format!("{} ({})", collaborator.user_id, collaborator.role));
            }
            emit_success(ctx.output, "project show", &summary, Some(&human))
        }
        ProjectCommands::Edit(args) => {
            let id = ctx.resolve(|data| data.resolve_project_id(&args.id))?;
            let tags = if args.clear_tags {
                Some(Vec::new())
            } else if args.tags.is_empty() {
                None
            } else {
                Some(args.tags)
            };
            let project = service.edit(
                &ctx.user,
                &id,
                ProjectEdit {
                    name: args.name,
                    description: args.description,
                    tags,
                },
            )?;
            let mut human = HumanOutput::new("focus project edit: updated");
            human.push_summary("id", project.id.clone());
            human.push_summary("name", project.name.clone());
            emit_success(ctx.output, "project edit", &project, Some(&human))
        }
        ProjectCommands::Archive { id } => {
            let id = ctx.resolve(|data| data.resolve_project_id(&id))?;
            let project = service.archive(&ctx.user, &id)?;
            let mut human = HumanOutput::new("focus project archive: archived");
            human.push_summary("id", project.id.clone());
            emit_success(ctx.output, "project archive", &project, Some(&human))
        }
        ProjectCommands::Unarchive { id } => {
            let id = ctx.resolve(|data| data.resolve_project_id(&id))?;
            let outcome = service.unarchive(&ctx.user, &id)?;
            let mut human = HumanOutput::new("focus project unarchive: restored");
            human.push_summary("id", outcome.project.id.clone());
            if outcome.sacred_cleared {
                human.push_warning(format!(
                    "sacred flag cleared: {SACRED_LIMIT} sacred projects already active"
                ));
            }
            emit_success(ctx.output, "project unarchive", &outcome, Some(&human))
        }
        ProjectCommands::Sacred { id, off } => {
            let id = ctx.resolve(|data| data.resolve_project_id(&id))?;
            let project = CardinalityGuard::new(&ctx.store).apply_sacred_toggle(&ctx.user, &id, !off)?;
            let header = if project.is_sacred {
                "focus project sacred: marked sacred"
            } else {
                "focus project sacred: unmarked"
            };
            let mut human = HumanOutput::new(header);
            human.push_summary("id", project.id.clone());
            emit_success(ctx.output, "project sacred", &project, Some(&human))
        }
        ProjectCommands::Delete { id } => {
            let id = ctx.resolve(|data| data.resolve_project_id(&id))?;
            let deletion = service.delete(&ctx.user, &id)?;
            let mut human = HumanOutput::new("focus project delete: deleted");
            human.push_summary("id", deletion.project.id.clone());
            human.push_summary("tasks removed", deletion.tasks_removed.to_string());
            human.push_summary("goals removed", deletion.goals_removed.to_string());
            human.push_summary("invitations removed", deletion.invitations_removed.to_string());
            emit_success(ctx.output, "project delete", &deletion, Some(&human))
        }
        ProjectCommands::Reorder { ids } => {
            let ids = ids
                .iter()
                .map(|id| ctx.resolve(|data| data.resolve_project_id(id)))
                .collect::<Result<Vec<_>>>()?;
            let projects = service.reorder(&ctx.user, &ids)?;
            let mut human = HumanOutput::new("focus project reorder: updated");
            for project in &projects {
                human.push_detail(format!("{} {} {}", project.sort_order, project.id, project.name));
            }
            emit_success(ctx.output, "project reorder", &projects, Some(&human))
        }
    }
}

fn describe(summary: &ProjectSummary) -> String {
    let project = &summary.project;
    let mut markers = Vec::new();
    if project.is_sacred {
        markers.push("sacred");
    }
    if project.is_archived {
        markers.push("archived");
    }
    let markers = if markers.is_empty() {
        String::new()
    } else {
        format!(" [{}]", markers.join(", "))
    };
    format!(
        "{} {}{} ({}, {} task(s))",
        project.id, project.name, markers, summary.access, summary.task_count
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
