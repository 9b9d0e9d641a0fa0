//! focus goal command implementations.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::goal::{GoalEdit, GoalService, GoalSummary, NewGoal};
use crate::goal_link::{GoalLinkRegistry, SkipReason};
use crate::model::parse_date;
use crate::output::{emit_success, HumanOutput};

use super::{Context, Globals};

/// Goal subcommands
#[derive(Subcommand, Debug)]
pub enum GoalCommands {
    /// Create a goal in a project
    New(NewArgs),

    /// List a project's goals with their progress
    List {
        /// Project id or unique prefix
        project: String,
    },

    /// Edit goal fields
    Edit(EditArgs),

    /// Make the goal's linked tasks exactly this set (where allowed)
    Relink {
        goal: String,

        /// Task ids; none unlinks every task
        tasks: Vec<String>,
    },

    /// Delete a goal, unlinking its tasks
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct NewArgs {
    pub project: String,
    pub name: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Target date (YYYY-MM-DD)
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    /// New description (empty string clears it)
    #[arg(short, long)]
    pub description: Option<String>,

    /// active, completed or abandoned
    #[arg(long)]
    pub status: Option<String>,

    #[arg(long, conflicts_with = "clear_target")]
    pub target: Option<String>,

    #[arg(long)]
    pub clear_target: bool,
}

#[derive(Serialize)]
struct GoalListOutput {
    total: usize,
    goals: Vec<GoalSummary>,
}

pub fn run(globals: &Globals, command: GoalCommands) -> Result<()> {
    let ctx = Context::load(globals)?;
    let service = GoalService::new(&ctx.store);

    match command {
        GoalCommands::New(args) => {
            let project_id = ctx.resolve(|data| data.resolve_project_id(&args.project))?;
            let goal = service.create(
                &ctx.user,
                NewGoal {
                    project_id,
                    name: args.name,
                    description: args.description,
                    target_date: args.target.as_deref().map(parse_date).transpose()?,
                },
            )?;
            let mut human = HumanOutput::new("focus goal new: created");
            human.push_summary("id", goal.id.clone());
            human.push_summary("name", goal.name.clone());
            human.push_next_step(format!("focus goal relink {} <task>...", goal.id));
            emit_success(ctx.output, "goal new", &goal, Some(&human))
        }
        GoalCommands::List { project } => {
            let project_id = ctx.resolve(|data| data.resolve_project_id(&project))?;
            let goals = service.list(&ctx.user, &project_id)?;
            let mut human = HumanOutput::new(format!("focus goal list: {} goal(s)", goals.len()));
            for summary in &goals {
                let goal = &summary.goal;
                human.push_detail(format!(
                    "{} [{}] {} {}% ({} task(s))",
                    goal.id,
                    goal.status,
                    goal.name,
                    goal.progress,
                    summary.linked_tasks.len()
                ));
            }
            let output = GoalListOutput {
                total: goals.len(),
                goals,
            };
            emit_success(ctx.output, "goal list", &output, Some(&human))
        }
        GoalCommands::Edit(args) => {
            let id = ctx.resolve(|data| data.resolve_goal_id(&args.id))?;
            let goal = service.edit(
                &ctx.user,
                &id,
                GoalEdit {
                    name: args.name,
                    description: args.description,
                    status: args.status.as_deref().map(str::parse).transpose()?,
                    target_date: args.target.as_deref().map(parse_date).transpose()?,
                    clear_target_date: args.clear_target,
                },
            )?;
            let mut human = HumanOutput::new("focus goal edit: updated");
            human.push_summary("id", goal.id.clone());
            human.push_summary("status", goal.status.to_string());
            emit_success(ctx.output, "goal edit", &goal, Some(&human))
        }
        GoalCommands::Relink { goal, tasks } => {
            let goal_id = ctx.resolve(|data| data.resolve_goal_id(&goal))?;
            // Unknown ids pass through unchanged and come back as skipped.
            let tasks = tasks
                .iter()
                .map(|task| match ctx.resolve(|data| data.resolve_task_id(task)) {
                    Ok(id) => Ok(id),
                    Err(Error::NotFound { .. }) => Ok(task.trim().to_string()),
                    Err(err) => Err(err),
                })
                .collect::<Result<Vec<_>>>()?;
            let report =
                GoalLinkRegistry::new(&ctx.store).relink_tasks_to_goal(&ctx.user, &goal_id, &tasks)?;

            let mut human = HumanOutput::new("focus goal relink: done");
            human.push_summary("goal", report.goal_id.clone());
            human.push_summary("linked", report.linked.len().to_string());
            human.push_summary("unlinked", report.unlinked.len().to_string());
            human.push_summary("unchanged", report.unchanged.len().to_string());
            human.push_summary("progress", format!("{}%", report.progress));
            for skipped in &report.skipped {
                let reason = match &skipped.reason {
                    SkipReason::NotFound => "not found".to_string(),
                    SkipReason::OtherProject { project_id } => {
                        format!("belongs to project {project_id}")
                    }
                    SkipReason::LinkedElsewhere { goal_id } => {
                        format!("already linked to {goal_id}")
                    }
                };
                human.push_warning(format!("skipped {}: {reason}", skipped.task_id));
            }
            emit_success(ctx.output, "goal relink", &report, Some(&human))
        }
        GoalCommands::Delete { id } => {
            let id = ctx.resolve(|data| data.resolve_goal_id(&id))?;
            let deletion = GoalLinkRegistry::new(&ctx.store).delete_goal(&ctx.user, &id)?;
            let mut human = HumanOutput::new("focus goal delete: deleted");
            human.push_summary("id", deletion.goal.id.clone());
            human.push_summary("tasks unlinked", deletion.unlinked_tasks.len().to_string());
            emit_success(ctx.output, "goal delete", &deletion, Some(&human))
        }
    }
}
