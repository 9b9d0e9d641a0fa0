//! focus task command implementations.

use std::collections::BTreeSet;

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::error::Result;
use crate::goal_link::GoalLinkRegistry;
use crate::model::{parse_date, Priority, Task, TaskStatus, Weekday};
use crate::output::{emit_success, HumanOutput};
use crate::recurrence::RecurrenceScheduler;
use crate::task::{NewTask, TaskEdit, TaskFilter, TaskService};

use super::{date_or_today, Context, Globals};

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task in a project
    New(NewArgs),

    /// List tasks you can see
    List(ListArgs),

    /// Edit task fields
    Edit(EditArgs),

    /// Change task status: todo, in_progress, done
    Status {
        id: String,
        status: String,

        /// Completion date recorded when the task becomes done (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Select a task for today, or drop it with --off
    Select {
        id: String,

        #[arg(long)]
        off: bool,
    },

    /// Link a task to a goal; omit the goal to unlink
    Link {
        id: String,
        goal: Option<String>,
    },

    /// Delete a task
    Delete {
        id: String,
    },

    /// Reset finished recurring tasks that recur on the given date
    Reset {
        /// Day to reset for (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Project id or unique prefix
    pub project: String,

    /// Task name
    pub name: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// low, medium or high
    #[arg(long, default_value = "medium")]
    pub priority: String,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,

    /// Repeat the task after it is done
    #[arg(long)]
    pub recurring: bool,

    /// Days the task recurs on, comma separated (default Monday to Friday)
    #[arg(long, value_delimiter = ',', requires = "recurring")]
    pub days: Vec<String>,

    /// Goal id or unique prefix
    #[arg(long)]
    pub goal: Option<String>,

    /// Select the task for today
    #[arg(long)]
    pub select: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub goal: Option<String>,

    /// Only tasks selected for today
    #[arg(long)]
    pub selected: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    /// New description (empty string clears it)
    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long)]
    pub clear_due: bool,

    /// Turn recurrence on or off
    #[arg(long)]
    pub recurring: Option<bool>,

    /// Replace recurring days, comma separated
    #[arg(long, value_delimiter = ',')]
    pub days: Vec<String>,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

fn parse_days(raw: &[String]) -> Result<BTreeSet<Weekday>> {
    raw.iter()
        .filter(|day| !day.trim().is_empty())
        .map(|day| Weekday::parse_loose(day))
        .collect()
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<chrono::NaiveDate>> {
    raw.map(parse_date).transpose()
}

pub fn run(globals: &Globals, command: TaskCommands) -> Result<()> {
    let ctx = Context::load(globals)?;
    let service = TaskService::new(&ctx.store);

    match command {
        TaskCommands::New(args) => {
            let project_id = ctx.resolve(|data| data.resolve_project_id(&args.project))?;
            let goal_id = args
                .goal
                .as_deref()
                .map(|goal| ctx.resolve(|data| data.resolve_goal_id(goal)))
                .transpose()?;
            let task = service.create(
                &ctx.user,
                NewTask {
                    project_id,
                    name: args.name,
                    description: args.description,
                    priority: args.priority.parse::<Priority>()?,
                    due_date: parse_optional_date(args.due.as_deref())?,
                    is_recurring: args.recurring,
                    recurring_days: parse_days(&args.days)?,
                    goal_id,
                    selected: args.select,
                },
            )?;
            let mut human = HumanOutput::new("focus task new: created");
            human.push_summary("id", task.id.clone());
            human.push_summary("name", task.name.clone());
            human.push_summary("project", task.project_id.clone());
            if let Some(goal_id) = &task.goal_id {
                human.push_summary("goal", goal_id.clone());
            }
            emit_success(ctx.output, "task new", &task, Some(&human))
        }
        TaskCommands::List(args) => {
            let filter = TaskFilter {
                project_id: args
                    .project
                    .as_deref()
                    .map(|project| ctx.resolve(|data| data.resolve_project_id(project)))
                    .transpose()?,
                status: args.status.as_deref().map(str::parse).transpose()?,
                goal_id: args
                    .goal
                    .as_deref()
                    .map(|goal| ctx.resolve(|data| data.resolve_goal_id(goal)))
                    .transpose()?,
                selected_only: args.selected,
            };
            let tasks = service.list(&ctx.user, &filter)?;
            let mut human = HumanOutput::new(format!("focus task list: {} task(s)", tasks.len()));
            for task in &tasks {
                human.push_detail(describe(task));
            }
            let output = TaskListOutput {
                total: tasks.len(),
                tasks,
            };
            emit_success(ctx.output, "task list", &output, Some(&human))
        }
        TaskCommands::Edit(args) => {
            let id = ctx.resolve(|data| data.resolve_task_id(&args.id))?;
            let task = service.edit(
                &ctx.user,
                &id,
                TaskEdit {
                    name: args.name,
                    description: args.description,
                    priority: args.priority.as_deref().map(str::parse).transpose()?,
                    due_date: parse_optional_date(args.due.as_deref())?,
                    clear_due_date: args.clear_due,
                    is_recurring: args.recurring,
                    recurring_days: if args.days.is_empty() {
                        None
                    } else {
                        Some(parse_days(&args.days)?)
                    },
                },
            )?;
            let mut human = HumanOutput::new("focus task edit: updated");
            human.push_summary("id", task.id.clone());
            human.push_summary("name", task.name.clone());
            emit_success(ctx.output, "task edit", &task, Some(&human))
        }
        TaskCommands::Status { id, status, date } => {
            let id = ctx.resolve(|data| data.resolve_task_id(&id))?;
            let status: TaskStatus = status.parse()?;
            let today = date_or_today(date.as_deref())?;
            let task = service.set_status(&ctx.user, &id, status, today)?;
            let mut human = HumanOutput::new(format!("focus task status: {}", task.status));
            human.push_summary("id", task.id.clone());
            if let Some(completed) = task.last_completed_date {
                human.push_summary("last completed", completed.to_string());
            }
            emit_success(ctx.output, "task status", &task, Some(&human))
        }
        TaskCommands::Select { id, off } => {
            let id = ctx.resolve(|data| data.resolve_task_id(&id))?;
            let task = service.select(&ctx.user, &id, !off)?;
            let header = if task.is_selected_for_today {
                "focus task select: selected for today"
            } else {
                "focus task select: unselected"
            };
            let mut human = HumanOutput::new(header);
            human.push_summary("id", task.id.clone());
            emit_success(ctx.output, "task select", &task, Some(&human))
        }
        TaskCommands::Link { id, goal } => {
            let id = ctx.resolve(|data| data.resolve_task_id(&id))?;
            let goal_id = goal
                .as_deref()
                .map(|goal| ctx.resolve(|data| data.resolve_goal_id(goal)))
                .transpose()?;
            let task = GoalLinkRegistry::new(&ctx.store).link_task_to_goal(
                &ctx.user,
                &id,
                goal_id.as_deref(),
            )?;
            let header = match &task.goal_id {
                Some(_) => "focus task link: linked",
                None => "focus task link: unlinked",
            };
            let mut human = HumanOutput::new(header);
            human.push_summary("id", task.id.clone());
            if let Some(goal_id) = &task.goal_id {
                human.push_summary("goal", goal_id.clone());
            }
            emit_success(ctx.output, "task link", &task, Some(&human))
        }
        TaskCommands::Delete { id } => {
            let id = ctx.resolve(|data| data.resolve_task_id(&id))?;
            let task = service.delete(&ctx.user, &id)?;
            let mut human = HumanOutput::new("focus task delete: deleted");
            human.push_summary("id", task.id.clone());
            emit_success(ctx.output, "task delete", &task, Some(&human))
        }
        TaskCommands::Reset { date } => {
            let as_of = date_or_today(date.as_deref())?;
            let report = RecurrenceScheduler::new(&ctx.store).reset_due_tasks(as_of)?;
            let mut human = HumanOutput::new(format!(
                "focus task reset: {} task(s) reset for {}",
                report.reset.len(),
                report.as_of
            ));
            for id in &report.reset {
                human.push_detail(id.clone());
            }
            emit_success(ctx.output, "task reset", &report, Some(&human))
        }
    }
}

fn describe(task: &Task) -> String {
    let mut line = format!("{} [{}] {} ({})", task.id, task.status, task.name, task.priority);
    if task.is_selected_for_today {
        line.push_str(" *today*");
    }
    if task.is_recurring {
        line.push_str(" recurring");
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {due}"));
    }
    line
}
