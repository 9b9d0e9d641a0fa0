//! focus stats command implementations.

use chrono::Days;
use clap::Subcommand;

use crate::completion::CompletionAggregator;
use crate::error::{Error, Result};
use crate::model::parse_date;
use crate::output::{emit_success, HumanOutput};

use super::{date_or_today, Context, Globals};

/// Stats subcommands
#[derive(Subcommand, Debug)]
pub enum StatsCommands {
    /// Record a day from the selected tasks of your projects
    Record {
        /// Day to record (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show completion statistics
    Show {
        /// Trailing window in days ending at --to (default from focus.toml)
        #[arg(long, conflicts_with = "from")]
        days: Option<u32>,

        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last day included (YYYY-MM-DD, default today)
        #[arg(long)]
        to: Option<String>,
    },
}

pub fn run(globals: &Globals, command: StatsCommands) -> Result<()> {
    let ctx = Context::load(globals)?;
    let aggregator = CompletionAggregator::new(&ctx.store);

    match command {
        StatsCommands::Record { date } => {
            let date = date_or_today(date.as_deref())?;
            let record = aggregator.record_owned_day(&ctx.user, date)?;
            let mut human = HumanOutput::new(format!("focus stats record: {date}"));
            human.push_summary("selected", record.tasks_selected.to_string());
            human.push_summary("completed", record.tasks_completed.to_string());
            human.push_summary("fully completed", if record.fully_completed { "yes" } else { "no" });
            emit_success(ctx.output, "stats record", &record, Some(&human))
        }
        StatsCommands::Show { days, from, to } => {
            let to = date_or_today(to.as_deref())?;
            let from = match from.as_deref() {
                Some(raw) => parse_date(raw)?,
                None => {
                    let days = days.unwrap_or(ctx.config.stats.window_days);
                    if days == 0 {
                        return Err(Error::Validation("--days must be > 0".to_string()));
                    }
                    to.checked_sub_days(Days::new(u64::from(days) - 1))
                        .ok_or_else(|| {
                            Error::Validation(format!(
                                "a {days}-day window ending {to} starts before the earliest date"
                            ))
                        })?
                }
            };
            if from > to {
                return Err(Error::Validation(format!(
                    "window start {from} is after its end {to}"
                )));
            }

            let stats = aggregator.stats(&ctx.user, Some(from), Some(to))?;
            let mut human = HumanOutput::new(format!("focus stats show: {from} to {to}"));
            human.push_summary("days recorded", stats.total_days.to_string());
            human.push_summary("fully completed", stats.fully_completed_days.to_string());
            human.push_summary("completion rate", format!("{}%", stats.completion_rate));
            human.push_summary(
                "average completed",
                format!("{:.1}", stats.average_tasks_completed),
            );
            human.push_summary("current streak", stats.current_streak.to_string());
            human.push_summary("longest streak", stats.longest_streak.to_string());
            for point in &stats.series {
                human.push_detail(format!(
                    "{} {}/{} ({}%)",
                    point.date, point.tasks_completed, point.tasks_selected, point.completion_percentage
                ));
            }
            if stats.total_days == 0 {
                human.push_next_step("focus stats record");
            }
            emit_success(ctx.output, "stats show", &stats, Some(&human))
        }
    }
}
