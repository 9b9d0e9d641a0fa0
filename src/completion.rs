//! Daily completion records and the statistics derived from them.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::{DailyCompletionRecord, Task, TaskStatus};
use crate::store::EntityStore;

/// One point of the chronological series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub tasks_completed: u32,
    pub tasks_selected: u32,
    pub completion_percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub user_id: String,
    pub total_days: usize,
    pub fully_completed_days: usize,
    pub completion_rate: u8,
    pub average_tasks_completed: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub series: Vec<DayPoint>,
}

fn percentage(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round().min(100.0) as u8
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Count `user_id`'s day from the tasks they had on it.
pub fn tally<'a>(
    user_id: &str,
    tasks: impl IntoIterator<Item = &'a Task>,
    date: NaiveDate,
) -> DailyCompletionRecord {
    let (selected, completed) = tasks
        .into_iter()
        .filter(|task| task.is_selected_for_today)
        .fold((0u32, 0u32), |(selected, completed), task| {
            (
                selected + 1,
                completed + u32::from(task.status == TaskStatus::Done),
            )
        });
    DailyCompletionRecord::new(user_id, date, selected, completed)
}

/// Aggregate records into totals, streaks and a per-day series.
///
/// Every record given counts; `user_id` only labels the result.
pub fn compute_stats(user_id: &str, records: &[DailyCompletionRecord]) -> Stats {
    let mut records: Vec<&DailyCompletionRecord> = records.iter().collect();
    records.sort_by_key(|record| record.date);

    let total_days = records.len();
    let fully_completed_days = records.iter().filter(|record| record.fully_completed).count();
    let completed_sum: u64 = records
        .iter()
        .map(|record| u64::from(record.tasks_completed))
        .sum();
    let average_tasks_completed = if total_days == 0 {
        0.0
    } else {
        one_decimal(completed_sum as f64 / total_days as f64)
    };

    let mut longest_streak = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for record in &records {
        let consecutive = previous.and_then(|day| day.succ_opt()) == Some(record.date);
        run = match (record.fully_completed, consecutive) {
            (false, _) => 0,
            (true, true) => run + 1,
            (true, false) => 1,
        };
        longest_streak = longest_streak.max(run);
        previous = Some(record.date);
    }

    let series = records
        .iter()
        .map(|record| DayPoint {
            date: record.date,
            tasks_completed: record.tasks_completed,
            tasks_selected: record.tasks_selected,
            completion_percentage: percentage(
                u64::from(record.tasks_completed),
                u64::from(record.tasks_selected),
            ),
        })
        .collect();

    Stats {
        user_id: user_id.to_string(),
        total_days,
        fully_completed_days,
        completion_rate: percentage(fully_completed_days as u64, total_days as u64),
        average_tasks_completed,
        current_streak: run,
        longest_streak,
        series,
    }
}

pub struct CompletionAggregator<S> {
    store: S,
}

impl<S: EntityStore> CompletionAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Tally `tasks` for `date` and overwrite any earlier record for the day.
    pub fn record_day(
        &self,
        user_id: &str,
        tasks: &[Task],
        date: NaiveDate,
    ) -> Result<DailyCompletionRecord> {
        let record = tally(user_id, tasks, date);
        self.store.with_transaction(|data| {
            data.upsert_completion(record.clone());
            Ok(())
        })?;

        info!(
            user = user_id,
            date = %date,
            selected = record.tasks_selected,
            completed = record.tasks_completed,
            "day recorded"
        );
        Ok(record)
    }

    /// Record `date` from the tasks of every project `user_id` owns.
    pub fn record_owned_day(&self, user_id: &str, date: NaiveDate) -> Result<DailyCompletionRecord> {
        let record = self.store.with_transaction(|data| {
            let owned: Vec<&str> = data
                .projects_owned_by(user_id)
                .map(|project| project.id.as_str())
                .collect();
            let record = tally(
                user_id,
                data.tasks()
                    .filter(|task| owned.contains(&task.project_id.as_str())),
                date,
            );
            data.upsert_completion(record.clone());
            Ok(record)
        })?;

        info!(
            user = user_id,
            date = %date,
            selected = record.tasks_selected,
            completed = record.tasks_completed,
            "day recorded"
        );
        Ok(record)
    }

    /// Stats over the records dated within `from..=to`.
    pub fn stats(&self, user_id: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Stats> {
        let data = self.store.snapshot()?;
        let records: Vec<DailyCompletionRecord> = data
            .completions_for(user_id)
            .into_iter()
            .filter(|record| from.map_or(true, |from| record.date >= from))
            .filter(|record| to.map_or(true, |to| record.date <= to))
            .collect();
        Ok(compute_stats(user_id, &records))
    }
}
