//! Entity records shared by every focus service.
//!
//! Roles, statuses and weekdays are closed enums; the string forms used on
//! disk and on the command line are the lower-case snake_case names.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

pub const PROJECT_ID_PREFIX: &str = "prj";
pub const TASK_ID_PREFIX: &str = "tsk";
pub const GOAL_ID_PREFIX: &str = "gol";
pub const INVITATION_ID_PREFIX: &str = "inv";

/// Generate a fresh, sortable id such as `prj-01j0...`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Ulid::new().to_string().to_ascii_lowercase())
}

macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let needle = s.trim().to_ascii_lowercase().replace('-', "_");
                $name::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str() == needle)
                    .ok_or_else(|| {
                        let expected: Vec<&str> =
                            $name::ALL.iter().map(|value| value.as_str()).collect();
                        Error::Validation(format!(
                            "unknown {} '{}' (expected {})",
                            $label,
                            s.trim(),
                            expected.join("|")
                        ))
                    })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

string_enum!(TaskStatus, "task status", {
    Todo => "todo",
    InProgress => "in_progress",
    Done => "done",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

string_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
    Abandoned,
}

string_enum!(GoalStatus, "goal status", {
    Active => "active",
    Completed => "completed",
    Abandoned => "abandoned",
});

/// Role stored on a collaborator row. The project owner is never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

string_enum!(Role, "role", {
    Viewer => "viewer",
    Editor => "editor",
    Admin => "admin",
});

/// Effective access a user holds on a project, ordered from least to most.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    None,
    Viewer,
    Editor,
    Admin,
    Owner,
}

string_enum!(AccessLevel, "access level", {
    None => "none",
    Viewer => "viewer",
    Editor => "editor",
    Admin => "admin",
    Owner => "owner",
});

impl From<Role> for AccessLevel {
    fn from(role: Role) -> Self {
        match role {
            Role::Viewer => AccessLevel::Viewer,
            Role::Editor => AccessLevel::Editor,
            Role::Admin => AccessLevel::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Revoked,
}

string_enum!(InvitationStatus, "invitation status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Revoked => "revoked",
});

/// Day of the week, Monday first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

string_enum!(Weekday, "weekday", {
    Monday => "monday",
    Tuesday => "tuesday",
    Wednesday => "wednesday",
    Thursday => "thursday",
    Friday => "friday",
    Saturday => "saturday",
    Sunday => "sunday",
});

impl Weekday {
    pub fn is_weekend(&self) -> bool {
        matches!(self, Weekday::Saturday | Weekday::Sunday)
    }

    /// Accept full names plus the three-letter abbreviations (`mon`, `tue`, ...).
    pub fn parse_loose(input: &str) -> Result<Self> {
        let needle = input.trim().to_ascii_lowercase();
        if needle.len() >= 3 {
            if let Some(day) = Weekday::ALL
                .iter()
                .copied()
                .find(|day| day.as_str().starts_with(&needle))
            {
                return Ok(day);
            }
        }
        needle.parse()
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collaborator {
    pub project_id: String,
    pub user_id: String,
    pub role: Role,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_sacred: bool,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn collaborator(&self, user_id: &str) -> Option<&Collaborator> {
        self.collaborators
            .iter()
            .find(|collaborator| collaborator.user_id == user_id)
    }

    /// Counts toward the owner's sacred cap.
    pub fn occupies_sacred_slot(&self) -> bool {
        self.is_sacred && !self.is_archived
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(default)]
    pub is_selected_for_today: bool,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_days: BTreeSet<Weekday>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareInvitation {
    pub id: String,
    pub project_id: String,
    pub owner_id: String,
    pub recipient_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyCompletionRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub tasks_selected: u32,
    pub tasks_completed: u32,
    pub fully_completed: bool,
}

impl DailyCompletionRecord {
    pub fn new(
        user_id: impl Into<String>,
        date: NaiveDate,
        tasks_selected: u32,
        tasks_completed: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            tasks_selected,
            tasks_completed,
            fully_completed: tasks_selected > 0 && tasks_completed == tasks_selected,
        }
    }
}

/// Trim a required name, rejecting blank input.
pub fn require_name(kind: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{kind} name cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions are stored as absent.
pub fn normalize_description(description: Option<String>) -> Option<String> {
    let description = description?;
    if description.trim().is_empty() {
        None
    } else {
        Some(description)
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|err| Error::Validation(format!("invalid date '{}': {err}", input.trim())))
}
