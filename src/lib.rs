//! focus - Focus-Capped Project Tracking Library
//!
//! This library provides the domain services behind the focus CLI: projects
//! with at most six "sacred" slots per owner, tasks and goals, project
//! sharing, recurring tasks and daily completion statistics.
//!
//! # Core Concepts
//!
//! - **Sacred projects**: an owner's top-priority work, capped at six
//! - **Goal links**: a task counts toward at most one goal of its project
//! - **Sharing**: invitations grant viewer, editor or admin roles
//! - **Recurrence**: finished recurring tasks reopen on their days
//! - **Completion**: one record per user and day, rolled up into streaks
//!
//! # Module Organization
//!
//! - `store`: the `EntityStore` seam, `Dataset` and the in-memory backend
//! - `storage`: on-disk layout and the file-backed store
//! - `sacred`: the per-owner sacred cap
//! - `goal_link`: task to goal linkage and the goal-delete cascade
//! - `collab`: roles, authorization and the invitation lifecycle
//! - `recurrence`: daily reset of recurring tasks
//! - `completion`: daily records and statistics
//! - `project`, `task`, `goal`: CRUD services over the store
//! - `notify`: invitation notices
//! - `cli`: Command-line interface using clap

pub mod actor;
pub mod cli;
pub mod collab;
pub mod completion;
pub mod config;
pub mod error;
pub mod goal;
pub mod goal_link;
pub mod lock;
pub mod model;
pub mod notify;
pub mod output;
pub mod project;
pub mod recurrence;
pub mod sacred;
pub mod storage;
pub mod store;
pub mod task;

pub use error::{Error, Result};
