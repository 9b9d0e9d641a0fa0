//! Sacred project cap.
//!
//! An owner may hold at most [`SACRED_LIMIT`] projects that are both sacred
//! and not archived. Counting happens inside the store transaction that
//! writes the flag, so two concurrent toggles cannot both take the last slot.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::Project;
use crate::store::{Dataset, EntityStore};

pub const SACRED_LIMIT: usize = 6;

/// Sacred, non-archived projects owned by `owner`, ignoring `exclude`.
pub fn occupied_slots(data: &Dataset, owner: &str, exclude: &str) -> usize {
    data.projects_owned_by(owner)
        .filter(|project| project.id != exclude && project.occupies_sacred_slot())
        .count()
}

/// Fail with `CapacityExceeded` when `owner` has no free slot for `project_id`.
pub fn ensure_slot_available(data: &Dataset, owner: &str, project_id: &str) -> Result<()> {
    let occupied = occupied_slots(data, owner, project_id);
    if occupied >= SACRED_LIMIT {
        debug!(user = owner, project = project_id, occupied, "sacred cap reached");
        return Err(Error::CapacityExceeded {
            user: owner.to_string(),
            limit: SACRED_LIMIT,
        });
    }
    Ok(())
}

/// Un-archive `project_id`. A sacred project that no longer fits under the
/// cap comes back with `is_sacred` cleared; returns whether that happened.
pub fn unarchive_within_cap(data: &mut Dataset, project_id: &str) -> Result<bool> {
    let project = data.project(project_id)?;
    let owner = project.owner.clone();
    let over_cap = project.is_sacred && occupied_slots(data, &owner, project_id) >= SACRED_LIMIT;

    let project = data.project_mut(project_id)?;
    project.is_archived = false;
    if over_cap {
        project.is_sacred = false;
    }
    project.updated_at = Utc::now();
    Ok(over_cap)
}

fn require_owner(project: &Project, user: &str) -> Result<()> {
    if project.owner != user {
        return Err(Error::Authorization {
            user: user.to_string(),
            action: "change the sacred flag".to_string(),
            project: project.id.clone(),
        });
    }
    Ok(())
}

/// Enforces the per-owner sacred cap.
pub struct CardinalityGuard<S> {
    store: S,
}

impl<S: EntityStore> CardinalityGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether `user` could mark `project_id` sacred right now.
    pub fn can_mark_sacred(&self, user: &str, project_id: &str) -> Result<bool> {
        let data = self.store.snapshot()?;
        let project = data.project(project_id)?;
        if project.owner != user {
            return Ok(false);
        }
        Ok(occupied_slots(&data, user, project_id) < SACRED_LIMIT)
    }

    /// Set `is_sacred` to `desired`, refusing when the owner's cap is full.
    pub fn apply_sacred_toggle(&self, user: &str, project_id: &str, desired: bool) -> Result<Project> {
        let project = self.store.with_transaction(|data| {
            require_owner(data.project(project_id)?, user)?;
            if desired {
                ensure_slot_available(data, user, project_id)?;
            }
            let project = data.project_mut(project_id)?;
            if project.is_sacred != desired {
                project.is_sacred = desired;
                project.updated_at = Utc::now();
            }
            Ok(project.clone())
        })?;

        info!(user, project = project_id, sacred = desired, "sacred flag set");
        Ok(project)
    }

    /// Number of slots `user` currently occupies.
    pub fn slots_used(&self, user: &str) -> Result<usize> {
        let data = self.store.snapshot()?;
        Ok(occupied_slots(&data, user, ""))
    }
}
