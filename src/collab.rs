//! Project collaboration: effective roles, the authorization table and the
//! share invitation lifecycle.
//!
//! ```text
//!            accept            revoke
//! pending ──────────▶ accepted ───────▶ revoked
//!    │ reject                             ▲
//!    ├──────────▶ rejected                │
//!    └────────────────────────────────────┘ revoke
//! ```
//!
//! Every transition re-reads the invitation inside the store transaction and
//! only proceeds from the expected status, so two racing calls cannot both
//! apply their side effects.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    new_id, AccessLevel, Collaborator, InvitationStatus, Project, Role, ShareInvitation,
    INVITATION_ID_PREFIX,
};
use crate::notify::{InvitationNotice, Notifier};
use crate::store::{Dataset, EntityStore};

/// Project-scoped actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EditProject,
    ManageCollaborators,
    ChangeCollaboratorRole,
    EditWork,
    View,
}

impl Action {
    /// Minimum access level allowed to perform the action.
    pub fn required(&self) -> AccessLevel {
        match self {
            Action::EditProject | Action::ManageCollaborators | Action::ChangeCollaboratorRole => {
                AccessLevel::Admin
            }
            Action::EditWork => AccessLevel::Editor,
            Action::View => AccessLevel::Viewer,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Action::EditProject => "edit project fields",
            Action::ManageCollaborators => "invite or remove collaborators",
            Action::ChangeCollaboratorRole => "change collaborator roles",
            Action::EditWork => "create, edit or delete tasks and goals",
            Action::View => "view the project",
        }
    }
}

/// Effective access of `user_id` on `project`.
pub fn role_of(project: &Project, user_id: &str) -> AccessLevel {
    if project.owner == user_id {
        return AccessLevel::Owner;
    }
    project
        .collaborator(user_id)
        .map(|collaborator| AccessLevel::from(collaborator.role))
        .unwrap_or(AccessLevel::None)
}

/// Check `action` against the table and hand back the project on success.
pub fn authorize<'a>(
    data: &'a Dataset,
    project_id: &str,
    user_id: &str,
    action: Action,
) -> Result<&'a Project> {
    let project = data.project(project_id)?;
    let level = role_of(project, user_id);
    if level < action.required() {
        debug!(
            user = user_id,
            project = project_id,
            role = %level,
            action = action.describe(),
            "authorization refused"
        );
        return Err(Error::Authorization {
            user: user_id.to_string(),
            action: action.describe().to_string(),
            project: project_id.to_string(),
        });
    }
    Ok(project)
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(Error::Validation(format!(
            "invalid recipient email '{email}'"
        ))),
    }
}

fn state_error(invitation: &ShareInvitation, attempted: &'static str) -> Error {
    Error::State {
        id: invitation.id.clone(),
        status: invitation.status.to_string(),
        attempted,
    }
}

/// Remove `user_id`'s collaborator row and mark the accepted invitations that
/// granted it as revoked.
fn drop_collaborator(data: &mut Dataset, project_id: &str, user_id: &str) -> Result<Collaborator> {
    let now = Utc::now();
    let project = data.project_mut(project_id)?;
    let index = project
        .collaborators
        .iter()
        .position(|collaborator| collaborator.user_id == user_id)
        .ok_or_else(|| Error::not_found("collaborator", format!("{project_id}/{user_id}")))?;
    let removed = project.collaborators.remove(index);
    project.updated_at = now;

    let granted: Vec<String> = data
        .invitations()
        .filter(|invitation| {
            invitation.project_id == project_id
                && invitation.status == InvitationStatus::Accepted
                && invitation.recipient_id.as_deref() == Some(user_id)
        })
        .map(|invitation| invitation.id.clone())
        .collect();
    for id in granted {
        let invitation = data.invitation_mut(&id)?;
        invitation.status = InvitationStatus::Revoked;
        invitation.updated_at = now;
    }

    Ok(removed)
}

/// Owns the invitation lifecycle and collaborator rows.
pub struct CollaborationEngine<S, N> {
    store: S,
    notifier: N,
}

impl<S: EntityStore, N: Notifier> CollaborationEngine<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    pub fn role_of(&self, project_id: &str, user_id: &str) -> Result<AccessLevel> {
        let data = self.store.snapshot()?;
        Ok(role_of(data.project(project_id)?, user_id))
    }

    /// Offer `role` on a project to an email address.
    ///
    /// Duplicate pending invitations are kept; the newest one for a
    /// (project, email) pair is the one that can be accepted.
    pub fn create_invitation(
        &self,
        caller: &str,
        project_id: &str,
        recipient_email: &str,
        role: Role,
        message: Option<String>,
    ) -> Result<ShareInvitation> {
        let recipient_email = normalize_email(recipient_email)?;
        let message = message
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let (invitation, project_name) = self.store.with_transaction(|data| {
            let project = authorize(data, project_id, caller, Action::ManageCollaborators)?;
            let project_name = project.name.clone();
            let now = Utc::now();
            let invitation = ShareInvitation {
                id: new_id(INVITATION_ID_PREFIX),
                project_id: project_id.to_string(),
                owner_id: caller.to_string(),
                recipient_email: recipient_email.clone(),
                recipient_id: None,
                role,
                message: message.clone(),
                status: InvitationStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            data.put_invitation(invitation.clone());
            Ok((invitation, project_name))
        })?;

        info!(
            invitation = %invitation.id,
            project = project_id,
            inviter = caller,
            role = %role,
            "invitation created"
        );

        let notice = InvitationNotice {
            invitation_id: invitation.id.clone(),
            recipient_email: invitation.recipient_email.clone(),
            project_name,
            inviter_name: caller.to_string(),
            role,
            message: invitation.message.clone(),
            created_at: invitation.created_at,
        };
        if let Err(err) = self.notifier.send_invitation_email(&notice) {
            warn!(invitation = %invitation.id, error = %err, "invitation notice not sent");
        }

        Ok(invitation)
    }

    /// pending → accepted, creating or updating the recipient's collaborator row.
    ///
    /// Accepting an invitation the same recipient already accepted succeeds
    /// without changes.
    pub fn accept(&self, invitation_id: &str, recipient_id: &str) -> Result<ShareInvitation> {
        let invitation = self.store.with_transaction(|data| {
            let current = data.invitation(invitation_id)?.clone();
            match current.status {
                InvitationStatus::Pending => {}
                InvitationStatus::Accepted
                    if current.recipient_id.as_deref() == Some(recipient_id) =>
                {
                    return Ok(current);
                }
                InvitationStatus::Accepted
                | InvitationStatus::Rejected
                | InvitationStatus::Revoked => return Err(state_error(&current, "accept")),
            }

            if let Some(newer) = data.invitations().find(|other| {
                other.id != current.id
                    && other.project_id == current.project_id
                    && other.recipient_email == current.recipient_email
                    && other.status == InvitationStatus::Pending
                    && (other.created_at, &other.id) > (current.created_at, &current.id)
            }) {
                return Err(Error::Conflict(format!(
                    "invitation {} was superseded by {}",
                    current.id, newer.id
                )));
            }

            let now = Utc::now();
            let project = data.project_mut(&current.project_id)?;
            if project.owner == recipient_id {
                return Err(Error::Validation(
                    "the project owner cannot accept an invitation to their own project"
                        .to_string(),
                ));
            }
            match project
                .collaborators
                .iter_mut()
                .find(|collaborator| collaborator.user_id == recipient_id)
            {
                Some(existing) => existing.role = current.role,
                None => project.collaborators.push(Collaborator {
                    project_id: current.project_id.clone(),
                    user_id: recipient_id.to_string(),
                    role: current.role,
                    added_at: now,
                }),
            }
            project.updated_at = now;

            let invitation = data.invitation_mut(invitation_id)?;
            invitation.status = InvitationStatus::Accepted;
            invitation.recipient_id = Some(recipient_id.to_string());
            invitation.updated_at = now;
            Ok(invitation.clone())
        })?;

        info!(
            invitation = %invitation.id,
            project = %invitation.project_id,
            user = recipient_id,
            "invitation accepted"
        );
        Ok(invitation)
    }

    /// pending → rejected.
    pub fn reject(&self, invitation_id: &str, recipient_id: &str) -> Result<ShareInvitation> {
        let invitation = self.store.with_transaction(|data| {
            let invitation = data.invitation_mut(invitation_id)?;
            if invitation.status != InvitationStatus::Pending {
                return Err(state_error(invitation, "reject"));
            }
            invitation.status = InvitationStatus::Rejected;
            invitation.recipient_id = Some(recipient_id.to_string());
            invitation.updated_at = Utc::now();
            Ok(invitation.clone())
        })?;

        info!(invitation = %invitation.id, user = recipient_id, "invitation rejected");
        Ok(invitation)
    }

    /// pending → revoked, or accepted → revoked (dropping the collaborator row).
    pub fn revoke(&self, invitation_id: &str, caller: &str) -> Result<ShareInvitation> {
        let invitation = self.store.with_transaction(|data| {
            let current = data.invitation(invitation_id)?.clone();
            authorize(data, &current.project_id, caller, Action::ManageCollaborators)?;

            match current.status {
                InvitationStatus::Pending => {}
                InvitationStatus::Accepted => {
                    let recipient = current.recipient_id.clone().unwrap_or_default();
                    let newest_grant = data
                        .invitations()
                        .filter(|other| {
                            other.project_id == current.project_id
                                && other.status == InvitationStatus::Accepted
                                && other.recipient_id.as_deref() == Some(recipient.as_str())
                        })
                        .max_by(|a, b| {
                            a.updated_at
                                .cmp(&b.updated_at)
                                .then_with(|| a.id.cmp(&b.id))
                        })
                        .map(|other| other.id.clone());
                    let holds_row = data
                        .project(&current.project_id)?
                        .collaborator(&recipient)
                        .is_some();
                    if newest_grant.as_deref() == Some(current.id.as_str()) && holds_row {
                        drop_collaborator(data, &current.project_id, &recipient)?;
                    }
                }
                InvitationStatus::Rejected | InvitationStatus::Revoked => {
                    return Err(state_error(&current, "revoke"));
                }
            }

            let invitation = data.invitation_mut(invitation_id)?;
            invitation.status = InvitationStatus::Revoked;
            invitation.updated_at = Utc::now();
            Ok(invitation.clone())
        })?;

        info!(invitation = %invitation.id, by = caller, "invitation revoked");
        Ok(invitation)
    }

    /// Remove a collaborator directly; same effect as revoking the accepted
    /// invitation behind the row.
    pub fn remove_collaborator(
        &self,
        project_id: &str,
        caller: &str,
        user_id: &str,
    ) -> Result<Collaborator> {
        let removed = self.store.with_transaction(|data| {
            let project = authorize(data, project_id, caller, Action::ManageCollaborators)?;
            if project.owner == user_id {
                return Err(Error::Validation(
                    "the project owner cannot be removed".to_string(),
                ));
            }
            drop_collaborator(data, project_id, user_id)
        })?;

        info!(project = project_id, user = user_id, by = caller, "collaborator removed");
        Ok(removed)
    }

    /// A collaborator leaving a project on their own.
    pub fn leave(&self, project_id: &str, user_id: &str) -> Result<Collaborator> {
        let removed = self.store.with_transaction(|data| {
            if data.project(project_id)?.owner == user_id {
                return Err(Error::Validation(
                    "the project owner cannot leave their own project".to_string(),
                ));
            }
            drop_collaborator(data, project_id, user_id)
        })?;

        info!(project = project_id, user = user_id, "collaborator left");
        Ok(removed)
    }

    pub fn set_collaborator_role(
        &self,
        project_id: &str,
        caller: &str,
        user_id: &str,
        role: Role,
    ) -> Result<Collaborator> {
        let updated = self.store.with_transaction(|data| {
            authorize(data, project_id, caller, Action::ChangeCollaboratorRole)?;
            let now = Utc::now();
            let project = data.project_mut(project_id)?;
            let collaborator = project
                .collaborators
                .iter_mut()
                .find(|collaborator| collaborator.user_id == user_id)
                .ok_or_else(|| {
                    Error::not_found("collaborator", format!("{project_id}/{user_id}"))
                })?;
            collaborator.role = role;
            let updated = collaborator.clone();
            project.updated_at = now;
            Ok(updated)
        })?;

        info!(project = project_id, user = user_id, role = %role, by = caller, "collaborator role changed");
        Ok(updated)
    }

    pub fn collaborators(&self, project_id: &str, caller: &str) -> Result<Vec<Collaborator>> {
        let data = self.store.snapshot()?;
        let project = authorize(&data, project_id, caller, Action::View)?;
        Ok(project.collaborators.clone())
    }

    /// Invitations for a project, newest first.
    pub fn invitations_for_project(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<Vec<ShareInvitation>> {
        let data = self.store.snapshot()?;
        authorize(&data, project_id, caller, Action::View)?;
        let mut invitations: Vec<ShareInvitation> = data
            .invitations()
            .filter(|invitation| invitation.project_id == project_id)
            .cloned()
            .collect();
        sort_newest_first(&mut invitations);
        Ok(invitations)
    }

    /// Pending invitations addressed to `email`, newest first.
    pub fn inbox(&self, email: &str) -> Result<Vec<ShareInvitation>> {
        let email = normalize_email(email)?;
        let data = self.store.snapshot()?;
        let mut invitations: Vec<ShareInvitation> = data
            .invitations()
            .filter(|invitation| {
                invitation.recipient_email == email
                    && invitation.status == InvitationStatus::Pending
            })
            .cloned()
            .collect();
        sort_newest_first(&mut invitations);
        Ok(invitations)
    }
}

fn sort_newest_first(invitations: &mut [ShareInvitation]) {
    invitations.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::notify::{NoopNotifier, RecordingNotifier};
    use crate::store::MemoryStore;

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send_invitation_email(&self, _notice: &InvitationNotice) -> Result<()> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "smtp down",
            )))
        }
    }

    fn seed(store: &MemoryStore) {
        store
            .with_transaction(|data| {
                let now = Utc::now();
                data.put_project(Project {
                    id: "prj-garden".to_string(),
                    owner: "alice".to_string(),
                    name: "Garden".to_string(),
                    description: None,
                    tags: BTreeSet::new(),
                    is_archived: false,
                    is_sacred: false,
                    sort_order: 0,
                    collaborators: Vec::new(),
                    created_at: now,
                    updated_at: now,
                });
                Ok(())
            })
            .expect("seed");
    }

    fn engine(store: &MemoryStore) -> CollaborationEngine<&MemoryStore, NoopNotifier> {
        CollaborationEngine::new(store, NoopNotifier)
    }

    fn collaborator_rows(store: &MemoryStore) -> Vec<Collaborator> {
        store
            .snapshot()
            .expect("snapshot")
            .project("prj-garden")
            .expect("project")
            .collaborators
            .clone()
    }

    #[test]
    fn role_of_distinguishes_owner_collaborator_and_stranger() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        let invitation = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Editor, None)
            .expect("invite");
        engine.accept(&invitation.id, "bob").expect("accept");

        assert_eq!(engine.role_of("prj-garden", "alice").expect("owner"), AccessLevel::Owner);
        assert_eq!(engine.role_of("prj-garden", "bob").expect("bob"), AccessLevel::Editor);
        assert_eq!(engine.role_of("prj-garden", "carol").expect("carol"), AccessLevel::None);
    }

    #[test]
    fn accept_twice_yields_one_collaborator() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        let invitation = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Viewer, None)
            .expect("invite");

        engine.accept(&invitation.id, "bob").expect("accept");
        let again = engine.accept(&invitation.id, "bob").expect("accept again");

        assert_eq!(again.status, InvitationStatus::Accepted);
        assert_eq!(collaborator_rows(&store).len(), 1);
    }

    #[test]
    fn accepted_invitation_cannot_be_claimed_by_another_user() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        let invitation = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Editor, None)
            .expect("invite");
        engine.accept(&invitation.id, "bob").expect("accept");

        assert!(matches!(
            engine.accept(&invitation.id, "carol"),
            Err(Error::State { attempted: "accept", .. })
        ));
        let rows = collaborator_rows(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "bob");
    }

    #[test]
    fn transitions_from_terminal_states_fail_without_side_effects() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        let invitation = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Editor, None)
            .expect("invite");
        engine.reject(&invitation.id, "bob").expect("reject");

        assert!(matches!(
            engine.accept(&invitation.id, "bob"),
            Err(Error::State { attempted: "accept", .. })
        ));
        assert!(matches!(
            engine.reject(&invitation.id, "bob"),
            Err(Error::State { attempted: "reject", .. })
        ));
        assert!(matches!(
            engine.revoke(&invitation.id, "alice"),
            Err(Error::State { attempted: "revoke", .. })
        ));
        assert!(collaborator_rows(&store).is_empty());
    }

    #[test]
    fn revoking_accepted_invitation_removes_collaborator() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        let invitation = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Admin, None)
            .expect("invite");
        engine.accept(&invitation.id, "bob").expect("accept");
        assert_eq!(collaborator_rows(&store).len(), 1);

        let revoked = engine.revoke(&invitation.id, "alice").expect("revoke");
        assert_eq!(revoked.status, InvitationStatus::Revoked);
        assert!(collaborator_rows(&store).is_empty());
        assert!(matches!(
            engine.accept(&invitation.id, "bob"),
            Err(Error::State { .. })
        ));
    }

    #[test]
    fn only_owner_or_admin_may_invite_or_revoke() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        let editor_invite = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Editor, None)
            .expect("invite");
        engine.accept(&editor_invite.id, "bob").expect("accept");

        assert!(matches!(
            engine.create_invitation("bob", "prj-garden", "carol@example.com", Role::Viewer, None),
            Err(Error::Authorization { .. })
        ));

        let pending = engine
            .create_invitation("alice", "prj-garden", "carol@example.com", Role::Viewer, None)
            .expect("invite carol");
        assert!(matches!(
            engine.revoke(&pending.id, "bob"),
            Err(Error::Authorization { .. })
        ));

        engine
            .set_collaborator_role("prj-garden", "alice", "bob", Role::Admin)
            .expect("promote");
        let revoked = engine.revoke(&pending.id, "bob").expect("admin revokes");
        assert_eq!(revoked.status, InvitationStatus::Revoked);
    }

    #[test]
    fn remove_collaborator_revokes_the_accepted_invitation() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        let invitation = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Editor, None)
            .expect("invite");
        engine.accept(&invitation.id, "bob").expect("accept");

        let removed = engine
            .remove_collaborator("prj-garden", "alice", "bob")
            .expect("remove");
        assert_eq!(removed.user_id, "bob");
        assert!(collaborator_rows(&store).is_empty());

        let snapshot = store.snapshot().expect("snapshot");
        assert_eq!(
            snapshot.invitation(&invitation.id).expect("invitation").status,
            InvitationStatus::Revoked
        );
        assert!(matches!(
            engine.remove_collaborator("prj-garden", "alice", "bob"),
            Err(Error::NotFound { kind: "collaborator", .. })
        ));
    }

    #[test]
    fn newest_duplicate_invitation_is_authoritative() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        let older = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Viewer, None)
            .expect("older");
        let newer = engine
            .create_invitation("alice", "prj-garden", "BOB@example.com", Role::Editor, None)
            .expect("newer");

        assert_eq!(engine.inbox("bob@example.com").expect("inbox").len(), 2);
        assert!(matches!(
            engine.accept(&older.id, "bob"),
            Err(Error::Conflict(_))
        ));
        engine.accept(&newer.id, "bob").expect("accept newest");
        assert_eq!(collaborator_rows(&store)[0].role, Role::Editor);
    }

    #[test]
    fn notifier_failure_keeps_invitation() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = CollaborationEngine::new(&store, FailingNotifier);
        let invitation = engine
            .create_invitation("alice", "prj-garden", "bob@example.com", Role::Viewer, None)
            .expect("invite despite notifier");
        assert!(store
            .snapshot()
            .expect("snapshot")
            .invitation(&invitation.id)
            .is_ok());
    }

    #[test]
    fn notice_carries_project_and_inviter() {
        let store = MemoryStore::new();
        seed(&store);
        let notifier = RecordingNotifier::default();
        let engine = CollaborationEngine::new(&store, &notifier);
        engine
            .create_invitation(
                "alice",
                "prj-garden",
                "bob@example.com",
                Role::Editor,
                Some("  come help  ".to_string()),
            )
            .expect("invite");

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].project_name, "Garden");
        assert_eq!(sent[0].inviter_name, "alice");
        assert_eq!(sent[0].message.as_deref(), Some("come help"));
    }

    #[test]
    fn invalid_email_is_rejected() {
        let store = MemoryStore::new();
        seed(&store);
        let engine = engine(&store);
        assert!(matches!(
            engine.create_invitation("alice", "prj-garden", "not-an-email", Role::Viewer, None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn authorization_table_matches_roles() {
        let cases = [
            (AccessLevel::Owner, [true, true, true, true, true]),
            (AccessLevel::Admin, [true, true, true, true, true]),
            (AccessLevel::Editor, [false, false, false, true, true]),
            (AccessLevel::Viewer, [false, false, false, false, true]),
            (AccessLevel::None, [false, false, false, false, false]),
        ];
        let actions = [
            Action::EditProject,
            Action::ManageCollaborators,
            Action::ChangeCollaboratorRole,
            Action::EditWork,
            Action::View,
        ];
        for (level, expected) in cases {
            for (action, allowed) in actions.iter().zip(expected) {
                assert_eq!(level >= action.required(), allowed, "{level} {action:?}");
            }
        }
    }
}
