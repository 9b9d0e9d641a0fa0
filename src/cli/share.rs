//! focus share command implementations.

use clap::Subcommand;
use serde::Serialize;

use crate::collab::CollaborationEngine;
use crate::error::Result;
use crate::model::{AccessLevel, Collaborator, Role, ShareInvitation};
use crate::notify::ConfiguredNotifier;
use crate::output::{emit_success, HumanOutput};
use crate::storage::FileStore;

use super::{Context, Globals};

/// Sharing subcommands
#[derive(Subcommand, Debug)]
pub enum ShareCommands {
    /// Invite someone to a project by email
    Invite {
        project: String,
        email: String,

        /// viewer, editor or admin
        #[arg(long, default_value = "viewer")]
        role: String,

        #[arg(short, long)]
        message: Option<String>,
    },

    /// Accept an invitation as the acting user
    Accept {
        invitation: String,
    },

    /// Reject an invitation as the acting user
    Reject {
        invitation: String,
    },

    /// Revoke a pending or accepted invitation
    Revoke {
        invitation: String,
    },

    /// Show a project's collaborators and invitations
    List {
        project: String,
    },

    /// Pending invitations addressed to an email
    Inbox {
        email: String,
    },

    /// Change a collaborator's role
    Role {
        project: String,
        #[arg(value_name = "USER")]
        member: String,
        role: String,
    },

    /// Remove a collaborator from a project
    Remove {
        project: String,
        #[arg(value_name = "USER")]
        member: String,
    },

    /// Leave a project you collaborate on
    Leave {
        project: String,
    },
}

#[derive(Serialize)]
struct ShareListOutput {
    project_id: String,
    access: AccessLevel,
    collaborators: Vec<Collaborator>,
    invitations: Vec<ShareInvitation>,
}

#[derive(Serialize)]
struct InboxOutput {
    email: String,
    total: usize,
    invitations: Vec<ShareInvitation>,
}

fn invitation_output(header: &str, invitation: &ShareInvitation) -> HumanOutput {
    let mut human = HumanOutput::new(header);
    human.push_summary("id", invitation.id.clone());
    human.push_summary("project", invitation.project_id.clone());
    human.push_summary("email", invitation.recipient_email.clone());
    human.push_summary("role", invitation.role.to_string());
    human.push_summary("status", invitation.status.to_string());
    human
}

pub fn run(globals: &Globals, command: ShareCommands) -> Result<()> {
    let ctx = Context::load(globals)?;
    let engine: CollaborationEngine<&FileStore, ConfiguredNotifier> =
        CollaborationEngine::new(&ctx.store, ctx.notifier());

    match command {
        ShareCommands::Invite {
            project,
            email,
            role,
            message,
        } => {
            let project_id = ctx.resolve(|data| data.resolve_project_id(&project))?;
            let role: Role = role.parse()?;
            let invitation =
                engine.create_invitation(&ctx.user, &project_id, &email, role, message)?;
            let mut human = invitation_output("focus share invite: sent", &invitation);
            if !ctx.config.notify.enabled {
                human.push_warning("notices disabled; share the invitation id yourself");
            }
            human.push_next_step(format!("focus share accept {}", invitation.id));
            emit_success(ctx.output, "share invite", &invitation, Some(&human))
        }
        ShareCommands::Accept { invitation } => {
            let id = ctx.resolve(|data| data.resolve_invitation_id(&invitation))?;
            let invitation = engine.accept(&id, &ctx.user)?;
            let human = invitation_output("focus share accept: accepted", &invitation);
            emit_success(ctx.output, "share accept", &invitation, Some(&human))
        }
        ShareCommands::Reject { invitation } => {
            let id = ctx.resolve(|data| data.resolve_invitation_id(&invitation))?;
            let invitation = engine.reject(&id, &ctx.user)?;
            let human = invitation_output("focus share reject: rejected", &invitation);
            emit_success(ctx.output, "share reject", &invitation, Some(&human))
        }
        ShareCommands::Revoke { invitation } => {
            let id = ctx.resolve(|data| data.resolve_invitation_id(&invitation))?;
            let invitation = engine.revoke(&id, &ctx.user)?;
            let human = invitation_output("focus share revoke: revoked", &invitation);
            emit_success(ctx.output, "share revoke", &invitation, Some(&human))
        }
        ShareCommands::List { project } => {
            let project_id = ctx.resolve(|data| data.resolve_project_id(&project))?;
            let collaborators = engine.collaborators(&project_id, &ctx.user)?;
            let invitations = engine.invitations_for_project(&project_id, &ctx.user)?;
            let access = engine.role_of(&project_id, &ctx.user)?;

            let mut human = HumanOutput::new(format!("focus share list: {project_id}"));
            human.push_summary("access", access.to_string());
            human.push_summary("collaborators", collaborators.len().to_string());
            for collaborator in &collaborators {
                human.push_detail(format!("{} ({})", collaborator.user_id, collaborator.role));
            }
            for invitation in &invitations {
                human.push_detail(format!(
                    "{} {} {} [{}]",
                    invitation.id, invitation.recipient_email, invitation.role, invitation.status
                ));
            }
            let output = ShareListOutput {
                project_id,
                access,
                collaborators,
                invitations,
            };
            emit_success(ctx.output, "share list", &output, Some(&human))
        }
        ShareCommands::Inbox { email } => {
            let invitations = engine.inbox(&email)?;
            let mut human =
                HumanOutput::new(format!("focus share inbox: {} pending", invitations.len()));
            for invitation in &invitations {
                human.push_detail(format!(
                    "{} project {} as {} from {}",
                    invitation.id, invitation.project_id, invitation.role, invitation.owner_id
                ));
            }
            let output = InboxOutput {
                email: email.trim().to_ascii_lowercase(),
                total: invitations.len(),
                invitations,
            };
            emit_success(ctx.output, "share inbox", &output, Some(&human))
        }
        ShareCommands::Role {
            project,
            member,
            role,
        } => {
            let project_id = ctx.resolve(|data| data.resolve_project_id(&project))?;
            let role: Role = role.parse()?;
            let collaborator = engine.set_collaborator_role(&project_id, &ctx.user, &member, role)?;
            let mut human = HumanOutput::new("focus share role: updated");
            human.push_summary("user", collaborator.user_id.clone());
            human.push_summary("role", collaborator.role.to_string());
            emit_success(ctx.output, "share role", &collaborator, Some(&human))
        }
        ShareCommands::Remove { project, member } => {
            let project_id = ctx.resolve(|data| data.resolve_project_id(&project))?;
            let removed = engine.remove_collaborator(&project_id, &ctx.user, &member)?;
            let mut human = HumanOutput::new("focus share remove: removed");
            human.push_summary("user", removed.user_id.clone());
            human.push_summary("project", removed.project_id.clone());
            emit_success(ctx.output, "share remove", &removed, Some(&human))
        }
        ShareCommands::Leave { project } => {
            let project_id = ctx.resolve(|data| data.resolve_project_id(&project))?;
            let removed = engine.leave(&project_id, &ctx.user)?;
            let mut human = HumanOutput::new("focus share leave: left");
            human.push_summary("project", removed.project_id.clone());
            emit_success(ctx.output, "share leave", &removed, Some(&human))
        }
    }
}
