//! Invitation notices.
//!
//! Delivery is fire-and-forget from the collaboration engine: a failing
//! notifier is logged and never undoes the invitation it describes.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lock::FileLock;
use crate::model::Role;
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationNotice {
    pub invitation_id: String,
    pub recipient_email: String,
    pub project_name: String,
    pub inviter_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub trait Notifier {
    fn send_invitation_email(&self, notice: &InvitationNotice) -> Result<()>;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn send_invitation_email(&self, notice: &InvitationNotice) -> Result<()> {
        (**self).send_invitation_email(notice)
    }
}

/// Drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send_invitation_email(&self, _notice: &InvitationNotice) -> Result<()> {
        Ok(())
    }
}

/// Appends notices to a JSONL outbox for a delivery process to pick up.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    storage: Storage,
    file_name: String,
    lock_timeout_ms: u64,
}

impl OutboxNotifier {
    pub fn new(storage: Storage, file_name: impl Into<String>, lock_timeout_ms: u64) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
            lock_timeout_ms,
        }
    }

    pub fn pending(&self) -> Result<Vec<InvitationNotice>> {
        self.storage
            .read_jsonl(&self.storage.outbox_file(&self.file_name))
    }
}

impl Notifier for OutboxNotifier {
    fn send_invitation_email(&self, notice: &InvitationNotice) -> Result<()> {
        let path = self.storage.outbox_file(&self.file_name);
        let _lock = FileLock::acquire(path.with_extension("lock"), self.lock_timeout_ms)?;
        self.storage.append_jsonl(&path, notice)
    }
}

/// Keeps notices in memory; handy as a test double.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<InvitationNotice>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<InvitationNotice> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send_invitation_email(&self, notice: &InvitationNotice) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice.clone());
        Ok(())
    }
}

/// Either outbox or nothing, chosen from config at startup.
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    Outbox(OutboxNotifier),
    Disabled,
}

impl Notifier for ConfiguredNotifier {
    fn send_invitation_email(&self, notice: &InvitationNotice) -> Result<()> {
        match self {
            ConfiguredNotifier::Outbox(outbox) => outbox.send_invitation_email(notice),
            ConfiguredNotifier::Disabled => Ok(()),
        }
    }
}
