//! Chat message archival
//!
//! Shares the account-scoped storage boundary with the ledger: writes go
//! through the same single-writer actor, reads straight to storage. No
//! cross-account visibility; no ordering guarantee across sessions, strict
//! chronological order within a session.

use crate::actor::LedgerHandle;
use crate::types::{AccountId, ChatMessage, ChatMode, ChatRole};
use crate::{Result, Storage};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Per-session chat turn archive for one ledger instance
#[derive(Clone)]
pub struct MessageArchiver {
    handle: LedgerHandle,
    storage: Arc<Storage>,
}

impl MessageArchiver {
    pub(crate) fn new(handle: LedgerHandle, storage: Arc<Storage>) -> Self {
        Self { handle, storage }
    }

    /// Archive one chat turn
    pub async fn append(
        &self,
        account_id: AccountId,
        session_id: impl Into<String>,
        role: ChatRole,
        content: impl Into<String>,
        mode: ChatMode,
        cost: i64,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            message_id: Uuid::now_v7(),
            account_id,
            session_id: session_id.into(),
            role,
            content: content.into(),
            mode,
            cost,
            created_at: Utc::now(),
        };

        self.handle.append_message(message.clone()).await?;
        Ok(message)
    }

    /// All archived turns for an account, grouped by session
    pub fn sessions(&self, account_id: AccountId) -> Result<BTreeMap<String, Vec<ChatMessage>>> {
        self.storage.sessions(account_id)
    }

    /// Delete every archived turn for an account. Returns the number
    /// removed.
    pub async fn clear(&self, account_id: AccountId) -> Result<u64> {
        self.handle.clear_messages(account_id).await
    }
}
