//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! every balance-mutating operation is one mailbox message, processed to
//! completion before the next. That serialization is what makes the
//! conditional balance check and the unique-reference check in
//! [`Storage::apply_entry`] atomic under concurrent request handlers, with
//! no account-wide lock.
//!
//! Reads bypass the actor and go straight to storage. The external AI and
//! payment-gateway calls are made by callers while no message of theirs is
//! in the mailbox, so slow network I/O never blocks the writer.

use crate::types::{Account, AccountId, ChatMessage, LedgerEntry, SubscriptionEffect};
use crate::{Error, Result, Storage};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Apply one ledger entry (debit, refund, credit, or failure record)
    Apply {
        entry: LedgerEntry,
        subscription: Option<SubscriptionEffect>,
        response: oneshot::Sender<Result<i64>>,
    },

    /// Create an account record
    CreateAccount {
        account: Account,
        response: oneshot::Sender<Result<()>>,
    },

    /// Archive one chat turn
    AppendMessage {
        message: ChatMessage,
        response: oneshot::Sender<Result<()>>,
    },

    /// Delete all chat turns for an account
    ClearMessages {
        account_id: AccountId,
        response: oneshot::Sender<Result<u64>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { storage, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                _ => self.handle_message(msg),
            }
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Apply {
                entry,
                subscription,
                response,
            } => {
                let result = self.storage.apply_entry(&entry, subscription.as_ref());
                let _ = response.send(result);
            }

            LedgerMessage::CreateAccount { account, response } => {
                let result = self.storage.create_account(&account);
                let _ = response.send(result);
            }

            LedgerMessage::AppendMessage { message, response } => {
                let result = self.storage.append_message(&message);
                let _ = response.send(result);
            }

            LedgerMessage::ClearMessages {
                account_id,
                response,
            } => {
                let result = self.storage.clear_messages(account_id);
                let _ = response.send(result);
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Apply one ledger entry, returning the balance after the commit
    pub async fn apply(
        &self,
        entry: LedgerEntry,
        subscription: Option<SubscriptionEffect>,
    ) -> Result<i64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Apply {
                entry,
                subscription,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Create an account record
    pub async fn create_account(&self, account: Account) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::CreateAccount {
                account,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Archive one chat turn
    pub async fn append_message(&self, message: ChatMessage) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::AppendMessage {
                message,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Delete all chat turns for an account
    pub async fn clear_messages(&self, account_id: AccountId) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::ClearMessages {
                account_id,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(storage: Arc<Storage>) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
