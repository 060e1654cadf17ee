//! Main ledger orchestration layer
//!
//! This module ties together storage, the single-writer actor, and the
//! message archive into a high-level API for balance operations.
//!
//! # Example
//!
//! ```no_run
//! use credit_core::{ChatMode, Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> credit_core::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     let account = ledger.create_account("$2b$10$hash").await?;
//!     let mut turn = ledger
//!         .begin_chat_turn(account.account_id, "session-1", "hello", ChatMode::General)
//!         .await?;
//!
//!     // ... call the AI service outside the ledger ...
//!     match Ok::<_, String>("reply".to_string()) {
//!         Ok(reply) => {
//!             turn.deliver(&ledger, reply).await?;
//!         }
//!         Err(_) => {
//!             turn.resolve_failure(&ledger).await?;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    archive::MessageArchiver,
    config::PricingConfig,
    metrics::Metrics,
    types::{
        Account, AccountId, ChatMode, ChatRole, EntryKind, EntryStatus, LedgerEntry, Receipt,
        SubscriptionEffect, SubscriptionStatus, TurnState,
    },
    Config, Error, Result, Storage,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for balance-mutating operations
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Chat turn archive
    archive: MessageArchiver,

    /// Configuration
    config: Config,

    /// Operation metrics
    metrics: Metrics,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let handle = spawn_ledger_actor(storage.clone());
        let archive = MessageArchiver::new(handle.clone(), storage.clone());
        let metrics = Metrics::new().map_err(|e| Error::Other(e.to_string()))?;

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            storage,
            archive,
            config,
            metrics,
        })
    }

    /// Pricing policy in effect
    pub fn pricing(&self) -> &PricingConfig {
        &self.config.pricing
    }

    /// Operation metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Chat turn archive
    pub fn archive(&self) -> &MessageArchiver {
        &self.archive
    }

    /// Create an account with the configured starting grant.
    ///
    /// The grant is seeded directly on the account, not written as a
    /// ledger entry; the reconciliation audit accounts for it.
    pub async fn create_account(&self, credential_hash: impl Into<String>) -> Result<Account> {
        let now = Utc::now();
        let account = Account {
            account_id: AccountId::new(Uuid::new_v4()),
            credential_hash: credential_hash.into(),
            credits: self.config.pricing.starting_credits,
            subscription_ends_at: None,
            subscription_type: None,
            created_at: now,
            updated_at: now,
        };

        self.handle.create_account(account.clone()).await?;
        Ok(account)
    }

    /// Get account by ID
    pub fn get_account(&self, account_id: AccountId) -> Result<Account> {
        self.storage.get_account(account_id)
    }

    /// Get current balance
    pub fn get_balance(&self, account_id: AccountId) -> Result<i64> {
        self.storage.get_balance(account_id)
    }

    /// Full audit trail for an account, oldest first
    pub fn transactions(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>> {
        self.storage.list_entries(account_id)
    }

    /// Check whether a payment reference has already been settled
    pub fn reference_exists(&self, reference: &str) -> Result<bool> {
        self.storage.reference_exists(reference)
    }

    /// Debit the cost of one metered action.
    ///
    /// The balance check and the debit commit as a single atomic unit; a
    /// rejected debit leaves no trace in the ledger.
    pub async fn debit_for_service(
        &self,
        account_id: AccountId,
        cost: i64,
        kind: EntryKind,
    ) -> Result<Receipt> {
        if cost <= 0 {
            return Err(Error::InvalidAmount(cost));
        }

        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id,
            amount_minor: -cost,
            credit_delta: -cost,
            reference: None,
            status: EntryStatus::Completed,
            kind,
            error_message: None,
            created_at: Utc::now(),
        };
        let entry_id = entry.entry_id;

        let new_balance = self.apply(entry, None).await?;
        self.metrics.debits_total.inc();

        Ok(Receipt {
            entry_id,
            account_id,
            new_balance,
            credit_delta: -cost,
        })
    }

    /// Credit back a debit whose paired external action failed.
    ///
    /// Exactly-once semantics per logical refund are the caller's
    /// responsibility; [`ChatTurn`] tracks this for chat turns.
    pub async fn compensate(&self, account_id: AccountId, cost: i64) -> Result<Receipt> {
        if cost <= 0 {
            return Err(Error::InvalidAmount(cost));
        }

        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id,
            amount_minor: cost,
            credit_delta: cost,
            reference: None,
            status: EntryStatus::Completed,
            kind: EntryKind::Refund,
            error_message: None,
            created_at: Utc::now(),
        };
        let entry_id = entry.entry_id;

        let new_balance = self.apply(entry, None).await?;
        self.metrics.refunds_total.inc();

        tracing::info!(
            account_id = %account_id,
            cost,
            new_balance,
            "Debit compensated"
        );

        Ok(Receipt {
            entry_id,
            account_id,
            new_balance,
            credit_delta: cost,
        })
    }

    /// Apply a verified payment: balance credit, optional subscription
    /// update, and the reference-tagged entry as one atomic commit.
    ///
    /// Returns [`Error::DuplicatePayment`] without mutation if the
    /// reference was already settled.
    pub async fn credit(
        &self,
        account_id: AccountId,
        amount_minor: i64,
        credit_delta: i64,
        reference: impl Into<String>,
        kind: EntryKind,
        subscription: Option<SubscriptionEffect>,
    ) -> Result<Receipt> {
        if credit_delta < 0 {
            return Err(Error::InvalidAmount(credit_delta));
        }

        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id,
            amount_minor,
            credit_delta,
            reference: Some(reference.into()),
            status: EntryStatus::Completed,
            kind,
            error_message: None,
            created_at: Utc::now(),
        };
        let entry_id = entry.entry_id;

        let new_balance = self.apply(entry, subscription).await?;
        self.metrics.payments_total.inc();

        Ok(Receipt {
            entry_id,
            account_id,
            new_balance,
            credit_delta,
        })
    }

    /// Record a rejected or errored payment attempt for audit.
    ///
    /// Never mutates the balance and never consumes the reference's
    /// idempotency slot: a later successful reconciliation with the same
    /// reference still succeeds.
    pub async fn record_failure(
        &self,
        account_id: AccountId,
        reference: impl Into<String>,
        amount_minor: i64,
        kind: EntryKind,
        reason: impl Into<String>,
    ) -> Result<()> {
        let reference = reference.into();
        let reason = reason.into();

        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id,
            amount_minor,
            credit_delta: 0,
            reference: Some(reference.clone()),
            status: EntryStatus::Failed,
            kind,
            error_message: Some(reason.clone()),
            created_at: Utc::now(),
        };

        self.apply(entry, None).await?;
        self.metrics.failed_payments_total.inc();

        tracing::warn!(
            account_id = %account_id,
            reference = %reference,
            reason = %reason,
            "Payment attempt recorded as failed"
        );

        Ok(())
    }

    /// Subscription summary for an account
    pub fn subscription_status(&self, account_id: AccountId) -> Result<SubscriptionStatus> {
        let account = self.get_account(account_id)?;
        let now = Utc::now();
        let active = account.has_active_subscription(now);

        let days_remaining = match account.subscription_ends_at {
            Some(ends_at) if active => {
                let secs = (ends_at - now).num_seconds();
                (secs + 86_399) / 86_400 // Round up to whole days
            }
            _ => 0,
        };

        Ok(SubscriptionStatus {
            active,
            ends_at: account.subscription_ends_at,
            subscription_type: account.subscription_type,
            days_remaining,
            credits: account.credits,
        })
    }

    /// Replay the entry log against the live balance.
    ///
    /// Detects orphaned state after a crash mid-saga: the starting grant
    /// plus the sum of completed credit deltas must equal the current
    /// balance. Operators can run this before issuing a manual
    /// compensating refund.
    pub fn check_reconciliation(&self, account_id: AccountId) -> Result<bool> {
        let account = self.get_account(account_id)?;
        let entries = self.storage.list_entries(account_id)?;

        let replayed: i64 = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Completed)
            .map(|e| e.credit_delta)
            .sum();

        Ok(self.config.pricing.starting_credits + replayed == account.credits)
    }

    /// Start one metered chat turn: debit the mode's cost and archive the
    /// user's message, then hand the caller a [`ChatTurn`] to resolve
    /// after the external AI call.
    pub async fn begin_chat_turn(
        &self,
        account_id: AccountId,
        session_id: impl Into<String>,
        message: impl Into<String>,
        mode: ChatMode,
    ) -> Result<ChatTurn> {
        let session_id = session_id.into();
        let cost = self.config.pricing.cost_for(mode);

        let receipt = self
            .debit_for_service(account_id, cost, EntryKind::ChatDebit)
            .await?;

        // User turns are free; the charge lands on the model's reply.
        let archived = self
            .archive
            .append(account_id, session_id.clone(), ChatRole::User, message, mode, 0)
            .await;

        if let Err(e) = archived {
            // The debit committed but the turn cannot proceed; undo it.
            self.compensate(account_id, cost).await?;
            return Err(e);
        }

        Ok(ChatTurn {
            account_id,
            session_id,
            mode,
            cost,
            balance_after_debit: receipt.new_balance,
            state: TurnState::Debited,
            refunded_balance: None,
        })
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }

    /// Commit one entry through the actor, timing the round trip
    async fn apply(
        &self,
        entry: LedgerEntry,
        subscription: Option<SubscriptionEffect>,
    ) -> Result<i64> {
        let start = Instant::now();
        let result = self.handle.apply(entry, subscription).await;
        self.metrics
            .apply_duration
            .observe(start.elapsed().as_secs_f64());
        result
    }
}

/// Tracker for one metered chat turn.
///
/// State machine: `Debited -> {Delivered, Refunded}`. The debit has
/// already committed when a `ChatTurn` exists; the caller performs the
/// external AI call and then resolves the turn exactly once. Duplicate
/// failure signals are absorbed: only the first `resolve_failure`
/// compensates.
#[derive(Debug)]
pub struct ChatTurn {
    account_id: AccountId,
    session_id: String,
    mode: ChatMode,
    cost: i64,
    balance_after_debit: i64,
    state: TurnState,
    refunded_balance: Option<i64>,
}

impl ChatTurn {
    /// Current turn state
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Credits charged for this turn
    pub fn cost(&self) -> i64 {
        self.cost
    }

    /// Balance right after the debit committed
    pub fn balance_after_debit(&self) -> i64 {
        self.balance_after_debit
    }

    /// The AI call succeeded: archive the model's reply tagged with the
    /// charged cost. Returns the post-debit balance.
    pub async fn deliver(&mut self, ledger: &Ledger, reply: impl Into<String>) -> Result<i64> {
        if self.state != TurnState::Debited {
            return Err(Error::TurnAlreadyResolved(self.state.to_string()));
        }

        ledger
            .archive()
            .append(
                self.account_id,
                self.session_id.clone(),
                ChatRole::Model,
                reply,
                self.mode,
                self.cost,
            )
            .await?;

        self.state = TurnState::Delivered;
        Ok(self.balance_after_debit)
    }

    /// The AI call failed or was cancelled: compensate the debit.
    ///
    /// Idempotent: repeated calls return the balance from the first
    /// refund without compensating again. Calling this after `deliver`
    /// is an error.
    pub async fn resolve_failure(&mut self, ledger: &Ledger) -> Result<i64> {
        match self.state {
            TurnState::Refunded => Ok(self.refunded_balance.unwrap_or(self.balance_after_debit)),
            TurnState::Delivered => Err(Error::TurnAlreadyResolved(self.state.to_string())),
            TurnState::Debited => {
                let receipt = ledger.compensate(self.account_id, self.cost).await?;
                self.refunded_balance = Some(receipt.new_balance);
                self.state = TurnState::Refunded;
                Ok(receipt.new_balance)
            }
        }
    }
}
