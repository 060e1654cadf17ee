//! Core types for the credit ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (i64 in smallest units for credits and money)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account identifier, supplied by the external identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Wrap a verified identifier
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Raw bytes (used as storage keys)
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user account holding the authoritative credit balance
///
/// Invariant: `credits >= 0` at every commit point. The balance is only
/// mutated through the ledger's atomic operations, never directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub account_id: AccountId,

    /// Credential hash, opaque to this core (owned by the auth layer)
    pub credential_hash: String,

    /// Current balance in the smallest credit unit
    pub credits: i64,

    /// Subscription expiry, if any
    pub subscription_ends_at: Option<DateTime<Utc>>,

    /// Subscription tier label, if any
    pub subscription_type: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last balance-affecting update
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// True if the subscription is active at `now`
    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        self.subscription_ends_at.map_or(false, |ends| ends > now)
    }
}

/// Ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryStatus {
    /// Entry committed together with its balance effect
    Completed = 1,
    /// Audit record of a rejected or errored attempt; no balance effect
    Failed = 2,
}

/// Kind of economic event an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Metered chat usage debit
    ChatDebit = 1,
    /// Compensating credit for a failed downstream action
    Refund = 2,
    /// Credit from a recognized subscription tier purchase
    SubscriptionCredit = 3,
    /// Credit from an unlisted purchase amount (linear rate)
    OneTimeCredit = 4,
}

impl EntryKind {
    /// Stable label for logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::ChatDebit => "chat_debit",
            EntryKind::Refund => "refund",
            EntryKind::SubscriptionCredit => "subscription_credit",
            EntryKind::OneTimeCredit => "one_time_credit",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable audit record of one balance-affecting event
///
/// Invariants:
/// - never mutated or deleted once written
/// - at most one `Completed` entry per payment `reference`
/// - for every account, starting grant + Σ(completed `credit_delta`)
///   equals the live balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// Account this entry belongs to
    pub account_id: AccountId,

    /// Signed amount in the payment currency's smallest unit
    pub amount_minor: i64,

    /// Signed change to the credit balance
    pub credit_delta: i64,

    /// External payment reference (idempotency key); present only for
    /// payment-sourced entries
    pub reference: Option<String>,

    /// Completed or failed
    pub status: EntryStatus,

    /// Economic event kind
    pub kind: EntryKind,

    /// Failure description for `Failed` entries
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// True if this entry consumed its reference's idempotency slot
    pub fn settles_reference(&self) -> bool {
        self.status == EntryStatus::Completed && self.reference.is_some()
    }
}

/// Result of a committed balance mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// Entry written by the operation
    pub entry_id: Uuid,

    /// Account affected
    pub account_id: AccountId,

    /// Balance after the commit
    pub new_balance: i64,

    /// Signed credit change that was applied
    pub credit_delta: i64,
}

/// Subscription update applied atomically with a payment credit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEffect {
    /// New subscription end date
    pub ends_at: DateTime<Utc>,

    /// Tier label
    pub label: String,
}

/// Outcome of a successful payment reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Ledger entry written for the credit
    pub entry_id: Uuid,

    /// Balance after the credit
    pub new_balance: i64,

    /// Credits added by this payment
    pub credits_added: i64,

    /// Subscription expiry after the payment
    pub subscription_ends_at: DateTime<Utc>,

    /// Subscription tier label
    pub subscription_type: String,
}

/// Subscription summary for an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    /// True if the subscription end date is in the future
    pub active: bool,

    /// Subscription expiry, if any
    pub ends_at: Option<DateTime<Utc>>,

    /// Tier label, if any
    pub subscription_type: Option<String>,

    /// Whole days until expiry, rounded up; 0 when inactive
    pub days_remaining: i64,

    /// Current credit balance
    pub credits: i64,
}

/// Chat participant role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChatRole {
    /// Human turn
    User = 1,
    /// AI model turn
    Model = 2,
}

/// Chat mode, which determines the per-turn cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChatMode {
    /// General assistant conversation
    General = 1,
    /// In-depth diagnosis conversation
    Diagnosis = 2,
}

impl ChatMode {
    /// Stable label for logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::General => "general",
            ChatMode::Diagnosis => "diagnosis",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One archived chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID (UUIDv7 for chronological ordering)
    pub message_id: Uuid,

    /// Owning account
    pub account_id: AccountId,

    /// Client-chosen session grouping key
    pub session_id: String,

    /// User or model turn
    pub role: ChatRole,

    /// Message text
    pub content: String,

    /// Chat mode of the turn
    pub mode: ChatMode,

    /// Credits charged for this turn (0 for user turns)
    pub cost: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// State of one metered chat turn
///
/// A turn starts `Debited` (the debit has committed); the external AI call
/// then resolves it to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    /// Debit committed, AI call in flight
    Debited,
    /// AI reply archived, cost kept (terminal)
    Delivered,
    /// AI call failed, debit compensated (terminal)
    Refunded,
}

impl TurnState {
    /// Check if the turn reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Delivered | TurnState::Refunded)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnState::Debited => "debited",
            TurnState::Delivered => "delivered",
            TurnState::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}
