//! CreditCore
//!
//! Prepaid credit ledger for metered AI services.
//!
//! # Architecture
//!
//! - **Atomic debits**: Balance check and debit commit as one unit; a
//!   balance can never go negative
//! - **Single Writer**: One actor serializes all balance mutations
//! - **Idempotent payments**: At most one completed entry per external
//!   payment reference
//! - **Debit-then-compensate**: Chat turns debit up front and refund
//!   exactly once if the external AI call fails
//!
//! # Invariants
//!
//! - Credits ≥ 0 at all times
//! - Starting grant + Σ(completed credit deltas) == live balance
//! - Failed payment attempts never mutate the balance or consume a
//!   reference

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod archive;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;
pub mod verify;

// Re-exports
pub use archive::MessageArchiver;
pub use config::{Config, PricingConfig, PurchaseTier, SubscriptionPolicy};
pub use error::{Error, Result};
pub use ledger::{ChatTurn, Ledger};
pub use metrics::Metrics;
pub use storage::Storage;
pub use types::{
    Account, AccountId, ChatMessage, ChatMode, ChatRole, EntryKind, EntryStatus, LedgerEntry,
    PaymentReceipt, Receipt, SubscriptionStatus, TurnState,
};
pub use verify::{GatewayVerification, PaymentGateway, PaymentVerifier};
