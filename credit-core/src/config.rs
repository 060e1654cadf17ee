//! Configuration for the credit ledger
//!
//! Pricing (tier table, tolerance, chat costs) is business policy and
//! lives here as data, not as constants in the reconciliation code.

use crate::types::ChatMode;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Pricing policy
    pub pricing: PricingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/credit-core"),
            service_name: "credit-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDbConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
        }
    }
}

/// How a new successful payment interacts with an active subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPolicy {
    /// New end date is `now + duration`, discarding remaining time
    Reset,
    /// New end date is `max(now, current_end) + duration`
    Extend,
}

/// One supported purchase tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseTier {
    /// Expected amount in the purchase currency's smallest unit
    pub amount_minor: i64,

    /// Credits granted
    pub credits: i64,

    /// Subscription duration granted
    pub duration_months: u32,

    /// Tier label
    pub label: String,
}

/// Credit and subscription effect computed for one purchase amount
#[derive(Debug, Clone)]
pub struct PurchaseGrant {
    /// Credits to add
    pub credits: i64,

    /// Subscription duration to grant
    pub duration_months: u32,

    /// Tier label
    pub label: String,

    /// True when the amount matched a configured tier
    pub from_tier: bool,
}

/// Pricing policy: chat costs, purchase tiers, and reconciliation tolerances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Credits granted once at registration
    pub starting_credits: i64,

    /// Cost of one general-mode chat turn
    pub general_chat_cost: i64,

    /// Cost of one diagnosis-mode chat turn
    pub diagnosis_cost: i64,

    /// Purchase amounts accepted by the verifier (smallest currency unit)
    pub allowed_amounts: Vec<i64>,

    /// Allowed downward deviation between expected and gateway-reported
    /// amount (cross-currency settlement variance)
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_tolerance: Decimal,

    /// Gateway settlement minor units per expected base unit
    /// (e.g. 1000 kobo per USD)
    #[serde(with = "rust_decimal::serde::str")]
    pub settlement_units_per_base: Decimal,

    /// Credits per base unit for amounts with no configured tier
    pub fallback_credits_per_base: i64,

    /// Subscription duration for amounts with no configured tier
    pub fallback_duration_months: u32,

    /// Purchase tier table
    pub tiers: Vec<PurchaseTier>,

    /// Extend-or-reset behavior for renewals
    pub subscription_policy: SubscriptionPolicy,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            starting_credits: 500,
            general_chat_cost: 5,
            diagnosis_cost: 50,
            allowed_amounts: vec![500, 1500, 2500],
            amount_tolerance: Decimal::new(8, 1), // 0.8
            settlement_units_per_base: Decimal::from(1000),
            fallback_credits_per_base: 10,
            fallback_duration_months: 1,
            tiers: vec![
                PurchaseTier {
                    amount_minor: 500,
                    credits: 50,
                    duration_months: 1,
                    label: "basic".to_string(),
                },
                PurchaseTier {
                    amount_minor: 1500,
                    credits: 120,
                    duration_months: 1,
                    label: "standard".to_string(),
                },
                PurchaseTier {
                    amount_minor: 2500,
                    credits: 260,
                    duration_months: 1,
                    label: "premium".to_string(),
                },
            ],
            subscription_policy: SubscriptionPolicy::Reset,
        }
    }
}

impl PricingConfig {
    /// Per-turn cost for a chat mode
    pub fn cost_for(&self, mode: ChatMode) -> i64 {
        match mode {
            ChatMode::General => self.general_chat_cost,
            ChatMode::Diagnosis => self.diagnosis_cost,
        }
    }

    /// True if the amount is a supported purchase tier amount
    pub fn is_allowed_amount(&self, amount_minor: i64) -> bool {
        self.allowed_amounts.contains(&amount_minor)
    }

    /// Map a purchase amount to its credit/subscription effect.
    ///
    /// Unlisted amounts fall back to a linear rate:
    /// `floor(base_units * fallback_credits_per_base)`.
    pub fn grant_for(&self, amount_minor: i64) -> PurchaseGrant {
        if let Some(tier) = self.tiers.iter().find(|t| t.amount_minor == amount_minor) {
            return PurchaseGrant {
                credits: tier.credits,
                duration_months: tier.duration_months,
                label: tier.label.clone(),
                from_tier: true,
            };
        }

        let base_units = Decimal::from(amount_minor) / Decimal::from(100);
        let credits = (base_units * Decimal::from(self.fallback_credits_per_base))
            .floor()
            .to_i64()
            .unwrap_or(0);

        PurchaseGrant {
            credits,
            duration_months: self.fallback_duration_months,
            label: "custom".to_string(),
            from_tier: false,
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults with environment variable overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("CREDIT_CORE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(grant) = std::env::var("CREDIT_CORE_STARTING_CREDITS") {
            config.pricing.starting_credits = grant
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid starting credits: {}", e)))?;
        }

        Ok(config)
    }
}
