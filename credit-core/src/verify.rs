//! Payment reconciliation against the external gateway
//!
//! The verifier matches an external payment confirmation to an internal
//! credit effect exactly once. The gateway call is network I/O and runs
//! outside any balance-mutating scope; the final commit is delegated to
//! [`Ledger::credit`], whose storage-level unique-reference guard is the
//! defense against concurrent duplicate reconciliations.

use crate::{
    config::SubscriptionPolicy,
    types::{AccountId, EntryKind, PaymentReceipt, SubscriptionEffect},
    Error, Ledger, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Gateway response for one payment reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayVerification {
    /// True if the gateway recognized and accepted the reference
    pub succeeded: bool,

    /// Paid amount in the settlement currency's smallest unit
    pub amount_minor: i64,

    /// Settlement currency code
    pub currency: String,

    /// Gateway-reported transaction status
    pub status: String,
}

impl GatewayVerification {
    /// True if the gateway confirmed the payment
    pub fn is_success(&self) -> bool {
        self.succeeded && self.status == "success"
    }
}

/// External payment gateway, the sole truth source for confirmations
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Verify one payment reference. Errors cover unreachable gateways
    /// and timeouts; a reachable gateway that rejects the reference
    /// returns `Ok` with `succeeded == false`.
    async fn verify(&self, reference: &str) -> Result<GatewayVerification>;
}

/// Reconciles payment confirmations into ledger credits
#[derive(Clone)]
pub struct PaymentVerifier {
    ledger: Arc<Ledger>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentVerifier {
    /// Create a verifier over a ledger and a gateway client
    pub fn new(ledger: Arc<Ledger>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { ledger, gateway }
    }

    /// Reconcile one payment confirmation.
    ///
    /// Safe to re-invoke with the same reference: a settled reference
    /// short-circuits to [`Error::DuplicatePayment`] before any gateway
    /// I/O, and the storage-level guard catches the race where two calls
    /// pass that check concurrently.
    pub async fn reconcile(
        &self,
        account_id: AccountId,
        reference: &str,
        expected_amount_minor: i64,
    ) -> Result<PaymentReceipt> {
        let pricing = self.ledger.pricing();

        // Caller-facing validation, not a ledger event
        if !pricing.is_allowed_amount(expected_amount_minor) {
            return Err(Error::InvalidAmount(expected_amount_minor));
        }

        let account = self.ledger.get_account(account_id)?;

        // Cheap idempotent short-circuit before any gateway I/O
        if self.ledger.reference_exists(reference)? {
            return Err(Error::DuplicatePayment(reference.to_string()));
        }

        tracing::debug!(
            account_id = %account_id,
            reference = %reference,
            expected_amount_minor,
            "Verifying payment with gateway"
        );

        // Network I/O, outside any balance lock
        let verification = match self.gateway.verify(reference).await {
            Ok(v) => v,
            Err(e) => {
                self.ledger
                    .record_failure(
                        account_id,
                        reference,
                        expected_amount_minor,
                        EntryKind::SubscriptionCredit,
                        format!("Gateway unreachable: {}", e),
                    )
                    .await?;
                return Err(Error::VerificationFailed(e.to_string()));
            }
        };

        if !verification.is_success() {
            self.ledger
                .record_failure(
                    account_id,
                    reference,
                    expected_amount_minor,
                    EntryKind::SubscriptionCredit,
                    format!("Gateway reported status {}", verification.status),
                )
                .await?;
            return Err(Error::VerificationFailed(format!(
                "Gateway reported status {}",
                verification.status
            )));
        }

        // Settlement currency -> base units, compared against the
        // tolerated minimum (cross-currency settlement variance)
        let paid_base = Decimal::from(verification.amount_minor) / pricing.settlement_units_per_base;
        let expected_base = Decimal::from(expected_amount_minor) / Decimal::from(100);
        let threshold = expected_base * pricing.amount_tolerance;

        if paid_base < threshold {
            self.ledger
                .record_failure(
                    account_id,
                    reference,
                    expected_amount_minor,
                    EntryKind::SubscriptionCredit,
                    "Payment amount is lower than expected",
                )
                .await?;
            return Err(Error::AmountMismatch {
                expected_minor: expected_amount_minor,
                paid_minor: verification.amount_minor,
            });
        }

        let grant = pricing.grant_for(expected_amount_minor);
        let kind = if grant.from_tier {
            EntryKind::SubscriptionCredit
        } else {
            EntryKind::OneTimeCredit
        };

        let ends_at = subscription_end(
            pricing.subscription_policy,
            account.subscription_ends_at,
            grant.duration_months,
        )?;

        let receipt = self
            .ledger
            .credit(
                account_id,
                expected_amount_minor,
                grant.credits,
                reference,
                kind,
                Some(SubscriptionEffect {
                    ends_at,
                    label: grant.label.clone(),
                }),
            )
            .await?;

        tracing::info!(
            account_id = %account_id,
            reference = %reference,
            credits_added = grant.credits,
            new_balance = receipt.new_balance,
            subscription_type = %grant.label,
            "Payment reconciled"
        );

        Ok(PaymentReceipt {
            entry_id: receipt.entry_id,
            new_balance: receipt.new_balance,
            credits_added: grant.credits,
            subscription_ends_at: ends_at,
            subscription_type: grant.label,
        })
    }
}

/// Compute the new subscription end date under the configured policy
fn subscription_end(
    policy: SubscriptionPolicy,
    current_end: Option<DateTime<Utc>>,
    duration_months: u32,
) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    let base = match policy {
        SubscriptionPolicy::Reset => now,
        SubscriptionPolicy::Extend => current_end.map_or(now, |end| end.max(now)),
    };

    base.checked_add_months(Months::new(duration_months))
        .ok_or_else(|| Error::Other("Subscription end date out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway double with a fixed response and a call counter
    struct StaticGateway {
        amount_minor: i64,
        status: &'static str,
        reachable: bool,
        calls: AtomicUsize,
    }

    impl StaticGateway {
        fn paying(amount_minor: i64) -> Self {
            Self {
                amount_minor,
                status: "success",
                reachable: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                amount_minor: 0,
                status: "success",
                reachable: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn declined() -> Self {
            Self {
                amount_minor: 0,
                status: "failed",
                reachable: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for StaticGateway {
        async fn verify(&self, _reference: &str) -> Result<GatewayVerification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.reachable {
                return Err(Error::VerificationFailed("connection timed out".to_string()));
            }
            Ok(GatewayVerification {
                succeeded: self.status == "success",
                amount_minor: self.amount_minor,
                currency: "NGN".to_string(),
                status: self.status.to_string(),
            })
        }
    }

    async fn setup(gateway: StaticGateway) -> (Arc<Ledger>, PaymentVerifier, tempfile::TempDir) {
        setup_with_config(Config::default(), gateway).await
    }

    async fn setup_with_config(
        mut config: Config,
        gateway: StaticGateway,
    ) -> (Arc<Ledger>, PaymentVerifier, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        config.data_dir = temp_dir.path().to_path_buf();

        let ledger = Arc::new(Ledger::open(config).await.unwrap());
        let verifier = PaymentVerifier::new(ledger.clone(), Arc::new(gateway));
        (ledger, verifier, temp_dir)
    }

    #[tokio::test]
    async fn test_reconcile_at_tolerance_threshold() {
        // Expected $15, gateway pays 12000 kobo -> $12, threshold 15*0.8 = 12
        let (ledger, verifier, _temp) = setup(StaticGateway::paying(12_000)).await;
        let account = ledger.create_account("hash").await.unwrap();

        let receipt = verifier
            .reconcile(account.account_id, "R1", 1500)
            .await
            .unwrap();

        assert_eq!(receipt.credits_added, 120);
        assert_eq!(receipt.new_balance, 620);
        assert_eq!(receipt.subscription_type, "standard");
        assert!(receipt.subscription_ends_at > Utc::now() + chrono::Duration::days(27));

        let status = ledger.subscription_status(account.account_id).unwrap();
        assert!(status.active);

        assert!(ledger.check_reconciliation(account.account_id).unwrap());
    }

    #[tokio::test]
    async fn test_reconcile_below_threshold() {
        // Gateway pays 9000 kobo -> $9, below the $12 threshold
        let (ledger, verifier, _temp) = setup(StaticGateway::paying(9_000)).await;
        let account = ledger.create_account("hash").await.unwrap();

        let result = verifier.reconcile(account.account_id, "R1", 1500).await;
        assert!(matches!(
            result,
            Err(Error::AmountMismatch {
                expected_minor: 1500,
                paid_minor: 9000
            })
        ));

        // Balance unchanged; failed entry recorded with the reference
        assert_eq!(ledger.get_balance(account.account_id).unwrap(), 500);
        let entries = ledger.transactions(account.account_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reference.as_deref(), Some("R1"));
        assert_eq!(entries[0].credit_delta, 0);
        assert!(entries[0].error_message.is_some());

        // The reference is still eligible for a later success
        assert!(!ledger.reference_exists("R1").unwrap());
    }

    #[tokio::test]
    async fn test_reconcile_duplicate_short_circuits_gateway() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let ledger = Arc::new(Ledger::open(config).await.unwrap());
        let gateway = Arc::new(StaticGateway::paying(12_000));
        let verifier = PaymentVerifier::new(ledger.clone(), gateway.clone());
        let account = ledger.create_account("hash").await.unwrap();

        verifier
            .reconcile(account.account_id, "R1", 1500)
            .await
            .unwrap();

        let result = verifier.reconcile(account.account_id, "R1", 1500).await;
        assert!(matches!(result, Err(Error::DuplicatePayment(_))));

        // Credit applied exactly once, gateway contacted exactly once
        assert_eq!(ledger.get_balance(account.account_id).unwrap(), 620);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconcile_unreachable_gateway() {
        let (ledger, verifier, _temp) = setup(StaticGateway::unreachable()).await;
        let account = ledger.create_account("hash").await.unwrap();

        let result = verifier.reconcile(account.account_id, "R1", 500).await;
        assert!(matches!(result, Err(Error::VerificationFailed(_))));

        assert_eq!(ledger.get_balance(account.account_id).unwrap(), 500);
        let entries = ledger.transactions(account.account_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!ledger.reference_exists("R1").unwrap());
    }

    #[tokio::test]
    async fn test_reconcile_declined_by_gateway() {
        let (ledger, verifier, _temp) = setup(StaticGateway::declined()).await;
        let account = ledger.create_account("hash").await.unwrap();

        let result = verifier.reconcile(account.account_id, "R1", 500).await;
        assert!(matches!(result, Err(Error::VerificationFailed(_))));
        assert_eq!(ledger.get_balance(account.account_id).unwrap(), 500);
    }

    #[tokio::test]
    async fn test_reconcile_rejects_unlisted_amount() {
        let (ledger, verifier, _temp) = setup(StaticGateway::paying(12_000)).await;
        let account = ledger.create_account("hash").await.unwrap();

        let result = verifier.reconcile(account.account_id, "R1", 999).await;
        assert!(matches!(result, Err(Error::InvalidAmount(999))));

        // No ledger event for caller-side validation failures
        assert!(ledger.transactions(account.account_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_unknown_account() {
        let (_ledger, verifier, _temp) = setup(StaticGateway::paying(12_000)).await;

        let result = verifier
            .reconcile(AccountId::new(uuid::Uuid::new_v4()), "R1", 1500)
            .await;
        assert!(matches!(result, Err(Error::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_reconcile_credits_once() {
        let (ledger, verifier, _temp) = setup(StaticGateway::paying(12_000)).await;
        let account = ledger.create_account("hash").await.unwrap();

        let a = {
            let verifier = verifier.clone();
            let account_id = account.account_id;
            tokio::spawn(async move { verifier.reconcile(account_id, "R2", 1500).await })
        };
        let b = {
            let verifier = verifier.clone();
            let account_id = account.account_id;
            tokio::spawn(async move { verifier.reconcile(account_id, "R2", 1500).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(Error::DuplicatePayment(_))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(duplicates, 1);
        assert_eq!(ledger.get_balance(account.account_id).unwrap(), 620);
    }

    #[tokio::test]
    async fn test_extend_policy_stacks_duration() {
        let mut config = Config::default();
        config.pricing.subscription_policy = SubscriptionPolicy::Extend;

        let (ledger, verifier, _temp) =
            setup_with_config(config, StaticGateway::paying(12_000)).await;
        let account = ledger.create_account("hash").await.unwrap();

        let first = verifier
            .reconcile(account.account_id, "R1", 1500)
            .await
            .unwrap();
        let second = verifier
            .reconcile(account.account_id, "R2", 1500)
            .await
            .unwrap();

        // Second purchase extends from the first end date, not from now
        assert!(second.subscription_ends_at > first.subscription_ends_at);
        assert!(
            second.subscription_ends_at
                > Utc::now() + chrono::Duration::days(55)
        );
    }

    #[tokio::test]
    async fn test_reset_policy_replaces_end_date() {
        let (ledger, verifier, _temp) = setup(StaticGateway::paying(12_000)).await;
        let account = ledger.create_account("hash").await.unwrap();

        verifier
            .reconcile(account.account_id, "R1", 1500)
            .await
            .unwrap();
        let second = verifier
            .reconcile(account.account_id, "R2", 1500)
            .await
            .unwrap();

        // Still roughly one month out
        assert!(second.subscription_ends_at < Utc::now() + chrono::Duration::days(35));
    }
}
