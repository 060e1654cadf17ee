//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Authoritative account records (key: account_id)
//! - `entries` - Append-only ledger entry log (key: entry_id, UUIDv7)
//! - `messages` - Archived chat turns (key: message_id, UUIDv7)
//! - `indices` - Secondary indices for fast lookups
//!
//! # Index keys
//!
//! - `ref|<reference>` -> entry_id: the unique-reference guard. Written
//!   only for completed payment entries; its presence is what makes a
//!   second reconciliation of the same reference fail.
//! - `ae|<account_id><entry_id>` -> empty: per-account entry listing.
//! - `am|<account_id><message_id>` -> empty: per-account message listing.
//!
//! All writers go through the single-writer actor, so a check staged in
//! [`Storage::apply_entry`] cannot be invalidated before its `WriteBatch`
//! commits.

use crate::{
    error::{Error, Result},
    types::{Account, AccountId, ChatMessage, EntryStatus, LedgerEntry, SubscriptionEffect},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_ENTRIES: &str = "entries";
const CF_MESSAGES: &str = "messages";
const CF_INDICES: &str = "indices";

/// Index key tags
const TAG_REFERENCE: &[u8] = b"ref|";
const TAG_ACCOUNT_ENTRY: &[u8] = b"ae|";
const TAG_ACCOUNT_MESSAGE: &[u8] = b"am|";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for append-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_MESSAGES, Self::cf_options_messages()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Accounts are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_messages() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle. The CF set is fixed at open;
    // nothing creates or drops families at runtime.

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Account operations

    /// Create account record
    pub fn create_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let key = account.account_id.as_bytes();
        let value = bincode::serialize(account)?;

        self.db.put_cf(cf, key, &value)?;

        tracing::info!(
            account_id = %account.account_id,
            credits = account.credits,
            "Account created"
        );

        Ok(())
    }

    /// Get account by ID
    pub fn get_account(&self, account_id: AccountId) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let key = account_id.as_bytes();

        let value = self
            .db
            .get_cf(cf, key)?
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))?;

        let account: Account = bincode::deserialize(&value)?;
        Ok(account)
    }

    /// Get current balance
    pub fn get_balance(&self, account_id: AccountId) -> Result<i64> {
        Ok(self.get_account(account_id)?.credits)
    }

    // Entry log operations

    /// Check the unique-reference guard: true if a completed entry already
    /// consumed this payment reference
    pub fn reference_exists(&self, reference: &str) -> Result<bool> {
        let cf = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_reference(reference);
        Ok(self.db.get_cf(cf, &key)?.is_some())
    }

    /// Apply one ledger entry atomically.
    ///
    /// For completed entries this is the conditional balance adjustment:
    /// the new balance is computed and rejected before anything is staged,
    /// the unique-reference guard is checked, and the account update, the
    /// entry, and the index writes commit as one `WriteBatch`. Failed
    /// entries are audit records only: they never touch the balance and
    /// never consume a reference's idempotency slot.
    ///
    /// Returns the balance after the commit.
    pub fn apply_entry(
        &self,
        entry: &LedgerEntry,
        subscription: Option<&SubscriptionEffect>,
    ) -> Result<i64> {
        let mut account = self.get_account(entry.account_id)?;

        let mut batch = WriteBatch::default();

        if entry.status == EntryStatus::Completed {
            if let Some(reference) = &entry.reference {
                if self.reference_exists(reference)? {
                    return Err(Error::DuplicatePayment(reference.clone()));
                }
            }

            let new_balance = account.credits + entry.credit_delta;
            if new_balance < 0 {
                return Err(Error::InsufficientCredits {
                    required: -entry.credit_delta,
                    available: account.credits,
                });
            }

            account.credits = new_balance;
            if let Some(effect) = subscription {
                account.subscription_ends_at = Some(effect.ends_at);
                account.subscription_type = Some(effect.label.clone());
            }
            account.updated_at = entry.created_at;

            let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
            let account_value = bincode::serialize(&account)?;
            batch.put_cf(cf_accounts, account.account_id.as_bytes(), &account_value);

            if let Some(reference) = &entry.reference {
                let cf_indices = self.cf_handle(CF_INDICES)?;
                batch.put_cf(
                    cf_indices,
                    Self::index_key_reference(reference),
                    entry.entry_id.as_bytes(),
                );
            }
        }

        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let entry_value = bincode::serialize(entry)?;
        batch.put_cf(cf_entries, entry.entry_id.as_bytes(), &entry_value);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx_account_entry = Self::index_key_account_entry(entry.account_id, entry.entry_id);
        batch.put_cf(cf_indices, &idx_account_entry, b"");

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(
            entry_id = %entry.entry_id,
            account_id = %entry.account_id,
            kind = %entry.kind,
            credit_delta = entry.credit_delta,
            new_balance = account.credits,
            "Entry applied"
        );

        Ok(account.credits)
    }

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        let key = entry_id.as_bytes();

        let value = self
            .db
            .get_cf(cf, key)?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;

        let entry: LedgerEntry = bincode::deserialize(&value)?;
        Ok(entry)
    }

    /// Get all entries for an account, oldest first (via index)
    pub fn list_entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>> {
        let mut entries = Vec::new();

        let prefix = Self::index_key_account_entry_prefix(account_id);
        for key in self.scan_index_keys(&prefix)? {
            // Extract entry_id from key (last 16 bytes)
            if key.len() == prefix.len() + 16 {
                let entry_id_bytes: [u8; 16] = key[prefix.len()..].try_into().map_err(|_| {
                    Error::Storage("Malformed account-entry index key".to_string())
                })?;
                let entry = self.get_entry(Uuid::from_bytes(entry_id_bytes))?;
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| (a.created_at, a.entry_id).cmp(&(b.created_at, b.entry_id)));

        Ok(entries)
    }

    // Message operations

    /// Append one chat turn
    pub fn append_message(&self, message: &ChatMessage) -> Result<()> {
        let cf_messages = self.cf_handle(CF_MESSAGES)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        let value = bincode::serialize(message)?;
        batch.put_cf(cf_messages, message.message_id.as_bytes(), &value);

        let idx = Self::index_key_account_message(message.account_id, message.message_id);
        batch.put_cf(cf_indices, &idx, b"");

        self.db.write(batch)?;

        tracing::debug!(
            message_id = %message.message_id,
            account_id = %message.account_id,
            session_id = %message.session_id,
            "Message archived"
        );

        Ok(())
    }

    /// Get all archived turns for an account, grouped by session and
    /// chronological within each session
    pub fn sessions(&self, account_id: AccountId) -> Result<BTreeMap<String, Vec<ChatMessage>>> {
        let cf_messages = self.cf_handle(CF_MESSAGES)?;

        let mut sessions: BTreeMap<String, Vec<ChatMessage>> = BTreeMap::new();

        let prefix = Self::index_key_account_message_prefix(account_id);
        for key in self.scan_index_keys(&prefix)? {
            if key.len() == prefix.len() + 16 {
                let message_id_bytes: [u8; 16] = key[prefix.len()..].try_into().map_err(|_| {
                    Error::Storage("Malformed account-message index key".to_string())
                })?;

                let value = self
                    .db
                    .get_cf(cf_messages, message_id_bytes)?
                    .ok_or_else(|| Error::Storage("Dangling message index".to_string()))?;
                let message: ChatMessage = bincode::deserialize(&value)?;

                sessions
                    .entry(message.session_id.clone())
                    .or_default()
                    .push(message);
            }
        }

        // Key order is only millisecond-granular (UUIDv7); break ties
        // with the full timestamp
        for messages in sessions.values_mut() {
            messages.sort_by(|a, b| (a.created_at, a.message_id).cmp(&(b.created_at, b.message_id)));
        }

        Ok(sessions)
    }

    /// Delete all archived turns for one account. Returns the number of
    /// messages removed. Other accounts are untouched.
    pub fn clear_messages(&self, account_id: AccountId) -> Result<u64> {
        let cf_messages = self.cf_handle(CF_MESSAGES)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let prefix = Self::index_key_account_message_prefix(account_id);
        let keys = self.scan_index_keys(&prefix)?;

        let mut batch = WriteBatch::default();
        let mut removed = 0u64;
        for key in &keys {
            if key.len() == prefix.len() + 16 {
                batch.delete_cf(cf_messages, &key[prefix.len()..]);
                batch.delete_cf(cf_indices, key);
                removed += 1;
            }
        }

        self.db.write(batch)?;

        tracing::info!(account_id = %account_id, removed, "Chat history cleared");

        Ok(removed)
    }

    // Index key helpers

    fn index_key_reference(reference: &str) -> Vec<u8> {
        let mut key = TAG_REFERENCE.to_vec();
        key.extend_from_slice(reference.as_bytes());
        key
    }

    fn index_key_account_entry_prefix(account_id: AccountId) -> Vec<u8> {
        let mut key = TAG_ACCOUNT_ENTRY.to_vec();
        key.extend_from_slice(account_id.as_bytes());
        key
    }

    fn index_key_account_entry(account_id: AccountId, entry_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_key_account_entry_prefix(account_id);
        key.extend_from_slice(entry_id.as_bytes());
        key
    }

    fn index_key_account_message_prefix(account_id: AccountId) -> Vec<u8> {
        let mut key = TAG_ACCOUNT_MESSAGE.to_vec();
        key.extend_from_slice(account_id.as_bytes());
        key
    }

    fn index_key_account_message(account_id: AccountId, message_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_key_account_message_prefix(account_id);
        key.extend_from_slice(message_id.as_bytes());
        key
    }

    /// Collect index keys under a prefix, in key order
    fn scan_index_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf_handle(CF_INDICES)?;

        let mut keys = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }

        Ok(keys)
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let cf_messages = self.cf_handle(CF_MESSAGES)?;

        Ok(StorageStats {
            total_accounts: self.approximate_count(cf_accounts)?,
            total_entries: self.approximate_count(cf_entries)?,
            total_messages: self.approximate_count(cf_messages)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_accounts: u64,
    pub total_entries: u64,
    pub total_messages: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMode, ChatRole, EntryKind};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn test_account() -> Account {
        let now = Utc::now();
        Account {
            account_id: AccountId::new(Uuid::new_v4()),
            credential_hash: "$2b$10$hash".to_string(),
            credits: 500,
            subscription_ends_at: None,
            subscription_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn debit_entry(account_id: AccountId, cost: i64) -> LedgerEntry {
        LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id,
            amount_minor: -cost,
            credit_delta: -cost,
            reference: None,
            status: EntryStatus::Completed,
            kind: EntryKind::ChatDebit,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    fn payment_entry(account_id: AccountId, reference: &str, credits: i64) -> LedgerEntry {
        LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id,
            amount_minor: 1500,
            credit_delta: credits,
            reference: Some(reference.to_string()),
            status: EntryStatus::Completed,
            kind: EntryKind::SubscriptionCredit,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    fn chat_message(account_id: AccountId, session_id: &str, role: ChatRole) -> ChatMessage {
        ChatMessage {
            message_id: Uuid::now_v7(),
            account_id,
            session_id: session_id.to_string(),
            role,
            content: "hello".to_string(),
            mode: ChatMode::General,
            cost: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(storage.db.cf_handle(CF_ENTRIES).is_some());
    }

    #[test]
    fn test_create_and_get_account() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account();
        storage.create_account(&account).unwrap();

        let retrieved = storage.get_account(account.account_id).unwrap();
        assert_eq!(retrieved.account_id, account.account_id);
        assert_eq!(retrieved.credits, 500);
        assert_eq!(storage.get_balance(account.account_id).unwrap(), 500);
    }

    #[test]
    fn test_get_account_not_found() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let result = storage.get_account(AccountId::new(Uuid::new_v4()));
        assert!(matches!(result, Err(Error::AccountNotFound(_))));
    }

    #[test]
    fn test_apply_debit() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account();
        storage.create_account(&account).unwrap();

        let entry = debit_entry(account.account_id, 5);
        let new_balance = storage.apply_entry(&entry, None).unwrap();
        assert_eq!(new_balance, 495);

        let entries = storage.list_entries(account.account_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].credit_delta, -5);
    }

    #[test]
    fn test_apply_debit_insufficient_leaves_no_trace() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let mut account = test_account();
        account.credits = 3;
        storage.create_account(&account).unwrap();

        let entry = debit_entry(account.account_id, 5);
        let result = storage.apply_entry(&entry, None);
        assert!(matches!(
            result,
            Err(Error::InsufficientCredits {
                required: 5,
                available: 3
            })
        ));

        // No balance change, no entry written
        assert_eq!(storage.get_balance(account.account_id).unwrap(), 3);
        assert!(storage.list_entries(account.account_id).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_reference_rejected() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account();
        storage.create_account(&account).unwrap();

        let first = payment_entry(account.account_id, "ref_1", 120);
        storage.apply_entry(&first, None).unwrap();
        assert!(storage.reference_exists("ref_1").unwrap());

        let second = payment_entry(account.account_id, "ref_1", 120);
        let result = storage.apply_entry(&second, None);
        assert!(matches!(result, Err(Error::DuplicatePayment(_))));

        // Credit applied exactly once
        assert_eq!(storage.get_balance(account.account_id).unwrap(), 620);
        assert_eq!(storage.list_entries(account.account_id).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_entry_keeps_reference_free() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account();
        storage.create_account(&account).unwrap();

        let mut failed = payment_entry(account.account_id, "ref_2", 0);
        failed.status = EntryStatus::Failed;
        failed.credit_delta = 0;
        failed.error_message = Some("gateway verification failed".to_string());

        storage.apply_entry(&failed, None).unwrap();

        // Audit record written, balance untouched, slot still free
        assert_eq!(storage.get_balance(account.account_id).unwrap(), 500);
        assert!(!storage.reference_exists("ref_2").unwrap());

        let completed = payment_entry(account.account_id, "ref_2", 120);
        storage.apply_entry(&completed, None).unwrap();
        assert_eq!(storage.get_balance(account.account_id).unwrap(), 620);

        let entries = storage.list_entries(account.account_id).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_subscription_effect_applied_atomically() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account();
        storage.create_account(&account).unwrap();

        let ends_at = Utc::now() + chrono::Duration::days(30);
        let effect = SubscriptionEffect {
            ends_at,
            label: "standard".to_string(),
        };

        let entry = payment_entry(account.account_id, "ref_3", 120);
        storage.apply_entry(&entry, Some(&effect)).unwrap();

        let updated = storage.get_account(account.account_id).unwrap();
        assert_eq!(updated.credits, 620);
        assert_eq!(updated.subscription_ends_at, Some(ends_at));
        assert_eq!(updated.subscription_type.as_deref(), Some("standard"));
    }

    #[test]
    fn test_messages_grouped_by_session() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account();
        storage.create_account(&account).unwrap();

        storage
            .append_message(&chat_message(account.account_id, "s1", ChatRole::User))
            .unwrap();
        storage
            .append_message(&chat_message(account.account_id, "s1", ChatRole::Model))
            .unwrap();
        storage
            .append_message(&chat_message(account.account_id, "s2", ChatRole::User))
            .unwrap();

        let sessions = storage.sessions(account.account_id).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions["s1"].len(), 2);
        assert_eq!(sessions["s2"].len(), 1);

        // Chronological within a session
        assert_eq!(sessions["s1"][0].role, ChatRole::User);
        assert_eq!(sessions["s1"][1].role, ChatRole::Model);
    }

    #[test]
    fn test_shared_across_threads() {
        let (config, _temp) = test_config();
        let storage = Arc::new(Storage::open(&config).unwrap());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let storage = storage.clone();
            handles.push(std::thread::spawn(move || {
                let account = test_account();
                storage.create_account(&account).unwrap();
                storage
                    .apply_entry(&debit_entry(account.account_id, 5), None)
                    .unwrap();
                storage
                    .append_message(&chat_message(account.account_id, "s1", ChatRole::User))
                    .unwrap();
                storage.get_balance(account.account_id).unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 495);
        }
    }

    #[test]
    fn test_stats_and_close() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account();
        storage.create_account(&account).unwrap();
        storage
            .apply_entry(&debit_entry(account.account_id, 5), None)
            .unwrap();
        storage
            .append_message(&chat_message(account.account_id, "s1", ChatRole::User))
            .unwrap();

        let stats = storage.get_stats().unwrap();
        assert!(stats.total_accounts >= 1);
        assert!(stats.total_entries >= 1);
        assert!(stats.total_messages >= 1);

        storage.close().unwrap();
    }

    #[test]
    fn test_clear_messages_scoped_to_account() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account_a = test_account();
        let account_b = test_account();
        storage.create_account(&account_a).unwrap();
        storage.create_account(&account_b).unwrap();

        storage
            .append_message(&chat_message(account_a.account_id, "s1", ChatRole::User))
            .unwrap();
        storage
            .append_message(&chat_message(account_b.account_id, "s1", ChatRole::User))
            .unwrap();

        let removed = storage.clear_messages(account_a.account_id).unwrap();
        assert_eq!(removed, 1);

        assert!(storage.sessions(account_a.account_id).unwrap().is_empty());
        assert_eq!(storage.sessions(account_b.account_id).unwrap().len(), 1);
    }
}
