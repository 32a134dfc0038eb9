// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded governance database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized UserRecord
//! - `wallet_owners`: lowercase wallet address → user_id
//! - `accounts`: account_id → serialized GovernanceAccount
//! - `members`: member_id → serialized Member
//! - `member_index`: composite key (account_id|public_key) → member_id
//! - `transactions`: transaction_id → serialized GovernedTransaction
//! - `account_tx_index`: composite key (account_id|index_be) → transaction_id
//! - `proposals`: transaction_id → serialized Proposal
//! - `approvals`: composite key (transaction_id|member_id) → serialized Approval
//! - `signer_removals`: composite key (account_id|timestamp_be|removal_id) → serialized SignerRemoval
//! - `member_activity`: public_key → serialized MemberActivity
//! - `settings_changes`: change_id → serialized SettingsChange
//!
//! ## Atomicity
//!
//! redb admits a single writer at a time. Every read-modify-write the engine
//! performs (vote tallying, status compare-and-set, index allocation, signer
//! removal, settings application) runs inside one [`GovernanceStore::write`] closure, so two
//! concurrent callers always observe each other's committed state.

use std::path::Path;

use redb::{
    Database, Key, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, Value,
    WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

use super::records::{
    Approval, GovernanceAccount, GovernedTransaction, Member, MemberActivity, Proposal,
    SettingsChange, SignerRemoval, TxStatus, UserRecord,
};

// =============================================================================
// Table Definitions
// =============================================================================

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

const WALLET_OWNERS: TableDefinition<&str, &str> = TableDefinition::new("wallet_owners");

const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

const MEMBERS: TableDefinition<&str, &[u8]> = TableDefinition::new("members");

/// Key format: `account_id|public_key`.
const MEMBER_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("member_index");

const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// Key format: `account_id|index_be` so a prefix scan yields index order.
const ACCOUNT_TX_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("account_tx_index");

const PROPOSALS: TableDefinition<&str, &[u8]> = TableDefinition::new("proposals");

/// Key format: `transaction_id|member_id`; one row per member per transaction.
const APPROVALS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("approvals");

/// Key format: `account_id|timestamp_be|removal_id` for chronological scans.
const SIGNER_REMOVALS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("signer_removals");

const MEMBER_ACTIVITY: TableDefinition<&str, &[u8]> = TableDefinition::new("member_activity");

const SETTINGS_CHANGES: TableDefinition<&str, &[u8]> = TableDefinition::new("settings_changes");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Key Helpers
// =============================================================================

fn composite_key(parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(b'|');
        }
        key.extend_from_slice(part);
    }
    key
}

fn make_prefix(owner: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(owner.len() + 1);
    prefix.extend_from_slice(owner.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a prefix scan. 0xFF never occurs in UTF-8 and exceeds any
/// big-endian component we store.
fn make_prefix_end(owner: &str) -> Vec<u8> {
    let mut end = make_prefix(owner);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

fn member_index_key(account_id: &str, public_key: &str) -> Vec<u8> {
    composite_key(&[account_id.as_bytes(), public_key.as_bytes()])
}

fn tx_index_key(account_id: &str, index: u64) -> Vec<u8> {
    composite_key(&[account_id.as_bytes(), &index.to_be_bytes()])
}

fn approval_key(transaction_id: &str, member_id: &str) -> Vec<u8> {
    composite_key(&[transaction_id.as_bytes(), member_id.as_bytes()])
}

fn removal_key(removal: &SignerRemoval) -> Vec<u8> {
    let ts = removal.removed_at.timestamp_millis() as u64;
    composite_key(&[
        removal.account_id.as_bytes(),
        &ts.to_be_bytes(),
        removal.removal_id.as_bytes(),
    ])
}

// =============================================================================
// Table Helpers
// =============================================================================

fn get_json<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StoreResult<Option<T>> {
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn all_json<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
) -> StoreResult<Vec<T>> {
    let mut out = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        out.push(serde_json::from_slice(value.value())?);
    }
    Ok(out)
}

fn scan_json<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    owner: &str,
) -> StoreResult<Vec<T>> {
    let start = make_prefix(owner);
    let end = make_prefix_end(owner);
    let mut out = Vec::new();
    for entry in table.range(start.as_slice()..end.as_slice())? {
        let (_, value) = entry?;
        out.push(serde_json::from_slice(value.value())?);
    }
    Ok(out)
}

fn scan_ids(
    table: &impl ReadableTable<&'static [u8], &'static str>,
    owner: &str,
) -> StoreResult<Vec<String>> {
    let start = make_prefix(owner);
    let end = make_prefix_end(owner);
    let mut out = Vec::new();
    for entry in table.range(start.as_slice()..end.as_slice())? {
        let (_, value) = entry?;
        out.push(value.value().to_string());
    }
    Ok(out)
}

// =============================================================================
// Reader Trait
// =============================================================================

/// Typed read access shared by snapshot reads and write transactions.
pub trait StoreReader {
    /// Open a table inside the underlying redb transaction.
    fn table<K: Key + 'static, V: Value + 'static>(
        &self,
        definition: TableDefinition<'static, K, V>,
    ) -> StoreResult<impl ReadableTable<K, V> + '_>;

    fn user(&self, user_id: &str) -> StoreResult<Option<UserRecord>> {
        get_json(&self.table(USERS)?, user_id)
    }

    /// Owner of a wallet address (case-insensitive).
    fn wallet_owner(&self, address: &str) -> StoreResult<Option<String>> {
        let table = self.table(WALLET_OWNERS)?;
        let addr = address.to_lowercase();
        let owner = table.get(addr.as_str())?.map(|v| v.value().to_string());
        Ok(owner)
    }

    fn account(&self, account_id: &str) -> StoreResult<Option<GovernanceAccount>> {
        get_json(&self.table(ACCOUNTS)?, account_id)
    }

    fn accounts(&self) -> StoreResult<Vec<GovernanceAccount>> {
        all_json(&self.table(ACCOUNTS)?)
    }

    fn member(&self, member_id: &str) -> StoreResult<Option<Member>> {
        get_json(&self.table(MEMBERS)?, member_id)
    }

    fn member_by_key(&self, account_id: &str, public_key: &str) -> StoreResult<Option<Member>> {
        let member_id = {
            let index = self.table(MEMBER_INDEX)?;
            let key = member_index_key(account_id, public_key);
            let found = index.get(key.as_slice())?.map(|v| v.value().to_string());
            found
        };
        match member_id {
            Some(id) => self.member(&id),
            None => Ok(None),
        }
    }

    /// Members of an account ordered by public key.
    fn members(&self, account_id: &str) -> StoreResult<Vec<Member>> {
        let ids = scan_ids(&self.table(MEMBER_INDEX)?, account_id)?;
        let table = self.table(MEMBERS)?;
        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(member) = get_json(&table, &id)? {
                members.push(member);
            }
        }
        Ok(members)
    }

    fn transaction(&self, transaction_id: &str) -> StoreResult<Option<GovernedTransaction>> {
        get_json(&self.table(TRANSACTIONS)?, transaction_id)
    }

    /// Transactions of an account in transaction-index order.
    fn account_transactions(&self, account_id: &str) -> StoreResult<Vec<GovernedTransaction>> {
        let ids = scan_ids(&self.table(ACCOUNT_TX_INDEX)?, account_id)?;
        let table = self.table(TRANSACTIONS)?;
        let mut txs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tx) = get_json(&table, &id)? {
                txs.push(tx);
            }
        }
        Ok(txs)
    }

    fn proposal(&self, transaction_id: &str) -> StoreResult<Option<Proposal>> {
        get_json(&self.table(PROPOSALS)?, transaction_id)
    }

    fn approvals(&self, transaction_id: &str) -> StoreResult<Vec<Approval>> {
        scan_json(&self.table(APPROVALS)?, transaction_id)
    }

    fn approval(&self, transaction_id: &str, member_id: &str) -> StoreResult<Option<Approval>> {
        let table = self.table(APPROVALS)?;
        let key = approval_key(transaction_id, member_id);
        let found = match table.get(key.as_slice())? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(found)
    }

    /// Signer removals for an account, oldest first.
    fn removals(&self, account_id: &str) -> StoreResult<Vec<SignerRemoval>> {
        scan_json(&self.table(SIGNER_REMOVALS)?, account_id)
    }

    fn activity(&self, public_key: &str) -> StoreResult<Option<MemberActivity>> {
        get_json(&self.table(MEMBER_ACTIVITY)?, public_key)
    }

    fn settings_change(&self, change_id: &str) -> StoreResult<Option<SettingsChange>> {
        get_json(&self.table(SETTINGS_CHANGES)?, change_id)
    }

    /// Settings changes of an account, oldest first.
    fn settings_changes(&self, account_id: &str) -> StoreResult<Vec<SettingsChange>> {
        let all: Vec<SettingsChange> = all_json(&self.table(SETTINGS_CHANGES)?)?;
        let mut changes: Vec<SettingsChange> = all
            .into_iter()
            .filter(|c| c.account_id == account_id)
            .collect();
        changes.sort_by_key(|c| c.created_at);
        Ok(changes)
    }
}

// =============================================================================
// Transaction Scopes
// =============================================================================

/// Consistent read-only snapshot.
pub struct StoreRead {
    txn: ReadTransaction,
}

impl StoreReader for StoreRead {
    fn table<K: Key + 'static, V: Value + 'static>(
        &self,
        definition: TableDefinition<'static, K, V>,
    ) -> StoreResult<impl ReadableTable<K, V> + '_> {
        Ok(self.txn.open_table(definition)?)
    }
}

/// Read-write scope handed to [`GovernanceStore::write`] closures.
pub struct StoreWrite<'a> {
    txn: &'a WriteTransaction,
}

impl StoreReader for StoreWrite<'_> {
    fn table<K: Key + 'static, V: Value + 'static>(
        &self,
        definition: TableDefinition<'static, K, V>,
    ) -> StoreResult<impl ReadableTable<K, V> + '_> {
        Ok(self.txn.open_table(definition)?)
    }
}

impl StoreWrite<'_> {
    fn put_json<T: Serialize>(
        &self,
        definition: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let json = serde_json::to_vec(value)?;
        let mut table = self.txn.open_table(definition)?;
        table.insert(key, json.as_slice())?;
        Ok(())
    }

    pub fn put_user(&self, user: &UserRecord) -> StoreResult<()> {
        self.put_json(USERS, &user.user_id, user)
    }

    pub fn put_wallet_owner(&self, address: &str, user_id: &str) -> StoreResult<()> {
        let addr = address.to_lowercase();
        let mut table = self.txn.open_table(WALLET_OWNERS)?;
        table.insert(addr.as_str(), user_id)?;
        Ok(())
    }

    pub fn put_account(&self, account: &GovernanceAccount) -> StoreResult<()> {
        self.put_json(ACCOUNTS, &account.account_id, account)
    }

    /// Insert or update a member and its (account, key) index entry.
    pub fn put_member(&self, member: &Member) -> StoreResult<()> {
        self.put_json(MEMBERS, &member.member_id, member)?;
        let key = member_index_key(&member.account_id, &member.public_key);
        let mut index = self.txn.open_table(MEMBER_INDEX)?;
        index.insert(key.as_slice(), member.member_id.as_str())?;
        Ok(())
    }

    /// Insert or update a transaction and its per-account index entry.
    pub fn put_transaction(&self, tx: &GovernedTransaction) -> StoreResult<()> {
        self.put_json(TRANSACTIONS, &tx.transaction_id, tx)?;
        let key = tx_index_key(&tx.account_id, tx.transaction_index);
        let mut index = self.txn.open_table(ACCOUNT_TX_INDEX)?;
        index.insert(key.as_slice(), tx.transaction_id.as_str())?;
        Ok(())
    }

    pub fn put_proposal(&self, proposal: &Proposal) -> StoreResult<()> {
        self.put_json(PROPOSALS, &proposal.transaction_id, proposal)
    }

    /// Upsert the single approval row for (transaction, member).
    pub fn put_approval(&self, approval: &Approval) -> StoreResult<()> {
        let json = serde_json::to_vec(approval)?;
        let key = approval_key(&approval.transaction_id, &approval.member_id);
        let mut table = self.txn.open_table(APPROVALS)?;
        table.insert(key.as_slice(), json.as_slice())?;
        Ok(())
    }

    pub fn put_removal(&self, removal: &SignerRemoval) -> StoreResult<()> {
        let json = serde_json::to_vec(removal)?;
        let key = removal_key(removal);
        let mut table = self.txn.open_table(SIGNER_REMOVALS)?;
        table.insert(key.as_slice(), json.as_slice())?;
        Ok(())
    }

    pub fn put_activity(&self, activity: &MemberActivity) -> StoreResult<()> {
        self.put_json(MEMBER_ACTIVITY, &activity.member_key, activity)
    }

    pub fn put_settings_change(&self, change: &SettingsChange) -> StoreResult<()> {
        self.put_json(SETTINGS_CHANGES, &change.change_id, change)
    }
}

// =============================================================================
// GovernanceStore
// =============================================================================

/// Durable Persistence Store for the governance engine.
pub struct GovernanceStore {
    db: Database,
}

impl GovernanceStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(WALLET_OWNERS)?;
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(MEMBERS)?;
            let _ = write_txn.open_table(MEMBER_INDEX)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(ACCOUNT_TX_INDEX)?;
            let _ = write_txn.open_table(PROPOSALS)?;
            let _ = write_txn.open_table(APPROVALS)?;
            let _ = write_txn.open_table(SIGNER_REMOVALS)?;
            let _ = write_txn.open_table(MEMBER_ACTIVITY)?;
            let _ = write_txn.open_table(SETTINGS_CHANGES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a consistent read-only snapshot.
    pub fn read(&self) -> StoreResult<StoreRead> {
        Ok(StoreRead {
            txn: self.db.begin_read()?,
        })
    }

    /// Run `f` inside a single write transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`; any error aborts it
    /// and leaves the database untouched.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreWrite<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let txn = self.db.begin_write().map_err(StoreError::from)?;
        let outcome = f(&StoreWrite { txn: &txn });
        match outcome {
            Ok(value) => {
                txn.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort governance write");
                }
                Err(e)
            }
        }
    }

    /// Verify the database can serve reads.
    pub fn health_check(&self) -> StoreResult<()> {
        let read = self.read()?;
        let _ = read.table(ACCOUNTS)?;
        Ok(())
    }

    /// All transactions currently in `status`, across accounts.
    pub fn transactions_with_status(&self, status: TxStatus) -> StoreResult<Vec<GovernedTransaction>> {
        let read = self.read()?;
        let all: Vec<GovernedTransaction> = all_json(&read.table(TRANSACTIONS)?)?;
        Ok(all.into_iter().filter(|tx| tx.status == status).collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::records::{Capabilities, ProposalStatus, VoteType};
    use chrono::{Duration, Utc};

    fn temp_store() -> (GovernanceStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = GovernanceStore::open(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    fn sample_member(account_id: &str, member_id: &str, key: &str) -> Member {
        Member {
            member_id: member_id.to_string(),
            account_id: account_id.to_string(),
            public_key: key.to_string(),
            capabilities: Capabilities::ALL,
            active: true,
            user_id: None,
            added_at: Utc::now(),
            deactivated_at: None,
        }
    }

    fn sample_tx(account_id: &str, id: &str, index: u64) -> GovernedTransaction {
        let now = Utc::now();
        GovernedTransaction {
            transaction_id: id.to_string(),
            account_id: account_id.to_string(),
            transaction_index: index,
            from_wallet: "wallet-from".to_string(),
            to_wallet: "wallet-to".to_string(),
            amount: "10".to_string(),
            currency: "EURC".to_string(),
            notes: None,
            requested_by: "key-a".to_string(),
            status: TxStatus::Pending,
            tx_hash: None,
            proposal_instruction: None,
            failure_reason: None,
            execution_attempts: 0,
            executed_by: None,
            executed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn members_are_scoped_to_account() {
        let (store, _dir) = temp_store();
        store
            .write(|w| -> StoreResult<()> {
                w.put_member(&sample_member("acct-1", "m1", "key-a"))?;
                w.put_member(&sample_member("acct-1", "m2", "key-b"))?;
                w.put_member(&sample_member("acct-10", "m3", "key-c"))?;
                Ok(())
            })
            .unwrap();

        let read = store.read().unwrap();
        let members = read.members("acct-1").unwrap();
        assert_eq!(members.len(), 2);

        let found = read.member_by_key("acct-1", "key-b").unwrap().unwrap();
        assert_eq!(found.member_id, "m2");
        assert!(read.member_by_key("acct-1", "key-c").unwrap().is_none());
    }

    #[test]
    fn account_transactions_follow_index_order() {
        let (store, _dir) = temp_store();
        store
            .write(|w| -> StoreResult<()> {
                w.put_transaction(&sample_tx("acct-1", "tx-3", 3))?;
                w.put_transaction(&sample_tx("acct-1", "tx-1", 1))?;
                w.put_transaction(&sample_tx("acct-1", "tx-2", 256))?;
                Ok(())
            })
            .unwrap();

        let read = store.read().unwrap();
        let indices: Vec<u64> = read
            .account_transactions("acct-1")
            .unwrap()
            .iter()
            .map(|tx| tx.transaction_index)
            .collect();
        assert_eq!(indices, vec![1, 3, 256]);
    }

    #[test]
    fn approval_upsert_keeps_single_row() {
        let (store, _dir) = temp_store();
        let mut approval = Approval {
            transaction_id: "tx-1".to_string(),
            member_id: "m1".to_string(),
            member_key: "key-a".to_string(),
            vote: VoteType::Approve,
            voted_at: Utc::now(),
            created_at: Utc::now(),
        };
        store.write(|w| w.put_approval(&approval)).unwrap();
        approval.vote = VoteType::Reject;
        store.write(|w| w.put_approval(&approval)).unwrap();

        let read = store.read().unwrap();
        let approvals = read.approvals("tx-1").unwrap();
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].vote, VoteType::Reject);
    }

    #[test]
    fn single_approval_lookup() {
        let (store, _dir) = temp_store();
        let approval = Approval {
            transaction_id: "tx-1".to_string(),
            member_id: "m1".to_string(),
            member_key: "key-a".to_string(),
            vote: VoteType::Reject,
            voted_at: Utc::now(),
            created_at: Utc::now(),
        };
        store.write(|w| w.put_approval(&approval)).unwrap();

        let read = store.read().unwrap();
        let found = read.approval("tx-1", "m1").unwrap().unwrap();
        assert_eq!(found.vote, VoteType::Reject);
        assert!(read.approval("tx-1", "m2").unwrap().is_none());
        assert!(read.approval("tx-10", "m1").unwrap().is_none());

        // same lookup inside a write transaction
        let in_write = store
            .write(|w| w.approval("tx-1", "m1"))
            .unwrap()
            .unwrap();
        assert_eq!(in_write.member_key, "key-a");
    }

    #[test]
    fn settings_changes_are_scoped_and_ordered() {
        let (store, _dir) = temp_store();
        let now = Utc::now();
        let change = |id: &str, account: &str, minutes: i64| SettingsChange {
            change_id: id.to_string(),
            account_id: account.to_string(),
            proposer_key: "key-a".to_string(),
            threshold: Some(2),
            time_lock_secs: None,
            status: ProposalStatus::Pending,
            votes: Vec::new(),
            approve_count: 0,
            reject_count: 0,
            created_at: now - Duration::minutes(minutes),
            updated_at: now,
            applied_at: None,
        };
        store
            .write(|w| -> StoreResult<()> {
                w.put_settings_change(&change("c1", "acct-1", 5))?;
                w.put_settings_change(&change("c2", "acct-1", 10))?;
                w.put_settings_change(&change("c3", "acct-2", 1))?;
                Ok(())
            })
            .unwrap();

        let read = store.read().unwrap();
        let ids: Vec<String> = read
            .settings_changes("acct-1")
            .unwrap()
            .into_iter()
            .map(|c| c.change_id)
            .collect();
        assert_eq!(ids, vec!["c2", "c1"]);
        assert_eq!(read.settings_change("c3").unwrap().unwrap().account_id, "acct-2");
        assert!(read.settings_change("c9").unwrap().is_none());
    }

    #[test]
    fn failed_write_is_rolled_back() {
        let (store, _dir) = temp_store();
        let result: Result<(), StoreError> = store.write(|w| {
            w.put_transaction(&sample_tx("acct-1", "tx-1", 1))?;
            Err(StoreError::Io(std::io::Error::other("boom")))
        });
        assert!(result.is_err());

        let read = store.read().unwrap();
        assert!(read.transaction("tx-1").unwrap().is_none());
    }

    #[test]
    fn wallet_owner_is_case_insensitive() {
        let (store, _dir) = temp_store();
        store
            .write(|w| w.put_wallet_owner("WalletABC", "user-1"))
            .unwrap();
        let read = store.read().unwrap();
        assert_eq!(read.wallet_owner("walletabc").unwrap().as_deref(), Some("user-1"));
        assert!(read.wallet_owner("other").unwrap().is_none());
    }

    #[test]
    fn removals_scan_chronologically() {
        let (store, _dir) = temp_store();
        let now = Utc::now();
        for (i, offset) in [30i64, 10, 20].iter().enumerate() {
            let removal = SignerRemoval {
                removal_id: format!("r{i}"),
                account_id: "acct-1".to_string(),
                removed_member_id: format!("m{i}"),
                removed_member_key: format!("key-{i}"),
                removed_by: "admin".to_string(),
                reason: "inactive".to_string(),
                transaction_index: None,
                reopened_transactions: Vec::new(),
                removed_at: now - Duration::minutes(*offset),
            };
            store.write(|w| w.put_removal(&removal)).unwrap();
        }

        let read = store.read().unwrap();
        let ids: Vec<String> = read
            .removals("acct-1")
            .unwrap()
            .into_iter()
            .map(|r| r.removal_id)
            .collect();
        assert_eq!(ids, vec!["r0", "r2", "r1"]);
    }

    #[test]
    fn transactions_with_status_filters() {
        let (store, _dir) = temp_store();
        let mut approved = sample_tx("acct-1", "tx-1", 1);
        approved.status = TxStatus::Approved;
        store
            .write(|w| -> StoreResult<()> {
                w.put_transaction(&approved)?;
                w.put_transaction(&sample_tx("acct-1", "tx-2", 2))?;
                w.put_proposal(&Proposal {
                    proposal_id: "p1".to_string(),
                    transaction_id: "tx-1".to_string(),
                    account_id: "acct-1".to_string(),
                    transaction_index: 1,
                    proposer_key: "key-a".to_string(),
                    status: ProposalStatus::Approved,
                    approve_count: 2,
                    reject_count: 0,
                    approved_at: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })?;
                Ok(())
            })
            .unwrap();

        let found = store.transactions_with_status(TxStatus::Approved).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].transaction_id, "tx-1");
        assert!(store.read().unwrap().proposal("tx-1").unwrap().is_some());
    }

    #[test]
    fn health_check_passes_on_fresh_database() {
        let (store, _dir) = temp_store();
        store.health_check().unwrap();
    }
}
