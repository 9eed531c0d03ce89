use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fin_schemas::{EntityKind, Money, Payload, Record, Transaction, Transfer};
use fin_store::{with_retry, LocalStore, RetryPolicy, StoreError};

use crate::{LedgerError, UndoEntry, UndoStack};

/// Signed balance effect of a transaction on its wallet.
fn effect(tx: &Transaction) -> Money {
    if tx.is_income {
        tx.amount
    } else {
        -tx.amount
    }
}

fn wallet_balance(record: &Record) -> Money {
    record.as_wallet().map(|w| w.balance).unwrap_or(Money::ZERO)
}

/// Executes compound financial mutations against the local replica.
///
/// One instance per account. `guard` is the store-wide mutex shared with the
/// sync engine: every operation holds it for its full duration, so ledger
/// writes and sync cycles never interleave.
pub struct LedgerService {
    local: Arc<dyn LocalStore>,
    account_id: String,
    guard: Arc<Mutex<()>>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl LedgerService {
    pub fn new(
        local: Arc<dyn LocalStore>,
        account_id: impl Into<String>,
        guard: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            local,
            account_id: account_id.into(),
            guard,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Token that aborts in-flight retry backoffs on shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Record an income or expense and adjust the wallet balance.
    ///
    /// Expenses require sufficient balance unless the transaction carries
    /// `overdraft_override`, which is honored but logged.
    pub async fn record_transaction(&self, tx: Transaction) -> Result<Record, LedgerError> {
        let _guard = self.guard.lock().await;
        let now = Utc::now();

        if !tx.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount { amount: tx.amount });
        }
        let wallet = self.active_wallet(&tx.wallet_id).await?;
        let balance = wallet_balance(&wallet);
        if !tx.is_income && balance < tx.amount {
            if tx.overdraft_override {
                warn!(
                    wallet = %tx.wallet_id,
                    balance = %balance,
                    amount = %tx.amount,
                    "overdraft override: recording expense past the balance check"
                );
            } else {
                return Err(LedgerError::InsufficientBalance {
                    wallet_id: tx.wallet_id.clone(),
                    balance,
                    requested: tx.amount,
                });
            }
        }
        let new_balance = balance + effect(&tx);
        let record = Record::new(Payload::Transaction(tx), now);

        let mut undo = UndoStack::new();
        let result = async {
            self.set_balance(&wallet, new_balance, now, &mut undo).await?;
            self.insert_record(record, &mut undo).await
        }
        .await;
        match result {
            Ok(rec) => {
                info!(id = %rec.id, "transaction recorded");
                Ok(rec)
            }
            Err(cause) => Err(self.rollback(undo, "record_transaction", cause).await),
        }
    }

    /// Replace a transaction's payload, adjusting balances by the net of
    /// reversing the old version and applying the new one.
    pub async fn update_transaction(
        &self,
        old_id: &str,
        new: Transaction,
    ) -> Result<Record, LedgerError> {
        let _guard = self.guard.lock().await;
        let now = Utc::now();

        if !new.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount { amount: new.amount });
        }
        let prior_rec = self
            .fetch_active(EntityKind::Transaction, old_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound { id: old_id.to_string() })?;
        let old_tx = prior_rec
            .as_transaction()
            .cloned()
            .ok_or_else(|| LedgerError::TransactionNotFound { id: old_id.to_string() })?;

        let mut plan: Vec<(Record, Money)> = Vec::new();
        if old_tx.wallet_id == new.wallet_id {
            let wallet = self.active_wallet(&new.wallet_id).await?;
            let balance = wallet_balance(&wallet);
            let net = effect(&new) - effect(&old_tx);
            let resulting = balance + net;
            if resulting.is_negative() && !new.overdraft_override {
                return Err(LedgerError::InsufficientBalance {
                    wallet_id: new.wallet_id.clone(),
                    balance,
                    requested: net.abs(),
                });
            }
            if net != Money::ZERO {
                plan.push((wallet, resulting));
            }
        } else {
            let new_wallet = self.active_wallet(&new.wallet_id).await?;
            let new_wallet_balance = wallet_balance(&new_wallet);
            let resulting = new_wallet_balance + effect(&new);
            if resulting.is_negative() && !new.overdraft_override {
                return Err(LedgerError::InsufficientBalance {
                    wallet_id: new.wallet_id.clone(),
                    balance: new_wallet_balance,
                    requested: new.amount,
                });
            }
            // Reversal of the old wallet is best-effort: it may have been
            // deleted since the transaction was recorded.
            match self
                .fetch_active(EntityKind::Wallet, &old_tx.wallet_id)
                .await?
            {
                Some(old_wallet) => {
                    let restored = wallet_balance(&old_wallet) - effect(&old_tx);
                    plan.push((old_wallet, restored));
                }
                None => warn!(
                    wallet = %old_tx.wallet_id,
                    transaction = old_id,
                    "old wallet is gone, skipping its reversal"
                ),
            }
            plan.push((new_wallet, resulting));
        }

        let mut updated = prior_rec.clone();
        updated.payload = Payload::Transaction(new);
        updated.touch(now);

        let mut undo = UndoStack::new();
        let result = async {
            for (wallet, balance) in &plan {
                self.set_balance(wallet, *balance, now, &mut undo).await?;
            }
            self.overwrite_record(&prior_rec, updated, &mut undo).await
        }
        .await;
        match result {
            Ok(rec) => Ok(rec),
            Err(cause) => Err(self.rollback(undo, "update_transaction", cause).await),
        }
    }

    /// Reverse a transaction's balance effect, then tombstone it.
    pub async fn delete_transaction(&self, id: &str) -> Result<Record, LedgerError> {
        let _guard = self.guard.lock().await;
        let now = Utc::now();

        let prior_rec = self
            .fetch_active(EntityKind::Transaction, id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound { id: id.to_string() })?;
        let tx = prior_rec
            .as_transaction()
            .cloned()
            .ok_or_else(|| LedgerError::TransactionNotFound { id: id.to_string() })?;

        let mut plan: Vec<(Record, Money)> = Vec::new();
        match self.fetch_active(EntityKind::Wallet, &tx.wallet_id).await? {
            Some(wallet) => {
                let restored = wallet_balance(&wallet) - effect(&tx);
                plan.push((wallet, restored));
            }
            None => warn!(
                wallet = %tx.wallet_id,
                transaction = id,
                "wallet is gone, tombstoning transaction without reversal"
            ),
        }

        let mut tombstoned = prior_rec.clone();
        tombstoned.tombstone(now);

        let mut undo = UndoStack::new();
        let result = async {
            for (wallet, balance) in &plan {
                self.set_balance(wallet, *balance, now, &mut undo).await?;
            }
            self.overwrite_record(&prior_rec, tombstoned, &mut undo).await
        }
        .await;
        match result {
            Ok(rec) => Ok(rec),
            Err(cause) => Err(self.rollback(undo, "delete_transaction", cause).await),
        }
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Move value between two wallets and record the transfer.
    pub async fn execute_transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount: Money,
    ) -> Result<Record, LedgerError> {
        let _guard = self.guard.lock().await;
        let now = Utc::now();

        if from_id == to_id {
            return Err(LedgerError::SameWallet {
                wallet_id: from_id.to_string(),
            });
        }
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount { amount });
        }
        let from = self.active_wallet(from_id).await?;
        let to = self.active_wallet(to_id).await?;
        let from_balance = wallet_balance(&from);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                wallet_id: from_id.to_string(),
                balance: from_balance,
                requested: amount,
            });
        }

        let record = Record::new(
            Payload::Transfer(Transfer {
                from_wallet_id: from_id.to_string(),
                to_wallet_id: to_id.to_string(),
                amount,
                date: now,
                notes: String::new(),
                photo: None,
            }),
            now,
        );

        let mut undo = UndoStack::new();
        let result = async {
            self.set_balance(&from, from_balance - amount, now, &mut undo)
                .await?;
            self.set_balance(&to, wallet_balance(&to) + amount, now, &mut undo)
                .await?;
            self.insert_record(record, &mut undo).await
        }
        .await;
        match result {
            Ok(rec) => {
                info!(id = %rec.id, from = from_id, to = to_id, amount = %amount, "transfer executed");
                Ok(rec)
            }
            Err(cause) => Err(self.rollback(undo, "execute_transfer", cause).await),
        }
    }

    /// Replace a transfer's payload, reversing the old movement and applying
    /// the new one. Balance validation applies to the new source wallet only.
    pub async fn update_transfer(&self, old_id: &str, new: Transfer) -> Result<Record, LedgerError> {
        let _guard = self.guard.lock().await;
        let now = Utc::now();

        if !new.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount { amount: new.amount });
        }
        if new.from_wallet_id == new.to_wallet_id {
            return Err(LedgerError::SameWallet {
                wallet_id: new.from_wallet_id.clone(),
            });
        }
        let prior_rec = self
            .fetch_active(EntityKind::Transfer, old_id)
            .await?
            .ok_or_else(|| LedgerError::TransferNotFound { id: old_id.to_string() })?;
        let old = prior_rec
            .as_transfer()
            .cloned()
            .ok_or_else(|| LedgerError::TransferNotFound { id: old_id.to_string() })?;

        let mut deltas: BTreeMap<String, Money> = BTreeMap::new();
        *deltas.entry(old.from_wallet_id.clone()).or_insert(Money::ZERO) += old.amount;
        *deltas.entry(old.to_wallet_id.clone()).or_insert(Money::ZERO) -= old.amount;
        *deltas.entry(new.from_wallet_id.clone()).or_insert(Money::ZERO) -= new.amount;
        *deltas.entry(new.to_wallet_id.clone()).or_insert(Money::ZERO) += new.amount;

        // The wallets of the new version must exist; the old version's may
        // have been deleted since, in which case their reversal is skipped.
        let mut wallets: BTreeMap<String, Record> = BTreeMap::new();
        let new_from = self.active_wallet(&new.from_wallet_id).await?;
        let new_to = self.active_wallet(&new.to_wallet_id).await?;
        wallets.insert(new_from.id.clone(), new_from);
        wallets.insert(new_to.id.clone(), new_to);
        for id in [&old.from_wallet_id, &old.to_wallet_id] {
            if !wallets.contains_key(id.as_str()) {
                match self.fetch_active(EntityKind::Wallet, id).await? {
                    Some(w) => {
                        wallets.insert(id.clone(), w);
                    }
                    None => warn!(
                        wallet = %id,
                        transfer = old_id,
                        "old wallet is gone, skipping its reversal"
                    ),
                }
            }
        }

        let mut plan: Vec<(Record, Money)> = Vec::new();
        for (id, delta) in &deltas {
            if *delta == Money::ZERO {
                continue;
            }
            if let Some(wallet) = wallets.get(id) {
                plan.push((wallet.clone(), wallet_balance(wallet) + *delta));
            }
        }
        if let Some((wallet, resulting)) = plan
            .iter()
            .find(|(w, _)| w.id == new.from_wallet_id)
        {
            if resulting.is_negative() {
                return Err(LedgerError::InsufficientBalance {
                    wallet_id: new.from_wallet_id.clone(),
                    balance: wallet_balance(wallet),
                    requested: new.amount,
                });
            }
        }

        let mut updated = prior_rec.clone();
        updated.payload = Payload::Transfer(new);
        updated.touch(now);

        let mut undo = UndoStack::new();
        let result = async {
            for (wallet, balance) in &plan {
                self.set_balance(wallet, *balance, now, &mut undo).await?;
            }
            self.overwrite_record(&prior_rec, updated, &mut undo).await
        }
        .await;
        match result {
            Ok(rec) => Ok(rec),
            Err(cause) => Err(self.rollback(undo, "update_transfer", cause).await),
        }
    }

    /// Reverse a transfer's movement on both wallets, then tombstone it.
    pub async fn delete_transfer(&self, id: &str) -> Result<Record, LedgerError> {
        let _guard = self.guard.lock().await;
        let now = Utc::now();

        let prior_rec = self
            .fetch_active(EntityKind::Transfer, id)
            .await?
            .ok_or_else(|| LedgerError::TransferNotFound { id: id.to_string() })?;
        let old = prior_rec
            .as_transfer()
            .cloned()
            .ok_or_else(|| LedgerError::TransferNotFound { id: id.to_string() })?;

        let mut plan: Vec<(Record, Money)> = Vec::new();
        for (wallet_id, delta) in [
            (&old.from_wallet_id, old.amount),
            (&old.to_wallet_id, -old.amount),
        ] {
            match self.fetch_active(EntityKind::Wallet, wallet_id).await? {
                Some(wallet) => {
                    let restored = wallet_balance(&wallet) + delta;
                    plan.push((wallet, restored));
                }
                None => warn!(
                    wallet = %wallet_id,
                    transfer = id,
                    "wallet is gone, skipping its reversal"
                ),
            }
        }

        let mut tombstoned = prior_rec.clone();
        tombstoned.tombstone(now);

        let mut undo = UndoStack::new();
        let result = async {
            for (wallet, balance) in &plan {
                self.set_balance(wallet, *balance, now, &mut undo).await?;
            }
            self.overwrite_record(&prior_rec, tombstoned, &mut undo).await
        }
        .await;
        match result {
            Ok(rec) => Ok(rec),
            Err(cause) => Err(self.rollback(undo, "delete_transfer", cause).await),
        }
    }

    // -----------------------------------------------------------------------
    // Recalculation
    // -----------------------------------------------------------------------

    /// Recompute a wallet's balance from scratch by folding every active
    /// transaction and transfer that references it, and overwrite the stored
    /// balance if it drifted. Idempotent; this is the ground truth used to
    /// heal drift after a rollback failure.
    pub async fn recalculate_wallet_balance(&self, wallet_id: &str) -> Result<Money, LedgerError> {
        let _guard = self.guard.lock().await;
        let now = Utc::now();

        let wallet = self.active_wallet(wallet_id).await?;
        let mut total = Money::ZERO;

        for rec in self
            .local
            .get_all(EntityKind::Transaction, &self.account_id)
            .await?
        {
            if rec.is_tombstoned() {
                continue;
            }
            if let Payload::Transaction(tx) = &rec.payload {
                if tx.wallet_id == wallet_id {
                    total += effect(tx);
                }
            }
        }
        for rec in self
            .local
            .get_all(EntityKind::Transfer, &self.account_id)
            .await?
        {
            if rec.is_tombstoned() {
                continue;
            }
            if let Payload::Transfer(tr) = &rec.payload {
                if tr.from_wallet_id == wallet_id {
                    total -= tr.amount;
                }
                if tr.to_wallet_id == wallet_id {
                    total += tr.amount;
                }
            }
        }

        let stored = wallet_balance(&wallet);
        if stored != total {
            info!(
                wallet = wallet_id,
                stored = %stored,
                recomputed = %total,
                "healing wallet balance drift"
            );
            let mut updated = wallet.clone();
            if let Some(w) = updated.as_wallet_mut() {
                w.balance = total;
            }
            updated.touch(now);
            self.retry_update(updated).await?;
        }
        Ok(total)
    }

    // -----------------------------------------------------------------------
    // Step primitives
    // -----------------------------------------------------------------------

    async fn set_balance(
        &self,
        wallet: &Record,
        new_balance: Money,
        now: DateTime<Utc>,
        undo: &mut UndoStack,
    ) -> Result<(), LedgerError> {
        undo.push(UndoEntry::RestoreRecord {
            prior: wallet.clone(),
        });
        let mut updated = wallet.clone();
        if let Some(w) = updated.as_wallet_mut() {
            w.balance = new_balance;
        }
        updated.touch(now);
        self.retry_update(updated).await?;
        Ok(())
    }

    async fn insert_record(
        &self,
        record: Record,
        undo: &mut UndoStack,
    ) -> Result<Record, LedgerError> {
        undo.push(UndoEntry::RemoveInserted {
            kind: record.kind(),
            id: record.id.clone(),
        });
        Ok(self.retry_add(record).await?)
    }

    async fn overwrite_record(
        &self,
        prior: &Record,
        updated: Record,
        undo: &mut UndoStack,
    ) -> Result<Record, LedgerError> {
        undo.push(UndoEntry::RestoreRecord {
            prior: prior.clone(),
        });
        Ok(self.retry_update(updated).await?)
    }

    async fn rollback(
        &self,
        undo: UndoStack,
        operation: &'static str,
        cause: LedgerError,
    ) -> LedgerError {
        warn!(operation, error = %cause, steps = undo.len(), "operation failed, rolling back");
        match undo
            .unwind(
                self.local.as_ref(),
                &self.account_id,
                self.retry,
                &self.cancel,
            )
            .await
        {
            Ok(()) => cause,
            Err(rollback_err) => {
                error!(operation, error = %rollback_err, "rollback failed, data may be inconsistent");
                LedgerError::RollbackFailure {
                    operation,
                    cause: cause.to_string(),
                    rollback_cause: rollback_err.to_string(),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Store access
    // -----------------------------------------------------------------------

    async fn fetch_active(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<Record>, LedgerError> {
        let record = self.local.get_by_id(kind, id, &self.account_id).await?;
        Ok(record.filter(|r| !r.is_tombstoned()))
    }

    async fn active_wallet(&self, wallet_id: &str) -> Result<Record, LedgerError> {
        self.fetch_active(EntityKind::Wallet, wallet_id)
            .await?
            .filter(|r| r.as_wallet().is_some())
            .ok_or_else(|| LedgerError::WalletNotFound {
                wallet_id: wallet_id.to_string(),
            })
    }

    async fn retry_update(&self, record: Record) -> Result<Record, StoreError> {
        let local = Arc::clone(&self.local);
        let account = self.account_id.clone();
        with_retry(self.retry, &self.cancel, "local update", move || {
            let local = Arc::clone(&local);
            let record = record.clone();
            let account = account.clone();
            async move { local.update(record, &account).await }
        })
        .await
    }

    async fn retry_add(&self, record: Record) -> Result<Record, StoreError> {
        let local = Arc::clone(&self.local);
        let account = self.account_id.clone();
        with_retry(self.retry, &self.cancel, "local add", move || {
            let local = Arc::clone(&local);
            let record = record.clone();
            let account = account.clone();
            async move { local.add(record, &account).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fin_testkit::{
        category_record, expense_record, income_record, transfer_record, ts, wallet_record,
        MemoryLocalStore,
    };

    const ACCT: &str = "acct-1";

    fn service(local: Arc<MemoryLocalStore>) -> LedgerService {
        LedgerService::new(local, ACCT, Arc::new(Mutex::new(())))
            .with_retry_policy(RetryPolicy::immediate(3))
    }

    fn expense(wallet_id: &str, amount: i64) -> Transaction {
        Transaction {
            amount: Money::from_major(amount),
            category_id: "cat-1".to_string(),
            wallet_id: wallet_id.to_string(),
            is_income: false,
            tags: Default::default(),
            date: ts(100),
            notes: String::new(),
            photo: None,
            overdraft_override: false,
        }
    }

    fn income(wallet_id: &str, amount: i64) -> Transaction {
        Transaction {
            is_income: true,
            ..expense(wallet_id, amount)
        }
    }

    async fn balance(local: &MemoryLocalStore, wallet_id: &str) -> Money {
        local
            .get_by_id(EntityKind::Wallet, wallet_id, ACCT)
            .await
            .unwrap()
            .unwrap()
            .as_wallet()
            .unwrap()
            .balance
    }

    async fn seeded(wallets: Vec<(&str, i64)>) -> Arc<MemoryLocalStore> {
        let local = Arc::new(MemoryLocalStore::new());
        let mut records = vec![category_record("cat-1", "Food", ts(1))];
        for (id, bal) in wallets {
            records.push(wallet_record(id, id, bal, ts(1)));
        }
        local.seed(records, ACCT).await;
        local
    }

    #[tokio::test]
    async fn expense_deducts_balance_and_inserts_record() {
        let local = seeded(vec![("w-1", 100)]).await;
        let svc = service(Arc::clone(&local));
        let rec = svc.record_transaction(expense("w-1", 30)).await.unwrap();

        assert_eq!(balance(&local, "w-1").await, Money::from_major(70));
        let stored = local
            .get_by_id(EntityKind::Transaction, &rec.id, ACCT)
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn income_credits_balance() {
        let local = seeded(vec![("w-1", 10)]).await;
        let svc = service(Arc::clone(&local));
        svc.record_transaction(income("w-1", 25)).await.unwrap();
        assert_eq!(balance(&local, "w-1").await, Money::from_major(35));
    }

    #[tokio::test]
    async fn insufficient_balance_aborts_before_any_write() {
        let local = seeded(vec![("w-1", 10)]).await;
        let writes_before = local.write_count();
        let svc = service(Arc::clone(&local));
        let err = svc.record_transaction(expense("w-1", 30)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(local.write_count(), writes_before);
        assert_eq!(balance(&local, "w-1").await, Money::from_major(10));
    }

    #[tokio::test]
    async fn overdraft_override_allows_negative_balance() {
        let local = seeded(vec![("w-1", 10)]).await;
        let svc = service(Arc::clone(&local));
        let mut tx = expense("w-1", 30);
        tx.overdraft_override = true;
        svc.record_transaction(tx).await.unwrap();
        assert_eq!(balance(&local, "w-1").await, Money::from_major(-20));
    }

    #[tokio::test]
    async fn missing_wallet_rejected() {
        let local = seeded(vec![]).await;
        let svc = service(Arc::clone(&local));
        let err = svc.record_transaction(expense("w-9", 5)).await.unwrap_err();
        assert!(matches!(err, LedgerError::WalletNotFound { .. }));
    }

    #[tokio::test]
    async fn tombstoned_wallet_counts_as_missing() {
        let local = Arc::new(MemoryLocalStore::new());
        let mut w = wallet_record("w-1", "Cash", 100, ts(1));
        w.tombstone(ts(2));
        local.seed(vec![w], ACCT).await;
        let svc = service(Arc::clone(&local));
        let err = svc.record_transaction(expense("w-1", 5)).await.unwrap_err();
        assert!(matches!(err, LedgerError::WalletNotFound { .. }));
    }

    #[tokio::test]
    async fn update_same_wallet_applies_net_once() {
        let local = seeded(vec![("w-1", 100)]).await;
        let svc = service(Arc::clone(&local));
        let rec = svc.record_transaction(expense("w-1", 30)).await.unwrap();
        assert_eq!(balance(&local, "w-1").await, Money::from_major(70));

        // 30 expense -> 20 expense: net +10.
        svc.update_transaction(&rec.id, expense("w-1", 20))
            .await
            .unwrap();
        assert_eq!(balance(&local, "w-1").await, Money::from_major(80));
    }

    #[tokio::test]
    async fn update_across_wallets_reverses_and_applies_independently() {
        let local = seeded(vec![("w-1", 100), ("w-2", 50)]).await;
        let svc = service(Arc::clone(&local));
        let rec = svc.record_transaction(expense("w-1", 30)).await.unwrap();

        svc.update_transaction(&rec.id, expense("w-2", 40))
            .await
            .unwrap();
        assert_eq!(balance(&local, "w-1").await, Money::from_major(100));
        assert_eq!(balance(&local, "w-2").await, Money::from_major(10));
    }

    #[tokio::test]
    async fn update_with_vanished_old_wallet_still_succeeds() {
        let local = seeded(vec![("w-1", 100), ("w-2", 50)]).await;
        let svc = service(Arc::clone(&local));
        let rec = svc.record_transaction(expense("w-1", 30)).await.unwrap();

        local
            .delete(EntityKind::Wallet, "w-1", ACCT)
            .await
            .unwrap();

        svc.update_transaction(&rec.id, expense("w-2", 10))
            .await
            .unwrap();
        assert_eq!(balance(&local, "w-2").await, Money::from_major(40));
    }

    #[tokio::test]
    async fn update_validates_new_wallet_balance_only() {
        let local = seeded(vec![("w-1", 100), ("w-2", 5)]).await;
        let svc = service(Arc::clone(&local));
        let rec = svc.record_transaction(expense("w-1", 30)).await.unwrap();

        let err = svc
            .update_transaction(&rec.id, expense("w-2", 40))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        // Nothing changed.
        assert_eq!(balance(&local, "w-1").await, Money::from_major(70));
        assert_eq!(balance(&local, "w-2").await, Money::from_major(5));
    }

    #[tokio::test]
    async fn delete_transaction_reverses_effect_and_tombstones() {
        let local = seeded(vec![("w-1", 100)]).await;
        let svc = service(Arc::clone(&local));
        let rec = svc.record_transaction(expense("w-1", 30)).await.unwrap();

        svc.delete_transaction(&rec.id).await.unwrap();
        assert_eq!(balance(&local, "w-1").await, Money::from_major(100));
        let stored = local
            .get_by_id(EntityKind::Transaction, &rec.id, ACCT)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_tombstoned());
    }

    #[tokio::test]
    async fn transfer_rejects_same_wallet() {
        let local = seeded(vec![("w-1", 100)]).await;
        let svc = service(Arc::clone(&local));
        let err = svc
            .execute_transfer("w-1", "w-1", Money::from_major(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SameWallet { .. }));
    }

    #[tokio::test]
    async fn transfer_rejects_non_positive_amount() {
        let local = seeded(vec![("w-1", 100), ("w-2", 0)]).await;
        let svc = service(Arc::clone(&local));
        let err = svc
            .execute_transfer("w-1", "w-2", Money::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount { .. }));
    }

    #[tokio::test]
    async fn transfer_rejects_insufficient_source() {
        let local = seeded(vec![("w-1", 5), ("w-2", 0)]).await;
        let svc = service(Arc::clone(&local));
        let err = svc
            .execute_transfer("w-1", "w-2", Money::from_major(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn transfer_moves_value_and_records() {
        let local = seeded(vec![("w-1", 70), ("w-2", 0)]).await;
        let svc = service(Arc::clone(&local));
        svc.execute_transfer("w-1", "w-2", Money::from_major(20))
            .await
            .unwrap();
        assert_eq!(balance(&local, "w-1").await, Money::from_major(50));
        assert_eq!(balance(&local, "w-2").await, Money::from_major(20));
        let transfers = local.get_all(EntityKind::Transfer, ACCT).await.unwrap();
        assert_eq!(transfers.len(), 1);
    }

    #[tokio::test]
    async fn update_transfer_moves_movement_to_new_wallets() {
        let local = seeded(vec![("w-1", 100), ("w-2", 0), ("w-3", 0)]).await;
        let svc = service(Arc::clone(&local));
        let rec = svc
            .execute_transfer("w-1", "w-2", Money::from_major(40))
            .await
            .unwrap();

        let new = Transfer {
            from_wallet_id: "w-1".to_string(),
            to_wallet_id: "w-3".to_string(),
            amount: Money::from_major(25),
            date: ts(200),
            notes: String::new(),
            photo: None,
        };
        svc.update_transfer(&rec.id, new).await.unwrap();

        assert_eq!(balance(&local, "w-1").await, Money::from_major(75));
        assert_eq!(balance(&local, "w-2").await, Money::ZERO);
        assert_eq!(balance(&local, "w-3").await, Money::from_major(25));
    }

    #[tokio::test]
    async fn recalculate_is_idempotent_and_matches_stored() {
        let local = seeded(vec![("w-1", 0)]).await;
        let svc = service(Arc::clone(&local));
        svc.record_transaction(income("w-1", 100)).await.unwrap();
        svc.record_transaction(expense("w-1", 30)).await.unwrap();

        let first = svc.recalculate_wallet_balance("w-1").await.unwrap();
        let second = svc.recalculate_wallet_balance("w-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Money::from_major(70));
        assert_eq!(balance(&local, "w-1").await, first);
    }

    #[tokio::test]
    async fn recalculate_heals_drift() {
        let local = Arc::new(MemoryLocalStore::new());
        local
            .seed(
                vec![
                    // Stored balance disagrees with the fold below.
                    wallet_record("w-1", "Cash", 999, ts(1)),
                    income_record("tx-1", "w-1", "cat-1", 100, ts(2)),
                    expense_record("tx-2", "w-1", "cat-1", 30, ts(3)),
                    transfer_record("tr-1", "w-1", "w-2", 20, ts(4)),
                ],
                ACCT,
            )
            .await;
        let svc = service(Arc::clone(&local));

        let healed = svc.recalculate_wallet_balance("w-1").await.unwrap();
        assert_eq!(healed, Money::from_major(50));
        assert_eq!(balance(&local, "w-1").await, Money::from_major(50));
    }

    #[tokio::test]
    async fn recalculate_ignores_tombstoned_entries() {
        let local = Arc::new(MemoryLocalStore::new());
        let mut dead = expense_record("tx-dead", "w-1", "cat-1", 500, ts(2));
        dead.tombstone(ts(3));
        local
            .seed(
                vec![
                    wallet_record("w-1", "Cash", 0, ts(1)),
                    income_record("tx-1", "w-1", "cat-1", 40, ts(2)),
                    dead,
                ],
                ACCT,
            )
            .await;
        let svc = service(Arc::clone(&local));
        assert_eq!(
            svc.recalculate_wallet_balance("w-1").await.unwrap(),
            Money::from_major(40)
        );
    }
}
