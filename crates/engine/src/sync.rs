//! Mirroring the remote: accounts, transactions, categories, tags.
//!
//! The sync engine owns the remote-shaped caches and the sync watermark.
//! It never touches budgets directly; anything the budget side should react
//! to goes out as a [`SyncSignal`] on the channel supplied at construction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use api_types::{
    ResourceIdentifier, account::AccountResource, category::CategoryResource, tag::TagResource,
    transaction::TransactionResource, webhook::WebhookResource,
};
use bank_api::{BankService, Cursor, TransactionFilter};
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::mpsc;

use crate::{EngineError, aggregation::to_local_offset};

/// Page size for sync walks. The walk itself is exhaustive; this only sets
/// the request granularity.
pub const SYNC_PAGE_SIZE: u32 = 100;

/// What the budget side needs to know about a sync-side change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncSignal {
    /// A sync run fetched at least one transaction.
    NewTransactions,
    /// A transaction moved between categories; `None` means uncategorized.
    CategoryChanged {
        old: Option<String>,
        new: Option<String>,
    },
    /// A tag was added to or removed from a transaction.
    TagsChanged { tag: String },
}

/// Summary of a completed sync run, for logging.
#[derive(Clone, Debug)]
pub struct SyncReport {
    pub accounts: usize,
    pub transactions: usize,
    pub duration: Duration,
}

pub struct SyncEngine {
    api: BankService,
    signals: mpsc::Sender<SyncSignal>,
    accounts: Vec<AccountResource>,
    transactions: HashMap<String, Vec<TransactionResource>>,
    categories: Vec<CategoryResource>,
    tags: Vec<TagResource>,
    last_sync_at: Option<DateTime<Utc>>,
    is_syncing: bool,
    last_error: Option<String>,
}

impl SyncEngine {
    pub fn new(api: BankService, signals: mpsc::Sender<SyncSignal>) -> Self {
        Self {
            api,
            signals,
            accounts: Vec::new(),
            transactions: HashMap::new(),
            categories: Vec::new(),
            tags: Vec::new(),
            last_sync_at: None,
            is_syncing: false,
            last_error: None,
        }
    }

    pub fn accounts(&self) -> &[AccountResource] {
        &self.accounts
    }

    pub fn transactions_for(&self, account_id: &str) -> &[TransactionResource] {
        self.transactions
            .get(account_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> &[CategoryResource] {
        &self.categories
    }

    pub fn tags(&self) -> &[TagResource] {
        &self.tags
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Full mirror of the remote: credential check, accounts, categories,
    /// tags, then an exhaustive transaction walk per account.
    pub async fn initial_sync(&mut self) -> Result<SyncReport, EngineError> {
        let started = self.begin()?;
        let result = self.run_initial().await;
        self.finish(started, &result);
        result
    }

    /// Delta sync from the watermark. With no watermark yet there is nothing
    /// to delta against, so the first run takes the full path.
    pub async fn incremental_sync(&mut self) -> Result<SyncReport, EngineError> {
        let Some(watermark) = self.last_sync_at else {
            return self.initial_sync().await;
        };
        let started = self.begin()?;
        let result = self.run_incremental(watermark).await;
        self.finish(started, &result);
        result
    }

    /// Fetches the category tree once per process; later calls are free
    /// unless the first fetch came back empty.
    pub async fn ensure_categories(&mut self) -> Result<(), EngineError> {
        if !self.categories.is_empty() {
            return Ok(());
        }
        self.categories = self.api.list_categories().await?;
        Ok(())
    }

    pub async fn setup_webhook(
        &self,
        callback_url: &str,
        description: Option<&str>,
    ) -> Result<WebhookResource, EngineError> {
        let webhook = self.api.create_webhook(callback_url, description).await?;
        tracing::info!(webhook_id = %webhook.id, url = callback_url, "webhook registered");
        Ok(webhook)
    }

    pub async fn list_webhooks(&self) -> Result<Vec<WebhookResource>, EngineError> {
        let mut out = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let mut page = self.api.list_webhooks(cursor.as_ref()).await?;
            out.append(&mut page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(out)
    }

    pub async fn remove_webhook(&self, id: &str) -> Result<(), EngineError> {
        self.api.delete_webhook(id).await?;
        Ok(())
    }

    /// Reacts to a webhook delivery. The payload is an opaque hint that
    /// something changed; the response is a normal delta sync, which also
    /// refreshes account balances. A delivery racing an in-flight sync is
    /// dropped, the running sync will pick the change up.
    pub async fn process_webhook_event(&mut self, _payload: &str) -> Result<(), EngineError> {
        match self.incremental_sync().await {
            Ok(_) | Err(EngineError::SyncInFlight) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Moves a transaction to another category (or clears it with `None`)
    /// and signals the budgets on both sides of the move.
    pub async fn recategorize_transaction(
        &mut self,
        transaction_id: &str,
        category_id: Option<&str>,
    ) -> Result<(), EngineError> {
        self.api
            .set_category_on_transaction(transaction_id, category_id)
            .await?;

        let mut old = None;
        if let Some(tx) = self.transaction_mut(transaction_id) {
            old = tx.category_id().map(str::to_string);
            tx.relationships.category.data = category_id.map(|id| ResourceIdentifier {
                kind: "categories".to_string(),
                id: id.to_string(),
            });
        }

        self.emit(SyncSignal::CategoryChanged {
            old,
            new: category_id.map(str::to_string),
        })
        .await;
        Ok(())
    }

    pub async fn add_tag(&mut self, transaction_id: &str, tag: &str) -> Result<(), EngineError> {
        self.api.add_tag_to_transaction(transaction_id, tag).await?;

        if let Some(tx) = self.transaction_mut(transaction_id) {
            let present = tx.tag_ids().any(|t| t == tag);
            if !present {
                tx.relationships.tags.data.push(ResourceIdentifier {
                    kind: "tags".to_string(),
                    id: tag.to_string(),
                });
            }
        }

        self.emit(SyncSignal::TagsChanged {
            tag: tag.to_string(),
        })
        .await;
        Ok(())
    }

    pub async fn remove_tag(&mut self, transaction_id: &str, tag: &str) -> Result<(), EngineError> {
        self.api
            .remove_tag_from_transaction(transaction_id, tag)
            .await?;

        if let Some(tx) = self.transaction_mut(transaction_id) {
            tx.relationships.tags.data.retain(|r| r.id != tag);
        }

        self.emit(SyncSignal::TagsChanged {
            tag: tag.to_string(),
        })
        .await;
        Ok(())
    }

    fn begin(&mut self) -> Result<DateTime<Utc>, EngineError> {
        if self.is_syncing {
            return Err(EngineError::SyncInFlight);
        }
        self.is_syncing = true;
        Ok(Utc::now())
    }

    /// The watermark is the run's start time, not its end: transactions
    /// created while the run was in flight get re-fetched next time instead
    /// of falling into the gap. Only a fully successful run advances it.
    fn finish<T>(&mut self, started: DateTime<Utc>, result: &Result<T, EngineError>) {
        self.is_syncing = false;
        match result {
            Ok(_) => {
                self.last_sync_at = Some(started);
                self.last_error = None;
            }
            Err(err) => self.last_error = Some(err.to_string()),
        }
    }

    async fn run_initial(&mut self) -> Result<SyncReport, EngineError> {
        let clock = Instant::now();

        // Credential check before any bulk work.
        self.api.ping().await?;

        self.accounts = self.fetch_all_accounts().await?;
        self.ensure_categories().await?;
        self.tags = self.fetch_all_tags().await?;

        let mut fetched = 0;
        let mut transactions = HashMap::new();
        for account in &self.accounts {
            let items = self.fetch_account_transactions(&account.id, None).await?;
            fetched += items.len();
            transactions.insert(account.id.clone(), items);
        }
        self.transactions = transactions;

        if fetched > 0 {
            self.emit(SyncSignal::NewTransactions).await;
        }

        let report = SyncReport {
            accounts: self.accounts.len(),
            transactions: fetched,
            duration: clock.elapsed(),
        };
        tracing::info!(
            accounts = report.accounts,
            transactions = report.transactions,
            elapsed_ms = report.duration.as_millis() as u64,
            "initial sync complete"
        );
        Ok(report)
    }

    async fn run_incremental(
        &mut self,
        watermark: DateTime<Utc>,
    ) -> Result<SyncReport, EngineError> {
        let clock = Instant::now();
        let since = to_local_offset(watermark);

        // Re-listing accounts refreshes balances wholesale.
        self.accounts = self.fetch_all_accounts().await?;

        let mut fetched = 0;
        let mut new_by_account = Vec::new();
        for account in &self.accounts {
            let items = self
                .fetch_account_transactions(&account.id, Some(since))
                .await?;
            fetched += items.len();
            new_by_account.push((account.id.clone(), items));
        }
        for (account_id, items) in new_by_account {
            let cache = self.transactions.entry(account_id).or_default();
            for item in items {
                if !cache.iter().any(|existing| existing.id == item.id) {
                    cache.push(item);
                }
            }
        }

        if fetched > 0 {
            self.emit(SyncSignal::NewTransactions).await;
        }

        let report = SyncReport {
            accounts: self.accounts.len(),
            transactions: fetched,
            duration: clock.elapsed(),
        };
        tracing::info!(
            accounts = report.accounts,
            transactions = report.transactions,
            elapsed_ms = report.duration.as_millis() as u64,
            "incremental sync complete"
        );
        Ok(report)
    }

    async fn fetch_all_accounts(&self) -> Result<Vec<AccountResource>, EngineError> {
        let mut out = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let mut page = self.api.list_accounts(cursor.as_ref()).await?;
            out.append(&mut page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(out)
    }

    async fn fetch_all_tags(&self) -> Result<Vec<TagResource>, EngineError> {
        let mut out = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let mut page = self.api.list_tags(cursor.as_ref()).await?;
            out.append(&mut page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(out)
    }

    /// Exhaustive forward walk of an account's transactions. Unlike the
    /// recompute helpers this follows pagination without a cap.
    async fn fetch_account_transactions(
        &self,
        account_id: &str,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<TransactionResource>, EngineError> {
        let mut base = TransactionFilter::new().page_size(SYNC_PAGE_SIZE);
        if let Some(since) = since {
            base = base.since(since);
        }

        let mut out = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let mut filter = base.clone();
            if let Some(c) = cursor.take() {
                filter = filter.cursor(c);
            }
            let mut page = self
                .api
                .list_transactions_for_account(account_id, &filter)
                .await?;
            out.append(&mut page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(out)
    }

    fn transaction_mut(&mut self, id: &str) -> Option<&mut TransactionResource> {
        self.transactions
            .values_mut()
            .flat_map(|txs| txs.iter_mut())
            .find(|tx| tx.id == id)
    }

    async fn emit(&self, signal: SyncSignal) {
        if self.signals.send(signal).await.is_err() {
            tracing::debug!("sync signal dropped, no consumer attached");
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("accounts", &self.accounts.len())
            .field("last_sync_at", &self.last_sync_at)
            .field("is_syncing", &self.is_syncing)
            .finish_non_exhaustive()
    }
}
