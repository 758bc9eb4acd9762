//! Recompute passes: turning remote transaction data into spent amounts.
//!
//! Each budget is recomputed in two passes. The category pass fetches the
//! budget's category transactions (expanded pagination, capped) and replaces
//! the budget's cache with the result. The tag passes then fetch each tag's
//! transactions and merge them into the cache, deduplicated by transaction
//! id. Both passes overwrite `spent` with the sum over the cache, so the
//! final value reflects the merged set. The order is category first, then
//! tags, and is pinned by tests.

use chrono::{DateTime, FixedOffset, Local, Utc};
use uuid::Uuid;

use crate::{BudgetEngine, Cents, EngineError, SyncSignal};

/// Page size for recompute fetches.
const RECOMPUTE_PAGE_SIZE: u32 = 100;

/// The remote expects RFC 3339 filter values carrying the caller's local
/// offset, not a normalized UTC instant.
pub(crate) fn to_local_offset(when: DateTime<Utc>) -> DateTime<FixedOffset> {
    when.with_timezone(Local::now().offset())
}

impl BudgetEngine {
    /// Recomputes one budget's spent amount from the remote and persists it.
    pub async fn refresh_budget(&mut self, id: Uuid) -> Result<(), EngineError> {
        let Some(budget) = self.book.get(id).cloned() else {
            return Err(EngineError::KeyNotFound(id.to_string()));
        };
        // Bounded below by the budget window start; deliberately no upper
        // bound, late-settling transactions still count.
        let since = Some(to_local_offset(budget.start_date));

        if let Some(category_id) = budget.category_id.as_deref() {
            let transactions = self
                .api
                .list_transactions_for_category_expanded(category_id, since, RECOMPUTE_PAGE_SIZE)
                .await?;
            self.book.snapshot_transactions(id, transactions);
            let spent = self.book.spent_cents(id);
            self.apply_spent(id, spent).await?;
        }

        for tag in &budget.tags {
            let page = self
                .api
                .list_transactions_for_tag(tag, since, RECOMPUTE_PAGE_SIZE)
                .await?;
            self.book.merge_transactions(id, page.items);
            let spent = self.book.spent_cents(id);
            self.apply_spent(id, spent).await?;
        }

        Ok(())
    }

    /// Recomputes every budget. A failing budget is logged and skipped; one
    /// bad category filter must not starve the rest.
    pub async fn refresh_all(&mut self) {
        for id in self.book.ids() {
            if let Err(err) = self.refresh_budget(id).await {
                tracing::warn!(budget_id = %id, error = %err, "budget recompute failed, continuing");
            }
        }
    }

    /// Recomputes the budgets affected by a transaction moving from one
    /// category to another. `None` on either side means uncategorized.
    pub async fn on_category_changed(&mut self, old: Option<&str>, new: Option<&str>) {
        let affected: Vec<Uuid> = self
            .book
            .budgets()
            .iter()
            .filter(|b| {
                let cat = b.category_id.as_deref();
                (old.is_some() && cat == old) || (new.is_some() && cat == new)
            })
            .map(|b| b.id)
            .collect();
        for id in affected {
            if let Err(err) = self.refresh_budget(id).await {
                tracing::warn!(budget_id = %id, error = %err, "budget recompute failed, continuing");
            }
        }
    }

    /// Recomputes the budgets matching a tag whose links changed.
    pub async fn on_tag_changed(&mut self, tag: &str) {
        let affected: Vec<Uuid> = self.book.with_tag(tag).map(|b| b.id).collect();
        for id in affected {
            if let Err(err) = self.refresh_budget(id).await {
                tracing::warn!(budget_id = %id, error = %err, "budget recompute failed, continuing");
            }
        }
    }

    /// Applies one sync signal. Intended to be called from the loop that
    /// drains the channel handed to [`SyncEngine`](crate::SyncEngine).
    pub async fn handle_signal(&mut self, signal: SyncSignal) {
        match signal {
            SyncSignal::NewTransactions => self.refresh_all().await,
            SyncSignal::CategoryChanged { old, new } => {
                self.on_category_changed(old.as_deref(), new.as_deref()).await;
            }
            SyncSignal::TagsChanged { tag } => self.on_tag_changed(&tag).await,
        }
    }

    async fn apply_spent(&mut self, id: Uuid, spent: Cents) -> Result<(), EngineError> {
        self.book.set_spent(id, spent);
        self.store.update_spent(id, spent).await
    }
}
