//! Budget-tracking core: local persistence, the in-memory budget book,
//! recompute passes over remote transaction data and the sync engine that
//! mirrors the remote account state.
//!
//! All budget mutation funnels through [`BudgetEngine`] methods taking
//! `&mut self`, so the store, the book and the derived spent amounts cannot
//! drift apart. Sync-side changes reach it as [`SyncSignal`] values over a
//! plain mpsc channel; the wiring between the two engines is explicit in the
//! caller, there is no global registry.

mod aggregation;
mod book;
mod budget;
mod categories;
mod cents;
mod error;
mod sample;
mod store;
mod sync;
mod tags;

pub use book::BudgetBook;
pub use budget::{Budget, BudgetDraft, BudgetPeriod};
pub use cents::Cents;
pub use error::EngineError;
pub use store::BudgetStore;
pub use sync::{SYNC_PAGE_SIZE, SyncEngine, SyncReport, SyncSignal};

use bank_api::BankService;
use uuid::Uuid;

/// Owner of all budget state: the persistent store, the in-memory book and
/// the remote client used by recompute passes.
pub struct BudgetEngine {
    pub(crate) store: BudgetStore,
    pub(crate) book: BudgetBook,
    pub(crate) api: BankService,
}

impl BudgetEngine {
    pub fn new(store: BudgetStore, api: BankService) -> Self {
        Self {
            store,
            book: BudgetBook::new(),
            api,
        }
    }

    /// Loads persisted budgets into the book. Spent amounts are the
    /// last-known persisted values until the next recompute.
    pub async fn load(&mut self) -> Result<(), EngineError> {
        let budgets = self.store.load_all().await?;
        self.book.replace_all(budgets);
        Ok(())
    }

    pub fn book(&self) -> &BudgetBook {
        &self.book
    }

    /// Validates and persists a new budget, then recomputes it. A failed
    /// recompute leaves the budget in place with `spent` at zero; the next
    /// trigger retries it.
    pub async fn create_budget(&mut self, draft: BudgetDraft) -> Result<Uuid, EngineError> {
        let budget = draft.validate()?;
        let id = budget.id;
        self.store.insert(&budget).await?;
        self.book.upsert(budget);
        if let Err(err) = self.refresh_budget(id).await {
            tracing::warn!(budget_id = %id, error = %err, "initial recompute failed");
        }
        Ok(id)
    }

    pub async fn update_budget(&mut self, id: Uuid, draft: BudgetDraft) -> Result<(), EngineError> {
        let existing = self
            .book
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))?;

        let mut budget = draft.validate()?;
        budget.id = id;
        budget.created_at = existing.created_at;
        budget.spent = existing.spent;

        self.store.update(&budget).await?;
        self.book.upsert(budget);
        if let Err(err) = self.refresh_budget(id).await {
            tracing::warn!(budget_id = %id, error = %err, "recompute after edit failed");
        }
        Ok(())
    }

    pub async fn delete_budget(&mut self, id: Uuid) -> Result<(), EngineError> {
        self.store.delete(id).await?;
        self.book.remove(id);
        Ok(())
    }
}
