//! First-run sample budgets.

use crate::{BudgetDraft, BudgetEngine, BudgetPeriod, EngineError};

const SEEDED_FLAG: &str = "budgets.sample_seeded";

impl BudgetEngine {
    /// Seeds a few starter budgets the first time the app runs against a
    /// database. Seeding requires both an empty budget table and no prior
    /// seeding: user-created budgets suppress it entirely, and the persisted
    /// flag survives the user deleting every budget, so the samples never
    /// come back once dismissed.
    ///
    /// Returns whether anything was seeded.
    pub async fn seed_samples(&mut self) -> Result<bool, EngineError> {
        if self.store.flag(SEEDED_FLAG).await?.is_some() {
            return Ok(false);
        }
        if !self.store.load_all().await?.is_empty() {
            return Ok(false);
        }

        for draft in sample_drafts() {
            let budget = draft.validate()?;
            tracing::info!(name = %budget.name, "seeding sample budget");
            self.store.insert(&budget).await?;
            self.book.upsert(budget);
        }
        self.store.set_flag(SEEDED_FLAG, "true").await?;
        Ok(true)
    }
}

fn sample_drafts() -> Vec<BudgetDraft> {
    vec![
        BudgetDraft {
            name: "Groceries".to_string(),
            amount: "500".to_string(),
            category_id: Some("groceries".to_string()),
            category_name: Some("Groceries".to_string()),
            color: "green".to_string(),
            ..BudgetDraft::default()
        },
        BudgetDraft {
            name: "Eating out".to_string(),
            amount: "150".to_string(),
            category_id: Some("restaurants-and-cafes".to_string()),
            category_name: Some("Restaurants & Cafes".to_string()),
            color: "orange".to_string(),
            ..BudgetDraft::default()
        },
        BudgetDraft {
            name: "Coffee".to_string(),
            amount: "60".to_string(),
            tags: vec!["coffee".to_string()],
            period: BudgetPeriod::Weekly,
            color: "brown".to_string(),
            ..BudgetDraft::default()
        },
    ]
}
