//! In-memory projection of budgets plus their matched transactions.
//!
//! The book is the single read surface for UI-facing state: the budget list,
//! a per-budget transaction cache and the derived statistics. Recompute
//! passes write into it; everything it exposes is otherwise pure.

use std::collections::HashMap;

use api_types::transaction::TransactionResource;
use uuid::Uuid;

use crate::{Budget, Cents};

#[derive(Debug, Default)]
pub struct BudgetBook {
    budgets: Vec<Budget>,
    transactions: HashMap<Uuid, Vec<TransactionResource>>,
}

impl BudgetBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole budget list, dropping caches of budgets that no
    /// longer exist.
    pub fn replace_all(&mut self, budgets: Vec<Budget>) {
        self.transactions
            .retain(|id, _| budgets.iter().any(|b| b.id == *id));
        self.budgets = budgets;
    }

    pub fn upsert(&mut self, budget: Budget) {
        match self.budgets.iter_mut().find(|b| b.id == budget.id) {
            Some(slot) => *slot = budget,
            None => self.budgets.push(budget),
        }
    }

    pub fn remove(&mut self, id: Uuid) {
        self.budgets.retain(|b| b.id != id);
        self.transactions.remove(&id);
    }

    pub fn get(&self, id: Uuid) -> Option<&Budget> {
        self.budgets.iter().find(|b| b.id == id)
    }

    pub fn budgets(&self) -> &[Budget] {
        &self.budgets
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.budgets.iter().map(|b| b.id).collect()
    }

    pub fn active(&self) -> impl Iterator<Item = &Budget> {
        self.budgets.iter().filter(|b| b.active)
    }

    pub fn by_category_id<'a>(&'a self, category_id: &'a str) -> impl Iterator<Item = &'a Budget> {
        self.budgets
            .iter()
            .filter(move |b| b.category_id.as_deref() == Some(category_id))
    }

    /// Lookup by the cached display name; prefer [`by_category_id`] when the
    /// id is known, names can desync after a remote rename.
    ///
    /// [`by_category_id`]: Self::by_category_id
    pub fn by_category<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Budget> {
        self.budgets
            .iter()
            .filter(move |b| b.category_name.as_deref() == Some(name))
    }

    pub fn with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Budget> {
        self.budgets.iter().filter(move |b| b.has_tag(tag))
    }

    /// Replaces a budget's transaction cache with a fresh snapshot.
    pub fn snapshot_transactions(&mut self, id: Uuid, transactions: Vec<TransactionResource>) {
        self.transactions.insert(id, transactions);
    }

    /// Merges transactions into a budget's cache, skipping ids already
    /// present. A transaction matched by both the category and a tag is
    /// counted once.
    pub fn merge_transactions(&mut self, id: Uuid, transactions: Vec<TransactionResource>) {
        let cache = self.transactions.entry(id).or_default();
        for tx in transactions {
            if !cache.iter().any(|existing| existing.id == tx.id) {
                cache.push(tx);
            }
        }
    }

    pub fn transactions(&self, id: Uuid) -> &[TransactionResource] {
        self.transactions.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total spent for a budget: the sum of expense magnitudes in its cache.
    /// Credits (refunds, incoming transfers) do not reduce the total.
    pub fn spent_cents(&self, id: Uuid) -> Cents {
        self.transactions(id)
            .iter()
            .filter(|tx| tx.attributes.amount.is_expense())
            .fold(Cents::ZERO, |acc, tx| {
                acc + Cents::new(-tx.attributes.amount.value_in_base_units)
            })
    }

    pub fn set_spent(&mut self, id: Uuid, spent: Cents) {
        if let Some(budget) = self.budgets.iter_mut().find(|b| b.id == id) {
            budget.spent = spent;
        }
    }

    pub fn total_target(&self) -> Cents {
        self.active().fold(Cents::ZERO, |acc, b| acc + b.target)
    }

    pub fn total_spent(&self) -> Cents {
        self.active().fold(Cents::ZERO, |acc, b| acc + b.spent)
    }

    pub fn total_remaining(&self) -> Cents {
        self.total_target() - self.total_spent()
    }

    /// Aggregate spent/target ratio over active budgets, clamped to 1.
    pub fn overall_progress(&self) -> f64 {
        let target = self.total_target();
        if target.is_positive() {
            (self.total_spent().cents() as f64 / target.cents() as f64).min(1.0)
        } else {
            0.0
        }
    }

    pub fn over_budget(&self) -> impl Iterator<Item = &Budget> {
        self.active().filter(|b| b.is_over_budget())
    }
}

#[cfg(test)]
mod tests {
    use api_types::{
        money::Money,
        transaction::{TransactionAttributes, TransactionRelationships, TransactionStatus},
    };
    use chrono::Utc;

    use super::*;
    use crate::BudgetDraft;

    fn tx(id: &str, base_units: i64) -> TransactionResource {
        TransactionResource {
            id: id.to_string(),
            attributes: TransactionAttributes {
                description: format!("tx {id}"),
                message: None,
                amount: Money {
                    currency_code: "AUD".to_string(),
                    value: format!("{:.2}", base_units as f64 / 100.0),
                    value_in_base_units: base_units,
                },
                status: TransactionStatus::Settled,
                raw_text: None,
                is_categorizable: true,
                hold_info: None,
                round_up: None,
                cashback: None,
                created_at: Utc::now(),
                settled_at: Some(Utc::now()),
            },
            relationships: TransactionRelationships::default(),
        }
    }

    fn budget(name: &str, amount: &str) -> Budget {
        BudgetDraft {
            name: name.to_string(),
            amount: amount.to_string(),
            ..BudgetDraft::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn merge_skips_transactions_already_cached() {
        let mut book = BudgetBook::new();
        let b = budget("Groceries", "500");
        let id = b.id;
        book.upsert(b);

        book.snapshot_transactions(id, vec![tx("a", -1000), tx("b", -2000)]);
        book.merge_transactions(id, vec![tx("b", -2000), tx("c", -3000)]);

        let ids: Vec<&str> = book.transactions(id).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(book.spent_cents(id), Cents::new(6000));
    }

    #[test]
    fn spent_ignores_credits() {
        let mut book = BudgetBook::new();
        let b = budget("Groceries", "500");
        let id = b.id;
        book.upsert(b);

        book.snapshot_transactions(id, vec![tx("a", -32_000), tx("refund", 5_000)]);
        assert_eq!(book.spent_cents(id), Cents::new(32_000));
    }

    #[test]
    fn snapshot_replaces_the_cache() {
        let mut book = BudgetBook::new();
        let b = budget("Groceries", "500");
        let id = b.id;
        book.upsert(b);

        book.snapshot_transactions(id, vec![tx("a", -1000)]);
        book.snapshot_transactions(id, vec![tx("b", -2000)]);
        assert_eq!(book.transactions(id).len(), 1);
        assert_eq!(book.spent_cents(id), Cents::new(2000));
    }

    #[test]
    fn totals_cover_active_budgets_only() {
        let mut book = BudgetBook::new();
        let mut a = budget("Groceries", "500");
        a.spent = Cents::new(32_000);
        let mut b = budget("Fun", "100");
        b.spent = Cents::new(15_000);
        b.active = false;
        book.upsert(a);
        book.upsert(b);

        assert_eq!(book.total_target(), Cents::new(50_000));
        assert_eq!(book.total_spent(), Cents::new(32_000));
        assert_eq!(book.total_remaining(), Cents::new(18_000));
        assert_eq!(book.overall_progress(), 0.64);
        assert_eq!(book.over_budget().count(), 0);
    }

    #[test]
    fn category_lookups_work_by_id_and_by_name() {
        let mut book = BudgetBook::new();
        let mut a = budget("Groceries", "500");
        a.category_id = Some("groceries".to_string());
        a.category_name = Some("Groceries".to_string());
        let a_id = a.id;
        let mut b = budget("Fun", "100");
        b.tags = vec!["games".to_string()];
        book.upsert(a);
        book.upsert(b);

        let by_id: Vec<Uuid> = book.by_category_id("groceries").map(|x| x.id).collect();
        assert_eq!(by_id, vec![a_id]);

        let by_name: Vec<Uuid> = book.by_category("Groceries").map(|x| x.id).collect();
        assert_eq!(by_name, vec![a_id]);

        // An uncategorized budget never matches a name lookup.
        assert_eq!(book.by_category("Fun").count(), 0);
        assert_eq!(book.with_tag("games").count(), 1);
    }

    #[test]
    fn removing_a_budget_drops_its_cache() {
        let mut book = BudgetBook::new();
        let b = budget("Groceries", "500");
        let id = b.id;
        book.upsert(b);
        book.snapshot_transactions(id, vec![tx("a", -1000)]);

        book.remove(id);
        assert!(book.get(id).is_none());
        assert!(book.transactions(id).is_empty());
    }
}
