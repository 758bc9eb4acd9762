//! Budget primitives.
//!
//! A `Budget` tracks spending against a target amount over a time window,
//! matching transactions by category and/or tags. `spent` is derived state:
//! the aggregation pass recomputes it from remote data and it is persisted
//! only so restarts can show the last known value.

use chrono::{DateTime, Duration, Months, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Cents, EngineError};

/// Budget window length, anchored at the start date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
    /// Arbitrary window of a positive number of days.
    Custom(u32),
}

impl Default for BudgetPeriod {
    fn default() -> Self {
        Self::Monthly
    }
}

impl BudgetPeriod {
    /// Canonical discriminant stored in the database.
    pub fn kind(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom(_) => "custom",
        }
    }

    pub fn days_param(self) -> Option<i32> {
        match self {
            Self::Custom(days) => Some(days as i32),
            _ => None,
        }
    }

    /// Rebuilds the period from its stored discriminant + parameter. The
    /// period is stored explicitly; no date-delta guessing on read.
    pub fn from_parts(kind: &str, days: Option<i32>) -> Result<Self, EngineError> {
        match (kind, days) {
            ("weekly", _) => Ok(Self::Weekly),
            ("monthly", _) => Ok(Self::Monthly),
            ("yearly", _) => Ok(Self::Yearly),
            ("custom", Some(days)) if days > 0 => Ok(Self::Custom(days as u32)),
            ("custom", _) => Err(EngineError::Validation(
                "custom period requires a positive day count".to_string(),
            )),
            (other, _) => Err(EngineError::Validation(format!(
                "unknown period kind: {other}"
            ))),
        }
    }

    pub fn end_date(self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Weekly => start + Duration::days(7),
            Self::Monthly => start + Months::new(1),
            Self::Yearly => start + Months::new(12),
            Self::Custom(days) => start + Duration::days(days as i64),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub name: String,
    /// Always positive, enforced at validation.
    pub target: Cents,
    /// Derived; overwritten by the aggregation pass.
    pub spent: Cents,
    /// Authoritative category filter when present.
    pub category_id: Option<String>,
    /// Display cache only; can desync if the category is renamed remotely.
    pub category_name: Option<String>,
    /// Tag filters; unioned with the category filter.
    pub tags: Vec<String>,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub color: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn end_date(&self) -> DateTime<Utc> {
        self.period.end_date(self.start_date)
    }

    pub fn remaining(&self) -> Cents {
        self.target - self.spent
    }

    /// Spent/target ratio clamped to `0.0..=1.0`; 0 when the target is 0.
    pub fn progress(&self) -> f64 {
        if self.target.is_positive() {
            (self.spent.cents() as f64 / self.target.cents() as f64).min(1.0)
        } else {
            0.0
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.spent > self.target
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Raw budget-form input. Validation is local and synchronous; it never
/// contacts the remote.
#[derive(Clone, Debug)]
pub struct BudgetDraft {
    pub name: String,
    /// Major-unit decimal string as typed; `.` or `,` decimal separator.
    pub amount: String,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub tags: Vec<String>,
    pub period: BudgetPeriod,
    /// `None` anchors the window at "now".
    pub start_date: Option<DateTime<Utc>>,
    pub color: String,
    pub active: bool,
}

impl Default for BudgetDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            amount: String::new(),
            category_id: None,
            category_name: None,
            tags: Vec::new(),
            period: BudgetPeriod::default(),
            start_date: None,
            color: "blue".to_string(),
            active: true,
        }
    }
}

impl BudgetDraft {
    pub fn validate(self) -> Result<Budget, EngineError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation(
                "name must not be empty".to_string(),
            ));
        }

        let target: Cents = self.amount.parse()?;
        if !target.is_positive() {
            return Err(EngineError::Validation(
                "amount must be a positive number".to_string(),
            ));
        }

        let mut tags: Vec<String> = Vec::new();
        for tag in self.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        let now = Utc::now();
        Ok(Budget {
            id: Uuid::new_v4(),
            name: name.to_string(),
            target,
            spent: Cents::ZERO,
            category_id: self.category_id,
            category_name: self.category_name,
            tags,
            period: self.period,
            start_date: self.start_date.unwrap_or(now),
            color: self.color,
            active: self.active,
            created_at: now,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub target_cents: i64,
    pub spent_cents: i64,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub period_kind: String,
    pub period_days: Option<i32>,
    pub start_date: DateTimeUtc,
    pub color: String,
    pub active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(budget: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(budget.id.to_string()),
            name: ActiveValue::Set(budget.name.clone()),
            target_cents: ActiveValue::Set(budget.target.cents()),
            spent_cents: ActiveValue::Set(budget.spent.cents()),
            category_id: ActiveValue::Set(budget.category_id.clone()),
            category_name: ActiveValue::Set(budget.category_name.clone()),
            period_kind: ActiveValue::Set(budget.period.kind().to_string()),
            period_days: ActiveValue::Set(budget.period.days_param()),
            start_date: ActiveValue::Set(budget.start_date),
            color: ActiveValue::Set(budget.color.clone()),
            active: ActiveValue::Set(budget.active),
            created_at: ActiveValue::Set(budget.created_at),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    /// Tags are attached by the store from the join table.
    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("budget not exists".to_string()))?,
            name: model.name,
            target: Cents::new(model.target_cents),
            spent: Cents::new(model.spent_cents),
            category_id: model.category_id,
            category_name: model.category_name,
            period: BudgetPeriod::from_parts(&model.period_kind, model.period_days)?,
            start_date: model.start_date,
            color: model.color,
            active: model.active,
            tags: Vec::new(),
            created_at: model.created_at,
        })
    }
}
