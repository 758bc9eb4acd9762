//! Persistence for budgets and their category/tag links.

use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    Budget, Cents, EngineError,
    budget,
    categories::{budget_category, category},
    tags::{budget_tag, tag},
};

mod app_state {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "app_state")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub key: String,
        pub value: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Budget CRUD over the local SQLite store.
///
/// Referenced category and tag rows are upserted on write so the join tables
/// never point at a missing parent; join rows are rebuilt wholesale on every
/// update rather than diffed.
#[derive(Clone, Debug)]
pub struct BudgetStore {
    db: DatabaseConnection,
}

impl BudgetStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn insert(&self, budget: &Budget) -> Result<(), EngineError> {
        budget::Entity::insert(budget::ActiveModel::from(budget))
            .exec_without_returning(&self.db)
            .await?;
        self.link_references(budget).await
    }

    pub async fn update(&self, budget: &Budget) -> Result<(), EngineError> {
        budget::Entity::update(budget::ActiveModel::from(budget))
            .exec(&self.db)
            .await?;
        self.unlink_references(budget.id).await?;
        self.link_references(budget).await
    }

    /// Targeted write of the derived spent amount; everything else untouched.
    pub async fn update_spent(&self, id: Uuid, spent: Cents) -> Result<(), EngineError> {
        let model = budget::ActiveModel {
            id: ActiveValue::Unchanged(id.to_string()),
            spent_cents: ActiveValue::Set(spent.cents()),
            ..Default::default()
        };
        budget::Entity::update(model).exec(&self.db).await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
        self.unlink_references(id).await?;
        budget::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Budget>, EngineError> {
        match budget::Entity::find_by_id(id.to_string()).one(&self.db).await? {
            None => Ok(None),
            Some(model) => {
                let mut budget = Budget::try_from(model)?;
                budget.tags = self.tags_for(id).await?;
                Ok(Some(budget))
            }
        }
    }

    pub async fn load_all(&self) -> Result<Vec<Budget>, EngineError> {
        let models = budget::Entity::find().all(&self.db).await?;
        let mut budgets = Vec::with_capacity(models.len());
        for model in models {
            let mut budget = Budget::try_from(model)?;
            budget.tags = self.tags_for(budget.id).await?;
            budgets.push(budget);
        }
        Ok(budgets)
    }

    pub async fn flag(&self, key: &str) -> Result<Option<String>, EngineError> {
        Ok(app_state::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?
            .map(|row| row.value))
    }

    pub async fn set_flag(&self, key: &str, value: &str) -> Result<(), EngineError> {
        app_state::Entity::insert(app_state::ActiveModel {
            key: ActiveValue::Set(key.to_string()),
            value: ActiveValue::Set(value.to_string()),
        })
        .on_conflict(
            OnConflict::column(app_state::Column::Key)
                .update_column(app_state::Column::Value)
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;
        Ok(())
    }

    async fn tags_for(&self, id: Uuid) -> Result<Vec<String>, EngineError> {
        Ok(budget_tag::Entity::find()
            .filter(budget_tag::Column::BudgetId.eq(id.to_string()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| row.tag_id)
            .collect())
    }

    async fn link_references(&self, budget: &Budget) -> Result<(), EngineError> {
        if let Some(category_id) = &budget.category_id {
            let name = budget
                .category_name
                .clone()
                .unwrap_or_else(|| category_id.clone());
            category::Entity::insert(category::ActiveModel {
                id: ActiveValue::Set(category_id.clone()),
                name: ActiveValue::Set(name),
            })
            .on_conflict(
                OnConflict::column(category::Column::Id)
                    .update_column(category::Column::Name)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

            budget_category::Entity::insert(budget_category::ActiveModel {
                budget_id: ActiveValue::Set(budget.id.to_string()),
                category_id: ActiveValue::Set(category_id.clone()),
            })
            .on_conflict(
                OnConflict::columns([
                    budget_category::Column::BudgetId,
                    budget_category::Column::CategoryId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        }

        for tag_id in &budget.tags {
            tag::Entity::insert(tag::ActiveModel {
                id: ActiveValue::Set(tag_id.clone()),
            })
            .on_conflict(OnConflict::column(tag::Column::Id).do_nothing().to_owned())
            .exec_without_returning(&self.db)
            .await?;

            budget_tag::Entity::insert(budget_tag::ActiveModel {
                budget_id: ActiveValue::Set(budget.id.to_string()),
                tag_id: ActiveValue::Set(tag_id.clone()),
            })
            .on_conflict(
                OnConflict::columns([budget_tag::Column::BudgetId, budget_tag::Column::TagId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        }

        Ok(())
    }

    async fn unlink_references(&self, id: Uuid) -> Result<(), EngineError> {
        budget_category::Entity::delete_many()
            .filter(budget_category::Column::BudgetId.eq(id.to_string()))
            .exec(&self.db)
            .await?;
        budget_tag::Entity::delete_many()
            .filter(budget_tag::Column::BudgetId.eq(id.to_string()))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
