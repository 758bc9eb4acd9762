//! Initial schema for the local store:
//!
//! - `budgets`: user-defined budgets with their derived spent amount
//! - `categories` / `tags`: remote-keyed lookup rows, upserted on first
//!   reference
//! - `budget_categories` / `budget_tags`: many-to-many links
//! - `app_state`: small key/value rows (one-shot flags)

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    Name,
    TargetCents,
    SpentCents,
    CategoryId,
    CategoryName,
    PeriodKind,
    PeriodDays,
    StartDate,
    Color,
    Active,
    CreatedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Tags {
    Table,
    Id,
}

#[derive(Iden)]
enum BudgetCategories {
    Table,
    BudgetId,
    CategoryId,
}

#[derive(Iden)]
enum BudgetTags {
    Table,
    BudgetId,
    TagId,
}

#[derive(Iden)]
enum AppState {
    Table,
    Key,
    Value,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Budgets::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(
                        ColumnDef::new(Budgets::TargetCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Budgets::SpentCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Budgets::CategoryId).string())
                    .col(ColumnDef::new(Budgets::CategoryName).string())
                    .col(ColumnDef::new(Budgets::PeriodKind).string().not_null())
                    .col(ColumnDef::new(Budgets::PeriodDays).integer())
                    .col(ColumnDef::new(Budgets::StartDate).timestamp().not_null())
                    .col(ColumnDef::new(Budgets::Color).string().not_null())
                    .col(
                        ColumnDef::new(Budgets::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Budgets::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tags::Id).string().not_null().primary_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BudgetCategories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BudgetCategories::BudgetId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BudgetCategories::CategoryId)
                            .string()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(BudgetCategories::BudgetId)
                            .col(BudgetCategories::CategoryId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(BudgetCategories::Table, BudgetCategories::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(BudgetCategories::Table, BudgetCategories::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BudgetTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BudgetTags::BudgetId).string().not_null())
                    .col(ColumnDef::new(BudgetTags::TagId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(BudgetTags::BudgetId)
                            .col(BudgetTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(BudgetTags::Table, BudgetTags::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(BudgetTags::Table, BudgetTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppState::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AppState::Value).string().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppState::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BudgetTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BudgetCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        Ok(())
    }
}
