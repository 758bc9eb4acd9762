use std::sync::Arc;

use bank_api::{ApiClient, BankService, FileTokenStore};
use engine::{BudgetEngine, BudgetStore, SyncEngine};
use migration::{Migrator, MigratorTrait};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "pocketbook={level},bank_api={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database.path).await?;

    // Wiring is explicit: token store into the service, the service into
    // both engines, the signal channel between them.
    let tokens = Arc::new(FileTokenStore::new(&settings.api.token_file));
    let client = ApiClient::new(&settings.api.base_url)?;
    let service = BankService::new(client, tokens);

    let (signal_tx, mut signal_rx) = tokio::sync::mpsc::channel(32);
    let mut sync = SyncEngine::new(service.clone(), signal_tx);
    let mut budgets = BudgetEngine::new(BudgetStore::new(db), service.clone());

    budgets.load().await?;
    if budgets.seed_samples().await? {
        tracing::info!("seeded sample budgets");
    }

    if service.has_credential() {
        match sync.incremental_sync().await {
            Ok(report) => tracing::info!(
                accounts = report.accounts,
                transactions = report.transactions,
                "sync finished"
            ),
            Err(err) => tracing::error!("sync failed: {err}"),
        }
        while let Ok(signal) = signal_rx.try_recv() {
            budgets.handle_signal(signal).await;
        }

        if let Some(webhook) = &settings.webhook {
            if let Err(err) = ensure_webhook(&sync, webhook).await {
                tracing::error!("webhook registration failed: {err}");
            }
        }
    } else {
        tracing::warn!("no credential stored, skipping sync");
    }

    let book = budgets.book();
    tracing::info!(
        budgets = book.budgets().len(),
        spent = %book.total_spent(),
        target = %book.total_target(),
        remaining = %book.total_remaining(),
        "budget totals"
    );
    for budget in book.budgets() {
        tracing::info!(
            name = %budget.name,
            spent = %budget.spent,
            target = %budget.target,
            over = budget.is_over_budget(),
            "budget"
        );
    }

    Ok(())
}

async fn parse_database(
    path: &str,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let database = sea_orm::Database::connect(format!("sqlite:{path}?mode=rwc")).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

/// Registers the callback URL unless the remote already has it.
async fn ensure_webhook(
    sync: &SyncEngine,
    webhook: &settings::Webhook,
) -> Result<(), engine::EngineError> {
    let existing = sync.list_webhooks().await?;
    if existing
        .iter()
        .any(|w| w.attributes.url == webhook.callback_url)
    {
        tracing::debug!(url = %webhook.callback_url, "webhook already registered");
        return Ok(());
    }
    sync.setup_webhook(&webhook.callback_url, webhook.description.as_deref())
        .await?;
    Ok(())
}
