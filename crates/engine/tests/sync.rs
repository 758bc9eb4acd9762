use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use bank_api::{ApiClient, BankService, MemoryTokenStore};
use engine::{BudgetDraft, BudgetEngine, BudgetStore, Cents, EngineError, SyncEngine, SyncSignal};

/// Chronological log of `path?query` for every request the mock saw.
#[derive(Clone, Default)]
struct MockState {
    log: Arc<Mutex<Vec<String>>>,
}

impl MockState {
    fn record(&self, path: &str, params: &HashMap<String, String>) {
        let mut entry = path.to_string();
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        for key in keys {
            entry.push_str(&format!(" {key}={}", params[key]));
        }
        self.log.lock().unwrap().push(entry);
    }

    fn count(&self, needle: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.contains(needle))
            .count()
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn service(base_url: &str) -> BankService {
    let client = ApiClient::new(base_url).unwrap();
    BankService::new(client, Arc::new(MemoryTokenStore::new(Some("token"))))
}

async fn budget_engine(base_url: &str) -> BudgetEngine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    BudgetEngine::new(BudgetStore::new(db), service(base_url))
}

fn tx_json(id: &str, cents: i64, category: Option<&str>, tags: &[&str]) -> Value {
    let tags: Vec<Value> = tags
        .iter()
        .map(|t| json!({ "type": "tags", "id": t }))
        .collect();
    json!({
        "type": "transactions",
        "id": id,
        "attributes": {
            "description": id,
            "message": null,
            "amount": {
                "currencyCode": "AUD",
                "value": format!("{:.2}", cents as f64 / 100.0),
                "valueInBaseUnits": cents
            },
            "status": "SETTLED",
            "rawText": null,
            "isCategorizable": true,
            "holdInfo": null,
            "roundUp": null,
            "cashback": null,
            "createdAt": "2024-01-02T09:30:00Z",
            "settledAt": null
        },
        "relationships": {
            "account": { "data": null },
            "transferAccount": { "data": null },
            "category": { "data": category.map(|c| json!({ "type": "categories", "id": c })) },
            "parentCategory": { "data": null },
            "tags": { "data": tags }
        }
    })
}

fn account_json(id: &str, balance_cents: i64) -> Value {
    json!({
        "type": "accounts",
        "id": id,
        "attributes": {
            "displayName": "Spending",
            "accountType": "TRANSACTIONAL",
            "ownershipType": "INDIVIDUAL",
            "balance": {
                "currencyCode": "AUD",
                "value": format!("{:.2}", balance_cents as f64 / 100.0),
                "valueInBaseUnits": balance_cents
            },
            "createdAt": "2023-06-01T00:00:00Z"
        }
    })
}

fn page(data: Vec<Value>) -> Json<Value> {
    Json(json!({ "data": data, "links": { "prev": null, "next": null } }))
}

fn ping_json() -> Json<Value> {
    Json(json!({ "meta": { "id": "ping-1", "statusEmoji": "⚡️" } }))
}

fn draft(name: &str, amount: &str) -> BudgetDraft {
    BudgetDraft {
        name: name.to_string(),
        amount: amount.to_string(),
        ..BudgetDraft::default()
    }
}

/// A $500 category budget with a single $320 expense.
#[tokio::test]
async fn category_budget_reflects_remote_spending() {
    async fn transactions(
        State(state): State<MockState>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        state.record("/transactions", &params);
        match params.get("filter[category]").map(String::as_str) {
            Some("groceries") => page(vec![tx_json("tx-1", -32_000, Some("groceries"), &[])]),
            _ => page(vec![]),
        }
    }

    let state = MockState::default();
    let app = Router::new()
        .route("/transactions", get(transactions))
        .with_state(state);
    let base = spawn(app).await;

    let mut engine = budget_engine(&base).await;
    let mut d = draft("Groceries", "500");
    d.category_id = Some("groceries".to_string());
    let id = engine.create_budget(d).await.unwrap();

    let budget = engine.book().get(id).unwrap();
    assert_eq!(budget.spent, Cents::new(32_000));
    assert_eq!(budget.remaining(), Cents::new(18_000));
    assert!((budget.progress() - 0.64).abs() < 1e-9);
    assert!(!budget.is_over_budget());
}

#[tokio::test]
async fn category_pass_runs_first_and_tag_matches_merge_without_double_counting() {
    async fn transactions(
        State(state): State<MockState>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        if params.contains_key("filter[category]") {
            state.record("category-pass", &HashMap::new());
            // B carries the tag too; it must only count once.
            page(vec![
                tx_json("a", -10_000, Some("groceries"), &[]),
                tx_json("b", -5_000, Some("groceries"), &["market"]),
            ])
        } else if params.contains_key("filter[tag]") {
            state.record("tag-pass", &HashMap::new());
            page(vec![
                tx_json("b", -5_000, Some("groceries"), &["market"]),
                tx_json("c", -2_500, None, &["market"]),
            ])
        } else {
            page(vec![])
        }
    }

    let state = MockState::default();
    let app = Router::new()
        .route("/transactions", get(transactions))
        .with_state(state.clone());
    let base = spawn(app).await;

    let mut engine = budget_engine(&base).await;
    let mut d = draft("Groceries", "500");
    d.category_id = Some("groceries".to_string());
    d.tags = vec!["market".to_string()];
    let id = engine.create_budget(d).await.unwrap();

    assert_eq!(state.entries(), vec!["category-pass", "tag-pass"]);
    assert_eq!(engine.book().get(id).unwrap().spent, Cents::new(17_500));
    assert_eq!(engine.book().transactions(id).len(), 3);
}

#[tokio::test]
async fn recompute_is_idempotent() {
    async fn transactions(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        if params.contains_key("filter[category]") {
            page(vec![tx_json("a", -10_000, Some("groceries"), &[])])
        } else {
            page(vec![tx_json("a", -10_000, Some("groceries"), &["market"])])
        }
    }

    let app = Router::new().route("/transactions", get(transactions));
    let base = spawn(app).await;

    let mut engine = budget_engine(&base).await;
    let mut d = draft("Groceries", "500");
    d.category_id = Some("groceries".to_string());
    d.tags = vec!["market".to_string()];
    let id = engine.create_budget(d).await.unwrap();
    assert_eq!(engine.book().get(id).unwrap().spent, Cents::new(10_000));

    engine.refresh_budget(id).await.unwrap();
    engine.refresh_budget(id).await.unwrap();
    assert_eq!(engine.book().get(id).unwrap().spent, Cents::new(10_000));
    assert_eq!(engine.book().transactions(id).len(), 1);
}

#[tokio::test]
async fn one_failing_budget_does_not_starve_the_rest() {
    async fn transactions(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        if params.get("filter[category]").map(String::as_str) == Some("broken") {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response()
        } else {
            page(vec![tx_json("a", -1_000, Some("groceries"), &[])]).into_response()
        }
    }

    let app = Router::new().route("/transactions", get(transactions));
    let base = spawn(app).await;

    let mut engine = budget_engine(&base).await;
    let mut bad = draft("Broken", "100");
    bad.category_id = Some("broken".to_string());
    let bad_id = engine.create_budget(bad).await.unwrap();
    let mut good = draft("Groceries", "100");
    good.category_id = Some("groceries".to_string());
    let good_id = engine.create_budget(good).await.unwrap();

    engine.refresh_all().await;
    assert_eq!(engine.book().get(good_id).unwrap().spent, Cents::new(1_000));
    assert_eq!(engine.book().get(bad_id).unwrap().spent, Cents::ZERO);
}

fn mirror_router(state: MockState) -> Router {
    async fn ping(State(state): State<MockState>) -> Json<Value> {
        state.record("/util/ping", &HashMap::new());
        ping_json()
    }
    async fn accounts(State(state): State<MockState>) -> Json<Value> {
        state.record("/accounts", &HashMap::new());
        page(vec![account_json("acc-1", 150_000)])
    }
    async fn categories(State(state): State<MockState>) -> Json<Value> {
        state.record("/categories", &HashMap::new());
        page(vec![json!({
            "type": "categories",
            "id": "groceries",
            "attributes": { "name": "Groceries" }
        })])
    }
    async fn tags(State(state): State<MockState>) -> Json<Value> {
        state.record("/tags", &HashMap::new());
        page(vec![json!({ "type": "tags", "id": "market" })])
    }
    async fn account_transactions(
        State(state): State<MockState>,
        Path(id): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        state.record(&format!("/accounts/{id}/transactions"), &params);
        if params.contains_key("filter[since]") {
            // Nothing new since the watermark.
            page(vec![])
        } else {
            page(vec![tx_json("tx-1", -4_500, Some("groceries"), &[])])
        }
    }

    Router::new()
        .route("/util/ping", get(ping))
        .route("/accounts", get(accounts))
        .route("/categories", get(categories))
        .route("/tags", get(tags))
        .route("/accounts/{id}/transactions", get(account_transactions))
        .with_state(state)
}

#[tokio::test]
async fn incremental_sync_without_a_watermark_takes_the_initial_path() {
    let state = MockState::default();
    let base = spawn(mirror_router(state.clone())).await;

    let (tx, mut rx) = mpsc::channel(8);
    let mut sync = SyncEngine::new(service(&base), tx);

    assert!(sync.last_sync_at().is_none());
    let report = sync.incremental_sync().await.unwrap();

    // The full path ran: credential check, categories and tags included.
    assert_eq!(state.count("/util/ping"), 1);
    assert_eq!(state.count("/categories"), 1);
    assert_eq!(state.count("/tags"), 1);
    assert_eq!(report.accounts, 1);
    assert_eq!(report.transactions, 1);
    assert!(sync.last_sync_at().is_some());
    assert_eq!(sync.accounts().len(), 1);
    assert_eq!(sync.transactions_for("acc-1").len(), 1);
    assert_eq!(rx.try_recv().unwrap(), SyncSignal::NewTransactions);
}

#[tokio::test]
async fn second_sync_is_a_delta_from_the_watermark() {
    let state = MockState::default();
    let base = spawn(mirror_router(state.clone())).await;

    let (tx, _rx) = mpsc::channel(8);
    let mut sync = SyncEngine::new(service(&base), tx);

    sync.incremental_sync().await.unwrap();
    let first_watermark = sync.last_sync_at().unwrap();
    sync.incremental_sync().await.unwrap();

    let since_requests: Vec<String> = state
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("/accounts/acc-1/transactions") && e.contains("filter[since]"))
        .collect();
    assert_eq!(since_requests.len(), 1);
    // The delta does not refetch the category tree or the credential check.
    assert_eq!(state.count("/util/ping"), 1);
    assert_eq!(state.count("/categories"), 1);
    assert!(sync.last_sync_at().unwrap() >= first_watermark);
    // Nothing new, cache unchanged.
    assert_eq!(sync.transactions_for("acc-1").len(), 1);
}

#[tokio::test]
async fn failed_sync_leaves_no_watermark_and_records_the_error() {
    async fn ping() -> Json<Value> {
        ping_json()
    }
    async fn accounts() -> impl IntoResponse {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})))
    }

    let app = Router::new()
        .route("/util/ping", get(ping))
        .route("/accounts", get(accounts));
    let base = spawn(app).await;

    let (tx, _rx) = mpsc::channel(8);
    let mut sync = SyncEngine::new(service(&base), tx);

    let err = sync.initial_sync().await.unwrap_err();
    assert!(matches!(err, EngineError::Sync(_)));
    assert!(sync.last_sync_at().is_none());
    assert!(sync.last_error().is_some());
    assert!(!sync.is_syncing());
}

#[tokio::test]
async fn recategorizing_emits_both_sides_of_the_move() {
    async fn set_category() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    let state = MockState::default();
    let app = mirror_router(state).route(
        "/transactions/{id}/relationships/category",
        patch(set_category),
    );
    let base = spawn(app).await;

    let (tx, mut rx) = mpsc::channel(8);
    let mut sync = SyncEngine::new(service(&base), tx);
    sync.initial_sync().await.unwrap();
    let _ = rx.try_recv(); // drop the NewTransactions from the sync

    sync.recategorize_transaction("tx-1", Some("restaurants"))
        .await
        .unwrap();

    assert_eq!(
        rx.try_recv().unwrap(),
        SyncSignal::CategoryChanged {
            old: Some("groceries".to_string()),
            new: Some("restaurants".to_string()),
        }
    );
    // The cached copy reflects the move without a refetch.
    assert_eq!(
        sync.transactions_for("acc-1")[0].category_id(),
        Some("restaurants")
    );
}

#[tokio::test]
async fn tag_changes_signal_the_affected_tag() {
    async fn tags_link() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    let state = MockState::default();
    let app = mirror_router(state).route(
        "/transactions/{id}/relationships/tags",
        post(tags_link).delete(tags_link),
    );
    let base = spawn(app).await;

    let (tx, mut rx) = mpsc::channel(8);
    let mut sync = SyncEngine::new(service(&base), tx);
    sync.initial_sync().await.unwrap();
    let _ = rx.try_recv();

    sync.add_tag("tx-1", "market").await.unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        SyncSignal::TagsChanged {
            tag: "market".to_string()
        }
    );
    assert!(sync.transactions_for("acc-1")[0]
        .tag_ids()
        .any(|t| t == "market"));

    sync.remove_tag("tx-1", "market").await.unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        SyncSignal::TagsChanged {
            tag: "market".to_string()
        }
    );
    assert!(!sync.transactions_for("acc-1")[0]
        .tag_ids()
        .any(|t| t == "market"));
}

#[tokio::test]
async fn webhook_lifecycle_round_trips() {
    async fn create_webhook(Json(body): Json<Value>) -> Json<Value> {
        Json(json!({
            "data": {
                "type": "webhooks",
                "id": "wh-1",
                "attributes": {
                    "url": body["data"]["attributes"]["url"],
                    "description": body["data"]["attributes"]["description"],
                    "createdAt": "2024-01-01T00:00:00Z"
                }
            }
        }))
    }
    async fn list_webhooks() -> Json<Value> {
        page(vec![json!({
            "type": "webhooks",
            "id": "wh-1",
            "attributes": { "url": "https://example.test/hook", "description": null, "createdAt": null }
        })])
    }
    async fn delete_webhook() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    let app = Router::new()
        .route("/webhooks", post(create_webhook).get(list_webhooks))
        .route("/webhooks/{id}", delete(delete_webhook));
    let base = spawn(app).await;

    let (tx, _rx) = mpsc::channel(8);
    let sync = SyncEngine::new(service(&base), tx);

    let webhook = sync
        .setup_webhook("https://example.test/hook", Some("pocketbook"))
        .await
        .unwrap();
    assert_eq!(webhook.id, "wh-1");
    assert_eq!(webhook.attributes.url, "https://example.test/hook");

    let listed = sync.list_webhooks().await.unwrap();
    assert_eq!(listed.len(), 1);

    sync.remove_webhook("wh-1").await.unwrap();
}

#[tokio::test]
async fn signals_drive_budget_recompute_end_to_end() {
    async fn transactions(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        if params.contains_key("filter[category]") {
            page(vec![tx_json("tx-1", -4_500, Some("groceries"), &[])])
        } else {
            page(vec![])
        }
    }

    let state = MockState::default();
    let app = mirror_router(state).route("/transactions", get(transactions));
    let base = spawn(app).await;

    let (tx, mut rx) = mpsc::channel(8);
    let mut sync = SyncEngine::new(service(&base), tx);
    let mut budgets = budget_engine(&base).await;

    let mut d = draft("Groceries", "500");
    d.category_id = Some("groceries".to_string());
    let id = budgets.create_budget(d).await.unwrap();

    sync.initial_sync().await.unwrap();
    while let Ok(signal) = rx.try_recv() {
        budgets.handle_signal(signal).await;
    }

    assert_eq!(budgets.book().get(id).unwrap().spent, Cents::new(4_500));
}
