use std::sync::Arc;

use api_types::{
    account::AccountResource, category::CategoryResource, ping::PingResponse, tag::TagResource,
    transaction::TransactionResource, webhook::WebhookResource,
};
use chrono::{DateTime, FixedOffset};
use tokio::sync::Mutex;

use crate::{
    client::ApiClient,
    credentials::TokenStore,
    error::ApiError,
    filter::TransactionFilter,
    pagination::{Cursor, Page},
};

/// Composed service layer: [`ApiClient`] plus credential handling.
///
/// The bearer token is read from the store once and cached in memory. On a
/// 401 the cached value is invalidated and the store is re-read exactly once
/// before a single retry; there is no token-refresh protocol, so a second 401
/// surfaces [`ApiError::Unauthorized`] to the caller.
#[derive(Clone)]
pub struct BankService {
    client: ApiClient,
    tokens: Arc<dyn TokenStore>,
    cached: Arc<Mutex<Option<String>>>,
}

impl BankService {
    pub fn new(client: ApiClient, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            client,
            tokens,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a credential is available at all. Absence is a normal state
    /// that gates sync, not an error.
    pub fn has_credential(&self) -> bool {
        self.tokens.exists()
    }

    async fn token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.tokens.retrieve(false)?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn with_retry<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: AsyncFn(&ApiClient, &str) -> Result<T, ApiError>,
    {
        let token = self.token().await?;
        match op(&self.client, &token).await {
            Err(ApiError::Unauthorized) => {
                tracing::debug!("credential rejected, retrying once with stored value");
                self.invalidate().await;
                let token = self.token().await?;
                op(&self.client, &token).await
            }
            other => other,
        }
    }

    pub async fn ping(&self) -> Result<PingResponse, ApiError> {
        self.with_retry(async |client, token| client.ping(token).await)
            .await
    }

    pub async fn list_accounts(
        &self,
        cursor: Option<&Cursor>,
    ) -> Result<Page<AccountResource>, ApiError> {
        self.with_retry(async |client, token| client.list_accounts(token, cursor).await)
            .await
    }

    pub async fn get_account(&self, id: &str) -> Result<AccountResource, ApiError> {
        self.with_retry(async |client, token| client.get_account(token, id).await)
            .await
    }

    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Page<TransactionResource>, ApiError> {
        self.with_retry(async |client, token| client.list_transactions(token, filter).await)
            .await
    }

    pub async fn list_transactions_for_account(
        &self,
        account_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Page<TransactionResource>, ApiError> {
        self.with_retry(async |client, token| {
            client
                .list_transactions_for_account(token, account_id, filter)
                .await
        })
        .await
    }

    pub async fn get_transaction(&self, id: &str) -> Result<TransactionResource, ApiError> {
        self.with_retry(async |client, token| client.get_transaction(token, id).await)
            .await
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryResource>, ApiError> {
        self.with_retry(async |client, token| client.list_categories(token).await)
            .await
    }

    pub async fn get_category(&self, id: &str) -> Result<CategoryResource, ApiError> {
        self.with_retry(async |client, token| client.get_category(token, id).await)
            .await
    }

    pub async fn list_tags(&self, cursor: Option<&Cursor>) -> Result<Page<TagResource>, ApiError> {
        self.with_retry(async |client, token| client.list_tags(token, cursor).await)
            .await
    }

    pub async fn create_tag(&self, tag_id: &str) -> Result<(), ApiError> {
        self.with_retry(async |client, token| client.create_tag(token, tag_id).await)
            .await
    }

    pub async fn add_tag_to_transaction(
        &self,
        transaction_id: &str,
        tag_id: &str,
    ) -> Result<(), ApiError> {
        self.with_retry(async |client, token| {
            client
                .add_tag_to_transaction(token, transaction_id, tag_id)
                .await
        })
        .await
    }

    pub async fn remove_tag_from_transaction(
        &self,
        transaction_id: &str,
        tag_id: &str,
    ) -> Result<(), ApiError> {
        self.with_retry(async |client, token| {
            client
                .remove_tag_from_transaction(token, transaction_id, tag_id)
                .await
        })
        .await
    }

    pub async fn set_category_on_transaction(
        &self,
        transaction_id: &str,
        category_id: Option<&str>,
    ) -> Result<(), ApiError> {
        self.with_retry(async |client, token| {
            client
                .set_category_on_transaction(token, transaction_id, category_id)
                .await
        })
        .await
    }

    pub async fn create_webhook(
        &self,
        callback_url: &str,
        description: Option<&str>,
    ) -> Result<WebhookResource, ApiError> {
        self.with_retry(async |client, token| {
            client.create_webhook(token, callback_url, description).await
        })
        .await
    }

    pub async fn list_webhooks(
        &self,
        cursor: Option<&Cursor>,
    ) -> Result<Page<WebhookResource>, ApiError> {
        self.with_retry(async |client, token| client.list_webhooks(token, cursor).await)
            .await
    }

    pub async fn delete_webhook(&self, id: &str) -> Result<(), ApiError> {
        self.with_retry(async |client, token| client.delete_webhook(token, id).await)
            .await
    }

    pub async fn list_transactions_for_category_expanded(
        &self,
        category_id: &str,
        since: Option<DateTime<FixedOffset>>,
        page_size: u32,
    ) -> Result<Vec<TransactionResource>, ApiError> {
        self.with_retry(async |client, token| {
            client
                .list_transactions_for_category_expanded(token, category_id, since, page_size)
                .await
        })
        .await
    }

    pub async fn list_transactions_for_tag(
        &self,
        tag: &str,
        since: Option<DateTime<FixedOffset>>,
        page_size: u32,
    ) -> Result<Page<TransactionResource>, ApiError> {
        self.with_retry(async |client, token| {
            client
                .list_transactions_for_tag(token, tag, since, page_size)
                .await
        })
        .await
    }
}

impl std::fmt::Debug for BankService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankService").finish_non_exhaustive()
    }
}
