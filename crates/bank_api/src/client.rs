use std::time::Duration;

use api_types::{
    Envelope,
    account::AccountResource,
    category::CategoryResource,
    ping::PingResponse,
    tag::{CreateTagRequest, SetCategoryRequest, TagLinkRequest, TagResource},
    transaction::TransactionResource,
    webhook::{CreateWebhookRequest, WebhookResource},
};
use chrono::{DateTime, FixedOffset};
use reqwest::{Response, Url};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{ApiError, classify_status},
    filter::TransactionFilter,
    pagination::{Cursor, Page},
};

/// Bounded request timeout; expiry surfaces as [`ApiError::Transport`].
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard cap on auto-followed pages beyond the first for the category
/// expansion helper. Bounds latency and cost, unlike the sync walk which is
/// exhaustive.
pub const EXPANSION_MAX_EXTRA_PAGES: usize = 3;

/// Raw typed HTTP client. Every operation takes an explicit bearer token;
/// credential caching and the retry-once policy live in
/// [`BankService`](crate::BankService).
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        // `Url::join` drops the last path segment unless the base ends in '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url =
            Url::parse(&normalized).map_err(|err| ApiError::InvalidUrl(err.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { base_url, http })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::InvalidUrl(err.to_string()))
    }

    async fn decode<T: DeserializeOwned>(path: &str, res: Response) -> Result<T, ApiError> {
        if let Some(err) = classify_status(res.status()) {
            return Err(err);
        }
        let bytes = res.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::decode(path, err))
    }

    async fn expect_no_content(res: Response) -> Result<(), ApiError> {
        match classify_status(res.status()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let mut req = self.http.get(self.endpoint(path)?).bearer_auth(token);
        if !query.is_empty() {
            req = req.query(query);
        }
        let res = req.send().await?;
        Self::decode(path, res).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let res = self
            .http
            .post(self.endpoint(path)?)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::decode(path, res).await
    }

    /// Liveness/credential validity check.
    pub async fn ping(&self, token: &str) -> Result<PingResponse, ApiError> {
        self.get_json(token, "util/ping", &[]).await
    }

    pub async fn list_accounts(
        &self,
        token: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page<AccountResource>, ApiError> {
        let query: Vec<(String, String)> = cursor.map(|c| c.query_pair()).into_iter().collect();
        let envelope: Envelope<Vec<AccountResource>> =
            self.get_json(token, "accounts", &query).await?;
        Ok(Page::from_envelope(envelope))
    }

    pub async fn get_account(&self, token: &str, id: &str) -> Result<AccountResource, ApiError> {
        let envelope: Envelope<AccountResource> =
            self.get_json(token, &format!("accounts/{id}"), &[]).await?;
        Ok(envelope.data)
    }

    pub async fn list_transactions(
        &self,
        token: &str,
        filter: &TransactionFilter,
    ) -> Result<Page<TransactionResource>, ApiError> {
        let envelope: Envelope<Vec<TransactionResource>> = self
            .get_json(token, "transactions", &filter.query_pairs())
            .await?;
        Ok(Page::from_envelope(envelope))
    }

    pub async fn list_transactions_for_account(
        &self,
        token: &str,
        account_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Page<TransactionResource>, ApiError> {
        let path = format!("accounts/{account_id}/transactions");
        let envelope: Envelope<Vec<TransactionResource>> =
            self.get_json(token, &path, &filter.query_pairs()).await?;
        Ok(Page::from_envelope(envelope))
    }

    pub async fn get_transaction(
        &self,
        token: &str,
        id: &str,
    ) -> Result<TransactionResource, ApiError> {
        let envelope: Envelope<TransactionResource> = self
            .get_json(token, &format!("transactions/{id}"), &[])
            .await?;
        Ok(envelope.data)
    }

    pub async fn list_categories(&self, token: &str) -> Result<Vec<CategoryResource>, ApiError> {
        let envelope: Envelope<Vec<CategoryResource>> =
            self.get_json(token, "categories", &[]).await?;
        Ok(envelope.data)
    }

    pub async fn get_category(&self, token: &str, id: &str) -> Result<CategoryResource, ApiError> {
        let envelope: Envelope<CategoryResource> = self
            .get_json(token, &format!("categories/{id}"), &[])
            .await?;
        Ok(envelope.data)
    }

    pub async fn list_tags(
        &self,
        token: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page<TagResource>, ApiError> {
        let query: Vec<(String, String)> = cursor.map(|c| c.query_pair()).into_iter().collect();
        let envelope: Envelope<Vec<TagResource>> = self.get_json(token, "tags", &query).await?;
        Ok(Page::from_envelope(envelope))
    }

    pub async fn create_tag(&self, token: &str, tag_id: &str) -> Result<(), ApiError> {
        let res = self
            .http
            .post(self.endpoint("tags")?)
            .bearer_auth(token)
            .json(&CreateTagRequest::new(tag_id))
            .send()
            .await?;
        Self::expect_no_content(res).await
    }

    pub async fn add_tag_to_transaction(
        &self,
        token: &str,
        transaction_id: &str,
        tag_id: &str,
    ) -> Result<(), ApiError> {
        let path = format!("transactions/{transaction_id}/relationships/tags");
        let res = self
            .http
            .post(self.endpoint(&path)?)
            .bearer_auth(token)
            .json(&TagLinkRequest::single(tag_id))
            .send()
            .await?;
        Self::expect_no_content(res).await
    }

    pub async fn remove_tag_from_transaction(
        &self,
        token: &str,
        transaction_id: &str,
        tag_id: &str,
    ) -> Result<(), ApiError> {
        let path = format!("transactions/{transaction_id}/relationships/tags");
        let res = self
            .http
            .delete(self.endpoint(&path)?)
            .bearer_auth(token)
            .json(&TagLinkRequest::single(tag_id))
            .send()
            .await?;
        Self::expect_no_content(res).await
    }

    /// Assigns (or clears, with `None`) a transaction's category.
    pub async fn set_category_on_transaction(
        &self,
        token: &str,
        transaction_id: &str,
        category_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let path = format!("transactions/{transaction_id}/relationships/category");
        let res = self
            .http
            .patch(self.endpoint(&path)?)
            .bearer_auth(token)
            .json(&SetCategoryRequest::category(category_id))
            .send()
            .await?;
        Self::expect_no_content(res).await
    }

    pub async fn create_webhook(
        &self,
        token: &str,
        callback_url: &str,
        description: Option<&str>,
    ) -> Result<WebhookResource, ApiError> {
        let envelope: Envelope<WebhookResource> = self
            .post_json(
                token,
                "webhooks",
                &CreateWebhookRequest::new(callback_url, description),
            )
            .await?;
        Ok(envelope.data)
    }

    pub async fn list_webhooks(
        &self,
        token: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page<WebhookResource>, ApiError> {
        let query: Vec<(String, String)> = cursor.map(|c| c.query_pair()).into_iter().collect();
        let envelope: Envelope<Vec<WebhookResource>> =
            self.get_json(token, "webhooks", &query).await?;
        Ok(Page::from_envelope(envelope))
    }

    pub async fn delete_webhook(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let res = self
            .http
            .delete(self.endpoint(&format!("webhooks/{id}"))?)
            .bearer_auth(token)
            .send()
            .await?;
        Self::expect_no_content(res).await
    }

    /// Category-filtered listing that auto-follows forward pagination, capped
    /// at [`EXPANSION_MAX_EXTRA_PAGES`] pages beyond the first.
    pub async fn list_transactions_for_category_expanded(
        &self,
        token: &str,
        category_id: &str,
        since: Option<DateTime<FixedOffset>>,
        page_size: u32,
    ) -> Result<Vec<TransactionResource>, ApiError> {
        let mut filter = TransactionFilter::new()
            .category(category_id)
            .page_size(page_size);
        if let Some(since) = since {
            filter = filter.since(since);
        }

        let mut page = self.list_transactions(token, &filter).await?;
        let mut items = std::mem::take(&mut page.items);
        let mut extra_pages = 0;
        while let Some(cursor) = page.next.take() {
            if extra_pages == EXPANSION_MAX_EXTRA_PAGES {
                tracing::debug!(
                    category_id,
                    fetched = items.len(),
                    "category expansion hit the page cap"
                );
                break;
            }
            let next_filter = filter.clone().cursor(cursor);
            page = self.list_transactions(token, &next_filter).await?;
            items.append(&mut page.items);
            extra_pages += 1;
        }
        Ok(items)
    }

    /// Thin filter-specialization of [`list_transactions`].
    ///
    /// [`list_transactions`]: Self::list_transactions
    pub async fn list_transactions_for_tag(
        &self,
        token: &str,
        tag: &str,
        since: Option<DateTime<FixedOffset>>,
        page_size: u32,
    ) -> Result<Page<TransactionResource>, ApiError> {
        let mut filter = TransactionFilter::new().tag(tag).page_size(page_size);
        if let Some(since) = since {
            filter = filter.since(since);
        }
        self.list_transactions(token, &filter).await
    }
}
