use api_types::transaction::TransactionStatus;
use chrono::{DateTime, FixedOffset};

use crate::pagination::Cursor;

/// Query filters for transaction listing.
///
/// Date bounds are serialized as RFC 3339 **with the caller's UTC offset**
/// (never bare `Z` unless the caller's zone is UTC): the remote filters on
/// local wall-clock semantics.
#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    pub since: Option<DateTime<FixedOffset>>,
    pub until: Option<DateTime<FixedOffset>>,
    pub category_id: Option<String>,
    pub tag: Option<String>,
    pub status: Option<TransactionStatus>,
    pub page_size: Option<u32>,
    pub cursor: Option<Cursor>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: DateTime<FixedOffset>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<FixedOffset>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn category(mut self, category_id: &str) -> Self {
        self.category_id = Some(category_id.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub(crate) fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(size) = self.page_size {
            pairs.push(("page[size]".to_string(), size.to_string()));
        }
        if let Some(cursor) = &self.cursor {
            pairs.push(cursor.query_pair());
        }
        if let Some(since) = &self.since {
            pairs.push(("filter[since]".to_string(), since.to_rfc3339()));
        }
        if let Some(until) = &self.until {
            pairs.push(("filter[until]".to_string(), until.to_rfc3339()));
        }
        if let Some(category_id) = &self.category_id {
            pairs.push(("filter[category]".to_string(), category_id.clone()));
        }
        if let Some(tag) = &self.tag {
            pairs.push(("filter[tag]".to_string(), tag.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("filter[status]".to_string(), status.as_str().to_string()));
        }
        pairs
    }
}
