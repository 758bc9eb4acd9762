//! Wire model for the banking API.
//!
//! The remote speaks a JSON:API dialect: every payload is an [`Envelope`]
//! wrapping either a single resource or a list, with pagination URLs under
//! `links`. Resources carry their fields under `attributes` and references to
//! other resources under `relationships` as `{ id, type }` pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `{ data, links }` wrapper around every API payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<PageLinks>,
}

/// Pagination URLs. Cursors are embedded as `page[after]`/`page[before]`
/// query parameters of these URLs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// A typed `{ id, type }` reference to another resource.
///
/// Relationships are decoded directly into this pair; no URL path parsing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// A to-one relationship. `data: null` means "not linked".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Relationship {
    pub data: Option<ResourceIdentifier>,
}

impl Relationship {
    pub fn id(&self) -> Option<&str> {
        self.data.as_ref().map(|r| r.id.as_str())
    }
}

/// A to-many relationship.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RelationshipMany {
    #[serde(default)]
    pub data: Vec<ResourceIdentifier>,
}

pub mod money {
    use super::*;

    /// A monetary amount as the remote reports it.
    ///
    /// `value_in_base_units` (integer minor units, signed) is authoritative
    /// for arithmetic; `value` is a display string.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Money {
        /// ISO 4217 code.
        pub currency_code: String,
        /// Decimal string, display only.
        pub value: String,
        /// Signed integer minor units (negative = debit).
        pub value_in_base_units: i64,
    }

    impl Money {
        /// Major-unit value. Divides by 100: valid for AUD and other
        /// exponent-2 currencies only.
        pub fn major_value(&self) -> f64 {
            self.value_in_base_units as f64 / 100.0
        }

        pub fn is_expense(&self) -> bool {
            self.value_in_base_units < 0
        }
    }
}

pub mod account {
    use super::*;
    use crate::money::Money;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum AccountType {
        Transactional,
        Saver,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum OwnershipType {
        Individual,
        Joint,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AccountAttributes {
        pub display_name: String,
        pub account_type: AccountType,
        pub ownership_type: OwnershipType,
        /// Refreshed wholesale on each fetch.
        pub balance: Money,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AccountResource {
        pub id: String,
        pub attributes: AccountAttributes,
    }
}

pub mod transaction {
    use super::*;
    use crate::money::Money;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum TransactionStatus {
        Held,
        Settled,
    }

    impl TransactionStatus {
        /// Canonical string used in `filter[status]`.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Held => "HELD",
                Self::Settled => "SETTLED",
            }
        }
    }

    /// Authorization hold details present while a transaction is `HELD`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HoldInfo {
        pub amount: Money,
        pub foreign_amount: Option<Money>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RoundUp {
        pub amount: Money,
        pub boost_portion: Option<Money>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Cashback {
        pub description: String,
        pub amount: Money,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionAttributes {
        pub description: String,
        pub message: Option<String>,
        /// Signed; negative = debit/expense.
        pub amount: Money,
        pub status: TransactionStatus,
        pub raw_text: Option<String>,
        pub is_categorizable: bool,
        pub hold_info: Option<HoldInfo>,
        pub round_up: Option<RoundUp>,
        pub cashback: Option<Cashback>,
        pub created_at: DateTime<Utc>,
        pub settled_at: Option<DateTime<Utc>>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionRelationships {
        #[serde(default)]
        pub account: Relationship,
        #[serde(default)]
        pub transfer_account: Relationship,
        #[serde(default)]
        pub category: Relationship,
        #[serde(default)]
        pub parent_category: Relationship,
        #[serde(default)]
        pub tags: RelationshipMany,
    }

    /// An immutable snapshot of a remote transaction. Superseded by a
    /// re-fetch after any mutation (e.g. re-categorization).
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct TransactionResource {
        pub id: String,
        pub attributes: TransactionAttributes,
        #[serde(default)]
        pub relationships: TransactionRelationships,
    }

    impl TransactionResource {
        pub fn category_id(&self) -> Option<&str> {
            self.relationships.category.id()
        }

        pub fn tag_ids(&self) -> impl Iterator<Item = &str> {
            self.relationships.tags.data.iter().map(|r| r.id.as_str())
        }
    }
}

pub mod category {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CategoryAttributes {
        pub name: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CategoryResource {
        pub id: String,
        pub attributes: CategoryAttributes,
    }
}

pub mod tag {
    use super::*;

    /// Tags are user-defined; the id doubles as the display name.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TagResource {
        pub id: String,
    }

    /// Body for creating a tag by id.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CreateTagRequest {
        pub data: ResourceIdentifier,
    }

    impl CreateTagRequest {
        pub fn new(tag_id: &str) -> Self {
            Self {
                data: ResourceIdentifier {
                    kind: "tags".to_string(),
                    id: tag_id.to_string(),
                },
            }
        }
    }

    /// Body for linking/unlinking tags on a transaction.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct TagLinkRequest {
        pub data: Vec<ResourceIdentifier>,
    }

    impl TagLinkRequest {
        pub fn single(tag_id: &str) -> Self {
            Self {
                data: vec![ResourceIdentifier {
                    kind: "tags".to_string(),
                    id: tag_id.to_string(),
                }],
            }
        }
    }

    /// Body for setting (or clearing, with `data: null`) a transaction's
    /// category.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SetCategoryRequest {
        pub data: Option<ResourceIdentifier>,
    }

    impl SetCategoryRequest {
        pub fn category(category_id: Option<&str>) -> Self {
            Self {
                data: category_id.map(|id| ResourceIdentifier {
                    kind: "categories".to_string(),
                    id: id.to_string(),
                }),
            }
        }
    }
}

pub mod webhook {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WebhookAttributes {
        pub url: String,
        pub description: Option<String>,
        pub created_at: Option<DateTime<Utc>>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct WebhookResource {
        pub id: String,
        pub attributes: WebhookAttributes,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CreateWebhookBody {
        pub url: String,
        pub description: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CreateWebhookData {
        pub attributes: CreateWebhookBody,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CreateWebhookRequest {
        pub data: CreateWebhookData,
    }

    impl CreateWebhookRequest {
        pub fn new(url: &str, description: Option<&str>) -> Self {
            Self {
                data: CreateWebhookData {
                    attributes: CreateWebhookBody {
                        url: url.to_string(),
                        description: description.map(|s| s.to_string()),
                    },
                },
            }
        }
    }
}

pub mod ping {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PingMeta {
        pub id: String,
        pub status_emoji: String,
    }

    /// Response of the utility ping endpoint; decoding it proves the
    /// credential is valid.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PingResponse {
        pub meta: PingMeta,
    }
}
