//! Typed client for the banking API.
//!
//! [`ApiClient`] is the raw HTTP layer: it takes an explicit bearer token per
//! call, applies query filters and classifies failures. [`BankService`]
//! composes the client with a [`TokenStore`] and owns the retry-once policy
//! for expired credentials.

pub use client::{ApiClient, EXPANSION_MAX_EXTRA_PAGES};
pub use credentials::{CredentialError, FileTokenStore, MemoryTokenStore, TokenStore};
pub use error::ApiError;
pub use filter::TransactionFilter;
pub use pagination::{Cursor, Page};
pub use service::BankService;

mod client;
mod credentials;
mod error;
mod filter;
mod pagination;
mod service;

pub type Result<T> = std::result::Result<T, ApiError>;
