//! Errors the engine can surface.
//!
//! Remote failures are wrapped as [`Sync`] but keep the original
//! [`ApiError`] classification intact: callers that need to distinguish an
//! expired credential (for the retry-once policy) can still match on
//! `EngineError::Sync(ApiError::Unauthorized)`.
//!
//! [`Sync`]: EngineError::Sync

use bank_api::ApiError;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("sync failed: {0}")]
    Sync(#[from] ApiError),
    #[error("a sync is already running")]
    SyncInFlight,
    #[error("invalid budget: {0}")]
    Validation(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}
