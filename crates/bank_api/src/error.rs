use reqwest::StatusCode;
use thiserror::Error;

use crate::credentials::CredentialError;

/// Client-side error taxonomy.
///
/// HTTP statuses are classified per the table in the API contract; transport
/// failures (including the 30s request timeout) stay as [`Transport`].
///
/// [`Transport`]: ApiError::Transport
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("rate limited")]
    RateLimited,
    #[error("client error ({0})")]
    Client(u16),
    #[error("server error ({0})")]
    Server(u16),
    /// A status outside the 2xx/4xx/5xx classes, e.g. an unfollowed
    /// redirect.
    #[error("unexpected status ({0})")]
    Unexpected(u16),
    #[error("decode error at {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn decode(path: &str, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Maps a non-success status to its error class. Returns `None` for 2xx.
pub(crate) fn classify_status(status: StatusCode) -> Option<ApiError> {
    if status.is_success() {
        return None;
    }
    let err = match status.as_u16() {
        401 => ApiError::Unauthorized,
        403 => ApiError::Forbidden,
        429 => ApiError::RateLimited,
        code if status.is_client_error() => ApiError::Client(code),
        code if status.is_server_error() => ApiError::Server(code),
        code => ApiError::Unexpected(code),
    };
    Some(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_not_an_error() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(classify_status(StatusCode::NO_CONTENT).is_none());
    }

    #[test]
    fn auth_statuses_get_dedicated_variants() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED),
            Some(ApiError::Unauthorized)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            Some(ApiError::Forbidden)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(ApiError::RateLimited)
        ));
    }

    #[test]
    fn remaining_statuses_split_by_range() {
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY),
            Some(ApiError::Client(422))
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            Some(ApiError::Server(502))
        ));
    }

    #[test]
    fn out_of_class_statuses_are_not_mistaken_for_server_errors() {
        assert!(matches!(
            classify_status(StatusCode::SEE_OTHER),
            Some(ApiError::Unexpected(303))
        ));
        assert!(matches!(
            classify_status(StatusCode::PERMANENT_REDIRECT),
            Some(ApiError::Unexpected(308))
        ));
    }
}
