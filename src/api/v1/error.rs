use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        *code
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        ApiErrorCode::InvalidInput
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::NotFound
    } else {
        ApiErrorCode::internal(format!("unhandled rejection: {:?}", err))
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code, code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid request")]
    InvalidInput,
    #[error("Email or password incorrect")]
    InvalidCredentials,
    #[error("User already exists")]
    AccountExists,
    #[error("Refresh token not provided")]
    MissingRefreshToken,
    // Reuse and plain invalidity look the same to clients on purpose.
    #[error("Refresh token is not valid")]
    InvalidRefreshToken,
    #[error("Authentication failed")]
    InvalidToken,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::AccountExists => StatusCode::CONFLICT,
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::MissingRefreshToken
            | ApiErrorCode::InvalidRefreshToken
            | ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidInput(_) => ApiErrorCode::InvalidInput,
            AuthError::AccountExists => ApiErrorCode::AccountExists,
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::InvalidRefreshToken | AuthError::ReuseOrInvalid => {
                ApiErrorCode::InvalidRefreshToken
            }
            AuthError::Unauthenticated => ApiErrorCode::InvalidToken,
            e @ (AuthError::Conflict | AuthError::StoreUnavailable(_) | AuthError::Internal(_)) => {
                ApiErrorCode::internal(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_failures_are_indistinguishable() {
        let invalid = ApiErrorCode::from(AuthError::InvalidRefreshToken);
        let reused = ApiErrorCode::from(AuthError::ReuseOrInvalid);
        assert_eq!(invalid, reused);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn store_failures_are_server_errors() {
        let code = ApiErrorCode::from(AuthError::StoreUnavailable("down".to_string()));
        assert_eq!(code.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiErrorCode::from(AuthError::AccountExists).status(),
            StatusCode::CONFLICT
        );
    }
}
