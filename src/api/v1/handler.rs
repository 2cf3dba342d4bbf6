use super::error::*;
use crate::application_port::AuthService;
use crate::domain_model::{AccessIdentity, AccountView, TokenPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::http::header::SET_COOKIE;
use warp::reply::Response;
use warp::{Reply, reject};

pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// How the refresh token travels back to the browser.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age_secs: u64,
}

impl CookiePolicy {
    pub fn set(&self, refresh_token: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{}",
            REFRESH_COOKIE,
            refresh_token,
            self.max_age_secs,
            if self.secure { "; Secure" } else { "" }
        )
    }

    pub fn clear(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0{}",
            REFRESH_COOKIE,
            if self.secure { "; Secure" } else { "" }
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl CredentialsRequest {
    fn into_parts(self) -> Result<(String, String), ApiErrorCode> {
        match (self.email, self.password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Ok((email, password))
            }
            _ => Err(ApiErrorCode::InvalidInput),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

fn with_refresh_cookie(pair: TokenPair, cookie: &CookiePolicy) -> Response {
    let body = ApiResponse::ok(AccessTokenResponse {
        access_token: pair.access_token.0,
        access_token_expires_at: pair.access_token_expires_at,
    });
    warp::reply::with_header(
        warp::reply::json(&body),
        SET_COOKIE,
        cookie.set(&pair.refresh_token.0),
    )
    .into_response()
}

fn error_clearing_cookie(code: ApiErrorCode, cookie: &CookiePolicy) -> Response {
    let body = ApiResponse::<()>::err(code, code.to_string());
    warp::reply::with_header(
        warp::reply::with_status(warp::reply::json(&body), code.status()),
        SET_COOKIE,
        cookie.clear(),
    )
    .into_response()
}

pub async fn register(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, warp::Rejection> {
    let (email, password) = body.into_parts().map_err(reject::custom)?;

    let account = auth_service
        .register(&email, &password)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let api_response = ApiResponse::ok(AccountView::from(&account));
    Ok(warp::reply::with_status(warp::reply::json(&api_response), StatusCode::CREATED).into_response())
}

pub async fn login(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
    cookie: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let (email, password) = body.into_parts().map_err(reject::custom)?;

    let pair = auth_service
        .login(&email, &password)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(with_refresh_cookie(pair, &cookie))
}

/// Rotation. Any failure also clears the client's cookie so it stops
/// presenting a dead token.
pub async fn token(
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookie: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
        return Ok(error_clearing_cookie(ApiErrorCode::MissingRefreshToken, &cookie));
    };

    match auth_service.rotate(&refresh_token).await {
        Ok(pair) => Ok(with_refresh_cookie(pair, &cookie)),
        Err(e) => Ok(error_clearing_cookie(ApiErrorCode::from(e), &cookie)),
    }
}

pub async fn logout(
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookie: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    if let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) {
        auth_service
            .logout(&refresh_token)
            .await
            .map_err(ApiErrorCode::from)
            .map_err(reject::custom)?;
    }

    Ok(warp::reply::with_header(
        warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT),
        SET_COOKIE,
        cookie.clear(),
    )
    .into_response())
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: AccessIdentity,
}

pub async fn my_profile(identity: AccessIdentity) -> Result<Response, warp::Rejection> {
    let response = ProfileResponse {
        message: format!(
            "Welcome, user {}! This is your private profile.",
            identity.subject
        ),
        user: identity,
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)).into_response())
}
