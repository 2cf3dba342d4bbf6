use super::error::*;
use super::handler::{self, CookiePolicy, REFRESH_COOKIE};
use crate::application_port::AuthService;
use crate::domain_model::AccessIdentity;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    auth_service: Arc<dyn AuthService>,
    cookie: CookiePolicy,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let health = warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .map(|| "ok");

    let register = warp::post()
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(auth_service.clone()))
        .and_then(handler::register);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(auth_service.clone()))
        .and(with_cookie_policy(cookie.clone()))
        .and_then(handler::login);

    let token = warp::post()
        .and(warp::path("token"))
        .and(warp::path::end())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(auth_service.clone()))
        .and(with_cookie_policy(cookie.clone()))
        .and_then(handler::token);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(auth_service.clone()))
        .and(with_cookie_policy(cookie))
        .and_then(handler::logout);

    let my_profile = warp::get()
        .and(warp::path("profiles"))
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(auth_service))
        .and_then(handler::my_profile);

    health
        .or(register)
        .or(login)
        .or(token)
        .or(logout)
        .or(my_profile)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_cookie_policy(
    cookie: CookiePolicy,
) -> impl Filter<Extract = (CookiePolicy,), Error = Infallible> + Clone {
    warp::any().map(move || cookie.clone())
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (AccessIdentity,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        move |header: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let token = header
                    .as_deref()
                    .and_then(|h| h.strip_prefix("Bearer "))
                    .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken))?;
                let identity = auth_service
                    .verify_access_token(token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok::<_, warp::Rejection>(identity)
            }
        },
    )
}
