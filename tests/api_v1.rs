use serde_json::{Value, json};
use std::sync::Arc;
use turnstile::api::v1::{CookiePolicy, recover_error, routes};
use turnstile::application_port::AuthService;
use turnstile::server::Server;
use turnstile::settings::parse_settings_str;
use warp::Filter;
use warp::http::StatusCode;
use warp::http::header::SET_COOKIE;

const SETTINGS: &str = r#"
[auth]
issuer = "turnstile.test"
audience = "test-client"
access_secret = "api-access"
refresh_secret = "api-refresh"
access_ttl_secs = 900
refresh_ttl_secs = 3600
revoke_on_reuse = true

[store]
backend = "memory"

[http]
address = "127.0.0.1:0"
secure_cookie = true

[log]
filter = "info"
"#;

fn service() -> Arc<dyn AuthService> {
    let settings = parse_settings_str(SETTINGS).unwrap();
    Server::in_memory(&settings.auth).auth_service
}

fn api(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let cookie = CookiePolicy {
        secure: true,
        max_age_secs: 3600,
    };
    warp::path("api")
        .and(warp::path("v1"))
        .and(routes(auth_service, cookie))
        .recover(recover_error)
}

fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

fn refresh_cookie(set_cookie: &str) -> String {
    let pair = set_cookie.split(';').next().unwrap();
    pair.trim_start_matches("refreshToken=").to_string()
}

async fn register_and_login<F>(filter: &F) -> (String, String)
where
    F: Filter + 'static,
    F::Extract: warp::Reply + Send,
{
    let registered = warp::test::request()
        .method("POST")
        .path("/api/v1/register")
        .json(&json!({"email": "carol@example.com", "password": "s3cret"}))
        .reply(filter)
        .await;
    assert_eq!(registered.status(), StatusCode::CREATED);

    let logged_in = warp::test::request()
        .method("POST")
        .path("/api/v1/login")
        .json(&json!({"email": "carol@example.com", "password": "s3cret"}))
        .reply(filter)
        .await;
    assert_eq!(logged_in.status(), StatusCode::OK);

    let set_cookie = logged_in.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains("Max-Age=3600"));
    assert!(set_cookie.contains("Secure"));

    let body = body_json(logged_in.body());
    assert_eq!(body["success"], true);
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    (access, refresh_cookie(&set_cookie))
}

#[tokio::test]
async fn health_answers() {
    let filter = api(service());
    let res = warp::test::request()
        .path("/api/v1/health")
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_hides_password_hash_and_rejects_duplicates() {
    let filter = api(service());
    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/register")
        .json(&json!({"email": "dave@example.com", "password": "pw"}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = body_json(res.body());
    assert_eq!(body["data"]["email"], "dave@example.com");
    assert!(body["data"].get("password_hash").is_none());

    let dup = warp::test::request()
        .method("POST")
        .path("/api/v1/register")
        .json(&json!({"email": "dave@example.com", "password": "pw"}))
        .reply(&filter)
        .await;
    assert_eq!(dup.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(dup.body())["error"]["code"], "AccountExists");
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let filter = api(service());
    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/login")
        .json(&json!({"email": "dave@example.com"}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let filter = api(service());
    register_and_login(&filter).await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/login")
        .json(&json!({"email": "carol@example.com", "password": "wrong"}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(res.body())["error"]["code"],
        "InvalidCredentials"
    );
}

#[tokio::test]
async fn profile_requires_a_bearer_access_token() {
    let filter = api(service());
    let (access, refresh) = register_and_login(&filter).await;

    let anonymous = warp::test::request()
        .path("/api/v1/profiles/me")
        .reply(&filter)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let with_refresh = warp::test::request()
        .path("/api/v1/profiles/me")
        .header("authorization", format!("Bearer {}", refresh))
        .reply(&filter)
        .await;
    assert_eq!(with_refresh.status(), StatusCode::UNAUTHORIZED);

    let res = warp::test::request()
        .path("/api/v1/profiles/me")
        .header("authorization", format!("Bearer {}", access))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body())["data"]["user"]["role"], "user");
}

#[tokio::test]
async fn token_rotates_the_cookie_and_rejects_replay() {
    let filter = api(service());
    let (_, refresh) = register_and_login(&filter).await;

    let rotated = warp::test::request()
        .method("POST")
        .path("/api/v1/token")
        .header("cookie", format!("refreshToken={}", refresh))
        .reply(&filter)
        .await;
    assert_eq!(rotated.status(), StatusCode::OK);
    let next = refresh_cookie(rotated.headers()[SET_COOKIE].to_str().unwrap());
    assert_ne!(next, refresh);

    let replay = warp::test::request()
        .method("POST")
        .path("/api/v1/token")
        .header("cookie", format!("refreshToken={}", refresh))
        .reply(&filter)
        .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert!(
        replay.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );
    assert_eq!(
        body_json(replay.body())["error"]["code"],
        "InvalidRefreshToken"
    );
}

#[tokio::test]
async fn token_without_cookie_is_unauthorized() {
    let filter = api(service());
    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/token")
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(res.body())["error"]["code"],
        "MissingRefreshToken"
    );
}

#[tokio::test]
async fn logout_clears_the_cookie_and_ends_the_session() {
    let filter = api(service());
    let (_, refresh) = register_and_login(&filter).await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/logout")
        .header("cookie", format!("refreshToken={}", refresh))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(
        res.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );

    let again = warp::test::request()
        .method("POST")
        .path("/api/v1/logout")
        .reply(&filter)
        .await;
    assert_eq!(again.status(), StatusCode::NO_CONTENT);

    let rotate = warp::test::request()
        .method("POST")
        .path("/api/v1/token")
        .header("cookie", format!("refreshToken={}", refresh))
        .reply(&filter)
        .await;
    assert_eq!(rotate.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let filter = api(service());
    let res = warp::test::request()
        .path("/api/v1/nowhere")
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
