// tests/test_helpers.rs
#![allow(dead_code)]

use admin_tools::accounts::{NewUser, User};
use admin_tools::config::Config;
use admin_tools::db::Database;
use admin_tools::server::build_router;
use admin_tools::state::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "Tangerine-Orbit-42";

/// Router plus the state and database directory behind it.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    _temp: TempDir,
}

pub fn test_config() -> Config {
    Config {
        secret_key: "integration-test-secret".to_string(),
        allowed_hosts: vec!["*".to_string()],
        ..Config::default()
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_config()).await
}

pub async fn create_test_app_with(config: Config) -> TestApp {
    let temp = TempDir::new().unwrap();
    let db = Database::new(&config.database, temp.path()).await.unwrap();
    let state = AppState::new(config, db.pool()).unwrap();
    TestApp {
        router: build_router(state.clone()),
        state,
        _temp: temp,
    }
}

impl TestApp {
    /// Create an active user with the given flags.
    pub async fn user(&self, username: &str, must_change: bool, staff: bool, superuser: bool) -> User {
        let new_user = NewUser {
            is_staff: staff,
            is_superuser: superuser,
            must_change_password: must_change,
            ..NewUser::new(username, PASSWORD)
        };
        self.state.users.create_user(&new_user).await.unwrap()
    }

    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: None,
        }
    }
}

/// Minimal browser: remembers the session cookie between requests.
pub struct TestClient {
    router: Router,
    pub cookie: Option<String>,
}

impl TestClient {
    pub async fn send(&mut self, builder: axum::http::request::Builder, body: Body) -> Response {
        let mut builder = builder.header(header::HOST, "testserver");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, format!("sessionid={cookie}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            let Some(rest) = value.strip_prefix("sessionid=") else {
                continue;
            };
            let key = rest.split(';').next().unwrap_or_default();
            self.cookie = if key.is_empty() || value.contains("Max-Age=0") {
                None
            } else {
                Some(key.to_string())
            };
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::builder().method("GET").uri(uri), Body::empty())
            .await
    }

    pub async fn post_form(&mut self, uri: &str, form: &[(&str, &str)]) -> Response {
        let body = form
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(body),
        )
        .await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Response {
        self.post_form("/login/", &[("username", username), ("password", password)])
            .await
    }
}

pub fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
