#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shopkit::jobs::MemoryQueue;
use shopkit::mail::{Mailer, MemoryMailer};
use shopkit::AppEnv;
use storefront::users::{MemoryUserStore, UserStore};
use storefront::{routes, AppState, Config};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: MemoryUserStore,
    pub queue: MemoryQueue,
    pub mailer: MemoryMailer,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` of the session cookie set by the response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookie()
            .and_then(|c| c.split(';').next().map(str::to_string))
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("accessToken="))
    }

    pub fn errors(&self) -> Vec<String> {
        serde_json::from_value(self.body["errors"].clone()).unwrap_or_default()
    }
}

pub fn config() -> Config {
    let mut config = Config::for_env(AppEnv::Test);
    config.store_name = "Nexa".into();
    config
}

pub fn app() -> TestApp {
    let mailer = MemoryMailer::new();
    app_with_mailer(mailer.clone(), Arc::new(mailer))
}

pub fn app_with_mailer(mailer: MemoryMailer, transport: Arc<dyn Mailer>) -> TestApp {
    let users = MemoryUserStore::new();
    let queue = MemoryQueue::new();
    let state = AppState::with_parts(
        config(),
        Arc::new(users.clone()),
        Arc::new(queue.clone()),
        transport,
    )
    .unwrap();

    TestApp {
        router: routes::router(state.clone()),
        state,
        users,
        queue,
        mailer,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        self.send(json_request("POST", uri, body, cookie)).await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Sign up and return the session cookie.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> String {
        let res = self
            .post(
                "/signup",
                serde_json::json!({"name": name, "email": email, "password": password}),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "signup failed: {}", res.body);
        res.session_cookie().unwrap()
    }

    pub async fn verification_token(&self, email: &str) -> String {
        self.users
            .find_by_email(email)
            .await
            .unwrap()
            .and_then(|u| u.verification)
            .map(|v| v.token)
            .unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
