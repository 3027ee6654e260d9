#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use courtyard_backend::build_router;
use courtyard_backend::config::Config;
use courtyard_backend::database::Database;
use courtyard_backend::services::antibot::{encode_time_token, fingerprint_checksum};
use courtyard_backend::services::notifications::Notifications;
use courtyard_backend::state::AppState;

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::for_tests()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let db = Database::open_in_memory().expect("in-memory database");
        let state = AppState::new(config, db, Notifications::default())
            .await
            .expect("state");
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        reply(self.send(request).await).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Reply {
        self.call(Method::DELETE, uri, token, None).await
    }

    /// Registers an account and returns its session token and id.
    pub async fn register(&self, email: &str) -> (String, i64) {
        let reply = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "display_name": email.split('@').next().unwrap_or("user"),
                    "bot_check": bot_check(),
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "register {email}: {}", reply.body);
        (
            reply.body["token"].as_str().expect("token").to_string(),
            reply.body["user"]["id"].as_i64().expect("id"),
        )
    }

    /// Root account (the first registration) and a plain resident.
    pub async fn root_and_resident(&self) -> ((String, i64), (String, i64)) {
        let root = self.register("root@example.com").await;
        let resident = self.register("anna@example.com").await;
        (root, resident)
    }

    /// Building 7 / entrance 1 / floor 3 / apartment 12; returns the apartment id.
    pub async fn seed_apartment(&self, root: &str) -> i64 {
        let building = self
            .post(
                "/api/admin/buildings",
                Some(root),
                json!({ "number": "7", "title": "North tower", "address": "Sadovaya 7" }),
            )
            .await;
        assert_eq!(building.status, StatusCode::CREATED, "{}", building.body);
        let building_id = building.body["id"].as_i64().unwrap();

        let entrance = self
            .post(&format!("/api/admin/buildings/{building_id}/entrances"), Some(root), json!({ "number": 1 }))
            .await;
        let entrance_id = entrance.body["id"].as_i64().unwrap();

        let floor = self
            .post(&format!("/api/admin/entrances/{entrance_id}/floors"), Some(root), json!({ "number": 3 }))
            .await;
        let floor_id = floor.body["id"].as_i64().unwrap();

        let apartment = self
            .post(
                &format!("/api/admin/floors/{floor_id}/apartments"),
                Some(root),
                json!({ "number": "12", "area": 61.5, "rooms": 2 }),
            )
            .await;
        assert_eq!(apartment.status, StatusCode::CREATED, "{}", apartment.body);
        apartment.body["id"].as_i64().unwrap()
    }
}

pub async fn reply(response: Response) -> Reply {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Reply {
        status,
        headers,
        body,
    }
}

/// Anti-bot fields of a form rendered a minute ago by a real browser.
pub fn bot_check() -> Value {
    json!({
        "time_token": encode_time_token(Utc::now().timestamp_millis() - 60_000),
        "fingerprint": fingerprint_checksum("Mozilla/5.0|en-US|1920x1080"),
        "website": "",
    })
}
