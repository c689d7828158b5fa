//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Test database setup (skipped when `DATABASE_URL` is unset)
//! - The full router over a real pool
//! - User registration through the API
//! - Request helpers returning status and JSON body

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tasklane_api::app::{build_router, AppState};
use tasklane_api::config::Config;
use tasklane_shared::db::migrations::run_migrations;
use tasklane_shared::events::RealtimeHub;
use tasklane_shared::notifications::Notifier;
use tasklane_worker::firing::NotifyingFirer;
use tasklane_worker::scheduler::ReminderScheduler;
use tower::Service as _;
use uuid::Uuid;

pub const PASSWORD: &str = "Passw0rd!";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub state: AppState,
    pub app: Router,
    pub firer: Arc<NotifyingFirer>,
}

/// A registered user with a live session
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestContext {
    /// Creates a context over `DATABASE_URL`, or None when it is unset
    pub async fn new() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping database test");
            return None;
        };

        let vars: HashMap<&str, String> = [
            ("DATABASE_URL", url),
            ("JWT_ACCESS_SECRET", "integration-access-secret-0123456789abcdef".to_string()),
            ("JWT_REFRESH_SECRET", "integration-refresh-secret-0123456789abcdef".to_string()),
            ("APP_ENV", "development".to_string()),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| vars.get(k).cloned()).expect("test config");

        let db = PgPool::connect(&config.database.url)
            .await
            .expect("connect to test database");
        run_migrations(&db).await.expect("run migrations");

        let notifier = Notifier::new(db.clone(), Arc::new(RealtimeHub::new()));
        let firer = Arc::new(NotifyingFirer::new(db.clone(), notifier.clone()));
        let scheduler = Arc::new(ReminderScheduler::new(firer.clone()));

        let state = AppState::new(db.clone(), config, notifier, scheduler);
        let app = build_router(state.clone());

        Some(Self {
            db,
            state,
            app,
            firer,
        })
    }

    /// Sends a request and returns the status with the parsed body
    /// (`Value::Null` for empty bodies)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .call(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(&user.access_token), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(&user.access_token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(&user.access_token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(&user.access_token), None).await
    }

    /// Registers a user with a unique email derived from `prefix`
    pub async fn register(&self, prefix: &str) -> TestUser {
        let email = format!("{}-{}@example.com", prefix, Uuid::new_v4());
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": PASSWORD,
                    "name": prefix,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        TestUser {
            id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            email,
            access_token: body["tokens"]["access_token"].as_str().unwrap().to_string(),
            refresh_token: body["tokens"]["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Creates a list owned by `owner` and returns `(list_id, invite_code)`
    pub async fn create_list(&self, owner: &TestUser, name: &str) -> (Uuid, String) {
        let (status, body) = self
            .post("/task-lists", owner, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create list failed: {}", body);
        (
            body["id"].as_str().unwrap().parse().unwrap(),
            body["invite_code"].as_str().unwrap().to_string(),
        )
    }

    /// Creates a task and returns its ID
    pub async fn create_task(&self, user: &TestUser, list_id: Uuid, body: Value) -> Uuid {
        let (status, task) = self
            .post(&format!("/task-lists/{}/tasks", list_id), user, body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {}", task);
        task["id"].as_str().unwrap().parse().unwrap()
    }
}
