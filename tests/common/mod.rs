#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use tours_api::auth::{Clock, ManualClock};
use tours_api::config::AppConfig;
use tours_api::database::{MemoryStore, Store};
use tours_api::models::{self, Tour, User};
use tours_api::services::{MailError, Mailer, Recipient};
use tours_api::types::{document_id, Document};
use tours_api::{build_app, AppState};

/// Mail captured instead of delivered
#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub kind: &'static str,
    pub to: String,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub failing: AtomicBool,
}

impl RecordingMailer {
    fn record(&self, kind: &'static str, to: &Recipient, url: &str) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Delivery { to: to.email.clone(), reason: "mailbox unavailable".into() });
        }
        self.sent.lock().unwrap().push(SentMail { kind, to: to.email.clone(), url: url.to_string() });
        Ok(())
    }

    pub fn last(&self) -> Option<SentMail> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_welcome(&self, to: &Recipient, url: &str) -> Result<(), MailError> {
        self.record("welcome", to, url)
    }

    async fn send_password_reset(&self, to: &Recipient, url: &str) -> Result<(), MailError> {
        self.record("password_reset", to, url)
    }
}

/// Router over an in-memory store with a hand-driven clock
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub mailer: Arc<RecordingMailer>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        models::register_all(store.as_ref()).await.unwrap();

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let mailer = Arc::new(RecordingMailer::default());

        let mut config = AppConfig::development();
        config.security.jwt_expiry_secs = 3600;
        config.server.public_url = "http://tours.test".to_string();

        let state = AppState::new(config, store.clone(), Arc::new(clock.clone()), mailer.clone());
        let router = build_app(state.clone());

        Self { router, state, store, clock, mailer }
    }

    pub async fn request(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
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

        let response = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PATCH, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, token, None).await
    }

    /// Store a user with `role` directly and return its id and a token
    pub async fn user(&self, name: &str, role: &str) -> (String, String) {
        let email = format!("{}@example.io", name.to_lowercase().replace(' ', "."));
        let input = doc(json!({
            "name": name,
            "email": email,
            "role": role,
            "password": "pass1234",
            "passwordConfirm": "pass1234"
        }));
        let user = models::insert::<User>(self.store.as_ref(), input, self.clock.now(), None).await.unwrap();
        let id = document_id(&user).unwrap().to_string();
        let token = self.state.tokens.issue(&id).unwrap();
        (id, token)
    }

    /// Store a tour directly; the clock moves one minute per tour so
    /// creation order is deterministic
    pub async fn tour(&self, name: &str, price: i64, extra: Value) -> String {
        let mut input = doc(json!({
            "name": name,
            "duration": 7,
            "maxGroupSize": 10,
            "difficulty": "medium",
            "price": price,
            "summary": "Exploring the wildest places",
            "imageCover": "cover.jpg"
        }));
        if let Value::Object(extra) = extra {
            input.extend(extra);
        }
        self.clock.advance(chrono::Duration::minutes(1));
        let tour = models::insert::<Tour>(self.store.as_ref(), input, self.clock.now(), None).await.unwrap();
        document_id(&tour).unwrap().to_string()
    }

    pub async fn stored(&self, collection: &str, id: &str) -> Option<Document> {
        self.store.find_by_id(collection, id).await.unwrap()
    }
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

// ---------------------------------------------------------------------------
// Spawned server

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tours-api"));
        cmd.env("TOURS_API_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("DATABASE_URL", "")
            .env("JWT_SECRET", "integration-test-secret-with-enough-bytes")
            .env("PUBLIC_URL", &base_url)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}
