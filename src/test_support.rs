//! Shared fixtures for unit tests.

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::notify::{Email, MailError, Mailer};

/// Mailer that records every email it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
    panic_on: Option<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records emails but reports every send as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Panics instead of sending when the subject contains `fragment`.
    pub fn panicking_on(fragment: &str) -> Self {
        Self {
            panic_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.subject).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if let Some(fragment) = &self.panic_on {
            if email.subject.contains(fragment.as_str()) {
                panic!("mailer crashed on '{}'", email.subject);
            }
        }
        self.sent.lock().unwrap().push(email.clone());
        if self.fail {
            Err(MailError::NoRecipients)
        } else {
            Ok(())
        }
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Local server with fixed routes. Returns its base URL.
///
/// - `/ok`: 200 "all ok here"
/// - `/empty`: 200 "nothing"
/// - `/moved`: 301 to `/ok`
/// - `/missing`: 404
/// - `/slow`: 200 after two seconds
pub async fn spawn_fixture_server() -> String {
    let app = Router::new()
        .route("/ok", get(|| async { "all ok here" }))
        .route("/empty", get(|| async { "nothing" }))
        .route(
            "/moved",
            get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/ok")]) }),
        )
        .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        );
    serve(app).await
}

/// Local server whose `/` answers "ok" while the switch is on and "down"
/// otherwise. Returns its root URL and the switch.
pub async fn spawn_switch_server() -> (String, Arc<AtomicBool>) {
    let healthy = Arc::new(AtomicBool::new(true));
    let flag = healthy.clone();
    let app = Router::new().route(
        "/",
        get(move || {
            let flag = flag.clone();
            async move {
                if flag.load(Ordering::SeqCst) {
                    "ok"
                } else {
                    "down"
                }
            }
        }),
    );
    let base = serve(app).await;
    (format!("{}/", base), healthy)
}
