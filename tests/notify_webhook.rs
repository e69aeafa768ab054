// tests/notify_webhook.rs
//
// Webhook notifier against a local stub endpoint.

use std::sync::{Arc, Mutex};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;

use feed_sentinel::activity::ActivityLog;
use feed_sentinel::config::{Settings, SettingsHandle};
use feed_sentinel::notify::{Notifier, WebhookNotifier};

#[derive(Clone)]
struct Hook {
    status: u16,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn receive(State(h): State<Hook>, Json(body): Json<Value>) -> (StatusCode, &'static str) {
    h.received.lock().unwrap().push(body);
    (StatusCode::from_u16(h.status).unwrap(), "invalid_token")
}

async fn spawn_hook(status: u16) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route("/hook", post(receive)).with_state(Hook {
        status,
        received: received.clone(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), received)
}

fn notifier(url: &str) -> WebhookNotifier {
    let settings = SettingsHandle::new(Settings {
        notify_webhook_url: url.to_string(),
        ..Settings::default()
    });
    WebhookNotifier::new(settings, ActivityLog::default()).with_timeout(5)
}

#[tokio::test]
async fn posts_text_payload() {
    let (url, received) = spawn_hook(200).await;
    notifier(&url).send("Tornado watch issued").await.unwrap();

    let got = received.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0], serde_json::json!({ "text": "Tornado watch issued" }));
}

#[tokio::test]
async fn non_200_is_an_error_with_body() {
    let (url, _) = spawn_hook(403).await;
    let err = notifier(&url).send("x").await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("HTTP 403"), "{msg}");
    assert!(msg.contains("invalid_token"), "{msg}");
}

#[tokio::test]
async fn empty_url_is_skipped_and_logged() {
    let log = ActivityLog::default();
    let n = WebhookNotifier::new(SettingsHandle::new(Settings::default()), log.clone());
    assert!(n.send("nothing goes out").await.is_ok());
    assert!(log.contains("Webhook URL is empty, skipping notification."));
}

#[tokio::test]
async fn unreachable_endpoint_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = notifier(&format!("http://{addr}/hook")).send("x").await.unwrap_err();
    assert!(format!("{err:#}").contains("webhook post"), "{err:#}");
}

#[tokio::test]
async fn url_change_applies_without_rebuild() {
    let (url, received) = spawn_hook(200).await;
    let settings = SettingsHandle::new(Settings::default());
    let n = WebhookNotifier::new(settings.clone(), ActivityLog::default());

    n.send("dropped").await.unwrap();
    let mut next = settings.snapshot();
    next.notify_webhook_url = url;
    settings.apply(next).unwrap();
    n.send("delivered").await.unwrap();

    let got = received.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0]["text"], "delivered");
}
