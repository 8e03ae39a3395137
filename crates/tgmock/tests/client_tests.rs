//! End-to-end tests against a bound server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde_json::{Value, json};
use tgmock::store::Origin;
use tgmock::{ClientError, ClientOptions, ServerConfig, TelegramServer};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const BOT_TOKEN: &str = "42:client-tests";

async fn started_server() -> TelegramServer {
    let server = TelegramServer::new(ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    });
    server.start().await.unwrap();
    server
}

fn fast_options(timeout_ms: u64) -> ClientOptions {
    ClientOptions {
        interval: Duration::from_millis(50),
        timeout: Duration::from_millis(timeout_ms),
        ..ClientOptions::default()
    }
}

#[tokio::test]
async fn test_get_updates_returns_once_bot_replies() {
    let server = started_server().await;
    let client = server
        .get_client(BOT_TOKEN, fast_options(1000))
        .await
        .unwrap();

    let store = server.store().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        store
            .append_bot_message(json!({"chat_id": 1, "text": "pong"}), BOT_TOKEN)
            .await;
    });

    let started = Instant::now();
    let updates = client.get_updates().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].text(), Some("pong"));
    assert!(elapsed >= Duration::from_millis(250), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "returned after {elapsed:?}");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_get_updates_times_out() {
    let server = started_server().await;
    let client = server.get_client(BOT_TOKEN, fast_options(200)).await.unwrap();

    let started = Instant::now();
    let err = client.get_updates().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ClientError::Timeout { timeout } if timeout == Duration::from_millis(200)));
    assert!(elapsed >= Duration::from_millis(190), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "gave up after {elapsed:?}");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_conversation_round_trip() {
    let server = started_server().await;
    let client = server
        .get_client(BOT_TOKEN, ClientOptions::default())
        .await
        .unwrap();
    let url = server.url().await;
    let http = reqwest::Client::new();

    let waiting = server.wait_user_message();
    let sent = client
        .send_command(&client.make_command("/start"))
        .await
        .unwrap();
    let event = tokio::time::timeout(Duration::from_secs(1), waiting)
        .await
        .unwrap();
    assert_eq!(event.update_id, sent.update_id);

    // The bot polls with a long-poll timeout and replies.
    let updates: Value = http
        .post(format!("{url}/bot{BOT_TOKEN}/getUpdates"))
        .json(&json!({"timeout": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let message = &updates["result"][0]["message"];
    assert_eq!(message["text"], "/start");
    assert_eq!(message["entities"][0]["type"], "bot_command");
    assert_eq!(message["entities"][0]["length"], 6);

    http.post(format!("{url}/bot{BOT_TOKEN}/sendMessage"))
        .json(&json!({"chat_id": message["chat"]["id"], "text": "Welcome!"}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let replies = client.get_updates().await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text(), Some("Welcome!"));

    let history = client.get_updates_history().await.unwrap();
    assert_eq!(history.len(), 1, "bot reply was consumed, the command remains");
    assert_eq!(history[0].text(), Some("/start"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_bot_long_poll_wakes_on_user_message() {
    let server = started_server().await;
    let client = server
        .get_client(BOT_TOKEN, ClientOptions::default())
        .await
        .unwrap();
    let url = server.url().await;

    let poll = tokio::spawn(async move {
        let started = Instant::now();
        let body: Value = reqwest::Client::new()
            .get(format!("{url}/bot{BOT_TOKEN}/getUpdates?timeout=5"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        (body, started.elapsed())
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    client
        .send_callback(&client.make_callback_query("vote:yes"))
        .await
        .unwrap();

    let (body, elapsed) = poll.await.unwrap();
    assert_eq!(body["result"][0]["callback_query"]["data"], "vote:yes");
    assert!(elapsed < Duration::from_secs(5), "long-poll took {elapsed:?}");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_user_message_surfaces_api_error() {
    let server = started_server().await;
    let client = server.get_client("", ClientOptions::default()).await.unwrap();

    let err = client
        .send_message(&client.make_message("who am I talking to?"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { code: 400, .. }));
    assert!(server.user_messages().await.is_empty());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_keeps_counting() {
    let server = started_server().await;
    let client = server
        .get_client(BOT_TOKEN, ClientOptions::default())
        .await
        .unwrap();
    client.send_message(&client.make_message("first")).await.unwrap();
    server.stop().await.unwrap();
    assert!(server.user_messages().await.is_empty());

    server.start().await.unwrap();
    let client = server
        .get_client(BOT_TOKEN, ClientOptions::default())
        .await
        .unwrap();
    let update = client
        .send_message(&client.make_message("second"))
        .await
        .unwrap();
    assert_eq!(update.update_id, 2);
    assert_eq!(server.user_messages().await.len(), 1);

    server.stop().await.unwrap();
}

type Received = mpsc::UnboundedSender<(Option<String>, Value)>;

async fn receive_hook(
    State(tx): State<Received>,
    headers: HeaderMap,
    Json(update): Json<Value>,
) -> Json<Value> {
    let secret = headers
        .get("X-Telegram-Bot-Api-Secret-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let _ = tx.send((secret, update));
    Json(json!({"ok": true}))
}

#[tokio::test]
async fn test_webhook_delivery() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let receiver = Router::new()
        .route("/hook", post(receive_hook))
        .with_state(tx);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hook_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, receiver).await.unwrap();
    });

    let server = started_server().await;
    let url = server.url().await;
    let set: Value = reqwest::Client::new()
        .post(format!("{url}/bot{BOT_TOKEN}/setWebhook"))
        .json(&json!({"url": format!("http://{hook_addr}/hook"), "secret_token": "s3cret"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(set["result"], true);

    let client = server
        .get_client(BOT_TOKEN, ClientOptions::default())
        .await
        .unwrap();
    client.send_message(&client.make_message("hook me")).await.unwrap();

    let (secret, update) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.as_deref(), Some("s3cret"));
    assert_eq!(update["message"]["text"], "hook me");

    // Delivered updates leave the log.
    let deadline = Instant::now() + Duration::from_secs(2);
    while server.store().len(Origin::User).await > 0 {
        assert!(Instant::now() < deadline, "delivered update was not removed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    server.stop().await.unwrap();
}

/// Fails the first delivery, accepts the rest.
#[derive(Clone)]
struct FlakyHook {
    calls: Arc<AtomicUsize>,
    accepted: mpsc::UnboundedSender<Value>,
}

async fn receive_flaky(
    State(hook): State<FlakyHook>,
    Json(update): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if hook.calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"ok": false})));
    }
    let _ = hook.accepted.send(update);
    (StatusCode::OK, Json(json!({"ok": true})))
}

#[tokio::test]
async fn test_webhook_retries_failed_delivery() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let receiver = Router::new()
        .route("/hook", post(receive_flaky))
        .with_state(FlakyHook {
            calls: calls.clone(),
            accepted: tx,
        });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hook_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, receiver).await.unwrap();
    });

    let server = started_server().await;
    let url = server.url().await;
    reqwest::Client::new()
        .post(format!("{url}/bot{BOT_TOKEN}/setWebhook"))
        .json(&json!({"url": format!("http://{hook_addr}/hook")}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let client = server
        .get_client(BOT_TOKEN, ClientOptions::default())
        .await
        .unwrap();
    client.send_message(&client.make_message("one")).await.unwrap();

    // The first attempt is refused and the update stays pending.
    let deadline = Instant::now() + Duration::from_secs(2);
    while calls.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "webhook was never called");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.store().len(Origin::User).await, 1);

    client.send_message(&client.make_message("two")).await.unwrap();

    let mut texts = Vec::new();
    for _ in 0..2 {
        let update = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        texts.push(update["message"]["text"].as_str().unwrap().to_string());
    }
    assert_eq!(texts, vec!["one", "two"]);

    let deadline = Instant::now() + Duration::from_secs(2);
    while server.store().len(Origin::User).await > 0 {
        assert!(Instant::now() < deadline, "delivered updates were not removed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    server.stop().await.unwrap();
}
