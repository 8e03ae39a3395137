//! API integration tests.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tgmock::store::Origin;
use tower::ServiceExt;

mod common;
use common::{BOT_TOKEN, bot_uri, get, post_json, test_app, test_app_at};

fn user_message(text: &str) -> Value {
    json!({
        "botToken": BOT_TOKEN,
        "from": {"id": 1, "is_bot": false, "first_name": "TestName", "username": "testUserName"},
        "chat": {"id": 1, "type": "private", "title": "Test Name"},
        "text": text
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app();
    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_user_message_without_token_is_rejected() {
    let (app, store) = test_app();
    let (status, json) =
        post_json(&app, "/sendMessage", json!({"chat": {"id": 1}, "text": "hi"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error_code"], 400);
    assert!(json["description"].as_str().unwrap().contains("botToken"));
    assert_eq!(store.len(Origin::User).await, 0);
}

#[tokio::test]
async fn test_user_message_reaches_bot_get_updates() {
    let (app, _) = test_app();
    let (status, sent) = post_json(&app, "/sendMessage", user_message("hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["result"]["update_id"], 1);

    let (status, json) = post_json(&app, &bot_uri("getUpdates"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let updates = json["result"].as_array().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["message"]["text"], "hello");
    assert_eq!(updates[0]["message"]["chat"]["id"], 1);
    assert_eq!(updates[0]["message"]["date"], 1_700_000_000);

    // Another bot sees nothing.
    let (_, other) = post_json(&app, "/bot999:other/getUpdates", json!({})).await;
    assert_eq!(other["result"], json!([]));
}

#[tokio::test]
async fn test_get_updates_offset_confirms_earlier_updates() {
    let (app, store) = test_app();
    for text in ["one", "two", "three"] {
        post_json(&app, "/sendMessage", user_message(text)).await;
    }

    let (_, json) = post_json(&app, &bot_uri("getUpdates"), json!({"limit": 2})).await;
    let updates = json["result"].as_array().unwrap();
    assert_eq!(updates.len(), 2);
    let last_id = updates[1]["update_id"].as_i64().unwrap();

    let (_, json) =
        post_json(&app, &bot_uri("getUpdates"), json!({"offset": last_id + 1})).await;
    let updates = json["result"].as_array().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["message"]["text"], "three");
    assert_eq!(store.len(Origin::User).await, 1);
}

#[tokio::test]
async fn test_get_updates_negative_offset_keeps_latest() {
    let (app, _) = test_app();
    for text in ["one", "two", "three"] {
        post_json(&app, "/sendMessage", user_message(text)).await;
    }

    let (_, json) = get(&app, &format!("{}?offset=-1", bot_uri("getUpdates"))).await;
    let updates = json["result"].as_array().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["message"]["text"], "three");
}

#[tokio::test]
async fn test_get_updates_accepts_huge_timeout() {
    let (app, _) = test_app();
    post_json(&app, "/sendMessage", user_message("first")).await;
    post_json(&app, "/sendMessage", user_message("second")).await;

    let uri = format!("{}?timeout={}", bot_uri("getUpdates"), u64::MAX);
    let (status, json) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"].as_array().unwrap().len(), 2);

    let (status, json) = post_json(
        &app,
        &bot_uri("getUpdates"),
        json!({"offset": 2, "timeout": u64::MAX}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"][0]["message"]["text"], "second");
}

#[tokio::test]
async fn test_bot_message_consumed_by_user_get_updates() {
    let (app, store) = test_app();
    let (status, sent) = post_json(
        &app,
        &bot_uri("sendMessage"),
        json!({"chat_id": 1, "text": "welcome", "reply_markup": {"inline_keyboard": []}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["result"]["message_id"], 1);
    assert_eq!(sent["result"]["from"]["is_bot"], true);

    let (_, json) = post_json(&app, "/getUpdates", json!({"token": BOT_TOKEN})).await;
    let updates = json["result"].as_array().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["message"]["text"], "welcome");
    assert!(updates[0]["message"]["reply_markup"].is_object());

    let (_, json) = post_json(&app, "/getUpdates", json!({"token": BOT_TOKEN})).await;
    assert_eq!(json["result"], json!([]));
    assert_eq!(store.len(Origin::Bot).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_user_get_updates_deliver_once() {
    let (app, store) = test_app();
    for i in 0..50 {
        store
            .append_bot_message(json!({"chat_id": 1, "text": format!("reply {i}")}), BOT_TOKEN)
            .await;
    }

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            post_json(&app, "/getUpdates", json!({"token": BOT_TOKEN})).await
        }));
    }

    let mut delivered = Vec::new();
    for task in tasks {
        let (status, json) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        for update in json["result"].as_array().unwrap() {
            delivered.push(update["update_id"].as_i64().unwrap());
        }
    }

    delivered.sort_unstable();
    assert_eq!(delivered, (1..=50).collect::<Vec<i64>>());
    assert_eq!(store.len(Origin::Bot).await, 0);
}

#[tokio::test]
async fn test_bot_send_message_accepts_form_body() {
    let (app, store) = test_app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(bot_uri("sendMessage"))
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("chat_id=-100&text=from+a+form"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records = store.query(Origin::Bot, Some(BOT_TOKEN)).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].chat_id(), Some(-100));
    assert_eq!(records[0].payload["text"], "from a form");
}

#[tokio::test]
async fn test_history_is_ordered_by_date() {
    let (app, _, clock) = test_app_at(1_000_000);
    post_json(
        &app,
        &bot_uri("sendMessage"),
        json!({"chat_id": 1, "text": "later", "date": 3000}),
    )
    .await;
    clock.set(2_000_000);
    let mut first = user_message("earlier");
    first["date"] = json!(2000);
    post_json(&app, "/sendMessage", first).await;

    let (_, json) = post_json(&app, "/getUpdatesHistory", json!({"token": BOT_TOKEN})).await;
    let texts: Vec<&str> = json["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["message"]["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["earlier", "later"]);

    // History does not consume.
    let (_, again) = post_json(&app, "/getUpdatesHistory", json!({"token": BOT_TOKEN})).await;
    assert_eq!(again["result"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_message() {
    let (app, store) = test_app();
    let (_, sent) = post_json(
        &app,
        &bot_uri("sendMessage"),
        json!({"chat_id": 7, "text": "oops"}),
    )
    .await;
    let message_id = sent["result"]["message_id"].as_i64().unwrap();

    let (status, json) = post_json(
        &app,
        &bot_uri("deleteMessage"),
        json!({"chat_id": 7, "message_id": message_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], true);
    assert_eq!(store.len(Origin::Bot).await, 0);

    let (status, json) = post_json(
        &app,
        &bot_uri("deleteMessage"),
        json!({"chat_id": 7, "message_id": message_id}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["description"], "Bad Request: message to delete not found");
}

#[tokio::test]
async fn test_callback_query_shape() {
    let (app, _) = test_app();
    let mut callback = user_message("ignored");
    callback.as_object_mut().unwrap().remove("text");
    callback["data"] = json!("vote:yes");

    let (status, _) = post_json(&app, "/sendCallback", callback).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = post_json(&app, &bot_uri("getUpdates"), json!({})).await;
    let update = &json["result"][0];
    assert!(update.get("message").is_none());
    assert_eq!(update["callback_query"]["data"], "vote:yes");
    assert_eq!(update["callback_query"]["from"]["id"], 1);
}

#[tokio::test]
async fn test_get_updates_conflicts_with_webhook() {
    let (app, _) = test_app();
    let (status, _) = post_json(
        &app,
        &bot_uri("setWebhook"),
        json!({"url": "http://127.0.0.1:1/hook"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, info) = post_json(&app, &bot_uri("getWebhookInfo"), json!({})).await;
    assert_eq!(info["result"]["url"], "http://127.0.0.1:1/hook");

    let (status, json) = post_json(&app, &bot_uri("getUpdates"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error_code"], 409);

    post_json(&app, &bot_uri("deleteWebhook"), json!({})).await;
    let (status, _) = post_json(&app, &bot_uri("getUpdates"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_get_me_and_unknown_method() {
    let (app, _) = test_app();
    let (status, json) = get(&app, &bot_uri("getMe")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["id"], 123456);
    assert_eq!(json["result"]["is_bot"], true);

    let (status, json) = get(&app, &bot_uri("sendSticker")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["ok"], false);

    let (status, _) = get(&app, "/notabot/getMe").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
