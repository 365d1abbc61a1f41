//! End-to-end tests over HTTP and WebSocket.
//!
//! Each test boots its own server on an ephemeral port with the in-memory
//! CMS and a fake video platform.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use onair_server::{
    domain::{LiveInput, LiveInputOptions, ThumbnailOptions, VideoError, VideoService},
    infrastructure::repository::InMemoryCmsRepository,
    ui::{AppOptions, AppState, Server},
};
use onair_shared::time::SystemClock;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};

const ADMIN_TOKEN: &str = "admin-secret";

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct FakeVideo;

#[async_trait]
impl VideoService for FakeVideo {
    async fn create_live_input(&self, _options: LiveInputOptions) -> Result<LiveInput, VideoError> {
        Ok(LiveInput {
            id: format!("li-{}", uuid::Uuid::new_v4().simple()),
            ingest_key: "ingest-key".to_string(),
            playback_ids: vec!["pb-1".to_string()],
        })
    }

    async fn delete_live_input(&self, _id: &str) -> Result<(), VideoError> {
        Ok(())
    }

    fn build_playback_url(&self, playback_id: &str) -> String {
        format!("https://stream.test/{playback_id}.m3u8")
    }

    fn build_thumbnail_url(&self, playback_id: &str, _opts: &ThumbnailOptions) -> String {
        format!("https://image.test/{playback_id}.jpg")
    }

    async fn validate_credentials(&self) -> Result<(), VideoError> {
        Ok(())
    }
}

struct TestServer {
    addr: std::net::SocketAddr,
    http: reqwest::Client,
    _stop: oneshot::Sender<()>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let clock = Arc::new(SystemClock);
        let state = AppState::new(
            Arc::new(InMemoryCmsRepository::with_default_settings(clock.clone())),
            Some(Arc::new(FakeVideo)),
            clock,
            AppOptions {
                admin_token: Some(ADMIN_TOKEN.to_string()),
                public_base_url: format!("http://{addr}"),
                ws_url: None,
            },
        );
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(Server::new(state).serve(listener, async {
            let _ = stopped.await;
        }));

        Self {
            addr,
            http: reqwest::Client::new(),
            _stop: stop,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn create_stream(&self) -> String {
        let response = self
            .http
            .post(self.url("/api/streams"))
            .bearer_auth(ADMIN_TOKEN)
            .json(&json!({ "title": "Launch day" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_link(&self, stream_id: &str, permission: &str) -> String {
        let response = self
            .http
            .post(self.url("/api/access-links"))
            .bearer_auth(ADMIN_TOKEN)
            .json(&json!({ "stream_id": stream_id, "permission": permission }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn connect(&self, stream_id: &str, token: &str) -> WsStream {
        let url = format!("ws://{}/ws?stream_id={}&token={}", self.addr, stream_id, token);
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn history(&self, stream_id: &str) -> Vec<Value> {
        self.http
            .get(self.url(&format!("/api/chat/{stream_id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

/// Next event of `kind` that satisfies `accept`, skipping everything else.
async fn next_event(ws: &mut WsStream, kind: &str, accept: impl Fn(&Value) -> bool) -> Value {
    timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let event: Value = serde_json::from_str(text.as_str()).unwrap();
                    if event["type"] == kind && accept(&event) {
                        return event;
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("socket ended while waiting for {kind}: {other:?}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

fn chat_frame(message: &str, viewer_name: &str, message_id: &str) -> Message {
    let frame = json!({
        "type": "chat",
        "data": { "message": message, "viewer_name": viewer_name, "message_id": message_id },
    });
    Message::Text(frame.to_string().into())
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await;

    let response = server.http.get(server.url("/api/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_chat_is_broadcast_and_persisted() {
    // テスト項目: chat 権限の視聴者のメッセージがルーム内の全員に届き、履歴にも保存される
    // given (前提条件):
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let alice_token = server.create_link(&stream_id, "chat").await;
    let bob_token = server.create_link(&stream_id, "view-only").await;
    let mut alice = server.connect(&stream_id, &alice_token).await;
    let mut bob = server.connect(&stream_id, &bob_token).await;
    next_event(&mut alice, "viewer_count", |e| e["data"]["count"] == 2).await;
    next_event(&mut bob, "viewer_count", |e| e["data"]["count"] == 2).await;

    // when (操作): live push + independent persist, as the chat client does
    let message_id = uuid::Uuid::new_v4().to_string();
    alice
        .send(chat_frame("hello", "alice", &message_id))
        .await
        .unwrap();
    let persisted = server
        .http
        .post(server.url(&format!("/api/chat/{stream_id}")))
        .json(&json!({
            "token": alice_token,
            "message": "hello",
            "viewer_name": "alice",
            "message_id": message_id,
        }))
        .send()
        .await
        .unwrap();

    // then (期待する結果):
    let at_bob = next_event(&mut bob, "chat", |_| true).await;
    assert_eq!(at_bob["data"]["viewer_name"], "alice");
    assert_eq!(at_bob["data"]["message"], "hello");
    assert_eq!(at_bob["data"]["message_id"], message_id.as_str());
    assert!(at_bob["timestamp"].as_i64().unwrap() > 0);
    let at_alice = next_event(&mut alice, "chat", |_| true).await;
    assert_eq!(at_alice["data"]["message"], "hello");

    assert_eq!(persisted.status(), StatusCode::CREATED);
    let history = server.history(&stream_id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["message"], "hello");
    assert_eq!(history[0]["viewer_name"], "alice");
    assert_eq!(history[0]["message_id"], message_id.as_str());
}

#[tokio::test]
async fn test_view_only_viewer_cannot_chat() {
    // テスト項目: view-only の視聴者からはブロードキャストも保存も行われない
    // given (前提条件):
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let chat_token = server.create_link(&stream_id, "chat").await;
    let viewer_token = server.create_link(&stream_id, "view-only").await;
    let mut chatter = server.connect(&stream_id, &chat_token).await;
    let mut viewer = server.connect(&stream_id, &viewer_token).await;
    next_event(&mut chatter, "viewer_count", |e| e["data"]["count"] == 2).await;

    // when (操作):
    viewer
        .send(chat_frame("let me in", "viewer", "id-1"))
        .await
        .unwrap();
    let persisted = server
        .http
        .post(server.url(&format!("/api/chat/{stream_id}")))
        .json(&json!({
            "token": viewer_token,
            "message": "let me in",
            "viewer_name": "viewer",
        }))
        .send()
        .await
        .unwrap();

    // then (期待する結果): only the sender gets a notice
    next_event(&mut viewer, "system", |_| true).await;
    chatter
        .send(chat_frame("marker", "chatter", "id-2"))
        .await
        .unwrap();
    let first_chat = next_event(&mut chatter, "chat", |_| true).await;
    assert_eq!(first_chat["data"]["message"], "marker");

    assert_eq!(persisted.status(), StatusCode::FORBIDDEN);
    assert!(server.history(&stream_id).await.is_empty());
}

#[tokio::test]
async fn test_viewer_count_follows_membership() {
    // テスト項目: 視聴者数は接続数に一致し、全員切断すると 0 に戻る
    // given (前提条件):
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let token = server.create_link(&stream_id, "chat").await;
    let mut first = server.connect(&stream_id, &token).await;
    let second = server.connect(&stream_id, &token).await;
    next_event(&mut first, "viewer_count", |e| e["data"]["count"] == 2).await;

    // when (操作):
    drop(second);

    // then (期待する結果):
    next_event(&mut first, "viewer_count", |e| e["data"]["count"] == 1).await;
    first.close(None).await.unwrap();

    let viewers_url = server.url(&format!("/api/streams/{stream_id}/viewers"));
    let mut count = Value::Null;
    for _ in 0..50 {
        let body: Value = server.http.get(&viewers_url).send().await.unwrap().json().await.unwrap();
        count = body["count"].clone();
        if count == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_ending_stream_notifies_viewers() {
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let token = server.create_link(&stream_id, "view-only").await;
    let mut viewer = server.connect(&stream_id, &token).await;

    let response = server
        .http
        .delete(server.url(&format!("/api/streams/{stream_id}")))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let event = next_event(&mut viewer, "stream_status", |_| true).await;
    assert_eq!(event["data"]["status"], "ended");
    assert_eq!(event["data"]["stream_id"], stream_id.as_str());
}

#[tokio::test]
async fn test_validate_token() {
    // テスト項目: 有効なトークンは権限とストリームを返し、不正なトークンは 401 になる
    // given (前提条件):
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let token = server.create_link(&stream_id, "moderator").await;

    // when (操作):
    let valid = server
        .http
        .post(server.url("/api/validate-token"))
        .json(&json!({ "token": token }))
        .send()
        .await
        .unwrap();
    let invalid = server
        .http
        .post(server.url("/api/validate-token"))
        .json(&json!({ "token": "0123456789abcdef0123456789abcdef" }))
        .send()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(valid.status(), StatusCode::OK);
    let body: Value = valid.json().await.unwrap();
    assert_eq!(body["valid"], true);
    assert_eq!(body["permission"], "moderator");
    assert_eq!(body["stream_id"], stream_id.as_str());
    assert_eq!(body["stream"]["title"], "Launch day");
    assert_eq!(body["ws_url"], format!("ws://{}/ws", server.addr));

    assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
    let body: Value = invalid.json().await.unwrap();
    assert_eq!(body["error"], "Invalid or expired access token");
}

#[tokio::test]
async fn test_websocket_rejects_bad_token() {
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let url = format!(
        "ws://{}/ws?stream_id={}&token=0123456789abcdef0123456789abcdef",
        server.addr, stream_id
    );

    let result = connect_async(url).await;

    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED.as_u16())
        }
        other => panic!("expected an HTTP rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_websocket_rejects_token_of_other_stream() {
    let server = TestServer::start().await;
    let stream_a = server.create_stream().await;
    let stream_b = server.create_stream().await;
    let token_for_a = server.create_link(&stream_a, "chat").await;
    let url = format!(
        "ws://{}/ws?stream_id={}&token={}",
        server.addr, stream_b, token_for_a
    );

    let result = connect_async(url).await;

    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::FORBIDDEN.as_u16())
        }
        other => panic!("expected an HTTP rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_admin_endpoints_require_bearer_token() {
    let server = TestServer::start().await;

    let missing = server.http.get(server.url("/api/streams")).send().await.unwrap();
    let wrong = server
        .http
        .get(server.url("/api/streams"))
        .bearer_auth("guess")
        .send()
        .await
        .unwrap();
    let right = server
        .http
        .get(server.url("/api/streams"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(right.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_chat_posting_is_rate_limited() {
    // テスト項目: 同一アドレスからの 11 回目のチャット投稿は 429 になる
    // given (前提条件):
    let server = TestServer::start().await;
    let url = server.url("/api/chat/stream-1");
    let body = json!({
        "token": "0123456789abcdef0123456789abcdef",
        "message": "spam",
        "viewer_name": "spammer",
    });

    // when (操作):
    let mut statuses = Vec::new();
    for _ in 0..11 {
        let response = server.http.post(&url).json(&body).send().await.unwrap();
        statuses.push(response.status());
    }

    // then (期待する結果):
    assert!(statuses[..10].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert_eq!(statuses[10], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_pushing_and_persisting_counts_once_against_chat_limit() {
    // テスト項目: ライブ送信と永続化を両方行っても 1 分あたり 10 件のメッセージを送れる
    // given (前提条件):
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let token = server.create_link(&stream_id, "chat").await;
    let mut ws = server.connect(&stream_id, &token).await;
    let chat_url = server.url(&format!("/api/chat/{stream_id}"));

    for i in 0..10 {
        // when (操作): what the chat client does for each message
        let message = format!("message {i}");
        let message_id = uuid::Uuid::new_v4().to_string();
        ws.send(chat_frame(&message, "alice", &message_id))
            .await
            .unwrap();
        let persisted = server
            .http
            .post(&chat_url)
            .json(&json!({
                "token": token,
                "message": message,
                "viewer_name": "alice",
                "message_id": message_id,
            }))
            .send()
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(persisted.status(), StatusCode::CREATED, "persist of {message}");
        let echoed = next_event(&mut ws, "chat", |_| true).await;
        assert_eq!(echoed["data"]["message"], message.as_str());
    }
    assert_eq!(server.history(&stream_id).await.len(), 10);
}

#[tokio::test]
async fn test_unknown_message_type_is_reported_to_sender() {
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let token = server.create_link(&stream_id, "chat").await;
    let mut ws = server.connect(&stream_id, &token).await;

    let frame = json!({
        "type": "chat",
        "data": { "message": "hi", "viewer_name": "alice", "message_type": "shout" },
    });
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();

    let notice = next_event(&mut ws, "system", |_| true).await;
    assert_eq!(notice["data"]["message"], "Unknown message type: shout");
}

#[tokio::test]
async fn test_welcome_message_is_sent_on_connect() {
    let server = TestServer::start().await;
    let stream_id = server.create_stream().await;
    let token = server.create_link(&stream_id, "chat").await;
    let response = server
        .http
        .patch(server.url("/api/settings"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "welcome_message": "Welcome to the stream!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut ws = server.connect(&stream_id, &token).await;

    let event = next_event(&mut ws, "system", |_| true).await;
    assert_eq!(event["data"]["message"], "Welcome to the stream!");
}
