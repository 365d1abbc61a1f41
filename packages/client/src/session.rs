//! Chat session of one viewer on one stream.
//!
//! The session owns the viewer-side state: the ordered message list, the
//! viewer count announced by the server and the open live connection.
//! History comes from the HTTP API once, when the session opens; everything
//! after that arrives over the live connection.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use onair_server::{
    domain::{MessageKind, PermissionLevel, StreamStatus, sanitizer::sanitize_message},
    infrastructure::dto::{
        http::{ChatMessageDto, PostChatMessageRequest},
        websocket::{ChatData, ClientFrame, EventData, EventEnvelope},
    },
};
use onair_shared::time::millis_to_datetime;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use crate::{
    api::ChatApi,
    error::ClientError,
    transport::{LiveConnection, LiveTransport},
};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub stream_id: String,
    pub token: String,
    pub viewer_name: String,
    pub history_limit: usize,
}

/// One line of the chat as the viewer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub message_id: Option<String>,
    pub viewer_name: String,
    pub message: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

impl From<ChatMessageDto> for ChatEntry {
    fn from(dto: ChatMessageDto) -> Self {
        Self {
            message_id: dto.message_id,
            viewer_name: dto.viewer_name,
            message: dto.message,
            kind: dto.message_type,
            timestamp: dto.created_at,
        }
    }
}

/// What a server event changed, for the caller to render.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Chat(ChatEntry),
    ViewerCount(usize),
    StreamStatus(StreamStatus),
    System(String),
}

/// A message handed to the live connection.
pub struct SentMessage {
    pub message_id: String,
    /// The detached persist call. Failures inside are logged, never returned.
    pub persist: JoinHandle<()>,
}

pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    stream_id: String,
    token: String,
    viewer_name: String,
    permission: PermissionLevel,
    messages: Vec<ChatEntry>,
    seen_ids: HashSet<String>,
    viewer_count: usize,
    stream_status: Option<StreamStatus>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl ChatSession {
    /// Check the token, load history, then open the live connection.
    ///
    /// Returns the session together with the stream of raw server frames,
    /// which the caller feeds back through [`ChatSession::handle_frame`].
    pub async fn open(
        api: Arc<dyn ChatApi>,
        transport: &dyn LiveTransport,
        options: SessionOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), ClientError> {
        let grant = api.validate_token(&options.token).await?;
        if grant.stream_id != options.stream_id {
            return Err(ClientError::Forbidden(
                "Token does not grant access to this stream".to_string(),
            ));
        }

        let mut session = Self {
            api,
            stream_id: options.stream_id,
            token: options.token,
            viewer_name: options.viewer_name,
            permission: grant.permission,
            messages: Vec::new(),
            seen_ids: HashSet::new(),
            viewer_count: 0,
            stream_status: grant.stream.map(|s| s.status),
            outbound: None,
        };

        match session
            .api
            .fetch_history(&session.stream_id, options.history_limit)
            .await
        {
            Ok(history) => {
                for dto in history {
                    session.push_entry(dto.into());
                }
            }
            Err(e) => tracing::warn!("Could not load chat history: {}", e),
        }

        let LiveConnection { outbound, inbound } = transport
            .connect(&grant.ws_url, &session.stream_id, &session.token)
            .await?;
        session.outbound = Some(outbound);

        Ok((session, inbound))
    }

    pub fn messages(&self) -> &[ChatEntry] {
        &self.messages
    }

    pub fn viewer_count(&self) -> usize {
        self.viewer_count
    }

    pub fn permission(&self) -> PermissionLevel {
        self.permission
    }

    pub fn stream_status(&self) -> Option<StreamStatus> {
        self.stream_status
    }

    pub fn is_open(&self) -> bool {
        self.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Drop the live connection. Sending is a no-op afterwards.
    pub fn close(&mut self) {
        self.outbound = None;
    }

    /// Apply one server frame. Returns `None` for frames that change nothing
    /// (malformed, duplicate chat, another stream's status).
    pub fn handle_frame(&mut self, text: &str) -> Option<SessionUpdate> {
        let envelope = match serde_json::from_str::<EventEnvelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!("Ignoring unexpected frame: {}", e);
                return None;
            }
        };

        match envelope.event {
            EventData::Chat(data) => {
                let entry = ChatEntry {
                    message_id: data.message_id,
                    viewer_name: data.viewer_name,
                    message: data.message,
                    kind: data.message_type,
                    timestamp: millis_to_datetime(envelope.timestamp),
                };
                self.push_entry(entry.clone())
                    .then_some(SessionUpdate::Chat(entry))
            }
            EventData::ViewerCount(data) => {
                self.viewer_count = data.count;
                Some(SessionUpdate::ViewerCount(data.count))
            }
            EventData::StreamStatus(data) if data.stream_id == self.stream_id => {
                self.stream_status = Some(data.status);
                Some(SessionUpdate::StreamStatus(data.status))
            }
            EventData::StreamStatus(_) => None,
            EventData::System(data) => Some(SessionUpdate::System(data.message)),
        }
    }

    /// Push `text` to the room and persist it in the background.
    ///
    /// Does nothing when the connection is closed, the token is view-only or
    /// nothing is left after sanitizing. The message shows up in
    /// [`ChatSession::messages`] when the server echoes it back.
    pub fn send_message(&self, text: &str) -> Option<SentMessage> {
        let outbound = self.outbound.as_ref().filter(|tx| !tx.is_closed())?;
        if !self.permission.can_chat() {
            tracing::debug!("Not sending: permission is {}", self.permission.as_str());
            return None;
        }
        let message = sanitize_message(text);
        if message.is_empty() {
            return None;
        }

        let message_id = Uuid::new_v4().to_string();
        let frame = ClientFrame::Chat(ChatData {
            message: message.clone(),
            viewer_name: self.viewer_name.clone(),
            message_type: MessageKind::Regular,
            message_id: Some(message_id.clone()),
        });
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                return None;
            }
        };
        if outbound.send(json).is_err() {
            tracing::warn!("Connection closed before the message could be sent");
            return None;
        }

        let api = self.api.clone();
        let stream_id = self.stream_id.clone();
        let request = PostChatMessageRequest {
            token: self.token.clone(),
            message,
            viewer_name: self.viewer_name.clone(),
            message_type: None,
            message_id: Some(message_id.clone()),
        };
        let persist = tokio::spawn(async move {
            if let Err(e) = api.persist_message(&stream_id, &request).await {
                tracing::warn!("Failed to persist message: {}", e);
            }
        });

        Some(SentMessage {
            message_id,
            persist,
        })
    }

    /// Append unless a message with the same id was already shown.
    fn push_entry(&mut self, entry: ChatEntry) -> bool {
        if let Some(id) = &entry.message_id
            && !self.seen_ids.insert(id.clone())
        {
            return false;
        }
        self.messages.push(entry);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use onair_server::infrastructure::dto::http::ValidateTokenResponse;
    use serde_json::json;

    use super::*;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct FakeApi {
        log: CallLog,
        grant: ValidateTokenResponse,
        history: Result<Vec<ChatMessageDto>, u16>,
        persist_fails: bool,
        persisted: Mutex<Vec<(String, PostChatMessageRequest)>>,
    }

    impl FakeApi {
        fn new(log: CallLog, permission: PermissionLevel) -> Self {
            Self {
                log,
                grant: ValidateTokenResponse {
                    valid: true,
                    permission,
                    stream_id: "stream-1".to_string(),
                    stream: None,
                    ws_url: "ws://hub.test/ws".to_string(),
                },
                history: Ok(Vec::new()),
                persist_fails: false,
                persisted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatApi for FakeApi {
        async fn validate_token(&self, _token: &str) -> Result<ValidateTokenResponse, ClientError> {
            self.log.lock().unwrap().push("validate");
            Ok(self.grant.clone())
        }

        async fn fetch_history(
            &self,
            _stream_id: &str,
            _limit: usize,
        ) -> Result<Vec<ChatMessageDto>, ClientError> {
            self.log.lock().unwrap().push("history");
            self.history
                .clone()
                .map_err(|status| ClientError::from_status(status, "unavailable".to_string()))
        }

        async fn persist_message(
            &self,
            stream_id: &str,
            request: &PostChatMessageRequest,
        ) -> Result<(), ClientError> {
            self.persisted
                .lock()
                .unwrap()
                .push((stream_id.to_string(), request.clone()));
            if self.persist_fails {
                return Err(ClientError::from_status(500, "down".to_string()));
            }
            Ok(())
        }
    }

    /// Server ends of the channels handed out by the fake transport.
    struct ServerEnd {
        from_client: mpsc::UnboundedReceiver<String>,
        to_client: mpsc::UnboundedSender<String>,
    }

    struct FakeTransport {
        log: CallLog,
        connected_to: Mutex<Option<String>>,
        server_end: Mutex<Option<ServerEnd>>,
    }

    impl FakeTransport {
        fn new(log: CallLog) -> Self {
            Self {
                log,
                connected_to: Mutex::new(None),
                server_end: Mutex::new(None),
            }
        }

        fn take_server_end(&self) -> ServerEnd {
            self.server_end.lock().unwrap().take().unwrap()
        }
    }

    #[async_trait]
    impl LiveTransport for FakeTransport {
        async fn connect(
            &self,
            ws_url: &str,
            stream_id: &str,
            _token: &str,
        ) -> Result<LiveConnection, ClientError> {
            self.log.lock().unwrap().push("connect");
            *self.connected_to.lock().unwrap() = Some(format!("{ws_url}#{stream_id}"));
            let (outbound, from_client) = mpsc::unbounded_channel();
            let (to_client, inbound) = mpsc::unbounded_channel();
            *self.server_end.lock().unwrap() = Some(ServerEnd {
                from_client,
                to_client,
            });
            Ok(LiveConnection { outbound, inbound })
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            stream_id: "stream-1".to_string(),
            token: "a".repeat(64),
            viewer_name: "alice".to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    fn stored(message_id: Option<&str>, message: &str, minute: u32) -> ChatMessageDto {
        ChatMessageDto {
            id: format!("obj-{message}"),
            message_id: message_id.map(str::to_string),
            stream_id: "stream-1".to_string(),
            viewer_name: "bob".to_string(),
            message: message.to_string(),
            message_type: MessageKind::Regular,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap(),
        }
    }

    fn chat_frame(message_id: Option<&str>, message: &str) -> String {
        json!({
            "type": "chat",
            "data": { "message": message, "viewer_name": "bob", "message_id": message_id },
            "timestamp": 1_735_732_800_000i64,
        })
        .to_string()
    }

    async fn open_with(api: FakeApi) -> (ChatSession, mpsc::UnboundedReceiver<String>, Arc<FakeApi>, FakeTransport) {
        let transport = FakeTransport::new(api.log.clone());
        let api = Arc::new(api);
        let (session, inbound) = ChatSession::open(api.clone(), &transport, options())
            .await
            .unwrap();
        (session, inbound, api, transport)
    }

    #[tokio::test]
    async fn test_open_loads_history_before_connecting() {
        // テスト項目: 履歴を古い順に読み込んでからライブ接続を開く
        // given (前提条件):
        let log = CallLog::default();
        let mut api = FakeApi::new(log.clone(), PermissionLevel::Chat);
        api.history = Ok(vec![stored(Some("m1"), "first", 0), stored(Some("m2"), "second", 1)]);

        // when (操作):
        let (session, _inbound, _api, transport) = open_with(api).await;

        // then (期待する結果):
        assert_eq!(*log.lock().unwrap(), vec!["validate", "history", "connect"]);
        assert_eq!(
            transport.connected_to.lock().unwrap().as_deref(),
            Some("ws://hub.test/ws#stream-1")
        );
        let texts: Vec<_> = session.messages().iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(session.is_open());
        assert_eq!(session.permission(), PermissionLevel::Chat);
    }

    #[tokio::test]
    async fn test_open_rejects_token_for_other_stream() {
        let log = CallLog::default();
        let mut api = FakeApi::new(log.clone(), PermissionLevel::Chat);
        api.grant.stream_id = "stream-2".to_string();
        let transport = FakeTransport::new(log.clone());

        let result = ChatSession::open(Arc::new(api), &transport, options()).await;

        assert!(matches!(result, Err(ClientError::Forbidden(_))));
        assert_eq!(*log.lock().unwrap(), vec!["validate"]);
    }

    #[tokio::test]
    async fn test_open_connects_even_if_history_fails() {
        let log = CallLog::default();
        let mut api = FakeApi::new(log.clone(), PermissionLevel::Chat);
        api.history = Err(500);

        let (session, _inbound, _api, _transport) = open_with(api).await;

        assert!(session.messages().is_empty());
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn test_live_chat_is_appended_once_per_message_id() {
        // テスト項目: 履歴と同じ message_id を持つライブイベントは二重に表示されない
        // given (前提条件):
        let log = CallLog::default();
        let mut api = FakeApi::new(log, PermissionLevel::ViewOnly);
        api.history = Ok(vec![stored(Some("m1"), "first", 0)]);
        let (mut session, _inbound, _api, _transport) = open_with(api).await;

        // when (操作):
        let duplicate = session.handle_frame(&chat_frame(Some("m1"), "first"));
        let fresh = session.handle_frame(&chat_frame(Some("m2"), "second"));
        let fresh_again = session.handle_frame(&chat_frame(Some("m2"), "second"));
        let anonymous = session.handle_frame(&chat_frame(None, "no id"));

        // then (期待する結果):
        assert_eq!(duplicate, None);
        assert!(matches!(fresh, Some(SessionUpdate::Chat(ref e)) if e.message == "second"));
        assert_eq!(fresh_again, None);
        assert!(anonymous.is_some());
        let texts: Vec<_> = session.messages().iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "no id"]);
        assert_eq!(
            session.messages()[1].timestamp,
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_viewer_count_and_status_come_from_server() {
        let (mut session, _inbound, _api, _transport) =
            open_with(FakeApi::new(CallLog::default(), PermissionLevel::Chat)).await;

        let count = session.handle_frame(r#"{"type":"viewer_count","data":{"count":7},"timestamp":1}"#);
        let other_stream = session.handle_frame(
            r#"{"type":"stream_status","data":{"stream_id":"stream-9","status":"ended"},"timestamp":2}"#,
        );
        let ours = session.handle_frame(
            r#"{"type":"stream_status","data":{"stream_id":"stream-1","status":"ended"},"timestamp":3}"#,
        );
        let garbage = session.handle_frame("not json");

        assert_eq!(count, Some(SessionUpdate::ViewerCount(7)));
        assert_eq!(session.viewer_count(), 7);
        assert_eq!(other_stream, None);
        assert_eq!(ours, Some(SessionUpdate::StreamStatus(StreamStatus::Ended)));
        assert_eq!(session.stream_status(), Some(StreamStatus::Ended));
        assert_eq!(garbage, None);
    }

    #[tokio::test]
    async fn test_send_message_pushes_and_persists() {
        // テスト項目: 送信はライブ接続へのプッシュと独立した永続化の両方を行う
        // given (前提条件):
        let (session, _inbound, api, transport) =
            open_with(FakeApi::new(CallLog::default(), PermissionLevel::Chat)).await;
        let mut server = transport.take_server_end();

        // when (操作):
        let sent = session.send_message("  <b>hello</b> ").unwrap();
        sent.persist.await.unwrap();

        // then (期待する結果):
        let frame: serde_json::Value =
            serde_json::from_str(&server.from_client.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "chat");
        assert_eq!(frame["data"]["message"], "hello");
        assert_eq!(frame["data"]["viewer_name"], "alice");
        assert_eq!(frame["data"]["message_id"], sent.message_id.as_str());

        let persisted = api.persisted.lock().unwrap();
        assert_eq!(persisted.len(), 1);
        let (stream_id, request) = &persisted[0];
        assert_eq!(stream_id, "stream-1");
        assert_eq!(request.message, "hello");
        assert_eq!(request.message_id.as_deref(), Some(sent.message_id.as_str()));
        drop(server.to_client);
    }

    #[tokio::test]
    async fn test_view_only_session_never_sends() {
        // テスト項目: view-only の視聴者はプッシュも永続化も行わない
        // given (前提条件):
        let (session, _inbound, api, transport) =
            open_with(FakeApi::new(CallLog::default(), PermissionLevel::ViewOnly)).await;
        let mut server = transport.take_server_end();

        // when (操作):
        let sent = session.send_message("hello");

        // then (期待する結果):
        assert!(sent.is_none());
        assert!(server.from_client.try_recv().is_err());
        assert!(api.persisted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_is_noop_when_connection_closed() {
        let (session, _inbound, api, transport) =
            open_with(FakeApi::new(CallLog::default(), PermissionLevel::Chat)).await;
        drop(transport.take_server_end());

        assert!(!session.is_open());
        assert!(session.send_message("hello").is_none());
        assert!(api.persisted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_ignores_markup_only_text() {
        let (session, _inbound, api, _transport) =
            open_with(FakeApi::new(CallLog::default(), PermissionLevel::Moderator)).await;

        assert!(session.send_message("<b></b>").is_none());
        assert!(session.send_message("   ").is_none());
        assert!(api.persisted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_undo_live_push() {
        let mut api = FakeApi::new(CallLog::default(), PermissionLevel::Chat);
        api.persist_fails = true;
        let (session, _inbound, api, transport) = open_with(api).await;
        let mut server = transport.take_server_end();

        let sent = session.send_message("hello").unwrap();

        assert!(sent.persist.await.is_ok());
        assert!(server.from_client.recv().await.is_some());
        assert_eq!(api.persisted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_close_stops_sending() {
        let (mut session, _inbound, _api, _transport) =
            open_with(FakeApi::new(CallLog::default(), PermissionLevel::Chat)).await;

        session.close();

        assert!(!session.is_open());
        assert!(session.send_message("hello").is_none());
    }
}
