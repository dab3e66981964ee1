//! Live feeds over WebSocket.
//!
//! A socket holds one feed subscription for its whole life. It pushes a frame per
//! snapshot and per session change, and on the chat feed it posts incoming
//! `{"text": ...}` frames as messages.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    Extension,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;

use crate::auth::CurrentSession;
use crate::db::Record;
use crate::errors::AppError;
use crate::feeds::{chat, lessons, notices, DisplayOrder, Feed, FeedView};
use crate::models::{ChatMessage, Identity, LessonEntry, Notice, SendMessageRequest};
use crate::role::RoleGate;
use crate::session::SessionManager;
use crate::store::Collection;
use crate::AppState;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Frame<'a, R> {
    Snapshot {
        feed: &'static str,
        #[serde(flatten)]
        view: FeedView<'a, R>,
    },
    #[serde(rename_all = "camelCase")]
    Session { can_post: bool },
    SignedOut,
    Notice {
        code: &'static str,
        message: String,
    },
}

impl<R> Frame<'_, R> {
    fn notice(error: &AppError) -> Self {
        Frame::Notice {
            code: error.error_code(),
            message: error.message(),
        }
    }
}

fn can_post(collection: Collection, gate: &RoleGate, identity: Option<&Identity>) -> bool {
    match collection {
        Collection::Chats => identity.is_some(),
        Collection::Notices | Collection::Learning => gate.is_privileged(identity),
    }
}

/// GET /api/live/{feed} - Upgrade to a live feed socket.
pub async fn live_feed(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(name): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let collection = Collection::ALL
        .into_iter()
        .find(|c| c.name() == name)
        .ok_or_else(|| AppError::NotFound(format!("Unknown feed {}", name)))?;
    let session = session.0;
    let limits = state.config.feed_limits;

    // Subscribe before upgrading; the initial snapshot waits in the subscription
    let response = match collection {
        Collection::Notices => {
            let feed: Feed<Notice> =
                Feed::mount(&state.store, notices::query(&limits), DisplayOrder::AsQueried).await?;
            ws.on_upgrade(move |socket| open(socket, state, session, feed))
        }
        Collection::Learning => {
            let feed: Feed<LessonEntry> =
                Feed::mount(&state.store, lessons::query(), DisplayOrder::AsQueried).await?;
            ws.on_upgrade(move |socket| open(socket, state, session, feed))
        }
        Collection::Chats => {
            let feed: Feed<ChatMessage> =
                Feed::mount(&state.store, chat::query(&limits), DisplayOrder::Reversed).await?;
            ws.on_upgrade(move |socket| open(socket, state, session, feed))
        }
    };

    Ok(response)
}

async fn open<R: Record + Serialize>(
    socket: WebSocket,
    state: AppState,
    session: Arc<SessionManager>,
    feed: Feed<R>,
) {
    let (sender, receiver) = socket.split();
    pump(sender, receiver, state, session, feed).await;
}

/// Encode and send one frame. `false` means the peer is gone.
async fn send<S, T>(sender: &mut S, frame: &T) -> bool
where
    S: Sink<Message> + Unpin,
    T: Serialize,
{
    match serde_json::to_string(frame) {
        Ok(text) => sender.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            tracing::warn!("Failed to encode live frame: {}", e);
            true
        }
    }
}

/// Drive one live socket until the peer leaves, the session ends or the feed closes.
async fn pump<R, S, I, E>(
    mut sender: S,
    mut receiver: I,
    state: AppState,
    session: Arc<SessionManager>,
    mut feed: Feed<R>,
) where
    R: Record + Serialize,
    S: Sink<Message> + Unpin,
    I: Stream<Item = Result<Message, E>> + Unpin,
{
    let collection = R::COLLECTION;
    let mut session_rx = session.watch();
    session_rx.borrow_and_update();
    let mut allowed = can_post(collection, &state.gate, session.current().identity());

    tracing::debug!(
        collection = %collection,
        subscribers = state.store.subscriber_count(collection),
        "Live feed opened"
    );

    loop {
        tokio::select! {
            alive = feed.changed() => {
                if !alive {
                    break;
                }
                let frame = Frame::Snapshot {
                    feed: collection.name(),
                    view: feed.view(allowed),
                };
                if !send(&mut sender, &frame).await {
                    break;
                }
            }
            changed = session_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let identity = session_rx.borrow_and_update().identity().cloned();
                let Some(identity) = identity else {
                    let frame: Frame<'_, R> = Frame::SignedOut;
                    send(&mut sender, &frame).await;
                    break;
                };
                allowed = can_post(collection, &state.gate, Some(&identity));
                let frame: Frame<'_, R> = Frame::Session { can_post: allowed };
                if !send(&mut sender, &frame).await {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = handle_text(&state, &session, collection, text.as_str()).await {
                        let frame: Frame<'_, R> = Frame::notice(&e);
                        if !send(&mut sender, &frame).await {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    feed.unmount();
    let _ = sender.close().await;
    tracing::debug!(collection = %collection, "Live feed closed");
}

/// Post an incoming chat frame. Other feeds are read-only over the socket.
async fn handle_text(
    state: &AppState,
    session: &SessionManager,
    collection: Collection,
    text: &str,
) -> Result<(), AppError> {
    if collection != Collection::Chats {
        return Err(AppError::BadRequest(format!(
            "The {} feed does not accept messages",
            collection
        )));
    }

    let request: SendMessageRequest = serde_json::from_str(text)
        .map_err(|_| AppError::BadRequest("Expected a {\"text\": ...} frame".to_string()))?;
    let identity = session.identity();
    chat::post_message(&state.store, identity.as_ref(), &request.text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use crate::auth::{NewSession, Sessions};
    use crate::config::{Config, FeedLimits, MealSettings};
    use crate::feeds::tests::{store_with_pool, MODERATOR};
    use crate::meal::MealClient;
    use crate::session::tests::StubProvider;
    use crate::session::SignInMethod;

    async fn app_state() -> (AppState, TempDir) {
        let (store, _pool, temp_dir) = store_with_pool().await;
        let config = Config {
            db_path: temp_dir.path().join("test.sqlite"),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            moderator_email: MODERATOR.to_string(),
            feed_limits: FeedLimits::default(),
            assignment_url: None,
            firebase_api_key: None,
            identity_url: "http://127.0.0.1:9".to_string(),
            meal: MealSettings::default(),
            meal_url: "http://127.0.0.1:9".to_string(),
        };
        let state = AppState {
            store,
            sessions: Arc::new(Sessions::new(StubProvider::new())),
            gate: Arc::new(RoleGate::new(MODERATOR)),
            meal: Arc::new(MealClient::new(config.meal_url.clone())),
            config: Arc::new(config),
        };
        (state, temp_dir)
    }

    fn password(email: &str) -> SignInMethod {
        SignInMethod::Password {
            email: email.to_string(),
            password: "correct".to_string(),
        }
    }

    async fn signed_in(state: &AppState, email: &str) -> NewSession {
        state.sessions.sign_in(password(email)).await.unwrap()
    }

    /// Client end of an in-memory socket served by `pump`.
    struct Peer {
        incoming: Option<mpsc::UnboundedSender<Result<Message, axum::Error>>>,
        outgoing: mpsc::UnboundedReceiver<Message>,
        task: JoinHandle<()>,
    }

    impl Peer {
        fn connect<R: Record + Serialize>(
            state: &AppState,
            session: Arc<SessionManager>,
            feed: Feed<R>,
        ) -> Self {
            let (out_tx, outgoing) = mpsc::unbounded_channel::<Message>();
            let (incoming, in_rx) = mpsc::unbounded_channel::<Result<Message, axum::Error>>();

            let sink = futures_util::sink::unfold(out_tx, |tx, message: Message| async move {
                tx.send(message).map(|_| tx).map_err(|_| ())
            });
            let stream = futures_util::stream::unfold(in_rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });

            let task = tokio::spawn(pump(
                Box::pin(sink),
                Box::pin(stream),
                state.clone(),
                session,
                feed,
            ));
            Self {
                incoming: Some(incoming),
                outgoing,
                task,
            }
        }

        fn say(&self, text: &str) {
            if let Some(incoming) = &self.incoming {
                incoming.send(Ok(Message::Text(text.into()))).unwrap();
            }
        }

        async fn frame(&mut self) -> Value {
            let message = tokio::time::timeout(Duration::from_secs(2), self.outgoing.recv())
                .await
                .expect("no frame within 2s")
                .expect("socket closed");
            match message {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("unexpected message {:?}", other),
            }
        }

        /// Wait for the server side to finish; nothing may follow the last frame.
        async fn finished(mut self) {
            tokio::time::timeout(Duration::from_secs(2), &mut self.task)
                .await
                .expect("socket still open")
                .unwrap();
            assert!(self.outgoing.recv().await.is_none());
        }

        async fn leave(mut self) {
            self.incoming = None;
            self.finished().await;
        }
    }

    #[test]
    fn test_frame_shapes() {
        let frame: Frame<'_, Notice> = Frame::Session { can_post: true };
        let session = serde_json::to_value(&frame).unwrap();
        assert_eq!(session, json!({ "type": "session", "canPost": true }));

        let frame: Frame<'_, Notice> = Frame::SignedOut;
        let signed_out = serde_json::to_value(&frame).unwrap();
        assert_eq!(signed_out, json!({ "type": "signedOut" }));

        let error = AppError::Validation("text is required".to_string());
        let frame: Frame<'_, Notice> = Frame::notice(&error);
        let notice = serde_json::to_value(&frame).unwrap();
        assert_eq!(notice["type"], "notice");
        assert_eq!(notice["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_can_post_per_feed() {
        let gate = RoleGate::new("teacher@school.kr");
        let student = Identity {
            uid: "s".to_string(),
            display_name: None,
            email: "student@school.kr".to_string(),
            photo_url: None,
        };
        assert!(can_post(Collection::Chats, &gate, Some(&student)));
        assert!(!can_post(Collection::Notices, &gate, Some(&student)));
        assert!(!can_post(Collection::Chats, &gate, None));
    }

    #[tokio::test]
    async fn test_chat_socket_posts_incoming_frames() {
        let (state, _dir) = app_state().await;
        let student = signed_in(&state, "kim@school.kr").await;
        let query = chat::query(&state.config.feed_limits);
        let feed: Feed<ChatMessage> = Feed::mount(&state.store, query, DisplayOrder::Reversed)
            .await
            .unwrap();
        let mut peer = Peer::connect(&state, student.session, feed);

        let frame = peer.frame().await;
        assert_eq!(frame["type"], "snapshot");
        assert_eq!(frame["feed"], "chats");
        assert_eq!(frame["state"], "empty");
        assert_eq!(frame["canPost"], true);
        assert_eq!(frame["revisionId"], 0);

        peer.say(r#"{"text": "hi"}"#);
        let frame = peer.frame().await;
        assert_eq!(frame["revisionId"], 1);
        assert_eq!(frame["items"][0]["text"], "hi");
        assert_eq!(frame["items"][0]["userName"], "kim");

        peer.say(r#"{"text": "anyone?"}"#);
        let frame = peer.frame().await;
        let texts: Vec<&str> = frame["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["text"].as_str().unwrap())
            .collect();
        assert_eq!(texts, ["hi", "anyone?"]);

        peer.leave().await;
        assert_eq!(state.store.subscriber_count(Collection::Chats), 0);
    }

    #[tokio::test]
    async fn test_rejected_frames_answer_with_notice_and_keep_socket_open() {
        let (state, _dir) = app_state().await;
        let student = signed_in(&state, "kim@school.kr").await;
        let query = chat::query(&state.config.feed_limits);
        let feed: Feed<ChatMessage> = Feed::mount(&state.store, query, DisplayOrder::Reversed)
            .await
            .unwrap();
        let mut peer = Peer::connect(&state, student.session, feed);
        peer.frame().await;

        peer.say(r#"{"text": "   "}"#);
        let frame = peer.frame().await;
        assert_eq!(frame, json!({
            "type": "notice",
            "code": "VALIDATION_ERROR",
            "message": "text is required",
        }));

        peer.say("hello?");
        let frame = peer.frame().await;
        assert_eq!(frame["type"], "notice");
        assert_eq!(frame["code"], "BAD_REQUEST");

        // Still subscribed and still posting
        peer.say(r#"{"text": "ok now"}"#);
        let frame = peer.frame().await;
        assert_eq!(frame["type"], "snapshot");
        assert_eq!(frame["items"][0]["text"], "ok now");

        peer.leave().await;
    }

    #[tokio::test]
    async fn test_read_only_feed_refuses_messages() {
        let (state, _dir) = app_state().await;
        let student = signed_in(&state, "kim@school.kr").await;
        let query = notices::query(&state.config.feed_limits);
        let feed: Feed<Notice> = Feed::mount(&state.store, query, DisplayOrder::AsQueried)
            .await
            .unwrap();
        let mut peer = Peer::connect(&state, student.session, feed);

        let frame = peer.frame().await;
        assert_eq!(frame["feed"], "notices");
        assert_eq!(frame["canPost"], false);

        peer.say(r#"{"text": "hi"}"#);
        let frame = peer.frame().await;
        assert_eq!(frame["type"], "notice");
        assert_eq!(frame["code"], "BAD_REQUEST");

        peer.leave().await;
        assert_eq!(state.store.subscriber_count(Collection::Notices), 0);
    }

    #[tokio::test]
    async fn test_session_change_updates_can_post() {
        let (state, _dir) = app_state().await;
        let member = signed_in(&state, "kim@school.kr").await;
        let query = lessons::query();
        let feed: Feed<LessonEntry> = Feed::mount(&state.store, query, DisplayOrder::AsQueried)
            .await
            .unwrap();
        let mut peer = Peer::connect(&state, Arc::clone(&member.session), feed);
        assert_eq!(peer.frame().await["canPost"], false);

        member.session.sign_in(password(MODERATOR)).await.unwrap();
        let frame = peer.frame().await;
        assert_eq!(frame, json!({ "type": "session", "canPost": true }));

        peer.leave().await;
    }

    #[tokio::test]
    async fn test_sign_out_closes_socket_and_releases_feed() {
        let (state, _dir) = app_state().await;
        let student = signed_in(&state, "kim@school.kr").await;
        let query = chat::query(&state.config.feed_limits);
        let feed: Feed<ChatMessage> = Feed::mount(&state.store, query, DisplayOrder::Reversed)
            .await
            .unwrap();
        let mut peer = Peer::connect(&state, Arc::clone(&student.session), feed);
        peer.frame().await;
        assert_eq!(state.store.subscriber_count(Collection::Chats), 1);

        assert!(state.sessions.sign_out(&student.token));
        let frame = peer.frame().await;
        assert_eq!(frame, json!({ "type": "signedOut" }));

        peer.finished().await;
        assert_eq!(state.store.subscriber_count(Collection::Chats), 0);
    }
}
