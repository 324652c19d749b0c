/// Shared test support: an in-process stub of the chat backend
///
/// Serves the REST contract the core consumes, over real sockets on an
/// ephemeral port, with inspectable state so tests can assert on what the
/// client sent.
use bytes::Bytes;
use chatlink_core::{ChatStore, Config, StoreUpdate};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

type Resp = Response<Full<Bytes>>;

#[derive(Default)]
pub struct BackendState {
    /// conversation id → ordered backend messages (wire JSON)
    pub messages: HashMap<String, Vec<Value>>,
    /// directory summaries (wire JSON)
    pub summaries: Vec<Value>,
    /// recorded (conversation_id, user_id, message_id) mark-read calls
    pub read_calls: Vec<(String, String, String)>,
    /// when set, every write endpoint answers 500
    pub fail_writes: bool,
    /// when set, the messages list endpoint answers 500
    pub fail_reads: bool,
    next_id: u64,
}

impl BackendState {
    fn next_message_id(&mut self) -> String {
        self.next_id += 1;
        format!("srv-{}", self.next_id)
    }

    fn find_message_mut(&mut self, message_id: &str) -> Option<&mut Value> {
        self.messages
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|m| m["id"] == message_id)
    }
}

/// Wire-shaped backend message
pub fn message_value(
    id: &str,
    conversation_id: &str,
    sender_id: &str,
    sender_name: &str,
    body: &str,
    created_at: &str,
) -> Value {
    json!({
        "id": id,
        "conversation_id": conversation_id,
        "sender_id": sender_id,
        "sender_name": sender_name,
        "body": body,
        "created_at": created_at,
        "delivered_at": null,
        "seen_at": null,
        "edited_at": null,
        "deleted_for_everyone": false,
        "reactions": null,
    })
}

/// Wire-shaped conversation summary for a direct conversation
pub fn summary_value(id: &str, friend_id: &str, friend_name: &str, last_message_time: &str) -> Value {
    json!({
        "id": id,
        "friendId": friend_id,
        "friendName": friend_name,
        "lastMessage": "",
        "lastMessageTime": last_message_time,
        "unreadCount": 0,
    })
}

pub struct StubBackend {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<BackendState>>,
    task: JoinHandle<()>,
}

/// Opt-in test logging via RUST_LOG; safe to call from every test
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl StubBackend {
    pub async fn start() -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(BackendState::default()));
        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _peer)) = listener.accept().await else {
                    break;
                };
                let io = TokioIo::new(stream);
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let svc = service_fn(move |req| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(handle(req, state).await) }
                    });
                    let _ = http1::Builder::new().serve_connection(io, svc).await;
                });
            }
        });
        Self { addr, state, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> Config {
        Config {
            api_base_url: self.base_url(),
            ..Default::default()
        }
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn json_resp(status: StatusCode, value: Value) -> Resp {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(value.to_string())))
        .unwrap()
}

fn not_found() -> Resp {
    json_resp(StatusCode::NOT_FOUND, json!({"error": "not found"}))
}

fn server_error() -> Resp {
    json_resp(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "boom"}))
}

fn query_param(query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

async fn handle(req: Request<Incoming>, state: Arc<Mutex<BackendState>>) -> Resp {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let user = req
        .headers()
        .get("user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body_bytes = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return server_error(),
    };
    let body_json: Option<Value> = serde_json::from_slice(&body_bytes).ok();

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut state = state.lock().unwrap();

    if state.fail_writes && method != Method::GET {
        return server_error();
    }

    match (method, segments.as_slice()) {
        // GET /conversations/{id}/messages
        (Method::GET, ["conversations", conversation_id, "messages"]) => {
            if state.fail_reads {
                return server_error();
            }
            let list = state
                .messages
                .get(*conversation_id)
                .cloned()
                .unwrap_or_default();
            json_resp(StatusCode::OK, Value::Array(list))
        }
        // POST /conversations/{id}/messages?body=...
        (Method::POST, ["conversations", conversation_id, "messages"]) => {
            let Some(body) = query_param(&query, "body") else {
                return json_resp(StatusCode::BAD_REQUEST, json!({"error": "missing body"}));
            };
            let id = state.next_message_id();
            let created_at = format!("2025-06-01T12:00:{:02}Z", state.next_id.min(59));
            let msg = message_value(&id, conversation_id, &user, "", &body, &created_at);
            state
                .messages
                .entry(conversation_id.to_string())
                .or_default()
                .push(msg.clone());
            json_resp(StatusCode::OK, msg)
        }
        // PUT /conversations/{id}/messages/{mid}?new_body=...
        (Method::PUT, ["conversations", _conversation_id, "messages", message_id]) => {
            let Some(new_body) = query_param(&query, "new_body") else {
                return json_resp(StatusCode::BAD_REQUEST, json!({"error": "missing new_body"}));
            };
            let message_id = message_id.to_string();
            match state.find_message_mut(&message_id) {
                Some(msg) => {
                    msg["body"] = json!(new_body);
                    msg["edited_at"] = json!("2025-06-01T13:00:00Z");
                    json_resp(StatusCode::OK, msg.clone())
                }
                None => not_found(),
            }
        }
        // DELETE /conversations/{id}/messages/{mid}
        (Method::DELETE, ["conversations", _conversation_id, "messages", message_id]) => {
            let message_id = message_id.to_string();
            match state.find_message_mut(&message_id) {
                Some(msg) => {
                    msg["deleted_for_everyone"] = json!(true);
                    msg["body"] = json!("");
                    json_resp(
                        StatusCode::OK,
                        json!({
                            "id": "del-1",
                            "message_id": message_id,
                            "deleted_by_user_id": user,
                            "deleted_for_everyone": true,
                            "created_at": "2025-06-01T13:00:00Z",
                        }),
                    )
                }
                None => not_found(),
            }
        }
        // POST /conversations/{id}/read?message_id=...
        (Method::POST, ["conversations", conversation_id, "read"]) => {
            let Some(message_id) = query_param(&query, "message_id") else {
                return json_resp(StatusCode::BAD_REQUEST, json!({"error": "missing message_id"}));
            };
            state
                .read_calls
                .push((conversation_id.to_string(), user, message_id));
            json_resp(StatusCode::OK, json!({}))
        }
        // POST|PUT /messages/{id}/reactions
        (Method::POST, ["messages", message_id, "reactions"])
        | (Method::PUT, ["messages", message_id, "reactions"]) => {
            let Some(emoji) = body_json
                .as_ref()
                .and_then(|b| b["reaction_type"].as_str())
                .map(str::to_string)
            else {
                return json_resp(StatusCode::BAD_REQUEST, json!({"error": "missing reaction_type"}));
            };
            let message_id = message_id.to_string();
            match state.find_message_mut(&message_id) {
                Some(msg) => {
                    let mut reactions = msg["reactions"].as_object().cloned().unwrap_or_default();
                    // one reaction per user: drop the user everywhere first
                    for (_, users) in reactions.iter_mut() {
                        if let Some(list) = users.as_array_mut() {
                            list.retain(|u| u != &json!(user));
                        }
                    }
                    reactions
                        .entry(emoji)
                        .or_insert_with(|| json!([]))
                        .as_array_mut()
                        .unwrap()
                        .push(json!(user));
                    reactions.retain(|_, users| !users.as_array().unwrap().is_empty());
                    msg["reactions"] = Value::Object(reactions);
                    json_resp(StatusCode::OK, msg.clone())
                }
                None => not_found(),
            }
        }
        // DELETE /messages/{id}/reactions/{emoji}
        (Method::DELETE, ["messages", message_id, "reactions", emoji]) => {
            let message_id = message_id.to_string();
            // emoji arrives percent-encoded in the path
            let emoji = percent_encoding::percent_decode_str(emoji)
                .decode_utf8_lossy()
                .into_owned();
            match state.find_message_mut(&message_id) {
                Some(msg) => {
                    let mut reactions = msg["reactions"].as_object().cloned().unwrap_or_default();
                    if let Some(users) = reactions.get_mut(&emoji).and_then(|u| u.as_array_mut()) {
                        users.retain(|u| u != &json!(user));
                    }
                    reactions.retain(|_, users| !users.as_array().unwrap().is_empty());
                    msg["reactions"] = Value::Object(reactions);
                    json_resp(StatusCode::OK, msg.clone())
                }
                None => not_found(),
            }
        }
        // GET /api/messages/conversations
        (Method::GET, ["api", "messages", "conversations"]) => {
            if state.fail_reads {
                return server_error();
            }
            json_resp(StatusCode::OK, Value::Array(state.summaries.clone()))
        }
        // POST /api/messages/new_conversation
        (Method::POST, ["api", "messages", "new_conversation"]) => {
            let participants = body_json
                .as_ref()
                .and_then(|b| b["participant_ids"].as_array().cloned())
                .unwrap_or_default();
            json_resp(
                StatusCode::OK,
                json!({"id": format!("conv-{}", participants.len())}),
            )
        }
        // PATCH|DELETE /api/messages/conversations/{id}
        (Method::PATCH, ["api", "messages", "conversations", _conversation_id])
        | (Method::DELETE, ["api", "messages", "conversations", _conversation_id]) => {
            json_resp(StatusCode::OK, json!({}))
        }
        _ => not_found(),
    }
}

/// Seed one empty direct conversation into the store
pub async fn seed_conversation(store: &ChatStore, id: &str, friend_id: &str, timestamp: &str) {
    let summary = serde_json::from_value(summary_value(id, friend_id, "Peer", timestamp)).unwrap();
    let conversation = chatlink_core::Conversation::from_summary(&summary, "u1");
    store
        .update(StoreUpdate::Conversations, |state| {
            state.conversations.push(conversation);
        })
        .await;
}
