//! Test helpers for lifecycle integration tests.
//!
//! - A scripted control plane implementing `RestApi`
//! - Builders for subscription responses
//! - Listener recorders

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use pushsub::{ErrorEvent, RestApi, RestError, Subscription};
use serde_json::{json, Value};
use tokio::sync::oneshot;

pub const SUBSCRIBER_KEY: &str = "sub-c-test-key";
pub const CHANNEL: &str = "channel-42";
pub const KEY: &str = "AAECAwQFBgcICQoLDA0ODw==";

/// One request seen by the fake control plane
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// Scripted outcome of a request
pub enum Reply {
    Ok(Value),
    Fail(u16),
}

struct Scripted {
    reply: Reply,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    replies: HashMap<&'static str, VecDeque<Scripted>>,
}

/// Control plane answering from per-method reply queues.
///
/// Unscripted DELETEs succeed; unscripted POSTs and PUTs fail with 500.
#[derive(Clone, Default)]
pub struct FakeControlPlane {
    script: Arc<Mutex<Script>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, method: &'static str, reply: Reply) {
        self.push(method, reply, None);
    }

    /// Queue a reply that is held back until the returned sender fires
    pub fn reply_gated(&self, method: &'static str, reply: Reply) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push(method, reply, Some(rx));
        tx
    }

    fn push(&self, method: &'static str, reply: Reply, gate: Option<oneshot::Receiver<()>>) {
        self.script
            .lock()
            .replies
            .entry(method)
            .or_default()
            .push_back(Scripted { reply, gate });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    async fn respond(
        &self,
        method: &'static str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, RestError> {
        let scripted = {
            let mut script = self.script.lock();
            script.calls.push(Call {
                method,
                path: path.to_string(),
                body: body.cloned(),
            });
            script.replies.get_mut(method).and_then(VecDeque::pop_front)
        };

        let Some(scripted) = scripted else {
            return match method {
                "DELETE" => Ok(Value::Null),
                _ => Err(RestError::Status {
                    status: 500,
                    body: format!("unscripted {} {}", method, path),
                }),
            };
        };

        if let Some(gate) = scripted.gate {
            let _ = gate.await;
        }

        match scripted.reply {
            Reply::Ok(value) => Ok(value),
            Reply::Fail(status) => Err(RestError::Status {
                status,
                body: String::new(),
            }),
        }
    }
}

#[async_trait]
impl RestApi for FakeControlPlane {
    async fn post(&self, path: &str, body: &Value) -> Result<Value, RestError> {
        self.respond("POST", path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, RestError> {
        self.respond("PUT", path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), RestError> {
        self.respond("DELETE", path, None).await.map(|_| ())
    }
}

/// Subscription response expiring `expires_in` seconds from now (wall clock)
pub fn info_json(id: &str, expires_in: i64) -> Value {
    info_json_with_key(id, expires_in, KEY)
}

pub fn info_json_with_key(id: &str, expires_in: i64, key: &str) -> Value {
    let expiration = Utc::now() + chrono::Duration::seconds(expires_in);
    json!({
        "uri": format!("https://platform.example.com/restapi/v1.0/subscription/{}", id),
        "id": id,
        "status": "Active",
        "creationTime": Utc::now().to_rfc3339(),
        "expirationTime": expiration.to_rfc3339(),
        "expiresIn": expires_in.max(0),
        "eventFilters": ["a", "b"],
        "deliveryMode": {
            "transportType": "PubNub",
            "encryption": !key.is_empty(),
            "subscriberKey": SUBSCRIBER_KEY,
            "encryptionKey": key,
            "address": CHANNEL
        }
    })
}

/// Let spawned tasks run without moving the paused clock
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Messages and errors delivered to listeners, in order
#[derive(Clone, Default)]
pub struct Recorder {
    pub messages: Arc<Mutex<Vec<String>>>,
    pub errors: Arc<Mutex<Vec<ErrorEvent>>>,
}

impl Recorder {
    pub fn attach(subscription: &Subscription) -> Self {
        let recorder = Self::default();

        let messages = Arc::clone(&recorder.messages);
        subscription.on_message(move |payload| messages.lock().push(payload.to_string()));

        let errors = Arc::clone(&recorder.errors);
        subscription.on_error(move |error| errors.lock().push(error.clone()));

        recorder
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.errors.lock().clone()
    }
}
