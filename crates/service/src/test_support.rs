//! In-process stand-in for the Redis REST endpoint used by `SetEntryStore`.
//!
//! Understands the `/multi-exec` transaction route and the handful of commands
//! the store issues (`SADD`, `SMEMBERS`, `HSETNX`, `HGETALL`).

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Default)]
struct KvState {
    sets: HashMap<String, BTreeSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    requests: usize,
}

struct KvResponder {
    token: String,
    state: Arc<Mutex<KvState>>,
}

impl KvResponder {
    fn exec(state: &mut KvState, cmd: &[String]) -> Value {
        let arg = |i: usize| cmd.get(i).cloned().unwrap_or_default();
        match cmd.first().map(|c| c.to_ascii_uppercase()).as_deref() {
            Some("SADD") => {
                let set = state.sets.entry(arg(1)).or_default();
                let added = cmd.iter().skip(2).filter(|m| set.insert((*m).clone())).count();
                json!({ "result": added })
            }
            Some("SMEMBERS") => {
                let members: Vec<String> = state.sets.get(&arg(1)).map(|s| s.iter().cloned().collect()).unwrap_or_default();
                json!({ "result": members })
            }
            Some("HSETNX") => {
                let hash = state.hashes.entry(arg(1)).or_default();
                if hash.contains_key(&arg(2)) {
                    json!({ "result": 0 })
                } else {
                    hash.insert(arg(2), arg(3));
                    json!({ "result": 1 })
                }
            }
            Some("HGETALL") => {
                let flat: Vec<String> = state
                    .hashes
                    .get(&arg(1))
                    .map(|h| h.iter().flat_map(|(k, v)| [k.clone(), v.clone()]).collect())
                    .unwrap_or_default();
                json!({ "result": flat })
            }
            _ => json!({ "error": format!("ERR unknown command '{}'", arg(0)) }),
        }
    }
}

impl Respond for KvResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let authorized = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", self.token))
            .unwrap_or(false);
        if !authorized {
            return ResponseTemplate::new(401).set_body_json(json!({ "error": "Unauthorized" }));
        }
        let Ok(commands) = serde_json::from_slice::<Vec<Vec<String>>>(&request.body) else {
            return ResponseTemplate::new(400).set_body_json(json!({ "error": "ERR failed to parse command" }));
        };
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.requests += 1;
        let results: Vec<Value> = commands.iter().map(|cmd| Self::exec(&mut state, cmd)).collect();
        ResponseTemplate::new(200).set_body_json(results)
    }
}

/// A running fake; dropping it shuts the mock server down.
pub struct FakeKv {
    server: MockServer,
    state: Arc<Mutex<KvState>>,
}

impl FakeKv {
    pub async fn start(token: &str) -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(KvState::default()));
        Mock::given(method("POST"))
            .and(path("/multi-exec"))
            .respond_with(KvResponder { token: token.to_string(), state: Arc::clone(&state) })
            .mount(&server)
            .await;
        Self { server, state }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Number of transactions received so far.
    pub fn requests(&self) -> usize {
        self.state.lock().map(|s| s.requests).unwrap_or(0)
    }

    pub fn members(&self, key: &str) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.sets.get(key).map(|m| m.iter().cloned().collect()).unwrap_or_default())
            .unwrap_or_default()
    }
}
