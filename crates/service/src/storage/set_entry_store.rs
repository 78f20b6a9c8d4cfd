use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use models::site_entry::{format_ts, parse_ts, SiteContent, SiteEntry};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::storage::entry_store::{EntryStore, InsertOutcome};

/// Connection settings for the Redis-compatible REST endpoint.
#[derive(Clone, Debug)]
pub struct SetStoreConfig {
    pub base_url: String,
    pub token: String,
    /// Set holding one canonical JSON member per distinct submission.
    pub set_key: String,
    pub timeout: Duration,
}

impl SetStoreConfig {
    fn added_key(&self) -> String {
        format!("{}:added_ts", self.set_key)
    }
}

/// Durable store backed by a server-managed Redis set reached over HTTP.
///
/// Each submission's content is stored as its canonical JSON string with
/// `SADD`, so the set deduplicates byte-identical content and re-inserting it
/// reports `Stored` without changing anything. `site_id` is not a key here: two
/// submissions sharing an id but differing in name or description both land.
///
/// Insertion timestamps live in a companion hash (`<set_key>:added_ts`) written
/// with `HSETNX` in the same `MULTI/EXEC` transaction, so the first timestamp
/// for a member is never overwritten.
pub struct SetEntryStore {
    client: reqwest::Client,
    cfg: SetStoreConfig,
}

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl SetEntryStore {
    pub fn new(cfg: SetStoreConfig) -> Result<Arc<Self>, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("site-index/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::store("build http client", e))?;
        Ok(Arc::new(Self { client, cfg }))
    }

    /// Run `commands` atomically and return one result per command.
    async fn transaction(&self, commands: Value) -> Result<Vec<Value>, ServiceError> {
        let url = format!("{}/multi-exec", self.cfg.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.cfg.token)
            .json(&commands)
            .send()
            .await
            .map_err(|e| ServiceError::store("kv request", e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ServiceError::store("kv response body", e))?;
        if !status.is_success() {
            let detail = serde_json::from_str::<RestReply>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(ServiceError::Store(format!("kv returned HTTP {status}: {detail}")));
        }

        let replies: Vec<RestReply> = serde_json::from_str(&body)
            .map_err(|e| ServiceError::store("decode kv response", e))?;
        replies
            .into_iter()
            .map(|r| match (r.error, r.result) {
                (Some(err), _) => Err(ServiceError::Store(format!("kv command failed: {err}"))),
                (None, Some(v)) => Ok(v),
                (None, None) => Ok(Value::Null),
            })
            .collect()
    }
}

#[async_trait]
impl EntryStore for SetEntryStore {
    fn backend(&self) -> &'static str {
        "set"
    }

    #[instrument(skip(self, entry), fields(site_id = %entry.site_id))]
    async fn insert(&self, entry: &SiteEntry) -> Result<InsertOutcome, ServiceError> {
        let member = entry.content().canonical_json()?;
        let results = self
            .transaction(json!([
                ["SADD", self.cfg.set_key, member],
                ["HSETNX", self.cfg.added_key(), member, format_ts(&entry.added_ts)],
            ]))
            .await?;
        let added = results.first().and_then(Value::as_i64).unwrap_or(0);
        debug!(added, "sadd applied");
        Ok(InsertOutcome::Stored)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<SiteEntry>, ServiceError> {
        let results = self
            .transaction(json!([
                ["SMEMBERS", self.cfg.set_key],
                ["HGETALL", self.cfg.added_key()],
            ]))
            .await?;
        let mut results = results.into_iter();
        let members = string_list(results.next().unwrap_or(Value::Null), "SMEMBERS")?;
        let added = hash_pairs(string_list(results.next().unwrap_or(Value::Null), "HGETALL")?)?;

        let entries = members
            .into_iter()
            .map(|member| decode_member(&member, &added))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = entries.len(), "members decoded");
        Ok(entries)
    }
}

fn string_list(value: Value, command: &str) -> Result<Vec<String>, ServiceError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(ServiceError::Integrity(format!("{command} returned non-string item {other}"))),
            })
            .collect(),
        other => Err(ServiceError::Integrity(format!("{command} returned {other}"))),
    }
}

fn hash_pairs(flat: Vec<String>) -> Result<HashMap<String, String>, ServiceError> {
    if flat.len() % 2 != 0 {
        return Err(ServiceError::Integrity("HGETALL returned an odd number of items".into()));
    }
    let mut map = HashMap::with_capacity(flat.len() / 2);
    let mut it = flat.into_iter();
    while let (Some(k), Some(v)) = (it.next(), it.next()) {
        map.insert(k, v);
    }
    Ok(map)
}

/// Members written by older deployments carry their timestamp inline; current
/// ones take it from the companion hash.
fn decode_member(member: &str, added: &HashMap<String, String>) -> Result<SiteEntry, ServiceError> {
    if let Ok(entry) = serde_json::from_str::<SiteEntry>(member) {
        return Ok(entry);
    }
    let content = SiteContent::from_canonical_json(member)
        .map_err(|e| ServiceError::Integrity(format!("undecodable set member: {e}")))?;
    let raw_ts = added
        .get(member)
        .ok_or_else(|| ServiceError::Integrity(format!("no added_ts recorded for site_id `{}`", content.site_id)))?;
    let ts = parse_ts(raw_ts).map_err(|e| ServiceError::Integrity(e.to_string()))?;
    Ok(content.stamp(ts))
}
