//! Response cache store
//!
//! Saves one envelope per successful `send` and loads them back in call order,
//! so a past simulation run can be replayed without touching the network.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::database::{Database, SharedDatabase};
use super::ResponseCacheEnvelope;
use crate::ai::client::{CallIdentity, ResponseCache};
use crate::ai::providers::ProviderId;
use crate::ai::types::ToolInvocationRecord;
use crate::paths;

/// A stored envelope with its key
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub identity: CallIdentity,
    /// 1-based call order within actor + agent type + session
    pub sequence: i64,
    pub provider: Option<ProviderId>,
    pub created_at: String,
    pub envelope: ResponseCacheEnvelope<Value>,
}

/// Column values before JSON decoding
type RawRow = (CallIdentity, i64, Option<String>, String, String, String);

impl CachedResponse {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
        Ok((
            CallIdentity::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ),
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }
}

const SELECT_COLUMNS: &str =
    "SELECT actor, agent_type, session, sequence, provider, created_at, payload, tools FROM response_cache";

/// SQLite-backed `ResponseCache`
pub struct ResponseCacheStore {
    db: SharedDatabase,
}

impl ResponseCacheStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Open (or create) the cache at `path`
    pub fn open(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(Database::new(path)?.into_shared()))
    }

    /// Open the cache in the data directory
    pub fn open_default() -> Result<Self> {
        Self::open(&paths::response_db_path())
    }

    /// Persist an envelope, returning its sequence number
    pub fn save_envelope(
        &self,
        identity: &CallIdentity,
        provider: ProviderId,
        envelope: &ResponseCacheEnvelope<Value>,
    ) -> Result<i64> {
        let payload = serde_json::to_string(&envelope.payload)?;
        let tools = serde_json::to_string(&envelope.tools)?;
        let db = self.db.lock();
        let conn = db.conn();

        let sequence: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM response_cache
             WHERE actor = ?1 AND agent_type = ?2 AND session = ?3",
            params![identity.actor, identity.agent_type, identity.session],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO response_cache
                (id, actor, agent_type, session, sequence, provider, created_at, payload, tools)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                uuid::Uuid::new_v4().to_string(),
                identity.actor,
                identity.agent_type,
                identity.session,
                sequence,
                provider.to_string(),
                Utc::now().to_rfc3339(),
                payload,
                tools,
            ],
        )?;

        debug!(
            actor = %identity.actor,
            agent_type = %identity.agent_type,
            sequence,
            "Saved cached response"
        );
        Ok(sequence)
    }

    /// All envelopes for an actor, oldest first; optionally one agent type only
    pub fn load_for(&self, actor: &str, agent_type: Option<&str>) -> Result<Vec<CachedResponse>> {
        let db = self.db.lock();
        let sql = format!(
            "{} WHERE actor = ?1 AND (?2 IS NULL OR agent_type = ?2)
             ORDER BY session, agent_type, sequence",
            SELECT_COLUMNS
        );
        let mut stmt = db.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params![actor, agent_type], CachedResponse::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_cached).collect()
    }

    /// Envelopes of one session for one actor + agent type, in call order
    pub fn load_session(&self, identity: &CallIdentity) -> Result<Vec<CachedResponse>> {
        let db = self.db.lock();
        let sql = format!(
            "{} WHERE actor = ?1 AND agent_type = ?2 AND session = ?3 ORDER BY sequence",
            SELECT_COLUMNS
        );
        let mut stmt = db.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![identity.actor, identity.agent_type, identity.session],
                CachedResponse::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_cached).collect()
    }

    /// Most recent envelope for an actor + agent type, decoded into `T`
    pub fn latest<T: DeserializeOwned>(
        &self,
        actor: &str,
        agent_type: &str,
    ) -> Result<Option<ResponseCacheEnvelope<T>>> {
        let db = self.db.lock();
        let sql = format!(
            "{} WHERE actor = ?1 AND agent_type = ?2 ORDER BY created_at DESC, sequence DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = db
            .conn()
            .query_row(&sql, params![actor, agent_type], CachedResponse::from_row)
            .optional()?;

        match row {
            Some(row) => {
                let cached = into_cached(row)?;
                Ok(Some(
                    cached
                        .envelope
                        .decode()
                        .context("cached payload does not match the requested type")?,
                ))
            }
            None => Ok(None),
        }
    }

    /// Delete every envelope of a session, returning how many were removed
    pub fn clear_session(&self, session: &str) -> Result<usize> {
        let db = self.db.lock();
        let removed = db
            .conn()
            .execute("DELETE FROM response_cache WHERE session = ?1", [session])?;
        Ok(removed)
    }
}

fn into_cached((identity, sequence, provider, created_at, payload, tools): RawRow) -> Result<CachedResponse> {
    let payload: Value = serde_json::from_str(&payload)
        .with_context(|| format!("corrupt payload for {} #{}", identity.actor, sequence))?;
    let tools: Vec<ToolInvocationRecord> = serde_json::from_str(&tools)
        .with_context(|| format!("corrupt tool trace for {} #{}", identity.actor, sequence))?;
    Ok(CachedResponse {
        identity,
        sequence,
        provider: provider.and_then(|p| p.parse().ok()),
        created_at,
        envelope: ResponseCacheEnvelope::new(payload, tools),
    })
}

impl ResponseCache for ResponseCacheStore {
    fn save(
        &self,
        identity: &CallIdentity,
        provider: ProviderId,
        envelope: &ResponseCacheEnvelope<Value>,
    ) -> Result<()> {
        self.save_envelope(identity, provider, envelope).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Plan {
        activity: String,
    }

    fn store() -> ResponseCacheStore {
        ResponseCacheStore::new(Database::in_memory().unwrap().into_shared())
    }

    fn envelope(activity: &str, tools: &[&str]) -> ResponseCacheEnvelope<Value> {
        ResponseCacheEnvelope::new(
            json!({"activity": activity}),
            tools
                .iter()
                .map(|name| ToolInvocationRecord {
                    name: name.to_string(),
                    args_json: "{}".to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_sequence_counts_per_actor_and_agent() {
        let store = store();
        let planner = CallIdentity::new("Mina", "planner", "run-1");
        let reactor = CallIdentity::new("Mina", "reactor", "run-1");

        assert_eq!(store.save_envelope(&planner, ProviderId::OpenAi, &envelope("bake", &[])).unwrap(), 1);
        assert_eq!(store.save_envelope(&planner, ProviderId::OpenAi, &envelope("sell", &[])).unwrap(), 2);
        assert_eq!(store.save_envelope(&reactor, ProviderId::OpenAi, &envelope("greet", &[])).unwrap(), 1);
    }

    #[test]
    fn test_load_session_in_call_order() {
        let store = store();
        let id = CallIdentity::new("Mina", "planner", "run-1");
        store.save_envelope(&id, ProviderId::Anthropic, &envelope("bake", &["walk_to"])).unwrap();
        store.save_envelope(&id, ProviderId::Anthropic, &envelope("sell", &[])).unwrap();
        store
            .save_envelope(&CallIdentity::new("Mina", "planner", "run-2"), ProviderId::Anthropic, &envelope("rest", &[]))
            .unwrap();

        let rows = store.load_session(&id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].envelope.payload["activity"], "bake");
        assert_eq!(rows[0].envelope.tools[0].name, "walk_to");
        assert_eq!(rows[0].provider, Some(ProviderId::Anthropic));
        assert_eq!(rows[1].sequence, 2);
    }

    #[test]
    fn test_load_for_filters_agent_type() {
        let store = store();
        store.save_envelope(&CallIdentity::new("Mina", "planner", "s"), ProviderId::Gemini, &envelope("a", &[])).unwrap();
        store.save_envelope(&CallIdentity::new("Mina", "reactor", "s"), ProviderId::Gemini, &envelope("b", &[])).unwrap();
        store.save_envelope(&CallIdentity::new("Jun", "planner", "s"), ProviderId::Gemini, &envelope("c", &[])).unwrap();

        assert_eq!(store.load_for("Mina", None).unwrap().len(), 2);
        let planner = store.load_for("Mina", Some("planner")).unwrap();
        assert_eq!(planner.len(), 1);
        assert_eq!(planner[0].envelope.payload["activity"], "a");
    }

    #[test]
    fn test_latest_decodes_payload() {
        let store = store();
        let id = CallIdentity::new("Mina", "planner", "run-1");
        assert!(store.latest::<Plan>("Mina", "planner").unwrap().is_none());

        store.save_envelope(&id, ProviderId::OpenAi, &envelope("bake", &[])).unwrap();
        store.save_envelope(&id, ProviderId::OpenAi, &envelope("sell", &[])).unwrap();

        let latest = store.latest::<Plan>("Mina", "planner").unwrap().unwrap();
        assert_eq!(latest.payload, Plan { activity: "sell".to_string() });
    }

    #[test]
    fn test_clear_session() {
        let store = store();
        let id = CallIdentity::new("Mina", "planner", "run-1");
        store.save_envelope(&id, ProviderId::OpenAi, &envelope("bake", &[])).unwrap();
        assert_eq!(store.clear_session("run-1").unwrap(), 1);
        assert!(store.load_session(&id).unwrap().is_empty());
    }
}
