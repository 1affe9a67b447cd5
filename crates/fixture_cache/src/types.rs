use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

pub type FixtureId = i64;

/// One live fixture exactly as API-Football sent it.
///
/// Nothing but `fixture.id` is ever read from the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fixture(Value);

impl Fixture {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn id(&self) -> Option<FixtureId> {
        self.0.pointer("/fixture/id").and_then(Value::as_i64)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }
}

/// Statistics + events for one fixture.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixtureDetail {
    pub stats:  Vec<Value>,
    pub events: Vec<Value>,
}

/// One complete, internally consistent generation of the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub fixtures:    Vec<Fixture>,
    pub details:     HashMap<FixtureId, FixtureDetail>,
    pub last_update: Option<DateTime<Utc>>,
}

impl CacheSnapshot {
    /// Snapshot for a cycle that found no live fixtures.
    pub fn empty_at(now: DateTime<Utc>) -> Self {
        Self {
            fixtures:    Vec::new(),
            details:     HashMap::new(),
            last_update: Some(now),
        }
    }

    pub fn detail(&self, id: FixtureId) -> Option<&FixtureDetail> {
        self.details.get(&id)
    }
}
