// Pre-persist hooks - explicit normalization/validation step run before every write
// Callers pass the set of fields changed by the write instead of relying on dirty tracking.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::infrastructure::database::Database;

/// Kind of write being prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Insert,
    Update,
}

/// Field names whose values differ from what is stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFields(BTreeSet<&'static str>);

impl ChangedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, field: &'static str) {
        self.0.insert(field);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<&'static str> for ChangedFields {
    fn from_iter<I: IntoIterator<Item = &'static str>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Context handed to a pre-persist hook
#[derive(Debug, Clone)]
pub struct WriteContext {
    pub operation: WriteOperation,
    pub changed: ChangedFields,
}

impl WriteContext {
    pub fn insert() -> Self {
        Self {
            operation: WriteOperation::Insert,
            changed: ChangedFields::new(),
        }
    }

    pub fn update(changed: ChangedFields) -> Self {
        Self {
            operation: WriteOperation::Update,
            changed,
        }
    }

    /// Whether derived state for `field` has to be recomputed by this write.
    /// Inserts touch every field.
    pub fn touches(&self, field: &str) -> bool {
        self.operation == WriteOperation::Insert || self.changed.contains(field)
    }
}

/// Record-level normalization and validation run before a write
#[async_trait]
pub trait PrePersist: Send + Sync {
    /// Normalize the record in place and reject it if invalid.
    /// May query storage (uniqueness and existence checks).
    async fn pre_persist(&mut self, db: &Database, ctx: &WriteContext) -> AppResult<()>;

    /// Hook name for logging
    fn name(&self) -> &str;
}

/// Run a record's pre-persist step, logging which hook rejected it
pub async fn run_pre_persist<T: PrePersist>(
    record: &mut T,
    db: &Database,
    ctx: &WriteContext,
) -> AppResult<()> {
    debug!(hook = record.name(), operation = ?ctx.operation, "Running pre-persist hook");
    record.pre_persist(db, ctx).await.map_err(|e| {
        warn!(hook = record.name(), error = %e, "Pre-persist hook rejected write");
        e
    })
}

/// Created/updated timestamps shared by every stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Stamp for the given write: inserts reset both, updates move `updated_at`
    pub fn stamp(&mut self, operation: WriteOperation) {
        let now = Utc::now();
        if operation == WriteOperation::Insert {
            self.created_at = now;
        }
        self.updated_at = now;
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::now()
    }
}
