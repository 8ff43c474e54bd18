// Event records and their store

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{info, instrument, warn};

use super::schedule::{normalize_date, normalize_time};
use super::slug::unique_slug;
use crate::core::EventId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{is_unique_violation, Database};
use crate::schemas::{
    run_pre_persist, validate_document, ChangedFields, EventSchema, PrePersist, Timestamps,
    WriteContext, WriteOperation,
};

/// Writes give up after this many slug collisions at the unique index
pub const MAX_SLUG_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub overview: String,
    pub image: String,
    pub venue: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub mode: String,
    pub audience: String,
    pub agenda: Vec<String>,
    pub organizer: String,
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Caller-supplied fields for a new event. Slug and timestamps are derived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub overview: String,
    pub image: String,
    pub venue: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub mode: String,
    pub audience: String,
    pub agenda: Vec<String>,
    pub organizer: String,
    pub tags: Vec<String>,
}

/// Partial update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub overview: Option<String>,
    pub image: Option<String>,
    pub venue: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub mode: Option<String>,
    pub audience: Option<String>,
    pub agenda: Option<Vec<String>>,
    pub organizer: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl Event {
    pub fn from_new(input: NewEvent) -> Self {
        Self {
            id: EventId::new(),
            title: input.title,
            slug: String::new(),
            description: input.description,
            overview: input.overview,
            image: input.image,
            venue: input.venue,
            location: input.location,
            date: input.date,
            time: input.time,
            mode: input.mode,
            audience: input.audience,
            agenda: input.agenda,
            organizer: input.organizer,
            tags: input.tags,
            timestamps: Timestamps::now(),
        }
    }

    fn trim_fields(&mut self) {
        for field in [
            &mut self.title,
            &mut self.description,
            &mut self.overview,
            &mut self.image,
            &mut self.venue,
            &mut self.location,
            &mut self.date,
            &mut self.time,
            &mut self.mode,
            &mut self.audience,
            &mut self.organizer,
        ] {
            trim_in_place(field);
        }
        self.agenda.iter_mut().for_each(trim_in_place);
        self.tags.iter_mut().for_each(trim_in_place);
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn trimmed_list(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.trim().to_string()).collect()
}

impl EventPatch {
    /// Apply the patch and report which fields actually changed value.
    /// Writing a field with the value it already holds does not count as a change.
    pub fn apply(self, event: &mut Event) -> ChangedFields {
        let EventPatch {
            title,
            description,
            overview,
            image,
            venue,
            location,
            date,
            time,
            mode,
            audience,
            agenda,
            organizer,
            tags,
        } = self;
        let mut changed = ChangedFields::new();

        macro_rules! apply_text {
            ($($field:ident),*) => {$(
                if let Some(value) = $field {
                    let value = value.trim().to_string();
                    if event.$field != value {
                        event.$field = value;
                        changed.mark(stringify!($field));
                    }
                }
            )*};
        }
        macro_rules! apply_list {
            ($($field:ident),*) => {$(
                if let Some(values) = $field {
                    let values = trimmed_list(&values);
                    if event.$field != values {
                        event.$field = values;
                        changed.mark(stringify!($field));
                    }
                }
            )*};
        }

        apply_text!(
            title,
            description,
            overview,
            image,
            venue,
            location,
            date,
            time,
            mode,
            audience,
            organizer
        );
        apply_list!(agenda, tags);

        changed
    }
}

#[async_trait]
impl PrePersist for Event {
    async fn pre_persist(&mut self, db: &Database, ctx: &WriteContext) -> AppResult<()> {
        self.trim_fields();

        if ctx.touches("date") {
            self.date = normalize_date(&self.date)?;
        }
        if ctx.touches("time") {
            self.time = normalize_time(&self.time)?;
        }
        if ctx.touches("title") {
            if self.title.is_empty() {
                return Err(AppError::Validation("title must not be empty".to_string()));
            }
            self.slug = unique_slug(db, &self.title, Some(self.id)).await?;
        }

        self.timestamps.stamp(ctx.operation);
        validate_document::<EventSchema>(&serde_json::to_value(&*self)?)
    }

    fn name(&self) -> &str {
        "event_pre_persist"
    }
}

/// Whether an event with `id` is stored
pub async fn event_exists(db: &Database, id: EventId) -> AppResult<bool> {
    let row = sqlx::query("SELECT 1 FROM events WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to check if event {} exists: {}", id, e))
        })?;
    Ok(row.is_some())
}

pub struct EventStore {
    db: Database,
}

impl EventStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create(&self, input: NewEvent) -> AppResult<Event> {
        let mut event = Event::from_new(input);
        run_pre_persist(&mut event, &self.db, &WriteContext::insert()).await?;
        self.write(&mut event, WriteOperation::Insert).await?;
        info!(event_id = %event.id, slug = %event.slug, "Created event");
        Ok(event)
    }

    /// Apply `patch` to a stored event. Slug, date and time are only recomputed
    /// when the patch changes the field they derive from.
    #[instrument(skip(self, patch), fields(event_id = %id))]
    pub async fn update(&self, id: EventId, patch: EventPatch) -> AppResult<Event> {
        let mut event = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;

        let changed = patch.apply(&mut event);
        run_pre_persist(&mut event, &self.db, &WriteContext::update(changed)).await?;
        self.write(&mut event, WriteOperation::Update).await?;
        Ok(event)
    }

    /// Persist with the slug unique index as the final arbiter: a collision there
    /// means another writer took the slug after our pre-check, so pick again.
    async fn write(&self, event: &mut Event, operation: WriteOperation) -> AppResult<()> {
        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let document = serde_json::to_string(&*event)?;
            let result = match operation {
                WriteOperation::Insert => self.insert_row(event, &document).await,
                WriteOperation::Update => self.update_row(event, &document).await,
            };

            match result {
                Ok(0) => return Err(AppError::NotFound(format!("Event {} not found", event.id))),
                Ok(_) => return Ok(()),
                Err(e) if is_unique_violation(&e) => {
                    warn!(slug = %event.slug, attempt, "Slug taken at write time, regenerating");
                    event.slug = unique_slug(&self.db, &event.title, Some(event.id)).await?;
                }
                Err(e) => {
                    return Err(AppError::DatabaseError(format!(
                        "Failed to write event {}: {}",
                        event.id, e
                    )))
                }
            }
        }

        Err(AppError::Conflict(format!(
            "Could not claim a unique slug for {:?} after {} attempts",
            event.title, MAX_SLUG_ATTEMPTS
        )))
    }

    async fn insert_row(&self, event: &Event, document: &str) -> Result<u64, sqlx::Error> {
        sqlx::query(
            "INSERT INTO events (id, slug, document, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(&event.slug)
        .bind(document)
        .bind(event.timestamps.created_at.timestamp_millis())
        .bind(event.timestamps.updated_at.timestamp_millis())
        .execute(self.db.pool())
        .await
        .map(|r| r.rows_affected())
    }

    async fn update_row(&self, event: &Event, document: &str) -> Result<u64, sqlx::Error> {
        sqlx::query("UPDATE events SET slug = ?, document = ?, updated_at = ? WHERE id = ?")
            .bind(&event.slug)
            .bind(document)
            .bind(event.timestamps.updated_at.timestamp_millis())
            .bind(event.id.to_string())
            .execute(self.db.pool())
            .await
            .map(|r| r.rows_affected())
    }

    pub async fn get(&self, id: EventId) -> AppResult<Option<Event>> {
        let row = sqlx::query("SELECT document FROM events WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get event {}: {}", id, e)))?;

        row.map(|row| decode(&row.get::<String, _>("document")))
            .transpose()
    }

    pub async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Event>> {
        let row = sqlx::query("SELECT document FROM events WHERE slug = ?")
            .bind(slug)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to get event by slug {}: {}", slug, e))
            })?;

        row.map(|row| decode(&row.get::<String, _>("document")))
            .transpose()
    }

    /// Most recently created events first
    pub async fn list(&self, limit: u32) -> AppResult<Vec<Event>> {
        let rows = sqlx::query("SELECT document FROM events ORDER BY created_at DESC, id LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list events: {}", e)))?;

        rows.iter()
            .map(|row| decode(&row.get::<String, _>("document")))
            .collect()
    }

    pub async fn count(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count events: {}", e)))?;
        Ok(count as u64)
    }

    /// Delete an event that no booking refers to.
    ///
    /// Deletion is restricted: while bookings exist the event stays and a
    /// `Conflict` is returned. Returns `false` if the event did not exist.
    #[instrument(skip(self), fields(event_id = %id))]
    pub async fn delete(&self, id: EventId) -> AppResult<bool> {
        let mut tx =
            self.db.pool().begin().await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
            })?;

        // Conditional so a booking written concurrently keeps its event
        let result = sqlx::query(
            "DELETE FROM events WHERE id = ? \
             AND NOT EXISTS (SELECT 1 FROM bookings WHERE event_id = ?)",
        )
        .bind(id.to_string())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to delete event {}: {}", id, e)))?;

        if result.rows_affected() == 0 {
            let bookings: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE event_id = ?")
                    .bind(id.to_string())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(format!("Failed to count bookings: {}", e))
                    })?;

            if bookings > 0 {
                return Err(AppError::Conflict(format!(
                    "Event {} still has {} booking(s)",
                    id, bookings
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

fn decode(document: &str) -> AppResult<Event> {
    Ok(serde_json::from_str(document)?)
}
