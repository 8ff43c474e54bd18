// Booking records and their store

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{info, instrument};

use super::event::event_exists;
use crate::core::{BookingId, EventId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::Database;
use crate::schemas::{
    run_pre_persist, validate_document, BookingSchema, PrePersist, Timestamps, WriteContext,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub event_id: EventId,
    pub email: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Booking request as received from callers; the event reference is raw text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBooking {
    pub event_id: String,
    pub email: String,
}

impl Booking {
    /// Build a booking from a request, rejecting references that are not identifiers
    pub fn from_new(input: NewBooking) -> AppResult<Self> {
        Ok(Self {
            id: BookingId::new(),
            event_id: EventId::parse(&input.event_id)?,
            email: input.email,
            timestamps: Timestamps::now(),
        })
    }
}

#[async_trait]
impl PrePersist for Booking {
    async fn pre_persist(&mut self, db: &Database, ctx: &WriteContext) -> AppResult<()> {
        self.email = self.email.trim().to_lowercase();
        self.timestamps.stamp(ctx.operation);
        validate_document::<BookingSchema>(&serde_json::to_value(&*self)?)?;

        // Point-in-time check; the insert repeats it atomically
        if !event_exists(db, self.event_id).await? {
            return Err(missing_event(self.event_id));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "booking_pre_persist"
    }
}

pub struct BookingStore {
    db: Database,
}

impl BookingStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(event_id = %input.event_id))]
    pub async fn create(&self, input: NewBooking) -> AppResult<Booking> {
        let mut booking = Booking::from_new(input)?;
        run_pre_persist(&mut booking, &self.db, &WriteContext::insert()).await?;

        // The event may be deleted after the pre-check, so the row is only
        // written if the event is still there in the same statement.
        let document = serde_json::to_string(&booking)?;
        let result = sqlx::query(
            "INSERT INTO bookings (id, event_id, document, created_at, updated_at) \
             SELECT ?, ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM events WHERE id = ?)",
        )
        .bind(booking.id.to_string())
        .bind(booking.event_id.to_string())
        .bind(document)
        .bind(booking.timestamps.created_at.timestamp_millis())
        .bind(booking.timestamps.updated_at.timestamp_millis())
        .bind(booking.event_id.to_string())
        .execute(self.db.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create booking {}: {}", booking.id, e))
        })?;

        if result.rows_affected() == 0 {
            return Err(missing_event(booking.event_id));
        }

        info!(booking_id = %booking.id, "Created booking");
        Ok(booking)
    }

    /// Change the email on a booking. The event reference is re-checked as part of
    /// the save.
    pub async fn update_email(&self, id: BookingId, email: &str) -> AppResult<Booking> {
        let mut booking = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))?;

        booking.email = email.to_string();
        let ctx = WriteContext::update(["email"].into_iter().collect());
        run_pre_persist(&mut booking, &self.db, &ctx).await?;

        let document = serde_json::to_string(&booking)?;
        let result = sqlx::query("UPDATE bookings SET document = ?, updated_at = ? WHERE id = ?")
            .bind(document)
            .bind(booking.timestamps.updated_at.timestamp_millis())
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update booking {}: {}", id, e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Booking {} not found", id)));
        }
        Ok(booking)
    }

    pub async fn get(&self, id: BookingId) -> AppResult<Option<Booking>> {
        let row = sqlx::query("SELECT document FROM bookings WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get booking {}: {}", id, e)))?;

        row.map(|row| decode(&row.get::<String, _>("document")))
            .transpose()
    }

    /// Bookings for one event, oldest first
    pub async fn list_for_event(&self, event_id: EventId) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT document FROM bookings WHERE event_id = ? ORDER BY created_at, id",
        )
        .bind(event_id.to_string())
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to list bookings for {}: {}", event_id, e))
        })?;

        rows.iter()
            .map(|row| decode(&row.get::<String, _>("document")))
            .collect()
    }

    pub async fn count_for_event(&self, event_id: EventId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE event_id = ?")
            .bind(event_id.to_string())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count bookings: {}", e)))?;
        Ok(count as u64)
    }

    pub async fn delete(&self, id: BookingId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete booking {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every booking of an event, returning how many were removed
    #[instrument(skip(self), fields(event_id = %event_id))]
    pub async fn delete_for_event(&self, event_id: EventId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM bookings WHERE event_id = ?")
            .bind(event_id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to delete bookings for {}: {}", event_id, e))
            })?;
        info!(removed = result.rows_affected(), "Deleted bookings for event");
        Ok(result.rows_affected())
    }
}

fn missing_event(event_id: EventId) -> AppError {
    AppError::Validation(format!("referenced event does not exist: {}", event_id))
}

fn decode(document: &str) -> AppResult<Booking> {
    Ok(serde_json::from_str(document)?)
}
