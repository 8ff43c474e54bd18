// Slug generation for events: URL-safe base from the title, then a numeric suffix
// until no other event holds the candidate.

use tracing::debug;

use crate::core::{current_time_millis, EventId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::Database;

/// Lowercase the title and reduce it to `[a-z0-9]` words joined by single hyphens.
/// Characters outside `[a-z0-9-\s]` are dropped before word boundaries are found,
/// so `"Rock & Roll"` becomes `rock-roll` and `"don't"` becomes `dont`.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut last_was_dash = false;

    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
            last_was_dash = false;
        } else if ch == '-' || ch.is_whitespace() {
            if !slug.is_empty() && !last_was_dash {
                slug.push('-');
                last_was_dash = true;
            }
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Stand-in base for titles with nothing slug-worthy in them
pub fn placeholder_slug() -> String {
    format!("event-{}", current_time_millis())
}

pub fn base_slug(title: &str) -> String {
    let base = normalize_title(title);
    if base.is_empty() {
        placeholder_slug()
    } else {
        base
    }
}

/// `base` for counter 0, `base-N` afterwards
pub fn candidate(base: &str, counter: u32) -> String {
    if counter == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, counter)
    }
}

/// Whether an event other than `exclude` already holds `slug`
pub async fn slug_in_use(db: &Database, slug: &str, exclude: Option<EventId>) -> AppResult<bool> {
    let row = sqlx::query("SELECT 1 FROM events WHERE slug = ?1 AND (?2 IS NULL OR id <> ?2) LIMIT 1")
        .bind(slug)
        .bind(exclude.map(|id| id.to_string()))
        .fetch_optional(db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to check slug {}: {}", slug, e)))?;
    Ok(row.is_some())
}

/// First free slug for `title`.
///
/// This is a pre-check only: two writers can both see a candidate as free. The
/// unique index on `events.slug` rejects the loser, and the event store retries
/// with a fresh slug.
pub async fn unique_slug(db: &Database, title: &str, exclude: Option<EventId>) -> AppResult<String> {
    let base = base_slug(title);
    let mut counter = 0;
    loop {
        let slug = candidate(&base, counter);
        if !slug_in_use(db, &slug, exclude).await? {
            debug!(%slug, counter, "Adopted slug");
            return Ok(slug);
        }
        counter += 1;
    }
}
