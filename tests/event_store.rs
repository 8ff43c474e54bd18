mod common;

use common::{new_event, test_db};
use event_booking_store::entities::{BookingStore, EventPatch, EventStore, NewBooking};
use event_booking_store::schemas::SLUG_PATTERN;
use event_booking_store::AppError;

#[tokio::test]
async fn test_identical_titles_get_distinct_slugs() {
    let store = EventStore::new(test_db().await);

    let first = store.create(new_event("Rust Meetup")).await.unwrap();
    let second = store.create(new_event("Rust Meetup")).await.unwrap();
    let third = store.create(new_event("  rust   MEETUP ")).await.unwrap();

    assert_eq!(first.slug, "rust-meetup");
    assert_eq!(second.slug, "rust-meetup-1");
    assert_eq!(third.slug, "rust-meetup-2");
}

#[tokio::test]
async fn test_concurrent_creates_never_share_a_slug() {
    let store = EventStore::new(test_db().await);

    let (a, b) = tokio::join!(
        store.create(new_event("Launch Party")),
        store.create(new_event("Launch Party"))
    );
    let mut slugs = vec![a.unwrap().slug, b.unwrap().slug];
    slugs.sort();
    assert_eq!(slugs, vec!["launch-party", "launch-party-1"]);
}

#[tokio::test]
async fn test_punctuation_title_gets_placeholder_slug() {
    let store = EventStore::new(test_db().await);
    let event = store.create(new_event("!!! ???")).await.unwrap();

    assert!(event.slug.starts_with("event-"));
    assert!(SLUG_PATTERN.is_match(&event.slug));
    assert_eq!(event.title, "!!! ???");
}

#[tokio::test]
async fn test_create_normalizes_date_and_time() {
    let store = EventStore::new(test_db().await);

    let mut input = new_event("Morning Session");
    input.date = "2025-03-10T18:30:00Z".to_string();
    input.time = "9:30 AM".to_string();
    let event = store.create(input).await.unwrap();
    assert_eq!(event.date, "2025-03-10");
    assert_eq!(event.time, "09:30");

    let mut input = new_event("Evening Session");
    input.time = "21:05".to_string();
    assert_eq!(store.create(input).await.unwrap().time, "21:05");

    let mut input = new_event("Midnight Session");
    input.time = "12:00 AM".to_string();
    assert_eq!(store.create(input).await.unwrap().time, "00:00");

    let stored = store.find_by_slug("morning-session").await.unwrap().unwrap();
    assert_eq!(stored, event);
}

#[tokio::test]
async fn test_invalid_date_or_time_rejects_the_save() {
    let store = EventStore::new(test_db().await);

    let mut input = new_event("Bad Date");
    input.date = "not-a-date".to_string();
    let err = store.create(input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("invalid date")));

    let mut input = new_event("Bad Time");
    input.time = "13:00 PM".to_string();
    assert!(store.create(input).await.unwrap_err().is_validation());

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_blank_fields_and_empty_lists_are_rejected() {
    let store = EventStore::new(test_db().await);

    let mut input = new_event("No Venue");
    input.venue = "   ".to_string();
    let err = store.create(input).await.unwrap_err();
    assert_eq!(err, AppError::Validation("venue must not be empty".to_string()));

    let mut input = new_event("No Agenda");
    input.agenda.clear();
    assert!(store.create(input).await.unwrap_err().is_validation());

    let mut input = new_event("Blank Tag");
    input.tags.push(" ".to_string());
    assert!(store.create(input).await.unwrap_err().is_validation());

    let input = new_event("   ");
    assert!(store.create(input).await.unwrap_err().is_validation());

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_fields_are_stored_trimmed() {
    let store = EventStore::new(test_db().await);
    let mut input = new_event("  Trimmed  ");
    input.organizer = "  Someone  ".to_string();
    input.tags = vec![" rust ".to_string()];

    let event = store.create(input).await.unwrap();
    assert_eq!(event.title, "Trimmed");
    assert_eq!(event.organizer, "Someone");
    assert_eq!(event.tags, vec!["rust"]);
}

#[tokio::test]
async fn test_rewriting_same_title_keeps_slug() {
    let db = test_db().await;
    let store = EventStore::new(db);

    let first = store.create(new_event("Demo Day")).await.unwrap();
    let second = store.create(new_event("Demo Day")).await.unwrap();
    assert_eq!(second.slug, "demo-day-1");

    // "demo-day" is free again, but an unchanged title must not move the slug
    assert!(store.delete(first.id).await.unwrap());
    let patch = EventPatch {
        title: Some("Demo Day".to_string()),
        description: Some("Updated description".to_string()),
        ..Default::default()
    };
    let updated = store.update(second.id, patch).await.unwrap();
    assert_eq!(updated.slug, "demo-day-1");
    assert_eq!(updated.description, "Updated description");
    assert_eq!(updated.timestamps.created_at, second.timestamps.created_at);
    assert!(updated.timestamps.updated_at >= second.timestamps.updated_at);

    let renamed = store
        .update(
            second.id,
            EventPatch {
                title: Some("Demo Night".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.slug, "demo-night");
    assert!(store.find_by_slug("demo-day-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_renormalizes_only_changed_schedule_fields() {
    let store = EventStore::new(test_db().await);
    let event = store.create(new_event("Schedule")).await.unwrap();
    assert_eq!(event.time, "18:30");

    let updated = store
        .update(
            event.id,
            EventPatch {
                date: Some("March 5, 2026".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.date, "2026-03-05");
    assert_eq!(updated.time, "18:30");

    let err = store
        .update(
            event.id,
            EventPatch {
                time: Some("25:00".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    // A rejected update leaves the stored record alone
    let stored = store.get(event.id).await.unwrap().unwrap();
    assert_eq!(stored.time, "18:30");
}

#[tokio::test]
async fn test_update_missing_event() {
    let store = EventStore::new(test_db().await);
    let missing = event_booking_store::core::EventId::new();
    let err = store.update(missing, EventPatch::default()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_is_restricted_while_bookings_exist() {
    let db = test_db().await;
    let events = EventStore::new(db.clone());
    let bookings = BookingStore::new(db);

    let event = events.create(new_event("Workshop")).await.unwrap();
    bookings
        .create(NewBooking {
            event_id: event.id.to_string(),
            email: "guest@example.com".to_string(),
        })
        .await
        .unwrap();

    let err = events.delete(event.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(events.get(event.id).await.unwrap().is_some());

    assert_eq!(bookings.delete_for_event(event.id).await.unwrap(), 1);
    assert!(events.delete(event.id).await.unwrap());
    assert!(!events.delete(event.id).await.unwrap());
}

#[tokio::test]
async fn test_list_returns_newest_first() {
    let store = EventStore::new(test_db().await);
    for title in ["One", "Two", "Three"] {
        store.create(new_event(title)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let titles: Vec<String> = store
        .list(2)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(titles, vec!["Three", "Two"]);
}
