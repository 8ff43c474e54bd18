#![allow(dead_code)]

use event_booking_store::entities::NewEvent;
use event_booking_store::infrastructure::Database;

pub async fn test_db() -> Database {
    Database::in_memory().await.expect("in-memory database")
}

pub fn new_event(title: &str) -> NewEvent {
    NewEvent {
        title: title.to_string(),
        description: "An evening of talks and demos".to_string(),
        overview: "Community meetup".to_string(),
        image: "/images/meetup.png".to_string(),
        venue: "Main Hall".to_string(),
        location: "Lisbon, Portugal".to_string(),
        date: "2025-11-07".to_string(),
        time: "6:30 PM".to_string(),
        mode: "offline".to_string(),
        audience: "Developers".to_string(),
        agenda: vec!["Welcome".to_string(), "Talks".to_string()],
        organizer: "Local Rust Group".to_string(),
        tags: vec!["rust".to_string(), "meetup".to_string()],
    }
}
