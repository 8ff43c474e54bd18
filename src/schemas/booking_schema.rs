// Booking collection schema

use once_cell::sync::Lazy;
use regex::Regex;

use super::definition::{
    CollectionSchema, FieldDefinition, FieldType, FieldValidator, IndexDefinition,
};
use super::event_schema::EVENTS;

pub const BOOKINGS: &str = "bookings";

/// Basic `local@domain.tld` shape, no whitespace
pub static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

pub struct BookingSchema;

impl CollectionSchema for BookingSchema {
    fn collection() -> &'static str {
        BOOKINGS
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("event_id", FieldType::Reference(EVENTS)),
            FieldDefinition::required_text("email").validate(FieldValidator::Pattern {
                regex: &EMAIL_PATTERN,
                message: "must be a valid email address",
            }),
            FieldDefinition::new("created_at", FieldType::Timestamp),
            FieldDefinition::new("updated_at", FieldType::Timestamp),
        ]
    }

    fn indexes() -> Vec<IndexDefinition> {
        vec![IndexDefinition::new(BOOKINGS, "event_id")]
    }
}
