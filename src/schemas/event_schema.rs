// Event collection schema

use once_cell::sync::Lazy;
use regex::Regex;

use super::definition::{
    CollectionSchema, FieldDefinition, FieldType, FieldValidator, IndexDefinition,
};

pub const EVENTS: &str = "events";

/// URL-safe slug: lowercase alphanumeric words joined by single hyphens
pub static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern compiles"));

pub static ISO_DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));

pub static CLOCK_TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[01]\d|2[0-3]):[0-5]\d$").expect("time pattern compiles"));

/// Event entity schema
pub struct EventSchema;

impl CollectionSchema for EventSchema {
    fn collection() -> &'static str {
        EVENTS
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::required_text("title"),
            FieldDefinition::required_text("slug").validate(FieldValidator::Pattern {
                regex: &SLUG_PATTERN,
                message: "must contain only lowercase letters, digits and single hyphens",
            }),
            FieldDefinition::required_text("description"),
            FieldDefinition::required_text("overview"),
            FieldDefinition::required_text("image"),
            FieldDefinition::required_text("venue"),
            FieldDefinition::required_text("location"),
            FieldDefinition::required_text("date").validate(FieldValidator::Pattern {
                regex: &ISO_DATE_PATTERN,
                message: "must be an ISO date (YYYY-MM-DD)",
            }),
            FieldDefinition::required_text("time").validate(FieldValidator::Pattern {
                regex: &CLOCK_TIME_PATTERN,
                message: "must be a 24-hour time (HH:MM)",
            }),
            FieldDefinition::required_text("mode"),
            FieldDefinition::required_text("audience"),
            FieldDefinition::required_list("agenda"),
            FieldDefinition::required_text("organizer"),
            FieldDefinition::required_list("tags"),
            FieldDefinition::new("created_at", FieldType::Timestamp),
            FieldDefinition::new("updated_at", FieldType::Timestamp),
        ]
    }

    fn indexes() -> Vec<IndexDefinition> {
        vec![IndexDefinition::new(EVENTS, "slug").unique()]
    }
}
