// Schema Definitions - collection schemas, validation and pre-persist hooks
pub mod booking_schema;
pub mod definition;
pub mod event_schema;
pub mod hooks;

pub use booking_schema::{BookingSchema, BOOKINGS, EMAIL_PATTERN};
pub use definition::{
    collection_ddl, validate_document, CollectionSchema, FieldDefinition, FieldType,
    FieldValidator, IndexDefinition,
};
pub use event_schema::{EventSchema, EVENTS, SLUG_PATTERN};
pub use hooks::{
    run_pre_persist, ChangedFields, PrePersist, Timestamps, WriteContext, WriteOperation,
};
