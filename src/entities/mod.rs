// Event and booking records, their normalization and their stores
pub mod booking;
pub mod event;
pub mod schedule;
pub mod slug;

pub use booking::{Booking, BookingStore, NewBooking};
pub use event::{event_exists, Event, EventPatch, EventStore, NewEvent, MAX_SLUG_ATTEMPTS};
pub use schedule::{normalize_date, normalize_time};
pub use slug::{normalize_title, unique_slug};
