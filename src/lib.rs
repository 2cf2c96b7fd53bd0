pub mod cache;
pub mod cli;
pub mod error;
pub mod feed;
pub mod parser;
pub mod pipeline;
pub mod recurrence;
pub mod server;
pub mod structs;
pub mod time;

pub use error::{Error, Result};
pub use parser::parse_calendar;
pub use structs::{Calendar, EventId, Occurrence, TripEvent};
