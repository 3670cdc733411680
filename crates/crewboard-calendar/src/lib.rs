mod error;
mod export;
mod import;

pub use error::CalendarError;
pub use export::{escape_text, export_ics, ical_priority, write_ics_file, PRODID};
pub use import::{import_ics, unescape_text};
