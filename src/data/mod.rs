//! Immutable value types: capture records, mementos, headers, and options.

mod headers;
mod memento;
mod mode;
mod options;
mod record;

pub use headers::Headers;
pub use memento::{Link, Memento};
pub(crate) use memento::{charset_from_content_type, Body};
pub use mode::Mode;
pub use options::{MatchType, MementoOptions, MementoRequest, SearchDate, SearchOptions};
pub use record::CdxRecord;
