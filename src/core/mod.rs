//! Pure transformations: codecs, parsers, and policy calculations with no
//! I/O.

pub mod archive_url;
pub mod backoff;
pub mod cdx;
pub mod link;
pub mod patterns;
pub mod timestamp;
