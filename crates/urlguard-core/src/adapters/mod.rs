//! Concrete threat source adapters.
//!
//! | Adapter | Backing mechanism |
//! |---------|-------------------|
//! | [`FileSource`] | Local CSV/JSON feed file loaded into memory |
//! | [`HttpSource`] | Remote HTTP lookup endpoint |
//!
//! Both satisfy the identical [`ThreatSource`](crate::ThreatSource)
//! contract; the checker never sees the concrete variant.

mod file;
mod http;

pub use file::{FeedFormat, FileSource};
pub use http::{HttpSource, QueryMethod};
