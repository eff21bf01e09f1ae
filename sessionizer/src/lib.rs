//! Active-time estimation for arbitrary JSON event logs.
//!
//! [`Extractor`] collects every timestamp attached to a known field name,
//! anywhere in a document, into an [`InstantSet`]. [`aggregate`] splits that
//! set into sessions on idle gaps and totals their duration.

pub mod aggregate;
pub mod compact;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod parse;
pub mod types;

pub use aggregate::{aggregate, sessions, GapThreshold, Sessions, MIN_SESSION_MS};
pub use compact::{compact, CompactTimeline};
pub use config::HourglassConfig;
pub use document::parse_document;
pub use error::{ConfigError, DocumentError, ExtractError};
pub use extract::{extract, Extractor, TimestampKeys};
pub use parse::TimestampEncoding;
pub use types::{HoursReport, InstantSet, SessionSpan, SessionSummary};
