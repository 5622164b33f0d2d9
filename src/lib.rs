//! Link insurance claim records into natural disaster events.
//!
//! Claim records for the same kind of disaster that overlap in time (within a configurable
//! leniency) and happen in adjacent places are linked, transitively, into a single [Disaster].
//! The resulting disasters can be summarized into rows, or fanned out into one row per
//! enrichment theme using an [EventTable] produced by the news scraping tools.

pub use adjacency::{AdjacencyBuilder, AdjacencyIndex, PlaceId};
pub use claims::{aggregate_claims, normalize_province, Claim};
pub use config::LinkConfig;
pub use database::{DisasterDatabase, DisasterDatabaseAddDisasters, SortKey, StoredDisaster};
pub use disaster::{Disaster, TimeSpan};
pub use error::LinkError;
pub use event::{EventCore, EventTable, QuestionnaireScores, ScrapedEvent};
pub use linker::{DisasterPool, LinkContext, LinkStats};
pub use projector::{combine_events, project_by_theme, summarize, write_csv, DisasterRow, ThemeRow};
pub use record::{Record, RecordId, RecordStore};

/// Result type for operations that may touch files, databases, or other I/O.
pub type DisasterResult<T> = Result<T, Box<dyn std::error::Error>>;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod adjacency;
mod claims;
mod config;
mod database;
mod disaster;
mod error;
mod event;
mod linker;
mod projector;
mod record;
