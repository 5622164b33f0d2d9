use std::{
    error::Error,
    fmt::{Display, Formatter},
};

use crate::record::RecordId;

/// Errors raised while building the linking context, clustering, or projecting results.
///
/// All of these are fatal for the operation that produced them. Clustering never skips a bad
/// record and carries on, because a skipped record could silently change the aggregates of an
/// unrelated disaster.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    /// A record or a query referenced a place that is not in the adjacency index.
    UnknownPlace(String),
    /// The adjacency relation was not square, not symmetric, or missing self-adjacency.
    MalformedAdjacency(String),
    /// Events with different themes were asked to be combined into one row.
    InconsistentTheme { expected: String, found: String },
    /// A theme group with no events was asked to be combined.
    EmptyThemeGroup,
    /// The same record id appeared more than once when building a record store.
    DuplicateRecord(RecordId),
    /// A record id was requested that is not in the record store.
    UnknownRecord(RecordId),
    /// A record's duration runs past the last representable date.
    DateOutOfRange(RecordId),
}

impl Display for LinkError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        use LinkError::*;

        match self {
            UnknownPlace(place) => write!(f, "unknown place: {}", place),
            MalformedAdjacency(reason) => write!(f, "malformed adjacency table: {}", reason),
            InconsistentTheme { expected, found } => write!(
                f,
                "inconsistent themes in event group: expected '{}', found '{}'",
                expected, found
            ),
            EmptyThemeGroup => write!(f, "no events were provided for the theme group"),
            DuplicateRecord(id) => write!(f, "duplicate record id: {}", id),
            UnknownRecord(id) => write!(f, "unknown record id: {}", id),
            DateOutOfRange(id) => write!(f, "record {} ends past the last supported date", id),
        }
    }
}

impl Error for LinkError {}
