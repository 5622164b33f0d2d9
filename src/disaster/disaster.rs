use super::TimeSpan;
use crate::{
    adjacency::{AdjacencyIndex, PlaceId},
    error::LinkError,
    linker::LinkContext,
    record::{Record, RecordId},
};
use std::{
    collections::BTreeSet,
    fmt::{self, Display},
};

/**
 * A group of records judged to be the same physical disaster.
 *
 * All the derived properties (type, time span, places, and totals) are computed when the disaster
 * is created, either from a single record or by combining the properties of the two disasters that
 * were merged to make it. A disaster is never modified after it is created, and it always has at
 * least one member.
 */
#[derive(Debug, Clone)]
pub struct Disaster {
    /// Ids of the records that make up this disaster.
    members: Vec<RecordId>,
    /// The disaster type of the first member. The types of the other members are never checked
    /// against it, merging is only ever done between disasters with the same type.
    disaster_type: String,
    /// From the earliest start to the latest end of the members.
    span: TimeSpan,
    /// Every distinct place among the members.
    places: BTreeSet<PlaceId>,
    /// Total (sum) of the claims of the members.
    total_claims: u64,
    /// Total (sum) of the cost of the members.
    total_cost: f64,
}

impl Disaster {
    /// Create a disaster made of a single record.
    ///
    /// Fails with [LinkError::UnknownPlace] if the adjacency index doesn't know the record's place,
    /// or [LinkError::DateOutOfRange] if the record's end date can't be represented.
    pub fn singleton(record: &Record, adjacency: &AdjacencyIndex) -> Result<Self, LinkError> {
        let place = adjacency.place_id(&record.place)?;

        Ok(Disaster {
            members: vec![record.id],
            disaster_type: record.disaster_type.clone(),
            span: TimeSpan::new(record.start_date, record.end_date()?),
            places: BTreeSet::from([place]),
            total_claims: record.claim_count,
            total_cost: record.total_cost,
        })
    }

    /// Get the ids of the member records.
    pub fn members(&self) -> &[RecordId] {
        &self.members
    }

    /// Get the disaster type.
    pub fn disaster_type(&self) -> &str {
        &self.disaster_type
    }

    /// Get the time span from the first start to the last end of the members.
    pub fn time_span(&self) -> TimeSpan {
        self.span
    }

    /// Get the distinct places affected by this disaster.
    pub fn places(&self) -> impl Iterator<Item = PlaceId> + '_ {
        self.places.iter().copied()
    }

    /// Get the names of the distinct places, sorted alphabetically.
    pub fn place_names<'a>(&self, adjacency: &'a AdjacencyIndex) -> Vec<&'a str> {
        let mut names: Vec<&str> = self.places().map(|p| adjacency.place_name(p)).collect();
        names.sort_unstable();
        names
    }

    /// Get the total number of claims.
    pub fn total_claims(&self) -> u64 {
        self.total_claims
    }

    /// Get the total cost of the claims.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /**
     * Check if two disasters represent the same event.
     *
     * They must have the same disaster type, their time spans must overlap when extended by the
     * leniency of the context, and at least one place of each must be adjacent to (or the same
     * as) a place of the other.
     */
    pub fn is_compatible_with(&self, other: &Self, ctx: &LinkContext) -> bool {
        self.disaster_type == other.disaster_type
            && self.span.overlaps(&other.span, ctx.leniency())
            && self.is_adjacent_with(other, ctx.adjacency())
    }

    /// Check if any pair of places, one from each disaster, are adjacent.
    pub fn is_adjacent_with(&self, other: &Self, adjacency: &AdjacencyIndex) -> bool {
        self.places
            .iter()
            .any(|&a| other.places.iter().any(|&b| adjacency.are_adjacent_ids(a, b)))
    }

    /**
     * Merge two disasters into a new one.
     *
     * This doesn't check compatibility, callers must only merge disasters for which
     * `is_compatible_with` returned true. The type is kept from `self`, the other properties are
     * combined from both without looking at the member records again.
     */
    pub fn merge_with(mut self, mut other: Self) -> Self {
        self.members.append(&mut other.members);
        self.places.append(&mut other.places);

        Disaster {
            members: self.members,
            disaster_type: self.disaster_type,
            span: self.span.union(other.span),
            places: self.places,
            total_claims: self.total_claims + other.total_claims,
            total_cost: self.total_cost + other.total_cost,
        }
    }
}

impl Display for Disaster {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{} {} ({} records, {} places, {} claims)",
            self.disaster_type,
            self.span,
            self.members.len(),
            self.places.len(),
            self.total_claims
        )
    }
}
