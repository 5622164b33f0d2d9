/*!
 * Link records into disasters.
 *
 * Linking starts from a pool holding one [Disaster] per record and greedily merges compatible
 * disasters until none are left that can be merged. Merged disasters go back into the pool, so a
 * chain of records where each only touches the next one still ends up as a single disaster.
 */
use crate::{
    adjacency::AdjacencyIndex, config::LinkConfig, disaster::Disaster, error::LinkError,
    record::RecordStore,
};
use chrono::Duration;
use log::{debug, info};
use std::fmt::{self, Display};

/// How many steps of the collapse to take between progress messages.
const PROGRESS_INTERVAL: usize = 1_000;

/**
 * Everything needed to link a set of records, borrowed for the length of a run.
 *
 * None of it is ever modified, so a record store and an adjacency index can be shared among any
 * number of contexts, even on different threads.
 */
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    records: &'a RecordStore,
    adjacency: &'a AdjacencyIndex,
    leniency: Duration,
}

impl<'a> LinkContext<'a> {
    /// Create a context, checking that every record's place is in the adjacency index.
    pub fn new(
        records: &'a RecordStore,
        adjacency: &'a AdjacencyIndex,
        config: &LinkConfig,
    ) -> Result<Self, LinkError> {
        Self::with_leniency_days(records, adjacency, config.days_leniency)
    }

    /// Create a context with an explicit leniency in days.
    pub fn with_leniency_days(
        records: &'a RecordStore,
        adjacency: &'a AdjacencyIndex,
        days_leniency: u32,
    ) -> Result<Self, LinkError> {
        if let Some(record) = records
            .iter()
            .find(|r| adjacency.place_id(&r.place).is_err())
        {
            return Err(LinkError::UnknownPlace(record.place.clone()));
        }

        Ok(LinkContext {
            records,
            adjacency,
            leniency: Duration::days(i64::from(days_leniency)),
        })
    }

    pub fn records(&self) -> &'a RecordStore {
        self.records
    }

    pub fn adjacency(&self) -> &'a AdjacencyIndex {
        self.adjacency
    }

    /// The gap allowed between two time spans that are still considered overlapping.
    pub fn leniency(&self) -> Duration {
        self.leniency
    }

    /// Build a pool with one disaster per record, in record store order.
    pub fn initial_pool(&self) -> Result<DisasterPool, LinkError> {
        let disasters = self
            .records
            .iter()
            .map(|r| Disaster::singleton(r, self.adjacency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DisasterPool::from(disasters))
    }

    /// Link all the records in the store and return the final disasters.
    pub fn link(&self) -> Result<(Vec<Disaster>, LinkStats), LinkError> {
        let mut pool = self.initial_pool()?;
        let initial = pool.len();

        let mut settled = DisasterPool::new();
        let merges = pool.collapse(self, &mut settled);

        let stats = LinkStats {
            initial,
            merges,
            disasters: settled.len(),
        };
        info!("{}", stats);

        Ok((settled.into_vec(), stats))
    }
}

/// A summary of a linking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    /// The number of records (singleton disasters) the run started with.
    pub initial: usize,
    /// The number of merges that were done.
    pub merges: usize,
    /// The number of disasters at the end of the run.
    pub disasters: usize,
}

impl Display for LinkStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{} records were linked into {} disasters with {} merges",
            self.initial, self.disasters, self.merges
        )
    }
}

/// A list of [Disaster] objects.
#[derive(Debug, Clone, Default)]
pub struct DisasterPool(Vec<Disaster>);

impl From<Vec<Disaster>> for DisasterPool {
    fn from(src: Vec<Disaster>) -> Self {
        DisasterPool(src)
    }
}

impl DisasterPool {
    /// Create a new, empty pool.
    pub fn new() -> Self {
        DisasterPool(vec![])
    }

    /// Get a vector of disasters.
    pub fn into_vec(self) -> Vec<Disaster> {
        self.0
    }

    /// Add a disaster to the end of the pool.
    pub fn push(&mut self, disaster: Disaster) {
        self.0.push(disaster)
    }

    /// Get the number of disasters in the pool.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if this pool is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get an iterator over the disasters.
    pub fn iter(&self) -> impl Iterator<Item = &Disaster> {
        self.0.iter()
    }

    /// Get the index of the first disaster in the pool that is compatible with `disaster`.
    pub fn find_compatible(&self, disaster: &Disaster, ctx: &LinkContext) -> Option<usize> {
        self.0
            .iter()
            .position(|candidate| disaster.is_compatible_with(candidate, ctx))
    }

    /**
     * Merge compatible disasters until there are none left in the pool.
     *
     * The last disaster is taken off the pool and merged with the first compatible disaster found
     * scanning the rest of the pool from the front. The merged disaster goes back on the end of the
     * pool. If nothing is compatible, the disaster is moved to `settled` and never looked at
     * again. This repeats until the pool is empty.
     *
     * The result depends on the order of the pool, but for a given order it is always the same.
     *
     * # Returns
     * The number of merges that occurred.
     */
    pub fn collapse(&mut self, ctx: &LinkContext, settled: &mut Self) -> usize {
        let mut merges = 0;
        let mut steps = 0;

        while let Some(current) = self.0.pop() {
            match self.find_compatible(&current, ctx) {
                Some(idx) => {
                    let other = self.0.remove(idx);
                    self.0.push(current.merge_with(other));
                    merges += 1;
                }
                None => settled.push(current),
            }

            steps += 1;
            if steps % PROGRESS_INTERVAL == 0 {
                debug!(
                    "Remaining disasters: {:>8} Settled disasters: {:>8}",
                    self.len(),
                    settled.len()
                );
            }
        }

        merges
    }
}
