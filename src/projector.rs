/*!
 * Turn linked disasters into output rows.
 *
 * There are two kinds of output. A [DisasterRow] summarizes the claims of one disaster. A
 * [ThemeRow] combines the enrichment events of one disaster that share a theme, so a disaster
 * may produce several theme rows, or none at all if no events were found for it.
 */
use crate::{
    adjacency::AdjacencyIndex,
    disaster::Disaster,
    error::LinkError,
    event::{EventTable, ScrapedEvent},
    record::RecordId,
    DisasterResult,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
    io::Write,
};

/// The claims summary of a single disaster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisasterRow {
    /// The first day of the disaster.
    pub date: NaiveDate,
    /// Days from the first to the last day of the disaster.
    pub duration: i64,
    /// The disaster type.
    pub disaster: String,
    /// Affected provinces in alphabetical order.
    #[serde(serialize_with = "columns::joined")]
    pub provinces: Vec<String>,
    /// Total number of claims.
    pub claims: u64,
    /// Total cost of the claims.
    pub total_cost: f64,
    /// Cost per day of the disaster.
    pub losses_per_day: f64,
}

impl DisasterRow {
    /**
     * Summarize a disaster.
     *
     * A disaster that starts and ends on the same day is counted as one day long when computing
     * the losses per day.
     */
    pub fn from_disaster(disaster: &Disaster, adjacency: &AdjacencyIndex) -> Self {
        let span = disaster.time_span();
        let duration = span.duration().num_days();

        DisasterRow {
            date: span.start,
            duration,
            disaster: disaster.disaster_type().to_owned(),
            provinces: disaster
                .place_names(adjacency)
                .into_iter()
                .map(str::to_owned)
                .collect(),
            claims: disaster.total_claims(),
            total_cost: disaster.total_cost(),
            losses_per_day: disaster.total_cost() / duration.max(1) as f64,
        }
    }
}

impl Display for DisasterRow {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "       Disaster: {}", self.disaster)?;
        writeln!(f, "          Start: {}", self.date)?;
        writeln!(f, "       Duration: {} days", self.duration)?;
        writeln!(f, "      Provinces: {}", self.provinces.join(", "))?;
        writeln!(f, "         Claims: {}", self.claims)?;
        writeln!(f, "     Total Cost: {:.2}", self.total_cost)?;
        writeln!(f, " Losses Per Day: {:.2}", self.losses_per_day)
    }
}

/// Summarize every disaster, one row each, in the same order.
pub fn summarize(disasters: &[Disaster], adjacency: &AdjacencyIndex) -> Vec<DisasterRow> {
    disasters
        .iter()
        .map(|d| DisasterRow::from_disaster(d, adjacency))
        .collect()
}

/// The combination of all the events of one theme within one disaster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeRow {
    pub theme: String,
    /// Distinct event locations, sorted.
    #[serde(serialize_with = "columns::json")]
    pub locations: Vec<String>,
    /// Earliest event start.
    pub start_time: NaiveDate,
    /// Latest event end.
    pub end_time: NaiveDate,
    /// Union of the affected sectors, sorted.
    #[serde(serialize_with = "columns::json")]
    pub affected_sectors: Vec<String>,
    /// Distinct ids of the records the events were generated from, sorted.
    #[serde(serialize_with = "columns::json")]
    pub event_ids: Vec<RecordId>,
    /// Mean severity per sector, over the events that scored the sector.
    #[serde(serialize_with = "columns::json")]
    pub severity_ratio: BTreeMap<String, f64>,
    /// Mean answer ratio per question, over the events that answered the question.
    #[serde(serialize_with = "columns::json")]
    pub answer_ratio: BTreeMap<u32, f64>,
}

/**
 * Combine events that share a theme into a single row.
 *
 * # Errors
 * [LinkError::EmptyThemeGroup] if `events` is empty, and [LinkError::InconsistentTheme] if the
 * events don't all have the theme of the first one.
 */
pub fn combine_events(events: &[&ScrapedEvent]) -> Result<ThemeRow, LinkError> {
    let first = events.first().ok_or(LinkError::EmptyThemeGroup)?;
    let theme = first.theme();

    if let Some(odd) = events.iter().find(|e| e.theme() != theme) {
        return Err(LinkError::InconsistentTheme {
            expected: theme.to_owned(),
            found: odd.theme().to_owned(),
        });
    }

    let mut locations = BTreeSet::new();
    let mut sectors = BTreeSet::new();
    let mut ids = BTreeSet::new();
    let mut start_time = first.core().start_time;
    let mut end_time = first.core().end_time;
    let mut severities: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut answers: BTreeMap<u32, Vec<f64>> = BTreeMap::new();

    for event in events {
        let core = event.core();
        locations.insert(core.location.clone());
        ids.insert(core.record_id);
        start_time = start_time.min(core.start_time);
        end_time = end_time.max(core.end_time);

        if let Some(scores) = event.scores() {
            sectors.extend(scores.affected_sectors.iter().cloned());

            for (sector, &value) in &scores.severity_ratio {
                severities.entry(sector.clone()).or_default().push(value);
            }

            for (&question, &value) in &scores.answer_ratio {
                answers.entry(question).or_default().push(value);
            }
        }
    }

    Ok(ThemeRow {
        theme: theme.to_owned(),
        locations: locations.into_iter().collect(),
        start_time,
        end_time,
        affected_sectors: sectors.into_iter().collect(),
        event_ids: ids.into_iter().collect(),
        severity_ratio: mean_by_key(severities),
        answer_ratio: mean_by_key(answers),
    })
}

fn mean_by_key<K: Ord>(values: BTreeMap<K, Vec<f64>>) -> BTreeMap<K, f64> {
    values
        .into_iter()
        .map(|(k, v)| {
            let mean = v.iter().sum::<f64>() / v.len() as f64;
            (k, mean)
        })
        .collect()
}

/**
 * Project disasters into theme rows.
 *
 * For each disaster the events generated from its member records are grouped by theme. Themes
 * come out in the order they first appear in the event table, and each group produces one row.
 * Disasters in the same order as `disasters`.
 */
pub fn project_by_theme(
    disasters: &[Disaster],
    events: &EventTable,
) -> Result<Vec<ThemeRow>, LinkError> {
    let mut rows = vec![];

    for disaster in disasters {
        let mut positions: Vec<usize> = disaster
            .members()
            .iter()
            .flat_map(|&id| events.positions_for(id).iter().copied())
            .collect();
        positions.sort_unstable();

        let mut groups: Vec<(&str, Vec<&ScrapedEvent>)> = vec![];
        for event in positions.into_iter().filter_map(|p| events.get(p)) {
            match groups.iter_mut().find(|(theme, _)| *theme == event.theme()) {
                Some((_, group)) => group.push(event),
                None => groups.push((event.theme(), vec![event])),
            }
        }

        for (_, group) in groups {
            rows.push(combine_events(&group)?);
        }
    }

    Ok(rows)
}

/// Write rows as CSV with a header line.
pub fn write_csv<W: Write, T: Serialize>(rows: &[T], wtr: W) -> DisasterResult<()> {
    let mut wtr = csv::Writer::from_writer(wtr);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;

    Ok(())
}

/// Serializers for columns that don't fit in a single CSV field on their own.
mod columns {
    use serde::{Serialize, Serializer};

    pub fn joined<S: Serializer>(values: &[String], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&values.join(";"))
    }

    pub fn json<T: Serialize, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        s.serialize_str(&text)
    }
}
