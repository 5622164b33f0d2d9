/*!
 * Enrichment events produced by the news scraping tools.
 *
 * Every event refers back to the record it was searched for. Events come in two schema versions:
 * version 1 is the bare event that was searched for, version 2 adds the scores from answering the
 * questionnaire against the related news articles.
 */
use crate::{record::RecordId, DisasterResult};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use rustc_hash::FxHashMap as HashMap;
use serde::Deserialize;
use std::{collections::BTreeMap, io::Read, path::Path};
use walkdir::WalkDir;

/// The fields every event has, regardless of schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct EventCore {
    /// The record this event was generated from.
    pub record_id: RecordId,
    /// The search theme, for example the kind of disaster in plain language.
    pub theme: String,
    /// Where the event happened.
    pub location: String,
    pub start_time: NaiveDate,
    pub end_time: NaiveDate,
}

/// Questionnaire results attached to a scored event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionnaireScores {
    /// Sectors (drinking water, transport, ...) the articles said were affected.
    pub affected_sectors: Vec<String>,
    /// Severity score per sector.
    pub severity_ratio: BTreeMap<String, f64>,
    /// Ratio of "yes" answers per question id.
    pub answer_ratio: BTreeMap<u32, f64>,
    /// Ids of the articles the scores were derived from.
    pub sources: Vec<u64>,
}

/// An enrichment event, tagged by schema version.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapedEvent {
    /// Schema version 1.
    Basic(EventCore),
    /// Schema version 2.
    Scored(EventCore, QuestionnaireScores),
}

impl ScrapedEvent {
    pub fn schema_version(&self) -> u8 {
        match self {
            ScrapedEvent::Basic(_) => 1,
            ScrapedEvent::Scored(..) => 2,
        }
    }

    pub fn core(&self) -> &EventCore {
        match self {
            ScrapedEvent::Basic(core) | ScrapedEvent::Scored(core, _) => core,
        }
    }

    pub fn record_id(&self) -> RecordId {
        self.core().record_id
    }

    pub fn theme(&self) -> &str {
        &self.core().theme
    }

    /// Get the questionnaire scores, if this event has them.
    pub fn scores(&self) -> Option<&QuestionnaireScores> {
        match self {
            ScrapedEvent::Basic(_) => None,
            ScrapedEvent::Scored(_, scores) => Some(scores),
        }
    }
}

/// One row of an events CSV file. The list and map columns hold JSON.
#[derive(Debug, Deserialize)]
struct EventCsvRow {
    schema_version: u8,
    record_id: RecordId,
    theme: String,
    location: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    affected_sectors: Option<String>,
    #[serde(default)]
    severity_ratio: Option<String>,
    #[serde(default)]
    answer_ratio: Option<String>,
    #[serde(default)]
    sources: Option<String>,
}

impl EventCsvRow {
    fn into_event(self) -> DisasterResult<ScrapedEvent> {
        let core = EventCore {
            record_id: self.record_id,
            theme: self.theme,
            location: self.location,
            start_time: parse_event_date(&self.start_time)?,
            end_time: parse_event_date(&self.end_time)?,
        };

        match self.schema_version {
            1 => Ok(ScrapedEvent::Basic(core)),
            2 => {
                let record_id = core.record_id;
                let json_column = |column: Option<String>, name: &str| {
                    column.ok_or_else(|| {
                        format!(
                            "schema 2 event for record {} is missing column {}",
                            record_id, name
                        )
                    })
                };

                let scores = QuestionnaireScores {
                    affected_sectors: serde_json::from_str(&json_column(
                        self.affected_sectors,
                        "affected_sectors",
                    )?)?,
                    severity_ratio: serde_json::from_str(&json_column(
                        self.severity_ratio,
                        "severity_ratio",
                    )?)?,
                    answer_ratio: serde_json::from_str(&json_column(
                        self.answer_ratio,
                        "answer_ratio",
                    )?)?,
                    sources: match self.sources {
                        Some(sources) => serde_json::from_str(&sources)?,
                        None => vec![],
                    },
                };

                Ok(ScrapedEvent::Scored(core, scores))
            }
            v => Err(format!(
                "unsupported event schema version {} for record {}",
                v, self.record_id
            )
            .into()),
        }
    }
}

/// Parse a date that may or may not carry a time of day.
fn parse_event_date(text: &str) -> DisasterResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }

    let dt = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map_err(|err| format!("bad event date '{}': {}", text, err))?;
    Ok(dt.date())
}

/// The full set of enrichment events, indexed by the record each one refers to.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    events: Vec<ScrapedEvent>,
    by_record: HashMap<RecordId, Vec<usize>>,
}

impl From<Vec<ScrapedEvent>> for EventTable {
    fn from(events: Vec<ScrapedEvent>) -> Self {
        let mut by_record: HashMap<RecordId, Vec<usize>> = HashMap::default();
        for (i, event) in events.iter().enumerate() {
            by_record.entry(event.record_id()).or_default().push(i);
        }

        EventTable { events, by_record }
    }
}

impl EventTable {
    /// Load events from a single CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> DisasterResult<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        Ok(EventTable::from(read_events(f)?))
    }

    /// Load events from CSV data.
    pub fn from_csv_reader<R: Read>(rdr: R) -> DisasterResult<Self> {
        Ok(EventTable::from(read_events(rdr)?))
    }

    /**
     * Load and concatenate every `*.csv` batch file under a directory.
     *
     * The scraping tools write their output in batches. Files are read in file name order and the
     * combined events are then (stably) sorted by record id. Anything that isn't a CSV file is
     * skipped, but a CSV file that fails to parse is an error.
     */
    pub fn load_batches<P: AsRef<Path>>(dir: P) -> DisasterResult<Self> {
        let mut events = vec![];
        let mut num_files = 0;

        for entry in WalkDir::new(dir.as_ref())
            .min_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_map(|res| res.ok())
            // Ignore directories, WalkDir will take care of recursing into them.
            .filter(|entry| entry.path().is_file())
        {
            let path = entry.path();
            if path.extension().map(|ext| ext != "csv").unwrap_or(true) {
                debug!("Skipping non-CSV file in batch directory: {}", path.display());
                continue;
            }

            let f = std::fs::File::open(path)?;
            let mut batch =
                read_events(f).map_err(|err| format!("{}: {}", path.display(), err))?;
            debug!("Loaded {} events from {}", batch.len(), path.display());

            events.append(&mut batch);
            num_files += 1;
        }

        events.sort_by_key(|e| e.record_id());
        info!("Loaded {} events from {} batch files", events.len(), num_files);

        Ok(EventTable::from(events))
    }

    /// Get the number of events in the table.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if this table is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over all the events in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ScrapedEvent> {
        self.events.iter()
    }

    /// Get the table positions of the events generated from a record.
    pub fn positions_for(&self, record: RecordId) -> &[usize] {
        self.by_record
            .get(&record)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Get the event at a table position.
    pub fn get(&self, position: usize) -> Option<&ScrapedEvent> {
        self.events.get(position)
    }
}

fn read_events<R: Read>(rdr: R) -> DisasterResult<Vec<ScrapedEvent>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(rdr);

    let mut events = vec![];
    for row in rdr.deserialize::<EventCsvRow>() {
        events.push(row?.into_event()?);
    }

    Ok(events)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "schema_version,record_id,theme,location,start_time,end_time,affected_sectors,severity_ratio,answer_ratio,sources\n";

    #[test]
    fn test_read_both_versions() {
        let data = format!(
            "{}{}{}",
            HEADER,
            "1,4,inundacion,Valencia,2019-09-12,2019-09-15,,,,\n",
            concat!(
                r#"2,5,inundacion,Murcia,2019-09-12 00:00:00,2019-09-14 00:00:00,"#,
                r#""[""Transporte""]","{""Transporte"": 0.5}","{""3"": 1.0, ""7"": 0.25}","[1, 2]""#,
                "\n"
            )
        );

        let table = EventTable::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);

        let first = table.get(0).unwrap();
        assert_eq!(first.schema_version(), 1);
        assert_eq!(first.record_id(), 4);
        assert!(first.scores().is_none());

        let second = table.get(1).unwrap();
        assert_eq!(second.schema_version(), 2);
        assert_eq!(
            second.core().end_time,
            NaiveDate::from_ymd_opt(2019, 9, 14).unwrap()
        );

        let scores = second.scores().unwrap();
        assert_eq!(scores.affected_sectors, vec!["Transporte".to_owned()]);
        assert_eq!(scores.severity_ratio.get("Transporte"), Some(&0.5));
        assert_eq!(scores.answer_ratio.get(&7), Some(&0.25));
        assert_eq!(scores.sources, vec![1, 2]);

        assert_eq!(table.positions_for(5), &[1]);
        assert!(table.positions_for(99).is_empty());
    }

    #[test]
    fn test_bad_schema_version() {
        let data = format!("{}{}", HEADER, "9,4,x,Valencia,2019-09-12,2019-09-15,,,,\n");
        let err = EventTable::from_csv_reader(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("schema version 9"));

        let data = format!("{}{}", HEADER, "2,4,x,Valencia,2019-09-12,2019-09-15,,,,\n");
        let err = EventTable::from_csv_reader(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing column"));
    }

    #[test]
    fn test_load_batches() {
        let dir = tempfile::tempdir().unwrap();

        let mut f = std::fs::File::create(dir.path().join("batch_2.csv")).unwrap();
        write!(
            f,
            "{}1,8,b,Murcia,2019-09-12,2019-09-13,,,,\n1,2,b,Murcia,2019-09-12,2019-09-13,,,,\n",
            HEADER
        )
        .unwrap();

        let mut f = std::fs::File::create(dir.path().join("batch_1.csv")).unwrap();
        write!(f, "{}1,5,a,Murcia,2019-09-12,2019-09-13,,,,\n", HEADER).unwrap();

        std::fs::write(dir.path().join(".gitignore"), "*\n").unwrap();

        let table = EventTable::load_batches(dir.path()).unwrap();
        let ids: Vec<RecordId> = table.iter().map(|e| e.record_id()).collect();
        assert_eq!(ids, vec![2, 5, 8]);
    }
}
