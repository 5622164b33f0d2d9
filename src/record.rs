/*!
 * Claim records and the read-only store that indexes them.
 *
 * A [Record] is one aggregated row of the claims data: all the claims for one disaster type in one
 * province over a run of consecutive days.
 */
use crate::{error::LinkError, DisasterResult};
use chrono::{Duration, NaiveDate};
use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::{
    io::{Read, Write},
    path::Path,
};

/// The identifier of a record, stable for the lifetime of a run.
pub type RecordId = u64;

/// A single row of claims data.
///
/// The serialized column names match the records CSV files: `id`, `date`, `disaster`,
/// `province`, `claims`, `total_cost`, and `duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// The first day with claims.
    #[serde(rename = "date")]
    pub start_date: NaiveDate,
    /// The disaster type (cause of the claims).
    #[serde(rename = "disaster")]
    pub disaster_type: String,
    /// The province the claims were filed in.
    #[serde(rename = "province")]
    pub place: String,
    /// The number of claims.
    #[serde(rename = "claims")]
    pub claim_count: u64,
    /// The total cost of all the claims.
    pub total_cost: f64,
    /// The number of days the claims cover.
    #[serde(rename = "duration")]
    pub duration_days: u32,
}

impl Record {
    /// The day the record ends, `start_date + duration_days`.
    ///
    /// Fails with [LinkError::DateOutOfRange] if that day can't be represented.
    pub fn end_date(&self) -> Result<NaiveDate, LinkError> {
        self.start_date
            .checked_add_signed(Duration::days(i64::from(self.duration_days)))
            .ok_or(LinkError::DateOutOfRange(self.id))
    }
}

/// An immutable table of records addressed by id.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    index: HashMap<RecordId, usize>,
}

impl RecordStore {
    /// Build a store, rejecting any repeated record id and any record whose end date is out of
    /// range.
    pub fn new(records: Vec<Record>) -> Result<Self, LinkError> {
        let mut index: HashMap<RecordId, usize> = HashMap::default();
        index.reserve(records.len());

        for (i, record) in records.iter().enumerate() {
            record.end_date()?;

            if index.insert(record.id, i).is_some() {
                return Err(LinkError::DuplicateRecord(record.id));
            }
        }

        Ok(RecordStore { records, index })
    }

    /// Load a store from a records CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> DisasterResult<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(f)
    }

    /// Load a store from records CSV data. Unknown columns are ignored.
    pub fn from_csv_reader<R: Read>(rdr: R) -> DisasterResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);

        let records = rdr
            .deserialize()
            .collect::<Result<Vec<Record>, csv::Error>>()?;

        Ok(Self::new(records)?)
    }

    /// Write the store as records CSV data.
    pub fn write_csv<W: Write>(&self, wtr: W) -> DisasterResult<()> {
        let mut wtr = csv::Writer::from_writer(wtr);
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;

        Ok(())
    }

    /// Get a record by id.
    pub fn get(&self, id: RecordId) -> Result<&Record, LinkError> {
        self.index
            .get(&id)
            .map(|&i| &self.records[i])
            .ok_or(LinkError::UnknownRecord(id))
    }

    /// Get the number of records in the store.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if this store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(id: RecordId, place: &str) -> Record {
        Record {
            id,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            disaster_type: "flood".to_owned(),
            place: place.to_owned(),
            claim_count: 1,
            total_cost: 10.0,
            duration_days: 2,
        }
    }

    #[test]
    fn test_end_date() {
        let r = record(0, "A");
        assert_eq!(r.end_date(), Ok(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()));
    }

    #[test]
    fn test_end_date_out_of_range() {
        let mut r = record(4, "A");
        r.duration_days = u32::MAX;
        assert_eq!(r.end_date(), Err(LinkError::DateOutOfRange(4)));

        let err = RecordStore::new(vec![record(0, "A"), r]).unwrap_err();
        assert_eq!(err, LinkError::DateOutOfRange(4));

        const DATA: &str = concat!(
            "id,date,disaster,province,total_cost,claims,duration\n",
            "9,2019-01-03,INUNDACION,Valencia,1500.5,3,4000000000\n",
        );
        let err = RecordStore::from_csv_reader(DATA.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("record 9"));
    }

    #[test]
    fn test_store_lookup() {
        let store = RecordStore::new(vec![record(7, "A"), record(3, "B")]).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(3).unwrap().place, "B");
        assert_eq!(store.get(7).unwrap().place, "A");
        assert_eq!(store.get(5), Err(LinkError::UnknownRecord(5)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = RecordStore::new(vec![record(1, "A"), record(1, "B")]).unwrap_err();
        assert_eq!(err, LinkError::DuplicateRecord(1));
    }

    #[test]
    fn test_csv_reader() {
        const DATA: &str = concat!(
            "id,date,disaster,province,total_cost,claims,duration,losses_day\n",
            "0,2019-01-03,INUNDACION,Valencia,1500.5,3,2,750.25\n",
            "1,2019-01-04, INUNDACION ,Castellon,99,1,1,99\n",
        );

        let store = RecordStore::from_csv_reader(DATA.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);

        let r = store.get(1).unwrap();
        assert_eq!(r.disaster_type, "INUNDACION");
        assert_eq!(r.place, "Castellon");
        assert_eq!(r.claim_count, 1);
        assert_eq!(r.start_date, NaiveDate::from_ymd_opt(2019, 1, 4).unwrap());
    }
}
