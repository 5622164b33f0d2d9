use crate::{
    projector::DisasterRow,
    record::{Record, RecordId, RecordStore},
    DisasterResult,
};
use chrono::NaiveDate;
use log::info;
use rusqlite::{params, Connection, OpenFlags, Statement};
use std::path::Path;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Represents a connection to the database where records and linked disasters are stored.
pub struct DisasterDatabase {
    conn: Connection,
}

impl DisasterDatabase {
    /// Open a connection to the database, creating it and its tables if needed.
    pub fn connect<P: AsRef<Path>>(path: P) -> DisasterResult<Self> {
        let path = path.as_ref();

        let conn = Self::open_database_to_write(path)?;
        Ok(DisasterDatabase { conn })
    }

    fn open_database_to_write(path: &Path) -> DisasterResult<Connection> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("database/create_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(conn)
    }

    /// Store every record, replacing any stored record with the same id.
    ///
    /// Returns the number of records written.
    pub fn add_records(&self, store: &RecordStore) -> DisasterResult<usize> {
        const QUERY: &str = include_str!("database/add_record.sql");

        // Rolls back if dropped before the commit.
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(QUERY)?;

            for r in store.iter() {
                stmt.execute(params![
                    r.id as i64,
                    r.start_date,
                    r.disaster_type,
                    r.place,
                    r.claim_count as i64,
                    r.total_cost,
                    r.duration_days,
                ])?;
                count += 1;
            }
        }
        tx.commit()?;

        info!("Stored {} records", count);
        Ok(count)
    }

    /// Load all the stored records, ordered by id.
    pub fn records(&self) -> DisasterResult<RecordStore> {
        let mut stmt = self.conn.prepare(
            r#"SELECT id, start_date, disaster_type, province, claims, total_cost, duration
               FROM records
               ORDER BY id ASC"#,
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(Record {
                    id: row.get::<_, i64>(0)? as u64,
                    start_date: row.get(1)?,
                    disaster_type: row.get(2)?,
                    place: row.get(3)?,
                    claim_count: row.get::<_, i64>(4)? as u64,
                    total_cost: row.get(5)?,
                    duration_days: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordStore::new(records)?)
    }

    /// Remove all stored disasters and their record associations.
    pub fn clear_disasters(&self) -> DisasterResult<()> {
        self.conn
            .execute_batch(include_str!("database/clear_disasters.sql"))?;
        Ok(())
    }

    /// Prepare to add disasters to the database.
    pub fn prepare_to_add_disasters(&self) -> DisasterResult<DisasterDatabaseAddDisasters<'_>> {
        const ADD_DISASTER_QUERY: &str = include_str!("database/add_disaster.sql");
        const ADD_MEMBER_QUERY: &str = include_str!("database/add_disaster_record.sql");

        let add_disaster_stmt = self.conn.prepare(ADD_DISASTER_QUERY)?;
        let add_member_stmt = self.conn.prepare(ADD_MEMBER_QUERY)?;

        Ok(DisasterDatabaseAddDisasters {
            add_disaster_stmt,
            add_member_stmt,
            conn: &self.conn,
        })
    }

    /// Query the stored disasters, optionally limited to the first `limit` in `sort` order.
    pub fn query_disasters(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> DisasterResult<Vec<StoredDisaster>> {
        let limit = match limit {
            Some(n) => format!("LIMIT {}", n),
            None => String::new(),
        };

        let query = format!(
            r#"SELECT
                 disaster_id,
                 disaster_type,
                 start_date,
                 duration,
                 provinces,
                 claims,
                 total_cost,
                 losses_per_day
               FROM disasters
               ORDER BY {}, disaster_id ASC {}"#,
            sort.order_by(),
            limit
        );

        let mut stmt = self.conn.prepare(&query)?;
        let disasters = stmt
            .query_map([], |row| {
                let provinces: String = row.get(4)?;
                let date: NaiveDate = row.get(2)?;

                Ok(StoredDisaster {
                    disaster_id: row.get(0)?,
                    row: DisasterRow {
                        date,
                        duration: row.get(3)?,
                        disaster: row.get(1)?,
                        provinces: provinces
                            .split(';')
                            .filter(|p| !p.is_empty())
                            .map(str::to_owned)
                            .collect(),
                        claims: row.get::<_, i64>(5)? as u64,
                        total_cost: row.get(6)?,
                        losses_per_day: row.get(7)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(disasters)
    }

    /// Get the ids of the records that make up a stored disaster.
    pub fn disaster_members(&self, disaster_id: i64) -> DisasterResult<Vec<RecordId>> {
        let mut stmt = self.conn.prepare(include_str!("database/query_members.sql"))?;

        let ids = stmt
            .query_map([disaster_id], |row| Ok(row.get::<_, i64>(0)? as u64))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids)
    }
}

/// A disaster row as stored in the database, along with its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDisaster {
    pub disaster_id: i64,
    pub row: DisasterRow,
}

pub struct DisasterDatabaseAddDisasters<'a> {
    add_disaster_stmt: Statement<'a>,
    add_member_stmt: Statement<'a>,
    conn: &'a Connection,
}

impl<'a> DisasterDatabaseAddDisasters<'a> {
    /// Add a batch of disasters and their member record ids in a single transaction.
    ///
    /// Returns the database ids assigned to the disasters, in the same order as `batch`. If any
    /// of the batch fails, none of it is stored.
    pub fn add(&mut self, batch: &[(DisasterRow, Vec<RecordId>)]) -> DisasterResult<Vec<i64>> {
        let tx = self.conn.unchecked_transaction()?;

        let mut ids = Vec::with_capacity(batch.len());
        for (row, members) in batch {
            let disaster_id = self.add_disaster_stmt.insert(params![
                row.disaster,
                row.date,
                row.duration,
                row.provinces.join(";"),
                row.claims as i64,
                row.total_cost,
                row.losses_per_day,
            ])?;

            for &record_id in members {
                self.add_member_stmt
                    .execute(params![disaster_id, record_id as i64])?;
            }

            ids.push(disaster_id);
        }

        tx.commit()?;

        Ok(ids)
    }
}

/// The orders disasters can be queried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SortKey {
    /// Most expensive first.
    TotalCost,
    /// Most claims first.
    Claims,
    /// Longest first.
    Duration,
    /// Highest losses per day first.
    LossesPerDay,
    /// Earliest first.
    Date,
}

impl SortKey {
    fn order_by(self) -> &'static str {
        use SortKey::*;

        match self {
            TotalCost => "total_cost DESC",
            Claims => "claims DESC",
            Duration => "duration DESC",
            LossesPerDay => "losses_per_day DESC",
            Date => "start_date ASC",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    fn row(disaster: &str, day: u32, cost: f64, claims: u64) -> DisasterRow {
        DisasterRow {
            date: NaiveDate::from_ymd_opt(2023, 5, day).unwrap(),
            duration: i64::from(day),
            disaster: disaster.to_owned(),
            provinces: vec!["Huesca".to_owned(), "Zaragoza".to_owned()],
            claims,
            total_cost: cost,
            losses_per_day: cost / f64::from(day),
        }
    }

    #[test]
    fn test_disaster_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = DisasterDatabase::connect(dir.path().join("disasters.sqlite")).unwrap();

        let batch = vec![
            (row("flood", 2, 100.0, 5), vec![0, 3]),
            (row("storm", 4, 500.0, 1), vec![1]),
            (row("flood", 8, 50.0, 9), vec![2, 4, 5]),
        ];

        let ids = db.prepare_to_add_disasters().unwrap().add(&batch).unwrap();
        assert_eq!(ids.len(), 3);

        let by_cost = db.query_disasters(SortKey::TotalCost, None).unwrap();
        assert_eq!(by_cost.len(), 3);
        assert_eq!(by_cost[0].row, batch[1].0);
        assert_eq!(by_cost[2].row, batch[2].0);

        let by_claims = db.query_disasters(SortKey::Claims, Some(1)).unwrap();
        assert_eq!(by_claims.len(), 1);
        assert_eq!(by_claims[0].row.claims, 9);

        let members = db.disaster_members(by_claims[0].disaster_id).unwrap();
        assert_eq!(members, vec![2, 4, 5]);

        db.clear_disasters().unwrap();
        assert!(db.query_disasters(SortKey::Date, None).unwrap().is_empty());
    }

    #[test]
    fn test_failed_batch_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = DisasterDatabase::connect(dir.path().join("disasters.sqlite")).unwrap();
        let mut adder = db.prepare_to_add_disasters().unwrap();

        // The same member twice breaks the primary key of the association table.
        let bad = vec![(row("flood", 2, 100.0, 5), vec![1, 1])];
        assert!(adder.add(&bad).is_err());

        let good = vec![(row("storm", 3, 30.0, 2), vec![2])];
        let ids = adder.add(&good).unwrap();
        assert_eq!(ids.len(), 1);
        drop(adder);

        let stored = db.query_disasters(SortKey::Date, None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].row, good[0].0);
        assert_eq!(db.disaster_members(ids[0]).unwrap(), vec![2]);
    }

    #[test]
    fn test_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = DisasterDatabase::connect(dir.path().join("records.sqlite")).unwrap();

        let records = vec![
            Record {
                id: 9,
                start_date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
                disaster_type: "flood".to_owned(),
                place: "Huesca".to_owned(),
                claim_count: 12,
                total_cost: 1234.56,
                duration_days: 3,
            },
            Record {
                id: 2,
                start_date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
                disaster_type: "storm".to_owned(),
                place: "Teruel".to_owned(),
                claim_count: 1,
                total_cost: 10.0,
                duration_days: 1,
            },
        ];
        let store = RecordStore::new(records.clone()).unwrap();

        assert_eq!(db.add_records(&store).unwrap(), 2);

        let loaded = db.records().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(9).unwrap(), &records[0]);
        assert_eq!(loaded.iter().next().unwrap().id, 2);
    }

    #[test]
    fn test_sort_key_names() {
        assert_eq!(SortKey::from_str("losses-per-day").unwrap(), SortKey::LossesPerDay);
        assert_eq!(SortKey::TotalCost.to_string(), "total-cost");
        assert!(SortKey::from_str("cheapest").is_err());
    }
}
