/*!
 * Aggregate individual insurance claims into records.
 *
 * The raw expedients list one claim per row. Claims are first summed per day, province, and
 * disaster type. Then, for each province and disaster type, runs of consecutive days are joined
 * into a single [Record] whose duration is the number of days in the run.
 */
use crate::{record::Record, DisasterResult};
use chrono::{Duration, NaiveDate};
use log::warn;
use serde::Deserialize;
use std::{collections::BTreeMap, io::Read, path::Path};
use unicode_normalization::UnicodeNormalization;

/// A single raw claim.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub date: NaiveDate,
    pub disaster_type: String,
    pub place: String,
    pub cost: f64,
}

/// A row of the raw expedients export, with its original column names.
#[derive(Debug, Deserialize)]
struct RawClaimRow {
    #[serde(rename = "FECHA SINIESTRO")]
    date: String,
    #[serde(rename = "CAUSA SINIESTRO")]
    disaster: String,
    #[serde(rename = "PROVINCIA")]
    province: String,
    #[serde(rename = "COSTE TOTAL")]
    total_cost: String,
}

impl Claim {
    /// Load the raw expedients export, a `;` separated CSV file.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> DisasterResult<Vec<Claim>> {
        let f = std::fs::File::open(path.as_ref())?;
        Self::load_csv_reader(f)
    }

    /**
     * Load raw expedients from a reader.
     *
     * Dates are day first (`dd/mm/yyyy`). Costs use `.` as a thousands separator and `,` as the
     * decimal separator. A claim with a cost that can't be parsed still counts as a claim, with a
     * cost of zero and a warning, but a bad date is an error. Province names are cleaned up with
     * [normalize_province].
     */
    pub fn load_csv_reader<R: Read>(rdr: R) -> DisasterResult<Vec<Claim>> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_reader(rdr);

        let mut claims = vec![];
        for (line, row) in rdr.deserialize::<RawClaimRow>().enumerate() {
            let row = row?;

            let date = NaiveDate::parse_from_str(&row.date, "%d/%m/%Y")
                .map_err(|err| format!("bad claim date '{}': {}", row.date, err))?;

            let cost = match parse_cost(&row.total_cost) {
                Some(cost) => cost,
                None => {
                    warn!(
                        "Claim on data row {} has an invalid cost, counting it as 0: '{}'",
                        line + 1,
                        row.total_cost
                    );
                    0.0
                }
            };

            claims.push(Claim {
                date,
                disaster_type: row.disaster,
                place: normalize_province(&row.province),
                cost,
            });
        }

        Ok(claims)
    }
}

/// Province names in the expedients export that differ from the usual names.
const PROVINCE_RENAMES: &[(&str, &str)] = &[
    ("Alicante/Alacant", "Alicante"),
    ("Araba/Álava", "Araba"),
    ("Balears, Illes", "Illes Balears"),
    ("Coruña, A", "A Coruña"),
    ("Rioja, La", "La Rioja"),
    ("Palmas, Las", "Las Palmas"),
    ("Castellón/Castelló", "Castellón"),
    ("Valencia/València", "Valencia"),
];

/**
 * Clean up a province name from the expedients export.
 *
 * Bilingual and inverted names are replaced with a single common name, then accents are stripped
 * so only ASCII is left, for example `Castellón/Castelló` becomes `Castellon`.
 */
pub fn normalize_province(raw: &str) -> String {
    let name = raw.trim();
    let name = PROVINCE_RENAMES
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name);

    name.nfkd().filter(char::is_ascii).collect()
}

fn parse_cost(cost: &str) -> Option<f64> {
    let normalized: String = cost
        .chars()
        .filter(|&c| c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    normalized.parse().ok()
}

/**
 * Collapse claims into records.
 *
 * The records are ordered by province, then disaster type, then start date, and their ids are
 * assigned sequentially from zero in that order. Daily totals are rounded to cents before they
 * are summed into runs.
 */
pub fn aggregate_claims(claims: Vec<Claim>) -> Vec<Record> {
    // (place, disaster type, date) -> (cost, count)
    let mut daily: BTreeMap<(String, String, NaiveDate), (f64, u64)> = BTreeMap::new();
    for Claim {
        date,
        disaster_type,
        place,
        cost,
    } in claims
    {
        let entry = daily.entry((place, disaster_type, date)).or_insert((0.0, 0));
        entry.0 += cost;
        entry.1 += 1;
    }

    let mut records: Vec<Record> = vec![];
    for ((place, disaster_type, date), (cost, count)) in daily {
        let cost = (cost * 100.0).round() / 100.0;

        if let Some(last) = records.last_mut() {
            if last.place == place
                && last.disaster_type == disaster_type
                && last
                    .start_date
                    .checked_add_signed(Duration::days(i64::from(last.duration_days)))
                    == Some(date)
            {
                last.duration_days += 1;
                last.claim_count += count;
                last.total_cost += cost;
                continue;
            }
        }

        records.push(Record {
            id: records.len() as u64,
            start_date: date,
            disaster_type,
            place,
            claim_count: count,
            total_cost: cost,
            duration_days: 1,
        });
    }

    records
}

#[cfg(test)]
mod test {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 9, d).unwrap()
    }

    fn claim(d: u32, place: &str, disaster: &str, cost: f64) -> Claim {
        Claim {
            date: day(d),
            disaster_type: disaster.to_owned(),
            place: place.to_owned(),
            cost,
        }
    }

    #[test]
    fn test_consecutive_days_join() {
        let claims = vec![
            claim(12, "Murcia", "flood", 100.0),
            claim(13, "Murcia", "flood", 50.0),
            claim(12, "Murcia", "flood", 25.0),
            claim(14, "Murcia", "flood", 5.0),
        ];

        let records = aggregate_claims(claims);
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.start_date, day(12));
        assert_eq!(r.duration_days, 3);
        assert_eq!(r.end_date().unwrap(), day(15));
        assert_eq!(r.claim_count, 4);
        assert!((r.total_cost - 180.0).abs() < 1.0e-9);
    }

    #[test]
    fn test_gap_day_splits_runs() {
        let claims = vec![
            claim(1, "Murcia", "flood", 1.0),
            claim(2, "Murcia", "flood", 1.0),
            claim(4, "Murcia", "flood", 1.0),
        ];

        let records = aggregate_claims(claims);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].duration_days, 2);
        assert_eq!(records[1].start_date, day(4));
        assert_eq!(records[1].duration_days, 1);
        assert_eq!(records[1].id, 1);
    }

    #[test]
    fn test_runs_split_by_place_and_type() {
        let claims = vec![
            claim(1, "Murcia", "flood", 1.0),
            claim(2, "Alicante", "flood", 1.0),
            claim(2, "Murcia", "storm", 1.0),
        ];

        let records = aggregate_claims(claims);
        assert_eq!(records.len(), 3);

        // Sorted by place, then type.
        assert_eq!(records[0].place, "Alicante");
        assert_eq!(records[1].disaster_type, "flood");
        assert_eq!(records[2].disaster_type, "storm");
        assert!(records.iter().all(|r| r.duration_days == 1));
    }

    #[test]
    fn test_load_raw_claims() {
        const DATA: &str = concat!(
            "ID RMC;FECHA SINIESTRO;CAUSA SINIESTRO;PROVINCIA; COSTE TOTAL \n",
            "1;03/01/2019;INUNDACION;Valencia;1.234,50\n",
            "2;04/01/2019;INUNDACION;Valencia;n/a\n",
            "3;04/01/2019;INUNDACION;Valencia;66\n",
        );

        let claims = Claim::load_csv_reader(DATA.as_bytes()).unwrap();
        assert_eq!(claims.len(), 3);
        assert_eq!(claims[0].date, NaiveDate::from_ymd_opt(2019, 1, 3).unwrap());
        assert!((claims[0].cost - 1234.5).abs() < 1.0e-9);
        // The unparseable cost still counts as a claim.
        assert_eq!(claims[1].cost, 0.0);

        let records = aggregate_claims(claims);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_days, 2);
        assert_eq!(records[0].claim_count, 3);
        assert!((records[0].total_cost - 1300.5).abs() < 1.0e-9);
    }

    #[test]
    fn test_normalize_province() {
        assert_eq!(normalize_province("Valencia/València"), "Valencia");
        assert_eq!(normalize_province("Alicante/Alacant"), "Alicante");
        assert_eq!(normalize_province("Coruña, A"), "A Coruna");
        assert_eq!(normalize_province("Balears, Illes"), "Illes Balears");
        assert_eq!(normalize_province("Castellón/Castelló"), "Castellon");
        assert_eq!(normalize_province(" Cádiz "), "Cadiz");
        assert_eq!(normalize_province("Málaga"), "Malaga");
        assert_eq!(normalize_province("Murcia"), "Murcia");
    }

    #[test]
    fn test_loaded_provinces_are_normalized() {
        const DATA: &str = concat!(
            "FECHA SINIESTRO;CAUSA SINIESTRO;PROVINCIA; COSTE TOTAL \n",
            "03/01/2019;INUNDACION;Valencia/València;10,00\n",
            "04/01/2019;INUNDACION;Valencia;5,00\n",
        );

        let claims = Claim::load_csv_reader(DATA.as_bytes()).unwrap();
        assert!(claims.iter().all(|c| c.place == "Valencia"));

        let records = aggregate_claims(claims);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_days, 2);
    }
}
