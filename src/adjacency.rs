/*!
 * The adjacency relation between places.
 *
 * Places (provinces) are interned into dense [PlaceId] values when the index is built, so the
 * hot path of the clustering algorithm only ever compares integers and indexes a flat boolean
 * matrix.
 */
use crate::{error::LinkError, DisasterResult};
use rustc_hash::FxHashMap as HashMap;
use std::{io::Read, path::Path};

/// A dense identifier for a place known to an [AdjacencyIndex].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceId(u32);

impl PlaceId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A symmetric, reflexive relation over a fixed set of places.
///
/// Once built the index is read only, so it can be shared by reference between any number of
/// clustering runs.
#[derive(Debug, Clone)]
pub struct AdjacencyIndex {
    /// Place names, indexed by PlaceId.
    names: Vec<String>,
    /// Reverse lookup from name to PlaceId.
    ids: HashMap<String, PlaceId>,
    /// Row-major matrix of size names.len() x names.len().
    adjacent: Vec<bool>,
}

impl AdjacencyIndex {
    /**
     * Build an index from a square boolean matrix keyed by place names.
     *
     * Row `i` and column `i` of the matrix both belong to `names[i]`. The matrix must be square,
     * symmetric, and have `true` on the whole diagonal, otherwise a
     * [LinkError::MalformedAdjacency] is returned naming the offending place(s).
     */
    pub fn from_matrix(names: Vec<String>, matrix: Vec<Vec<bool>>) -> Result<Self, LinkError> {
        let n = names.len();

        if matrix.len() != n {
            return Err(LinkError::MalformedAdjacency(format!(
                "{} place names but {} matrix rows",
                n,
                matrix.len()
            )));
        }

        let mut ids: HashMap<String, PlaceId> = HashMap::default();
        for (i, name) in names.iter().enumerate() {
            if ids.insert(name.clone(), PlaceId(i as u32)).is_some() {
                return Err(LinkError::MalformedAdjacency(format!(
                    "place listed twice: {}",
                    name
                )));
            }
        }

        let mut adjacent = Vec::with_capacity(n * n);
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != n {
                return Err(LinkError::MalformedAdjacency(format!(
                    "row for {} has {} entries, expected {}",
                    names[i],
                    row.len(),
                    n
                )));
            }
            adjacent.extend_from_slice(row);
        }

        for i in 0..n {
            if !adjacent[i * n + i] {
                return Err(LinkError::MalformedAdjacency(format!(
                    "{} is not adjacent to itself",
                    names[i]
                )));
            }

            for j in (i + 1)..n {
                if adjacent[i * n + j] != adjacent[j * n + i] {
                    return Err(LinkError::MalformedAdjacency(format!(
                        "relation between {} and {} is not symmetric",
                        names[i], names[j]
                    )));
                }
            }
        }

        Ok(AdjacencyIndex {
            names,
            ids,
            adjacent,
        })
    }

    /// Load an adjacency table from a CSV file.
    ///
    /// See [AdjacencyIndex::from_csv_reader] for the layout.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> DisasterResult<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(f)
    }

    /**
     * Load an adjacency table in CSV form.
     *
     * The header row has an (ignored) corner cell followed by the place names. Every following
     * row starts with a place name and then has one cell per header column. Cells are `True` /
     * `False` (any case) or `1` / `0`. Rows may come in any order, but every header place must
     * have exactly one row.
     */
    pub fn from_csv_reader<R: Read>(rdr: R) -> DisasterResult<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(rdr);

        let names: Vec<String> = rdr
            .headers()?
            .iter()
            .skip(1)
            .map(|name| name.trim().to_owned())
            .collect();

        let column_of: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut rows: Vec<Option<Vec<bool>>> = vec![None; names.len()];
        for record in rdr.records() {
            let record = record?;
            let mut fields = record.iter();

            let row_name = fields.next().unwrap_or_default().trim();
            let row_idx = *column_of.get(row_name).ok_or_else(|| {
                LinkError::MalformedAdjacency(format!("row for unlisted place: {}", row_name))
            })?;

            let cells = fields
                .map(|cell| parse_cell(cell, row_name))
                .collect::<Result<Vec<bool>, LinkError>>()?;

            if rows[row_idx].replace(cells).is_some() {
                return Err(LinkError::MalformedAdjacency(format!(
                    "place has more than one row: {}",
                    row_name
                ))
                .into());
            }
        }

        let matrix = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                row.ok_or_else(|| {
                    LinkError::MalformedAdjacency(format!("missing row for place: {}", names[i]))
                })
            })
            .collect::<Result<Vec<_>, LinkError>>()?;

        Ok(Self::from_matrix(names, matrix)?)
    }

    /// Get the number of places in the index.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the index knows no places at all.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over the known place names in PlaceId order.
    pub fn places(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Look up the interned id of a place.
    pub fn place_id(&self, place: &str) -> Result<PlaceId, LinkError> {
        self.ids
            .get(place)
            .copied()
            .ok_or_else(|| LinkError::UnknownPlace(place.to_owned()))
    }

    /// Get the name of an interned place.
    pub fn place_name(&self, id: PlaceId) -> &str {
        &self.names[id.index()]
    }

    /// Check if two named places are adjacent. Every place is adjacent to itself.
    pub fn are_adjacent(&self, place_a: &str, place_b: &str) -> Result<bool, LinkError> {
        let a = self.place_id(place_a)?;
        let b = self.place_id(place_b)?;
        Ok(self.are_adjacent_ids(a, b))
    }

    /// Check if two interned places are adjacent.
    pub fn are_adjacent_ids(&self, a: PlaceId, b: PlaceId) -> bool {
        self.adjacent[a.index() * self.names.len() + b.index()]
    }
}

fn parse_cell(cell: &str, row_name: &str) -> Result<bool, LinkError> {
    let cell = cell.trim();
    if cell.eq_ignore_ascii_case("true") || cell == "1" {
        Ok(true)
    } else if cell.eq_ignore_ascii_case("false") || cell == "0" {
        Ok(false)
    } else {
        Err(LinkError::MalformedAdjacency(format!(
            "invalid cell '{}' in row for {}",
            cell, row_name
        )))
    }
}

/// Build an [AdjacencyIndex] from a list of adjacent pairs.
///
/// The builder keeps the relation symmetric and reflexive itself, so it can never produce a
/// malformed index.
#[derive(Debug, Default)]
pub struct AdjacencyBuilder {
    names: Vec<String>,
    ids: HashMap<String, usize>,
    pairs: Vec<(usize, usize)>,
}

impl AdjacencyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a place with no neighbors (yet).
    pub fn place(mut self, name: &str) -> Self {
        self.intern(name);
        self
    }

    /// Mark two places as adjacent, adding them if they are new.
    pub fn adjacent(mut self, a: &str, b: &str) -> Self {
        let a = self.intern(a);
        let b = self.intern(b);
        self.pairs.push((a, b));
        self
    }

    pub fn build(self) -> AdjacencyIndex {
        let n = self.names.len();
        let mut adjacent = vec![false; n * n];

        for i in 0..n {
            adjacent[i * n + i] = true;
        }

        for (a, b) in self.pairs {
            adjacent[a * n + b] = true;
            adjacent[b * n + a] = true;
        }

        let ids = self
            .ids
            .into_iter()
            .map(|(name, i)| (name, PlaceId(i as u32)))
            .collect();

        AdjacencyIndex {
            names: self.names,
            ids,
            adjacent,
        }
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&i) = self.ids.get(name) {
            return i;
        }

        let i = self.names.len();
        self.names.push(name.to_owned());
        self.ids.insert(name.to_owned(), i);
        i
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_matrix_symmetric_and_reflexive() {
        let idx = AdjacencyIndex::from_matrix(
            names(&["Huesca", "Lleida", "Teruel"]),
            vec![
                vec![true, true, false],
                vec![true, true, false],
                vec![false, false, true],
            ],
        )
        .unwrap();

        for p in ["Huesca", "Lleida", "Teruel"] {
            assert!(idx.are_adjacent(p, p).unwrap());
        }

        assert!(idx.are_adjacent("Huesca", "Lleida").unwrap());
        assert!(idx.are_adjacent("Lleida", "Huesca").unwrap());
        assert!(!idx.are_adjacent("Huesca", "Teruel").unwrap());
        assert!(!idx.are_adjacent("Teruel", "Lleida").unwrap());
    }

    #[test]
    fn test_from_matrix_rejects_malformed() {
        let asymmetric = AdjacencyIndex::from_matrix(
            names(&["A", "B"]),
            vec![vec![true, true], vec![false, true]],
        );
        assert!(matches!(asymmetric, Err(LinkError::MalformedAdjacency(_))));

        let no_diagonal = AdjacencyIndex::from_matrix(
            names(&["A", "B"]),
            vec![vec![true, false], vec![false, false]],
        );
        assert!(matches!(no_diagonal, Err(LinkError::MalformedAdjacency(_))));

        let ragged = AdjacencyIndex::from_matrix(names(&["A", "B"]), vec![vec![true], vec![true]]);
        assert!(matches!(ragged, Err(LinkError::MalformedAdjacency(_))));

        let short = AdjacencyIndex::from_matrix(names(&["A", "B"]), vec![vec![true, false]]);
        assert!(matches!(short, Err(LinkError::MalformedAdjacency(_))));

        let duplicate = AdjacencyIndex::from_matrix(
            names(&["A", "A"]),
            vec![vec![true, true], vec![true, true]],
        );
        assert!(matches!(duplicate, Err(LinkError::MalformedAdjacency(_))));
    }

    #[test]
    fn test_unknown_place() {
        let idx = AdjacencyBuilder::new().adjacent("A", "B").build();

        assert_eq!(
            idx.are_adjacent("A", "Z"),
            Err(LinkError::UnknownPlace("Z".to_owned()))
        );
        assert!(idx.place_id("Z").is_err());
    }

    #[test]
    fn test_builder() {
        let idx = AdjacencyBuilder::new()
            .adjacent("A", "B")
            .adjacent("C", "B")
            .place("D")
            .build();

        assert_eq!(idx.len(), 4);
        assert!(idx.are_adjacent("B", "A").unwrap());
        assert!(idx.are_adjacent("B", "C").unwrap());
        assert!(!idx.are_adjacent("A", "C").unwrap());
        assert!(idx.are_adjacent("D", "D").unwrap());
        assert!(!idx.are_adjacent("D", "A").unwrap());

        let b = idx.place_id("B").unwrap();
        assert_eq!(idx.place_name(b), "B");
    }

    #[test]
    fn test_from_csv_reader() {
        const TABLE: &str = concat!(
            ",Araba,Bizkaia,Gipuzkoa,Navarra\n",
            "Bizkaia,True,True,True,False\n",
            "Araba,True,True,True,True\n",
            "Gipuzkoa,True,True,True,True\n",
            "Navarra,TRUE,false,1,1\n",
        );

        let idx = AdjacencyIndex::from_csv_reader(TABLE.as_bytes()).unwrap();

        assert_eq!(idx.len(), 4);
        assert!(idx.are_adjacent("Araba", "Navarra").unwrap());
        assert!(!idx.are_adjacent("Bizkaia", "Navarra").unwrap());
        assert!(idx.are_adjacent("Navarra", "Gipuzkoa").unwrap());
    }

    #[test]
    fn test_from_csv_reader_missing_row() {
        const TABLE: &str = concat!(",A,B\n", "A,True,False\n");

        let err = AdjacencyIndex::from_csv_reader(TABLE.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing row"));
    }
}
