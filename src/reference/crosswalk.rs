use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::model::StationComplex;

/// Index into the crosswalk's complex arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComplexIdx(pub u32);

#[derive(Debug, Deserialize)]
struct CrosswalkRow {
    #[serde(rename = "STATION")]
    station: String,
    #[serde(rename = "LINENAME")]
    line: String,
    #[serde(rename = "Complex ID")]
    complex_id: String,
    #[serde(rename = "Complex Name", default)]
    complex_name: String,
    #[serde(rename = "Daytime Routes", default)]
    routes: String,
}

/// `STATION` + `LINENAME` to station complex lookup.
///
/// Complexes are stored once; every key points at its arena slot.
#[derive(Debug, Default)]
pub struct Crosswalk {
    complexes: Vec<StationComplex>,
    by_id: HashMap<String, ComplexIdx>,
    by_station: HashMap<String, HashMap<String, ComplexIdx>>,
}

impl Crosswalk {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening station crosswalk {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("loading {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut crosswalk = Crosswalk::default();

        for result in rdr.deserialize() {
            let row: CrosswalkRow = result?;
            if row.complex_id.is_empty() {
                continue;
            }
            let idx = crosswalk.intern(&row);
            crosswalk
                .by_station
                .entry(row.station)
                .or_default()
                .insert(row.line, idx);
        }

        Ok(crosswalk)
    }

    fn intern(&mut self, row: &CrosswalkRow) -> ComplexIdx {
        if let Some(&idx) = self.by_id.get(&row.complex_id) {
            return idx;
        }
        let idx = ComplexIdx(self.complexes.len() as u32);
        self.complexes.push(StationComplex {
            complex_id: row.complex_id.clone(),
            name: row.complex_name.clone(),
            routes: row.routes.clone(),
        });
        self.by_id.insert(row.complex_id.clone(), idx);
        idx
    }

    pub fn lookup(&self, station: &str, line: &str) -> Option<ComplexIdx> {
        self.by_station.get(station)?.get(line).copied()
    }

    pub fn complex(&self, idx: ComplexIdx) -> &StationComplex {
        &self.complexes[idx.0 as usize]
    }

    pub fn find_complex(&self, complex_id: &str) -> Option<ComplexIdx> {
        self.by_id.get(complex_id).copied()
    }

    pub fn complex_count(&self) -> usize {
        self.complexes.len()
    }

    pub fn key_count(&self) -> usize {
        self.by_station.values().map(HashMap::len).sum()
    }
}
