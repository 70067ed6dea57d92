use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct UnitRow {
    #[serde(rename = "Remote")]
    remote: String,
    #[serde(rename = "Booth")]
    booth: String,
    #[serde(rename = "Station")]
    station: String,
    #[serde(rename = "Line Name")]
    line: String,
    #[serde(rename = "Division")]
    division: String,
}

/// Station fields for a legacy device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSite {
    pub station: String,
    pub line: String,
    pub division: String,
}

/// Remote unit + booth to station lookup for pre-cutover rows.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    by_unit: HashMap<String, HashMap<String, UnitSite>>,
}

impl UnitRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening remote-unit registry {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("loading {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut registry = UnitRegistry::default();

        for result in rdr.deserialize() {
            let row: UnitRow = result?;
            registry.by_unit.entry(row.remote).or_default().insert(
                row.booth,
                UnitSite {
                    station: row.station,
                    line: row.line,
                    division: row.division,
                },
            );
        }

        Ok(registry)
    }

    pub fn lookup(&self, unit: &str, control_area: &str) -> Option<&UnitSite> {
        self.by_unit.get(unit)?.get(control_area)
    }

    pub fn len(&self) -> usize {
        self.by_unit.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_unit.is_empty()
    }
}
