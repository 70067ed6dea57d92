//! Static reference data.
//!
//! [`Crosswalk`] maps a raw `STATION` + `LINENAME` pair to its station complex.
//! [`UnitRegistry`] supplies the station fields that legacy rows lack, keyed
//! by remote unit and booth (control area).
//!
//! Both are loaded once per run and shared read-only by every stage.

mod crosswalk;
mod units;

pub use crosswalk::{ComplexIdx, Crosswalk};
pub use units::{UnitRegistry, UnitSite};

use anyhow::Result;
use tracing::{info, warn};

use crate::config::PipelineConfig;

pub struct ReferenceData {
    pub crosswalk: Crosswalk,
    pub units: UnitRegistry,
}

impl ReferenceData {
    /// Loads the crosswalk (required) and the remote-unit registry (optional;
    /// only legacy files need it).
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let crosswalk = Crosswalk::load(&config.crosswalk_path)?;
        let units = if config.units_path.exists() {
            UnitRegistry::load(&config.units_path)?
        } else {
            warn!(
                path = %config.units_path.display(),
                "Remote-unit registry not found"
            );
            UnitRegistry::default()
        };
        if units.is_empty() {
            warn!("Remote-unit registry is empty; legacy devices will be quarantined");
        }
        info!(
            complexes = crosswalk.complex_count(),
            crosswalk_keys = crosswalk.key_count(),
            units = units.len(),
            "Reference data loaded"
        );
        Ok(Self { crosswalk, units })
    }
}
