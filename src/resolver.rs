//! Station identity resolution.
//!
//! Maps a reading's device and raw station fields to a station complex, or
//! says why it cannot be counted.

use std::collections::HashSet;

use crate::config::PipelineConfig;
use crate::model::{DeviceKey, RawSite, ReasonCode};
use crate::reference::{ComplexIdx, ReferenceData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The known non-station fare-control location, matched by control area.
    ExcludedControlArea,
    /// The same location, matched by its station label.
    ExcludedStation(String),
    ExcludedDivision(String),
    UnknownRemoteUnit,
    UnmappedStation { station: String, line: String },
}

impl Rejection {
    /// Quarantine reason, or `None` for rejections that are only counted.
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            Rejection::ExcludedControlArea | Rejection::ExcludedStation(_) => {
                Some(ReasonCode::ExcludedControlArea)
            }
            Rejection::ExcludedDivision(_) => None,
            Rejection::UnknownRemoteUnit => Some(ReasonCode::UnknownRemoteUnit),
            Rejection::UnmappedStation { .. } => Some(ReasonCode::UnmappedStation),
        }
    }
}

pub struct Resolver<'a> {
    refs: &'a ReferenceData,
    excluded_control_areas: HashSet<&'a str>,
    excluded_stations: HashSet<&'a str>,
    allowed_divisions: HashSet<&'a str>,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a PipelineConfig, refs: &'a ReferenceData) -> Self {
        Self {
            refs,
            excluded_control_areas: config.excluded_control_areas.iter().map(String::as_str).collect(),
            excluded_stations: config.excluded_stations.iter().map(String::as_str).collect(),
            allowed_divisions: config.allowed_divisions.iter().map(String::as_str).collect(),
        }
    }

    /// The excluded location is checked before the division so it never
    /// passes whatever division the raw data claims for it.
    pub fn resolve(&self, device: &DeviceKey, site: &RawSite) -> Result<ComplexIdx, Rejection> {
        if self.excluded_control_areas.contains(device.control_area.as_str()) {
            return Err(Rejection::ExcludedControlArea);
        }

        let (station, line, division) = match site {
            RawSite::Modern {
                station,
                line,
                division,
            } => (station.as_str(), line.as_str(), division.as_str()),
            RawSite::Legacy => {
                let unit = self
                    .refs
                    .units
                    .lookup(&device.unit, &device.control_area)
                    .ok_or(Rejection::UnknownRemoteUnit)?;
                (unit.station.as_str(), unit.line.as_str(), unit.division.as_str())
            }
        };

        if self.excluded_stations.contains(station) {
            return Err(Rejection::ExcludedStation(station.to_string()));
        }
        if !self.allowed_divisions.contains(division) {
            return Err(Rejection::ExcludedDivision(division.to_string()));
        }

        self.refs
            .crosswalk
            .lookup(station, line)
            .ok_or_else(|| Rejection::UnmappedStation {
                station: station.to_string(),
                line: line.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{Crosswalk, UnitRegistry};

    fn refs() -> ReferenceData {
        let crosswalk = Crosswalk::from_reader(
            "\
STATION,LINENAME,station_id,Complex ID,Complex Name,Daytime Routes
59 ST,NQR456W,59 ST_NQR456W,613,Lexington Av/59 St,N Q R 4 5 6 W
ORCHARD BEACH,6,ORCHARD BEACH_6,999,Orchard Beach,6
"
            .as_bytes(),
        )
        .unwrap();
        let units = UnitRegistry::from_reader(
            "\
Remote,Booth,Station,Line Name,Division
R051,A002,59 ST,NQR456W,BMT
R999,X001,NOWHERE,Q,BMT
"
            .as_bytes(),
        )
        .unwrap();
        ReferenceData { crosswalk, units }
    }

    fn modern(station: &str, line: &str, division: &str) -> RawSite {
        RawSite::Modern {
            station: station.to_string(),
            line: line.to_string(),
            division: division.to_string(),
        }
    }

    #[test]
    fn test_modern_reading_resolves_through_crosswalk() {
        let config = PipelineConfig::default();
        let refs = refs();
        let resolver = Resolver::new(&config, &refs);

        let idx = resolver
            .resolve(&DeviceKey::new("A002", "R051", "02-00-00"), &modern("59 ST", "NQR456W", "BMT"))
            .unwrap();
        assert_eq!(refs.crosswalk.complex(idx).complex_id, "613");
    }

    #[test]
    fn test_legacy_reading_resolves_through_unit_registry() {
        let config = PipelineConfig::default();
        let refs = refs();
        let resolver = Resolver::new(&config, &refs);

        let device = DeviceKey::new("A002", "R051", "02-00-00");
        assert!(resolver.resolve(&device, &RawSite::Legacy).is_ok());

        let unknown = DeviceKey::new("A999", "R051", "02-00-00");
        assert_eq!(resolver.resolve(&unknown, &RawSite::Legacy), Err(Rejection::UnknownRemoteUnit));
    }

    #[test]
    fn test_excluded_location_wins_over_any_division() {
        let config = PipelineConfig::default();
        let refs = refs();
        let resolver = Resolver::new(&config, &refs);

        for division in ["IRT", "BMT", "PTH", ""] {
            let by_station = resolver.resolve(
                &DeviceKey::new("R999", "R999", "00-00-00"),
                &modern("ORCHARD BEACH", "6", division),
            );
            assert_eq!(by_station, Err(Rejection::ExcludedStation("ORCHARD BEACH".to_string())));
            assert_eq!(
                by_station.unwrap_err().reason_code(),
                Some(ReasonCode::ExcludedControlArea)
            );

            let by_control_area = resolver.resolve(
                &DeviceKey::new("OB01", "R459", "00-00-00"),
                &modern("59 ST", "NQR456W", division),
            );
            assert_eq!(by_control_area, Err(Rejection::ExcludedControlArea));
        }
    }

    #[test]
    fn test_non_subway_division_is_counted_not_quarantined() {
        let config = PipelineConfig::default();
        let refs = refs();
        let resolver = Resolver::new(&config, &refs);

        let rejection = resolver
            .resolve(&DeviceKey::new("PTH01", "R540", "00-00-00"), &modern("NEWARK HW BMEBE", "1", "PTH"))
            .unwrap_err();
        assert_eq!(rejection, Rejection::ExcludedDivision("PTH".to_string()));
        assert_eq!(rejection.reason_code(), None);
    }

    #[test]
    fn test_unmapped_station_is_quarantined() {
        let config = PipelineConfig::default();
        let refs = refs();
        let resolver = Resolver::new(&config, &refs);

        let device = DeviceKey::new("R999", "X001", "00-00-00");
        let rejection = resolver.resolve(&device, &modern("NOWHERE", "Q", "BMT")).unwrap_err();
        assert_eq!(rejection.reason_code(), Some(ReasonCode::UnmappedStation));
    }
}
