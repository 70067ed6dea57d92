//! Device histories to daily station ridership.
//!
//! Histories are ordered and diffed into bounded deltas, low-reporting
//! devices are excluded by a run-wide outlier decision, surviving periods are
//! attributed to a calendar date and summed per station complex.

pub mod aggregate;
pub mod attribution;
pub mod diff;
pub mod outlier;
