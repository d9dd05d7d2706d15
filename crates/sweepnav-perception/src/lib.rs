//! `sweepnav-perception` – sweep interpretation.
//!
//! Turns one raw range-sensor sweep into the per-zone blocked/clear picture
//! the decision policy works from.
//!
//! # Modules
//!
//! - [`zones`] – [`ZoneClassifier`][zones::ZoneClassifier]: normalises
//!   bearings and reduces a sweep to the nearest valid obstacle distance in the
//!   front, left and right bands of a configurable
//!   [`ZoneLayout`][zones::ZoneLayout].
//! - [`blocked`] – [`evaluate`][blocked::evaluate]: compares the zone
//!   distances against [`Thresholds`][blocked::Thresholds] to produce
//!   [`BlockedFlags`][sweepnav_types::BlockedFlags].

pub mod blocked;
pub mod zones;

pub use blocked::{Thresholds, evaluate};
pub use zones::{ZoneBand, ZoneClassifier, ZoneLayout, classify, normalize_bearing};
