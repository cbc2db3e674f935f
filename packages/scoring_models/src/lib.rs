#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime category taxonomy, closed query enumerations, and the shared
//! risk-scoring primitives used identically by the snapshot and route
//! scoring call sites.
//!
//! The category table is fixed and seeded once; harm weights and
//! time-of-day multipliers ship with calibrated defaults but are loaded
//! as configuration at startup (see [`HarmWeightTable`]).

pub mod risk;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

pub use risk::{recency_weight, risk, risk_class, safety_score};

/// The fixed, closed crime category taxonomy. Any event whose category is
/// not represented here is normalized to [`CrimeCategory::Other`] before
/// aggregation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CrimeCategory {
    ViolentCrime,
    Burglary,
    Robbery,
    TheftFromThePerson,
    VehicleCrime,
    BicycleTheft,
    Shoplifting,
    OtherTheft,
    CriminalDamageArson,
    Drugs,
    PossessionOfWeapons,
    PublicOrder,
    AntiSocialBehaviour,
    Other,
}

impl CrimeCategory {
    /// Parses a feed-supplied category slug, normalizing anything unknown
    /// to [`CrimeCategory::Other`] per invariant I5.
    #[must_use]
    pub fn from_feed_slug(slug: &str) -> Self {
        slug.parse().unwrap_or(Self::Other)
    }

    /// Calibrated default harm weight, used unless overridden by the
    /// startup-loaded [`HarmWeightTable`].
    #[must_use]
    pub const fn default_harm_weight(self) -> f64 {
        match self {
            Self::ViolentCrime => 3.0,
            Self::Robbery => 2.5,
            Self::Burglary => 2.0,
            Self::TheftFromThePerson => 1.8,
            Self::PossessionOfWeapons => 1.5,
            Self::CriminalDamageArson => 1.4,
            Self::Drugs => 1.3,
            Self::VehicleCrime => 1.2,
            Self::PublicOrder => 1.2,
            Self::OtherTheft => 1.1,
            Self::Other => 1.0,
            Self::Shoplifting | Self::BicycleTheft => 1.0,
            Self::AntiSocialBehaviour => 0.8,
        }
    }

    /// Calibrated default time-of-day multipliers for this category.
    #[must_use]
    pub const fn default_tod_multipliers(self) -> TimeOfDayMultipliers {
        match self {
            Self::ViolentCrime => TimeOfDayMultipliers {
                night: 2.5,
                evening: 1.6,
                day: 0.8,
                morning: 0.6,
            },
            Self::Robbery => TimeOfDayMultipliers {
                night: 2.2,
                evening: 1.8,
                day: 0.7,
                morning: 0.5,
            },
            Self::AntiSocialBehaviour => TimeOfDayMultipliers {
                night: 1.8,
                evening: 1.9,
                day: 0.7,
                morning: 0.4,
            },
            Self::Burglary => TimeOfDayMultipliers {
                night: 1.3,
                evening: 1.1,
                day: 1.0,
                morning: 0.9,
            },
            Self::VehicleCrime | Self::BicycleTheft => TimeOfDayMultipliers {
                night: 1.4,
                evening: 1.1,
                day: 0.9,
                morning: 0.8,
            },
            Self::Drugs | Self::PublicOrder => TimeOfDayMultipliers {
                night: 1.5,
                evening: 1.4,
                day: 0.8,
                morning: 0.6,
            },
            Self::TheftFromThePerson | Self::OtherTheft | Self::Shoplifting => {
                TimeOfDayMultipliers {
                    night: 0.7,
                    evening: 1.1,
                    day: 1.3,
                    morning: 1.0,
                }
            }
            Self::PossessionOfWeapons => TimeOfDayMultipliers {
                night: 1.9,
                evening: 1.4,
                day: 0.7,
                morning: 0.6,
            },
            Self::CriminalDamageArson => TimeOfDayMultipliers {
                night: 1.7,
                evening: 1.3,
                day: 0.8,
                morning: 0.7,
            },
            Self::Other => TimeOfDayMultipliers {
                night: 1.0,
                evening: 1.0,
                day: 1.0,
                morning: 1.0,
            },
        }
    }

    /// All taxonomy members, in declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ViolentCrime,
            Self::Burglary,
            Self::Robbery,
            Self::TheftFromThePerson,
            Self::VehicleCrime,
            Self::BicycleTheft,
            Self::Shoplifting,
            Self::OtherTheft,
            Self::CriminalDamageArson,
            Self::Drugs,
            Self::PossessionOfWeapons,
            Self::PublicOrder,
            Self::AntiSocialBehaviour,
            Self::Other,
        ]
    }
}

/// Per-category multiplier for each of the four diurnal buckets in §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDayMultipliers {
    pub night: f64,
    pub morning: f64,
    pub day: f64,
    pub evening: f64,
}

impl TimeOfDayMultipliers {
    #[must_use]
    pub const fn get(&self, tod: TimeOfDay) -> f64 {
        match tod {
            TimeOfDay::Night => self.night,
            TimeOfDay::Morning => self.morning,
            TimeOfDay::Day => self.day,
            TimeOfDay::Evening => self.evening,
        }
    }
}

/// The closed enumeration of query-side time-of-day buckets.
///
/// Derived from a local-time hour `h`: `night` is `h < 6 || h >= 23`,
/// `morning` is `6..10`, `day` is `10..18`, `evening` is `18..23`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeOfDay {
    Night,
    Morning,
    Day,
    Evening,
}

impl TimeOfDay {
    /// Maps a local-time hour (0-23) to its diurnal bucket.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 | 23 => Self::Night,
            6..=9 => Self::Morning,
            10..=17 => Self::Day,
            _ => Self::Evening,
        }
    }
}

/// `low` / `medium` / `high` risk classification derived from the safety
/// score: `low` if `safety >= 75`, `medium` if `50 <= safety < 75`,
/// otherwise `high`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskClass {
    Low,
    Medium,
    High,
}

impl RiskClass {
    #[must_use]
    pub const fn from_safety_score(safety: f64) -> Self {
        if safety >= 75.0 {
            Self::Low
        } else if safety >= 50.0 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// A validated `lookback_months` query parameter, bounded to `[1, 24]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookbackMonths(u8);

impl LookbackMonths {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 24;
    pub const DEFAULT: Self = Self(12);

    /// # Errors
    ///
    /// Returns [`ScoringError::InvalidLookback`] if `value` falls outside
    /// `[1, 24]`.
    pub const fn new(value: u8) -> Result<Self, ScoringError> {
        if value < Self::MIN || value > Self::MAX {
            return Err(ScoringError::InvalidLookback { value });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for LookbackMonths {
    type Error = ScoringError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A per-category multiplicative override supplied by a route-score
/// caller, applied after the harm weight (§4.6).
pub type CategoryOverrides = BTreeMap<CrimeCategory, f64>;

/// Startup-loaded harm weight configuration. Ships with
/// [`CrimeCategory::default_harm_weight`] defaults; an operator can
/// override individual entries without touching code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HarmWeightTable(BTreeMap<CrimeCategory, f64>);

impl HarmWeightTable {
    /// Builds the table from the calibrated defaults in
    /// [`CrimeCategory::default_harm_weight`].
    #[must_use]
    pub fn defaults() -> Self {
        Self(
            CrimeCategory::all()
                .iter()
                .map(|&category| (category, category.default_harm_weight()))
                .collect(),
        )
    }

    /// Applies operator overrides on top of the calibrated defaults.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &BTreeMap<CrimeCategory, f64>) -> Self {
        for (&category, &weight) in overrides {
            self.0.insert(category, weight);
        }
        self
    }

    #[must_use]
    pub fn get(&self, category: CrimeCategory) -> f64 {
        self.0
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_harm_weight())
    }
}

impl Default for HarmWeightTable {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Errors raised by the scoring primitives at the request boundary.
///
/// These compose into `saferoute_database_models::EngineError::InvalidInput`
/// at each crate's public entry point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("lookback_months must be in [{}, {}], got {value}", LookbackMonths::MIN, LookbackMonths::MAX)]
    InvalidLookback { value: u8 },

    #[error("unknown time_of_day: {value}")]
    InvalidTimeOfDay { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_normalizes_to_other() {
        assert_eq!(CrimeCategory::from_feed_slug("not-a-real-category"), CrimeCategory::Other);
        assert_eq!(CrimeCategory::from_feed_slug("violent-crime"), CrimeCategory::ViolentCrime);
    }

    #[test]
    fn harm_weights_match_spec_examples() {
        assert!((CrimeCategory::ViolentCrime.default_harm_weight() - 3.0).abs() < 1e-9);
        assert!((CrimeCategory::Burglary.default_harm_weight() - 2.0).abs() < 1e-9);
        assert!((CrimeCategory::Robbery.default_harm_weight() - 2.5).abs() < 1e-9);
        assert!((CrimeCategory::TheftFromThePerson.default_harm_weight() - 1.8).abs() < 1e-9);
        assert!((CrimeCategory::AntiSocialBehaviour.default_harm_weight() - 0.8).abs() < 1e-9);
        assert!((CrimeCategory::Other.default_harm_weight() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tod_bucket_boundaries() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(9), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(10), TimeOfDay::Day);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Day);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
    }

    #[test]
    fn lookback_bounds() {
        assert!(LookbackMonths::new(0).is_err());
        assert!(LookbackMonths::new(25).is_err());
        assert!(LookbackMonths::new(1).is_ok());
        assert!(LookbackMonths::new(24).is_ok());
        assert_eq!(LookbackMonths::DEFAULT.get(), 12);
    }

    #[test]
    fn risk_class_thresholds() {
        assert_eq!(RiskClass::from_safety_score(100.0), RiskClass::Low);
        assert_eq!(RiskClass::from_safety_score(75.0), RiskClass::Low);
        assert_eq!(RiskClass::from_safety_score(74.9), RiskClass::Medium);
        assert_eq!(RiskClass::from_safety_score(50.0), RiskClass::Medium);
        assert_eq!(RiskClass::from_safety_score(49.9), RiskClass::High);
        assert_eq!(RiskClass::from_safety_score(0.0), RiskClass::High);
    }

    #[test]
    fn harm_weight_table_overrides_defaults() {
        let table = HarmWeightTable::defaults();
        assert!((table.get(CrimeCategory::ViolentCrime) - 3.0).abs() < 1e-9);

        let mut overrides = BTreeMap::new();
        overrides.insert(CrimeCategory::ViolentCrime, 5.0);
        let overridden = HarmWeightTable::defaults().with_overrides(&overrides);
        assert!((overridden.get(CrimeCategory::ViolentCrime) - 5.0).abs() < 1e-9);
        assert!((overridden.get(CrimeCategory::Burglary) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn all_categories_have_a_tod_table() {
        for category in CrimeCategory::all() {
            let tod = category.default_tod_multipliers();
            assert!(tod.night >= 0.0);
            assert!(tod.morning >= 0.0);
            assert!(tod.day >= 0.0);
            assert!(tod.evening >= 0.0);
        }
    }
}
