//! Vehicle classes and their per-class tuning constants
//!
//! The vehicle class decides the binarization threshold, which extraction
//! pattern table runs, and the range a plausible odometer reading falls into.

use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Coarse vehicle category supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleClass {
    TwoWheeler,
    ThreeWheeler,
    /// Fallback for anything the caller cannot classify
    #[default]
    FourWheeler,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 3] = [Self::TwoWheeler, Self::ThreeWheeler, Self::FourWheeler];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoWheeler => "two-wheeler",
            Self::ThreeWheeler => "three-wheeler",
            Self::FourWheeler => "four-wheeler",
        }
    }

    /// Grayscale cut-off used during binarization.
    ///
    /// Two-wheeler clusters are small and dim, so a lower threshold keeps
    /// more of their thin digit strokes as ink.
    pub fn threshold(&self) -> u8 {
        match self {
            Self::TwoWheeler => 110,
            Self::ThreeWheeler => 120,
            Self::FourWheeler => 128,
        }
    }

    /// Inclusive range of kilometre values accepted as a reading
    pub fn valid_range(&self) -> RangeInclusive<u32> {
        match self {
            Self::TwoWheeler => 100..=150_000,
            Self::ThreeWheeler => 500..=500_000,
            Self::FourWheeler => 1_000..=999_999,
        }
    }

    /// Digit counts that odometers of this class usually show
    pub fn typical_digits(&self) -> RangeInclusive<usize> {
        match self {
            Self::TwoWheeler => 4..=5,
            Self::ThreeWheeler => 4..=6,
            Self::FourWheeler => 5..=6,
        }
    }

    /// Map a user-facing vehicle type (e.g. "two-wheeler-scooter") to a class.
    ///
    /// Matching is by prefix; anything unrecognised falls back to four-wheeler.
    pub fn from_vehicle_type(vehicle_type: &str) -> Self {
        let normalized = vehicle_type.trim().to_ascii_lowercase().replace('_', "-");

        if normalized.starts_with("two-wheeler") {
            Self::TwoWheeler
        } else if normalized.starts_with("three-wheeler") {
            Self::ThreeWheeler
        } else if normalized.starts_with("four-wheeler") {
            Self::FourWheeler
        } else {
            tracing::warn!(
                "Unknown vehicle type {:?}, falling back to {}",
                vehicle_type,
                Self::FourWheeler
            );
            Self::FourWheeler
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse of the canonical class names
impl FromStr for VehicleClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "two-wheeler" => Ok(Self::TwoWheeler),
            "three-wheeler" => Ok(Self::ThreeWheeler),
            "four-wheeler" => Ok(Self::FourWheeler),
            other => Err(format!("unknown vehicle class: {}", other)),
        }
    }
}
