//! Per-vehicle-class pattern tables
//!
//! Tables are ordered from most to least trusted; a pattern's position is
//! its index for confidence scoring. Labels tolerate the letter-to-digit
//! rewrites done by normalization (`T0TAL`, `0D0`, `KM5`, `KIL0METER5`).

use crate::vehicle::VehicleClass;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Labels that may precede a reading
const LEADING_LABEL: &str = r"t[o0]ta[l1]|[o0]d[o0]meter|[o0]d[o0]|ki[l1][o0]meter[s5]?|km";

/// Units that may follow a reading
const TRAILING_UNIT: &str = r"ki[l1][o0]meter[s5]?|km[s5]?|k";

/// Shape of a pattern; capture group 1 is always the reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// `TOTAL 45231`, `ODO: 45,231`, `km 4523.7`
    Keyword { min_digits: usize, max_digits: usize },
    /// `45231 km`, `45231kms`
    UnitSuffix { min_digits: usize, max_digits: usize },
    /// `45,231` with no surrounding context
    Grouped,
    /// Any plausible bare digit run
    Bare { min_digits: usize, max_digits: usize },
}

impl PatternKind {
    fn source(&self) -> String {
        match *self {
            Self::Keyword {
                min_digits,
                max_digits,
            } => format!(
                r"(?i)(?:{})\s*[:\-]?\s*({})",
                LEADING_LABEL,
                number(min_digits, max_digits)
            ),
            Self::UnitSuffix {
                min_digits,
                max_digits,
            } => format!(
                r"(?i)({})\s*(?:{})\b",
                number(min_digits, max_digits),
                TRAILING_UNIT
            ),
            Self::Grouped => r"(\d{1,3}(?:,\d{3})+)".to_string(),
            Self::Bare {
                min_digits,
                max_digits,
            } => format!(r"(\d{{{},{}}})", min_digits, max_digits),
        }
    }
}

/// A reading with an optional thousands grouping or 1-3 trailing digits
fn number(min_digits: usize, max_digits: usize) -> String {
    format!(
        r"\d{{1,3}}(?:,\d{{3}})+(?:\.\d{{1,3}})?|\d{{{},{}}}(?:[.,]\d{{1,3}})?",
        min_digits, max_digits
    )
}

const TWO_WHEELER: &[PatternKind] = &[
    PatternKind::Keyword {
        min_digits: 3,
        max_digits: 7,
    },
    PatternKind::UnitSuffix {
        min_digits: 3,
        max_digits: 6,
    },
    PatternKind::Bare {
        min_digits: 4,
        max_digits: 6,
    },
];

const THREE_WHEELER: &[PatternKind] = &[
    PatternKind::Keyword {
        min_digits: 3,
        max_digits: 7,
    },
    PatternKind::UnitSuffix {
        min_digits: 3,
        max_digits: 7,
    },
    PatternKind::Grouped,
    PatternKind::Bare {
        min_digits: 4,
        max_digits: 6,
    },
];

const FOUR_WHEELER: &[PatternKind] = &[
    PatternKind::Keyword {
        min_digits: 3,
        max_digits: 7,
    },
    PatternKind::UnitSuffix {
        min_digits: 3,
        max_digits: 7,
    },
    PatternKind::Grouped,
    PatternKind::Bare {
        min_digits: 4,
        max_digits: 7,
    },
];

/// A compiled extraction pattern
#[derive(Debug)]
pub struct Pattern {
    pub kind: PatternKind,
    pub regex: Regex,
}

fn compile(kinds: &[PatternKind]) -> Vec<Pattern> {
    kinds
        .iter()
        .map(|kind| Pattern {
            kind: *kind,
            regex: Regex::new(&kind.source()).expect("odometer pattern must compile"),
        })
        .collect()
}

/// Ordered patterns for a vehicle class, compiled once
pub fn patterns_for(vehicle_class: VehicleClass) -> &'static [Pattern] {
    static TWO: OnceLock<Vec<Pattern>> = OnceLock::new();
    static THREE: OnceLock<Vec<Pattern>> = OnceLock::new();
    static FOUR: OnceLock<Vec<Pattern>> = OnceLock::new();

    match vehicle_class {
        VehicleClass::TwoWheeler => TWO.get_or_init(|| compile(TWO_WHEELER)),
        VehicleClass::ThreeWheeler => THREE.get_or_init(|| compile(THREE_WHEELER)),
        VehicleClass::FourWheeler => FOUR.get_or_init(|| compile(FOUR_WHEELER)),
    }
}
