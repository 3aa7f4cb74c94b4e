//! Heuristic confidence model for candidate readings
//!
//! Constants are empirically tuned and kept as-is; changing them needs new
//! calibration data.

use crate::vehicle::VehicleClass;
use regex::Regex;
use std::sync::OnceLock;

pub const MIN_CONFIDENCE: u8 = 10;
pub const MAX_CONFIDENCE: u8 = 95;

const BASE_SCORE: i32 = 40;
const ODOMETER_LABEL_BONUS: i32 = 25;
const UNIT_LABEL_BONUS: i32 = 20;
const TYPICAL_DIGITS_BONUS: i32 = 15;
const PATTERN_RANK_STEP: i32 = 5;
const PATTERN_RANK_BASE: i32 = 3;
const IMPLAUSIBLE_VALUE: u32 = 500_000;
const IMPLAUSIBLE_PENALTY: i32 = 20;
const TWO_WHEELER_LIMIT: u32 = 200_000;
const TWO_WHEELER_PENALTY: i32 = 30;
const CONTEXT_BONUS: i32 = 10;

fn odometer_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)t[o0]ta[l1]|[o0]d[o0]").expect("valid regex"))
}

fn unit_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)km|ki[l1][o0]meter[s5]?").expect("valid regex"))
}

fn distance_context() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)di[s5]tance|trave[l1]{1,2}ed").expect("valid regex"))
}

fn digit_count(value: u32) -> usize {
    value.checked_ilog10().map_or(1, |log| log as usize + 1)
}

/// Score a candidate reading, always within [10, 95]
///
/// Pure: the same inputs always yield the same score.
pub fn score(
    matched_text: &str,
    normalized_full_text: &str,
    vehicle_class: VehicleClass,
    pattern_index: usize,
    value: u32,
) -> u8 {
    let mut score = BASE_SCORE;

    if odometer_label().is_match(matched_text) {
        score += ODOMETER_LABEL_BONUS;
    }
    if unit_label().is_match(matched_text) {
        score += UNIT_LABEL_BONUS;
    }
    if vehicle_class.typical_digits().contains(&digit_count(value)) {
        score += TYPICAL_DIGITS_BONUS;
    }

    let rank = i32::try_from(pattern_index).unwrap_or(i32::MAX);
    score = score.saturating_add(
        PATTERN_RANK_STEP.saturating_mul(PATTERN_RANK_BASE.saturating_sub(rank)),
    );

    if value > IMPLAUSIBLE_VALUE {
        score = score.saturating_sub(IMPLAUSIBLE_PENALTY);
    }
    if value > TWO_WHEELER_LIMIT && vehicle_class == VehicleClass::TwoWheeler {
        score = score.saturating_sub(TWO_WHEELER_PENALTY);
    }
    if distance_context().is_match(normalized_full_text) {
        score = score.saturating_add(CONTEXT_BONUS);
    }

    score.clamp(MIN_CONFIDENCE as i32, MAX_CONFIDENCE as i32) as u8
}
