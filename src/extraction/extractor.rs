use super::confidence;
use super::normalize::normalize;
use super::patterns::patterns_for;
use crate::vehicle::VehicleClass;
use serde::Serialize;

/// Confidence a reading needs to count as confirmed (strictly greater)
pub const ACCEPTANCE_THRESHOLD: u8 = 30;

/// One possible kilometre reading found in recognized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMatch {
    pub value: u32,
    /// Exact substring the pattern matched
    pub original_text: String,
    pub confidence: u8,
    /// Position of the producing pattern; lower is more trusted
    pub pattern_index: usize,
}

/// How a caller should treat an extraction result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    /// Confidence above the acceptance threshold
    Confirmed,
    /// A best guess exists but should not be trusted on its own
    LowConfidence,
    NotFound,
}

impl ReadingStatus {
    pub fn from_candidate(candidate: Option<&CandidateMatch>) -> Self {
        match candidate {
            Some(c) if c.confidence > ACCEPTANCE_THRESHOLD => Self::Confirmed,
            Some(_) => Self::LowConfidence,
            None => Self::NotFound,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        *self == Self::Confirmed
    }
}

/// Every surviving candidate for one piece of text, best first
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub normalized_text: String,
    pub candidates: Vec<CandidateMatch>,
}

impl Extraction {
    pub fn best(&self) -> Option<&CandidateMatch> {
        self.candidates.first()
    }

    pub fn status(&self) -> ReadingStatus {
        ReadingStatus::from_candidate(self.best())
    }
}

/// Extract the most likely kilometre reading from recognized text
pub fn extract(text: &str, vehicle_class: VehicleClass) -> Option<CandidateMatch> {
    select_best(analyze(text, vehicle_class).candidates)
}

/// Normalize, match, validate and score; candidates come back best first
pub fn analyze(text: &str, vehicle_class: VehicleClass) -> Extraction {
    let normalized_text = normalize(text);
    let mut candidates = find_candidates(&normalized_text, vehicle_class);
    rank(&mut candidates);

    tracing::debug!(
        "Extracted {} candidate(s) for {} from {:?}",
        candidates.len(),
        vehicle_class,
        normalized_text
    );

    Extraction {
        normalized_text,
        candidates,
    }
}

/// Highest confidence wins; the earliest candidate wins a tie
pub fn select_best(mut candidates: Vec<CandidateMatch>) -> Option<CandidateMatch> {
    rank(&mut candidates);
    candidates.into_iter().next()
}

/// Stable sort, so equal scores keep encounter order
fn rank(candidates: &mut [CandidateMatch]) {
    candidates.sort_by(|a, b| b.confidence.cmp(&a.confidence));
}

fn find_candidates(normalized: &str, vehicle_class: VehicleClass) -> Vec<CandidateMatch> {
    let range = vehicle_class.valid_range();
    let mut candidates = Vec::new();

    for (pattern_index, pattern) in patterns_for(vehicle_class).iter().enumerate() {
        for caps in pattern.regex.captures_iter(normalized) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            if !is_whole_number(normalized, number.start(), number.end()) {
                continue;
            }

            let Some(value) = parse_reading(number.as_str()) else {
                continue;
            };
            if !range.contains(&value) {
                tracing::trace!("Discarding {} outside {:?}", value, range);
                continue;
            }

            let original_text = whole.as_str().trim().to_string();
            let confidence = confidence::score(
                &original_text,
                normalized,
                vehicle_class,
                pattern_index,
                value,
            );

            candidates.push(CandidateMatch {
                value,
                original_text,
                confidence,
                pattern_index,
            });
        }
    }

    candidates
}

/// True when the digits at `start..end` are not glued to further digits
///
/// A number right after `<digit>,` is the tail of a badly grouped figure.
fn is_whole_number(text: &str, start: usize, end: usize) -> bool {
    let mut before = text[..start].chars().rev();
    let glued_before = match before.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some(',') => before.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    };
    let glued_after = text[end..].chars().next().is_some_and(|c| c.is_ascii_digit());
    !glued_before && !glued_after
}

/// Parse a matched reading: commas and spaces are grouping, `.` starts a fraction
fn parse_reading(digits: &str) -> Option<u32> {
    let stripped: String = digits
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let integer_part = stripped
        .split_once('.')
        .map_or(stripped.as_str(), |(integer, _)| integer);
    integer_part.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(value: u32, confidence: u8, pattern_index: usize) -> CandidateMatch {
        CandidateMatch {
            value,
            original_text: value.to_string(),
            confidence,
            pattern_index,
        }
    }

    #[test]
    fn test_labelled_reading_with_unit() {
        let result = extract("TOTAL 45231 KM", VehicleClass::FourWheeler).unwrap();
        assert_eq!(result.value, 45231);
        assert!(result.confidence >= 80, "confidence {}", result.confidence);
        assert_eq!(result.pattern_index, 0);
    }

    #[test]
    fn test_confused_bare_digits() {
        let extraction = analyze("8834O", VehicleClass::TwoWheeler);
        assert_eq!(extraction.normalized_text, "88340");

        let result = extraction.best().unwrap();
        assert_eq!(result.value, 88340);
        assert_eq!(result.pattern_index, 2);
        assert!((40..=60).contains(&result.confidence));
    }

    #[test]
    fn test_oversized_number_yields_nothing() {
        for class in VehicleClass::ALL {
            assert_eq!(extract("999999999 random noise", class), None, "{}", class);
        }
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let extraction = analyze("", VehicleClass::FourWheeler);
        assert!(extraction.candidates.is_empty());
        assert_eq!(extraction.status(), ReadingStatus::NotFound);
        assert_eq!(extract("", VehicleClass::TwoWheeler), None);
    }

    #[test]
    fn test_higher_confidence_wins_regardless_of_pattern_order() {
        let best = select_best(vec![candidate(1111, 71, 0), candidate(2222, 72, 3)]).unwrap();
        assert_eq!(best.value, 2222);
        assert_eq!(best.confidence, 72);
    }

    #[test]
    fn test_first_found_wins_on_tie() {
        let best = select_best(vec![
            candidate(1111, 60, 2),
            candidate(2222, 60, 0),
            candidate(3333, 55, 0),
        ])
        .unwrap();
        assert_eq!(best.value, 1111);
    }

    #[test]
    fn test_all_patterns_run_over_full_text() {
        let extraction = analyze("ODO 12345 trip 234.5 km 54321", VehicleClass::TwoWheeler);
        let values: Vec<u32> = extraction.candidates.iter().map(|c| c.value).collect();

        assert!(values.contains(&12345));
        assert!(values.contains(&234));
        assert!(values.contains(&54321));
        assert_eq!(extraction.best().unwrap().value, 12345);
    }

    #[test]
    fn test_values_outside_class_range_are_dropped() {
        // 160000 is fine for a three-wheeler but too high for a two-wheeler
        assert_eq!(extract("160000", VehicleClass::TwoWheeler), None);
        assert_eq!(extract("160000", VehicleClass::ThreeWheeler).unwrap().value, 160000);
        // 800 is too low for a four-wheeler
        assert_eq!(extract("ODO 800", VehicleClass::FourWheeler), None);
        assert_eq!(extract("ODO 800", VehicleClass::ThreeWheeler).unwrap().value, 800);
    }

    #[test]
    fn test_candidates_always_within_range() {
        let texts = [
            "TOTAL 45231 KM distance 99 1,234,567 12 123456789",
            "ODO: 4,5231 km 150001 149999 100 99",
            "| 2 3 | 5 OO S 7000000 500001 km",
            "kilometers 0999 k 1000 k 999999 1000000",
        ];
        for class in VehicleClass::ALL {
            let range = class.valid_range();
            for text in texts {
                for c in analyze(text, class).candidates {
                    assert!(range.contains(&c.value), "{} out of range for {}", c.value, class);
                }
            }
        }
    }

    #[test]
    fn test_thousands_separator_and_fraction() {
        let result = extract("ODO: 45,231", VehicleClass::FourWheeler).unwrap();
        assert_eq!(result.value, 45231);

        let result = extract("45231.7 km", VehicleClass::FourWheeler).unwrap();
        assert_eq!(result.value, 45231);
        assert_eq!(result.original_text, "45231.7 km");
    }

    #[test]
    fn test_digits_glued_to_longer_runs_are_ignored() {
        // A 7 digit run must not be read as its first 6 digits
        assert_eq!(extract("1234567", VehicleClass::TwoWheeler), None);
    }

    #[test]
    fn test_tail_of_misgrouped_number_is_ignored() {
        assert!(analyze("4,5231 km", VehicleClass::FourWheeler).candidates.is_empty());
        assert_eq!(extract("ODO 45,231", VehicleClass::FourWheeler).unwrap().value, 45231);
        // A comma that follows a word is punctuation, not grouping
        assert_eq!(extract("km, 45231", VehicleClass::FourWheeler).unwrap().value, 45231);
    }

    #[test]
    fn test_later_pattern_outscores_earlier_match() {
        let extraction = analyze("km 4523 45231 km", VehicleClass::FourWheeler);

        let scored: Vec<(u32, u8, usize)> = extraction
            .candidates
            .iter()
            .map(|c| (c.value, c.confidence, c.pattern_index))
            .collect();
        // 40 + 20 (unit) + 15 (5 digits) + 10 (index 1)
        assert_eq!(scored[0], (45231, 85, 1));
        // 40 + 20 (km label) + 0 (4 digits) + 15 (index 0)
        assert_eq!(scored[1], (4523, 75, 0));

        let best = extract("km 4523 45231 km", VehicleClass::FourWheeler).unwrap();
        assert_eq!(best.value, 45231);
        assert_eq!(best.confidence, 85);
        assert_eq!(best.original_text, "45231 km");
    }

    #[test]
    fn test_uppercase_kilometre_labels() {
        let suffixed = extract("12345 KILOMETERS", VehicleClass::FourWheeler).unwrap();
        assert_eq!(suffixed.value, 12345);
        assert_eq!(suffixed.pattern_index, 1);
        assert_eq!(suffixed.confidence, 85);

        let labelled = extract("KILOMETERS 12345", VehicleClass::FourWheeler).unwrap();
        assert_eq!(labelled.value, 12345);
        assert_eq!(labelled.pattern_index, 0);
        // 40 + 20 (unit) + 15 (5 digits) + 15 (index 0)
        assert_eq!(labelled.confidence, 90);
    }

    #[test]
    fn test_acceptance_threshold() {
        // Bare 6 digit value above 500000 for a four-wheeler: 40 + 15 + 0 - 20
        let extraction = analyze("1,2 nothing 612345", VehicleClass::FourWheeler);
        let best = extraction.best().unwrap();
        assert_eq!(best.value, 612345);
        assert_eq!(best.confidence, 35);
        assert_eq!(extraction.status(), ReadingStatus::Confirmed);

        let weak = candidate(4000, 30, 3);
        assert_eq!(
            ReadingStatus::from_candidate(Some(&weak)),
            ReadingStatus::LowConfidence
        );
        assert!(!ReadingStatus::from_candidate(Some(&weak)).is_confirmed());
    }

    #[test]
    fn test_parse_reading() {
        assert_eq!(parse_reading("45,231"), Some(45231));
        assert_eq!(parse_reading("45231.75"), Some(45231));
        assert_eq!(parse_reading("1,234,567"), Some(1234567));
        assert_eq!(parse_reading("99999999999"), None);
    }

    #[test]
    fn test_candidate_serializes_camel_case() {
        let json = serde_json::to_value(candidate(45231, 95, 0)).unwrap();
        assert_eq!(json["originalText"], "45231");
        assert_eq!(json["patternIndex"], 0);
    }
}
