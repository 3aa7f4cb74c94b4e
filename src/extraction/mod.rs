//! Kilometre extraction from recognized odometer text
//!
//! Normalizes OCR confusions, runs the vehicle class's pattern table over
//! the whole text, drops readings outside the class range, scores what is
//! left and picks the best.

pub mod confidence;
pub mod extractor;
pub mod normalize;
pub mod patterns;

pub use extractor::{
    analyze, extract, CandidateMatch, Extraction, ReadingStatus, ACCEPTANCE_THRESHOLD,
};
pub use normalize::normalize;
