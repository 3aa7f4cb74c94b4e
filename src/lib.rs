//! Odometer photo OCR
//!
//! Reads the kilometre value from a photo of a vehicle's odometer:
//! binarize and despeckle the photo, hand it to a text recognizer, then
//! pull the most plausible reading out of the recognized text and score it.
//!
//! [`odometer::read_odometer`] runs the whole pipeline against an injected
//! [`engine::EngineHandle`]. [`extraction::extract`] works on text alone.

pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod extraction;
pub mod odometer;
pub mod preprocessing;
pub mod retry;
pub mod server;
pub mod vehicle;
