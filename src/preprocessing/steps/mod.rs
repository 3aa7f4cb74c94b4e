//! Individual preprocessing steps

pub mod denoise;
pub mod threshold;
