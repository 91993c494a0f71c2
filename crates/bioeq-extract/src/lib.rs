//! bioeq-extract — CVintra candidate extraction from free text.
//!
//! Weighted regular expressions run first; a semantic delegate is consulted
//! only when they find nothing confident.

pub mod delegate;
pub mod extractor;
pub mod patterns;

pub use extractor::{Extraction, Extractor, ExtractorConfig};
