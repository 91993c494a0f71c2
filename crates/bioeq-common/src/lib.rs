//! bioeq-common — Shared data model, errors, and confidence rules used across all bioeq crates.

pub mod error;
pub mod models;
pub mod confidence;

pub use error::{BioeqError, Result};
pub use confidence::ValidityBounds;
pub use models::{
    AggregateResult, ArticleKind, Classification, Estimate, EstimateOrigin, EstimateStatus,
    ExtractionCandidate, ExtractionMethod, LiteratureRecord, RankedSource, StageTrace, SubjectKind,
};
