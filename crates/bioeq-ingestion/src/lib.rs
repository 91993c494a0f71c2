//! bioeq-ingestion — literature retrieval and record preparation.
//! - Literature and secondary source clients (PubMed, Europe PMC)
//! - Request pacing
//! - Study-design classification
//! - Near-duplicate collapsing
//! - Local typical-value table

pub mod sources;
pub mod classify;
pub mod dedup;
pub mod typical;
