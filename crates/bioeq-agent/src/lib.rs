//! bioeq-agent — configuration, the estimation orchestrator, collaborator
//! wiring and study design recommendation behind the `bioeq` binary.

pub mod config;
pub mod design;
pub mod pipeline;
pub mod setup;

pub use config::AppConfig;
pub use design::{recommend_design, AdministrationMode, Complexity, DesignRecommendation};
pub use pipeline::{FallbackPolicy, FallbackStep, Orchestrator, PipelineConfig};
