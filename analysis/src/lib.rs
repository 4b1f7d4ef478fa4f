//! Position analysis on top of pooled UCI engine sessions, with an in-memory
//! result cache and an optional persistent tier.

mod analyzer;
pub mod blunder;
mod cache;
mod config;
mod error;
mod pool;
mod store;

pub use analyzer::{AnalyzeOptions, PositionAnalyzer};
pub use blunder::{classify_candidates, BlunderPair, BLUNDER_THRESHOLD_CP};
pub use cache::{AnalysisCache, CacheConfig, CacheKey, CacheStats};
pub use config::AnalyzerConfig;
pub use error::AnalysisError;
pub use pool::{EnginePool, PooledSession};
pub use store::{JsonResultStore, NoStore, ResultStore, StoreError};

pub use engine::{AnalysisRequest, AnalysisResult, MoveEvaluation, Score};
