//! Analyzer configuration.
//!
//! Every field has a default. [`AnalyzerConfig::from_env`] overrides them from
//! environment variables; values that fail to parse keep the default.
//!
//! | Variable | Field |
//! |---|---|
//! | `STOCKFISH_PATH` | `engine.path` |
//! | `ANALYSIS_POOL_SIZE` | `pool_size` |
//! | `ANALYSIS_CACHE_CAPACITY` | `cache.capacity` |
//! | `ANALYSIS_CACHE_TTL_SECS` | `cache.ttl` (0 disables expiry) |
//! | `ANALYSIS_DEFAULT_DEPTH` | `defaults.depth` |
//! | `ANALYSIS_DEFAULT_MULTIPV` | `defaults.multi_pv` |
//! | `ANALYSIS_DEFAULT_TIME_LIMIT_MS` | `defaults.time_limit_ms` |
//! | `ANALYSIS_ENGINE_THREADS` | `engine.threads` |
//! | `ANALYSIS_ENGINE_HASH_MB` | `engine.hash_mb` |
//! | `ANALYSIS_CACHE_DIR` | `store_dir` |

use crate::{AnalyzeOptions, CacheConfig};
use engine::{EngineConfig, ENGINE_PATH_ENV};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub engine: EngineConfig,
    /// Maximum number of concurrent engine processes.
    pub pool_size: usize,
    pub cache: CacheConfig,
    /// Options used by [`crate::PositionAnalyzer::analyze`] when the caller passes `Default`.
    pub defaults: AnalyzeOptions,
    /// Added to the time limit to form the hard deadline.
    pub grace: Duration,
    /// Hard deadline for requests with no time limit.
    pub unbounded_timeout: Duration,
    /// Directory for the persistent result tier, if any.
    pub store_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            pool_size: 2,
            cache: CacheConfig::default(),
            defaults: AnalyzeOptions::default(),
            grace: Duration::from_secs(2),
            unbounded_timeout: Duration::from_secs(60),
            store_dir: None,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENGINE_PATH_ENV) {
            config.engine.path = Some(PathBuf::from(path));
        }
        if let Some(size) = parse(&get, "ANALYSIS_POOL_SIZE") {
            config.pool_size = size;
        }
        if let Some(capacity) = parse(&get, "ANALYSIS_CACHE_CAPACITY") {
            config.cache.capacity = capacity;
        }
        if let Some(secs) = parse::<u64>(&get, "ANALYSIS_CACHE_TTL_SECS") {
            config.cache.ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(depth) = parse(&get, "ANALYSIS_DEFAULT_DEPTH") {
            config.defaults.depth = depth;
        }
        if let Some(multi_pv) = parse(&get, "ANALYSIS_DEFAULT_MULTIPV") {
            config.defaults.multi_pv = multi_pv;
        }
        if let Some(ms) = parse(&get, "ANALYSIS_DEFAULT_TIME_LIMIT_MS") {
            config.defaults.time_limit_ms = ms;
        }
        if let Some(threads) = parse(&get, "ANALYSIS_ENGINE_THREADS") {
            config.engine.threads = Some(threads);
        }
        if let Some(hash) = parse(&get, "ANALYSIS_ENGINE_HASH_MB") {
            config.engine.hash_mb = Some(hash);
        }
        if let Some(dir) = get("ANALYSIS_CACHE_DIR") {
            config.store_dir = Some(PathBuf::from(dir));
        }
        config
    }

    /// Hard deadline for one analysis with the given time limit.
    pub fn deadline_for(&self, time_limit_ms: u64) -> Duration {
        if time_limit_ms == 0 {
            self.unbounded_timeout
        } else {
            Duration::from_millis(time_limit_ms) + self.grace
        }
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = get(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}
