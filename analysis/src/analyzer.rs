use crate::cache::{AnalysisCache, CacheKey, CacheStats};
use crate::config::AnalyzerConfig;
use crate::pool::EnginePool;
use crate::store::{JsonResultStore, NoStore, ResultStore};
use crate::AnalysisError;
use engine::{AnalysisRequest, AnalysisResult, MoveEvaluation, SessionError};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Search parameters for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOptions {
    pub depth: u32,
    #[serde(rename = "multiPV")]
    pub multi_pv: u32,
    /// 0 means the search is bounded by depth only.
    #[serde(rename = "timeLimit")]
    pub time_limit_ms: u64,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            depth: 14,
            multi_pv: 3,
            time_limit_ms: 750,
        }
    }
}

/// Entry point for position analysis. Checks the cache tiers, then runs the
/// engine through a bounded session pool.
///
/// Share it between tasks behind an `Arc`.
pub struct PositionAnalyzer<S = NoStore> {
    config: AnalyzerConfig,
    cache: AnalysisCache,
    pool: EnginePool,
    store: S,
}

impl PositionAnalyzer<NoStore> {
    /// An analyzer with the in-memory cache only.
    pub fn new(config: AnalyzerConfig) -> Self {
        Self::with_store(config, NoStore)
    }
}

impl PositionAnalyzer<Option<JsonResultStore>> {
    /// An analyzer whose persistent tier is enabled when `config.store_dir` is set.
    pub fn from_config(config: AnalyzerConfig) -> Self {
        let store = config.store_dir.clone().map(JsonResultStore::new);
        Self::with_store(config, store)
    }
}

impl<S: ResultStore> PositionAnalyzer<S> {
    pub fn with_store(config: AnalyzerConfig, store: S) -> Self {
        tracing::info!(
            pool_size = config.pool_size,
            cache_capacity = config.cache.capacity,
            "Creating position analyzer"
        );
        Self {
            cache: AnalysisCache::new(config.cache.clone()),
            pool: EnginePool::new(config.engine.clone(), config.pool_size),
            config,
            store,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Validate the inputs and analyze.
    pub async fn analyze(
        &self,
        fen: &str,
        options: AnalyzeOptions,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = AnalysisRequest::new(
            fen,
            options.depth,
            options.multi_pv,
            options.time_limit_ms,
        )?;
        self.analyze_request(request).await
    }

    /// Analyze with the configured default options.
    pub async fn analyze_default(&self, fen: &str) -> Result<AnalysisResult, AnalysisError> {
        self.analyze(fen, self.config.defaults).await
    }

    pub async fn analyze_request(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.run(request, None).await
    }

    /// Analyze, sending the evolving ranking to `progress` while the engine
    /// searches. Answers from either cache tier send no updates.
    pub async fn analyze_streaming(
        &self,
        fen: &str,
        options: AnalyzeOptions,
        progress: mpsc::Sender<Vec<MoveEvaluation>>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = AnalysisRequest::new(
            fen,
            options.depth,
            options.multi_pv,
            options.time_limit_ms,
        )?;
        self.run(request, Some(&progress)).await
    }

    #[tracing::instrument(
        level = "info",
        skip(self, request, progress),
        fields(fen = request.fen(), depth = request.depth(), multipv = request.multi_pv())
    )]
    async fn run(
        &self,
        request: AnalysisRequest,
        progress: Option<&mpsc::Sender<Vec<MoveEvaluation>>>,
    ) -> Result<AnalysisResult, AnalysisError> {
        if let Some(hit) = self.cache.get(&request) {
            tracing::debug!("Served from cache");
            return Ok(hit);
        }

        match self.store.load(&CacheKey::from(&request)).await {
            Ok(Some(stored)) => {
                tracing::debug!("Served from persistent store");
                self.cache.put(&request, stored.clone());
                return Ok(stored);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read persistent store: {}", e),
        }

        let result = match self.run_on_engine(&request, false, progress).await {
            Err(AnalysisError::EngineCrashed(reason)) => {
                tracing::warn!("Engine crashed ({}), retrying on a fresh engine", reason);
                self.run_on_engine(&request, true, progress)
                    .await
                    .map_err(|e| match e {
                        AnalysisError::EngineCrashed(reason) => AnalysisError::EngineUnavailable(
                            format!("engine crashed twice: {}", reason),
                        ),
                        other => other,
                    })?
            }
            other => other?,
        };

        self.cache.put(&request, result.clone());
        if let Err(e) = self.store.save(&result).await {
            tracing::warn!("Failed to write persistent store: {}", e);
        }
        tracing::info!(best_move = %result.best_move, "Analysis complete");
        Ok(result)
    }

    /// Analyze many positions with at most `concurrency` in flight.
    /// Results come back in input order.
    pub async fn analyze_batch(
        &self,
        fens: &[String],
        options: AnalyzeOptions,
        concurrency: usize,
    ) -> Vec<Result<AnalysisResult, AnalysisError>> {
        stream::iter(fens)
            .map(|fen| self.analyze(fen, options))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// Quit all idle engines and refuse further engine work.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    async fn run_on_engine(
        &self,
        request: &AnalysisRequest,
        fresh: bool,
        progress: Option<&mpsc::Sender<Vec<MoveEvaluation>>>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut guard = if fresh {
            self.pool.acquire_fresh().await?
        } else {
            self.pool.acquire().await?
        };
        let session_id = guard.session().id();

        let deadline = self.config.deadline_for(request.time_limit_ms());
        let outcome = tokio::time::timeout(
            deadline,
            guard.session().analyze_with_progress(request, progress),
        )
        .await;
        match outcome {
            Ok(Ok(result)) => {
                guard.release();
                Ok(result)
            }
            Ok(Err(SessionError::NoLegalMoves)) => {
                guard.release();
                Err(SessionError::NoLegalMoves.into())
            }
            Ok(Err(e)) => {
                guard.discard().await;
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(
                    session = session_id,
                    "No bestmove within {} ms, killing engine",
                    deadline.as_millis()
                );
                guard.discard().await;
                Err(AnalysisError::AnalysisTimeout {
                    limit_ms: deadline.as_millis() as u64,
                })
            }
        }
    }
}
