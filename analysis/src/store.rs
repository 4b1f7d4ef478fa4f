//! Optional persistent tier behind the in-memory cache.
//!
//! Methods return `impl Future + Send` so analyzers holding a store stay
//! usable from `tokio::spawn`.

use crate::cache::CacheKey;
use engine::AnalysisResult;
use std::future::Future;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable storage for completed analyses, keyed like the cache.
pub trait ResultStore: Send + Sync {
    fn load(
        &self,
        key: &CacheKey,
    ) -> impl Future<Output = Result<Option<AnalysisResult>, StoreError>> + Send;
    fn save(&self, result: &AnalysisResult)
        -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Store that remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

impl ResultStore for NoStore {
    async fn load(&self, _key: &CacheKey) -> Result<Option<AnalysisResult>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _result: &AnalysisResult) -> Result<(), StoreError> {
        Ok(())
    }
}

/// An absent store behaves like [`NoStore`].
impl<S: ResultStore> ResultStore for Option<S> {
    async fn load(&self, key: &CacheKey) -> Result<Option<AnalysisResult>, StoreError> {
        match self {
            Some(store) => store.load(key).await,
            None => Ok(None),
        }
    }

    async fn save(&self, result: &AnalysisResult) -> Result<(), StoreError> {
        match self {
            Some(store) => store.save(result).await,
            None => Ok(()),
        }
    }
}

/// One pretty-printed JSON file per analysis in a single directory.
pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, key: &CacheKey) -> PathBuf {
        let fen = key.fen.replace('/', ".").replace(' ', "_");
        self.dir
            .join(format!("{}-d{}-pv{}.json", fen, key.depth, key.multi_pv))
    }
}

impl ResultStore for JsonResultStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<AnalysisResult>, StoreError> {
        let path = self.file_path(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let result: AnalysisResult = serde_json::from_str(&contents)?;
        // Guard against a renamed or hand-edited file.
        if CacheKey::from(&result.request) != *key {
            tracing::warn!("Stored analysis {:?} does not match its key, ignoring", path);
            return Ok(None);
        }
        Ok(Some(result))
    }

    async fn save(&self, result: &AnalysisResult) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.file_path(&CacheKey::from(&result.request));
        let json = serde_json::to_string_pretty(result)?;
        tokio::fs::write(&path, json).await?;
        tracing::debug!("Saved analysis to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{AnalysisRequest, MoveEvaluation, Score};

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn sample(depth: u32) -> AnalysisResult {
        let request = AnalysisRequest::new(START_FEN, depth, 2, 750).unwrap();
        let evals = vec![
            MoveEvaluation::from_engine_score(
                vec!["e2e4".into(), "e7e5".into()],
                Some(Score::Centipawns(30)),
                request.side_to_move(),
                depth,
                4000,
                1,
            ),
            MoveEvaluation::from_engine_score(
                vec!["d2d4".into()],
                Some(Score::Centipawns(22)),
                request.side_to_move(),
                depth,
                4000,
                2,
            ),
        ];
        AnalysisResult::new(request, evals)
    }

    #[test]
    fn test_file_name_is_filesystem_safe() {
        let store = JsonResultStore::new("/tmp/analysis");
        let key = CacheKey::from(&sample(12).request);
        let name = store.file_path(&key);
        let name = name.file_name().unwrap().to_str().unwrap();
        assert_eq!(
            name,
            "rnbqkbnr.pppppppp.8.8.8.8.PPPPPPPP.RNBQKBNR_w_KQkq_-_0_1-d12-pv2.json"
        );
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path().join("nested"));
        let result = sample(12);
        let key = CacheKey::from(&result.request);

        assert!(store.load(&key).await.unwrap().is_none());
        store.save(&result).await.unwrap();
        assert_eq!(store.load(&key).await.unwrap(), Some(result));

        let other = CacheKey {
            depth: 14,
            ..key.clone()
        };
        assert!(store.load(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path());
        let key = CacheKey::from(&sample(8).request);
        std::fs::write(store.file_path(&key), "{ not json").unwrap();
        assert!(matches!(store.load(&key).await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_mismatched_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path());
        let stored = sample(8);
        store.save(&stored).await.unwrap();

        let wanted = CacheKey {
            depth: 9,
            ..CacheKey::from(&stored.request)
        };
        std::fs::rename(
            store.file_path(&CacheKey::from(&stored.request)),
            store.file_path(&wanted),
        )
        .unwrap();
        assert!(store.load(&wanted).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_store() {
        let key = CacheKey::from(&sample(8).request);
        assert!(NoStore.load(&key).await.unwrap().is_none());
        NoStore.save(&sample(8)).await.unwrap();
    }
}
