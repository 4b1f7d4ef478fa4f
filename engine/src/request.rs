//! Analysis request and result types shared with callers.
//!
//! Scores in [`MoveEvaluation`] are always reported from White's point of view:
//! a positive `score_centipawns` favors White and a positive `mate_in_moves`
//! means White delivers mate, whichever side is to move in the analyzed
//! position. Evaluations are still ordered best-first for the side to move.

use crate::Score;
use cozy_chess::{Board, Color};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reasons a request is rejected before it reaches an engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("FEN is empty")]
    EmptyFen,
    #[error("FEN must have 6 space-separated fields, got {0}")]
    FieldCount(usize),
    #[error("FEN board must have 8 ranks, got {0}")]
    RankCount(usize),
    #[error("FEN side to move must be 'w' or 'b', got '{0}'")]
    SideToMove(String),
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("depth must be at least 1")]
    Depth,
    #[error("multiPV must be at least 1")]
    MultiPv,
}

/// One position to analyze. Immutable once built; `(fen, depth, multi_pv)`
/// identifies it for caching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    fen: String,
    depth: u32,
    multi_pv: u32,
    time_limit_ms: u64,
}

impl AnalysisRequest {
    /// Validate and build a request. The FEN is normalized to single spaces
    /// between fields so equivalent spellings share a cache entry.
    ///
    /// `time_limit_ms == 0` means no time cap: the search is bounded by depth only.
    pub fn new(
        fen: &str,
        depth: u32,
        multi_pv: u32,
        time_limit_ms: u64,
    ) -> Result<Self, RequestError> {
        let fen = normalize_fen(fen)?;
        if depth < 1 {
            return Err(RequestError::Depth);
        }
        if multi_pv < 1 {
            return Err(RequestError::MultiPv);
        }
        Ok(Self {
            fen,
            depth,
            multi_pv,
            time_limit_ms,
        })
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn multi_pv(&self) -> u32 {
        self.multi_pv
    }

    pub fn time_limit_ms(&self) -> u64 {
        self.time_limit_ms
    }

    pub fn side_to_move(&self) -> Color {
        side_from_fen(&self.fen).unwrap_or(Color::White)
    }
}

/// Check the FEN's shape, then parse it as a board so that positions the
/// engine cannot handle (missing kings, bad castling or en passant fields,
/// non-numeric clocks) are rejected here.
pub fn normalize_fen(fen: &str) -> Result<String, RequestError> {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.is_empty() {
        return Err(RequestError::EmptyFen);
    }
    if fields.len() != 6 {
        return Err(RequestError::FieldCount(fields.len()));
    }
    let ranks = fields[0].split('/').count();
    if ranks != 8 {
        return Err(RequestError::RankCount(ranks));
    }
    if fields[1] != "w" && fields[1] != "b" {
        return Err(RequestError::SideToMove(fields[1].to_string()));
    }
    let fen = fields.join(" ");
    Board::from_fen(&fen, false).map_err(|e| RequestError::InvalidPosition(e.to_string()))?;
    Ok(fen)
}

fn side_from_fen(fen: &str) -> Option<Color> {
    match fen.split_whitespace().nth(1)? {
        "w" => Some(Color::White),
        "b" => Some(Color::Black),
        _ => None,
    }
}

/// One ranked engine line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEvaluation {
    #[serde(rename = "move")]
    pub mv: String,
    /// White's perspective. `None` for mate scores or when the engine sent no score.
    pub score_centipawns: Option<i32>,
    pub is_mate: bool,
    /// White's perspective: positive means White mates.
    pub mate_in_moves: Option<i32>,
    pub principal_variation: Vec<String>,
    pub depth_reached: u32,
    pub nodes_searched: u64,
    /// The engine's `multipv` index this line was reported under.
    pub multipv: u32,
}

impl MoveEvaluation {
    /// Build from an engine score given from the side to move's perspective.
    pub fn from_engine_score(
        pv: Vec<String>,
        score: Option<Score>,
        side_to_move: Color,
        depth_reached: u32,
        nodes_searched: u64,
        multipv: u32,
    ) -> Self {
        let white_score = match side_to_move {
            Color::White => score,
            Color::Black => score.map(Score::negate),
        };
        let (score_centipawns, is_mate, mate_in_moves) = match white_score {
            Some(Score::Centipawns(cp)) => (Some(cp), false, None),
            Some(Score::Mate(m)) => (None, true, Some(m)),
            None => (None, false, None),
        };
        Self {
            mv: pv.first().cloned().unwrap_or_default(),
            score_centipawns,
            is_mate,
            mate_in_moves,
            principal_variation: pv,
            depth_reached,
            nodes_searched,
            multipv,
        }
    }

    /// Score from White's perspective, if the engine reported one.
    pub fn white_score(&self) -> Option<Score> {
        match (self.score_centipawns, self.mate_in_moves) {
            (_, Some(m)) if self.is_mate => Some(Score::Mate(m)),
            (Some(cp), _) => Some(Score::Centipawns(cp)),
            _ => None,
        }
    }

    /// Score from the given side's perspective.
    pub fn score_for(&self, side: Color) -> Option<Score> {
        match side {
            Color::White => self.white_score(),
            Color::Black => self.white_score().map(Score::negate),
        }
    }
}

/// The outcome of one completed analysis. `best_move == evaluations[0].mv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub request: AnalysisRequest,
    pub evaluations: Vec<MoveEvaluation>,
    pub best_move: String,
    /// Milliseconds since the Unix epoch.
    pub completed_at: u64,
}

impl AnalysisResult {
    pub fn new(request: AnalysisRequest, evaluations: Vec<MoveEvaluation>) -> Self {
        let best_move = evaluations
            .first()
            .map(|e| e.mv.clone())
            .unwrap_or_default();
        Self {
            request,
            evaluations,
            best_move,
            completed_at: now_millis(),
        }
    }

    pub fn best(&self) -> Option<&MoveEvaluation> {
        self.evaluations.first()
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
