//! UCI engine bridge.
//!
//! Owns a single chess-engine subprocess per [`EngineSession`], speaks the UCI
//! text protocol over its stdin/stdout and turns the streamed `info`/`bestmove`
//! output into ranked [`MoveEvaluation`]s.

pub mod discovery;
pub mod lines;
pub mod request;
pub mod session;
pub mod uci;

pub use discovery::{find_engine_path, ENGINE_PATH_ENV};
pub use lines::PvTable;
pub use request::{AnalysisRequest, AnalysisResult, MoveEvaluation, RequestError};
pub use session::{EngineConfig, EngineSession, SessionError, SessionState};
pub use uci::{UciError, UciMessage};

use cozy_chess::Move;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Uci,
    IsReady,
    UciNewGame,
    SetOption { name: String, value: Option<String> },
    SetPosition { fen: String },
    Go(GoParams),
    Stop,
    Quit,
}

/// Parameters for the "go" command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub depth: Option<u32>,    // Search depth
    pub movetime: Option<u64>, // Move time in milliseconds
    pub infinite: bool,        // Search until "stop"
}

/// Engine analysis information parsed from one `info` line
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub bound: Option<ScoreBound>,
    pub pv: Vec<Move>, // Principal variation
    pub multipv: Option<u32>,
    pub currmove: Option<Move>,
    pub hashfull: Option<u16>,
    pub nps: Option<u64>,
    pub string: Option<String>,
}

/// Engine evaluation score from the side to move's point of view.
///
/// Mate: positive N = side to move mates in N, negative N = side to move
/// gets mated in N, zero = side to move is already mated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

/// Longest mate distance that still maps to a distinct centipawn value.
pub const MAX_MATE_DISTANCE: i32 = 200;

/// Marks an `info` score as a search-window bound rather than an exact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    Lower,
    Upper,
}

impl Score {
    /// Flip perspective.
    pub fn negate(self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(cp.saturating_neg()),
            Self::Mate(m) => Self::Mate(m.saturating_neg()),
        }
    }

    /// Convert to centipawns for thresholds. Mate scores use large values;
    /// mate distances beyond [`MAX_MATE_DISTANCE`] count as that distance.
    pub fn to_cp(self) -> i32 {
        match self {
            Self::Centipawns(cp) => cp,
            Self::Mate(m) if m > 0 => 30000 - m.min(MAX_MATE_DISTANCE) * 100,
            Self::Mate(m) => -30000 - m.max(-MAX_MATE_DISTANCE) * 100,
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Self::Mate(_))
    }

    // (class, key): winning mates above every centipawn value, losing mates below.
    fn rank(self) -> (u8, i64) {
        match self {
            Self::Mate(m) if m > 0 => (2, -i64::from(m)),
            Self::Centipawns(cp) => (1, i64::from(cp)),
            Self::Mate(m) => (0, -i64::from(m)),
        }
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Centipawns(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) if *m > 0 => write!(f, "+M{}", m),
            Self::Mate(m) => write!(f, "-M{}", m.unsigned_abs()),
        }
    }
}
