//! Reconciles streamed MultiPV `info` lines into ranked evaluations.

use crate::uci::format_uci_move;
use crate::{EngineInfo, MoveEvaluation, Score, ScoreBound};
use cozy_chess::Color;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct LineEntry {
    multipv: u32,
    depth: u32,
    score: Option<Score>,
    bound: Option<ScoreBound>,
    nodes: u64,
    pv: Vec<String>,
}

/// Working map from `multipv` index to the most recent, deepest line seen for it.
#[derive(Debug, Clone)]
pub struct PvTable {
    max_lines: u32,
    lines: BTreeMap<u32, LineEntry>,
    last_score: Option<(Score, u32, u64)>,
}

impl PvTable {
    pub fn new(max_lines: u32) -> Self {
        Self {
            max_lines: max_lines.max(1),
            lines: BTreeMap::new(),
            last_score: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Fold one `info` line into the table. Returns whether a line changed.
    ///
    /// Shallow lines from iterative deepening are applied too; deeper lines
    /// replace them later. A bound score never replaces an exact score at the
    /// same depth.
    pub fn apply(&mut self, info: &EngineInfo) -> bool {
        let index = info.multipv.unwrap_or(1);
        if index == 0 || index > self.max_lines {
            return false;
        }
        let depth = info.depth.unwrap_or(0);
        let nodes = info.nodes.unwrap_or(0);

        if let Some(score) = info.score {
            self.last_score = Some((score, depth, nodes));
        }

        let supersedes = |existing: &LineEntry| {
            depth > existing.depth
                || (depth == existing.depth
                    && !(info.bound.is_some() && existing.bound.is_none()))
        };

        if info.pv.is_empty() {
            let Some(score) = info.score else {
                return false;
            };
            return match self.lines.get_mut(&index) {
                Some(entry) if supersedes(entry) => {
                    entry.score = Some(score);
                    entry.bound = info.bound;
                    entry.depth = depth;
                    entry.nodes = nodes;
                    true
                }
                _ => false,
            };
        }

        if let Some(existing) = self.lines.get(&index) {
            if !supersedes(existing) {
                return false;
            }
        }

        self.lines.insert(
            index,
            LineEntry {
                multipv: index,
                depth,
                score: info.score,
                bound: info.bound,
                nodes,
                pv: info.pv.iter().map(format_uci_move).collect(),
            },
        );
        true
    }

    /// Current ranking: best first for `side_to_move`, one entry per distinct
    /// first move, at most `max_lines` long. Empty until a line carries a pv.
    pub fn snapshot(&self, side_to_move: Color) -> Vec<MoveEvaluation> {
        let mut entries: Vec<&LineEntry> = self.lines.values().collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.multipv.cmp(&b.multipv)));

        let mut seen: Vec<String> = Vec::with_capacity(entries.len());
        entries.retain(|entry| {
            let first = &entry.pv[0];
            if seen.contains(first) {
                false
            } else {
                seen.push(first.clone());
                true
            }
        });
        entries.truncate(self.max_lines as usize);

        entries
            .into_iter()
            .map(|entry| {
                MoveEvaluation::from_engine_score(
                    entry.pv.clone(),
                    entry.score,
                    side_to_move,
                    entry.depth,
                    entry.nodes,
                    entry.multipv,
                )
            })
            .collect()
    }

    /// Produce the final ranking (see [`PvTable::snapshot`]).
    ///
    /// When no line carried a principal variation, the engine's own `bestmove`
    /// becomes the single evaluation, scored from the most recent info line.
    pub fn finalize(self, best_move: &str, side_to_move: Color) -> Vec<MoveEvaluation> {
        if self.lines.is_empty() {
            let (score, depth, nodes) = match self.last_score {
                Some((score, depth, nodes)) => (Some(score), depth, nodes),
                None => (None, 0, 0),
            };
            return vec![MoveEvaluation::from_engine_score(
                vec![best_move.to_string()],
                score,
                side_to_move,
                depth,
                nodes,
                1,
            )];
        }

        let evaluations = self.snapshot(side_to_move);
        if evaluations[0].mv != best_move {
            tracing::trace!(
                engine_best = best_move,
                ranked_best = %evaluations[0].mv,
                "Engine bestmove differs from top-ranked line"
            );
        }
        evaluations
    }
}
