//! Best-versus-blunder classification over a multi-line analysis.

use engine::{AnalysisResult, MoveEvaluation};
use serde::Serialize;

/// Score gap, from the mover's point of view, at which a move counts as a blunder.
pub const BLUNDER_THRESHOLD_CP: i32 = 200;

/// Centipawn values here are from the side to move's perspective; mates are
/// folded into large centipawn values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlunderPair {
    pub fen: String,
    pub best_move: String,
    pub best_cp: i32,
    pub blunder_move: String,
    pub blunder_cp: i32,
    pub score_diff: i32,
    pub is_blunder: bool,
}

/// Pair the best line with the first alternative at least
/// [`BLUNDER_THRESHOLD_CP`] worse, or with the worst alternative if none is.
///
/// `None` when fewer than two lines carry a score.
pub fn classify_candidates(result: &AnalysisResult) -> Option<BlunderPair> {
    let side = result.request.side_to_move();
    let scored: Vec<(&MoveEvaluation, i32)> = result
        .evaluations
        .iter()
        .filter_map(|eval| Some((eval, eval.score_for(side)?.to_cp())))
        .collect();

    let (&(best, best_cp), rest) = scored.split_first()?;
    let (blunder, blunder_cp) = rest
        .iter()
        .find(|(_, cp)| best_cp.saturating_sub(*cp) >= BLUNDER_THRESHOLD_CP)
        .or_else(|| rest.last())
        .copied()?;

    let score_diff = best_cp.saturating_sub(blunder_cp);
    Some(BlunderPair {
        fen: result.request.fen().to_string(),
        best_move: best.mv.clone(),
        best_cp,
        blunder_move: blunder.mv.clone(),
        blunder_cp,
        score_diff,
        is_blunder: score_diff >= BLUNDER_THRESHOLD_CP,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{AnalysisRequest, Score};

    const WHITE_FEN: &str = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5Q2/PPPP1PPP/RNB1K1NR w KQkq - 4 4";
    const BLACK_FEN: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

    fn result(fen: &str, lines: &[(&str, Score)]) -> AnalysisResult {
        let request = AnalysisRequest::new(fen, 12, lines.len() as u32, 0).unwrap();
        let evals = lines
            .iter()
            .enumerate()
            .map(|(i, (mv, score))| {
                MoveEvaluation::from_engine_score(
                    vec![mv.to_string()],
                    Some(*score),
                    request.side_to_move(),
                    12,
                    1000,
                    i as u32 + 1,
                )
            })
            .collect();
        AnalysisResult::new(request, evals)
    }

    #[test]
    fn test_first_move_past_threshold_is_the_blunder() {
        let result = result(
            WHITE_FEN,
            &[
                ("f3f7", Score::Mate(1)),
                ("c4f7", Score::Centipawns(150)),
                ("a2a3", Score::Centipawns(-20)),
            ],
        );
        let pair = classify_candidates(&result).unwrap();
        assert_eq!(pair.best_move, "f3f7");
        assert_eq!(pair.blunder_move, "c4f7");
        assert!(pair.is_blunder);
        assert_eq!(pair.score_diff, 29900 - 150);
    }

    #[test]
    fn test_falls_back_to_worst_move() {
        let result = result(
            WHITE_FEN,
            &[
                ("d2d3", Score::Centipawns(60)),
                ("b1c3", Score::Centipawns(45)),
                ("a2a3", Score::Centipawns(10)),
            ],
        );
        let pair = classify_candidates(&result).unwrap();
        assert_eq!(pair.best_move, "d2d3");
        assert_eq!(pair.blunder_move, "a2a3");
        assert_eq!(pair.score_diff, 50);
        assert!(!pair.is_blunder);
    }

    #[test]
    fn test_exact_threshold_counts() {
        let result = result(
            WHITE_FEN,
            &[("d2d3", Score::Centipawns(100)), ("g2g4", Score::Centipawns(-100))],
        );
        assert!(classify_candidates(&result).unwrap().is_blunder);
    }

    #[test]
    fn test_black_to_move_uses_black_perspective() {
        // Engine scores are relative to Black here.
        let result = result(
            BLACK_FEN,
            &[("e7e5", Score::Centipawns(-20)), ("f7f6", Score::Centipawns(-260))],
        );
        let pair = classify_candidates(&result).unwrap();
        assert_eq!(pair.best_cp, -20);
        assert_eq!(pair.blunder_cp, -260);
        assert_eq!(pair.score_diff, 240);
        assert!(pair.is_blunder);
    }

    #[test]
    fn test_extreme_engine_scores_do_not_overflow() {
        let result = result(
            WHITE_FEN,
            &[
                ("f3f7", Score::Mate(i32::MAX)),
                ("c4f7", Score::Centipawns(i32::MIN)),
                ("a2a3", Score::Mate(i32::MIN)),
            ],
        );
        let pair = classify_candidates(&result).unwrap();
        assert_eq!(pair.best_move, "f3f7");
        assert_eq!(pair.blunder_move, "c4f7");
        assert_eq!(pair.score_diff, i32::MAX);
        assert!(pair.is_blunder);
    }

    #[test]
    fn test_needs_two_scored_lines() {
        let single = result(WHITE_FEN, &[("d2d3", Score::Centipawns(60))]);
        assert!(classify_candidates(&single).is_none());
    }
}
