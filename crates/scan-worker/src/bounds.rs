//! Evaluation-band matching over ranked candidate moves.
//!
//! Bounds come in `(lower, upper)` pairs per candidate rank, in pawns from
//! the side to move's point of view. Every depth of the ladder must pass, so
//! a single shallow-search wobble cannot produce a hit.

use crate::error::ScanError;
use crate::stockfish::{RankProvider, RankedMove};

/// Search depths for bound matching, shallow to deep.
pub const BOUND_DEPTHS: [u32; 3] = [8, 12, 15];

/// A candidate move with scores normalized to the side to move: positive
/// always means good for the mover.
#[derive(Debug, Clone)]
pub struct ScoredMove {
    pub uci: String,
    pub pawns: Option<f64>,
    pub mate: Option<i32>,
}

/// Sign multiplier for the side to move of a FEN: +1 for White, -1 for Black.
pub fn side_to_move_sign(fen: &str) -> i32 {
    if fen.split_whitespace().nth(1) == Some("b") {
        -1
    } else {
        1
    }
}

/// Convert raw engine scores to mover-relative pawns and mate distances.
pub fn normalize(moves: Vec<RankedMove>, sign: i32) -> Vec<ScoredMove> {
    moves
        .into_iter()
        .map(|m| ScoredMove {
            uci: m.uci,
            pawns: m.cp.map(|cp| f64::from(cp) * 0.01 * f64::from(sign)),
            mate: m.mate.map(|n| n * sign),
        })
        .collect()
}

fn bound_ok(m: &ScoredMove, bound: Option<f64>, is_lower: bool) -> bool {
    let bound = match bound {
        None => return true,
        Some(b) => b,
    };
    if let Some(mate) = m.mate {
        // A forced mate for the mover beats any finite lower bound and
        // exceeds any finite upper bound.
        return if is_lower { mate > 0 } else { mate < 0 };
    }
    match m.pawns {
        Some(p) => {
            if is_lower {
                p >= bound
            } else {
                p <= bound
            }
        }
        None => false,
    }
}

/// Do the top `bounds.len() / 2` candidate moves stay inside the given bands
/// at every depth of the ladder?
pub async fn satisfies_bounds<P: RankProvider>(
    fen: &str,
    bounds: &[Option<f64>],
    provider: &mut P,
) -> Result<bool, ScanError> {
    debug_assert!(bounds.len() % 2 == 0);
    let ranks = bounds.len() / 2;
    let sign = side_to_move_sign(fen);

    for depth in BOUND_DEPTHS {
        let ranked = provider.top_moves(fen, depth, ranks).await?;
        if ranked.len() != ranks {
            // Fewer candidate moves than ranks to bound.
            return Ok(false);
        }
        let scored = normalize(ranked, sign);
        for (i, m) in scored.iter().enumerate() {
            if !bound_ok(m, bounds[2 * i], true) || !bound_ok(m, bounds[2 * i + 1], false) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}
