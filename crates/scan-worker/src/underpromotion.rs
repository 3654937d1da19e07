//! Detection of positions where an under-promotion is clearly the best move.
//!
//! A candidate only survives if every depth of the ladder independently
//! agrees: the top move is a knight/bishop/rook promotion, it is not merely a
//! cosmetic alternative to an already-won position, and it beats the
//! runner-up by a material margin.

use chess::{Board, Color};
use tracing::debug;

use crate::bounds::normalize;
use crate::error::ScanError;
use crate::region::{spec_satisfied, BoardOracle};
use crate::spec::{BoardRegion, PieceRequirement, PositionSpec};
use crate::stockfish::RankProvider;

/// Search depths for underpromotion detection, deeper than bound matching.
pub const UNDERPROMOTION_DEPTHS: [u32; 3] = [12, 15, 25];

/// Is this UCI move an under-promotion (promotion to other than a queen)?
pub fn is_underpromotion_uci(uci: &str) -> bool {
    uci.len() == 5 && matches!(uci.as_bytes()[4], b'n' | b'b' | b'r')
}

fn promotion_feasible(board: &Board) -> bool {
    let (piece, row) = match board.side_to_move() {
        Color::White => ('P', 7),
        Color::Black => ('p', 2),
    };
    let spec = PositionSpec {
        requirements: vec![PieceRequirement { piece, count: None }],
        region: BoardRegion::row(row),
        exclude: false,
    };
    spec_satisfied(&spec, &BoardOracle::new(board))
}

/// Returns the best move's UCI string when an under-promotion is decisively
/// best, `None` otherwise.
pub async fn detect_underpromotion<P: RankProvider>(
    board: &Board,
    provider: &mut P,
) -> Result<Option<String>, ScanError> {
    // No pawn a single push from promotion means no promotion this move.
    if !promotion_feasible(board) {
        return Ok(None);
    }

    let fen = board.to_string();
    let sign = match board.side_to_move() {
        Color::White => 1,
        Color::Black => -1,
    };

    let mut best_uci = String::new();
    for depth in UNDERPROMOTION_DEPTHS {
        let ranked = provider.top_moves(&fen, depth, 2).await?;
        if ranked.len() != 2 {
            return Ok(None);
        }
        let scored = normalize(ranked, sign);
        let (best, second) = (&scored[0], &scored[1]);

        if !is_underpromotion_uci(&best.uci) {
            return Ok(None);
        }
        if second.mate.is_some_and(|m| m > 0) {
            // The runner-up mates anyway; the under-promotion is not decisive.
            return Ok(None);
        }
        if best.mate.is_some_and(|m| m < 0) {
            // Even the best move loses to a forced mate.
            return Ok(None);
        }
        if second.pawns.is_some_and(|p| p > 3.0) {
            // The runner-up is already winning big.
            return Ok(None);
        }
        if let Some(best_pawns) = best.pawns {
            if best_pawns < -3.0 {
                return Ok(None);
            }
            if let Some(second_pawns) = second.pawns {
                if best_pawns - second_pawns < 0.5 {
                    return Ok(None);
                }
                debug!(
                    best = best_pawns,
                    second = second_pawns,
                    depth,
                    %fen,
                    "underpromotion margin holds"
                );
            }
        }
        best_uci = best.uci.clone();
    }
    Ok(Some(best_uci))
}
