//! SAN move resolution against a `chess::Board`.

use chess::{Board, ChessMove, File, MoveGen, Piece, Rank, Square};

use crate::CoreError;

/// Format a move as a UCI string (e.g. `e7e8n` for an under-promotion).
pub fn uci_string(m: ChessMove) -> String {
    format!(
        "{}{}{}",
        m.get_source(),
        m.get_dest(),
        m.get_promotion()
            .map(|p| match p {
                Piece::Queen => "q",
                Piece::Rook => "r",
                Piece::Bishop => "b",
                Piece::Knight => "n",
                _ => "",
            })
            .unwrap_or("")
    )
}

/// Resolve a SAN token to the matching legal move.
pub fn resolve_san(board: &Board, san: &str) -> Result<ChessMove, CoreError> {
    let clean = san.trim_end_matches(|c: char| matches!(c, '+' | '#' | '!' | '?'));

    if clean == "O-O" || clean == "0-0" {
        return castling_move(board, san, true);
    }
    if clean == "O-O-O" || clean == "0-0-0" {
        return castling_move(board, san, false);
    }

    let bytes = clean.as_bytes();
    if bytes.is_empty() {
        return Err(CoreError::San("empty SAN move".to_string()));
    }

    let (piece, rest) = if bytes[0].is_ascii_uppercase() {
        let p = match bytes[0] {
            b'K' => Piece::King,
            b'Q' => Piece::Queen,
            b'R' => Piece::Rook,
            b'B' => Piece::Bishop,
            b'N' => Piece::Knight,
            other => {
                return Err(CoreError::San(format!("unknown piece: {}", other as char)));
            }
        };
        (p, &clean[1..])
    } else {
        (Piece::Pawn, clean)
    };

    let (rest, promotion) = match rest.find('=') {
        Some(eq) => {
            let promo = match rest.as_bytes().get(eq + 1) {
                Some(b'Q') => Some(Piece::Queen),
                Some(b'R') => Some(Piece::Rook),
                Some(b'B') => Some(Piece::Bishop),
                Some(b'N') => Some(Piece::Knight),
                _ => None,
            };
            (&rest[..eq], promo)
        }
        None => (rest, None),
    };

    let rest = rest.replace('x', "");
    let rest_bytes = rest.as_bytes();
    if rest_bytes.len() < 2 {
        return Err(CoreError::San(format!("SAN too short: {san}")));
    }

    let dest_file = rest_bytes[rest_bytes.len() - 2];
    let dest_rank = rest_bytes[rest_bytes.len() - 1];
    if !(b'a'..=b'h').contains(&dest_file) || !(b'1'..=b'8').contains(&dest_rank) {
        return Err(CoreError::San(format!("invalid destination in SAN: {san}")));
    }
    let dest = Square::make_square(
        Rank::from_index((dest_rank - b'1') as usize),
        File::from_index((dest_file - b'a') as usize),
    );

    let mut candidates: Vec<ChessMove> = MoveGen::new_legal(board)
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .collect();

    if candidates.len() > 1 {
        let disambig = &rest[..rest.len() - 2];
        candidates.retain(|m| {
            let src = m.get_source();
            disambig.bytes().all(|b| {
                if (b'a'..=b'h').contains(&b) {
                    src.get_file().to_index() == (b - b'a') as usize
                } else if (b'1'..=b'8').contains(&b) {
                    src.get_rank().to_index() == (b - b'1') as usize
                } else {
                    true
                }
            })
        });
    }

    match candidates.len() {
        1 => Ok(candidates[0]),
        0 => Err(CoreError::San(format!("no legal move matches SAN: {san}"))),
        n => Err(CoreError::San(format!("ambiguous SAN: {san} ({n} candidates)"))),
    }
}

fn castling_move(board: &Board, san: &str, kingside: bool) -> Result<ChessMove, CoreError> {
    for m in MoveGen::new_legal(board) {
        if board.piece_on(m.get_source()) != Some(Piece::King) {
            continue;
        }
        let from = m.get_source().get_file().to_index() as i32;
        let to = m.get_dest().get_file().to_index() as i32;
        let matches_side = if kingside { to - from == 2 } else { from - to == 2 };
        if matches_side {
            return Ok(m);
        }
    }
    Err(CoreError::San(format!("no castling move found for: {san}")))
}
