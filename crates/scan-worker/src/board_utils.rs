//! Small board and FEN helpers for the scan loop.

use std::str::FromStr;

use chess::{Board, File, Rank, Square};

use crate::region::piece_code;

/// Count of all pieces on the board
pub fn total_piece_count(board: &Board) -> u32 {
    board.combined().popcnt()
}

/// ASCII diagram of the board, rank 8 first, `.` for empty squares.
pub fn ascii_board(board: &Board) -> String {
    let mut out = String::new();
    for row in (0..8).rev() {
        for file in 0..8 {
            if file > 0 {
                out.push(' ');
            }
            let sq = Square::make_square(Rank::from_index(row), File::from_index(file));
            match (board.piece_on(sq), board.color_on(sq)) {
                (Some(piece), Some(color)) => out.push(piece_code(piece, color)),
                _ => out.push('.'),
            }
        }
        if row > 0 {
            out.push('\n');
        }
    }
    out
}

/// FEN with the side to move flipped and nothing else changed. The en passant
/// square is cleared; a stale one would not describe a reachable position.
pub fn flip_side_to_move(fen: &str) -> Option<String> {
    let parts: Vec<&str> = fen.split(' ').collect();
    if parts.len() < 4 {
        return None;
    }
    let side = if parts[1] == "w" { "b" } else { "w" };
    let mut fields = vec![parts[0], side, parts[2], "-"];
    fields.extend(&parts[4..]);
    Some(fields.join(" "))
}

/// Is this FEN a valid position? Rejects, among other things, positions where
/// the side not to move is in check — which is what makes a flipped position
/// illegal.
pub fn is_valid_position(fen: &str) -> bool {
    Board::from_str(fen).is_ok()
}

/// Drop lines starting with the given prefix (lichess `[Site ...]` headers
/// bloat every hit block).
pub fn strip_lines_starting_with(text: &str, prefix: &str) -> String {
    text.lines()
        .filter(|line| !line.starts_with(prefix))
        .collect::<Vec<_>>()
        .join("\n")
}
