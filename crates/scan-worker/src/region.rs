//! Region matching: evaluate a [`PositionSpec`] against a position through a
//! square-lookup oracle.

use chess::{Board, Color, File, Piece, Rank, Square};

use crate::spec::{BoardRegion, PieceRequirement, PositionSpec};

/// Square → piece-code lookup over the position under test. Files and rows
/// are 1-based; empty squares are `None`.
pub trait SquareOracle {
    fn piece_at(&self, file: u8, row: u8) -> Option<char>;
}

/// Piece code for a piece/color pair: uppercase White, lowercase Black.
pub fn piece_code(piece: Piece, color: Color) -> char {
    let c = match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    };
    if color == Color::White {
        c.to_ascii_uppercase()
    } else {
        c
    }
}

/// Oracle over a `chess::Board`.
pub struct BoardOracle<'a> {
    board: &'a Board,
}

impl<'a> BoardOracle<'a> {
    pub fn new(board: &'a Board) -> Self {
        Self { board }
    }
}

impl SquareOracle for BoardOracle<'_> {
    fn piece_at(&self, file: u8, row: u8) -> Option<char> {
        let sq = Square::make_square(
            Rank::from_index(row as usize - 1),
            File::from_index(file as usize - 1),
        );
        let piece = self.board.piece_on(sq)?;
        let color = self.board.color_on(sq)?;
        Some(piece_code(piece, color))
    }
}

/// Count occurrences of `piece` in `region`. With `stop_at_one` the scan
/// short-circuits at the first occurrence; an exact-count check must scan the
/// whole region because an excess occurrence still fails.
fn count_in_region<O: SquareOracle>(
    oracle: &O,
    piece: char,
    region: &BoardRegion,
    stop_at_one: bool,
) -> u32 {
    let mut found = 0;
    for row in region.row_start..=region.row_end {
        for file in region.file_start..=region.file_end {
            if oracle.piece_at(file, row) == Some(piece) {
                found += 1;
                if stop_at_one {
                    return found;
                }
            }
        }
    }
    found
}

fn requirement_holds<O: SquareOracle>(
    oracle: &O,
    req: &PieceRequirement,
    region: &BoardRegion,
) -> bool {
    match req.count {
        None => count_in_region(oracle, req.piece, region, true) >= 1,
        Some(n) => count_in_region(oracle, req.piece, region, false) == n,
    }
}

/// Does the position satisfy the spec? Each requirement is evaluated
/// independently against the exclude flag: with `exclude` every requirement
/// must fail, without it every requirement must hold.
pub fn spec_satisfied<O: SquareOracle>(spec: &PositionSpec, oracle: &O) -> bool {
    spec.requirements
        .iter()
        .all(|req| spec.exclude != requirement_holds(oracle, req, &spec.region))
}

/// A position matches the endgame feature only when every supplied spec is
/// satisfied.
pub fn all_specs_satisfied<O: SquareOracle>(specs: &[PositionSpec], oracle: &O) -> bool {
    specs.iter().all(|spec| spec_satisfied(spec, oracle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::PositionSpec;
    use std::collections::HashMap;
    use std::str::FromStr;

    /// (file, row) → piece code
    struct FakeOracle(HashMap<(u8, u8), char>);

    impl FakeOracle {
        fn new(pieces: &[(u8, u8, char)]) -> Self {
            Self(pieces.iter().map(|&(f, r, c)| ((f, r), c)).collect())
        }
    }

    impl SquareOracle for FakeOracle {
        fn piece_at(&self, file: u8, row: u8) -> Option<char> {
            self.0.get(&(file, row)).copied()
        }
    }

    #[test]
    fn test_exact_count_on_row() {
        // Exactly two white pawns on row 7, nothing else anywhere.
        let oracle = FakeOracle::new(&[(2, 7, 'P'), (6, 7, 'P')]);

        let two = PositionSpec::parse("row7:P2").unwrap();
        assert!(spec_satisfied(&two, &oracle));

        let one = PositionSpec::parse("row7:P1").unwrap();
        assert!(!spec_satisfied(&one, &oracle));

        let three = PositionSpec::parse("row7:P3").unwrap();
        assert!(!spec_satisfied(&three, &oracle));
    }

    #[test]
    fn test_at_least_one() {
        let oracle = FakeOracle::new(&[(2, 7, 'P'), (6, 7, 'P')]);
        assert!(spec_satisfied(&PositionSpec::parse("row7:P").unwrap(), &oracle));
        assert!(!spec_satisfied(&PositionSpec::parse("row7:p").unwrap(), &oracle));
        assert!(!spec_satisfied(&PositionSpec::parse("row6:P").unwrap(), &oracle));
    }

    #[test]
    fn test_exclude_is_per_requirement() {
        // White pawn present, black pawn absent.
        let oracle = FakeOracle::new(&[(4, 4, 'P')]);

        // Exclusion requires every requirement to fail; 'P' holds, so the
        // spec as a whole is not satisfied.
        let spec = PositionSpec::parse("~Pp").unwrap();
        assert!(!spec_satisfied(&spec, &oracle));

        // Both absent: every requirement fails, exclusion satisfied.
        let spec = PositionSpec::parse("~Qq").unwrap();
        assert!(spec_satisfied(&spec, &oracle));
    }

    #[test]
    fn test_all_specs_must_hold() {
        let oracle = FakeOracle::new(&[(4, 4, 'P'), (5, 1, 'K'), (5, 8, 'k')]);
        let specs = vec![
            PositionSpec::parse("P1").unwrap(),
            PositionSpec::parse("Kk").unwrap(),
        ];
        assert!(all_specs_satisfied(&specs, &oracle));

        let specs = vec![
            PositionSpec::parse("P1").unwrap(),
            PositionSpec::parse("Q").unwrap(),
        ];
        assert!(!all_specs_satisfied(&specs, &oracle));
    }

    #[test]
    fn test_board_oracle() {
        let board = Board::from_str("4k3/1P3P2/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let oracle = BoardOracle::new(&board);
        assert_eq!(oracle.piece_at(2, 7), Some('P'));
        assert_eq!(oracle.piece_at(5, 8), Some('k'));
        assert_eq!(oracle.piece_at(5, 1), Some('K'));
        assert_eq!(oracle.piece_at(4, 4), None);

        assert!(spec_satisfied(&PositionSpec::parse("row7:P2").unwrap(), &oracle));
    }
}
