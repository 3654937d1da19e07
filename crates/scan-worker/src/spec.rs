//! Requirement-string parsing.
//!
//! A requirement string names pieces that must (or, with a `~`/`!` prefix,
//! must not) be present, optionally in exact quantities and optionally
//! confined to a board region. Examples: `"~row2:PK2p"`, `"e4:Q"`, `"K1k1"`.

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// The 12 piece codes: uppercase White, lowercase Black.
pub const PIECE_CHARS: [char; 12] = ['P', 'p', 'N', 'n', 'B', 'b', 'R', 'r', 'Q', 'q', 'K', 'k'];

/// One piece requirement. `count: None` means at least one must be present;
/// `Some(n)` means exactly `n` must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceRequirement {
    pub piece: char,
    pub count: Option<u32>,
}

/// An inclusive rectangular board region. Rows and files are 1-based;
/// files a-h map to 1-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRegion {
    pub row_start: u8,
    pub row_end: u8,
    pub file_start: u8,
    pub file_end: u8,
}

impl BoardRegion {
    pub const WHOLE_BOARD: BoardRegion = BoardRegion {
        row_start: 1,
        row_end: 8,
        file_start: 1,
        file_end: 8,
    };

    pub fn row(row: u8) -> Self {
        BoardRegion {
            row_start: row,
            row_end: row,
            ..Self::WHOLE_BOARD
        }
    }

    pub fn file(file: u8) -> Self {
        BoardRegion {
            file_start: file,
            file_end: file,
            ..Self::WHOLE_BOARD
        }
    }

    pub fn square(file: u8, row: u8) -> Self {
        BoardRegion {
            row_start: row,
            row_end: row,
            file_start: file,
            file_end: file,
        }
    }
}

impl Default for BoardRegion {
    fn default() -> Self {
        Self::WHOLE_BOARD
    }
}

/// A parsed requirement string: ordered piece requirements, the region they
/// apply to, and whether the whole spec is an exclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSpec {
    pub requirements: Vec<PieceRequirement>,
    pub region: BoardRegion,
    pub exclude: bool,
}

pub fn file_char_to_int(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    if ('a'..='h').contains(&c) {
        Some(1 + c as u8 - b'a')
    } else {
        None
    }
}

pub fn file_int_to_char(file: u8) -> char {
    debug_assert!((1..=8).contains(&file));
    (b'a' + file - 1) as char
}

fn row_digit(c: char) -> Option<u8> {
    match c.to_digit(10) {
        Some(d @ 1..=8) => Some(d as u8),
        _ => None,
    }
}

impl PositionSpec {
    /// Parse a requirement string. Whitespace is insignificant.
    pub fn parse(input: &str) -> Result<Self, ScanError> {
        let stripped: String = input.chars().filter(|c| !c.is_whitespace()).collect();

        let (exclude, rest) = match stripped.strip_prefix(['~', '!']) {
            Some(rest) => (true, rest),
            None => (false, stripped.as_str()),
        };

        let parts: Vec<&str> = rest.split(':').collect();
        let (region, piece_part) = match parts.as_slice() {
            [pieces] => (BoardRegion::WHOLE_BOARD, *pieces),
            [selector, pieces] => (parse_region_selector(selector, input)?, *pieces),
            _ => {
                return Err(ScanError::Spec(format!(
                    "more than one ':' in requirement string: {input:?}"
                )));
            }
        };

        let chars: Vec<char> = piece_part.chars().collect();
        let mut requirements = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_ascii_digit() {
                // A digit not trailing a piece code carries no meaning.
                i += 1;
                continue;
            }
            if !PIECE_CHARS.contains(&c) {
                return Err(ScanError::Spec(format!(
                    "unknown piece code {c:?} in requirement string: {input:?}"
                )));
            }
            let mut count = None;
            if let Some(d) = chars.get(i + 1).and_then(|d| d.to_digit(10)) {
                count = Some(d);
                i += 1;
            }
            requirements.push(PieceRequirement { piece: c, count });
            i += 1;
        }

        Ok(PositionSpec {
            requirements,
            region,
            exclude,
        })
    }

    /// Re-serialize to the compact form `parse` accepts; parsing the result
    /// yields an equal spec.
    pub fn canonical_string(&self) -> String {
        let mut out = String::new();
        if self.exclude {
            out.push('~');
        }

        let r = &self.region;
        let rows_pinned = r.row_start == r.row_end;
        let files_pinned = r.file_start == r.file_end;
        if rows_pinned && files_pinned {
            out.push(file_int_to_char(r.file_start));
            out.push_str(&r.row_start.to_string());
            out.push(':');
        } else if rows_pinned {
            out.push_str(&format!("row{}:", r.row_start));
        } else if files_pinned {
            out.push_str(&format!("file{}:", file_int_to_char(r.file_start)));
        }

        for req in &self.requirements {
            out.push(req.piece);
            if let Some(n) = req.count {
                out.push_str(&n.to_string());
            }
        }
        out
    }
}

fn parse_region_selector(selector: &str, input: &str) -> Result<BoardRegion, ScanError> {
    let lower = selector.to_ascii_lowercase();
    if lower.starts_with("row") {
        let row = lower
            .chars()
            .last()
            .and_then(row_digit)
            .ok_or_else(|| ScanError::Spec(format!("bad row selector in {input:?}")))?;
        return Ok(BoardRegion::row(row));
    }
    if lower.starts_with("file") {
        let file = lower
            .chars()
            .last()
            .and_then(file_char_to_int)
            .ok_or_else(|| ScanError::Spec(format!("bad file selector in {input:?}")))?;
        return Ok(BoardRegion::file(file));
    }

    let chars: Vec<char> = selector.chars().collect();
    if let [f, r] = chars.as_slice() {
        if let (Some(file), Some(row)) = (file_char_to_int(*f), row_digit(*r)) {
            return Ok(BoardRegion::square(file, row));
        }
    }
    Err(ScanError::Spec(format!(
        "unrecognized region selector {selector:?} in {input:?}"
    )))
}
