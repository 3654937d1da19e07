use serde::{Deserialize, Serialize};

/// Header fields the scanner inspects. Missing headers default to "?".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameHeaders {
    pub white: String,
    pub black: String,
    pub date: String,
    pub opening: String,
    pub event: String,
    pub source: String,
}

impl Default for GameHeaders {
    fn default() -> Self {
        Self {
            white: "?".to_string(),
            black: "?".to_string(),
            date: "?".to_string(),
            opening: "?".to_string(),
            event: "?".to_string(),
            source: "?".to_string(),
        }
    }
}

/// A fully read game: headers, mainline SAN moves, and the raw PGN text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub headers: GameHeaders,
    pub san_moves: Vec<String>,
    pub pgn: String,
}
