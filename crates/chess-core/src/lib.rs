pub use chess;

pub mod game_data;
pub mod pgn;
pub mod san;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SAN error: {0}")]
    San(String),
}
