//! PGN stream reading — lightweight regex-based parsing over a multi-game
//! archive.
//!
//! Games are yielded strictly in file order. Callers that only need headers
//! (skip-ahead, the name filter) use [`PgnStream::next_headers`], which scans
//! past the movetext without parsing it.

use std::io::BufRead;

use regex::Regex;

use crate::game_data::{GameHeaders, GameRecord};
use crate::CoreError;

/// Streaming reader over a PGN archive.
pub struct PgnStream<R: BufRead> {
    reader: R,
    pushback: Option<String>,
    header_re: Regex,
    move_re: Regex,
    comment_re: Regex,
    variation_re: Regex,
}

/// One raw game chunk: header lines and movetext lines, still unparsed.
struct GameChunk {
    header_lines: Vec<String>,
    move_lines: Vec<String>,
}

impl<R: BufRead> PgnStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pushback: None,
            header_re: Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).unwrap(),
            move_re: Regex::new(
                r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O",
            )
            .unwrap(),
            comment_re: Regex::new(r"\{[^}]*\}").unwrap(),
            variation_re: Regex::new(r"\([^()]*\)").unwrap(),
        }
    }

    /// Read the next game's headers, scanning past its movetext unparsed.
    /// Returns `None` at end of stream.
    pub fn next_headers(&mut self) -> Result<Option<GameHeaders>, CoreError> {
        match self.next_chunk()? {
            Some(chunk) => Ok(Some(self.parse_headers(&chunk.header_lines))),
            None => Ok(None),
        }
    }

    /// Read the next full game. Returns `None` at end of stream.
    pub fn next_game(&mut self) -> Result<Option<GameRecord>, CoreError> {
        let chunk = match self.next_chunk()? {
            Some(c) => c,
            None => return Ok(None),
        };
        let headers = self.parse_headers(&chunk.header_lines);
        let movetext = chunk.move_lines.join("\n");
        let san_moves = self.extract_moves(&movetext);
        let mut pgn = chunk.header_lines.join("\n");
        if !movetext.is_empty() {
            pgn.push_str("\n\n");
            pgn.push_str(&movetext);
        }
        Ok(Some(GameRecord {
            headers,
            san_moves,
            pgn,
        }))
    }

    /// Collect lines belonging to the next game. A game is a run of `[Tag ...]`
    /// lines followed by movetext; the chunk ends at the blank line after the
    /// movetext or at the next game's first header line.
    fn next_chunk(&mut self) -> Result<Option<GameChunk>, CoreError> {
        let mut header_lines: Vec<String> = Vec::new();
        let mut move_lines: Vec<String> = Vec::new();
        let mut past_headers = false;

        loop {
            let line = match self.read_line()? {
                Some(l) => l,
                None => break,
            };
            let trimmed = line.trim_end().to_string();

            if trimmed.trim().is_empty() {
                if !move_lines.is_empty() {
                    break;
                }
                if !header_lines.is_empty() {
                    past_headers = true;
                }
                continue;
            }

            if trimmed.starts_with('[') {
                if !move_lines.is_empty() || past_headers {
                    // First header of the following game.
                    self.pushback = Some(line);
                    break;
                }
                header_lines.push(trimmed);
            } else {
                move_lines.push(trimmed);
            }
        }

        if header_lines.is_empty() && move_lines.is_empty() {
            Ok(None)
        } else {
            Ok(Some(GameChunk {
                header_lines,
                move_lines,
            }))
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, CoreError> {
        if let Some(line) = self.pushback.take() {
            return Ok(Some(line));
        }
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }

    fn parse_headers(&self, header_lines: &[String]) -> GameHeaders {
        let mut headers = GameHeaders::default();
        for line in header_lines {
            for cap in self.header_re.captures_iter(line) {
                let value = cap[2].to_string();
                match &cap[1] {
                    "White" => headers.white = value,
                    "Black" => headers.black = value,
                    "Date" => headers.date = value,
                    "Opening" => headers.opening = value,
                    "Event" => headers.event = value,
                    "Source" => headers.source = value,
                    _ => {}
                }
            }
        }
        headers
    }

    /// Extract mainline SAN moves from movetext (comments, variations and
    /// move numbers removed).
    fn extract_moves(&self, movetext: &str) -> Vec<String> {
        let no_comments = self.comment_re.replace_all(movetext, "");

        // Innermost-out so nested variations disappear too.
        let mut no_variations = no_comments.into_owned();
        loop {
            let replaced = self
                .variation_re
                .replace_all(&no_variations, "")
                .into_owned();
            if replaced == no_variations {
                break;
            }
            no_variations = replaced;
        }

        self.move_re
            .find_iter(&no_variations)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
