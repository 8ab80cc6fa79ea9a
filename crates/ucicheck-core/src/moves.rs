//! `bestmove` parsing with an explicit long-algebraic grammar:
//! two squares (`[a-h][1-8]`) and an optional promotion letter (`[qrbn]`).

use std::fmt;

/// A syntactically valid UCI move token. Legality is not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UciMove(String);

impl UciMove {
    pub fn parse(token: &str) -> Option<Self> {
        let b = token.as_bytes();
        let well_formed = match b.len() {
            4 => is_square(b[0], b[1]) && is_square(b[2], b[3]),
            5 => is_square(b[0], b[1]) && is_square(b[2], b[3]) && is_promotion(b[4]),
            _ => false,
        };
        well_formed.then(|| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_square(file: u8, rank: u8) -> bool {
    (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank)
}

fn is_promotion(c: u8) -> bool {
    matches!(c, b'q' | b'r' | b'b' | b'n')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestMoveError {
    /// `bestmove` with no move token.
    Missing,
    /// The token after `bestmove` does not follow the move grammar.
    Malformed(String),
}

/// True when the first whitespace token of `line` is `bestmove`.
pub fn is_bestmove_line(line: &str) -> bool {
    line.split_whitespace().next() == Some("bestmove")
}

/// Extract the move from a `bestmove <move> [ponder <move>]` line.
pub fn parse_bestmove(line: &str) -> Result<UciMove, BestMoveError> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("bestmove") {
        return Err(BestMoveError::Missing);
    }
    let token = tokens.next().ok_or(BestMoveError::Missing)?;
    UciMove::parse(token).ok_or_else(|| BestMoveError::Malformed(token.to_string()))
}
