use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromotionPiece {
    #[serde(rename = "q")]
    Queen,
    #[serde(rename = "r")]
    Rook,
    #[serde(rename = "b")]
    Bishop,
    #[serde(rename = "n")]
    Knight,
}

impl PromotionPiece {
    pub fn as_char(&self) -> char {
        match self {
            PromotionPiece::Queen => 'q',
            PromotionPiece::Rook => 'r',
            PromotionPiece::Bishop => 'b',
            PromotionPiece::Knight => 'n',
        }
    }
}

impl FromStr for PromotionPiece {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "q" => Ok(PromotionPiece::Queen),
            "r" => Ok(PromotionPiece::Rook),
            "b" => Ok(PromotionPiece::Bishop),
            "n" => Ok(PromotionPiece::Knight),
            other => Err(format!("Invalid promotion piece: {}", other)),
        }
    }
}

impl From<PromotionPiece> for chess::Piece {
    fn from(piece: PromotionPiece) -> Self {
        match piece {
            PromotionPiece::Queen => chess::Piece::Queen,
            PromotionPiece::Rook => chess::Piece::Rook,
            PromotionPiece::Bishop => chess::Piece::Bishop,
            PromotionPiece::Knight => chess::Piece::Knight,
        }
    }
}

/// One entry of a session's move history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionPiece>,
}

impl MoveRecord {
    pub fn new(from: &str, to: &str) -> Self {
        MoveRecord {
            from: from.to_string(),
            to: to.to_string(),
            promotion: None,
        }
    }

    pub fn with_promotion(from: &str, to: &str, promotion: PromotionPiece) -> Self {
        MoveRecord {
            from: from.to_string(),
            to: to.to_string(),
            promotion: Some(promotion),
        }
    }
}

/// Long algebraic form, e.g. `e2e4` or `a7a8q`.
impl std::fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece.as_char())?;
        }
        Ok(())
    }
}
