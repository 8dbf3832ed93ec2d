use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::move_record::MoveRecord;
use crate::models::participant::{Color, Participant};

pub const INITIAL_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const MAX_PLAYERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    Repetition,
    MoveRule,
    Draw,
    Resignation,
}

impl EndReason {
    /// Reasons that end the game without a winner.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            EndReason::Stalemate
                | EndReason::InsufficientMaterial
                | EndReason::Repetition
                | EndReason::MoveRule
                | EndReason::Draw
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub winner: Option<Color>,
    pub reason: EndReason,
}

impl GameOutcome {
    /// Outcome of a game that ended with `to_move` unable to continue (or resigning).
    pub fn against(to_move: Color, reason: EndReason) -> Self {
        let winner = if reason.is_draw() {
            None
        } else {
            Some(to_move.opposite())
        };
        GameOutcome { winner, reason }
    }

    pub fn resignation(resigning: Color) -> Self {
        GameOutcome::against(resigning, EndReason::Resignation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Started,
    Finished(GameOutcome),
}

impl GameStatus {
    pub fn outcome(&self) -> Option<&GameOutcome> {
        match self {
            GameStatus::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, GameStatus::Finished(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub creator_id: String,
    pub players: Vec<Participant>,
    pub position: String,
    pub history: Vec<MoveRecord>,
    pub status: GameStatus,
    #[serde(default)]
    pub rematch_of: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl GameSession {
    pub fn new(creator: Participant) -> Self {
        GameSession {
            session_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            creator_id: creator.id.clone(),
            players: vec![creator],
            position: INITIAL_POSITION.to_string(),
            history: vec![],
            status: GameStatus::Waiting,
            rematch_of: None,
            version: 0,
        }
    }

    /// A fresh room for the same two players with colours swapped, created by `requester_id`.
    pub fn rematch(previous: &GameSession, requester_id: &str) -> Self {
        let players = previous
            .players
            .iter()
            .map(|p| Participant::new(&p.id, p.color.opposite(), &p.name))
            .collect();

        GameSession {
            session_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            creator_id: requester_id.to_string(),
            players,
            position: INITIAL_POSITION.to_string(),
            history: vec![],
            status: GameStatus::Waiting,
            rematch_of: Some(previous.session_id.clone()),
            version: 0,
        }
    }

    pub fn participant(&self, player_id: &str) -> Option<&Participant> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_with_color(&self, color: Color) -> Option<&Participant> {
        self.players.iter().find(|p| p.color == color)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.status.outcome()
    }
}

/// Partial update merged into a stored session.
///
/// With `expected_version` set the write only succeeds if the stored session is
/// still at that version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameSessionUpdate {
    pub players: Option<Vec<Participant>>,
    pub position: Option<String>,
    pub history: Option<Vec<MoveRecord>>,
    pub status: Option<GameStatus>,
    pub expected_version: Option<u64>,
}

impl GameSessionUpdate {
    pub fn status(status: GameStatus) -> Self {
        GameSessionUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerResult {
    Won,
    Lost,
    Draw,
}

/// A finished game as seen by one of its players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub session_id: String,
    pub white: Option<Participant>,
    pub black: Option<Participant>,
    pub outcome: GameOutcome,
    pub result: PlayerResult,
    pub moves: usize,
    pub created_at: DateTime<Utc>,
}

impl GameSummary {
    pub fn for_player(session: &GameSession, player_id: &str) -> Option<Self> {
        let outcome = *session.outcome()?;
        let player = session.participant(player_id)?;
        let result = match outcome.winner {
            None => PlayerResult::Draw,
            Some(winner) if winner == player.color => PlayerResult::Won,
            Some(_) => PlayerResult::Lost,
        };

        Some(GameSummary {
            session_id: session.session_id.clone(),
            white: session.player_with_color(Color::White).cloned(),
            black: session.player_with_color(Color::Black).cloned(),
            outcome,
            result,
            moves: session.history.len(),
            created_at: session.created_at,
        })
    }
}
