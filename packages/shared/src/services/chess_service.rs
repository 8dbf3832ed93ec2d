use chess::{BitBoard, Board, BoardStatus, ChessMove, MoveGen, Piece, Rank, Square};
use std::collections::HashMap;
use std::str::FromStr;

use crate::{
    models::{
        game_session::{EndReason, GameOutcome, INITIAL_POSITION},
        move_record::{MoveRecord, PromotionPiece},
        participant::Color,
    },
    services::errors::chess_service_errors::ChessServiceError,
};

/// Half-moves without a capture or pawn move after which the game is drawn.
const MOVE_RULE_HALFMOVES: u32 = 100;
const REPETITION_LIMIT: u32 = 3;

/// Engine state for one game.
///
/// A bare FEN position cannot tell whether a position has been repeated, so
/// the state also counts occurrences of every position reached.
#[derive(Debug, Clone)]
pub struct GameState {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
    repetitions: HashMap<u64, u32>,
}

impl GameState {
    pub fn new() -> Self {
        Self::at(Board::default(), 0, 1)
    }

    pub fn from_position(position: &str) -> Result<Self, ChessServiceError> {
        let board = Board::from_str(position)
            .map_err(|e| ChessServiceError::InvalidPosition(format!("Invalid FEN: {}", e)))?;

        let mut counters = position.split_whitespace().skip(4);
        let halfmove_clock = counters.next().and_then(|f| f.parse().ok()).unwrap_or(0);
        let fullmove_number = counters.next().and_then(|f| f.parse().ok()).unwrap_or(1);

        Ok(Self::at(board, halfmove_clock, fullmove_number))
    }

    /// Rebuilds the state of a game from the standard start and its move history.
    pub fn replay(history: &[MoveRecord]) -> Result<Self, ChessServiceError> {
        Self::replay_from(INITIAL_POSITION, history)
    }

    pub fn replay_from(position: &str, history: &[MoveRecord]) -> Result<Self, ChessServiceError> {
        let mut state = Self::from_position(position)?;
        for mv in history {
            state.apply(mv)?;
        }
        Ok(state)
    }

    fn at(board: Board, halfmove_clock: u32, fullmove_number: u32) -> Self {
        let mut repetitions = HashMap::new();
        repetitions.insert(board.get_hash(), 1);
        GameState {
            board,
            halfmove_clock,
            fullmove_number,
            repetitions,
        }
    }

    /// FEN of the current position, with real move counters.
    pub fn position(&self) -> String {
        let fen = self.board.to_string();
        let fields: Vec<&str> = fen.split_whitespace().take(4).collect();
        format!(
            "{} {} {}",
            fields.join(" "),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    /// Zobrist hash of the position, independent of move counters.
    pub fn hash(&self) -> u64 {
        self.board.get_hash()
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move().into()
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn color_on(&self, square: &str) -> Result<Option<Color>, ChessServiceError> {
        let square = parse_square(square)?;
        Ok(self.board.color_on(square).map(Color::from))
    }

    /// True when moving from `from` to `to` is a legal pawn promotion that
    /// still needs the piece to be chosen.
    pub fn requires_promotion(&self, from: &str, to: &str) -> Result<bool, ChessServiceError> {
        let source = parse_square(from)?;
        let dest = parse_square(to)?;

        if self.board.piece_on(source) != Some(Piece::Pawn) {
            return Ok(false);
        }
        let last_rank = match self.board.side_to_move() {
            chess::Color::White => Rank::Eighth,
            chess::Color::Black => Rank::First,
        };
        if dest.get_rank() != last_rank {
            return Ok(false);
        }

        Ok(self
            .board
            .legal(ChessMove::new(source, dest, Some(Piece::Queen))))
    }

    /// Legal moves for the side to move, optionally only those leaving `from`.
    pub fn legal_moves(&self, from: Option<&str>) -> Result<Vec<MoveRecord>, ChessServiceError> {
        let source = from.map(parse_square).transpose()?;

        Ok(MoveGen::new_legal(&self.board)
            .filter(|m| source.map_or(true, |s| m.get_source() == s))
            .map(to_record)
            .collect())
    }

    pub fn is_legal(&self, mv: &MoveRecord) -> bool {
        to_chess_move(mv).is_ok_and(|m| self.board.legal(m))
    }

    pub fn apply(&mut self, mv: &MoveRecord) -> Result<(), ChessServiceError> {
        if let Some(reason) = self.end_reason() {
            return Err(ChessServiceError::GameOver(format!(
                "no moves after {:?}",
                reason
            )));
        }

        let chess_move = to_chess_move(mv)?;
        if !self.board.legal(chess_move) {
            return Err(ChessServiceError::IllegalMove(mv.to_string()));
        }

        let irreversible = self.board.piece_on(chess_move.get_source()) == Some(Piece::Pawn)
            || self.board.piece_on(chess_move.get_dest()).is_some();
        if irreversible {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if self.board.side_to_move() == chess::Color::Black {
            self.fullmove_number += 1;
        }

        self.board = self.board.make_move_new(chess_move);
        *self.repetitions.entry(self.board.get_hash()).or_insert(0) += 1;

        Ok(())
    }

    /// Why the game is over, if it is.
    ///
    /// Checked in order: checkmate, stalemate, insufficient material,
    /// threefold repetition, the fifty-move rule.
    pub fn end_reason(&self) -> Option<EndReason> {
        match self.board.status() {
            BoardStatus::Checkmate => return Some(EndReason::Checkmate),
            BoardStatus::Stalemate => return Some(EndReason::Stalemate),
            BoardStatus::Ongoing => {}
        }

        if self.has_insufficient_material() {
            Some(EndReason::InsufficientMaterial)
        } else if self.repetitions.get(&self.hash()).copied().unwrap_or(0) >= REPETITION_LIMIT {
            Some(EndReason::Repetition)
        } else if self.halfmove_clock >= MOVE_RULE_HALFMOVES {
            Some(EndReason::MoveRule)
        } else {
            None
        }
    }

    /// The result of the game when it is over; the side to move is the one
    /// that cannot continue.
    pub fn outcome(&self) -> Option<GameOutcome> {
        self.end_reason()
            .map(|reason| GameOutcome::against(self.side_to_move(), reason))
    }

    pub fn is_game_over(&self) -> bool {
        self.end_reason().is_some()
    }

    fn has_insufficient_material(&self) -> bool {
        let board = &self.board;
        let mating_material = *board.pieces(Piece::Pawn)
            | *board.pieces(Piece::Rook)
            | *board.pieces(Piece::Queen);
        if mating_material.popcnt() > 0 {
            return false;
        }

        let knights = board.pieces(Piece::Knight).popcnt();
        let bishops = *board.pieces(Piece::Bishop);
        match (knights, bishops.popcnt()) {
            (0, 0) | (1, 0) | (0, 1) => true,
            (0, _) => same_square_color(bishops),
            _ => false,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

fn same_square_color(squares: BitBoard) -> bool {
    let mut colors = squares.map(|sq| (sq.get_rank().to_index() + sq.get_file().to_index()) % 2);
    match colors.next() {
        Some(first) => colors.all(|c| c == first),
        None => true,
    }
}

fn parse_square(square: &str) -> Result<Square, ChessServiceError> {
    Square::from_str(square).map_err(|_| ChessServiceError::InvalidSquare(square.to_string()))
}

fn to_chess_move(mv: &MoveRecord) -> Result<ChessMove, ChessServiceError> {
    Ok(ChessMove::new(
        parse_square(&mv.from)?,
        parse_square(&mv.to)?,
        mv.promotion.map(Piece::from),
    ))
}

fn to_record(chess_move: ChessMove) -> MoveRecord {
    let promotion = match chess_move.get_promotion() {
        Some(Piece::Queen) => Some(PromotionPiece::Queen),
        Some(Piece::Rook) => Some(PromotionPiece::Rook),
        Some(Piece::Bishop) => Some(PromotionPiece::Bishop),
        Some(Piece::Knight) => Some(PromotionPiece::Knight),
        _ => None,
    };
    MoveRecord {
        from: chess_move.get_source().to_string(),
        to: chess_move.get_dest().to_string(),
        promotion,
    }
}

/// Rules queries on bare FEN positions, for callers that hold no game state.
///
/// Without history, repetition can never be detected here.
#[derive(Clone, Default)]
pub struct ChessService;

impl ChessService {
    pub fn new() -> Self {
        ChessService
    }

    /// Legal moves of the side to move (for UI hints), optionally from one square.
    pub fn legal_moves(
        &self,
        position: &str,
        from: Option<&str>,
    ) -> Result<Vec<MoveRecord>, ChessServiceError> {
        GameState::from_position(position)?.legal_moves(from)
    }

    /// Validates `mv` against `position` and returns the resulting position.
    pub fn apply_move(&self, position: &str, mv: &MoveRecord) -> Result<String, ChessServiceError> {
        let mut state = GameState::from_position(position)?;
        state.apply(mv)?;
        Ok(state.position())
    }

    pub fn is_game_over(&self, position: &str) -> Result<bool, ChessServiceError> {
        Ok(GameState::from_position(position)?.is_game_over())
    }

    pub fn end_reason(&self, position: &str) -> Result<Option<EndReason>, ChessServiceError> {
        Ok(GameState::from_position(position)?.end_reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn play(state: &mut GameState, moves: &[&str]) {
        for uci in moves {
            let mv = MoveRecord::new(&uci[0..2], &uci[2..4]);
            state.apply(&mv).unwrap();
        }
    }

    #[test]
    fn test_apply_valid_move() {
        let mut state = GameState::new();

        state.apply(&MoveRecord::new("e2", "e4")).unwrap();

        assert_eq!(state.side_to_move(), Color::Black);
        assert_eq!(state.color_on("e4").unwrap(), Some(Color::White));
        assert_eq!(state.color_on("e2").unwrap(), None);
        assert!(state.end_reason().is_none());
        assert_ne!(state.position(), INITIAL_POSITION);
    }

    #[test]
    fn test_apply_illegal_move_leaves_state() {
        let mut state = GameState::new();
        let before = state.position();

        let result = state.apply(&MoveRecord::new("e2", "e5"));

        assert!(matches!(result, Err(ChessServiceError::IllegalMove(_))));
        assert_eq!(state.position(), before);
    }

    #[test]
    fn test_invalid_square() {
        let mut state = GameState::new();

        let result = state.apply(&MoveRecord::new("z9", "e4"));

        assert_eq!(
            result,
            Err(ChessServiceError::InvalidSquare("z9".to_string()))
        );
    }

    #[test]
    fn test_invalid_position() {
        assert!(matches!(
            GameState::from_position("not a position"),
            Err(ChessServiceError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_position_tracks_move_counters() {
        let mut state = GameState::new();
        play(&mut state, &["g1f3", "g8f6"]);

        let position = state.position();

        assert!(position.ends_with(" 2 2"), "unexpected counters in {}", position);
        let restored = GameState::from_position(&position).unwrap();
        assert_eq!(restored.hash(), state.hash());
        assert_eq!(restored.halfmove_clock(), 2);
    }

    #[test]
    fn test_legal_moves_starting_position() {
        let state = GameState::new();

        let all = state.legal_moves(None).unwrap();
        let from_b1 = state.legal_moves(Some("b1")).unwrap();

        assert_eq!(all.len(), 20);
        assert!(all.contains(&MoveRecord::new("d2", "d4")));
        assert_eq!(from_b1.len(), 2);
        assert!(from_b1.contains(&MoveRecord::new("b1", "c3")));
    }

    #[test]
    fn test_promotion_requires_choice() {
        let mut state = GameState::from_position("8/P7/8/8/8/8/8/K6k w - - 0 1").unwrap();

        assert!(state.requires_promotion("a7", "a8").unwrap());
        assert!(!state.requires_promotion("a1", "a2").unwrap());
        assert!(matches!(
            state.apply(&MoveRecord::new("a7", "a8")),
            Err(ChessServiceError::IllegalMove(_))
        ));

        state
            .apply(&MoveRecord::with_promotion("a7", "a8", PromotionPiece::Knight))
            .unwrap();
        assert!(state.position().starts_with("N7/"));
    }

    #[test]
    fn test_promotion_moves_listed_with_piece() {
        let state = GameState::from_position("8/P7/8/8/8/8/8/K6k w - - 0 1").unwrap();

        let moves = state.legal_moves(Some("a7")).unwrap();

        assert_eq!(moves.len(), 4);
        assert!(moves.contains(&MoveRecord::with_promotion(
            "a7",
            "a8",
            PromotionPiece::Queen
        )));
    }

    #[test]
    fn test_fools_mate_is_checkmate_for_black() {
        let mut state = GameState::new();

        play(&mut state, &["f2f3", "e7e5", "g2g4", "d8h4"]);

        assert_eq!(state.end_reason(), Some(EndReason::Checkmate));
        assert_eq!(
            state.outcome(),
            Some(GameOutcome {
                winner: Some(Color::Black),
                reason: EndReason::Checkmate,
            })
        );
        assert!(matches!(
            state.apply(&MoveRecord::new("a2", "a3")),
            Err(ChessServiceError::GameOver(_))
        ));
    }

    #[test]
    fn test_stalemate_has_no_winner() {
        let mut state = GameState::from_position("7k/8/6K1/8/8/8/8/5Q2 w - - 0 1").unwrap();

        state.apply(&MoveRecord::new("f1", "f7")).unwrap();

        assert_eq!(
            state.outcome(),
            Some(GameOutcome {
                winner: None,
                reason: EndReason::Stalemate,
            })
        );
    }

    #[rstest]
    #[case::bare_kings("8/8/8/4k3/8/8/8/4K3 w - - 0 1", true)]
    #[case::king_and_knight("8/8/8/4k3/8/8/8/4KN2 w - - 0 1", true)]
    #[case::king_and_bishop("8/8/8/4k3/8/8/8/4KB2 b - - 0 1", true)]
    #[case::bishops_on_same_color("5b2/8/8/4k3/8/8/8/2B1K3 w - - 0 1", true)]
    #[case::bishops_on_opposite_colors("2b5/8/8/4k3/8/8/8/2B1K3 w - - 0 1", false)]
    #[case::two_knights("8/8/8/4k3/8/8/8/3NKN2 w - - 0 1", false)]
    #[case::king_and_rook("8/8/8/4k3/8/8/8/4KR2 w - - 0 1", false)]
    #[case::king_and_pawn("8/8/8/4k3/8/8/4P3/4K3 w - - 0 1", false)]
    fn test_insufficient_material(#[case] position: &str, #[case] drawn: bool) {
        let state = GameState::from_position(position).unwrap();

        assert_eq!(
            state.end_reason() == Some(EndReason::InsufficientMaterial),
            drawn
        );
    }

    #[test]
    fn test_threefold_repetition() {
        let mut state = GameState::new();

        play(
            &mut state,
            &["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1"],
        );
        assert!(state.end_reason().is_none());

        play(&mut state, &["f6g8"]);
        assert_eq!(
            state.outcome(),
            Some(GameOutcome {
                winner: None,
                reason: EndReason::Repetition,
            })
        );
    }

    #[test]
    fn test_fifty_move_rule() {
        let mut state = GameState::from_position("8/8/8/4k3/8/8/8/R3K3 w - - 99 60").unwrap();
        assert!(state.end_reason().is_none());

        state.apply(&MoveRecord::new("a1", "a2")).unwrap();

        assert_eq!(state.end_reason(), Some(EndReason::MoveRule));
    }

    #[test]
    fn test_pawn_move_resets_halfmove_clock() {
        let mut state = GameState::from_position("8/8/8/4k3/8/8/4P3/R3K3 w - - 99 60").unwrap();

        state.apply(&MoveRecord::new("e2", "e3")).unwrap();

        assert_eq!(state.halfmove_clock(), 0);
        assert!(state.end_reason().is_none());
    }

    #[test]
    fn test_replay_matches_incremental_play() {
        let history = vec![
            MoveRecord::new("e2", "e4"),
            MoveRecord::new("c7", "c5"),
            MoveRecord::new("g1", "f3"),
        ];
        let mut incremental = GameState::new();
        for mv in &history {
            incremental.apply(mv).unwrap();
        }

        let replayed = GameState::replay(&history).unwrap();

        assert_eq!(replayed.hash(), incremental.hash());
        assert_eq!(replayed.position(), incremental.position());
    }

    #[test]
    fn test_chess_service_on_positions() {
        let chess_service = ChessService::new();

        let next = chess_service
            .apply_move(INITIAL_POSITION, &MoveRecord::new("e2", "e4"))
            .unwrap();

        assert_eq!(chess_service.legal_moves(&next, Some("e7")).unwrap().len(), 2);
        assert!(!chess_service.is_game_over(&next).unwrap());
        assert_eq!(
            chess_service
                .end_reason("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1")
                .unwrap(),
            Some(EndReason::Stalemate)
        );
    }

    proptest::proptest! {
        #[test]
        fn legal_moves_from_a_square_are_a_subset(square in "[a-h][1-8]") {
            let mut state = GameState::new();
            play(&mut state, &["e2e4", "d7d5", "g1f3"]);

            let all = state.legal_moves(None).unwrap();
            let from_square = state.legal_moves(Some(&square)).unwrap();

            for mv in &from_square {
                proptest::prop_assert_eq!(&mv.from, &square);
                proptest::prop_assert!(all.contains(mv));
            }
        }
    }
}
