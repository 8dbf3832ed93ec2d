use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    models::{
        channel_event::{BroadcastMessage, ChannelEvent},
        chat_message::ChatMessage,
        game_session::{GameOutcome, GameSession, GameSessionUpdate, GameStatus},
        move_record::{MoveRecord, PromotionPiece},
        participant::{Color, Participant},
    },
    repositories::{channel_repository::BroadcastChannel, game_repository::GameSessionRepository},
    services::{chess_service::GameState, errors::sync_errors::SyncError},
};

/// A pawn move waiting for the player to pick the promotion piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPromotion {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    PendingPromotion(PendingPromotion),
}

/// What happened to a locally made move or resignation beyond the local view.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub mv: Option<MoveRecord>,
    pub status: GameStatus,
    pub persisted: bool,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Applied(MoveReport),
    PromotionRequired,
}

/// Effect of an event received from the room channel on the local view.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteUpdate {
    MoveApplied { mv: MoveRecord, status: GameStatus },
    Resigned { winner: Color },
    OpponentJoined(Participant),
    RematchOffered { new_session_id: String },
    RematchAccepted { new_session_id: String },
    Chat(ChatMessage),
    SessionRefreshed,
    SessionClosed,
    Ignored,
}

/// Keeps one player's view of a game session in step with the store and the
/// opponent.
///
/// Local moves are validated against the local engine state, written to the
/// store conditioned on the last known version, then published to the room.
/// Moves received from the room are applied to the engine state only; the
/// opponent has already stored them.
pub struct SessionSynchronizer {
    store: Arc<dyn GameSessionRepository>,
    channel: Arc<dyn BroadcastChannel>,
    player_id: String,
    local_color: Color,
    session: GameSession,
    state: GameState,
    phase: TurnPhase,
    rematch_invite: Option<String>,
    rematch_offered: Option<String>,
}

impl SessionSynchronizer {
    pub async fn connect(
        session_id: &str,
        player_id: &str,
        store: Arc<dyn GameSessionRepository>,
        channel: Arc<dyn BroadcastChannel>,
    ) -> Result<Self, SyncError> {
        let session = store
            .get_game_session(session_id)
            .await?
            .ok_or(SyncError::SessionNotFound)?;
        let local_color = session
            .participant(player_id)
            .ok_or(SyncError::NotAParticipant)?
            .color;
        let state = rebuild_state(&session)?;

        info!(
            "Player {} connected to session {} as {}",
            player_id, session_id, local_color
        );

        Ok(SessionSynchronizer {
            store,
            channel,
            player_id: player_id.to_string(),
            local_color,
            session,
            state,
            phase: TurnPhase::Idle,
            rematch_invite: None,
            rematch_offered: None,
        })
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    pub fn status(&self) -> GameStatus {
        self.session.status
    }

    pub fn position(&self) -> &str {
        &self.session.position
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.session.history
    }

    pub fn whose_turn(&self) -> Color {
        self.state.side_to_move()
    }

    pub fn local_color(&self) -> Color {
        self.local_color
    }

    pub fn opponent(&self) -> Option<&Participant> {
        self.session.player_with_color(self.local_color.opposite())
    }

    pub fn phase(&self) -> &TurnPhase {
        &self.phase
    }

    pub fn pending_promotion(&self) -> Option<&PendingPromotion> {
        match &self.phase {
            TurnPhase::PendingPromotion(pending) => Some(pending),
            TurnPhase::Idle => None,
        }
    }

    pub fn rematch_invite(&self) -> Option<&str> {
        self.rematch_invite.as_deref()
    }

    /// Legal moves from `square` in the current position, for move hints.
    pub fn legal_destinations(&self, square: &str) -> Result<Vec<MoveRecord>, SyncError> {
        self.state
            .legal_moves(Some(square))
            .map_err(SyncError::RuleViolation)
    }

    pub async fn propose_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<PromotionPiece>,
    ) -> Result<MoveOutcome, SyncError> {
        self.ensure_started()?;
        if self.pending_promotion().is_some() {
            return Err(SyncError::PromotionPending);
        }
        if self.state.side_to_move() != self.local_color {
            return Err(SyncError::NotYourTurn);
        }
        let piece_color = self
            .state
            .color_on(from)
            .map_err(SyncError::RuleViolation)?;
        if piece_color != Some(self.local_color) {
            return Err(SyncError::NotYourPiece);
        }

        let mv = match promotion {
            Some(piece) => MoveRecord::with_promotion(from, to, piece),
            None => {
                if self
                    .state
                    .requires_promotion(from, to)
                    .map_err(SyncError::RuleViolation)?
                {
                    debug!("Move {}{} waits for a promotion choice", from, to);
                    self.phase = TurnPhase::PendingPromotion(PendingPromotion {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                    return Ok(MoveOutcome::PromotionRequired);
                }
                MoveRecord::new(from, to)
            }
        };

        self.commit_local_move(mv).await.map(MoveOutcome::Applied)
    }

    pub async fn choose_promotion(&mut self, piece: PromotionPiece) -> Result<MoveReport, SyncError> {
        let pending = self
            .pending_promotion()
            .cloned()
            .ok_or(SyncError::NoPendingPromotion)?;
        self.phase = TurnPhase::Idle;

        self.commit_local_move(MoveRecord::with_promotion(&pending.from, &pending.to, piece))
            .await
    }

    pub fn cancel_promotion(&mut self) -> Result<(), SyncError> {
        if self.pending_promotion().is_none() {
            return Err(SyncError::NoPendingPromotion);
        }
        self.phase = TurnPhase::Idle;
        Ok(())
    }

    async fn commit_local_move(&mut self, mv: MoveRecord) -> Result<MoveReport, SyncError> {
        let mut next_state = self.state.clone();
        next_state.apply(&mv).map_err(SyncError::RuleViolation)?;

        let status = match next_state.outcome() {
            Some(outcome) => GameStatus::Finished(outcome),
            None => GameStatus::Started,
        };
        let mut history = self.session.history.clone();
        history.push(mv.clone());

        let update = GameSessionUpdate {
            position: Some(next_state.position()),
            history: Some(history),
            status: Some(status),
            ..Default::default()
        };
        let persisted = self.write(next_state, update).await?;
        let published = self
            .publish(ChannelEvent::MakeMove {
                mv: mv.clone(),
                ply: self.session.history.len() - 1,
                version: self.session.version,
            })
            .await;

        if let GameStatus::Finished(outcome) = status {
            info!(
                "Session {} finished by {:?}, winner {:?}",
                self.session.session_id, outcome.reason, outcome.winner
            );
        }

        Ok(MoveReport {
            mv: Some(mv),
            status,
            persisted,
            published,
        })
    }

    /// Applies `update` to the local view and writes it to the store.
    ///
    /// A version conflict restores the previous view and is returned. Any other
    /// store failure keeps the local change and reports `false`.
    async fn write(
        &mut self,
        next_state: GameState,
        update: GameSessionUpdate,
    ) -> Result<bool, SyncError> {
        let previous_session = self.session.clone();
        let previous_state = std::mem::replace(&mut self.state, next_state);

        let update = GameSessionUpdate {
            expected_version: Some(previous_session.version),
            ..update
        };
        if let Some(position) = &update.position {
            self.session.position = position.clone();
        }
        if let Some(history) = &update.history {
            self.session.history = history.clone();
        }
        if let Some(status) = update.status {
            self.session.status = status;
        }

        match self
            .store
            .update_game_session(&self.session.session_id, &update)
            .await
        {
            Ok(stored) => {
                self.session.version = stored.version;
                Ok(true)
            }
            Err(e) => match SyncError::from(e) {
                SyncError::Conflict => {
                    warn!(
                        "Session {} changed underneath player {}, rolling back",
                        self.session.session_id, self.player_id
                    );
                    self.session = previous_session;
                    self.state = previous_state;
                    Err(SyncError::Conflict)
                }
                other => {
                    error!(
                        "Failed to persist session {}: {}",
                        self.session.session_id, other
                    );
                    Ok(false)
                }
            },
        }
    }

    async fn publish(&self, event: ChannelEvent) -> bool {
        let name = event.name();
        let message = BroadcastMessage::new(&self.player_id, event);
        match self
            .channel
            .publish(&self.session.session_id, &message)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to publish {} to session {}: {}",
                    name, self.session.session_id, e
                );
                false
            }
        }
    }

    pub async fn resign(&mut self) -> Result<MoveReport, SyncError> {
        self.ensure_started()?;
        self.phase = TurnPhase::Idle;

        let outcome = GameOutcome::resignation(self.local_color);
        let status = GameStatus::Finished(outcome);
        let persisted = self
            .write(self.state.clone(), GameSessionUpdate::status(status))
            .await?;
        let published = self
            .publish(ChannelEvent::Resign {
                winner: self.local_color.opposite(),
                version: self.session.version,
            })
            .await;

        info!(
            "Player {} resigned session {}",
            self.player_id, self.session.session_id
        );

        Ok(MoveReport {
            mv: None,
            status,
            persisted,
            published,
        })
    }

    /// Dispatches an event received on the room channel. The local player's
    /// own messages are ignored, and game events are only accepted from the
    /// opponent seated in this session.
    pub async fn on_remote_event(
        &mut self,
        message: &BroadcastMessage,
    ) -> Result<RemoteUpdate, SyncError> {
        if message.sender_id == self.player_id {
            return Ok(RemoteUpdate::Ignored);
        }

        match &message.event {
            ChannelEvent::MakeMove { mv, ply, version } => {
                let Some(sender_color) = self.opponent_color(message) else {
                    return Ok(RemoteUpdate::Ignored);
                };
                if *ply == self.session.history.len() && self.state.side_to_move() != sender_color {
                    return Err(SyncError::StateDivergence(format!(
                        "move {} from {} played out of turn",
                        mv, message.sender_id
                    )));
                }
                self.on_remote_move(mv, *ply, *version)
            }
            ChannelEvent::Resign { winner, version } => {
                let Some(sender_color) = self.opponent_color(message) else {
                    return Ok(RemoteUpdate::Ignored);
                };
                if *winner != sender_color.opposite() {
                    return Err(SyncError::StateDivergence(format!(
                        "{} resigned as {} but announced {} as the winner",
                        message.sender_id, sender_color, winner
                    )));
                }
                Ok(self.on_remote_resign(sender_color, *version))
            }
            ChannelEvent::JoinGame { participant } => {
                self.resync().await?;
                Ok(RemoteUpdate::OpponentJoined(participant.clone()))
            }
            ChannelEvent::InvitePlayAgain { new_session_id } => {
                if self.opponent_color(message).is_none() {
                    return Ok(RemoteUpdate::Ignored);
                }
                self.on_rematch_offer(new_session_id).await
            }
            ChannelEvent::AcceptInvite { new_session_id } => {
                if self.opponent_color(message).is_none() {
                    return Ok(RemoteUpdate::Ignored);
                }
                if self.rematch_offered.as_deref() == Some(new_session_id.as_str()) {
                    self.rematch_offered = None;
                }
                Ok(RemoteUpdate::RematchAccepted {
                    new_session_id: new_session_id.clone(),
                })
            }
            ChannelEvent::SendMessage { message } => Ok(RemoteUpdate::Chat(message.clone())),
            ChannelEvent::SessionUpdated { session } => self.adopt(session),
            ChannelEvent::SessionDeleted { session_id } => {
                if *session_id == self.session.session_id {
                    Ok(RemoteUpdate::SessionClosed)
                } else {
                    Ok(RemoteUpdate::Ignored)
                }
            }
        }
    }

    /// Colour of the sender when it is the other player of this session.
    fn opponent_color(&self, message: &BroadcastMessage) -> Option<Color> {
        match self.session.participant(&message.sender_id) {
            Some(sender) if sender.color != self.local_color => Some(sender.color),
            _ => {
                warn!(
                    "Ignoring {} from {} who is not playing session {}",
                    message.event.name(),
                    message.sender_id,
                    self.session.session_id
                );
                None
            }
        }
    }

    /// Applies a move the opponent has already stored and published.
    ///
    /// The move must apply cleanly: anything else means the two views have
    /// diverged and the caller should `resync`.
    pub fn on_remote_move(
        &mut self,
        mv: &MoveRecord,
        ply: usize,
        version: u64,
    ) -> Result<RemoteUpdate, SyncError> {
        let known = self.session.history.len();
        if ply < known {
            if self.session.history[ply] == *mv {
                debug!("Ignoring duplicate move {} at ply {}", mv, ply);
                return Ok(RemoteUpdate::Ignored);
            }
            return Err(SyncError::StateDivergence(format!(
                "move {} at ply {} conflicts with recorded {}",
                mv, ply, self.session.history[ply]
            )));
        }
        if ply > known {
            return Err(SyncError::StateDivergence(format!(
                "move {} at ply {} but only {} moves are known",
                mv, ply, known
            )));
        }
        if self.session.status.is_finished() {
            return Err(SyncError::StateDivergence(format!(
                "move {} received after the game finished",
                mv
            )));
        }

        let mut next_state = self.state.clone();
        next_state
            .apply(mv)
            .map_err(|e| SyncError::StateDivergence(format!("remote move rejected: {}", e)))?;

        let status = match next_state.outcome() {
            Some(outcome) => GameStatus::Finished(outcome),
            None => GameStatus::Started,
        };
        self.session.position = next_state.position();
        self.session.history.push(mv.clone());
        self.session.status = status;
        self.session.version = self.session.version.max(version);
        self.state = next_state;

        Ok(RemoteUpdate::MoveApplied {
            mv: mv.clone(),
            status,
        })
    }

    fn on_remote_resign(&mut self, resigning: Color, version: u64) -> RemoteUpdate {
        if self.session.status.is_finished() {
            return RemoteUpdate::Ignored;
        }
        self.phase = TurnPhase::Idle;
        self.session.status = GameStatus::Finished(GameOutcome::resignation(resigning));
        self.session.version = self.session.version.max(version);
        RemoteUpdate::Resigned {
            winner: resigning.opposite(),
        }
    }

    /// Records a rematch invitation. When both players asked at the same
    /// time, the session with the smaller id is kept and the other withdrawn.
    async fn on_rematch_offer(&mut self, new_session_id: &str) -> Result<RemoteUpdate, SyncError> {
        if let Some(offered) = self.rematch_offered.clone() {
            if offered.as_str() <= new_session_id {
                debug!(
                    "Keeping rematch {} over crossed invite {}",
                    offered, new_session_id
                );
                return Ok(RemoteUpdate::Ignored);
            }
            if let Err(e) = self.store.delete_game_session(&offered, None).await {
                warn!("Failed to withdraw rematch {}: {}", offered, e);
            }
            info!(
                "Withdrew rematch {} in favour of crossed invite {}",
                offered, new_session_id
            );
            self.rematch_offered = None;
        }

        self.rematch_invite = Some(new_session_id.to_string());
        Ok(RemoteUpdate::RematchOffered {
            new_session_id: new_session_id.to_string(),
        })
    }

    /// Takes over a stored session announced on the channel if it is newer
    /// than the local view.
    fn adopt(&mut self, session: &GameSession) -> Result<RemoteUpdate, SyncError> {
        if session.session_id != self.session.session_id || session.version <= self.session.version
        {
            return Ok(RemoteUpdate::Ignored);
        }
        let state = rebuild_state(session)?;
        if self.session.history.len() != session.history.len() {
            self.phase = TurnPhase::Idle;
        }
        self.session = session.clone();
        self.state = state;
        Ok(RemoteUpdate::SessionRefreshed)
    }

    /// Creates the follow-up session (colours swapped) and invites the opponent.
    ///
    /// An invitation already received is accepted instead, and a repeated
    /// request re-sends the invitation for the session created earlier.
    pub async fn request_rematch(&mut self) -> Result<GameSession, SyncError> {
        if !self.session.status.is_finished() {
            return Err(SyncError::GameNotFinished);
        }
        if self.rematch_invite.is_some() {
            return self.accept_rematch().await;
        }

        let existing = match &self.rematch_offered {
            Some(offered) => self.store.get_game_session(offered).await?,
            None => None,
        };
        let rematch = match existing {
            Some(rematch) => rematch,
            None => {
                let rematch = GameSession::rematch(&self.session, &self.player_id);
                self.store.create_game_session(&rematch).await?;
                self.rematch_offered = Some(rematch.session_id.clone());
                rematch
            }
        };

        let message = BroadcastMessage::new(
            &self.player_id,
            ChannelEvent::InvitePlayAgain {
                new_session_id: rematch.session_id.clone(),
            },
        );
        self.channel
            .publish(&self.session.session_id, &message)
            .await?;

        info!(
            "Player {} offered rematch {} after session {}",
            self.player_id, rematch.session_id, self.session.session_id
        );
        Ok(rematch)
    }

    /// Starts the session of the last rematch invitation received.
    pub async fn accept_rematch(&mut self) -> Result<GameSession, SyncError> {
        let new_session_id = self
            .rematch_invite
            .clone()
            .ok_or(SyncError::NoRematchInvite)?;

        let rematch = self
            .store
            .get_game_session(&new_session_id)
            .await?
            .ok_or(SyncError::SessionNotFound)?;
        if rematch.participant(&self.player_id).is_none() {
            return Err(SyncError::NotAParticipant);
        }
        let started = self
            .store
            .update_game_session(
                &new_session_id,
                &GameSessionUpdate::status(GameStatus::Started).expecting(rematch.version),
            )
            .await?;
        self.rematch_invite = None;

        if !self
            .publish(ChannelEvent::AcceptInvite {
                new_session_id: new_session_id.clone(),
            })
            .await
        {
            warn!(
                "Rematch {} started but the opponent was not notified",
                new_session_id
            );
        }

        Ok(started)
    }

    /// Replaces the local view with the stored session.
    pub async fn resync(&mut self) -> Result<(), SyncError> {
        let session = self
            .store
            .get_game_session(&self.session.session_id)
            .await?
            .ok_or(SyncError::SessionNotFound)?;
        self.state = rebuild_state(&session)?;
        self.session = session;
        self.phase = TurnPhase::Idle;

        debug!(
            "Resynced session {} at version {}",
            self.session.session_id, self.session.version
        );
        Ok(())
    }

    fn ensure_started(&self) -> Result<(), SyncError> {
        match self.session.status {
            GameStatus::Waiting => Err(SyncError::GameNotStarted),
            GameStatus::Started => Ok(()),
            GameStatus::Finished(_) => Err(SyncError::GameFinished),
        }
    }
}

/// Replays the stored history and checks it reproduces the stored position.
fn rebuild_state(session: &GameSession) -> Result<GameState, SyncError> {
    let state = GameState::replay(&session.history).map_err(|e| {
        SyncError::StateDivergence(format!(
            "history of session {} does not replay: {}",
            session.session_id, e
        ))
    })?;
    let stored = GameState::from_position(&session.position)
        .map_err(|e| SyncError::StateDivergence(e.to_string()))?;
    if stored.hash() != state.hash() {
        return Err(SyncError::StateDivergence(format!(
            "stored position of session {} does not match its history",
            session.session_id
        )));
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game_session::EndReason;
    use crate::repositories::channel_repository::MockBroadcastChannel;
    use crate::repositories::errors::broadcast_errors::BroadcastError;
    use crate::repositories::errors::game_repository_errors::GameSessionRepositoryError;
    use crate::repositories::game_repository::MockGameSessionRepository;
    use crate::repositories::memory::{InMemoryGameSessionRepository, LocalBroadcastHub};
    use tokio::sync::broadcast::Receiver;

    struct Table {
        store: Arc<InMemoryGameSessionRepository>,
        hub: Arc<LocalBroadcastHub>,
        session_id: String,
    }

    async fn started_table() -> Table {
        let mut session = GameSession::new(Participant::new("alice", Color::White, "Alice"));
        session
            .players
            .push(Participant::new("bob", Color::Black, "Bob"));
        session.status = GameStatus::Started;
        table_with(session).await
    }

    async fn table_with(session: GameSession) -> Table {
        let store = Arc::new(InMemoryGameSessionRepository::new());
        store.create_game_session(&session).await.unwrap();
        Table {
            store,
            hub: Arc::new(LocalBroadcastHub::new()),
            session_id: session.session_id,
        }
    }

    impl Table {
        async fn seat(&self, player_id: &str) -> SessionSynchronizer {
            SessionSynchronizer::connect(
                &self.session_id,
                player_id,
                self.store.clone(),
                self.hub.clone(),
            )
            .await
            .unwrap()
        }

        fn listen(&self) -> Receiver<BroadcastMessage> {
            self.hub.subscribe(&self.session_id)
        }

        async fn stored(&self) -> GameSession {
            self.store
                .get_game_session(&self.session_id)
                .await
                .unwrap()
                .unwrap()
        }
    }

    async fn relay(from: &mut Receiver<BroadcastMessage>, to: &mut SessionSynchronizer) -> RemoteUpdate {
        let message = from.recv().await.unwrap();
        to.on_remote_event(&message).await.unwrap()
    }

    #[tokio::test]
    async fn test_local_move_is_persisted_and_published() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut channel = table.listen();

        let outcome = alice.propose_move("e2", "e4", None).await.unwrap();

        let MoveOutcome::Applied(report) = outcome else {
            panic!("expected an applied move");
        };
        assert!(report.persisted);
        assert!(report.published);
        assert_eq!(report.status, GameStatus::Started);
        assert_eq!(alice.whose_turn(), Color::Black);

        let stored = table.stored().await;
        assert_eq!(stored.history, vec![MoveRecord::new("e2", "e4")]);
        assert_eq!(stored.position, alice.position());
        assert_eq!(stored.version, alice.session().version);

        let message = channel.recv().await.unwrap();
        assert_eq!(message.sender_id, "alice");
        assert_eq!(
            message.event,
            ChannelEvent::MakeMove {
                mv: MoveRecord::new("e2", "e4"),
                ply: 0,
                version: stored.version,
            }
        );
    }

    #[tokio::test]
    async fn test_moves_converge_between_players() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;
        let mut channel = table.listen();

        alice.propose_move("e2", "e4", None).await.unwrap();
        let update = relay(&mut channel, &mut bob).await;
        assert!(matches!(update, RemoteUpdate::MoveApplied { .. }));

        bob.propose_move("e7", "e5", None).await.unwrap();
        relay(&mut channel, &mut alice).await;

        assert_eq!(alice.history(), bob.history());
        assert_eq!(alice.position(), bob.position());
        assert_eq!(alice.session().version, bob.session().version);
        assert_eq!(table.stored().await.history.len(), 2);
    }

    #[tokio::test]
    async fn test_rule_violations_change_nothing() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;
        let mut channel = table.listen();

        assert!(matches!(
            bob.propose_move("e7", "e5", None).await,
            Err(SyncError::NotYourTurn)
        ));
        assert!(matches!(
            alice.propose_move("e7", "e5", None).await,
            Err(SyncError::NotYourPiece)
        ));
        assert!(matches!(
            alice.propose_move("e2", "e5", None).await,
            Err(SyncError::RuleViolation(_))
        ));
        assert!(matches!(
            alice.propose_move("e3", "e4", None).await,
            Err(SyncError::NotYourPiece)
        ));

        assert!(alice.history().is_empty());
        assert_eq!(table.stored().await.version, 0);
        assert!(channel.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_moves_require_started_game() {
        let table = table_with(GameSession::new(Participant::new(
            "alice",
            Color::White,
            "Alice",
        )))
        .await;
        let mut alice = table.seat("alice").await;

        assert!(matches!(
            alice.propose_move("e2", "e4", None).await,
            Err(SyncError::GameNotStarted)
        ));
        assert!(matches!(alice.resign().await, Err(SyncError::GameNotStarted)));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_session_and_stranger() {
        let table = started_table().await;

        let missing = SessionSynchronizer::connect(
            "missing",
            "alice",
            table.store.clone(),
            table.hub.clone(),
        )
        .await;
        let stranger = SessionSynchronizer::connect(
            &table.session_id,
            "mallory",
            table.store.clone(),
            table.hub.clone(),
        )
        .await;

        assert!(matches!(missing, Err(SyncError::SessionNotFound)));
        assert!(matches!(stranger, Err(SyncError::NotAParticipant)));
    }

    #[tokio::test]
    async fn test_connect_detects_position_mismatch() {
        let mut session = GameSession::new(Participant::new("alice", Color::White, "Alice"));
        session.history = vec![MoveRecord::new("e2", "e4")];
        let table = table_with(session).await;

        let result = SessionSynchronizer::connect(
            &table.session_id,
            "alice",
            table.store.clone(),
            table.hub.clone(),
        )
        .await;

        assert!(matches!(result, Err(SyncError::StateDivergence(_))));
    }

    #[tokio::test]
    async fn test_promotion_waits_for_choice() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        // White can promote at once from here.
        alice.state = GameState::from_position("8/P7/8/8/8/8/8/K6k w - - 0 1").unwrap();
        alice.session.position = alice.state.position();
        table
            .store
            .update_game_session(
                &table.session_id,
                &GameSessionUpdate {
                    position: Some(alice.session.position.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        alice.session.version = 1;

        let outcome = alice.propose_move("a7", "a8", None).await.unwrap();
        assert_eq!(outcome, MoveOutcome::PromotionRequired);
        assert!(alice.history().is_empty());
        assert!(matches!(
            alice.propose_move("a1", "a2", None).await,
            Err(SyncError::PromotionPending)
        ));

        let report = alice.choose_promotion(PromotionPiece::Queen).await.unwrap();

        assert_eq!(
            report.mv,
            Some(MoveRecord::with_promotion("a7", "a8", PromotionPiece::Queen))
        );
        assert_eq!(alice.history().len(), 1);
        assert_eq!(alice.phase(), &TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_cancel_promotion() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;

        assert!(matches!(
            alice.cancel_promotion(),
            Err(SyncError::NoPendingPromotion)
        ));

        alice.phase = TurnPhase::PendingPromotion(PendingPromotion {
            from: "a7".to_string(),
            to: "a8".to_string(),
        });
        alice.cancel_promotion().unwrap();

        assert!(alice.pending_promotion().is_none());
        assert!(alice.history().is_empty());
    }

    #[tokio::test]
    async fn test_fools_mate_finishes_both_views() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;
        let mut channel = table.listen();

        for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
            let mover = if alice.whose_turn() == Color::White {
                &mut alice
            } else {
                &mut bob
            };
            mover.propose_move(from, to, None).await.unwrap();
            let message = channel.recv().await.unwrap();
            alice.on_remote_event(&message).await.unwrap();
            bob.on_remote_event(&message).await.unwrap();
        }

        let expected = GameStatus::Finished(GameOutcome {
            winner: Some(Color::Black),
            reason: EndReason::Checkmate,
        });
        assert_eq!(alice.status(), expected);
        assert_eq!(bob.status(), expected);
        assert_eq!(table.stored().await.status, expected);
        assert!(matches!(
            alice.propose_move("a2", "a3", None).await,
            Err(SyncError::GameFinished)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_remote_move_is_ignored() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;
        let mut channel = table.listen();

        alice.propose_move("e2", "e4", None).await.unwrap();
        let message = channel.recv().await.unwrap();

        bob.on_remote_event(&message).await.unwrap();
        let again = bob.on_remote_event(&message).await.unwrap();

        assert_eq!(again, RemoteUpdate::Ignored);
        assert_eq!(bob.history().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_move_failures_are_divergence() {
        let table = started_table().await;
        let mut bob = table.seat("bob").await;

        let illegal = bob.on_remote_move(&MoveRecord::new("e2", "e5"), 0, 1);
        let gap = bob.on_remote_move(&MoveRecord::new("e2", "e4"), 3, 4);

        assert!(matches!(illegal, Err(SyncError::StateDivergence(_))));
        assert!(matches!(gap, Err(SyncError::StateDivergence(_))));
        assert!(bob.history().is_empty());
    }

    #[tokio::test]
    async fn test_remote_move_is_not_persisted() {
        let session = {
            let mut session = GameSession::new(Participant::new("alice", Color::White, "Alice"));
            session
                .players
                .push(Participant::new("bob", Color::Black, "Bob"));
            session.status = GameStatus::Started;
            session
        };
        let mut store = MockGameSessionRepository::new();
        let stored = session.clone();
        store
            .expect_get_game_session()
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update_game_session().never();
        let mut channel = MockBroadcastChannel::new();
        channel.expect_publish().never();

        let mut bob = SessionSynchronizer::connect(
            &session.session_id,
            "bob",
            Arc::new(store),
            Arc::new(channel),
        )
        .await
        .unwrap();
        let update = bob
            .on_remote_move(&MoveRecord::new("e2", "e4"), 0, 1)
            .unwrap();

        assert!(matches!(update, RemoteUpdate::MoveApplied { .. }));
        assert_eq!(bob.session().version, 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_not_returned() {
        let table = started_table().await;
        let session = table.stored().await;
        let mut store = MockGameSessionRepository::new();
        store
            .expect_get_game_session()
            .returning(move |_| Ok(Some(session.clone())));
        store
            .expect_update_game_session()
            .returning(|_, _| Err(GameSessionRepositoryError::DynamoDb("unavailable".to_string())));
        let mut channel = MockBroadcastChannel::new();
        channel
            .expect_publish()
            .returning(|_, _| Err(BroadcastError::Transport("offline".to_string())));

        let mut alice = SessionSynchronizer::connect(
            &table.session_id,
            "alice",
            Arc::new(store),
            Arc::new(channel),
        )
        .await
        .unwrap();
        let outcome = alice.propose_move("d2", "d4", None).await.unwrap();

        let MoveOutcome::Applied(report) = outcome else {
            panic!("expected an applied move");
        };
        assert!(!report.persisted);
        assert!(!report.published);
        assert_eq!(alice.history().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_write_is_rejected_and_rolled_back() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut stale_alice = table.seat("alice").await;

        alice.propose_move("e2", "e4", None).await.unwrap();
        let result = stale_alice.propose_move("d2", "d4", None).await;

        assert!(matches!(result, Err(SyncError::Conflict)));
        assert!(stale_alice.history().is_empty());
        assert_eq!(stale_alice.session().version, 0);
        assert_eq!(
            table.stored().await.history,
            vec![MoveRecord::new("e2", "e4")]
        );

        stale_alice.resync().await.unwrap();
        assert_eq!(stale_alice.history(), alice.history());
    }

    #[tokio::test]
    async fn test_resignation_finishes_for_both() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;
        let mut channel = table.listen();

        let report = alice.resign().await.unwrap();
        let update = relay(&mut channel, &mut bob).await;

        let expected = GameStatus::Finished(GameOutcome {
            winner: Some(Color::Black),
            reason: EndReason::Resignation,
        });
        assert_eq!(report.status, expected);
        assert!(report.persisted);
        assert_eq!(update, RemoteUpdate::Resigned { winner: Color::Black });
        assert_eq!(bob.status(), expected);
        assert_eq!(table.stored().await.status, expected);
    }

    #[tokio::test]
    async fn test_own_messages_are_ignored() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut channel = table.listen();

        alice.propose_move("e2", "e4", None).await.unwrap();
        let echo = relay(&mut channel, &mut alice).await;

        assert_eq!(echo, RemoteUpdate::Ignored);
        assert_eq!(alice.history().len(), 1);
    }

    #[tokio::test]
    async fn test_opponent_join_reloads_session() {
        let table = table_with(GameSession::new(Participant::new(
            "alice",
            Color::White,
            "Alice",
        )))
        .await;
        let mut alice = table.seat("alice").await;
        let bob = Participant::new("bob", Color::Black, "Bob");
        table
            .store
            .update_game_session(
                &table.session_id,
                &GameSessionUpdate {
                    players: Some(vec![alice.session().players[0].clone(), bob.clone()]),
                    status: Some(GameStatus::Started),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let update = alice
            .on_remote_event(&BroadcastMessage::new(
                "bob",
                ChannelEvent::JoinGame {
                    participant: bob.clone(),
                },
            ))
            .await
            .unwrap();

        assert_eq!(update, RemoteUpdate::OpponentJoined(bob.clone()));
        assert_eq!(alice.status(), GameStatus::Started);
        assert_eq!(alice.opponent(), Some(&bob));
    }

    #[tokio::test]
    async fn test_newer_stored_session_is_adopted() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;

        alice.propose_move("e2", "e4", None).await.unwrap();
        let stored = table.stored().await;

        let update = bob
            .on_remote_event(&BroadcastMessage::from_store(ChannelEvent::SessionUpdated {
                session: stored.clone(),
            }))
            .await
            .unwrap();
        let stale = bob
            .on_remote_event(&BroadcastMessage::from_store(ChannelEvent::SessionUpdated {
                session: stored,
            }))
            .await
            .unwrap();

        assert_eq!(update, RemoteUpdate::SessionRefreshed);
        assert_eq!(stale, RemoteUpdate::Ignored);
        assert_eq!(bob.history(), alice.history());
        assert_eq!(bob.whose_turn(), Color::Black);
    }

    #[tokio::test]
    async fn test_rematch_round_trip() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;
        let mut channel = table.listen();

        assert!(matches!(
            alice.request_rematch().await,
            Err(SyncError::GameNotFinished)
        ));
        assert!(matches!(
            bob.accept_rematch().await,
            Err(SyncError::NoRematchInvite)
        ));

        alice.resign().await.unwrap();
        relay(&mut channel, &mut bob).await;

        let rematch = alice.request_rematch().await.unwrap();
        let offer = relay(&mut channel, &mut bob).await;
        assert_eq!(
            offer,
            RemoteUpdate::RematchOffered {
                new_session_id: rematch.session_id.clone()
            }
        );

        let started = bob.accept_rematch().await.unwrap();
        let accepted = relay(&mut channel, &mut alice).await;

        assert_eq!(started.session_id, rematch.session_id);
        assert_eq!(started.status, GameStatus::Started);
        assert_eq!(started.participant("alice").unwrap().color, Color::Black);
        assert_eq!(
            accepted,
            RemoteUpdate::RematchAccepted {
                new_session_id: rematch.session_id
            }
        );
        assert!(bob.rematch_invite().is_none());
    }

    #[tokio::test]
    async fn test_repeated_rematch_request_reuses_session() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;
        let mut channel = table.listen();
        alice.resign().await.unwrap();
        relay(&mut channel, &mut bob).await;

        let first = alice.request_rematch().await.unwrap();
        let second = alice.request_rematch().await.unwrap();
        relay(&mut channel, &mut bob).await;
        let repeated = relay(&mut channel, &mut bob).await;
        let started = bob.request_rematch().await.unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(
            repeated,
            RemoteUpdate::RematchOffered {
                new_session_id: first.session_id.clone()
            }
        );
        assert_eq!(started.session_id, first.session_id);
        assert_eq!(started.status, GameStatus::Started);
    }

    #[tokio::test]
    async fn test_crossed_rematch_requests_keep_one_session() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;
        let mut bob = table.seat("bob").await;
        let mut channel = table.listen();
        alice.resign().await.unwrap();
        relay(&mut channel, &mut bob).await;

        let from_alice = alice.request_rematch().await.unwrap();
        let from_bob = bob.request_rematch().await.unwrap();
        let at_bob = relay(&mut channel, &mut bob).await;
        let at_alice = relay(&mut channel, &mut alice).await;

        let (kept, withdrawn) = if from_alice.session_id < from_bob.session_id {
            (from_alice, from_bob)
        } else {
            (from_bob, from_alice)
        };
        let updates = [at_alice, at_bob];
        assert!(updates.contains(&RemoteUpdate::Ignored));
        assert!(updates.contains(&RemoteUpdate::RematchOffered {
            new_session_id: kept.session_id.clone()
        }));
        assert!(table
            .store
            .get_game_session(&withdrawn.session_id)
            .await
            .unwrap()
            .is_none());

        let invited = if kept.creator_id == "alice" {
            &mut bob
        } else {
            &mut alice
        };
        let started = invited.accept_rematch().await.unwrap();
        assert_eq!(started.session_id, kept.session_id);
        assert_eq!(started.status, GameStatus::Started);
    }

    #[tokio::test]
    async fn test_resignation_must_name_the_opponent_as_winner() {
        let table = started_table().await;
        let mut bob = table.seat("bob").await;

        let result = bob
            .on_remote_event(&BroadcastMessage::new(
                "alice",
                ChannelEvent::Resign {
                    winner: Color::White,
                    version: 1,
                },
            ))
            .await;

        assert!(matches!(result, Err(SyncError::StateDivergence(_))));
        assert_eq!(bob.status(), GameStatus::Started);
    }

    #[tokio::test]
    async fn test_game_events_from_outside_the_session_are_ignored() {
        let table = started_table().await;
        let mut bob = table.seat("bob").await;
        let events = [
            ChannelEvent::MakeMove {
                mv: MoveRecord::new("e2", "e4"),
                ply: 0,
                version: 1,
            },
            ChannelEvent::Resign {
                winner: Color::Black,
                version: 1,
            },
            ChannelEvent::InvitePlayAgain {
                new_session_id: "elsewhere".to_string(),
            },
        ];

        for event in events {
            let update = bob
                .on_remote_event(&BroadcastMessage::new("mallory", event))
                .await
                .unwrap();
            assert_eq!(update, RemoteUpdate::Ignored);
        }

        assert!(bob.history().is_empty());
        assert_eq!(bob.status(), GameStatus::Started);
        assert!(bob.rematch_invite().is_none());
    }

    #[tokio::test]
    async fn test_opponent_move_out_of_turn_is_divergence() {
        let table = started_table().await;
        let mut alice = table.seat("alice").await;

        let result = alice
            .on_remote_event(&BroadcastMessage::new(
                "bob",
                ChannelEvent::MakeMove {
                    mv: MoveRecord::new("e7", "e5"),
                    ply: 0,
                    version: 1,
                },
            ))
            .await;

        assert!(matches!(result, Err(SyncError::StateDivergence(_))));
        assert!(alice.history().is_empty());
    }

    #[tokio::test]
    async fn test_legal_destinations() {
        let table = started_table().await;
        let alice = table.seat("alice").await;

        let moves = alice.legal_destinations("g1").unwrap();

        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&MoveRecord::new("g1", "f3")));
        assert!(matches!(
            alice.legal_destinations("x1"),
            Err(SyncError::RuleViolation(_))
        ));
    }
}
