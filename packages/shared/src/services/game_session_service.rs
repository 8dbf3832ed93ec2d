use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    models::{
        channel_event::{BroadcastMessage, ChannelEvent},
        game_session::{GameSession, GameSessionUpdate, GameStatus, GameSummary},
        participant::{ColorChoice, PlayerIdentity},
    },
    repositories::{
        channel_repository::BroadcastChannel,
        errors::game_repository_errors::GameSessionRepositoryError,
        game_repository::GameSessionRepository,
    },
    services::errors::game_session_service_errors::GameSessionServiceError,
};

#[derive(Clone)]
pub struct GameSessionService {
    repository: Arc<dyn GameSessionRepository>,
    channel: Arc<dyn BroadcastChannel>,
}

impl GameSessionService {
    pub fn new(
        repository: Arc<dyn GameSessionRepository>,
        channel: Arc<dyn BroadcastChannel>,
    ) -> Self {
        GameSessionService {
            repository,
            channel,
        }
    }

    /// Opens a room with `player` seated at the chosen colour.
    pub async fn create_game(
        &self,
        player: &PlayerIdentity,
        color: ColorChoice,
    ) -> Result<GameSession, GameSessionServiceError> {
        let game_session = GameSession::new(player.seat(color.resolve()));
        self.repository.create_game_session(&game_session).await?;

        info!(
            "Player {} created game {} as {}",
            player.id, game_session.session_id, game_session.players[0].color
        );
        Ok(game_session)
    }

    /// Seats `player` opposite the creator and starts the game.
    ///
    /// Joining a game the player already sits in returns it unchanged.
    pub async fn join_game(
        &self,
        session_id: &str,
        player: &PlayerIdentity,
    ) -> Result<GameSession, GameSessionServiceError> {
        let game_session = self
            .repository
            .get_game_session(session_id)
            .await?
            .ok_or(GameSessionServiceError::GameNotFound)?;

        if game_session.participant(&player.id).is_some() {
            return Ok(game_session);
        }
        if game_session.is_full() {
            return Err(GameSessionServiceError::GameFull);
        }
        if game_session.status != GameStatus::Waiting {
            return Err(GameSessionServiceError::GameAlreadyStarted);
        }

        let color = match game_session.players.first() {
            Some(creator) => creator.color.opposite(),
            None => {
                return Err(GameSessionServiceError::ValidationError(
                    "game has no creator".to_string(),
                ))
            }
        };
        let participant = player.seat(color);
        let mut players = game_session.players.clone();
        players.push(participant.clone());

        let updated = self
            .repository
            .update_game_session(
                session_id,
                &GameSessionUpdate {
                    players: Some(players),
                    status: Some(GameStatus::Started),
                    expected_version: Some(game_session.version),
                    ..Default::default()
                },
            )
            .await?;

        info!("Player {} joined game {} as {}", player.id, session_id, color);

        let message = BroadcastMessage::new(&player.id, ChannelEvent::JoinGame { participant });
        if let Err(e) = self.channel.publish(session_id, &message).await {
            warn!("Failed to announce join of game {}: {}", session_id, e);
        }

        Ok(updated)
    }

    /// Deletes a game that nobody has joined yet. Only its creator may do so.
    pub async fn cancel_game(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<(), GameSessionServiceError> {
        let game_session = self
            .repository
            .get_game_session(session_id)
            .await?
            .ok_or(GameSessionServiceError::GameNotFound)?;

        if game_session.creator_id != player_id {
            return Err(GameSessionServiceError::NotCreator);
        }
        if game_session.status != GameStatus::Waiting {
            return Err(GameSessionServiceError::GameAlreadyStarted);
        }

        // A join landing after the read bumps the version and keeps the game.
        match self
            .repository
            .delete_game_session(session_id, Some(game_session.version))
            .await
        {
            Ok(()) => {
                info!("Player {} cancelled game {}", player_id, session_id);
                Ok(())
            }
            Err(GameSessionRepositoryError::VersionConflict { .. }) => {
                Err(GameSessionServiceError::GameAlreadyStarted)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_game_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GameSession>, GameSessionServiceError> {
        self.repository
            .get_game_session(session_id)
            .await
            .map_err(GameSessionServiceError::from)
    }

    /// Finished games of a player, newest first.
    pub async fn list_games_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<GameSummary>, GameSessionServiceError> {
        let mut summaries: Vec<GameSummary> = self
            .repository
            .list_game_sessions_for_player(player_id)
            .await?
            .iter()
            .filter_map(|session| GameSummary::for_player(session, player_id))
            .collect();

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}
