use crate::models::game_session::{GameSession, GameSessionUpdate, GameStatus, MAX_PLAYERS};
use crate::repositories::errors::game_repository_errors::GameSessionRepositoryError;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_item, to_item};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

pub struct DynamoDbGameSessionRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbGameSessionRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GameSessionRepository: Send + Sync {
    async fn create_game_session(
        &self,
        game_session: &GameSession,
    ) -> Result<(), GameSessionRepositoryError>;

    async fn get_game_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GameSession>, GameSessionRepositoryError>;

    /// Merges `update` into the stored session and returns the new stored state.
    async fn update_game_session(
        &self,
        session_id: &str,
        update: &GameSessionUpdate,
    ) -> Result<GameSession, GameSessionRepositoryError>;

    /// Deletes the session. With `expected_version` set the delete only
    /// succeeds if the stored session is still at that version.
    async fn delete_game_session(
        &self,
        session_id: &str,
        expected_version: Option<u64>,
    ) -> Result<(), GameSessionRepositoryError>;

    async fn list_game_sessions_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<GameSession>, GameSessionRepositoryError>;
}

/// Applies a partial update in place, enforcing the session invariants, and bumps the version.
pub fn merge_update(
    session: &mut GameSession,
    update: &GameSessionUpdate,
) -> Result<(), GameSessionRepositoryError> {
    if let Some(expected) = update.expected_version {
        if expected != session.version {
            return Err(GameSessionRepositoryError::VersionConflict {
                expected,
                actual: session.version,
            });
        }
    }

    if let Some(players) = &update.players {
        if players.len() > MAX_PLAYERS {
            return Err(GameSessionRepositoryError::InvalidUpdate(format!(
                "a session holds at most {} players",
                MAX_PLAYERS
            )));
        }
        if !players.starts_with(&session.players) {
            return Err(GameSessionRepositoryError::InvalidUpdate(
                "existing participants cannot be replaced".to_string(),
            ));
        }
        if players.len() == MAX_PLAYERS && players[0].color == players[1].color {
            return Err(GameSessionRepositoryError::InvalidUpdate(
                "participants must play opposite colors".to_string(),
            ));
        }
    }

    if let Some(history) = &update.history {
        if !history.starts_with(&session.history) {
            return Err(GameSessionRepositoryError::InvalidUpdate(
                "move history is append-only".to_string(),
            ));
        }
    }

    if let Some(status) = &update.status {
        if session.status.is_finished() && !status.is_finished() {
            return Err(GameSessionRepositoryError::InvalidUpdate(
                "a finished session cannot be restarted".to_string(),
            ));
        }
    }

    if let Some(players) = &update.players {
        session.players = players.clone();
    }
    if let Some(position) = &update.position {
        session.position = position.clone();
    }
    if let Some(history) = &update.history {
        session.history = history.clone();
    }
    if let Some(status) = update.status {
        session.status = status;
    }
    session.version += 1;

    Ok(())
}

#[async_trait]
impl GameSessionRepository for DynamoDbGameSessionRepository {
    async fn create_game_session(
        &self,
        game_session: &GameSession,
    ) -> Result<(), GameSessionRepositoryError> {
        let item = to_item(game_session)
            .map_err(|e| GameSessionRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(session_id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    Err(GameSessionRepositoryError::AlreadyExists)
                } else {
                    Err(GameSessionRepositoryError::DynamoDb(service_error.to_string()))
                }
            }
        }
    }

    async fn get_game_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GameSession>, GameSessionRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("session_id", AttributeValue::S(session_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| GameSessionRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            let game_session: GameSession = from_item(item)
                .map_err(|e| GameSessionRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(game_session))
        } else {
            Ok(None)
        }
    }

    async fn update_game_session(
        &self,
        session_id: &str,
        update: &GameSessionUpdate,
    ) -> Result<GameSession, GameSessionRepositoryError> {
        let mut game_session = self
            .get_game_session(session_id)
            .await?
            .ok_or(GameSessionRepositoryError::NotFound)?;
        let read_version = game_session.version;

        merge_update(&mut game_session, update)?;

        let item = to_item(&game_session)
            .map_err(|e| GameSessionRepositoryError::Serialization(e.to_string()))?;

        // The conditional put turns the read-modify-write into a compare-and-swap.
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_exists(session_id) AND version = :read_version")
            .expression_attribute_values(
                ":read_version",
                AttributeValue::N(read_version.to_string()),
            )
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(
                    "Updated game session {} to version {}",
                    session_id, game_session.version
                );
                Ok(game_session)
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_conditional_check_failed_exception() {
                    return Err(GameSessionRepositoryError::DynamoDb(
                        service_error.to_string(),
                    ));
                }
                match self.get_game_session(session_id).await? {
                    Some(current) => Err(GameSessionRepositoryError::VersionConflict {
                        expected: read_version,
                        actual: current.version,
                    }),
                    None => Err(GameSessionRepositoryError::NotFound),
                }
            }
        }
    }

    async fn delete_game_session(
        &self,
        session_id: &str,
        expected_version: Option<u64>,
    ) -> Result<(), GameSessionRepositoryError> {
        let request = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("session_id", AttributeValue::S(session_id.to_string()));
        let request = match expected_version {
            Some(version) => request
                .condition_expression("attribute_exists(session_id) AND version = :read_version")
                .expression_attribute_values(
                    ":read_version",
                    AttributeValue::N(version.to_string()),
                ),
            None => request.condition_expression("attribute_exists(session_id)"),
        };

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_conditional_check_failed_exception() {
                    return Err(GameSessionRepositoryError::DynamoDb(
                        service_error.to_string(),
                    ));
                }
                match (expected_version, self.get_game_session(session_id).await?) {
                    (Some(expected), Some(current)) => {
                        Err(GameSessionRepositoryError::VersionConflict {
                            expected,
                            actual: current.version,
                        })
                    }
                    _ => Err(GameSessionRepositoryError::NotFound),
                }
            }
        }
    }

    async fn list_game_sessions_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<GameSession>, GameSessionRepositoryError> {
        let mut sessions = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| GameSessionRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let game_session: GameSession = from_item(item)
                    .map_err(|e| GameSessionRepositoryError::Serialization(e.to_string()))?;
                if game_session.participant(player_id).is_some() {
                    sessions.push(game_session);
                }
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(sessions)
    }
}
