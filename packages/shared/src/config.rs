use std::env;

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    MissingVar(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "{} environment variable must be set", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings shared by every Lambda in the workspace, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub game_sessions_table: String,
    pub chat_messages_table: String,
    pub room_connections_table: String,
    pub websocket_api_endpoint: Option<String>,
    pub jwt_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        Ok(AppConfig {
            game_sessions_table: required("GAME_SESSIONS_TABLE")?,
            chat_messages_table: required("CHAT_MESSAGES_TABLE")?,
            room_connections_table: required("ROOM_CONNECTIONS_TABLE")?,
            websocket_api_endpoint: lookup("WEBSOCKET_API_ENDPOINT"),
            jwt_secret: lookup("JWT_SECRET"),
        })
    }

    pub fn require_jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .ok_or(ConfigError::MissingVar("JWT_SECRET"))
    }

    pub fn require_websocket_api_endpoint(&self) -> Result<&str, ConfigError> {
        self.websocket_api_endpoint
            .as_deref()
            .ok_or(ConfigError::MissingVar("WEBSOCKET_API_ENDPOINT"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_from_complete_environment() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GAME_SESSIONS_TABLE", "games"),
            ("CHAT_MESSAGES_TABLE", "messages"),
            ("ROOM_CONNECTIONS_TABLE", "connections"),
            ("WEBSOCKET_API_ENDPOINT", "https://example.com/dev"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.game_sessions_table, "games");
        assert_eq!(config.require_jwt_secret(), Ok("secret"));
        assert_eq!(
            config.require_websocket_api_endpoint(),
            Ok("https://example.com/dev")
        );
    }

    #[test]
    fn test_config_missing_table() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("GAME_SESSIONS_TABLE", "games"),
            ("ROOM_CONNECTIONS_TABLE", "connections"),
        ]));

        assert_eq!(result, Err(ConfigError::MissingVar("CHAT_MESSAGES_TABLE")));
    }

    #[test]
    fn test_optional_values_are_reported_when_required() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GAME_SESSIONS_TABLE", "games"),
            ("CHAT_MESSAGES_TABLE", "messages"),
            ("ROOM_CONNECTIONS_TABLE", "connections"),
        ]))
        .unwrap();

        assert_eq!(
            config.require_jwt_secret(),
            Err(ConfigError::MissingVar("JWT_SECRET"))
        );
    }
}
