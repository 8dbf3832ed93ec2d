use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String, // subject (user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize, // expiration time
    pub iat: usize, // issued at
}

impl TokenClaims {
    /// Display name shown to the opponent: name, then email, then the raw id.
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.sub)
            .to_string()
    }
}
