use serde::{Deserialize, Serialize};

use crate::models::participant::ColorChoice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameRequest {
    #[serde(default = "random_color")]
    pub color: ColorChoice,
}

fn random_color() -> ColorChoice {
    ColorChoice::Random
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegalMovesQuery {
    pub square: Option<String>,
}
