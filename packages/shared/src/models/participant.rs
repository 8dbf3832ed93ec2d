use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<chess::Color> for Color {
    fn from(color: chess::Color) -> Self {
        match color {
            chess::Color::White => Color::White,
            chess::Color::Black => Color::Black,
        }
    }
}

impl From<Color> for chess::Color {
    fn from(color: Color) -> Self {
        match color {
            Color::White => chess::Color::White,
            Color::Black => chess::Color::Black,
        }
    }
}

/// Colour requested by the player creating a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    White,
    Black,
    Random,
}

impl ColorChoice {
    pub fn resolve(self) -> Color {
        match self {
            ColorChoice::White => Color::White,
            ColorChoice::Black => Color::Black,
            ColorChoice::Random => {
                if rand::random::<bool>() {
                    Color::White
                } else {
                    Color::Black
                }
            }
        }
    }
}

/// A user seated in a room. Never changes once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub color: Color,
    pub name: String,
}

impl Participant {
    pub fn new(id: &str, color: Color, name: &str) -> Self {
        Participant {
            id: id.to_string(),
            color,
            name: name.to_string(),
        }
    }
}

/// Who is acting, as established by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub id: String,
    pub name: String,
}

impl PlayerIdentity {
    pub fn new(id: &str, name: &str) -> Self {
        PlayerIdentity {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn seat(&self, color: Color) -> Participant {
        Participant::new(&self.id, color, &self.name)
    }
}
