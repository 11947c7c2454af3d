use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::error::BoardError;

/// Opaque unique identifier for a card (e.g., card-3f2a9c0e...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    const PREFIX: &'static str = "card-";

    /// Generates a fresh random identifier
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, Uuid::new_v4().simple()))
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CardId {
    type Err = BoardError;

    // Ids are opaque; older boards used other shapes, so anything non-blank is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(BoardError::invalid("card id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lane a card lives in. Declaration order is the display order of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Lane {
    #[serde(rename = "Todo")]
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
    #[serde(rename = "Waste")]
    Waste,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Todo, Lane::InProgress, Lane::Done, Lane::Waste];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
            Self::Waste => "Waste",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lane::ALL
            .into_iter()
            .find(|lane| lane.as_str() == s)
            .ok_or_else(|| BoardError::invalid(format!("unknown lane '{}'", s)))
    }
}

fn default_expanded() -> bool {
    true
}

/// A card on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    #[serde(alias = "column")]
    pub(crate) lane: Lane,
    #[serde(default, alias = "text")]
    pub body: String,
    #[serde(default = "default_expanded")]
    pub expanded: bool,
    #[serde(alias = "createdBy")]
    pub(crate) created_by: String,
    #[serde(default = "Utc::now", alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Creates a card from already-sanitized input
    pub fn new(id: CardId, title: String, lane: Lane, created_by: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            lane,
            body: String::new(),
            expanded: true,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lane the card currently sits in; changed only through the board
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// User who created the card; fixed at creation
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.touch();
    }

    pub fn set_body(&mut self, body: String) {
        self.body = body;
        self.touch();
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
        self.touch();
    }

    pub(crate) fn set_lane(&mut self, lane: Lane) {
        self.lane = lane;
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A user who registered interest in a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrar {
    pub id: String,
    pub name: String,
}

impl Registrar {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// True when either the id or the display name equals one of `keys`
    pub fn matches_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| *key == self.id || *key == self.name)
    }
}

/// A card as presented to viewers, enriched with its registrars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    #[serde(flatten)]
    pub card: Card,
    pub registrars: Vec<String>,
    pub registrar_ids: Vec<String>,
}

impl CardView {
    pub fn new(card: Card, registrars: &[Registrar]) -> Self {
        Self {
            card,
            registrars: registrars.iter().map(|r| r.name.clone()).collect(),
            registrar_ids: registrars.iter().map(|r| r.id.clone()).collect(),
        }
    }

    /// Whether a viewer counts as registered, by id or by display name
    pub fn is_registered(&self, user_id: Option<&str>, display_name: Option<&str>) -> bool {
        if let Some(id) = user_id.filter(|id| !id.is_empty()) {
            if self.registrar_ids.iter().any(|r| r == id) {
                return true;
            }
        }
        if let Some(name) = display_name.filter(|name| !name.is_empty()) {
            if self.registrars.iter().any(|r| r == name) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_id_generation_is_unique() {
        let a = CardId::generate();
        let b = CardId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("card-"));
    }

    #[test]
    fn test_card_id_parsing() {
        let id = CardId::from_str("  card-1-lx3k  ").unwrap();
        assert_eq!(id.as_str(), "card-1-lx3k");
        assert!(CardId::from_str("   ").is_err());
    }

    #[test]
    fn test_lane_parsing() {
        assert_eq!(Lane::from_str("Todo").unwrap(), Lane::Todo);
        assert_eq!(Lane::from_str("In Progress").unwrap(), Lane::InProgress);
        assert!(Lane::from_str("Backlog").unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_lane_order_matches_board_order() {
        let mut lanes = vec![Lane::Waste, Lane::Todo, Lane::Done, Lane::InProgress];
        lanes.sort();
        assert_eq!(lanes, Lane::ALL.to_vec());
    }

    #[test]
    fn test_lane_serialization() {
        let json = serde_json::to_string(&Lane::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn test_new_card_defaults() {
        let card = Card::new(
            CardId::generate(),
            "Write tests".to_string(),
            Lane::Todo,
            "alice".to_string(),
        );
        assert!(card.expanded);
        assert_eq!(card.body, "");
        assert_eq!(card.created_at, card.updated_at);
    }

    #[test]
    fn test_legacy_card_deserialization() {
        let old_json = r#"{
            "id": "card-1-lx3k",
            "title": "Old Card",
            "column": "Done",
            "createdBy": "bob"
        }"#;

        let card: Card = serde_json::from_str(old_json).unwrap();
        assert_eq!(card.lane(), Lane::Done);
        assert_eq!(card.created_by(), "bob");
        assert_eq!(card.body, "");
        assert!(card.expanded);
    }

    #[test]
    fn test_registrar_matching() {
        let registrar = Registrar::new("u-1", "Alice");
        assert!(registrar.matches_any(&["u-1"]));
        assert!(registrar.matches_any(&["nobody", "Alice"]));
        assert!(!registrar.matches_any(&["alice"]));
    }

    #[test]
    fn test_card_view_is_registered() {
        let card = Card::new(CardId::generate(), "T".to_string(), Lane::Todo, "a".to_string());
        let view = CardView::new(card, &[Registrar::new("u-1", "Alice")]);
        assert!(view.is_registered(Some("u-1"), None));
        assert!(view.is_registered(None, Some("Alice")));
        assert!(!view.is_registered(Some(""), Some("Bob")));
        assert!(!view.is_registered(None, None));
    }
}
