//! Table Snapshot
//!
//! Full authoritative table state as sent by the authority in `game_state`
//! frames. A snapshot always replaces the previous one wholesale; the only
//! partial update is the per-seat hand merge from `private_hand` frames.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Maximum community cards on the board.
pub const MAX_COMMUNITY_CARDS: usize = 5;

/// Minimum seated players in a valid snapshot.
pub const MIN_PLAYERS: usize = 2;

/// A seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSeat {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Chip count.
    pub chips: u64,
    /// Hole cards. Empty when hidden from this client.
    #[serde(default)]
    pub hand: Vec<String>,
}

impl PlayerSeat {
    /// Are this player's cards unknown to us.
    pub fn is_hand_hidden(&self) -> bool {
        self.hand.is_empty()
    }
}

/// Betting round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Street {
    /// Before the flop.
    Preflop,
    /// Three board cards.
    Flop,
    /// Four board cards.
    Turn,
    /// Five board cards.
    River,
    /// Hand is being shown down.
    Showdown,
    /// No hand running, or a label we don't know.
    Other,
}

impl Street {
    /// Classify a wire label.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "preflop" => Street::Preflop,
            "flop" => Street::Flop,
            "turn" => Street::Turn,
            "river" => Street::River,
            "showdown" => Street::Showdown,
            _ => Street::Other,
        }
    }

    /// Is the board visible on this street.
    pub fn shows_board(&self) -> bool {
        matches!(self, Street::Flop | Street::Turn | Street::River)
    }
}

/// Snapshot validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Fewer than two seated players.
    #[error("snapshot seats {0} players, need at least two")]
    TooFewPlayers(usize),
    /// More than five board cards.
    #[error("snapshot has {0} community cards, at most five allowed")]
    TooManyCommunityCards(usize),
    /// A seat object failed to decode.
    #[error("invalid seat {seat}: {reason}")]
    InvalidSeat {
        /// Seat key.
        seat: String,
        /// Decode failure.
        reason: String,
    },
}

/// Authoritative table state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireSnapshot")]
pub struct TableSnapshot {
    /// Chips in the pot.
    pub pot: u64,
    /// Who is to act.
    pub current_player: String,
    /// Bet to match.
    pub current_bet: u64,
    /// Seats keyed by seat name (e.g. `oopPlayer`).
    #[serde(flatten)]
    pub players: BTreeMap<String, PlayerSeat>,
    /// Board cards, 0 to 5.
    pub community_cards: Vec<String>,
    /// Betting round label.
    pub street: String,
    /// Description of the last action taken.
    pub last_action: String,
}

impl TableSnapshot {
    /// Look up a seat.
    pub fn player(&self, seat: &str) -> Option<&PlayerSeat> {
        self.players.get(seat)
    }

    /// Seat keys in sorted order.
    pub fn seats(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(|k| k.as_str())
    }

    /// Betting round.
    pub fn betting_round(&self) -> Street {
        Street::parse(&self.street)
    }

    /// Replace one seat's hand, leaving everything else untouched.
    /// Returns false if the seat does not exist.
    pub fn merge_hand(&mut self, seat: &str, hand: Vec<String>) -> bool {
        match self.players.get_mut(seat) {
            Some(player) => {
                player.hand = hand;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for TableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to_act = if self.current_player.is_empty() {
            "-"
        } else {
            self.current_player.as_str()
        };
        write!(f, "pot {} | bet {} | to act: {}", self.pot, self.current_bet, to_act)?;

        if self.betting_round().shows_board() {
            write!(f, " | {} [{}]", self.street, self.community_cards.join(" "))?;
        } else if !self.street.is_empty() {
            write!(f, " | {}", self.street)?;
        }

        for (seat, player) in &self.players {
            let hand = if player.is_hand_hidden() {
                "hidden".to_string()
            } else {
                player.hand.join(" ")
            };
            write!(f, " | {} {} {} [{}]", seat, player.name, player.chips, hand)?;
        }

        if !self.last_action.is_empty() {
            write!(f, " | last: {}", self.last_action)?;
        }
        Ok(())
    }
}

/// Lenient wire shape. Seats are any member object carrying `chips`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSnapshot {
    #[serde(default)]
    pot: u64,
    #[serde(default, alias = "current_player")]
    current_player: Value,
    #[serde(default, alias = "current_bet")]
    current_bet: u64,
    #[serde(default, alias = "community_cards")]
    community_cards: Vec<String>,
    #[serde(default)]
    street: String,
    #[serde(default, alias = "last_action")]
    last_action: String,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

impl TryFrom<WireSnapshot> for TableSnapshot {
    type Error = SnapshotError;

    fn try_from(wire: WireSnapshot) -> Result<Self, Self::Error> {
        if wire.community_cards.len() > MAX_COMMUNITY_CARDS {
            return Err(SnapshotError::TooManyCommunityCards(wire.community_cards.len()));
        }

        let mut players = BTreeMap::new();
        for (key, value) in wire.rest {
            let is_seat = value.as_object().is_some_and(|obj| obj.contains_key("chips"));
            if !is_seat {
                continue;
            }
            let seat = serde_json::from_value::<PlayerSeat>(value).map_err(|e| {
                SnapshotError::InvalidSeat {
                    seat: key.clone(),
                    reason: e.to_string(),
                }
            })?;
            players.insert(snake_to_camel(&key), seat);
        }

        if players.len() < MIN_PLAYERS {
            return Err(SnapshotError::TooFewPlayers(players.len()));
        }

        Ok(Self {
            pot: wire.pot,
            current_player: actor_label(&wire.current_player),
            current_bet: wire.current_bet,
            players,
            community_cards: wire.community_cards,
            street: wire.street,
            last_action: wire.last_action,
        })
    }
}

/// The actor may arrive as a name, a seat object, or nothing.
fn actor_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `oop_player` -> `oopPlayer`, so private hands address one key space.
pub(crate) fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
