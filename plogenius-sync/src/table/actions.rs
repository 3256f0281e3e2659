//! Player Actions
//!
//! The action identifiers the authority may offer, and the permitted set
//! the client holds between a `request_action` frame and the next submit.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// A betting action a player can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Pass without betting.
    Check,
    /// Match the current bet.
    Call,
    /// Open the betting.
    Bet,
    /// Increase an existing bet.
    Raise,
    /// Give up the hand.
    Fold,
}

impl ActionKind {
    /// Every action, in display order.
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Check,
        ActionKind::Call,
        ActionKind::Bet,
        ActionKind::Raise,
        ActionKind::Fold,
    ];

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Check => "check",
            ActionKind::Call => "call",
            ActionKind::Bet => "bet",
            ActionKind::Raise => "raise",
            ActionKind::Fold => "fold",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized action identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// The actions the client is currently permitted to submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    actions: BTreeSet<ActionKind>,
}

impl ActionSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw wire identifiers. Unknown identifiers are skipped.
    pub fn from_wire<S: AsRef<str>>(ids: &[S]) -> Self {
        let mut actions = BTreeSet::new();
        for id in ids {
            match id.as_ref().parse::<ActionKind>() {
                Ok(action) => {
                    actions.insert(action);
                }
                Err(e) => warn!("Skipping offered action: {}", e),
            }
        }
        Self { actions }
    }

    /// Is this action permitted.
    pub fn contains(&self, action: ActionKind) -> bool {
        self.actions.contains(&action)
    }

    /// No actions permitted.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of permitted actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Drop every permitted action.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Permitted actions in display order.
    pub fn iter(&self) -> impl Iterator<Item = ActionKind> + '_ {
        self.actions.iter().copied()
    }
}

impl FromIterator<ActionKind> for ActionSet {
    fn from_iter<I: IntoIterator<Item = ActionKind>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|a| a.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_case_insensitive() {
        assert_eq!("call".parse::<ActionKind>().unwrap(), ActionKind::Call);
        assert_eq!(" FOLD ".parse::<ActionKind>().unwrap(), ActionKind::Fold);
        assert!("shove".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_action_serializes_lowercase() {
        let json = serde_json::to_string(&ActionKind::Raise).unwrap();
        assert_eq!(json, "\"raise\"");
    }

    #[test]
    fn test_from_wire_skips_unknown() {
        let set = ActionSet::from_wire(&["fold", "call", "shove"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(ActionKind::Fold));
        assert!(set.contains(ActionKind::Call));
        assert!(!set.contains(ActionKind::Bet));
    }

    #[test]
    fn test_display_order() {
        let set: ActionSet = [ActionKind::Fold, ActionKind::Check].into_iter().collect();
        assert_eq!(set.to_string(), "[check, fold]");
    }
}
