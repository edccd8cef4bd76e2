//! Player progression queried by the requirements rule.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Source of player level and quest completion.
pub trait RequirementSource {
    /// Current player level.
    fn player_level(&self) -> u32;

    /// Whether a quest has been completed.
    fn is_quest_complete(&self, quest: &str) -> bool;
}

/// Everything unlocked. The default when the host tracks no progression.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl RequirementSource for Unrestricted {
    fn player_level(&self) -> u32 {
        u32::MAX
    }

    fn is_quest_complete(&self, _quest: &str) -> bool {
        true
    }
}

/// Plain record of a player's level and finished quests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerProgress {
    /// Current level.
    pub level: u32,
    /// Completed quest ids.
    #[serde(default)]
    pub completed_quests: BTreeSet<String>,
}

impl PlayerProgress {
    /// Progress at a given level with no quests done.
    #[must_use]
    pub fn at_level(level: u32) -> Self {
        Self {
            level,
            completed_quests: BTreeSet::new(),
        }
    }

    /// Mark a quest complete.
    #[must_use]
    pub fn with_quest(mut self, quest: impl Into<String>) -> Self {
        self.completed_quests.insert(quest.into());
        self
    }
}

impl RequirementSource for PlayerProgress {
    fn player_level(&self) -> u32 {
        self.level
    }

    fn is_quest_complete(&self, quest: &str) -> bool {
        self.completed_quests.contains(quest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted() {
        assert_eq!(Unrestricted.player_level(), u32::MAX);
        assert!(Unrestricted.is_quest_complete("anything"));
    }

    #[test]
    fn test_player_progress() {
        let progress = PlayerProgress::at_level(4).with_quest("first_harvest");
        assert_eq!(progress.player_level(), 4);
        assert!(progress.is_quest_complete("first_harvest"));
        assert!(!progress.is_quest_complete("dragon"));
    }
}
