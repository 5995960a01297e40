//! Script purity filter
//!
//! Decides whether a recognized string is written entirely in the target
//! script. Mixed-script strings are rejected outright.

use serde::{Deserialize, Serialize};

/// Classifies strings by script membership
pub trait ScriptClassifier: Send + Sync {
    /// True iff every character is a target-script character or whitespace
    fn is_target_script(&self, text: &str) -> bool;
}

/// Inclusive range of Unicode code points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptBlock {
    pub start: u32,
    pub end: u32,
}

impl ScriptBlock {
    /// The Arabic block (U+0600 - U+06FF)
    pub const ARABIC: Self = Self {
        start: 0x0600,
        end: 0x06FF,
    };

    pub fn contains(&self, ch: char) -> bool {
        (self.start..=self.end).contains(&u32::from(ch))
    }
}

/// Classifier backed by a fixed set of Unicode blocks
#[derive(Debug, Clone)]
pub struct UnicodeBlockClassifier {
    blocks: Vec<ScriptBlock>,
}

impl UnicodeBlockClassifier {
    pub fn new(blocks: Vec<ScriptBlock>) -> Self {
        Self { blocks }
    }

    pub fn arabic() -> Self {
        Self::new(vec![ScriptBlock::ARABIC])
    }

    pub fn blocks(&self) -> &[ScriptBlock] {
        &self.blocks
    }

    fn is_target_char(&self, ch: char) -> bool {
        self.blocks.iter().any(|block| block.contains(ch))
    }
}

impl Default for UnicodeBlockClassifier {
    fn default() -> Self {
        Self::arabic()
    }
}

impl ScriptClassifier for UnicodeBlockClassifier {
    fn is_target_script(&self, text: &str) -> bool {
        text.chars()
            .all(|ch| ch.is_whitespace() || self.is_target_char(ch))
    }
}
