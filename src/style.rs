//! The catalog of explanation styles.
//!
//! A style is a persona the AI adopts for the whole explanation. The catalog
//! is closed: anything not listed here is rejected with
//! [`ExplainError::InvalidStyle`] before any network work happens.

use crate::error::ExplainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named explanation style. Serialised as its kebab-case wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExplanationStyle {
    /// Simple words, toys and animals. (default)
    #[default]
    FiveYearOld,
    PopCulture,
    Anime,
    Sports,
    Food,
    Gaming,
    Marvel,
    HarryPotter,
    BrainRot,
    Reddit,
    Shakespearean,
}

impl ExplanationStyle {
    /// Every style, in catalog order.
    pub const ALL: [ExplanationStyle; 11] = [
        ExplanationStyle::FiveYearOld,
        ExplanationStyle::PopCulture,
        ExplanationStyle::Anime,
        ExplanationStyle::Sports,
        ExplanationStyle::Food,
        ExplanationStyle::Gaming,
        ExplanationStyle::Marvel,
        ExplanationStyle::HarryPotter,
        ExplanationStyle::BrainRot,
        ExplanationStyle::Reddit,
        ExplanationStyle::Shakespearean,
    ];

    /// Wire name, e.g. `"five-year-old"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ExplanationStyle::FiveYearOld => "five-year-old",
            ExplanationStyle::PopCulture => "pop-culture",
            ExplanationStyle::Anime => "anime",
            ExplanationStyle::Sports => "sports",
            ExplanationStyle::Food => "food",
            ExplanationStyle::Gaming => "gaming",
            ExplanationStyle::Marvel => "marvel",
            ExplanationStyle::HarryPotter => "harry-potter",
            ExplanationStyle::BrainRot => "brain-rot",
            ExplanationStyle::Reddit => "reddit",
            ExplanationStyle::Shakespearean => "shakespearean",
        }
    }

    /// Comma-separated list of every wire name, for error messages and help text.
    pub fn catalog() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse an optional style, falling back to the default when absent.
    pub fn parse_or_default(raw: Option<&str>) -> Result<Self, ExplainError> {
        match raw {
            None => Ok(Self::default()),
            Some(s) => s.parse(),
        }
    }
}

impl fmt::Display for ExplanationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExplanationStyle {
    type Err = ExplainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|style| style.as_str() == wanted)
            .ok_or_else(|| ExplainError::InvalidStyle {
                style: s.to_string(),
                valid: Self::catalog(),
            })
    }
}
