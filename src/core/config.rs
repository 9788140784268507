/// Engine configuration: ley lines, entry points and initial stats,
/// loaded from RON.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::schema::state::{PlayerState, INITIAL_CHAPTER};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("ley line '{0}' has a negative strength")]
    NegativeStrength(String),
}

/// A named magic-power multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeyLine {
    pub strength: f64,
    #[serde(default)]
    pub alignment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chapter loaded by `start`.
    pub start_chapter: String,
    /// Successor of the synthetic "continue" choice when the chapter has
    /// no `default_next`.
    pub fallback_chapter: String,
    /// Label of the synthetic "continue" choice.
    pub continue_label: String,
    pub ley_lines: BTreeMap<String, LeyLine>,
    /// Stat values that replace or extend the built-in initial state.
    pub initial_stats: BTreeMap<String, i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let ley_lines = [("blood", 0.7, "chaos"), ("void", 1.2, "eldritch"), ("nature", 0.9, "order")]
            .into_iter()
            .map(|(name, strength, alignment)| {
                (
                    name.to_string(),
                    LeyLine {
                        strength,
                        alignment: alignment.to_string(),
                    },
                )
            })
            .collect();

        Self {
            start_chapter: INITIAL_CHAPTER.to_string(),
            fallback_chapter: INITIAL_CHAPTER.to_string(),
            continue_label: "Continue...".to_string(),
            ley_lines,
            initial_stats: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        if let Some((name, _)) = config.ley_lines.iter().find(|(_, line)| line.strength < 0.0) {
            return Err(ConfigError::NegativeStrength(name.clone()));
        }
        Ok(config)
    }

    pub fn ley_line(&self, element: &str) -> Option<&LeyLine> {
        self.ley_lines.get(element)
    }

    /// Initial player state with `initial_stats` applied.
    pub fn initial_state(&self) -> PlayerState {
        let mut state = PlayerState::with_overrides(self.initial_stats.iter());
        state.current_chapter = self.start_chapter.clone();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_builtin_ley_lines() {
        let config = EngineConfig::default();
        assert_eq!(config.start_chapter, "chapter1");
        assert_eq!(config.ley_line("void").map(|l| l.strength), Some(1.2));
        assert_eq!(config.ley_line("blood").map(|l| l.strength), Some(0.7));
        assert_eq!(config.ley_line("nature").map(|l| l.strength), Some(0.9));
        assert!(config.ley_line("frost").is_none());
    }

    #[test]
    fn parse_partial_ron_keeps_defaults() {
        let config = EngineConfig::parse_ron(r#"(start_chapter: "prologue")"#).unwrap();
        assert_eq!(config.start_chapter, "prologue");
        assert_eq!(config.fallback_chapter, "chapter1");
        assert_eq!(config.ley_lines.len(), 3);
    }

    #[test]
    fn parse_full_ron() {
        let input = r#"(
            start_chapter: "chapter1",
            fallback_chapter: "chapter1",
            continue_label: "Onward",
            ley_lines: {
                "frost": (strength: 1.5, alignment: "stasis"),
            },
            initial_stats: {
                "gold": 25,
                "dragon_trust": 1,
            },
        )"#;
        let config = EngineConfig::parse_ron(input).unwrap();
        assert_eq!(config.continue_label, "Onward");
        assert_eq!(config.ley_lines.len(), 1);

        let state = config.initial_state();
        assert_eq!(state.stat("gold"), 25);
        assert_eq!(state.stat("dragon_trust"), 1);
        assert_eq!(state.stat("health"), 100);
    }

    #[test]
    fn negative_strength_rejected() {
        let input = r#"(ley_lines: { "rot": (strength: -1.0) })"#;
        assert!(matches!(
            EngineConfig::parse_ron(input),
            Err(ConfigError::NegativeStrength(name)) if name == "rot"
        ));
    }

    #[test]
    fn bad_ron_is_error() {
        assert!(matches!(
            EngineConfig::parse_ron("(start_chapter: 5)"),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn default_config_file_parses() {
        let config = EngineConfig::load_from_ron(Path::new("config/default.ron")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
