/// Spellcasting and faction reactions, layered on the condition evaluator
/// and the stat rules of the effect applier.
use thiserror::Error;

use crate::core::config::EngineConfig;
use crate::core::expr::Bindings;
use crate::schema::chapter::{Chapter, FactionResponse, SpellEffect};
use crate::schema::state::PlayerState;

/// Name the faction strategies use for the player's moral stat.
pub const PLAYER_MORAL: &str = "player_moral";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MagicError {
    #[error("unknown spell: {0}")]
    UnknownSpell(String),
    #[error("unknown ley line '{element}' for spell '{spell}'")]
    UnknownElement { spell: String, element: String },
}

/// Result of a cast attempt that found its spell and ley line.
#[derive(Debug, Clone, PartialEq)]
pub struct CastOutcome {
    pub power: f64,
    pub succeeded: bool,
}

/// Cast `name` from the chapter's spell table.
///
/// `power = ley line strength * state[skill]`; the cast succeeds only when
/// the power strictly exceeds the threshold. A failed cast changes nothing.
pub fn cast_spell(
    name: &str,
    chapter: &Chapter,
    state: &mut PlayerState,
    config: &EngineConfig,
) -> Result<CastOutcome, MagicError> {
    let spell = chapter
        .spells
        .get(name)
        .ok_or_else(|| MagicError::UnknownSpell(name.to_string()))?;
    let ley_line = config
        .ley_line(&spell.element)
        .ok_or_else(|| MagicError::UnknownElement {
            spell: name.to_string(),
            element: spell.element.clone(),
        })?;

    let power = ley_line.strength * state.stat(&spell.skill) as f64;
    if power <= spell.threshold {
        log::debug!(
            "spell '{}' fizzled: power {:.2} <= threshold {}",
            name,
            power,
            spell.threshold
        );
        return Ok(CastOutcome {
            power,
            succeeded: false,
        });
    }

    for effect in &spell.effects {
        match effect {
            SpellEffect::StatChange { target, value } => {
                if !state.adjust(target, *value) {
                    log::debug!("spell '{}' targets unknown stat '{}'", name, target);
                }
            }
            SpellEffect::FactionReaction { faction, .. } => {
                trigger_faction(faction, chapter, state);
            }
            SpellEffect::Unknown => {
                log::warn!("spell '{}' has an effect of unknown type", name);
            }
        }
    }

    Ok(CastOutcome {
        power,
        succeeded: true,
    })
}

/// Run a faction's strategy if its condition holds.
///
/// `player_moral` in the condition reads the current `moral` stat.
/// Returns true when the strategy fired.
pub fn trigger_faction(faction_id: &str, chapter: &Chapter, state: &mut PlayerState) -> bool {
    let Some(strategy) = chapter
        .faction_ai
        .get(faction_id)
        .and_then(|ai| ai.strategy.as_ref())
    else {
        return false;
    };

    let bindings = Bindings::from_iter([(PLAYER_MORAL, state.stat("moral"))]);
    if !strategy.condition.evaluate_with(state, &bindings) {
        return false;
    }

    for response in &strategy.then {
        apply_response(faction_id, response, state);
    }
    true
}

fn apply_response(faction_id: &str, response: &FactionResponse, state: &mut PlayerState) {
    match response {
        FactionResponse::SendZealots => {
            state.adjust("church_hostility", 10);
        }
        FactionResponse::BurnForest => {
            state.adjust("lira_trust", -5);
        }
        FactionResponse::Unrecognized(token) => {
            log::warn!("faction '{}': ignoring unknown response '{}'", faction_id, token);
        }
    }
}

/// A spell as offered to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellOption {
    pub key: String,
    pub name: String,
    pub available: bool,
}

/// Every spell of the chapter, in name order, with its availability.
pub fn available_spells(chapter: &Chapter, state: &PlayerState) -> Vec<SpellOption> {
    chapter
        .spells
        .iter()
        .map(|(key, spell)| SpellOption {
            key: key.clone(),
            name: spell.name.clone().unwrap_or_else(|| key.clone()),
            available: spell.requires.evaluate(state),
        })
        .collect()
}
