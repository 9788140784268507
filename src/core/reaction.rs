/// Character reactions to a taken choice: sprite swaps, dialogue lines and
/// the effects attached to arc-triggered interactions.
use serde::Serialize;

use crate::core::effect::EffectWarning;
use crate::schema::chapter::{Chapter, Choice};
use crate::schema::state::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reaction {
    SpriteChange {
        character: String,
        sprite: String,
    },
    Dialogue {
        speaker: String,
        text: String,
        mood: String,
        position: String,
    },
}

/// Reactions triggered by `choice`, in presentation order.
///
/// Listed main characters react first, then every dynamic interaction
/// whose `trigger_arc` matches the choice's arc. Interaction effects are
/// applied to `state` as they are met.
pub fn react(
    chapter: &Chapter,
    choice: &Choice,
    state: &mut PlayerState,
) -> (Vec<Reaction>, Vec<EffectWarning>) {
    let mut reactions = Vec::new();
    let mut warnings = Vec::new();

    for character_id in &choice.characters {
        let Some(character) = chapter
            .characters
            .main
            .iter()
            .find(|c| &c.id == character_id)
        else {
            continue;
        };

        if let (Some(sprite), Some(mood)) = (&character.sprite, &character.mood) {
            reactions.push(Reaction::SpriteChange {
                character: character.id.clone(),
                sprite: format!("{sprite}_{mood}"),
            });
        }
        if let Some(text) = &character.dialogue {
            reactions.push(Reaction::Dialogue {
                speaker: character.id.clone(),
                text: text.clone(),
                mood: "neutral".to_string(),
                position: character
                    .position
                    .clone()
                    .unwrap_or_else(|| "center".to_string()),
            });
        }
    }

    if let Some(arc) = &choice.arc {
        for (character_id, config) in &chapter.dynamic_elements.character_interactions {
            let Some(interaction) = &config.on_select else {
                continue;
            };
            if interaction.trigger_arc.as_ref() != Some(arc) {
                continue;
            }

            if let Some(sprite) = &interaction.sprite_change {
                reactions.push(Reaction::SpriteChange {
                    character: character_id.clone(),
                    sprite: sprite.clone(),
                });
            }
            if let Some(text) = &interaction.dialogue {
                reactions.push(Reaction::Dialogue {
                    speaker: character_id.clone(),
                    text: text.clone(),
                    mood: interaction
                        .mood
                        .clone()
                        .unwrap_or_else(|| "neutral".to_string()),
                    position: "center".to_string(),
                });
            }
            warnings.extend(interaction.effects.apply(state));
        }
    }

    (reactions, warnings)
}
