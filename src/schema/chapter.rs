use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::condition::Condition;
use crate::core::effect::EffectSet;

/// Id prefix that routes a successor to the ending store.
pub const ENDING_PREFIX: &str = "ending_";

/// `next` value that means "load the chapter named in `reveal`".
pub const REVEAL_SENTINEL: &str = "reveal_chapter";

/// Fields every chapter and ending document must carry.
pub const REQUIRED_FIELDS: &[&str] = &["id", "text", "background"];

pub fn is_ending_id(id: &str) -> bool {
    id.starts_with(ENDING_PREFIX)
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Parse(serde_json::Error),
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("bad field: {0}")]
    Shape(serde_json::Error),
}

fn parse_document<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, DocumentError> {
    let value: Value = serde_json::from_str(raw).map_err(DocumentError::Parse)?;
    let object = value.as_object().ok_or(DocumentError::NotAnObject)?;

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(DocumentError::MissingFields(missing));
    }

    serde_json::from_value(value).map_err(DocumentError::Shape)
}

/// A chapter document.
#[derive(Debug, Clone, Deserialize)]
pub struct Chapter {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    pub background: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub spells: BTreeMap<String, Spell>,
    #[serde(default)]
    pub faction_ai: FxHashMap<String, FactionAi>,
    #[serde(default)]
    pub default_next: Option<String>,
    #[serde(default)]
    pub characters: Characters,
    #[serde(default)]
    pub dynamic_elements: DynamicElements,
}

impl Chapter {
    pub fn from_json(raw: &str) -> Result<Chapter, DocumentError> {
        parse_document(raw)
    }
}

/// An ending document. Terminal within a playthrough.
#[derive(Debug, Clone, Deserialize)]
pub struct Ending {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
    pub background: String,
}

impl Ending {
    pub fn from_json(raw: &str) -> Result<Ending, DocumentError> {
        parse_document(raw)
    }
}

/// When a variant applies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trigger {
    /// `default: true` matches unconditionally.
    pub default: bool,
    pub condition: Condition,
}

impl Trigger {
    pub fn matches(&self, state: &crate::schema::state::PlayerState) -> bool {
        self.default || self.condition.evaluate(state)
    }
}

impl<'de> Deserialize<'de> for Trigger {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let default = match value.as_object_mut() {
            Some(map) => map
                .remove("default")
                .map(|flag| flag.as_bool().unwrap_or(false))
                .unwrap_or(false),
            None => false,
        };
        Ok(Trigger {
            default,
            condition: Condition::from_value(&value),
        })
    }
}

/// Alternative content for a chapter. Fields left out fall back to the
/// base chapter.
#[derive(Debug, Clone, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
    #[serde(default)]
    pub default_next: Option<String>,
}

/// A player-selectable action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "requirements")]
    pub requires: Condition,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub effects: EffectSet,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub reveal: Option<String>,
    /// Seconds after which the choice fires on its own.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Main characters who react when this choice is taken.
    #[serde(default)]
    pub characters: Vec<String>,
    /// Story arc that triggers dynamic character interactions.
    #[serde(default)]
    pub arc: Option<String>,
}

impl Choice {
    /// A choice needs a label and at least one of `next`, `reveal` or
    /// `effects`.
    pub fn is_well_formed(&self) -> bool {
        !self.text.is_empty()
            && (self.next.is_some() || self.reveal.is_some() || !self.effects.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Spell {
    /// Display name; the map key is used when absent.
    #[serde(default)]
    pub name: Option<String>,
    pub element: String,
    pub skill: String,
    pub threshold: f64,
    #[serde(default)]
    pub effects: Vec<SpellEffect>,
    #[serde(default)]
    pub requires: Condition,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpellEffect {
    FactionReaction {
        faction: String,
        #[serde(default)]
        action: Option<String>,
    },
    StatChange {
        target: String,
        value: i64,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FactionAi {
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

fn missing_strategy_condition() -> Condition {
    Condition::Malformed("strategy has no 'if' condition".to_string())
}

fn strategy_condition<'de, D>(deserializer: D) -> Result<Condition, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Condition::from_required(&value))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Strategy {
    #[serde(
        rename = "if",
        default = "missing_strategy_condition",
        deserialize_with = "strategy_condition"
    )]
    pub condition: Condition,
    #[serde(default)]
    pub then: Vec<FactionResponse>,
}

/// Faction reactions the engine knows how to carry out. The table is
/// closed: new reactions need a code change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FactionResponse {
    /// `church_hostility += 10`
    SendZealots,
    /// `lira_trust -= 5`
    BurnForest,
    Unrecognized(String),
}

impl From<String> for FactionResponse {
    fn from(token: String) -> Self {
        match token.as_str() {
            "send_zealots" => FactionResponse::SendZealots,
            "burn_forest" => FactionResponse::BurnForest,
            _ => FactionResponse::Unrecognized(token),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Characters {
    #[serde(default)]
    pub main: Vec<Character>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Character {
    pub id: String,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default)]
    pub dialogue: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DynamicElements {
    /// Keyed by character id, in authored order.
    #[serde(default, deserialize_with = "in_authored_order")]
    pub character_interactions: Vec<(String, CharacterInteraction)>,
}

fn in_authored_order<'de, D>(
    deserializer: D,
) -> Result<Vec<(String, CharacterInteraction)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: serde_json::Map<String, Value> = Deserialize::deserialize(deserializer)?;
    map.into_iter()
        .map(|(id, value)| {
            serde_json::from_value::<CharacterInteraction>(value)
                .map(|interaction| (id, interaction))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterInteraction {
    #[serde(default)]
    pub on_select: Option<Interaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Interaction {
    #[serde(default)]
    pub trigger_arc: Option<String>,
    #[serde(default)]
    pub sprite_change: Option<String>,
    #[serde(default)]
    pub dialogue: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub effects: EffectSet,
}
