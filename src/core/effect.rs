/// Effect declarations: parsed once from story JSON, applied to the
/// player state in authored order.
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

use crate::schema::state::PlayerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryAction {
    Add,
    Remove,
}

/// One entry of an effects object.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Numeric change, clamped per [`crate::schema::state::StatRange`].
    /// Ignored when the stat does not exist.
    Adjust { stat: String, delta: i64 },
    Inventory {
        action: InventoryAction,
        items: Vec<String>,
    },
    /// Assign a textual `*_status` flag.
    SetStatus { key: String, value: String },
    /// Could not be understood; skipped with a warning.
    Invalid { key: String, reason: String },
}

/// A problem met while applying effects. The offending entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectWarning {
    pub key: String,
    pub reason: String,
}

impl fmt::Display for EffectWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect '{}' skipped: {}", self.key, self.reason)
    }
}

/// An ordered list of effects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectSet {
    pub effects: Vec<Effect>,
}

impl EffectSet {
    pub fn new(effects: Vec<Effect>) -> Self {
        Self { effects }
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn from_value(value: &Value) -> EffectSet {
        let map = match value {
            Value::Null => return EffectSet::default(),
            Value::Object(map) => map,
            other => {
                return EffectSet::new(vec![Effect::Invalid {
                    key: "effects".to_string(),
                    reason: format!("expected an object, found {other}"),
                }])
            }
        };

        EffectSet::new(
            map.iter()
                .map(|(key, value)| parse_entry(key, value))
                .collect(),
        )
    }

    /// Apply every entry to `state`, in order. Entries are independent:
    /// an invalid one is skipped and reported, the rest still apply.
    pub fn apply(&self, state: &mut PlayerState) -> Vec<EffectWarning> {
        let mut warnings = Vec::new();

        for effect in &self.effects {
            match effect {
                Effect::Adjust { stat, delta } => {
                    if !state.adjust(stat, *delta) {
                        log::debug!("ignoring effect on unknown stat '{}'", stat);
                    }
                }
                Effect::Inventory { action, items } => match action {
                    InventoryAction::Add => state.add_items(items),
                    InventoryAction::Remove => state.remove_items(items),
                },
                Effect::SetStatus { key, value } => state.set_status(key, value),
                Effect::Invalid { key, reason } => {
                    log::warn!("skipping effect '{}': {}", key, reason);
                    warnings.push(EffectWarning {
                        key: key.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        warnings
    }

    /// Reasons of every invalid entry, for static checks.
    pub fn problems(&self) -> Vec<String> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Invalid { key, reason } => Some(format!("'{key}': {reason}")),
                _ => None,
            })
            .collect()
    }
}

/// Apply `effects` to `state` in place.
pub fn apply(effects: &EffectSet, state: &mut PlayerState) -> Vec<EffectWarning> {
    effects.apply(state)
}

fn parse_entry(key: &str, value: &Value) -> Effect {
    let invalid = |reason: String| Effect::Invalid {
        key: key.to_string(),
        reason,
    };

    match key {
        "inventory" => match value {
            Value::Object(op) => {
                let action = match op.get("action").and_then(Value::as_str) {
                    Some("add") => InventoryAction::Add,
                    Some("remove") => InventoryAction::Remove,
                    Some(other) => return invalid(format!("unknown inventory action '{other}'")),
                    None => return invalid("inventory operation without an action".to_string()),
                };
                match op.get("items").map(item_list) {
                    Some(Ok(items)) => Effect::Inventory { action, items },
                    Some(Err(reason)) => invalid(reason),
                    None => invalid("inventory operation without items".to_string()),
                }
            }
            // Older content lists the items to add directly.
            other => match item_list(other) {
                Ok(items) => Effect::Inventory {
                    action: InventoryAction::Add,
                    items,
                },
                Err(reason) => invalid(reason),
            },
        },
        "inventory_add" | "inventory_remove" => {
            let action = if key == "inventory_add" {
                InventoryAction::Add
            } else {
                InventoryAction::Remove
            };
            match item_list(value) {
                Ok(items) => Effect::Inventory { action, items },
                Err(reason) => invalid(reason),
            }
        }
        _ if key.ends_with("_status") && value.is_string() => Effect::SetStatus {
            key: key.to_string(),
            value: value.as_str().unwrap_or_default().to_string(),
        },
        _ => match value.as_i64() {
            Some(delta) => Effect::Adjust {
                stat: key.to_string(),
                delta,
            },
            None => invalid(format!("expected an integer delta, found {value}")),
        },
    }
}

/// A bare id or an arbitrarily nested list of ids, flattened.
fn item_list(value: &Value) -> Result<Vec<String>, String> {
    let mut items = Vec::new();
    collect_items(value, &mut items)?;
    Ok(items)
}

fn collect_items(value: &Value, out: &mut Vec<String>) -> Result<(), String> {
    match value {
        Value::String(s) => {
            out.push(s.clone());
            Ok(())
        }
        Value::Array(entries) => entries.iter().try_for_each(|e| collect_items(e, out)),
        other => Err(format!("expected item ids, found {other}")),
    }
}

impl<'de> Deserialize<'de> for EffectSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(EffectSet::from_value(&value))
    }
}
