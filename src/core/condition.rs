/// Requirement conditions: parsed once from story JSON, evaluated against
/// the player state.
///
/// Parsing never fails: anything that cannot be understood becomes a
/// [`Condition::Malformed`] node, which evaluates to false and can be
/// reported by the linter.
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::core::expr::{leading_integer, Bindings, CmpOp, Expr};
use crate::schema::state::PlayerState;

/// Expected value of a `*_status` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusValue {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Condition {
    /// No requirement.
    #[default]
    Always,
    All(Vec<Condition>),
    Any(Vec<Condition>),
    /// Textual comparison such as `"magic>=5"`.
    Expr(Expr),
    /// Numeric comparison of a stat against a constant.
    Compare { stat: String, op: CmpOp, value: i64 },
    /// `*_status` equality.
    Status { key: String, expected: StatusValue },
    HasItems(Vec<String>),
    LacksItems(Vec<String>),
    Revealed(Vec<String>),
    NotRevealed(Vec<String>),
    /// Content that could not be understood. Always false.
    Malformed(String),
}

impl Condition {
    /// Parse a top-level requirement. Absent, `null`, `{}` and `""` mean
    /// "no requirement".
    pub fn from_value(value: &Value) -> Condition {
        match value {
            Value::Null => Condition::Always,
            Value::Object(map) if map.is_empty() => Condition::Always,
            Value::String(s) if s.trim().is_empty() => Condition::Always,
            other => Self::from_entry(other),
        }
    }

    /// Parse a condition that must be stated: an empty string or `null`
    /// is malformed rather than "no requirement".
    pub fn from_required(value: &Value) -> Condition {
        match value {
            Value::Null => Condition::Malformed("missing condition".to_string()),
            other => Self::from_entry(other),
        }
    }

    /// Parse one entry of an `any`/`all` list, or a nested condition.
    fn from_entry(value: &Value) -> Condition {
        match value {
            Value::String(s) => match Expr::parse(s) {
                Ok(expr) => Condition::Expr(expr),
                Err(e) => Condition::Malformed(format!("expression '{s}': {e}")),
            },
            Value::Object(map) => Self::from_object(map),
            other => Condition::Malformed(format!("not a condition: {other}")),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Condition {
        // An `any` list decides the object on its own; sibling keys are ignored.
        if let Some(any) = map.get("any") {
            return Self::from_group(any, Condition::Any, "any");
        }

        let mut clauses: Vec<Condition> = map
            .iter()
            .map(|(key, value)| match key.as_str() {
                "all" => Self::from_group(value, Condition::All, "all"),
                _ => Self::from_clause(key, value),
            })
            .collect();

        match clauses.len() {
            0 => Condition::Always,
            1 => clauses.remove(0),
            _ => Condition::All(clauses),
        }
    }

    fn from_group(value: &Value, make: fn(Vec<Condition>) -> Condition, name: &str) -> Condition {
        match value {
            Value::Array(entries) => make(entries.iter().map(Self::from_entry).collect()),
            other => Condition::Malformed(format!("'{name}' expects a list, found {other}")),
        }
    }

    /// A single `key: value` requirement. The checks run in a fixed
    /// precedence order: status keys, "N+" shorthand, inventory and
    /// reveal keys, operator objects, then the plain `>=` fallback.
    fn from_clause(key: &str, value: &Value) -> Condition {
        if key.ends_with("_status") {
            return match value {
                Value::String(s) => Condition::Status {
                    key: key.to_string(),
                    expected: StatusValue::Text(s.clone()),
                },
                Value::Number(n) => match n.as_i64() {
                    Some(n) => Condition::Status {
                        key: key.to_string(),
                        expected: StatusValue::Number(n),
                    },
                    None => Condition::Malformed(format!("'{key}' expects an integer, found {n}")),
                },
                other => Condition::Malformed(format!("'{key}' cannot equal {other}")),
            };
        }

        if let Value::String(s) = value {
            if s.contains('+') {
                return match leading_integer(s) {
                    Some(min) => Condition::Compare {
                        stat: key.to_string(),
                        op: CmpOp::Ge,
                        value: min,
                    },
                    None => Condition::Malformed(format!("'{key}': bad shorthand '{s}'")),
                };
            }
        }

        match key {
            "inventory" => {
                return id_list(key, value).map_or_else(Condition::Malformed, Condition::HasItems)
            }
            "not_inventory" => {
                return id_list(key, value).map_or_else(Condition::Malformed, Condition::LacksItems)
            }
            "revealed" => {
                return id_list(key, value).map_or_else(Condition::Malformed, Condition::Revealed)
            }
            "not_revealed" => {
                return id_list(key, value)
                    .map_or_else(Condition::Malformed, Condition::NotRevealed)
            }
            _ => {}
        }

        match value {
            Value::Object(ops) => Self::from_operator_object(key, ops),
            Value::Number(n) => match n.as_i64() {
                Some(n) => Condition::Compare {
                    stat: key.to_string(),
                    op: CmpOp::Ge,
                    value: n,
                },
                None => Condition::Malformed(format!("'{key}' expects an integer, found {n}")),
            },
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(n) => Condition::Compare {
                    stat: key.to_string(),
                    op: CmpOp::Ge,
                    value: n,
                },
                Err(_) => Condition::Malformed(format!("'{key}' expects a number, found '{s}'")),
            },
            other => Condition::Malformed(format!("'{key}' cannot be compared with {other}")),
        }
    }

    /// `{">=": 5}`. Several entries are ANDed, so `{">=": 2, "<=": 5}`
    /// reads as a range.
    fn from_operator_object(key: &str, ops: &Map<String, Value>) -> Condition {
        if ops.is_empty() {
            return Condition::Malformed(format!("'{key}' has an empty operator object"));
        }

        let mut clauses: Vec<Condition> = ops
            .iter()
            .map(|(op, operand)| {
                let op = match op.parse::<CmpOp>() {
                    Ok(op) => op,
                    Err(e) => return Condition::Malformed(format!("'{key}': {e}")),
                };
                match operand.as_i64() {
                    Some(value) => Condition::Compare {
                        stat: key.to_string(),
                        op,
                        value,
                    },
                    None => Condition::Malformed(format!(
                        "'{key}' expects an integer operand, found {operand}"
                    )),
                }
            })
            .collect();

        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Condition::All(clauses)
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Condition::Always)
    }

    pub fn evaluate(&self, state: &PlayerState) -> bool {
        self.evaluate_with(state, &Bindings::default())
    }

    /// Evaluate with name bindings visible to textual expressions.
    pub fn evaluate_with(&self, state: &PlayerState, bindings: &Bindings) -> bool {
        match self {
            Condition::Always => true,
            Condition::All(parts) => parts.iter().all(|c| c.evaluate_with(state, bindings)),
            Condition::Any(parts) => parts.iter().any(|c| c.evaluate_with(state, bindings)),
            Condition::Expr(expr) => expr.evaluate_with(state, bindings),
            Condition::Compare { stat, op, value } => op.compare(state.stat(stat), *value),
            Condition::Status { key, expected } => match expected {
                StatusValue::Text(text) => state.status(key) == Some(text.as_str()),
                StatusValue::Number(n) => state.stat(key) == *n,
            },
            Condition::HasItems(items) => state.has_all_items(items),
            Condition::LacksItems(items) => !state.has_any_item(items),
            Condition::Revealed(ids) => ids.iter().all(|id| state.is_revealed(id)),
            Condition::NotRevealed(ids) => !ids.iter().any(|id| state.is_revealed(id)),
            Condition::Malformed(_) => false,
        }
    }

    /// Every malformed node in this condition, depth first.
    pub fn problems(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_problems(&mut out);
        out
    }

    fn collect_problems<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Malformed(reason) => out.push(reason),
            Condition::All(parts) | Condition::Any(parts) => {
                for part in parts {
                    part.collect_problems(out);
                }
            }
            _ => {}
        }
    }
}

/// Evaluate a condition against a state. Pure and deterministic.
pub fn evaluate(condition: &Condition, state: &PlayerState) -> bool {
    condition.evaluate(state)
}

/// Accept a bare id or a list of ids.
fn id_list(key: &str, value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("'{key}' expects ids, found {entry}"))
            })
            .collect(),
        other => Err(format!("'{key}' expects an id or a list of ids, found {other}")),
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Condition::from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_with(stats: &[(&str, i64)]) -> PlayerState {
        let mut state = PlayerState::new();
        for (name, value) in stats {
            state.stats.insert(name.to_string(), *value);
        }
        state
    }

    fn check(condition: Value, state: &PlayerState) -> bool {
        Condition::from_value(&condition).evaluate(state)
    }

    #[test]
    fn absent_or_empty_is_true() {
        let state = PlayerState::new();
        assert!(check(Value::Null, &state));
        assert!(check(json!({}), &state));
        assert!(check(json!(""), &state));
        assert!(Condition::default().is_always());
    }

    #[test]
    fn bare_number_is_at_least() {
        let state = state_with(&[("magic", 3)]);
        assert!(check(json!({"magic": 3}), &state));
        assert!(!check(json!({"magic": 4}), &state));
    }

    #[test]
    fn absent_stat_only_satisfies_non_positive() {
        let state = PlayerState::new();
        assert!(check(json!({"dragon_trust": 0}), &state));
        assert!(!check(json!({"dragon_trust": 1}), &state));
    }

    #[test]
    fn keys_are_anded() {
        let state = state_with(&[("magic", 5), ("gold", 1)]);
        assert!(check(json!({"magic": 5, "gold": 1}), &state));
        assert!(!check(json!({"magic": 5, "gold": 2}), &state));
    }

    #[test]
    fn operator_objects() {
        let magic3 = state_with(&[("magic", 3)]);
        let magic5 = state_with(&[("magic", 5)]);
        let cond = json!({"magic": {">=": 5}});
        assert!(!check(cond.clone(), &magic3));
        assert!(check(cond, &magic5));

        assert!(check(json!({"magic": {"<": 4}}), &magic3));
        assert!(check(json!({"magic": {"=": 3}}), &magic3));
        assert!(check(json!({"magic": {"==": 3}}), &magic3));
        assert!(check(json!({"magic": {"!=": 5}}), &magic3));
        assert!(check(json!({"magic": {"<=": 3}}), &magic3));
        assert!(!check(json!({"magic": {">": 3}}), &magic3));
    }

    #[test]
    fn operator_object_range() {
        let cond = json!({"gold": {">=": 2, "<=": 5}});
        assert!(check(cond.clone(), &state_with(&[("gold", 4)])));
        assert!(!check(cond.clone(), &state_with(&[("gold", 6)])));
        assert!(!check(cond, &state_with(&[("gold", 1)])));
    }

    #[test]
    fn unknown_operator_is_false() {
        let state = state_with(&[("magic", 10)]);
        assert!(!check(json!({"magic": {"=>": 1}}), &state));
        assert!(!check(json!({"magic": {}}), &state));
    }

    #[test]
    fn plus_shorthand() {
        let state = state_with(&[("willpower", 5)]);
        assert!(check(json!({"willpower": "5+"}), &state));
        assert!(!check(json!({"willpower": "6+"}), &state));
        assert!(!check(json!({"willpower": "lots+"}), &state));
    }

    #[test]
    fn status_equality() {
        let mut state = PlayerState::new();
        state.set_status("quest_status", "accepted");
        assert!(check(json!({"quest_status": "accepted"}), &state));
        assert!(!check(json!({"quest_status": "done"}), &state));
        assert!(!check(json!({"other_status": "accepted"}), &state));

        state.stats.insert("gate_status".to_string(), 2);
        assert!(check(json!({"gate_status": 2}), &state));
        assert!(!check(json!({"gate_status": 3}), &state));
    }

    #[test]
    fn status_key_takes_precedence_over_shorthand() {
        let mut state = PlayerState::new();
        state.set_status("rank_status", "3+");
        assert!(check(json!({"rank_status": "3+"}), &state));
    }

    #[test]
    fn inventory_requires_every_item() {
        let mut state = PlayerState::new();
        state.add_items(&["key"]);
        assert!(!check(json!({"inventory": ["key", "torch"]}), &state));
        assert!(check(json!({"inventory": ["key"]}), &state));
        assert!(check(json!({"inventory": "key"}), &state));

        state.add_items(&["torch"]);
        assert!(check(json!({"inventory": ["key", "torch"]}), &state));
    }

    #[test]
    fn not_inventory_requires_none() {
        let mut state = PlayerState::new();
        state.add_items(&["key"]);
        assert!(!check(json!({"not_inventory": ["key", "torch"]}), &state));
        assert!(check(json!({"not_inventory": ["torch"]}), &state));
        assert!(check(json!({"not_inventory": "amulet"}), &state));
    }

    #[test]
    fn revealed_checks() {
        let mut state = PlayerState::new();
        state.reveal("secret_grove");
        assert!(check(json!({"revealed": "secret_grove"}), &state));
        assert!(!check(json!({"revealed": "crypt"}), &state));
        assert!(check(json!({"not_revealed": "crypt"}), &state));
        assert!(!check(json!({"not_revealed": "secret_grove"}), &state));
    }

    #[test]
    fn any_is_or_over_expressions() {
        let state = state_with(&[("magic", 2), ("lira_trust", 7)]);
        assert!(check(json!({"any": ["magic>=5", "lira_trust>5"]}), &state));
        assert!(!check(json!({"any": ["magic>=5", "lira_trust>9"]}), &state));
        assert!(!check(json!({"any": []}), &state));
    }

    #[test]
    fn all_nests_recursively() {
        let state = state_with(&[("magic", 6), ("gold", 0), ("insight", 2)]);
        let cond = json!({
            "all": [
                "magic>=5",
                {"any": ["gold>0", "insight>1"]},
                {"all": ["insight==2"]}
            ]
        });
        assert!(check(cond, &state));
        assert!(check(json!({"all": []}), &state));

        let failing = json!({"all": ["magic>=5", {"any": ["gold>0", "insight>5"]}]});
        assert!(!check(failing, &state));
    }

    #[test]
    fn any_overrides_other_keys() {
        let state = state_with(&[("magic", 6), ("gold", 0)]);
        assert!(check(json!({"any": ["magic>5"], "gold": 0}), &state));
        assert!(check(json!({"any": ["magic>5"], "gold": 1}), &state));
        assert!(!check(json!({"any": ["magic>7"], "gold": 0}), &state));
        assert!(check(json!({"gold": 0, "all": ["magic>5"]}), &state));
        assert!(!check(json!({"gold": 1, "all": ["magic>5"]}), &state));
    }

    #[test]
    fn required_condition_rejects_blank() {
        let state = PlayerState::new();
        for blank in [json!(""), json!("   "), json!(null)] {
            let cond = Condition::from_required(&blank);
            assert!(!cond.evaluate(&state), "{blank} should be false");
            assert_eq!(cond.problems().len(), 1);
        }
        assert!(Condition::from_required(&json!("gold>=10")).evaluate(&state));
    }

    #[test]
    fn string_condition_top_level() {
        let state = state_with(&[("sanity", 4)]);
        assert!(check(json!("sanity<5"), &state));
        assert!(!check(json!("sanity>=5"), &state));
        assert!(check(json!("unknown_stat==0"), &state));
    }

    #[test]
    fn malformed_is_false_and_reported() {
        let state = PlayerState::new();
        for bad in [
            json!("magic"),
            json!("magic=>5"),
            json!(true),
            json!([1, 2]),
            json!({"magic": true}),
            json!({"magic": "lots"}),
            json!({"magic": [1]}),
            json!({"inventory": 3}),
            json!({"any": "magic>1"}),
        ] {
            let cond = Condition::from_value(&bad);
            assert!(!cond.evaluate(&state), "{bad} should be false");
            assert_eq!(cond.problems().len(), 1, "{bad} should report one problem");
        }
    }

    #[test]
    fn numeric_string_value_is_at_least() {
        let state = state_with(&[("gold", 10)]);
        assert!(check(json!({"gold": "10"}), &state));
        assert!(!check(json!({"gold": "11"}), &state));
    }

    #[test]
    fn evaluation_does_not_mutate() {
        let mut state = state_with(&[("magic", 3)]);
        state.add_items(&["key"]);
        let before = state.clone();
        let cond = Condition::from_value(&json!({
            "magic": {">=": 1},
            "inventory": ["key"],
            "any": ["gold>0"]
        }));
        let first = cond.evaluate(&state);
        let second = cond.evaluate(&state);
        assert_eq!(first, second);
        assert_eq!(state, before);
    }

    #[test]
    fn deserializes_from_json() {
        let cond: Condition = serde_json::from_str(r#"{"magic": {">=": 5}}"#).unwrap();
        assert_eq!(
            cond,
            Condition::Compare {
                stat: "magic".to_string(),
                op: CmpOp::Ge,
                value: 5
            }
        );
    }
}
