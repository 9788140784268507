/// Comparison mini-language used by string conditions and faction strategies.
///
/// Grammar (whitespace between tokens is ignored):
///
/// ```text
/// expr       := operand op integer
/// operand    := identifier | integer
/// op         := "<" | ">" | "<=" | ">=" | "=" | "==" | "!="
/// identifier := [A-Za-z_][A-Za-z0-9_]*
/// integer    := "-"? [0-9]+
/// ```
use rustc_hash::FxHashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::schema::state::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("integer literal out of range: {0}")]
    IntegerOverflow(String),
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },
    #[error("trailing input after expression: {0}")]
    TrailingInput(String),
}

/// Comparison operator shared by string expressions and operator objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn compare(self, left: i64, right: i64) -> bool {
        match self {
            CmpOp::Lt => left < right,
            CmpOp::Gt => left > right,
            CmpOp::Le => left <= right,
            CmpOp::Ge => left >= right,
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }
}

impl FromStr for CmpOp {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(CmpOp::Lt),
            ">" => Ok(CmpOp::Gt),
            "<=" => Ok(CmpOp::Le),
            ">=" => Ok(CmpOp::Ge),
            "=" | "==" => Ok(CmpOp::Eq),
            "!=" => Ok(CmpOp::Ne),
            other => Err(ExprError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    Op(CmpOp),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Int(n) => format!("integer {n}"),
            Token::Op(op) => format!("operator '{op}'"),
        }
    }
}

fn is_op_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '!')
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < len && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() || (c == '-' && i + 1 < len && chars[i + 1].is_ascii_digit()) {
            let start = i;
            i += 1;
            while i < len && chars[i].is_ascii_digit() {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse::<i64>()
                .map_err(|_| ExprError::IntegerOverflow(literal.clone()))?;
            tokens.push(Token::Int(value));
        } else if is_op_char(c) {
            // The whole run is one operator, so "=>" is rejected rather
            // than read as "=" followed by ">".
            let start = i;
            while i < len && is_op_char(chars[i]) {
                i += 1;
            }
            let op: String = chars[start..i].iter().collect();
            tokens.push(Token::Op(op.parse()?));
        } else {
            return Err(ExprError::UnexpectedChar(c, i));
        }
    }

    Ok(tokens)
}

/// Left-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Ident(String),
    Literal(i64),
}

/// Names bound to fixed values while evaluating an expression.
pub type Bindings = FxHashMap<&'static str, i64>;

/// A parsed `<operand><op><integer>` comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub left: Operand,
    pub op: CmpOp,
    pub right: i64,
}

impl Expr {
    pub fn parse(input: &str) -> Result<Expr, ExprError> {
        let mut tokens = tokenize(input)?.into_iter();

        let left = match tokens.next() {
            None => return Err(ExprError::Empty),
            Some(Token::Ident(name)) => Operand::Ident(name),
            Some(Token::Int(n)) => Operand::Literal(n),
            Some(other) => {
                return Err(ExprError::Unexpected {
                    expected: "identifier or integer",
                    found: other.describe(),
                })
            }
        };

        let op = match tokens.next() {
            Some(Token::Op(op)) => op,
            Some(other) => {
                return Err(ExprError::Unexpected {
                    expected: "comparison operator",
                    found: other.describe(),
                })
            }
            None => {
                return Err(ExprError::Unexpected {
                    expected: "comparison operator",
                    found: "end of input".to_string(),
                })
            }
        };

        let right = match tokens.next() {
            Some(Token::Int(n)) => n,
            Some(other) => {
                return Err(ExprError::Unexpected {
                    expected: "integer",
                    found: other.describe(),
                })
            }
            None => {
                return Err(ExprError::Unexpected {
                    expected: "integer",
                    found: "end of input".to_string(),
                })
            }
        };

        let rest: Vec<String> = tokens.map(|t| t.describe()).collect();
        if !rest.is_empty() {
            return Err(ExprError::TrailingInput(rest.join(" ")));
        }

        Ok(Expr { left, op, right })
    }

    pub fn evaluate(&self, state: &PlayerState) -> bool {
        self.evaluate_with(state, &Bindings::default())
    }

    /// Evaluate with extra bindings. A bound name shadows the state stat
    /// of the same name.
    pub fn evaluate_with(&self, state: &PlayerState, bindings: &Bindings) -> bool {
        let left = match &self.left {
            Operand::Literal(n) => *n,
            Operand::Ident(name) => bindings
                .get(name.as_str())
                .copied()
                .unwrap_or_else(|| state.stat(name)),
        };
        self.op.compare(left, self.right)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.left {
            Operand::Ident(name) => write!(f, "{}{}{}", name, self.op, self.right),
            Operand::Literal(n) => write!(f, "{}{}{}", n, self.op, self.right),
        }
    }
}

/// Parse the leading integer of a "N+" shorthand such as `"5+"`.
///
/// Leading whitespace and a sign are accepted; anything after the digits
/// is ignored.
pub fn leading_integer(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let mut end = 0;
    for (i, c) in trimmed.char_indices() {
        if c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    trimmed[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(stats: &[(&str, i64)]) -> PlayerState {
        let mut state = PlayerState::new();
        for (name, value) in stats {
            state.stats.insert(name.to_string(), *value);
        }
        state
    }

    #[test]
    fn parse_basic_comparison() {
        let expr = Expr::parse("magic>=5").unwrap();
        assert_eq!(expr.left, Operand::Ident("magic".to_string()));
        assert_eq!(expr.op, CmpOp::Ge);
        assert_eq!(expr.right, 5);
    }

    #[test]
    fn parse_all_operators() {
        for (src, op) in [
            ("a<1", CmpOp::Lt),
            ("a>1", CmpOp::Gt),
            ("a<=1", CmpOp::Le),
            ("a>=1", CmpOp::Ge),
            ("a=1", CmpOp::Eq),
            ("a==1", CmpOp::Eq),
            ("a!=1", CmpOp::Ne),
        ] {
            assert_eq!(Expr::parse(src).unwrap().op, op, "operator in {src}");
        }
    }

    #[test]
    fn parse_allows_whitespace() {
        let expr = Expr::parse("  lira_trust  >=  3 ").unwrap();
        assert_eq!(expr.left, Operand::Ident("lira_trust".to_string()));
        assert_eq!(expr.right, 3);
    }

    #[test]
    fn parse_literal_left_operand() {
        let expr = Expr::parse("70>=60").unwrap();
        assert_eq!(expr.left, Operand::Literal(70));
        assert!(expr.evaluate(&PlayerState::new()));
    }

    #[test]
    fn parse_negative_integer() {
        let expr = Expr::parse("moral>-1").unwrap();
        assert_eq!(expr.right, -1);
    }

    #[test]
    fn unknown_operator_is_error() {
        assert!(matches!(
            Expr::parse("magic=>5"),
            Err(ExprError::UnknownOperator(op)) if op == "=>"
        ));
        assert!(matches!(
            Expr::parse("magic<>5"),
            Err(ExprError::UnknownOperator(_))
        ));
    }

    #[test]
    fn malformed_inputs_are_errors() {
        assert_eq!(Expr::parse(""), Err(ExprError::Empty));
        assert!(Expr::parse("magic").is_err());
        assert!(Expr::parse("magic>=").is_err());
        assert!(Expr::parse(">=5").is_err());
        assert!(Expr::parse("magic>=gold").is_err());
        assert!(Expr::parse("magic>=5 extra").is_err());
        assert!(Expr::parse("magic>=5; gold=0").is_err());
        assert!(matches!(
            Expr::parse("magic.level>=5"),
            Err(ExprError::UnexpectedChar('.', 5))
        ));
    }

    #[test]
    fn overflowing_literal_is_error() {
        assert!(matches!(
            Expr::parse("gold>99999999999999999999"),
            Err(ExprError::IntegerOverflow(_))
        ));
    }

    #[test]
    fn evaluate_against_state() {
        let state = state_with(&[("magic", 5)]);
        assert!(Expr::parse("magic>=5").unwrap().evaluate(&state));
        assert!(!Expr::parse("magic>5").unwrap().evaluate(&state));
        assert!(Expr::parse("magic==5").unwrap().evaluate(&state));
        assert!(Expr::parse("magic!=4").unwrap().evaluate(&state));
    }

    #[test]
    fn evaluate_missing_stat_as_zero() {
        let state = PlayerState::new();
        assert!(Expr::parse("dragon_trust<1").unwrap().evaluate(&state));
        assert!(!Expr::parse("dragon_trust>=1").unwrap().evaluate(&state));
    }

    #[test]
    fn bindings_shadow_state() {
        let state = state_with(&[("moral", 70)]);
        let expr = Expr::parse("player_moral>=60").unwrap();
        assert!(!expr.evaluate(&state));

        let bindings = Bindings::from_iter([("player_moral", state.stat("moral"))]);
        assert!(expr.evaluate_with(&state, &bindings));
    }

    #[test]
    fn display_round_trips_text() {
        let expr = Expr::parse("insight = 3").unwrap();
        assert_eq!(expr.to_string(), "insight==3");
    }

    #[test]
    fn leading_integer_shorthand() {
        assert_eq!(leading_integer("5+"), Some(5));
        assert_eq!(leading_integer(" 12+ "), Some(12));
        assert_eq!(leading_integer("+"), None);
        assert_eq!(leading_integer("many+"), None);
    }
}
