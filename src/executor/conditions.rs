//! Condition evaluation for If and IfVariable.
//!
//! Numeric operators need both sides to coerce to a number and fail loudly
//! otherwise. String operators compare text case-insensitively.

use super::variables::VariableScope;
use crate::error::EvalError;
use crate::graph::Value;
use crate::settings::IfVariableSettings;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl CompareOperator {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            CompareOperator::GreaterThan
                | CompareOperator::LessThan
                | CompareOperator::GreaterThanOrEqual
                | CompareOperator::LessThanOrEqual
        )
    }

    /// Symbol or word form used in condition expressions.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "==" | "=" | "eq" => Some(CompareOperator::Equals),
            "!=" | "<>" | "ne" => Some(CompareOperator::NotEquals),
            "contains" => Some(CompareOperator::Contains),
            "!contains" => Some(CompareOperator::NotContains),
            ">" | "gt" => Some(CompareOperator::GreaterThan),
            "<" | "lt" => Some(CompareOperator::LessThan),
            ">=" | "ge" => Some(CompareOperator::GreaterThanOrEqual),
            "<=" | "le" => Some(CompareOperator::LessThanOrEqual),
            _ => None,
        }
    }
}

/// Applies `op` to `left` and `right`.
pub fn compare(left: &Value, op: CompareOperator, right: &Value) -> Result<bool, EvalError> {
    if op.is_numeric() {
        let a = numeric(left, op)?;
        let b = numeric(right, op)?;
        return Ok(match op {
            CompareOperator::GreaterThan => a > b,
            CompareOperator::LessThan => a < b,
            CompareOperator::GreaterThanOrEqual => a >= b,
            _ => a <= b,
        });
    }

    let a = left.as_text().to_lowercase();
    let b = right.as_text().to_lowercase();
    Ok(match op {
        CompareOperator::Equals => a == b,
        CompareOperator::NotEquals => a != b,
        CompareOperator::Contains => a.contains(&b),
        _ => !a.contains(&b),
    })
}

fn numeric(value: &Value, op: CompareOperator) -> Result<f64, EvalError> {
    value.as_number().ok_or_else(|| EvalError::NotNumeric {
        value: value.as_text(),
        operator: format!("{:?}", op),
    })
}

/// Looks the variable up and compares it with the literal compare value.
pub fn evaluate_if_variable(
    settings: &IfVariableSettings,
    scope: &VariableScope,
) -> Result<bool, EvalError> {
    let current = scope
        .get(&settings.name)
        .ok_or_else(|| EvalError::UndefinedVariable(settings.name.clone()))?;
    compare(
        current,
        settings.operator,
        &Value::String(settings.value.clone()),
    )
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Variable(String),
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, scope: &'a VariableScope) -> Result<&'a Value, EvalError> {
        match self {
            Operand::Variable(name) => scope
                .get(name)
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Operand::Literal(value) => Ok(value),
        }
    }
}

/// Parsed `If` condition: a single operand or `left OP right`.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Truthy(Operand),
    Compare(Operand, CompareOperator, Operand),
}

#[derive(Debug, PartialEq)]
enum Token {
    Variable(String),
    Quoted(String),
    Bare(String),
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' || c == '\'' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == c {
                    closed = true;
                    break;
                }
                text.push(ch);
            }
            if !closed {
                return Err(EvalError::Parse(format!("Unterminated string in '{}'", source)));
            }
            tokens.push(Token::Quoted(text));
            continue;
        }

        if c == '$' {
            chars.next();
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                return Err(EvalError::Parse(format!("Empty variable reference in '{}'", source)));
            }
            tokens.push(Token::Variable(name));
            continue;
        }

        if "=!<>".contains(c) {
            let mut op = String::new();
            while let Some(&ch) = chars.peek() {
                if "=!<>".contains(ch) {
                    op.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            // `!contains`
            if op == "!" {
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphabetic() {
                        op.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            tokens.push(Token::Bare(op));
            continue;
        }

        let mut word = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() || "=!<>\"'".contains(ch) {
                break;
            }
            word.push(ch);
            chars.next();
        }
        tokens.push(Token::Bare(word));
    }

    Ok(tokens)
}

fn to_operand(token: Token) -> Operand {
    match token {
        Token::Variable(name) => Operand::Variable(name),
        Token::Quoted(text) => Operand::Literal(Value::String(text)),
        Token::Bare(word) => Operand::Literal(Value::parse_loose(&word)),
    }
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, EvalError> {
        let mut tokens = tokenize(source)?;
        match tokens.len() {
            0 => Err(EvalError::Parse("Condition is empty".to_string())),
            1 => Ok(Expression::Truthy(to_operand(tokens.remove(0)))),
            3 => {
                let right = tokens.remove(2);
                let op_token = tokens.remove(1);
                let left = tokens.remove(0);
                let op = match &op_token {
                    Token::Bare(word) => CompareOperator::from_token(word),
                    _ => None,
                }
                .ok_or_else(|| {
                    EvalError::Parse(format!("Expected a comparison operator in '{}'", source))
                })?;
                Ok(Expression::Compare(to_operand(left), op, to_operand(right)))
            }
            n => Err(EvalError::Parse(format!(
                "Expected 'value' or 'left operator right', found {} tokens in '{}'",
                n, source
            ))),
        }
    }

    pub fn evaluate(&self, scope: &VariableScope) -> Result<bool, EvalError> {
        match self {
            Expression::Truthy(operand) => Ok(operand.resolve(scope)?.is_truthy()),
            Expression::Compare(left, op, right) => {
                compare(left.resolve(scope)?, *op, right.resolve(scope)?)
            }
        }
    }
}
