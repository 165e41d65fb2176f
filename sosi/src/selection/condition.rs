use std::fmt::{Display, Formatter};

use super::tokenizer::tokenize;
use super::value::{
    detect_value_type, leading_float, leading_int, leading_int_saturating, LeadingInt,
};
use super::{Comparator, Connector, ValueType};
use crate::errors::{ErrorKind, SosiError, SosiResult};

const DIVISIBLE_TOLERANCE: f64 = 1.0e-6;

/// One condition line of a selection rule, with its nested sub-conditions.
///
/// Children are evaluated only when the condition's own verdict can still
/// change. Operands are stored uppercased, as typed in the rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    connector: Connector,
    attribute: String,
    comparator: Comparator,
    value_type: ValueType,
    type_given: bool,
    field: usize,
    substring_start: usize,
    substring_end: usize,
    min_value: String,
    max_value: String,
    children: Vec<ConditionNode>,
}

impl ConditionNode {
    /// Parses a condition line with its level dots already removed.
    ///
    /// Layout: `[VELG|ELLER|OG] name [comparator [min [max [type]]]]` where
    /// type is `T`, `A` or `F` followed by up to two of `#field` and
    /// `[start,end]`. Without a connector keyword the line is an `ELLER`.
    pub fn parse(line: &str) -> SosiResult<ConditionNode> {
        let upper = line.trim().to_uppercase();
        let tokens = tokenize(&upper);
        let mut tokens = tokens.iter().map(String::as_str);

        let first = match tokens.next() {
            Some(word) if !word.is_empty() => word,
            _ => return Err(syntax_error(line, "empty condition")),
        };
        let (connector, attribute) = match Connector::from_keyword(first) {
            Some(connector) => match tokens.next() {
                Some(name) if !name.is_empty() => (connector, name),
                _ => return Err(syntax_error(line, "missing attribute name")),
            },
            None => (Connector::Or, first),
        };

        let comparator = match tokens.next().filter(|t| !t.is_empty()) {
            Some(token) => token.parse::<Comparator>().map_err(|e| {
                SosiError::new_with_cause(
                    &format!("Invalid condition '{}'", line.trim()),
                    ErrorKind::RuleSyntax,
                    e,
                )
            })?,
            None => Comparator::All,
        };

        let (min_value, mut value_type) = match tokens.next().filter(|t| !t.is_empty()) {
            Some(min) => (min.to_string(), detect_value_type(min, None, ValueType::Int)),
            None => (String::new(), ValueType::Text),
        };

        let max_value = match tokens.next().filter(|t| !t.is_empty()) {
            Some(max) => {
                if value_type != ValueType::Text {
                    value_type = detect_value_type(max, Some(comparator), value_type);
                }
                max.to_string()
            }
            None => String::new(),
        };

        let mut node = ConditionNode {
            connector,
            attribute: attribute.to_string(),
            comparator,
            value_type,
            type_given: false,
            field: 0,
            substring_start: 0,
            substring_end: 0,
            min_value,
            max_value,
            children: Vec::new(),
        };

        if let Some(spec) = tokens.next().filter(|t| !t.is_empty()) {
            node.apply_type_spec(spec)
                .map_err(|message| syntax_error(line, &message))?;
        }
        Ok(node)
    }

    fn apply_type_spec(&mut self, spec: &str) -> Result<(), String> {
        let mut chars = spec.chars().peekable();
        self.value_type = match chars.next() {
            Some('T') => ValueType::Int,
            Some('A') => ValueType::Text,
            Some('F') => ValueType::Float,
            _ => return Err(format!("unknown value type '{}'", spec)),
        };
        self.type_given = true;

        for _ in 0..2 {
            match chars.peek() {
                Some('#') => {
                    chars.next();
                    self.field = read_number(&mut chars);
                }
                Some('[') => {
                    chars.next();
                    self.substring_start = read_number(&mut chars);
                    // one separator between start and end
                    chars.next();
                    self.substring_end = read_number(&mut chars);
                    if chars.peek() == Some(&']') {
                        chars.next();
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    pub fn connector(&self) -> Connector {
        self.connector
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Whether the line carried an explicit `T`, `A` or `F` type.
    pub fn type_given(&self) -> bool {
        self.type_given
    }

    /// 1-based whitespace token to compare, 0 for the whole value.
    pub fn field(&self) -> usize {
        self.field
    }

    pub fn substring(&self) -> (usize, usize) {
        (self.substring_start, self.substring_end)
    }

    pub fn min_value(&self) -> &str {
        &self.min_value
    }

    pub fn max_value(&self) -> &str {
        &self.max_value
    }

    pub fn children(&self) -> &[ConditionNode] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<ConditionNode> {
        &mut self.children
    }

    /// Whether this node or any descendant uses `comparator`.
    pub fn uses(&self, comparator: Comparator) -> bool {
        self.comparator == comparator || self.children.iter().any(|c| c.uses(comparator))
    }

    /// Limit of `!FL`: the leading integer of the first operand, at least 1.
    pub fn occurrence_limit(&self) -> usize {
        leading_int_saturating(&self.min_value).max(1) as usize
    }

    /// Cuts the compared part out of an attribute value.
    pub fn extract<'a>(&self, value: &'a str) -> &'a str {
        if self.field == 0 && self.substring_start == 0 && self.substring_end == 0 {
            return value;
        }

        let token = match value.split(' ').filter(|t| !t.is_empty()).nth(self.field.max(1) - 1) {
            Some(token) => token,
            None => return "",
        };
        if self.substring_start == 0 {
            return token;
        }

        let mut end = token.len();
        if self.substring_end != 0 {
            end = char_boundary(token, self.substring_end.min(token.chars().count()));
        }
        let start = char_boundary(token, self.substring_start.min(token.chars().count()).saturating_sub(1));
        if start >= end {
            ""
        } else {
            &token[start..end]
        }
    }

    /// Applies a value comparator to one attribute value.
    ///
    /// `comparator` is normally [`Self::comparator`]. The negated forms pass
    /// their positive form here. Comparators that do not look at values
    /// return false.
    pub fn matches_value(&self, comparator: Comparator, raw: &str) -> bool {
        let value = self.extract(raw);

        let mut value_type = self.value_type;
        let mut int_value = 0i64;
        if value_type == ValueType::Int {
            match leading_int(value) {
                LeadingInt::Value(v) => int_value = i64::from(v),
                LeadingInt::Overflow => value_type = ValueType::Text,
            }
        }
        let min_int = || leading_int_saturating(&self.min_value);
        let max_int = || leading_int_saturating(&self.max_value);
        let min_float = || leading_float(&self.min_value);
        let max_float = || leading_float(&self.max_value);
        let text = || value.to_uppercase();

        match comparator {
            Comparator::Equal => match value_type {
                ValueType::Int => int_value == min_int(),
                ValueType::Float => leading_float(value) == min_float(),
                ValueType::Text => text() == self.min_value,
            },
            Comparator::FromTo => match value_type {
                ValueType::Int => int_value >= min_int() && int_value <= max_int(),
                ValueType::Float => {
                    let v = leading_float(value);
                    v >= min_float() && v <= max_float()
                }
                ValueType::Text => {
                    let v = text();
                    v.as_str() >= self.min_value.as_str() && v.as_str() <= self.max_value.as_str()
                }
            },
            Comparator::Outside => match value_type {
                ValueType::Int => int_value < min_int() || int_value > max_int(),
                ValueType::Float => {
                    let v = leading_float(value);
                    v < min_float() || v > max_float()
                }
                ValueType::Text => {
                    let v = text();
                    v.as_str() < self.min_value.as_str() || v.as_str() > self.max_value.as_str()
                }
            },
            Comparator::Less => match value_type {
                ValueType::Int => int_value < min_int(),
                ValueType::Float => leading_float(value) < min_float(),
                ValueType::Text => text().as_str() < self.min_value.as_str(),
            },
            Comparator::Greater => match value_type {
                ValueType::Int => int_value > min_int(),
                ValueType::Float => leading_float(value) > min_float(),
                ValueType::Text => text().as_str() > self.min_value.as_str(),
            },
            Comparator::Divisible => {
                let divisor = min_float();
                let remainder = fraction(leading_float(value) / divisor);
                ((remainder * divisor).abs() - max_float().abs()).abs() < DIVISIBLE_TOLERANCE
            }
            Comparator::NotDivisible => {
                fraction(leading_float(value) / min_float()).abs() >= DIVISIBLE_TOLERANCE
            }
            Comparator::Contains => text().contains(self.min_value.as_str()),
            _ => false,
        }
    }
}

/// Fractional part with the sign of `x`. Infinite quotients have none.
fn fraction(x: f64) -> f64 {
    if x.is_infinite() {
        0.0
    } else {
        x.fract()
    }
}

fn char_boundary(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i)
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> usize {
    let mut number = 0usize;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        number = number.saturating_mul(10).saturating_add(digit as usize);
        chars.next();
    }
    number
}

fn syntax_error(line: &str, reason: &str) -> SosiError {
    SosiError::new(
        &format!("Invalid condition '{}': {}", line.trim(), reason),
        ErrorKind::RuleSyntax,
    )
}

impl Display for ConditionNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.connector.keyword(),
            self.attribute,
            self.comparator
        )?;
        if !self.min_value.is_empty() {
            write!(f, " {}", self.min_value)?;
        }
        if !self.max_value.is_empty() {
            write!(f, " {}", self.max_value)?;
        }
        Ok(())
    }
}
