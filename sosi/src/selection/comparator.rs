use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::{ErrorKind, SosiError};

/// How a condition combines with the running result of its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connector {
    /// `OG`: tested only while the running result is true.
    And,
    /// `VELG` or `ELLER`: tested only while the running result is false.
    Or,
}

impl Connector {
    /// Recognizes a connector keyword. Input must already be uppercase.
    pub fn from_keyword(word: &str) -> Option<Connector> {
        match word {
            "OG" => Some(Connector::And),
            "VELG" | "ELLER" => Some(Connector::Or),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Connector::And => "OG",
            Connector::Or => "ELLER",
        }
    }
}

/// The comparison operator of a condition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `!` attribute absent
    NotPresent,
    /// `AL` attribute present
    All,
    /// `<>` inclusive range
    FromTo,
    /// `><` outside range
    Outside,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `/` divisible, optionally with a remainder
    Divisible,
    /// `!/`
    NotDivisible,
    /// `()` substring
    Contains,
    /// `!()`
    NotContains,
    /// `=`
    Equal,
    /// `IV` group not chosen by any rule yet
    NotChosen,
    /// `!=`
    NotEqual,
    /// `FL` attribute occurs more than once
    Multiple,
    /// `!FL` attribute occurs at most n times
    NotMoreThan,
}

impl Comparator {
    pub fn token(&self) -> &'static str {
        match self {
            Comparator::NotPresent => "!",
            Comparator::All => "AL",
            Comparator::FromTo => "<>",
            Comparator::Outside => "><",
            Comparator::Less => "<",
            Comparator::Greater => ">",
            Comparator::Divisible => "/",
            Comparator::NotDivisible => "!/",
            Comparator::Contains => "()",
            Comparator::NotContains => "!()",
            Comparator::Equal => "=",
            Comparator::NotChosen => "IV",
            Comparator::NotEqual => "!=",
            Comparator::Multiple => "FL",
            Comparator::NotMoreThan => "!FL",
        }
    }

    /// The positive form tested across all occurrences by the negated comparators.
    pub fn positive_form(&self) -> Option<Comparator> {
        match self {
            Comparator::NotEqual => Some(Comparator::Equal),
            Comparator::NotContains => Some(Comparator::Contains),
            _ => None,
        }
    }

    /// Whether a second `.` in a float value keeps the value numeric.
    ///
    /// Range and divisibility operands may be written as dotted pairs.
    pub(crate) fn tolerates_second_decimal_point(&self) -> bool {
        matches!(
            self,
            Comparator::FromTo | Comparator::Outside | Comparator::Divisible
        )
    }
}

impl FromStr for Comparator {
    type Err = SosiError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let comparator = match token.to_ascii_uppercase().as_str() {
            "!" => Comparator::NotPresent,
            "AL" => Comparator::All,
            "<>" => Comparator::FromTo,
            "><" => Comparator::Outside,
            "<" => Comparator::Less,
            ">" => Comparator::Greater,
            "/" => Comparator::Divisible,
            "!/" => Comparator::NotDivisible,
            "()" => Comparator::Contains,
            "!()" => Comparator::NotContains,
            "=" => Comparator::Equal,
            "IV" => Comparator::NotChosen,
            "!=" => Comparator::NotEqual,
            "FL" => Comparator::Multiple,
            "!FL" => Comparator::NotMoreThan,
            _ => {
                return Err(SosiError::new(
                    &format!("Unknown comparator '{}'", token),
                    ErrorKind::RuleSyntax,
                ))
            }
        };
        Ok(comparator)
    }
}

impl Display for Comparator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}
