use std::fmt::{Display, Formatter};

use super::Comparator;

/// How condition operands and attribute values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Float,
    Text,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Text => write!(f, "text"),
        }
    }
}

/// Result of reading the leading integer of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadingInt {
    Value(i32),
    /// The digits do not fit in 32 bits. The saturation points
    /// `i32::MIN` and `i32::MAX` count as overflow as well.
    Overflow,
}

/// Reads an optionally signed run of decimal digits at the start of `text`.
///
/// Leading whitespace is skipped and reading stops at the first non-digit.
/// A text without digits reads as 0.
pub fn leading_int(text: &str) -> LeadingInt {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for byte in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value * 10 + i64::from(byte - b'0');
        if value > i64::from(i32::MAX) + 1 {
            return LeadingInt::Overflow;
        }
    }
    let value = if negative { -value } else { value };

    if value >= i64::from(i32::MAX) || value <= i64::from(i32::MIN) {
        LeadingInt::Overflow
    } else {
        LeadingInt::Value(value as i32)
    }
}

/// The leading integer of `text`, saturating at the 32-bit bounds.
pub(crate) fn leading_int_saturating(text: &str) -> i64 {
    match leading_int(text) {
        LeadingInt::Value(v) => i64::from(v),
        LeadingInt::Overflow => {
            if text.trim_start().starts_with('-') {
                i64::from(i32::MIN)
            } else {
                i64::from(i32::MAX)
            }
        }
    }
}

/// Reads the longest decimal number at the start of `text`.
///
/// Accepts a sign, digits, one decimal point and an exponent. A text
/// without a number reads as 0.0.
pub fn leading_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let mantissa_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    let mantissa = &trimmed[mantissa_start..end];
    if mantissa.is_empty() || mantissa == "." {
        return 0.0;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+') | Some(b'-')) {
            exponent_end += 1;
        }
        let digits_start = exponent_end;
        while exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
            exponent_end += 1;
        }
        if exponent_end > digits_start {
            end = exponent_end;
        }
    }

    trimmed[..end].parse::<f64>().unwrap_or(0.0)
}

/// Classifies an operand of a condition line.
///
/// `current` is the type decided so far (start with [`ValueType::Int`]).
/// `comparator` is `None` for the first operand and the line's comparator
/// for the second one.
///
/// * A leading `.` makes the value a float. A leading character other than
///   a sign or a digit makes it text.
/// * A later `.` makes it a float, unless it already is one. A second
///   point then makes it text, except for range and divisibility operands.
/// * Any other non-digit makes it text.
/// * An integer that does not fit in 32 bits is text.
pub fn detect_value_type(
    value: &str,
    comparator: Option<Comparator>,
    current: ValueType,
) -> ValueType {
    let mut value_type = current;
    let tolerant = comparator.is_some_and(|c| c.tolerates_second_decimal_point());

    for (index, c) in value.chars().enumerate() {
        if index == 0 {
            if c == '.' {
                value_type = ValueType::Float;
            } else if c != '+' && c != '-' && !c.is_ascii_digit() {
                value_type = ValueType::Text;
                break;
            }
        } else if !c.is_ascii_digit() {
            if c == '.' {
                if value_type == ValueType::Float && !tolerant {
                    value_type = ValueType::Text;
                    break;
                }
                value_type = ValueType::Float;
            } else {
                value_type = ValueType::Text;
                break;
            }
        }
    }

    if value_type == ValueType::Int && leading_int(value) == LeadingInt::Overflow {
        value_type = ValueType::Text;
    }
    value_type
}
