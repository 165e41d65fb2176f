use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for selection and store operations.
///
/// Each kind names one category of failure so callers can react to it
/// without parsing the message text.
///
/// # Examples
///
/// ```rust
/// use sosi::errors::{ErrorKind, SosiError, SosiResult};
///
/// fn example() -> SosiResult<()> {
///     Err(SosiError::new("Unknown comparator '=='", ErrorKind::RuleSyntax))
/// }
///
/// assert_eq!(example().unwrap_err().kind(), &ErrorKind::RuleSyntax);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Rule text errors
    /// A condition line or rule directive could not be interpreted
    RuleSyntax,
    /// A condition line jumps more than one nesting level deeper than the open chain
    InvalidNesting,
    /// A rule block ended without a `BRUK-REGEL` label
    MissingRuleLabel,
    /// More distinct priorities than the priority mask can hold
    PriorityOverflow,

    // Lookup errors
    /// The named rule does not exist
    RuleNotFound,
    /// The referenced group does not exist in the store
    GroupNotFound,

    // Operation errors
    /// The operation is not valid in the current state
    InvalidOperation,
    /// A configuration value was rejected
    InvalidConfiguration,

    // IO and store errors
    /// Generic IO error
    IOError,
    /// Error reported by the group store
    StoreError,

    /// Error from an extension crate (e.g. "spatial")
    Extension(String),

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::RuleSyntax => write!(f, "Rule syntax error"),
            ErrorKind::InvalidNesting => write!(f, "Invalid nesting"),
            ErrorKind::MissingRuleLabel => write!(f, "Missing rule label"),
            ErrorKind::PriorityOverflow => write!(f, "Priority overflow"),
            ErrorKind::RuleNotFound => write!(f, "Rule not found"),
            ErrorKind::GroupNotFound => write!(f, "Group not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidConfiguration => write!(f, "Invalid configuration"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::StoreError => write!(f, "Store error"),
            ErrorKind::Extension(name) => write!(f, "{} error", name),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for the selection engine and the group-store collaborators.
///
/// `SosiError` carries a message, an [`ErrorKind`] and an optional cause,
/// and captures a backtrace when created.
///
/// # Examples
///
/// ```rust
/// use sosi::errors::{ErrorKind, SosiError};
///
/// let cause = SosiError::new("file missing", ErrorKind::IOError);
/// let err = SosiError::new_with_cause("Could not load rules", ErrorKind::IOError, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct SosiError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<SosiError>>,
    backtrace: Atomic<Backtrace>,
}

impl SosiError {
    /// Creates a new `SosiError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        SosiError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `SosiError` that wraps an underlying cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: SosiError) -> Self {
        SosiError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&SosiError> {
        self.cause.as_deref()
    }
}

impl Display for SosiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for SosiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for SosiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Result type alias used by every fallible operation in this crate.
pub type SosiResult<T> = Result<T, SosiError>;

impl From<std::io::Error> for SosiError {
    fn from(err: std::io::Error) -> Self {
        SosiError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<std::num::ParseIntError> for SosiError {
    fn from(err: std::num::ParseIntError) -> Self {
        SosiError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::RuleSyntax,
        )
    }
}

impl From<std::num::ParseFloatError> for SosiError {
    fn from(err: std::num::ParseFloatError) -> Self {
        SosiError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::RuleSyntax,
        )
    }
}

impl From<String> for SosiError {
    fn from(msg: String) -> Self {
        SosiError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for SosiError {
    fn from(msg: &str) -> Self {
        SosiError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sosi_error_new_creates_error() {
        let error = SosiError::new("An error occurred", ErrorKind::RuleSyntax);
        assert_eq!(error.message, "An error occurred");
        assert_eq!(error.error_kind, ErrorKind::RuleSyntax);
        assert!(error.cause.is_none());
    }

    #[test]
    fn sosi_error_new_with_cause_creates_error() {
        let error = SosiError::new_with_cause(
            "Rule discarded",
            ErrorKind::MissingRuleLabel,
            SosiError::new("no label", ErrorKind::RuleSyntax),
        );
        assert_eq!(error.kind(), &ErrorKind::MissingRuleLabel);
        assert_eq!(error.cause().map(|c| c.kind().clone()), Some(ErrorKind::RuleSyntax));
    }

    #[test]
    fn sosi_error_display_formats_message_only() {
        let error = SosiError::new("An error occurred", ErrorKind::IOError);
        assert_eq!(format!("{}", error), "An error occurred");
    }

    #[test]
    fn sosi_error_debug_formats_with_cause() {
        let error = SosiError::new_with_cause(
            "outer",
            ErrorKind::IOError,
            SosiError::new("inner", ErrorKind::IOError),
        );
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("outer"));
        assert!(formatted.contains("Caused by:"));
        assert!(formatted.contains("inner"));
    }

    #[test]
    fn sosi_error_source_follows_cause() {
        let plain = SosiError::new("plain", ErrorKind::InternalError);
        assert!(plain.source().is_none());

        let chained = SosiError::new_with_cause("outer", ErrorKind::InternalError, plain);
        assert!(chained.source().is_some());
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidNesting.to_string(), "Invalid nesting");
        assert_eq!(ErrorKind::PriorityOverflow.to_string(), "Priority overflow");
        assert_eq!(
            ErrorKind::Extension("spatial".to_string()).to_string(),
            "spatial error"
        );
    }

    #[test]
    fn from_io_error_maps_to_io_kind() {
        let err: SosiError = std::io::Error::other("disk gone").into();
        assert_eq!(err.kind(), &ErrorKind::IOError);
        assert!(err.message().contains("disk gone"));
    }

    #[test]
    fn from_parse_int_error_maps_to_rule_syntax() {
        let parse_err = "x1".parse::<i32>().unwrap_err();
        let err: SosiError = parse_err.into();
        assert_eq!(err.kind(), &ErrorKind::RuleSyntax);
    }

    #[test]
    fn from_str_maps_to_internal_error() {
        let err: SosiError = "boom".into();
        assert_eq!(err.kind(), &ErrorKind::InternalError);
        assert_eq!(err.message(), "boom");
    }
}
