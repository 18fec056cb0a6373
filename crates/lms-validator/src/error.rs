//! Validation error types
//!
//! Bad content is data, not a fault. Each problem is a [`FieldError`]
//! (path + kind) or a [`RuleViolation`], rendered into the `errors` list of
//! a [`ValidationResult`](crate::ValidationResult).

use std::fmt;

use thiserror::Error;

/// What went wrong at a path
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// JSON type differs from the schema
    #[error("expected {expected} but got {found}")]
    TypeMismatch {
        /// Schema type
        expected: &'static str,
        /// JSON type found
        found: &'static str,
    },

    /// Required field absent
    #[error("missing required field")]
    Missing,

    /// String shorter than allowed (in characters)
    #[error("expected at least {min} characters, got {actual}")]
    TooShort {
        /// Lower bound
        min: usize,
        /// Length found
        actual: usize,
    },

    /// String longer than allowed (in characters)
    #[error("expected at most {max} characters, got {actual}")]
    TooLong {
        /// Upper bound
        max: usize,
        /// Length found
        actual: usize,
    },

    /// Array with too few items
    #[error("expected at least {min} items, got {actual}")]
    TooFewItems {
        /// Lower bound
        min: usize,
        /// Items found
        actual: usize,
    },

    /// Array or map with too many items
    #[error("expected at most {max} items, got {actual}")]
    TooManyItems {
        /// Upper bound
        max: usize,
        /// Items found
        actual: usize,
    },

    /// Number under its lower bound
    #[error("value {value} is below the minimum of {min}")]
    BelowMinimum {
        /// Value found
        value: f64,
        /// Lower bound
        min: f64,
    },

    /// Number over its upper bound
    #[error("value {value} is above the maximum of {max}")]
    AboveMaximum {
        /// Value found
        value: f64,
        /// Upper bound
        max: f64,
    },

    /// String does not match its required shape
    #[error("does not match the {name} pattern {pattern}")]
    Pattern {
        /// Human name of the shape
        name: &'static str,
        /// Pattern source
        pattern: &'static str,
    },

    /// Value outside an enumeration
    #[error("unknown value \"{value}\", expected one of: {}", .allowed.join(", "))]
    Enum {
        /// Value found (truncated)
        value: String,
        /// Accepted values
        allowed: &'static [&'static str],
    },

    /// Object carrying a `$ref` key
    #[error("references are not supported")]
    Reference,

    /// Depth, node or size limit exceeded
    #[error("document too complex: {0}")]
    Complexity(String),

    /// Not parseable as JSON
    #[error("malformed JSON: {0}")]
    Malformed(String),

    /// Dangerous construct the sanitizer could not remove
    #[error("unsafe content: {0}")]
    UnsafeContent(String),

    /// Map key that became equal to another key once sanitized
    #[error("key collides with \"{0}\" after sanitization")]
    KeyCollision(String),
}

/// A structural problem at a field path such as `scenes[2].questions[0].options`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Dotted path; empty for the document root
    pub path: String,
    /// Problem
    pub kind: ErrorKind,
}

impl FieldError {
    /// Error at `path`
    pub fn new(path: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Error about the document as a whole
    pub fn root(kind: ErrorKind) -> Self {
        Self::new(String::new(), kind)
    }

    /// Whether this is the terminal complexity error
    pub fn is_complexity(&self) -> bool {
        matches!(self.kind, ErrorKind::Complexity(_))
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

impl std::error::Error for FieldError {}

/// Cross-field invariant broken by a structurally valid manifest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    /// Every option of a question is marked incorrect
    #[error("{path}: question \"{question_id}\" has no correct answer")]
    NoCorrectAnswer {
        /// Path of the question
        path: String,
        /// Question id
        question_id: String,
    },

    /// Two scenes share an id
    #[error("scenes[{index}].scene_id: duplicate scene ID \"{scene_id}\"")]
    DuplicateSceneId {
        /// Index of the later scene
        index: usize,
        /// Shared id
        scene_id: String,
    },

    /// Declared total differs from the scene sum by more than the tolerance
    #[error(
        "total_duration: duration mismatch, declared {declared}s but scenes sum to {actual}s (tolerance {tolerance}s)"
    )]
    DurationMismatch {
        /// `total_duration`
        declared: u64,
        /// Sum of scene durations
        actual: u64,
        /// Allowed gap
        tolerance: u64,
    },

    /// Dialogue turn names a character the scene does not declare
    #[error("{path}: unknown character \"{character_id}\"")]
    UnknownCharacter {
        /// Path of the `character_id` field
        path: String,
        /// Referenced id
        character_id: String,
    },

    /// Repeated character, question or option id
    #[error("{path}: duplicate {what} ID \"{id}\"")]
    DuplicateId {
        /// Path of the later occurrence
        path: String,
        /// "character", "question" or "option"
        what: &'static str,
        /// Shared id
        id: String,
    },
}

/// Non-fatal finding: admitted, but flagged for review
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleWarning {
    /// `true_false` question without exactly two options
    #[error("{path}: true/false question has {count} options")]
    TrueFalseOptionCount {
        /// Path of the question
        path: String,
        /// Options found
        count: usize,
    },

    /// `single_choice` question with several correct options
    #[error("{path}: single-choice question has {count} correct options")]
    MultipleCorrectSingleChoice {
        /// Path of the question
        path: String,
        /// Correct options found
        count: usize,
    },

    /// Dialogue turn scheduled before the previous one
    #[error("{path}: timing {timing}s is earlier than the previous turn ({previous}s)")]
    TimingOutOfOrder {
        /// Path of the `timing` field
        path: String,
        /// This turn's offset
        timing: f64,
        /// Previous turn's offset
        previous: f64,
    },
}
