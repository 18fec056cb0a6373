//! Recovery hints for content generators

use crate::error::{ErrorKind, FieldError};

/// One remediation hint for the first structural error, if any
pub fn suggest(errors: &[FieldError]) -> Option<String> {
    errors.first().map(hint)
}

fn hint(error: &FieldError) -> String {
    let at = if error.path.is_empty() {
        "the document root".to_string()
    } else {
        format!("path {}", error.path)
    };

    match &error.kind {
        ErrorKind::TypeMismatch { expected, found } => {
            format!("expected {expected} but got {found} at {at}")
        }
        ErrorKind::Missing => format!("add the required field at {at}"),
        ErrorKind::TooShort { min, .. } => {
            format!("value at {at} must be at least {min} characters long")
        }
        ErrorKind::TooLong { max, .. } => {
            format!("shorten the value at {at} to at most {max} characters")
        }
        ErrorKind::TooFewItems { min, .. } => format!("add items at {at}; at least {min} are required"),
        ErrorKind::TooManyItems { max, .. } => format!("remove items at {at}; at most {max} are allowed"),
        ErrorKind::BelowMinimum { min, .. } => format!("value at {at} is below the minimum of {min}"),
        ErrorKind::AboveMaximum { max, .. } => format!("value at {at} is above the maximum of {max}"),
        ErrorKind::Pattern { name, pattern } => {
            format!("value at {at} must be a valid {name} matching {pattern}")
        }
        ErrorKind::Enum { allowed, .. } => {
            format!("use one of {} at {at}", allowed.join(", "))
        }
        ErrorKind::Reference => format!("inline the referenced content at {at} instead of using $ref"),
        ErrorKind::Complexity(_) => {
            "flatten the document: reduce nesting depth and the number of values".to_string()
        }
        ErrorKind::Malformed(_) => "regenerate the output as a single well-formed UTF-8 JSON object".to_string(),
        ErrorKind::UnsafeContent(_) => format!("remove markup and script from the text at {at}"),
        ErrorKind::KeyCollision(key) => {
            format!("rename the key at {at} so it stays distinct from \"{key}\" without markup")
        }
    }
}
