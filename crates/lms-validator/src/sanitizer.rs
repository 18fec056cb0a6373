//! Content Sanitizer
//!
//! Meaning-preserving removal of markup attack vectors from every free-text
//! field of a validated manifest.
//!
//! # Invariants
//! - `sanitize_text(sanitize_text(s)) == sanitize_text(s)`. Passes repeat
//!   until the text stops changing; if the pass budget runs out first, every
//!   trigger byte is dropped, which leaves a string the fast path returns
//!   untouched.
//! - Text without `<`, `:` or a C0 control is returned as-is (borrowed).
//! - Non-ASCII text is never altered outside a matched construct.
//! - Sanitized strings are re-scanned; what survives is reported, not
//!   silently dropped.

use std::borrow::Cow;

use lms_common::{GuardError, GuardResult};
use lms_scanner::{Finding, SecurityScanner};
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::warn;

use crate::complexity::measure_value;
use crate::config::ComplexityLimits;
use crate::error::{ErrorKind, FieldError};
use crate::model::Manifest;

/// A finding still present after sanitization
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    /// Field path
    pub path: String,
    /// What the scanner matched
    pub finding: Finding,
}

/// What sanitizing a manifest changed and what it could not fix
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizeReport {
    /// Paths of rewritten fields, in document order
    pub modified: Vec<String>,
    /// Findings on the rewritten text
    pub residual: Vec<Residual>,
    /// Terminology keys dropped because their rewrite matched another key
    pub collisions: Vec<FieldError>,
}

/// Compiled rewrite passes
pub struct Sanitizer {
    script_block: Regex,
    style_block: Regex,
    dangling_tag: Regex,
    embedding_tag: Regex,
    tag: Regex,
    event_attribute: Regex,
    script_scheme: Regex,
    data_html: Regex,
    max_passes: usize,
}

fn compile(name: &str, pattern: &str) -> GuardResult<Regex> {
    Regex::new(pattern).map_err(|e| GuardError::PatternCompile {
        rule: name.to_string(),
        reason: e.to_string(),
    })
}

#[inline]
fn is_stripped_control(c: char) -> bool {
    c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')
}

#[inline]
fn has_trigger(text: &str) -> bool {
    text.bytes()
        .any(|b| b == b'<' || b == b':' || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r')))
}

impl Sanitizer {
    /// Compile the rewrite patterns. At most `max_passes` passes run per string.
    pub fn new(max_passes: usize) -> GuardResult<Self> {
        Ok(Self {
            script_block: compile("script_block", r"(?is)<\s*script(?-u:\b)[^>]*>.*?<\s*/\s*script\s*>")?,
            style_block: compile("style_block", r"(?is)<\s*style(?-u:\b)[^>]*>.*?<\s*/\s*style\s*>")?,
            dangling_tag: compile("dangling_tag", r"(?i)<\s*/?\s*(?:script|style)(?-u:\b)[^>]*>?")?,
            embedding_tag: compile(
                "embedding_tag",
                r"(?i)<\s*/?\s*(?:iframe|object|embed|applet|frame|frameset|meta|base|link)(?-u:\b)[^>]*>?",
            )?,
            tag: compile("tag", r"(?i)<[a-z][a-z0-9:-]*[\s/][^>]*>?")?,
            event_attribute: compile(
                "event_attribute",
                r#"(?i)(?-u:\b)on[a-z]{3,}\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]*)"#,
            )?,
            script_scheme: compile(
                "script_scheme",
                r"(?i)(?-u:\b)(?:java|vb|live)[\s\x00-\x1f]*script[\s\x00-\x1f]*:(\S)",
            )?,
            data_html: compile("data_html", r"(?i)(?-u:\b)data\s*:\s*text/html")?,
            max_passes: max_passes.max(1),
        })
    }

    /// Rewrite one string
    pub fn sanitize_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !has_trigger(text) {
            return Cow::Borrowed(text);
        }

        let mut current = text.to_string();
        for _ in 0..self.max_passes {
            let next = self.pass(&current);
            if next == current {
                return if current == text {
                    Cow::Borrowed(text)
                } else {
                    Cow::Owned(current)
                };
            }
            current = next;
        }

        warn!(
            passes = self.max_passes,
            len = text.len(),
            "sanitizer did not converge, dropping markup characters"
        );
        Cow::Owned(current.chars().filter(|&c| c != '<' && c != ':' && !is_stripped_control(c)).collect())
    }

    fn pass(&self, text: &str) -> String {
        let out = self.script_block.replace_all(text, "");
        let out = self.style_block.replace_all(&out, "");
        let out = self.dangling_tag.replace_all(&out, "");
        let out = self.embedding_tag.replace_all(&out, "");
        let out = self
            .tag
            .replace_all(&out, |caps: &Captures<'_>| self.event_attribute.replace_all(&caps[0], "").into_owned());
        let out = self.script_scheme.replace_all(&out, "$1");
        let out = self.data_html.replace_all(&out, "");

        if out.chars().any(is_stripped_control) {
            out.chars().filter(|&c| !is_stripped_control(c)).collect()
        } else {
            out.into_owned()
        }
    }

    /// Rewrite every free-text field in place and re-scan the result
    pub fn sanitize_manifest(&self, manifest: &mut Manifest, scanner: &SecurityScanner) -> SanitizeReport {
        let mut report = SanitizeReport::default();

        let collisions = manifest.for_each_text_mut(|path, text| {
            let rewritten = match self.sanitize_text(text) {
                Cow::Owned(clean) => Some(clean),
                Cow::Borrowed(_) => None,
            };
            if let Some(clean) = rewritten {
                *text = clean;
                report.modified.push(path.to_string());
            }

            for finding in scanner.scan_text(text).findings {
                report.residual.push(Residual {
                    path: path.to_string(),
                    finding,
                });
            }
        });

        report.collisions = collisions
            .into_iter()
            .map(|(path, key)| FieldError::new(path, ErrorKind::KeyCollision(key)))
            .collect();

        if !report.residual.is_empty() {
            warn!(
                fields = report.residual.len(),
                "content still matches dangerous patterns after sanitization"
            );
        }

        report
    }

    /// Apply the string rewrite to every string (keys included) of an
    /// arbitrary tree. Trees over the complexity limits are refused.
    pub fn sanitize_value(&self, mut value: Value, limits: &ComplexityLimits) -> Result<Value, FieldError> {
        measure_value(&value, limits)?;

        let mut work: Vec<&mut Value> = vec![&mut value];
        while let Some(node) = work.pop() {
            match node {
                Value::String(s) => {
                    let rewritten = match self.sanitize_text(s) {
                        Cow::Owned(clean) => Some(clean),
                        Cow::Borrowed(_) => None,
                    };
                    if let Some(clean) = rewritten {
                        *s = clean;
                    }
                }
                Value::Array(items) => work.extend(items.iter_mut()),
                Value::Object(map) => {
                    if map.keys().any(|k| has_trigger(k)) {
                        let entries = std::mem::take(map);
                        for (key, item) in entries {
                            map.insert(self.sanitize_text(&key).into_owned(), item);
                        }
                    }
                    work.extend(map.values_mut());
                }
                _ => {}
            }
        }

        Ok(value)
    }
}
