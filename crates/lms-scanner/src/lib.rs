//! Security Pattern Scanner
//!
//! Stateless classification of untrusted strings and byte buffers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Text Scan Pipeline                       │
//! │                                                             │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Normalize  │──▶│Aho-Corasick │──▶│  RegexSet   │        │
//! │  │ (zero-width)│   │  literals   │   │  markers    │        │
//! │  └─────────────┘   └──────┬──────┘   └──────┬──────┘        │
//! │                           │                  │              │
//! │  ┌─────────────┐          │                  │              │
//! │  │   Decode    │──────────┴─ re-scan ────────┤              │
//! │  │ entity/hex/ │                             │              │
//! │  │ pct/base64  │          ┌─────────────┐    │              │
//! │  └─────────────┘          │  URL risk   │────┤              │
//! │                           └─────────────┘    ▼              │
//! │                                       ┌─────────────┐       │
//! │                                       │  Findings   │       │
//! │                                       └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Byte buffers go through [`payload`]: magic-byte signatures, polyglot
//! detection and decompression-bomb ratios.
//!
//! Detectors key on syntactic markers (tags, attribute syntax, quotes
//! followed by SQL operators, shell metacharacters followed by binaries),
//! never on natural-language keywords, so ordinary prose in any script
//! classifies as clean.

#![warn(missing_docs)]

pub mod encoding;
pub mod entropy;
pub mod patterns;
pub mod payload;
pub mod rules;
pub mod scanner;
pub mod url_risk;

pub use patterns::PatternSet;
pub use payload::{DeclaredType, FileFormat, PayloadLimits, PayloadReport};
pub use rules::{default_rules, Rule, RuleKind};
pub use scanner::{ScannerConfig, SecurityScanner};
pub use url_risk::{UrlPolicy, UrlRisk};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of dangerous construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    /// `<script>`, event handlers, script URL schemes, encoded variants
    ScriptInjection,
    /// Dangerous attributes inside uncommon tags (`<svg onload>`, `<iframe srcdoc>`)
    MutationXss,
    /// Tautologies, stacked statements, comment termination, timing functions
    SqlInjection,
    /// Shell metacharacters driving destructive or network binaries
    CommandInjection,
    /// `expression(`, script URLs in `url()`, `behavior:`, `@import`, bindings
    CssInjection,
    /// Risky schemes, credentials, IP hosts, bad or shortener domains, free TLDs
    UrlRisk,
    /// Executable/archive signatures, polyglots, decompression bombs
    FilePayload,
}

impl ThreatCategory {
    /// Every category, in reporting order
    pub const ALL: [ThreatCategory; 7] = [
        ThreatCategory::ScriptInjection,
        ThreatCategory::MutationXss,
        ThreatCategory::SqlInjection,
        ThreatCategory::CommandInjection,
        ThreatCategory::CssInjection,
        ThreatCategory::UrlRisk,
        ThreatCategory::FilePayload,
    ];

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScriptInjection => "script_injection",
            Self::MutationXss => "mutation_xss",
            Self::SqlInjection => "sql_injection",
            Self::CommandInjection => "command_injection",
            Self::CssInjection => "css_injection",
            Self::UrlRisk => "url_risk",
            Self::FilePayload => "file_payload",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Severity {
    /// Informational
    Info = 0,
    /// Low risk
    Low = 1,
    /// Medium risk
    Medium = 2,
    /// High risk
    High = 3,
    /// Critical risk
    Critical = 4,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Medium
    }
}

/// A single detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Category of the construct
    pub category: ThreatCategory,
    /// Name of the rule that fired
    pub rule: String,
    /// Severity
    pub severity: Severity,
    /// Matched only after decoding an entity/escape/base64 layer
    pub encoded: bool,
    /// Extra context (offending URL, format list, ratio)
    pub detail: Option<String>,
}

impl Finding {
    /// Build a finding on the raw (undecoded) input
    pub fn new(category: ThreatCategory, rule: impl Into<String>, severity: Severity) -> Self {
        Self {
            category,
            rule: rule.into(),
            severity,
            encoded: false,
            detail: None,
        }
    }

    /// Attach context
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.category, self.rule)?;
        if self.encoded {
            f.write_str(" [encoded]")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Result of scanning one string
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Findings, deduplicated by (category, rule)
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// Whether any dangerous pattern matched
    pub fn is_malicious(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Whether a category matched
    pub fn has(&self, category: ThreatCategory) -> bool {
        self.findings.iter().any(|f| f.category == category)
    }

    /// Distinct categories, in reporting order
    pub fn categories(&self) -> Vec<ThreatCategory> {
        ThreatCategory::ALL
            .iter()
            .copied()
            .filter(|c| self.has(*c))
            .collect()
    }

    /// Highest severity found
    pub fn highest_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Add a finding unless the same (category, rule) is already present.
    /// A raw match wins over an encoded one.
    pub(crate) fn push(&mut self, finding: Finding) {
        if let Some(existing) = self
            .findings
            .iter_mut()
            .find(|f| f.category == finding.category && f.rule == finding.rule)
        {
            existing.encoded &= finding.encoded;
            return;
        }
        self.findings.push(finding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        assert_eq!(ThreatCategory::ScriptInjection.to_string(), "script_injection");
        assert_eq!(ThreatCategory::ALL.len(), 7);
        let json = serde_json::to_string(&ThreatCategory::MutationXss).unwrap();
        assert_eq!(json, "\"mutation_xss\"");
    }

    #[test]
    fn test_report_dedup_prefers_raw() {
        let mut report = ScanReport::default();
        let mut encoded = Finding::new(ThreatCategory::ScriptInjection, "script_tag", Severity::Critical);
        encoded.encoded = true;
        report.push(encoded);
        report.push(Finding::new(ThreatCategory::ScriptInjection, "script_tag", Severity::Critical));

        assert_eq!(report.findings.len(), 1);
        assert!(!report.findings[0].encoded);
        assert_eq!(report.categories(), vec![ThreatCategory::ScriptInjection]);
        assert_eq!(report.highest_severity(), Some(Severity::Critical));
    }

    #[test]
    fn test_finding_display() {
        let f = Finding::new(ThreatCategory::UrlRisk, "ip_literal_host", Severity::Medium)
            .with_detail("http://10.0.0.1/");
        assert_eq!(f.to_string(), "url_risk (ip_literal_host): http://10.0.0.1/");
    }
}
