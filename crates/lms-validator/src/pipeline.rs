//! Pipeline Orchestrator
//!
//! parse -> schema -> business rules -> sanitize -> residual scan -> stats.
//! Every failure is a [`ValidationResult`] with `success = false`; nothing
//! in here panics or returns `Err` because of document content.

use std::sync::Arc;
use std::time::Instant;

use lms_common::GuardResult;
use lms_scanner::{DeclaredType, PayloadReport, SecurityScanner};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{ErrorKind, FieldError};
use crate::rules::BusinessRules;
use crate::sanitizer::Sanitizer;
use crate::schema::{parse_document, validate_manifest};
use crate::stats::{StatsSnapshot, ValidationStats};
use crate::suggestion::suggest;

/// Outcome of one validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Whether the manifest may be published
    pub success: bool,
    /// Blocking problems, `path: message`
    pub errors: Vec<String>,
    /// Admitted, but flagged for review
    pub warnings: Vec<String>,
    /// Sanitized manifest; present only on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_content: Option<Value>,
    /// Remediation hint for the first structural error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationResult {
    /// Failed result
    pub fn failure(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            warnings,
            sanitized_content: None,
            suggestion: None,
        }
    }

    fn structural(errors: &[FieldError]) -> Self {
        Self {
            suggestion: suggest(errors),
            ..Self::failure(errors.iter().map(ToString::to_string).collect(), Vec::new())
        }
    }

    /// Whether review is advised even though the manifest passed
    pub fn needs_review(&self) -> bool {
        self.success && !self.warnings.is_empty()
    }
}

/// Validation pipeline
///
/// Compiled once and shared; every method takes `&self`.
pub struct ValidationPipeline {
    config: PipelineConfig,
    scanner: SecurityScanner,
    sanitizer: Sanitizer,
    rules: BusinessRules,
    stats: Arc<ValidationStats>,
}

impl ValidationPipeline {
    /// Compile the scanner and sanitizer for `config`
    pub fn new(config: PipelineConfig, stats: Arc<ValidationStats>) -> GuardResult<Self> {
        config.validate()?;

        let scanner = SecurityScanner::new(config.scanner.clone())?;
        let sanitizer = Sanitizer::new(config.max_sanitize_passes)?;
        let rules = BusinessRules::new(config.duration_tolerance_secs);

        info!(
            max_depth = config.limits.max_depth,
            max_nodes = config.limits.max_nodes,
            tolerance_secs = config.duration_tolerance_secs,
            "validation pipeline ready"
        );

        Ok(Self {
            config,
            scanner,
            sanitizer,
            rules,
            stats,
        })
    }

    /// Pipeline with default configuration and its own statistics
    pub fn with_defaults() -> GuardResult<Self> {
        Self::new(PipelineConfig::default(), Arc::new(ValidationStats::new()))
    }

    /// Validate a raw document
    pub fn validate_bytes(&self, bytes: &[u8]) -> ValidationResult {
        self.timed(|| match parse_document(bytes, &self.config.limits) {
            Ok(value) => self.run(&value),
            Err(error) => {
                warn!(size = bytes.len(), error = %error, "document rejected before parsing");
                ValidationResult::structural(&[error])
            }
        })
    }

    /// Validate a document held as text
    pub fn validate_str(&self, text: &str) -> ValidationResult {
        self.validate_bytes(text.as_bytes())
    }

    /// Validate an already-parsed tree
    pub fn validate_value(&self, value: &Value) -> ValidationResult {
        self.timed(|| self.run(value))
    }

    /// Validate many documents in parallel. Results keep input order.
    pub fn validate_batch<T>(&self, documents: &[T]) -> Vec<ValidationResult>
    where
        T: AsRef<[u8]> + Sync,
    {
        let results: Vec<ValidationResult> = documents
            .par_iter()
            .map(|doc| self.validate_bytes(doc.as_ref()))
            .collect();

        let passed = results.iter().filter(|r| r.success).count();
        info!(
            total = results.len(),
            passed,
            failed = results.len() - passed,
            "batch validated"
        );

        results
    }

    /// Pre-screen a raw buffer (upload, attachment) before it is trusted
    pub fn inspect_payload(&self, data: &[u8], declared: DeclaredType) -> PayloadReport {
        let report = self.scanner.inspect_payload(data, declared);
        if report.is_malicious() {
            warn!(
                size = report.size,
                findings = report.findings.len(),
                "payload rejected"
            );
        }
        report
    }

    /// Sanitize an arbitrary tree under the configured limits
    pub fn sanitize_value(&self, value: Value) -> Result<Value, FieldError> {
        self.sanitizer.sanitize_value(value, &self.config.limits)
    }

    /// Shared statistics
    pub fn stats(&self) -> &Arc<ValidationStats> {
        &self.stats
    }

    /// Statistics ranked to the configured length
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot_with(self.config.top_errors)
    }

    /// Compiled scanner
    pub fn scanner(&self) -> &SecurityScanner {
        &self.scanner
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn timed(&self, validate: impl FnOnce() -> ValidationResult) -> ValidationResult {
        let start = Instant::now();
        let result = validate();
        self.stats.record(&result);
        self.stats.record_latency(start.elapsed());
        result
    }

    fn run(&self, value: &Value) -> ValidationResult {
        let mut manifest = match validate_manifest(value, &self.config.limits) {
            Ok(manifest) => manifest,
            Err(errors) => {
                warn!(errors = errors.len(), "manifest failed structural validation");
                return ValidationResult::structural(&errors);
            }
        };
        debug!(id = %manifest.id, scenes = manifest.scenes.len(), "structure valid");

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let report = self.rules.check(&manifest);
        errors.extend(report.violations.iter().map(ToString::to_string));
        warnings.extend(report.warnings.iter().map(ToString::to_string));
        debug!(
            violations = report.violations.len(),
            warnings = report.warnings.len(),
            "business rules checked"
        );

        let sanitized = self.sanitizer.sanitize_manifest(&mut manifest, &self.scanner);
        let mut unsafe_fields = Vec::new();
        for residual in &sanitized.residual {
            if self.config.is_blocking(residual.finding.category) {
                unsafe_fields.push(FieldError::new(
                    residual.path.clone(),
                    ErrorKind::UnsafeContent(residual.finding.to_string()),
                ));
            } else {
                warnings.push(format!(
                    "{}: potentially unsafe content: {}",
                    residual.path, residual.finding
                ));
            }
        }
        unsafe_fields.extend(sanitized.collisions.iter().cloned());
        warnings.extend(sanitized.modified.iter().map(|path| format!("{path}: content sanitized")));
        debug!(
            modified = sanitized.modified.len(),
            residual = sanitized.residual.len(),
            "content sanitized"
        );

        let suggestion = suggest(&unsafe_fields);
        errors.extend(unsafe_fields.iter().map(ToString::to_string));

        if !errors.is_empty() {
            warn!(id = %manifest.id, errors = errors.len(), "manifest rejected");
            return ValidationResult {
                suggestion,
                ..ValidationResult::failure(errors, warnings)
            };
        }

        match serde_json::to_value(&manifest) {
            Ok(content) => ValidationResult {
                success: true,
                errors,
                warnings,
                sanitized_content: Some(content),
                suggestion: None,
            },
            Err(e) => {
                warn!(id = %manifest.id, error = %e, "sanitized manifest could not be serialized");
                ValidationResult::failure(vec![ErrorKind::Malformed(e.to_string()).to_string()], warnings)
            }
        }
    }
}
