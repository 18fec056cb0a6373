//! Pipeline configuration

use std::path::Path;

use lms_common::{GuardError, GuardResult};
use lms_scanner::{ScannerConfig, ThreatCategory};
use serde::{Deserialize, Serialize};

/// Resource bounds applied before any typed conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityLimits {
    /// Maximum container nesting (root object is depth 1)
    pub max_depth: usize,
    /// Maximum number of values in the tree
    pub max_nodes: usize,
    /// Maximum raw document size in bytes
    pub max_document_bytes: usize,
}

impl Default for ComplexityLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_nodes: 1_000_000,
            max_document_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Validation pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Allowed gap between `total_duration` and the scene sum, in seconds
    pub duration_tolerance_secs: u64,
    /// Depth, node and size bounds
    pub limits: ComplexityLimits,
    /// Scanner rules, decoding and payload thresholds
    pub scanner: ScannerConfig,
    /// Residual findings in these categories fail validation; others warn
    pub blocking_categories: Vec<ThreatCategory>,
    /// Upper bound on sanitizer passes per string
    pub max_sanitize_passes: usize,
    /// Length of the most-frequent-errors ranking
    pub top_errors: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            duration_tolerance_secs: 60,
            limits: ComplexityLimits::default(),
            scanner: ScannerConfig::default(),
            blocking_categories: vec![
                ThreatCategory::ScriptInjection,
                ThreatCategory::MutationXss,
                ThreatCategory::CssInjection,
            ],
            max_sanitize_passes: 8,
            top_errors: 5,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> GuardResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> GuardResult<()> {
        if self.limits.max_depth == 0 {
            return Err(GuardError::ConfigError("limits.max_depth must be at least 1".into()));
        }
        if self.limits.max_nodes == 0 {
            return Err(GuardError::ConfigError("limits.max_nodes must be at least 1".into()));
        }
        if self.limits.max_document_bytes == 0 {
            return Err(GuardError::ConfigError(
                "limits.max_document_bytes must be at least 1".into(),
            ));
        }
        if self.max_sanitize_passes == 0 {
            return Err(GuardError::ConfigError("max_sanitize_passes must be at least 1".into()));
        }
        let ratio = self.scanner.payload_limits.max_compression_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(GuardError::ConfigError(format!(
                "scanner.payload_limits.max_compression_ratio must be positive, got {ratio}"
            )));
        }
        Ok(())
    }

    /// Whether residual findings of `category` fail validation
    pub fn is_blocking(&self, category: ThreatCategory) -> bool {
        self.blocking_categories.contains(&category)
    }
}
