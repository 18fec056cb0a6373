//! LMS Guard Validator
//!
//! Validation and sanitization pipeline for AI-generated learning-module
//! manifests. A manifest arrives as untrusted JSON and leaves as either a
//! sanitized, typed document or a list of field-path errors.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      ValidationPipeline                          │
//! │                                                                  │
//! │  bytes ──▶ prescreen ──▶ parse ──▶ measure ──▶ schema            │
//! │           (size/depth)            (stack walk)   │               │
//! │                                                  ▼               │
//! │                    sanitize ◀── business rules ◀─ Manifest       │
//! │                       │                                          │
//! │                       ▼                                          │
//! │              residual scan (lms-scanner) ──▶ ValidationResult    │
//! │                                                   │              │
//! │                                                   ▼              │
//! │                                         Arc<ValidationStats>     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lms_validator::{PipelineConfig, ValidationPipeline, ValidationStats};
//!
//! let stats = Arc::new(ValidationStats::new());
//! let pipeline = ValidationPipeline::new(PipelineConfig::default(), Arc::clone(&stats))?;
//!
//! let result = pipeline.validate_str(r#"{"id": "m1"}"#);
//! if !result.success {
//!     for error in &result.errors {
//!         eprintln!("{error}");
//!     }
//! }
//! # Ok::<(), lms_common::GuardError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod complexity;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod rules;
pub mod sanitizer;
pub mod schema;
pub mod stats;
pub mod suggestion;

pub use config::{ComplexityLimits, PipelineConfig};
pub use error::{ErrorKind, FieldError, RuleViolation, RuleWarning};
pub use model::{
    Character, CulturalAdaptation, DialogueScene, DialogueTurn, Difficulty, Emotion, Manifest, QuestionKind,
    QuizOption, QuizQuestion, QuizScene, Scene,
};
pub use pipeline::{ValidationPipeline, ValidationResult};
pub use rules::{BusinessRules, RuleReport};
pub use sanitizer::{Residual, SanitizeReport, Sanitizer};
pub use stats::{ErrorFrequency, StatsSnapshot, ValidationStats};
pub use suggestion::suggest;

pub use lms_scanner::{DeclaredType, PayloadReport, SecurityScanner, ThreatCategory};
