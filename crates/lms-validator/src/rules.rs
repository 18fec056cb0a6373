//! Business rules over a structurally valid manifest
//!
//! Every rule runs; nothing short-circuits. Violations block the manifest,
//! warnings admit it with a review flag.

use std::collections::HashSet;

use crate::error::{RuleViolation, RuleWarning};
use crate::model::{DialogueScene, Manifest, QuestionKind, QuizScene, Scene};

/// Outcome of a rule check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleReport {
    /// Blocking problems, in document order
    pub violations: Vec<RuleViolation>,
    /// Non-fatal findings, in document order
    pub warnings: Vec<RuleWarning>,
}

impl RuleReport {
    /// No violations
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Cross-field checker
#[derive(Debug, Clone)]
pub struct BusinessRules {
    duration_tolerance_secs: u64,
}

impl BusinessRules {
    /// Checker allowing `duration_tolerance_secs` between the declared
    /// total and the scene sum
    pub fn new(duration_tolerance_secs: u64) -> Self {
        Self {
            duration_tolerance_secs,
        }
    }

    /// Run every rule
    pub fn check(&self, manifest: &Manifest) -> RuleReport {
        let mut report = RuleReport::default();

        let mut scene_ids = HashSet::new();
        for (i, scene) in manifest.scenes.iter().enumerate() {
            if !scene_ids.insert(scene.scene_id()) {
                report.violations.push(RuleViolation::DuplicateSceneId {
                    index: i,
                    scene_id: scene.scene_id().to_string(),
                });
            }

            let base = format!("scenes[{i}]");
            match scene {
                Scene::Dialogue(d) => check_dialogue(d, &base, &mut report),
                Scene::Quiz(q) => check_quiz(q, &base, &mut report),
            }
        }

        let actual: u64 = manifest.scenes.iter().map(Scene::duration).sum();
        if actual.abs_diff(manifest.total_duration) > self.duration_tolerance_secs {
            report.violations.push(RuleViolation::DurationMismatch {
                declared: manifest.total_duration,
                actual,
                tolerance: self.duration_tolerance_secs,
            });
        }

        report
    }
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self::new(60)
    }
}

fn check_dialogue(scene: &DialogueScene, base: &str, report: &mut RuleReport) {
    let mut cast = HashSet::new();
    for (j, character) in scene.characters.iter().enumerate() {
        if !cast.insert(character.id.as_str()) {
            report.violations.push(RuleViolation::DuplicateId {
                path: format!("{base}.characters[{j}].id"),
                what: "character",
                id: character.id.clone(),
            });
        }
    }

    let mut previous: Option<f64> = None;
    for (j, turn) in scene.dialogue.iter().enumerate() {
        if !cast.contains(turn.character_id.as_str()) {
            report.violations.push(RuleViolation::UnknownCharacter {
                path: format!("{base}.dialogue[{j}].character_id"),
                character_id: turn.character_id.clone(),
            });
        }

        if let Some(timing) = turn.timing {
            if let Some(prev) = previous {
                if timing < prev {
                    report.warnings.push(RuleWarning::TimingOutOfOrder {
                        path: format!("{base}.dialogue[{j}].timing"),
                        timing,
                        previous: prev,
                    });
                }
            }
            previous = Some(timing);
        }
    }
}

fn check_quiz(scene: &QuizScene, base: &str, report: &mut RuleReport) {
    let mut question_ids = HashSet::new();
    for (j, question) in scene.questions.iter().enumerate() {
        let path = format!("{base}.questions[{j}]");

        if !question_ids.insert(question.id.as_str()) {
            report.violations.push(RuleViolation::DuplicateId {
                path: format!("{path}.id"),
                what: "question",
                id: question.id.clone(),
            });
        }

        let mut option_ids = HashSet::new();
        for (k, option) in question.options.iter().enumerate() {
            if !option_ids.insert(option.id.as_str()) {
                report.violations.push(RuleViolation::DuplicateId {
                    path: format!("{path}.options[{k}].id"),
                    what: "option",
                    id: option.id.clone(),
                });
            }
        }

        let correct = question.options.iter().filter(|o| o.is_correct).count();
        if correct == 0 {
            report.violations.push(RuleViolation::NoCorrectAnswer {
                path: path.clone(),
                question_id: question.id.clone(),
            });
        }

        match question.kind {
            QuestionKind::TrueFalse if question.options.len() != 2 => {
                report.warnings.push(RuleWarning::TrueFalseOptionCount {
                    path,
                    count: question.options.len(),
                });
            }
            QuestionKind::SingleChoice if correct > 1 => {
                report.warnings.push(RuleWarning::MultipleCorrectSingleChoice { path, count: correct });
            }
            _ => {}
        }
    }
}
