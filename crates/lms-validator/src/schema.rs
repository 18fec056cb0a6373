//! Schema Validator
//!
//! Converts an untyped `serde_json::Value` into a [`Manifest`], collecting
//! every structural error with its field path rather than stopping at the
//! first. Unknown keys are ignored. A tree that fails the complexity
//! measure yields that single error and nothing else.

use serde_json::{Map, Value};
use tracing::debug;

use crate::complexity::{measure_value, prescreen_bytes};
use crate::config::ComplexityLimits;
use crate::error::{ErrorKind, FieldError};
use crate::model::{
    Character, CulturalAdaptation, DialogueScene, DialogueTurn, Difficulty, Emotion, Manifest, QuestionKind,
    QuizOption, QuizQuestion, QuizScene, Scene,
};

/// Identifier shape
pub const IDENTIFIER_PATTERN: &str = "^[A-Za-z0-9_-]+$";
/// Semantic version shape
pub const VERSION_PATTERN: &str = r"^\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$";
/// Language tag shape
pub const LANGUAGE_PATTERN: &str = "^[a-z]{2}(-[A-Z]{2})?$";

const SCENE_TYPES: &[&str] = &["dialogue", "quiz"];

/// Longest enum value echoed back in an error
const MAX_ECHO_CHARS: usize = 50;

const MAX_SCENES: usize = 100;
const DIALOGUE_DURATION: (u64, u64) = (30, 1800);
const QUIZ_DURATION: (u64, u64) = (60, 3600);
/// Upper bound on `total_duration`: every scene at the longest duration
const MAX_TOTAL_DURATION: u64 = MAX_SCENES as u64 * QUIZ_DURATION.1;

/// Parse raw bytes into a tree.
///
/// Size, depth and value count are checked on the bytes first, so hostile
/// nesting never reaches the parser.
pub fn parse_document(bytes: &[u8], limits: &ComplexityLimits) -> Result<Value, FieldError> {
    prescreen_bytes(bytes, limits)?;

    if let Err(e) = std::str::from_utf8(bytes) {
        return Err(FieldError::root(ErrorKind::Malformed(format!(
            "invalid UTF-8 at byte {}",
            e.valid_up_to()
        ))));
    }

    serde_json::from_slice(bytes).map_err(|e| FieldError::root(ErrorKind::Malformed(e.to_string())))
}

/// Validate a parsed tree against the manifest schema
pub fn validate_manifest(value: &Value, limits: &ComplexityLimits) -> Result<Manifest, Vec<FieldError>> {
    let metrics = measure_value(value, limits).map_err(|e| vec![e])?;
    debug!(depth = metrics.depth, nodes = metrics.nodes, "document measured");

    let mut walker = Walker::default();
    for path in metrics.references {
        walker.push(&path, ErrorKind::Reference);
    }

    let manifest = walker.manifest(value);

    match manifest {
        Some(m) if walker.errors.is_empty() => Ok(m),
        _ => Err(walker.errors),
    }
}

/// Name of a JSON type as used in messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Inclusive bounds
#[derive(Clone, Copy)]
struct Bounds {
    min: usize,
    max: usize,
}

const fn len(min: usize, max: usize) -> Bounds {
    Bounds { min, max }
}

#[derive(Default)]
struct Walker {
    errors: Vec<FieldError>,
}

impl Walker {
    fn push(&mut self, path: &str, kind: ErrorKind) {
        self.errors.push(FieldError::new(path, kind));
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.push(
                    path,
                    ErrorKind::TypeMismatch {
                        expected: "object",
                        found: type_name(other),
                    },
                );
                None
            }
        }
    }

    /// Present, non-null field. Reports `Missing` when required.
    fn field<'v>(&mut self, obj: &'v Map<String, Value>, path: &str, key: &str, required: bool) -> Option<&'v Value> {
        match obj.get(key) {
            Some(Value::Null) | None => {
                if required {
                    self.push(&join(path, key), ErrorKind::Missing);
                }
                None
            }
            Some(v) => Some(v),
        }
    }

    fn text_value(&mut self, value: &Value, path: &str, bounds: Bounds) -> Option<String> {
        let Value::String(s) = value else {
            self.push(
                path,
                ErrorKind::TypeMismatch {
                    expected: "string",
                    found: type_name(value),
                },
            );
            return None;
        };

        let chars = s.chars().count();
        if chars < bounds.min {
            self.push(path, ErrorKind::TooShort { min: bounds.min, actual: chars });
            None
        } else if chars > bounds.max {
            self.push(path, ErrorKind::TooLong { max: bounds.max, actual: chars });
            None
        } else {
            Some(s.clone())
        }
    }

    fn text(&mut self, obj: &Map<String, Value>, path: &str, key: &str, bounds: Bounds) -> Option<String> {
        let value = self.field(obj, path, key, true)?;
        self.text_value(value, &join(path, key), bounds)
    }

    fn optional_text(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        bounds: Bounds,
    ) -> Option<String> {
        let value = self.field(obj, path, key, false)?;
        self.text_value(value, &join(path, key), bounds)
    }

    #[allow(clippy::too_many_arguments)]
    fn shaped(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        bounds: Bounds,
        name: &'static str,
        pattern: &'static str,
        check: fn(&str) -> bool,
    ) -> Option<String> {
        let s = self.text(obj, path, key, bounds)?;
        if check(&s) {
            Some(s)
        } else {
            self.push(&join(path, key), ErrorKind::Pattern { name, pattern });
            None
        }
    }

    fn identifier(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<String> {
        self.shaped(obj, path, key, len(1, 100), "identifier", IDENTIFIER_PATTERN, is_identifier)
    }

    fn enumeration<T>(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        required: bool,
        allowed: &'static [&'static str],
        parse: fn(&str) -> Option<T>,
    ) -> Option<T> {
        let value = self.field(obj, path, key, required)?;
        let field_path = join(path, key);
        let Value::String(s) = value else {
            self.push(
                &field_path,
                ErrorKind::TypeMismatch {
                    expected: "string",
                    found: type_name(value),
                },
            );
            return None;
        };

        let parsed = parse(s);
        if parsed.is_none() {
            self.push(
                &field_path,
                ErrorKind::Enum {
                    value: s.chars().take(MAX_ECHO_CHARS).collect(),
                    allowed,
                },
            );
        }
        parsed
    }

    fn integer_value(&mut self, value: &Value, path: &str, min: u64, max: u64) -> Option<u64> {
        let Value::Number(n) = value else {
            self.push(
                path,
                ErrorKind::TypeMismatch {
                    expected: "integer",
                    found: type_name(value),
                },
            );
            return None;
        };

        let whole = if let Some(u) = n.as_u64() {
            u as f64
        } else if let Some(i) = n.as_i64() {
            i as f64
        } else {
            match n.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 => f,
                _ => {
                    self.push(
                        path,
                        ErrorKind::TypeMismatch {
                            expected: "integer",
                            found: "number",
                        },
                    );
                    return None;
                }
            }
        };

        if whole < min as f64 {
            self.push(path, ErrorKind::BelowMinimum { value: whole, min: min as f64 });
            None
        } else if whole > max as f64 {
            self.push(path, ErrorKind::AboveMaximum { value: whole, max: max as f64 });
            None
        } else {
            Some(whole as u64)
        }
    }

    fn integer(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        required: bool,
        min: u64,
        max: u64,
    ) -> Option<u64> {
        let value = self.field(obj, path, key, required)?;
        self.integer_value(value, &join(path, key), min, max)
    }

    fn number(&mut self, obj: &Map<String, Value>, path: &str, key: &str, min: f64, max: f64) -> Option<f64> {
        let value = self.field(obj, path, key, false)?;
        let field_path = join(path, key);
        let Some(n) = value.as_f64() else {
            self.push(
                &field_path,
                ErrorKind::TypeMismatch {
                    expected: "number",
                    found: type_name(value),
                },
            );
            return None;
        };

        if n < min {
            self.push(&field_path, ErrorKind::BelowMinimum { value: n, min });
            None
        } else if n > max {
            self.push(&field_path, ErrorKind::AboveMaximum { value: n, max });
            None
        } else {
            Some(n)
        }
    }

    fn boolean(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<bool> {
        let value = self.field(obj, path, key, true)?;
        match value {
            Value::Bool(b) => Some(*b),
            other => {
                self.push(
                    &join(path, key),
                    ErrorKind::TypeMismatch {
                        expected: "boolean",
                        found: type_name(other),
                    },
                );
                None
            }
        }
    }

    fn array<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        path: &str,
        key: &str,
        required: bool,
        bounds: Bounds,
    ) -> Option<&'v [Value]> {
        let value = self.field(obj, path, key, required)?;
        let field_path = join(path, key);
        let Value::Array(items) = value else {
            self.push(
                &field_path,
                ErrorKind::TypeMismatch {
                    expected: "array",
                    found: type_name(value),
                },
            );
            return None;
        };

        if items.len() < bounds.min {
            self.push(&field_path, ErrorKind::TooFewItems { min: bounds.min, actual: items.len() });
            None
        } else if items.len() > bounds.max {
            self.push(&field_path, ErrorKind::TooManyItems { max: bounds.max, actual: items.len() });
            None
        } else {
            Some(items)
        }
    }

    /// Array of strings; returns only when every item is valid
    fn string_list(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        required: bool,
        count: Bounds,
        item: Bounds,
    ) -> Option<Vec<String>> {
        let items = self.array(obj, path, key, required, count)?;
        let base = join(path, key);
        let parsed: Vec<Option<String>> = items
            .iter()
            .enumerate()
            .map(|(i, v)| self.text_value(v, &format!("{base}[{i}]"), item))
            .collect();
        parsed.into_iter().collect()
    }

    /// Convert each item; `None` when any item failed
    fn list<T>(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        count: Bounds,
        mut convert: impl FnMut(&mut Self, &Value, &str) -> Option<T>,
    ) -> Option<Vec<T>> {
        let items = self.array(obj, path, key, true, count)?;
        let base = join(path, key);
        let converted: Vec<Option<T>> = items
            .iter()
            .enumerate()
            .map(|(i, v)| convert(self, v, &format!("{base}[{i}]")))
            .collect();
        converted.into_iter().collect()
    }

    fn manifest(&mut self, value: &Value) -> Option<Manifest> {
        let obj = self.object(value, "")?;
        let p = "";

        let id = self.identifier(obj, p, "id");
        let version = self.shaped(obj, p, "version", len(5, 64), "semantic version", VERSION_PATTERN, is_semver);
        let title = self.text(obj, p, "title", len(1, 200));
        let description = self.text(obj, p, "description", len(0, 2000));
        let target_audience = self.text(obj, p, "target_audience", len(0, 500));
        let learning_objectives = self.string_list(obj, p, "learning_objectives", true, len(1, 20), len(1, 500));
        let scenes = self.list(obj, p, "scenes", len(1, MAX_SCENES), |w, v, path| w.scene(v, path));
        let total_duration = self.integer(obj, p, "total_duration", true, 1, MAX_TOTAL_DURATION);
        let difficulty = self.enumeration(obj, p, "difficulty", true, Difficulty::VALUES, Difficulty::parse);
        let language = self.shaped(obj, p, "language", len(2, 5), "language tag", LANGUAGE_PATTERN, is_language_tag);
        let cultural_adaptation = match self.field(obj, p, "cultural_adaptation", false) {
            Some(v) => Some(self.cultural_adaptation(v, "cultural_adaptation")?),
            None => None,
        };

        Some(Manifest {
            id: id?,
            version: version?,
            title: title?,
            description: description?,
            target_audience: target_audience?,
            learning_objectives: learning_objectives?,
            scenes: scenes?,
            total_duration: total_duration?,
            difficulty: difficulty?,
            language: language?,
            cultural_adaptation,
        })
    }

    fn cultural_adaptation(&mut self, value: &Value, path: &str) -> Option<CulturalAdaptation> {
        let obj = self.object(value, path)?;

        let municipality = self.optional_text(obj, path, "municipality", len(0, 100));
        let region = self.optional_text(obj, path, "region", len(0, 100));

        let mut terminology = std::collections::BTreeMap::new();
        let mut terminology_ok = true;
        if let Some(v) = self.field(obj, path, "terminology", false) {
            let term_path = join(path, "terminology");
            match self.object(v, &term_path) {
                Some(map) if map.len() > 100 => {
                    self.push(&term_path, ErrorKind::TooManyItems { max: 100, actual: map.len() });
                    terminology_ok = false;
                }
                Some(map) => {
                    for (key, v) in map {
                        let entry_path = join(&term_path, key);
                        let key_len = key.chars().count();
                        if key_len == 0 {
                            self.push(&entry_path, ErrorKind::TooShort { min: 1, actual: 0 });
                            terminology_ok = false;
                            continue;
                        }
                        if key_len > 100 {
                            self.push(&entry_path, ErrorKind::TooLong { max: 100, actual: key_len });
                            terminology_ok = false;
                            continue;
                        }
                        match self.text_value(v, &entry_path, len(0, 500)) {
                            Some(s) => {
                                terminology.insert(key.clone(), s);
                            }
                            None => terminology_ok = false,
                        }
                    }
                }
                None => terminology_ok = false,
            }
        }

        let municipality_ok = municipality.is_some() || self.field_absent(obj, "municipality");
        let region_ok = region.is_some() || self.field_absent(obj, "region");
        if !(terminology_ok && municipality_ok && region_ok) {
            return None;
        }

        Some(CulturalAdaptation {
            municipality,
            region,
            terminology,
        })
    }

    fn field_absent(&self, obj: &Map<String, Value>, key: &str) -> bool {
        matches!(obj.get(key), None | Some(Value::Null))
    }

    fn scene(&mut self, value: &Value, path: &str) -> Option<Scene> {
        let obj = self.object(value, path)?;
        let kind = self.enumeration(obj, path, "type", true, SCENE_TYPES, |s| match s {
            "dialogue" => Some(true),
            "quiz" => Some(false),
            _ => None,
        })?;

        let scene_id = self.identifier(obj, path, "scene_id");
        let title = self.text(obj, path, "title", len(1, 200));
        let description = self.optional_text(obj, path, "description", len(0, 1000));
        let description_ok = description.is_some() || self.field_absent(obj, "description");

        if kind {
            let duration = self.integer(obj, path, "duration", true, DIALOGUE_DURATION.0, DIALOGUE_DURATION.1);
            let characters = self.list(obj, path, "characters", len(1, 10), |w, v, p| w.character(v, p));
            let dialogue = self.list(obj, path, "dialogue", len(1, 100), |w, v, p| w.turn(v, p));
            let objectives = self.string_list(obj, path, "learning_objectives", false, len(0, 20), len(1, 500));
            let objectives_ok = objectives.is_some() || self.field_absent(obj, "learning_objectives");
            let cultural_context = self.optional_text(obj, path, "cultural_context", len(0, 200));
            let context_ok = cultural_context.is_some() || self.field_absent(obj, "cultural_context");

            if !(description_ok && objectives_ok && context_ok) {
                return None;
            }

            Some(Scene::Dialogue(DialogueScene {
                scene_id: scene_id?,
                title: title?,
                description,
                duration: duration?,
                characters: characters?,
                dialogue: dialogue?,
                learning_objectives: objectives.unwrap_or_default(),
                cultural_context,
            }))
        } else {
            let duration = self.integer(obj, path, "duration", true, QUIZ_DURATION.0, QUIZ_DURATION.1);
            let questions = self.list(obj, path, "questions", len(1, 50), |w, v, p| w.question(v, p));
            let passing_score = self.integer(obj, path, "passing_score", true, 0, 100);
            let immediate_feedback = self.boolean(obj, path, "immediate_feedback");
            let allow_retry = self.boolean(obj, path, "allow_retry");

            if !description_ok {
                return None;
            }

            Some(Scene::Quiz(QuizScene {
                scene_id: scene_id?,
                title: title?,
                description,
                duration: duration?,
                questions: questions?,
                passing_score: u32::try_from(passing_score?).ok()?,
                immediate_feedback: immediate_feedback?,
                allow_retry: allow_retry?,
            }))
        }
    }

    fn character(&mut self, value: &Value, path: &str) -> Option<Character> {
        let obj = self.object(value, path)?;

        let id = self.identifier(obj, path, "id");
        let name = self.text(obj, path, "name", len(1, 100));
        let role = self.text(obj, path, "role", len(1, 100));
        let avatar_description = self.optional_text(obj, path, "avatar_description", len(0, 500));
        let avatar_ok = avatar_description.is_some() || self.field_absent(obj, "avatar_description");
        let personality = self.string_list(obj, path, "personality", false, len(0, 10), len(1, 50));
        let personality_ok = personality.is_some() || self.field_absent(obj, "personality");

        if !(avatar_ok && personality_ok) {
            return None;
        }

        Some(Character {
            id: id?,
            name: name?,
            role: role?,
            avatar_description,
            personality: personality.unwrap_or_default(),
        })
    }

    fn turn(&mut self, value: &Value, path: &str) -> Option<DialogueTurn> {
        let obj = self.object(value, path)?;

        let speaker = self.text(obj, path, "speaker", len(1, 100));
        let character_id = self.identifier(obj, path, "character_id");
        let text = self.text(obj, path, "text", len(1, 5000));
        let emotion = self.enumeration(obj, path, "emotion", false, Emotion::VALUES, Emotion::parse);
        let emotion_ok = emotion.is_some() || self.field_absent(obj, "emotion");
        let timing = self.number(obj, path, "timing", 0.0, 3600.0);
        let timing_ok = timing.is_some() || self.field_absent(obj, "timing");

        if !(emotion_ok && timing_ok) {
            return None;
        }

        Some(DialogueTurn {
            speaker: speaker?,
            character_id: character_id?,
            text: text?,
            emotion,
            timing,
        })
    }

    fn question(&mut self, value: &Value, path: &str) -> Option<QuizQuestion> {
        let obj = self.object(value, path)?;

        let id = self.identifier(obj, path, "id");
        let kind = self.enumeration(obj, path, "type", true, QuestionKind::VALUES, QuestionKind::parse);
        let question = self.text(obj, path, "question", len(10, 1000));
        let options = self.list(obj, path, "options", len(2, 6), |w, v, p| w.option(v, p));
        let explanation = self.optional_text(obj, path, "explanation", len(0, 2000));
        let explanation_ok = explanation.is_some() || self.field_absent(obj, "explanation");
        let points = self.integer(obj, path, "points", false, 1, 100);
        let points_ok = points.is_some() || self.field_absent(obj, "points");
        let time_limit = self.integer(obj, path, "time_limit", false, 10, 300);
        let time_limit_ok = time_limit.is_some() || self.field_absent(obj, "time_limit");

        if !(explanation_ok && points_ok && time_limit_ok) {
            return None;
        }

        Some(QuizQuestion {
            id: id?,
            kind: kind?,
            question: question?,
            options: options?,
            explanation,
            points: points.and_then(|p| u32::try_from(p).ok()),
            time_limit: time_limit.and_then(|t| u32::try_from(t).ok()),
        })
    }

    fn option(&mut self, value: &Value, path: &str) -> Option<QuizOption> {
        let obj = self.object(value, path)?;

        let id = self.identifier(obj, path, "id");
        let text = self.text(obj, path, "text", len(1, 500));
        let is_correct = self.boolean(obj, path, "is_correct");
        let feedback = self.optional_text(obj, path, "feedback", len(0, 1000));
        let feedback_ok = feedback.is_some() || self.field_absent(obj, "feedback");

        if !feedback_ok {
            return None;
        }

        Some(QuizOption {
            id: id?,
            text: text?,
            is_correct: is_correct?,
            feedback,
        })
    }
}

/// `^[A-Za-z0-9_-]+$`
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// `MAJOR.MINOR.PATCH` with optional `-pre` and `+build`
pub fn is_semver(s: &str) -> bool {
    let (rest, build) = match s.split_once('+') {
        Some((rest, build)) => (rest, Some(build)),
        None => (s, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (rest, None),
    };

    let label_ok = |label: Option<&str>| {
        label.map_or(true, |l| {
            !l.is_empty() && l.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
        })
    };

    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        && label_ok(pre)
        && label_ok(build)
}

/// `xx` or `xx-YY`
pub fn is_language_tag(s: &str) -> bool {
    let b = s.as_bytes();
    match b.len() {
        2 => b.iter().all(u8::is_ascii_lowercase),
        5 => b[..2].iter().all(u8::is_ascii_lowercase) && b[2] == b'-' && b[3..].iter().all(u8::is_ascii_uppercase),
        _ => false,
    }
}
