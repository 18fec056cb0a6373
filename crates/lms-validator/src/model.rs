//! Typed learning-module manifest
//!
//! Produced only by [`crate::schema::validate_manifest`]; every value in a
//! `Manifest` has passed its bounds. Serialization (snake_case, scenes
//! tagged by `type`) is the shape handed back as sanitized content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root document describing one learning module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Identifier-safe module id
    pub id: String,
    /// Semantic version
    pub version: String,
    /// Display title
    pub title: String,
    /// Summary
    pub description: String,
    /// Who the module is for
    pub target_audience: String,
    /// What the learner should take away
    pub learning_objectives: Vec<String>,
    /// Ordered scenes
    pub scenes: Vec<Scene>,
    /// Declared total duration in seconds
    pub total_duration: u64,
    /// Difficulty tier
    pub difficulty: Difficulty,
    /// `xx` or `xx-YY`
    pub language: String,
    /// Local terminology and setting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_adaptation: Option<CulturalAdaptation>,
}

/// Local adaptation block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CulturalAdaptation {
    /// Municipality name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    /// Region name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Generic term -> local term
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub terminology: BTreeMap<String, String>,
}

/// One unit of the experience
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scene {
    /// Characters talking
    Dialogue(DialogueScene),
    /// Graded questions
    Quiz(QuizScene),
}

impl Scene {
    /// Scene identifier
    pub fn scene_id(&self) -> &str {
        match self {
            Scene::Dialogue(s) => &s.scene_id,
            Scene::Quiz(s) => &s.scene_id,
        }
    }

    /// Duration in seconds
    pub fn duration(&self) -> u64 {
        match self {
            Scene::Dialogue(s) => s.duration,
            Scene::Quiz(s) => s.duration,
        }
    }

    /// Tag value
    pub fn kind(&self) -> &'static str {
        match self {
            Scene::Dialogue(_) => "dialogue",
            Scene::Quiz(_) => "quiz",
        }
    }
}

/// Dialogue scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueScene {
    /// Identifier
    pub scene_id: String,
    /// Title
    pub title: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Seconds, 30..=1800
    pub duration: u64,
    /// Cast
    pub characters: Vec<Character>,
    /// Turns in order
    pub dialogue: Vec<DialogueTurn>,
    /// Scene-level objectives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub learning_objectives: Vec<String>,
    /// Cultural-context tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_context: Option<String>,
}

/// Speaking character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Identifier referenced by turns
    pub id: String,
    /// Display name
    pub name: String,
    /// Role in the scenario
    pub role: String,
    /// Avatar prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_description: Option<String>,
    /// Personality traits
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personality: Vec<String>,
}

/// One line of dialogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Speaker label
    pub speaker: String,
    /// Character reference
    pub character_id: String,
    /// Spoken text
    pub text: String,
    /// Delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
    /// Offset from scene start, seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<f64>,
}

/// Quiz scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizScene {
    /// Identifier
    pub scene_id: String,
    /// Title
    pub title: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Seconds, 60..=3600
    pub duration: u64,
    /// Questions in order
    pub questions: Vec<QuizQuestion>,
    /// Percentage needed to pass
    pub passing_score: u32,
    /// Show feedback after each answer
    pub immediate_feedback: bool,
    /// Allow another attempt
    pub allow_retry: bool,
}

/// Quiz question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Identifier
    pub id: String,
    /// Answer mode
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    /// Question text
    pub question: String,
    /// Options
    pub options: Vec<QuizOption>,
    /// Shown after answering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Score weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    /// Seconds allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
}

/// Answer option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    /// Identifier
    pub id: String,
    /// Option text
    pub text: String,
    /// Correctness flag
    pub is_correct: bool,
    /// Shown when chosen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Accepted spellings
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            /// Parse the exact wire spelling
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Wire spelling
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }
    };
}

string_enum! {
    /// Difficulty tier
    Difficulty {
        /// No prior knowledge
        Beginner => "beginner",
        /// Some background
        Intermediate => "intermediate",
        /// Specialist
        Advanced => "advanced",
    }
}

string_enum! {
    /// Delivery of a dialogue turn
    Emotion {
        /// Default
        Neutral => "neutral",
        /// Positive
        Happy => "happy",
        /// Worried
        Concerned => "concerned",
        /// Grave
        Serious => "serious",
        /// Supportive
        Encouraging => "encouraging",
        /// Caught off guard
        Surprised => "surprised",
    }
}

string_enum! {
    /// Answer mode of a question
    QuestionKind {
        /// Exactly one option is right
        SingleChoice => "single_choice",
        /// Two options: true and false
        TrueFalse => "true_false",
        /// Any number of options may be right
        MultiSelect => "multi_select",
    }
}

impl Manifest {
    /// Visit every free-form string with its field path.
    ///
    /// Identifiers, versions and language tags are pattern-constrained and
    /// are not visited. Terminology keys are visited with a `#key` suffix.
    ///
    /// A rewritten terminology key that lands on a key already present is
    /// not inserted; entries whose key came back unchanged take precedence.
    /// The `#key` paths of the dropped entries are returned with the key
    /// they collided with.
    pub fn for_each_text_mut(&mut self, mut f: impl FnMut(&str, &mut String)) -> Vec<(String, String)> {
        let mut collisions = Vec::new();
        f("title", &mut self.title);
        f("description", &mut self.description);
        f("target_audience", &mut self.target_audience);
        for (i, objective) in self.learning_objectives.iter_mut().enumerate() {
            f(&format!("learning_objectives[{i}]"), objective);
        }

        if let Some(adaptation) = &mut self.cultural_adaptation {
            if let Some(m) = &mut adaptation.municipality {
                f("cultural_adaptation.municipality", m);
            }
            if let Some(r) = &mut adaptation.region {
                f("cultural_adaptation.region", r);
            }
            let terminology = std::mem::take(&mut adaptation.terminology);
            let mut rewritten = Vec::new();
            for (original, mut value) in terminology {
                let path = format!("cultural_adaptation.terminology.{original}");
                let mut key = original.clone();
                f(&format!("{path}#key"), &mut key);
                f(&path, &mut value);
                if key == original {
                    adaptation.terminology.insert(key, value);
                } else {
                    rewritten.push((path, key, value));
                }
            }
            for (path, key, value) in rewritten {
                if adaptation.terminology.contains_key(&key) {
                    collisions.push((format!("{path}#key"), key));
                } else {
                    adaptation.terminology.insert(key, value);
                }
            }
        }

        for (i, scene) in self.scenes.iter_mut().enumerate() {
            let base = format!("scenes[{i}]");
            match scene {
                Scene::Dialogue(d) => {
                    f(&format!("{base}.title"), &mut d.title);
                    if let Some(desc) = &mut d.description {
                        f(&format!("{base}.description"), desc);
                    }
                    for (j, c) in d.characters.iter_mut().enumerate() {
                        let cp = format!("{base}.characters[{j}]");
                        f(&format!("{cp}.name"), &mut c.name);
                        f(&format!("{cp}.role"), &mut c.role);
                        if let Some(avatar) = &mut c.avatar_description {
                            f(&format!("{cp}.avatar_description"), avatar);
                        }
                        for (k, trait_) in c.personality.iter_mut().enumerate() {
                            f(&format!("{cp}.personality[{k}]"), trait_);
                        }
                    }
                    for (j, turn) in d.dialogue.iter_mut().enumerate() {
                        let tp = format!("{base}.dialogue[{j}]");
                        f(&format!("{tp}.speaker"), &mut turn.speaker);
                        f(&format!("{tp}.text"), &mut turn.text);
                    }
                    for (j, objective) in d.learning_objectives.iter_mut().enumerate() {
                        f(&format!("{base}.learning_objectives[{j}]"), objective);
                    }
                    if let Some(ctx) = &mut d.cultural_context {
                        f(&format!("{base}.cultural_context"), ctx);
                    }
                }
                Scene::Quiz(q) => {
                    f(&format!("{base}.title"), &mut q.title);
                    if let Some(desc) = &mut q.description {
                        f(&format!("{base}.description"), desc);
                    }
                    for (j, question) in q.questions.iter_mut().enumerate() {
                        let qp = format!("{base}.questions[{j}]");
                        f(&format!("{qp}.question"), &mut question.question);
                        if let Some(explanation) = &mut question.explanation {
                            f(&format!("{qp}.explanation"), explanation);
                        }
                        for (k, option) in question.options.iter_mut().enumerate() {
                            let op = format!("{qp}.options[{k}]");
                            f(&format!("{op}.text"), &mut option.text);
                            if let Some(feedback) = &mut option.feedback {
                                f(&format!("{op}.feedback"), feedback);
                            }
                        }
                    }
                }
            }
        }

        collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_enums() {
        assert_eq!(Difficulty::parse("beginner"), Some(Difficulty::Beginner));
        assert_eq!(Difficulty::parse("Beginner"), None);
        assert_eq!(QuestionKind::TrueFalse.as_str(), "true_false");
        assert!(Emotion::VALUES.starts_with(&["neutral", "happy"]));
    }

    #[test]
    fn test_scene_serializes_with_tag() {
        let scene = Scene::Quiz(QuizScene {
            scene_id: "q1".into(),
            title: "Check".into(),
            description: None,
            duration: 120,
            questions: vec![QuizQuestion {
                id: "q1-1".into(),
                kind: QuestionKind::TrueFalse,
                question: "Is consent always required?".into(),
                options: vec![
                    QuizOption {
                        id: "t".into(),
                        text: "True".into(),
                        is_correct: false,
                        feedback: None,
                    },
                    QuizOption {
                        id: "f".into(),
                        text: "False".into(),
                        is_correct: true,
                        feedback: None,
                    },
                ],
                explanation: None,
                points: Some(10),
                time_limit: None,
            }],
            passing_score: 70,
            immediate_feedback: true,
            allow_retry: false,
        });

        let value = serde_json::to_value(&scene).unwrap();
        assert_eq!(value["type"], json!("quiz"));
        assert_eq!(value["questions"][0]["type"], json!("true_false"));
        assert!(value.get("description").is_none());
        assert_eq!(scene.kind(), "quiz");
        assert_eq!(scene.duration(), 120);
    }

    fn sample(terminology: &[(&str, &str)]) -> Manifest {
        Manifest {
            id: "m".into(),
            version: "1.0.0".into(),
            title: "T".into(),
            description: String::new(),
            target_audience: String::new(),
            learning_objectives: vec!["o".into()],
            scenes: vec![Scene::Dialogue(DialogueScene {
                scene_id: "s".into(),
                title: "S".into(),
                description: None,
                duration: 60,
                characters: vec![Character {
                    id: "c".into(),
                    name: "Kari".into(),
                    role: "Clerk".into(),
                    avatar_description: None,
                    personality: vec![],
                }],
                dialogue: vec![DialogueTurn {
                    speaker: "Kari".into(),
                    character_id: "c".into(),
                    text: "Hei".into(),
                    emotion: None,
                    timing: None,
                }],
                learning_objectives: vec![],
                cultural_context: None,
            })],
            total_duration: 60,
            difficulty: Difficulty::Beginner,
            language: "nb-NO".into(),
            cultural_adaptation: Some(CulturalAdaptation {
                municipality: None,
                region: None,
                terminology: terminology
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }),
        }
    }

    #[test]
    fn test_text_visitor_paths() {
        let mut manifest = sample(&[("citizen", "innbygger")]);

        let mut paths = Vec::new();
        let collisions = manifest.for_each_text_mut(|path, text| {
            paths.push(path.to_string());
            text.make_ascii_uppercase();
        });
        assert!(collisions.is_empty());

        assert!(paths.contains(&"scenes[0].dialogue[0].text".to_string()));
        assert!(paths.contains(&"cultural_adaptation.terminology.citizen#key".to_string()));
        assert_eq!(manifest.title, "T");
        let terminology = &manifest.cultural_adaptation.as_ref().unwrap().terminology;
        assert_eq!(terminology.get("CITIZEN").map(String::as_str), Some("INNBYGGER"));
    }

    #[test]
    fn test_rewritten_key_never_overwrites() {
        let mut manifest = sample(&[("citizen", "innbygger"), ("citizen<x>", "borger")]);

        let collisions = manifest.for_each_text_mut(|_, text| {
            if let Some(stripped) = text.strip_suffix("<x>") {
                *text = stripped.to_string();
            }
        });

        assert_eq!(
            collisions,
            vec![(
                "cultural_adaptation.terminology.citizen<x>#key".to_string(),
                "citizen".to_string()
            )]
        );
        let terminology = &manifest.cultural_adaptation.as_ref().unwrap().terminology;
        assert_eq!(terminology.len(), 1);
        assert_eq!(terminology.get("citizen").map(String::as_str), Some("innbygger"));
    }
}
