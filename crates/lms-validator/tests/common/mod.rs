//! Manifest fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use lms_validator::{PipelineConfig, ValidationPipeline, ValidationStats};
use serde_json::{json, Value};

pub fn pipeline() -> ValidationPipeline {
    ValidationPipeline::new(PipelineConfig::default(), Arc::new(ValidationStats::new()))
        .expect("default pipeline compiles")
}

/// One pipeline per test binary; compiling the rule set is the slow part
pub fn shared() -> &'static ValidationPipeline {
    static PIPELINE: OnceLock<ValidationPipeline> = OnceLock::new();
    PIPELINE.get_or_init(pipeline)
}

pub fn turn(character_id: &str, text: &str) -> Value {
    json!({"speaker": "Kari", "character_id": character_id, "text": text, "emotion": "neutral"})
}

pub fn dialogue_scene(id: &str, duration: u64, turns: Vec<Value>) -> Value {
    json!({
        "type": "dialogue",
        "scene_id": id,
        "title": "At the service desk",
        "duration": duration,
        "characters": [
            {"id": "kari", "name": "Kari Nordmann", "role": "Case officer", "personality": ["calm"]}
        ],
        "dialogue": turns
    })
}

pub fn option(id: &str, text: &str, is_correct: bool) -> Value {
    json!({"id": id, "text": text, "is_correct": is_correct})
}

pub fn quiz_scene(id: &str, duration: u64, options: Vec<Value>) -> Value {
    json!({
        "type": "quiz",
        "scene_id": id,
        "title": "Knowledge check",
        "duration": duration,
        "questions": [{
            "id": "q1",
            "type": "single_choice",
            "question": "Which data counts as personal data?",
            "options": options,
            "explanation": "Anything that identifies a person.",
            "points": 10
        }],
        "passing_score": 70,
        "immediate_feedback": true,
        "allow_retry": true
    })
}

pub fn manifest(scenes: Vec<Value>, total_duration: u64) -> Value {
    json!({
        "id": "privacy-at-work",
        "version": "1.0.0",
        "title": "Privacy at work",
        "description": "Everyday data protection for municipal staff.",
        "target_audience": "Front-desk employees",
        "learning_objectives": ["Recognise personal data", "Handle requests correctly"],
        "scenes": scenes,
        "total_duration": total_duration,
        "difficulty": "beginner",
        "language": "nb-NO",
        "cultural_adaptation": {
            "municipality": "Bergen",
            "region": "Vestland",
            "terminology": {"citizen": "innbygger"}
        }
    })
}

pub fn minimal() -> Value {
    manifest(
        vec![dialogue_scene("intro", 60, vec![turn("kari", "Good morning, how can I help?")])],
        60,
    )
}

pub fn valid() -> Value {
    manifest(
        vec![
            dialogue_scene("intro", 120, vec![turn("kari", "Good morning, how can I help?")]),
            quiz_scene(
                "check",
                180,
                vec![option("a", "A national ID number", true), option("b", "Today's weather", false)],
            ),
        ],
        300,
    )
}

pub fn with_turn_text(text: &str) -> Value {
    manifest(vec![dialogue_scene("intro", 60, vec![turn("kari", text)])], 60)
}
