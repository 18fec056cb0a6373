//! End-to-end behaviour of the validation pipeline

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use lms_validator::{PipelineConfig, ThreatCategory, ValidationPipeline, ValidationStats};
use serde_json::{json, Value};

fn turn_text(result: &lms_validator::ValidationResult) -> String {
    result.sanitized_content.as_ref().expect("sanitized content")["scenes"][0]["dialogue"][0]["text"]
        .as_str()
        .expect("text")
        .to_string()
}

#[test]
fn valid_manifest_passes_unchanged() {
    let result = pipeline().validate_value(&valid());
    assert!(result.success, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert!(result.suggestion.is_none());

    let content = result.sanitized_content.unwrap();
    assert_eq!(content["scenes"][1]["type"], json!("quiz"));
    assert_eq!(content["cultural_adaptation"]["terminology"]["citizen"], json!("innbygger"));
}

#[test]
fn unicode_survives_sanitization() {
    let text = "Café 你好 مرحبا 🎮";
    let result = pipeline().validate_value(&with_turn_text(text));
    assert!(result.success, "{:?}", result.errors);
    assert!(result.warnings.is_empty());
    assert_eq!(turn_text(&result), text);
}

#[test]
fn sanitization_is_idempotent_end_to_end() {
    let pipeline = pipeline();
    let first = pipeline.validate_value(&with_turn_text("Hi <b onmouseover=x()>there</b>"));
    assert!(first.success, "{:?}", first.errors);

    let again = pipeline.validate_value(first.sanitized_content.as_ref().unwrap());
    assert!(again.success);
    assert_eq!(again.sanitized_content, first.sanitized_content);
    assert!(again.warnings.is_empty(), "{:?}", again.warnings);
}

#[test]
fn script_block_is_removed() {
    let result = pipeline().validate_value(&with_turn_text("Hello <script>steal()</script>there"));
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(turn_text(&result), "Hello there");
    assert!(result
        .warnings
        .contains(&"scenes[0].dialogue[0].text: content sanitized".to_string()));
}

#[test]
fn event_handler_is_removed() {
    let result = pipeline().validate_value(&with_turn_text(r#"<div onclick="x()">Click</div>"#));
    assert!(result.success, "{:?}", result.errors);
    assert!(!turn_text(&result).contains("onclick="));
}

#[test]
fn question_without_correct_answer_fails() {
    let doc = manifest(
        vec![quiz_scene("check", 120, vec![option("a", "Yes", false), option("b", "No", false)])],
        120,
    );
    let result = pipeline().validate_value(&doc);
    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("no correct answer")), "{:?}", result.errors);
}

#[test]
fn duplicate_scene_ids_fail() {
    let doc = manifest(
        vec![
            dialogue_scene("intro", 60, vec![turn("kari", "One")]),
            dialogue_scene("intro", 60, vec![turn("kari", "Two")]),
        ],
        120,
    );
    let result = pipeline().validate_value(&doc);
    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("duplicate scene ID")));
}

#[test]
fn duration_must_match_scene_sum() {
    let scenes = |each: u64| {
        vec![
            dialogue_scene("a", each, vec![turn("kari", "One")]),
            dialogue_scene("b", each, vec![turn("kari", "Two")]),
        ]
    };

    let result = pipeline().validate_value(&manifest(scenes(250), 300));
    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("duration mismatch")));

    let result = pipeline().validate_value(&manifest(scenes(170), 300));
    assert!(result.success, "{:?}", result.errors);
}

#[test]
fn dangling_character_reference_fails() {
    let doc = manifest(vec![dialogue_scene("intro", 60, vec![turn("ghost", "Boo")])], 60);
    let result = pipeline().validate_value(&doc);
    assert!(!result.success);
    assert_eq!(
        result.errors,
        vec!["scenes[0].dialogue[0].character_id: unknown character \"ghost\""]
    );
}

#[test]
fn errors_carry_field_paths() {
    let doc = manifest(vec![quiz_scene("check", 120, vec![option("a", "Only", true)])], 120);
    let result = pipeline().validate_value(&doc);
    assert_eq!(
        result.errors,
        vec!["scenes[0].questions[0].options: expected at least 2 items, got 1"]
    );
    assert!(result.suggestion.is_some());
}

#[test]
fn hostile_nesting_is_a_single_error() {
    let deep = "[".repeat(100_000);
    let start = Instant::now();
    let result = pipeline().validate_str(&deep);
    assert!(start.elapsed() < Duration::from_secs(2));

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("document too complex"), "{}", result.errors[0]);
}

#[test]
fn garbage_input_is_malformed() {
    let pipeline = pipeline();
    for input in [b"\xff\xd8\xff\xe0garbage".as_slice(), b"{\"id\": ".as_slice(), b"".as_slice()] {
        let result = pipeline.validate_bytes(input);
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("malformed JSON"), "{}", result.errors[0]);
    }
}

#[test]
fn entity_encoded_script_is_rejected() {
    let result = pipeline().validate_value(&with_turn_text("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!result.success);
    assert!(
        result.errors.iter().any(|e| e.contains("script_injection") && e.contains("[encoded]")),
        "{:?}",
        result.errors
    );
}

#[test]
fn quoted_sql_warns_but_passes() {
    let result = pipeline().validate_value(&with_turn_text("Attackers type ' OR 1=1 -- into login forms"));
    assert!(result.success, "{:?}", result.errors);
    assert!(result.needs_review());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("potentially unsafe content: sql_injection")));
}

#[test]
fn gdpr_question_is_clean() {
    let pipeline = pipeline();
    let text = "What is GDPR compliance?";
    for category in ThreatCategory::ALL {
        assert!(!pipeline.scanner().detect(text, category), "{category}");
    }
    let result = pipeline.validate_value(&with_turn_text(text));
    assert!(result.success);
    assert!(result.warnings.is_empty());
}

#[test]
fn everyday_prose_passes_without_review() {
    let pipeline = pipeline();
    for text in [
        "Print the document. Write your name at the bottom.",
        "Save the document. Domain experts review it later.",
        "Key term: expression (how a person shows feelings).",
        "Is this statement false or true?",
        "Adults need enough sleep (7 to 9 hours) each night.",
    ] {
        let result = pipeline.validate_value(&with_turn_text(text));
        assert!(result.success, "{text}: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "{text}: {:?}", result.warnings);
        assert_eq!(turn_text(&result), text);
    }
}

#[test]
fn code_shaped_sinks_are_still_rejected() {
    let pipeline = pipeline();
    for text in [
        "Send document.cookie to the form",
        "Then call document.write(payload) twice",
    ] {
        let result = pipeline.validate_value(&with_turn_text(text));
        assert!(!result.success, "{text}");
        assert!(result.errors[0].contains("script_injection (dom_sink)"), "{:?}", result.errors);
    }
}

#[test]
fn batch_keeps_order_and_counts() {
    let stats = Arc::new(ValidationStats::new());
    let pipeline = ValidationPipeline::new(PipelineConfig::default(), Arc::clone(&stats)).unwrap();

    let docs: Vec<Vec<u8>> = vec![
        serde_json::to_vec(&valid()).unwrap(),
        b"not json".to_vec(),
        serde_json::to_vec(&minimal()).unwrap(),
        serde_json::to_vec(&json!({"id": "x"})).unwrap(),
    ];
    let results = pipeline.validate_batch(&docs);
    let outcomes: Vec<bool> = results.iter().map(|r| r.success).collect();
    assert_eq!(outcomes, vec![true, false, true, false]);

    let snap = stats.snapshot();
    assert_eq!((snap.total, snap.success, snap.failure), (4, 2, 2));
    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["successRate"], json!(50.0));
    assert!(!snap.top_errors.is_empty());

    stats.reset();
    assert_eq!(stats.snapshot().total, 0);
}

#[test]
fn hundred_minimal_manifests_are_fast() {
    let pipeline = pipeline();
    let doc = serde_json::to_string(&minimal()).unwrap();

    let budget = if cfg!(debug_assertions) {
        Duration::from_secs(5)
    } else {
        Duration::from_secs(1)
    };

    let start = Instant::now();
    for _ in 0..100 {
        assert!(pipeline.validate_str(&doc).success);
    }
    assert!(start.elapsed() < budget, "took {:?}", start.elapsed());
}

#[test]
fn five_megabyte_manifest_completes() {
    let sentence = "Remember to lock your screen before leaving the desk. Personvern gjelder alle innbyggere. ";
    let text: String = sentence.repeat(5);
    let scenes: Vec<Value> = (0..100)
        .map(|i| {
            let turns = (0..100).map(|_| turn("kari", &text)).collect();
            dialogue_scene(&format!("scene-{i}"), 60, turns)
        })
        .collect();
    let doc = serde_json::to_string(&manifest(scenes, 6000)).unwrap();
    assert!(doc.len() > 4 * 1024 * 1024, "fixture is {} bytes", doc.len());

    let budget = if cfg!(debug_assertions) {
        Duration::from_secs(120)
    } else {
        Duration::from_secs(10)
    };

    let start = Instant::now();
    let result = pipeline().validate_str(&doc);
    assert!(result.success, "{:?}", result.errors.first());
    assert!(start.elapsed() < budget, "took {:?}", start.elapsed());
}
