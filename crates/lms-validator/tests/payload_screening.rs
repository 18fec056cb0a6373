//! Raw-buffer pre-screening and URL policy through the pipeline

mod common;

use lms_validator::{DeclaredType, ThreatCategory};

fn has_rule(report: &lms_validator::PayloadReport, rule: &str) -> bool {
    report.findings.iter().any(|f| f.rule == rule)
}

#[test]
fn gif_with_appended_zip_is_a_polyglot() {
    let mut data = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00;".to_vec();
    data.extend_from_slice(b"PK\x03\x04\x14\x00\x00\x00\x00\x00");
    data.extend_from_slice(&[0u8; 32]);

    let report = common::shared().inspect_payload(&data, DeclaredType::Binary);
    assert!(report.is_polyglot());
    assert!(report.is_malicious());
    assert!(has_rule(&report, "polyglot"));
}

#[test]
fn gzip_bomb_is_flagged() {
    // Header, a few bytes of deflate data, CRC32, ISIZE = 1 GiB
    let mut data = vec![0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0x03];
    data.extend_from_slice(&[0x4b, 0x4c, 0x1c, 0x05, 0x00]);
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(&(1u32 << 30).to_le_bytes());

    let report = common::shared().inspect_payload(&data, DeclaredType::Binary);
    assert!(has_rule(&report, "decompression_bomb"), "{:?}", report.findings);
}

#[test]
fn executable_declared_as_text_is_flagged() {
    let mut data = b"\x7fELF\x02\x01\x01".to_vec();
    data.extend_from_slice(&[0u8; 57]);

    let report = common::shared().inspect_payload(&data, DeclaredType::Text);
    assert!(has_rule(&report, "executable_signature"));
}

#[test]
fn plain_text_upload_is_clean() {
    let data = "Velkommen til kurset om personvern. What is GDPR compliance?".as_bytes();
    let report = common::shared().inspect_payload(data, DeclaredType::Text);
    assert!(!report.is_malicious(), "{:?}", report.findings);
}

#[test]
fn risky_urls_in_text_are_flagged() {
    let scanner = common::shared().scanner();
    for text in [
        "Open http://192.168.10.4/login to continue",
        "Details at https://bit.ly/3xYz",
        "Claim your prize at http://free-gift.tk/claim",
        "Fetch file:///etc/passwd",
    ] {
        assert!(scanner.detect(text, ThreatCategory::UrlRisk), "{text}");
    }
    assert!(!scanner.detect("Read https://www.datatilsynet.no/en/ for guidance", ThreatCategory::UrlRisk));
}

#[test]
fn risky_url_in_manifest_is_a_warning() {
    let doc = common::with_turn_text("Report incidents via https://bit.ly/report-now today");
    let result = common::shared().validate_value(&doc);
    assert!(result.success, "{:?}", result.errors);
    assert!(result.warnings.iter().any(|w| w.contains("url_risk")), "{:?}", result.warnings);
}
