//! Aho-Corasick + RegexSet pattern matching

use aho_corasick::AhoCorasick;
use lms_common::{GuardError, GuardResult};
use regex::{Regex, RegexSet, RegexSetBuilder};

use crate::rules::{Rule, RuleKind};

/// Compiled program size cap for the combined regex set
const REGEX_SIZE_LIMIT: usize = 64 << 20;

/// Pre-compiled rule set for single-pass multi-pattern matching
pub struct PatternSet {
    /// Aho-Corasick automaton for literals
    literals: AhoCorasick,
    literal_rules: Vec<usize>,

    /// One set for every regex rule
    regexes: RegexSet,
    regex_rules: Vec<usize>,

    rules: Vec<Rule>,
}

impl PatternSet {
    /// Build pattern set from rules
    pub fn build(rules: Vec<Rule>) -> GuardResult<Self> {
        let mut literal_patterns = Vec::new();
        let mut literal_rules = Vec::new();
        let mut regex_sources = Vec::new();
        let mut regex_rules = Vec::new();

        for (idx, rule) in rules.iter().enumerate() {
            match rule.kind {
                RuleKind::Literal => {
                    literal_patterns.push(rule.pattern.as_str());
                    literal_rules.push(idx);
                }
                RuleKind::Regex => {
                    regex_sources.push(ascii_boundaries(&rule.pattern));
                    regex_rules.push(idx);
                }
            }
        }

        let literals = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&literal_patterns)
            .map_err(|e| GuardError::PatternCompile {
                rule: "literal set".to_string(),
                reason: e.to_string(),
            })?;

        let regexes = RegexSetBuilder::new(&regex_sources)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| {
                // Name the offending rule when it fails on its own
                let rule = regex_rules
                    .iter()
                    .zip(&regex_sources)
                    .find(|(_, src)| Regex::new(src).is_err())
                    .map(|(&idx, _)| rules[idx].name.clone())
                    .unwrap_or_else(|| "regex set".to_string());
                GuardError::PatternCompile {
                    rule,
                    reason: e.to_string(),
                }
            })?;

        Ok(Self {
            literals,
            literal_rules,
            regexes,
            regex_rules,
            rules,
        })
    }

    /// Distinct rules matching `text`, in rule order
    pub fn matching_rules<'a>(&'a self, text: &str) -> Vec<&'a Rule> {
        let mut hit = vec![false; self.rules.len()];

        for m in self.literals.find_overlapping_iter(text) {
            hit[self.literal_rules[m.pattern().as_usize()]] = true;
        }

        for idx in self.regexes.matches(text).iter() {
            hit[self.regex_rules[idx]] = true;
        }

        self.rules
            .iter()
            .zip(hit)
            .filter_map(|(rule, h)| h.then_some(rule))
            .collect()
    }

    /// Whether any rule matches
    pub fn is_match(&self, text: &str) -> bool {
        self.literals.is_match(text) || self.regexes.is_match(text)
    }

    /// All rules
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Total number of patterns
    pub fn pattern_count(&self) -> usize {
        self.literal_rules.len() + self.regex_rules.len()
    }
}

/// Rewrite `\b` as an ASCII word boundary.
///
/// Unicode boundaries force the regex engine off its lazy DFA as soon as
/// the haystack contains non-ASCII text. Every rule anchors on ASCII syntax,
/// so the ASCII boundary is equivalent here and keeps multilingual
/// megabyte-sized strings on the fast path.
fn ascii_boundaries(pattern: &str) -> String {
    pattern.replace(r"\b", r"(?-u:\b)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::default_rules;
    use crate::ThreatCategory;

    fn names(set: &PatternSet, text: &str) -> Vec<String> {
        set.matching_rules(text).iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_default_rules_compile() {
        let set = PatternSet::build(default_rules()).unwrap();
        assert_eq!(set.pattern_count(), default_rules().len());
    }

    #[test]
    fn test_literal_matching_case_insensitive() {
        let set = PatternSet::build(default_rules()).unwrap();
        let hits = names(&set, "x' UNION SELECT table_name FROM INFORMATION_SCHEMA.tables");
        assert!(hits.contains(&"schema_probe".to_string()));
        assert!(hits.contains(&"union_select".to_string()));
    }

    #[test]
    fn test_regex_matching() {
        let set = PatternSet::build(default_rules()).unwrap();
        let matched = set.matching_rules("<div onclick=\"x()\">hi</div>");
        assert!(matched.iter().any(|r| r.name == "event_handler_attribute"));
        assert!(matched.iter().all(|r| r.category == ThreatCategory::ScriptInjection));
    }

    #[test]
    fn test_ascii_boundary_on_multilingual_text() {
        let set = PatternSet::build(default_rules()).unwrap();
        assert!(set.is_match("你好 <script>alert(1)</script> مرحبا"));
        assert!(!set.is_match("Café 你好 مرحبا 🎮"));
    }

    #[test]
    fn test_bad_rule_is_named() {
        let mut rules = default_rules();
        rules.push(Rule {
            id: 999,
            name: "broken".into(),
            category: ThreatCategory::ScriptInjection,
            kind: RuleKind::Regex,
            pattern: "(unclosed".into(),
            severity: crate::Severity::Low,
        });

        match PatternSet::build(rules) {
            Err(GuardError::PatternCompile { rule, .. }) => assert_eq!(rule, "broken"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("broken rule compiled"),
        }
    }

    #[test]
    fn test_performance() {
        let set = PatternSet::build(default_rules()).unwrap();

        // 1MB of mixed-script prose
        let text = "Kommunen tilbyr kurs i personvern. 市民サービス. خدمات البلدية. ".repeat(16_000);

        let start = std::time::Instant::now();
        assert!(set.matching_rules(&text).is_empty());
        let elapsed = start.elapsed();

        println!("Rule scan of {} bytes: {:?}", text.len(), elapsed);
        assert!(elapsed.as_secs_f64() < 2.0);
    }
}
