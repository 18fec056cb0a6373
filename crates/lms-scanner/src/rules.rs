//! Built-in detection rules
//!
//! Every rule targets syntax (tag brackets, attribute assignment, quote +
//! operator, metacharacter + binary). Plain words such as "select",
//! "delete" or "expression" never fire on their own.

use crate::{Severity, ThreatCategory};

/// How a rule pattern is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// ASCII case-insensitive substring (Aho-Corasick)
    Literal,
    /// Regular expression
    Regex,
}

/// Rule definition
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique identifier
    pub id: u32,
    /// Stable name reported in findings
    pub name: String,
    /// Category this rule detects
    pub category: ThreatCategory,
    /// Match strategy
    pub kind: RuleKind,
    /// Literal or regex source
    pub pattern: String,
    /// Severity level
    pub severity: Severity,
}

impl Rule {
    fn regex(id: u32, name: &str, category: ThreatCategory, severity: Severity, pattern: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            category,
            kind: RuleKind::Regex,
            pattern: pattern.to_string(),
            severity,
        }
    }

    fn literal(id: u32, name: &str, category: ThreatCategory, severity: Severity, pattern: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            category,
            kind: RuleKind::Literal,
            pattern: pattern.to_string(),
            severity,
        }
    }
}

/// Script injection: tags, handler attributes, script schemes, sinks
pub fn script_rules() -> Vec<Rule> {
    use ThreatCategory::ScriptInjection as C;
    vec![
        Rule::regex(1, "script_tag", C, Severity::Critical, r"(?i)<\s*/?\s*script\b"),
        Rule::regex(
            2,
            "event_handler_attribute",
            C,
            Severity::Critical,
            r"(?i)<[a-z][a-z0-9:-]*[\s/][^>]*\bon[a-z]{3,}\s*=",
        ),
        Rule::regex(
            3,
            "script_scheme",
            C,
            Severity::Critical,
            r"(?i)\b(?:java|vb|live)[\s\x00-\x1f]*script[\s\x00-\x1f]*:\S",
        ),
        Rule::regex(4, "data_html_scheme", C, Severity::Critical, r"(?i)\bdata\s*:\s*text/html"),
        Rule::regex(5, "char_code_assembly", C, Severity::High, r"(?i)\bstring\s*\.\s*fromcharcode\s*\("),
        Rule::regex(
            6,
            "dom_sink",
            C,
            Severity::High,
            r"(?i)\bdocument\.(?:cookie|domain)\b|\bdocument\.write(?:ln)?\s*\(",
        ),
        Rule::regex(7, "eval_call", C, Severity::High, r"(?i)\beval\s*\("),
        Rule::regex(
            8,
            "embedding_tag",
            C,
            Severity::High,
            r"(?i)<\s*(?:iframe|object|embed|applet|frame|frameset|meta|base|link)\b",
        ),
    ]
}

/// Mutation XSS: handler-bearing attributes in uncommon containers
pub fn mutation_xss_rules() -> Vec<Rule> {
    use ThreatCategory::MutationXss as C;
    vec![
        Rule::regex(20, "svg_event", C, Severity::Critical, r"(?i)<\s*svg\b[^>]*\bon[a-z]{3,}\s*="),
        Rule::regex(21, "iframe_srcdoc", C, Severity::Critical, r"(?i)<\s*iframe\b[^>]*\bsrcdoc\s*="),
        Rule::regex(
            22,
            "autofocus_onfocus",
            C,
            Severity::Critical,
            r"(?i)<\s*[a-z]+\b[^>]*(?:\bautofocus\b[^>]*\bonfocus\s*=|\bonfocus\s*=[^>]*\bautofocus\b)",
        ),
        Rule::regex(
            23,
            "uncommon_tag_event",
            C,
            Severity::High,
            r"(?i)<\s*(?:math|details|marquee|video|audio|body|xmp|noscript|template|isindex|keygen|style|title|textarea)\b[^>]*\bon[a-z]{3,}\s*=",
        ),
        Rule::regex(
            24,
            "namespace_confusion",
            C,
            Severity::High,
            r"(?i)<\s*(?:svg|math)\b[^>]*>\s*<\s*(?:style|mglyph|malignmark|title)\b",
        ),
    ]
}

/// SQL injection: structure, not vocabulary
pub fn sql_rules() -> Vec<Rule> {
    use ThreatCategory::SqlInjection as C;
    vec![
        Rule::regex(
            40,
            "quoted_tautology",
            C,
            Severity::High,
            r#"(?i)['"`]\s*\)?\s*(?:or|and|\|\||&&)\s+['"(]?\s*[a-z0-9_]+\s*['"]?\s*(?:=|<>|!=|>|<|\blike\b)\s*['"(]?\s*[a-z0-9_]+"#,
        ),
        Rule::regex(
            41,
            "numeric_tautology",
            C,
            Severity::High,
            r"(?i)\bor\s+(?:1\s*=\s*1\b|'1'\s*=\s*'1')|['`)]\s*or\s+true\b",
        ),
        Rule::regex(
            42,
            "comment_termination",
            C,
            Severity::High,
            r#"['"]\s*\)*\s*(?:;\s*)?(?:--|#)\s*$|['"]\s*\)*\s*;\s*--|['"]\s*/\*"#,
        ),
        Rule::regex(
            43,
            "stacked_statement",
            C,
            Severity::Critical,
            r"(?i);\s*(?:drop\s+(?:table|database|schema|view|index)|delete\s+from\s+[a-z_]|insert\s+into\s+[a-z_]|update\s+[a-z_][a-z0-9_]*\s+set\b|truncate\s+table|alter\s+table|create\s+(?:table|user|database)|shutdown\b|exec(?:ute)?\s+[a-z_])",
        ),
        Rule::regex(44, "union_select", C, Severity::Critical, r"(?i)\bunion\s+(?:all\s+|distinct\s+)?select\b"),
        Rule::regex(
            45,
            "drop_table",
            C,
            Severity::Critical,
            r#"(?i)\bdrop\s+(?:table|database)\s+(?:if\s+exists\s+)?[a-z_`"\[]"#,
        ),
        Rule::regex(
            46,
            "timing_function",
            C,
            Severity::High,
            r"(?i)\b(?:sleep|pg_sleep|benchmark)\(\s*\d|(?:[;'`]|\bselect)\s*(?:sleep|pg_sleep|benchmark)\s*\(\s*\d|\bwaitfor\s+(?:delay|time)\s+'",
        ),
        Rule::literal(47, "schema_probe", C, Severity::High, "information_schema"),
        Rule::literal(48, "version_probe", C, Severity::Medium, "@@version"),
        Rule::literal(49, "extended_procedure", C, Severity::Critical, "xp_cmdshell"),
        Rule::literal(50, "dynamic_sql", C, Severity::High, "sp_executesql"),
        Rule::literal(51, "file_write", C, Severity::Critical, "into outfile"),
        Rule::literal(52, "file_dump", C, Severity::Critical, "into dumpfile"),
    ]
}

/// OS command injection
pub fn command_rules() -> Vec<Rule> {
    use ThreatCategory::CommandInjection as C;
    vec![
        Rule::regex(
            60,
            "chained_binary",
            C,
            Severity::Critical,
            r"(?i)(?:[;&|`]|\$\()\s*(?:sudo\s+)?(?:rm\s+-[a-z]*[rf]|(?:wget|curl)\s+(?:-[a-z-]+\s+)*(?:https?://|ftp://|-)|nc\s+-?[a-z0-9]|ncat\s|netcat\s|chmod\s+[0-7+]|chown\s|(?:ba|z)?sh\s+-[ci]|(?:ba|z)?sh\s*<|python[23]?\s+-c|perl\s+-e|mkfifo\s|cat\s+/etc/|/bin/[a-z]+|whoami\b|uname\s+-a)",
        ),
        Rule::regex(
            61,
            "command_substitution",
            C,
            Severity::Critical,
            r"(?i)\$\(\s*(?:rm|wget|curl|nc|cat|ls|id|whoami|uname|bash|sh|echo|python[23]?|perl|base64)\b[^)]*\)|`\s*(?:rm|wget|curl|nc|cat|ls|id|whoami|uname|bash|sh|python[23]?|perl)\b[^`]*`|\$\{ifs\}",
        ),
        Rule::regex(62, "pipe_to_shell", C, Severity::Critical, r"(?i)\|\s*(?:sudo\s+)?(?:ba|z|k|da)?sh\b(?:\s|$|;)"),
        Rule::regex(
            63,
            "destructive_binary",
            C,
            Severity::High,
            r"(?i)\brm\s+-(?:rf|fr|r|f)\s+[/~*.$]|\bchmod\s+(?:\+x|[0-7]{3,4})\s+\S|\bmkfs\.[a-z0-9]+|\bdd\s+if=",
        ),
    ]
}

/// CSS injection
pub fn css_rules() -> Vec<Rule> {
    use ThreatCategory::CssInjection as C;
    vec![
        Rule::regex(
            80,
            "css_expression",
            C,
            Severity::High,
            r#"(?i)(?:^|[{;"'\s])[a-z-]+\s*:\s*expression\(|\bstyle\s*=\s*['"]?[^'">]*expression\("#,
        ),
        Rule::regex(
            81,
            "css_script_url",
            C,
            Severity::Critical,
            r#"(?i)\burl\s*\(\s*['"]?\s*(?:java|vb)script\s*:"#,
        ),
        Rule::regex(82, "css_behavior", C, Severity::High, r"(?i)\bbehavior\s*:\s*url\s*\("),
        Rule::regex(83, "css_import", C, Severity::Medium, r#"(?i)@import\s+(?:url\s*\(|['"])"#),
        Rule::literal(84, "css_binding", C, Severity::High, "-moz-binding"),
    ]
}

/// Get default rule set
pub fn default_rules() -> Vec<Rule> {
    let mut rules = script_rules();
    rules.extend(mutation_xss_rules());
    rules.extend(sql_rules());
    rules.extend(command_rules());
    rules.extend(css_rules());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rule_ids_unique() {
        let rules = default_rules();
        let ids: HashSet<u32> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), rules.len());

        let names: HashSet<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), rules.len());
    }

    #[test]
    fn test_every_text_category_covered() {
        let rules = default_rules();
        for category in [
            ThreatCategory::ScriptInjection,
            ThreatCategory::MutationXss,
            ThreatCategory::SqlInjection,
            ThreatCategory::CommandInjection,
            ThreatCategory::CssInjection,
        ] {
            assert!(rules.iter().any(|r| r.category == category), "{category}");
        }
    }
}
