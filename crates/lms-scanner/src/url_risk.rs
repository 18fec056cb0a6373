//! URL and domain risk
//!
//! URLs embedded in content are extracted, parsed with the WHATWG parser
//! (so `http://0x7f.1/` and `http://2130706433/` normalise to IP hosts) and
//! checked against the configured domain lists.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::{Finding, Severity, ThreatCategory};

/// Extraction pattern for absolute URLs in free text
pub(crate) const URL_PATTERN: &str = r#"(?i)\b(?:https?|ftp|file)://[^\s"'<>()\[\]{}]+"#;

/// Specific URL problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlRisk {
    /// `file://` and other local-resource schemes
    DangerousScheme,
    /// `user:pass@host`
    CredentialedUrl,
    /// Host is a bare IPv4/IPv6 address
    IpLiteralHost,
    /// Domain (or a parent) is on the blocklist
    MaliciousDomain,
    /// Link shortener hiding the destination
    ShortenerDomain,
    /// Free TLD with a high abuse rate
    FreeTld,
}

impl UrlRisk {
    /// Rule name used in findings
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DangerousScheme => "dangerous_scheme",
            Self::CredentialedUrl => "credentialed_url",
            Self::IpLiteralHost => "ip_literal_host",
            Self::MaliciousDomain => "malicious_domain",
            Self::ShortenerDomain => "shortener_domain",
            Self::FreeTld => "free_tld",
        }
    }

    /// Severity of this risk
    pub fn severity(&self) -> Severity {
        match self {
            Self::DangerousScheme | Self::MaliciousDomain => Severity::High,
            Self::CredentialedUrl | Self::IpLiteralHost => Severity::Medium,
            Self::ShortenerDomain | Self::FreeTld => Severity::Low,
        }
    }
}

/// Domain lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPolicy {
    /// Known-bad domains; subdomains match too
    pub malicious_domains: HashSet<String>,
    /// Link shorteners
    pub shortener_domains: HashSet<String>,
    /// Abuse-associated free TLDs, without the dot
    pub free_tlds: HashSet<String>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            malicious_domains: HashSet::new(),
            shortener_domains: [
                "bit.ly",
                "tinyurl.com",
                "goo.gl",
                "t.co",
                "ow.ly",
                "is.gd",
                "buff.ly",
                "rebrand.ly",
                "cutt.ly",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            free_tlds: ["tk", "ml", "ga", "cf", "gq"].into_iter().map(String::from).collect(),
        }
    }
}

impl UrlPolicy {
    /// Risks for a single URL string. Unparseable URLs yield nothing.
    pub fn assess(&self, raw: &str) -> Vec<UrlRisk> {
        let mut risks = Vec::new();
        let Ok(url) = Url::parse(raw) else {
            return risks;
        };

        if url.scheme() == "file" {
            risks.push(UrlRisk::DangerousScheme);
        }
        if !url.username().is_empty() || url.password().is_some() {
            risks.push(UrlRisk::CredentialedUrl);
        }

        match url.host() {
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => risks.push(UrlRisk::IpLiteralHost),
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                if matches_list(&self.malicious_domains, &domain) {
                    risks.push(UrlRisk::MaliciousDomain);
                }
                if matches_list(&self.shortener_domains, &domain) {
                    risks.push(UrlRisk::ShortenerDomain);
                }
                if let Some(tld) = domain.rsplit('.').next() {
                    if domain.contains('.') && self.free_tlds.contains(tld) {
                        risks.push(UrlRisk::FreeTld);
                    }
                }
            }
            None => {}
        }

        risks
    }

    /// Findings for one URL
    pub fn findings(&self, raw: &str) -> Vec<Finding> {
        self.assess(raw)
            .into_iter()
            .map(|risk| Finding::new(ThreatCategory::UrlRisk, risk.as_str(), risk.severity()).with_detail(raw))
            .collect()
    }
}

/// Exact or parent-domain membership (`a.evil.com` matches `evil.com`)
fn matches_list(list: &HashSet<String>, domain: &str) -> bool {
    if list.is_empty() {
        return false;
    }
    if list.contains(domain) {
        return true;
    }

    let parts: Vec<&str> = domain.split('.').collect();
    (1..parts.len().saturating_sub(1)).any(|i| list.contains(&parts[i..].join(".")))
}
