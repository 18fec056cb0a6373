//! Encoded-payload unwrapping
//!
//! Attackers hide markup behind HTML entities (`&#x3c;script`), JS escapes
//! (`\u003cscript`), percent-encoding (`%3Cscript`) and base64
//! (`PHNjcmlwdD4=`). The decoder peels these layers so the rule set can be
//! re-run on what a browser would eventually see. Decoding is bounded in
//! rounds and in the number of variants kept.

use std::borrow::Cow;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use lms_common::{GuardError, GuardResult};
use regex::{Captures, Regex};

/// Characters stripped before matching: zero-width space/non-joiner/joiner,
/// word joiner, BOM, soft hyphen, NUL.
const INVISIBLE: [char; 7] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}', '\0'];

/// Remove invisible characters used to split keywords (`java\u{200B}script:`).
///
/// Only used to build the matching view; sanitized output keeps these
/// characters because joiners are part of emoji sequences.
pub fn normalize_for_matching(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| INVISIBLE.contains(&c)) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|c| !INVISIBLE.contains(c)).collect())
}

/// Multi-layer decoder
pub struct Decoder {
    entity: Regex,
    js_escape: Regex,
    percent: Regex,
    base64_segment: Regex,
    rounds: usize,
    max_variants: usize,
    max_base64_segments: usize,
}

impl Decoder {
    /// Compile decoder patterns
    pub fn new(rounds: usize, max_variants: usize, max_base64_segments: usize) -> GuardResult<Self> {
        Ok(Self {
            entity: compile("html_entity", r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([a-zA-Z]{2,8}));?")?,
            js_escape: compile(
                "js_escape",
                r"\\(?:x([0-9a-fA-F]{2})|u\{([0-9a-fA-F]{1,6})\}|u([0-9a-fA-F]{4}))",
            )?,
            percent: compile("percent_escape", r"%[0-9a-fA-F]{2}")?,
            base64_segment: compile("base64_segment", r"[A-Za-z0-9+/_-]{16,}={0,2}")?,
            rounds,
            max_variants,
            max_base64_segments,
        })
    }

    /// Decoded views of `text` that differ from it, breadth-first over
    /// `rounds` layers.
    pub fn decode_layers(&self, text: &str) -> Vec<String> {
        let mut variants: Vec<String> = Vec::new();
        let mut frontier: Vec<String> = vec![text.to_string()];

        for _ in 0..self.rounds {
            let mut next = Vec::new();
            for source in &frontier {
                for decoded in self.decode_once(source).into_iter().flatten() {
                    if decoded != text && !variants.contains(&decoded) && !next.contains(&decoded) {
                        next.push(decoded);
                    }
                }
            }
            if next.is_empty() {
                break;
            }

            let room = self.max_variants.saturating_sub(variants.len());
            next.truncate(room);
            variants.extend(next.iter().cloned());
            if variants.len() >= self.max_variants {
                break;
            }
            frontier = next;
        }

        variants
    }

    fn decode_once(&self, text: &str) -> [Option<String>; 4] {
        [
            self.decode_entities(text),
            self.decode_js_escapes(text),
            self.decode_percent(text),
            self.decode_base64_segments(text),
        ]
    }

    /// `&#60;`, `&#x3c;`, `&lt;` (terminating semicolon optional)
    pub fn decode_entities(&self, text: &str) -> Option<String> {
        if memchr::memchr(b'&', text.as_bytes()).is_none() {
            return None;
        }
        let out = self.entity.replace_all(text, |caps: &Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                caps.get(3).and_then(|name| named_entity(name.as_str()))
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        });
        changed(text, out)
    }

    /// `\x3c`, `\u003c`, `\u{3c}`
    pub fn decode_js_escapes(&self, text: &str) -> Option<String> {
        if memchr::memchr(b'\\', text.as_bytes()).is_none() {
            return None;
        }
        let out = self.js_escape.replace_all(text, |caps: &Captures| {
            let hex = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3));
            hex.and_then(|h| u32::from_str_radix(h.as_str(), 16).ok())
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        });
        changed(text, out)
    }

    /// `%3C` and friends
    pub fn decode_percent(&self, text: &str) -> Option<String> {
        if !self.percent.is_match(text) {
            return None;
        }
        let bytes = urlencoding::decode_binary(text.as_bytes());
        let out = String::from_utf8_lossy(&bytes).into_owned();
        (out != text).then_some(out)
    }

    /// Decode base64-looking runs that turn out to be readable text.
    /// Decoded segments are joined by newlines into one variant.
    pub fn decode_base64_segments(&self, text: &str) -> Option<String> {
        let mut decoded = Vec::new();

        for m in self.base64_segment.find_iter(text).take(self.max_base64_segments) {
            let segment = m.as_str().trim_end_matches('=');
            let engine = if segment.contains(['-', '_']) { &URL_SAFE_NO_PAD } else { &STANDARD_NO_PAD };
            let Ok(bytes) = engine.decode(segment) else {
                continue;
            };
            let Ok(s) = String::from_utf8(bytes) else {
                continue;
            };
            if is_readable(&s) {
                decoded.push(s);
            }
        }

        if decoded.is_empty() {
            None
        } else {
            Some(decoded.join("\n"))
        }
    }
}

fn compile(name: &str, pattern: &str) -> GuardResult<Regex> {
    Regex::new(pattern).map_err(|e| GuardError::PatternCompile {
        rule: name.to_string(),
        reason: e.to_string(),
    })
}

fn changed(original: &str, out: Cow<'_, str>) -> Option<String> {
    match out {
        Cow::Borrowed(_) => None,
        Cow::Owned(s) if s == original => None,
        Cow::Owned(s) => Some(s),
    }
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name.to_ascii_lowercase().as_str() {
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "amp" => '&',
        "colon" => ':',
        "semi" => ';',
        "equals" => '=',
        "lpar" => '(',
        "rpar" => ')',
        "sol" => '/',
        "bsol" => '\\',
        "grave" => '`',
        "tab" => '\t',
        "newline" => '\n',
        "nbsp" => ' ',
        _ => return None,
    };
    Some(c)
}

/// Mostly printable, no control bytes beyond whitespace
fn is_readable(s: &str) -> bool {
    let total = s.chars().count();
    if total == 0 {
        return false;
    }
    let printable = s
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .count();
    printable * 10 >= total * 9
}
