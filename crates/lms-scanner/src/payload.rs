//! Raw payload inspection
//!
//! # Checks
//! - Leading magic bytes (executables, archives, documents, images).
//! - Embedded markers anywhere in the buffer. Two or more distinct formats
//!   make a polyglot (`GIF89a ... PK\x03\x04`).
//! - Decompression-bomb ratios from declared sizes, the gzip ISIZE trailer
//!   and ZIP local file headers.
//! - Shannon entropy, reported always and flagged for declared text.
//!
//! # Invariants
//! - Header walking uses checked arithmetic and never reads past the buffer.
//! - The ZIP walk is bounded by `max_zip_entries`.

use aho_corasick::AhoCorasick;
use lms_common::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entropy::{max_window_entropy, shannon_entropy};
use crate::{Finding, Severity, ThreatCategory};

/// Window for localised entropy checks
const ENTROPY_WINDOW: usize = 4096;

/// ZIP local file header size before the variable-length name/extra fields
const ZIP_LOCAL_HEADER_LEN: usize = 30;

/// Recognised file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Windows PE (`MZ`)
    Pe,
    /// ELF
    Elf,
    /// Mach-O (thin or fat)
    MachO,
    /// `#!/` script
    Shebang,
    /// ZIP (and OOXML/JAR/APK)
    Zip,
    /// gzip
    Gzip,
    /// RAR
    Rar,
    /// 7-Zip
    SevenZip,
    /// bzip2
    Bzip2,
    /// xz
    Xz,
    /// PDF
    Pdf,
    /// PNG
    Png,
    /// JPEG
    Jpeg,
    /// GIF
    Gif,
    /// HTML document or script markup
    Html,
}

impl FileFormat {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pe => "pe",
            Self::Elf => "elf",
            Self::MachO => "mach_o",
            Self::Shebang => "shebang",
            Self::Zip => "zip",
            Self::Gzip => "gzip",
            Self::Rar => "rar",
            Self::SevenZip => "7z",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Html => "html",
        }
    }

    /// Native executable or script
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Pe | Self::Elf | Self::MachO | Self::Shebang)
    }

    /// Compressed container
    pub fn is_archive(&self) -> bool {
        matches!(
            self,
            Self::Zip | Self::Gzip | Self::Rar | Self::SevenZip | Self::Bzip2 | Self::Xz
        )
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller claims the buffer is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    /// UTF-8 text (manifest fields, uploaded transcripts)
    Text,
    /// Opaque binary (images, documents)
    Binary,
}

/// Payload thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadLimits {
    /// Uncompressed / compressed above this is a bomb
    pub max_compression_ratio: f64,
    /// Absolute cap on declared uncompressed size
    pub max_uncompressed_bytes: u64,
    /// Cap on ZIP local headers walked
    pub max_zip_entries: usize,
    /// Entropy (bits/byte) above which declared text looks packed
    pub high_entropy_threshold: f64,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_compression_ratio: 100.0,
            max_uncompressed_bytes: 512 * 1024 * 1024,
            max_zip_entries: 10_000,
            high_entropy_threshold: 7.5,
        }
    }
}

/// Result of inspecting one buffer
#[derive(Debug, Clone, Default, Serialize)]
pub struct PayloadReport {
    /// Buffer length
    pub size: usize,
    /// Distinct formats detected, leading format first
    pub formats: Vec<FileFormat>,
    /// Whole-buffer Shannon entropy
    pub entropy: f64,
    /// Findings
    pub findings: Vec<Finding>,
}

impl PayloadReport {
    /// Whether anything was flagged
    pub fn is_malicious(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Whether the buffer parses as two or more formats
    pub fn is_polyglot(&self) -> bool {
        self.formats.len() >= 2
    }

    fn flag(&mut self, rule: &str, severity: Severity, detail: String) {
        self.findings
            .push(Finding::new(ThreatCategory::FilePayload, rule, severity).with_detail(detail));
    }
}

/// Sizes summed over a ZIP's local headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZipTotals {
    /// Local headers walked
    pub entries: usize,
    /// Sum of compressed sizes
    pub compressed: u64,
    /// Sum of declared uncompressed sizes
    pub uncompressed: u64,
}

/// Signature and bomb detector
pub struct PayloadInspector {
    markers: AhoCorasick,
    marker_formats: Vec<FileFormat>,
    limits: PayloadLimits,
}

impl PayloadInspector {
    /// Build the embedded-marker automaton
    pub fn new(limits: PayloadLimits) -> GuardResult<Self> {
        let table: [(&[u8], FileFormat); 9] = [
            (b"PK\x03\x04", FileFormat::Zip),
            (b"PK\x05\x06", FileFormat::Zip),
            (b"%PDF-", FileFormat::Pdf),
            (b"<html", FileFormat::Html),
            (b"<script", FileFormat::Html),
            (b"<!doctype html", FileFormat::Html),
            (b"\x7fELF", FileFormat::Elf),
            (b"Rar!\x1a\x07", FileFormat::Rar),
            (b"7z\xbc\xaf\x27\x1c", FileFormat::SevenZip),
        ];

        let markers = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(table.iter().map(|(pattern, _)| *pattern))
            .map_err(|e| GuardError::PatternCompile {
                rule: "payload markers".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            markers,
            marker_formats: table.iter().map(|(_, format)| *format).collect(),
            limits,
        })
    }

    /// Active limits
    pub fn limits(&self) -> &PayloadLimits {
        &self.limits
    }

    /// Inspect a buffer declared as `declared`
    pub fn inspect(&self, data: &[u8], declared: DeclaredType) -> PayloadReport {
        let mut report = PayloadReport {
            size: data.len(),
            entropy: shannon_entropy(data),
            ..Default::default()
        };

        let leading = sniff_leading(data);
        if let Some(format) = leading {
            report.formats.push(format);
        }
        for m in self.markers.find_iter(data) {
            if m.start() == 0 {
                continue;
            }
            let format = self.marker_formats[m.pattern().as_usize()];
            if !report.formats.contains(&format) {
                report.formats.push(format);
            }
        }

        if let Some(format) = leading {
            if format.is_executable() {
                report.flag("executable_signature", Severity::Critical, format.to_string());
            } else if format.is_archive() && declared == DeclaredType::Text {
                report.flag("archive_signature", Severity::High, format.to_string());
            }
        }

        if report.is_polyglot() {
            let names: Vec<&str> = report.formats.iter().map(|f| f.as_str()).collect();
            report.flag("polyglot", Severity::Critical, names.join("+"));
        }

        match leading {
            Some(FileFormat::Gzip) => {
                if let Some(isize) = gzip_isize(data) {
                    self.check_expansion(&mut report, data.len() as u64, isize as u64);
                }
            }
            Some(FileFormat::Zip) => {
                let totals = zip_totals(data, self.limits.max_zip_entries);
                if totals.entries > self.limits.max_zip_entries {
                    report.flag(
                        "zip_entry_count",
                        Severity::High,
                        format!("more than {} entries", self.limits.max_zip_entries),
                    );
                }
                self.check_expansion(&mut report, totals.compressed, totals.uncompressed);
            }
            _ => {}
        }

        if declared == DeclaredType::Text {
            if std::str::from_utf8(data).is_err() {
                report.flag("invalid_utf8", Severity::High, "declared text is not UTF-8".to_string());
            }
            if memchr::memchr(0, data).is_some() {
                report.flag("nul_bytes", Severity::Medium, "declared text contains NUL".to_string());
            }
            let peak = max_window_entropy(data, ENTROPY_WINDOW);
            if peak > self.limits.high_entropy_threshold {
                report.flag("high_entropy", Severity::Medium, format!("{peak:.2} bits/byte"));
            }
        }

        report
    }

    /// Flag when declared sizes imply a decompression bomb
    pub fn assess_compression(&self, compressed: u64, uncompressed: u64) -> Option<Finding> {
        let ratio = uncompressed as f64 / compressed.max(1) as f64;

        if uncompressed > self.limits.max_uncompressed_bytes || ratio > self.limits.max_compression_ratio {
            Some(
                Finding::new(ThreatCategory::FilePayload, "decompression_bomb", Severity::Critical)
                    .with_detail(format!("{compressed} -> {uncompressed} bytes (ratio {ratio:.1})")),
            )
        } else {
            None
        }
    }

    fn check_expansion(&self, report: &mut PayloadReport, compressed: u64, uncompressed: u64) {
        if let Some(finding) = self.assess_compression(compressed, uncompressed) {
            report.findings.push(finding);
        }
    }
}

/// Format implied by the first bytes
pub fn sniff_leading(data: &[u8]) -> Option<FileFormat> {
    const MACH_O: [[u8; 4]; 5] = [
        [0xFE, 0xED, 0xFA, 0xCE],
        [0xFE, 0xED, 0xFA, 0xCF],
        [0xCE, 0xFA, 0xED, 0xFE],
        [0xCF, 0xFA, 0xED, 0xFE],
        [0xCA, 0xFE, 0xBA, 0xBE],
    ];

    let format = if is_pe(data) {
        FileFormat::Pe
    } else if data.starts_with(b"\x7fELF") {
        FileFormat::Elf
    } else if MACH_O.iter().any(|m| data.starts_with(m)) {
        FileFormat::MachO
    } else if data.starts_with(b"#!/") {
        FileFormat::Shebang
    } else if data.starts_with(b"PK\x03\x04") || data.starts_with(b"PK\x05\x06") || data.starts_with(b"PK\x07\x08") {
        FileFormat::Zip
    } else if data.starts_with(&[0x1F, 0x8B]) {
        FileFormat::Gzip
    } else if data.starts_with(b"Rar!\x1a\x07") {
        FileFormat::Rar
    } else if data.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        FileFormat::SevenZip
    } else if data.starts_with(b"BZh") && data.get(3).is_some_and(|b| (b'1'..=b'9').contains(b)) {
        FileFormat::Bzip2
    } else if data.starts_with(&[0xFD, b'7', b'z', b'X', b'Z', 0x00]) {
        FileFormat::Xz
    } else if data.starts_with(b"%PDF-") {
        FileFormat::Pdf
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        FileFormat::Png
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        FileFormat::Jpeg
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        FileFormat::Gif
    } else if starts_with_html(data) {
        FileFormat::Html
    } else {
        return None;
    };

    Some(format)
}

/// `MZ` followed by a PE header at `e_lfanew`, or by a binary DOS stub
fn is_pe(data: &[u8]) -> bool {
    if !data.starts_with(b"MZ") {
        return false;
    }

    let pe_header = read_u32_le(data, 0x3C)
        .and_then(|off| usize::try_from(off).ok())
        .and_then(|off| data.get(off..off.checked_add(4)?))
        .is_some_and(|sig| sig == b"PE\0\0");

    pe_header || data.get(2).is_some_and(|b| !b.is_ascii_graphic() && !b.is_ascii_whitespace())
}

fn starts_with_html(data: &[u8]) -> bool {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let head = &data[start..data.len().min(start + 16)];

    [b"<!doctype html".as_slice(), b"<html".as_slice()]
        .iter()
        .any(|tag| head.len() >= tag.len() && head[..tag.len()].eq_ignore_ascii_case(tag))
}

/// Declared uncompressed size (mod 2^32) from the gzip trailer
pub fn gzip_isize(data: &[u8]) -> Option<u32> {
    // 10-byte header + 8-byte trailer
    if data.len() < 18 || !data.starts_with(&[0x1F, 0x8B]) {
        return None;
    }
    read_u32_le(data, data.len() - 4)
}

/// Walk ZIP local file headers from offset 0.
///
/// Stops at the first non-header, at entries using a data descriptor
/// (sizes unknown up front), at ZIP64 placeholders, or after
/// `max_entries + 1` headers.
pub fn zip_totals(data: &[u8], max_entries: usize) -> ZipTotals {
    let mut totals = ZipTotals::default();
    let mut offset = 0usize;

    while totals.entries <= max_entries {
        let Some(header) = data.get(offset..offset.saturating_add(ZIP_LOCAL_HEADER_LEN)) else {
            break;
        };
        if !header.starts_with(b"PK\x03\x04") {
            break;
        }

        let (Some(flags), Some(compressed), Some(uncompressed), Some(name_len), Some(extra_len)) = (
            read_u16_le(header, 6),
            read_u32_le(header, 18),
            read_u32_le(header, 22),
            read_u16_le(header, 26),
            read_u16_le(header, 28),
        ) else {
            break;
        };

        if flags & 0x0008 != 0 || compressed == u32::MAX || uncompressed == u32::MAX {
            break;
        }

        totals.entries += 1;
        totals.compressed += u64::from(compressed);
        totals.uncompressed += u64::from(uncompressed);

        let next = offset
            .checked_add(ZIP_LOCAL_HEADER_LEN)
            .and_then(|o| o.checked_add(usize::from(name_len)))
            .and_then(|o| o.checked_add(usize::from(extra_len)))
            .and_then(|o| o.checked_add(compressed as usize));
        match next {
            Some(n) if n > offset => offset = n,
            _ => break,
        }
    }

    totals
}

fn read_u16_le(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32_le(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
