//! Content detectors used by the code and PII row filters.
//!
//! The row filters treat detectors as opaque predicates over a single string
//! cell. Two regex-backed defaults are provided; anything implementing
//! [`ContentDetector`] can replace them on a [`RecordProcessor`](crate::RecordProcessor).

use regex::Regex;
use std::sync::LazyLock;

/// Classifies a single string value.
pub trait ContentDetector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether `value` belongs to the detected class.
    fn detect(&self, value: &str) -> bool;
}

static CODE_SIGNALS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // keyword at the start of a line
        r"(?m)^\s*(?:def|class|import|fn|pub fn|function|return|var|let|const|package|public|private|static|async fn)\s+[\w{(]",
        r"(?m)^\s*from\s+[\w.]+\s+import\s+\w",
        r"(?m)^\s*#\s*(?:include|define|ifdef|ifndef|pragma)\b",
        r"^#!/",
        // call followed by a statement terminator or block
        r"(?m)\w\s*\([^()]*\)\s*(?:;|\{|:|=>)\s*$",
        // assignment terminated by a semicolon
        r"(?m)\w\s*(?:=|\+=|-=|:=)\s*[^=;]+;\s*$",
        r"(?:==|!=|&&|\|\||->|::|=>)",
        r"</?[a-zA-Z][\w-]*(?:\s+[\w-]+=(?:\x22[^\x22]*\x22|'[^']*'))*\s*/?>",
        r"(?i)\bselect\b.+\bfrom\b|\binsert\s+into\b|\bupdate\b.+\bset\b|\bcreate\s+table\b",
        r"[{};]\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid code-signal pattern"))
    .collect()
});

/// Heuristic source-code detector.
///
/// Counts how many distinct code signals (statement keywords, call syntax,
/// operators, markup, SQL, trailing braces) appear in a value and reports code
/// once at least `min_signals` fire.
#[derive(Debug, Clone)]
pub struct CodeDetector {
    min_signals: usize,
}

impl Default for CodeDetector {
    fn default() -> Self {
        Self { min_signals: 2 }
    }
}

impl CodeDetector {
    #[must_use]
    pub fn with_min_signals(min_signals: usize) -> Self {
        Self {
            min_signals: min_signals.max(1),
        }
    }

    /// Number of distinct signals present in `value`.
    #[must_use]
    pub fn score(&self, value: &str) -> usize {
        CODE_SIGNALS.iter().filter(|re| re.is_match(value)).count()
    }
}

impl ContentDetector for CodeDetector {
    fn name(&self) -> &str {
        "code"
    }

    fn detect(&self, value: &str) -> bool {
        self.score(value) >= self.min_signals
    }
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").expect("valid email pattern")
});
static US_SSN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid SSN pattern")
});
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[\s.-]?)?\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b")
        .expect("valid phone pattern")
});
static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b")
        .expect("valid IPv4 pattern")
});
static CARD_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d[ -]?){12,18}\d\b").expect("valid card pattern")
});

/// Kinds of personally identifying data recognised by [`PiiDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiKind {
    Email,
    UsSsn,
    Phone,
    IpAddress,
    CardNumber,
}

/// Pattern-based PII detector (emails, US SSNs, phone numbers, IPv4
/// addresses, Luhn-valid card numbers).
#[derive(Debug, Clone, Default)]
pub struct PiiDetector;

impl PiiDetector {
    /// First PII kind found in `value`, checked from most to least specific.
    #[must_use]
    pub fn classify(&self, value: &str) -> Option<PiiKind> {
        if EMAIL.is_match(value) {
            return Some(PiiKind::Email);
        }
        if US_SSN.is_match(value) {
            return Some(PiiKind::UsSsn);
        }
        if CARD_CANDIDATE
            .find_iter(value)
            .any(|m| luhn_valid(m.as_str()))
        {
            return Some(PiiKind::CardNumber);
        }
        if PHONE.is_match(value) {
            return Some(PiiKind::Phone);
        }
        if IPV4.is_match(value) {
            return Some(PiiKind::IpAddress);
        }
        None
    }
}

impl ContentDetector for PiiDetector {
    fn name(&self) -> &str {
        "pii"
    }

    fn detect(&self, value: &str) -> bool {
        self.classify(value).is_some()
    }
}

/// Luhn checksum over the digits of `candidate`, ignoring separators.
fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_detector_flags_source_snippets() {
        let d = CodeDetector::default();
        assert!(d.detect("def main(x):\n    return x + 1"));
        assert!(d.detect("for (int i = 0; i < n; i++) {"));
        assert!(d.detect("SELECT id, name FROM users WHERE id == 1;"));
        assert!(d.detect("<div class=\"row\"><span>hi</span></div>\n{"));
    }

    #[test]
    fn code_detector_ignores_prose() {
        let d = CodeDetector::default();
        assert!(!d.detect("The quick brown fox jumps over the lazy dog."));
        assert!(!d.detect("Paris"));
        assert!(!d.detect("3.14"));
        assert!(!d.detect("Smith, John (editor)"));
    }

    #[test]
    fn pii_detector_recognises_common_identifiers() {
        let d = PiiDetector;
        assert_eq!(d.classify("mail me at jane.doe@example.org"), Some(PiiKind::Email));
        assert_eq!(d.classify("ssn 123-45-6789"), Some(PiiKind::UsSsn));
        assert_eq!(d.classify("call (555) 123-4567 today"), Some(PiiKind::Phone));
        assert_eq!(d.classify("host 192.168.1.100"), Some(PiiKind::IpAddress));
        assert_eq!(d.classify("card 4111 1111 1111 1111"), Some(PiiKind::CardNumber));
    }

    #[test]
    fn pii_detector_passes_plain_values() {
        let d = PiiDetector;
        assert!(!d.detect("blue"));
        assert!(!d.detect("1999"));
        assert!(!d.detect("version 1.2.3"));
        // 16 digits failing the Luhn check
        assert!(!d.detect("1234567812345678"));
    }

    #[test]
    fn luhn_checks_known_numbers() {
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("5500-0000-0000-0004"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid("1234"));
    }
}
