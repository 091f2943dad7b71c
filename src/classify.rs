// Decode-time guess at whether a payload should be shown as text or saved as a file.
// Advisory only: the round trip never depends on it.

use serde::{Deserialize, Serialize};

/// Payloads at or above this size are never sniffed for text.
pub const TEXT_SNIFF_LIMIT: usize = 1024 * 1024;
pub const PRINTABLE_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Text,
    Binary,
}

fn is_printable(c: char) -> bool {
    matches!(c as u32, 32..=126) || c as u32 >= 160 || matches!(c, '\n' | '\r' | '\t')
}

/// Share of printable characters after a lossy UTF-8 decode; 0 for an empty payload.
pub fn printable_ratio(bytes: &[u8]) -> f64 {
    let text = String::from_utf8_lossy(bytes);
    let mut total = 0usize;
    let mut printable = 0usize;
    for c in text.chars() {
        total += 1;
        if is_printable(c) && c != char::REPLACEMENT_CHARACTER {
            printable += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        printable as f64 / total as f64
    }
}

/// A declared type decides when present; otherwise small, mostly printable payloads are text.
pub fn classify(declared_type: &str, byte_length: usize, printable_ratio: f64) -> PayloadKind {
    let declared = declared_type.trim().to_ascii_lowercase();
    if declared.contains("text") {
        return PayloadKind::Text;
    }
    if !declared.is_empty() {
        return PayloadKind::Binary;
    }
    if byte_length < TEXT_SNIFF_LIMIT && printable_ratio > PRINTABLE_THRESHOLD {
        PayloadKind::Text
    } else {
        PayloadKind::Binary
    }
}

pub fn classify_payload(declared_type: &str, bytes: &[u8]) -> PayloadKind {
    let ratio = if bytes.len() < TEXT_SNIFF_LIMIT {
        printable_ratio(bytes)
    } else {
        0.0
    };
    classify(declared_type, bytes.len(), ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_text_wins() {
        assert_eq!(classify("text/plain", 10, 0.0), PayloadKind::Text);
        assert_eq!(classify("Text/Markdown", usize::MAX, 0.0), PayloadKind::Text);
    }

    #[test]
    fn declared_binary_wins() {
        assert_eq!(classify("image/png", 10, 1.0), PayloadKind::Binary);
    }

    #[test]
    fn sniffing_without_type() {
        assert_eq!(classify_payload("", "héllo wörld\n".as_bytes()), PayloadKind::Text);
        assert_eq!(classify_payload("", &[0u8, 1, 2, 3, 0xFF, 0xFE, 7, 8]), PayloadKind::Binary);
        assert_eq!(classify_payload("", &[]), PayloadKind::Binary);
    }

    #[test]
    fn large_payloads_are_files() {
        assert_eq!(classify("", TEXT_SNIFF_LIMIT, 1.0), PayloadKind::Binary);
    }

    #[test]
    fn ratio_counts_controls() {
        let r = printable_ratio(b"ab\x01\x02");
        assert!((r - 0.5).abs() < 1e-9);
        assert_eq!(printable_ratio(b"tab\there"), 1.0);
    }
}
