// SPDX-License-Identifier: MIT OR Apache-2.0
//! MIME and binary/text classification (spec.md §4.8 step 5, SPEC_FULL.md
//! §2 "C8 — binary/text classification"): suffix-based lookup via
//! `mime_guess`, falling back to a magic-byte probe of the first 512 bytes
//! via `infer` when the suffix is absent or ambiguous (`text/plain`,
//! `application/octet-stream`).

/// How large a prefix of a file's bytes to sniff for magic numbers.
pub const PROBE_BYTES: usize = 512;

/// The outcome of classifying one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Best-effort inferred MIME type, if either stage could name one.
    pub mime: Option<String>,
    /// Whether the file should be treated as binary (`skip_index: true`).
    pub is_binary: bool,
}

fn is_ambiguous(essence: &str) -> bool {
    essence == "text/plain" || essence == "application/octet-stream"
}

/// Classify `bytes` (the full file content) found at `path`.
#[must_use]
pub fn classify(path: &str, bytes: &[u8]) -> Classification {
    let suffix_mime = mime_guess::from_path(path).first().map(|m| m.essence_str().to_string());
    let probe_len = bytes.len().min(PROBE_BYTES);
    let sniffed = infer::get(&bytes[..probe_len]);

    let mime = match &suffix_mime {
        Some(s) if !is_ambiguous(s) => Some(s.clone()),
        _ => sniffed
            .map(|k| k.mime_type().to_string())
            .or_else(|| suffix_mime.clone()),
    };

    let is_binary = match &sniffed {
        Some(kind) => !kind.mime_type().starts_with("text/"),
        None => std::str::from_utf8(bytes).is_err(),
    };

    Classification { mime, is_binary }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rust_source_as_text() {
        let c = classify("src/lib.rs", b"fn main() {}\n");
        assert_eq!(c.mime.as_deref(), Some("text/x-rust"));
        assert!(!c.is_binary);
    }

    #[test]
    fn sniffs_png_magic_bytes_as_binary() {
        let png_header: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];
        let c = classify("image.png", png_header);
        assert_eq!(c.mime.as_deref(), Some("image/png"));
        assert!(c.is_binary);
    }

    #[test]
    fn ambiguous_extension_falls_back_to_sniffing() {
        // `.bin` is not a suffix mime_guess recognizes, and there is no
        // magic number in plain ASCII text, so the utf-8 fallback applies.
        let c = classify("notes.bin", b"just some ascii text");
        assert!(!c.is_binary);
    }

    #[test]
    fn invalid_utf8_with_no_known_magic_is_treated_as_binary() {
        let bytes: &[u8] = &[0xff, 0xfe, 0x00, 0x01, 0x02, 0x03];
        let c = classify("data.dat", bytes);
        assert!(c.is_binary);
    }

    #[test]
    fn empty_file_is_treated_as_text() {
        let c = classify("empty.txt", b"");
        assert!(!c.is_binary);
    }
}
