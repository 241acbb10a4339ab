// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stream serialization and optional compression (spec.md §4.8
//! "Compression", §6 "Output change stream"): line-delimited JSON, one
//! record per line, with an optional leading header line declaring the
//! compression scheme so consumers can auto-detect it.

use chrono::{DateTime, Utc};
use mgit_core::{ChangeRecord, StreamHeader, StreamHeaderLine};
use mgit_error::{ErrorCode, MgitError};
use std::io::Write as _;

/// Current output stream format version.
pub const STREAM_VERSION: u32 = 1;

/// Compression scheme applied to an emitted stream, declared in the
/// stream's header line so a consumer can auto-detect it (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionScheme {
    /// Zstandard framing over the newline-delimited JSON payload.
    Zstd,
}

impl CompressionScheme {
    /// The string recorded in `StreamHeader::compression`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
        }
    }
}

fn io_error(context: &str, err: std::io::Error) -> MgitError {
    MgitError::new(ErrorCode::StorageError, format!("{context}: {err}"))
}

fn json_error(context: &str, err: serde_json::Error) -> MgitError {
    MgitError::new(ErrorCode::StorageError, format!("{context}: {err}"))
}

/// Serialize `records` as newline-delimited JSON, with an optional leading
/// header line, then optionally zstd-compress the whole payload.
///
/// `generated_at` is supplied by the caller rather than sampled internally
/// so that callers needing deterministic output (tests, `insta` snapshots)
/// can pin it.
pub fn serialize_stream(
    records: &[ChangeRecord],
    compression: Option<CompressionScheme>,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, MgitError> {
    let mut plain = Vec::new();

    let header = StreamHeaderLine {
        header: StreamHeader {
            version: STREAM_VERSION,
            compression: compression.map(|c| c.as_str().to_string()),
            generated_at,
        },
    };
    serde_json::to_writer(&mut plain, &header).map_err(|e| json_error("failed to serialize stream header", e))?;
    plain.push(b'\n');

    for record in records {
        serde_json::to_writer(&mut plain, record).map_err(|e| json_error("failed to serialize change record", e))?;
        plain.push(b'\n');
    }

    match compression {
        None => Ok(plain),
        Some(CompressionScheme::Zstd) => {
            let mut encoder = zstd::stream::write::Encoder::new(Vec::new(), 0)
                .map_err(|e| io_error("failed to start zstd encoder", e))?;
            encoder.write_all(&plain).map_err(|e| io_error("failed to write to zstd encoder", e))?;
            encoder.finish().map_err(|e| io_error("failed to finish zstd stream", e))
        }
    }
}

/// The inverse of [`serialize_stream`]: decompress if `compression` is
/// set, then split on newlines. Used by tests and by any host that wants
/// to round-trip a stream mgit produced.
pub fn deserialize_stream(bytes: &[u8], compression: Option<CompressionScheme>) -> Result<String, MgitError> {
    let plain = match compression {
        None => bytes.to_vec(),
        Some(CompressionScheme::Zstd) => {
            zstd::stream::decode_all(bytes).map_err(|e| io_error("failed to decode zstd stream", e))?
        }
    };
    String::from_utf8(plain).map_err(|e| MgitError::new(ErrorCode::StorageError, format!("stream is not valid utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgit_core::{ChangeOp, FileOpRecord};

    fn sample_records() -> Vec<ChangeRecord> {
        vec![ChangeRecord::FileOp(FileOpRecord::new("repo1", ChangeOp::Add, "a.txt"))]
    }

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn uncompressed_stream_is_newline_delimited_json() {
        let bytes = serialize_stream(&sample_records(), None, fixed_time()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"header\""));
        assert!(lines[1].contains("\"file_op\""));
    }

    #[test]
    fn header_declares_no_compression_when_absent() {
        let bytes = serialize_stream(&sample_records(), None, fixed_time()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header_line: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert!(header_line["header"]["compression"].is_null());
    }

    #[test]
    fn zstd_round_trips_back_to_the_same_text() {
        let bytes = serialize_stream(&sample_records(), Some(CompressionScheme::Zstd), fixed_time()).unwrap();
        let text = deserialize_stream(&bytes, Some(CompressionScheme::Zstd)).unwrap();
        assert!(text.contains("\"file_op\""));

        let header_line: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(header_line["header"]["compression"], "zstd");
    }

    #[test]
    fn zstd_payload_is_not_plain_json() {
        let plain = serialize_stream(&sample_records(), None, fixed_time()).unwrap();
        let compressed = serialize_stream(&sample_records(), Some(CompressionScheme::Zstd), fixed_time()).unwrap();
        assert_ne!(plain, compressed);
        assert!(std::str::from_utf8(&compressed).is_err() || !compressed.starts_with(b"{"));
    }

    #[test]
    fn file_op_line_shape_matches_snapshot() {
        // Snapshot only the record line, not the header: the header embeds
        // a `generated_at` timestamp whose chrono-serde rendering isn't
        // worth pinning here.
        let bytes = serialize_stream(&sample_records(), None, fixed_time()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let record_line = text.lines().nth(1).unwrap();
        insta::assert_snapshot!(record_line, @r###"{"record_type":"file_op","repo":"repo1","op":"add","path":"a.txt"}"###);
    }
}
