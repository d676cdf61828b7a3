//! Common types used throughout neo4j-snapshot
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type (insertion ordered)
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Load Method
// ============================================================================

/// How normalized batches are written into the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LoadMethod {
    /// Serialize, upload to a stage and bulk copy (default)
    #[default]
    Stage,
    /// Insert one row per record with an inline JSON cast (slow fallback)
    Rows,
}

// ============================================================================
// Staged File Format
// ============================================================================

/// Encoding declared to the warehouse when copying from a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// One JSON document per line
    #[default]
    NdJson,
}

impl FileFormat {
    /// File extension used for the transient artifact
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::NdJson => "json",
        }
    }
}

/// Compression applied while uploading into a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCompression {
    /// Upload the file as-is
    None,
    /// Gzip on upload, appending `.gz` to the staged name
    #[default]
    Gzip,
}

impl StageCompression {
    /// Suffix appended to the staged artifact name
    pub fn suffix(self) -> &'static str {
        match self {
            StageCompression::None => "",
            StageCompression::Gzip => ".gz",
        }
    }

    /// Compression of a staged artifact, judged by its name
    pub fn of_staged(name: &str) -> Self {
        if name.ends_with(StageCompression::Gzip.suffix()) {
            StageCompression::Gzip
        } else {
            StageCompression::None
        }
    }

    /// Value DuckDB's JSON readers accept for `compression`
    pub fn reader_name(self) -> &'static str {
        match self {
            StageCompression::None => "uncompressed",
            StageCompression::Gzip => "gzip",
        }
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_method_serde() {
        let method: LoadMethod = serde_json::from_str("\"rows\"").unwrap();
        assert_eq!(method, LoadMethod::Rows);

        let json = serde_json::to_string(&LoadMethod::Stage).unwrap();
        assert_eq!(json, "\"stage\"");
        assert_eq!(LoadMethod::default(), LoadMethod::Stage);
    }

    #[test]
    fn test_stage_compression_suffix() {
        assert_eq!(StageCompression::Gzip.suffix(), ".gz");
        assert_eq!(StageCompression::None.suffix(), "");
        assert_eq!(FileFormat::NdJson.extension(), "json");
    }

    #[test]
    fn test_stage_compression_reader_name() {
        assert_eq!(StageCompression::of_staged("batch.json.gz"), StageCompression::Gzip);
        assert_eq!(StageCompression::of_staged("batch.json"), StageCompression::None);
        assert_eq!(StageCompression::Gzip.reader_name(), "gzip");
        assert_eq!(StageCompression::None.reader_name(), "uncompressed");
    }

    #[test]
    fn test_option_string_none_if_empty() {
        assert_eq!(
            Some("test".to_string()).none_if_empty(),
            Some("test".to_string())
        );
        assert_eq!(Some(String::new()).none_if_empty(), None);
        assert_eq!(Some("  ".to_string()).none_if_empty(), None);
        assert_eq!(None::<String>.none_if_empty(), None);
    }
}
