//! Encoder and decoder limits, set in code or loaded from TOML.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Longest chain of message references a schema may declare from its root.
pub const MAX_REFERENCE_CHAIN: usize = 16;

/// Deepest message nesting the encoder and decoder will walk.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Cap on the element count of a repeated field whose elements can be zero bytes wide.
pub const DEFAULT_MAX_REPEATED_ELEMENTS: usize = 65_536;

/// Codec limits, usually left at their defaults or read from a small TOML file:
///
/// ```toml
/// max_depth = 8
/// max_reference_chain = 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    pub max_depth: usize,
    pub max_reference_chain: usize,
    pub max_repeated_elements: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_reference_chain: MAX_REFERENCE_CHAIN,
            max_repeated_elements: DEFAULT_MAX_REPEATED_ELEMENTS,
        }
    }
}

impl CodecConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_keys_take_defaults() {
        let config = CodecConfig::from_toml("max_depth = 4").expect("parse");
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_reference_chain, MAX_REFERENCE_CHAIN);
        assert_eq!(config.max_repeated_elements, DEFAULT_MAX_REPEATED_ELEMENTS);
        assert_eq!(CodecConfig::from_toml("").expect("empty"), CodecConfig::default());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(CodecConfig::from_toml("max_dept = 4").is_err());
    }

    #[test]
    fn from_path_maps_parse_errors_to_invalid_data() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "max_depth = \"deep\"").expect("write");
        let err = CodecConfig::from_path(file.path()).expect_err("invalid type");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "max_reference_chain = 3").expect("write");
        let config = CodecConfig::from_path(file.path()).expect("valid config");
        assert_eq!(config.max_reference_chain, 3);
    }
}
