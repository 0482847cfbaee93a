use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// How materialization treats several events sharing one id.
///
/// Neither the store nor a branch rejects duplicate ids on insert; this
/// policy only decides which copies reach the reducer. Copies are ranked in
/// canonical order; copies that also share a timestamp are ranked by type tag
/// and then by encoded payload. The pick therefore depends only on the events
/// held, never on the order they were inserted in.
///
/// `FoldAll` folds tied copies in insertion order, as the stable canonical
/// sort leaves them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fold every copy. Matches the behavior of a log that does not dedup.
    #[default]
    FoldAll,
    /// Fold only the first copy of each id in canonical order.
    KeepEarliest,
    /// Fold only the last copy of each id in canonical order.
    KeepLatest,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FoldAll => "fold-all",
            Self::KeepEarliest => "keep-earliest",
            Self::KeepLatest => "keep-latest",
        };
        write!(f, "{s}")
    }
}

/// Configuration shared by a store and the branches forked from it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub duplicate_policy: DuplicatePolicy,
}

impl LedgerConfig {
    /// Parse a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, LedgerError> {
        toml::from_str(text).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, LedgerError> {
        toml::to_string(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_folds_all() {
        let c = LedgerConfig::default();
        assert_eq!(c.duplicate_policy, DuplicatePolicy::FoldAll);
    }

    #[test]
    fn parse_policy() {
        let c = LedgerConfig::from_toml_str("duplicate_policy = \"keep-latest\"\n").unwrap();
        assert_eq!(c.duplicate_policy, DuplicatePolicy::KeepLatest);
    }

    #[test]
    fn empty_text_is_default() {
        assert_eq!(LedgerConfig::from_toml_str("").unwrap(), LedgerConfig::default());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = LedgerConfig::from_toml_str("duplicate_policy = \"keep-some\"").unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let c = LedgerConfig {
            duplicate_policy: DuplicatePolicy::KeepEarliest,
        };
        let text = c.to_toml_string().unwrap();
        assert!(text.contains("keep-earliest"));
        assert_eq!(LedgerConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "duplicate_policy = \"keep-earliest\"").unwrap();
        let c = LedgerConfig::load(file.path()).unwrap();
        assert_eq!(c.duplicate_policy, DuplicatePolicy::KeepEarliest);
    }

    #[test]
    fn load_missing_file() {
        let err = LedgerConfig::load(Path::new("/nonexistent/forkline.toml")).unwrap_err();
        assert!(matches!(err, LedgerError::Config(msg) if msg.contains("forkline.toml")));
    }

    #[test]
    fn policy_display() {
        assert_eq!(DuplicatePolicy::FoldAll.to_string(), "fold-all");
        assert_eq!(DuplicatePolicy::KeepLatest.to_string(), "keep-latest");
    }
}
