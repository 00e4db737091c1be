//! Domain primitives with validated constructors.

use embranch_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `CollectionName` is empty after trimming.
    EmptyCollectionName {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `CollectionName` violates the allowed pattern.
    InvalidCollectionName {
        /// Trimmed collection name that failed validation.
        input: String,
    },
    /// `DocumentId` is empty after trimming.
    InvalidDocumentId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `BranchName` is empty or contains whitespace.
    InvalidBranchName {
        /// Trimmed branch name that failed validation.
        input: String,
    },
    /// `CommitHash` is empty or contains non-hex characters.
    InvalidCommitHash {
        /// Trimmed commit hash that failed validation.
        input: String,
    },
    /// `RemoteName` is empty or contains whitespace.
    InvalidRemoteName {
        /// Trimmed remote name that failed validation.
        input: String,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyCollectionName { .. } | Self::InvalidCollectionName { .. } => {
                ErrorCode::new("domain", "invalid_collection_name")
            },
            Self::InvalidDocumentId { .. } => ErrorCode::new("domain", "invalid_document_id"),
            Self::InvalidBranchName { .. } => ErrorCode::new("domain", "invalid_branch_name"),
            Self::InvalidCommitHash { .. } => ErrorCode::new("domain", "invalid_commit_hash"),
            Self::InvalidRemoteName { .. } => ErrorCode::new("domain", "invalid_remote_name"),
        }
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCollectionName { .. } => {
                formatter.write_str("CollectionName must be non-empty")
            },
            Self::InvalidCollectionName { .. } => formatter
                .write_str("CollectionName must match /^[a-zA-Z0-9][a-zA-Z0-9._-]*$/"),
            Self::InvalidDocumentId { .. } => formatter.write_str("DocumentId must be non-empty"),
            Self::InvalidBranchName { .. } => {
                formatter.write_str("BranchName must be non-empty without whitespace")
            },
            Self::InvalidCommitHash { .. } => {
                formatter.write_str("CommitHash must be non-empty lowercase hex")
            },
            Self::InvalidRemoteName { .. } => {
                formatter.write_str("RemoteName must be non-empty without whitespace")
            },
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let mut envelope = Self::expected(error.error_code(), error.to_string());

        match error {
            PrimitiveError::EmptyCollectionName { input_length }
            | PrimitiveError::InvalidDocumentId { input_length } => {
                envelope = envelope.with_metadata("input_length", input_length.to_string());
            },
            PrimitiveError::InvalidCollectionName { input }
            | PrimitiveError::InvalidBranchName { input }
            | PrimitiveError::InvalidCommitHash { input }
            | PrimitiveError::InvalidRemoteName { input } => {
                envelope = envelope.with_metadata("input", input);
            },
        }

        envelope
    }
}

fn trimmed_non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Name of a collection in the store.
///
/// Case-sensitive and unique across the store. The charset is restricted so a
/// collection name can double as a snapshot file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(Box<str>);

impl CollectionName {
    /// Parse a `CollectionName` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::EmptyCollectionName {
                input_length: raw.len(),
            });
        };

        let mut chars = trimmed.chars();
        let head_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !head_ok || !tail_ok {
            return Err(PrimitiveError::InvalidCollectionName {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier of a document within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Box<str>);

impl DocumentId {
    /// Parse a `DocumentId` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::InvalidDocumentId {
                input_length: raw.len(),
            });
        };

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A Dolt branch name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(Box<str>);

impl BranchName {
    /// Parse a `BranchName` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(PrimitiveError::InvalidBranchName {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A Dolt commit hash (full or abbreviated, lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(Box<str>);

impl CommitHash {
    /// Parse a `CommitHash` from user input.
    ///
    /// Dolt hashes are base32-flavored; we accept lowercase alphanumerics to
    /// cover both Dolt and git-style hex output.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase());
        if !valid {
            return Err(PrimitiveError::InvalidCommitHash {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A Dolt remote name (e.g. `origin`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteName(Box<str>);

impl RemoteName {
    /// Parse a `RemoteName` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(PrimitiveError::InvalidRemoteName {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// The conventional default remote name.
    #[must_use]
    pub fn origin() -> Self {
        Self("origin".into())
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_accepts_reasonable_inputs() {
        for input in ["docs", "notes-2024", "a.b_c", "0index"] {
            assert!(CollectionName::parse(input).is_ok(), "rejected {input}");
        }
    }

    #[test]
    fn collection_name_rejects_bad_inputs() {
        for input in ["", "  ", ".hidden", "has space", "slash/name"] {
            assert!(CollectionName::parse(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn collection_name_is_case_sensitive() {
        let lower = CollectionName::parse("docs").expect("valid");
        let upper = CollectionName::parse("Docs").expect("valid");
        assert_ne!(lower, upper);
    }

    #[test]
    fn document_id_trims_and_rejects_empty() {
        let id = DocumentId::parse("  d1  ").expect("valid");
        assert_eq!(id.as_str(), "d1");
        assert!(DocumentId::parse("   ").is_err());
    }

    #[test]
    fn branch_name_rejects_whitespace() {
        assert!(BranchName::parse("feature/x").is_ok());
        assert!(BranchName::parse("two words").is_err());
        assert!(BranchName::parse("").is_err());
    }

    #[test]
    fn commit_hash_accepts_dolt_and_hex_styles() {
        assert!(CommitHash::parse("abc1234").is_ok());
        assert!(CommitHash::parse("o9s4lsu1vnnrj0g9leg1vr4593cap3rk").is_ok());
        assert!(CommitHash::parse("ABC123").is_err());
        assert!(CommitHash::parse("").is_err());
    }

    #[test]
    fn remote_name_default_is_origin() {
        assert_eq!(RemoteName::origin().as_str(), "origin");
        assert!(RemoteName::parse("up stream").is_err());
    }

    #[test]
    fn primitive_errors_convert_to_envelopes() {
        let error = CollectionName::parse("bad name").expect_err("must fail");
        let envelope = ErrorEnvelope::from(error);
        assert_eq!(
            envelope.code,
            ErrorCode::new("domain", "invalid_collection_name")
        );
        assert_eq!(
            envelope.metadata.get("input").map(String::as_str),
            Some("bad name")
        );
    }
}
