//! Accumulated validation diagnostics.
//!
//! Validation phases collect every discoverable issue before returning, so a
//! caller gets the complete picture of a bad submission in one round trip.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable issue codes, used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Input is not a JSON object.
    Structural,
    /// A spec artifact is not a valid schema document.
    SchemaCompile,
    /// Violation of the universal base schema (required fields, pattern).
    BaseSchema,
    /// Violation of a type-specific conformance schema.
    TypeSchema,
    /// Dangling schema reference ($ref/$schema or missing schema component).
    Reference,
    /// A supplied CID resolves to no stored artifact.
    ArtifactNotFound,
    /// Artifact namespace/parent fields disagree with the owning component.
    NamespaceMismatch,
    /// Artifact `conformance` flag disagrees with its kind.
    ConformanceFlagMismatch,
    /// Operation precondition failed (namespace taken, malformed input,
    /// required type missing).
    Precondition,
    /// A delete is blocked by dependent components.
    DependencyExists,
    /// Secondary cleanup failure during rollback; the original error is
    /// still the one surfaced to the caller.
    Rollback,
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Structural => "STRUCTURAL",
            Self::SchemaCompile => "SCHEMA_COMPILE",
            Self::BaseSchema => "BASE_SCHEMA",
            Self::TypeSchema => "TYPE_SCHEMA",
            Self::Reference => "REFERENCE",
            Self::ArtifactNotFound => "ARTIFACT_NOT_FOUND",
            Self::NamespaceMismatch => "NAMESPACE_MISMATCH",
            Self::ConformanceFlagMismatch => "CONFORMANCE_FLAG_MISMATCH",
            Self::Precondition => "PRECONDITION",
            Self::DependencyExists => "DEPENDENCY_EXISTS",
            Self::Rollback => "ROLLBACK",
        };
        f.write_str(s)
    }
}

/// One structured validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    /// Human-readable, single-line message.
    pub message: String,
    /// JSON pointer into the offending document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !path.is_empty() {
            self.path = Some(path);
        }
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {} (at {})", self.code, self.message, path),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Result of validating one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub namespace: String,
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.valid = false;
        self.errors.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        for issue in issues {
            self.push(issue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_code_serializes_screaming_snake() {
        let encoded = serde_json::to_string(&IssueCode::ConformanceFlagMismatch).unwrap();
        assert_eq!(encoded, "\"CONFORMANCE_FLAG_MISMATCH\"");
    }

    #[test]
    fn test_issue_display_includes_path() {
        let issue = ValidationIssue::new(IssueCode::BaseSchema, "missing field").with_path("/namespace");
        assert_eq!(issue.to_string(), "BASE_SCHEMA: missing field (at /namespace)");
    }

    #[test]
    fn test_with_path_ignores_empty_pointer() {
        let issue = ValidationIssue::new(IssueCode::Structural, "not an object").with_path("");
        assert!(issue.path.is_none());
    }

    #[test]
    fn test_report_push_flips_valid() {
        let mut report = ValidationReport::new("hologram.widget");
        assert!(report.valid);
        report.push(ValidationIssue::new(IssueCode::Precondition, "boom"));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }
}
