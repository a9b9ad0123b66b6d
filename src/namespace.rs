//! Namespace and artifact-kind model.
//!
//! Every component is addressed by a namespace matching
//! `hologram(\.[a-z][a-z0-9]*)*`. Artifact types are resolved once at the
//! API boundary into an explicit [`ArtifactKind`] and threaded through the
//! pipeline, instead of being re-derived from string suffixes at every step.

use regex_lite::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Root of every component namespace.
pub const ROOT: &str = "hologram";

/// Pattern every namespace (and artifact `namespace` field) must match.
pub const NAMESPACE_PATTERN: &str = r"^hologram(\.[a-z][a-z0-9]*)*$";

fn namespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAMESPACE_PATTERN).expect("namespace pattern compiles"))
}

/// Errors for namespace and kind resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceError {
    #[error("namespace '{0}' does not match pattern hologram(.segment)*")]
    Pattern(String),

    #[error("unrecognized artifact type '{0}'")]
    UnrecognizedKind(String),
}

/// A validated component namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

impl Namespace {
    pub fn parse(s: &str) -> Result<Self, NamespaceError> {
        if !namespace_re().is_match(s) {
            return Err(NamespaceError::Pattern(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stem of this component's index record (`{namespace}.index`).
    pub fn index_stem(&self) -> String {
        format!("{}.index", self.0)
    }

    /// Expected `namespace` field of this component's conformance artifact
    /// of the given kind (`{namespace}.{type}`).
    pub fn conformance_namespace(&self, kind: &ArtifactKind) -> String {
        format!("{}.{}", self.0, kind.as_str())
    }

    /// Split off the last segment: `hologram.widget.docs` ->
    /// `("hologram.widget", "docs")`. None for the root namespace.
    pub fn split_last(&self) -> Option<(&str, &str)> {
        self.0.rsplit_once('.')
    }

    /// If this namespace is a direct child of the root (`hologram.T`), the
    /// canonical type-definition position, return `T`.
    pub fn type_definition(&self) -> Option<&str> {
        match self.split_last() {
            Some((parent, last)) if parent == ROOT => Some(last),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True if `haystack` names `namespace`: exact match, a dotted descendant
/// (`{namespace}.x`), a schema-pointer fragment (`{namespace}#...`), or a
/// path segment (`/{namespace}` followed by the end or `.`/`#`/`/`). Used
/// by the delete dependency scan; a bare substring match would make the
/// root namespace a dependency of everything and `hologram.widgetry` a
/// dependent of `hologram.widget`.
pub fn string_refers_to(haystack: &str, namespace: &str) -> bool {
    if haystack == namespace
        || haystack.starts_with(&format!("{namespace}."))
        || haystack.starts_with(&format!("{namespace}#"))
    {
        return true;
    }
    let needle = format!("/{namespace}");
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&needle) {
        let end = from + pos + needle.len();
        match haystack[end..].chars().next() {
            None | Some('.') | Some('#') | Some('/') => return true,
            _ => from = from + pos + 1,
        }
    }
    false
}

/// Explicit artifact kind, resolved once at the API boundary.
///
/// `Custom` holds a type declared in the conformance requirement model but
/// not built in; [`ArtifactKind::resolve`] never produces a `Custom` value
/// whose name shadows a built-in variant, so comparing by name is sound.
#[derive(Debug, Clone)]
pub enum ArtifactKind {
    Spec,
    Interface,
    Docs,
    Test,
    Manager,
    Custom(String),
}

impl ArtifactKind {
    pub const SPEC_NAME: &'static str = "spec";

    /// Resolve a type name against the recognized set (built-ins plus types
    /// declared in the requirement model).
    pub fn resolve(name: &str, declared: &BTreeSet<String>) -> Result<Self, NamespaceError> {
        match name {
            "spec" => Ok(Self::Spec),
            "interface" => Ok(Self::Interface),
            "docs" => Ok(Self::Docs),
            "test" => Ok(Self::Test),
            "manager" => Ok(Self::Manager),
            other if declared.contains(other) => Ok(Self::Custom(other.to_string())),
            other => Err(NamespaceError::UnrecognizedKind(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Spec => "spec",
            Self::Interface => "interface",
            Self::Docs => "docs",
            Self::Test => "test",
            Self::Manager => "manager",
            Self::Custom(name) => name,
        }
    }

    pub fn is_spec(&self) -> bool {
        matches!(self, Self::Spec)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Identity is the type name, so a Custom kind can never alias a built-in.
impl PartialEq for ArtifactKind {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ArtifactKind {}

impl Hash for ArtifactKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for ArtifactKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArtifactKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}
