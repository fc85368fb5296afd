//! API version parsing and precedence
//!
//! Kubernetes versions look like `v1`, `v2beta1`, `v1alpha3`. Precedence runs
//! on the major number first, then the stage (alpha < beta < GA), then the
//! stage number. Strings that do not follow the pattern are kept verbatim and
//! always rank below parseable versions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^v(\d+)(?:(alpha|beta)(\d+))?$").expect("version regex is valid")
    })
}

/// Release stage of a version. Later variants have higher precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStage {
    Alpha,
    Beta,
    Ga,
}

/// Structured form of a parseable version string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedVersion {
    /// The *1* in v1alpha2
    pub major: u64,
    /// The *alpha* in v1alpha2
    pub stage: VersionStage,
    /// The *2* in v1alpha2; 0 for GA
    pub stage_number: u64,
}

impl ParsedVersion {
    fn precedence(&self) -> (u64, VersionStage, u64) {
        (self.major, self.stage, self.stage_number)
    }
}

/// An API version as it appears in a definition key.
///
/// Ordering is precedence: `a > b` means `a` is the newer, preferred version.
/// Equality is string equality, so the order is total and consistent with `Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ApiVersion {
    raw: String,
    parsed: Option<ParsedVersion>,
}

impl ApiVersion {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = Self::parse_literal(&raw);
        Self { raw, parsed }
    }

    fn parse_literal(literal: &str) -> Option<ParsedVersion> {
        let caps = version_regex().captures(literal)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let (stage, stage_number) = match caps.get(2).map(|m| m.as_str()) {
            Some("alpha") => (VersionStage::Alpha, caps.get(3)?.as_str().parse().ok()?),
            Some("beta") => (VersionStage::Beta, caps.get(3)?.as_str().parse().ok()?),
            _ => (VersionStage::Ga, 0),
        };
        Some(ParsedVersion {
            major,
            stage,
            stage_number,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Structured version, or `None` for strings outside the `vN[stageM]` pattern
    pub fn parsed(&self) -> Option<&ParsedVersion> {
        self.parsed.as_ref()
    }

    pub fn is_parseable(&self) -> bool {
        self.parsed.is_some()
    }

    /// Version token used inside operation ids: `v1beta1` -> `V1beta1`
    pub fn camel_case(&self) -> String {
        let mut chars = self.raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.raw == other.raw {
            return Ordering::Equal;
        }
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => a
                .precedence()
                .cmp(&b.precedence())
                // "v01" and "v1" parse identically; keep them distinct
                .then_with(|| other.raw.cmp(&self.raw)),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            // lexically smaller unparseable strings rank as newer
            (None, None) => other.raw.cmp(&self.raw),
        }
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for ApiVersion {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for ApiVersion {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.raw
    }
}

/// Sort versions newest first
pub fn sort_newest_first(versions: &mut [ApiVersion]) {
    versions.sort_by(|a, b| b.cmp(a));
}
