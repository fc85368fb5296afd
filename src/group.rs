//! API group precedence
//!
//! Some groups took over kinds that used to live elsewhere (`apps` replaced
//! `extensions` for Deployment, `events` replaced `core` for Event). When the
//! same kind exists in several groups the replacing group is preferred.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Superseded group -> groups that replace it.
///
/// Groups are compared by their short name (`networking`, not
/// `networking.k8s.io`).
const SUPERSESSIONS: &[(&str, &[&str])] = &[
    ("extensions", &["apps", "networking", "policy"]),
    ("core", &["events"]),
];

/// A short API group name. The empty group is normalized to `core`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ApiGroup(String);

impl ApiGroup {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Self("core".to_string())
        } else {
            Self(name)
        }
    }

    /// Short group from a fully qualified one: `apps.k8s.io` -> `apps`
    pub fn from_full_name(full: &str) -> Self {
        Self::new(full.split('.').next().unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sort key: a superseded group sorts right after the last of the groups
    /// replacing it; everything else sorts by name.
    fn precedence_key(&self) -> (&str, u8, &str) {
        for (superseded, replacements) in SUPERSESSIONS {
            if self.0 == *superseded {
                let anchor = replacements.iter().max().copied().unwrap_or(*superseded);
                return (anchor, 1, &self.0);
            }
        }
        (&self.0, 0, &self.0)
    }

    /// Title-case display name: `core` -> `Core`
    pub fn display_name(&self) -> String {
        title_case(&self.0)
    }
}

/// Ordering is precedence: `a < b` means `a` is listed before (preferred over) `b`.
impl Ord for ApiGroup {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence_key().cmp(&other.precedence_key())
    }
}

impl PartialOrd for ApiGroup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ApiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ApiGroup {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for ApiGroup {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<ApiGroup> for String {
    fn from(group: ApiGroup) -> Self {
        group.0
    }
}

/// Upper-case the first letter of every whitespace separated word
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
