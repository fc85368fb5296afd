//! Definition Graph
//!
//! Primary data structure for one generation run. Definitions live in an
//! arena indexed by [`DefinitionId`]; cross references (`appears_in`,
//! `inline`, `other_versions`, field links) are ids into that arena, so the
//! mutually recursive shape of the API never turns into owning cycles.
//!
//! A petgraph `DiGraph` mirrors the direct definition -> definition edges
//! induced by schema references and backs cycle analysis.

pub mod analysis;
pub mod classify;
pub mod diagnostics;
pub mod loader;
pub mod resolver;

pub use analysis::{compute_reference_cycles, CycleAnalysis, SccGroup};
pub use classify::{
    demote_old_versions, detect_inline_definitions, index_appears_in, sort_by_kind_precedence,
    INLINE_PATTERNS,
};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use loader::{load_documents, LoadedDocument};
pub use resolver::{direct_references, resolve_references, ReferenceSet, SchemaPath, SchemaPathSegment};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::group::ApiGroup;
use crate::schema::{normalize_ref, SchemaExtensions};
use crate::version::ApiVersion;

// =============================================================================
// Identity
// =============================================================================

/// Index of a definition in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DefinitionId(pub usize);

impl DefinitionId {
    pub fn index(self) -> usize {
        self.0
    }

    fn node(self) -> NodeIndex {
        NodeIndex::new(self.0)
    }
}

/// The (group, version, kind) identity of a definition. Unique per graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionKey {
    pub group: ApiGroup,
    pub version: ApiVersion,
    pub kind: String,
}

impl DefinitionKey {
    pub fn new(group: impl Into<ApiGroup>, version: impl Into<ApiVersion>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.group, self.version, self.kind)
    }
}

// =============================================================================
// Definition
// =============================================================================

/// Operations of one category bound to a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundCategory {
    /// e.g. "Write Operations"
    pub name: String,
    /// Operation ids in template order
    pub operations: Vec<String>,
}

/// A named, typed member of a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Display type: `string`, `[]Container`, `map[string]Quantity`
    pub type_name: String,
    pub description: String,
    pub required: bool,
    pub patch_strategy: Option<String>,
    pub patch_merge_key: Option<String>,
    /// Resolved target for complex types; never set for primitives
    pub definition: Option<DefinitionId>,
}

/// One named schema type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    pub id: DefinitionId,
    /// Fully qualified key in the source document
    pub key: String,
    /// Kind name
    pub name: String,
    pub group: ApiGroup,
    pub group_full_name: String,
    pub version: ApiVersion,
    pub description: String,
    pub schema: Value,
    pub extensions: SchemaExtensions,

    pub fields: Vec<Field>,
    /// Definitions whose schemas reference this one
    pub appears_in: Vec<DefinitionId>,
    /// Same kind at a different version, newest first
    pub other_versions: Vec<DefinitionId>,
    /// Companion definitions rendered nested under this one
    pub inline: Vec<DefinitionId>,
    /// Only categories with at least one bound operation
    pub operation_categories: Vec<BoundCategory>,

    pub is_old_version: bool,
    pub is_inlined: bool,
    pub in_toc: bool,
    pub found_in_field: bool,
    pub found_in_operation: bool,
}

impl Definition {
    pub fn definition_key(&self) -> DefinitionKey {
        DefinitionKey::new(self.group.clone(), self.version.clone(), self.name.clone())
    }

    pub fn has_operations(&self) -> bool {
        self.operation_categories.iter().any(|c| !c.operations.is_empty())
    }

    pub fn is_deprecated(&self) -> bool {
        self.description.starts_with("Deprecated. Please use")
    }

    /// Plural resource name as it appears in paths: the declared hint, else
    /// the lowercased kind pluralized (`NetworkPolicy` -> `networkpolicies`)
    pub fn resource_name(&self) -> String {
        if let Some(resource) = &self.extensions.resource {
            return resource.clone();
        }
        let kind = self.name.to_lowercase();
        match kind.strip_suffix('y') {
            Some(stem) => format!("{}ies", stem),
            None => format!("{}s", kind),
        }
    }
}

// =============================================================================
// Definition Graph
// =============================================================================

/// All definitions of one run plus their reference edges
#[derive(Debug, Clone, Default)]
pub struct DefinitionGraph {
    /// Arena; `definitions[i].id == DefinitionId(i)`
    pub(crate) definitions: Vec<Definition>,

    /// Index: source document key -> id
    pub(crate) by_key: HashMap<String, DefinitionId>,

    /// Index: (group, version, kind) -> id
    pub(crate) by_gvk: HashMap<DefinitionKey, DefinitionId>,

    /// Keys present in the document but deliberately not ingested
    /// (unversioned helpers, skipped or deprecated types)
    pub(crate) known_keys: HashSet<String>,

    /// Direct reference edges; node index == definition id
    pub(crate) graph: DiGraph<DefinitionId, ()>,

    /// Hash of the ingested document(s)
    pub bundle_hash: String,

    /// Full group name -> observed versions, newest first
    pub(crate) group_versions: BTreeMap<String, Vec<ApiVersion>>,
}

impl DefinitionGraph {
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Definition by id. Ids always come from this graph.
    pub fn get(&self, id: DefinitionId) -> &Definition {
        &self.definitions[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: DefinitionId) -> &mut Definition {
        &mut self.definitions[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = DefinitionId> {
        (0..self.definitions.len()).map(DefinitionId)
    }

    /// Look up a definition by `$ref` or document key
    pub fn lookup_ref(&self, reference: &str) -> Option<DefinitionId> {
        self.by_key.get(normalize_ref(reference)).copied()
    }

    /// True if the reference points at a key the document contains,
    /// ingested or not
    pub fn is_known_ref(&self, reference: &str) -> bool {
        let key = normalize_ref(reference);
        self.by_key.contains_key(key) || self.known_keys.contains(key)
    }

    pub fn get_by_key(&self, key: &DefinitionKey) -> Option<DefinitionId> {
        self.by_gvk.get(key).copied()
    }

    pub fn get_by_version_kind(&self, group: &str, version: &str, kind: &str) -> Option<DefinitionId> {
        self.get_by_key(&DefinitionKey::new(group, version, kind))
    }

    /// Full group name -> versions observed for it, newest first
    pub fn group_versions(&self) -> &BTreeMap<String, Vec<ApiVersion>> {
        &self.group_versions
    }

    /// Fuzzy search over kind names, best match first
    pub fn search(&self, query: &str, limit: usize) -> Vec<DefinitionId> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, DefinitionId)> = self
            .definitions
            .iter()
            .filter_map(|d| matcher.fuzzy_match(&d.name, query).map(|score| (score, d.id)))
            .collect();

        // Sort by score descending, id ascending for ties
        results.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        results.into_iter().take(limit).map(|(_, id)| id).collect()
    }

    /// Human readable `group/version/Kind` label
    pub fn label(&self, id: DefinitionId) -> String {
        let d = self.get(id);
        format!("{}/{}/{}", d.group, d.version, d.name)
    }
}
