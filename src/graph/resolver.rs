//! Schema Reference Resolver
//!
//! Extracts the definitions a schema node references through object
//! properties, array items, map values and allOf/oneOf/anyOf branches.
//!
//! API schemas are mutually recursive (a PodTemplateSpec embeds a PodSpec
//! whose volumes embed further templates), so walks use an explicit stack and
//! a visited set. A node is identified by its normalized `$ref` target, or by
//! its structural path when it is an inline node. Revisiting a node
//! contributes nothing.

use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::{DefinitionGraph, DefinitionId};
use crate::schema::schema_ref;

// =============================================================================
// Schema Path
// =============================================================================

/// A step from a schema node to one of its children
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaPathSegment {
    /// Entered a referenced definition
    Definition(String),
    /// A named property of an object
    Property(String),
    /// Array items (single schema)
    ArrayItems,
    /// Tuple-style array items
    Index(usize),
    /// additionalProperties value type
    MapValue,
    AllOf(usize),
    OneOf(usize),
    AnyOf(usize),
}

impl fmt::Display for SchemaPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition(key) => write!(f, "{}", key),
            Self::Property(name) => write!(f, ".{}", name),
            Self::ArrayItems => write!(f, "[]"),
            Self::Index(i) => write!(f, "[{}]", i),
            Self::MapValue => write!(f, "[*]"),
            Self::AllOf(i) => write!(f, "<allOf:{}>", i),
            Self::OneOf(i) => write!(f, "<oneOf:{}>", i),
            Self::AnyOf(i) => write!(f, "<anyOf:{}>", i),
        }
    }
}

/// Structural address of a node, relative to the walk root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SchemaPath(Vec<SchemaPathSegment>);

impl SchemaPath {
    fn child(&self, segment: SchemaPathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Paths restart at a referenced definition, which is its own stable root
    fn definition(key: &str) -> Self {
        Self(vec![SchemaPathSegment::Definition(key.to_string())])
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for segment in &self.0 {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

// =============================================================================
// Reference Set
// =============================================================================

/// Outcome of a walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    /// Distinct definitions reached
    pub resolved: BTreeSet<DefinitionId>,
    /// Normalized `$ref` targets the document does not contain at all
    pub dangling: BTreeSet<String>,
}

impl ReferenceSet {
    pub fn contains(&self, id: DefinitionId) -> bool {
        self.resolved.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.dangling.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Ref(String),
    Inline(SchemaPath),
}

// =============================================================================
// Walks
// =============================================================================

/// Definitions referenced directly by `schema`, without entering them
pub fn direct_references(graph: &DefinitionGraph, schema: &Value) -> ReferenceSet {
    walk(graph, schema, false)
}

/// Definitions reachable from `schema`, directly or transitively.
///
/// The closure includes the definition owning `schema` only when a cycle
/// leads back to it.
pub fn resolve_references(graph: &DefinitionGraph, schema: &Value) -> ReferenceSet {
    walk(graph, schema, true)
}

fn walk(graph: &DefinitionGraph, schema: &Value, transitive: bool) -> ReferenceSet {
    let mut result = ReferenceSet::default();
    let mut visited: HashSet<NodeKey> = HashSet::new();
    let mut stack: Vec<(&Value, SchemaPath)> = vec![(schema, SchemaPath::default())];

    while let Some((node, path)) = stack.pop() {
        if let Some(target) = schema_ref(node) {
            if !visited.insert(NodeKey::Ref(target.to_string())) {
                continue;
            }
            match graph.lookup_ref(target) {
                Some(id) => {
                    result.resolved.insert(id);
                    if transitive {
                        stack.push((&graph.get(id).schema, SchemaPath::definition(target)));
                    }
                }
                None if graph.is_known_ref(target) => {}
                None => {
                    result.dangling.insert(target.to_string());
                }
            }
            continue;
        }

        if !visited.insert(NodeKey::Inline(path.clone())) {
            continue;
        }
        push_children(node, &path, &mut stack);
    }

    result
}

fn push_children<'a>(node: &'a Value, path: &SchemaPath, stack: &mut Vec<(&'a Value, SchemaPath)>) {
    if let Some(properties) = node.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            stack.push((property, path.child(SchemaPathSegment::Property(name.clone()))));
        }
    }

    match node.get("items") {
        Some(items @ Value::Object(_)) => {
            stack.push((items, path.child(SchemaPathSegment::ArrayItems)));
        }
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                stack.push((item, path.child(SchemaPathSegment::Index(i))));
            }
        }
        _ => {}
    }

    if let Some(value_type @ Value::Object(_)) = node.get("additionalProperties") {
        stack.push((value_type, path.child(SchemaPathSegment::MapValue)));
    }

    for (keyword, segment) in [
        ("allOf", SchemaPathSegment::AllOf as fn(usize) -> SchemaPathSegment),
        ("oneOf", SchemaPathSegment::OneOf as fn(usize) -> SchemaPathSegment),
        ("anyOf", SchemaPathSegment::AnyOf as fn(usize) -> SchemaPathSegment),
    ] {
        if let Some(branches) = node.get(keyword).and_then(Value::as_array) {
            for (i, branch) in branches.iter().enumerate() {
                stack.push((branch, path.child(segment(i))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocsConfig;
    use crate::graph::{loader, Diagnostics};
    use crate::schema::ApiDocument;
    use serde_json::json;

    fn graph_from(definitions: Value) -> DefinitionGraph {
        let document: ApiDocument = serde_json::from_value(json!({ "definitions": definitions })).unwrap();
        let mut diags = Diagnostics::new();
        loader::build_graph(&document, &DocsConfig::default(), &mut diags).unwrap()
    }

    fn names(graph: &DefinitionGraph, set: &ReferenceSet) -> Vec<String> {
        set.resolved.iter().map(|id| graph.get(*id).name.clone()).collect()
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let graph = graph_from(json!({
            "g.v1.A": {"properties": {"b": {"$ref": "#/definitions/g.v1.B"}}},
            "g.v1.B": {"properties": {"a": {"$ref": "#/definitions/g.v1.A"}}}
        }));
        let a = graph.lookup_ref("g.v1.A").unwrap();
        let closure = resolve_references(&graph, &graph.get(a).schema);
        assert_eq!(names(&graph, &closure), vec!["A", "B"]);
        assert!(closure.dangling.is_empty());
    }

    #[test]
    fn test_self_reference_terminates() {
        let graph = graph_from(json!({
            "g.v1.Props": {
                "properties": {
                    "not": {"$ref": "#/definitions/g.v1.Props"},
                    "items": {"type": "array", "items": {"$ref": "#/definitions/g.v1.Props"}}
                }
            }
        }));
        let props = graph.lookup_ref("g.v1.Props").unwrap();
        let closure = resolve_references(&graph, &graph.get(props).schema);
        assert_eq!(closure.resolved.len(), 1);
        assert!(closure.contains(props));
    }

    #[test]
    fn test_all_structural_positions_are_followed() {
        let graph = graph_from(json!({
            "g.v1.Root": {
                "properties": {
                    "list": {"type": "array", "items": {"$ref": "#/definitions/g.v1.Item"}},
                    "map": {"type": "object", "additionalProperties": {"$ref": "#/definitions/g.v1.Value"}},
                    "union": {"oneOf": [{"type": "string"}, {"$ref": "#/definitions/g.v1.Variant"}]},
                    "nested": {"type": "object", "properties": {"deep": {"$ref": "g.v1.Deep"}}}
                },
                "allOf": [{"$ref": "#/components/schemas/g.v1.Base"}],
                "anyOf": [{"$ref": "#/definitions/g.v1.Other"}]
            },
            "g.v1.Item": {},
            "g.v1.Value": {},
            "g.v1.Variant": {},
            "g.v1.Deep": {},
            "g.v1.Base": {},
            "g.v1.Other": {}
        }));
        let root = graph.lookup_ref("g.v1.Root").unwrap();
        let refs = direct_references(&graph, &graph.get(root).schema);
        assert_eq!(
            names(&graph, &refs),
            vec!["Base", "Deep", "Item", "Other", "Value", "Variant"]
        );
        assert_eq!(refs.resolved.len(), 6);
    }

    #[test]
    fn test_primitives_contribute_nothing() {
        let graph = graph_from(json!({
            "g.v1.Plain": {
                "properties": {
                    "name": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "labels": {"type": "object", "additionalProperties": {"type": "string"}}
                }
            }
        }));
        let plain = graph.lookup_ref("g.v1.Plain").unwrap();
        assert!(resolve_references(&graph, &graph.get(plain).schema).is_empty());
    }

    #[test]
    fn test_direct_references_do_not_follow_targets() {
        let graph = graph_from(json!({
            "g.v1.A": {"properties": {"b": {"$ref": "#/definitions/g.v1.B"}}},
            "g.v1.B": {"properties": {"c": {"$ref": "#/definitions/g.v1.C"}}},
            "g.v1.C": {}
        }));
        let a = graph.lookup_ref("g.v1.A").unwrap();
        assert_eq!(names(&graph, &direct_references(&graph, &graph.get(a).schema)), vec!["B"]);
        assert_eq!(names(&graph, &resolve_references(&graph, &graph.get(a).schema)), vec!["B", "C"]);
    }

    #[test]
    fn test_dangling_and_known_references() {
        let graph = graph_from(json!({
            "g.v1.A": {
                "properties": {
                    "missing": {"$ref": "#/definitions/g.v1.Missing"},
                    "port": {"$ref": "#/definitions/io.k8s.apimachinery.pkg.util.intstr.IntOrString"}
                }
            },
            "io.k8s.apimachinery.pkg.util.intstr.IntOrString": {"type": "string"}
        }));
        let a = graph.lookup_ref("g.v1.A").unwrap();
        let refs = resolve_references(&graph, &graph.get(a).schema);
        assert!(refs.resolved.is_empty());
        assert_eq!(refs.dangling.into_iter().collect::<Vec<_>>(), vec!["g.v1.Missing".to_string()]);
    }

    #[test]
    fn test_schema_path_display() {
        let path = SchemaPath::definition("g.v1.Pod")
            .child(SchemaPathSegment::Property("spec".to_string()))
            .child(SchemaPathSegment::ArrayItems)
            .child(SchemaPathSegment::OneOf(1));
        assert_eq!(path.to_string(), "g.v1.Pod.spec[]<oneOf:1>");
        assert_eq!(SchemaPath::default().to_string(), "<root>");
    }
}
