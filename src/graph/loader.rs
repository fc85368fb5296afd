//! Document Loading and Ingestion
//!
//! Loads API documents from the filesystem, turns every definition entry into
//! a [`Definition`] with typed GVK identity and fields, builds the reference
//! edges and hashes the input.

use anyhow::Context;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::resolver::direct_references;
use super::{Definition, DefinitionGraph, DefinitionId, DefinitionKey, Diagnostics, Field};
use crate::config::DocsConfig;
use crate::error::{DocsError, Result};
use crate::schema::{
    element_ref, guess_gvk, type_display, ApiDocument, Gvk, KeyGvk, SchemaExtensions,
    PATCH_MERGE_KEY_KEY, PATCH_STRATEGY_KEY,
};
use crate::version::{sort_newest_first, ApiVersion};

const DEPRECATED_PREFIX: &str = "Deprecated. Please use";
const META_GROUP: &str = "meta";

/// Directories never searched for documents
const SKIP_DIRS: &[&str] = &["target", ".git", "node_modules"];

/// One or more documents merged into a single input
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: ApiDocument,
    /// Files in merge order
    pub sources: Vec<PathBuf>,
}

/// Load a single document, or every `*.json` document under a directory.
///
/// Files are merged in file name order; for keys present in several files the
/// first one wins.
pub fn load_documents(path: &Path) -> anyhow::Result<LoadedDocument> {
    let files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !SKIP_DIRS.iter().any(|d| e.file_name() == *d)
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().map(|ext| ext == "json").unwrap_or(false))
            .map(|e| e.into_path())
            .collect()
    } else {
        vec![path.to_path_buf()]
    };

    if files.is_empty() {
        anyhow::bail!("No API documents found under {}", path.display());
    }

    let mut merged = ApiDocument::default();
    for file in &files {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let document = ApiDocument::from_json_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse JSON in {}: {}", file.display(), e))?;
        info!(
            path = %file.display(),
            definitions = document.definitions.len(),
            paths = document.paths.len(),
            "Loaded API document"
        );
        merged.merge(document);
    }

    Ok(LoadedDocument {
        document: merged,
        sources: files,
    })
}

/// Hex sha256 of the canonical JSON form of a document
pub fn document_hash(document: &ApiDocument) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(document)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Ingest every definition of `document` into a fresh graph.
///
/// Deprecated, skipped, unversioned and malformed entries are left out but
/// remembered, so references to them are not reported as dangling. Two
/// entries with the same (group, version, kind) abort the run.
pub fn build_graph(
    document: &ApiDocument,
    config: &DocsConfig,
    diags: &mut Diagnostics,
) -> Result<DefinitionGraph> {
    let capacity = document.definitions.len();
    let mut graph = DefinitionGraph {
        definitions: Vec::with_capacity(capacity),
        bundle_hash: document_hash(document)?,
        ..DefinitionGraph::default()
    };
    let mut missing_full_names: BTreeSet<String> = BTreeSet::new();

    for (key, schema) in &document.definitions {
        if config.is_definition_skipped(key) {
            debug!(key = %key, "Skipping configured definition");
            graph.known_keys.insert(key.clone());
            continue;
        }

        let description = schema
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if description.starts_with(DEPRECATED_PREFIX) {
            debug!(key = %key, "Skipping deprecated definition");
            graph.known_keys.insert(key.clone());
            continue;
        }

        let extensions = match SchemaExtensions::extract(schema) {
            Ok(extensions) => extensions,
            Err(e) => {
                warn!(key = %key, error = %e, "Malformed extension");
                diags.malformed_gvk(key, &e);
                graph.known_keys.insert(key.clone());
                continue;
            }
        };

        let gvk = match (extensions.gvk.clone(), guess_gvk(key)) {
            // meta types such as Status declare the core group
            (Some(_), KeyGvk::Found(guessed)) if guessed.group.as_str() == META_GROUP => guessed,
            (Some(gvk), _) => gvk,
            (None, KeyGvk::Found(gvk)) => gvk,
            (None, KeyGvk::Unversioned) => {
                debug!(key = %key, "Skipping unversioned definition");
                graph.known_keys.insert(key.clone());
                continue;
            }
            (None, KeyGvk::Malformed) => {
                warn!(key = %key, "Cannot derive group/version/kind from key");
                diags.malformed_gvk(key, "cannot derive group/version/kind from key");
                graph.known_keys.insert(key.clone());
                continue;
            }
        };

        let definition_key = DefinitionKey::new(gvk.group.clone(), gvk.version.clone(), gvk.kind.clone());
        if let Some(&existing) = graph.by_gvk.get(&definition_key) {
            return Err(DocsError::DuplicateDefinition {
                key: definition_key.to_string(),
                first_source: graph.get(existing).key.clone(),
                second_source: key.clone(),
            });
        }

        let group_full_name = full_group_name(config, &gvk, &mut missing_full_names);
        let id = DefinitionId(graph.definitions.len());
        graph.graph.add_node(id);
        graph.by_key.insert(key.clone(), id);
        graph.by_gvk.insert(definition_key, id);
        graph.definitions.push(Definition {
            id,
            key: key.clone(),
            name: gvk.kind,
            group: gvk.group,
            group_full_name,
            version: gvk.version,
            description: description.to_string(),
            schema: schema.clone(),
            extensions,
            fields: Vec::new(),
            appears_in: Vec::new(),
            other_versions: Vec::new(),
            inline: Vec::new(),
            operation_categories: Vec::new(),
            is_old_version: false,
            is_inlined: false,
            in_toc: false,
            found_in_field: false,
            found_in_operation: false,
        });
    }

    for group in &missing_full_names {
        diags.missing_group_full_name(group);
    }

    // Fields and edges need the complete key index
    let mut pending_edges: Vec<(DefinitionId, DefinitionId)> = Vec::new();
    for id in graph.ids().collect::<Vec<_>>() {
        let definition = graph.get(id);
        let fields = build_fields(&graph, &definition.schema);
        let references = direct_references(&graph, &definition.schema);

        for target in &references.dangling {
            warn!(from = %definition.key, target = %target, "Dangling reference");
            diags.dangling_reference(&definition.key, target);
        }
        pending_edges.extend(references.resolved.iter().map(|&to| (id, to)));

        graph.get_mut(id).fields = fields;
    }
    for (from, to) in pending_edges {
        graph.graph.add_edge(from.node(), to.node(), ());
    }

    graph.group_versions = collect_group_versions(&graph);

    info!(
        definitions = graph.len(),
        edges = graph.edge_count(),
        skipped = graph.known_keys.len(),
        "Built definition graph"
    );
    Ok(graph)
}

fn full_group_name(config: &DocsConfig, gvk: &Gvk, missing: &mut BTreeSet<String>) -> String {
    if let Some(full) = config.group_full_names.get(gvk.group.as_str()) {
        return full.clone();
    }
    match gvk.full_group.as_deref() {
        Some("") => gvk.group.to_string(),
        Some(full) => full.to_string(),
        None => {
            missing.insert(gvk.group.to_string());
            gvk.group.to_string()
        }
    }
}

fn build_fields(graph: &DefinitionGraph, schema: &Value) -> Vec<Field> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: HashSet<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, property)| {
            let string_hint = |key: &str| property.get(key).and_then(Value::as_str).map(str::to_string);
            Field {
                name: name.clone(),
                type_name: type_display(property),
                description: property
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .replace('\n', " "),
                required: required.contains(name.as_str()),
                patch_strategy: string_hint(PATCH_STRATEGY_KEY),
                patch_merge_key: string_hint(PATCH_MERGE_KEY_KEY),
                definition: element_ref(property).and_then(|target| graph.lookup_ref(target)),
            }
        })
        .collect()
}

/// Full group name -> versions, excluding the `meta` group and the
/// `resource` pseudo-version
fn collect_group_versions(graph: &DefinitionGraph) -> BTreeMap<String, Vec<ApiVersion>> {
    let mut group_versions: BTreeMap<String, Vec<ApiVersion>> = BTreeMap::new();
    for definition in graph.iter() {
        if definition.group.as_str() == META_GROUP || definition.version.as_str() == "resource" {
            continue;
        }
        let versions = group_versions.entry(definition.group_full_name.clone()).or_default();
        if !versions.contains(&definition.version) {
            versions.push(definition.version.clone());
        }
    }
    for versions in group_versions.values_mut() {
        sort_newest_first(versions);
    }
    group_versions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DiagnosticCode;
    use serde_json::json;
    use std::io::Write;

    fn document(definitions: Value) -> ApiDocument {
        serde_json::from_value(json!({ "definitions": definitions })).unwrap()
    }

    #[test]
    fn test_extension_gvk_wins_over_key() {
        let doc = document(json!({
            "io.k8s.api.networking.v1.Ingress": {
                "x-kubernetes-group-version-kind": [{"group": "networking.k8s.io", "version": "v1", "kind": "Ingress"}]
            }
        }));
        let mut diags = Diagnostics::new();
        let graph = build_graph(&doc, &DocsConfig::default(), &mut diags).unwrap();
        let ingress = graph.get(DefinitionId(0));
        assert_eq!(ingress.group.as_str(), "networking");
        assert_eq!(ingress.group_full_name, "networking.k8s.io");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_skip_rules() {
        let doc = document(json!({
            "io.k8s.api.core.v1.Pod": {},
            "io.k8s.api.core.v1.OldThing": {"description": "Deprecated. Please use NewThing instead."},
            "io.k8s.apiextensions.v1.JSONSchemaPropsOrStringArray": {},
            "io.k8s.apimachinery.pkg.util.intstr.IntOrString": {},
            "Bogus": {},
            "io.k8s.api.core.v1.Broken": {"x-kubernetes-group-version-kind": "core/v1/Broken"}
        }));
        let mut diags = Diagnostics::new();
        let graph = build_graph(&doc, &DocsConfig::default(), &mut diags).unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(DefinitionId(0)).name, "Pod");
        assert_eq!(diags.with_code(DiagnosticCode::MalformedGvk).count(), 2);
        assert!(graph.is_known_ref("#/definitions/io.k8s.apimachinery.pkg.util.intstr.IntOrString"));
        assert!(graph.is_known_ref("Bogus"));
    }

    #[test]
    fn test_duplicate_identity_is_fatal() {
        let doc = document(json!({
            "io.k8s.api.apps.v1.Deployment": {},
            "io.k8s.other.apps.v1.Deployment": {}
        }));
        let mut diags = Diagnostics::new();
        let err = build_graph(&doc, &DocsConfig::default(), &mut diags).unwrap_err();
        match err {
            DocsError::DuplicateDefinition { key, first_source, second_source } => {
                assert_eq!(key, "apps.v1.Deployment");
                assert_eq!(first_source, "io.k8s.api.apps.v1.Deployment");
                assert_eq!(second_source, "io.k8s.other.apps.v1.Deployment");
            }
            other => panic!("Expected DuplicateDefinition, got {:?}", other),
        }
    }

    #[test]
    fn test_fields() {
        let doc = document(json!({
            "g.v1.PodSpec": {
                "required": ["containers"],
                "properties": {
                    "containers": {
                        "type": "array",
                        "items": {"$ref": "#/definitions/g.v1.Container"},
                        "description": "List of containers.\nCannot be updated.",
                        "x-kubernetes-patch-strategy": "merge",
                        "x-kubernetes-patch-merge-key": "name"
                    },
                    "hostname": {"type": "string"}
                }
            },
            "g.v1.Container": {}
        }));
        let mut diags = Diagnostics::new();
        let graph = build_graph(&doc, &DocsConfig::default(), &mut diags).unwrap();
        let spec = graph.get(graph.lookup_ref("g.v1.PodSpec").unwrap());

        let containers = &spec.fields[0];
        assert_eq!(containers.name, "containers");
        assert_eq!(containers.type_name, "[]Container");
        assert_eq!(containers.description, "List of containers. Cannot be updated.");
        assert!(containers.required);
        assert_eq!(containers.patch_strategy.as_deref(), Some("merge"));
        assert_eq!(containers.patch_merge_key.as_deref(), Some("name"));
        assert_eq!(containers.definition, graph.lookup_ref("g.v1.Container"));

        let hostname = &spec.fields[1];
        assert_eq!(hostname.type_name, "string");
        assert!(!hostname.required);
        assert_eq!(hostname.definition, None);
    }

    #[test]
    fn test_dangling_reference_is_reported_once() {
        let doc = document(json!({
            "g.v1.A": {"properties": {
                "x": {"$ref": "#/definitions/g.v1.Gone"},
                "y": {"type": "array", "items": {"$ref": "#/definitions/g.v1.Gone"}}
            }}
        }));
        let mut diags = Diagnostics::new();
        let graph = build_graph(&doc, &DocsConfig::default(), &mut diags).unwrap();
        assert_eq!(diags.with_code(DiagnosticCode::DanglingReference).count(), 1);
        assert_eq!(graph.get(DefinitionId(0)).fields[0].type_name, "Gone");
        assert_eq!(graph.get(DefinitionId(0)).fields[0].definition, None);
    }

    #[test]
    fn test_group_versions_and_full_names() {
        let doc = document(json!({
            "io.k8s.api.batch.v1.Job": {},
            "io.k8s.api.batch.v1beta1.CronJob": {},
            "io.k8s.api.batch.v1.CronJob": {},
            "io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta": {},
            "io.k8s.apimachinery.pkg.api.resource.Quantity": {}
        }));
        let mut config = DocsConfig::default();
        config.group_full_names.insert("core".to_string(), "core".to_string());
        let mut diags = Diagnostics::new();
        let graph = build_graph(&doc, &config, &mut diags).unwrap();

        let versions: Vec<&str> = graph.group_versions()["batch"].iter().map(|v| v.as_str()).collect();
        assert_eq!(versions, vec!["v1", "v1beta1"]);
        assert!(!graph.group_versions().contains_key("meta"));
        assert!(!graph.group_versions().contains_key("core"));

        let missing: Vec<&str> = diags
            .with_code(DiagnosticCode::MissingGroupFullName)
            .map(|d| d.subject.as_str())
            .collect();
        assert_eq!(missing, vec!["batch", "meta"]);
    }

    #[test]
    fn test_meta_types_keep_key_group() {
        let doc = document(json!({
            "io.k8s.apimachinery.pkg.apis.meta.v1.Status": {
                "x-kubernetes-group-version-kind": [{"group": "", "version": "v1", "kind": "Status"}]
            },
            "io.k8s.api.core.v1.Pod": {
                "x-kubernetes-group-version-kind": [{"group": "", "version": "v1", "kind": "Pod"}]
            }
        }));
        let mut diags = Diagnostics::new();
        let graph = build_graph(&doc, &DocsConfig::default(), &mut diags).unwrap();

        let status = graph.lookup_ref("io.k8s.apimachinery.pkg.apis.meta.v1.Status").unwrap();
        assert_eq!(graph.get(status).group.as_str(), "meta");
        assert!(graph.get_by_version_kind("core", "v1", "Status").is_none());
        let pod = graph.lookup_ref("io.k8s.api.core.v1.Pod").unwrap();
        assert_eq!(graph.get(pod).group.as_str(), "core");
        assert!(!graph.group_versions().contains_key("meta"));
        assert_eq!(graph.group_versions()["core"].len(), 1);
    }

    #[test]
    fn test_bundle_hash_is_stable() {
        let doc = document(json!({"g.v1.A": {"type": "object"}}));
        let mut diags = Diagnostics::new();
        let first = build_graph(&doc, &DocsConfig::default(), &mut diags).unwrap();
        let second = build_graph(&doc, &DocsConfig::default(), &mut diags).unwrap();
        assert_eq!(first.bundle_hash, second.bundle_hash);
        assert_eq!(first.bundle_hash.len(), 64);
    }

    #[test]
    fn test_load_documents_merges_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = fs::File::create(dir.path().join("a.json")).unwrap();
        write!(a, r#"{{"info": {{"title": "Kubernetes"}}, "definitions": {{"g.v1.A": {{}}}}}}"#).unwrap();
        let mut b = fs::File::create(dir.path().join("b.json")).unwrap();
        write!(b, r#"{{"definitions": {{"g.v1.B": {{}}}}}}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "not json").unwrap();

        let loaded = load_documents(dir.path()).unwrap();
        assert_eq!(loaded.sources.len(), 2);
        assert_eq!(loaded.document.definitions.len(), 2);
        assert_eq!(loaded.document.info.title.as_deref(), Some("Kubernetes"));
    }

    #[test]
    fn test_load_documents_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load_documents(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));

        let empty = tempfile::tempdir().unwrap();
        assert!(load_documents(empty.path()).is_err());
    }
}
