//! HTTP Operations
//!
//! Ingests every (method, path) pair of the document as an [`Operation`] with
//! its parameters and responses, ready to be bound to the definition it acts
//! on by [`binder`].

pub mod binder;
pub mod template;

pub use binder::{bind_by_path, bind_operations, collect_orphans, TOKEN_REQUEST_OPERATION};
pub use template::{expand_template, group_token, NAMESPACED_TOKEN};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::graph::{DefinitionGraph, DefinitionId, Diagnostics, Field};
use crate::group::ApiGroup;
use crate::schema::{element_ref, schema_ref, type_display, ApiDocument};

/// Operations by id, in id order
pub type Operations = BTreeMap<String, Operation>;

/// The matched operation type and the category it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationType {
    /// e.g. "Create"
    pub name: String,
    /// e.g. "Write Operations"
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Body,
}

impl ParameterLocation {
    fn parse(location: &str) -> Option<Self> {
        match location {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "body" => Some(Self::Body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status code as written in the document
    pub code: String,
    pub description: String,
    pub type_name: String,
    pub definition: Option<DefinitionId>,
}

/// One HTTP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub path: String,
    pub http_method: String,
    pub description: String,
    /// Owning definition; `None` until bound, `None` afterwards means orphaned
    pub definition: Option<DefinitionId>,
    pub operation_type: Option<OperationType>,
    pub path_params: Vec<Field>,
    pub query_params: Vec<Field>,
    pub body_params: Vec<Field>,
    /// Sorted by status code
    pub responses: Vec<HttpResponse>,
}

/// Group/version/resource addressed by an operation path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTarget {
    pub group: ApiGroup,
    pub version: String,
    pub resource: String,
    pub subresource: Option<String>,
    pub namespaced: bool,
}

impl std::fmt::Display for PathTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.resource)?;
        if let Some(sub) = &self.subresource {
            write!(f, "/{}", sub)?;
        }
        Ok(())
    }
}

// /apis/<group>/<version>[/namespaces/{namespace}]/<resources>[/{name}[/<subresource>]]
fn group_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^/apis/([A-Za-z0-9.\-]+)/([A-Za-z0-9]+)/(namespaces/\{namespace\}/)?([A-Za-z0-9.]+)(?:/\{name\}(?:/([A-Za-z0-9.]+))?)?$",
        )
        .expect("group path regex is valid")
    })
}

// /api/<version>[/namespaces/{namespace}]/<resources>[/{name}[/<subresource>]]
fn core_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^/api/([A-Za-z0-9]+)/(namespaces/\{namespace\}/)?([A-Za-z0-9.]+)(?:/\{name\}(?:/([A-Za-z0-9.]+))?)?$",
        )
        .expect("core path regex is valid")
    })
}

impl Operation {
    pub fn is_bound(&self) -> bool {
        self.definition.is_some()
    }

    /// `POST /api/v1/namespaces/{namespace}/pods`
    pub fn display_http(&self) -> String {
        format!("{} {}", self.http_method, self.path)
    }

    /// Parse the addressed resource out of the path. `None` for paths that do
    /// not follow the resource layout (watch, proxy, discovery).
    pub fn group_version_resource_subresource(&self) -> Option<PathTarget> {
        if let Some(caps) = group_path_regex().captures(&self.path) {
            return Some(PathTarget {
                group: ApiGroup::from_full_name(caps.get(1)?.as_str()),
                version: caps.get(2)?.as_str().to_string(),
                namespaced: caps.get(3).is_some(),
                resource: caps.get(4)?.as_str().to_string(),
                subresource: caps.get(5).map(|m| m.as_str().to_string()),
            });
        }
        let caps = core_path_regex().captures(&self.path)?;
        Some(PathTarget {
            group: ApiGroup::new("core"),
            version: caps.get(1)?.as_str().to_string(),
            namespaced: caps.get(2).is_some(),
            resource: caps.get(3)?.as_str().to_string(),
            subresource: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }
}

/// API discovery metadata endpoints, not documented as operations
pub fn is_discovery_operation(id: &str) -> bool {
    id.ends_with("APIGroup") || id.ends_with("APIResources") || id.ends_with("APIVersions")
}

/// Collect all operations of the document.
///
/// Response schemas that resolve to a definition mark it `found_in_operation`.
pub fn ingest_operations(
    document: &ApiDocument,
    graph: &mut DefinitionGraph,
    diags: &mut Diagnostics,
) -> Operations {
    let mut operations = Operations::new();
    let mut returned: Vec<DefinitionId> = Vec::new();

    for (path, item) in &document.paths {
        for (method, raw) in item.operations() {
            if raw.operation_id.is_empty() {
                debug!(path = %path, method, "Operation without id");
                continue;
            }
            if is_discovery_operation(&raw.operation_id) {
                debug!(operation = %raw.operation_id, "Skipping discovery operation");
                continue;
            }
            if operations.contains_key(&raw.operation_id) {
                warn!(operation = %raw.operation_id, path = %path, "Duplicate operation id, keeping the first");
                continue;
            }

            let mut operation = Operation {
                id: raw.operation_id.clone(),
                path: path.clone(),
                http_method: method.to_string(),
                description: raw.description.clone(),
                definition: None,
                operation_type: None,
                path_params: Vec::new(),
                query_params: Vec::new(),
                body_params: Vec::new(),
                responses: Vec::new(),
            };

            // path item parameters first, then the operation's own
            for param in item.parameters.iter().chain(raw.parameters.iter()) {
                add_parameter(document, graph, &mut operation, param, diags);
            }

            for (code, response) in &raw.responses {
                let Some(schema) = &response.schema else {
                    continue;
                };
                let definition = schema_ref(schema).and_then(|target| graph.lookup_ref(target));
                returned.extend(definition);
                operation.responses.push(HttpResponse {
                    code: code.clone(),
                    description: response.description.replace('\n', " "),
                    type_name: type_display(schema),
                    definition,
                });
            }

            operations.insert(operation.id.clone(), operation);
        }
    }

    for id in returned {
        graph.get_mut(id).found_in_operation = true;
    }
    operations
}

fn add_parameter(
    document: &ApiDocument,
    graph: &DefinitionGraph,
    operation: &mut Operation,
    param: &Value,
    diags: &mut Diagnostics,
) {
    let resolved = document.resolve_parameter(param);
    let location = resolved
        .and_then(|p| p.get("in"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let name = resolved
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .or_else(|| param.get("$ref").and_then(Value::as_str))
        .unwrap_or_default();

    let (Some(resolved), Some(location)) = (resolved, ParameterLocation::parse(location)) else {
        warn!(operation = %operation.id, parameter = %name, location = %location, "Unknown parameter location");
        diags.unknown_parameter_location(&operation.id, name, location);
        return;
    };

    let field = parameter_field(graph, name, resolved);
    match location {
        ParameterLocation::Path => operation.path_params.push(field),
        ParameterLocation::Query => operation.query_params.push(field),
        ParameterLocation::Body => operation.body_params.push(field),
    }
}

fn parameter_field(graph: &DefinitionGraph, name: &str, param: &Value) -> Field {
    // body parameters carry a schema, the others are typed inline
    let typed = param.get("schema").unwrap_or(param);
    Field {
        name: name.to_string(),
        type_name: type_display(typed),
        description: param
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .replace('\n', " "),
        required: param.get("required").and_then(Value::as_bool).unwrap_or(false),
        patch_strategy: None,
        patch_merge_key: None,
        definition: element_ref(typed).and_then(|target| graph.lookup_ref(target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocsConfig;
    use crate::graph::{loader, DiagnosticCode};
    use serde_json::json;

    fn setup(document: Value) -> (ApiDocument, DefinitionGraph, Diagnostics) {
        let document: ApiDocument = serde_json::from_value(document).unwrap();
        let mut diags = Diagnostics::new();
        let graph = loader::build_graph(&document, &DocsConfig::default(), &mut diags).unwrap();
        (document, graph, diags)
    }

    fn operation(path: &str) -> Operation {
        Operation {
            id: "op".to_string(),
            path: path.to_string(),
            http_method: "GET".to_string(),
            description: String::new(),
            definition: None,
            operation_type: None,
            path_params: Vec::new(),
            query_params: Vec::new(),
            body_params: Vec::new(),
            responses: Vec::new(),
        }
    }

    #[test]
    fn test_ingest_parameters_and_responses() {
        let (document, mut graph, mut diags) = setup(json!({
            "definitions": {"io.k8s.api.core.v1.Pod": {}},
            "parameters": {
                "body-pod": {"name": "body", "in": "body", "required": true, "schema": {"$ref": "#/definitions/io.k8s.api.core.v1.Pod"}}
            },
            "paths": {
                "/api/v1/namespaces/{namespace}/pods": {
                    "parameters": [
                        {"name": "namespace", "in": "path", "required": true, "type": "string"},
                        {"name": "pretty", "in": "query", "type": "string"}
                    ],
                    "post": {
                        "operationId": "createCoreV1NamespacedPod",
                        "description": "create a Pod",
                        "parameters": [
                            {"$ref": "#/parameters/body-pod"},
                            {"name": "dryRun", "in": "query", "type": "string"},
                            {"name": "weird", "in": "header", "type": "string"}
                        ],
                        "responses": {
                            "201": {"description": "Created", "schema": {"$ref": "#/definitions/io.k8s.api.core.v1.Pod"}},
                            "200": {"description": "OK", "schema": {"$ref": "#/definitions/io.k8s.api.core.v1.Pod"}},
                            "401": {"description": "Unauthorized"}
                        }
                    }
                },
                "/apis/apps/": {
                    "get": {"operationId": "getAppsAPIGroup"}
                }
            }
        }));
        let operations = ingest_operations(&document, &mut graph, &mut diags);

        assert_eq!(operations.len(), 1);
        let op = &operations["createCoreV1NamespacedPod"];
        assert_eq!(op.http_method, "POST");
        assert_eq!(op.display_http(), "POST /api/v1/namespaces/{namespace}/pods");
        assert_eq!(op.path_params.len(), 1);
        assert_eq!(
            op.query_params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["pretty", "dryRun"]
        );
        assert_eq!(op.body_params[0].name, "body");
        assert_eq!(op.body_params[0].type_name, "Pod");
        assert!(op.body_params[0].required);
        assert!(op.body_params[0].definition.is_some());

        let codes: Vec<&str> = op.responses.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["200", "201"]);

        let pod = graph.lookup_ref("io.k8s.api.core.v1.Pod").unwrap();
        assert!(graph.get(pod).found_in_operation);
        assert_eq!(diags.with_code(DiagnosticCode::UnknownParameterLocation).count(), 1);
    }

    #[test]
    fn test_discovery_operations_are_dropped() {
        assert!(is_discovery_operation("getCoreAPIVersions"));
        assert!(is_discovery_operation("getAppsV1APIResources"));
        assert!(is_discovery_operation("getAppsAPIGroup"));
        assert!(!is_discovery_operation("listAppsV1NamespacedDeployment"));
    }

    #[test]
    fn test_path_targets() {
        let target = operation("/apis/apps/v1/namespaces/{namespace}/deployments/{name}/scale")
            .group_version_resource_subresource()
            .unwrap();
        assert_eq!(target.group.as_str(), "apps");
        assert_eq!(target.version, "v1");
        assert_eq!(target.resource, "deployments");
        assert_eq!(target.subresource.as_deref(), Some("scale"));
        assert!(target.namespaced);
        assert_eq!(target.to_string(), "apps/v1/deployments/scale");

        let target = operation("/apis/rbac.authorization.k8s.io/v1/clusterroles/{name}")
            .group_version_resource_subresource()
            .unwrap();
        assert_eq!(target.group.as_str(), "rbac");
        assert!(!target.namespaced);
        assert_eq!(target.subresource, None);

        let target = operation("/api/v1/namespaces/{namespace}/pods/{name}/status")
            .group_version_resource_subresource()
            .unwrap();
        assert_eq!(target.group.as_str(), "core");
        assert_eq!(target.resource, "pods");
        assert_eq!(target.subresource.as_deref(), Some("status"));

        let target = operation("/api/v1/namespaces/{name}").group_version_resource_subresource().unwrap();
        assert_eq!(target.resource, "namespaces");
        assert!(!target.namespaced);

        assert!(operation("/apis/apps/v1/watch/namespaces/{namespace}/deployments/{name}")
            .group_version_resource_subresource()
            .is_none());
    }
}
